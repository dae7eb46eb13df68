//! Property-based tests for paging, selection and flush ordering

use super::flush::plan_payloads;
use super::*;
use crate::payload::{Media, TaggedPayloads};
use proptest::prelude::*;
use serde_json::json;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_list() -> impl Strategy<Value = Vec<Value>> {
    prop::collection::vec("[a-z]{1,8}".prop_map(Value::String), 1..20)
}

/// A list together with a valid page size for it
fn arb_list_and_count() -> impl Strategy<Value = (Vec<Value>, i64)> {
    arb_list().prop_flat_map(|list| {
        let len = i64::try_from(list.len()).unwrap();
        (Just(list), 1..=len)
    })
}

#[derive(Debug, Clone)]
enum Output {
    Write(String),
    Speak(String),
    SpeakOnly(String),
    Present,
}

fn arb_output() -> impl Strategy<Value = Output> {
    prop_oneof![
        "[a-zA-Z ]{0,12}".prop_map(Output::Write),
        "[a-zA-Z ]{0,12}".prop_map(Output::Speak),
        "[a-zA-Z ]{0,12}".prop_map(Output::SpeakOnly),
        Just(Output::Present),
    ]
}

fn apply(convo: Convo, output: Output) -> Convo {
    match output {
        Output::Write(text) => convo.write(text),
        Output::Speak(text) => convo.speak(text),
        Output::SpeakOnly(text) => convo.speak_only(text),
        Output::Present => convo.present(Media::list(json!({}))),
    }
}

fn paging_of(convo: &Convo) -> Paging {
    convo.get_list().unwrap().unwrap().paging
}

proptest! {
    #[test]
    fn paging_stays_in_bounds(
        (list, count) in arb_list_and_count(),
        steps in prop::collection::vec(any::<bool>(), 0..30),
    ) {
        let len = i64::try_from(list.len()).unwrap();
        let mut convo = Convo::new()
            .set_list("items", list, Some(Paging::new(0, count)))
            .unwrap();
        for forward in steps {
            convo = if forward {
                convo.next_list_page(0).unwrap()
            } else {
                convo.prev_list_page(0).unwrap()
            };
            let paging = paging_of(&convo);
            prop_assert!(paging.start >= 0 && paging.start < len);
            prop_assert_eq!(paging.count, count);
            let page = convo.get_list().unwrap().unwrap().page().len();
            prop_assert!(page >= 1 && i64::try_from(page).unwrap() <= count);
        }
    }

    #[test]
    fn next_page_visits_multiples_of_count((list, count) in arb_list_and_count()) {
        let len = i64::try_from(list.len()).unwrap();
        let mut convo = Convo::new()
            .set_list("items", list, Some(Paging::new(0, count)))
            .unwrap();
        let pages = (len + count - 1) / count;
        for page in 1..=pages {
            convo = convo.next_list_page(0).unwrap();
            let expected = if page == pages { 0 } else { page * count };
            prop_assert_eq!(paging_of(&convo).start, expected);
        }
    }

    #[test]
    fn select_next_cycles(list in arb_list(), steps in 1usize..40) {
        let len = list.len();
        let mut convo = Convo::new().set_list("items", list, None).unwrap();
        for step in 0..steps {
            convo = convo.select_next_from_list().unwrap();
            let index = convo.get_list_selection().unwrap().unwrap().index;
            prop_assert_eq!(index, step % len);
        }
    }

    #[test]
    fn selection_mirrors_list(list in arb_list(), index in 0usize..20) {
        prop_assume!(index < list.len());
        let expected = list[index].clone();
        let convo = Convo::new()
            .set_list("items", list, None)
            .unwrap()
            .select_from_list(i64::try_from(index).unwrap())
            .unwrap();
        let selection = convo.get_selection().unwrap().unwrap();
        prop_assert_eq!(selection.item, expected);
        prop_assert_eq!(selection.selection_type, "items");
    }

    #[test]
    fn flush_emits_one_simple_response_first(
        outputs in prop::collection::vec(arb_output(), 0..12),
    ) {
        let convo = outputs.into_iter().fold(Convo::new(), apply);
        let has_text = convo.written().iter().chain(convo.spoken()).any(|t| !t.trim().is_empty());
        let rich = convo.rich().len();

        let payloads = plan_payloads(&convo, &TaggedPayloads);
        let simple: Vec<usize> = payloads
            .iter()
            .enumerate()
            .filter(|(_, p)| p["type"] == "SimpleResponse")
            .map(|(i, _)| i)
            .collect();

        if has_text {
            prop_assert_eq!(simple, vec![0]);
            prop_assert_eq!(payloads.len(), rich + 1);
        } else {
            prop_assert!(simple.is_empty());
            prop_assert_eq!(payloads.len(), rich);
        }
    }
}
