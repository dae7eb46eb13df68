//! Paged, selectable list stored in the `list` context
//!
//! States: no list, list without selection, list with selection. Every
//! transition rewrites the whole `ListContext`; selecting from the list also
//! updates the generic selection slot so the two never disagree.

use super::Convo;
use crate::error::{ConvoError, ConvoResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const LIST_CONTEXT: &str = "list";
pub const LIST_LIFESPAN: u32 = 5;

/// Visible window over a list. A `count` of -1 shows the rest of the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paging {
    pub start: i64,
    pub count: i64,
}

impl Paging {
    #[must_use]
    pub const fn new(start: i64, count: i64) -> Self {
        Self { start, count }
    }

    /// The whole list
    #[must_use]
    pub const fn all() -> Self {
        Self::new(0, -1)
    }

    #[must_use]
    pub fn is_unbounded(self) -> bool {
        self.count <= 0
    }
}

impl Default for Paging {
    fn default() -> Self {
        Self::all()
    }
}

/// Partial paging change; missing fields keep their current value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagingUpdate {
    pub start: Option<i64>,
    pub count: Option<i64>,
}

impl PagingUpdate {
    #[must_use]
    pub fn start(start: i64) -> Self {
        Self {
            start: Some(start),
            count: None,
        }
    }

    #[must_use]
    pub fn count(count: i64) -> Self {
        Self {
            start: None,
            count: Some(count),
        }
    }
}

impl From<Paging> for PagingUpdate {
    fn from(paging: Paging) -> Self {
        Self {
            start: Some(paging.start),
            count: Some(paging.count),
        }
    }
}

fn no_selection() -> i64 {
    -1
}

/// Parameters of the `list` context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListContext {
    #[serde(rename = "type")]
    pub list_type: String,
    pub list: Vec<Value>,
    #[serde(default)]
    pub paging: Paging,
    #[serde(default = "no_selection")]
    pub selected_index: i64,
}

impl ListContext {
    #[must_use]
    pub fn new(list_type: impl Into<String>, list: Vec<Value>, paging: Paging) -> Self {
        Self {
            list_type: list_type.into(),
            list,
            paging,
            selected_index: -1,
        }
    }

    fn len(&self) -> i64 {
        i64::try_from(self.list.len()).unwrap_or(i64::MAX)
    }

    /// Items inside the current paging window
    #[must_use]
    pub fn page(&self) -> &[Value] {
        let len = self.list.len();
        let start = usize::try_from(self.paging.start).unwrap_or(0).min(len);
        let end = if self.paging.is_unbounded() {
            len
        } else {
            usize::try_from(self.paging.count)
                .map_or(len, |count| start.saturating_add(count))
                .min(len)
        };
        &self.list[start..end]
    }

    #[must_use]
    pub fn selected(&self) -> Option<&Value> {
        usize::try_from(self.selected_index)
            .ok()
            .and_then(|index| self.list.get(index))
    }

    /// Validate `paging` against this list and normalise non-positive counts
    fn checked_paging(&self, paging: Paging) -> ConvoResult<Paging> {
        let len = self.len();
        if paging.start < 0 {
            return Err(ConvoError::range(format!(
                "paging start {} is negative",
                paging.start
            )));
        }
        if paging.count > len {
            return Err(ConvoError::range(format!(
                "paging count {} exceeds list length {len}",
                paging.count
            )));
        }
        if len > 0 && paging.start >= len {
            return Err(ConvoError::range(format!(
                "paging start {} is past list length {len}",
                paging.start
            )));
        }
        let count = if paging.count <= 0 { -1 } else { paging.count };
        Ok(Paging::new(paging.start, count))
    }

    /// Page size after a next/prev request: 0 keeps it, negative is unbounded
    fn resolve_count(&self, requested: i64) -> i64 {
        match requested {
            0 => self.paging.count,
            c if c < 0 => -1,
            c => c,
        }
    }

    fn next_paging(&self, requested: i64) -> Paging {
        let len = self.len();
        let current = self.paging;
        let step = if current.is_unbounded() {
            len
        } else {
            current.count
        };
        let start = current.start + step;
        let start = if start >= len { 0 } else { start };
        Paging::new(start, self.resolve_count(requested))
    }

    fn prev_paging(&self, requested: i64) -> Paging {
        let count = self.resolve_count(requested);
        if count <= 0 {
            return Paging::all();
        }
        let start = if self.paging.start == 0 {
            (self.len() - count).max(0)
        } else {
            (self.paging.start - count).max(0)
        };
        Paging::new(start, count)
    }
}

/// Arguments handed to a `for_list_page` callback
#[derive(Debug, Clone, PartialEq)]
pub struct ListPage {
    pub list_type: String,
    pub page: Vec<Value>,
    pub paging: Paging,
    pub list: Vec<Value>,
}

/// The selected list item and its absolute index
#[derive(Debug, Clone, PartialEq)]
pub struct ListSelection {
    pub list_type: String,
    pub item: Value,
    pub index: usize,
}

impl Convo {
    /// # Errors
    ///
    /// Returns `ConvoError::Serialization` when the stored list context is malformed.
    pub fn get_list(&self) -> ConvoResult<Option<ListContext>> {
        self.get_context(LIST_CONTEXT)?
            .map(serde_json::from_value)
            .transpose()
            .map_err(Into::into)
    }

    fn require_list(&self) -> ConvoResult<ListContext> {
        self.get_list()?
            .ok_or_else(|| ConvoError::invalid_state("no list has been set"))
    }

    fn store_list(&mut self, list: &ListContext) -> ConvoResult<()> {
        self.put_context(
            LIST_CONTEXT,
            LIST_LIFESPAN,
            Some(serde_json::to_value(list)?),
        )
    }

    /// Replace any list with `list`, shown through `paging` (whole list by default)
    ///
    /// # Errors
    ///
    /// Returns `ConvoError::InvalidArgument` for an empty type and
    /// `ConvoError::Range` when `paging` does not fit the list.
    pub fn set_list(
        mut self,
        list_type: &str,
        list: Vec<Value>,
        paging: Option<Paging>,
    ) -> ConvoResult<Self> {
        if list_type.is_empty() {
            return Err(ConvoError::invalid_argument("list type is required"));
        }
        let mut context = ListContext::new(list_type, list, Paging::all());
        context.paging = context.checked_paging(paging.unwrap_or_default())?;
        tracing::debug!(
            list_type = %list_type,
            items = context.list.len(),
            start = context.paging.start,
            count = context.paging.count,
            "Setting list"
        );
        self.store_list(&context)?;
        Ok(self)
    }

    /// Swap the items of the current list, keeping its type, paging and
    /// selection. Paging or selection left outside the new bounds is reset.
    ///
    /// # Errors
    ///
    /// Returns `ConvoError::InvalidState` when there is no list.
    pub fn update_list(mut self, list: Vec<Value>) -> ConvoResult<Self> {
        let mut context = self.require_list()?;
        context.list = list;
        let len = context.len();
        if context.selected_index >= len {
            context.selected_index = -1;
        }
        if context.paging.count > len {
            context.paging.count = -1;
        }
        if len > 0 && context.paging.start >= len {
            context.paging.start = 0;
        }
        self.store_list(&context)?;
        Ok(self)
    }

    /// Clear the selection, then drop the list
    ///
    /// # Errors
    ///
    /// Returns `ConvoError::Serialization` when the stored contexts are malformed.
    pub fn clear_list(self) -> ConvoResult<Self> {
        let mut convo = self.clear_selection()?;
        convo.put_context(LIST_CONTEXT, 0, None)?;
        tracing::debug!("Cleared list");
        Ok(convo)
    }

    /// Whether a list exists, optionally of the given type
    #[must_use]
    pub fn has_list(&self, list_type: Option<&str>) -> bool {
        match self.get_list() {
            Ok(Some(list)) => list_type.map_or(true, |t| list.list_type == t),
            _ => false,
        }
    }

    /// Change the paging window. `None` shows the whole list.
    ///
    /// # Errors
    ///
    /// Returns `ConvoError::InvalidState` without a list and `ConvoError::Range`
    /// when the window does not fit.
    pub fn update_list_paging(mut self, paging: Option<PagingUpdate>) -> ConvoResult<Self> {
        let mut context = self.require_list()?;
        let requested = match paging {
            Some(update) => Paging::new(
                update.start.unwrap_or(context.paging.start),
                update.count.unwrap_or(context.paging.count),
            ),
            None => Paging::all(),
        };
        context.paging = context.checked_paging(requested)?;
        tracing::debug!(
            start = context.paging.start,
            count = context.paging.count,
            "Updated list paging"
        );
        self.store_list(&context)?;
        Ok(self)
    }

    /// Advance one page, wrapping to the start. `count` of 0 keeps the page
    /// size, negative shows the rest of the list.
    ///
    /// # Errors
    ///
    /// Returns `ConvoError::InvalidState` without a list and `ConvoError::Range`
    /// when `count` exceeds the list length.
    pub fn next_list_page(self, count: i64) -> ConvoResult<Self> {
        let paging = self.require_list()?.next_paging(count);
        self.update_list_paging(Some(paging.into()))
    }

    /// Go back one page, wrapping to the last page. `count` of 0 keeps the
    /// page size, negative shows the whole list.
    ///
    /// # Errors
    ///
    /// Returns `ConvoError::InvalidState` without a list and `ConvoError::Range`
    /// when `count` exceeds the list length.
    pub fn prev_list_page(self, count: i64) -> ConvoResult<Self> {
        let paging = self.require_list()?.prev_paging(count);
        self.update_list_paging(Some(paging.into()))
    }

    /// Run `f` with the visible page; no-op without a list
    #[must_use]
    pub fn for_list_page(self, f: impl FnOnce(Convo, ListPage) -> Convo) -> Self {
        match self.get_list() {
            Ok(Some(context)) => {
                let page = ListPage {
                    page: context.page().to_vec(),
                    list_type: context.list_type,
                    paging: context.paging,
                    list: context.list,
                };
                f(self, page)
            }
            Ok(None) => self,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring malformed list context");
                self
            }
        }
    }

    /// Select the item at absolute `index`. A negative index clears the list
    /// selection together with the generic selection.
    ///
    /// # Errors
    ///
    /// Returns `ConvoError::InvalidState` without a list and `ConvoError::Range`
    /// when `index` is past the end.
    pub fn select_from_list(mut self, index: i64) -> ConvoResult<Self> {
        let mut context = self.require_list()?;
        if index < 0 {
            context.selected_index = -1;
            self.store_list(&context)?;
            return self.clear_selection();
        }
        let item = usize::try_from(index)
            .ok()
            .and_then(|i| context.list.get(i))
            .cloned()
            .ok_or_else(|| {
                ConvoError::range(format!(
                    "index {index} is outside list of {}",
                    context.list.len()
                ))
            })?;
        context.selected_index = index;
        tracing::debug!(list_type = %context.list_type, index, "Selecting from list");
        self.store_list(&context)?;
        self.select(&context.list_type, item)
    }

    /// Select by position within the visible page
    ///
    /// # Errors
    ///
    /// Returns `ConvoError::InvalidArgument` for a negative index and
    /// `ConvoError::Range` when the absolute position is past the end.
    pub fn select_from_list_page(self, index: i64) -> ConvoResult<Self> {
        if index < 0 {
            return Err(ConvoError::invalid_argument(format!(
                "page index {index} is negative"
            )));
        }
        let context = self.require_list()?;
        let absolute = context.paging.start.checked_add(index).ok_or_else(|| {
            ConvoError::range(format!(
                "page index {index} is outside list of {}",
                context.list.len()
            ))
        })?;
        self.select_from_list(absolute)
    }

    /// Select the first item for which `test(type, item, query)` holds; no-op
    /// when nothing matches
    ///
    /// # Errors
    ///
    /// Returns `ConvoError::InvalidState` when there is no list.
    pub fn select_from_list_by_query(
        self,
        query: &str,
        test: impl Fn(&str, &Value, &str) -> bool,
    ) -> ConvoResult<Self> {
        let context = self.require_list()?;
        let found = context
            .list
            .iter()
            .position(|item| test(&context.list_type, item, query));
        match found.and_then(|index| i64::try_from(index).ok()) {
            Some(index) => self.select_from_list(index),
            None => Ok(self),
        }
    }

    /// Select the following item, wrapping to the first
    ///
    /// # Errors
    ///
    /// Returns `ConvoError::InvalidState` without a list and `ConvoError::Range`
    /// for an empty list.
    pub fn select_next_from_list(self) -> ConvoResult<Self> {
        let context = self.require_list()?;
        let len = context.len();
        if len == 0 {
            return Err(ConvoError::range("cannot step through an empty list"));
        }
        let next = if context.selected_index < 0 {
            0
        } else {
            (context.selected_index + 1) % len
        };
        self.select_from_list(next)
    }

    /// Select the preceding item, wrapping to the last
    ///
    /// # Errors
    ///
    /// Returns `ConvoError::InvalidState` without a list and `ConvoError::Range`
    /// for an empty list.
    pub fn select_prev_from_list(self) -> ConvoResult<Self> {
        let context = self.require_list()?;
        let len = context.len();
        if len == 0 {
            return Err(ConvoError::range("cannot step through an empty list"));
        }
        let prev = if context.selected_index < 0 {
            len - 1
        } else {
            (context.selected_index - 1).rem_euclid(len)
        };
        self.select_from_list(prev)
    }

    #[must_use]
    pub fn has_list_selection(&self) -> bool {
        matches!(self.get_list_selection(), Ok(Some(_)))
    }

    /// # Errors
    ///
    /// Returns `ConvoError::Serialization` when the stored list context is malformed.
    pub fn get_list_selection(&self) -> ConvoResult<Option<ListSelection>> {
        Ok(self.get_list()?.and_then(|context| {
            let item = context.selected()?.clone();
            Some(ListSelection {
                index: usize::try_from(context.selected_index).ok()?,
                list_type: context.list_type,
                item,
            })
        }))
    }

    /// Run `f` with the selected list item; no-op without one
    #[must_use]
    pub fn for_list_selection(self, f: impl FnOnce(Convo, ListSelection) -> Convo) -> Self {
        match self.get_list_selection() {
            Ok(Some(selection)) => f(self, selection),
            Ok(None) => self,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring malformed list context");
                self
            }
        }
    }
}
