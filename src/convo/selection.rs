//! Generic single-item selection slot
//!
//! The selection lives in the `selection` context. A companion
//! `selected_<type>` context acts as a flag the platform can route on.

use super::Convo;
use crate::error::{ConvoError, ConvoResult};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const SELECTION_CONTEXT: &str = "selection";
pub const SELECTION_LIFESPAN: u32 = 5;

/// A selected item and the type it was selected as
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    #[serde(rename = "type")]
    pub selection_type: String,
    pub item: Value,
}

fn marker(selection_type: &str) -> String {
    format!("selected_{selection_type}")
}

impl Convo {
    /// Select `item` as `selection_type`, replacing any previous selection
    ///
    /// # Errors
    ///
    /// Returns `ConvoError::InvalidArgument` for an empty selection type.
    pub fn select(mut self, selection_type: &str, item: Value) -> ConvoResult<Self> {
        if selection_type.is_empty() {
            return Err(ConvoError::invalid_argument("selection type is required"));
        }
        if let Some(previous) = self.get_selection()? {
            if previous.selection_type != selection_type {
                self.put_context(&marker(&previous.selection_type), 0, None)?;
            }
        }
        let selection = Selection {
            selection_type: selection_type.to_string(),
            item,
        };
        tracing::debug!(selection_type = %selection_type, "Selecting item");
        self.put_context(
            SELECTION_CONTEXT,
            SELECTION_LIFESPAN,
            Some(serde_json::to_value(&selection)?),
        )?;
        self.put_context(&marker(selection_type), SELECTION_LIFESPAN, Some(json!({})))?;
        Ok(self)
    }

    /// # Errors
    ///
    /// Returns `ConvoError::Serialization` when the stored selection is malformed.
    pub fn get_selection(&self) -> ConvoResult<Option<Selection>> {
        self.get_context(SELECTION_CONTEXT)?
            .map(serde_json::from_value)
            .transpose()
            .map_err(Into::into)
    }

    /// Whether a selection exists, optionally of the given type
    #[must_use]
    pub fn has_selection(&self, selection_type: Option<&str>) -> bool {
        match self.get_selection() {
            Ok(Some(selection)) => selection_type.map_or(true, |t| selection.selection_type == t),
            _ => false,
        }
    }

    /// Clear the selection and its marker
    ///
    /// # Errors
    ///
    /// Returns `ConvoError::Serialization` when the stored selection is malformed.
    pub fn clear_selection(mut self) -> ConvoResult<Self> {
        if let Some(previous) = self.get_selection()? {
            self.put_context(&marker(&previous.selection_type), 0, None)?;
        }
        self.put_context(SELECTION_CONTEXT, 0, None)?;
        Ok(self)
    }

    /// Run `f` with the current selection; no-op without one
    #[must_use]
    pub fn for_selection(self, f: impl FnOnce(Convo, Selection) -> Convo) -> Self {
        match self.get_selection() {
            Ok(Some(selection)) => f(self, selection),
            Ok(None) => self,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring malformed selection context");
                self
            }
        }
    }
}
