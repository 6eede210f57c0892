//! Thin data-access layer between the views and the remote collaborator.
//! Translates UI intents into table queries and normalizes every outcome into
//! `Result` values; no business logic lives here beyond parameter translation
//! and error-message normalization.

mod auth;
mod categories;
mod notes;

pub use auth::AuthService;
pub use categories::CategoriesService;
pub use notes::{DeleteOutcome, NoteFilters, NotesService};

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ServiceResult;

pub(crate) fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>) -> ServiceResult<Vec<T>> {
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(Into::into))
        .collect()
}

pub(crate) fn decode_row<T: DeserializeOwned>(row: Value) -> ServiceResult<T> {
    serde_json::from_value(row).map_err(Into::into)
}
