//! Error taxonomy for the state layer.
//!
//! None of these are fatal: each is recovered locally, leaves the cached
//! state untouched and carries a message fit for a user-facing notification.

use thiserror::Error;

use crate::api::ApiError;

#[derive(Error, Debug)]
pub enum DeskError {
    /// Reading a list or the quantity snapshot failed; the last good copy is kept.
    #[error("Error loading {what}: {source}")]
    Fetch {
        what: &'static str,
        #[source]
        source: ApiError,
    },

    /// A caller-side guard failed before anything reached the network.
    #[error("{0}")]
    Validation(String),

    /// A create, update, delete or order call was rejected; local state is preserved.
    #[error("Error {action}: {source}")]
    Submission {
        action: String,
        #[source]
        source: ApiError,
    },

    /// The persisted cart blob could not be decoded.
    #[error("Stored cart is unreadable: {0}")]
    StorageCorruption(String),

    /// The owning view was closed before the operation finished.
    #[error("View closed")]
    Cancelled,
}

impl DeskError {
    pub fn fetch(what: &'static str, source: ApiError) -> Self {
        DeskError::Fetch { what, source }
    }

    pub fn submission(action: impl Into<String>, source: ApiError) -> Self {
        DeskError::Submission {
            action: action.into(),
            source,
        }
    }
}
