use serde::{Deserialize, Serialize};
use strm_schemas::StreamKind;
use thiserror::Error;

use crate::registry::LeaseError;

/// Failure reading facts from the backing store.
///
/// `NotFound` is an ordinary answer and becomes a validation outcome.
/// Anything else aborts the pass unmodified so the caller can retry it.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum FactsError {
    #[error("not found")]
    NotFound,
    #[error("backing store unavailable: {0}")]
    Unavailable(String),
}

/// Why a record's upsert or deletion is not allowed.
#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum ValidationError {
    #[error("stream '{stream}' not found")]
    NotFound { stream: String },

    #[error("stream '{stream}': lifecycle type ilm is not supported in this deployment")]
    RestrictedLifecycle { stream: String },

    #[error("cannot create classic stream '{stream}' due to missing backing data stream")]
    MissingDataStream { stream: String },

    #[error("cannot create stream '{stream}' due to existing index")]
    ExistingIndex { stream: String },

    #[error("root stream '{stream}' cannot inherit its lifecycle")]
    InheritOnRoot { stream: String },

    #[error("root stream '{stream}' cannot be deleted")]
    RootDeletion { stream: String },

    #[error("stream '{stream}' routes to '{destination}', which is not a direct child")]
    InvalidRoutingDestination { stream: String, destination: String },

    #[error("stream '{stream}' routes to '{destination}' more than once")]
    DuplicateRoutingDestination { stream: String, destination: String },

    #[error("parent '{parent}' of wired stream '{stream}' is not a wired stream")]
    InvalidParent { stream: String, parent: String },
}

/// Error taxonomy of a reconciliation pass.
///
/// `TypeMismatch`, `ValidationFailure` and `CascadeRejected` withdraw one
/// requested change (with its cascades) and the pass continues; they are
/// reported in [`crate::PassOutcome::rejected`].
/// The remaining variants abort the whole pass.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("cannot change stream '{name}' from {from} to {to}")]
    TypeMismatch {
        name: String,
        from: StreamKind,
        to: StreamKind,
    },

    #[error("stream '{name}' failed validation: {}", join_errors(.errors))]
    ValidationFailure {
        name: String,
        errors: Vec<ValidationError>,
    },

    /// The change itself was fine but a change it cascaded into was
    /// rejected, so the whole group was withdrawn from the pass.
    #[error("change to stream '{name}' withdrawn: cascaded change to '{cause}' was rejected")]
    CascadeRejected { name: String, cause: String },

    #[error("unexpected starting state for stream '{name}': {detail}")]
    UnexpectedStartingState { name: String, detail: String },

    #[error("backing store read failed for stream '{name}'")]
    BackingStoreRead {
        name: String,
        #[source]
        source: FactsError,
    },

    #[error(transparent)]
    InFlight(#[from] LeaseError),
}

impl ReconcileError {
    /// `true` for errors that abort the pass instead of rejecting one record.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            ReconcileError::TypeMismatch { .. }
                | ReconcileError::ValidationFailure { .. }
                | ReconcileError::CascadeRejected { .. }
        )
    }

    pub(crate) fn read_failure(name: &str, source: FactsError) -> Self {
        ReconcileError::BackingStoreRead {
            name: name.to_string(),
            source,
        }
    }
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
