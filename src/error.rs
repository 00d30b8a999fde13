//! Typed errors for failures caused by the caller rather than a collaborator.
//!
//! Everything else in the crate is plain `anyhow`. These variants travel
//! inside an [`anyhow::Error`] and are recovered with `downcast_ref`, which
//! lets the HTTP layer tell a bad request apart from an upstream failure.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RagError {
    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("k must be >= 1")]
    ZeroK,

    /// `kind` is the config section name (`embedding`, `chat`).
    #[error("{label} provider is disabled. Set [{kind}] provider in config.")]
    ProviderDisabled {
        label: &'static str,
        kind: &'static str,
    },
}

impl RagError {
    /// Whether `err` (or anything in its context chain) is a [`RagError`].
    pub fn find(err: &anyhow::Error) -> Option<&RagError> {
        err.chain().find_map(|e| e.downcast_ref::<RagError>())
    }
}
