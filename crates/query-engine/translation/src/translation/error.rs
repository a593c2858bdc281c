//! Errors for translation.

use std::time::Duration;

use thiserror::Error;

/// A failure of the language model call itself.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("could not reach the language model: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("the language model answered with status {status}")]
    Status { status: u16, body: String },
    #[error("the language model returned no text")]
    EmptyReply,
    #[error("{0}")]
    Other(String),
}

/// Why a question could not be turned into a candidate query.
///
/// Every variant is reported to the caller as `translation_unavailable`.
#[derive(Debug, Error)]
pub enum TranslationError {
    #[error("the question is empty")]
    EmptyQuestion,
    #[error("the language model did not answer within {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("the reply did not contain a query")]
    NoQueryInReply,
}
