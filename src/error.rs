use thiserror::Error;

/// Failure taxonomy for the blocking engine.
///
/// Nothing here is fatal: an undecodable body classifies as "allow",
/// a failed store write is abandoned, a broadcast without listeners is
/// ignored, and a classification failure skips a single item.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Request body could not be decoded to text. Swallowed by the
    /// classifier and treated as "no match".
    #[error("request body is not valid text: {0}")]
    Decode(#[from] std::str::Utf8Error),

    /// Durable store unavailable or a write failed. The write is
    /// abandoned; the next successful mutation carries its own delta.
    #[error("durable store failure: {0}")]
    Persistence(String),

    /// A broadcast had no listener attached.
    #[error("no listener for broadcast")]
    Delivery,

    /// A single candidate had an unexpected shape. Isolated to the
    /// offending item; sibling items keep processing.
    #[error("could not classify {target}: {reason}")]
    Classification { target: String, reason: String },
}

impl EngineError {
    pub fn classification(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Classification {
            target: target.into(),
            reason: reason.into(),
        }
    }
}
