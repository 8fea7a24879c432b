//! Error taxonomy for the scoring pipeline.
//!
//! Every failure that can end a scoring run maps onto one [`Error`] variant.
//! Variants carry enough context (channel names, group index, epoch range)
//! to diagnose a failed recording without re-running it.
use std::ops::Range;

/// Boxed error returned by a scoring collaborator.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required input or setting is missing or contradictory.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// No channel survived classification and all fallback tiers.
    #[error("no usable channels among {channels:?}")]
    NoUsableChannels { channels: Vec<String> },

    /// The in-memory recording itself is malformed.
    #[error("invalid recording: {0}")]
    InvalidRecording(String),

    /// Conditioned signal does not fit what the scorer declares.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// The scoring collaborator failed or returned malformed output.
    #[error("scoring failed for group {group} {channels:?}, epochs {epochs:?}: {source}")]
    Scoring {
        group: usize,
        channels: Vec<String>,
        epochs: Range<usize>,
        #[source]
        source: BoxError,
    },
}

impl Error {
    pub(crate) fn scoring(
        group: usize,
        channels: &[String],
        epochs: Range<usize>,
        source: impl Into<BoxError>,
    ) -> Self {
        Error::Scoring {
            group,
            channels: channels.to_vec(),
            epochs,
            source: source.into(),
        }
    }
}
