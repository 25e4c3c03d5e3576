use thiserror::Error;

/// Failures the realtime pipeline recovers from locally.
///
/// None of these abort a session: transport failures feed the reconnect
/// policy, frame failures drop a single frame, and duplicate starts are
/// ignored.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("link rejected by {url}: {reason}")]
    TransportRejected { url: String, reason: String },
    #[error("link dropped: {reason}")]
    TransportDropped { reason: String },
    #[error("parse error: {0}")]
    FrameUnparseable(String),
    #[error("unrecognized frame: {0}")]
    FrameUnrecognized(String),
    #[error("start requested while a session is already starting or active")]
    DuplicateStart,
}
