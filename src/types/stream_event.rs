use crate::types::{StopReason, Usage};

/// A decoded server-sent event from a streaming completion.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A piece of generated text.
    Delta(String),

    /// Token accounting for the whole request.
    Usage(Usage),

    /// The model finished its choice.  `None` for finish reasons mdchat does not know.
    Finished(Option<StopReason>),

    /// The `[DONE]` sentinel.  Nothing follows it.
    Done,
}
