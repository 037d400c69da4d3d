//! Dialog phases

/// Phase of the keyword-gated dialog
///
/// The loop starts in [`Ready`](DialogState::Ready) and only ever advances
/// along the arrows below; [`Stop`](DialogState::Stop) is terminal.
///
/// ```text
/// Ready -> Keyword -> WaitCommand <-> Command
///   ^         |           |
///   +---------+-----------+  (keyword mismatch / idle timeout)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogState {
    /// Listening for any speech that could be the wake keyword
    Ready,

    /// Speech in progress, pending keyword verification at utterance end
    Keyword,

    /// Keyword accepted, waiting for the command to begin
    WaitCommand,

    /// Command speech in progress, audio is being captured
    Command,

    /// Shutdown requested, loop is winding down
    Stop,
}
