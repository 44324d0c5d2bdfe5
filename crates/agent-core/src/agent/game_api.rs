use super::action::TurnAction;
use super::frame::Frame;
use super::reasoning::BoxFuture;

/// Boundary the agent uses to read frames and submit actions.
///
/// The runner implements this over its control socket; tests use an in-memory fake.
pub trait GameApi: Send + Sync {
    /// Current frame without acting.
    fn observe<'a>(&'a self) -> BoxFuture<'a, anyhow::Result<Frame>>;

    /// Submits one action and returns the frame it produced.
    fn submit<'a>(&'a self, action: TurnAction) -> BoxFuture<'a, anyhow::Result<Frame>>;
}
