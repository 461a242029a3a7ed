//! Fan-out hook for observability plugins, grounded on the `async_trait`
//! pattern the teacher uses for its pluggable executor/communication traits
//! (`protocol/communication.rs::CommandExecutor`). Default implementation is
//! a no-op; plugins that do heavy work are expected to dispatch internally
//! rather than block the caller.

use async_trait::async_trait;

use crate::events::EventKind;
use crate::keys::CommandKey;
use crate::properties::IsolationStrategy;

/// Observes command outcomes as they happen. Implementations must be safe
/// under concurrent invocation from many worker threads at once.
#[async_trait]
pub trait EventNotifier: Send + Sync {
    /// Called once per marked event, after the corresponding counter has
    /// already been incremented (§4.7: counter increment precedes notification).
    async fn mark_event(&self, kind: EventKind, command_key: &CommandKey);

    /// Called once per terminal command outcome with the full set of events
    /// raised during that invocation.
    async fn mark_command_execution(
        &self,
        command_key: &CommandKey,
        isolation_strategy: IsolationStrategy,
        duration_ms: i64,
        kinds: &[EventKind],
    );
}

/// Default no-op notifier.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventNotifier;

#[async_trait]
impl EventNotifier for NoopEventNotifier {
    async fn mark_event(&self, _kind: EventKind, _command_key: &CommandKey) {}

    async fn mark_command_execution(
        &self,
        _command_key: &CommandKey,
        _isolation_strategy: IsolationStrategy,
        _duration_ms: i64,
        _kinds: &[EventKind],
    ) {
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_notifier_accepts_any_event_without_panicking() {
        let notifier = NoopEventNotifier;
        let key = CommandKey::new("GetUser");
        notifier
            .mark_event(EventKind::Counter(crate::events::CounterKind::Success), &key)
            .await;
        notifier
            .mark_command_execution(&key, IsolationStrategy::Thread, 5, &[])
            .await;
    }
}
