//! Orchestrator to presentation notifications.
//!
//! The workflow machine has exactly one subscriber. It receives a full
//! snapshot after every state change, and a separate quota signal when the
//! entitlement gate denies a submission.

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use super::entitlement::EntitlementSnapshot;
use super::workflow::WorkflowSnapshot;

/// Event pushed to the presentation layer.
#[derive(Debug, Clone)]
pub enum WorkflowEvent {
    /// The workflow state changed
    StateChanged(WorkflowSnapshot),
    /// A submission was refused by the entitlement gate; show the offer
    QuotaExceeded(EntitlementSnapshot),
}

impl WorkflowEvent {
    /// The snapshot carried by a state change, if any.
    pub fn snapshot(&self) -> Option<&WorkflowSnapshot> {
        match self {
            Self::StateChanged(snapshot) => Some(snapshot),
            Self::QuotaExceeded(_) => None,
        }
    }

    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, Self::QuotaExceeded(_))
    }
}

/// The single subscriber of a workflow machine.
pub trait WorkflowObserver: Send {
    fn on_event(&mut self, event: WorkflowEvent);
}

impl<F> WorkflowObserver for F
where
    F: FnMut(WorkflowEvent) + Send,
{
    fn on_event(&mut self, event: WorkflowEvent) {
        self(event);
    }
}

/// Observer that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl WorkflowObserver for NoopObserver {
    fn on_event(&mut self, _event: WorkflowEvent) {}
}

/// Observer that forwards events over an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    sender: UnboundedSender<WorkflowEvent>,
}

impl ChannelObserver {
    /// Create an observer and the receiver the presentation layer reads from.
    pub fn channel() -> (Self, UnboundedReceiver<WorkflowEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl WorkflowObserver for ChannelObserver {
    fn on_event(&mut self, event: WorkflowEvent) {
        if self.sender.send(event).is_err() {
            tracing::debug!("Presentation receiver dropped, event discarded");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{EntitlementGate, WorkflowState};

    fn quota_event() -> WorkflowEvent {
        WorkflowEvent::QuotaExceeded(EntitlementGate::new().snapshot())
    }

    #[test]
    fn test_closure_observer() {
        let mut count = 0;
        {
            let mut observer = |_event: WorkflowEvent| count += 1;
            observer.on_event(quota_event());
            observer.on_event(quota_event());
        }
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_channel_observer_forwards() {
        let (mut observer, mut receiver) = ChannelObserver::channel();
        observer.on_event(quota_event());

        let event = receiver.recv().await.unwrap();
        assert!(event.is_quota_exceeded());
        assert!(event.snapshot().is_none());
    }

    #[test]
    fn test_channel_observer_survives_dropped_receiver() {
        let (mut observer, receiver) = ChannelObserver::channel();
        drop(receiver);
        observer.on_event(quota_event());
    }

    #[test]
    fn test_state_changed_exposes_snapshot() {
        let snapshot = WorkflowSnapshot {
            state: WorkflowState::default(),
            entitlement: EntitlementGate::new().snapshot(),
            offer_visible: false,
        };
        let event = WorkflowEvent::StateChanged(snapshot);
        assert!(event.snapshot().is_some());
        assert!(!event.is_quota_exceeded());
    }
}
