//! Run progress bus.
//!
//! One `LocalExecutor` owns the publishing side. Subscribers attach before
//! `execute` is called; a subscriber that attaches mid-run only sees the
//! events published after it joined. Dropping every clone of the bus closes
//! the channel, which is how the CLI renderer learns the run is over when
//! `RunFinished` was never sent (pre-flight failures).

use jobflow_types::event::ExecutorEvent;
use tokio::sync::broadcast;

/// Default channel capacity, enough for the events of a few hundred jobs.
pub const DEFAULT_CAPACITY: usize = 1024;

#[derive(Clone, Debug)]
pub struct EventBus {
    sender: broadcast::Sender<ExecutorEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ExecutorEvent> {
        self.sender.subscribe()
    }

    /// Send to every current subscriber. Events with no audience are dropped.
    pub fn publish(&self, event: ExecutorEvent) {
        tracing::trace!(
            run_id = %event.run_id(),
            kind = event.kind(),
            job = event.job().map(|j| j.as_str()),
            "executor event"
        );
        if self.sender.send(event).is_err() {
            tracing::trace!("no progress subscribers");
        }
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Everything already buffered for `rx`, oldest first.
///
/// Stops at the first gap; lagged events are gone and are not reported.
pub fn drain(rx: &mut broadcast::Receiver<ExecutorEvent>) -> Vec<ExecutorEvent> {
    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => events.push(event),
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "subscriber lagged while draining");
            }
            Err(_) => break,
        }
    }
    events
}

#[cfg(test)]
mod tests {
    use jobflow_types::job::JobId;
    use jobflow_types::run::SkipReason;
    use uuid::Uuid;

    use super::*;

    fn skipped(job: &str) -> ExecutorEvent {
        ExecutorEvent::JobSkipped {
            run_id: Uuid::nil(),
            job: JobId::from(job),
            reason: SkipReason::ConditionFalse,
        }
    }

    fn jobs(events: &[ExecutorEvent]) -> Vec<&str> {
        events.iter().filter_map(|e| e.job()).map(|j| j.as_str()).collect()
    }

    #[tokio::test]
    async fn every_subscriber_sees_each_event() {
        let bus = EventBus::new(16);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        bus.publish(skipped("deploy"));

        assert_eq!(first.recv().await.unwrap().kind(), "job_skipped");
        assert_eq!(second.recv().await.unwrap().job().unwrap().as_str(), "deploy");
    }

    #[test]
    fn late_subscriber_misses_earlier_events() {
        let bus = EventBus::default();
        bus.publish(skipped("lint"));
        assert_eq!(bus.receiver_count(), 0);

        let mut rx = bus.subscribe();
        bus.publish(skipped("test"));
        assert_eq!(jobs(&drain(&mut rx)), vec!["test"]);
    }

    #[test]
    fn drain_skips_over_lag() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();
        for job in ["a", "b", "c", "d"] {
            bus.publish(skipped(job));
        }
        assert_eq!(jobs(&drain(&mut rx)), vec!["c", "d"]);
    }

    #[test]
    fn clones_publish_into_one_channel() {
        let bus = EventBus::new(8);
        let producer = bus.clone();
        let mut rx = bus.subscribe();

        producer.publish(skipped("x"));
        drop(producer);
        drop(bus);

        assert_eq!(drain(&mut rx).len(), 1);
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Closed)
        ));
    }
}
