use crate::models::DailyStats;
use parking_lot::Mutex;
use std::sync::mpsc::{self, Receiver, Sender};

/// Change notifications pushed to observers (a UI, a CLI watcher, tests).
#[derive(Debug, Clone, PartialEq)]
pub enum StatsEvent {
    StatsUpdated(DailyStats),
    LastKeyChanged(String),
}

/// Fan-out to any number of subscribers. Dropped receivers are pruned on the
/// next publish.
#[derive(Default)]
pub struct Notifier {
    subscribers: Mutex<Vec<Sender<StatsEvent>>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Receiver<StatsEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn publish(&self, event: StatsEvent) {
        let mut subscribers = self.subscribers.lock();
        if subscribers.is_empty() {
            return;
        }
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        if matches!(event, StatsEvent::StatsUpdated(_)) {
            crate::core::perf::inc_ui_emit();
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropped_subscribers_are_pruned() {
        let notifier = Notifier::new();
        let kept = notifier.subscribe();
        let dropped = notifier.subscribe();
        drop(dropped);

        notifier.publish(StatsEvent::LastKeyChanged("KeyA".into()));
        assert_eq!(notifier.subscriber_count(), 1);
        assert_eq!(
            kept.try_recv().expect("event"),
            StatsEvent::LastKeyChanged("KeyA".into())
        );
    }
}
