//! Best-effort fan-out of registry change events.

use crate::registry::domain::ChangeEvent;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{trace, warn};

/// Default number of events buffered per subscriber.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Publishes registry mutations to any number of subscribers.
///
/// Publishing never blocks. A subscriber that falls more than the channel
/// capacity behind loses the oldest events; order is preserved for what it
/// does receive.
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeNotifier {
    /// Creates a notifier buffering `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes one event to current subscribers.
    pub fn publish(&self, event: ChangeEvent) {
        if let Err(unsent) = self.sender.send(event) {
            trace!(service_id = %unsent.0.service_id, "no change subscribers");
        }
    }

    /// Opens a new subscription receiving events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> ChangeSubscription {
        ChangeSubscription {
            receiver: self.sender.subscribe(),
            missed: 0,
        }
    }

    /// Returns the number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

/// Receiving end of a [`ChangeNotifier`].
#[derive(Debug)]
pub struct ChangeSubscription {
    receiver: broadcast::Receiver<ChangeEvent>,
    missed: u64,
}

impl ChangeSubscription {
    /// Waits for the next event; `None` once the notifier is gone.
    ///
    /// Events dropped because this subscriber lagged are skipped and
    /// counted in [`Self::missed`].
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => self.record_lag(skipped),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Returns the next buffered event without waiting.
    pub fn try_next(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(skipped)) => self.record_lag(skipped),
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }

    /// Drains every buffered event.
    pub fn drain(&mut self) -> Vec<ChangeEvent> {
        std::iter::from_fn(|| self.try_next()).collect()
    }

    /// Returns how many events this subscriber lost to lag.
    #[must_use]
    pub const fn missed(&self) -> u64 {
        self.missed
    }

    fn record_lag(&mut self, skipped: u64) {
        self.missed = self.missed.saturating_add(skipped);
        warn!(skipped, "change subscriber lagged, oldest events dropped");
    }
}
