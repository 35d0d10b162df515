use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

use crate::errors::{WalletError, WalletResult};

/// Default buffer of undelivered messages per subscriber.
pub const DEFAULT_BUS_CAPACITY: usize = 256;

/// Typed publish/subscribe channel.
///
/// Subscribing hands out a [`Subscription`]; dropping it unsubscribes.
#[derive(Debug)]
pub struct EventBus<T: Clone> {
    sender: broadcast::Sender<T>,
    published: Arc<AtomicU64>,
}

impl<T: Clone> Clone for EventBus<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            published: Arc::clone(&self.published),
        }
    }
}

impl<T: Clone + Send + 'static> EventBus<T> {
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            published: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Delivers to every live subscriber. Publishing with nobody listening is not an error.
    pub fn publish(&self, message: T) {
        self.published.fetch_add(1, Ordering::Relaxed);
        if self.sender.send(message).is_err() {
            log::trace!("published message with no subscribers");
        }
    }

    pub fn subscribe(&self) -> Subscription<T> {
        Subscription {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

impl<T: Clone + Send + 'static> Default for EventBus<T> {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}

/// A live registration on an [`EventBus`].
#[derive(Debug)]
pub struct Subscription<T: Clone> {
    receiver: broadcast::Receiver<T>,
}

impl<T: Clone> Subscription<T> {
    /// Next message. Messages lost to lag are logged and skipped.
    pub async fn recv(&mut self) -> WalletResult<T> {
        loop {
            match self.receiver.recv().await {
                Ok(message) => return Ok(message),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log::warn!("subscriber lagged, skipped {} messages", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return Err(WalletError::ChannelClosed),
            }
        }
    }

    /// Non-blocking variant; `None` when nothing is queued.
    pub fn try_recv(&mut self) -> WalletResult<Option<T>> {
        loop {
            match self.receiver.try_recv() {
                Ok(message) => return Ok(Some(message)),
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    log::warn!("subscriber lagged, skipped {} messages", skipped);
                }
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(WalletError::ChannelClosed)
                }
            }
        }
    }

    /// Everything currently queued.
    pub fn drain(&mut self) -> WalletResult<Vec<T>> {
        let mut drained = Vec::new();
        while let Some(message) = self.try_recv()? {
            drained.push(message);
        }
        Ok(drained)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_in_order() {
        let bus = EventBus::new(8);
        let mut sub = bus.subscribe();
        bus.publish(1u32);
        bus.publish(2u32);
        assert_eq!(sub.recv().await.unwrap(), 1);
        assert_eq!(sub.recv().await.unwrap(), 2);
        assert_eq!(bus.published_count(), 2);
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let bus: EventBus<u32> = EventBus::default();
        let first = bus.subscribe();
        let second = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
        drop(first);
        assert_eq!(bus.subscriber_count(), 1);
        drop(second);
        assert_eq!(bus.subscriber_count(), 0);
        bus.publish(7);
    }

    #[test]
    fn lagging_subscriber_skips_oldest() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();
        for value in 0..5u32 {
            bus.publish(value);
        }
        assert_eq!(sub.drain().unwrap(), vec![3, 4]);
    }

    #[test]
    fn closed_bus_reports_channel_closed() {
        let bus: EventBus<u32> = EventBus::new(2);
        let mut sub = bus.subscribe();
        drop(bus);
        assert_eq!(sub.try_recv().unwrap_err(), WalletError::ChannelClosed);
    }
}
