//! Per-transaction live updates.
//!
//! Every successful cart mutation is published on a broadcast channel keyed by the
//! transaction ID. Subscribers only ever see events for the transaction they asked for.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::broadcast;

use warung_core::{Cart, TransactionId};

/// Buffered events per subscriber before it starts lagging.
const CHANNEL_CAPACITY: usize = 64;

/// What happened to the cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CartEventKind {
    /// Cart created.
    Opened,
    /// Product added or its line incremented.
    ItemAdded,
    /// Line quantity set.
    ItemUpdated,
    /// Line removed.
    ItemRemoved,
    /// Cart completed and stock adjusted.
    Finalized,
    /// Commentary attached.
    Commentary,
    /// Cart deleted while pending. Last event on the channel.
    Discarded,
}

/// A published cart change.
#[derive(Debug, Clone, Serialize)]
pub struct CartEvent {
    /// What happened.
    pub kind: CartEventKind,
    /// The affected transaction.
    pub transaction_id: TransactionId,
    /// The authoritative aggregate after the change; absent once discarded.
    pub cart: Option<Cart>,
}

impl CartEvent {
    /// Event carrying the updated cart.
    #[must_use]
    pub fn new(kind: CartEventKind, cart: &Cart) -> Self {
        Self {
            kind,
            transaction_id: cart.id(),
            cart: Some(cart.clone()),
        }
    }

    /// Event for a deleted cart.
    #[must_use]
    pub fn discarded(transaction_id: TransactionId) -> Self {
        Self {
            kind: CartEventKind::Discarded,
            transaction_id,
            cart: None,
        }
    }
}

/// Registry of per-transaction broadcast channels, created on first subscription.
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    channels: Arc<Mutex<HashMap<TransactionId, broadcast::Sender<CartEvent>>>>,
}

impl EventBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn channels(&self) -> MutexGuard<'_, HashMap<TransactionId, broadcast::Sender<CartEvent>>> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Subscribe to one transaction's events.
    ///
    /// Channels whose subscribers have all gone away are dropped first.
    #[must_use]
    pub fn subscribe(&self, transaction_id: TransactionId) -> broadcast::Receiver<CartEvent> {
        let mut channels = self.channels();
        channels.retain(|_, sender| sender.receiver_count() > 0);
        channels
            .entry(transaction_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Publish an event. Returns how many subscribers received it.
    ///
    /// Channels without listeners are dropped; a discard event closes the channel.
    pub fn publish(&self, event: CartEvent) -> usize {
        let mut channels = self.channels();
        let id = event.transaction_id;
        let closing = event.kind == CartEventKind::Discarded;

        let delivered = match channels.get(&id) {
            Some(sender) => sender.send(event).unwrap_or(0),
            None => 0,
        };

        if closing || delivered == 0 {
            channels.remove(&id);
        }
        delivered
    }

    /// Drop the channel for `transaction_id` once nobody listens on it.
    pub fn release(&self, transaction_id: TransactionId) {
        let mut channels = self.channels();
        if channels
            .get(&transaction_id)
            .is_some_and(|sender| sender.receiver_count() == 0)
        {
            channels.remove(&transaction_id);
        }
    }

    /// Number of transactions with live subscribers.
    #[must_use]
    pub fn active_channels(&self) -> usize {
        self.channels().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warung_core::Direction;

    #[tokio::test]
    async fn subscribers_only_see_their_transaction() {
        let bus = EventBus::new();
        let mine = Cart::open(Direction::Out);
        let other = Cart::open(Direction::Out);

        let mut rx = bus.subscribe(mine.id());
        let mut other_rx = bus.subscribe(other.id());

        assert_eq!(bus.publish(CartEvent::new(CartEventKind::ItemAdded, &mine)), 1);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind, CartEventKind::ItemAdded);
        assert_eq!(event.transaction_id, mine.id());
        assert!(other_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn discard_closes_the_channel() {
        let bus = EventBus::new();
        let cart = Cart::open(Direction::Out);
        let mut rx = bus.subscribe(cart.id());

        bus.publish(CartEvent::discarded(cart.id()));
        assert_eq!(bus.active_channels(), 0);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind, CartEventKind::Discarded);
        assert!(event.cart.is_none());
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Closed)
        ));
    }

    #[test]
    fn publish_without_subscribers_is_a_no_op() {
        let bus = EventBus::new();
        let cart = Cart::open(Direction::In);
        assert_eq!(bus.publish(CartEvent::new(CartEventKind::Opened, &cart)), 0);
        assert_eq!(bus.active_channels(), 0);
    }

    #[test]
    fn abandoned_channels_are_dropped() {
        let bus = EventBus::new();
        let first = Cart::open(Direction::Out);
        let second = Cart::open(Direction::Out);

        drop(bus.subscribe(first.id()));
        assert_eq!(bus.active_channels(), 1);

        let _rx = bus.subscribe(second.id());
        assert_eq!(bus.active_channels(), 1);

        let rx = bus.subscribe(first.id());
        bus.release(first.id());
        assert_eq!(bus.active_channels(), 2);

        drop(rx);
        bus.release(first.id());
        assert_eq!(bus.active_channels(), 1);
    }

    #[test]
    fn event_serializes_snake_case_kind() {
        let cart = Cart::open(Direction::Out);
        let json = serde_json::to_value(CartEvent::new(CartEventKind::ItemAdded, &cart)).unwrap();
        assert_eq!(json["kind"], "item_added");
        assert_eq!(json["cart"]["type"], "OUT");
    }
}
