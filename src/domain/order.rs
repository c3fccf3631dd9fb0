//! Ladder order tracking and the post-fill cooldown window.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::time::Instant;

/// Lifecycle of a resting ladder order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Open,
    Filled,
    Cancelled,
}

/// A ladder order the venue accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedOrder {
    /// Id of the submission that created the order.
    pub order_id: String,
    /// Venue offer id, once learned from an offer listing.
    pub offer_id: Option<String>,
    pub bucket_index: u32,
    pub price: Decimal,
    pub size: Decimal,
    pub status: OrderStatus,
    pub placed_at: DateTime<Utc>,
}

impl PlacedOrder {
    pub fn open(order_id: String, bucket_index: u32, price: Decimal, size: Decimal) -> Self {
        Self {
            order_id,
            offer_id: None,
            bucket_index,
            price,
            size,
            status: OrderStatus::Open,
            placed_at: Utc::now(),
        }
    }

    /// Does a fill referencing `offer_id` / `transaction_hash` point at this order?
    fn is_referenced_by(&self, offer_id: Option<&str>, transaction_hash: Option<&str>) -> bool {
        let by_offer = matches!((self.offer_id.as_deref(), offer_id), (Some(a), Some(b)) if a == b);
        let by_tx = transaction_hash.is_some_and(|h| h == self.order_id);
        by_offer || by_tx
    }
}

/// The single live ladder for the account/pair.
#[derive(Debug, Default, Clone)]
pub struct LadderState {
    orders: Vec<PlacedOrder>,
}

impl LadderState {
    pub fn orders(&self) -> &[PlacedOrder] {
        &self.orders
    }

    pub fn open_orders(&self) -> impl Iterator<Item = &PlacedOrder> {
        self.orders.iter().filter(|o| o.status == OrderStatus::Open)
    }

    pub fn open_count(&self) -> usize {
        self.open_orders().count()
    }

    /// Mark every open order cancelled and forget the previous ladder.
    pub fn cancel_all(&mut self) -> usize {
        let mut cancelled = 0;
        for order in &mut self.orders {
            if order.status == OrderStatus::Open {
                order.status = OrderStatus::Cancelled;
                cancelled += 1;
            }
        }
        self.orders.retain(|o| o.status == OrderStatus::Open);
        cancelled
    }

    /// Track one order as soon as the venue accepted it.
    pub fn track(&mut self, order: PlacedOrder) {
        self.orders.push(order);
    }

    /// Open orders whose venue offer id is not known yet.
    pub fn unmatched_orders(&self) -> impl Iterator<Item = &PlacedOrder> {
        self.open_orders().filter(|o| o.offer_id.is_none())
    }

    /// Record an offer id learned from a venue listing.
    pub fn attach_offer_id(&mut self, order_id: &str, offer_id: String) {
        if let Some(order) = self.orders.iter_mut().find(|o| o.order_id == order_id) {
            order.offer_id = Some(offer_id);
        }
    }

    /// Transition the referenced open order to `Filled` and return it.
    pub fn mark_filled(
        &mut self,
        offer_id: Option<&str>,
        transaction_hash: Option<&str>,
    ) -> Option<PlacedOrder> {
        let order = self.orders.iter_mut().find(|o| {
            o.status == OrderStatus::Open && o.is_referenced_by(offer_id, transaction_hash)
        })?;
        order.status = OrderStatus::Filled;
        Some(order.clone())
    }
}

/// Suppression window started by a fill-triggered swap.
#[derive(Debug, Clone, Copy)]
pub struct CooldownWindow {
    pub started_at: Instant,
    pub duration: Duration,
}

impl CooldownWindow {
    pub fn start(duration: Duration) -> Self {
        Self {
            started_at: Instant::now(),
            duration,
        }
    }

    /// Active strictly before `started_at + duration`.
    pub fn is_active_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.started_at) < self.duration
    }

    pub fn is_active(&self) -> bool {
        self.is_active_at(Instant::now())
    }

    pub fn remaining(&self) -> Duration {
        self.duration
            .saturating_sub(Instant::now().saturating_duration_since(self.started_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ladder() -> LadderState {
        let mut state = LadderState::default();
        state.track(PlacedOrder::open("tx1".into(), 1, dec!(1.4925), dec!(0.05)));
        state.track(PlacedOrder::open("tx2".into(), 2, dec!(1.485), dec!(0.05)));
        state
    }

    #[test]
    fn test_fill_by_transaction_hash() {
        let mut state = ladder();
        let filled = state.mark_filled(None, Some("tx2")).unwrap();
        assert_eq!(filled.bucket_index, 2);
        assert_eq!(filled.status, OrderStatus::Filled);
        assert_eq!(state.open_count(), 1);

        // Second fill for the same order is not re-applied.
        assert!(state.mark_filled(None, Some("tx2")).is_none());
    }

    #[test]
    fn test_fill_by_offer_id() {
        let mut state = ladder();
        state.attach_offer_id("tx1", "9001".into());
        let filled = state.mark_filled(Some("9001"), None).unwrap();
        assert_eq!(filled.bucket_index, 1);
        assert!(state.mark_filled(Some("unknown"), None).is_none());
    }

    #[test]
    fn test_cancel_all_clears_open_orders() {
        let mut state = ladder();
        assert_eq!(state.cancel_all(), 2);
        assert_eq!(state.open_count(), 0);
        assert!(state.orders().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_boundary() {
        let window = CooldownWindow::start(Duration::from_millis(10_000));
        assert!(window.is_active());

        tokio::time::advance(Duration::from_millis(9_999)).await;
        assert!(window.is_active());

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(!window.is_active());
        assert_eq!(window.remaining(), Duration::ZERO);
    }
}
