// Order book state for a single trading pair
// Maintains the latest full-snapshot book and derives the metrics fed to the
// cost models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::warn;

/// A single price level
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PriceLevel {
    pub price: f64,
    pub size: f64,
}

/// Decoded feed message: full-side snapshots for the sides present.
/// A side that is `None` was absent from the payload and leaves the
/// previous side untouched.
#[derive(Debug, Clone)]
pub struct BookUpdate {
    pub timestamp: String,
    pub exchange: String,
    pub symbol: String,
    pub bids: Option<Vec<PriceLevel>>,
    pub asks: Option<Vec<PriceLevel>>,
}

/// One immutable generation of book state.
///
/// Replaced wholesale on every update; readers holding an `Arc<BookState>`
/// keep a stable view while the store moves on.
#[derive(Debug, Clone)]
pub struct BookState {
    /// Sorted by price descending
    pub bids: Vec<PriceLevel>,
    /// Sorted by price ascending
    pub asks: Vec<PriceLevel>,
    pub timestamp: String,
    pub exchange: String,
    pub symbol: String,
    pub sequence: u64,
    pub received_at: DateTime<Utc>,
}

impl BookState {
    fn empty() -> Self {
        Self {
            bids: Vec::new(),
            asks: Vec::new(),
            timestamp: String::new(),
            exchange: String::new(),
            symbol: String::new(),
            sequence: 0,
            received_at: Utc::now(),
        }
    }

    pub fn best_bid(&self) -> Option<&PriceLevel> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&PriceLevel> {
        self.asks.first()
    }

    /// Midpoint of best bid/ask, unavailable when either side is empty
    pub fn mid_price(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid.price + ask.price) / 2.0),
            _ => None,
        }
    }

    /// Best ask minus best bid, unavailable when either side is empty
    pub fn spread(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask.price - bid.price),
            _ => None,
        }
    }

    /// Spread as a percentage of the mid price
    pub fn spread_pct(&self) -> Option<f64> {
        match (self.spread(), self.mid_price()) {
            (Some(spread), Some(mid)) if mid != 0.0 => Some(spread / mid * 100.0),
            _ => None,
        }
    }

    /// Total size in the top `levels` levels per side: (bid_depth, ask_depth).
    /// Sums whatever is present when a side has fewer levels.
    pub fn depth(&self, levels: usize) -> (f64, f64) {
        let bid_depth = self.bids.iter().take(levels).map(|l| l.size).sum();
        let ask_depth = self.asks.iter().take(levels).map(|l| l.size).sum();
        (bid_depth, ask_depth)
    }

    /// VWAP for `quantity` consumed from the bid side, best outward.
    ///
    /// When the side cannot fully fill the quantity the VWAP covers the
    /// quantity actually filled (a degraded fill, not an error). `None`
    /// only when nothing fills at all.
    pub fn bid_vwap(&self, quantity: f64) -> Option<f64> {
        Self::walk_vwap(self.bids.iter(), quantity)
    }

    /// VWAP for `quantity` consumed from the ask side, best outward.
    pub fn ask_vwap(&self, quantity: f64) -> Option<f64> {
        Self::walk_vwap(self.asks.iter(), quantity)
    }

    fn walk_vwap<'a, I>(levels: I, quantity: f64) -> Option<f64>
    where
        I: Iterator<Item = &'a PriceLevel>,
    {
        let mut remaining = quantity;
        let mut total_cost = 0.0;

        for level in levels {
            if remaining <= 0.0 {
                break;
            }
            let executed = remaining.min(level.size);
            total_cost += executed * level.price;
            remaining -= executed;
        }

        let filled = quantity - remaining;
        if filled > 0.0 {
            Some(total_cost / filled)
        } else {
            None
        }
    }

    /// Fraction of combined top-5 depth on the bid side.
    ///
    /// Neutral 0.5 when the combined depth is zero or the book is one-sided
    /// (a one-sided book carries no usable imbalance signal).
    pub fn imbalance(&self) -> f64 {
        let (bid_depth, ask_depth) = self.depth(5);
        let total = bid_depth + ask_depth;
        if total == 0.0 || bid_depth == 0.0 || ask_depth == 0.0 {
            return 0.5;
        }
        bid_depth / total
    }

    /// Best bid at or above best ask
    pub fn is_crossed(&self) -> bool {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => bid.price >= ask.price,
            _ => false,
        }
    }

    /// Top N levels per side for display: (bids, asks)
    pub fn top_levels(&self, n: usize) -> (Vec<PriceLevel>, Vec<PriceLevel>) {
        let bids = self.bids.iter().take(n).copied().collect();
        let asks = self.asks.iter().take(n).copied().collect();
        (bids, asks)
    }

    pub fn has_both_sides(&self) -> bool {
        !self.bids.is_empty() && !self.asks.is_empty()
    }
}

/// Holds the latest book generation for one symbol.
///
/// `replace` is the only mutation and is called solely by the feed path;
/// all reads go through the `Arc<BookState>` it hands out.
#[derive(Debug)]
pub struct OrderBookStore {
    state: Arc<BookState>,
    crossed_count: u64,
}

impl OrderBookStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(BookState::empty()),
            crossed_count: 0,
        }
    }

    /// Install a new book generation from a decoded feed message.
    ///
    /// Sides present in the update replace the prior side entirely and are
    /// re-sorted (stable, so equal prices keep their input order); absent
    /// sides carry over from the previous generation.
    pub fn replace(&mut self, update: BookUpdate) -> Arc<BookState> {
        let prior = &self.state;

        let mut bids = match update.bids {
            Some(bids) => bids,
            None => prior.bids.clone(),
        };
        let mut asks = match update.asks {
            Some(asks) => asks,
            None => prior.asks.clone(),
        };

        bids.sort_by(|a, b| b.price.partial_cmp(&a.price).unwrap_or(Ordering::Equal));
        asks.sort_by(|a, b| a.price.partial_cmp(&b.price).unwrap_or(Ordering::Equal));

        let state = Arc::new(BookState {
            bids,
            asks,
            timestamp: update.timestamp,
            exchange: update.exchange,
            symbol: update.symbol,
            sequence: prior.sequence + 1,
            received_at: Utc::now(),
        });

        if state.is_crossed() {
            self.crossed_count += 1;
            warn!(
                symbol = %state.symbol,
                best_bid = state.best_bid().map(|l| l.price).unwrap_or(0.0),
                best_ask = state.best_ask().map(|l| l.price).unwrap_or(0.0),
                "Crossed book received"
            );
        }

        self.state = Arc::clone(&state);
        state
    }

    /// Current book generation
    pub fn state(&self) -> Arc<BookState> {
        Arc::clone(&self.state)
    }

    /// How many crossed books have been accepted since start
    pub fn crossed_count(&self) -> u64 {
        self.crossed_count
    }
}

impl Default for OrderBookStore {
    fn default() -> Self {
        Self::new()
    }
}
