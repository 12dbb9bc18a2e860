//! # ledger — paper book for one long-only instrument
//!
//! Mirrors the pipeline's own FLAT/LONG machine but is the authoritative
//! side: its `total_pnl` and position are what the dashboard ends up showing.
//! Intents that don't fit the current phase (BUY while LONG, SELL while FLAT)
//! are ignored and produce no confirmation.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    #[serde(alias = "buy")]
    Buy,
    #[serde(alias = "sell")]
    Sell,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy  => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Inbound `{action, price, time}` line.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Intent {
    pub action: Side,
    pub price:  f64,
    #[serde(default = "now_label")]
    pub time:   String,
}

fn now_label() -> String {
    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Outbound `{action, price, time, position, total_pnl, pnl?}` line.
/// `position` is sent in unit form: 0 = flat, 1 = long.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Confirmation {
    pub action:    Side,
    pub price:     f64,
    pub time:      String,
    pub position:  u8,
    pub total_pnl: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pnl:       Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub time:   String,
    pub action: Side,
    pub price:  f64,
    pub pnl:    Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Holding {
    Flat,
    Long { entry_price: f64 },
}

#[derive(Debug)]
pub struct Ledger {
    holding:   Holding,
    cash:      f64,
    total_pnl: f64,
    fills:     Vec<Fill>,
}

impl Ledger {
    pub fn new(starting_cash: f64) -> Self {
        Self {
            holding:   Holding::Flat,
            cash:      starting_cash,
            total_pnl: 0.0,
            fills:     Vec::new(),
        }
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn total_pnl(&self) -> f64 {
        self.total_pnl
    }

    pub fn fills(&self) -> &[Fill] {
        &self.fills
    }

    pub fn position_units(&self) -> u8 {
        match self.holding {
            Holding::Flat => 0,
            Holding::Long { .. } => 1,
        }
    }

    /// Applies one intent.  `None` = ignored, nothing to confirm.
    pub fn apply(&mut self, intent: Intent) -> Option<Confirmation> {
        let pnl = match (self.holding, intent.action) {
            (Holding::Flat, Side::Buy) => {
                self.holding = Holding::Long { entry_price: intent.price };
                info!(time = %intent.time, price = intent.price, "🟢 BUY executed — position LONG");
                None
            }
            (Holding::Long { entry_price }, Side::Sell) => {
                let pnl = intent.price - entry_price;
                self.total_pnl += pnl;
                self.cash += pnl;
                self.holding = Holding::Flat;
                info!(
                    time      = %intent.time,
                    price     = intent.price,
                    pnl,
                    total_pnl = self.total_pnl,
                    cash      = self.cash,
                    "{} SELL executed",
                    if pnl > 0.0 { "✅" } else { "❌" }
                );
                Some(pnl)
            }
            (holding, action) => {
                warn!(
                    time     = %intent.time,
                    %action,
                    price    = intent.price,
                    position = if matches!(holding, Holding::Flat) { "FLAT" } else { "LONG" },
                    "⚠️  Ignored out-of-phase intent"
                );
                return None;
            }
        };

        self.fills.push(Fill {
            time:   intent.time.clone(),
            action: intent.action,
            price:  intent.price,
            pnl,
        });

        Some(Confirmation {
            action:    intent.action,
            price:     intent.price,
            time:      intent.time,
            position:  self.position_units(),
            total_pnl: self.total_pnl,
            pnl,
        })
    }

    /// End-of-session summary in the log.
    pub fn log_summary(&self) {
        info!(
            trades    = self.fills.len(),
            total_pnl = self.total_pnl,
            cash      = self.cash,
            position  = if self.position_units() == 1 { "LONG" } else { "FLAT" },
            "📊 Session summary"
        );
        for fill in &self.fills {
            info!(time = %fill.time, action = %fill.action, price = fill.price, pnl = ?fill.pnl, "  fill");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intent(action: Side, price: f64) -> Intent {
        Intent { action, price, time: "2024-05-01 10:00:00".into() }
    }

    #[test]
    fn test_round_trip_updates_book() {
        let mut ledger = Ledger::new(100_000.0);

        let buy = ledger.apply(intent(Side::Buy, 95.0)).unwrap();
        assert_eq!(buy.position, 1);
        assert_eq!(buy.pnl, None);
        assert_eq!(buy.total_pnl, 0.0);

        let sell = ledger.apply(intent(Side::Sell, 100.0)).unwrap();
        assert_eq!(sell.position, 0);
        assert_eq!(sell.pnl, Some(5.0));
        assert_eq!(sell.total_pnl, 5.0);
        assert_eq!(ledger.cash(), 100_005.0);
        assert_eq!(ledger.fills().len(), 2);
    }

    #[test]
    fn test_out_of_phase_intents_ignored() {
        let mut ledger = Ledger::new(1_000.0);
        assert!(ledger.apply(intent(Side::Sell, 10.0)).is_none());

        ledger.apply(intent(Side::Buy, 10.0)).unwrap();
        assert!(ledger.apply(intent(Side::Buy, 12.0)).is_none());
        assert_eq!(ledger.fills().len(), 1);
        assert_eq!(ledger.position_units(), 1);
    }

    #[test]
    fn test_confirmation_wire_shape() {
        let mut ledger = Ledger::new(0.0);
        let buy = ledger.apply(intent(Side::Buy, 1.5)).unwrap();
        let json = serde_json::to_value(&buy).unwrap();
        assert_eq!(json["action"], "BUY");
        assert_eq!(json["position"], 1);
        assert!(json.get("pnl").is_none());
    }

    #[test]
    fn test_intent_without_time_gets_one() {
        let parsed: Intent = serde_json::from_str(r#"{"action":"SELL","price":3.0}"#).unwrap();
        assert_eq!(parsed.action, Side::Sell);
        assert!(!parsed.time.is_empty());
    }
}
