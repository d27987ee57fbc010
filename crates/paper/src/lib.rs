use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info};

use common::{Error, Fill, Order, OrderExecution, OrderSide, Result};

/// Assumed-fill execution: every order fills at its reference price.
///
/// This is the default wiring. Nothing is sent anywhere.
#[derive(Debug, Default, Clone)]
pub struct SimulatedClient;

impl SimulatedClient {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl OrderExecution for SimulatedClient {
    async fn submit_order(&self, order: &Order) -> Result<Fill> {
        check_order(order)?;
        debug!(pair = %order.pair, side = %order.side, price = order.reference_price, "Assumed fill");
        Ok(Fill {
            order_id: order.id.clone(),
            pair: order.pair.clone(),
            side: order.side,
            fill_price: order.reference_price,
            quantity: order.quantity,
            timestamp: Utc::now(),
        })
    }
}

/// A position opened through the paper client.
#[derive(Debug, Clone, PartialEq)]
pub struct PaperPosition {
    pub id: String,
    pub pair: String,
    pub entry_price: f64,
    pub quantity: f64,
    pub opened_at: DateTime<Utc>,
}

/// Simulated exchange client for paper trading.
///
/// Fills are priced from the order's reference price with configurable
/// slippage. No real orders are ever sent.
///
/// A buy spends the order's notional (`quantity * reference_price`), so with
/// slippage it fills fewer units than requested. This is the amount the
/// ledger holds after entering at the fill price.
pub struct PaperClient {
    /// Open simulated positions.
    positions: Arc<RwLock<Vec<PaperPosition>>>,
    /// Slippage in basis points applied to all fills.
    slippage_bps: f64,
}

impl PaperClient {
    pub fn new(slippage_bps: f64) -> Self {
        info!(slippage_bps = slippage_bps, "PaperClient initialized");
        Self {
            positions: Arc::new(RwLock::new(Vec::new())),
            slippage_bps,
        }
    }

    /// Snapshot of the paper book.
    pub async fn open_positions(&self) -> Vec<PaperPosition> {
        self.positions.read().await.clone()
    }
}

#[async_trait]
impl OrderExecution for PaperClient {
    async fn submit_order(&self, order: &Order) -> Result<Fill> {
        check_order(order)?;

        // Apply slippage: buys pay more, sells receive less
        let fill_price = match order.side {
            OrderSide::Buy => order.reference_price * (1.0 + self.slippage_bps / 10_000.0),
            OrderSide::Sell => order.reference_price * (1.0 - self.slippage_bps / 10_000.0),
        };
        if !(fill_price.is_finite() && fill_price > 0.0) {
            return Err(Error::Exchange(format!(
                "paper fill price {fill_price} for {} is not positive",
                order.pair
            )));
        }

        let quantity = match order.side {
            OrderSide::Buy => order.quantity * order.reference_price / fill_price,
            OrderSide::Sell => order.quantity,
        };

        debug!(
            pair = %order.pair,
            side = %order.side,
            reference = order.reference_price,
            fill = fill_price,
            qty = quantity,
            "Paper fill simulated"
        );

        let fill = Fill {
            order_id: order.id.clone(),
            pair: order.pair.clone(),
            side: order.side,
            fill_price,
            quantity,
            timestamp: Utc::now(),
        };

        let mut positions = self.positions.write().await;
        match order.side {
            OrderSide::Buy => {
                positions.push(PaperPosition {
                    id: order.id.clone(),
                    pair: order.pair.clone(),
                    entry_price: fill_price,
                    quantity,
                    opened_at: fill.timestamp,
                });
            }
            OrderSide::Sell => {
                // Remove the first matching open buy position
                if let Some(idx) = positions.iter().position(|p| p.pair == order.pair) {
                    positions.remove(idx);
                }
            }
        }

        Ok(fill)
    }
}

fn check_order(order: &Order) -> Result<()> {
    if !(order.reference_price.is_finite() && order.reference_price > 0.0) {
        return Err(Error::Exchange(format!(
            "order {} has invalid reference price {}",
            order.id, order.reference_price
        )));
    }
    if !(order.quantity.is_finite() && order.quantity > 0.0) {
        return Err(Error::Exchange(format!(
            "order {} has invalid quantity {}",
            order.id, order.quantity
        )));
    }
    Ok(())
}
