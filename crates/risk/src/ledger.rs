use serde::{Deserialize, Serialize};
use tracing::debug;

use common::{Error, ExitReason, Result};

/// Exit thresholds, read from the `[risk]` table of the trading file.
///
/// The two thresholds are independent even though both default to 10%.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Loss from entry that closes the position (0.10 = 10%). Inclusive.
    pub stop_loss_pct: f64,
    /// Drawdown from the running peak that closes the position. Exclusive.
    pub trailing_stop_pct: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            stop_loss_pct: 0.10,
            trailing_stop_pct: 0.10,
        }
    }
}

impl RiskConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("risk.stop_loss_pct", self.stop_loss_pct),
            ("risk.trailing_stop_pct", self.trailing_stop_pct),
        ] {
            if !(value > 0.0 && value < 1.0) {
                return Err(Error::Config(format!(
                    "{name} must be within (0, 1), got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Which exit rule, if any, fires for `position` at `last_price`.
    ///
    /// Expects `position.max_price` to already include `last_price`.
    /// Stop-loss wins when both fire; the resulting balance is the same.
    pub fn exit_reason(&self, position: &Position, last_price: f64) -> Option<ExitReason> {
        let pnl_pct = (last_price - position.entry_price) / position.entry_price;
        if pnl_pct <= -self.stop_loss_pct {
            return Some(ExitReason::StopLoss);
        }
        if last_price < position.max_price * (1.0 - self.trailing_stop_pct) {
            return Some(ExitReason::TrailingStop);
        }
        None
    }
}

/// An open long position. Only the ledger can create one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Position {
    entry_price: f64,
    amount: f64,
    max_price: f64,
}

impl Position {
    pub fn entry_price(&self) -> f64 {
        self.entry_price
    }

    /// Base asset held.
    pub fn amount(&self) -> f64 {
        self.amount
    }

    /// Highest price seen since entry.
    pub fn max_price(&self) -> f64 {
        self.max_price
    }
}

/// What a symbol currently holds: idle quote currency or a position.
/// While open, the cash is parked inside the position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Holding {
    Flat { balance: f64 },
    Open(Position),
}

/// Outcome of one ledger operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Flat and nothing to do.
    Idle,
    Entered { price: f64, amount: f64 },
    /// Still open after the tick.
    Held { max_price: f64 },
    Exited { reason: ExitReason, price: f64, balance: f64 },
}

/// Per-symbol FLAT/OPEN state machine.
///
/// Every operation validates its inputs before touching state, so a rejected
/// call leaves the ledger exactly as it was.
#[derive(Debug, Clone)]
pub struct SymbolLedger {
    pair: String,
    holding: Holding,
    rules: RiskConfig,
}

impl SymbolLedger {
    pub fn new(pair: impl Into<String>, starting_balance: f64, rules: RiskConfig) -> Result<Self> {
        let pair = pair.into();
        if !(starting_balance.is_finite() && starting_balance >= 0.0) {
            return Err(Error::Precondition(format!(
                "{pair}: starting balance must be finite and non-negative, got {starting_balance}"
            )));
        }
        Ok(Self {
            pair,
            holding: Holding::Flat {
                balance: starting_balance,
            },
            rules,
        })
    }

    pub fn pair(&self) -> &str {
        &self.pair
    }

    pub fn holding(&self) -> &Holding {
        &self.holding
    }

    /// Idle cash; `None` while a position is open.
    pub fn balance(&self) -> Option<f64> {
        match self.holding {
            Holding::Flat { balance } => Some(balance),
            Holding::Open(_) => None,
        }
    }

    pub fn position(&self) -> Option<&Position> {
        match &self.holding {
            Holding::Flat { .. } => None,
            Holding::Open(p) => Some(p),
        }
    }

    pub fn is_flat(&self) -> bool {
        matches!(self.holding, Holding::Flat { .. })
    }

    /// FLAT → OPEN, deploying the whole balance at `fill_price`.
    ///
    /// A zero balance is a no-op (`Idle`). Entering while already open is a
    /// caller bug.
    pub fn enter(&mut self, fill_price: f64) -> Result<Transition> {
        self.check_price(fill_price)?;
        let balance = match &self.holding {
            Holding::Open(_) => {
                return Err(Error::Precondition(format!(
                    "{}: enter called while a position is open",
                    self.pair
                )))
            }
            Holding::Flat { balance } => *balance,
        };
        if balance <= 0.0 {
            return Ok(Transition::Idle);
        }

        let amount = balance / fill_price;
        if !(amount.is_finite() && amount > 0.0) {
            return Err(Error::Precondition(format!(
                "{}: computed amount {amount} from balance {balance} at {fill_price}",
                self.pair
            )));
        }

        self.holding = Holding::Open(Position {
            entry_price: fill_price,
            amount,
            max_price: fill_price,
        });
        Ok(Transition::Entered {
            price: fill_price,
            amount,
        })
    }

    /// Record `last_price` against the open position and report which exit
    /// rule fires, if any.
    ///
    /// The running peak is raised on every call while open, whether or not
    /// an exit follows. Flat ledgers are untouched.
    pub fn mark(&mut self, last_price: f64) -> Result<Option<ExitReason>> {
        self.check_price(last_price)?;
        let Holding::Open(position) = &mut self.holding else {
            return Ok(None);
        };

        if last_price > position.max_price {
            position.max_price = last_price;
            debug!(pair = %self.pair, max_price = last_price, "New running peak");
        }
        Ok(self.rules.exit_reason(position, last_price))
    }

    /// OPEN → FLAT, converting the whole position back to cash at `fill_price`.
    pub fn exit(&mut self, fill_price: f64, reason: ExitReason) -> Result<Transition> {
        self.check_price(fill_price)?;
        let Holding::Open(position) = &self.holding else {
            return Err(Error::Precondition(format!(
                "{}: exit called without an open position",
                self.pair
            )));
        };
        if !(position.amount > 0.0) {
            return Err(Error::Precondition(format!(
                "{}: position amount {} is not positive",
                self.pair, position.amount
            )));
        }

        let balance = position.amount * fill_price;
        self.holding = Holding::Flat { balance };
        Ok(Transition::Exited {
            reason,
            price: fill_price,
            balance,
        })
    }

    /// One full tick with the fill assumed at `last_price`: enter on
    /// `signal` while flat, otherwise move the peak and exit if a rule fires.
    ///
    /// The engine runs the same `enter` / `mark` / `exit` sequence itself so
    /// that orders go through an execution collaborator and the ledger is
    /// sized from the returned fill. With an assumed fill at the last price
    /// the two are identical.
    pub fn step(&mut self, last_price: f64, signal: bool) -> Result<Transition> {
        self.check_price(last_price)?;
        if self.is_flat() {
            return if signal {
                self.enter(last_price)
            } else {
                Ok(Transition::Idle)
            };
        }
        match self.mark(last_price)? {
            Some(reason) => self.exit(last_price, reason),
            None => Ok(Transition::Held {
                max_price: self.position().map_or(last_price, Position::max_price),
            }),
        }
    }

    fn check_price(&self, price: f64) -> Result<()> {
        if price.is_finite() && price > 0.0 {
            Ok(())
        } else {
            Err(Error::Precondition(format!(
                "{}: price must be finite and positive, got {price}",
                self.pair
            )))
        }
    }
}
