pub mod ledger;

pub use ledger::{Holding, Position, RiskConfig, SymbolLedger, Transition};
