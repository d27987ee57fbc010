pub mod binance;
pub mod config;
pub mod lifecycle;

pub use binance::BinanceMarketData;
pub use config::ScheduleConfig;
pub use lifecycle::{CycleSummary, Engine, EngineHandle, SymbolState};
