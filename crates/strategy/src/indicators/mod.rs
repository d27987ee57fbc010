pub mod bollinger;
pub mod ema;
pub mod rsi;

pub use bollinger::{Bands, BollingerIndicator};
pub use ema::EmaIndicator;
pub use rsi::RsiIndicator;
