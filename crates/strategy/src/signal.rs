use crate::config::EntryConfig;
use crate::snapshot::IndicatorSnapshot;
use crate::EntryStrategy;

/// Oversold bounce entry.
///
/// Enters when RSI is below the oversold line, the close is above its EMA
/// and the close is below the lower Bollinger band. All comparisons are
/// strict.
#[derive(Debug, Clone)]
pub struct MeanReversionEntry {
    cfg: EntryConfig,
}

impl MeanReversionEntry {
    pub fn new(cfg: EntryConfig) -> Self {
        Self { cfg }
    }
}

impl EntryStrategy for MeanReversionEntry {
    fn name(&self) -> &str {
        "mean-reversion"
    }

    fn should_enter(&self, snapshot: &IndicatorSnapshot) -> bool {
        let (Some(ema), Some(rsi), Some(bb_low)) =
            (snapshot.ema, snapshot.rsi, snapshot.bollinger_low)
        else {
            return false;
        };

        rsi < self.cfg.rsi_oversold && snapshot.close > ema && snapshot.close < bb_low
    }
}
