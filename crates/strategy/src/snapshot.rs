use common::{Candle, Error, Result};

use crate::config::IndicatorConfig;
use crate::indicators::{BollingerIndicator, EmaIndicator, RsiIndicator};

/// Latest indicator values for one symbol.
///
/// Every indicator is `None` while it is still warming up, i.e. the candle
/// sequence is shorter than its window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorSnapshot {
    /// Close of the last candle.
    pub close: f64,
    pub ema: Option<f64>,
    pub rsi: Option<f64>,
    pub bollinger_low: Option<f64>,
}

/// The indicator set the entry signal reads, built once from config.
#[derive(Debug, Clone)]
pub struct IndicatorSet {
    ema: EmaIndicator,
    rsi: RsiIndicator,
    bollinger: BollingerIndicator,
}

impl IndicatorSet {
    /// Panics on invalid windows; call `IndicatorConfig::validate` first.
    pub fn new(cfg: &IndicatorConfig) -> Self {
        Self {
            ema: EmaIndicator::new(cfg.ema_period),
            rsi: RsiIndicator::new(cfg.rsi_period),
            bollinger: BollingerIndicator::new(cfg.bollinger_period, cfg.bollinger_std_dev),
        }
    }

    /// Compute the snapshot for the last candle.
    ///
    /// Fails on an empty sequence or a close that is not a finite positive
    /// number; short sequences are not an error.
    pub fn compute(&self, candles: &[Candle]) -> Result<IndicatorSnapshot> {
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();

        let &close = closes
            .last()
            .ok_or_else(|| Error::Indicator("empty candle sequence".into()))?;

        if let Some((idx, bad)) = closes
            .iter()
            .enumerate()
            .find(|(_, c)| !(c.is_finite() && **c > 0.0))
        {
            return Err(Error::Indicator(format!(
                "candle {idx} has invalid close {bad}"
            )));
        }

        Ok(IndicatorSnapshot {
            close,
            ema: self.ema.compute(&closes),
            rsi: self.rsi.compute(&closes),
            bollinger_low: self.bollinger.compute(&closes).map(|b| b.lower),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn candles(closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Candle {
                timestamp: Utc.timestamp_opt(i as i64 * 3600, 0).unwrap(),
                open: c,
                high: c,
                low: c,
                close: c,
                volume: 1.0,
            })
            .collect()
    }

    #[test]
    fn short_history_yields_warming_snapshot() {
        let set = IndicatorSet::new(&IndicatorConfig::default());
        let snap = set.compute(&candles(&[10.0, 11.0, 12.0])).unwrap();
        assert_eq!(snap.close, 12.0);
        assert!(snap.ema.is_none());
        assert!(snap.rsi.is_none());
        assert!(snap.bollinger_low.is_none());
    }

    #[test]
    fn full_history_fills_every_indicator() {
        let set = IndicatorSet::new(&IndicatorConfig::default());
        let closes: Vec<f64> = (0..100).map(|i| 100.0 + (i % 7) as f64).collect();
        let snap = set.compute(&candles(&closes)).unwrap();
        assert!(snap.ema.is_some());
        assert!(snap.rsi.is_some());
        assert!(snap.bollinger_low.is_some());
    }

    #[test]
    fn empty_sequence_is_malformed() {
        let set = IndicatorSet::new(&IndicatorConfig::default());
        assert!(matches!(set.compute(&[]), Err(Error::Indicator(_))));
    }

    #[test]
    fn non_positive_close_is_malformed() {
        let set = IndicatorSet::new(&IndicatorConfig::default());
        let err = set.compute(&candles(&[10.0, 0.0, 12.0])).unwrap_err();
        assert!(matches!(err, Error::Indicator(_)));
    }

    #[test]
    fn nan_close_is_malformed() {
        let set = IndicatorSet::new(&IndicatorConfig::default());
        assert!(set.compute(&candles(&[10.0, f64::NAN])).is_err());
    }
}
