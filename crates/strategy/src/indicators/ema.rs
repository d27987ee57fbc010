/// EMA (Exponential Moving Average) indicator.
///
/// Smoothing factor `2 / (period + 1)`, seeded with the first close and
/// folded forward over the whole series. Returns `None` until at least
/// `period` closes are available.
#[derive(Debug, Clone)]
pub struct EmaIndicator {
    pub period: usize,
}

impl EmaIndicator {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "EMA period must be >= 1");
        Self { period }
    }

    /// Compute the EMA of the latest close from a slice of closes (oldest first).
    pub fn compute(&self, closes: &[f64]) -> Option<f64> {
        if closes.len() < self.period {
            return None;
        }
        let k = 2.0 / (self.period as f64 + 1.0);
        let (&first, rest) = closes.split_first()?;
        Some(rest.iter().fold(first, |ema, &price| price * k + ema * (1.0 - k)))
    }
}
