/// Bollinger Bands over a simple moving average.
///
/// Band width uses the population standard deviation of the window.
#[derive(Debug, Clone)]
pub struct BollingerIndicator {
    pub period: usize,
    pub std_dev: f64,
}

/// Lower and upper band for the latest bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bands {
    pub lower: f64,
    pub middle: f64,
    pub upper: f64,
}

impl BollingerIndicator {
    pub fn new(period: usize, std_dev: f64) -> Self {
        assert!(period >= 2, "Bollinger period must be >= 2");
        assert!(std_dev > 0.0, "Bollinger std-dev multiplier must be positive");
        Self { period, std_dev }
    }

    /// Compute the bands over the last `period` closes (oldest first).
    /// Returns `None` if there are fewer than `period` values.
    pub fn compute(&self, closes: &[f64]) -> Option<Bands> {
        if closes.len() < self.period {
            return None;
        }
        let window = &closes[closes.len() - self.period..];
        let n = self.period as f64;
        let mean = window.iter().sum::<f64>() / n;
        let variance = window.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / n;
        let width = self.std_dev * variance.sqrt();

        Some(Bands {
            lower: mean - width,
            middle: mean,
            upper: mean + width,
        })
    }
}
