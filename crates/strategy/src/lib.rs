pub mod config;
pub mod indicators;
pub mod signal;
pub mod snapshot;

pub use config::{EntryConfig, IndicatorConfig};
pub use signal::MeanReversionEntry;
pub use snapshot::{IndicatorSet, IndicatorSnapshot};

/// All entry strategies must satisfy this trait.
pub trait EntryStrategy: Send + Sync {
    /// Human-readable name shown in logs.
    fn name(&self) -> &str;

    /// Decide whether a flat symbol should open a position.
    ///
    /// Must be pure, and must return `false` rather than fail when the
    /// snapshot is still warming up.
    fn should_enter(&self, snapshot: &IndicatorSnapshot) -> bool;
}
