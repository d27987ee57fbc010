use common::ExitReason;
use proptest::prelude::*;
use risk::{Holding, RiskConfig, SymbolLedger, Transition};

fn ticks() -> impl Strategy<Value = Vec<(f64, bool)>> {
    prop::collection::vec((0.01f64..1_000.0f64, any::<bool>()), 1..60)
}

proptest! {
    /// A symbol is always either flat with a balance or holding a position.
    #[test]
    fn flat_and_open_are_mutually_exclusive(
        balance in 0.0f64..10_000.0f64,
        steps in ticks(),
    ) {
        let mut ledger = SymbolLedger::new("TEST/USDC", balance, RiskConfig::default()).unwrap();
        for (price, signal) in steps {
            ledger.step(price, signal).unwrap();
            prop_assert!(ledger.balance().is_some() != ledger.position().is_some());
            match ledger.holding() {
                Holding::Flat { balance } => prop_assert!(*balance >= 0.0),
                Holding::Open(p) => prop_assert!(p.amount() > 0.0 && p.entry_price() > 0.0),
            }
        }
    }

    /// While open, the running peak never decreases and covers every price seen.
    #[test]
    fn running_peak_is_monotonic(
        entry in 1.0f64..1_000.0f64,
        prices in prop::collection::vec(0.01f64..2_000.0f64, 1..60),
    ) {
        let mut ledger = SymbolLedger::new("TEST/USDC", 100.0, RiskConfig::default()).unwrap();
        ledger.enter(entry).unwrap();
        let mut prev_peak = entry;

        for price in prices {
            let reason = ledger.mark(price).unwrap();
            let peak = ledger.position().unwrap().max_price();
            prop_assert!(peak >= prev_peak);
            prop_assert!(peak >= price);
            prev_peak = peak;
            if let Some(reason) = reason {
                ledger.exit(price, reason).unwrap();
                break;
            }
        }
    }

    /// Entering at P with balance B and leaving at Q yields B * Q / P.
    #[test]
    fn round_trip_conserves_value(
        balance in 0.01f64..1_000_000.0f64,
        entry in 0.0001f64..1_000_000.0f64,
        exit in 0.0001f64..1_000_000.0f64,
    ) {
        let mut ledger = SymbolLedger::new("TEST/USDC", balance, RiskConfig::default()).unwrap();
        let entered = ledger.enter(entry).unwrap();
        let is_entered = matches!(entered, Transition::Entered { .. });
        prop_assert!(is_entered);
        ledger.exit(exit, ExitReason::StopLoss).unwrap();

        let expected = balance * exit / entry;
        let got = ledger.balance().unwrap();
        prop_assert!((got - expected).abs() <= expected * 1e-12, "got {got}, expected {expected}");
    }

    /// Ledger operations on arbitrary f64 input must never panic.
    #[test]
    fn ledger_never_panics_on_arbitrary_prices(
        price in any::<f64>(),
        signal in any::<bool>(),
    ) {
        let mut ledger = SymbolLedger::new("TEST/USDC", 100.0, RiskConfig::default()).unwrap();
        let _ = ledger.step(price, signal);
        let _ = ledger.step(price, signal);
        prop_assert!(ledger.balance().is_some() != ledger.position().is_some());
    }
}
