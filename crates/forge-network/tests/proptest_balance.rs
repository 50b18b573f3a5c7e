//! Property-based tests for network equilibrium.

use forge_core::fixed::Fixed64;
use forge_network::{StorageCell, Throttle, balance, settle};
use proptest::prelude::*;

// ===========================================================================
// Generators
// ===========================================================================

fn amount(max: i32) -> impl Strategy<Value = Fixed64> {
    (0..=max * 16).prop_map(|v| Fixed64::from_num(v) / 16)
}

fn arb_cell() -> impl Strategy<Value = StorageCell> {
    (amount(1000), amount(1000), amount(200)).prop_map(|(a, b, rate)| StorageCell {
        stored: a.min(b),
        capacity: a.max(b),
        rate,
    })
}

fn arb_dt() -> impl Strategy<Value = Fixed64> {
    prop_oneof![
        Just(Fixed64::ZERO),
        Just(Fixed64::ONE / 60),
        Just(Fixed64::ONE),
        (1..=120i32).prop_map(|n| Fixed64::from_num(n) / 60),
    ]
}

// ===========================================================================
// Properties
// ===========================================================================

proptest! {
    #[test]
    fn satisfaction_is_a_unit_ratio(
        production in amount(500),
        consumption in amount(500),
        cells in proptest::collection::vec(arb_cell(), 0..4),
        dt in arb_dt(),
    ) {
        let b = balance(production, consumption, &cells, dt);
        prop_assert!(b.satisfaction >= Fixed64::ZERO);
        prop_assert!(b.satisfaction <= Fixed64::ONE);
        if consumption == Fixed64::ZERO {
            prop_assert_eq!(b.satisfaction, Fixed64::ONE);
        }
        if production >= consumption {
            prop_assert_eq!(b.satisfaction, Fixed64::ONE);
        }
    }

    #[test]
    fn storage_stays_within_bounds(
        production in amount(500),
        consumption in amount(500),
        cells in proptest::collection::vec(arb_cell(), 1..4),
        dt in arb_dt(),
    ) {
        let b = balance(production, consumption, &cells, dt);
        prop_assert_eq!(b.storage_flow.len(), cells.len());
        for (cell, flow) in cells.iter().zip(&b.storage_flow) {
            let after = cell.stored + *flow;
            prop_assert!(after >= Fixed64::ZERO);
            prop_assert!(after <= cell.capacity);
        }
        if dt <= Fixed64::ZERO {
            prop_assert!(b.storage_flow.iter().all(|f| *f == Fixed64::ZERO));
        }
    }

    #[test]
    fn storage_only_moves_in_one_direction(
        production in amount(500),
        consumption in amount(500),
        cells in proptest::collection::vec(arb_cell(), 1..4),
        dt in arb_dt(),
    ) {
        let b = balance(production, consumption, &cells, dt);
        if production < consumption {
            prop_assert!(b.storage_flow.iter().all(|f| *f <= Fixed64::ZERO));
        } else {
            prop_assert!(b.storage_flow.iter().all(|f| *f >= Fixed64::ZERO));
        }
    }

    #[test]
    fn throttling_never_costs_satisfaction(
        production in amount(500),
        consumption in amount(500),
        cells in proptest::collection::vec(arb_cell(), 0..4),
        dt in arb_dt(),
    ) {
        let running = balance(production, consumption, &cells, dt);
        let throttled = settle(production, consumption, &cells, dt, false, &Throttle::default());
        prop_assert!(throttled.balance.satisfaction >= running.satisfaction);
    }
}
