//! Per-tick equilibrium for one network.
//!
//! All inputs are rates per second except stored amounts. Satisfaction and
//! producer load are ratios of rates, so they do not depend on `dt`; only
//! the amounts moved into and out of storage are scaled by `dt`.

use forge_core::fixed::{Fixed64, over, unit_ratio};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Inputs and outputs
// ---------------------------------------------------------------------------

/// One storage member (accumulator, tank) as the balance sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageCell {
    pub stored: Fixed64,
    pub capacity: Fixed64,
    /// Maximum charge or discharge rate per second.
    pub rate: Fixed64,
}

impl StorageCell {
    fn headroom(&self) -> Fixed64 {
        (self.capacity - self.stored).max(Fixed64::ZERO)
    }
}

/// Result of balancing one network for one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Balance {
    /// Production rate actually offered this tick.
    pub production: Fixed64,
    pub consumption: Fixed64,
    /// Production plus the rate released from storage.
    pub available_supply: Fixed64,
    /// `available_supply / consumption`, clamped to `[0, 1]`; `1` without demand.
    pub satisfaction: Fixed64,
    /// Fraction of production drawn by consumers and charging storage.
    pub producer_load: Fixed64,
    /// Amount moved per storage cell this tick, parallel to the input cells.
    /// Positive charges the cell, negative drains it.
    pub storage_flow: Vec<Fixed64>,
}

impl Balance {
    pub fn is_short(&self) -> bool {
        self.satisfaction < Fixed64::ONE
    }

    /// Total amount moved in or out of storage this tick.
    pub fn throughput(&self) -> Fixed64 {
        self.storage_flow
            .iter()
            .fold(Fixed64::ZERO, |acc, f| acc.saturating_add(f.abs()))
    }
}

// ---------------------------------------------------------------------------
// Balance
// ---------------------------------------------------------------------------

/// Balance `production` against `consumption` for `dt` seconds, using
/// `cells` as a buffer.
///
/// A shortfall is drawn from the cells in order, each limited by its rate
/// and by what it holds. A surplus charges the cells in order, each limited
/// by its rate and its headroom. A non-positive `dt` moves nothing.
pub fn balance(
    production: Fixed64,
    consumption: Fixed64,
    cells: &[StorageCell],
    dt: Fixed64,
) -> Balance {
    let production = production.max(Fixed64::ZERO);
    let consumption = consumption.max(Fixed64::ZERO);
    let mut storage_flow = vec![Fixed64::ZERO; cells.len()];
    let moving = dt > Fixed64::ZERO;

    let (available_supply, producer_load) = if production < consumption {
        let mut remaining = consumption - production;
        let mut released = Fixed64::ZERO;
        if moving {
            for (cell, flow) in cells.iter().zip(&mut storage_flow) {
                if remaining <= Fixed64::ZERO {
                    break;
                }
                let limit = cell.rate.min(cell.stored.saturating_div(dt));
                let take = remaining.min(limit).max(Fixed64::ZERO);
                if take > Fixed64::ZERO {
                    *flow = -over(take, dt).min(cell.stored);
                    released = released.saturating_add(take);
                    remaining -= take;
                }
            }
        }
        let load = if production > Fixed64::ZERO {
            Fixed64::ONE
        } else {
            Fixed64::ZERO
        };
        (production.saturating_add(released), load)
    } else {
        let mut surplus = production - consumption;
        let mut charged = Fixed64::ZERO;
        if moving {
            for (cell, flow) in cells.iter().zip(&mut storage_flow) {
                if surplus <= Fixed64::ZERO {
                    break;
                }
                let headroom = cell.headroom();
                let limit = cell.rate.min(headroom.saturating_div(dt));
                let put = surplus.min(limit).max(Fixed64::ZERO);
                if put > Fixed64::ZERO {
                    *flow = over(put, dt).min(headroom);
                    charged = charged.saturating_add(put);
                    surplus -= put;
                }
            }
        }
        let load = if production > Fixed64::ZERO {
            unit_ratio(consumption.saturating_add(charged), production)
        } else {
            Fixed64::ZERO
        };
        (production, load)
    };

    Balance {
        production,
        consumption,
        available_supply,
        satisfaction: unit_ratio(available_supply, consumption),
        producer_load,
        storage_flow,
    }
}

// ---------------------------------------------------------------------------
// Producer throttling
// ---------------------------------------------------------------------------

/// Hysteresis band on aggregate storage fill that switches producers off
/// when storage is nearly full and back on once it has drained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Throttle {
    /// Fill at or below which producers engage.
    pub low: Fixed64,
    /// Fill at or above which producers disengage.
    pub high: Fixed64,
}

impl Default for Throttle {
    fn default() -> Self {
        Self {
            low: Fixed64::from_num(0.25),
            high: Fixed64::from_num(0.95),
        }
    }
}

impl Throttle {
    pub fn new(low: Fixed64, high: Fixed64) -> Self {
        Self { low, high }
    }

    /// Whether producers run next tick given this tick's state and the
    /// storage fill fraction. Networks without storage always run.
    pub fn next_engaged(&self, engaged: bool, fill: Option<Fixed64>) -> bool {
        match fill {
            None => true,
            Some(fill) if fill <= self.low => true,
            Some(fill) if fill >= self.high => false,
            Some(_) => engaged,
        }
    }
}

/// Aggregate fill of `cells` after applying `flow`. `None` without capacity.
fn fill_after(cells: &[StorageCell], flow: &[Fixed64]) -> Option<Fixed64> {
    let capacity = cells
        .iter()
        .fold(Fixed64::ZERO, |acc, c| acc.saturating_add(c.capacity.max(Fixed64::ZERO)));
    if capacity <= Fixed64::ZERO {
        return None;
    }
    let stored = cells
        .iter()
        .zip(flow)
        .fold(Fixed64::ZERO, |acc, (c, f)| acc.saturating_add(c.stored.saturating_add(*f)));
    Some(unit_ratio(stored, capacity))
}

/// A tick's balance plus the producer state it ran with and the state for
/// the next tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub balance: Balance,
    /// Whether producers ran this tick.
    pub engaged: bool,
    /// Whether producers should run next tick.
    pub engaged_next: bool,
}

/// Balance with producer throttling.
///
/// Disengaged producers offer nothing and storage carries the load. If that
/// leaves consumers short, producers engage within the same tick so a
/// throttled network never browns out while it has capacity to spare.
pub fn settle(
    production: Fixed64,
    consumption: Fixed64,
    cells: &[StorageCell],
    dt: Fixed64,
    engaged: bool,
    throttle: &Throttle,
) -> Settlement {
    let mut engaged = engaged;
    let offered = if engaged { production } else { Fixed64::ZERO };
    let mut result = balance(offered, consumption, cells, dt);

    if !engaged && result.is_short() && production > Fixed64::ZERO {
        engaged = true;
        result = balance(production, consumption, cells, dt);
    }

    let engaged_next = throttle.next_engaged(engaged, fill_after(cells, &result.storage_flow));
    Settlement {
        balance: result,
        engaged,
        engaged_next,
    }
}
