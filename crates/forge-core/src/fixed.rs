use fixed::types::I32F32;

/// Q32.32 fixed-point: 32 integer bits, 32 fractional bits.
///
/// Every simulated quantity (rates per second, stored amounts, radii,
/// satisfaction ratios, and the tick's delta time) uses this type so two
/// simulations fed the same inputs stay bit-identical.
pub type Fixed64 = I32F32;

/// Ticks are the atomic unit of simulation time.
pub type Ticks = u64;

/// Convert an f64 to Fixed64. Use only for initialization, never in sim loop.
#[inline]
pub fn f64_to_fixed64(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

/// Convert Fixed64 to f64. Use only for display and config round-trips.
#[inline]
pub fn fixed64_to_f64(v: Fixed64) -> f64 {
    v.to_num::<f64>()
}

/// `numerator / denominator` clamped to `[0, 1]`.
///
/// A non-positive denominator means nothing was asked for, which counts as
/// fully satisfied.
#[inline]
pub fn unit_ratio(numerator: Fixed64, denominator: Fixed64) -> Fixed64 {
    if denominator <= Fixed64::ZERO {
        return Fixed64::ONE;
    }
    numerator
        .saturating_div(denominator)
        .clamp(Fixed64::ZERO, Fixed64::ONE)
}

/// Amount moved in `dt` seconds at `rate` per second. Never negative.
#[inline]
pub fn over(rate: Fixed64, dt: Fixed64) -> Fixed64 {
    if dt <= Fixed64::ZERO || rate <= Fixed64::ZERO {
        return Fixed64::ZERO;
    }
    rate.saturating_mul(dt)
}
