use fixed::types::I32F32;

/// Q32.32 fixed-point: 32 integer bits, 32 fractional bits.
///
/// Every simulated quantity (pressure, capacity, resistance, flow, time
/// deltas, currency) uses this type so that addition and subtraction are
/// exact and results are bit-identical on every platform.
pub type Fixed64 = I32F32;

/// Ticks are the atomic unit of simulation time.
pub type Ticks = u64;

/// Convert an f64 to Fixed64. Use only for initialization, never in sim loop.
#[inline]
pub fn f64_to_fixed64(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

/// Convert Fixed64 to f64. Use only for display, never in sim loop.
#[inline]
pub fn fixed64_to_f64(v: Fixed64) -> f64 {
    v.to_num::<f64>()
}

/// Convert an f64 to Fixed64, returning `None` for NaN, infinities, and
/// values outside the representable range.
#[inline]
pub fn checked_from_f64(v: f64) -> Option<Fixed64> {
    Fixed64::checked_from_num(v)
}

/// Checked multiplication for Fixed64 that returns None on overflow.
#[inline]
pub fn checked_mul_64(a: Fixed64, b: Fixed64) -> Option<Fixed64> {
    a.checked_mul(b)
}

/// Checked division for Fixed64 that returns None on zero divisor.
#[inline]
pub fn checked_div_64(a: Fixed64, b: Fixed64) -> Option<Fixed64> {
    a.checked_div(b)
}

/// Clamp `v` into `[0, upper]`. A negative `upper` is treated as zero.
#[inline]
pub fn clamp_unit_range(v: Fixed64, upper: Fixed64) -> Fixed64 {
    v.clamp(Fixed64::ZERO, upper.max(Fixed64::ZERO))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed64_basic_arithmetic() {
        let a = f64_to_fixed64(1.5);
        let b = f64_to_fixed64(2.0);
        let sum = a + b;
        assert_eq!(fixed64_to_f64(sum), 3.5);
    }

    #[test]
    fn fixed64_add_sub_is_exact() {
        let a = f64_to_fixed64(92.5);
        let x = f64_to_fixed64(1.0 / 60.0);
        assert_eq!((a - x) + x, a);
    }

    #[test]
    fn fixed64_checked_mul_overflow() {
        let big = Fixed64::MAX;
        let two = f64_to_fixed64(2.0);
        assert!(checked_mul_64(big, two).is_none());
    }

    #[test]
    fn fixed64_checked_div_by_zero() {
        let a = f64_to_fixed64(1.0);
        assert!(checked_div_64(a, Fixed64::ZERO).is_none());
    }

    #[test]
    fn checked_from_f64_rejects_nan_and_huge() {
        assert!(checked_from_f64(f64::NAN).is_none());
        assert!(checked_from_f64(f64::INFINITY).is_none());
        assert!(checked_from_f64(1e12).is_none());
        assert_eq!(checked_from_f64(0.5), Some(f64_to_fixed64(0.5)));
    }

    #[test]
    fn clamp_unit_range_bounds() {
        let cap = f64_to_fixed64(100.0);
        assert_eq!(clamp_unit_range(f64_to_fixed64(-3.0), cap), Fixed64::ZERO);
        assert_eq!(clamp_unit_range(f64_to_fixed64(140.0), cap), cap);
        assert_eq!(clamp_unit_range(f64_to_fixed64(42.0), cap), f64_to_fixed64(42.0));
        // Negative capacity collapses the range to zero.
        assert_eq!(
            clamp_unit_range(f64_to_fixed64(5.0), f64_to_fixed64(-1.0)),
            Fixed64::ZERO
        );
    }

    #[test]
    fn fixed64_determinism() {
        let a = f64_to_fixed64(1.0 / 3.0);
        let b = f64_to_fixed64(1.0 / 3.0);
        assert_eq!(a, b);
        assert_eq!(a * f64_to_fixed64(3.0), b * f64_to_fixed64(3.0));
    }
}
