//! Hour arithmetic on the half-hour grid.
//!
//! Cells are stored as `f64` hours quantized to 0.5h. Everything that adds or
//! subtracts hours goes through [`round_hours`] so repeated 0.5 steps never
//! drift into values like `4.999999`.

/// Default daily capacity when a person has none recorded.
pub const DEFAULT_DAILY_CAPACITY: f64 = 6.5;

/// Default quantization step.
pub const DEFAULT_STEP: f64 = 0.5;

/// Upper bound for a single (initiative, person, date) cell.
pub const MAX_CELL_HOURS: f64 = 24.0;

/// Comparison tolerance for hour values.
pub const EPSILON: f64 = 1e-6;

/// Round to six decimals.
pub fn round_hours(hours: f64) -> f64 {
    (hours * 1_000_000.0).round() / 1_000_000.0
}

/// Largest multiple of `step` that is `<= hours`.
pub fn quantize_down(hours: f64, step: f64) -> f64 {
    if step <= 0.0 {
        return round_hours(hours);
    }
    round_hours(((hours + EPSILON) / step).floor() * step)
}

/// Smallest multiple of `step` that is `>= hours`.
pub fn quantize_up(hours: f64, step: f64) -> f64 {
    if step <= 0.0 {
        return round_hours(hours);
    }
    round_hours(((hours - EPSILON) / step).ceil() * step)
}

/// `true` when `hours` is effectively zero.
pub fn is_zero(hours: f64) -> bool {
    hours.abs() < EPSILON
}

/// Hour equality with tolerance.
pub fn same_hours(a: f64, b: f64) -> bool {
    (a - b).abs() < EPSILON
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantize_snaps_to_grid() {
        assert_eq!(quantize_down(6.4, 0.5), 6.0);
        assert_eq!(quantize_down(6.5, 0.5), 6.5);
        assert_eq!(quantize_up(10.1, 0.5), 10.5);
        assert_eq!(quantize_up(10.0, 0.5), 10.0);
    }

    #[test]
    fn quantize_tolerates_float_noise() {
        let noisy = 0.1 + 0.2 + 0.2; // 0.5000000000000001
        assert_eq!(quantize_up(noisy, 0.5), 0.5);
        assert_eq!(quantize_down(0.49999999, 0.5), 0.5);
    }

    #[test]
    fn repeated_steps_do_not_drift() {
        let mut total = 0.0;
        for _ in 0..13 {
            total = round_hours(total + 0.5);
        }
        assert_eq!(total, 6.5);
        assert!(same_hours(total, DEFAULT_DAILY_CAPACITY));
    }
}
