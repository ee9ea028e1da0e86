use std::sync::LazyLock;

/// Two log-space values further apart than this contribute nothing
/// to their sum at f32 precision, so we just take the max.
pub const LOG_SUM_CUTOFF: f32 = 16.0;

/// Table resolution: 2^-10 in score units.
pub const LOG_SUM_STEP: f32 = 0.0009765625;

const LOG_SUM_TABLE_SIZE: usize = 16_384;

/// Tabulated correction term ln(1 + e^-x) for x in [0, 16).
///
/// Initialised on first use and read-only afterwards, so every DP kernel
/// in the process shares one table.
static LOG_SUM_TABLE: LazyLock<Vec<f32>> = LazyLock::new(|| {
    (0..LOG_SUM_TABLE_SIZE)
        .map(|i| (1.0 + (-(i as f64) * LOG_SUM_STEP as f64).exp()).ln() as f32)
        .collect()
});

/// Compute ln(e^a + e^b) from log-space operands using the lookup table.
#[inline]
pub fn log_sum(a: f32, b: f32) -> f32 {
    let (max, min) = if a > b { (a, b) } else { (b, a) };

    if min == -f32::INFINITY || max - min >= LOG_SUM_CUTOFF {
        max
    } else {
        max + LOG_SUM_TABLE[((max - min) / LOG_SUM_STEP) as usize]
    }
}

/// Three-operand convenience over [`log_sum`].
#[inline]
pub fn log_sum3(a: f32, b: f32, c: f32) -> f32 {
    log_sum(log_sum(a, b), c)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exact(a: f32, b: f32) -> f32 {
        ((a as f64).exp() + (b as f64).exp()).ln() as f32
    }

    #[test]
    fn test_log_sum_against_exact() {
        let values = [-20.0f32, -4.25, -1.0, 0.0, 0.33, 2.5, 10.0];
        for &a in &values {
            for &b in &values {
                assert!((log_sum(a, b) - exact(a, b)).abs() < 1e-3);
            }
        }
    }

    #[test]
    fn test_log_sum_negative_infinity() {
        assert_eq!(log_sum(-f32::INFINITY, -f32::INFINITY), -f32::INFINITY);
        assert_eq!(log_sum(-f32::INFINITY, 1.5), 1.5);
        assert_eq!(log_sum(1.5, -f32::INFINITY), 1.5);
    }

    #[test]
    fn test_log_sum_large_gap_returns_max() {
        assert_eq!(log_sum(0.0, -17.0), 0.0);
        assert_eq!(log_sum(-100.0, 3.0), 3.0);
    }
}
