//! Score unit conversions and the parametric null distributions used to
//! turn nat scores into P-values and E-values.

pub const CONST_LOG2: f32 = std::f32::consts::LN_2;

#[inline]
pub fn nats_to_bits(nats: f32) -> f32 {
    nats / CONST_LOG2
}

/// Survival function of the Gumbel distribution fit to Viterbi bit scores.
pub fn gumbel_survival(score: f32, lambda: f32, mu: f32) -> f64 {
    let y = (-(lambda as f64) * (score as f64 - mu as f64)).exp();
    // for tiny tails 1 - exp(-y) loses all precision; -expm1(-y) does not
    -(-y).exp_m1()
}

/// Survival function of the exponential tail fit to Forward bit scores.
pub fn exponential_survival(score: f32, lambda: f32, tau: f32) -> f64 {
    if score < tau {
        1.0
    } else {
        (-(lambda as f64) * (score as f64 - tau as f64)).exp()
    }
}

#[inline]
pub fn pval_to_eval(pval: f64, database_size: usize) -> f64 {
    pval * database_size as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nats_to_bits() {
        assert!((nats_to_bits(std::f32::consts::LN_2) - 1.0).abs() < 1e-6);
        assert!((nats_to_bits(10.0 * std::f32::consts::LN_2) - 10.0).abs() < 1e-5);
    }

    #[test]
    fn test_gumbel_survival_bounds() {
        // far below mu the survival probability approaches 1
        assert!(gumbel_survival(-100.0, 0.7, 5.0) > 0.999);
        // far above mu it decays like exp(-lambda * (x - mu))
        let p = gumbel_survival(40.0, 0.7, 5.0);
        let tail = (-0.7f64 * 35.0).exp();
        assert!((p - tail).abs() / tail < 1e-3);
    }

    #[test]
    fn test_exponential_survival_bounds() {
        assert_eq!(exponential_survival(-3.0, 0.7, 0.0), 1.0);
        let p = exponential_survival(20.0, 0.7, 4.0);
        let expected = (-0.7f64 * 16.0).exp();
        assert!((p - expected).abs() / expected < 1e-5);
    }

    #[test]
    fn test_pval_to_eval_scales_by_database_size() {
        assert_eq!(pval_to_eval(1e-6, 1000), 1e-3);
    }
}
