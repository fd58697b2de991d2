//! Cost arithmetic. A cost is a non-negative integer proportional to the
//! negative log of a probability. Zero means certainty; `WORST_COST` is a
//! finite upper bound that any real cost stays strictly below.

/// Scale used to convert a log-probability to an integer cost.
pub const PROB2COST_SCALE: f64 = 4096.0;

/// Cost assigned to probabilities at or below `MIN_PROB`.
pub const MIN_PROB_COST: i32 = 65536;

/// Probability corresponding to `MIN_PROB_COST` (e^-16).
pub const MIN_PROB: f64 = 0.000000113;

/// Worst possible cost, returned on failure.
pub const WORST_COST: i32 = 0x40000;

/// Converts a probability to a cost by taking its negative log.
pub fn prob_to_cost(prob_val: f64) -> i32 {
    if prob_val < MIN_PROB {
        return MIN_PROB_COST;
    }
    (-prob_val.ln() * PROB2COST_SCALE) as i32
}

/// Converts a cost back to a probability.
pub fn cost_to_prob(cost: i32) -> f64 {
    (-cost as f64 / PROB2COST_SCALE).exp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_certainty_is_free() {
        assert_eq!(prob_to_cost(1.0), 0);
        assert_eq!(prob_to_cost(0.0), MIN_PROB_COST);
    }

    #[test]
    fn test_monotone() {
        let mut last = i32::MAX;
        for i in 1..=100 {
            let cost = prob_to_cost(i as f64 / 100.0);
            assert!(cost <= last);
            last = cost;
        }
    }

    #[test]
    fn test_round_trip() {
        for &p in &[0.001, 0.01, 0.1, 0.25, 0.5, 0.9, 1.0] {
            let p2 = cost_to_prob(prob_to_cost(p));
            assert!((p - p2).abs() < 0.001, "{} -> {}", p, p2);
        }
    }
}
