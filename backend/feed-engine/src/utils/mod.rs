// Utility functions for feed-engine

use std::f64::consts::LN_2;

/// Compute exponential decay for time-based scoring
pub fn exponential_decay(age_hours: f64, half_life_hours: f64) -> f64 {
    (-age_hours / half_life_hours * LN_2).exp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_decay() {
        // 半衰期後應該約為 0.5
        let score = exponential_decay(24.0, 24.0);
        assert!((score - 0.5).abs() < 1e-9);

        // 0 小時衰減應該為 1.0
        let score_fresh = exponential_decay(0.0, 24.0);
        assert!((score_fresh - 1.0).abs() < 1e-9);

        assert!(exponential_decay(1.0, 24.0) > exponential_decay(2.0, 24.0));
    }
}
