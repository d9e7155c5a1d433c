/// Share of `total` represented by `current`, as a percentage rounded to one
/// decimal place (half away from zero).
///
/// A zero `total` yields `0.0`: no baseline means no change.
pub fn variation_percent(current: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }

    let pct = (current as f64 / total as f64) * 100.0;
    (pct * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_total_is_no_change() {
        assert_eq!(variation_percent(5, 0), 0.0);
        assert_eq!(variation_percent(0, 0), 0.0);
    }

    #[test]
    fn test_plain_ratio() {
        assert_eq!(variation_percent(50, 200), 25.0);
        assert_eq!(variation_percent(200, 200), 100.0);
        assert_eq!(variation_percent(0, 7), 0.0);
    }

    #[test]
    fn test_rounds_to_one_decimal() {
        // 1/3 = 33.333..%
        assert_eq!(variation_percent(1, 3), 33.3);
        // 2/3 = 66.666..%
        assert_eq!(variation_percent(2, 3), 66.7);
        // 1/8 = 12.5% exactly, 1/16 = 6.25% -> half away from zero.
        assert_eq!(variation_percent(1, 8), 12.5);
        assert_eq!(variation_percent(1, 16), 6.3);
    }

    #[test]
    fn test_current_above_total() {
        assert_eq!(variation_percent(3, 2), 150.0);
    }
}
