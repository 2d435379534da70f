/// Fold an unbounded command value onto a symmetric ramp over `[0, max_level - 1]`.
///
/// The ramp rises for `max_level` steps and falls for `max_level` steps, so
/// a peer that simply increments its counter sees the output breathe up
/// and down. Period is `2 * max_level`.
pub fn triangle_level(command: u16, max_level: u16) -> u16 {
    if max_level == 0 {
        return 0;
    }
    let period = 2 * u32::from(max_level);
    let m = u32::from(command) % period;
    let level = if m < u32::from(max_level) {
        m
    } else {
        period - m - 1
    };
    level as u16
}

#[cfg(test)]
mod tests {
    use super::triangle_level;
    use crate::config::MAX_LEVEL;

    #[test]
    fn boundaries() {
        assert_eq!(triangle_level(0, MAX_LEVEL), 0);
        assert_eq!(triangle_level(MAX_LEVEL - 1, MAX_LEVEL), MAX_LEVEL - 1);
        assert_eq!(triangle_level(MAX_LEVEL, MAX_LEVEL), MAX_LEVEL - 1);
        assert_eq!(triangle_level(2 * MAX_LEVEL - 1, MAX_LEVEL), 0);
    }

    #[test]
    fn periodic_over_full_input_range() {
        let period = 2 * MAX_LEVEL;
        for c in 0..=(u16::MAX - period) {
            assert_eq!(
                triangle_level(c, MAX_LEVEL),
                triangle_level(c + period, MAX_LEVEL)
            );
        }
    }

    #[test]
    fn ramp_is_symmetric() {
        let period = 2 * MAX_LEVEL;
        for m in 0..period {
            assert_eq!(
                triangle_level(m, MAX_LEVEL),
                triangle_level(period - 1 - m, MAX_LEVEL)
            );
        }
    }

    #[test]
    fn stays_in_range() {
        for c in [0u16, 5, 33, 34, 67, 68, 1000, u16::MAX] {
            assert!(triangle_level(c, MAX_LEVEL) < MAX_LEVEL);
        }
        assert_eq!(triangle_level(5, MAX_LEVEL), 5);
        assert_eq!(triangle_level(40, MAX_LEVEL), 27);
    }

    #[test]
    fn degenerate_scale() {
        assert_eq!(triangle_level(12, 0), 0);
        assert_eq!(triangle_level(12, 1), 0);
    }
}
