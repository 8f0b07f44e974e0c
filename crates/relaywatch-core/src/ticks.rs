//! Evenly spaced axis ticks across a time window.
//!
//! Ticks are for label placement only; they have no relation to the
//! timestamps of the readings plotted in the same window.

use time::OffsetDateTime;

use relaywatch_types::TimeWindow;

/// Default number of axis ticks.
pub const DEFAULT_TICK_COUNT: u32 = 5;

/// Return `count` instants from `window.from()` to `window.to()` inclusive.
///
/// `count == 1` yields just the start and `count == 0` yields nothing.
///
/// # Example
///
/// ```
/// use relaywatch_core::ticks::ticks;
/// use relaywatch_types::TimeWindow;
/// use time::macros::datetime;
///
/// let w = TimeWindow::new(datetime!(2025-01-01 0:00 UTC), datetime!(2025-01-01 4:00 UTC)).unwrap();
/// let t = ticks(&w, 5);
/// assert_eq!(t[1], datetime!(2025-01-01 1:00 UTC));
/// assert_eq!(t[4], w.to());
/// ```
pub fn ticks(window: &TimeWindow, count: u32) -> Vec<OffsetDateTime> {
    match count {
        0 => Vec::new(),
        1 => vec![window.from()],
        _ => {
            let span = window.duration();
            let steps = count - 1;
            (0..count)
                .map(|i| window.from() + span * i / steps)
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use time::macros::datetime;
    use time::Duration;

    fn window(from: OffsetDateTime, to: OffsetDateTime) -> TimeWindow {
        TimeWindow::new(from, to).unwrap()
    }

    #[test]
    fn test_five_ticks() {
        let w = window(
            datetime!(2025-03-10 00:00 UTC),
            datetime!(2025-03-10 23:59:59.999 UTC),
        );
        let t = ticks(&w, 5);
        assert_eq!(t.len(), 5);
        assert_eq!(t[0], w.from());
        assert_eq!(t[4], w.to());
        assert_eq!(t[2], w.midpoint());
    }

    #[test]
    fn test_degenerate_counts() {
        let w = window(
            datetime!(2025-03-10 00:00 UTC),
            datetime!(2025-03-10 01:00 UTC),
        );
        assert!(ticks(&w, 0).is_empty());
        assert_eq!(ticks(&w, 1), vec![w.from()]);
        assert_eq!(ticks(&w, 2), vec![w.from(), w.to()]);
    }

    #[test]
    fn test_empty_window() {
        let t0 = datetime!(2025-03-10 00:00 UTC);
        let w = window(t0, t0);
        assert_eq!(ticks(&w, 3), vec![t0, t0, t0]);
    }

    #[test]
    fn test_ticks_are_restartable() {
        let w = window(
            datetime!(2025-03-10 00:00 UTC),
            datetime!(2025-03-17 00:00 UTC),
        );
        assert_eq!(ticks(&w, 8), ticks(&w, 8));
        assert_eq!(ticks(&w, 8)[1] - w.from(), Duration::DAY);
    }

    proptest! {
        #[test]
        fn prop_ticks_shape(
            start in 0i64..4_000_000_000,
            span_ms in 0i64..(90 * 86_400_000),
            count in 2u32..64,
        ) {
            let from = OffsetDateTime::from_unix_timestamp(start).unwrap();
            let w = window(from, from + Duration::milliseconds(span_ms));
            let t = ticks(&w, count);

            prop_assert_eq!(t.len(), count as usize);
            prop_assert_eq!(t[0], w.from());
            prop_assert_eq!(t[t.len() - 1], w.to());
            prop_assert!(t.windows(2).all(|p| p[0] <= p[1]));
        }

        #[test]
        fn prop_middle_tick_is_midpoint(
            start in 0i64..4_000_000_000,
            span_ms in 0i64..(90 * 86_400_000),
        ) {
            let from = OffsetDateTime::from_unix_timestamp(start).unwrap();
            let w = window(from, from + Duration::milliseconds(span_ms));
            let diff = ticks(&w, 5)[2] - w.midpoint();
            prop_assert!(diff.abs() <= Duration::nanoseconds(1));
        }
    }
}
