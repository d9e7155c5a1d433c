//! The three rolling observation windows every windowed metric is computed
//! over, and the generic envelope holding one value per window.

use chrono::{DateTime, Months, Utc};
use serde::Serialize;

/// Observation window applied to a record set before aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Window {
    LastSixMonths,
    LastTwelveMonths,
    FromTheBeginning,
}

impl Window {
    /// All windows, narrowest first.
    pub const ALL: [Window; 3] = [
        Window::LastSixMonths,
        Window::LastTwelveMonths,
        Window::FromTheBeginning,
    ];

    /// Returns the canonical name used in exports.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LastSixMonths => "lastSixMonths",
            Self::LastTwelveMonths => "lastTwelveMonths",
            Self::FromTheBeginning => "fromTheBeginning",
        }
    }

    /// Earliest instant included in the window, or `None` when unbounded.
    pub fn cutoff(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::LastSixMonths => Some(months_before(now, 6)),
            Self::LastTwelveMonths => Some(months_before(now, 12)),
            Self::FromTheBeginning => None,
        }
    }
}

/// Calendar-aware `now - months`, clamped to the last day of the target
/// month (31 Mar - 1 month = 29 Feb on leap years).
pub fn months_before(now: DateTime<Utc>, months: u32) -> DateTime<Utc> {
    now.checked_sub_months(Months::new(months))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Whether `at` falls inside a window starting at `cutoff`.
pub fn within(at: DateTime<Utc>, cutoff: Option<DateTime<Utc>>) -> bool {
    cutoff.map_or(true, |cutoff| at >= cutoff)
}

/// The same statistic computed over the three observation windows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Windowed<T> {
    pub last_six_months: T,
    pub last_twelve_months: T,
    pub from_the_beginning: T,
}

impl<T> Windowed<T> {
    /// Compute `compute(cutoff)` for each window, anchored at `now`.
    ///
    /// `compute` must read from one immutable snapshot for the windows to
    /// nest; callers hand in borrowed data, never a live source.
    pub fn build<F>(now: DateTime<Utc>, mut compute: F) -> Self
    where
        F: FnMut(Option<DateTime<Utc>>) -> T,
    {
        Self {
            last_six_months: compute(Window::LastSixMonths.cutoff(now)),
            last_twelve_months: compute(Window::LastTwelveMonths.cutoff(now)),
            from_the_beginning: compute(Window::FromTheBeginning.cutoff(now)),
        }
    }

    /// Fallible variant of [`Windowed::build`] that hands the window itself
    /// to `compute`, for metrics whose parameters differ per window.
    pub fn try_build<F, E>(mut compute: F) -> Result<Self, E>
    where
        F: FnMut(Window) -> Result<T, E>,
    {
        Ok(Self {
            last_six_months: compute(Window::LastSixMonths)?,
            last_twelve_months: compute(Window::LastTwelveMonths)?,
            from_the_beginning: compute(Window::FromTheBeginning)?,
        })
    }

    /// Returns the value for `window`.
    pub fn get(&self, window: Window) -> &T {
        match window {
            Window::LastSixMonths => &self.last_six_months,
            Window::LastTwelveMonths => &self.last_twelve_months,
            Window::FromTheBeginning => &self.from_the_beginning,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_cutoffs() {
        let now = now();
        assert_eq!(
            Window::LastSixMonths.cutoff(now),
            Some(Utc.with_ymd_and_hms(2023, 12, 15, 10, 0, 0).unwrap())
        );
        assert_eq!(
            Window::LastTwelveMonths.cutoff(now),
            Some(Utc.with_ymd_and_hms(2023, 6, 15, 10, 0, 0).unwrap())
        );
        assert_eq!(Window::FromTheBeginning.cutoff(now), None);
    }

    #[test]
    fn test_months_before_clamps_to_month_end() {
        let end_of_march = Utc.with_ymd_and_hms(2024, 3, 31, 0, 0, 0).unwrap();
        assert_eq!(
            months_before(end_of_march, 1),
            Utc.with_ymd_and_hms(2024, 2, 29, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_cutoff_is_inclusive() {
        let now = now();
        let cutoff = Window::LastSixMonths.cutoff(now);
        let at_cutoff = months_before(now, 6);

        assert!(within(at_cutoff, cutoff));
        assert!(!within(at_cutoff - Duration::milliseconds(1), cutoff));
        assert!(within(now, cutoff));
        assert!(within(DateTime::<Utc>::MIN_UTC, None));

        let counts = Windowed::build(now, |cutoff| usize::from(within(at_cutoff, cutoff)));
        assert_eq!(counts.last_six_months, 1);
    }

    #[test]
    fn test_build_calls_compute_once_per_window_in_order() {
        let mut seen = Vec::new();
        let windowed = Windowed::build(now(), |cutoff| {
            seen.push(cutoff);
            seen.len()
        });
        assert_eq!(windowed.last_six_months, 1);
        assert_eq!(windowed.last_twelve_months, 2);
        assert_eq!(windowed.from_the_beginning, 3);
        assert_eq!(seen[2], None);
        assert!(seen[0] > seen[1]);
    }

    #[test]
    fn test_window_counts_nest() {
        let now = now();
        let events: Vec<DateTime<Utc>> = (0..40)
            .map(|i| now - Duration::days(i * 17))
            .collect();

        let counts =
            Windowed::build(now, |cutoff| events.iter().filter(|at| within(**at, cutoff)).count());

        assert!(counts.last_six_months <= counts.last_twelve_months);
        assert!(counts.last_twelve_months <= counts.from_the_beginning);
        assert_eq!(counts.from_the_beginning, events.len());
        assert!(counts.last_six_months < counts.from_the_beginning);
    }

    #[test]
    fn test_try_build_propagates_first_error() {
        let result: Result<Windowed<u8>, String> = Windowed::try_build(|window| match window {
            Window::LastTwelveMonths => Err("boom".to_string()),
            _ => Ok(1),
        });
        assert_eq!(result.unwrap_err(), "boom");
    }

    #[test]
    fn test_serializes_with_window_keys() {
        let windowed = Windowed {
            last_six_months: 1,
            last_twelve_months: 2,
            from_the_beginning: 3,
        };
        let json = serde_json::to_value(&windowed).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({"lastSixMonths": 1, "lastTwelveMonths": 2, "fromTheBeginning": 3})
        );
        assert_eq!(*windowed.get(Window::FromTheBeginning), 3);
        assert_eq!(Window::ALL[1].as_str(), "lastTwelveMonths");
    }
}
