//! Daily power-window schedule and the system clock.
//!
//! The window is a fixed start/end time pair that may span midnight. All
//! calendar arithmetic lives here, outside the core, which only consumes the
//! `WindowSchedule` view. Sunrise/sunset-style windows are out of scope.

use chrono::{DateTime, NaiveTime, TimeDelta, Utc};
use power_core::orchestrator::{Clock, WindowSchedule};

/// Wall-clock source backed by the operating system.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fixed daily on-window, possibly wrapping midnight.
pub struct DailyWindow<C: Clock> {
    start: NaiveTime,
    end: NaiveTime,
    clock: C,
}

impl<C: Clock> DailyWindow<C> {
    /// Creates a window running daily from `start` to `end`.
    pub const fn new(start: NaiveTime, end: NaiveTime, clock: C) -> Self {
        Self { start, end, clock }
    }

    fn contains(&self, now: &DateTime<Utc>) -> bool {
        let time = now.time();
        if self.start <= self.end {
            time >= self.start && time < self.end
        } else {
            time >= self.start || time < self.end
        }
    }

    fn next_occurrence(&self, of: NaiveTime, now: &DateTime<Utc>) -> DateTime<Utc> {
        let today = now.date_naive().and_time(of).and_utc();
        if today > *now {
            today
        } else {
            today + TimeDelta::days(1)
        }
    }
}

impl<C: Clock> WindowSchedule for DailyWindow<C> {
    fn is_active(&self) -> bool {
        self.contains(&self.clock.now())
    }

    fn next_start(&self) -> DateTime<Utc> {
        let now = self.clock.now();
        self.next_occurrence(self.start, &now)
    }

    fn next_end(&self) -> DateTime<Utc> {
        let now = self.clock.now();
        self.next_occurrence(self.end, &now)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        NaiveDate::from_ymd_opt(2026, 8, 6)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
            .and_utc()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn overnight(clock: DateTime<Utc>) -> DailyWindow<FixedClock> {
        DailyWindow::new(time(22, 0), time(6, 0), FixedClock(clock))
    }

    #[test]
    fn overnight_window_is_active_on_both_sides_of_midnight() {
        assert!(overnight(at(23, 0)).is_active());
        assert!(overnight(at(1, 30)).is_active());
        assert!(!overnight(at(12, 0)).is_active());
        assert!(!overnight(at(21, 58)).is_active());
    }

    #[test]
    fn just_before_start_the_window_is_imminent_not_active() {
        let window = overnight(at(21, 58));
        assert!(!window.is_active());
        assert_eq!(window.next_start(), at(22, 0));
        assert_eq!(window.next_start() - at(21, 58), TimeDelta::minutes(2));
    }

    #[test]
    fn next_end_lands_on_the_following_morning() {
        // 21:58 today: the coming window runs 22:00 -> 06:00 tomorrow.
        let window = overnight(at(21, 58));
        assert_eq!(
            window.next_end(),
            at(6, 0) + TimeDelta::days(1),
            "the 06:00 end belongs to the next day"
        );
    }

    #[test]
    fn inside_the_window_next_end_is_the_current_end() {
        let window = overnight(at(23, 30));
        assert_eq!(window.next_end(), at(6, 0) + TimeDelta::days(1));

        let early = overnight(at(5, 0));
        assert_eq!(early.next_end(), at(6, 0));
    }

    #[test]
    fn daytime_window_does_not_wrap() {
        let window = DailyWindow::new(time(9, 0), time(17, 0), FixedClock(at(8, 0)));
        assert!(!window.is_active());
        assert_eq!(window.next_start(), at(9, 0));
        assert_eq!(window.next_end(), at(17, 0));

        let afternoon = DailyWindow::new(time(9, 0), time(17, 0), FixedClock(at(12, 0)));
        assert!(afternoon.is_active());
        assert_eq!(afternoon.next_start(), at(9, 0) + TimeDelta::days(1));
    }

    #[test]
    fn boundaries_are_start_inclusive_end_exclusive() {
        assert!(overnight(at(22, 0)).is_active());
        assert!(!overnight(at(6, 0)).is_active());
    }
}
