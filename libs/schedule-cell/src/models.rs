// libs/schedule-cell/src/models.rs
use std::collections::HashSet;

use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ==============================================================================
// SCHEDULE MODELS
// ==============================================================================

/// Half-open working window `[start, end)` within one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl Interval {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    pub fn is_valid(&self) -> bool {
        self.start < self.end
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        self.start <= time && time < self.end
    }
}

/// A date-specific override of the weekly template. `window: None` closes the day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleException {
    pub date: NaiveDate,
    #[serde(default)]
    pub window: Option<Interval>,
}

/// Weekly working calendar of a hospital or of one of its service categories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub weekdays: Interval,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saturday: Option<Interval>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sunday: Option<Interval>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exceptions: Vec<ScheduleException>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayWindow {
    Open(Interval),
    Closed,
}

impl DayWindow {
    pub fn interval(&self) -> Option<Interval> {
        match self {
            DayWindow::Open(interval) => Some(*interval),
            DayWindow::Closed => None,
        }
    }
}

impl Schedule {
    /// Hospital default: the same hours Monday to Friday, weekends closed.
    pub fn weekdays_only(hours: Interval) -> Self {
        Self {
            weekdays: hours,
            saturday: None,
            sunday: None,
            exceptions: Vec::new(),
        }
    }

    pub fn with_saturday(mut self, hours: Interval) -> Self {
        self.saturday = Some(hours);
        self
    }

    pub fn with_sunday(mut self, hours: Interval) -> Self {
        self.sunday = Some(hours);
        self
    }

    pub fn with_exception(mut self, date: NaiveDate, window: Option<Interval>) -> Self {
        self.exceptions.push(ScheduleException { date, window });
        self
    }

    /// Configuration-time check. Zero-width and inverted windows are refused here
    /// so that booking never has to second-guess a stored schedule.
    pub fn validate(&self) -> Result<(), ScheduleError> {
        check_interval("weekdays", &self.weekdays)?;
        if let Some(saturday) = &self.saturday {
            check_interval("saturday", saturday)?;
        }
        if let Some(sunday) = &self.sunday {
            check_interval("sunday", sunday)?;
        }

        let mut seen = HashSet::new();
        for exception in &self.exceptions {
            if !seen.insert(exception.date) {
                return Err(ScheduleError::DuplicateException(exception.date));
            }
            if let Some(window) = &exception.window {
                check_interval(&exception.date.to_string(), window)?;
            }
        }

        Ok(())
    }

    /// Total and deterministic: every date resolves to a window or to `Closed`.
    pub fn resolve_day_window(&self, date: NaiveDate) -> DayWindow {
        let window = match self.exceptions.iter().find(|e| e.date == date) {
            Some(exception) => exception.window,
            None => match date.weekday() {
                Weekday::Sat => self.saturday,
                Weekday::Sun => self.sunday,
                _ => Some(self.weekdays),
            },
        };

        match window {
            Some(interval) if interval.is_valid() => DayWindow::Open(interval),
            _ => DayWindow::Closed,
        }
    }
}

/// Free-function form of [`Schedule::resolve_day_window`].
pub fn resolve_day_window(schedule: &Schedule, date: NaiveDate) -> DayWindow {
    schedule.resolve_day_window(date)
}

fn check_interval(day: &str, interval: &Interval) -> Result<(), ScheduleError> {
    if interval.start == interval.end {
        return Err(ScheduleError::EmptyWindow { day: day.to_string() });
    }
    if interval.start > interval.end {
        return Err(ScheduleError::InvertedWindow { day: day.to_string() });
    }
    Ok(())
}

// ==============================================================================
// ERRORS AND REJECTIONS
// ==============================================================================

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("Working hours for {day} have zero length")]
    EmptyWindow { day: String },

    #[error("Working hours for {day} end before they start")]
    InvertedWindow { day: String },

    #[error("More than one exception for {0}")]
    DuplicateException(NaiveDate),
}

/// Why a candidate slot cannot be booked. Checked in declaration order.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    #[error("day closed")]
    DayClosed,

    #[error("outside hours")]
    OutsideHours,

    #[error("past date")]
    PastDate,

    #[error("slot taken")]
    SlotTaken,
}

impl Rejection {
    pub fn reason(&self) -> &'static str {
        match self {
            Rejection::DayClosed => "day closed",
            Rejection::OutsideHours => "outside hours",
            Rejection::PastDate => "past date",
            Rejection::SlotTaken => "slot taken",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hm(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
    }

    fn nine_to_five() -> Schedule {
        Schedule::weekdays_only(Interval::new(hm(9, 0), hm(17, 0)))
    }

    // 2030-01-07 is a Monday
    fn day(offset: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 1, 7 + offset).unwrap()
    }

    #[test]
    fn weekdays_use_weekday_hours() {
        let schedule = nine_to_five();
        for offset in 0..5 {
            assert_eq!(
                schedule.resolve_day_window(day(offset)),
                DayWindow::Open(Interval::new(hm(9, 0), hm(17, 0)))
            );
        }
    }

    #[test]
    fn weekends_are_closed_without_override() {
        let schedule = nine_to_five();
        assert_eq!(schedule.resolve_day_window(day(5)), DayWindow::Closed);
        assert_eq!(schedule.resolve_day_window(day(6)), DayWindow::Closed);
    }

    #[test]
    fn weekend_overrides_apply() {
        let schedule = nine_to_five()
            .with_saturday(Interval::new(hm(10, 0), hm(14, 0)))
            .with_sunday(Interval::new(hm(11, 0), hm(13, 0)));
        assert_eq!(
            resolve_day_window(&schedule, day(5)).interval(),
            Some(Interval::new(hm(10, 0), hm(14, 0)))
        );
        assert_eq!(
            resolve_day_window(&schedule, day(6)).interval(),
            Some(Interval::new(hm(11, 0), hm(13, 0)))
        );
    }

    #[test]
    fn exceptions_override_weekly_rule() {
        let schedule = nine_to_five()
            .with_exception(day(1), None)
            .with_exception(day(5), Some(Interval::new(hm(8, 0), hm(12, 0))));
        assert_eq!(schedule.resolve_day_window(day(1)), DayWindow::Closed);
        assert_eq!(
            schedule.resolve_day_window(day(5)),
            DayWindow::Open(Interval::new(hm(8, 0), hm(12, 0)))
        );
    }

    #[test]
    fn zero_width_window_resolves_closed_and_fails_validation() {
        let schedule = Schedule::weekdays_only(Interval::new(hm(9, 0), hm(9, 0)));
        assert_eq!(schedule.resolve_day_window(day(0)), DayWindow::Closed);
        assert_eq!(
            schedule.validate(),
            Err(ScheduleError::EmptyWindow { day: "weekdays".to_string() })
        );
    }

    #[test]
    fn validation_rejects_inverted_and_duplicate_entries() {
        let inverted = nine_to_five().with_saturday(Interval::new(hm(14, 0), hm(10, 0)));
        assert_eq!(
            inverted.validate(),
            Err(ScheduleError::InvertedWindow { day: "saturday".to_string() })
        );

        let duplicated = nine_to_five().with_exception(day(2), None).with_exception(day(2), None);
        assert_eq!(duplicated.validate(), Err(ScheduleError::DuplicateException(day(2))));

        assert_eq!(nine_to_five().validate(), Ok(()));
    }

    #[test]
    fn interval_is_half_open() {
        let interval = Interval::new(hm(9, 0), hm(17, 0));
        assert!(interval.contains(hm(9, 0)));
        assert!(interval.contains(hm(16, 59)));
        assert!(!interval.contains(hm(17, 0)));
        assert!(!interval.contains(hm(8, 59)));
    }

    #[test]
    fn schedule_deserializes_from_catalogue_json() {
        let schedule: Schedule = serde_json::from_str(
            r#"{"weekdays":{"start":"09:00:00","end":"17:00:00"},"saturday":{"start":"10:00:00","end":"14:00:00"}}"#,
        )
        .unwrap();
        assert_eq!(schedule.saturday, Some(Interval::new(hm(10, 0), hm(14, 0))));
        assert!(schedule.sunday.is_none());
        assert!(schedule.exceptions.is_empty());
    }

    #[test]
    fn rejection_displays_its_wire_reason() {
        for rejection in [
            Rejection::DayClosed,
            Rejection::OutsideHours,
            Rejection::PastDate,
            Rejection::SlotTaken,
        ] {
            assert_eq!(rejection.to_string(), rejection.reason());
        }
        assert_eq!(Rejection::SlotTaken.to_string(), "slot taken");
    }
}
