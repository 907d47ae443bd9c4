use std::collections::BTreeSet;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use tracing::debug;

use crate::models::{DayWindow, Rejection, Schedule};

/// Decides whether clinic-local date-times can be booked against a schedule.
///
/// All values are wall-clock times in the clinic's zone. The resolver is a
/// fast-path filter only: the store's uniqueness constraint is what finally
/// prevents two bookings of one slot.
#[derive(Debug, Clone, Copy)]
pub struct AvailabilityResolver {
    slot: Duration,
}

impl AvailabilityResolver {
    pub fn new(slot_minutes: i64) -> Self {
        Self {
            slot: Duration::minutes(slot_minutes.max(1)),
        }
    }

    pub fn slot(&self) -> Duration {
        self.slot
    }

    pub fn is_bookable(
        &self,
        schedule: &Schedule,
        booked: &BTreeSet<NaiveDateTime>,
        candidate: NaiveDateTime,
        now: NaiveDateTime,
    ) -> Result<(), Rejection> {
        is_bookable(schedule, booked, candidate, now)
    }

    pub fn list_available_dates<'a>(
        &self,
        schedule: &'a Schedule,
        booked: &'a BTreeSet<NaiveDateTime>,
        range_start: NaiveDateTime,
        range_end: NaiveDateTime,
    ) -> AvailableSlots<'a> {
        list_available_dates(schedule, booked, range_start, range_end, self.slot)
    }
}

pub fn is_bookable(
    schedule: &Schedule,
    booked: &BTreeSet<NaiveDateTime>,
    candidate: NaiveDateTime,
    now: NaiveDateTime,
) -> Result<(), Rejection> {
    let window = match schedule.resolve_day_window(candidate.date()) {
        DayWindow::Open(window) => window,
        DayWindow::Closed => return reject(candidate, Rejection::DayClosed),
    };

    if !window.contains(candidate.time()) {
        return reject(candidate, Rejection::OutsideHours);
    }

    if candidate < now {
        return reject(candidate, Rejection::PastDate);
    }

    if booked.contains(&candidate) {
        return reject(candidate, Rejection::SlotTaken);
    }

    Ok(())
}

fn reject(candidate: NaiveDateTime, rejection: Rejection) -> Result<(), Rejection> {
    debug!("Candidate {} rejected: {}", candidate, rejection);
    Err(rejection)
}

/// Every open slot in `[range_start, range_end)`, stepping `slot` from the start
/// of each day's window. Booked slots and closed days never appear.
pub fn list_available_dates<'a>(
    schedule: &'a Schedule,
    booked: &'a BTreeSet<NaiveDateTime>,
    range_start: NaiveDateTime,
    range_end: NaiveDateTime,
    slot: Duration,
) -> AvailableSlots<'a> {
    AvailableSlots {
        schedule,
        booked,
        range_start,
        range_end,
        slot,
        day: range_start.date(),
        cursor: None,
    }
}

/// Lazy walk over open slots. Cloning restarts from the clone's position.
#[derive(Debug, Clone)]
pub struct AvailableSlots<'a> {
    schedule: &'a Schedule,
    booked: &'a BTreeSet<NaiveDateTime>,
    range_start: NaiveDateTime,
    range_end: NaiveDateTime,
    slot: Duration,
    day: NaiveDate,
    // next candidate and the end of the current day's window
    cursor: Option<(NaiveDateTime, NaiveDateTime)>,
}

impl Iterator for AvailableSlots<'_> {
    type Item = NaiveDateTime;

    fn next(&mut self) -> Option<Self::Item> {
        if self.slot <= Duration::zero() {
            return None;
        }

        loop {
            match self.cursor {
                Some((candidate, window_end))
                    if candidate < window_end && candidate < self.range_end =>
                {
                    self.cursor = Some((candidate + self.slot, window_end));
                    if candidate >= self.range_start && !self.booked.contains(&candidate) {
                        return Some(candidate);
                    }
                }
                Some(_) => {
                    self.cursor = None;
                    self.day = self.day.succ_opt()?;
                }
                None => {
                    if self.day.and_hms_opt(0, 0, 0)? >= self.range_end {
                        return None;
                    }
                    match self.schedule.resolve_day_window(self.day) {
                        DayWindow::Open(window) => {
                            self.cursor = Some((
                                self.day.and_time(window.start),
                                self.day.and_time(window.end),
                            ));
                        }
                        DayWindow::Closed => {
                            self.day = self.day.succ_opt()?;
                        }
                    }
                }
            }
        }
    }
}
