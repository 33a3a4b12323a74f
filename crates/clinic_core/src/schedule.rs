//! crates/clinic_core/src/schedule.rs
//!
//! Slot generation for priority bookings, queue windows for first-come bookings,
//! queue-position assignment and the display token derived from them.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::domain::{Appointment, BookingMode, QueueOccupancy};
use crate::ports::{PortError, PortResult};

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or_default()
}

//=========================================================================================
// Policy
//=========================================================================================

/// The clinic's opening hours and booking rules.
#[derive(Debug, Clone)]
pub struct ClinicPolicy {
    pub opens_at: NaiveTime,
    pub closes_at: NaiveTime,
    pub slot_length: Duration,
    /// Number of days, starting today, that can be booked.
    pub window_days: u32,
    pub queue_windows: Vec<NaiveTime>,
    pub queue_window_length: Duration,
    pub queue_capacity: u32,
    pub priority_surcharge: i32,
}

impl Default for ClinicPolicy {
    fn default() -> Self {
        Self {
            opens_at: hm(10, 0),
            closes_at: hm(21, 0),
            slot_length: Duration::minutes(30),
            window_days: 7,
            queue_windows: vec![hm(10, 0), hm(12, 0), hm(15, 0), hm(17, 0)],
            queue_window_length: Duration::hours(2),
            queue_capacity: 15,
            priority_surcharge: 500,
        }
    }
}

impl ClinicPolicy {
    /// Start times of every priority slot in a day, in order.
    pub fn priority_grid(&self) -> Vec<NaiveTime> {
        let mut grid = Vec::new();
        if self.slot_length <= Duration::zero() {
            return grid;
        }
        let mut start = self.opens_at;
        while start < self.closes_at {
            grid.push(start);
            let (next, wrapped) = start.overflowing_add_signed(self.slot_length);
            if wrapped != 0 {
                break;
            }
            start = next;
        }
        grid
    }

    /// First and last bookable dates relative to `now`.
    pub fn booking_window(&self, now: NaiveDateTime) -> (NaiveDate, NaiveDate) {
        let first = now.date();
        let last = first + Duration::days(i64::from(self.window_days.max(1)) - 1);
        (first, last)
    }

    /// Returns the 1-based index of `time` in the grid for `mode`.
    pub fn classify(&self, time: NaiveTime, mode: BookingMode) -> PortResult<u32> {
        let position = match mode {
            BookingMode::Priority => self.priority_grid().iter().position(|t| *t == time),
            BookingMode::Queue => self.queue_windows.iter().position(|t| *t == time),
        };
        position.map(|p| p as u32 + 1).ok_or_else(|| {
            PortError::Invalid(format!(
                "{} is not a {} slot",
                time.format("%H:%M"),
                mode.as_str()
            ))
        })
    }

    /// Checks that a slot starting at `date`/`time` is still ahead of `now` and
    /// inside the booking window.
    pub fn ensure_bookable(
        &self,
        now: NaiveDateTime,
        date: NaiveDate,
        time: NaiveTime,
    ) -> PortResult<()> {
        if date.and_time(time) <= now {
            return Err(PortError::Invalid("slot is in the past".to_string()));
        }
        self.ensure_within_window(now, date)
    }

    /// Walk-ins may join a queue window until it closes, even after it started.
    pub fn ensure_joinable(
        &self,
        now: NaiveDateTime,
        date: NaiveDate,
        window_start: NaiveTime,
    ) -> PortResult<()> {
        if date.and_time(window_start) + self.queue_window_length <= now {
            return Err(PortError::Invalid("queue window has closed".to_string()));
        }
        self.ensure_within_window(now, date)
    }

    fn ensure_within_window(&self, now: NaiveDateTime, date: NaiveDate) -> PortResult<()> {
        let (_, last) = self.booking_window(now);
        if date > last {
            return Err(PortError::Invalid(format!(
                "slots can only be booked up to {}",
                last
            )));
        }
        Ok(())
    }

    /// The fee charged for a booking in `mode`.
    pub fn amount_for(&self, fees: i32, mode: BookingMode) -> i32 {
        match mode {
            BookingMode::Queue => fees,
            BookingMode::Priority => fees.saturating_add(self.priority_surcharge),
        }
    }

    /// Unbooked priority slots for every day of the booking window.
    ///
    /// On the first day only slots starting after `now` are offered. Slot indices
    /// refer to the full day grid, so they do not shift when earlier slots are taken.
    pub fn priority_schedule(
        &self,
        now: NaiveDateTime,
        booked: &[(NaiveDate, NaiveTime)],
    ) -> Vec<DaySlots> {
        let booked: HashSet<&(NaiveDate, NaiveTime)> = booked.iter().collect();
        let grid = self.priority_grid();
        let (first, _) = self.booking_window(now);

        (0..self.window_days)
            .map(|offset| {
                let date = first + Duration::days(i64::from(offset));
                let slots = grid
                    .iter()
                    .enumerate()
                    .filter_map(|(i, time)| {
                        let start = date.and_time(*time);
                        if start <= now || booked.contains(&(date, *time)) {
                            return None;
                        }
                        let index = i as u32 + 1;
                        Some(Slot {
                            index,
                            start,
                            end: start + self.slot_length,
                            token: Token::new(date, index, 1),
                        })
                    })
                    .collect();
                DaySlots { date, slots }
            })
            .collect()
    }

    /// Queue windows for every day of the booking window with their occupancy.
    ///
    /// Windows starting at or before `now` are left out of the first day.
    pub fn queue_schedule(
        &self,
        now: NaiveDateTime,
        occupancy: &[QueueOccupancy],
    ) -> Vec<DayQueue> {
        let taken: HashMap<(NaiveDate, NaiveTime), &[u32]> = occupancy
            .iter()
            .map(|o| ((o.date, o.window_start), o.taken_positions.as_slice()))
            .collect();
        let (first, _) = self.booking_window(now);

        (0..self.window_days)
            .map(|offset| {
                let date = first + Duration::days(i64::from(offset));
                let windows = self
                    .queue_windows
                    .iter()
                    .enumerate()
                    .filter_map(|(i, time)| {
                        let start = date.and_time(*time);
                        if start <= now {
                            return None;
                        }
                        let positions = taken.get(&(date, *time)).copied().unwrap_or(&[]);
                        Some(self.queue_window(date, i as u32 + 1, start, positions))
                    })
                    .collect();
                DayQueue { date, windows }
            })
            .collect()
    }

    /// Describes a single queue window given the positions already taken in it.
    pub fn queue_window(
        &self,
        date: NaiveDate,
        index: u32,
        start: NaiveDateTime,
        taken: &[u32],
    ) -> QueueWindow {
        let booked = taken.len() as u32;
        let next_position = lowest_free_position(taken, self.queue_capacity);
        QueueWindow {
            index,
            start,
            end: start + self.queue_window_length,
            booked,
            capacity: self.queue_capacity,
            next_position,
            next_token: next_position.map(|p| Token::new(date, index, p)),
        }
    }
}

//=========================================================================================
// Schedule Output Types
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub index: u32,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub token: Token,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaySlots {
    pub date: NaiveDate,
    pub slots: Vec<Slot>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueWindow {
    pub index: u32,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub booked: u32,
    pub capacity: u32,
    /// Position the next booking would get; `None` when the window is full.
    pub next_position: Option<u32>,
    pub next_token: Option<Token>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayQueue {
    pub date: NaiveDate,
    pub windows: Vec<QueueWindow>,
}

//=========================================================================================
// Queue Positions and Tokens
//=========================================================================================

/// The smallest position in `1..=capacity` that no active booking holds.
pub fn lowest_free_position(taken: &[u32], capacity: u32) -> Option<u32> {
    let taken: HashSet<u32> = taken.iter().copied().collect();
    (1..=capacity).find(|p| !taken.contains(p))
}

/// Display code handed to the patient: day of month, slot index and queue position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token {
    pub day: u32,
    pub slot_index: u32,
    pub queue_position: u32,
}

impl Token {
    pub fn new(date: NaiveDate, slot_index: u32, queue_position: u32) -> Self {
        Self {
            day: date.day(),
            slot_index,
            queue_position,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{:02}{:02}{:02}",
            self.day, self.slot_index, self.queue_position
        )
    }
}

impl Appointment {
    pub fn token(&self) -> Token {
        Token::new(self.slot_date, self.slot_index, self.queue_position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn at(date: &str, time: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(&format!("{} {}", date, time), "%Y-%m-%d %H:%M").unwrap()
    }

    fn day(date: &str) -> NaiveDate {
        NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn default_grid_runs_from_opening_to_last_half_hour() {
        let grid = ClinicPolicy::default().priority_grid();
        assert_eq!(grid.len(), 22);
        assert_eq!(grid.first(), Some(&hm(10, 0)));
        assert_eq!(grid.last(), Some(&hm(20, 30)));
    }

    #[test_case("09:00", 22 ; "before opening every slot is offered")]
    #[test_case("10:10", 21 ; "slot already started is skipped")]
    #[test_case("10:30", 20 ; "slot starting right now is skipped")]
    #[test_case("20:45", 0 ; "after the last slot nothing is left")]
    fn first_day_only_offers_future_slots(now: &str, expected: usize) {
        let policy = ClinicPolicy::default();
        let schedule = policy.priority_schedule(at("2026-03-02", now), &[]);
        assert_eq!(schedule.len(), 7);
        assert_eq!(schedule[0].slots.len(), expected);
        assert_eq!(schedule[1].slots.len(), 22);
    }

    #[test]
    fn booked_slots_are_excluded_without_shifting_indices() {
        let policy = ClinicPolicy::default();
        let booked = vec![(day("2026-03-03"), hm(10, 30))];
        let schedule = policy.priority_schedule(at("2026-03-02", "08:00"), &booked);

        let tuesday = &schedule[1];
        assert_eq!(tuesday.date, day("2026-03-03"));
        assert_eq!(tuesday.slots.len(), 21);
        assert_eq!(tuesday.slots[0].index, 1);
        assert_eq!(tuesday.slots[1].index, 3);
        assert_eq!(tuesday.slots[1].start, at("2026-03-03", "11:00"));
        assert_eq!(tuesday.slots[1].token.to_string(), "#030301");
    }

    #[test]
    fn queue_schedule_hides_started_windows_and_reports_next_position() {
        let policy = ClinicPolicy::default();
        let occupancy = vec![QueueOccupancy {
            date: day("2026-03-02"),
            window_start: hm(15, 0),
            taken_positions: vec![1, 2, 4],
        }];
        let schedule = policy.queue_schedule(at("2026-03-02", "11:00"), &occupancy);

        let today = &schedule[0];
        let starts: Vec<_> = today.windows.iter().map(|w| w.start.time()).collect();
        assert_eq!(starts, vec![hm(12, 0), hm(15, 0), hm(17, 0)]);

        let afternoon = &today.windows[1];
        assert_eq!(afternoon.index, 3);
        assert_eq!(afternoon.booked, 3);
        assert_eq!(afternoon.next_position, Some(3));
        let next_token = afternoon.next_token.map(|t| t.to_string());
        assert_eq!(next_token.as_deref(), Some("#020303"));
        assert_eq!(afternoon.end, at("2026-03-02", "17:00"));

        assert_eq!(schedule[1].windows.len(), 4);
    }

    #[test]
    fn full_window_has_no_next_position() {
        let policy = ClinicPolicy {
            queue_capacity: 2,
            ..ClinicPolicy::default()
        };
        let start = at("2026-03-05", "12:00");
        let window = policy.queue_window(day("2026-03-05"), 2, start, &[2, 1]);
        assert_eq!(window.next_position, None);
        assert_eq!(window.next_token, None);
    }

    #[test_case(&[], 15, Some(1))]
    #[test_case(&[1, 2, 3], 15, Some(4))]
    #[test_case(&[2, 3], 15, Some(1) ; "gap left by a cancellation is reused")]
    #[test_case(&[1, 2, 3], 3, None)]
    fn lowest_free_position_cases(taken: &[u32], capacity: u32, expected: Option<u32>) {
        assert_eq!(lowest_free_position(taken, capacity), expected);
    }

    #[test]
    fn token_pads_each_component() {
        assert_eq!(Token::new(day("2026-03-07"), 1, 9).to_string(), "#070109");
        assert_eq!(Token::new(day("2026-03-21"), 12, 15).to_string(), "#211215");
    }

    #[test]
    fn classify_rejects_off_grid_times() {
        let policy = ClinicPolicy::default();
        assert_eq!(policy.classify(hm(10, 30), BookingMode::Priority).unwrap(), 2);
        assert_eq!(policy.classify(hm(15, 0), BookingMode::Queue).unwrap(), 3);
        assert!(policy.classify(hm(10, 30), BookingMode::Queue).is_err());
        assert!(policy.classify(hm(10, 15), BookingMode::Priority).is_err());
        assert!(policy.classify(hm(21, 0), BookingMode::Priority).is_err());
    }

    #[test]
    fn bookable_window_is_bounded_on_both_sides() {
        let policy = ClinicPolicy::default();
        let now = at("2026-03-02", "12:00");
        assert!(policy.ensure_bookable(now, day("2026-03-02"), hm(11, 30)).is_err());
        assert!(policy.ensure_bookable(now, day("2026-03-02"), hm(12, 30)).is_ok());
        assert!(policy.ensure_bookable(now, day("2026-03-08"), hm(10, 0)).is_ok());
        assert!(policy.ensure_bookable(now, day("2026-03-09"), hm(10, 0)).is_err());
    }

    #[test_case("11:59", 3 ; "before noon the noon window is offered")]
    #[test_case("12:00", 2 ; "window starting right now is not offered")]
    #[test_case("12:01", 2 ; "window that started is not offered")]
    fn queue_schedule_agrees_with_bookability(now: &str, expected: usize) {
        let policy = ClinicPolicy::default();
        let now = at("2026-03-02", now);
        let today = &policy.queue_schedule(now, &[])[0];
        assert_eq!(today.windows.len(), expected);
        for window in &today.windows {
            let (date, time) = (window.start.date(), window.start.time());
            assert!(policy.ensure_bookable(now, date, time).is_ok());
        }
        let noon_offered = today.windows.iter().any(|w| w.start.time() == hm(12, 0));
        let noon_bookable = policy.ensure_bookable(now, day("2026-03-02"), hm(12, 0)).is_ok();
        assert_eq!(noon_offered, noon_bookable);
    }

    #[test_case("10:30", true ; "inside the running window")]
    #[test_case("11:59", true ; "one minute before it closes")]
    #[test_case("12:00", false ; "once the window has closed")]
    fn walk_ins_can_join_a_running_window(now: &str, joinable: bool) {
        let policy = ClinicPolicy::default();
        let now = at("2026-03-02", now);
        let result = policy.ensure_joinable(now, day("2026-03-02"), hm(10, 0));
        assert_eq!(result.is_ok(), joinable);
        // Online bookings still need a window that has not started.
        assert!(policy.ensure_bookable(now, day("2026-03-02"), hm(10, 0)).is_err());
    }

    #[test]
    fn walk_ins_respect_the_booking_window() {
        let policy = ClinicPolicy::default();
        let now = at("2026-03-02", "10:30");
        assert!(policy.ensure_joinable(now, day("2026-03-08"), hm(17, 0)).is_ok());
        assert!(policy.ensure_joinable(now, day("2026-03-09"), hm(10, 0)).is_err());
    }

    #[test]
    fn priority_costs_the_surcharge() {
        let policy = ClinicPolicy::default();
        assert_eq!(policy.amount_for(300, BookingMode::Queue), 300);
        assert_eq!(policy.amount_for(300, BookingMode::Priority), 800);
    }
}
