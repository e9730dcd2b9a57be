//! Availability aggregation and the day calendar grid.
//!
//! [`build_calendar`] fans out one busy-time fetch per room, joins them all,
//! and lays every room's day out as 15-minute cells between 08:00 and 23:00.
//! A room whose fetch fails or times out still gets a row (all free).

use crate::service::BookingService;
use crate::types::{AuthTokens, Interval, Reservation, Room, RoomId};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use roombook_runtime::metrics::CalendarMetrics;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// First displayed hour
pub const DAY_START_HOUR: u32 = 8;

/// Hour at which the displayed day ends
pub const DAY_END_HOUR: u32 = 23;

/// Width of one cell in minutes
pub const CELL_MINUTES: u32 = 15;

/// Cells per row: 15 hours at 4 cells per hour
pub const CELLS_PER_ROW: usize = ((DAY_END_HOUR - DAY_START_HOUR) * 60 / CELL_MINUTES) as usize;

/// State of one 15-minute cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Cell {
    /// Nobody booked it
    Free,
    /// Booked by someone else
    OccupiedOther,
    /// Booked by the current user
    OccupiedSelf,
}

/// One room's day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarRow {
    /// Room identifier
    pub room_id: RoomId,
    /// Room name
    pub room_name: String,
    /// Busy intervals reported by the service
    pub occupied: Vec<Interval>,
    /// The user's own reservations in this room
    pub own: Vec<Interval>,
    /// Rendered grid, [`CELLS_PER_ROW`] cells
    pub cells: Vec<Cell>,
}

impl CalendarRow {
    /// Lay out `room`'s day from its busy and own intervals
    #[must_use]
    pub fn new(room: &Room, date: NaiveDate, occupied: Vec<Interval>, own: Vec<Interval>) -> Self {
        let cells = grid(date, &occupied, &own);
        Self {
            room_id: room.id.clone(),
            room_name: room.name.clone(),
            occupied,
            own,
            cells,
        }
    }
}

/// All rooms for one day, in catalogue order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Calendar {
    /// Displayed day
    pub date: NaiveDate,
    /// One row per room
    pub rows: Vec<CalendarRow>,
}

/// Start of cell `index` on `date`
#[must_use]
pub fn cell_start(date: NaiveDate, index: usize) -> NaiveDateTime {
    let offset = i64::try_from(index).unwrap_or(0) * i64::from(CELL_MINUTES);
    day_start(date) + Duration::minutes(offset)
}

/// Classify every cell of `date`; own reservations win over other bookings
#[must_use]
pub fn grid(date: NaiveDate, occupied: &[Interval], own: &[Interval]) -> Vec<Cell> {
    (0..CELLS_PER_ROW)
        .map(|index| {
            let start = cell_start(date, index);
            let end = start + Duration::minutes(i64::from(CELL_MINUTES));
            if own.iter().any(|i| i.overlaps(start, end)) {
                Cell::OccupiedSelf
            } else if occupied.iter().any(|i| i.overlaps(start, end)) {
                Cell::OccupiedOther
            } else {
                Cell::Free
            }
        })
        .collect()
}

/// The user's reservations in `room` that fall on `date`
#[must_use]
pub fn own_intervals(room: &Room, date: NaiveDate, reservations: &[Reservation]) -> Vec<Interval> {
    reservations
        .iter()
        .filter(|r| r.room_name == room.name)
        .map(Reservation::interval)
        .filter(|i| i.touches(date))
        .collect()
}

/// Fetch every room's busy time for `date` concurrently and build the grid.
///
/// Each fetch runs in its own task bounded by `fetch_timeout`. Errors,
/// timeouts and panicked tasks degrade only the affected row, which is
/// rendered all-free; the output always has one row per input room, in input
/// order.
pub async fn build_calendar(
    service: Arc<dyn BookingService>,
    tokens: &AuthTokens,
    rooms: &[Room],
    date: NaiveDate,
    own: &[Reservation],
    fetch_timeout: std::time::Duration,
) -> Calendar {
    let started = Instant::now();

    let handles: Vec<_> = rooms
        .iter()
        .map(|room| {
            let service = Arc::clone(&service);
            let tokens = tokens.clone();
            let room_id = room.id.clone();
            tokio::spawn(async move {
                tokio::time::timeout(fetch_timeout, service.get_room_busy_time(&tokens, &room_id, date)).await
            })
        })
        .collect();

    let results = futures::future::join_all(handles).await;

    let rows = rooms
        .iter()
        .zip(results)
        .map(|(room, result)| {
            let occupied = match result {
                Ok(Ok(Ok(intervals))) => {
                    CalendarMetrics::record_fetch("ok");
                    if intervals.is_empty() {
                        tracing::debug!(room = %room.name, %date, "No busy time reported");
                    }
                    intervals
                },
                Ok(Ok(Err(error))) => {
                    CalendarMetrics::record_fetch("error");
                    tracing::warn!(room = %room.name, %date, %error, "Busy time fetch failed, showing room as free");
                    Vec::new()
                },
                Ok(Err(_elapsed)) => {
                    CalendarMetrics::record_fetch("timeout");
                    tracing::warn!(
                        room = %room.name,
                        %date,
                        timeout_ms = u64::try_from(fetch_timeout.as_millis()).unwrap_or(u64::MAX),
                        "Busy time fetch timed out, showing room as free"
                    );
                    Vec::new()
                },
                Err(join_error) => {
                    CalendarMetrics::record_fetch("panic");
                    tracing::warn!(room = %room.name, %date, error = %join_error, "Busy time task failed, showing room as free");
                    Vec::new()
                },
            };
            CalendarRow::new(room, date, occupied, own_intervals(room, date, own))
        })
        .collect();

    CalendarMetrics::record_build(started.elapsed());
    Calendar { date, rows }
}

fn day_start(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN) + Duration::hours(i64::from(DAY_START_HOUR))
}
