//! Line-based terminal surface.
//!
//! Each screen prints the current state and the action ids it accepts. A
//! line is an action id optionally followed by `key=value` pairs; fields a
//! form needs but the line did not give are prompted for one by one.

use crate::app::{RoombookApp, TERMINAL_SESSION};
use crate::calendar::{Calendar, Cell, DAY_START_HOUR};
use crate::interaction::{
    Action, BrowsePhase, InteractionState, QuickBookPhase, UserAction, Values,
};
use crate::types::{Reservation, Room};
use std::fmt::Write as _;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, Lines};

const QUIT: &str = "quit";

/// Drive the terminal session until `quit` or end of input
///
/// # Errors
///
/// Fails on I/O errors or when the session store fails.
pub async fn run<R, W>(app: &RoombookApp, input: R, output: W) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    run_at(app, None, input, output).await
}

/// Like [`run`], but opens the landing action `screen` (`quick-book`,
/// `browse`, `reservations`, `calendar`) as soon as the session is logged in.
///
/// # Errors
///
/// Fails on I/O errors or when the session store fails.
pub async fn run_at<R, W>(app: &RoombookApp, screen: Option<&str>, input: R, mut output: W) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    let mut state = app.open_session(TERMINAL_SESSION).await?;
    let mut pending_screen = screen;

    loop {
        if matches!(state, InteractionState::Landing(_)) {
            if let Some(screen) = pending_screen.take() {
                state = app.interact(TERMINAL_SESSION, Action::user(screen)).await?;
            }
        }

        output.write_all(render(&state).as_bytes()).await?;
        output.write_all(b"> ").await?;
        output.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let Some(mut action) = parse_line(&line) else {
            continue;
        };
        if action.action_id == QUIT {
            break;
        }

        for field in form_fields(&state, &action.action_id) {
            if action.values.get(field).is_some() {
                continue;
            }
            let Some(value) = prompt(&mut lines, &mut output, field).await? else {
                return Ok(());
            };
            action.values = action.values.with(*field, value);
        }

        state = app.interact(TERMINAL_SESSION, Action::User(action)).await?;
    }

    output.write_all(b"bye\n").await?;
    output.flush().await?;
    Ok(())
}

async fn prompt<R, W>(lines: &mut Lines<R>, output: &mut W, field: &str) -> anyhow::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    output.write_all(format!("{field}: ").as_bytes()).await?;
    output.flush().await?;
    Ok(lines.next_line().await?)
}

/// Split `action-id key=value ...` into a user action; blank lines yield `None`
#[must_use]
pub fn parse_line(line: &str) -> Option<UserAction> {
    let mut words = line.split_whitespace();
    let action_id = words.next()?.to_string();
    let values = words.filter_map(|word| word.split_once('=')).collect::<Values>();
    Some(UserAction { action_id, values })
}

/// Fields the form behind `action_id` needs on the current screen
#[must_use]
pub fn form_fields(state: &InteractionState, action_id: &str) -> &'static [&'static str] {
    match (state, action_id) {
        (InteractionState::Login(_), "login") => &["email", "password"],
        (InteractionState::QuickBook(s), "quick-book") if s.phase == QuickBookPhase::Form => &["duration", "capacity"],
        (InteractionState::Browse(s), "browse") if s.phase == BrowsePhase::Criteria => {
            &["date", "time", "duration", "capacity"]
        },
        (InteractionState::Browse(s), "pick-room") if s.phase == BrowsePhase::PickRoom => &["room"],
        _ => &[],
    }
}

/// Text screen for `state`
#[must_use]
pub fn render(state: &InteractionState) -> String {
    let mut out = String::from("\n");
    let actions = match state {
        InteractionState::Login(login) => {
            out.push_str("Log in to the booking service\n");
            if login.pending {
                out.push_str("logging in...\n");
            }
            "login"
        },
        InteractionState::Landing(landing) => {
            match landing.credits {
                Some(credits) => {
                    let _ = writeln!(out, "Credits: {credits:.2}");
                },
                None => out.push_str("Credits: unknown\n"),
            }
            "quick-book, browse, reservations, calendar, refresh, logout"
        },
        InteractionState::QuickBook(quick) => match (&quick.phase, &quick.reservation) {
            (QuickBookPhase::Booked, Some(reservation)) => {
                let _ = writeln!(out, "Booked {}", describe(reservation));
                "cancel"
            },
            _ => {
                out.push_str("Quick book: first free room, starting at the next quarter hour\n");
                "quick-book, cancel"
            },
        },
        InteractionState::Browse(browse) => match browse.phase {
            BrowsePhase::PickRoom => {
                for room in &browse.rooms {
                    let marker = if browse.picked.as_deref() == Some(room.name.as_str()) {
                        '*'
                    } else {
                        ' '
                    };
                    let _ = writeln!(
                        out,
                        "{marker} {:<20} {} people  {:.2} credits",
                        room.name, room.capacity, room.price
                    );
                }
                if let Some(balance) = browse.credit_balance {
                    let _ = writeln!(out, "Balance: {balance:.2}");
                }
                "pick-room, book, back"
            },
            BrowsePhase::Booked => {
                if let Some(reservation) = &browse.reservation {
                    let _ = writeln!(out, "Booked {}", describe(reservation));
                }
                "back"
            },
            _ => {
                out.push_str("Search a slot (date yyyy-mm-dd, time HH:MM, both optional)\n");
                "browse, back"
            },
        },
        InteractionState::Reservations(list) => {
            if list.loading {
                out.push_str("loading...\n");
            } else if list.reservations.is_empty() {
                out.push_str("No upcoming reservation\n");
            }
            for reservation in &list.reservations {
                let marker = if list.picked == Some(reservation.id) { '*' } else { ' ' };
                let _ = writeln!(out, "{marker} {}  {}", reservation.id, describe(reservation));
            }
            if let Some(notice) = &list.notice {
                let _ = writeln!(out, "{notice}");
            }
            "<reservation id>, cancel, refresh, back"
        },
        InteractionState::Calendar(calendar) => {
            match &calendar.calendar {
                Some(grid) => out.push_str(&render_calendar(grid)),
                None if calendar.loading => {
                    let _ = writeln!(out, "{}: loading...", calendar.current_date);
                },
                None => {
                    let _ = writeln!(out, "{}", calendar.current_date);
                },
            }
            "prev-day, next-day, back"
        },
    };

    if let Some(error) = state.error() {
        let _ = writeln!(out, "! {error}");
    }
    let _ = writeln!(out, "[{actions}, quit]");
    out
}

/// Day grid: one line per room, one character per quarter hour
#[must_use]
pub fn render_calendar(calendar: &Calendar) -> String {
    let width = calendar.rows.iter().map(|row| row.room_name.len()).max().unwrap_or(0);
    let mut out = String::new();
    let _ = writeln!(out, "{}", calendar.date.format("%A %d %B %Y"));

    let cells = calendar.rows.first().map_or(0, |row| row.cells.len());
    let mut header = String::new();
    for hour in (DAY_START_HOUR..).take(cells / 4) {
        let _ = write!(header, "{hour:<4}");
    }
    let _ = writeln!(out, "{:width$} {header}", "");

    for row in &calendar.rows {
        let line: String = row
            .cells
            .iter()
            .map(|cell| match cell {
                Cell::Free => '.',
                Cell::OccupiedOther => '#',
                Cell::OccupiedSelf => '@',
            })
            .collect();
        let _ = writeln!(out, "{:width$} {line}", row.room_name);
    }
    out.push_str(". free  # taken  @ yours\n");
    out
}

/// Room catalogue as a NAME / CAPACITY / PRICE table
#[must_use]
pub fn rooms_table(rooms: &[Room]) -> String {
    let width = rooms.iter().map(|room| room.name.len()).max().unwrap_or(0).max("NAME".len());
    let mut out = String::new();
    let _ = writeln!(out, "{:<width$}  {:<14}  PRICE", "NAME", "CAPACITY");
    for room in rooms {
        let capacity = format!("{} person(s)", room.capacity);
        let _ = writeln!(out, "{:<width$}  {capacity:<14}  {:.2} credits", room.name, room.price);
    }
    out
}

fn describe(reservation: &Reservation) -> String {
    format!(
        "{} {} -> {} ({:.2} credits)",
        reservation.room_name,
        reservation.start.format("%d/%m/%Y %H:%M"),
        reservation.end.format("%H:%M"),
        reservation.cost
    )
}
