//! Room selection and credit checks.
//!
//! Every surface runs these before it may issue a booking command.

use crate::error::BookingError;
use crate::types::{Room, UserAccount};

/// Pick the room to book among `rooms` (service order).
///
/// With `explicit_name`, the room must match it exactly (case-sensitive).
/// Otherwise the first room whose capacity covers the request wins; there is
/// no attempt to optimise for price or tightness.
///
/// # Errors
///
/// - [`BookingError::NoRoomAvailable`] if `rooms` is empty or no room is large enough
/// - [`BookingError::RoomNotFound`] if `explicit_name` matches no room
pub fn select_room<'a>(
    rooms: &'a [Room],
    capacity: u32,
    explicit_name: Option<&str>,
) -> Result<&'a Room, BookingError> {
    if rooms.is_empty() {
        return Err(BookingError::NoRoomAvailable);
    }

    match explicit_name {
        Some(name) => rooms
            .iter()
            .find(|room| room.name == name)
            .ok_or_else(|| BookingError::RoomNotFound(name.to_string())),
        None => rooms
            .iter()
            .find(|room| room.capacity >= capacity)
            .ok_or(BookingError::NoRoomAvailable),
    }
}

/// Refuse a booking the account cannot pay for.
///
/// # Errors
///
/// Returns [`BookingError::InsufficientCredits`] iff the room costs more than
/// the balance; an exact match is affordable.
pub fn check_credits(account: &UserAccount, room: &Room) -> Result<(), BookingError> {
    ensure_affordable(account.credit_balance, room)
}

/// [`check_credits`] against a bare balance snapshot.
///
/// # Errors
///
/// Returns [`BookingError::InsufficientCredits`] iff `room.price > balance`.
pub fn ensure_affordable(balance: f64, room: &Room) -> Result<(), BookingError> {
    if room.price > balance {
        return Err(BookingError::InsufficientCredits {
            price: room.price,
            balance,
        });
    }
    Ok(())
}

/// Balance left once `room` is booked; a booking is charged the room price.
#[must_use]
pub fn balance_after_booking(balance: f64, room: &Room) -> f64 {
    balance - room.price
}
