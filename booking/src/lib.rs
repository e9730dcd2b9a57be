//! Roombook - meeting-room booking on top of a coworking booking service
//!
//! A single interaction engine shared by a line-based terminal, a chat
//! webhook and a one-shot CLI. It turns user actions into validated booking
//! queries, runs them against the external service, and builds a per-room day
//! calendar from concurrent busy-time lookups.
//!
//! # Architecture
//!
//! ```text
//!   terminal ─┐
//!   webhook  ─┼─► Store ─► InteractionReducer (pure)  ─► Command
//!             │     ▲                                       │
//!             │     └──────── outcome Action ◄── BookingEffects ─► BookingService
//!             │                                             │
//!             │                                   SessionRepository
//!   CLI book ─┴─► fast_path ─► query + selection ─► BookingService
//! ```
//!
//! # Booking rules
//!
//! - starts are on a quarter hour and strictly in the future
//! - durations are positive multiples of 15 minutes, capped at 120
//! - head counts are clamped to 1..=2
//! - a room is only booked if its price does not exceed the balance
//! - a reservation that has started cannot be cancelled
//!
//! # Example
//!
//! ```no_run
//! use roombook::app::RoombookApp;
//! use roombook::config::Config;
//! use roombook::interaction::Action;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let app = RoombookApp::from_config(&Config::from_env()).await?;
//! app.open_session("U024BE7LH").await?;
//! let state = app.interact("U024BE7LH", Action::user("calendar")).await?;
//! println!("{}", state.name());
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod calendar;
pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod fast_path;
pub mod interaction;
pub mod mocks;
pub mod query;
pub mod repository;
pub mod selection;
pub mod server;
pub mod service;
pub mod terminal;
pub mod types;

pub use app::RoombookApp;
pub use config::Config;
pub use error::{BookingError, ServiceError, ValidationError};
pub use interaction::{Action, Command, InteractionReducer, InteractionState};
pub use service::BookingService;
pub use types::{BookingQuery, Reservation, ReservationId, Room, RoomId, UserAccount};
