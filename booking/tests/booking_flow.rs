//! End-to-end session flows: store, reducer, executor and repository wired
//! together over the in-memory booking service.

#![allow(clippy::unwrap_used, clippy::panic)]

use chrono::NaiveDateTime;
use roombook::app::RoombookApp;
use roombook::config::Config;
use roombook::interaction::{Action, BrowsePhase, InteractionState, QuickBookPhase, Values};
use roombook::mocks::MockBookingService;
use roombook::types::{Interval, Reservation, ReservationId, Room, RoomId};
use roombook_testing::FixedClock;
use std::sync::Arc;
use std::time::Duration;

const USER: &str = "U024BE7LH";

fn at(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
}

fn room(id: &str, name: &str, capacity: u32, price: f64) -> Room {
    Room {
        id: RoomId::new(id),
        name: name.to_string(),
        capacity,
        price,
    }
}

/// App at 2025-03-10 09:05 Paris time, logged in and on the landing screen
async fn logged_in(service: MockBookingService) -> (RoombookApp, Arc<MockBookingService>) {
    let service = Arc::new(service);
    let clock = Arc::new(FixedClock::at("2025-03-10T08:05:00Z"));
    let app = RoombookApp::in_memory(&Config::default(), service.clone(), clock);

    app.open_session(USER).await.unwrap();
    let values = Values::new().with("email", "ada@example.com").with("password", "secret");
    let state = app.interact(USER, Action::submit("login", values)).await.unwrap();
    assert_eq!(state.name(), "landing");
    (app, service)
}

fn criteria(date: &str, time: &str, duration: &str, capacity: &str) -> Action {
    Action::submit(
        "browse",
        Values::new()
            .with("date", date)
            .with("time", time)
            .with("duration", duration)
            .with("capacity", capacity),
    )
}

fn browse(state: &InteractionState) -> &roombook::interaction::BrowseState {
    match state {
        InteractionState::Browse(browse) => browse,
        other => panic!("expected browse, got {}", other.name()),
    }
}

#[tokio::test]
async fn browse_books_the_picked_room() {
    let (app, service) = logged_in(
        MockBookingService::new()
            .with_credits(10.0)
            .with_available_rooms(vec![room("r1", "Atlas", 1, 5.0)]),
    )
    .await;

    app.interact(USER, Action::user("browse")).await.unwrap();
    let state = app.interact(USER, criteria("2025-03-11", "09:15", "30", "1")).await.unwrap();
    assert_eq!(browse(&state).phase, BrowsePhase::PickRoom);

    app.interact(USER, Action::submit("pick-room", Values::new().with("room", "Atlas")))
        .await
        .unwrap();
    let state = app.interact(USER, Action::user("book")).await.unwrap();

    let booked = browse(&state);
    assert_eq!(booked.phase, BrowsePhase::Booked);
    let reservation = booked.reservation.as_ref().unwrap();
    assert_eq!(reservation.start, at("2025-03-11 09:15"));
    assert_eq!(reservation.end, at("2025-03-11 09:45"));
    assert_eq!(service.call_count("book").await, 1);
    assert!((service.credits().await - 5.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn browse_and_one_shot_bookings_charge_the_same() {
    let (app, _) = logged_in(
        MockBookingService::new()
            .with_credits(10.0)
            .with_hourly_cost()
            .with_available_rooms(vec![room("r1", "Atlas", 1, 4.0)]),
    )
    .await;

    app.interact(USER, Action::user("browse")).await.unwrap();
    app.interact(USER, criteria("2025-03-11", "09:15", "120", "1")).await.unwrap();
    app.interact(USER, Action::submit("pick-room", Values::new().with("room", "Atlas")))
        .await
        .unwrap();
    app.interact(USER, Action::user("book")).await.unwrap();
    let after_browse = app.repository().get_account(USER).await.unwrap().unwrap().credit_balance;

    let request = roombook::fast_path::BookRequest {
        start: Some("2025-03-11T13:00".to_string()),
        duration_minutes: 120,
        ..Default::default()
    };
    app.book(USER, &request).await.unwrap();
    let after_cli = app.repository().get_account(USER).await.unwrap().unwrap().credit_balance;

    assert!((after_browse - 6.0).abs() < f64::EPSILON);
    assert!((after_cli - 2.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn browse_refuses_a_room_it_cannot_pay_for() {
    let (app, service) = logged_in(
        MockBookingService::new()
            .with_credits(3.0)
            .with_available_rooms(vec![room("r1", "Atlas", 1, 5.0)]),
    )
    .await;

    app.interact(USER, Action::user("browse")).await.unwrap();
    app.interact(USER, criteria("2025-03-11", "09:15", "30", "1")).await.unwrap();
    app.interact(USER, Action::submit("pick-room", Values::new().with("room", "Atlas")))
        .await
        .unwrap();
    let state = app.interact(USER, Action::user("book")).await.unwrap();

    assert_eq!(browse(&state).phase, BrowsePhase::PickRoom);
    assert!(state.error().unwrap().starts_with("not enough credits"));
    assert_eq!(service.call_count("book").await, 0);
}

#[tokio::test]
async fn bad_duration_never_reaches_the_service() {
    let (app, service) = logged_in(MockBookingService::new().with_credits(10.0)).await;
    let calls_before = service.calls().await.len();

    app.interact(USER, Action::user("browse")).await.unwrap();
    let state = app.interact(USER, criteria("2025-03-11", "09:15", "20", "1")).await.unwrap();

    assert_eq!(browse(&state).phase, BrowsePhase::Criteria);
    assert_eq!(
        state.error(),
        Some("duration must be a positive multiple of 15 minutes, got 20")
    );
    assert_eq!(service.calls().await.len(), calls_before);
}

#[tokio::test]
async fn quick_book_confirms_without_a_room_picker() {
    let (app, service) = logged_in(
        MockBookingService::new()
            .with_credits(10.0)
            .with_available_rooms(vec![room("r1", "Booth", 1, 1.0), room("r2", "Duo", 2, 2.0)]),
    )
    .await;

    app.interact(USER, Action::user("quick-book")).await.unwrap();
    let state = app
        .interact(
            USER,
            Action::submit("quick-book", Values::new().with("duration", "45").with("capacity", "2")),
        )
        .await
        .unwrap();

    let InteractionState::QuickBook(quick) = &state else {
        panic!("expected quick-book, got {}", state.name());
    };
    assert_eq!(quick.phase, QuickBookPhase::Booked);
    let reservation = quick.reservation.as_ref().unwrap();
    assert_eq!(reservation.room_name, "Duo");
    assert_eq!(reservation.start, at("2025-03-10 09:15"));
    assert_eq!(reservation.end, at("2025-03-10 10:00"));
    assert_eq!(
        service.calls().await[1..],
        ["get_available_rooms", "get_credits", "get_credits", "book"]
    );
}

#[tokio::test]
async fn started_reservation_is_not_cancelled() {
    let ongoing = Reservation {
        id: ReservationId::random(),
        room_name: "Atlas".to_string(),
        start: at("2025-03-10 09:00"),
        end: at("2025-03-10 10:00"),
        cost: 2.0,
    };
    let upcoming = Reservation {
        id: ReservationId::random(),
        room_name: "Atlas".to_string(),
        start: at("2025-03-10 14:00"),
        end: at("2025-03-10 15:00"),
        cost: 2.0,
    };
    let (app, service) =
        logged_in(MockBookingService::new().with_reservations(vec![ongoing.clone(), upcoming.clone()])).await;

    let state = app.interact(USER, Action::user("reservations")).await.unwrap();
    let InteractionState::Reservations(list) = &state else {
        panic!("expected reservations, got {}", state.name());
    };
    assert_eq!(list.reservations.len(), 2);

    app.interact(USER, Action::user(ongoing.id.to_string())).await.unwrap();
    let state = app.interact(USER, Action::user("cancel")).await.unwrap();
    assert_eq!(
        state.error(),
        Some("this reservation has already started and cannot be cancelled")
    );
    assert_eq!(service.call_count("cancel_booking").await, 0);

    app.interact(USER, Action::user(upcoming.id.to_string())).await.unwrap();
    let state = app.interact(USER, Action::user("cancel")).await.unwrap();
    let InteractionState::Reservations(list) = &state else {
        panic!("expected reservations, got {}", state.name());
    };
    assert_eq!(list.reservations, vec![ongoing]);
    assert_eq!(service.call_count("cancel_booking").await, 1);
}

#[tokio::test]
async fn calendar_survives_a_failing_room() {
    let atlas = room("r1", "Atlas", 6, 5.0);
    let booth = room("r2", "Booth", 1, 1.0);
    let slow = room("r3", "Loft", 4, 3.0);
    let mine = Reservation {
        id: ReservationId::random(),
        room_name: "Atlas".to_string(),
        start: at("2025-03-10 10:00"),
        end: at("2025-03-10 10:30"),
        cost: 2.5,
    };
    let service = MockBookingService::new()
        .with_catalogue(vec![atlas.clone(), booth.clone(), slow.clone()])
        .with_busy_time(&atlas.id, vec![Interval::new(at("2025-03-10 08:00"), at("2025-03-10 09:00"))])
        .with_failing_busy_time(&booth.id)
        .with_busy_time_delay(&slow.id, Duration::from_secs(30))
        .with_reservations(vec![mine]);

    let service = Arc::new(service);
    let clock = Arc::new(FixedClock::at("2025-03-10T08:05:00Z"));
    let mut config = Config::default();
    config.calendar.fetch_timeout = Duration::from_millis(50);
    let app = RoombookApp::in_memory(&config, service.clone(), clock);
    app.open_session(USER).await.unwrap();
    app.interact(
        USER,
        Action::submit("login", Values::new().with("email", "a@b.c").with("password", "x")),
    )
    .await
    .unwrap();

    let state = app.interact(USER, Action::user("calendar")).await.unwrap();

    let InteractionState::Calendar(calendar) = &state else {
        panic!("expected calendar, got {}", state.name());
    };
    let grid = calendar.calendar.as_ref().unwrap();
    let names: Vec<_> = grid.rows.iter().map(|row| row.room_name.as_str()).collect();
    assert_eq!(names, ["Atlas", "Booth", "Loft"]);
    assert_eq!(grid.rows[0].occupied.len(), 1);
    assert_eq!(grid.rows[0].own.len(), 1);
    assert!(grid.rows[1].occupied.is_empty());
    assert!(grid.rows[2].occupied.is_empty());
}

#[tokio::test]
async fn expired_tokens_send_the_session_back_to_login() {
    let (app, _) = logged_in(MockBookingService::new()).await;
    // Swap the service for one that rejects every token
    let expired = RoombookApp::new(
        &Config::default(),
        Arc::new(MockBookingService::new().expired()),
        app.repository().clone(),
        Arc::new(FixedClock::at("2025-03-10T08:05:00Z")),
    );

    let state = expired.interact(USER, Action::user("reservations")).await.unwrap();

    assert_eq!(state.name(), "login");
    assert_eq!(state.error(), Some("session expired, please log in again"));
}

#[tokio::test]
async fn concurrent_actions_on_one_session_are_serialized() {
    let (app, service) = logged_in(MockBookingService::new().with_credits(6.0)).await;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let app = app.clone();
            tokio::spawn(async move { app.interact(USER, Action::user("refresh")).await })
        })
        .collect();
    for handle in handles {
        let state = handle.await.unwrap().unwrap();
        assert_eq!(state.name(), "landing");
    }

    assert_eq!(service.call_count("get_credits").await, 8);
}
