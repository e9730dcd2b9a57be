//! REST client for the coworking booking service.
//!
//! Every authenticated call carries the two session tokens as cookies
//! (`w_auth`, `w_auth_refresh`). Times go out as RFC 3339 in the configured
//! zone and come back as local wall-clock strings.
//!
//! Idempotent reads are retried with backoff on transient failures; writes
//! (`book`, `cancel_booking`, `logout`) are sent once.

use crate::config::ApiConfig;
use crate::error::ServiceError;
use crate::service::BookingService;
use crate::types::{AuthTokens, BookingQuery, Interval, Reservation, ReservationId, Room, RoomId, UserAccount};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, TimeZone, Utc};
use rand::Rng;
use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use roombook_runtime::retry::{RetryPolicy, retry_with_predicate};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const API_PATH: &str = "v2/api/api";
const RESERVATIONS_PAGE_SIZE: u32 = 50;
const ERROR_EXCERPT_LEN: usize = 200;

/// [`BookingService`] over HTTP
#[derive(Debug, Clone)]
pub struct HttpBookingService {
    client: Client,
    api: ApiConfig,
    retry: RetryPolicy,
}

impl HttpBookingService {
    /// Create a client for `api`
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Transport`] if the HTTP client cannot be built.
    pub fn new(api: ApiConfig) -> Result<Self, ServiceError> {
        let client = Client::builder().timeout(api.http_timeout).build()?;
        Ok(Self {
            client,
            api,
            retry: RetryPolicy::default(),
        })
    }

    /// Replace the retry policy used for reads
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{API_PATH}/{path}", self.api.base_url)
    }

    fn items_endpoint(&self) -> String {
        self.endpoint(&format!(
            "CoworkingSpace/{}/category/{}/items",
            self.api.space_id, self.api.category_id
        ))
    }

    fn authenticated(&self, request: RequestBuilder, tokens: &AuthTokens) -> RequestBuilder {
        request.header(COOKIE, format!("w_auth={}; w_auth_refresh={}", tokens.access, tokens.refresh))
    }

    fn rfc3339(&self, local: NaiveDateTime) -> Result<String, ServiceError> {
        self.api
            .timezone
            .from_local_datetime(&local)
            .earliest()
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
            .ok_or_else(|| ServiceError::Rejected(format!("{local} does not exist in {}", self.api.timezone)))
    }

    fn local_time(&self, raw: &str) -> Result<NaiveDateTime, ServiceError> {
        parse_service_time(raw, |utc| utc.with_timezone(&self.api.timezone).naive_local())
    }

    async fn auth(&self, tokens: &AuthTokens) -> Result<UserPayload, ServiceError> {
        let payload: AuthPayload = retry_with_predicate(
            &self.retry,
            move || async move {
                let request = self.authenticated(self.client.get(self.endpoint("users/auth")), tokens);
                read_json(request.send().await?).await
            },
            ServiceError::is_transient,
        )
        .await?;

        match payload.user {
            Some(user) if payload.is_auth => Ok(user),
            _ => Err(ServiceError::Unauthorized),
        }
    }

    async fn fetch_rooms<B: Serialize + Sync>(
        &self,
        tokens: &AuthTokens,
        body: &B,
        query: &[(&str, String)],
    ) -> Result<Vec<Room>, ServiceError> {
        let payload: RoomsPayload = retry_with_predicate(
            &self.retry,
            move || async move {
                let request = self
                    .authenticated(self.client.post(self.items_endpoint()), tokens)
                    .query(query)
                    .json(body);
                read_json(request.send().await?).await
            },
            ServiceError::is_transient,
        )
        .await?;
        Ok(payload.into_rooms(&self.api.hidden_rooms))
    }

    fn payment(&self, query: &BookingQuery, room: &Room) -> Result<PaymentPayload, ServiceError> {
        let start = self.rfc3339(query.start)?;
        let end = self.rfc3339(query.end())?;
        Ok(PaymentPayload {
            is_user: true,
            is_person: true,
            is_vat_required: true,
            is_status_required: true,
            cgv: true,
            payment_type: "credit",
            cart: vec![CartItem {
                coworking_space_id: self.api.space_id.clone(),
                category_id: self.api.category_id.clone(),
                item_id: room.id.to_string(),
                cart_id: cart_id(),
                slot_summary: SlotSummary {
                    date: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
                    times: vec![TimeRange {
                        start: query.start.format("%H:%M").to_string(),
                        end: query.end().format("%H:%M").to_string(),
                    }],
                },
                slots: vec![Slot {
                    kind: "hour",
                    start,
                    end,
                    id: Uuid::new_v4(),
                    time_slot_id: None,
                }],
            }],
        })
    }
}

#[async_trait]
impl BookingService for HttpBookingService {
    async fn login(&self, email: &str, password: &str) -> Result<UserAccount, ServiceError> {
        let body = LoginPayload { email, password };
        let response = retry_with_predicate(
            &self.retry,
            || self.client.post(self.endpoint("users/login")).json(&body).send(),
            |error: &reqwest::Error| error.is_connect() || error.is_timeout(),
        )
        .await?;

        if matches!(response.status(), StatusCode::UNAUTHORIZED | StatusCode::BAD_REQUEST) {
            return Err(ServiceError::InvalidCredentials);
        }
        let refresh = refresh_token(
            response
                .headers()
                .get_all(SET_COOKIE)
                .iter()
                .filter_map(|value| value.to_str().ok()),
        );
        let payload: AuthPayload = read_json(response).await?;

        match payload.user {
            Some(user) if payload.is_auth => {
                tracing::debug!(has_refresh_token = refresh.is_some(), "Login accepted");
                Ok(UserAccount {
                    tokens: AuthTokens {
                        access: user.jwt_token,
                        refresh: refresh.unwrap_or_default(),
                    },
                    credit_balance: user.credits,
                })
            },
            _ => {
                tracing::debug!(message = ?payload.message, "Login refused");
                Err(ServiceError::InvalidCredentials)
            },
        }
    }

    async fn get_credits(&self, tokens: &AuthTokens) -> Result<f64, ServiceError> {
        Ok(self.auth(tokens).await?.credits)
    }

    async fn list_rooms(&self, tokens: &AuthTokens) -> Result<Vec<Room>, ServiceError> {
        // The endpoint requires a body even without filters
        self.fetch_rooms(tokens, &serde_json::json!({ "price": null }), &[]).await
    }

    async fn get_available_rooms(
        &self,
        tokens: &AuthTokens,
        query: &BookingQuery,
    ) -> Result<Vec<Room>, ServiceError> {
        let window = TimeRange {
            start: self.rfc3339(query.start)?,
            end: self.rfc3339(query.end())?,
        };
        let window_json = serde_json::to_string(&window).map_err(|e| ServiceError::Decode(e.to_string()))?;
        let body = AvailabilityPayload {
            capacity: query.capacity,
            category_id: &self.api.category_id,
            coworking_space_id: &self.api.space_id,
            date_time: window,
        };
        self.fetch_rooms(
            tokens,
            &body,
            &[("capacity", query.capacity.to_string()), ("datewithhours", window_json)],
        )
        .await
    }

    // The payment endpoint's response does not describe the reservation, so
    // the booking is confirmed by finding it in the upcoming list.
    async fn book(
        &self,
        tokens: &AuthTokens,
        query: &BookingQuery,
        room: &Room,
        credits_at_booking: f64,
    ) -> Result<Reservation, ServiceError> {
        let payment = self.payment(query, room)?;
        tracing::info!(room = %room.name, start = %query.start, credits_at_booking, "Paying for room");
        let request = self.authenticated(self.client.post(self.endpoint("Payment/pay")), tokens).json(&payment);
        check_status(request.send().await?).await?;

        self.list_future_reservations(tokens)
            .await?
            .into_iter()
            .find(|r| r.room_name == room.name && r.start == query.start)
            .ok_or_else(|| ServiceError::Rejected("booking failed".to_string()))
    }

    async fn cancel_booking(&self, tokens: &AuthTokens, id: &ReservationId) -> Result<(), ServiceError> {
        let request = self
            .authenticated(self.client.post(self.endpoint("Reservation/cancel-order")), tokens)
            .json(&CancellationPayload { id: id.to_string() });
        check_status(request.send().await?).await?;
        Ok(())
    }

    async fn list_future_reservations(&self, tokens: &AuthTokens) -> Result<Vec<Reservation>, ServiceError> {
        let payload: ReservationsPayload = retry_with_predicate(
            &self.retry,
            move || async move {
                let request = self
                    .authenticated(self.client.get(self.endpoint("Reservations/get-current-and-incoming")), tokens)
                    .query(&[("PerPage", RESERVATIONS_PAGE_SIZE), ("Page", 1)]);
                read_json(request.send().await?).await
            },
            ServiceError::is_transient,
        )
        .await?;

        payload
            .data
            .into_iter()
            .map(|r| {
                let start = self.local_time(&r.start)?;
                let end = self.local_time(&r.end)?;
                let id = r
                    .order_resource_rent_id
                    .parse()
                    .map_err(|_| ServiceError::Decode(format!("reservation id {:?}", r.order_resource_rent_id)))?;
                Ok(Reservation {
                    id,
                    room_name: r.item_name,
                    start,
                    end,
                    // Credits are an hourly rate
                    cost: r.credits.unwrap_or_default() * hours_between(start, end),
                })
            })
            .collect()
    }

    async fn get_room_busy_time(
        &self,
        tokens: &AuthTokens,
        room_id: &RoomId,
        date: NaiveDate,
    ) -> Result<Vec<Interval>, ServiceError> {
        let body = BusyTimeFilter {
            start_date: self.rfc3339(date.and_time(NaiveTime::MIN))?,
            end_date: self.rfc3339(date.and_hms_opt(23, 59, 0).unwrap_or_else(|| date.and_time(NaiveTime::MIN)))?,
        };
        let endpoint = self.endpoint(&format!(
            "CoworkingSpace/{}/category/{}/item/{room_id}/busytimes",
            self.api.space_id, self.api.category_id
        ));
        let (endpoint, body) = (endpoint.as_str(), &body);
        let payload: BusyTimePayload = retry_with_predicate(
            &self.retry,
            move || async move {
                let request = self.authenticated(self.client.post(endpoint), tokens).json(body);
                read_json(request.send().await?).await
            },
            ServiceError::is_transient,
        )
        .await?;

        payload
            .data
            .into_iter()
            .map(|slot| Ok(Interval::new(self.local_time(&slot.start)?, self.local_time(&slot.end)?)))
            .collect()
    }

    async fn logout(&self, tokens: &AuthTokens) -> Result<(), ServiceError> {
        let request = self.authenticated(self.client.post(self.endpoint("users/logout")), tokens);
        check_status(request.send().await?).await?;
        Ok(())
    }
}

async fn check_status(response: Response) -> Result<Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        return Err(ServiceError::Unauthorized);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ServiceError::Status {
        status: status.as_u16(),
        message: body.chars().take(ERROR_EXCERPT_LEN).collect(),
    })
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ServiceError> {
    let bytes = check_status(response).await?.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ServiceError::Decode(e.to_string()))
}

/// Find `w_auth_refresh` among `Set-Cookie` header values
fn refresh_token<'a>(cookies: impl Iterator<Item = &'a str>) -> Option<String> {
    cookies
        .flat_map(|cookie| cookie.split(';'))
        .map(str::trim)
        .find_map(|part| part.strip_prefix("w_auth_refresh="))
        .map(str::to_string)
}

/// Parse a service timestamp: RFC 3339 (converted with `to_local`) or a
/// local `YYYY-MM-DDTHH:MM:SS` wall-clock string.
fn parse_service_time(
    raw: &str,
    to_local: impl FnOnce(DateTime<Utc>) -> NaiveDateTime,
) -> Result<NaiveDateTime, ServiceError> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Ok(to_local(instant.with_timezone(&Utc)));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map_err(|_| ServiceError::Decode(format!("timestamp {raw:?}")))
}

#[allow(clippy::cast_precision_loss)]
fn hours_between(start: NaiveDateTime, end: NaiveDateTime) -> f64 {
    (end - start).num_minutes() as f64 / 60.0
}

fn cart_id() -> String {
    let bytes: [u8; 5] = rand::thread_rng().r#gen();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Serialize)]
struct LoginPayload<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct AuthPayload {
    #[serde(rename = "isAuth", default)]
    is_auth: bool,
    #[serde(rename = "Message", default)]
    message: Option<String>,
    #[serde(rename = "User", default)]
    user: Option<UserPayload>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct UserPayload {
    jwt_token: String,
    #[serde(default)]
    credits: f64,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
struct RoomsPayload {
    visited_items: Vec<RoomPayload>,
    unvisited_items: Vec<RoomPayload>,
}

impl RoomsPayload {
    fn into_rooms(self, hidden: &[String]) -> Vec<Room> {
        self.visited_items
            .into_iter()
            .chain(self.unvisited_items)
            .filter(|room| !hidden.contains(&room.name))
            .filter_map(|room| {
                let Some(price) = room.prices.first().map(|p| p.credits.parsed_value) else {
                    tracing::warn!(room = %room.name, "Room has no price, skipping");
                    return None;
                };
                Some(Room {
                    id: RoomId::new(room.id),
                    name: room.name,
                    capacity: room.nb_users,
                    price,
                })
            })
            .collect()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RoomPayload {
    id: String,
    name: String,
    #[serde(default)]
    nb_users: u32,
    #[serde(default)]
    prices: Vec<PricePayload>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PricePayload {
    credits: CreditPayload,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreditPayload {
    parsed_value: f64,
}

#[derive(Serialize)]
struct TimeRange {
    start: String,
    end: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AvailabilityPayload<'a> {
    capacity: u32,
    category_id: &'a str,
    coworking_space_id: &'a str,
    date_time: TimeRange,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PaymentPayload {
    is_user: bool,
    is_person: bool,
    is_vat_required: bool,
    is_status_required: bool,
    cgv: bool,
    payment_type: &'static str,
    cart: Vec<CartItem>,
}

// The service wants the slot twice, in two different shapes.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CartItem {
    coworking_space_id: String,
    category_id: String,
    item_id: String,
    cart_id: String,
    #[serde(rename = "startenddate_")]
    slot_summary: SlotSummary,
    #[serde(rename = "startenddate")]
    slots: Vec<Slot>,
}

#[derive(Serialize)]
struct SlotSummary {
    date: String,
    times: Vec<TimeRange>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Slot {
    #[serde(rename = "type")]
    kind: &'static str,
    start: String,
    end: String,
    id: Uuid,
    time_slot_id: Option<String>,
}

#[derive(Serialize)]
struct CancellationPayload {
    #[serde(rename = "Id")]
    id: String,
}

#[derive(Deserialize)]
struct ReservationsPayload {
    #[serde(default)]
    data: Vec<ReservationPayload>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ReservationPayload {
    order_resource_rent_id: String,
    item_name: String,
    start: String,
    end: String,
    #[serde(default)]
    credits: Option<f64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BusyTimeFilter {
    start_date: String,
    end_date: String,
}

#[derive(Deserialize)]
struct BusyTimePayload {
    #[serde(default)]
    data: Vec<BusySlot>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BusySlot {
    start: String,
    end: String,
}
