use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use ulid::Ulid;

use crate::engine::{BookingDraft, BookingPatch, Engine, EngineError, GuestDraft, RoomDraft};
use crate::model::*;

/// Everything a handler needs. The adapter holds no business logic: it
/// parses, delegates to the engine, and maps error kinds onto status codes.
#[derive(Clone)]
pub struct ApiState {
    pub engine: Arc<Engine>,
    /// When false, store-level failure details are logged but not returned.
    pub dev_errors: bool,
}

impl ApiState {
    fn reject(&self, err: EngineError) -> ApiError {
        match &err {
            EngineError::NotFound(_) => ApiError::new(StatusCode::NOT_FOUND, err.to_string()),
            EngineError::Store(_) => {
                tracing::error!("store failure: {err}");
                let message = if self.dev_errors {
                    err.to_string()
                } else {
                    "internal server error".to_string()
                };
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, message)
            }
            _ => ApiError::new(StatusCode::BAD_REQUEST, err.to_string()),
        }
    }
}

pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/rooms", get(list_rooms).post(create_room))
        .route("/rooms/available", get(available_rooms))
        .route(
            "/rooms/:id",
            get(get_room).put(update_room).delete(delete_room),
        )
        .route("/rooms/:id/status", patch(set_room_status))
        .route("/bookings", get(list_bookings).post(create_booking))
        .route(
            "/bookings/:id",
            get(get_booking).put(update_booking).delete(delete_booking),
        )
        .route("/bookings/:id/check-in", post(check_in))
        .route("/bookings/:id/check-out", post(check_out))
        .route("/bookings/:id/cancel", post(cancel_booking))
        .route("/guests", get(list_guests).post(register_guest))
        .route(
            "/guests/:id",
            get(get_guest).put(update_guest).delete(delete_guest),
        )
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

// ── Rooms ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoomPayload {
    room_number: String,
    #[serde(rename = "type")]
    kind: RoomType,
    price: Money,
    capacity: u32,
    status: Option<RoomStatus>,
    #[serde(default)]
    amenities: Vec<String>,
    #[serde(default)]
    images: Vec<String>,
    description: Option<String>,
}

impl From<RoomPayload> for RoomDraft {
    fn from(p: RoomPayload) -> Self {
        RoomDraft {
            room_number: p.room_number,
            kind: p.kind,
            price: p.price,
            capacity: p.capacity,
            status: p.status,
            amenities: p.amenities,
            images: p.images,
            description: p.description,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoomsQuery {
    #[serde(rename = "type")]
    kind: Option<RoomType>,
    status: Option<RoomStatus>,
    min_price: Option<Money>,
    max_price: Option<Money>,
}

async fn list_rooms(
    State(state): State<ApiState>,
    Query(query): Query<RoomsQuery>,
) -> Json<Vec<Room>> {
    let filter = RoomFilter {
        kind: query.kind,
        status: query.status,
        min_price: query.min_price,
        max_price: query.max_price,
    };
    Json(state.engine.list_rooms(&filter).await)
}

async fn get_room(
    State(state): State<ApiState>,
    Path(id): Path<Ulid>,
) -> Result<Json<Room>, ApiError> {
    state
        .engine
        .room(id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "Room not found"))
}

async fn create_room(
    State(state): State<ApiState>,
    Json(payload): Json<RoomPayload>,
) -> Result<(StatusCode, Json<Room>), ApiError> {
    let room = state
        .engine
        .create_room(payload.into())
        .await
        .map_err(|e| state.reject(e))?;
    Ok((StatusCode::CREATED, Json(room)))
}

async fn update_room(
    State(state): State<ApiState>,
    Path(id): Path<Ulid>,
    Json(payload): Json<RoomPayload>,
) -> Result<Json<Room>, ApiError> {
    state
        .engine
        .update_room(id, payload.into())
        .await
        .map(Json)
        .map_err(|e| state.reject(e))
}

async fn delete_room(
    State(state): State<ApiState>,
    Path(id): Path<Ulid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .engine
        .delete_room(id)
        .await
        .map_err(|e| state.reject(e))?;
    Ok(Json(json!({ "message": "Room deleted successfully" })))
}

#[derive(Debug, Deserialize)]
struct StatusPayload {
    status: String,
}

async fn set_room_status(
    State(state): State<ApiState>,
    Path(id): Path<Ulid>,
    Json(payload): Json<StatusPayload>,
) -> Result<Json<Room>, ApiError> {
    let status = RoomStatus::parse(&payload.status)
        .ok_or_else(|| ApiError::bad_request("Invalid status"))?;
    state
        .engine
        .set_room_status(id, status)
        .await
        .map(Json)
        .map_err(|e| state.reject(e))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AvailabilityQuery {
    check_in_date: Option<NaiveDate>,
    check_out_date: Option<NaiveDate>,
    #[serde(rename = "type")]
    kind: Option<RoomType>,
}

/// Date presence and ordering are checked here, before the resolver runs.
async fn available_rooms(
    State(state): State<ApiState>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Vec<Room>>, ApiError> {
    let (check_in, check_out) = match (query.check_in_date, query.check_out_date) {
        (Some(a), Some(b)) => (a, b),
        _ => {
            return Err(ApiError::bad_request(
                "Check-in and check-out dates are required",
            ));
        }
    };
    if check_in >= check_out {
        return Err(ApiError::bad_request(
            "Check-in date must be before check-out date",
        ));
    }

    let stay = StayRange::new(check_in, check_out);
    let mut rooms = state.engine.find_available_rooms(&stay, query.kind).await;
    // The engine returns registry iteration order; present listing order.
    rooms.sort_by(|a, b| a.room_number.cmp(&b.room_number));
    Ok(Json(rooms))
}

// ── Bookings ─────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BookingPayload {
    room_id: Ulid,
    guest_id: Ulid,
    check_in_date: NaiveDate,
    check_out_date: NaiveDate,
    total_amount: Money,
    #[serde(default)]
    paid_amount: Money,
    special_requests: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BookingUpdatePayload {
    check_in_date: Option<NaiveDate>,
    check_out_date: Option<NaiveDate>,
    total_amount: Option<Money>,
    paid_amount: Option<Money>,
    #[serde(default, with = "double_option")]
    special_requests: Option<Option<String>>,
}

/// Distinguishes an absent `specialRequests` key (leave alone) from an
/// explicit null (clear the field).
mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(de: D) -> Result<Option<Option<String>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(de).map(Some)
    }
}

/// Booking plus its derived fields, as the boundary presents it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BookingView {
    id: Ulid,
    room_id: Ulid,
    guest_id: Ulid,
    check_in_date: NaiveDate,
    check_out_date: NaiveDate,
    status: BookingStatus,
    total_amount: Money,
    paid_amount: Money,
    special_requests: Option<String>,
    number_of_nights: i64,
    balance_amount: Money,
}

impl From<Booking> for BookingView {
    fn from(b: Booking) -> Self {
        BookingView {
            number_of_nights: b.nights(),
            balance_amount: b.balance(),
            id: b.id,
            room_id: b.room_id,
            guest_id: b.guest_id,
            check_in_date: b.stay.check_in,
            check_out_date: b.stay.check_out,
            status: b.status,
            total_amount: b.total_amount,
            paid_amount: b.paid_amount,
            special_requests: b.special_requests,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BookingsQuery {
    room_id: Option<Ulid>,
    status: Option<BookingStatus>,
}

async fn list_bookings(
    State(state): State<ApiState>,
    Query(query): Query<BookingsQuery>,
) -> Json<Vec<BookingView>> {
    let filter = BookingFilter {
        room_id: query.room_id,
        status: query.status,
    };
    let bookings = state.engine.list_bookings(&filter).await;
    Json(bookings.into_iter().map(BookingView::from).collect())
}

async fn get_booking(
    State(state): State<ApiState>,
    Path(id): Path<Ulid>,
) -> Result<Json<BookingView>, ApiError> {
    state
        .engine
        .booking(id)
        .await
        .map(|b| Json(b.into()))
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "Booking not found"))
}

async fn create_booking(
    State(state): State<ApiState>,
    Json(payload): Json<BookingPayload>,
) -> Result<(StatusCode, Json<BookingView>), ApiError> {
    if payload.check_in_date >= payload.check_out_date {
        return Err(ApiError::bad_request(
            "Check-in date must be before check-out date",
        ));
    }
    let draft = BookingDraft {
        room_id: payload.room_id,
        guest_id: payload.guest_id,
        stay: StayRange::new(payload.check_in_date, payload.check_out_date),
        total_amount: payload.total_amount,
        paid_amount: payload.paid_amount,
        special_requests: payload.special_requests,
    };
    let booking = state
        .engine
        .create_booking(draft)
        .await
        .map_err(|e| state.reject(e))?;
    Ok((StatusCode::CREATED, Json(booking.into())))
}

async fn update_booking(
    State(state): State<ApiState>,
    Path(id): Path<Ulid>,
    Json(payload): Json<BookingUpdatePayload>,
) -> Result<Json<BookingView>, ApiError> {
    let stay = match (payload.check_in_date, payload.check_out_date) {
        (None, None) => None,
        (Some(a), Some(b)) => {
            if a >= b {
                return Err(ApiError::bad_request(
                    "Check-in date must be before check-out date",
                ));
            }
            Some(StayRange::new(a, b))
        }
        _ => {
            return Err(ApiError::bad_request(
                "Check-in and check-out dates must be updated together",
            ));
        }
    };
    let patch = BookingPatch {
        stay,
        total_amount: payload.total_amount,
        paid_amount: payload.paid_amount,
        special_requests: payload.special_requests,
    };
    state
        .engine
        .update_booking(id, patch)
        .await
        .map(|b| Json(b.into()))
        .map_err(|e| state.reject(e))
}

async fn delete_booking(
    State(state): State<ApiState>,
    Path(id): Path<Ulid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .engine
        .delete_booking(id)
        .await
        .map_err(|e| state.reject(e))?;
    Ok(Json(json!({ "message": "Booking deleted successfully" })))
}

async fn check_in(
    State(state): State<ApiState>,
    Path(id): Path<Ulid>,
) -> Result<Json<BookingView>, ApiError> {
    state
        .engine
        .check_in(id)
        .await
        .map(|b| Json(b.into()))
        .map_err(|e| state.reject(e))
}

async fn check_out(
    State(state): State<ApiState>,
    Path(id): Path<Ulid>,
) -> Result<Json<BookingView>, ApiError> {
    state
        .engine
        .check_out(id)
        .await
        .map(|b| Json(b.into()))
        .map_err(|e| state.reject(e))
}

async fn cancel_booking(
    State(state): State<ApiState>,
    Path(id): Path<Ulid>,
) -> Result<Json<BookingView>, ApiError> {
    state
        .engine
        .cancel_booking(id)
        .await
        .map(|b| Json(b.into()))
        .map_err(|e| state.reject(e))
}

// ── Guests ───────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GuestPayload {
    name: String,
    address: String,
    phone: String,
    gender: Gender,
    id_proof_type: IdProofType,
    id_number: String,
    id_proof_file: String,
    vehicle_number: Option<String>,
    #[serde(default)]
    additional_guests: Vec<CoOccupant>,
}

impl From<GuestPayload> for GuestDraft {
    fn from(p: GuestPayload) -> Self {
        GuestDraft {
            name: p.name,
            address: p.address,
            phone: p.phone,
            gender: p.gender,
            id_proof_type: p.id_proof_type,
            id_number: p.id_number,
            id_proof_file: p.id_proof_file,
            vehicle_number: p.vehicle_number,
            additional_guests: p.additional_guests,
        }
    }
}

async fn list_guests(State(state): State<ApiState>) -> Json<Vec<Guest>> {
    Json(state.engine.list_guests())
}

async fn get_guest(
    State(state): State<ApiState>,
    Path(id): Path<Ulid>,
) -> Result<Json<Guest>, ApiError> {
    state
        .engine
        .guest(id)
        .map(Json)
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "Guest not found"))
}

async fn register_guest(
    State(state): State<ApiState>,
    Json(payload): Json<GuestPayload>,
) -> Result<(StatusCode, Json<Guest>), ApiError> {
    let guest = state
        .engine
        .register_guest(payload.into())
        .await
        .map_err(|e| state.reject(e))?;
    Ok((StatusCode::CREATED, Json(guest)))
}

async fn update_guest(
    State(state): State<ApiState>,
    Path(id): Path<Ulid>,
    Json(payload): Json<GuestPayload>,
) -> Result<Json<Guest>, ApiError> {
    state
        .engine
        .update_guest(id, payload.into())
        .await
        .map(Json)
        .map_err(|e| state.reject(e))
}

async fn delete_guest(
    State(state): State<ApiState>,
    Path(id): Path<Ulid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .engine
        .delete_guest(id)
        .await
        .map_err(|e| state.reject(e))?;
    Ok(Json(json!({ "message": "Guest deleted successfully" })))
}
