use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveTime;
use serde_json::json;
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

/// SQLSTATE for `exclusion_violation`
pub const EXCLUSION_VIOLATION: &str = "23P01";
/// SQLSTATE for `unique_violation`
pub const UNIQUE_VIOLATION: &str = "23505";

/// Coarse error categories returned to the API layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    InvalidInput,
    OutsideWorkingHours,
    LocationOccupied,
    InsufficientSeats,
    SeatAlreadyTaken,
    MovieNotEntitled,
    ServiceUnavailable,
    Conflict,
    Unauthenticated,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::OutsideWorkingHours => "outside_working_hours",
            ErrorKind::LocationOccupied => "location_occupied",
            ErrorKind::InsufficientSeats => "insufficient_seats",
            ErrorKind::SeatAlreadyTaken => "seat_already_taken",
            ErrorKind::MovieNotEntitled => "movie_not_entitled",
            ErrorKind::ServiceUnavailable => "service_unavailable",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Unauthenticated => "unauthenticated",
            ErrorKind::Internal => "internal",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::InvalidInput | ErrorKind::OutsideWorkingHours | ErrorKind::MovieNotEntitled => {
                StatusCode::BAD_REQUEST
            }
            ErrorKind::LocationOccupied
            | ErrorKind::InsufficientSeats
            | ErrorKind::SeatAlreadyTaken
            | ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Location {0} not found")]
    LocationNotFound(Uuid),
    #[error("Event {0} not found")]
    EventNotFound(Uuid),
    #[error("Seat {0} not found")]
    SeatNotFound(Uuid),
    #[error("Booking {0} not found")]
    BookingNotFound(Uuid),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("The event duration should be a multiple of 30 minutes and last at least 30 minutes, got {0}s")]
    InvalidDuration(i32),
    #[error("Event can't be organized in the past")]
    PastEvent,
    #[error("The event should have between 1 and {capacity} participants, not {requested}")]
    InvalidParticipants { requested: i32, capacity: i32 },
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Event can be organized only at working hours: between {open} and {close}")]
    OutsideWorkingHours { open: NaiveTime, close: NaiveTime },
    #[error("The location is already occupied for this period")]
    LocationOccupied,
    #[error("There are {vacant} vacant seats, not enough for {requested} people")]
    InsufficientSeats { requested: i32, vacant: i32 },
    #[error("Seat is already taken for this event")]
    SeatAlreadyTaken,
    #[error("Movie {0} is neither free nor purchased")]
    MovieNotEntitled(Uuid),
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Unauthenticated")]
    Unauthenticated,
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::LocationNotFound(_)
            | EngineError::EventNotFound(_)
            | EngineError::SeatNotFound(_)
            | EngineError::BookingNotFound(_) => ErrorKind::NotFound,
            EngineError::Forbidden(_) => ErrorKind::Forbidden,
            EngineError::InvalidDuration(_)
            | EngineError::PastEvent
            | EngineError::InvalidParticipants { .. }
            | EngineError::InvalidInput(_)
            | EngineError::InvalidState(_) => ErrorKind::InvalidInput,
            EngineError::OutsideWorkingHours { .. } => ErrorKind::OutsideWorkingHours,
            EngineError::LocationOccupied => ErrorKind::LocationOccupied,
            EngineError::InsufficientSeats { .. } => ErrorKind::InsufficientSeats,
            EngineError::SeatAlreadyTaken => ErrorKind::SeatAlreadyTaken,
            EngineError::MovieNotEntitled(_) => ErrorKind::MovieNotEntitled,
            EngineError::ServiceUnavailable(_) => ErrorKind::ServiceUnavailable,
            EngineError::Conflict(_) => ErrorKind::Conflict,
            EngineError::Unauthenticated => ErrorKind::Unauthenticated,
            EngineError::Database(_) => ErrorKind::Internal,
        }
    }
}

fn sqlstate(err: &sqlx::Error) -> Option<String> {
    err.as_database_error()
        .and_then(|db_err| db_err.code())
        .map(|code| code.into_owned())
}

/// Exclusion violation on the event time range means another admission won the race.
pub fn translate_schedule_conflict(err: sqlx::Error) -> EngineError {
    match sqlstate(&err).as_deref() {
        Some(EXCLUSION_VIOLATION) => EngineError::LocationOccupied,
        _ => EngineError::Database(err),
    }
}

/// Unique violation on (event_id, seat_id) means the slot was claimed concurrently.
pub fn translate_seat_conflict(err: sqlx::Error) -> EngineError {
    match sqlstate(&err).as_deref() {
        Some(UNIQUE_VIOLATION) => EngineError::SeatAlreadyTaken,
        _ => EngineError::Database(err),
    }
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let message = match &self {
            EngineError::Database(e) => {
                error!("Database error: {:?}", e);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": message,
            "kind": kind.as_str(),
        }));

        (kind.status_code(), body).into_response()
    }
}
