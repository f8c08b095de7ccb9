//! Failure taxonomy shared by every parking operation.

use thiserror::Error;
use uuid::Uuid;

/// Coarse class of a failure, used by the transport to pick a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Forbidden,
    InvalidInput,
    AlreadyCompleted,
    Internal,
}

#[derive(Debug, Error)]
pub enum ParkingError {
    #[error("parking lot `{0}` not found")]
    LotNotFound(Uuid),
    #[error("parking spot not found")]
    SpotNotFound,
    #[error("vehicle `{0}` not found")]
    VehicleNotFound(Uuid),
    #[error("booking `{0}` not found")]
    BookingNotFound(Uuid),
    #[error("vehicle has no active reservation")]
    NoActiveReservation,
    #[error("spot has no active booking")]
    NoActiveBooking,

    #[error("spot is not available for reservation")]
    SpotUnavailable,
    #[error("spot is already occupied")]
    SpotOccupied,
    #[error("spot is held by another reservation")]
    SpotReserved,
    #[error("spot already has an active booking")]
    SpotAlreadyBooked,
    #[error("spot is not currently occupied")]
    SpotNotOccupied,
    #[error("vehicle already has an active booking")]
    VehicleAlreadyBooked,
    #[error("vehicle already has an active reservation")]
    VehicleAlreadyReserved,
    #[error("vehicle has an active booking or reservation")]
    VehicleBusy,
    #[error("a parking lot already exists at `{0}`")]
    DuplicateAddress(String),
    #[error("a vehicle with license plate `{0}` already exists")]
    DuplicateLicensePlate(String),
    #[error("lot has occupied spots")]
    HasOccupiedSpots,

    #[error("{0}")]
    Forbidden(String),

    #[error("number of spots must be greater than 0")]
    InvalidSpotCount,
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("booking is already completed")]
    AlreadyCompleted,

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type ParkingResult<T> = Result<T, ParkingError>;

impl ParkingError {
    pub fn kind(&self) -> ErrorKind {
        use ParkingError::*;
        match self {
            LotNotFound(_) | SpotNotFound | VehicleNotFound(_) | BookingNotFound(_)
            | NoActiveReservation | NoActiveBooking => ErrorKind::NotFound,
            SpotUnavailable | SpotOccupied | SpotReserved | SpotAlreadyBooked
            | SpotNotOccupied | VehicleAlreadyBooked | VehicleAlreadyReserved | VehicleBusy
            | DuplicateAddress(_) | DuplicateLicensePlate(_) | HasOccupiedSpots => {
                ErrorKind::Conflict
            }
            Forbidden(_) => ErrorKind::Forbidden,
            InvalidSpotCount | InvalidInput(_) => ErrorKind::InvalidInput,
            AlreadyCompleted => ErrorKind::AlreadyCompleted,
            Sqlx(_) => ErrorKind::Internal,
        }
    }
}

/// Return true if SQLx error indicates a unique constraint violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.message().to_ascii_lowercase().contains("unique")
    )
}
