//! Resolves the caller from the headers set by the upstream auth gate.
//!
//! - `x-user-id`: the caller's UUID
//! - `x-user-role`: `admin` or `user`

use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::{
    errors::AppError,
    models::caller::{Caller, Role},
};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

fn header_str<'a>(parts: &'a Parts, name: &str) -> Result<&'a str, AppError> {
    parts
        .headers
        .get(name)
        .ok_or_else(|| AppError::unauthorized(format!("missing {} header", name)))?
        .to_str()
        .map_err(|_| AppError::unauthorized(format!("malformed {} header", name)))
}

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = Uuid::parse_str(header_str(parts, USER_ID_HEADER)?.trim())
            .map_err(|_| AppError::unauthorized("x-user-id is not a valid id"))?;
        let role = Role::parse(header_str(parts, USER_ROLE_HEADER)?)
            .ok_or_else(|| AppError::unauthorized("unknown role"))?;
        Ok(Caller::new(user_id, role))
    }
}
