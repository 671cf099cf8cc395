use std::future::{ready, Ready};

use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use log::*;

use crate::{
    config::{ServerOptions, DEFAULT_USER_HEADER},
    errors::ServerError,
};

/// The id of the user making the request.
///
/// Authentication happens upstream of this server, which forwards the user id in a header. The header name comes from
/// [`ServerOptions`] if they are registered as app data, and is `X-User-Id` otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserId(pub i64);

impl FromRequest for UserId {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(get_user_id(req))
    }
}

pub fn get_user_id(req: &HttpRequest) -> Result<UserId, ServerError> {
    let header = req
        .app_data::<web::Data<ServerOptions>>()
        .map(|o| o.user_header.as_str())
        .unwrap_or(DEFAULT_USER_HEADER);
    let value = req.headers().get(header).ok_or_else(|| {
        debug!("💻️ Request to {} has no {header} header", req.path());
        ServerError::MissingUserId
    })?;
    let value = value.to_str().map_err(|e| ServerError::InvalidUserId(e.to_string()))?;
    let user_id = value.trim().parse::<i64>().map_err(|e| ServerError::InvalidUserId(format!("{value}: {e}")))?;
    trace!("💻️ Request from user {user_id}");
    Ok(UserId(user_id))
}
