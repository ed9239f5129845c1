//! Caller identity.
//!
//! Authentication happens upstream of this service: a gateway verifies the
//! caller's credentials and forwards the result in the `x-user-id` and
//! `x-user-role` headers. These extractors only read them.

use axum::{extract::FromRequestParts, http::request::Parts};
use market_types::{APIError, Actor, Role};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

fn header<'a>(parts: &'a Parts, name: &str) -> Result<Option<&'a str>, APIError> {
	match parts.headers.get(name) {
		None => Ok(None),
		Some(value) => value
			.to_str()
			.map(|v| Some(v.trim()).filter(|v| !v.is_empty()))
			.map_err(|_| APIError::Unauthorized {
				message: format!("Header {} is not valid text", name),
			}),
	}
}

fn read_actor(parts: &Parts) -> Result<Option<Actor>, APIError> {
	let id = header(parts, USER_ID_HEADER)?;
	let role = header(parts, USER_ROLE_HEADER)?;
	match (id, role) {
		(None, None) => Ok(None),
		(Some(id), Some(role)) => {
			let role: Role = role
				.parse()
				.map_err(|message: String| APIError::Unauthorized { message })?;
			Ok(Some(Actor::new(id, role)))
		},
		_ => Err(APIError::Unauthorized {
			message: format!(
				"Both {} and {} are required",
				USER_ID_HEADER, USER_ROLE_HEADER
			),
		}),
	}
}

/// An authenticated caller. Rejects the request when identity is missing.
#[derive(Debug, Clone)]
pub struct Identity(pub Actor);

impl<S> FromRequestParts<S> for Identity
where
	S: Send + Sync,
{
	type Rejection = APIError;

	async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
		read_actor(parts)?.map(Identity).ok_or_else(|| APIError::Unauthorized {
			message: "Authentication required".into(),
		})
	}
}

/// A caller that may be anonymous, for public catalog reads.
#[derive(Debug, Clone)]
pub struct MaybeIdentity(pub Option<Actor>);

impl<S> FromRequestParts<S> for MaybeIdentity
where
	S: Send + Sync,
{
	type Rejection = APIError;

	async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
		Ok(MaybeIdentity(read_actor(parts)?))
	}
}
