//! Address book endpoints.

use super::Ack;
use crate::identity::Identity;
use crate::server::AppState;
use axum::{
	extract::{Path, State},
	http::StatusCode,
	response::Json,
	routing::{get, put},
	Router,
};
use market_types::{APIError, Address, AddressPatch, NewAddress};

pub fn routes() -> Router<AppState> {
	Router::new()
		.route("/", get(list_addresses).post(create_address))
		.route(
			"/{id}",
			get(get_address).put(update_address).delete(delete_address),
		)
		.route("/{id}/default", put(set_default))
}

async fn list_addresses(
	State(state): State<AppState>,
	Identity(actor): Identity,
) -> Result<Json<Vec<Address>>, APIError> {
	Ok(Json(state.engine.addresses().list_addresses(&actor).await?))
}

async fn get_address(
	State(state): State<AppState>,
	Identity(actor): Identity,
	Path(id): Path<String>,
) -> Result<Json<Address>, APIError> {
	Ok(Json(state.engine.addresses().get_address(&actor, &id).await?))
}

async fn create_address(
	State(state): State<AppState>,
	Identity(actor): Identity,
	Json(input): Json<NewAddress>,
) -> Result<(StatusCode, Json<Address>), APIError> {
	let address = state.engine.addresses().create_address(&actor, input).await?;
	Ok((StatusCode::CREATED, Json(address)))
}

async fn update_address(
	State(state): State<AppState>,
	Identity(actor): Identity,
	Path(id): Path<String>,
	Json(patch): Json<AddressPatch>,
) -> Result<Json<Address>, APIError> {
	Ok(Json(
		state
			.engine
			.addresses()
			.update_address(&actor, &id, patch)
			.await?,
	))
}

async fn delete_address(
	State(state): State<AppState>,
	Identity(actor): Identity,
	Path(id): Path<String>,
) -> Result<Json<Ack>, APIError> {
	state.engine.addresses().delete_address(&actor, &id).await?;
	Ok(Json(Ack::new("Address deleted")))
}

async fn set_default(
	State(state): State<AppState>,
	Identity(actor): Identity,
	Path(id): Path<String>,
) -> Result<Json<Address>, APIError> {
	Ok(Json(
		state
			.engine
			.addresses()
			.set_default_address(&actor, &id)
			.await?,
	))
}
