//! Cart endpoints. Every route acts on the caller's own cart.

use super::Ack;
use crate::identity::Identity;
use crate::server::AppState;
use axum::{
	extract::{Path, State},
	response::Json,
	routing::{get, put},
	Router,
};
use market_types::{APIError, AddCartItem, CartView};
use rust_decimal::Decimal;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct UpdateQuantity {
	quantity: Decimal,
}

pub fn routes() -> Router<AppState> {
	Router::new()
		.route("/", get(get_cart).post(add_item).delete(clear_cart))
		.route("/{item_id}", put(update_item).delete(remove_item))
}

async fn get_cart(
	State(state): State<AppState>,
	Identity(actor): Identity,
) -> Result<Json<CartView>, APIError> {
	Ok(Json(state.engine.carts().get_cart(&actor).await?))
}

async fn add_item(
	State(state): State<AppState>,
	Identity(actor): Identity,
	Json(item): Json<AddCartItem>,
) -> Result<Json<CartView>, APIError> {
	Ok(Json(
		state
			.engine
			.carts()
			.add_to_cart(&actor, &item.product_id, item.quantity)
			.await?,
	))
}

async fn update_item(
	State(state): State<AppState>,
	Identity(actor): Identity,
	Path(item_id): Path<String>,
	Json(body): Json<UpdateQuantity>,
) -> Result<Json<CartView>, APIError> {
	Ok(Json(
		state
			.engine
			.carts()
			.update_cart_item(&actor, &item_id, body.quantity)
			.await?,
	))
}

async fn remove_item(
	State(state): State<AppState>,
	Identity(actor): Identity,
	Path(item_id): Path<String>,
) -> Result<Json<CartView>, APIError> {
	Ok(Json(
		state.engine.carts().remove_from_cart(&actor, &item_id).await?,
	))
}

async fn clear_cart(
	State(state): State<AppState>,
	Identity(actor): Identity,
) -> Result<Json<Ack>, APIError> {
	state.engine.carts().clear_cart(&actor).await?;
	Ok(Json(Ack::new("Cart cleared")))
}
