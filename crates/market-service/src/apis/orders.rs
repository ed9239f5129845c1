//! Order endpoints.

use crate::identity::Identity;
use crate::server::AppState;
use axum::{
	extract::{Path, Query, State},
	http::StatusCode,
	response::Json,
	routing::{get, put},
	Router,
};
use market_types::{
	APIError, AssignDeliveryRequest, CreateOrderRequest, OrderListQuery, OrderView, Paginated,
	UpdateStatusRequest,
};

pub fn routes() -> Router<AppState> {
	Router::new()
		.route("/", get(list_all_orders).post(create_order))
		.route("/me", get(list_my_orders))
		.route("/producer/orders", get(list_producer_orders))
		.route("/{id}", get(get_order))
		.route("/{id}/status", put(update_status))
		.route("/{id}/assign", put(assign_delivery))
}

/// POST /api/orders
async fn create_order(
	State(state): State<AppState>,
	Identity(actor): Identity,
	Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderView>), APIError> {
	let order = state.engine.orders().create_order(&actor, request).await?;
	Ok((StatusCode::CREATED, Json(order)))
}

/// GET /api/orders/me
async fn list_my_orders(
	State(state): State<AppState>,
	Identity(actor): Identity,
	Query(query): Query<OrderListQuery>,
) -> Result<Json<Paginated<OrderView>>, APIError> {
	Ok(Json(state.engine.orders().get_my_orders(&actor, &query).await?))
}

/// GET /api/orders/producer/orders
async fn list_producer_orders(
	State(state): State<AppState>,
	Identity(actor): Identity,
	Query(query): Query<OrderListQuery>,
) -> Result<Json<Paginated<OrderView>>, APIError> {
	Ok(Json(
		state
			.engine
			.orders()
			.get_producer_orders(&actor, &query)
			.await?,
	))
}

/// GET /api/orders
async fn list_all_orders(
	State(state): State<AppState>,
	Identity(actor): Identity,
	Query(query): Query<OrderListQuery>,
) -> Result<Json<Paginated<OrderView>>, APIError> {
	Ok(Json(state.engine.orders().get_all_orders(&actor, &query).await?))
}

/// GET /api/orders/{id}
async fn get_order(
	State(state): State<AppState>,
	Identity(actor): Identity,
	Path(id): Path<String>,
) -> Result<Json<OrderView>, APIError> {
	Ok(Json(state.engine.orders().get_order(&actor, &id).await?))
}

/// PUT /api/orders/{id}/status
async fn update_status(
	State(state): State<AppState>,
	Identity(actor): Identity,
	Path(id): Path<String>,
	Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<OrderView>, APIError> {
	let order = state
		.engine
		.orders()
		.update_order_status(&actor, &id, request.status)
		.await
		.inspect_err(|e| tracing::warn!(order_id = %id, error = %e, "Status update rejected"))?;
	Ok(Json(order))
}

/// PUT /api/orders/{id}/assign
async fn assign_delivery(
	State(state): State<AppState>,
	Identity(actor): Identity,
	Path(id): Path<String>,
	Json(request): Json<AssignDeliveryRequest>,
) -> Result<Json<OrderView>, APIError> {
	Ok(Json(
		state
			.engine
			.orders()
			.assign_delivery_person(&actor, &id, &request.delivery_person_id)
			.await?,
	))
}
