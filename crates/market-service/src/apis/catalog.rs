//! Category and product endpoints.
//!
//! Reads are public; writes need a producer or admin identity.

use super::Ack;
use crate::identity::{Identity, MaybeIdentity};
use crate::server::AppState;
use axum::{
	extract::{Path, Query, State},
	http::StatusCode,
	response::Json,
	routing::{delete, get, post},
	Router,
};
use market_types::{
	APIError, Category, NewCategory, NewProduct, PageRequest, Paginated, Product, ProductFilter,
	ProductPatch,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewImage {
	url: String,
	#[serde(default)]
	is_primary: bool,
}

pub fn category_routes() -> Router<AppState> {
	Router::new()
		.route("/", get(list_categories).post(create_category))
		.route("/{id}", get(get_category))
}

pub fn product_routes() -> Router<AppState> {
	Router::new()
		.route("/", get(list_products).post(create_product))
		.route("/producer/me", get(list_my_products))
		.route(
			"/{id}",
			get(get_product).put(update_product).delete(delete_product),
		)
		.route("/{id}/images", post(add_image))
		.route("/{id}/images/{image_id}", delete(remove_image))
}

async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>, APIError> {
	Ok(Json(state.engine.catalog().list_categories().await?))
}

async fn get_category(
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> Result<Json<Category>, APIError> {
	Ok(Json(state.engine.catalog().get_category(&id).await?))
}

async fn create_category(
	State(state): State<AppState>,
	Identity(actor): Identity,
	Json(input): Json<NewCategory>,
) -> Result<(StatusCode, Json<Category>), APIError> {
	let category = state.engine.catalog().create_category(&actor, input).await?;
	Ok((StatusCode::CREATED, Json(category)))
}

async fn list_products(
	State(state): State<AppState>,
	MaybeIdentity(actor): MaybeIdentity,
	Query(filter): Query<ProductFilter>,
	Query(page): Query<PageRequest>,
) -> Result<Json<Paginated<Product>>, APIError> {
	Ok(Json(
		state
			.engine
			.catalog()
			.list_products(actor.as_ref(), &filter, &page)
			.await?,
	))
}

async fn list_my_products(
	State(state): State<AppState>,
	Identity(actor): Identity,
	Query(page): Query<PageRequest>,
) -> Result<Json<Paginated<Product>>, APIError> {
	Ok(Json(
		state.engine.catalog().list_my_products(&actor, &page).await?,
	))
}

async fn get_product(
	State(state): State<AppState>,
	MaybeIdentity(actor): MaybeIdentity,
	Path(id): Path<String>,
) -> Result<Json<Product>, APIError> {
	Ok(Json(
		state.engine.catalog().view_product(actor.as_ref(), &id).await?,
	))
}

async fn create_product(
	State(state): State<AppState>,
	Identity(actor): Identity,
	Json(input): Json<NewProduct>,
) -> Result<(StatusCode, Json<Product>), APIError> {
	let product = state.engine.catalog().create_product(&actor, input).await?;
	Ok((StatusCode::CREATED, Json(product)))
}

async fn update_product(
	State(state): State<AppState>,
	Identity(actor): Identity,
	Path(id): Path<String>,
	Json(patch): Json<ProductPatch>,
) -> Result<Json<Product>, APIError> {
	Ok(Json(
		state
			.engine
			.catalog()
			.update_product(&actor, &id, patch)
			.await?,
	))
}

async fn delete_product(
	State(state): State<AppState>,
	Identity(actor): Identity,
	Path(id): Path<String>,
) -> Result<Json<Ack>, APIError> {
	state.engine.catalog().deactivate_product(&actor, &id).await?;
	Ok(Json(Ack::new("Product deactivated")))
}

async fn add_image(
	State(state): State<AppState>,
	Identity(actor): Identity,
	Path(id): Path<String>,
	Json(image): Json<NewImage>,
) -> Result<Json<Product>, APIError> {
	Ok(Json(
		state
			.engine
			.catalog()
			.add_product_image(&actor, &id, &image.url, image.is_primary)
			.await?,
	))
}

async fn remove_image(
	State(state): State<AppState>,
	Identity(actor): Identity,
	Path((id, image_id)): Path<(String, String)>,
) -> Result<Json<Product>, APIError> {
	Ok(Json(
		state
			.engine
			.catalog()
			.remove_product_image(&actor, &id, &image_id)
			.await?,
	))
}
