//! HTTP server exposing the marketplace engine under `/api`.

use crate::apis;
use axum::{
	http::{HeaderValue, StatusCode},
	response::Json,
	routing::get,
	Router,
};
use market_config::ApiConfig;
use market_core::MarketEngine;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
	cors::{AllowOrigin, Any, CorsLayer},
	limit::RequestBodyLimitLayer,
	timeout::TimeoutLayer,
	trace::TraceLayer,
};

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	pub engine: Arc<MarketEngine>,
}

fn cors_layer(api_config: &ApiConfig) -> CorsLayer {
	let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
	match &api_config.cors {
		Some(cors) if !cors.allowed_origins.iter().any(|o| o == "*") => {
			let origins: Vec<HeaderValue> = cors
				.allowed_origins
				.iter()
				.filter_map(|origin| match origin.parse() {
					Ok(value) => Some(value),
					Err(_) => {
						tracing::warn!(%origin, "Ignoring invalid CORS origin");
						None
					},
				})
				.collect();
			layer.allow_origin(AllowOrigin::list(origins))
		},
		_ => layer.allow_origin(Any),
	}
}

/// Builds the application router with its middleware stack.
pub fn router(engine: Arc<MarketEngine>, api_config: &ApiConfig) -> Router {
	let state = AppState { engine };

	let api = Router::new()
		.route("/health", get(health))
		.nest("/categories", apis::catalog::category_routes())
		.nest("/products", apis::catalog::product_routes())
		.nest("/cart", apis::cart::routes())
		.nest("/addresses", apis::addresses::routes())
		.nest("/orders", apis::orders::routes());

	Router::new()
		.nest("/api", api)
		.layer(
			ServiceBuilder::new()
				.layer(RequestBodyLimitLayer::new(api_config.max_request_size))
				.layer(TraceLayer::new_for_http())
				.layer(cors_layer(api_config))
				.layer(TimeoutLayer::with_status_code(
					StatusCode::REQUEST_TIMEOUT,
					Duration::from_secs(api_config.timeout_seconds),
				)),
		)
		.with_state(state)
}

/// Runs the API server until ctrl-c.
pub async fn start_server(
	api_config: ApiConfig,
	engine: Arc<MarketEngine>,
) -> Result<(), Box<dyn std::error::Error>> {
	let app = router(engine, &api_config);

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Marketplace API server starting on {}", bind_address);

	axum::serve(listener, app)
		.with_graceful_shutdown(shutdown_signal())
		.await?;

	Ok(())
}

async fn shutdown_signal() {
	if let Err(e) = tokio::signal::ctrl_c().await {
		tracing::error!(error = %e, "Failed to listen for shutdown signal");
		return;
	}
	tracing::info!("Shutdown signal received");
}

/// GET /api/health
async fn health() -> (StatusCode, Json<Value>) {
	(StatusCode::OK, Json(json!({ "status": "ok" })))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::identity::{USER_ID_HEADER, USER_ROLE_HEADER};
	use axum::body::{to_bytes, Body};
	use axum::http::{Method, Request};
	use market_config::Config;
	use tower::ServiceExt;

	const CONFIG: &str = r#"
[market]
id = "test-market"

[storage]
primary = "memory"
[storage.implementations.memory]

[pricing]
primary = "flat_rate"
[pricing.implementations.flat_rate]

[api]
enabled = true
"#;

	fn app() -> Router {
		let config: Config = CONFIG.parse().unwrap();
		let api_config = config.api.clone().unwrap();
		let engine = crate::factory_registry::build_market_from_config(config).unwrap();
		router(Arc::new(engine), &api_config)
	}

	async fn call(
		app: &Router,
		method: Method,
		uri: &str,
		who: Option<(&str, &str)>,
		body: Option<Value>,
	) -> (StatusCode, Value) {
		let mut request = Request::builder().method(method).uri(uri);
		if let Some((id, role)) = who {
			request = request
				.header(USER_ID_HEADER, id)
				.header(USER_ROLE_HEADER, role);
		}
		let request = match body {
			Some(body) => request
				.header("content-type", "application/json")
				.body(Body::from(body.to_string()))
				.unwrap(),
			None => request.body(Body::empty()).unwrap(),
		};

		let response = app.clone().oneshot(request).await.unwrap();
		let status = response.status();
		let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
		let value = if bytes.is_empty() {
			Value::Null
		} else {
			serde_json::from_slice(&bytes).unwrap_or(Value::Null)
		};
		(status, value)
	}

	#[tokio::test]
	async fn test_health() {
		let app = app();
		let (status, body) = call(&app, Method::GET, "/api/health", None, None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["status"], "ok");
	}

	#[tokio::test]
	async fn test_checkout_flow_over_http() {
		let app = app();
		let admin = Some(("admin-1", "ADMIN"));
		let farmer = Some(("farmer-1", "PRODUCER"));
		let buyer = Some(("client-1", "CLIENT"));

		let (status, category) = call(
			&app,
			Method::POST,
			"/api/categories",
			admin,
			Some(json!({ "name": "Fruits" })),
		)
		.await;
		assert_eq!(status, StatusCode::CREATED);

		let (status, product) = call(
			&app,
			Method::POST,
			"/api/products",
			farmer,
			Some(json!({
				"categoryId": category["id"],
				"name": "Ananas",
				"price": 2500,
				"unit": "UNIT",
				"stock": 10
			})),
		)
		.await;
		assert_eq!(status, StatusCode::CREATED);
		let product_id = product["id"].as_str().unwrap().to_string();

		let (status, address) = call(
			&app,
			Method::POST,
			"/api/addresses",
			buyer,
			Some(json!({
				"label": "Maison",
				"fullAddress": "Rue 1, Akwa",
				"city": "Douala"
			})),
		)
		.await;
		assert_eq!(status, StatusCode::CREATED);
		assert_eq!(address["isDefault"], true);

		let (status, cart) = call(
			&app,
			Method::POST,
			"/api/cart",
			buyer,
			Some(json!({ "productId": product_id, "quantity": 2 })),
		)
		.await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(cart["subtotal"], 5000);

		let (status, order) = call(
			&app,
			Method::POST,
			"/api/orders",
			buyer,
			Some(json!({ "addressId": address["id"] })),
		)
		.await;
		assert_eq!(status, StatusCode::CREATED);
		assert_eq!(order["total"], 6000);
		assert_eq!(order["status"], "PENDING");
		let order_id = order["id"].as_str().unwrap().to_string();

		let (status, error) = call(
			&app,
			Method::PUT,
			&format!("/api/orders/{}/status", order_id),
			buyer,
			Some(json!({ "status": "PREPARING" })),
		)
		.await;
		assert_eq!(status, StatusCode::FORBIDDEN);
		assert_eq!(error["error"], "FORBIDDEN_TRANSITION");

		let (status, order) = call(
			&app,
			Method::PUT,
			&format!("/api/orders/{}/status", order_id),
			buyer,
			Some(json!({ "status": "CANCELLED" })),
		)
		.await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(order["status"], "CANCELLED");

		let (_, product) = call(
			&app,
			Method::GET,
			&format!("/api/products/{}", product_id),
			None,
			None,
		)
		.await;
		assert_eq!(product["stock"], json!(rust_decimal::Decimal::from(10)));
	}

	#[tokio::test]
	async fn test_oversized_body_rejected() {
		let config: Config = CONFIG.parse().unwrap();
		let mut api_config = config.api.clone().unwrap();
		api_config.max_request_size = 256;
		let engine = crate::factory_registry::build_market_from_config(config).unwrap();
		let app = router(Arc::new(engine), &api_config);
		let buyer = Some(("client-1", "CLIENT"));

		let (status, _) = call(
			&app,
			Method::POST,
			"/api/addresses",
			buyer,
			Some(json!({
				"label": "Maison",
				"fullAddress": "x".repeat(1024),
				"city": "Douala"
			})),
		)
		.await;
		assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);

		let (status, _) = call(
			&app,
			Method::POST,
			"/api/addresses",
			buyer,
			Some(json!({
				"label": "Maison",
				"fullAddress": "Rue 1",
				"city": "Douala"
			})),
		)
		.await;
		assert_eq!(status, StatusCode::CREATED);
	}

	#[tokio::test]
	async fn test_error_mapping() {
		let app = app();
		let buyer = Some(("client-1", "CLIENT"));

		let (status, body) = call(&app, Method::GET, "/api/orders/me", None, None).await;
		assert_eq!(status, StatusCode::UNAUTHORIZED);
		assert_eq!(body["error"], "UNAUTHENTICATED");

		let (status, body) = call(
			&app,
			Method::POST,
			"/api/orders",
			buyer,
			Some(json!({ "addressId": "nowhere" })),
		)
		.await;
		assert_eq!(status, StatusCode::NOT_FOUND);
		assert_eq!(body["error"], "NOT_FOUND");

		let (status, body) = call(&app, Method::GET, "/api/orders", buyer, None).await;
		assert_eq!(status, StatusCode::FORBIDDEN);
		assert_eq!(body["error"], "FORBIDDEN");

		let (status, body) = call(&app, Method::GET, "/api/orders/me", buyer, None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["pagination"]["total"], 0);
		assert_eq!(body["pagination"]["limit"], 20);
	}
}
