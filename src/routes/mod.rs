use axum::{
    extract::FromRef,
    http::StatusCode,
    response::Json,
    routing::{get, post, put},
    Router,
};
use serde::{de::DeserializeOwned, Serialize};
use tower_http::trace::TraceLayer;

use crate::entity::{department, position};
use crate::handlers::{custom_field, department as department_api, position as position_api, tree};
use crate::hierarchy::TreeNode;
use crate::state::{AppState, Hierarchy};

pub mod health;

/// API response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub code: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: true,
            message: "success".to_string(),
            data: Some(data),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            code: false,
            message: message.into(),
            data: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn success_msg(message: impl Into<String>) -> Self {
        Self {
            code: true,
            message: message.into(),
            data: None,
        }
    }
}

/// Routes shared by every tree kind
fn tree_routes<N>() -> Router<AppState>
where
    N: TreeNode + Serialize,
    N::Input: DeserializeOwned,
    Hierarchy<N>: FromRef<AppState>,
{
    Router::new()
        .route("/", get(tree::list::<N>).post(tree::create::<N>))
        .route("/tree", get(tree::tree::<N>))
        .route("/roots", get(tree::roots::<N>))
        .route("/active", get(tree::active::<N>))
        .route("/leaves", get(tree::leaves::<N>))
        .route("/search", get(tree::search::<N>))
        .route("/statistics", get(tree::statistics::<N>))
        .route("/reorder", put(tree::reorder::<N>))
        .route("/bulk-delete", post(tree::bulk_delete::<N>))
        .route(
            "/:id",
            get(tree::get_one::<N>)
                .put(tree::update::<N>)
                .delete(tree::delete::<N>),
        )
        .route("/:id/children", get(tree::children::<N>))
        .route("/:id/descendants", get(tree::descendants::<N>))
        .route("/:id/ancestors", get(tree::ancestors::<N>))
        .route("/:id/move", put(tree::move_node::<N>))
        .route("/:id/refresh-count", post(tree::refresh_count::<N>))
}

fn custom_field_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(custom_field::list).post(custom_field::create))
        .route("/active", get(custom_field::active))
        .route("/categories", get(custom_field::categories))
        .route("/categories/active", get(custom_field::active_categories))
        .route("/search", get(custom_field::search))
        .route("/exists", get(custom_field::exists))
        .route("/stats", get(custom_field::stats))
        .route("/stats/active", get(custom_field::active_stats))
        .route("/category/:category", get(custom_field::by_category))
        .route("/category/:category/active", get(custom_field::active_by_category))
        .route("/type/:field_type", get(custom_field::by_type))
        .route("/type/:field_type/active", get(custom_field::active_by_type))
        .route("/required/:required", get(custom_field::by_required))
        .route("/required/:required/active", get(custom_field::active_by_required))
        .route("/reorder", put(custom_field::reorder))
        .route(
            "/:id",
            get(custom_field::get_one)
                .put(custom_field::update)
                .delete(custom_field::delete),
        )
        .route("/:id/toggle", put(custom_field::toggle))
}

/// Create the main router
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health::health_check))
        .nest(
            "/departments",
            tree_routes::<department::Model>()
                .route("/:id/manager", put(department_api::assign_manager)),
        )
        .nest(
            "/positions",
            tree_routes::<position::Model>()
                .route("/filter", get(position_api::by_filter))
                .route("/filter/chuc-vu", get(position_api::job_titles)),
        )
        .nest("/custom-fields", custom_field_routes());

    Router::new()
        .nest("/api", api_routes)
        .fallback(fallback)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Fallback handler for 404
pub async fn fallback() -> (StatusCode, Json<ApiResponse<()>>) {
    (StatusCode::NOT_FOUND, Json(ApiResponse::error("Not Found")))
}
