//! Department-only handlers

use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::entity::department;
use crate::error::AppResult;
use crate::hierarchy::NodeView;
use crate::routes::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagerRequest {
    /// Absent or null clears the manager
    #[serde(default)]
    pub manager_id: Option<Uuid>,
}

/// PUT /api/departments/:id/manager
pub async fn assign_manager(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ManagerRequest>,
) -> AppResult<Json<ApiResponse<NodeView<department::Model>>>> {
    let departments = &state.departments;
    let node = departments
        .service
        .assign_manager(id, req.manager_id, state.employees.as_ref())
        .await?;
    Ok(Json(ApiResponse::success(departments.mapper.view(node).await?)))
}
