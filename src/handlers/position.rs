//! Position-only handlers

use axum::{
    extract::{Query, State},
    response::Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::entity::position::{self, PositionFilter};
use crate::error::{AppError, AppResult};
use crate::hierarchy::NodeView;
use crate::routes::ApiResponse;
use crate::state::Hierarchy;

type PositionViews = Json<ApiResponse<Vec<NodeView<position::Model>>>>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterQuery {
    pub filter_by: String,
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentQuery {
    pub parent_id: Option<Uuid>,
}

async fn filtered(
    h: &Hierarchy<position::Model>,
    filter: PositionFilter,
    parent_id: Option<Uuid>,
) -> AppResult<PositionViews> {
    let nodes = h.service.list_by_filter(filter, parent_id).await?;
    Ok(Json(ApiResponse::success(h.mapper.views(nodes).await?)))
}

/// GET /api/positions/filter?filterBy=&parentId=
pub async fn by_filter(
    State(h): State<Hierarchy<position::Model>>,
    Query(query): Query<FilterQuery>,
) -> AppResult<PositionViews> {
    let filter = PositionFilter::from_code(&query.filter_by).ok_or_else(|| {
        AppError::Validation(format!("unknown position filter '{}'", query.filter_by))
    })?;
    filtered(&h, filter, query.parent_id).await
}

/// GET /api/positions/filter/chuc-vu?parentId=
pub async fn job_titles(
    State(h): State<Hierarchy<position::Model>>,
    Query(query): Query<ParentQuery>,
) -> AppResult<PositionViews> {
    filtered(&h, PositionFilter::JobTitle, query.parent_id).await
}
