//! Tree handlers
//!
//! One set of handlers for every hierarchy kind; routes pick the kind with a
//! turbofish. Everything returned is a mapped view, never a bare row.

use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppResult;
use crate::hierarchy::{HierarchyStats, NodeTree, NodeView, TreeNode};
use crate::routes::ApiResponse;
use crate::state::Hierarchy;

type ViewList<N> = Json<ApiResponse<Vec<NodeView<N>>>>;
type ViewOne<N> = Json<ApiResponse<NodeView<N>>>;

/// Move request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRequest {
    /// New parent; absent or null detaches to a root
    #[serde(default)]
    pub parent_id: Option<Uuid>,
}

/// Ordered id list for reorder and bulk delete
#[derive(Debug, Deserialize)]
pub struct IdsRequest {
    pub ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Deserialize)]
pub struct LeavesQuery {
    pub under: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct BulkDeleteResponse {
    pub deleted: usize,
}

/// GET /api/{kind}
pub async fn list<N: TreeNode + Serialize>(State(h): State<Hierarchy<N>>) -> AppResult<ViewList<N>> {
    let nodes = h.service.list_all().await?;
    Ok(Json(ApiResponse::success(h.mapper.views(nodes).await?)))
}

/// GET /api/{kind}/tree
pub async fn tree<N: TreeNode + Serialize>(
    State(h): State<Hierarchy<N>>,
) -> AppResult<Json<ApiResponse<Vec<NodeTree<N>>>>> {
    Ok(Json(ApiResponse::success(h.mapper.tree().await?)))
}

/// GET /api/{kind}/roots
pub async fn roots<N: TreeNode + Serialize>(State(h): State<Hierarchy<N>>) -> AppResult<ViewList<N>> {
    let nodes = h.service.list_roots().await?;
    Ok(Json(ApiResponse::success(h.mapper.views(nodes).await?)))
}

/// GET /api/{kind}/active
pub async fn active<N: TreeNode + Serialize>(State(h): State<Hierarchy<N>>) -> AppResult<ViewList<N>> {
    let nodes = h.service.list_active().await?;
    Ok(Json(ApiResponse::success(h.mapper.views(nodes).await?)))
}

/// GET /api/{kind}/leaves?under=
pub async fn leaves<N: TreeNode + Serialize>(
    State(h): State<Hierarchy<N>>,
    Query(query): Query<LeavesQuery>,
) -> AppResult<ViewList<N>> {
    let nodes = h.service.leaves(query.under).await?;
    Ok(Json(ApiResponse::success(h.mapper.views(nodes).await?)))
}

/// GET /api/{kind}/search?q=
pub async fn search<N: TreeNode + Serialize>(
    State(h): State<Hierarchy<N>>,
    Query(query): Query<SearchQuery>,
) -> AppResult<ViewList<N>> {
    let nodes = h.service.search(&query.q).await?;
    Ok(Json(ApiResponse::success(h.mapper.views(nodes).await?)))
}

/// GET /api/{kind}/statistics
pub async fn statistics<N: TreeNode>(
    State(h): State<Hierarchy<N>>,
) -> AppResult<Json<ApiResponse<HierarchyStats>>> {
    Ok(Json(ApiResponse::success(h.service.statistics().await?)))
}

/// GET /api/{kind}/:id
pub async fn get_one<N: TreeNode + Serialize>(
    State(h): State<Hierarchy<N>>,
    Path(id): Path<Uuid>,
) -> AppResult<ViewOne<N>> {
    let node = h.service.get(id).await?;
    Ok(Json(ApiResponse::success(h.mapper.view(node).await?)))
}

/// GET /api/{kind}/:id/children
pub async fn children<N: TreeNode + Serialize>(
    State(h): State<Hierarchy<N>>,
    Path(id): Path<Uuid>,
) -> AppResult<ViewList<N>> {
    let nodes = h.service.list_children(id).await?;
    Ok(Json(ApiResponse::success(h.mapper.views(nodes).await?)))
}

/// GET /api/{kind}/:id/descendants
pub async fn descendants<N: TreeNode + Serialize>(
    State(h): State<Hierarchy<N>>,
    Path(id): Path<Uuid>,
) -> AppResult<ViewList<N>> {
    let nodes = h.service.descendants(id).await?;
    Ok(Json(ApiResponse::success(h.mapper.views(nodes).await?)))
}

/// GET /api/{kind}/:id/ancestors
pub async fn ancestors<N: TreeNode + Serialize>(
    State(h): State<Hierarchy<N>>,
    Path(id): Path<Uuid>,
) -> AppResult<ViewList<N>> {
    let nodes = h.service.ancestors(id).await?;
    Ok(Json(ApiResponse::success(h.mapper.views(nodes).await?)))
}

/// POST /api/{kind}
pub async fn create<N>(State(h): State<Hierarchy<N>>, Json(input): Json<N::Input>) -> AppResult<ViewOne<N>>
where
    N: TreeNode + Serialize,
    N::Input: DeserializeOwned,
{
    let node = h.service.create(input).await?;
    Ok(Json(ApiResponse::success(h.mapper.view(node).await?)))
}

/// PUT /api/{kind}/:id
pub async fn update<N>(
    State(h): State<Hierarchy<N>>,
    Path(id): Path<Uuid>,
    Json(input): Json<N::Input>,
) -> AppResult<ViewOne<N>>
where
    N: TreeNode + Serialize,
    N::Input: DeserializeOwned,
{
    let node = h.service.update(id, input).await?;
    Ok(Json(ApiResponse::success(h.mapper.view(node).await?)))
}

/// DELETE /api/{kind}/:id
pub async fn delete<N: TreeNode>(
    State(h): State<Hierarchy<N>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<()>>> {
    h.service.delete(id).await?;
    Ok(Json(ApiResponse::success_msg("deleted")))
}

/// PUT /api/{kind}/:id/move
pub async fn move_node<N: TreeNode + Serialize>(
    State(h): State<Hierarchy<N>>,
    Path(id): Path<Uuid>,
    Json(req): Json<MoveRequest>,
) -> AppResult<ViewOne<N>> {
    let node = h.service.move_node(id, req.parent_id).await?;
    Ok(Json(ApiResponse::success(h.mapper.view(node).await?)))
}

/// PUT /api/{kind}/reorder
pub async fn reorder<N: TreeNode + Serialize>(
    State(h): State<Hierarchy<N>>,
    Json(req): Json<IdsRequest>,
) -> AppResult<ViewList<N>> {
    let nodes = h.service.reorder(&req.ids).await?;
    Ok(Json(ApiResponse::success(h.mapper.views(nodes).await?)))
}

/// POST /api/{kind}/bulk-delete
pub async fn bulk_delete<N: TreeNode>(
    State(h): State<Hierarchy<N>>,
    Json(req): Json<IdsRequest>,
) -> AppResult<Json<ApiResponse<BulkDeleteResponse>>> {
    let deleted = h.service.bulk_delete(&req.ids).await?;
    Ok(Json(ApiResponse::success(BulkDeleteResponse { deleted })))
}

/// POST /api/{kind}/:id/refresh-count
pub async fn refresh_count<N: TreeNode + Serialize>(
    State(h): State<Hierarchy<N>>,
    Path(id): Path<Uuid>,
) -> AppResult<ViewOne<N>> {
    let node = h.service.refresh_usage_count(id).await?;
    Ok(Json(ApiResponse::success(h.mapper.view(node).await?)))
}
