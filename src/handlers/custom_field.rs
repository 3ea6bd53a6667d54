//! Custom field handlers

use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::custom_field::{CustomFieldService, FieldStats};
use crate::entity::custom_field::{CustomFieldInput, FieldType, Model};
use crate::error::AppResult;
use crate::handlers::tree::{IdsRequest, SearchQuery};
use crate::routes::ApiResponse;

type FieldList = Json<ApiResponse<Vec<Model>>>;
type FieldOne = Json<ApiResponse<Model>>;

#[derive(Debug, Deserialize)]
pub struct NameQuery {
    pub name: String,
    pub exclude: Option<Uuid>,
}

/// GET /api/custom-fields
pub async fn list(State(service): State<CustomFieldService>) -> AppResult<FieldList> {
    Ok(Json(ApiResponse::success(service.list().await?)))
}

/// GET /api/custom-fields/active
pub async fn active(State(service): State<CustomFieldService>) -> AppResult<FieldList> {
    Ok(Json(ApiResponse::success(service.list_active().await?)))
}

/// GET /api/custom-fields/categories
pub async fn categories(
    State(service): State<CustomFieldService>,
) -> AppResult<Json<ApiResponse<Vec<String>>>> {
    Ok(Json(ApiResponse::success(service.categories(false).await?)))
}

/// GET /api/custom-fields/categories/active
pub async fn active_categories(
    State(service): State<CustomFieldService>,
) -> AppResult<Json<ApiResponse<Vec<String>>>> {
    Ok(Json(ApiResponse::success(service.categories(true).await?)))
}

/// GET /api/custom-fields/category/:category
pub async fn by_category(
    State(service): State<CustomFieldService>,
    Path(category): Path<String>,
) -> AppResult<FieldList> {
    Ok(Json(ApiResponse::success(service.list_by_category(&category, false).await?)))
}

/// GET /api/custom-fields/category/:category/active
pub async fn active_by_category(
    State(service): State<CustomFieldService>,
    Path(category): Path<String>,
) -> AppResult<FieldList> {
    Ok(Json(ApiResponse::success(service.list_by_category(&category, true).await?)))
}

/// GET /api/custom-fields/type/:field_type
pub async fn by_type(
    State(service): State<CustomFieldService>,
    Path(field_type): Path<FieldType>,
) -> AppResult<FieldList> {
    Ok(Json(ApiResponse::success(service.list_by_type(field_type, false).await?)))
}

/// GET /api/custom-fields/type/:field_type/active
pub async fn active_by_type(
    State(service): State<CustomFieldService>,
    Path(field_type): Path<FieldType>,
) -> AppResult<FieldList> {
    Ok(Json(ApiResponse::success(service.list_by_type(field_type, true).await?)))
}

/// GET /api/custom-fields/required/:required
pub async fn by_required(
    State(service): State<CustomFieldService>,
    Path(required): Path<bool>,
) -> AppResult<FieldList> {
    Ok(Json(ApiResponse::success(service.list_by_required(required, false).await?)))
}

/// GET /api/custom-fields/required/:required/active
pub async fn active_by_required(
    State(service): State<CustomFieldService>,
    Path(required): Path<bool>,
) -> AppResult<FieldList> {
    Ok(Json(ApiResponse::success(service.list_by_required(required, true).await?)))
}

/// GET /api/custom-fields/stats
pub async fn stats(State(service): State<CustomFieldService>) -> AppResult<Json<ApiResponse<FieldStats>>> {
    Ok(Json(ApiResponse::success(service.statistics(false).await?)))
}

/// GET /api/custom-fields/stats/active
pub async fn active_stats(
    State(service): State<CustomFieldService>,
) -> AppResult<Json<ApiResponse<FieldStats>>> {
    Ok(Json(ApiResponse::success(service.statistics(true).await?)))
}

/// GET /api/custom-fields/exists?name=&exclude=
pub async fn exists(
    State(service): State<CustomFieldService>,
    Query(query): Query<NameQuery>,
) -> AppResult<Json<ApiResponse<bool>>> {
    let taken = service.name_exists(&query.name, query.exclude).await?;
    Ok(Json(ApiResponse::success(taken)))
}

/// GET /api/custom-fields/search?q=
pub async fn search(
    State(service): State<CustomFieldService>,
    Query(query): Query<SearchQuery>,
) -> AppResult<FieldList> {
    Ok(Json(ApiResponse::success(service.search(&query.q).await?)))
}

/// GET /api/custom-fields/:id
pub async fn get_one(
    State(service): State<CustomFieldService>,
    Path(id): Path<Uuid>,
) -> AppResult<FieldOne> {
    Ok(Json(ApiResponse::success(service.get(id).await?)))
}

/// POST /api/custom-fields
pub async fn create(
    State(service): State<CustomFieldService>,
    Json(input): Json<CustomFieldInput>,
) -> AppResult<FieldOne> {
    Ok(Json(ApiResponse::success(service.create(input).await?)))
}

/// PUT /api/custom-fields/:id
pub async fn update(
    State(service): State<CustomFieldService>,
    Path(id): Path<Uuid>,
    Json(input): Json<CustomFieldInput>,
) -> AppResult<FieldOne> {
    Ok(Json(ApiResponse::success(service.update(id, input).await?)))
}

/// DELETE /api/custom-fields/:id
pub async fn delete(
    State(service): State<CustomFieldService>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<()>>> {
    service.delete(id).await?;
    Ok(Json(ApiResponse::success_msg("deleted")))
}

/// PUT /api/custom-fields/:id/toggle
pub async fn toggle(
    State(service): State<CustomFieldService>,
    Path(id): Path<Uuid>,
) -> AppResult<FieldOne> {
    Ok(Json(ApiResponse::success(service.toggle_active(id).await?)))
}

/// PUT /api/custom-fields/reorder
pub async fn reorder(
    State(service): State<CustomFieldService>,
    Json(req): Json<IdsRequest>,
) -> AppResult<FieldList> {
    Ok(Json(ApiResponse::success(service.reorder(&req.ids).await?)))
}
