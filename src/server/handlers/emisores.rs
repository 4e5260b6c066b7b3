//! Issuer listing, lookup and search handlers.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::super::AppState;
use super::error::ApiError;
use super::iso_timestamp;
use crate::models::StoredEmisor;
use crate::repository::SEARCH_LIMIT;

const DEFAULT_PAGE: i64 = 1;
const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 100;
const MIN_QUERY_LEN: usize = 3;

const PAGINATION_INVALID: &str =
    "Parámetros de paginación inválidos. page debe ser >= 1 y limit debe estar entre 1 y 100.";
const RNC_INVALID: &str = "RNC inválido. Debe tener entre 9 y 11 caracteres.";
const RNC_NOT_FOUND: &str = "No se encontró un emisor con este RNC.";
const QUERY_TOO_SHORT: &str = "El término de búsqueda debe tener al menos 3 caracteres.";

/// Query parameters for the paginated listing. Kept as strings so that
/// malformed numbers become a 400 with our own message.
#[derive(Debug, Deserialize)]
pub struct PageParams {
    pub page: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total_items: i64,
    pub total_pages: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResponse {
    pub data: Vec<StoredEmisor>,
    pub pagination: Pagination,
    pub last_update: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordResponse {
    pub data: StoredEmisor,
    pub last_update: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub data: Vec<StoredEmisor>,
    pub count: usize,
    pub query: String,
    pub last_update: Option<String>,
}

fn parse_param(raw: Option<&str>, default: i64) -> Option<i64> {
    match raw.map(str::trim) {
        None | Some("") => Some(default),
        Some(value) => value.parse().ok(),
    }
}

/// Validated `(page, limit, offset)`.
fn pagination(params: &PageParams) -> Result<(i64, i64, i64), ApiError> {
    let invalid = || ApiError::Validation(PAGINATION_INVALID.to_string());

    let page = parse_param(params.page.as_deref(), DEFAULT_PAGE).ok_or_else(invalid)?;
    let limit = parse_param(params.limit.as_deref(), DEFAULT_LIMIT).ok_or_else(invalid)?;
    if page < 1 || !(1..=MAX_LIMIT).contains(&limit) {
        return Err(invalid());
    }
    let offset = (page - 1).checked_mul(limit).ok_or_else(invalid)?;
    Ok((page, limit, offset))
}

fn total_pages(total: i64, limit: i64) -> i64 {
    (total + limit - 1) / limit
}

/// `GET /api/v1/emisores?page=&limit=`
pub async fn list_emisores(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<Json<PageResponse>, ApiError> {
    let (page, limit, offset) = pagination(&params)?;

    let data = state
        .repo
        .get_page(limit, offset)
        .await
        .map_err(|e| ApiError::internal("Error al consultar los datos de emisores", e))?;
    let total_items = state
        .repo
        .count()
        .await
        .map_err(|e| ApiError::internal("Error al consultar los datos de emisores", e))?;

    Ok(Json(PageResponse {
        data,
        pagination: Pagination {
            page,
            limit,
            total_items,
            total_pages: total_pages(total_items, limit),
        },
        last_update: state.refresh.last_success().map(iso_timestamp),
    }))
}

/// `GET /api/v1/emisores/:rnc`
pub async fn get_emisor(
    State(state): State<AppState>,
    Path(rnc): Path<String>,
) -> Result<Json<RecordResponse>, ApiError> {
    if !(9..=11).contains(&rnc.chars().count()) {
        return Err(ApiError::Validation(RNC_INVALID.to_string()));
    }

    let data = state
        .repo
        .get_by_rnc(&rnc)
        .await
        .map_err(|e| ApiError::internal("Error al consultar los datos del emisor", e))?
        .ok_or_else(|| ApiError::NotFound(RNC_NOT_FOUND.to_string()))?;

    Ok(Json(RecordResponse {
        data,
        last_update: state.refresh.last_success().map(iso_timestamp),
    }))
}

/// `GET /api/v1/emisores/buscar?q=`
pub async fn search_emisores(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let query = params.q.unwrap_or_default();
    if query.chars().count() < MIN_QUERY_LEN {
        return Err(ApiError::Validation(QUERY_TOO_SHORT.to_string()));
    }

    let data = state
        .repo
        .search(&query, SEARCH_LIMIT)
        .await
        .map_err(|e| ApiError::internal("Error al buscar emisores", e))?;

    Ok(Json(SearchResponse {
        count: data.len(),
        data,
        query,
        last_update: state.refresh.last_success().map(iso_timestamp),
    }))
}
