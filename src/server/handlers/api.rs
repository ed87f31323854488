use super::{non_empty, parse_warrant_type, DateEtfQuery, SearchQuery, VolumeQuery, WarrantQuery};
use crate::core::sorting::{SearchScope, SummarySort, WarrantSort};
use crate::core::volume::{self, VolumeSort};
use crate::server::state::AppState;
use crate::utils::error::{MonitorError, Result};
use crate::utils::validation::{optional_date, validate_date};
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

fn list<T: Serialize>(date: Option<&str>, data: Vec<T>) -> Json<Value> {
    Json(json!({
        "status": "success",
        "date": date,
        "count": data.len(),
        "data": data,
    }))
}

pub async fn holdings(
    State(state): State<AppState>,
    Path(date): Path<String>,
    Query(query): Query<DateEtfQuery>,
) -> Result<Json<Value>> {
    let date = validate_date(&date)?;
    let rows = state
        .store
        .holdings_with_changes(Some(&date), non_empty(&query.etf_code))
        .await?;
    Ok(list(Some(&date), rows))
}

pub async fn new_holdings(
    State(state): State<AppState>,
    Path(date): Path<String>,
    Query(query): Query<DateEtfQuery>,
) -> Result<Json<Value>> {
    let date = validate_date(&date)?;
    let rows = state.store.new_holdings(&date, non_empty(&query.etf_code)).await?;
    Ok(list(Some(&date), rows))
}

pub async fn cross_holdings(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Json<Value>> {
    let date = validate_date(&date)?;
    let rows = state.store.cross_holdings(&date).await?;
    Ok(list(Some(&date), rows))
}

pub async fn decreased_holdings(
    State(state): State<AppState>,
    Path(date): Path<String>,
    Query(query): Query<DateEtfQuery>,
) -> Result<Json<Value>> {
    let date = validate_date(&date)?;
    let rows = state
        .store
        .decreased_holdings(Some(&date), non_empty(&query.etf_code))
        .await?;
    Ok(list(Some(&date), rows))
}

pub async fn warrants(
    State(state): State<AppState>,
    Query(query): Query<WarrantQuery>,
) -> Result<Json<Value>> {
    let date = optional_date(non_empty(&query.date))?;
    let warrant_type = parse_warrant_type(non_empty(&query.warrant_type))?;
    let sort = WarrantSort::parse(non_empty(&query.sort_by));

    let rows = state
        .store
        .warrant_ranking(date.as_deref(), warrant_type, sort, query.limit)
        .await?;

    Ok(Json(json!({
        "status": "success",
        "date": date,
        "warrant_type": warrant_type,
        "sort_by": sort.key(),
        "count": rows.len(),
        "data": rows,
    })))
}

pub async fn warrant_summary(
    State(state): State<AppState>,
    Query(query): Query<WarrantQuery>,
) -> Result<Json<Value>> {
    let date = optional_date(non_empty(&query.date))?;
    let sort = SummarySort::parse(non_empty(&query.sort_by));
    let rows = state.store.underlying_summary(date.as_deref(), sort).await?;

    Ok(Json(json!({
        "status": "success",
        "date": date,
        "sort_by": sort.key(),
        "count": rows.len(),
        "data": rows,
    })))
}

pub async fn search_warrants(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Value>> {
    let Some(keyword) = non_empty(&query.keyword) else {
        return Err(MonitorError::ValidationError {
            message: "keyword is required".to_string(),
        });
    };
    let date = optional_date(non_empty(&query.date))?;
    let scope = SearchScope::parse(non_empty(&query.search_type));

    let rows = state
        .store
        .search_warrants(keyword, date.as_deref(), scope)
        .await?;

    Ok(Json(json!({
        "status": "success",
        "keyword": keyword,
        "date": date,
        "count": rows.len(),
        "data": rows,
    })))
}

pub async fn warrants_by_underlying(
    State(state): State<AppState>,
    Path(underlying): Path<String>,
    Query(query): Query<WarrantQuery>,
) -> Result<Json<Value>> {
    let date = optional_date(non_empty(&query.date))?;
    let warrant_type = parse_warrant_type(non_empty(&query.warrant_type))?;
    let rows = state
        .store
        .warrants_by_underlying(&underlying, date.as_deref(), warrant_type)
        .await?;

    Ok(Json(json!({
        "status": "success",
        "underlying_name": underlying,
        "date": date,
        "count": rows.len(),
        "data": rows,
    })))
}

pub async fn warrant_volume(
    State(state): State<AppState>,
    Query(query): Query<VolumeQuery>,
) -> Result<Json<Value>> {
    let date = optional_date(non_empty(&query.date))?;
    let sort = VolumeSort::parse(non_empty(&query.sort_by));
    let ascending = non_empty(&query.order) == Some("asc");

    let mut analysis = state.store.volume_analysis(date.as_deref()).await?;
    volume::sort(&mut analysis.call_data, sort, ascending);
    volume::sort(&mut analysis.put_data, sort, ascending);

    Ok(Json(json!({
        "status": "success",
        "sort_by": sort.key(),
        "data": analysis,
    })))
}
