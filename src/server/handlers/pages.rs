use super::{
    non_empty, parse_warrant_type, DateEtfQuery, HoldingsQuery, PageResult, VolumeQuery,
    WarrantQuery,
};
use crate::core::changes::stats as change_stats;
use crate::core::sorting::{HoldingSort, SummarySort, WarrantSort};
use crate::core::volume::{self, VolumeSort};
use crate::domain::model::EtfInfo;
use crate::server::state::AppState;
use crate::server::views::{self, ChangeListView, HoldingsView, WarrantRankingView};
use crate::utils::error::{MonitorError, Result};
use crate::utils::validation::optional_date;
use axum::extract::{Path, Query, State};
use axum::response::Html;

/// 日期參數驗證後，未提供時取最新的持股日期
async fn holdings_date(state: &AppState, date: &Option<String>) -> Result<Option<String>> {
    let date = optional_date(non_empty(date))?;
    state.store.resolve_holdings_date(date.as_deref()).await
}

pub async fn index(State(state): State<AppState>) -> PageResult {
    let dates = state.store.available_dates().await?;
    let etfs = state.scraper.sources().etf_list();
    Ok(Html(views::index_page(&dates, &etfs)))
}

pub async fn holdings(State(state): State<AppState>, Query(query): Query<HoldingsQuery>) -> PageResult {
    let date = holdings_date(&state, &query.date).await?;
    let etf_code = non_empty(&query.etf_code);
    let sort = HoldingSort::parse(non_empty(&query.sort_by));
    tracing::debug!("Holdings page: date={:?}, etf={:?}, sort={}", date, etf_code, sort.key());

    let mut rows = match &date {
        Some(date) => state.store.holdings_with_changes(Some(date), etf_code).await?,
        None => Vec::new(),
    };
    sort.apply(&mut rows);
    let stats = change_stats(&rows);

    let dates = state.store.available_dates().await?;
    let etfs = state.scraper.sources().etf_list();
    Ok(Html(views::holdings_page(&HoldingsView {
        date: date.as_deref(),
        dates: &dates,
        etf_code,
        etfs: &etfs,
        sort,
        holdings: &rows,
        stats: &stats,
    })))
}

pub async fn etf_holdings(
    State(state): State<AppState>,
    Path(etf_code): Path<String>,
    Query(query): Query<DateEtfQuery>,
) -> PageResult {
    let sources = state.scraper.sources();
    let Some(name) = sources.etf_name(&etf_code) else {
        return Err(MonitorError::NotFoundError {
            resource: format!("ETF {}", etf_code),
        }
        .into());
    };
    let etf = EtfInfo {
        code: etf_code.clone(),
        name: name.to_string(),
    };

    let date = holdings_date(&state, &query.date).await?;
    let holdings = state.store.holdings_by_etf(&etf_code, date.as_deref()).await?;
    let dates = state.store.available_dates().await?;
    Ok(Html(views::etf_holdings_page(&etf, date.as_deref(), &dates, &holdings)))
}

pub async fn changes(State(state): State<AppState>, Query(query): Query<DateEtfQuery>) -> PageResult {
    let date = optional_date(non_empty(&query.date))?;
    let etf_code = non_empty(&query.etf_code);
    let changes = state.store.holdings_changes(etf_code, date.as_deref()).await?;

    let dates = state.store.available_dates().await?;
    let etfs = state.scraper.sources().etf_list();
    let view = ChangeListView {
        date: date.as_deref(),
        dates: &dates,
        etf_code,
        etfs: &etfs,
    };
    Ok(Html(views::changes_page(&view, &changes)))
}

pub async fn new_holdings(State(state): State<AppState>, Query(query): Query<DateEtfQuery>) -> PageResult {
    let date = holdings_date(&state, &query.date).await?;
    let etf_code = non_empty(&query.etf_code);
    let rows = match &date {
        Some(date) => state.store.new_holdings(date, etf_code).await?,
        None => Vec::new(),
    };

    let dates = state.store.available_dates().await?;
    let etfs = state.scraper.sources().etf_list();
    let view = ChangeListView {
        date: date.as_deref(),
        dates: &dates,
        etf_code,
        etfs: &etfs,
    };
    Ok(Html(views::new_holdings_page(&view, &rows)))
}

pub async fn decreased_holdings(
    State(state): State<AppState>,
    Query(query): Query<DateEtfQuery>,
) -> PageResult {
    let date = holdings_date(&state, &query.date).await?;
    let etf_code = non_empty(&query.etf_code);
    let rows = match &date {
        Some(date) => state.store.decreased_holdings(Some(date), etf_code).await?,
        None => Vec::new(),
    };

    let dates = state.store.available_dates().await?;
    let etfs = state.scraper.sources().etf_list();
    let view = ChangeListView {
        date: date.as_deref(),
        dates: &dates,
        etf_code,
        etfs: &etfs,
    };
    Ok(Html(views::decreased_holdings_page(&view, &rows)))
}

pub async fn cross_holdings(State(state): State<AppState>, Query(query): Query<DateEtfQuery>) -> PageResult {
    let date = holdings_date(&state, &query.date).await?;
    let rows = match &date {
        Some(date) => state.store.cross_holdings(date).await?,
        None => Vec::new(),
    };
    let dates = state.store.available_dates().await?;
    Ok(Html(views::cross_holdings_page(date.as_deref(), &dates, &rows)))
}

pub async fn warrant_ranking(State(state): State<AppState>, Query(query): Query<WarrantQuery>) -> PageResult {
    let date = optional_date(non_empty(&query.date))?;
    let warrant_type = parse_warrant_type(non_empty(&query.warrant_type))?;
    let sort = WarrantSort::parse(non_empty(&query.sort_by));
    let summary_sort = SummarySort::parse(non_empty(&query.summary_sort));

    let store = &state.store;
    let stats = store.warrant_statistics(date.as_deref()).await?;
    let summary = store.underlying_summary(date.as_deref(), summary_sort).await?;
    let warrants = store
        .warrant_ranking(date.as_deref(), warrant_type, sort, query.limit)
        .await?;
    let dates = store.warrant_dates().await?;

    Ok(Html(views::warrant_ranking_page(&WarrantRankingView {
        date: date.as_deref(),
        dates: &dates,
        warrant_type,
        sort,
        summary_sort,
        stats: &stats,
        summary: &summary,
        warrants: &warrants,
    })))
}

pub async fn warrant_volume(State(state): State<AppState>, Query(query): Query<VolumeQuery>) -> PageResult {
    let date = optional_date(non_empty(&query.date))?;
    let sort = VolumeSort::parse(non_empty(&query.sort_by));
    let ascending = non_empty(&query.order) == Some("asc");

    let mut analysis = state.store.volume_analysis(date.as_deref()).await?;
    volume::sort(&mut analysis.call_data, sort, ascending);
    volume::sort(&mut analysis.put_data, sort, ascending);

    let dates = state.store.warrant_dates().await?;
    Ok(Html(views::warrant_volume_page(
        analysis.analysis_info.analysis_date.as_deref(),
        &dates,
        sort,
        ascending,
        &analysis,
    )))
}
