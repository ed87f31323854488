use super::Store;
use crate::core::sorting::{SearchScope, SummarySort, WarrantSort};
use crate::core::volume;
use crate::domain::model::{
    AnalysisInfo, UnderlyingSummary, VolumeAnalysis, Warrant, WarrantStatistics, WarrantType,
};
use crate::utils::error::{MonitorError, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite};
use std::collections::HashMap;

const WARRANT_COLUMNS: &str = "ranking, warrant_code, warrant_name, underlying_name, warrant_type, \
     close_price, change_amount, change_percent, volume, implied_volatility, page_number, update_date";

/// 前幾個交易日的成交量平均
const VOLUME_LOOKBACK_DAYS: i64 = 5;

fn parse_warrant_type(value: &str) -> Result<WarrantType> {
    value
        .parse()
        .map_err(|message| MonitorError::ParseError { message })
}

fn row_to_warrant(row: &SqliteRow) -> Result<Warrant> {
    let warrant_type: String = row.try_get("warrant_type")?;
    Ok(Warrant {
        ranking: row.try_get("ranking")?,
        warrant_code: row.try_get("warrant_code")?,
        warrant_name: row.try_get("warrant_name")?,
        underlying_name: row.try_get("underlying_name")?,
        warrant_type: parse_warrant_type(&warrant_type)?,
        close_price: row.try_get("close_price")?,
        change_amount: row.try_get("change_amount")?,
        change_percent: row.try_get("change_percent")?,
        volume: row.try_get("volume")?,
        implied_volatility: row.try_get("implied_volatility")?,
        page_number: row.try_get("page_number")?,
        update_date: row.try_get("update_date")?,
    })
}

fn row_to_summary(row: &SqliteRow) -> Result<UnderlyingSummary> {
    let warrant_type: String = row.try_get("warrant_type")?;
    Ok(UnderlyingSummary {
        underlying_name: row.try_get("underlying_name")?,
        warrant_type: parse_warrant_type(&warrant_type)?,
        warrant_count: row.try_get("warrant_count")?,
        total_volume: row.try_get("total_volume")?,
        avg_implied_volatility: row.try_get("avg_implied_volatility")?,
        total_change_amount: row.try_get("total_change_amount")?,
        update_date: row.try_get("update_date")?,
    })
}

fn row_to_volume(row: &SqliteRow) -> Result<(String, i64)> {
    Ok((row.try_get("underlying_name")?, row.try_get("total_volume")?))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// 日期條件；未指定時使用該表最新日期
fn push_date_filter<'a>(qb: &mut QueryBuilder<'a, Sqlite>, table: &str, date: Option<&'a str>) {
    match date {
        Some(date) => {
            qb.push("update_date = ").push_bind(date);
        }
        None => {
            qb.push(format!("update_date = (SELECT MAX(update_date) FROM {})", table));
        }
    }
}

impl Store {
    pub async fn warrant_dates(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT DISTINCT update_date FROM warrant_data ORDER BY update_date DESC")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| row.try_get("update_date").map_err(Into::into))
            .collect()
    }

    pub async fn latest_warrant_date(&self) -> Result<Option<String>> {
        let row = sqlx::query("SELECT MAX(update_date) AS latest FROM warrant_data")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("latest")?)
    }

    pub async fn warrant_ranking(
        &self,
        date: Option<&str>,
        warrant_type: Option<WarrantType>,
        sort: WarrantSort,
        limit: Option<u32>,
    ) -> Result<Vec<Warrant>> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM warrant_data WHERE ", WARRANT_COLUMNS));
        push_date_filter(&mut qb, "warrant_data", date);
        if let Some(warrant_type) = warrant_type {
            qb.push(" AND warrant_type = ").push_bind(warrant_type.as_str());
        }
        qb.push(" ORDER BY ").push(sort.order_by());
        if let Some(limit) = limit {
            qb.push(" LIMIT ").push_bind(i64::from(limit));
        }

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(row_to_warrant).collect()
    }

    pub async fn underlying_summary(
        &self,
        date: Option<&str>,
        sort: SummarySort,
    ) -> Result<Vec<UnderlyingSummary>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT underlying_name, warrant_type, warrant_count, total_volume, \
             avg_implied_volatility, total_change_amount, update_date \
             FROM warrant_underlying_summary WHERE ",
        );
        push_date_filter(&mut qb, "warrant_underlying_summary", date);
        qb.push(" ORDER BY ").push(sort.order_by());

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(row_to_summary).collect()
    }

    pub async fn warrant_statistics(&self, date: Option<&str>) -> Result<WarrantStatistics> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT COUNT(*) AS total_warrants, \
             COUNT(CASE WHEN warrant_type = '認購' THEN 1 END) AS call_warrants, \
             COUNT(CASE WHEN warrant_type = '認售' THEN 1 END) AS put_warrants, \
             SUM(volume) AS total_volume, \
             AVG(implied_volatility) AS avg_implied_volatility, \
             AVG(change_percent) AS avg_change_percent, \
             COUNT(DISTINCT NULLIF(underlying_name, '')) AS unique_underlyings \
             FROM warrant_data WHERE ",
        );
        push_date_filter(&mut qb, "warrant_data", date);

        let row = qb.build().fetch_one(&self.pool).await?;
        Ok(WarrantStatistics {
            total_warrants: row.try_get("total_warrants")?,
            call_warrants: row.try_get("call_warrants")?,
            put_warrants: row.try_get("put_warrants")?,
            total_volume: row.try_get::<Option<i64>, _>("total_volume")?.unwrap_or(0),
            avg_implied_volatility: round2(
                row.try_get::<Option<f64>, _>("avg_implied_volatility")?.unwrap_or(0.0),
            ),
            avg_change_percent: round2(
                row.try_get::<Option<f64>, _>("avg_change_percent")?.unwrap_or(0.0),
            ),
            unique_underlyings: row.try_get("unique_underlyings")?,
        })
    }

    pub async fn warrants_by_underlying(
        &self,
        underlying_name: &str,
        date: Option<&str>,
        warrant_type: Option<WarrantType>,
    ) -> Result<Vec<Warrant>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {} FROM warrant_data WHERE underlying_name = ",
            WARRANT_COLUMNS
        ));
        qb.push_bind(underlying_name).push(" AND ");
        push_date_filter(&mut qb, "warrant_data", date);
        if let Some(warrant_type) = warrant_type {
            qb.push(" AND warrant_type = ").push_bind(warrant_type.as_str());
        }
        qb.push(" ORDER BY ").push(WarrantSort::Ranking.order_by());

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(row_to_warrant).collect()
    }

    pub async fn search_warrants(
        &self,
        keyword: &str,
        date: Option<&str>,
        scope: SearchScope,
    ) -> Result<Vec<Warrant>> {
        let pattern = format!("%{}%", keyword.trim());

        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM warrant_data WHERE ", WARRANT_COLUMNS));
        push_date_filter(&mut qb, "warrant_data", date);

        qb.push(" AND (");
        let mut separated = qb.separated(" OR ");
        if scope.includes_warrant() {
            separated.push("warrant_code LIKE ").push_bind_unseparated(pattern.clone());
            separated.push("warrant_name LIKE ").push_bind_unseparated(pattern.clone());
        }
        if scope.includes_underlying() {
            separated.push("underlying_name LIKE ").push_bind_unseparated(pattern);
        }
        qb.push(") ORDER BY ").push(WarrantSort::Ranking.order_by());

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(row_to_warrant).collect()
    }

    /// 以單一交易取代某日的權證資料並重算標的統計
    pub async fn replace_warrants(&self, date: &str, warrants: &[Warrant]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM warrant_data WHERE update_date = ?")
            .bind(date)
            .execute(&mut *tx)
            .await?;

        for w in warrants {
            sqlx::query(&format!(
                "INSERT INTO warrant_data ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                WARRANT_COLUMNS
            ))
            .bind(w.ranking)
            .bind(&w.warrant_code)
            .bind(&w.warrant_name)
            .bind(&w.underlying_name)
            .bind(w.warrant_type.as_str())
            .bind(w.close_price)
            .bind(w.change_amount)
            .bind(w.change_percent)
            .bind(w.volume)
            .bind(w.implied_volatility)
            .bind(w.page_number)
            .bind(date)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("DELETE FROM warrant_underlying_summary WHERE update_date = ?")
            .bind(date)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO warrant_underlying_summary \
             (underlying_name, warrant_type, warrant_count, total_volume, \
              avg_implied_volatility, total_change_amount, update_date) \
             SELECT underlying_name, warrant_type, COUNT(*), SUM(volume), \
                    AVG(implied_volatility), SUM(ABS(change_amount)), ?1 \
             FROM warrant_data \
             WHERE update_date = ?1 AND underlying_name IS NOT NULL AND underlying_name != '' \
             GROUP BY underlying_name, warrant_type",
        )
        .bind(date)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::debug!("💾 Stored {} warrants for {}", warrants.len(), date);
        Ok(warrants.len())
    }

    /// 目標日之前最近的幾個交易日 (新到舊)
    pub async fn previous_warrant_dates(&self, date: &str, count: i64) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT DISTINCT update_date FROM warrant_data WHERE update_date < ? \
             ORDER BY update_date DESC LIMIT ?",
        )
        .bind(date)
        .bind(count)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row.try_get("update_date").map_err(Into::into))
            .collect()
    }

    pub async fn underlying_volumes(
        &self,
        date: &str,
        warrant_type: WarrantType,
    ) -> Result<Vec<(String, i64)>> {
        let rows = sqlx::query(
            "SELECT underlying_name, SUM(volume) AS total_volume FROM warrant_data \
             WHERE update_date = ? AND warrant_type = ? \
             AND underlying_name IS NOT NULL AND underlying_name != '' \
             GROUP BY underlying_name ORDER BY underlying_name",
        )
        .bind(date)
        .bind(warrant_type.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_volume).collect()
    }

    /// 各標的在指定日期集合內的成交量總和
    pub async fn underlying_volume_totals(
        &self,
        dates: &[String],
        warrant_type: WarrantType,
    ) -> Result<HashMap<String, i64>> {
        if dates.is_empty() {
            return Ok(HashMap::new());
        }

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT underlying_name, SUM(volume) AS total_volume FROM warrant_data WHERE warrant_type = ",
        );
        qb.push_bind(warrant_type.as_str());
        qb.push(" AND underlying_name IS NOT NULL AND underlying_name != '' AND update_date IN (");
        let mut separated = qb.separated(", ");
        for date in dates {
            separated.push_bind(date.as_str());
        }
        qb.push(") GROUP BY underlying_name");

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(row_to_volume).collect()
    }

    /// 認購與認售分別比較當日與前五個交易日平均的成交量
    pub async fn volume_analysis(&self, date: Option<&str>) -> Result<VolumeAnalysis> {
        let target = match date {
            Some(date) => date.to_string(),
            None => match self.latest_warrant_date().await? {
                Some(date) => date,
                None => {
                    tracing::warn!("⚠️ No warrant data for volume analysis");
                    return Ok(VolumeAnalysis::default());
                }
            },
        };

        let previous_dates = self.previous_warrant_dates(&target, VOLUME_LOOKBACK_DAYS).await?;
        if (previous_dates.len() as i64) < VOLUME_LOOKBACK_DAYS {
            tracing::warn!(
                "⚠️ Only {} previous trading days before {}",
                previous_dates.len(),
                target
            );
        }

        let mut by_type = Vec::with_capacity(2);
        for warrant_type in WarrantType::ALL {
            let current = self.underlying_volumes(&target, warrant_type).await?;
            let history = self.underlying_volume_totals(&previous_dates, warrant_type).await?;
            by_type.push(volume::compare(
                &current,
                &history,
                previous_dates.len(),
                warrant_type,
                &target,
            ));
        }
        let put_data = by_type.pop().unwrap_or_default();
        let call_data = by_type.pop().unwrap_or_default();

        let analysis_info = AnalysisInfo {
            analysis_date: Some(target),
            previous_dates_count: previous_dates.len(),
            previous_dates,
            call_underlyings_count: call_data.len(),
            put_underlyings_count: put_data.len(),
            call_high_change_count: volume::high_change_count(&call_data),
            put_high_change_count: volume::high_change_count(&put_data),
        };

        Ok(VolumeAnalysis {
            call_data,
            put_data,
            analysis_info,
        })
    }
}
