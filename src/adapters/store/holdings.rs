use super::Store;
use crate::core::changes::attach_change;
use crate::domain::model::{
    ChangeType, CrossHolding, CrossHoldingDetail, DecreasedHolding, Holding, HoldingChange,
    HoldingWithChange, NamedChange, NewHolding, NewHoldingsDiagnosis,
};
use crate::utils::error::{MonitorError, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite};

const HOLDING_COLUMNS: &str =
    "etf_code, stock_code, stock_name, weight, shares, unit, update_date";
const CHANGE_COLUMNS: &str = "etf_code, stock_code, stock_name, change_type, old_shares, new_shares, old_weight, new_weight, change_date";

fn row_to_holding(row: &SqliteRow) -> Result<Holding> {
    Ok(Holding {
        etf_code: row.try_get("etf_code")?,
        stock_code: row.try_get("stock_code")?,
        stock_name: row.try_get("stock_name")?,
        weight: row.try_get("weight")?,
        shares: row.try_get("shares")?,
        unit: row.try_get("unit")?,
        update_date: row.try_get("update_date")?,
    })
}

fn parse_change_type(value: &str) -> Result<ChangeType> {
    value
        .parse()
        .map_err(|message| MonitorError::ParseError { message })
}

fn row_to_change(row: &SqliteRow) -> Result<HoldingChange> {
    let change_type: String = row.try_get("change_type")?;
    Ok(HoldingChange {
        etf_code: row.try_get("etf_code")?,
        stock_code: row.try_get("stock_code")?,
        stock_name: row.try_get("stock_name")?,
        change_type: parse_change_type(&change_type)?,
        old_shares: row.try_get("old_shares")?,
        new_shares: row.try_get("new_shares")?,
        old_weight: row.try_get("old_weight")?,
        new_weight: row.try_get("new_weight")?,
        change_date: row.try_get("change_date")?,
    })
}

/// LEFT JOIN 後的列；沒有變化紀錄時 change_type 為 NULL
fn row_to_holding_with_change(row: &SqliteRow) -> Result<HoldingWithChange> {
    let holding = row_to_holding(row)?;
    let change = match row.try_get::<Option<String>, _>("change_type")? {
        Some(change_type) => Some(HoldingChange {
            etf_code: holding.etf_code.clone(),
            stock_code: holding.stock_code.clone(),
            stock_name: holding.stock_name.clone(),
            change_type: parse_change_type(&change_type)?,
            old_shares: row.try_get::<Option<i64>, _>("old_shares")?.unwrap_or(0),
            new_shares: row.try_get::<Option<i64>, _>("new_shares")?.unwrap_or(0),
            old_weight: row.try_get::<Option<f64>, _>("old_weight")?.unwrap_or(0.0),
            new_weight: row.try_get::<Option<f64>, _>("new_weight")?.unwrap_or(0.0),
            change_date: holding.update_date.clone(),
        }),
        None => None,
    };
    Ok(attach_change(holding, change))
}

impl Store {
    pub async fn available_dates(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT DISTINCT update_date FROM etf_holdings ORDER BY update_date DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row.try_get("update_date").map_err(Into::into))
            .collect()
    }

    pub async fn latest_date(&self) -> Result<Option<String>> {
        let row = sqlx::query("SELECT MAX(update_date) AS latest FROM etf_holdings")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("latest")?)
    }

    /// 未指定日期時使用最新的持股日期
    pub async fn resolve_holdings_date(&self, date: Option<&str>) -> Result<Option<String>> {
        match date {
            Some(date) => Ok(Some(date.to_string())),
            None => self.latest_date().await,
        }
    }

    pub async fn holdings_by_etf(&self, etf_code: &str, date: Option<&str>) -> Result<Vec<Holding>> {
        let Some(date) = self.resolve_holdings_date(date).await? else {
            return Ok(Vec::new());
        };

        let rows = sqlx::query(&format!(
            "SELECT {} FROM etf_holdings WHERE etf_code = ? AND update_date = ? ORDER BY weight DESC",
            HOLDING_COLUMNS
        ))
        .bind(etf_code)
        .bind(&date)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_holding).collect()
    }

    /// 指定 ETF 的最新持股；未指定時為全表最新日期的所有持股
    pub async fn latest_holdings(&self, etf_code: Option<&str>) -> Result<Vec<Holding>> {
        let rows = match etf_code {
            Some(code) => {
                sqlx::query(&format!(
                    "SELECT {} FROM etf_holdings WHERE etf_code = ? AND update_date = \
                     (SELECT MAX(update_date) FROM etf_holdings WHERE etf_code = ?) \
                     ORDER BY weight DESC",
                    HOLDING_COLUMNS
                ))
                .bind(code)
                .bind(code)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {} FROM etf_holdings WHERE update_date = \
                     (SELECT MAX(update_date) FROM etf_holdings) \
                     ORDER BY etf_code, weight DESC",
                    HOLDING_COLUMNS
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.iter().map(row_to_holding).collect()
    }

    pub async fn holdings_with_changes(
        &self,
        date: Option<&str>,
        etf_code: Option<&str>,
    ) -> Result<Vec<HoldingWithChange>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT h.etf_code, h.stock_code, h.stock_name, h.weight, h.shares, h.unit, h.update_date, \
             hc.change_type, hc.old_shares, hc.new_shares, hc.old_weight, hc.new_weight \
             FROM etf_holdings h \
             LEFT JOIN holdings_changes hc ON h.etf_code = hc.etf_code \
             AND h.stock_code = hc.stock_code AND h.update_date = hc.change_date WHERE ",
        );

        match date {
            Some(date) => {
                qb.push("h.update_date = ").push_bind(date);
            }
            None => {
                qb.push("h.update_date = (SELECT MAX(update_date) FROM etf_holdings)");
            }
        }
        if let Some(code) = etf_code {
            qb.push(" AND h.etf_code = ").push_bind(code);
        }
        qb.push(" ORDER BY h.etf_code, h.weight DESC");

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(row_to_holding_with_change).collect()
    }

    pub async fn holdings_changes(
        &self,
        etf_code: Option<&str>,
        date: Option<&str>,
    ) -> Result<Vec<NamedChange>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {} FROM holdings_changes WHERE 1 = 1",
            CHANGE_COLUMNS
        ));
        if let Some(date) = date {
            qb.push(" AND change_date = ").push_bind(date);
        }
        if let Some(code) = etf_code {
            qb.push(" AND etf_code = ").push_bind(code);
        }
        qb.push(" ORDER BY change_date DESC, etf_code, stock_code");

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| {
                let change = row_to_change(row)?;
                Ok(NamedChange {
                    etf_name: self.etf_name(&change.etf_code),
                    change,
                })
            })
            .collect()
    }

    /// 當日新增的持股；找不到對應持股列時權重為 0、股數取變化紀錄
    pub async fn new_holdings(&self, date: &str, etf_code: Option<&str>) -> Result<Vec<NewHolding>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT hc.etf_code, hc.stock_code, \
             COALESCE(h.stock_name, hc.stock_name) AS stock_name, \
             COALESCE(h.weight, 0.0) AS weight, \
             COALESCE(h.shares, hc.new_shares) AS shares, \
             COALESCE(h.unit, '股') AS unit \
             FROM holdings_changes hc \
             LEFT JOIN etf_holdings h ON hc.etf_code = h.etf_code \
             AND hc.stock_code = h.stock_code AND hc.change_date = h.update_date \
             WHERE hc.change_type = 'NEW' AND hc.change_date = ",
        );
        qb.push_bind(date);
        if let Some(code) = etf_code {
            qb.push(" AND hc.etf_code = ").push_bind(code);
        }
        qb.push(" ORDER BY hc.etf_code, weight DESC");

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| {
                let etf_code: String = row.try_get("etf_code")?;
                Ok(NewHolding {
                    etf_name: self.etf_name(&etf_code),
                    etf_code,
                    stock_code: row.try_get("stock_code")?,
                    stock_name: row.try_get("stock_name")?,
                    weight: row.try_get("weight")?,
                    shares: row.try_get("shares")?,
                    unit: row.try_get("unit")?,
                    change_type: ChangeType::New,
                })
            })
            .collect()
    }

    /// 減持與完全移除，依日期降序、ETF、減少股數降序
    pub async fn decreased_holdings(
        &self,
        date: Option<&str>,
        etf_code: Option<&str>,
    ) -> Result<Vec<DecreasedHolding>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {} FROM holdings_changes WHERE change_type IN ('DECREASED', 'REMOVED')",
            CHANGE_COLUMNS
        ));
        if let Some(date) = date {
            qb.push(" AND change_date = ").push_bind(date);
        }
        if let Some(code) = etf_code {
            qb.push(" AND etf_code = ").push_bind(code);
        }
        qb.push(" ORDER BY change_date DESC, etf_code, (old_shares - new_shares) DESC");

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| {
                let change = row_to_change(row)?;
                Ok(DecreasedHolding {
                    etf_name: self.etf_name(&change.etf_code),
                    change_label: change.change_type.label(),
                    change_amount: (change.old_shares - change.new_shares).max(0),
                    change,
                })
            })
            .collect()
    }

    /// 同一日被兩檔以上 ETF 持有的股票。
    /// 前一日股數取各 ETF 自己的前一次快照，沒有則為 0。
    pub async fn cross_holdings(&self, date: &str) -> Result<Vec<CrossHolding>> {
        let summary_rows = sqlx::query(
            "SELECT stock_code, MAX(stock_name) AS stock_name, \
             COUNT(DISTINCT etf_code) AS etf_count, SUM(shares) AS total_shares \
             FROM etf_holdings WHERE update_date = ? \
             GROUP BY stock_code HAVING COUNT(DISTINCT etf_code) > 1 \
             ORDER BY total_shares DESC, stock_code",
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        if summary_rows.is_empty() {
            return Ok(Vec::new());
        }

        let detail_rows = sqlx::query(
            "SELECT h.stock_code, h.etf_code, h.shares, h.weight, \
             COALESCE((SELECT p.shares FROM etf_holdings p \
                WHERE p.etf_code = h.etf_code AND p.stock_code = h.stock_code \
                AND p.update_date = (SELECT MAX(q.update_date) FROM etf_holdings q \
                    WHERE q.etf_code = h.etf_code AND q.update_date < h.update_date)), 0) \
                AS previous_shares \
             FROM etf_holdings h \
             WHERE h.update_date = ? AND h.stock_code IN ( \
                SELECT stock_code FROM etf_holdings WHERE update_date = ? \
                GROUP BY stock_code HAVING COUNT(DISTINCT etf_code) > 1) \
             ORDER BY h.stock_code, h.shares DESC",
        )
        .bind(date)
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        let mut cross = Vec::with_capacity(summary_rows.len());
        for row in &summary_rows {
            let stock_code: String = row.try_get("stock_code")?;
            let mut details = Vec::new();
            let (mut total_increase, mut total_decrease) = (0i64, 0i64);

            for detail in detail_rows
                .iter()
                .filter(|d| d.try_get::<String, _>("stock_code").ok().as_deref() == Some(stock_code.as_str()))
            {
                let etf_code: String = detail.try_get("etf_code")?;
                let shares: i64 = detail.try_get("shares")?;
                let previous_shares: i64 = detail.try_get("previous_shares")?;
                let change = shares - previous_shares;
                if change > 0 {
                    total_increase += change;
                } else {
                    total_decrease += -change;
                }

                details.push(CrossHoldingDetail {
                    etf_name: self.etf_name(&etf_code),
                    etf_code,
                    shares,
                    previous_shares,
                    change,
                    weight: detail.try_get("weight")?,
                });
            }

            cross.push(CrossHolding {
                stock_code,
                stock_name: row.try_get("stock_name")?,
                etf_count: row.try_get("etf_count")?,
                total_shares: row.try_get("total_shares")?,
                total_increase,
                total_decrease,
                etf_details: details,
            });
        }

        Ok(cross)
    }

    /// 交易日之前 (不含當日) 最近一次的持股快照
    pub async fn previous_snapshot(&self, etf_code: &str, date: &str) -> Result<Vec<Holding>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM etf_holdings WHERE etf_code = ? AND update_date = \
             (SELECT MAX(update_date) FROM etf_holdings WHERE etf_code = ? AND update_date < ?) \
             ORDER BY weight DESC",
            HOLDING_COLUMNS
        ))
        .bind(etf_code)
        .bind(etf_code)
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_holding).collect()
    }

    /// 以單一交易取代某 ETF 某日的持股與變化
    pub async fn replace_snapshot(
        &self,
        etf_code: &str,
        date: &str,
        holdings: &[Holding],
        changes: &[HoldingChange],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM etf_holdings WHERE etf_code = ? AND update_date = ?")
            .bind(etf_code)
            .bind(date)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM holdings_changes WHERE etf_code = ? AND change_date = ?")
            .bind(etf_code)
            .bind(date)
            .execute(&mut *tx)
            .await?;

        for h in holdings {
            sqlx::query(
                "INSERT INTO etf_holdings (etf_code, stock_code, stock_name, weight, shares, unit, update_date) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(etf_code)
            .bind(&h.stock_code)
            .bind(&h.stock_name)
            .bind(h.weight)
            .bind(h.shares)
            .bind(&h.unit)
            .bind(date)
            .execute(&mut *tx)
            .await?;
        }

        for c in changes {
            sqlx::query(
                "INSERT INTO holdings_changes (etf_code, stock_code, stock_name, change_type, \
                 old_shares, new_shares, old_weight, new_weight, change_date) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(etf_code)
            .bind(&c.stock_code)
            .bind(&c.stock_name)
            .bind(c.change_type.as_str())
            .bind(c.old_shares)
            .bind(c.new_shares)
            .bind(c.old_weight)
            .bind(c.new_weight)
            .bind(date)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        tracing::debug!(
            "💾 Stored {} holdings and {} changes for {} on {}",
            holdings.len(),
            changes.len(),
            etf_code,
            date
        );
        Ok(())
    }

    pub async fn diagnose_new_holdings(&self, date: Option<&str>) -> NewHoldingsDiagnosis {
        let mut diagnosis = NewHoldingsDiagnosis {
            status: "checking",
            used_date: None,
            total_changes: 0,
            new_changes: 0,
            total_holdings: 0,
            error: None,
        };

        let date = match self.resolve_holdings_date(date).await {
            Ok(Some(date)) => date,
            Ok(None) => {
                diagnosis.status = "error";
                diagnosis.error = Some("no_available_dates".to_string());
                return diagnosis;
            }
            Err(e) => {
                diagnosis.status = "error";
                diagnosis.error = Some(e.to_string());
                return diagnosis;
            }
        };
        diagnosis.used_date = Some(date.clone());

        let counts = sqlx::query(
            "SELECT \
             (SELECT COUNT(*) FROM holdings_changes WHERE change_date = ?1) AS total_changes, \
             (SELECT COUNT(*) FROM holdings_changes WHERE change_date = ?1 AND change_type = 'NEW') AS new_changes, \
             (SELECT COUNT(*) FROM etf_holdings WHERE update_date = ?1) AS total_holdings",
        )
        .bind(&date)
        .fetch_one(&self.pool)
        .await;

        match counts.and_then(|row| {
            Ok((
                row.try_get::<i64, _>("total_changes")?,
                row.try_get::<i64, _>("new_changes")?,
                row.try_get::<i64, _>("total_holdings")?,
            ))
        }) {
            Ok((total_changes, new_changes, total_holdings)) => {
                diagnosis.total_changes = total_changes;
                diagnosis.new_changes = new_changes;
                diagnosis.total_holdings = total_holdings;
                diagnosis.status = "completed";
            }
            Err(e) => {
                diagnosis.status = "error";
                diagnosis.error = Some(e.to_string());
            }
        }

        diagnosis
    }

    /// 匯出用：某日 (或最新日期) 的所有持股
    pub async fn holdings_on(&self, date: Option<&str>, etf_code: Option<&str>) -> Result<Vec<Holding>> {
        let Some(date) = self.resolve_holdings_date(date).await? else {
            return Ok(Vec::new());
        };

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {} FROM etf_holdings WHERE update_date = ",
            HOLDING_COLUMNS
        ));
        qb.push_bind(date);
        if let Some(code) = etf_code {
            qb.push(" AND etf_code = ").push_bind(code);
        }
        qb.push(" ORDER BY etf_code, weight DESC");

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(row_to_holding).collect()
    }
}
