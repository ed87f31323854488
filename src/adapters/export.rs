use crate::domain::model::Holding;
use crate::utils::error::{MonitorError, Result};
use std::io::Write;

/// 持股匯出成 CSV (含標題列)，回傳寫入筆數
pub fn write_holdings_csv<W: Write>(writer: W, holdings: &[Holding]) -> Result<usize> {
    let mut csv = csv::Writer::from_writer(writer);
    for holding in holdings {
        csv.serialize(holding)?;
    }
    csv.flush()?;
    Ok(holdings.len())
}

pub fn export_holdings_file(path: &std::path::Path, holdings: &[Holding]) -> Result<usize> {
    if holdings.is_empty() {
        return Err(MonitorError::NoDataError {
            source_name: "holdings export".to_string(),
        });
    }
    let file = std::fs::File::create(path)?;
    let written = write_holdings_csv(file, holdings)?;
    tracing::info!("📁 Exported {} holdings to {}", written, path.display());
    Ok(written)
}
