use crate::domain::model::EtfInfo;
use crate::utils::error::{MonitorError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;

/// 上游來源與追蹤的 ETF 清單
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default)]
    pub pocket: PocketConfig,
    #[serde(default = "default_etfs")]
    pub etfs: Vec<EtfSource>,
    #[serde(default)]
    pub warrants: WarrantBoardConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PocketConfig {
    pub endpoint: String,
    pub dtno: String,
    pub referer: String,
    pub timeout_seconds: u64,
    /// 兩檔 ETF 之間的間隔
    pub delay_secs: u64,
}

impl Default for PocketConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://www.pocket.tw/api/cm/MobileService/ashx/GetDtnoData.ashx"
                .to_string(),
            dtno: "59449513".to_string(),
            referer: "https://www.pocket.tw/etf/tw/".to_string(),
            timeout_seconds: 30,
            delay_secs: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EtfSource {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WarrantBoardConfig {
    pub base_url: String,
    pub path: String,
    pub pages: u32,
    pub sort_type: u32,
    pub min_delay_secs: f64,
    pub max_delay_secs: f64,
    /// 頁面疑似被攔截後的暫停區間
    pub blocked_backoff_min_secs: f64,
    pub blocked_backoff_max_secs: f64,
    /// 請求失敗後的暫停區間
    pub error_backoff_min_secs: f64,
    pub error_backoff_max_secs: f64,
    pub rows_per_page: usize,
    pub timeout_seconds: u64,
}

impl Default for WarrantBoardConfig {
    fn default() -> Self {
        Self {
            base_url: "https://ebroker-dj.fbs.com.tw".to_string(),
            path: "/WRT/zx/zxd/zxd.djhtm".to_string(),
            pages: 5,
            sort_type: 3,
            min_delay_secs: 2.0,
            max_delay_secs: 5.0,
            blocked_backoff_min_secs: 10.0,
            blocked_backoff_max_secs: 20.0,
            error_backoff_min_secs: 5.0,
            error_backoff_max_secs: 10.0,
            rows_per_page: 20,
            timeout_seconds: 30,
        }
    }
}

fn default_etfs() -> Vec<EtfSource> {
    [
        ("00980A", "主動野村臺灣優選ETF"),
        ("00981A", "統一台股增長主動式ETF"),
        ("00982A", "群益台灣精選強棒主動式ETF"),
        ("00983A", "中信ARK創新主動式ETF"),
        ("00984A", "安聯台灣高股息成長主動式ETF"),
        ("00985A", "野村台灣增強50主動式ETF"),
    ]
    .into_iter()
    .map(|(code, name)| EtfSource {
        code: code.to_string(),
        name: name.to_string(),
    })
    .collect()
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            pocket: PocketConfig::default(),
            etfs: default_etfs(),
            warrants: WarrantBoardConfig::default(),
        }
    }
}

fn env_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("static regex"))
}

impl SourcesConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        tracing::info!("📋 Loaded sources config from {}", path.as_ref().display());
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = Self::substitute_env_vars(content);

        toml::from_str(&processed).map_err(|e| MonitorError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${POCKET_DTNO})；未設定的變數保持原樣
    fn substitute_env_vars(content: &str) -> String {
        env_var_pattern()
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .into_owned()
    }

    pub fn etf_codes(&self) -> Vec<String> {
        self.etfs.iter().map(|e| e.code.clone()).collect()
    }

    pub fn etf_name(&self, code: &str) -> Option<&str> {
        self.etfs
            .iter()
            .find(|e| e.code == code)
            .map(|e| e.name.as_str())
    }

    /// 不在清單中的代碼以代碼本身作為名稱
    pub fn etf_name_or_code<'a>(&'a self, code: &'a str) -> &'a str {
        self.etf_name(code).unwrap_or(code)
    }

    pub fn is_tracked(&self, code: &str) -> bool {
        self.etfs.iter().any(|e| e.code == code)
    }

    pub fn etf_list(&self) -> Vec<EtfInfo> {
        self.etfs
            .iter()
            .map(|e| EtfInfo {
                code: e.code.clone(),
                name: e.name.clone(),
            })
            .collect()
    }
}

impl Validate for SourcesConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_url("pocket.endpoint", &self.pocket.endpoint)?;
        validation::validate_non_empty_string("pocket.dtno", &self.pocket.dtno)?;
        validation::validate_positive_number("pocket.timeout_seconds", self.pocket.timeout_seconds, 1)?;

        if self.etfs.is_empty() {
            return Err(MonitorError::MissingConfigError {
                field: "etfs".to_string(),
            });
        }
        for etf in &self.etfs {
            validation::validate_non_empty_string("etfs.code", &etf.code)?;
        }

        validation::validate_url("warrants.base_url", &self.warrants.base_url)?;
        validation::validate_range("warrants.pages", self.warrants.pages, 1, 50)?;
        validation::validate_positive_number(
            "warrants.rows_per_page",
            self.warrants.rows_per_page as u64,
            1,
        )?;
        let w = &self.warrants;
        validate_delay_range("warrants.max_delay_secs", w.min_delay_secs, w.max_delay_secs)?;
        validate_delay_range(
            "warrants.blocked_backoff_max_secs",
            w.blocked_backoff_min_secs,
            w.blocked_backoff_max_secs,
        )?;
        validate_delay_range(
            "warrants.error_backoff_max_secs",
            w.error_backoff_min_secs,
            w.error_backoff_max_secs,
        )?;

        Ok(())
    }
}

fn validate_delay_range(field: &str, min: f64, max: f64) -> Result<()> {
    if min < 0.0 || max < min {
        return Err(MonitorError::InvalidConfigValueError {
            field: field.to_string(),
            value: max.to_string(),
            reason: "Delay range must be non-negative and max >= min".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = SourcesConfig::default();
        assert_eq!(config.etfs.len(), 6);
        assert_eq!(config.pocket.dtno, "59449513");
        assert_eq!(config.etf_name("00981A"), Some("統一台股增長主動式ETF"));
        assert_eq!(config.etf_name_or_code("00999A"), "00999A");
        assert_eq!(config.warrants.pages, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = SourcesConfig::from_toml_str(
            r#"
[[etfs]]
code = "00981A"
name = "統一台股增長"

[warrants]
pages = 2
"#,
        )
        .unwrap();

        assert_eq!(config.etf_codes(), vec!["00981A".to_string()]);
        assert_eq!(config.warrants.pages, 2);
        assert_eq!(config.warrants.sort_type, 3);
        assert_eq!(config.pocket.delay_secs, 2);
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("ETF_MONITOR_TEST_DTNO", "12345");

        let config = SourcesConfig::from_toml_str(
            r#"
[pocket]
dtno = "${ETF_MONITOR_TEST_DTNO}"
"#,
        )
        .unwrap();
        assert_eq!(config.pocket.dtno, "12345");

        std::env::remove_var("ETF_MONITOR_TEST_DTNO");
    }

    #[test]
    fn test_config_validation() {
        let config = SourcesConfig::from_toml_str(
            r#"
[pocket]
endpoint = "invalid-url"
"#,
        )
        .unwrap();
        assert!(config.validate().is_err());

        let config = SourcesConfig::from_toml_str("etfs = []").unwrap();
        assert!(matches!(
            config.validate(),
            Err(MonitorError::MissingConfigError { .. })
        ));

        let config = SourcesConfig::from_toml_str(
            "[warrants]\nblocked_backoff_min_secs = 20.0\nblocked_backoff_max_secs = 10.0\n",
        )
        .unwrap();
        match config.validate() {
            Err(MonitorError::InvalidConfigValueError { field, .. }) => {
                assert_eq!(field, "warrants.blocked_backoff_max_secs")
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[warrants]\nmin_delay_secs = 0.0\nmax_delay_secs = 0.0\n")
            .unwrap();

        let config = SourcesConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.warrants.max_delay_secs, 0.0);
        assert!(config.validate().is_ok());
    }
}
