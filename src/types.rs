use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::*;
use crate::error::{ArchiverError, Result};

/// Wire format used to retrieve samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    /// Chunked protocol buffer stream from `getData.raw`.
    #[default]
    Raw,
    Json,
}

impl FromStr for DataFormat {
    type Err = ArchiverError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "raw" | "pb" => Ok(DataFormat::Raw),
            "json" => Ok(DataFormat::Json),
            other => Err(ArchiverError::invalid_request(
                format!("unknown data format: {}", other),
                "format".to_string(),
                vec![],
            )),
        }
    }
}

/// Record field whose samples are returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FieldName {
    #[default]
    #[serde(rename = "VAL")]
    Val,
    #[serde(rename = "SEVR")]
    Sevr,
    #[serde(rename = "STAT")]
    Stat,
    #[serde(rename = "SEVR_AS_ENUM")]
    SevrAsEnum,
    #[serde(rename = "STAT_AS_ENUM")]
    StatAsEnum,
}

impl FromStr for FieldName {
    type Err = ArchiverError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "VAL" => Ok(FieldName::Val),
            "SEVR" => Ok(FieldName::Sevr),
            "STAT" => Ok(FieldName::Stat),
            "SEVR_AS_ENUM" => Ok(FieldName::SevrAsEnum),
            "STAT_AS_ENUM" => Ok(FieldName::StatAsEnum),
            other => Err(ArchiverError::IllegalFieldName(other.to_string())),
        }
    }
}

/// Layout hint for waveform series, passed through to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FormatOption {
    #[default]
    Timeseries,
    Index,
    DtSpace,
}

impl FromStr for FormatOption {
    type Err = ArchiverError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "timeseries" => Ok(FormatOption::Timeseries),
            "index" => Ok(FormatOption::Index),
            "dt-space" => Ok(FormatOption::DtSpace),
            other => Err(ArchiverError::invalid_request(
                format!("unknown array format: {}", other),
                "arrayFormat".to_string(),
                vec![],
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self { from, to }
    }

    pub fn duration_seconds(&self) -> i64 {
        (self.to - self.from).num_seconds()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub url: String,
    pub timeout_secs: u64,
    /// Upper bound for collecting all targets of one query.
    #[serde(with = "humantime_serde")]
    pub query_timeout: Duration,
    pub max_concurrent: usize,
    pub format: DataFormat,
    pub default_operator: String,
    pub use_live_update: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            format: DataFormat::default(),
            default_operator: String::new(),
            use_live_update: false,
        }
    }
}

impl Config {
    /// Reads datasource settings; missing keys keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn default_operator(&self) -> &str {
        if self.default_operator.is_empty() {
            DEFAULT_OPERATOR
        } else {
            &self.default_operator
        }
    }
}

// JSON response of getData.qw

#[derive(Debug, Clone, Deserialize)]
pub struct ArchiverResponse {
    pub meta: ResponseMeta,
    #[serde(default)]
    pub data: Vec<ResponsePoint>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[allow(non_snake_case)]
pub struct ResponseMeta {
    pub name: String,
    #[serde(default)]
    pub waveform: bool,
    #[serde(default)]
    pub EGU: Option<String>,
    #[serde(default)]
    pub PREC: Option<JsonValue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponsePoint {
    #[serde(default)]
    pub millis: Option<i64>,
    #[serde(default)]
    pub secs: Option<i64>,
    #[serde(default)]
    pub nanos: Option<i64>,
    #[serde(default)]
    pub val: JsonValue,
    #[serde(default)]
    pub severity: Option<i32>,
    #[serde(default)]
    pub status: Option<i32>,
}

impl ResponsePoint {
    pub fn timestamp(&self) -> Result<DateTime<Utc>> {
        let ts = match (self.millis, self.secs) {
            (Some(millis), _) => DateTime::<Utc>::from_timestamp_millis(millis),
            (None, Some(secs)) => {
                let nanos = self.nanos.unwrap_or(0);
                let secs = secs + nanos.div_euclid(1_000_000_000);
                DateTime::<Utc>::from_timestamp(secs, nanos.rem_euclid(1_000_000_000) as u32)
            }
            (None, None) => None,
        };
        ts.ok_or(ArchiverError::FailedToParse)
    }
}
