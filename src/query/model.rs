use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::constants::REGEX_MAXIMUM_MATCHES;
use crate::error::{ArchiverError, Result};
use crate::types::{Config, FieldName, FormatOption, TimeRange};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FunctionCategory {
    #[serde(rename = "Transform")]
    Transform,
    #[serde(rename = "Array to Scalar")]
    ToScalar,
    #[serde(rename = "Filter Series")]
    Filter,
    #[serde(rename = "Sort")]
    Sort,
    #[serde(rename = "Options")]
    Options,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuncDefParam {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: String,
    #[serde(default)]
    pub options: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuncDef {
    pub category: FunctionCategory,
    pub name: String,
    #[serde(default)]
    pub params: Vec<FuncDefParam>,
}

/// One entry of the request's function list: the function definition plus
/// its arguments, encoded as strings in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDescriptor {
    #[serde(default)]
    pub params: Vec<String>,
    pub def: FuncDef,
}

impl FunctionDescriptor {
    pub fn new(name: &str, category: FunctionCategory, params: &[(&str, &str, &str)]) -> Self {
        Self {
            params: params.iter().map(|(_, _, value)| value.to_string()).collect(),
            def: FuncDef {
                category,
                name: name.to_string(),
                params: params
                    .iter()
                    .map(|(name, param_type, _)| FuncDefParam {
                        name: name.to_string(),
                        param_type: param_type.to_string(),
                        options: None,
                    })
                    .collect(),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.def.name
    }

    fn param_error(&self, reason: String) -> ArchiverError {
        ArchiverError::InvalidFunction {
            name: self.def.name.clone(),
            reason,
        }
    }

    fn param_index(&self, target: &str) -> Result<usize> {
        if self.params.len() < self.def.params.len() {
            return Err(self.param_error(format!(
                "got {} arguments, wanted {}",
                self.params.len(),
                self.def.params.len()
            )));
        }
        self.def
            .params
            .iter()
            .position(|p| p.name == target)
            .ok_or_else(|| self.param_error(format!("no argument named {}", target)))
    }

    /// Raw argument by declared name. A declared type other than `expected`
    /// is logged but doesn't stop the lookup.
    fn extract(&self, target: &str, expected: &str) -> Result<&str> {
        let idx = self.param_index(target)?;
        let declared = &self.def.params[idx].param_type;
        if declared != expected {
            warn!(
                function = %self.def.name,
                param = target,
                "type {} not expected, wanted {}",
                declared,
                expected
            );
        }
        Ok(self.params[idx].as_str())
    }

    pub fn extract_param_int(&self, target: &str) -> Result<i64> {
        let raw = self.extract(target, "int")?;
        raw.trim()
            .parse::<i64>()
            .map_err(|_| self.param_error(format!("failed to convert {} = {:?} to int", target, raw)))
    }

    pub fn extract_param_float(&self, target: &str) -> Result<f64> {
        let raw = self.extract(target, "float")?;
        raw.trim()
            .parse::<f64>()
            .map_err(|_| self.param_error(format!("failed to convert {} = {:?} to float", target, raw)))
    }

    pub fn extract_param_string(&self, target: &str) -> Result<String> {
        self.extract(target, "string").map(str::to_string)
    }

    pub fn extract_param_bool(&self, target: &str) -> Result<bool> {
        let raw = self.extract(target, "string")?;
        match raw.trim() {
            "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
            "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
            _ => Err(self.param_error(format!("failed to convert {} = {:?} to bool", target, raw))),
        }
    }

    fn first_param_name(&self) -> Result<&str> {
        self.def
            .params
            .first()
            .map(|p| p.name.as_str())
            .ok_or_else(|| self.param_error("no parameter declared".to_string()))
    }
}

/// A parsed request. Fields after `ref_id` are derived from the request, the
/// time range and the `Options` functions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryModel {
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub alias: String,
    #[serde(default)]
    pub alias_pattern: String,
    #[serde(default)]
    pub operator: String,
    #[serde(default)]
    pub regex: bool,
    #[serde(default)]
    pub live: bool,
    #[serde(default)]
    pub functions: Vec<FunctionDescriptor>,
    #[serde(default)]
    pub interval_ms: Option<i64>,
    #[serde(default)]
    pub max_data_points: Option<usize>,
    #[serde(default)]
    pub ref_id: String,

    #[serde(skip)]
    pub time_range: TimeRange,
    /// Bin interval in seconds, 0 when no binning applies.
    #[serde(skip)]
    pub interval: i64,
    /// Set when the request carries no `intervalMs`, as alerting queries do.
    #[serde(skip)]
    pub backend_query: bool,
    #[serde(skip)]
    pub live_only: bool,
    #[serde(skip)]
    pub max_num_pvs: usize,
    #[serde(skip)]
    pub disable_auto_raw: bool,
    #[serde(skip)]
    pub disable_extrapol: bool,
    #[serde(skip)]
    pub ignore_empty_err: bool,
    #[serde(skip)]
    pub hide_invalid: bool,
    #[serde(skip)]
    pub format_option: FormatOption,
    #[serde(skip)]
    pub field_name: FieldName,
}

pub const OPTION_FIELD_NAME: &str = "fieldName";
pub const OPTION_LIVE_ONLY: &str = "liveOnly";
pub const OPTION_MAX_NUM_PVS: &str = "maxNumPVs";
pub const OPTION_DISABLE_AUTO_RAW: &str = "disableAutoRaw";
pub const OPTION_DISABLE_EXTRAPOL: &str = "disableExtrapol";
pub const OPTION_BIN_INTERVAL: &str = "binInterval";
pub const OPTION_ARRAY_FORMAT: &str = "arrayFormat";
pub const OPTION_IGNORE_EMPTY_ERR: &str = "ignoreEmptyErr";
pub const OPTION_HIDE_INVALID: &str = "hideInvalid";

impl QueryModel {
    pub fn from_json(json: &str, time_range: TimeRange, config: &Config) -> Result<Self> {
        let model: QueryModel = serde_json::from_str(json)?;
        model.resolve(time_range, config)
    }

    pub fn from_value(value: serde_json::Value, time_range: TimeRange, config: &Config) -> Result<Self> {
        let model: QueryModel = serde_json::from_value(value)?;
        model.resolve(time_range, config)
    }

    fn resolve(mut self, time_range: TimeRange, config: &Config) -> Result<Self> {
        if self.operator.is_empty() {
            self.operator = config.default_operator().to_string();
        }

        self.time_range = time_range;
        if self.time_range.to - self.time_range.from < Duration::seconds(1) {
            self.time_range.to += Duration::seconds(1);
        }

        self.interval = self.load_interval();
        self.backend_query = self.interval_ms.is_none();

        let max_num_pvs = self.load_int_option(OPTION_MAX_NUM_PVS, REGEX_MAXIMUM_MATCHES as i64);
        self.max_num_pvs = usize::try_from(max_num_pvs).unwrap_or(REGEX_MAXIMUM_MATCHES);
        self.disable_auto_raw = self.load_bool_option(OPTION_DISABLE_AUTO_RAW, false);
        self.disable_extrapol = self.load_bool_option(OPTION_DISABLE_EXTRAPOL, false);
        self.live_only = self.load_bool_option(OPTION_LIVE_ONLY, false);
        self.ignore_empty_err = self.load_bool_option(OPTION_IGNORE_EMPTY_ERR, false);
        self.hide_invalid = self.load_bool_option(OPTION_HIDE_INVALID, false);

        let format = self.load_str_option(OPTION_ARRAY_FORMAT, "timeseries");
        self.format_option = format.parse().unwrap_or_else(|e| {
            warn!(error = %e, "falling back to timeseries array format");
            FormatOption::Timeseries
        });

        self.field_name = self.load_str_option(OPTION_FIELD_NAME, "VAL").parse()?;

        Ok(self)
    }

    fn load_interval(&self) -> i64 {
        if self.operator == "raw" || self.operator == "last" {
            return 0;
        }
        let default = self
            .interval_ms
            .map(|ms| (ms as f64 / 1000.0).floor() as i64)
            .unwrap_or(0);
        self.load_int_option(OPTION_BIN_INTERVAL, default)
    }

    fn option(&self, name: &str) -> Option<&FunctionDescriptor> {
        let mut found = self.functions.iter().filter(|f| f.def.name == name);
        let first = found.next()?;
        if found.next().is_some() {
            warn!(option = name, "more than one option has been provided, using the first");
        }
        Some(first)
    }

    fn load_option<T>(
        &self,
        name: &str,
        default: T,
        extract: impl Fn(&FunctionDescriptor, &str) -> Result<T>,
    ) -> T {
        let Some(function) = self.option(name) else {
            return default;
        };
        match function
            .first_param_name()
            .and_then(|param| extract(function, param))
        {
            Ok(value) => value,
            Err(e) => {
                warn!(option = name, error = %e, "conversion of option argument has failed");
                default
            }
        }
    }

    pub fn load_int_option(&self, name: &str, default: i64) -> i64 {
        self.load_option(name, default, |f, p| f.extract_param_int(p))
    }

    pub fn load_bool_option(&self, name: &str, default: bool) -> bool {
        self.load_option(name, default, |f, p| f.extract_param_bool(p))
    }

    pub fn load_str_option(&self, name: &str, default: &str) -> String {
        self.load_option(name, default.to_string(), |f, p| f.extract_param_string(p))
    }
}
