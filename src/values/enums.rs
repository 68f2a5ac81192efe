use chrono::{DateTime, Utc};
use serde::Serialize;

const SEVERITY_TEXT: [&str; 4] = ["NO_ALARM", "MINOR", "MAJOR", "INVALID"];
const SEVERITY_COLOR: [&str; 4] = [
    "rgb(86, 166, 75)",
    "rgb(255, 120, 10)",
    "rgb(224, 47, 68)",
    "rgb(163, 82, 204)",
];

const STATUS_TEXT: [&str; 22] = [
    "NO_ALARM",
    "READ",
    "WRITE",
    "HIHI",
    "HIGH",
    "LOLO",
    "LOW",
    "STATE",
    "COS",
    "COMM",
    "TIMEOUT",
    "HWLIMIT",
    "CALC",
    "SCAN",
    "LINK",
    "SOFT",
    "BAD_SUB",
    "UDF",
    "DISABLE",
    "SIMM",
    "READ_ACCESS",
    "WRITE_ACCESS",
];

/// Labels and display colours for enum codes, indexed by code.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnumLegend {
    pub text: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub color: Vec<String>,
}

impl EnumLegend {
    pub fn label(&self, code: i32) -> Option<&str> {
        usize::try_from(code)
            .ok()
            .and_then(|idx| self.text.get(idx))
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Enums {
    pub times: Vec<DateTime<Utc>>,
    pub values: Vec<i32>,
    pub legend: EnumLegend,
}

impl Enums {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            times: Vec::with_capacity(capacity),
            values: Vec::with_capacity(capacity),
            legend: EnumLegend::default(),
        }
    }

    /// EPICS alarm severity codes.
    pub fn severity(capacity: usize) -> Self {
        Self {
            legend: EnumLegend {
                text: SEVERITY_TEXT.iter().map(|s| s.to_string()).collect(),
                color: SEVERITY_COLOR.iter().map(|s| s.to_string()).collect(),
            },
            ..Self::with_capacity(capacity)
        }
    }

    /// EPICS alarm status codes.
    pub fn status(capacity: usize) -> Self {
        Self {
            legend: EnumLegend {
                text: STATUS_TEXT.iter().map(|s| s.to_string()).collect(),
                color: Vec::new(),
            },
            ..Self::with_capacity(capacity)
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn append(&mut self, value: i32, time: DateTime<Utc>) {
        self.values.push(value);
        self.times.push(time);
    }

    pub fn extrapolate(&mut self, time: DateTime<Utc>) {
        if let Some(&last) = self.values.last() {
            self.append(last, time);
        }
    }
}
