// operators.rs

use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::error::{ArchiverError, Result};
use crate::query::model::QueryModel;

/// Server-side processing operators understood by the Archiver Appliance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    FirstSample,
    LastSample,
    FirstFill,
    LastFill,

    // Statistical operators
    Mean,
    Min,
    Max,
    Count,
    NCount,
    Nth,
    Median,
    Std,
    Jitter,
    Variance,
    PopVariance,
    Kurtosis,
    Skewness,

    // Flyer detection
    IgnoreFlyers,
    Flyers,

    // No server-side processing
    Raw,
    Last,
}

impl Operator {
    pub const ALL: [Operator; 21] = [
        Operator::FirstSample,
        Operator::LastSample,
        Operator::FirstFill,
        Operator::LastFill,
        Operator::Mean,
        Operator::Min,
        Operator::Max,
        Operator::Count,
        Operator::NCount,
        Operator::Nth,
        Operator::Median,
        Operator::Std,
        Operator::Jitter,
        Operator::IgnoreFlyers,
        Operator::Flyers,
        Operator::Variance,
        Operator::PopVariance,
        Operator::Kurtosis,
        Operator::Skewness,
        Operator::Raw,
        Operator::Last,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::FirstSample => "firstSample",
            Operator::LastSample => "lastSample",
            Operator::FirstFill => "firstFill",
            Operator::LastFill => "lastFill",
            Operator::Mean => "mean",
            Operator::Min => "min",
            Operator::Max => "max",
            Operator::Count => "count",
            Operator::NCount => "ncount",
            Operator::Nth => "nth",
            Operator::Median => "median",
            Operator::Std => "std",
            Operator::Jitter => "jitter",
            Operator::IgnoreFlyers => "ignoreflyers",
            Operator::Flyers => "flyers",
            Operator::Variance => "variance",
            Operator::PopVariance => "popvariance",
            Operator::Kurtosis => "kurtosis",
            Operator::Skewness => "skewness",
            Operator::Raw => "raw",
            Operator::Last => "last",
        }
    }

    /// Operators that never get a bin prefix
    pub fn is_unbinned(&self) -> bool {
        matches!(self, Operator::Raw | Operator::Last)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = ArchiverError;

    fn from_str(s: &str) -> Result<Self> {
        Operator::ALL
            .iter()
            .find(|op| op.as_str() == s)
            .copied()
            .ok_or_else(|| {
                ArchiverError::invalid_request(
                    format!("{} is not a recognized operator", s),
                    "operator".to_string(),
                    vec![format!("Unknown operator: {}", s)],
                )
            })
    }
}

/// Builds the `<operator>_<interval>` prefix, or `None` when the PV is to be
/// requested as is.
pub fn operator_query(operator: &str, interval: i64, disable_auto_raw: bool) -> Option<String> {
    let op = match operator.parse::<Operator>() {
        Ok(op) => op,
        Err(e) => {
            warn!(error = %e, "operator has been ignored");
            return None;
        }
    };

    if op.is_unbinned() {
        return None;
    }

    let bin_interval = if interval < 1 {
        if !disable_auto_raw {
            return None;
        }
        1
    } else {
        interval
    };

    Some(format!("{}_{}", op, bin_interval))
}

/// The `pv` query parameter for one target.
pub fn target_query(target: &str, query: &QueryModel) -> String {
    match operator_query(&query.operator, query.interval, query.disable_auto_raw) {
        Some(prefix) => {
            debug!(pv = target, prefix = %prefix, "applying operator");
            format!("{}({})", prefix, target)
        }
        None => target.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_operators() {
        for op in Operator::ALL {
            assert_eq!(op.as_str().parse::<Operator>().unwrap(), op);
        }
        assert!("average".parse::<Operator>().is_err());
        assert!("Mean".parse::<Operator>().is_err());
    }

    #[test]
    fn test_operator_query() {
        assert_eq!(operator_query("mean", 10, false), Some("mean_10".to_string()));
        assert_eq!(operator_query("max", 3600, true), Some("max_3600".to_string()));
        assert_eq!(operator_query("raw", 10, false), None);
        assert_eq!(operator_query("last", 10, true), None);
        assert_eq!(operator_query("average", 10, false), None);
    }

    #[test]
    fn test_auto_raw() {
        assert_eq!(operator_query("mean", 0, false), None);
        assert_eq!(operator_query("mean", 0, true), Some("mean_1".to_string()));
        assert_eq!(operator_query("std", -5, true), Some("std_1".to_string()));
    }

    #[test]
    fn test_target_query() {
        let query = QueryModel {
            operator: "firstSample".to_string(),
            interval: 60,
            ..QueryModel::default()
        };
        assert_eq!(target_query("PV:NAME", &query), "firstSample_60(PV:NAME)");

        let raw = QueryModel {
            operator: "raw".to_string(),
            interval: 60,
            ..QueryModel::default()
        };
        assert_eq!(target_query("PV:NAME", &raw), "PV:NAME");
    }
}
