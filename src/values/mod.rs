//! Typed time-series containers and the per-target query result.

mod arrays;
mod enums;
mod scalars;
mod strings;

pub use arrays::Arrays;
pub use enums::{EnumLegend, Enums};
pub use scalars::{RankType, Scalars};
pub use strings::Strings;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;

/// Samples of one PV. The variant is fixed by the shape of the first payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Values {
    Scalars(Scalars),
    Arrays(Arrays),
    Strings(Strings),
    Enums(Enums),
}

impl Default for Values {
    fn default() -> Self {
        Values::Scalars(Scalars::default())
    }
}

impl Values {
    pub fn len(&self) -> usize {
        match self {
            Values::Scalars(v) => v.len(),
            Values::Arrays(v) => v.len(),
            Values::Strings(v) => v.len(),
            Values::Enums(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn times(&self) -> &[DateTime<Utc>] {
        match self {
            Values::Scalars(v) => &v.times,
            Values::Arrays(v) => &v.times,
            Values::Strings(v) => &v.times,
            Values::Enums(v) => &v.times,
        }
    }

    pub fn extrapolate(&mut self, time: DateTime<Utc>) {
        match self {
            Values::Scalars(v) => v.extrapolate(time),
            Values::Arrays(v) => v.extrapolate(time),
            Values::Strings(v) => v.extrapolate(time),
            Values::Enums(v) => v.extrapolate(time),
        }
    }

    pub fn as_scalars(&self) -> Option<&Scalars> {
        match self {
            Values::Scalars(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_scalars_mut(&mut self) -> Option<&mut Scalars> {
        match self {
            Values::Scalars(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_arrays(&self) -> Option<&Arrays> {
        match self {
            Values::Arrays(v) => Some(v),
            _ => None,
        }
    }

    /// Rank of the series; anything without a present scalar sample ranks 0.
    pub fn rank(&self, rank_type: RankType) -> f64 {
        self.as_scalars()
            .and_then(|s| s.rank(rank_type))
            .unwrap_or(0.0)
    }
}

/// Result for one resolved target.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SingleData {
    /// Display name, rewritten by alias.
    pub name: String,
    pvname: String,
    pub values: Values,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
}

impl SingleData {
    pub fn new<T: Into<String>>(pvname: T, values: Values) -> Self {
        let pvname = pvname.into();
        Self {
            name: pvname.clone(),
            pvname,
            values,
            channel: None,
        }
    }

    /// A derived series keeps the PV identity of its source.
    pub fn derived<T: Into<String>>(&self, name: T, values: Values) -> Self {
        Self {
            name: name.into(),
            pvname: self.pvname.clone(),
            values,
            channel: None,
        }
    }

    pub fn pvname(&self) -> &str {
        &self.pvname
    }

    /// Without a pattern the alias replaces the name. With one, every match
    /// in the name is replaced by the alias, which may refer to capture
    /// groups as `$1` or `$name`.
    pub fn apply_alias(&mut self, alias: &str, pattern: Option<&Regex>) {
        self.name = match pattern {
            Some(re) => re.replace_all(&self.name, alias).into_owned(),
            None => alias.to_string(),
        };
    }

    pub fn extrapolate(&mut self, time: DateTime<Utc>) {
        self.values.extrapolate(time);
    }
}
