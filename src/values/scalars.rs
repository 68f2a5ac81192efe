use chrono::{DateTime, Utc};
use serde::Serialize;
use std::str::FromStr;

use crate::error::ArchiverError;

/// Numeric samples. A `None` value means there was no sample in the bin and
/// is skipped by every transform and rank.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Scalars {
    pub times: Vec<DateTime<Utc>>,
    pub values: Vec<Option<f64>>,
}

/// How a series is reduced to a single number for ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankType {
    Avg,
    Min,
    Max,
    AbsoluteMin,
    AbsoluteMax,
    Sum,
}

impl FromStr for RankType {
    type Err = ArchiverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "avg" => Ok(RankType::Avg),
            "min" => Ok(RankType::Min),
            "max" => Ok(RankType::Max),
            "absoluteMin" => Ok(RankType::AbsoluteMin),
            "absoluteMax" => Ok(RankType::AbsoluteMax),
            "sum" => Ok(RankType::Sum),
            _ => Err(ArchiverError::invalid_request(
                format!("Value {} not recognized", s),
                "rank".to_string(),
                vec![],
            )),
        }
    }
}

impl Scalars {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            times: Vec::with_capacity(capacity),
            values: Vec::with_capacity(capacity),
        }
    }

    /// Builds a container from parallel sequences, which must have the same length.
    pub fn from_parts(times: Vec<DateTime<Utc>>, values: Vec<Option<f64>>) -> Self {
        debug_assert_eq!(times.len(), values.len());
        Self { times, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn append(&mut self, value: Option<f64>, time: DateTime<Utc>) {
        self.values.push(value);
        self.times.push(time);
    }

    fn last_present(&self) -> Option<f64> {
        self.values.iter().rev().find_map(|v| *v)
    }

    /// Repeats the last present value at `time`.
    pub fn extrapolate(&mut self, time: DateTime<Utc>) {
        if let Some(last) = self.last_present() {
            self.append(Some(last), time);
        }
    }

    pub fn scale(&mut self, factor: f64) {
        for v in self.values.iter_mut().flatten() {
            *v *= factor;
        }
    }

    pub fn offset(&mut self, delta: f64) {
        for v in self.values.iter_mut().flatten() {
            *v += delta;
        }
    }

    /// First difference. A pair with a missing sample on either side produces
    /// nothing; when no difference can be taken the series collapses to a
    /// single zero at the first timestamp.
    pub fn delta(&mut self) {
        if self.values.is_empty() {
            return;
        }

        let mut times = Vec::with_capacity(self.times.len());
        let mut values = Vec::with_capacity(self.values.len());

        for idx in 1..self.values.len() {
            if let (Some(prev), Some(cur)) = (self.values[idx - 1], self.values[idx]) {
                values.push(Some(cur - prev));
                times.push(self.times[idx]);
            }
        }

        if values.is_empty() {
            values.push(Some(0.0));
            times.push(self.times[0]);
        }

        self.times = times;
        self.values = values;
    }

    pub fn fluctuation(&mut self) {
        let Some(start) = self.values.iter().find_map(|v| *v) else {
            return;
        };
        for v in self.values.iter_mut().flatten() {
            *v -= start;
        }
    }

    /// Trailing moving average over `window_size` positions. Missing samples
    /// stay missing and don't count towards the window average.
    pub fn moving_average(&mut self, window_size: usize) {
        if window_size == 0 {
            return;
        }

        let averaged = (0..self.values.len())
            .map(|idx| {
                self.values[idx]?;
                let start = (idx + 1).saturating_sub(window_size);
                let (total, count) = self.values[start..=idx]
                    .iter()
                    .flatten()
                    .fold((0.0, 0usize), |(total, count), v| (total + v, count + 1));
                Some(total / count as f64)
            })
            .collect();

        self.values = averaged;
    }

    /// Reduces the series to one number. `None` when there is no present sample.
    pub fn rank(&self, rank_type: RankType) -> Option<f64> {
        let mut present = self.values.iter().flatten().copied().peekable();
        present.peek()?;

        let rank = match rank_type {
            RankType::Avg => {
                let (total, count) =
                    present.fold((0.0, 0usize), |(total, count), v| (total + v, count + 1));
                total / count as f64
            }
            RankType::Min => present.fold(f64::INFINITY, f64::min),
            RankType::Max => present.fold(f64::NEG_INFINITY, f64::max),
            RankType::AbsoluteMin => present.map(f64::abs).fold(f64::INFINITY, f64::min),
            RankType::AbsoluteMax => present.map(f64::abs).fold(f64::NEG_INFINITY, f64::max),
            RankType::Sum => present.sum(),
        };

        Some(rank)
    }
}
