use chrono::{DateTime, Utc};
use serde::Serialize;

use super::Scalars;

/// Waveform samples, one row of values per timestamp.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Arrays {
    pub times: Vec<DateTime<Utc>>,
    pub values: Vec<Vec<f64>>,
}

impl Arrays {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            times: Vec::with_capacity(capacity),
            values: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn append(&mut self, value: Vec<f64>, time: DateTime<Utc>) {
        self.values.push(value);
        self.times.push(time);
    }

    pub fn extrapolate(&mut self, time: DateTime<Utc>) {
        if let Some(last) = self.values.last().cloned() {
            self.append(last, time);
        }
    }

    /// Collapses every row into one scalar sample at the same timestamp.
    pub fn reduce<F>(&self, f: F) -> Scalars
    where
        F: Fn(&[f64]) -> Option<f64>,
    {
        Scalars::from_parts(
            self.times.clone(),
            self.values.iter().map(|row| f(row)).collect(),
        )
    }
}
