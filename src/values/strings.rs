use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Strings {
    pub times: Vec<DateTime<Utc>>,
    pub values: Vec<String>,
}

impl Strings {
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

    pub fn append(&mut self, value: String, time: DateTime<Utc>) {
        self.values.push(value);
        self.times.push(time);
    }

    pub fn extrapolate(&mut self, time: DateTime<Utc>) {
        if let Some(last) = self.values.last().cloned() {
            self.append(last, time);
        }
    }
}
