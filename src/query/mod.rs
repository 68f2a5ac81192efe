//! Query orchestration: target resolution, concurrent fetches under one
//! deadline, and post-processing of the collected series.

pub mod expand;
pub mod model;

use async_trait::async_trait;
use futures::future::join_all;
use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::error::{ArchiverError, Result};
use crate::functions::apply_functions;
use crate::live::{channel_path, is_pv_name_valid};
use crate::types::FormatOption;
use crate::values::SingleData;

pub use expand::expand_targets;
pub use model::QueryModel;

/// Source of PV data for the orchestrator.
#[async_trait]
pub trait TargetFetcher: Send + Sync {
    /// PV names matching `regex`, at most `limit` of them.
    async fn fetch_regex_targets(&self, regex: &str, limit: usize) -> Result<Vec<String>>;

    async fn fetch_target(&self, target: &str, query: &QueryModel) -> Result<SingleData>;
}

/// Outcome of one query. `error` holds the first failure among the targets;
/// series of the other targets are still returned.
#[derive(Debug)]
pub struct QueryResult {
    pub ref_id: String,
    pub data: Vec<SingleData>,
    pub error: Option<ArchiverError>,
    pub format: FormatOption,
}

/// Expands the target expression, resolves regex targets through the
/// archiver and removes duplicates, keeping the first occurrence.
pub async fn target_list(fetcher: &dyn TargetFetcher, query: &QueryModel) -> Vec<String> {
    let expanded = expand_targets(&query.target);

    let targets = if query.regex {
        let mut matched = Vec::new();
        for pattern in &expanded {
            match fetcher.fetch_regex_targets(pattern, query.max_num_pvs).await {
                Ok(pvs) => matched.extend(pvs),
                Err(e) => warn!(regex = %pattern, error = %e, "regex lookup has failed"),
            }
        }
        matched
    } else {
        expanded
    };

    let mut seen = HashSet::with_capacity(targets.len());
    targets
        .into_iter()
        .filter(|target| seen.insert(target.clone()))
        .collect()
}

pub async fn execute_query(
    fetcher: Arc<dyn TargetFetcher>,
    query: QueryModel,
    timeout: Duration,
) -> QueryResult {
    let query = Arc::new(query);
    let targets = target_list(fetcher.as_ref(), &query).await;
    debug!(ref_id = %query.ref_id, count = targets.len(), "resolved targets");

    let mut tasks = JoinSet::new();
    for target in targets {
        let fetcher = Arc::clone(&fetcher);
        let query = Arc::clone(&query);
        tasks.spawn(async move { fetcher.fetch_target(&target, &query).await });
    }

    let (mut data, error) = collect(tasks, timeout, query.ignore_empty_err).await;

    apply_alias(&mut data, &query);
    data.sort_by(|a, b| a.name.cmp(&b.name));

    let mut data = apply_functions(data, &query.functions);

    if should_extrapolate(&query) {
        for sd in data.iter_mut() {
            sd.extrapolate(query.time_range.to);
        }
    }

    if query.live {
        assign_live_channels(&mut data);
    }

    info!(ref_id = %query.ref_id, series = data.len(), failed = error.is_some(), "query completed");

    QueryResult {
        ref_id: query.ref_id.clone(),
        data,
        error,
        format: query.format_option,
    }
}

/// Runs independent queries concurrently. Results keep the input order.
pub async fn execute_queries(
    fetcher: Arc<dyn TargetFetcher>,
    queries: Vec<QueryModel>,
    timeout: Duration,
) -> Vec<QueryResult> {
    join_all(
        queries
            .into_iter()
            .map(|query| execute_query(Arc::clone(&fetcher), query, timeout)),
    )
    .await
}

async fn collect(
    mut tasks: JoinSet<Result<SingleData>>,
    timeout: Duration,
    ignore_empty_err: bool,
) -> (Vec<SingleData>, Option<ArchiverError>) {
    let mut data = Vec::with_capacity(tasks.len());
    let mut first_error = None;

    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            joined = tasks.join_next() => {
                let Some(joined) = joined else {
                    break;
                };
                let result = joined
                    .map_err(|e| ArchiverError::Task(e.to_string()))
                    .and_then(|r| r);

                match result {
                    Ok(sd) => data.push(sd),
                    Err(e) if ignore_empty_err && e.is_empty_response() => {
                        debug!(error = %e, "empty response ignored");
                    }
                    Err(e) => {
                        warn!(error = %e, "target query has failed");
                        if first_error.is_none() {
                            first_error = Some(e);
                        }
                    }
                }
            }
            _ = &mut deadline => {
                warn!(pending = tasks.len(), "Timeout limit for query has been reached");
                tasks.abort_all();
                break;
            }
        }
    }

    (data, first_error)
}

fn apply_alias(data: &mut [SingleData], query: &QueryModel) {
    if query.alias.is_empty() {
        return;
    }

    let pattern = if query.alias_pattern.is_empty() {
        None
    } else {
        match Regex::new(&query.alias_pattern) {
            Ok(re) => Some(re),
            Err(e) => {
                warn!(pattern = %query.alias_pattern, error = %e, "Error applying alias");
                return;
            }
        }
    };

    for sd in data.iter_mut() {
        sd.apply_alias(&query.alias, pattern.as_ref());
    }
}

fn should_extrapolate(query: &QueryModel) -> bool {
    !(query.interval >= 1 || query.operator == "last" || query.disable_extrapol || query.backend_query)
}

fn assign_live_channels(data: &mut [SingleData]) {
    for sd in data.iter_mut() {
        if is_pv_name_valid(sd.pvname()) {
            sd.channel = Some(channel_path(sd.pvname()));
        } else {
            warn!(pvname = sd.pvname(), "invalid pvname for live channel");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(interval: i64, operator: &str) -> QueryModel {
        QueryModel {
            interval,
            operator: operator.to_string(),
            ..QueryModel::default()
        }
    }

    #[test]
    fn test_should_extrapolate() {
        assert!(should_extrapolate(&query(0, "mean")));
        assert!(should_extrapolate(&query(0, "raw")));
        assert!(!should_extrapolate(&query(1, "mean")));
        assert!(!should_extrapolate(&query(0, "last")));

        let disabled = QueryModel {
            disable_extrapol: true,
            ..query(0, "raw")
        };
        assert!(!should_extrapolate(&disabled));

        let backend = QueryModel {
            backend_query: true,
            ..query(0, "raw")
        };
        assert!(!should_extrapolate(&backend));
    }

    #[test]
    fn test_bad_alias_pattern_keeps_names() {
        let mut data = vec![SingleData::new("PV:NAME", Default::default())];
        let query = QueryModel {
            alias: "alias".to_string(),
            alias_pattern: "(".to_string(),
            ..QueryModel::default()
        };
        apply_alias(&mut data, &query);
        assert_eq!(data[0].name, "PV:NAME");
    }
}
