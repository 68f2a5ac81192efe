//! HTTP client for the Archiver Appliance retrieval API

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Response};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::debug;
use url::Url;

use crate::constants::{JSON_DATA_PATH, RAW_DATA_PATH, REGEX_PATH};
use crate::decode::{decode_json_response, PbDecoder};
use crate::decode_helpers::format_date_for_archiver;
use crate::error::{ArchiverError, Result};
use crate::operators::target_query;
use crate::query::{QueryModel, TargetFetcher};
use crate::types::{Config, DataFormat};
use crate::values::{SingleData, Values};

#[derive(Clone)]
pub struct ArchiverClient {
    client: Client,
    semaphore: Arc<Semaphore>,
    base_url: String,
    format: DataFormat,
}

impl ArchiverClient {
    pub fn new(config: &Config) -> Result<Self> {
        let max_concurrent = config.max_concurrent.max(1);
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(max_concurrent)
            .build()?;

        // Fail early on a malformed base URL
        Url::parse(&config.url)?;

        Ok(Self {
            client,
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            base_url: config.url.trim_end_matches('/').to_string(),
            format: config.format,
        })
    }

    pub fn build_url(&self, path: &str, params: &[(&str, &str)]) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/{}", self.base_url, path))?;
        url.query_pairs_mut().extend_pairs(params);
        Ok(url)
    }

    /// Data request for one target. In `last` mode `from` equals `to`.
    pub fn query_url(&self, target: &str, query: &QueryModel) -> Result<Url> {
        let path = match self.format {
            DataFormat::Raw => RAW_DATA_PATH,
            DataFormat::Json => JSON_DATA_PATH,
        };

        let pv = target_query(target, query);
        let to = format_date_for_archiver(&query.time_range.to);
        let from = if query.operator == "last" {
            to.clone()
        } else {
            format_date_for_archiver(&query.time_range.from)
        };

        self.build_url(
            path,
            &[
                ("pv", pv.as_str()),
                ("from", from.as_str()),
                ("to", to.as_str()),
                ("donotchunk", ""),
            ],
        )
    }

    pub fn regex_url(&self, regex: &str, limit: usize) -> Result<Url> {
        let limit = limit.to_string();
        self.build_url(REGEX_PATH, &[("regex", regex), ("limit", limit.as_str())])
    }

    /// Sends a GET request while holding a concurrency permit
    async fn send(&self, url: Url) -> Result<Response> {
        let _permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| ArchiverError::Task(format!("Failed to acquire request permit: {}", e)))?;

        debug!(url = %url, "sending request");
        let response = self.client.get(url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.ok();
            return Err(ArchiverError::ServerError {
                message: format!("request to {} has failed", url),
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }

    pub async fn fetch_regex_pvs(&self, regex: &str, limit: usize) -> Result<Vec<String>> {
        let url = self.regex_url(regex, limit)?;
        let response = self.send(url).await?;
        Ok(response.json::<Vec<String>>().await?)
    }

    pub async fn fetch_single(&self, target: &str, query: &QueryModel) -> Result<SingleData> {
        if query.live_only {
            return Ok(SingleData::new(target, Values::default()));
        }

        let url = self.query_url(target, query)?;
        let response = self.send(url).await?;

        let decoded = match self.format {
            DataFormat::Raw => {
                let capacity = query
                    .max_data_points
                    .unwrap_or_else(|| determine_batch_size(query.time_range.duration_seconds()));
                let mut decoder = PbDecoder::new(query.field_name, query.hide_invalid, capacity);

                let mut stream = response.bytes_stream();
                while let Some(chunk) = stream.next().await {
                    decoder.feed(&chunk?)?;
                }
                decoder.finish()?
            }
            DataFormat::Json => {
                let bytes = response.bytes().await?;
                decode_json_response(&bytes)?
            }
        };

        Ok(SingleData::new(target, decoded.values))
    }
}

/// Initial container capacity for a query spanning `duration_seconds`
fn determine_batch_size(duration_seconds: i64) -> usize {
    match duration_seconds {
        d if d <= 5 => 10,
        d if d <= 60 => 30,
        d if d <= 300 => 100,
        _ => 500,
    }
}

#[async_trait]
impl TargetFetcher for ArchiverClient {
    async fn fetch_regex_targets(&self, regex: &str, limit: usize) -> Result<Vec<String>> {
        self.fetch_regex_pvs(regex, limit).await
    }

    async fn fetch_target(&self, target: &str, query: &QueryModel) -> Result<SingleData> {
        self.fetch_single(target, query)
            .await
            .map_err(|e| e.for_target(target))
    }
}
