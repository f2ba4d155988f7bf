// HTTP implementation of the table client against the hosted backend's
// JSON API. Project credentials travel as headers on every request; the
// envelope's success flag is passed through untouched for the services to
// interpret. No retries or local recovery at this layer.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;

use crate::client::{
    BulkResponse, ClientConfig, FetchResponse, QueryParams, Record, RecordResponse, TableClient,
};
use crate::error::ServiceError;

const PROJECT_HEADER: &str = "x-project-id";
const KEY_HEADER: &str = "x-public-key";

pub struct HttpTableClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl HttpTableClient {
    pub fn new(config: ClientConfig) -> Result<Self, ServiceError> {
        if config.base_url.is_empty() {
            return Err(ServiceError::Config("base URL is empty".to_string()));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|err| ServiceError::Config(err.to_string()))?;
        Ok(Self { http, config })
    }

    pub fn from_env() -> Result<Self, ServiceError> {
        Self::new(ClientConfig::from_env()?)
    }

    fn url(&self, table: &str, suffix: &str) -> String {
        format!(
            "{}/api/v1/tables/{}/records{}",
            self.config.base_url.trim_end_matches('/'),
            table,
            suffix
        )
    }

    async fn send<B: Serialize, R: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        url: String,
        body: &B,
    ) -> Result<R, ServiceError> {
        let response = self
            .http
            .request(method, url)
            .header(PROJECT_HEADER, &self.config.project_id)
            .header(KEY_HEADER, &self.config.public_key)
            .json(body)
            .send()
            .await
            .map_err(|err| ServiceError::Network(err.to_string()))?;

        response
            .json::<R>()
            .await
            .map_err(|err| ServiceError::Network(format!("malformed response: {}", err)))
    }
}

#[async_trait]
impl TableClient for HttpTableClient {
    async fn fetch_records(
        &self,
        table: &str,
        params: QueryParams,
    ) -> Result<FetchResponse, ServiceError> {
        self.send(reqwest::Method::POST, self.url(table, "/fetch"), &params)
            .await
    }

    async fn get_record_by_id(
        &self,
        table: &str,
        id: i64,
        params: QueryParams,
    ) -> Result<RecordResponse, ServiceError> {
        self.send(
            reqwest::Method::POST,
            self.url(table, &format!("/{}/fetch", id)),
            &params,
        )
        .await
    }

    async fn create_records(
        &self,
        table: &str,
        records: Vec<Record>,
    ) -> Result<BulkResponse, ServiceError> {
        self.send(
            reqwest::Method::POST,
            self.url(table, ""),
            &json!({ "records": records }),
        )
        .await
    }

    async fn update_records(
        &self,
        table: &str,
        records: Vec<Record>,
    ) -> Result<BulkResponse, ServiceError> {
        self.send(
            reqwest::Method::PATCH,
            self.url(table, ""),
            &json!({ "records": records }),
        )
        .await
    }

    async fn delete_records(
        &self,
        table: &str,
        ids: Vec<i64>,
    ) -> Result<BulkResponse, ServiceError> {
        self.send(
            reqwest::Method::DELETE,
            self.url(table, ""),
            &json!({ "RecordIds": ids }),
        )
        .await
    }
}
