use std::sync::Arc;

use futures::{FutureExt, future::BoxFuture, stream::BoxStream};
use reqwest::{Client, StatusCode, header};
use serde::Deserialize;
use serde_json::Value;

use super::{
    config::RestConfig,
    error::{RestDaoError, RestResult},
    stream::watch_stream,
};
use crate::dao::{
    storage::{StoreError, StoreResult},
    store::{SharedStore, TransactionUpdater},
};

/// Maximum compare-and-set attempts before a transaction gives up.
const MAX_CAS_ATTEMPTS: u32 = 10;
/// Request header asking the store to include an ETag on reads.
const ETAG_REQUEST_HEADER: &str = "X-Firebase-ETag";

/// REST client for an RTDB-compatible hosted store.
#[derive(Clone)]
pub struct RestStore {
    client: Client,
    base_url: Arc<str>,
    auth_token: Option<Arc<str>>,
}

impl RestStore {
    /// Build a store client from the configuration.
    pub fn connect(config: RestConfig) -> RestResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| RestDaoError::ClientBuilder { source })?;

        Ok(Self {
            client,
            base_url: Arc::from(config.base_url.trim_end_matches('/')),
            auth_token: config.auth_token.map(Arc::from),
        })
    }

    fn url(&self, path: &str) -> String {
        build_url(&self.base_url, path, self.auth_token.as_deref())
    }

    async fn send_value(
        client: Client,
        url: String,
        path: String,
        method: reqwest::Method,
        body: Option<Value>,
    ) -> RestResult<Value> {
        let mut request = client.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await.map_err(|source| RestDaoError::RequestSend {
            path: path.clone(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RestDaoError::RequestStatus { path, status });
        }
        response
            .json()
            .await
            .map_err(|source| RestDaoError::DecodeResponse { path, source })
    }

    async fn read_with_etag(
        client: Client,
        url: String,
        path: String,
    ) -> RestResult<(Value, String)> {
        let response = client
            .get(&url)
            .header(ETAG_REQUEST_HEADER, "true")
            .send()
            .await
            .map_err(|source| RestDaoError::RequestSend {
                path: path.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RestDaoError::RequestStatus { path, status });
        }

        let etag = response
            .headers()
            .get(header::ETAG)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned)
            .ok_or_else(|| RestDaoError::MissingEtag { path: path.clone() })?;

        let value = response
            .json()
            .await
            .map_err(|source| RestDaoError::DecodeResponse { path, source })?;
        Ok((value, etag))
    }
}

/// Body of a successful `POST` (push) response.
#[derive(Deserialize)]
struct PushResponse {
    name: String,
}

impl SharedStore for RestStore {
    fn get(&self, path: &str) -> BoxFuture<'static, StoreResult<Value>> {
        let client = self.client.clone();
        let url = self.url(path);
        let path = path.to_string();
        async move {
            Self::send_value(client, url, path, reqwest::Method::GET, None)
                .await
                .map_err(StoreError::from)
        }
        .boxed()
    }

    fn set(&self, path: &str, value: Value) -> BoxFuture<'static, StoreResult<()>> {
        let client = self.client.clone();
        let url = self.url(path);
        let path = path.to_string();
        let (method, body) = if value.is_null() {
            (reqwest::Method::DELETE, None)
        } else {
            (reqwest::Method::PUT, Some(value))
        };
        async move {
            Self::send_value(client, url, path, method, body)
                .await
                .map(|_| ())
                .map_err(StoreError::from)
        }
        .boxed()
    }

    fn push(&self, path: &str, value: Value) -> BoxFuture<'static, StoreResult<String>> {
        let client = self.client.clone();
        let url = self.url(path);
        let path = path.to_string();
        async move {
            let body =
                Self::send_value(client, url, path.clone(), reqwest::Method::POST, Some(value))
                    .await
                    .map_err(StoreError::from)?;
            let response: PushResponse = serde_json::from_value(body)
                .map_err(|source| StoreError::Codec { path, source })?;
            Ok(response.name)
        }
        .boxed()
    }

    fn transaction(
        &self,
        path: &str,
        updater: TransactionUpdater,
    ) -> BoxFuture<'static, StoreResult<()>> {
        let client = self.client.clone();
        let url = self.url(path);
        let path = path.to_string();
        async move {
            for _ in 0..MAX_CAS_ATTEMPTS {
                let (current, etag) =
                    Self::read_with_etag(client.clone(), url.clone(), path.clone())
                        .await
                        .map_err(StoreError::from)?;
                let next = updater(current);

                let response = client
                    .put(&url)
                    .header(header::IF_MATCH, etag.as_str())
                    .json(&next)
                    .send()
                    .await
                    .map_err(|source| {
                        StoreError::from(RestDaoError::RequestSend {
                            path: path.clone(),
                            source,
                        })
                    })?;

                match response.status() {
                    status if status.is_success() => return Ok(()),
                    StatusCode::PRECONDITION_FAILED => continue,
                    status => {
                        return Err(RestDaoError::RequestStatus {
                            path: path.clone(),
                            status,
                        }
                        .into());
                    }
                }
            }
            Err(RestDaoError::CasExhausted {
                path,
                attempts: MAX_CAS_ATTEMPTS,
            }
            .into())
        }
        .boxed()
    }

    fn watch(&self, path: &str) -> BoxStream<'static, StoreResult<Value>> {
        watch_stream(self.client.clone(), self.url(path), path.to_string())
    }
}

fn build_url(base_url: &str, path: &str, auth_token: Option<&str>) -> String {
    let trimmed = path.trim_matches('/');
    match auth_token {
        Some(token) => format!("{base_url}/{trimmed}.json?auth={token}"),
        None => format!("{base_url}/{trimmed}.json"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_address_json_documents() {
        assert_eq!(
            build_url("https://store.example", "tracks/p1", None),
            "https://store.example/tracks/p1.json"
        );
        assert_eq!(
            build_url("https://store.example", "/tracks/p1/", Some("tok")),
            "https://store.example/tracks/p1.json?auth=tok"
        );
    }
}
