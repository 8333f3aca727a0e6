use std::{future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use serde_json::Value;

use rvdash_common::CommandResponse;

use crate::error::RemoteError;

#[async_trait]
pub trait RemoteSource: Send + Sync {
    async fn get(&self, path: &str) -> Result<Value, RemoteError>;
    async fn post(&self, path: &str, body: Option<Value>) -> Result<Value, RemoteError>;
    async fn put(&self, path: &str, body: Value) -> Result<Value, RemoteError>;
}

pub type SharedRemote = Arc<dyn RemoteSource>;

pub struct HttpRemote {
    base: String,
    client: reqwest::Client,
}

impl HttpRemote {
    pub fn new(base: impl Into<String>, accept_invalid_certs: bool) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()
            .map_err(|err| RemoteError::Transport(err.to_string()))?;
        Ok(Self {
            base: base.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn execute(
        &self,
        path: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<Value, RemoteError> {
        let response = request
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|err| RemoteError::Transport(format!("{path}: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::Status {
                path: path.to_string(),
                status: status.as_u16(),
            });
        }

        response.json::<Value>().await.map_err(|err| RemoteError::Decode {
            path: path.to_string(),
            message: err.to_string(),
        })
    }
}

#[async_trait]
impl RemoteSource for HttpRemote {
    async fn get(&self, path: &str) -> Result<Value, RemoteError> {
        self.execute(path, self.client.get(self.url(path))).await
    }

    async fn post(&self, path: &str, body: Option<Value>) -> Result<Value, RemoteError> {
        let request = self.client.post(self.url(path));
        let request = match body {
            Some(body) => request.json(&body),
            None => request,
        };
        self.execute(path, request).await
    }

    async fn put(&self, path: &str, body: Value) -> Result<Value, RemoteError> {
        self.execute(path, self.client.put(self.url(path)).json(&body))
            .await
    }
}

#[derive(Debug, Clone)]
pub enum Write {
    Post(Option<Value>),
    Put(Value),
}

async fn bounded<F>(path: &str, timeout: Duration, request: F) -> Result<Value, RemoteError>
where
    F: Future<Output = Result<Value, RemoteError>>,
{
    tokio::time::timeout(timeout, request)
        .await
        .map_err(|_| RemoteError::Timeout {
            path: path.to_string(),
            timeout_ms: timeout.as_millis().try_into().unwrap_or(u64::MAX),
        })?
}

pub fn decode<T: DeserializeOwned>(path: &str, value: Value) -> Result<T, RemoteError> {
    serde_json::from_value(value).map_err(|err| RemoteError::Decode {
        path: path.to_string(),
        message: err.to_string(),
    })
}

pub async fn fetch<T: DeserializeOwned>(
    remote: &dyn RemoteSource,
    path: &str,
    timeout: Duration,
) -> Result<T, RemoteError> {
    let value = bounded(path, timeout, remote.get(path)).await?;
    decode(path, value)
}

pub async fn send<T: DeserializeOwned>(
    remote: &dyn RemoteSource,
    path: &str,
    write: Write,
    timeout: Duration,
) -> Result<T, RemoteError> {
    let value = match write {
        Write::Post(body) => bounded(path, timeout, remote.post(path, body)).await?,
        Write::Put(body) => bounded(path, timeout, remote.put(path, body)).await?,
    };
    decode(path, value)
}

pub async fn command(
    remote: &dyn RemoteSource,
    path: &str,
    write: Write,
    timeout: Duration,
) -> Result<(), RemoteError> {
    let response: CommandResponse = send(remote, path, write, timeout).await?;
    if response.success {
        Ok(())
    } else {
        Err(RemoteError::Rejected {
            path: path.to_string(),
            message: response
                .message
                .unwrap_or_else(|| "no reason given".to_string()),
        })
    }
}
