use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::{error::RemoteError, remote::RemoteSource};

#[derive(Clone)]
struct Route {
    reply: Result<Value, RemoteError>,
    delay: Duration,
}

// Unscripted paths answer 404.
#[derive(Default)]
pub struct FakeRemote {
    routes: Mutex<HashMap<String, Route>>,
    calls: Mutex<Vec<(String, Option<Value>)>>,
}

impl FakeRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, path: &str, value: Value) {
        self.respond_after(path, value, Duration::ZERO);
    }

    pub fn respond_after(&self, path: &str, value: Value, delay: Duration) {
        self.routes.lock().insert(
            path.to_string(),
            Route {
                reply: Ok(value),
                delay,
            },
        );
    }

    pub fn fail(&self, path: &str, error: RemoteError) {
        self.routes.lock().insert(
            path.to_string(),
            Route {
                reply: Err(error),
                delay: Duration::ZERO,
            },
        );
    }

    pub fn calls(&self, path: &str) -> usize {
        self.calls.lock().iter().filter(|(hit, _)| hit == path).count()
    }

    pub fn last_body(&self, path: &str) -> Option<Value> {
        self.calls
            .lock()
            .iter()
            .rev()
            .find(|(hit, _)| hit == path)
            .and_then(|(_, body)| body.clone())
    }

    async fn answer(&self, path: &str, body: Option<Value>) -> Result<Value, RemoteError> {
        self.calls.lock().push((path.to_string(), body));
        let route = self.routes.lock().get(path).cloned();
        let Some(route) = route else {
            return Err(RemoteError::Status {
                path: path.to_string(),
                status: 404,
            });
        };
        if !route.delay.is_zero() {
            tokio::time::sleep(route.delay).await;
        }
        route.reply
    }
}

#[async_trait]
impl RemoteSource for FakeRemote {
    async fn get(&self, path: &str) -> Result<Value, RemoteError> {
        self.answer(path, None).await
    }

    async fn post(&self, path: &str, body: Option<Value>) -> Result<Value, RemoteError> {
        self.answer(path, body).await
    }

    async fn put(&self, path: &str, body: Value) -> Result<Value, RemoteError> {
        self.answer(path, Some(body)).await
    }
}

pub fn transport_down() -> RemoteError {
    RemoteError::Transport("connection refused".to_string())
}
