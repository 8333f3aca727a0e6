use std::time::Duration;

use async_trait::async_trait;

use rvdash_common::weather::{weather_now_path, WeatherNowResponse, WeatherReport};

use crate::{
    error::RemoteError,
    remote::{fetch, RemoteSource},
    snapshot_cache::{DomainSource, SnapshotCache},
};

pub struct WeatherSource {
    path: String,
    city: String,
}

impl WeatherSource {
    pub fn new(location: &str, api_key: &str, city: impl Into<String>) -> Self {
        Self {
            path: weather_now_path(location, api_key),
            city: city.into(),
        }
    }
}

#[async_trait]
impl DomainSource for WeatherSource {
    type Value = WeatherReport;

    fn name(&self) -> &'static str {
        "weather"
    }

    async fn fetch(
        &self,
        remote: &dyn RemoteSource,
        timeout: Duration,
    ) -> Result<WeatherReport, RemoteError> {
        let response: WeatherNowResponse = fetch(remote, &self.path, timeout).await?;
        response
            .into_report(&self.city)
            .map_err(|err| RemoteError::Rejected {
                path: "weather/now".to_string(),
                message: err.to_string(),
            })
    }
}

pub type WeatherCache = SnapshotCache<WeatherSource>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{clock::Clock, testing::FakeRemote};
    use rvdash_common::SnapshotCacheConfig;
    use serde_json::json;

    fn cache(remote: &std::sync::Arc<FakeRemote>) -> WeatherCache {
        SnapshotCache::new(
            WeatherSource::new("101010100", "secret", "Beijing"),
            remote.clone(),
            SnapshotCacheConfig::weather(),
            Duration::from_millis(5_000),
            Clock::new(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn report_is_cached_for_ten_minutes() {
        let remote = FakeRemote::new();
        remote.respond(
            "/v7/weather/now?location=101010100&key=secret",
            json!({"code": "200", "now": {"temp": "3", "feelsLike": "-1", "text": "Snow",
                   "icon": "400", "humidity": "80", "windSpeed": "12"}}),
        );
        let cache = cache(&remote);

        cache.refresh().await;
        assert_eq!(cache.value().map(|r| r.feels_like), Some(-1));

        tokio::time::sleep(Duration::from_secs(9 * 60)).await;
        assert!(!cache.is_stale());
    }

    #[tokio::test(start_paused = true)]
    async fn service_error_code_keeps_cache_empty() {
        let remote = FakeRemote::new();
        remote.respond(
            "/v7/weather/now?location=101010100&key=secret",
            json!({"code": "402"}),
        );
        let cache = cache(&remote);

        cache.refresh().await;
        assert!(cache.value().is_none());
    }
}
