use std::{sync::Arc, time::Duration};

use rvdash_common::ClientConfig;

use crate::{
    clock::Clock,
    config_cache::ConfigCache,
    error::RemoteError,
    heater::{HeaterCache, HeaterSource},
    pms::{PmsCache, PmsSource},
    reconciler::ButtonReconciler,
    remote::{HttpRemote, SharedRemote},
    sensors::WaterTanks,
    snapshot_cache::SnapshotCache,
    status_cache::DeviceStatusCache,
    weather::{WeatherCache, WeatherSource},
};

pub struct Dashboard {
    pub config: ConfigCache,
    pub devices: DeviceStatusCache,
    pub buttons: ButtonReconciler,
    pub pms: PmsCache,
    pub heater: HeaterCache,
    pub tanks: WaterTanks,
    pub weather: Option<WeatherCache>,
}

impl Dashboard {
    pub fn connect(settings: &ClientConfig) -> Result<Self, RemoteError> {
        let remote: SharedRemote = Arc::new(HttpRemote::new(
            settings.api_base.clone(),
            settings.accept_invalid_certs,
        )?);
        let weather_remote = match &settings.weather {
            Some(weather) => {
                let remote: SharedRemote =
                    Arc::new(HttpRemote::new(weather.endpoint.clone(), false)?);
                Some(remote)
            }
            None => None,
        };
        Ok(Self::new(settings, remote, weather_remote))
    }

    pub fn new(
        settings: &ClientConfig,
        remote: SharedRemote,
        weather_remote: Option<SharedRemote>,
    ) -> Self {
        let clock = Clock::new();
        let timeout = Duration::from_millis(settings.request_timeout_ms);

        let config = ConfigCache::new(Arc::clone(&remote), timeout);
        let devices = DeviceStatusCache::new(
            Arc::clone(&remote),
            config.clone(),
            settings.devices.clone(),
            timeout,
            clock,
        );
        let buttons = ButtonReconciler::new(
            devices.clone(),
            Arc::clone(&remote),
            settings.reconcile.clone(),
            timeout,
            clock,
            Duration::from_millis(settings.devices.notify_debounce_ms),
        );
        let pms = SnapshotCache::new(
            PmsSource,
            Arc::clone(&remote),
            settings.pms.clone(),
            timeout,
            clock,
        );
        let heater = SnapshotCache::new(
            HeaterSource,
            Arc::clone(&remote),
            settings.heater.clone(),
            timeout,
            clock,
        );
        let tanks = WaterTanks::new(
            Arc::clone(&remote),
            &settings.fresh_water,
            &settings.black_water,
            timeout,
            clock,
        );
        let weather = settings
            .weather
            .as_ref()
            .zip(weather_remote)
            .map(|(weather, remote)| {
                SnapshotCache::new(
                    WeatherSource::new(&weather.location, &weather.api_key, weather.city.clone()),
                    remote,
                    weather.cache.clone(),
                    timeout,
                    clock,
                )
            });

        Self {
            config,
            devices,
            buttons,
            pms,
            heater,
            tanks,
            weather,
        }
    }

    pub fn start(&self) {
        self.devices.start();
        self.buttons.start();
        self.pms.start();
        self.heater.start();
        self.tanks.start();
        if let Some(weather) = &self.weather {
            weather.start();
        }
    }

    pub fn stop(&self) {
        self.devices.stop();
        self.buttons.shutdown();
        self.pms.stop();
        self.heater.stop();
        self.tanks.stop();
        if let Some(weather) = &self.weather {
            weather.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeRemote;
    use rvdash_common::{
        endpoints::{
            device_online_status, device_relay_state, PATH_DEVICES, PATH_FRESH_WATER_LEVEL,
            PATH_HEATER_STATUS, PATH_PMS_RAW_FRAMES, PATH_PMS_STATUS, PATH_ROOMS,
        },
        WeatherConfig,
    };
    use serde_json::json;

    #[tokio::test(start_paused = true)]
    async fn started_dashboard_polls_every_domain_until_stopped() {
        let remote = FakeRemote::new();
        remote.respond(PATH_ROOMS, json!({"rooms": []}));
        remote.respond(
            PATH_DEVICES,
            json!([{"id": "d1", "name": "Board", "type": "relay", "buttons": [
                {"id": "b1", "name": "Ceiling", "relayIndex": 0}
            ]}]),
        );
        remote.respond(&device_online_status("d1"), json!({"isOnline": true}));
        remote.respond(&device_relay_state("d1"), json!([1]));
        remote.respond(PATH_PMS_RAW_FRAMES, json!({}));
        remote.respond(
            PATH_PMS_STATUS,
            json!({"bms": {"soc": 50.0, "voltage": 51.0, "current": 0.0, "temperature": 20.0,
                           "faultLevel": 0}, "timestamp": 0}),
        );
        remote.respond(PATH_HEATER_STATUS, json!({"success": false, "message": "offline"}));
        remote.respond(
            PATH_FRESH_WATER_LEVEL,
            json!({"success": true, "isFresh": true, "updateTime": "",
                   "data": {"level": 40.0, "levelPercentage": 55.0, "timestamp": ""}}),
        );

        let dashboard = Dashboard::new(&ClientConfig::default(), remote.clone(), None);
        dashboard.start();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(dashboard.devices.is_ready());
        assert!(dashboard.buttons.button_view("b1").state);
        assert!(dashboard.pms.status().is_some());
        assert!(dashboard.heater.value().is_none());
        assert_eq!(dashboard.tanks.tanks().len(), 1);
        assert!(dashboard.weather.is_none());

        dashboard.stop();
        let polls = remote.calls(PATH_PMS_STATUS);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(remote.calls(PATH_PMS_STATUS), polls);
    }

    #[tokio::test(start_paused = true)]
    async fn weather_needs_both_settings_and_remote() {
        let remote = FakeRemote::new();
        let mut settings = ClientConfig::default();
        settings.weather = Some(WeatherConfig {
            endpoint: "https://weather.example".to_string(),
            api_key: "key".to_string(),
            location: "loc".to_string(),
            city: "Town".to_string(),
            cache: rvdash_common::SnapshotCacheConfig::weather(),
        });

        let without = Dashboard::new(&settings, remote.clone(), None);
        assert!(without.weather.is_none());

        let with = Dashboard::new(&settings, remote.clone(), Some(remote.clone()));
        assert!(with.weather.is_some());
    }
}
