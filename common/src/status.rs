use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::{
    snapshot::is_stale,
    types::{relay_is_on, DeviceConfig, RelayStates},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ButtonIndexEntry {
    #[serde(rename = "deviceId")]
    pub device_id: String,
    #[serde(rename = "relayIndex")]
    pub relay_index: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceStatusEntry {
    pub is_online: bool,
    pub relay_states: RelayStates,
    pub last_update_ms: Option<u64>,
    pub is_updating: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OnlineStatusView {
    #[serde(rename = "isOnline")]
    pub is_online: bool,
    #[serde(rename = "isStale")]
    pub is_stale: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelayStatesView {
    pub states: RelayStates,
    #[serde(rename = "isStale")]
    pub is_stale: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ButtonState {
    pub state: bool,
    #[serde(rename = "isStale")]
    pub is_stale: bool,
}

impl ButtonState {
    pub const UNKNOWN: Self = Self {
        state: false,
        is_stale: true,
    };
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ButtonStatus {
    pub state: bool,
    #[serde(rename = "isStale")]
    pub is_stale: bool,
    #[serde(rename = "deviceId")]
    pub device_id: String,
    #[serde(rename = "isOnline")]
    pub is_online: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceStatusView {
    #[serde(rename = "isOnline")]
    pub is_online: bool,
    #[serde(rename = "relayStates")]
    pub relay_states: RelayStates,
    #[serde(rename = "isStale")]
    pub is_stale: bool,
}

#[derive(Debug, Clone)]
pub struct DeviceStatusTable {
    ttl_ms: u64,
    entries: HashMap<String, DeviceStatusEntry>,
    buttons: HashMap<String, ButtonIndexEntry>,
}

impl DeviceStatusTable {
    pub fn new(ttl_ms: u64) -> Self {
        Self {
            ttl_ms,
            entries: HashMap::new(),
            buttons: HashMap::new(),
        }
    }

    pub fn ttl_ms(&self) -> u64 {
        self.ttl_ms
    }

    pub fn rebuild_index(&mut self, devices: &[DeviceConfig]) -> usize {
        self.buttons.clear();
        for device in devices {
            for button in &device.buttons {
                self.buttons.insert(
                    button.id.clone(),
                    ButtonIndexEntry {
                        device_id: device.id.clone(),
                        relay_index: button.relay_index,
                    },
                );
            }
        }
        self.buttons.len()
    }

    pub fn button_mapping(&self, button_id: &str) -> Option<&ButtonIndexEntry> {
        self.buttons.get(button_id)
    }

    pub fn buttons_on_device(&self, device_id: &str) -> Vec<(String, usize)> {
        self.buttons
            .iter()
            .filter(|(_, mapping)| mapping.device_id == device_id)
            .map(|(button_id, mapping)| (button_id.clone(), mapping.relay_index))
            .collect()
    }

    pub fn entry(&self, device_id: &str) -> Option<&DeviceStatusEntry> {
        self.entries.get(device_id)
    }

    pub fn begin_refresh(&mut self, device_id: &str) -> bool {
        let entry = self.entries.entry(device_id.to_string()).or_default();
        if entry.is_updating {
            return false;
        }
        entry.is_updating = true;
        true
    }

    pub fn end_refresh(&mut self, device_id: &str) {
        if let Some(entry) = self.entries.get_mut(device_id) {
            entry.is_updating = false;
        }
    }

    pub fn record_success(
        &mut self,
        device_id: &str,
        is_online: bool,
        relay_states: RelayStates,
        now_ms: u64,
    ) -> bool {
        self.write(device_id, is_online, relay_states, now_ms)
    }

    // A failed poll is stamped as offline with no relays.
    pub fn record_failure(&mut self, device_id: &str, now_ms: u64) -> bool {
        self.write(device_id, false, Vec::new(), now_ms)
    }

    fn write(
        &mut self,
        device_id: &str,
        is_online: bool,
        relay_states: RelayStates,
        now_ms: u64,
    ) -> bool {
        let entry = self.entries.entry(device_id.to_string()).or_default();
        let changed = entry.is_online != is_online || entry.relay_states != relay_states;
        entry.is_online = is_online;
        entry.relay_states = relay_states;
        entry.last_update_ms = Some(now_ms);
        changed
    }

    fn entry_is_stale(&self, entry: &DeviceStatusEntry, now_ms: u64) -> bool {
        is_stale(entry.last_update_ms, now_ms, self.ttl_ms)
    }

    pub fn online_status(&self, device_id: &str, now_ms: u64) -> OnlineStatusView {
        match self.entries.get(device_id) {
            Some(entry) => OnlineStatusView {
                is_online: entry.is_online,
                is_stale: self.entry_is_stale(entry, now_ms),
            },
            None => OnlineStatusView {
                is_online: false,
                is_stale: true,
            },
        }
    }

    pub fn relay_states(&self, device_id: &str, now_ms: u64) -> RelayStatesView {
        match self.entries.get(device_id) {
            Some(entry) => RelayStatesView {
                states: entry.relay_states.clone(),
                is_stale: self.entry_is_stale(entry, now_ms),
            },
            None => RelayStatesView {
                states: Vec::new(),
                is_stale: true,
            },
        }
    }

    pub fn button_state(&self, button_id: &str, now_ms: u64) -> ButtonState {
        let Some(mapping) = self.buttons.get(button_id) else {
            return ButtonState::UNKNOWN;
        };
        let Some(entry) = self.entries.get(&mapping.device_id) else {
            return ButtonState::UNKNOWN;
        };
        ButtonState {
            state: relay_is_on(&entry.relay_states, mapping.relay_index),
            is_stale: self.entry_is_stale(entry, now_ms),
        }
    }

    pub fn button_online(&self, button_id: &str) -> bool {
        self.buttons
            .get(button_id)
            .and_then(|mapping| self.entries.get(&mapping.device_id))
            .map(|entry| entry.is_online)
            .unwrap_or(false)
    }

    pub fn all_button_states(&self, now_ms: u64) -> BTreeMap<String, ButtonStatus> {
        self.buttons
            .iter()
            .map(|(button_id, mapping)| {
                let entry = self.entries.get(&mapping.device_id);
                let status = ButtonStatus {
                    state: entry
                        .map(|entry| relay_is_on(&entry.relay_states, mapping.relay_index))
                        .unwrap_or(false),
                    is_stale: entry
                        .map(|entry| self.entry_is_stale(entry, now_ms))
                        .unwrap_or(true),
                    device_id: mapping.device_id.clone(),
                    is_online: entry.map(|entry| entry.is_online).unwrap_or(false),
                };
                (button_id.clone(), status)
            })
            .collect()
    }

    pub fn all_device_states(&self, now_ms: u64) -> BTreeMap<String, DeviceStatusView> {
        self.entries
            .iter()
            .map(|(device_id, entry)| {
                let view = DeviceStatusView {
                    is_online: entry.is_online,
                    relay_states: entry.relay_states.clone(),
                    is_stale: self.entry_is_stale(entry, now_ms),
                };
                (device_id.clone(), view)
            })
            .collect()
    }
}
