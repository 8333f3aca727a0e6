use std::collections::HashMap;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PendingCommand {
    #[serde(rename = "targetState")]
    pub target_state: bool,
    #[serde(rename = "issuedAtMs")]
    pub issued_at_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    AlreadyPending,
    Offline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserveOutcome {
    Confirmed(bool),
    Held,
    Applied(bool),
    Unchanged,
}

#[derive(Debug, Clone)]
pub struct CommandLedger {
    settle_ms: u64,
    pending: HashMap<String, PendingCommand>,
    applied: HashMap<String, bool>,
}

impl CommandLedger {
    pub fn new(settle_ms: u64) -> Self {
        Self {
            settle_ms,
            pending: HashMap::new(),
            applied: HashMap::new(),
        }
    }

    pub fn settle_ms(&self) -> u64 {
        self.settle_ms
    }

    pub fn begin(
        &mut self,
        actuator_id: &str,
        target_state: bool,
        is_online: bool,
        now_ms: u64,
    ) -> Result<PendingCommand, Rejection> {
        if self.pending.contains_key(actuator_id) {
            return Err(Rejection::AlreadyPending);
        }
        if !is_online {
            return Err(Rejection::Offline);
        }
        let command = PendingCommand {
            target_state,
            issued_at_ms: now_ms,
        };
        self.pending.insert(actuator_id.to_string(), command);
        Ok(command)
    }

    pub fn pending(&self, actuator_id: &str) -> Option<PendingCommand> {
        self.pending.get(actuator_id).copied()
    }

    pub fn deadline_ms(&self, actuator_id: &str) -> Option<u64> {
        self.pending
            .get(actuator_id)
            .map(|command| command.issued_at_ms.saturating_add(self.settle_ms))
    }

    pub fn applied(&self, actuator_id: &str) -> Option<bool> {
        self.applied.get(actuator_id).copied()
    }

    // Without a pending command every poll is adopted.
    pub fn observe(&mut self, actuator_id: &str, observed: bool) -> ObserveOutcome {
        if let Some(command) = self.pending.get(actuator_id).copied() {
            if observed != command.target_state {
                return ObserveOutcome::Held;
            }
            self.pending.remove(actuator_id);
            self.applied.insert(actuator_id.to_string(), observed);
            return ObserveOutcome::Confirmed(observed);
        }

        match self.applied.insert(actuator_id.to_string(), observed) {
            Some(previous) if previous == observed => ObserveOutcome::Unchanged,
            _ => ObserveOutcome::Applied(observed),
        }
    }

    pub fn settle(&mut self, actuator_id: &str, now_ms: u64) -> Option<bool> {
        let deadline = self.deadline_ms(actuator_id)?;
        if now_ms < deadline {
            return None;
        }
        let command = self.pending.remove(actuator_id)?;
        self.applied
            .insert(actuator_id.to_string(), command.target_state);
        Some(command.target_state)
    }

    pub fn settle_overdue(&mut self, now_ms: u64) -> Vec<(String, bool)> {
        let overdue: Vec<String> = self
            .pending
            .iter()
            .filter(|(_, command)| now_ms >= command.issued_at_ms.saturating_add(self.settle_ms))
            .map(|(id, _)| id.clone())
            .collect();

        overdue
            .into_iter()
            .filter_map(|id| self.settle(&id, now_ms).map(|state| (id, state)))
            .collect()
    }

    pub fn rollback(&mut self, actuator_id: &str) -> bool {
        self.pending.remove(actuator_id).is_some()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger_showing(actuator: &str, state: bool) -> CommandLedger {
        let mut ledger = CommandLedger::new(1_000);
        ledger.observe(actuator, state);
        ledger
    }

    #[test]
    fn confirming_poll_resolves_before_settle_window() {
        let mut ledger = ledger_showing("porch", false);
        ledger.begin("porch", true, true, 0).unwrap();

        assert_eq!(ledger.observe("porch", true), ObserveOutcome::Confirmed(true));
        assert_eq!(ledger.applied("porch"), Some(true));
        assert_eq!(ledger.pending("porch"), None);
        assert_eq!(ledger.settle("porch", 1_000), None);
    }

    #[test]
    fn unconfirmed_target_is_committed_at_settle_boundary() {
        let mut ledger = ledger_showing("porch", true);
        ledger.begin("porch", false, true, 0).unwrap();

        assert_eq!(ledger.observe("porch", true), ObserveOutcome::Held);
        assert_eq!(ledger.settle("porch", 999), None);
        assert_eq!(ledger.applied("porch"), Some(true));

        assert_eq!(ledger.settle("porch", 1_000), Some(false));
        assert_eq!(ledger.applied("porch"), Some(false));
        assert_eq!(ledger.pending_count(), 0);
    }

    #[test]
    fn second_toggle_is_rejected_while_pending() {
        let mut ledger = CommandLedger::new(1_000);
        ledger.begin("porch", true, true, 0).unwrap();

        assert_eq!(
            ledger.begin("porch", false, true, 10),
            Err(Rejection::AlreadyPending)
        );
        assert_eq!(ledger.pending("porch").map(|c| c.target_state), Some(true));
    }

    #[test]
    fn offline_actuator_is_rejected() {
        let mut ledger = CommandLedger::new(1_000);
        assert_eq!(ledger.begin("porch", true, false, 0), Err(Rejection::Offline));
        assert_eq!(ledger.pending_count(), 0);
    }

    #[test]
    fn rollback_leaves_displayed_state_alone() {
        let mut ledger = ledger_showing("porch", false);
        ledger.begin("porch", true, true, 0).unwrap();

        assert!(ledger.rollback("porch"));
        assert!(!ledger.rollback("porch"));
        assert_eq!(ledger.applied("porch"), Some(false));
        assert_eq!(ledger.settle("porch", 5_000), None);
    }

    #[test]
    fn unconfirmed_commit_yields_to_next_poll() {
        let mut ledger = ledger_showing("porch", false);
        ledger.begin("porch", true, true, 0).unwrap();
        ledger.settle("porch", 1_000);
        assert_eq!(ledger.applied("porch"), Some(true));

        assert_eq!(ledger.observe("porch", false), ObserveOutcome::Applied(false));
        assert_eq!(ledger.applied("porch"), Some(false));
        assert_eq!(ledger.observe("porch", false), ObserveOutcome::Unchanged);
    }

    #[test]
    fn settle_overdue_only_touches_expired_commands() {
        let mut ledger = CommandLedger::new(1_000);
        ledger.begin("porch", true, true, 0).unwrap();
        ledger.begin("ceiling", false, true, 600).unwrap();

        assert_eq!(ledger.settle_overdue(1_200), vec![("porch".to_string(), true)]);
        assert_eq!(ledger.deadline_ms("ceiling"), Some(1_600));
    }
}
