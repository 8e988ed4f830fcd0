//! Registry of missions that have started but not yet been finalized

use chrono::Utc;
use convoke_core::{RunState, RunningMission};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// In-memory registry of live missions
///
/// Critical sections are short and never span a completion call.
#[derive(Debug, Default)]
pub struct RunningRegistry {
    missions: Mutex<HashMap<String, RunningMission>>,
}

impl RunningRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn missions(&self) -> MutexGuard<'_, HashMap<String, RunningMission>> {
        self.missions.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn register(&self, trace_id: &str, objective: &str) {
        debug!("Registering mission {}", trace_id);
        self.missions().insert(
            trace_id.to_string(),
            RunningMission {
                trace_id: trace_id.to_string(),
                objective: objective.to_string(),
                started_at: Utc::now(),
                state: RunState::Running,
            },
        );
    }

    /// Remove a mission once it has been finalized
    pub fn unregister(&self, trace_id: &str) -> Option<RunningMission> {
        self.missions().remove(trace_id)
    }

    /// True while the mission is registered and not cancelled
    pub fn is_running(&self, trace_id: &str) -> bool {
        self.missions()
            .get(trace_id)
            .is_some_and(|m| m.state == RunState::Running)
    }

    pub fn get(&self, trace_id: &str) -> Option<RunningMission> {
        self.missions().get(trace_id).cloned()
    }

    /// Request cooperative cancellation
    ///
    /// Returns false if the mission is unknown or already cancelled. The
    /// mission loop notices after its current completion call returns.
    ///
    /// The entry is not removed here. It stays listed as cancelled until the
    /// loop persists the trace and calls [`unregister`](Self::unregister), so
    /// a status query never falls into the gap before the trace is on disk.
    pub fn cancel(&self, trace_id: &str) -> bool {
        match self.missions().get_mut(trace_id) {
            Some(mission) if mission.state == RunState::Running => {
                mission.state = RunState::Cancelled;
                info!("Cancellation requested for mission {}", trace_id);
                true
            }
            _ => false,
        }
    }

    /// Registered missions, oldest first
    pub fn list_running(&self) -> Vec<RunningMission> {
        let mut missions: Vec<_> = self.missions().values().cloned().collect();
        missions.sort_by(|a, b| a.started_at.cmp(&b.started_at).then_with(|| a.trace_id.cmp(&b.trace_id)));
        missions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle() {
        let registry = RunningRegistry::new();
        registry.register("m1", "objective");
        assert!(registry.is_running("m1"));
        assert_eq!(registry.list_running().len(), 1);

        assert!(registry.cancel("m1"));
        assert!(!registry.is_running("m1"));
        assert_eq!(registry.get("m1").unwrap().state, RunState::Cancelled);
        assert!(!registry.cancel("m1"), "second cancel is a no-op");

        assert!(registry.unregister("m1").is_some());
        assert!(registry.get("m1").is_none());
        assert!(!registry.cancel("m1"));
    }

    #[test]
    fn test_cancelled_entry_kept_until_unregistered() {
        let registry = RunningRegistry::new();
        registry.register("m1", "first");
        registry.register("m2", "second");

        assert!(registry.cancel("m1"));
        let listed = registry.list_running();
        assert_eq!(listed.len(), 2);
        assert!(listed
            .iter()
            .any(|m| m.trace_id == "m1" && m.state == RunState::Cancelled));

        registry.unregister("m1");
        assert_eq!(registry.list_running().len(), 1);
        assert!(registry.is_running("m2"));
    }

    #[test]
    fn test_unknown_mission_not_running() {
        let registry = RunningRegistry::new();
        assert!(!registry.is_running("ghost"));
        assert!(registry.unregister("ghost").is_none());
    }
}
