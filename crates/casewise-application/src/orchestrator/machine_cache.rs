use casewise_core::flow::{FlowState, FlowStateMachine};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// A flow machine shared by every action on one session.
///
/// Holding its lock serialises those actions.
pub type SharedMachine = Arc<Mutex<FlowStateMachine>>;

/// In-memory map of live flow machines, keyed by session id.
///
/// The map lock is only held long enough to clone an entry out.
#[derive(Default)]
pub struct MachineCache {
    machines: RwLock<HashMap<String, SharedMachine>>,
}

impl MachineCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, session_id: &str) -> Option<SharedMachine> {
        let machines = self.machines.read().await;
        machines.get(session_id).cloned()
    }

    pub async fn insert(&self, session_id: String, machine: FlowStateMachine) -> SharedMachine {
        let shared = Arc::new(Mutex::new(machine));
        let mut machines = self.machines.write().await;
        machines.insert(session_id, shared.clone());
        shared
    }

    /// Returns the cached machine, or caches one resumed at `state`.
    ///
    /// Concurrent callers for the same id all receive the same entry.
    pub async fn get_or_resume(&self, session_id: &str, state: FlowState) -> SharedMachine {
        if let Some(existing) = self.get(session_id).await {
            return existing;
        }
        let mut machines = self.machines.write().await;
        machines
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(FlowStateMachine::resume(state))))
            .clone()
    }

    pub async fn remove(&self, session_id: &str) -> Option<SharedMachine> {
        let mut machines = self.machines.write().await;
        machines.remove(session_id)
    }

    pub async fn len(&self) -> usize {
        self.machines.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
