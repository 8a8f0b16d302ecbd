//! In-memory fakes for storage traits (testing only).
//!
//! `MemoryAgentStore` satisfies the `AgentStore` contract without any
//! external dependencies, including the lease semantics.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{StateError, StateResult};
use crate::records::{AgentState, IterationOutcome, LeaseToken, TaskRecord, TaskStatus};
use crate::store_traits::AgentStore;

/// In-memory agent/task store backed by mutex-guarded maps.
#[derive(Debug, Default)]
pub struct MemoryAgentStore {
    agents: Mutex<HashMap<String, AgentState>>,
    tasks: Mutex<HashMap<String, TaskRecord>>,
    outcomes: Mutex<Vec<IterationOutcome>>,
    leases: Mutex<HashMap<String, LeaseToken>>,
}

impl MemoryAgentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an agent record.
    pub fn seed_agent(&self, agent: AgentState) {
        self.agents.lock().unwrap().insert(agent.id.clone(), agent);
    }

    /// Seed a task record.
    pub fn seed_task(&self, task: TaskRecord) {
        self.tasks.lock().unwrap().insert(task.id.clone(), task);
    }
}

#[async_trait]
impl AgentStore for MemoryAgentStore {
    async fn load_agent(&self, agent_id: &str) -> StateResult<AgentState> {
        self.agents
            .lock()
            .unwrap()
            .get(agent_id)
            .cloned()
            .ok_or_else(|| StateError::AgentNotFound(agent_id.to_string()))
    }

    async fn save_agent(&self, agent: &AgentState) -> StateResult<()> {
        self.agents
            .lock()
            .unwrap()
            .insert(agent.id.clone(), agent.clone());
        Ok(())
    }

    async fn load_tasks(&self, agent_id: &str) -> StateResult<Vec<TaskRecord>> {
        let mut tasks: Vec<TaskRecord> = self
            .tasks
            .lock()
            .unwrap()
            .values()
            .filter(|t| t.agent_id == agent_id)
            .cloned()
            .collect();
        tasks.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(tasks)
    }

    async fn update_task_status(&self, task_id: &str, status: TaskStatus) -> StateResult<()> {
        let mut tasks = self.tasks.lock().unwrap();
        let task = tasks
            .get_mut(task_id)
            .ok_or_else(|| StateError::TaskNotFound(task_id.to_string()))?;
        task.status = status;
        Ok(())
    }

    async fn append_outcome(&self, outcome: IterationOutcome) -> StateResult<()> {
        self.outcomes.lock().unwrap().push(outcome);
        Ok(())
    }

    async fn outcomes(&self, agent_id: &str) -> StateResult<Vec<IterationOutcome>> {
        Ok(self
            .outcomes
            .lock()
            .unwrap()
            .iter()
            .filter(|o| o.agent_id == agent_id)
            .cloned()
            .collect())
    }

    async fn try_acquire_lease(&self, agent_id: &str) -> StateResult<LeaseToken> {
        let mut leases = self.leases.lock().unwrap();
        if leases.contains_key(agent_id) {
            return Err(StateError::LeaseHeld {
                agent_id: agent_id.to_string(),
            });
        }
        let token = LeaseToken::new();
        leases.insert(agent_id.to_string(), token.clone());
        Ok(token)
    }

    async fn release_lease(&self, agent_id: &str, token: &LeaseToken) -> StateResult<()> {
        let mut leases = self.leases.lock().unwrap();
        match leases.get(agent_id) {
            None => Ok(()),
            Some(held) if held == token => {
                leases.remove(agent_id);
                Ok(())
            }
            Some(_) => Err(StateError::StaleLease {
                agent_id: agent_id.to_string(),
            }),
        }
    }
}
