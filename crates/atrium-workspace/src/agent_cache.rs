//! A small in-memory agent cache with a soft TTL (default five
//! minutes) and simple least-recently-used eviction. The source of truth is
//! always `atrium-storage`; this cache only avoids a round trip on the hot
//! path of dispatching a message to an agent.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use atrium_core::{Agent, AgentId};

struct Entry {
    agent: Agent,
    inserted_at: Instant,
    last_used: Instant,
}

pub struct AgentCache {
    entries: HashMap<AgentId, Entry>,
    capacity: usize,
    soft_ttl: Duration,
}

impl AgentCache {
    pub fn new(capacity: usize, soft_ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            capacity,
            soft_ttl,
        }
    }

    /// Returns the cached agent if present and still within its soft TTL.
    /// A stale-but-present entry counts as a miss so the caller refreshes it.
    pub fn get(&mut self, agent_id: AgentId) -> Option<Agent> {
        let now = Instant::now();
        let stale = self
            .entries
            .get(&agent_id)
            .map(|e| now.duration_since(e.inserted_at) > self.soft_ttl)
            .unwrap_or(true);
        if stale {
            return None;
        }
        let entry = self.entries.get_mut(&agent_id)?;
        entry.last_used = now;
        Some(entry.agent.clone())
    }

    pub fn insert(&mut self, agent: Agent) {
        if self.entries.len() >= self.capacity && !self.entries.contains_key(&agent.id) {
            self.evict_least_recently_used();
        }
        let now = Instant::now();
        self.entries.insert(
            agent.id,
            Entry {
                agent,
                inserted_at: now,
                last_used: now,
            },
        );
    }

    pub fn invalidate(&mut self, agent_id: AgentId) {
        self.entries.remove(&agent_id);
    }

    fn evict_least_recently_used(&mut self) {
        if let Some(&oldest) = self
            .entries
            .iter()
            .min_by_key(|(_, e)| e.last_used)
            .map(|(id, _)| id)
        {
            self.entries.remove(&oldest);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atrium_core::{AgentConfig, AgentStatus, ProjectId};
    use chrono::Utc;

    fn agent() -> Agent {
        Agent {
            id: AgentId::new(),
            project_id: ProjectId::new(),
            name: "reviewer".into(),
            config: AgentConfig {
                system_prompt: "review".into(),
                model: "claude".into(),
                concurrency_limit: 4,
                allowed_tools: vec![],
            },
            status: AgentStatus::Ready,
            in_flight: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn fresh_entry_is_returned() {
        let mut cache = AgentCache::new(4, Duration::from_secs(300));
        let a = agent();
        cache.insert(a.clone());
        assert_eq!(cache.get(a.id).unwrap().id, a.id);
    }

    #[test]
    fn entry_past_soft_ttl_is_a_miss() {
        let mut cache = AgentCache::new(4, Duration::from_millis(5));
        let a = agent();
        cache.insert(a.clone());
        std::thread::sleep(Duration::from_millis(15));
        assert!(cache.get(a.id).is_none());
    }

    #[test]
    fn over_capacity_evicts_least_recently_used() {
        let mut cache = AgentCache::new(1, Duration::from_secs(300));
        let a = agent();
        let b = agent();
        cache.insert(a.clone());
        cache.insert(b.clone());
        assert!(cache.get(a.id).is_none());
        assert!(cache.get(b.id).is_some());
    }
}
