//! Member lifecycle management.
//!
//! The manager starts members by name against one shared registry and keeps
//! track of the ones it started. A member stopped directly through its own
//! handle is dropped from the table the next time the table is read.

use crate::member::{Member, MemberState};
use crate::registry::ClusterRegistry;
use indexmap::IndexMap;
use std::sync::Arc;
use strata_core::{GridError, GridResult, MemberConfig};
use tokio::sync::Mutex;

/// Starts, tracks and stops members sharing one registry
#[derive(Debug)]
pub struct MemberManager {
    registry: Arc<ClusterRegistry>,
    members: Mutex<IndexMap<String, Member>>,
}

impl MemberManager {
    /// Create a manager over `registry`
    #[must_use]
    pub fn new(registry: Arc<ClusterRegistry>) -> Self {
        Self {
            registry,
            members: Mutex::new(IndexMap::new()),
        }
    }

    /// Shared registry
    #[must_use]
    pub fn registry(&self) -> &Arc<ClusterRegistry> {
        &self.registry
    }

    fn prune(members: &mut IndexMap<String, Member>) {
        members.retain(|_, m| m.state() != MemberState::Stopped);
    }

    /// Create and start a member
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a bad config, `MemberNameInUse` if a
    /// running member already has the name, or whatever `start` reports
    pub async fn start_member(&self, config: MemberConfig) -> GridResult<Member> {
        config.validate()?;

        let mut members = self.members.lock().await;
        Self::prune(&mut members);
        if members.contains_key(&config.name) {
            return Err(GridError::MemberNameInUse { name: config.name });
        }

        let member = Member::new(config, Arc::clone(&self.registry))?;
        member.start().await?;
        members.insert(member.name().to_string(), member.clone());
        Ok(member)
    }

    /// Start a member with a generated name and the default endpoint
    ///
    /// # Errors
    ///
    /// See [`MemberManager::start_member`]
    pub async fn start_default(&self) -> GridResult<Member> {
        self.start_member(MemberConfig::default()).await
    }

    /// Stop the member called `name`; false if there is none
    pub async fn stop_member(&self, name: &str) -> bool {
        let member = self.members.lock().await.shift_remove(name);
        match member {
            Some(member) => {
                member.stop().await;
                true
            }
            None => false,
        }
    }

    /// Stop every tracked member
    pub async fn stop_all(&self) {
        let drained: Vec<Member> = {
            let mut members = self.members.lock().await;
            members.drain(..).map(|(_, m)| m).collect()
        };
        let count = drained.len();

        futures::future::join_all(drained.iter().map(Member::stop)).await;
        tracing::info!(count, "all members stopped");
    }

    /// Running members in start order
    pub async fn list_members(&self) -> Vec<Member> {
        let mut members = self.members.lock().await;
        Self::prune(&mut members);
        members.values().cloned().collect()
    }

    /// Running member called `name`
    pub async fn get(&self, name: &str) -> Option<Member> {
        let mut members = self.members.lock().await;
        Self::prune(&mut members);
        members.get(name).cloned()
    }
}

impl Default for MemberManager {
    fn default() -> Self {
        Self::new(Arc::new(ClusterRegistry::new()))
    }
}
