//! Cluster registry: the set of running members and the coordinator flag.
//!
//! Insertion order is join order, so the first entry is always the oldest
//! member still in the cluster.

use crate::member::Member;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strata_core::{GridError, GridResult, MemberId};
use tokio::sync::Mutex;

/// What happens to the coordinator flag when the coordinator leaves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CoordinatorPolicy {
    /// Hand the flag to the oldest remaining member
    #[default]
    ReelectOldest,
    /// Leave the cluster without a coordinator until the next join
    LeaveVacant,
}

/// Shared membership table
///
/// Holds a handle to each member it knows about. Members leave on stop,
/// which also releases the registry's reference to them.
#[derive(Debug, Default)]
pub struct ClusterRegistry {
    members: Mutex<IndexMap<MemberId, Member>>,
    policy: CoordinatorPolicy,
}

impl ClusterRegistry {
    /// Create an empty registry with the default policy
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry with `policy`
    #[must_use]
    pub fn with_policy(policy: CoordinatorPolicy) -> Self {
        Self {
            members: Mutex::new(IndexMap::new()),
            policy,
        }
    }

    /// Coordinator policy
    #[must_use]
    pub fn policy(&self) -> CoordinatorPolicy {
        self.policy
    }

    /// Add a member. The first member to find no coordinator becomes it.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateMember` if the id is already registered
    pub async fn join(&self, member: &Member) -> GridResult<()> {
        let mut members = self.members.lock().await;
        if members.contains_key(&member.id()) {
            return Err(GridError::DuplicateMember { id: member.id() });
        }

        let has_coordinator = members.values().any(Member::is_coordinator);
        members.insert(member.id(), member.clone());
        if !has_coordinator {
            member.set_coordinator(true);
            tracing::info!(member = %member.id(), name = %member.name(), "coordinator elected");
        }

        tracing::debug!(member = %member.id(), size = members.len(), "member joined");
        Ok(())
    }

    /// Remove a member; false if it was not registered
    pub async fn remove(&self, id: MemberId) -> bool {
        let mut members = self.members.lock().await;
        let Some(removed) = members.shift_remove(&id) else {
            return false;
        };

        let was_coordinator = removed.is_coordinator();
        removed.set_coordinator(false);

        if was_coordinator {
            match self.policy {
                CoordinatorPolicy::ReelectOldest => {
                    if let Some(next) = members.values().next() {
                        next.set_coordinator(true);
                        tracing::info!(
                            member = %next.id(),
                            name = %next.name(),
                            "coordinator re-elected"
                        );
                    }
                }
                CoordinatorPolicy::LeaveVacant => {
                    tracing::info!(member = %id, "coordinator left, role vacant");
                }
            }
        }

        tracing::debug!(member = %id, size = members.len(), "member left");
        true
    }

    /// Copy of the member list in join order
    pub async fn snapshot(&self) -> Vec<Member> {
        self.members.lock().await.values().cloned().collect()
    }

    /// Current coordinator, if any
    pub async fn find_coordinator(&self) -> Option<Member> {
        self.members
            .lock()
            .await
            .values()
            .find(|m| m.is_coordinator())
            .cloned()
    }

    /// Sum of catalog sizes across all registered members
    pub async fn aggregate_count(&self) -> usize {
        let mut total = 0;
        for member in self.snapshot().await {
            total += member.catalog_len().await;
        }
        total
    }

    /// Number of distinct collection names across all registered members
    pub async fn distinct_count(&self) -> usize {
        let mut names = indexmap::IndexSet::new();
        for member in self.snapshot().await {
            names.extend(member.catalog_names().await);
        }
        names.len()
    }

    /// Check if a member id is registered
    pub async fn contains(&self, id: MemberId) -> bool {
        self.members.lock().await.contains_key(&id)
    }

    /// Number of registered members
    pub async fn len(&self) -> usize {
        self.members.lock().await.len()
    }

    /// Check if no member is registered
    pub async fn is_empty(&self) -> bool {
        self.members.lock().await.is_empty()
    }
}
