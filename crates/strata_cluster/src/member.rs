//! Cluster member agent.
//!
//! A member owns its local catalog and a pair of message buses. Creating a
//! collection inserts the entry under the member's own lock and then
//! announces it to every peer the registry knows about at that instant.
//! Inbound announcements materialize an entry only when the name is free.

use crate::bus::{AcceptOutcome, BroadcastReport, BusDirection, CatalogPeer, MessageBus};
use crate::collection::{
    Blueprint, CatalogEntry, DistributedDictionary, DistributedList, DistributedQueue,
    DistributedSet,
};
use crate::message::{CatalogMessage, Message};
use crate::registry::ClusterRegistry;
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use strata_core::descriptor::validate_name;
use strata_core::{
    CollectionDescriptor, GridError, GridKey, GridResult, GridValue, MemberConfig, MemberId,
};
use tokio::sync::{Mutex, watch};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Lifecycle state of a member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberState {
    /// Constructed, never started
    Created,
    /// Buses starting, joining the registry
    Starting,
    /// Serving catalog calls
    Running,
    /// Cancelling and leaving the registry
    Stopping,
    /// Terminal
    Stopped,
}

struct MemberInner {
    id: MemberId,
    config: MemberConfig,
    registry: Arc<ClusterRegistry>,
    state: watch::Sender<MemberState>,
    coordinator: AtomicBool,
    /// Per-member lock; never held across a broadcast
    catalog: Mutex<IndexMap<String, Arc<CatalogEntry>>>,
    inbound: MessageBus,
    outbound: MessageBus,
    shutdown: CancellationToken,
    /// Outstanding broadcasts; `stop` waits for them to drain
    inflight: TaskTracker,
    /// Serializes start/stop
    lifecycle: Mutex<()>,
}

/// One cluster participant
///
/// Cloning is cheap and yields another handle to the same member.
/// Equality and hashing use the member id, never the name.
#[derive(Clone)]
pub struct Member {
    inner: Arc<MemberInner>,
}

impl Member {
    /// Create a member bound to `registry`
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the config does not validate
    pub fn new(config: MemberConfig, registry: Arc<ClusterRegistry>) -> GridResult<Self> {
        Self::with_id(MemberId::new(), config, registry)
    }

    /// Create a member with a fixed id
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the config does not validate
    pub fn with_id(
        id: MemberId,
        config: MemberConfig,
        registry: Arc<ClusterRegistry>,
    ) -> GridResult<Self> {
        config.validate()?;
        let timeout = Duration::from_millis(config.delivery_timeout_ms);
        let (state, _) = watch::channel(MemberState::Created);

        Ok(Self {
            inner: Arc::new(MemberInner {
                id,
                registry,
                state,
                coordinator: AtomicBool::new(false),
                catalog: Mutex::new(IndexMap::new()),
                inbound: MessageBus::new(id, BusDirection::Inbound, timeout),
                outbound: MessageBus::new(id, BusDirection::Outbound, timeout),
                shutdown: CancellationToken::new(),
                inflight: TaskTracker::new(),
                lifecycle: Mutex::new(()),
                config,
            }),
        })
    }

    /// Member id
    #[must_use]
    pub fn id(&self) -> MemberId {
        self.inner.id
    }

    /// Member name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    /// Member configuration
    #[must_use]
    pub fn config(&self) -> &MemberConfig {
        &self.inner.config
    }

    /// Registry this member joins on start
    #[must_use]
    pub fn registry(&self) -> &Arc<ClusterRegistry> {
        &self.inner.registry
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> MemberState {
        *self.inner.state.borrow()
    }

    /// Check if running
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state() == MemberState::Running
    }

    /// Check if this member is the cluster coordinator
    #[must_use]
    pub fn is_coordinator(&self) -> bool {
        self.inner.coordinator.load(Ordering::SeqCst)
    }

    pub(crate) fn set_coordinator(&self, coordinator: bool) {
        self.inner.coordinator.store(coordinator, Ordering::SeqCst);
    }

    fn set_state(&self, state: MemberState) {
        self.inner.state.send_replace(state);
    }

    fn ensure_running(&self) -> GridResult<()> {
        if self.is_running() {
            return Ok(());
        }
        Err(GridError::NotRunning {
            member: self.name().to_string(),
        })
    }

    /// Start the member: buses first, then join the registry.
    ///
    /// The member is already `Running` when it becomes visible in the
    /// registry, so a peer that snapshots it can deliver to it. A no-op
    /// while running. A failed join rolls the member back to `Created`.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateMember` if the id already joined the registry and
    /// `InvalidState` if the member was stopped before
    pub async fn start(&self) -> GridResult<()> {
        let _guard = self.inner.lifecycle.lock().await;

        match self.state() {
            MemberState::Running => return Ok(()),
            MemberState::Stopped => {
                return Err(GridError::InvalidState {
                    reason: format!("member {} was stopped and cannot restart", self.name()),
                });
            }
            _ => {}
        }

        self.set_state(MemberState::Starting);
        self.inner.inbound.start();
        self.inner.outbound.start();
        self.set_state(MemberState::Running);

        if let Err(err) = self.inner.registry.join(self).await {
            self.inner.inbound.stop();
            self.inner.outbound.stop();
            self.set_state(MemberState::Created);
            return Err(err);
        }

        tracing::info!(
            member = %self.id(),
            name = %self.name(),
            endpoint = %self.inner.config.endpoint,
            coordinator = self.is_coordinator(),
            "member started"
        );
        Ok(())
    }

    /// Stop the member.
    ///
    /// Cancels in-flight broadcasts and waits until each of them has
    /// returned, then stops both buses and leaves the registry. A no-op
    /// unless running.
    pub async fn stop(&self) {
        let _guard = self.inner.lifecycle.lock().await;

        if self.state() != MemberState::Running {
            return;
        }

        self.set_state(MemberState::Stopping);
        self.inner.shutdown.cancel();
        self.inner.inflight.close();
        self.inner.inflight.wait().await;

        self.inner.inbound.stop();
        self.inner.outbound.stop();
        self.inner.registry.remove(self.id()).await;
        self.set_coordinator(false);

        self.set_state(MemberState::Stopped);
        tracing::info!(
            member = %self.id(),
            name = %self.name(),
            endpoint = %self.inner.config.endpoint,
            "member stopped"
        );
    }

    /// Resolve once the member reaches `Stopped`
    pub async fn wait_stopped(&self) {
        let mut rx = self.inner.state.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|state| *state == MemberState::Stopped).await;
    }

    /// Get the entry bound to the blueprint's name, creating and announcing
    /// it on a miss.
    ///
    /// At most one local entry exists per name. The entry is visible to
    /// other local callers before the announcement finishes; the call itself
    /// returns only after every peer in the registry snapshot was tried.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a blank name, `NotRunning` outside the
    /// running state and `TypeMismatch` if the name is bound to another shape
    pub async fn get_or_create(&self, blueprint: Blueprint) -> GridResult<Arc<CatalogEntry>> {
        validate_name(blueprint.name())?;
        self.ensure_running()?;

        let (entry, message) = {
            let mut catalog = self.inner.catalog.lock().await;
            if let Some(existing) = catalog.get(blueprint.name()) {
                existing.descriptor().ensure_matches(blueprint.descriptor())?;
                return Ok(Arc::clone(existing));
            }

            let message = CatalogMessage::from_blueprint(self.id(), blueprint);
            let entry = Arc::new(message.materialize());
            catalog.insert(entry.name().to_string(), Arc::clone(&entry));
            (entry, message)
        };

        tracing::debug!(
            member = %self.id(),
            collection = %entry.descriptor(),
            "collection created"
        );

        match self.broadcast(message).await {
            Ok(report) if report.cancelled => {
                tracing::debug!(
                    member = %self.id(),
                    collection = %entry.name(),
                    "announcement cancelled"
                );
            }
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(
                    member = %self.id(),
                    collection = %entry.name(),
                    error = %err,
                    "announcement not sent"
                );
            }
        }

        Ok(entry)
    }

    /// Send a message to every other member in the current registry snapshot
    ///
    /// Stopping the member cancels the fan-out; the report then has
    /// `cancelled` set.
    ///
    /// # Errors
    ///
    /// Returns `NotRunning` if the outbound bus is stopped
    pub async fn broadcast(&self, message: impl Into<Message>) -> GridResult<BroadcastReport> {
        let _inflight = self.inner.inflight.token();
        let message = message.into();
        let peers = self.inner.registry.snapshot().await;
        self.inner
            .outbound
            .send(&peers, &message, &self.inner.shutdown)
            .await
    }

    /// Get or create a dictionary from `K` to `V`
    ///
    /// # Errors
    ///
    /// See [`Member::get_or_create`]
    pub async fn get_dictionary<K: GridKey, V: GridValue>(
        &self,
        name: &str,
    ) -> GridResult<DistributedDictionary<K, V>> {
        let entry = self.get_or_create(Blueprint::dictionary::<K, V>(name)).await?;
        DistributedDictionary::bind(entry)
    }

    /// Get or create a list of `T`
    ///
    /// # Errors
    ///
    /// See [`Member::get_or_create`]
    pub async fn get_list<T: GridValue>(&self, name: &str) -> GridResult<DistributedList<T>> {
        let entry = self.get_or_create(Blueprint::list::<T>(name)).await?;
        DistributedList::bind(entry)
    }

    /// Get or create a queue of `T`
    ///
    /// # Errors
    ///
    /// See [`Member::get_or_create`]
    pub async fn get_queue<T: GridValue>(&self, name: &str) -> GridResult<DistributedQueue<T>> {
        let entry = self.get_or_create(Blueprint::queue::<T>(name)).await?;
        DistributedQueue::bind(entry)
    }

    /// Get or create a set of `T`
    ///
    /// # Errors
    ///
    /// See [`Member::get_or_create`]
    pub async fn get_set<T: GridKey>(&self, name: &str) -> GridResult<DistributedSet<T>> {
        let entry = self.get_or_create(Blueprint::set::<T>(name)).await?;
        DistributedSet::bind(entry)
    }

    /// Number of collections in the local catalog
    pub async fn catalog_len(&self) -> usize {
        self.inner.catalog.lock().await.len()
    }

    /// Check whether a name is bound locally
    pub async fn contains(&self, name: &str) -> bool {
        self.inner.catalog.lock().await.contains_key(name)
    }

    /// Shape of the collection bound to `name`, if any
    pub async fn descriptor_of(&self, name: &str) -> Option<CollectionDescriptor> {
        self.inner
            .catalog
            .lock()
            .await
            .get(name)
            .map(|entry| entry.descriptor().clone())
    }

    /// Locally bound names in creation order
    pub async fn catalog_names(&self) -> Vec<String> {
        self.inner.catalog.lock().await.keys().cloned().collect()
    }
}

#[async_trait]
impl CatalogPeer for Member {
    fn peer_id(&self) -> MemberId {
        self.id()
    }

    async fn accept(&self, message: &Message) -> GridResult<AcceptOutcome> {
        if message.sender() == self.id() {
            return Ok(AcceptOutcome::Ignored);
        }
        self.ensure_running()?;
        self.inner.inbound.ensure_running()?;

        let Message::Catalog(created) = message else {
            tracing::debug!(member = %self.id(), tag = ?message.tag(), "ignoring message");
            return Ok(AcceptOutcome::Ignored);
        };

        let mut catalog = self.inner.catalog.lock().await;
        if let Some(existing) = catalog.get(created.name()) {
            existing.descriptor().ensure_matches(created.descriptor())?;
            return Ok(AcceptOutcome::AlreadyPresent);
        }

        let entry = Arc::new(created.materialize());
        catalog.insert(entry.name().to_string(), entry);
        tracing::debug!(
            member = %self.id(),
            sender = %created.sender(),
            collection = %created.descriptor(),
            "collection materialized"
        );
        Ok(AcceptOutcome::Materialized)
    }
}

impl PartialEq for Member {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Member {}

impl std::hash::Hash for Member {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl std::fmt::Debug for Member {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Member")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("state", &self.state())
            .field("coordinator", &self.is_coordinator())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::CollectionHandle;
    use strata_core::CollectionKind;

    fn registry() -> Arc<ClusterRegistry> {
        Arc::new(ClusterRegistry::new())
    }

    async fn started(name: &str, registry: &Arc<ClusterRegistry>) -> Member {
        let member = Member::new(MemberConfig::new(name), Arc::clone(registry)).unwrap();
        member.start().await.unwrap();
        member
    }

    #[tokio::test]
    async fn test_member_new() {
        let member = Member::new(MemberConfig::new("node-1"), registry()).unwrap();
        assert_eq!(member.name(), "node-1");
        assert_eq!(member.state(), MemberState::Created);
        assert!(!member.is_running());
        assert!(!member.is_coordinator());
    }

    #[tokio::test]
    async fn test_member_new_rejects_bad_config() {
        let err = Member::new(MemberConfig::new(""), registry()).unwrap_err();
        assert!(matches!(err, GridError::InvalidArgument { .. }));
    }

    #[tokio::test]
    async fn test_start_joins_registry() {
        let reg = registry();
        let member = started("node-1", &reg).await;
        assert!(member.is_running());
        assert!(member.is_coordinator());
        assert_eq!(reg.len().await, 1);

        // Second start is a no-op
        member.start().await.unwrap();
        assert_eq!(reg.len().await, 1);
    }

    #[tokio::test]
    async fn test_stop_twice() {
        let reg = registry();
        let member = started("node-1", &reg).await;

        member.stop().await;
        assert!(!member.is_running());
        assert_eq!(member.state(), MemberState::Stopped);

        member.stop().await;
        assert!(!member.is_running());
        assert!(reg.is_empty().await);
        assert!(!member.is_coordinator());
    }

    #[tokio::test]
    async fn test_stop_never_started_is_noop() {
        let member = Member::new(MemberConfig::new("idle"), registry()).unwrap();
        member.stop().await;
        assert_eq!(member.state(), MemberState::Created);
    }

    #[tokio::test]
    async fn test_restart_after_stop_rejected() {
        let reg = registry();
        let member = started("node-1", &reg).await;
        member.stop().await;
        let err = member.start().await.unwrap_err();
        assert!(matches!(err, GridError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn test_duplicate_id_rolls_back() {
        let reg = registry();
        let id = MemberId::from_name("same");
        let a = Member::with_id(id, MemberConfig::new("a"), Arc::clone(&reg)).unwrap();
        let b = Member::with_id(id, MemberConfig::new("b"), Arc::clone(&reg)).unwrap();

        a.start().await.unwrap();
        let err = b.start().await.unwrap_err();
        assert_eq!(err, GridError::DuplicateMember { id });
        assert_eq!(b.state(), MemberState::Created);
        assert_eq!(reg.len().await, 1);
    }

    #[tokio::test]
    async fn test_stop_cancels_inflight_create() {
        let reg = registry();
        let a = started("a", &reg).await;
        let b = started("b", &reg).await;

        // Holding B's catalog lock parks A's announcement inside B's accept
        let held = b.inner.catalog.lock().await;
        let create = {
            let a = a.clone();
            tokio::spawn(async move { a.get_dictionary::<String, i32>("d").await })
        };
        while !a.contains("d").await {
            tokio::task::yield_now().await;
        }

        tokio::time::timeout(Duration::from_secs(1), a.stop())
            .await
            .unwrap();
        assert_eq!(a.state(), MemberState::Stopped);

        let handle = tokio::time::timeout(Duration::from_secs(1), create)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(handle.name(), "d");

        drop(held);
        assert!(!b.contains("d").await);
    }

    #[tokio::test]
    async fn test_stop_reports_cancelled_broadcast() {
        let reg = registry();
        let a = started("a", &reg).await;
        let b = started("b", &reg).await;

        let held = b.inner.catalog.lock().await;
        let send = {
            let a = a.clone();
            tokio::spawn(async move {
                a.broadcast(CatalogMessage::set_created::<u8>(a.id(), "s"))
                    .await
            })
        };
        while a.inner.inflight.is_empty() {
            tokio::task::yield_now().await;
        }

        a.stop().await;
        assert!(a.inner.inflight.is_empty());

        let report = send.await.unwrap().unwrap();
        assert!(report.cancelled);
        assert!(report.delivered.is_empty());
        assert!(report.failures.is_empty());
        drop(held);
    }

    #[tokio::test]
    async fn test_wait_stopped() {
        let reg = registry();
        let member = started("node-1", &reg).await;
        let waiter = {
            let member = member.clone();
            tokio::spawn(async move { member.wait_stopped().await })
        };
        member.stop().await;
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn test_get_or_create_requires_running() {
        let member = Member::new(MemberConfig::new("idle"), registry()).unwrap();
        let err = member.get_dictionary::<String, i32>("d").await.unwrap_err();
        assert!(matches!(err, GridError::NotRunning { .. }));
    }

    #[tokio::test]
    async fn test_get_or_create_rejects_blank_name() {
        let reg = registry();
        let member = started("node-1", &reg).await;
        for name in ["", "   ", "\t\n"] {
            let err = member.get_list::<i32>(name).await.unwrap_err();
            assert!(matches!(err, GridError::InvalidArgument { .. }));
        }
        assert_eq!(member.catalog_len().await, 0);
    }

    #[tokio::test]
    async fn test_get_or_create_idempotent() {
        let reg = registry();
        let member = started("node-1", &reg).await;

        let first = member.get_dictionary::<String, i32>("d").await.unwrap();
        let second = member.get_dictionary::<String, i32>("d").await.unwrap();
        assert!(first.same_handle(&second));

        first.insert("k".to_string(), 1);
        assert_eq!(second.get(&"k".to_string()), Some(1));
        assert_eq!(member.catalog_len().await, 1);
    }

    #[tokio::test]
    async fn test_distinct_names_not_aliased() {
        let reg = registry();
        let member = started("node-1", &reg).await;

        let a = member.get_set::<u32>("a").await.unwrap();
        let b = member.get_set::<u32>("b").await.unwrap();
        assert!(!a.same_handle(&b));
        a.insert(1);
        assert!(b.is_empty());
        assert_eq!(member.catalog_names().await, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_local_type_mismatch() {
        let reg = registry();
        let member = started("node-1", &reg).await;

        member.get_dictionary::<String, i32>("x").await.unwrap();
        let err = member.get_dictionary::<String, String>("x").await.unwrap_err();
        assert!(err.is_type_mismatch());
        let err = member.get_queue::<i32>("x").await.unwrap_err();
        assert!(err.is_type_mismatch());
    }

    #[tokio::test]
    async fn test_all_kinds_replicate() {
        let reg = registry();
        let a = started("a", &reg).await;
        let b = started("b", &reg).await;

        a.get_dictionary::<String, i32>("d").await.unwrap();
        a.get_list::<String>("l").await.unwrap();
        a.get_queue::<u64>("q").await.unwrap();
        a.get_set::<String>("s").await.unwrap();

        assert_eq!(b.catalog_len().await, 4);
        assert_eq!(b.descriptor_of("d").await.unwrap().kind(), CollectionKind::Dictionary);
        assert_eq!(b.descriptor_of("l").await.unwrap().kind(), CollectionKind::List);
        assert_eq!(b.descriptor_of("q").await.unwrap().kind(), CollectionKind::Queue);
        assert_eq!(b.descriptor_of("s").await.unwrap(), CollectionDescriptor::set::<String>("s"));
    }

    #[tokio::test]
    async fn test_convergence_if_present() {
        let reg = registry();
        let a = started("a", &reg).await;
        let b = started("b", &reg).await;

        a.get_dictionary::<String, i32>("x").await.unwrap();

        assert!(b.contains("x").await);
        assert_eq!(
            b.descriptor_of("x").await,
            Some(CollectionDescriptor::dictionary::<String, i32>("x"))
        );
        // B binds the replicated entry instead of creating a new one
        let handle = b.get_dictionary::<String, i32>("x").await.unwrap();
        assert_eq!(handle.entry().origin(), a.id());
    }

    #[tokio::test]
    async fn test_non_convergence_if_late() {
        let reg = registry();
        let a = started("a", &reg).await;
        a.get_dictionary::<String, i32>("x").await.unwrap();

        let b = started("b", &reg).await;
        assert!(!b.contains("x").await);

        b.get_dictionary::<String, i32>("x").await.unwrap();
        assert!(b.contains("x").await);
    }

    #[tokio::test]
    async fn test_remote_type_mismatch() {
        let reg = registry();
        let a = started("a", &reg).await;
        let b = started("b", &reg).await;

        a.get_dictionary::<String, i32>("x").await.unwrap();
        let err = b.get_dictionary::<String, String>("x").await.unwrap_err();
        assert!(err.is_type_mismatch());
    }

    #[tokio::test]
    async fn test_metadata_not_data_is_shared() {
        let reg = registry();
        let node1 = started("node1", &reg).await;
        let node2 = started("node2", &reg).await;

        let d1 = node1.get_dictionary::<String, i32>("d").await.unwrap();
        d1.insert("k".to_string(), 7);

        let d2 = node2.get_dictionary::<String, i32>("d").await.unwrap();
        assert_eq!(d2.len(), 0);
        assert!(!d1.same_handle(&d2));
    }

    #[tokio::test]
    async fn test_accept_ignores_self() {
        let reg = registry();
        let a = started("a", &reg).await;
        let message: Message = CatalogMessage::list_created::<i32>(a.id(), "l").into();
        assert_eq!(a.accept(&message).await.unwrap(), AcceptOutcome::Ignored);
        assert!(!a.contains("l").await);
    }

    #[tokio::test]
    async fn test_accept_first_writer_wins() {
        let reg = registry();
        let b = started("b", &reg).await;
        let sender = MemberId::from_name("remote");
        let message: Message = CatalogMessage::queue_created::<i32>(sender, "q").into();

        assert_eq!(b.accept(&message).await.unwrap(), AcceptOutcome::Materialized);
        let handle = b.get_queue::<i32>("q").await.unwrap();
        handle.enqueue(5);

        // Retransmission keeps the existing entry and its contents
        assert_eq!(b.accept(&message).await.unwrap(), AcceptOutcome::AlreadyPresent);
        let again = b.get_queue::<i32>("q").await.unwrap();
        assert!(handle.same_handle(&again));
        assert_eq!(again.peek(), Some(5));
    }

    #[tokio::test]
    async fn test_accept_mismatch_rejected() {
        let reg = registry();
        let b = started("b", &reg).await;
        b.get_list::<String>("x").await.unwrap();

        let message: Message = CatalogMessage::list_created::<i32>(MemberId::new(), "x").into();
        assert!(b.accept(&message).await.unwrap_err().is_type_mismatch());
    }

    #[tokio::test]
    async fn test_accept_ignores_opaque() {
        let reg = registry();
        let b = started("b", &reg).await;
        let message = Message::Opaque {
            sender: MemberId::new(),
            tag: "future-kind".to_string(),
            payload: vec![1, 2, 3],
        };
        assert_eq!(b.accept(&message).await.unwrap(), AcceptOutcome::Ignored);
        assert_eq!(b.catalog_len().await, 0);
    }

    #[tokio::test]
    async fn test_accept_requires_running() {
        let b = Member::new(MemberConfig::new("b"), registry()).unwrap();
        let message: Message = CatalogMessage::set_created::<i32>(MemberId::new(), "s").into();
        assert!(matches!(
            b.accept(&message).await.unwrap_err(),
            GridError::NotRunning { .. }
        ));
    }

    #[tokio::test]
    async fn test_broadcast_report() {
        let reg = registry();
        let a = started("a", &reg).await;
        let b = started("b", &reg).await;
        let c = started("c", &reg).await;

        let report = a
            .broadcast(CatalogMessage::set_created::<u8>(a.id(), "s"))
            .await
            .unwrap();
        assert!(report.is_complete());
        assert_eq!(report.delivered_count(), 2);
        assert!(b.contains("s").await);
        assert!(c.contains("s").await);
        assert!(!a.contains("s").await);
    }

    #[tokio::test]
    async fn test_peer_mismatch_does_not_block_others() {
        let reg = registry();
        let a = started("a", &reg).await;
        let b = started("b", &reg).await;
        let c = started("c", &reg).await;

        // B alone binds "x" to another shape; C must still receive A's announcement
        let foreign: Message = CatalogMessage::list_created::<String>(MemberId::new(), "x").into();
        b.accept(&foreign).await.unwrap();

        let report = a
            .broadcast(CatalogMessage::list_created::<i32>(a.id(), "x"))
            .await
            .unwrap();
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, b.id());
        assert!(report.failures[0].1.is_type_mismatch());
        assert_eq!(report.delivered, vec![(c.id(), AcceptOutcome::Materialized)]);
        assert_eq!(
            c.descriptor_of("x").await,
            Some(CollectionDescriptor::list::<i32>("x"))
        );
    }

    #[tokio::test]
    async fn test_concurrent_creates_single_instance() {
        let reg = registry();
        let a = started("a", &reg).await;
        let _b = started("b", &reg).await;

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let a = a.clone();
            tasks.push(tokio::spawn(async move {
                a.get_dictionary::<u64, u64>("shared").await.unwrap()
            }));
        }

        let handles: Vec<_> = futures::future::join_all(tasks)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();
        assert!(handles.iter().all(|h| h.same_handle(&handles[0])));
        assert_eq!(a.catalog_len().await, 1);
    }

    #[tokio::test]
    async fn test_member_equality_by_id() {
        let reg = registry();
        let a = Member::new(MemberConfig::new("same-name"), Arc::clone(&reg)).unwrap();
        let b = Member::new(MemberConfig::new("same-name"), Arc::clone(&reg)).unwrap();
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    proptest::proptest! {
        #[test]
        fn prop_distinct_names_never_alias(
            names in proptest::collection::hash_set("[a-z][a-z0-9_]{0,10}", 1..12)
        ) {
            let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            rt.block_on(async {
                let reg = registry();
                let member = started("node-1", &reg).await;

                let mut handles = Vec::new();
                for name in &names {
                    handles.push(member.get_list::<String>(name).await.unwrap());
                }
                for (i, a) in handles.iter().enumerate() {
                    for b in &handles[i + 1..] {
                        assert!(!a.same_handle(b));
                    }
                }
                assert_eq!(member.catalog_len().await, names.len());
                member.stop().await;
            });
        }
    }
}
