//! STRATA Cluster
//!
//! In-process cluster membership and collection catalog replication.
//! Members announce newly created collections to every peer known at that
//! instant; peers materialize an empty collection of the same shape.
//! Only the catalog is replicated, never collection contents.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bus;
pub mod collection;
pub mod lifecycle;
pub mod member;
pub mod message;
pub mod registry;

pub use bus::{AcceptOutcome, BroadcastReport, BusDirection, CatalogPeer, MessageBus};
pub use collection::{
    Blueprint, CatalogEntry, CollectionHandle, DistributedDictionary, DistributedList,
    DistributedQueue, DistributedSet,
};
pub use lifecycle::MemberManager;
pub use member::{Member, MemberState};
pub use message::{CatalogMessage, CollectionCreated, Message, MessageTag};
pub use registry::{ClusterRegistry, CoordinatorPolicy};
