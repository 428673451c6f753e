//! Catalog message protocol.
//!
//! Messages are immutable, in-process values. Only the descriptor part is
//! meant to cross a real wire; a transport re-binds the store factory from
//! its own table of supported types before handing a message to a member.

use crate::collection::{Blueprint, CatalogEntry};
use serde::{Deserialize, Serialize};
use strata_core::{CollectionDescriptor, CollectionKind, GridKey, GridValue, MemberId};

/// Announcement that a collection was created on `sender`
#[derive(Debug, Clone)]
pub struct CollectionCreated {
    sender: MemberId,
    blueprint: Blueprint,
}

impl CollectionCreated {
    /// Originating member
    #[must_use]
    pub fn sender(&self) -> MemberId {
        self.sender
    }

    /// Blueprint carried by the announcement
    #[must_use]
    pub fn blueprint(&self) -> &Blueprint {
        &self.blueprint
    }
}

/// Catalog replication message, one variant per collection kind
#[derive(Debug, Clone)]
pub enum CatalogMessage {
    /// A dictionary was created
    DictionaryCreated(CollectionCreated),
    /// A list was created
    ListCreated(CollectionCreated),
    /// A queue was created
    QueueCreated(CollectionCreated),
    /// A set was created
    SetCreated(CollectionCreated),
}

impl CatalogMessage {
    /// Announce a dictionary
    #[must_use]
    pub fn dictionary_created<K: GridKey, V: GridValue>(
        sender: MemberId,
        name: impl Into<String>,
    ) -> Self {
        Self::from_blueprint(sender, Blueprint::dictionary::<K, V>(name))
    }

    /// Announce a list
    #[must_use]
    pub fn list_created<T: GridValue>(sender: MemberId, name: impl Into<String>) -> Self {
        Self::from_blueprint(sender, Blueprint::list::<T>(name))
    }

    /// Announce a queue
    #[must_use]
    pub fn queue_created<T: GridValue>(sender: MemberId, name: impl Into<String>) -> Self {
        Self::from_blueprint(sender, Blueprint::queue::<T>(name))
    }

    /// Announce a set
    #[must_use]
    pub fn set_created<T: GridKey>(sender: MemberId, name: impl Into<String>) -> Self {
        Self::from_blueprint(sender, Blueprint::set::<T>(name))
    }

    /// Announce whatever `blueprint` describes; the variant follows its kind
    #[must_use]
    pub fn from_blueprint(sender: MemberId, blueprint: Blueprint) -> Self {
        let kind = blueprint.kind();
        let created = CollectionCreated { sender, blueprint };
        match kind {
            CollectionKind::Dictionary => Self::DictionaryCreated(created),
            CollectionKind::List => Self::ListCreated(created),
            CollectionKind::Queue => Self::QueueCreated(created),
            CollectionKind::Set => Self::SetCreated(created),
        }
    }

    fn created(&self) -> &CollectionCreated {
        match self {
            Self::DictionaryCreated(c)
            | Self::ListCreated(c)
            | Self::QueueCreated(c)
            | Self::SetCreated(c) => c,
        }
    }

    /// Originating member
    #[must_use]
    pub fn sender(&self) -> MemberId {
        self.created().sender
    }

    /// Collection name
    #[must_use]
    pub fn name(&self) -> &str {
        self.created().blueprint.name()
    }

    /// Collection kind
    #[must_use]
    pub fn kind(&self) -> CollectionKind {
        self.created().blueprint.kind()
    }

    /// Collection shape
    #[must_use]
    pub fn descriptor(&self) -> &CollectionDescriptor {
        self.created().blueprint.descriptor()
    }

    /// Build the local entry this message describes
    #[must_use]
    pub fn materialize(&self) -> CatalogEntry {
        let created = self.created();
        created.blueprint.materialize(created.sender)
    }
}

/// Tag of a message, for logs and reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageTag {
    /// Catalog replication
    Catalog,
    /// Anything this version does not understand
    Opaque,
}

/// Envelope delivered between members
#[derive(Debug, Clone)]
pub enum Message {
    /// Catalog replication
    Catalog(CatalogMessage),
    /// Message kind unknown to this version; receivers ignore it
    Opaque {
        /// Originating member
        sender: MemberId,
        /// Sender-defined kind tag
        tag: String,
        /// Raw payload
        payload: Vec<u8>,
    },
}

impl Message {
    /// Originating member
    #[must_use]
    pub fn sender(&self) -> MemberId {
        match self {
            Self::Catalog(m) => m.sender(),
            Self::Opaque { sender, .. } => *sender,
        }
    }

    /// Message tag
    #[must_use]
    pub fn tag(&self) -> MessageTag {
        match self {
            Self::Catalog(_) => MessageTag::Catalog,
            Self::Opaque { .. } => MessageTag::Opaque,
        }
    }
}

impl From<CatalogMessage> for Message {
    fn from(message: CatalogMessage) -> Self {
        Self::Catalog(message)
    }
}
