//! Catalog entries and typed collection handles.
//!
//! A [`CatalogEntry`] is the member-local object bound to one collection
//! name. Its backing store is type-erased so the catalog can hold every kind
//! in one map; the typed handles downcast it back after checking the
//! descriptor. Entries are built only by materializing a [`Blueprint`],
//! whose store factory is monomorphized where the Rust types are known.

use indexmap::{IndexMap, IndexSet};
use std::any::Any;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use strata_core::{
    CollectionDescriptor, CollectionKind, GridError, GridKey, GridResult, GridValue, MemberId,
};

/// Type-erased backing store of a catalog entry
pub type ErasedStore = Arc<dyn Any + Send + Sync>;

/// Builds an empty backing store
pub type StoreFactory = fn() -> ErasedStore;

type DictionaryStore<K, V> = RwLock<IndexMap<K, V>>;
type ListStore<T> = RwLock<Vec<T>>;
type QueueStore<T> = RwLock<VecDeque<T>>;
type SetStore<T> = RwLock<IndexSet<T>>;

fn new_store<S: Default + Any + Send + Sync>() -> ErasedStore {
    Arc::new(S::default())
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn index_error(index: usize, len: usize) -> GridError {
    GridError::invalid_argument("index", format!("{} out of range for length {}", index, len))
}

/// Everything needed to materialize one collection: its shape and a factory
/// for an empty store of the matching Rust type.
#[derive(Clone)]
pub struct Blueprint {
    descriptor: CollectionDescriptor,
    factory: StoreFactory,
}

impl Blueprint {
    /// Blueprint for a dictionary from `K` to `V`
    #[must_use]
    pub fn dictionary<K: GridKey, V: GridValue>(name: impl Into<String>) -> Self {
        Self {
            descriptor: CollectionDescriptor::dictionary::<K, V>(name),
            factory: new_store::<DictionaryStore<K, V>>,
        }
    }

    /// Blueprint for a list of `T`
    #[must_use]
    pub fn list<T: GridValue>(name: impl Into<String>) -> Self {
        Self {
            descriptor: CollectionDescriptor::list::<T>(name),
            factory: new_store::<ListStore<T>>,
        }
    }

    /// Blueprint for a queue of `T`
    #[must_use]
    pub fn queue<T: GridValue>(name: impl Into<String>) -> Self {
        Self {
            descriptor: CollectionDescriptor::queue::<T>(name),
            factory: new_store::<QueueStore<T>>,
        }
    }

    /// Blueprint for a set of `T`
    #[must_use]
    pub fn set<T: GridKey>(name: impl Into<String>) -> Self {
        Self {
            descriptor: CollectionDescriptor::set::<T>(name),
            factory: new_store::<SetStore<T>>,
        }
    }

    /// Collection shape
    #[must_use]
    pub fn descriptor(&self) -> &CollectionDescriptor {
        &self.descriptor
    }

    /// Collection name
    #[must_use]
    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    /// Collection kind
    #[must_use]
    pub fn kind(&self) -> CollectionKind {
        self.descriptor.kind()
    }

    /// Build a fresh entry with an empty store.
    ///
    /// Pure: no cluster calls, so materializing a retransmitted message twice
    /// only produces a second entry that the catalog then discards.
    #[must_use]
    pub fn materialize(&self, origin: MemberId) -> CatalogEntry {
        CatalogEntry {
            descriptor: self.descriptor.clone(),
            origin,
            store: (self.factory)(),
        }
    }
}

impl fmt::Debug for Blueprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blueprint")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

/// The materialized object bound to one collection name on one member
pub struct CatalogEntry {
    descriptor: CollectionDescriptor,
    origin: MemberId,
    store: ErasedStore,
}

impl CatalogEntry {
    /// Collection shape
    #[must_use]
    pub fn descriptor(&self) -> &CollectionDescriptor {
        &self.descriptor
    }

    /// Collection name
    #[must_use]
    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    /// Collection kind
    #[must_use]
    pub fn kind(&self) -> CollectionKind {
        self.descriptor.kind()
    }

    /// Member whose create call (local or broadcast) produced this entry
    #[must_use]
    pub fn origin(&self) -> MemberId {
        self.origin
    }

    fn store<S: Any + Send + Sync>(&self) -> GridResult<Arc<S>> {
        Arc::clone(&self.store)
            .downcast::<S>()
            .map_err(|_| GridError::TypeMismatch {
                name: self.name().to_string(),
                expected: self.descriptor.shape(),
                actual: std::any::type_name::<S>().to_string(),
            })
    }
}

impl fmt::Debug for CatalogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatalogEntry")
            .field("descriptor", &self.descriptor)
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

/// Common surface of the typed handles
pub trait CollectionHandle {
    /// The catalog entry this handle views
    fn entry(&self) -> &Arc<CatalogEntry>;

    /// Collection name
    fn name(&self) -> &str {
        self.entry().name()
    }

    /// Collection shape
    fn descriptor(&self) -> &CollectionDescriptor {
        self.entry().descriptor()
    }

    /// Whether both handles view the same catalog entry
    fn same_handle(&self, other: &impl CollectionHandle) -> bool
    where
        Self: Sized,
    {
        Arc::ptr_eq(self.entry(), other.entry())
    }
}

fn bind<S: Any + Send + Sync>(
    entry: &Arc<CatalogEntry>,
    requested: &CollectionDescriptor,
) -> GridResult<Arc<S>> {
    entry.descriptor().ensure_matches(requested)?;
    entry.store::<S>()
}

/// Typed view of a dictionary entry
pub struct DistributedDictionary<K, V> {
    entry: Arc<CatalogEntry>,
    store: Arc<DictionaryStore<K, V>>,
}

impl<K: GridKey, V: GridValue> DistributedDictionary<K, V> {
    /// Bind a typed view to an entry
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` if the entry is not a `Dictionary<K, V>`
    pub fn bind(entry: Arc<CatalogEntry>) -> GridResult<Self> {
        let requested = CollectionDescriptor::dictionary::<K, V>(entry.name());
        let store = bind::<DictionaryStore<K, V>>(&entry, &requested)?;
        Ok(Self { entry, store })
    }

    /// Insert a value, returning the previous one
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        write(&self.store).insert(key, value)
    }

    /// Get a copy of the value for `key`
    #[must_use]
    pub fn get(&self, key: &K) -> Option<V> {
        read(&self.store).get(key).cloned()
    }

    /// Get the value for `key`, inserting `f()` first if absent
    pub fn get_or_insert_with(&self, key: K, f: impl FnOnce() -> V) -> V {
        write(&self.store).entry(key).or_insert_with(f).clone()
    }

    /// Remove a key, keeping the insertion order of the rest
    pub fn remove(&self, key: &K) -> Option<V> {
        write(&self.store).shift_remove(key)
    }

    /// Check for a key
    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        read(&self.store).contains_key(key)
    }

    /// Keys in insertion order
    #[must_use]
    pub fn keys(&self) -> Vec<K> {
        read(&self.store).keys().cloned().collect()
    }

    /// Entry count
    #[must_use]
    pub fn len(&self) -> usize {
        read(&self.store).len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        read(&self.store).is_empty()
    }

    /// Remove everything
    pub fn clear(&self) {
        write(&self.store).clear();
    }
}

impl<K, V> CollectionHandle for DistributedDictionary<K, V> {
    fn entry(&self) -> &Arc<CatalogEntry> {
        &self.entry
    }
}

impl<K, V> Clone for DistributedDictionary<K, V> {
    fn clone(&self) -> Self {
        Self {
            entry: Arc::clone(&self.entry),
            store: Arc::clone(&self.store),
        }
    }
}

impl<K, V> fmt::Debug for DistributedDictionary<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DistributedDictionary").field(&self.entry).finish()
    }
}

/// Typed view of a list entry
pub struct DistributedList<T> {
    entry: Arc<CatalogEntry>,
    store: Arc<ListStore<T>>,
}

impl<T: GridValue> DistributedList<T> {
    /// Bind a typed view to an entry
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` if the entry is not a `List<T>`
    pub fn bind(entry: Arc<CatalogEntry>) -> GridResult<Self> {
        let requested = CollectionDescriptor::list::<T>(entry.name());
        let store = bind::<ListStore<T>>(&entry, &requested)?;
        Ok(Self { entry, store })
    }

    /// Append an item
    pub fn push(&self, item: T) {
        write(&self.store).push(item);
    }

    /// Get a copy of the item at `index`
    #[must_use]
    pub fn get(&self, index: usize) -> Option<T> {
        read(&self.store).get(index).cloned()
    }

    /// Replace the item at `index`, returning the old one
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `index` is out of range
    pub fn set(&self, index: usize, item: T) -> GridResult<T> {
        let mut list = write(&self.store);
        let len = list.len();
        let slot = list.get_mut(index).ok_or_else(|| index_error(index, len))?;
        Ok(std::mem::replace(slot, item))
    }

    /// Insert an item at `index`, shifting later items
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `index` is greater than the length
    pub fn insert(&self, index: usize, item: T) -> GridResult<()> {
        let mut list = write(&self.store);
        if index > list.len() {
            return Err(index_error(index, list.len()));
        }
        list.insert(index, item);
        Ok(())
    }

    /// Remove the item at `index`
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `index` is out of range
    pub fn remove(&self, index: usize) -> GridResult<T> {
        let mut list = write(&self.store);
        if index >= list.len() {
            return Err(index_error(index, list.len()));
        }
        Ok(list.remove(index))
    }

    /// Copy of all items
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        read(&self.store).clone()
    }

    /// Item count
    #[must_use]
    pub fn len(&self) -> usize {
        read(&self.store).len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        read(&self.store).is_empty()
    }

    /// Remove everything
    pub fn clear(&self) {
        write(&self.store).clear();
    }
}

impl<T: GridValue + PartialEq> DistributedList<T> {
    /// Check whether an equal item is present
    #[must_use]
    pub fn contains(&self, item: &T) -> bool {
        read(&self.store).contains(item)
    }

    /// Position of the first equal item
    #[must_use]
    pub fn index_of(&self, item: &T) -> Option<usize> {
        read(&self.store).iter().position(|x| x == item)
    }
}

impl<T> CollectionHandle for DistributedList<T> {
    fn entry(&self) -> &Arc<CatalogEntry> {
        &self.entry
    }
}

impl<T> Clone for DistributedList<T> {
    fn clone(&self) -> Self {
        Self {
            entry: Arc::clone(&self.entry),
            store: Arc::clone(&self.store),
        }
    }
}

impl<T> fmt::Debug for DistributedList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DistributedList").field(&self.entry).finish()
    }
}

/// Typed view of a queue entry
pub struct DistributedQueue<T> {
    entry: Arc<CatalogEntry>,
    store: Arc<QueueStore<T>>,
}

impl<T: GridValue> DistributedQueue<T> {
    /// Bind a typed view to an entry
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` if the entry is not a `Queue<T>`
    pub fn bind(entry: Arc<CatalogEntry>) -> GridResult<Self> {
        let requested = CollectionDescriptor::queue::<T>(entry.name());
        let store = bind::<QueueStore<T>>(&entry, &requested)?;
        Ok(Self { entry, store })
    }

    /// Add an item at the back
    pub fn enqueue(&self, item: T) {
        write(&self.store).push_back(item);
    }

    /// Take the item at the front
    pub fn dequeue(&self) -> Option<T> {
        write(&self.store).pop_front()
    }

    /// Copy of the item at the front
    #[must_use]
    pub fn peek(&self) -> Option<T> {
        read(&self.store).front().cloned()
    }

    /// Copy of all items, front first
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        read(&self.store).iter().cloned().collect()
    }

    /// Item count
    #[must_use]
    pub fn len(&self) -> usize {
        read(&self.store).len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        read(&self.store).is_empty()
    }

    /// Remove everything
    pub fn clear(&self) {
        write(&self.store).clear();
    }
}

impl<T> CollectionHandle for DistributedQueue<T> {
    fn entry(&self) -> &Arc<CatalogEntry> {
        &self.entry
    }
}

impl<T> Clone for DistributedQueue<T> {
    fn clone(&self) -> Self {
        Self {
            entry: Arc::clone(&self.entry),
            store: Arc::clone(&self.store),
        }
    }
}

impl<T> fmt::Debug for DistributedQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DistributedQueue").field(&self.entry).finish()
    }
}

/// Typed view of a set entry
pub struct DistributedSet<T> {
    entry: Arc<CatalogEntry>,
    store: Arc<SetStore<T>>,
}

impl<T: GridKey> DistributedSet<T> {
    /// Bind a typed view to an entry
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` if the entry is not a `Set<T>`
    pub fn bind(entry: Arc<CatalogEntry>) -> GridResult<Self> {
        let requested = CollectionDescriptor::set::<T>(entry.name());
        let store = bind::<SetStore<T>>(&entry, &requested)?;
        Ok(Self { entry, store })
    }

    /// Add an item; false if it was already present
    pub fn insert(&self, item: T) -> bool {
        write(&self.store).insert(item)
    }

    /// Remove an item; false if it was absent
    pub fn remove(&self, item: &T) -> bool {
        write(&self.store).shift_remove(item)
    }

    /// Check membership
    #[must_use]
    pub fn contains(&self, item: &T) -> bool {
        read(&self.store).contains(item)
    }

    /// Copy of all items in insertion order
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        read(&self.store).iter().cloned().collect()
    }

    /// Item count
    #[must_use]
    pub fn len(&self) -> usize {
        read(&self.store).len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        read(&self.store).is_empty()
    }

    /// Remove everything
    pub fn clear(&self) {
        write(&self.store).clear();
    }
}

impl<T> CollectionHandle for DistributedSet<T> {
    fn entry(&self) -> &Arc<CatalogEntry> {
        &self.entry
    }
}

impl<T> Clone for DistributedSet<T> {
    fn clone(&self) -> Self {
        Self {
            entry: Arc::clone(&self.entry),
            store: Arc::clone(&self.store),
        }
    }
}

impl<T> fmt::Debug for DistributedSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DistributedSet").field(&self.entry).finish()
    }
}
