//! Collection and type descriptors.
//!
//! A descriptor is the untyped, serializable shape of a named collection:
//! its kind plus the identifiers of its key and element types. Two handles
//! bound to the same name must carry equal descriptors.

use crate::error::{GridError, GridResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;

/// Values that can live in a distributed collection.
///
/// Collection contents must be serializable so a transport can ship them.
pub trait GridValue: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> GridValue for T where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

/// Values usable as dictionary keys and set elements.
pub trait GridKey: GridValue + Eq + Hash {}

impl<T> GridKey for T where T: GridValue + Eq + Hash {}

/// Kind of a distributed collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollectionKind {
    /// Key/value map
    Dictionary,
    /// Ordered list
    List,
    /// FIFO queue
    Queue,
    /// Unordered set of unique elements
    Set,
}

impl CollectionKind {
    /// Whether collections of this kind carry a key type
    #[must_use]
    pub fn is_keyed(&self) -> bool {
        matches!(self, Self::Dictionary)
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Dictionary => "Dictionary",
            Self::List => "List",
            Self::Queue => "Queue",
            Self::Set => "Set",
        };
        f.write_str(s)
    }
}

/// Identifier of a Rust type, taken from [`std::any::type_name`]
///
/// Consistent within one build only. The compiler may spell the same type
/// differently across versions, so members that exchange descriptors must be
/// built with the same toolchain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeDescriptor(String);

impl TypeDescriptor {
    /// Describe the type `T`
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self(std::any::type_name::<T>().to_string())
    }

    /// Build from a raw identifier (for descriptors received off the wire)
    #[must_use]
    pub fn from_raw(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reject empty and whitespace-only collection names
///
/// # Errors
///
/// Returns `InvalidArgument` if the name is blank
pub fn validate_name(name: &str) -> GridResult<()> {
    if name.trim().is_empty() {
        return Err(GridError::invalid_argument(
            "name",
            "collection name must not be empty or whitespace",
        ));
    }
    Ok(())
}

/// Shape of one named collection
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollectionDescriptor {
    name: String,
    kind: CollectionKind,
    key_type: Option<TypeDescriptor>,
    element_type: TypeDescriptor,
}

impl CollectionDescriptor {
    /// Describe a dictionary from `K` to `V`
    #[must_use]
    pub fn dictionary<K: GridKey, V: GridValue>(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: CollectionKind::Dictionary,
            key_type: Some(TypeDescriptor::of::<K>()),
            element_type: TypeDescriptor::of::<V>(),
        }
    }

    /// Describe a list of `T`
    #[must_use]
    pub fn list<T: GridValue>(name: impl Into<String>) -> Self {
        Self::unkeyed(name, CollectionKind::List, TypeDescriptor::of::<T>())
    }

    /// Describe a queue of `T`
    #[must_use]
    pub fn queue<T: GridValue>(name: impl Into<String>) -> Self {
        Self::unkeyed(name, CollectionKind::Queue, TypeDescriptor::of::<T>())
    }

    /// Describe a set of `T`
    #[must_use]
    pub fn set<T: GridKey>(name: impl Into<String>) -> Self {
        Self::unkeyed(name, CollectionKind::Set, TypeDescriptor::of::<T>())
    }

    /// Build from raw parts
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the name is blank or the key type does
    /// not fit the kind (dictionaries need one, other kinds must not have one)
    pub fn from_parts(
        name: impl Into<String>,
        kind: CollectionKind,
        key_type: Option<TypeDescriptor>,
        element_type: TypeDescriptor,
    ) -> GridResult<Self> {
        let name = name.into();
        validate_name(&name)?;
        if kind.is_keyed() != key_type.is_some() {
            return Err(GridError::invalid_argument(
                "key_type",
                if kind.is_keyed() {
                    format!("{kind} collections require a key type")
                } else {
                    format!("{kind} collections do not take a key type")
                },
            ));
        }
        Ok(Self {
            name,
            kind,
            key_type,
            element_type,
        })
    }

    fn unkeyed(
        name: impl Into<String>,
        kind: CollectionKind,
        element_type: TypeDescriptor,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            key_type: None,
            element_type,
        }
    }

    /// Collection name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Collection kind
    #[must_use]
    pub fn kind(&self) -> CollectionKind {
        self.kind
    }

    /// Key type (dictionaries only)
    #[must_use]
    pub fn key_type(&self) -> Option<&TypeDescriptor> {
        self.key_type.as_ref()
    }

    /// Value type for dictionaries, element type otherwise
    #[must_use]
    pub fn element_type(&self) -> &TypeDescriptor {
        &self.element_type
    }

    /// Human readable shape, e.g. `Dictionary<alloc::string::String, i32>`
    #[must_use]
    pub fn shape(&self) -> String {
        match &self.key_type {
            Some(key) => format!("{}<{}, {}>", self.kind, key, self.element_type),
            None => format!("{}<{}>", self.kind, self.element_type),
        }
    }

    /// Check that `requested` may bind to a collection already described by `self`
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` if kind or any type descriptor differs
    pub fn ensure_matches(&self, requested: &CollectionDescriptor) -> GridResult<()> {
        let same_shape = self.kind == requested.kind
            && self.key_type == requested.key_type
            && self.element_type == requested.element_type;

        if same_shape {
            return Ok(());
        }

        Err(GridError::TypeMismatch {
            name: self.name.clone(),
            expected: self.shape(),
            actual: requested.shape(),
        })
    }
}

impl fmt::Display for CollectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.shape())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_type_descriptor_identity() {
        assert_eq!(TypeDescriptor::of::<String>(), TypeDescriptor::of::<String>());
        assert_ne!(TypeDescriptor::of::<String>(), TypeDescriptor::of::<&str>());
        assert_ne!(TypeDescriptor::of::<i32>(), TypeDescriptor::of::<u32>());

        // Descriptors received off the wire compare equal within one build
        let local = TypeDescriptor::of::<Vec<u8>>();
        assert_eq!(TypeDescriptor::from_raw(local.as_str()), local);
        assert_eq!(local.as_str(), std::any::type_name::<Vec<u8>>());
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("orders").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("   \t").is_err());
    }

    #[test]
    fn test_dictionary_descriptor() {
        let d = CollectionDescriptor::dictionary::<String, i32>("d");
        assert_eq!(d.name(), "d");
        assert_eq!(d.kind(), CollectionKind::Dictionary);
        assert_eq!(d.key_type(), Some(&TypeDescriptor::of::<String>()));
        assert_eq!(d.element_type(), &TypeDescriptor::of::<i32>());
        assert_eq!(d.shape(), "Dictionary<alloc::string::String, i32>");
    }

    #[test]
    fn test_unkeyed_descriptors_have_no_key() {
        assert!(CollectionDescriptor::list::<u64>("l").key_type().is_none());
        assert!(CollectionDescriptor::queue::<u64>("q").key_type().is_none());
        assert!(CollectionDescriptor::set::<u64>("s").key_type().is_none());
    }

    #[test]
    fn test_ensure_matches_same_shape() {
        let a = CollectionDescriptor::dictionary::<String, i32>("x");
        let b = CollectionDescriptor::dictionary::<String, i32>("x");
        assert!(a.ensure_matches(&b).is_ok());
    }

    #[test]
    fn test_ensure_matches_value_type_differs() {
        let a = CollectionDescriptor::dictionary::<String, i32>("x");
        let b = CollectionDescriptor::dictionary::<String, String>("x");
        let err = a.ensure_matches(&b).unwrap_err();
        match err {
            GridError::TypeMismatch { name, expected, actual } => {
                assert_eq!(name, "x");
                assert!(expected.ends_with("i32>"));
                assert!(actual.contains("String>"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_ensure_matches_kind_differs() {
        let list = CollectionDescriptor::list::<i32>("x");
        let queue = CollectionDescriptor::queue::<i32>("x");
        assert!(list.ensure_matches(&queue).unwrap_err().is_type_mismatch());
    }

    #[test]
    fn test_from_parts() {
        let d = CollectionDescriptor::from_parts(
            "x",
            CollectionKind::Dictionary,
            Some(TypeDescriptor::of::<String>()),
            TypeDescriptor::of::<i32>(),
        )
        .unwrap();
        assert_eq!(d, CollectionDescriptor::dictionary::<String, i32>("x"));

        let missing_key = CollectionDescriptor::from_parts(
            "x",
            CollectionKind::Dictionary,
            None,
            TypeDescriptor::of::<i32>(),
        );
        assert!(missing_key.is_err());

        let blank = CollectionDescriptor::from_parts(
            " ",
            CollectionKind::List,
            None,
            TypeDescriptor::of::<i32>(),
        );
        assert!(blank.is_err());
    }

    #[test]
    fn test_descriptor_serde() {
        let d = CollectionDescriptor::set::<String>("tags");
        let json = serde_json::to_string(&d).unwrap();
        assert!(json.contains("\"Set\""));
        let back: CollectionDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, d);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(CollectionKind::Queue.to_string(), "Queue");
        assert!(CollectionKind::Dictionary.is_keyed());
        assert!(!CollectionKind::Set.is_keyed());
    }

    proptest! {
        #[test]
        fn prop_whitespace_names_rejected(name in "[ \t\n\r]{0,8}") {
            prop_assert!(validate_name(&name).is_err());
        }

        #[test]
        fn prop_mismatch_only_on_shape_change(name in "[a-z]{1,12}", other in "[a-z]{1,12}") {
            let existing = CollectionDescriptor::dictionary::<String, i32>(name.clone());
            let same = CollectionDescriptor::dictionary::<String, i32>(name.clone());
            let other_value = CollectionDescriptor::dictionary::<String, u32>(name.clone());
            prop_assert!(existing.ensure_matches(&same).is_ok());
            prop_assert!(existing.ensure_matches(&other_value).is_err());
            let other_kind = CollectionDescriptor::list::<i32>(name);
            prop_assert!(existing.ensure_matches(&other_kind).is_err());
            prop_assert_ne!(
                CollectionDescriptor::set::<u8>(other.clone()),
                CollectionDescriptor::list::<u8>(other)
            );
        }
    }
}
