//! Attribute values and typed attribute codecs
//!
//! The backing store is schemaless: an item is a map from attribute name to
//! [`AttributeValue`]. Domain code never touches that map directly; it goes
//! through a typed [`Attribute<T>`] declared once per attribute name:
//!
//! ```
//! use ordo_core::attribute::{Attribute, Item};
//!
//! const OWNER: Attribute<String> = Attribute::new("o");
//! const TIMESTAMP: Attribute<i64> = Attribute::new("ts");
//!
//! let mut item = Item::new();
//! OWNER.put(&mut item, "node-a".to_string());
//! TIMESTAMP.put(&mut item, 1_700_000_000_000);
//!
//! assert_eq!(OWNER.get(&item).unwrap(), "node-a");
//! assert_eq!(TIMESTAMP.get_opt(&item).unwrap(), Some(1_700_000_000_000));
//! ```
//!
//! ## Type Rules
//!
//! - Numbers are 64-bit signed integers (`N`); unsigned values above
//!   `i64::MAX` have no representation and are rejected before they reach a
//!   row
//! - Bytes are not strings: `B(b"x") != S("x")`

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

/// A single attribute as the store represents it
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AttributeValue {
    /// UTF-8 string
    S(String),
    /// Number
    N(i64),
    /// Raw bytes
    B(Vec<u8>),
}

impl AttributeValue {
    /// Short type descriptor, as used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            AttributeValue::S(_) => "S",
            AttributeValue::N(_) => "N",
            AttributeValue::B(_) => "B",
        }
    }

    /// Get as &str if this is an `S` value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::S(s) => Some(s),
            _ => None,
        }
    }

    /// Get as i64 if this is an `N` value
    pub fn as_number(&self) -> Option<i64> {
        match self {
            AttributeValue::N(n) => Some(*n),
            _ => None,
        }
    }

    /// Get as &[u8] if this is a `B` value
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            AttributeValue::B(b) => Some(b),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::S(s) => write!(f, "{:?}", s),
            AttributeValue::N(n) => write!(f, "{}", n),
            AttributeValue::B(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        AttributeValue::S(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        AttributeValue::S(s)
    }
}

impl From<i64> for AttributeValue {
    fn from(n: i64) -> Self {
        AttributeValue::N(n)
    }
}

/// A schemaless item: attribute name to value
pub type Item = BTreeMap<String, AttributeValue>;

// ============================================================================
// Typed marshalling
// ============================================================================

/// A Rust type with a fixed mapping onto [`AttributeValue`]
pub trait AttributeType: Sized {
    /// Marshal into the store representation
    fn to_attribute(&self) -> AttributeValue;

    /// Unmarshal, returning `None` if the value has the wrong shape
    fn from_attribute(value: &AttributeValue) -> Option<Self>;
}

impl AttributeType for String {
    fn to_attribute(&self) -> AttributeValue {
        AttributeValue::S(self.clone())
    }

    fn from_attribute(value: &AttributeValue) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}

impl AttributeType for i64 {
    fn to_attribute(&self) -> AttributeValue {
        AttributeValue::N(*self)
    }

    fn from_attribute(value: &AttributeValue) -> Option<Self> {
        value.as_number()
    }
}

/// Largest `u64` an `N` attribute can hold
pub const MAX_STORED_U64: u64 = i64::MAX as u64;

impl AttributeType for u64 {
    // Callers reject values above MAX_STORED_U64 before building a row.
    fn to_attribute(&self) -> AttributeValue {
        AttributeValue::N(i64::try_from(*self).unwrap_or(i64::MAX))
    }

    fn from_attribute(value: &AttributeValue) -> Option<Self> {
        value.as_number().and_then(|n| u64::try_from(n).ok())
    }
}

impl AttributeType for u32 {
    fn to_attribute(&self) -> AttributeValue {
        AttributeValue::N(i64::from(*self))
    }

    fn from_attribute(value: &AttributeValue) -> Option<Self> {
        value.as_number().and_then(|n| u32::try_from(n).ok())
    }
}

impl AttributeType for Vec<u8> {
    fn to_attribute(&self) -> AttributeValue {
        AttributeValue::B(self.clone())
    }

    fn from_attribute(value: &AttributeValue) -> Option<Self> {
        value.as_bytes().map(<[u8]>::to_vec)
    }
}

/// A named attribute with a fixed Rust type
///
/// Declared as constants next to the code that owns a row layout. All access
/// to item maps should go through these so a misspelled name or a wrong type
/// surfaces as [`Error::Corruption`] instead of a silent default.
pub struct Attribute<T> {
    name: &'static str,
    _type: PhantomData<fn() -> T>,
}

impl<T> Attribute<T> {
    /// Declare an attribute
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _type: PhantomData,
        }
    }

    /// Attribute name in the item map
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T: AttributeType> Attribute<T> {
    /// Read a required attribute
    ///
    /// # Errors
    ///
    /// [`Error::Corruption`] if the attribute is absent or has the wrong type.
    pub fn get(&self, item: &Item) -> Result<T> {
        self.get_opt(item)?
            .ok_or_else(|| Error::corruption(format!("missing attribute '{}'", self.name)))
    }

    /// Read an optional attribute
    ///
    /// # Errors
    ///
    /// [`Error::Corruption`] if the attribute is present with the wrong type.
    pub fn get_opt(&self, item: &Item) -> Result<Option<T>> {
        match item.get(self.name) {
            None => Ok(None),
            Some(value) => T::from_attribute(value).map(Some).ok_or_else(|| {
                Error::corruption(format!(
                    "attribute '{}' has unexpected type {}",
                    self.name,
                    value.type_name()
                ))
            }),
        }
    }

    /// Marshal into a (name, value) pair
    pub fn pair(&self, value: &T) -> (String, AttributeValue) {
        (self.name.to_string(), value.to_attribute())
    }

    /// Marshal a value
    pub fn value(&self, value: &T) -> AttributeValue {
        value.to_attribute()
    }

    /// Write into an item, replacing any previous value
    pub fn put(&self, item: &mut Item, value: T) {
        item.insert(self.name.to_string(), value.to_attribute());
    }
}

impl<T> Clone for Attribute<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Attribute<T> {}

impl<T> fmt::Display for Attribute<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl<T> fmt::Debug for Attribute<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Attribute({})", self.name)
    }
}
