use super::ValidationError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::marker::PhantomData;

/// Strong typing for IDs with phantom types
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct Id<T> {
    value: String,
    _phantom: PhantomData<T>,
}

/// Marker types for different ID kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemMarker;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccountMarker;

/// A liked post.
pub type ItemId = Id<ItemMarker>;
/// The account whose likes are collected.
pub type AccountId = Id<AccountMarker>;

impl<T> Id<T> {
    /// Accepts any non-blank identifier; surrounding whitespace is dropped.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::InvalidId("identifier cannot be empty".to_string()));
        }
        Ok(Self {
            value: trimmed.to_string(),
            _phantom: PhantomData,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    fn is_numeric(&self) -> bool {
        !self.value.is_empty() && self.value.bytes().all(|b| b.is_ascii_digit())
    }
}

impl<T: Eq> Id<T> {
    /// Whether `self` sorts after `other` in the source's id order.
    pub fn is_newer_than(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Greater
    }
}

// Manual impls so the marker type needs no bounds.
impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            _phantom: PhantomData,
        }
    }
}

/// Snowflake ids are decimal strings of varying width, so digit-only ids
/// compare by magnitude; anything else falls back to lexical order.
impl<T: Eq> Ord for Id<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.is_numeric() && other.is_numeric() {
            self.value
                .len()
                .cmp(&other.value.len())
                .then_with(|| self.value.cmp(&other.value))
        } else {
            self.value.cmp(&other.value)
        }
    }
}

impl<T: Eq> PartialOrd for Id<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl<T> Serialize for Id<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.value.serialize(serializer)
    }
}

impl<'de, T> Deserialize<'de> for Id<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(serde::de::Error::custom)
    }
}
