//! Tracked object kinds.
//!
//! The set is closed: every policy table and counter is keyed per kind, and
//! adding a kind means adding a variant here and a column in [`KindTable`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::QuotaError;

/// Category of object whose per-region population is capped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Hopper,
    Chest,
    Barrel,
}

impl ObjectKind {
    /// Every kind, in table order.
    pub const ALL: [ObjectKind; 3] = [ObjectKind::Hopper, ObjectKind::Chest, ObjectKind::Barrel];

    /// Stable lowercase name (config keys, storage column, wire format).
    pub fn as_str(self) -> &'static str {
        match self {
            ObjectKind::Hopper => "hopper",
            ObjectKind::Chest => "chest",
            ObjectKind::Barrel => "barrel",
        }
    }

    fn index(self) -> usize {
        match self {
            ObjectKind::Hopper => 0,
            ObjectKind::Chest => 1,
            ObjectKind::Barrel => 2,
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectKind {
    type Err = QuotaError;

    /// Case-insensitive; anything outside the closed set is `InvalidKind`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hopper" => Ok(ObjectKind::Hopper),
            "chest" => Ok(ObjectKind::Chest),
            "barrel" => Ok(ObjectKind::Barrel),
            _ => Err(QuotaError::InvalidKind(s.to_string())),
        }
    }
}

/// Fixed-size table holding one value per [`ObjectKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KindTable<T> {
    slots: [T; 3],
}

impl<T> KindTable<T> {
    pub fn from_fn(mut f: impl FnMut(ObjectKind) -> T) -> Self {
        Self {
            slots: ObjectKind::ALL.map(&mut f),
        }
    }

    pub fn get(&self, kind: ObjectKind) -> &T {
        &self.slots[kind.index()]
    }

    pub fn set(&mut self, kind: ObjectKind, value: T) {
        self.slots[kind.index()] = value;
    }

    pub fn iter(&self) -> impl Iterator<Item = (ObjectKind, &T)> {
        ObjectKind::ALL.into_iter().zip(self.slots.iter())
    }
}

impl<T: Copy> KindTable<T> {
    pub fn filled(value: T) -> Self {
        Self { slots: [value; 3] }
    }
}
