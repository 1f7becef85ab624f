//! Partial-update fields that distinguish "leave unchanged" from "clear".
//!
//! A field absent from the payload deserializes to [`Patch::Missing`] (via
//! `#[serde(default)]`), an explicit `null` to [`Patch::Clear`], and any
//! other value to [`Patch::Set`].

use serde::{Deserialize, Deserializer};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub enum Patch<T> {
    Missing,
    Clear,
    Set(T),
}

impl<T> Default for Patch<T> {
    fn default() -> Self {
        Patch::Missing
    }
}

impl<T> Patch<T> {
    pub fn is_missing(&self) -> bool {
        matches!(self, Patch::Missing)
    }

    pub fn is_set(&self) -> bool {
        matches!(self, Patch::Set(_))
    }

    /// Applies the patch to a nullable target.
    pub fn apply_to(self, target: &mut Option<T>) {
        match self {
            Patch::Missing => {}
            Patch::Clear => *target = None,
            Patch::Set(value) => *target = Some(value),
        }
    }
}

impl<'de, T> Deserialize<'de> for Patch<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(|value| match value {
            Some(value) => Patch::Set(value),
            None => Patch::Clear,
        })
    }
}

/// Id field where `null` and `""` both mean "clear".
pub fn id_or_empty<'de, D>(deserializer: D) -> Result<Patch<Uuid>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(Patch::Clear),
        Some(id) => Uuid::parse_str(id)
            .map(Patch::Set)
            .map_err(serde::de::Error::custom),
    }
}
