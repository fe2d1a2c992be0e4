//! Name-collision decisions

use serde::{Deserialize, Serialize};

use crate::bank::{EntityKind, EntityRef};

/// Answer to a name collision
///
/// The `*All` variants also answer every later collision of the same entity
/// kind for the rest of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictDecision {
    Replace,
    ReplaceAll,
    Duplicate,
    DuplicateAll,
    Ignore,
    IgnoreAll,
}

impl ConflictDecision {
    pub fn is_sticky(self) -> bool {
        matches!(
            self,
            ConflictDecision::ReplaceAll
                | ConflictDecision::DuplicateAll
                | ConflictDecision::IgnoreAll
        )
    }

    pub fn resolution(self) -> Resolution {
        match self {
            ConflictDecision::Replace | ConflictDecision::ReplaceAll => Resolution::Replace,
            ConflictDecision::Duplicate | ConflictDecision::DuplicateAll => Resolution::Duplicate,
            ConflictDecision::Ignore | ConflictDecision::IgnoreAll => Resolution::Ignore,
        }
    }
}

/// What actually happens to a colliding entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Overwrite the destination entity's content and keep its id
    Replace,
    /// Copy under a disambiguated name
    Duplicate,
    /// Keep the destination entity and point references at it
    Ignore,
}

/// A source entity whose name already exists in the destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameConflict<'a> {
    pub kind: EntityKind,
    pub name: &'a str,
    pub source: EntityRef,
    pub existing: EntityRef,
}

/// Decides name collisions during a merge run
///
/// Returning `None` declines to answer.
pub trait ConflictPolicy {
    fn decide(&mut self, conflict: &NameConflict<'_>) -> Option<ConflictDecision>;
}

impl<F> ConflictPolicy for F
where
    F: FnMut(&NameConflict<'_>) -> Option<ConflictDecision>,
{
    fn decide(&mut self, conflict: &NameConflict<'_>) -> Option<ConflictDecision> {
        self(conflict)
    }
}

/// Policy answering every collision the same way
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedPolicy(pub ConflictDecision);

impl ConflictPolicy for FixedPolicy {
    fn decide(&mut self, _conflict: &NameConflict<'_>) -> Option<ConflictDecision> {
        Some(self.0)
    }
}
