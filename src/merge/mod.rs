//! Duplication/merge engine
//!
//! Copies entities between banks (or inside one bank) together with their
//! dependencies. Name collisions are answered by a [`ConflictPolicy`] so the
//! engine never prompts on its own.

mod engine;
mod policy;

pub use engine::{
    collect_closure, disambiguate_name, free_preset_number, Closure, MergeEngine, MergeReport,
    MergeWarning, RemapTable, UnresolvedConflict, MAX_NAME_LEN,
};
pub use policy::{ConflictDecision, ConflictPolicy, FixedPolicy, NameConflict, Resolution};
