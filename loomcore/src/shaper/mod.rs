//! Translation agent state shaper: deterministic plan/taxonomy/checklist/context
//! fallbacks that run without an LLM call (§4.7).

pub mod checklist;
pub mod context_compression;
pub mod plan;
pub mod taxonomy;

pub use checklist::{Checklist, ChecklistEntry, ChecklistStage};
pub use context_compression::{compress_context, ContextSummary};
pub use plan::{Plan, Qc, QcLevel, Strategy};
pub use taxonomy::{derive_taxonomy, fallback_category_from_hint, DerivedTaxonomy};
