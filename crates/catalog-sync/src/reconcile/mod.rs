//! # Reconciliation
//!
//! Brings user-selected remote entities into the local catalog.
//!
//! For every selected entity the engine looks up the local entity carrying
//! the same remote id and decides:
//!
//! - **create** when there is none,
//! - **update** when the remote payload differs from the stored snapshot on
//!   description, linkage or resolved price,
//! - **skip** otherwise.
//!
//! Items are written one at a time through the mutation throttle. Per-item
//! failures (missing linkage, store errors) are collected in the
//! [`RunSummary`]; the run itself always completes.
//!
//! ## Usage
//!
//! ```ignore
//! let engine = ReconciliationEngine::new(store, ThrottleConfig::default());
//! let mut progress = engine.subscribe();
//!
//! let summary = engine
//!     .reconcile_from_store(selected, &ctx, &cancel)
//!     .await?;
//!
//! if summary.has_failures() {
//!     retry_later(summary.failed_remote_ids());
//! }
//! ```

mod diff;
mod engine;
mod summary;

pub use diff::{
    category_changed, merge_category, merge_product, merge_table, product_changed, table_changed,
};
pub use engine::ReconciliationEngine;
pub use summary::{EntityRef, FailedItem, FailureKind, Outcome, RunState, RunSummary};
