//! weaver-style: Range-scoped style engine for contenteditable editors.
//!
//! This crate provides:
//! - `DocumentModel` / `EditorHost` traits the engine mutates and queries
//! - `ClassApplier` - wrap, unwrap and toggle a class over a range
//! - Cleanup passes that strip attributes and unwrap bare wrappers
//! - `NumericStyleController` - bounded numeric slots, autofit, key-repeat fast path
//! - `EventCoalescer` - key-repeat channel filter and debounced change notifications
//! - `StyleEngine<H>` - the façade tying them together, generic over the host
//! - `MemoryDocument` / `MemoryHost` - in-memory doubles with a markup reader

pub mod applier;
pub mod bus;
pub mod catalog;
pub mod cleanup;
pub mod coalescer;
pub mod config;
pub mod controller;
pub mod dom;
pub mod engine;
pub mod error;
pub mod host;
pub mod keymap;
pub mod memory;
pub mod range;
pub mod style;
pub mod types;

pub use applier::ClassApplier;
pub use bus::{Channel, Event, EventBus, SubscriptionId};
pub use catalog::{CatalogEntry, ClassCatalog};
pub use cleanup::{CleanupOutcome, CleanupPass, element_cleanup, recursive_cleanup};
pub use coalescer::EventCoalescer;
pub use config::{ApplierOptions, ResetWhitelist, Slot, SlotConfig, StorageStrategy, StyleConfig};
pub use controller::{CycleOptions, NumericStyleController, StyleWrite, change_style};
pub use dom::{DocumentModel, NodeId, NodeKind};
pub use engine::StyleEngine;
pub use error::{ConfigError, MarkupError, RangeEdge, StyleError};
pub use host::{ChangeMetadata, EditorHost};
pub use keymap::{KeyCombo, Keymap, Shortcut};
pub use memory::{MemoryDocument, MemoryHost, Width};
pub use range::{Boundary, Range, SelectionState};
pub use smol_str::SmolStr;
pub use types::{Direction, Mutation, NoOpReason};
pub use web_time::{Duration, Instant};
