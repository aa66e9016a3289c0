//! Lattice - Expression-keyed incremental computation engine
//!
//! This crate re-exports all layers of the Lattice system for convenient access.
//! For detailed documentation, see the individual layer crates.
//!
//! # Architecture
//!
//! ```text
//! Layer 3: lattice_reactor    — Subscribers, flush, async effect bridge
//! Layer 2: lattice_engine     — Evaluator, registry, derivatives, cascades
//! Layer 1: lattice_store      — Persistent cache + dependency indices
//! Layer 0: lattice_foundation — Core types (Term, Expr, Value, Error)
//! ```

pub use lattice_engine as engine;
pub use lattice_foundation as foundation;
pub use lattice_reactor as reactor;
pub use lattice_store as store;
