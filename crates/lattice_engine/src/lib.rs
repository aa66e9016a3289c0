//! On-demand evaluation for Lattice.
//!
//! This crate provides:
//! - [`Registry`] - Allocation of stable function ids and their callables
//! - [`Evaluator`] - Cache-first resolution with dependency recording,
//!   recursion detection, derivative publication, and cascading writes

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod eval;
mod registry;

pub use eval::Evaluator;
pub use registry::{EffectFn, PredicateFn, Registry, SetterFn};
