//! Core types, terms, expressions, and persistent collections for Lattice.
//!
//! This crate provides:
//! - [`Term`] and [`Expr`] - The cache-key language of the engine
//! - [`Value`] - The result payload cached for computed expressions
//! - [`DerivativeId`] - Identity pairs coupling expressions to the
//!   computation that created them
//! - [`TagId`], [`FnId`], [`Interner`] - Interned tags and stable function
//!   identities
//! - [`Error`] - Error taxonomy with the cache-capture policy
//! - Persistent collections ([`LatVec`], [`LatSet`], [`LatMap`])

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod collections;
mod error;
mod expr;
mod intern;
mod term;
mod value;

pub use collections::{LatMap, LatSet, LatVec};
pub use error::{Error, ErrorKind, Result};
pub use expr::Expr;
pub use intern::{FnId, Interner, TagId};
pub use term::{DerivativeId, Term};
pub use value::Value;
