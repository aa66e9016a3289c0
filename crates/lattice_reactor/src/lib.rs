//! Reactive layer for Lattice.
//!
//! This crate provides:
//! - [`Reactor`] - The live layer: published store, subscribers, deferred
//!   notification flush, and memoised async effect runs
//! - [`AsyncBridge`] - Reserved-tag call bookkeeping and the cacheable
//!   bridge predicates (`result-is-ready` and friends)
//! - [`Subscription`] - Detachable callback handles

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod bridge;
mod reactor;

pub use bridge::AsyncBridge;
pub use reactor::{Reactor, SharedRun, Subscription};
