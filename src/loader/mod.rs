//! Loading assemblies from inputs of known or unknown format.
//!
//! - [`registry`]: the ordered format table and decoder dispatch
//! - [`state`]: per-input stream state carried across chunk calls
//! - [`engine`]: format probing and the pinned-format retry loop
//! - [`facade`]: [`Loader`](facade::Loader), one chunk per call across all inputs of a query

pub mod engine;
pub mod facade;
pub mod registry;
pub mod state;
