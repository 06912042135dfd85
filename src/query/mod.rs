//! Query handling: which inputs to read and which decoded data to keep.
//!
//! - [`resolve`] expands a query string (`fmt::path`, `path:id`, `@listfile`) into inputs
//! - [`matcher`] accepts or rejects decoded assemblies against `id` wildcard constraints

pub mod matcher;
pub mod resolve;
