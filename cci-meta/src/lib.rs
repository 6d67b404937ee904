//! cci-meta: Catalog generator for ConanCenter recipes
//!
//! This crate provides tools for:
//! - Walking a conan-center-index recipe corpus
//! - Reading description and license through `conan inspect`, with a
//!   static fallback
//! - Reconciling published versions from a remote
//! - Resolving build-system properties by installing packages the static
//!   extractor could not handle
//! - Aggregating everything into one JSON catalog

pub mod catalog;
pub mod config;
pub mod conan;
pub mod corpus;
pub mod error;
pub mod inspect;
pub mod pipeline;
pub mod registry;
pub mod resolve;

#[cfg(test)]
pub(crate) mod testing;

pub use catalog::{Catalog, Outcome, PackageRecord, Report};
pub use config::Settings;
pub use conan::{ConanApi, ConanCli};
pub use error::{Error, Result};
pub use pipeline::Pipeline;
