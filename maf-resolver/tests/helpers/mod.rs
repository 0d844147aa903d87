//! Test Helper Utilities
//!
//! Shared fixtures for maf-resolver integration tests

#![allow(dead_code)]

pub mod mock_catalogs;
pub mod mock_source;

pub use mock_catalogs::{
    spawn_catalog_a, spawn_catalog_b, CatalogAMock, CatalogBMock, CatalogBReply, CLIENT_ID,
    CLIENT_SECRET,
};
pub use mock_source::{candidate, guarded, quick_policy, MockSource};
