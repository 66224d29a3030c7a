//! HTTP client for the PPC control plane
//!
//! [`Client`] owns the connection pool, authentication and retry policy.
//! Typed accessors hang off [`Client::cloud`], one per resource kind.

pub mod client;
pub mod cloud_instance;
pub mod common;
pub mod error;
pub mod images;
pub mod instances;
pub mod jobs;
pub mod keys;
pub mod networks;
pub mod placement_groups;
pub mod pool;
pub mod sap;
pub mod snapshots;
pub mod storage_capacity;
pub mod volume_groups;
pub mod volumes;

#[cfg(test)]
pub mod test_helpers;

pub use client::{Client, RetryConfig};
pub use cloud_instance::CloudApi;
pub use common::{ApiErrorDetails, ApiQueryParams, JobReference, NetworkAttachment, StorageAffinity};
pub use error::ApiError;
