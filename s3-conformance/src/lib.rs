/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

/* Automatically managed default lints */
#![cfg_attr(docsrs, feature(doc_auto_cfg))]
/* End of automatically managed default lints */

//! Conformance fixtures for S3-compatible object storage
//!
//! This crate provides the building blocks used by conformance suites that exercise an
//! S3-compatible endpoint: authenticated clients built from named profiles, collision-free
//! bucket names, a convergence prober for eventually-consistent reads, a resource lifecycle
//! manager that can tear down locked and versioned buckets, scenario fixtures composed from
//! those pieces and worker-pool based bulk transfer helpers.
//!
//! # Example
//!
//! ```no_run
//! # async fn example() -> Result<(), s3_conformance::error::Error> {
//! let config = s3_conformance::from_env().load().await?;
//! let client = s3_conformance::client::create_client(config.profile("default")?, &config).await?;
//!
//! let fixture = s3_conformance::scenario::bucket_with_one_object(&client, "my-test").await?;
//! // ... assert against fixture.value() ...
//! fixture.teardown().await;
//! # Ok(())
//! # }
//! ```

#![warn(
    missing_debug_implementations,
    missing_docs,
    rustdoc::missing_crate_level_docs,
    unreachable_pub,
    rust_2018_idioms
)]

pub(crate) const MEBIBYTE: u64 = 1024 * 1024;

pub(crate) const DEFAULT_CONCURRENCY: usize = 8;

/// Error types emitted by `s3-conformance`
pub mod error;

/// Common types used by `s3-conformance`
pub mod types;

/// Client factory for building authenticated S3 clients from profiles
pub mod client;

/// Collision-free, protocol-valid resource names
pub mod naming;

/// Convergence polling for eventually consistent reads and writes
pub mod probe;

/// Bucket policy documents
pub mod policy;

/// Resource lifecycle and transfer operations
pub mod operation;

/// Enum-keyed operation dispatch used by permission matrices
pub mod permission;

/// Named preconditions with reverse-order teardown
pub mod scenario;

/// External command line tools driven as black boxes
pub mod cli;

/// Configuration for profiles, probing and transfers
pub mod config;

pub use self::client::Client;
pub use self::config::Config;

use self::config::loader::ConfigLoader;

/// Load a [`Config`] from the environment, see [`ConfigLoader`] for overrides.
pub fn from_env() -> ConfigLoader {
    ConfigLoader::default()
}
