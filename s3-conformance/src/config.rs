/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::cmp;

use serde::Deserialize;

use crate::error::{self, Error};
use crate::probe::ProbeConfig;
use crate::types::{ConcurrencySetting, LockMode, PartSize};
use crate::MEBIBYTE;

/// Load configuration from a YAML params file
pub mod loader;

/// Minimum upload part size in bytes
const MIN_MULTIPART_PART_SIZE_BYTES: u64 = 5 * MEBIBYTE;

/// Environment variable naming the profile used by single-client tests
pub const PROFILE_ENV_VAR: &str = "PROFILE";

/// Profile name used when [`PROFILE_ENV_VAR`] is not set
pub const DEFAULT_PROFILE: &str = "default";

/// A named identity used to talk to the endpoint under test.
///
/// A profile either carries explicit credentials (access key, secret key, region and endpoint)
/// or only a name, in which case credentials and region are resolved through the AWS shared
/// config files for that profile name.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Profile {
    name: String,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    endpoint: Option<String>,
    #[serde(default)]
    access_key: Option<String>,
    #[serde(default)]
    secret_key: Option<String>,
    #[serde(default)]
    lock_mode: Option<LockMode>,
    #[serde(default)]
    mgc_path: Option<String>,
}

impl Profile {
    /// A profile resolved through the AWS shared config chain.
    pub fn named(name: impl Into<String>) -> Self {
        Profile {
            name: name.into(),
            region: None,
            endpoint: None,
            access_key: None,
            secret_key: None,
            lock_mode: None,
            mgc_path: None,
        }
    }

    /// A profile with explicit static credentials.
    pub fn explicit(
        name: impl Into<String>,
        region: impl Into<String>,
        endpoint: impl Into<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Profile {
            region: Some(region.into()),
            endpoint: Some(endpoint.into()),
            access_key: Some(access_key.into()),
            secret_key: Some(secret_key.into()),
            ..Profile::named(name)
        }
    }

    /// Set the retention mode buckets of this profile are locked with.
    pub fn with_lock_mode(mut self, lock_mode: LockMode) -> Self {
        self.lock_mode = Some(lock_mode);
        self
    }

    /// The profile name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The region, if explicitly configured
    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    /// The endpoint URL, if explicitly configured
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    /// The access key and secret key pair when the profile carries explicit credentials
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.access_key, &self.secret_key) {
            (Some(access), Some(secret)) => Some((access, secret)),
            _ => None,
        }
    }

    /// Retention mode used by locked buckets owned by this profile
    pub fn lock_mode(&self) -> Option<LockMode> {
        self.lock_mode
    }

    /// Path to the `mgc` binary for this profile, if configured
    pub fn mgc_path(&self) -> Option<&str> {
        self.mgc_path.as_deref()
    }

    pub(crate) fn validate(&self) -> Result<(), Error> {
        if self.name.is_empty() {
            return Err(error::invalid_config("profile name must not be empty"));
        }
        match (&self.access_key, &self.secret_key) {
            (Some(_), Some(_)) => {
                if self.region.is_none() || self.endpoint.is_none() {
                    return Err(error::invalid_config(format!(
                        "profile `{}` has explicit credentials but no region or endpoint",
                        self.name
                    )));
                }
                Ok(())
            }
            (None, None) => Ok(()),
            _ => Err(error::invalid_config(format!(
                "profile `{}` must set both access_key and secret_key",
                self.name
            ))),
        }
    }
}

/// Settings for bulk and multipart transfers
#[derive(Debug, Clone, Default)]
pub struct TransferConfig {
    concurrency: ConcurrencySetting,
    multipart_threshold: PartSize,
    part_size: PartSize,
}

impl TransferConfig {
    /// Returns the concurrency setting used by bulk transfer worker pools.
    pub fn concurrency(&self) -> &ConcurrencySetting {
        &self.concurrency
    }

    /// Returns a reference to the multipart upload threshold part size
    pub fn multipart_threshold(&self) -> &PartSize {
        &self.multipart_threshold
    }

    /// Returns a reference to the target part size to use for multipart transfers
    pub fn part_size(&self) -> &PartSize {
        &self.part_size
    }
}

/// Configuration for a [`Client`](crate::client::Client)
#[derive(Debug, Clone, Default)]
pub struct Config {
    profiles: Vec<Profile>,
    probe: ProbeConfig,
    transfer: TransferConfig,
}

impl Config {
    /// Create a new `Config` builder
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// All configured profiles
    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    /// Look up a profile by name.
    ///
    /// A missing profile is reported as
    /// [`ErrorKind::ProfileUnavailable`](crate::error::ErrorKind::ProfileUnavailable) so tests
    /// can skip rather than fail.
    pub fn profile(&self, name: &str) -> Result<&Profile, Error> {
        self.profiles
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| error::profile_unavailable(name))
    }

    /// The profile selected by the `PROFILE` environment variable, or `default`.
    pub fn active_profile(&self) -> Result<&Profile, Error> {
        let name =
            std::env::var(PROFILE_ENV_VAR).unwrap_or_else(|_| DEFAULT_PROFILE.to_owned());
        self.profile(&name)
    }

    /// Settings used by the convergence prober
    pub fn probe(&self) -> &ProbeConfig {
        &self.probe
    }

    /// Settings used by bulk and multipart transfers
    pub fn transfer(&self) -> &TransferConfig {
        &self.transfer
    }
}

/// Fluent style builder for [Config]
#[derive(Debug, Clone, Default)]
pub struct Builder {
    profiles: Vec<Profile>,
    probe: ProbeConfig,
    transfer: TransferConfig,
}

impl Builder {
    /// Add a profile. A later profile with the same name replaces the earlier one.
    pub fn profile(mut self, profile: Profile) -> Self {
        self.profiles.retain(|p| p.name != profile.name);
        self.profiles.push(profile);
        self
    }

    /// Settings for the convergence prober
    pub fn probe(mut self, probe: ProbeConfig) -> Self {
        self.probe = probe;
        self
    }

    /// Minimum object size that should trigger a multipart upload.
    ///
    /// The minimum part size is 5 MiB, any part size less than that will be rounded up.
    /// Default is [PartSize::Auto]
    pub fn multipart_threshold(mut self, threshold: PartSize) -> Self {
        self.transfer.multipart_threshold = clamp_part_size(threshold);
        self
    }

    /// The target size of each part when using a multipart upload.
    ///
    /// The minimum part size is 5 MiB, any part size less than that will be rounded up.
    /// Default is [PartSize::Auto]
    pub fn part_size(mut self, part_size: PartSize) -> Self {
        self.transfer.part_size = clamp_part_size(part_size);
        self
    }

    /// Set the number of workers bulk transfers are allowed to use.
    ///
    /// Default is [ConcurrencySetting::Auto].
    pub fn concurrency(mut self, concurrency: ConcurrencySetting) -> Self {
        self.transfer.concurrency = concurrency;
        self
    }

    /// Consumes the builder and constructs a [`Config`](crate::config::Config)
    pub fn build(self) -> Config {
        Config {
            profiles: self.profiles,
            probe: self.probe,
            transfer: self.transfer,
        }
    }
}

fn clamp_part_size(part_size: PartSize) -> PartSize {
    match part_size {
        PartSize::Target(size) => PartSize::Target(cmp::max(size, MIN_MULTIPART_PART_SIZE_BYTES)),
        auto => auto,
    }
}
