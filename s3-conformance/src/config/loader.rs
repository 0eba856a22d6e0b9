/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::config::{Builder, Profile};
use crate::error::Error;
use crate::probe::ProbeConfig;
use crate::types::{ConcurrencySetting, PartSize};
use crate::Config;

/// Environment variable pointing at the params file
pub const CONFIG_ENV_VAR: &str = "CONFIG";

/// Params file used when neither an explicit path nor [`CONFIG_ENV_VAR`] is given
pub const DEFAULT_CONFIG_PATH: &str = "params.yaml";

/// Load [`Config`] from a YAML params file.
///
/// ```yaml
/// profiles:
///   - name: owner
///     region: br-ne1
///     endpoint: https://br-ne1.example.com
///     access_key: AKID
///     secret_key: secret
///     lock_mode: GOVERNANCE
///   - name: guest            # resolved through ~/.aws/config
/// probe:
///   max_attempts: 10
///   reads_per_attempt: 5
///   base_interval_ms: 1000
/// transfer:
///   concurrency: 8
///   multipart_threshold: 8388608
///   part_size: 8388608
/// ```
#[derive(Default, Debug)]
pub struct ConfigLoader {
    path: Option<PathBuf>,
    probe: Option<ProbeConfig>,
    concurrency: Option<ConcurrencySetting>,
    multipart_threshold: Option<PartSize>,
    part_size: Option<PartSize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ParamsFile {
    #[serde(default)]
    profiles: Vec<Profile>,
    #[serde(default)]
    probe: Option<ProbeSection>,
    #[serde(default)]
    transfer: Option<TransferSection>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProbeSection {
    max_attempts: Option<u32>,
    reads_per_attempt: Option<u32>,
    base_interval_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TransferSection {
    concurrency: Option<usize>,
    multipart_threshold: Option<u64>,
    part_size: Option<u64>,
}

impl ConfigLoader {
    /// Read the params file at `path` instead of `$CONFIG` or `params.yaml`.
    ///
    /// A missing file at an explicit path is an error, a missing default file loads an
    /// empty profile list.
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Override the probe settings from the params file.
    pub fn probe(mut self, probe: ProbeConfig) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Override the bulk transfer concurrency from the params file.
    pub fn concurrency(mut self, concurrency: ConcurrencySetting) -> Self {
        self.concurrency = Some(concurrency);
        self
    }

    /// Override the multipart threshold from the params file.
    pub fn multipart_threshold(mut self, threshold: PartSize) -> Self {
        self.multipart_threshold = Some(threshold);
        self
    }

    /// Override the multipart part size from the params file.
    pub fn part_size(mut self, part_size: PartSize) -> Self {
        self.part_size = Some(part_size);
        self
    }

    /// Load the configuration
    ///
    /// If fields have been overridden on the loader, the override values will be used.
    /// Otherwise values from the params file, then defaults, are used.
    pub async fn load(self) -> Result<Config, Error> {
        let (path, explicit) = match (&self.path, std::env::var_os(CONFIG_ENV_VAR)) {
            (Some(path), _) => (path.clone(), true),
            (None, Some(env)) => (PathBuf::from(env), true),
            (None, None) => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
        };

        let params = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => parse(&contents)?,
            Err(err) if !explicit && err.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    "no params file at {}, continuing without profiles",
                    path.display()
                );
                ParamsFile::default()
            }
            Err(err) => return Err(err.into()),
        };
        tracing::debug!(
            "loaded {} profile(s) from {}",
            params.profiles.len(),
            path.display()
        );

        Ok(self.apply(params))
    }

    /// Load the configuration from an in-memory YAML document.
    pub fn load_str(self, contents: &str) -> Result<Config, Error> {
        let params = parse(contents)?;
        Ok(self.apply(params))
    }

    fn apply(self, params: ParamsFile) -> Config {
        let mut builder = Builder::default();
        for profile in params.profiles {
            builder = builder.profile(profile);
        }

        if let Some(probe) = params.probe {
            let mut probe_config = ProbeConfig::builder();
            if let Some(max_attempts) = probe.max_attempts {
                probe_config = probe_config.max_attempts(max_attempts);
            }
            if let Some(reads) = probe.reads_per_attempt {
                probe_config = probe_config.reads_per_attempt(reads);
            }
            if let Some(interval) = probe.base_interval_ms {
                probe_config = probe_config.base_interval(Duration::from_millis(interval));
            }
            builder = builder.probe(probe_config.build());
        }

        if let Some(transfer) = params.transfer {
            if let Some(concurrency) = transfer.concurrency {
                builder = builder.concurrency(ConcurrencySetting::Explicit(concurrency));
            }
            if let Some(threshold) = transfer.multipart_threshold {
                builder = builder.multipart_threshold(PartSize::Target(threshold));
            }
            if let Some(part_size) = transfer.part_size {
                builder = builder.part_size(PartSize::Target(part_size));
            }
        }

        if let Some(probe) = self.probe {
            builder = builder.probe(probe);
        }
        if let Some(concurrency) = self.concurrency {
            builder = builder.concurrency(concurrency);
        }
        if let Some(threshold) = self.multipart_threshold {
            builder = builder.multipart_threshold(threshold);
        }
        if let Some(part_size) = self.part_size {
            builder = builder.part_size(part_size);
        }

        builder.build()
    }
}

fn parse(contents: &str) -> Result<ParamsFile, Error> {
    let params: ParamsFile = serde_yaml::from_str(contents)?;
    for profile in &params.profiles {
        profile.validate()?;
    }
    Ok(params)
}
