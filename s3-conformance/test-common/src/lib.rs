/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::fs;
use std::path::PathBuf;
use std::sync::Once;
use std::time::Duration;

use s3_conformance::client::{create_client, create_clients, Clients};
use s3_conformance::config::Profile;
use s3_conformance::probe::ProbeConfig;
use s3_conformance::types::{ConcurrencySetting, LockMode};
use s3_conformance::{Client, Config};
use tempfile::TempDir;

/// Install a `tracing` subscriber writing to the test harness once per process.
///
/// Filtering follows `RUST_LOG`.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Config whose prober never sleeps and gives up after `max_attempts`.
pub fn instant_config(max_attempts: u32) -> Config {
    Config::builder()
        .probe(
            ProbeConfig::builder()
                .max_attempts(max_attempts)
                .reads_per_attempt(2)
                .base_interval(Duration::ZERO)
                .build(),
        )
        .concurrency(ConcurrencySetting::Explicit(4))
        .build()
}

/// Bind a (mocked) SDK client to a plain owner profile with an instant prober.
pub fn client(s3: aws_sdk_s3::Client) -> Client {
    Client::new(Profile::named("owner"), s3, &instant_config(5))
}

/// Like [`client`] for a profile whose buckets are locked in `mode`.
pub fn locked_client(s3: aws_sdk_s3::Client, mode: LockMode) -> Client {
    Client::new(
        Profile::named("owner").with_lock_mode(mode),
        s3,
        &instant_config(5),
    )
}

/// Write `contents` to `params.yaml` inside a fresh temporary directory.
///
/// The directory is removed when the returned [`TempDir`] is dropped.
pub fn write_params(contents: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::with_prefix("s3-conformance-").unwrap();
    let path = dir.path().join("params.yaml");
    fs::write(&path, contents).unwrap();
    (dir, path)
}

async fn load_config() -> Option<Config> {
    match s3_conformance::from_env().load().await {
        Ok(config) => Some(config),
        Err(err) if err.is_skip() => {
            tracing::warn!("skipping: {err}");
            None
        }
        Err(err) => panic!("failed to load params: {err}"),
    }
}

/// Client for the active profile (`PROFILE`, default `default`), `None` when it is not
/// configured.
pub async fn owner() -> Option<Client> {
    init_tracing();
    let config = load_config().await?;
    let profile = match config.active_profile() {
        Ok(profile) => profile.clone(),
        Err(err) => {
            tracing::warn!("skipping: {err}");
            return None;
        }
    };
    Some(create_client(&profile, &config).await.unwrap())
}

/// Clients for the first two configured profiles, owner first, `None` with fewer than two.
pub async fn owner_and_guest() -> Option<Clients> {
    init_tracing();
    let config = load_config().await?;
    let names: Vec<&str> = config.profiles().iter().map(Profile::name).take(2).collect();
    if names.len() < 2 {
        tracing::warn!("skipping: two profiles are required, {} configured", names.len());
        return None;
    }
    Some(create_clients(&config, &names).await.unwrap())
}

/// Unwrap an `Option` produced by the profile helpers, returning from the test when it is
/// `None`.
#[macro_export]
macro_rules! require {
    ($e:expr) => {
        match $e {
            Some(value) => value,
            None => return,
        }
    };
}
