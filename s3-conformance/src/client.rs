/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::ops::Index;
use std::sync::Arc;

use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Credentials;
use aws_types::region::Region;

use crate::config::{Profile, TransferConfig};
use crate::error::{self, Error, ErrorKind};
use crate::probe::Prober;
use crate::types::{ConcurrencySetting, PartSize};
use crate::{Config, DEFAULT_CONCURRENCY, MEBIBYTE};

/// Region buckets are created in without a `LocationConstraint`
pub const DEFAULT_REGION: &str = "us-east-1";

const CREDENTIALS_PROVIDER_NAME: &str = "s3-conformance-profile";

/// An S3 client bound to one [`Profile`] together with the prober and transfer settings used by
/// fixture operations. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct Client {
    pub(crate) handle: Arc<Handle>,
}

/// Whatever is needed to carry out operations for one identity
#[derive(Debug)]
pub(crate) struct Handle {
    pub(crate) profile: Profile,
    pub(crate) s3: aws_sdk_s3::Client,
    pub(crate) prober: Prober,
    pub(crate) transfer: TransferConfig,
}

impl Handle {
    /// Get the concrete number of workers to use based on the concurrency setting.
    pub(crate) fn num_workers(&self) -> usize {
        match self.transfer.concurrency() {
            ConcurrencySetting::Explicit(concurrency) => (*concurrency).max(1),
            ConcurrencySetting::Auto => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(DEFAULT_CONCURRENCY),
        }
    }

    /// Get the concrete minimum upload size in bytes that switches to multipart uploads.
    pub(crate) fn mpu_threshold_bytes(&self) -> u64 {
        match self.transfer.multipart_threshold() {
            PartSize::Auto => 8 * MEBIBYTE,
            PartSize::Target(explicit) => *explicit,
        }
    }

    /// Get the concrete target part size to use for multipart transfers
    pub(crate) fn part_size_bytes(&self) -> u64 {
        match self.transfer.part_size() {
            PartSize::Auto => 8 * MEBIBYTE,
            PartSize::Target(explicit) => *explicit,
        }
    }
}

impl Client {
    /// Bind an existing SDK client to a profile.
    pub fn new(profile: Profile, s3: aws_sdk_s3::Client, config: &Config) -> Client {
        let handle = Arc::new(Handle {
            profile,
            s3,
            prober: Prober::new(config.probe().clone()),
            transfer: config.transfer().clone(),
        });
        Client { handle }
    }

    /// The profile this client authenticates as
    pub fn profile(&self) -> &Profile {
        &self.handle.profile
    }

    /// The underlying SDK client, for requests the fixture layer does not wrap
    pub fn s3(&self) -> &aws_sdk_s3::Client {
        &self.handle.s3
    }

    /// The convergence prober configured for this client
    pub fn prober(&self) -> &Prober {
        &self.handle.prober
    }

    /// The region the SDK client is configured for
    pub fn region(&self) -> Option<&str> {
        self.handle.s3.config().region().map(|r| r.as_ref())
    }

    /// The canonical ID of the account behind this client, taken from the `ListBuckets` owner.
    #[tracing::instrument(skip(self), fields(profile = self.profile().name()))]
    pub async fn canonical_id(&self) -> Result<String, Error> {
        let output = self.handle.s3.list_buckets().send().await?;
        output
            .owner()
            .and_then(|owner| owner.id())
            .map(str::to_owned)
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::NotFound,
                    "ListBuckets response did not include an owner id",
                )
            })
    }
}

/// Build an authenticated client for `profile`.
///
/// Profiles with explicit credentials use static credentials, their region and endpoint and
/// path-style addressing. Other profiles resolve through the AWS shared config files.
pub async fn create_client(profile: &Profile, config: &Config) -> Result<Client, Error> {
    let shared_config = match profile.credentials() {
        Some((access_key, secret_key)) => {
            let credentials = Credentials::new(
                access_key,
                secret_key,
                None,
                None,
                CREDENTIALS_PROVIDER_NAME,
            );
            let mut loader = aws_config::defaults(BehaviorVersion::latest())
                .region(Region::new(
                    profile.region().unwrap_or(DEFAULT_REGION).to_owned(),
                ))
                .credentials_provider(credentials);
            if let Some(endpoint) = profile.endpoint() {
                loader = loader.endpoint_url(endpoint);
            }
            loader.load().await
        }
        None => {
            let mut loader = aws_config::from_env().profile_name(profile.name());
            if let Some(region) = profile.region() {
                loader = loader.region(Region::new(region.to_owned()));
            }
            if let Some(endpoint) = profile.endpoint() {
                loader = loader.endpoint_url(endpoint);
            }
            loader.load().await
        }
    };

    let s3_config = aws_sdk_s3::config::Builder::from(&shared_config)
        .force_path_style(profile.endpoint().is_some())
        .build();
    tracing::debug!(profile = profile.name(), "created client");
    Ok(Client::new(
        profile.clone(),
        aws_sdk_s3::Client::from_conf(s3_config),
        config,
    ))
}

/// Build one client per profile name. The first name is the owner.
///
/// Any name missing from the configuration yields
/// [`ErrorKind::ProfileUnavailable`](crate::error::ErrorKind::ProfileUnavailable).
pub async fn create_clients(config: &Config, names: &[&str]) -> Result<Clients, Error> {
    if names.is_empty() {
        return Err(error::invalid_input("at least one profile name is required"));
    }

    let mut clients = Vec::with_capacity(names.len());
    for name in names {
        let profile = config.profile(name)?;
        clients.push(create_client(profile, config).await?);
    }
    Ok(Clients { clients })
}

/// Several clients addressed by index, index 0 is the owner of the resources under test.
#[derive(Debug, Clone)]
pub struct Clients {
    clients: Vec<Client>,
}

impl Clients {
    /// Group already built clients. Fails if `clients` is empty.
    pub fn new(clients: Vec<Client>) -> Result<Self, Error> {
        if clients.is_empty() {
            return Err(error::invalid_input("at least one client is required"));
        }
        Ok(Clients { clients })
    }

    /// The client owning the resources under test
    pub fn owner(&self) -> &Client {
        &self.clients[0]
    }

    /// The second identity. Missing it is
    /// [`ErrorKind::ProfileUnavailable`](crate::error::ErrorKind::ProfileUnavailable).
    pub fn guest(&self) -> Result<&Client, Error> {
        self.clients.get(1).ok_or_else(|| {
            Error::new(
                ErrorKind::ProfileUnavailable,
                "a second profile is required",
            )
        })
    }

    /// Number of clients
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Always false, a `Clients` holds at least the owner
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Iterate over all clients, owner first
    pub fn iter(&self) -> impl Iterator<Item = &Client> {
        self.clients.iter()
    }
}

impl Index<usize> for Clients {
    type Output = Client;

    fn index(&self, index: usize) -> &Self::Output {
        &self.clients[index]
    }
}
