/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use aws_sdk_s3::primitives::DateTime;
use aws_sdk_s3::types::{
    DefaultRetention, ObjectLockConfiguration, ObjectLockEnabled, ObjectLockRetention,
    ObjectLockRetentionMode, ObjectLockRule,
};

use crate::error::Error;
use crate::types::LockMode;
use crate::Client;

/// Default retention applied to new object versions of a locked bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retention {
    mode: LockMode,
    days: i32,
}

impl Retention {
    /// Retain new versions in `mode` for `days`.
    pub fn new(mode: LockMode, days: i32) -> Self {
        Retention { mode, days }
    }

    /// The retention mode
    pub fn mode(&self) -> LockMode {
        self.mode
    }

    /// The retention period in days
    pub fn days(&self) -> i32 {
        self.days
    }
}

/// The lock configuration of a bucket as read back from the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockConfiguration {
    enabled: bool,
    retention: Option<Retention>,
}

impl LockConfiguration {
    /// Whether object lock is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The default retention, if a rule is configured
    pub fn retention(&self) -> Option<Retention> {
        self.retention
    }
}

fn lock_mode(mode: Option<&ObjectLockRetentionMode>) -> Option<LockMode> {
    match mode {
        Some(ObjectLockRetentionMode::Governance) => Some(LockMode::Governance),
        Some(ObjectLockRetentionMode::Compliance) => Some(LockMode::Compliance),
        _ => None,
    }
}

/// Read the lock configuration of `bucket`. `None` when the bucket has none.
pub async fn lock_configuration(
    client: &Client,
    bucket: &str,
) -> Result<Option<LockConfiguration>, Error> {
    let result = client
        .s3()
        .get_object_lock_configuration()
        .bucket(bucket)
        .send()
        .await
        .map_err(Error::from);
    let output = match result {
        Ok(output) => output,
        Err(err) if err.code() == Some("ObjectLockConfigurationNotFoundError") => return Ok(None),
        Err(err) if err.is_not_found() => return Ok(None),
        Err(err) => return Err(err),
    };

    Ok(output.object_lock_configuration().map(|config| {
        let retention = config
            .rule()
            .and_then(|rule| rule.default_retention())
            .and_then(|default| {
                let mode = lock_mode(default.mode())?;
                Some(Retention::new(mode, default.days().unwrap_or_default()))
            });
        LockConfiguration {
            enabled: config.object_lock_enabled() == Some(&ObjectLockEnabled::Enabled),
            retention,
        }
    }))
}

/// Enable object lock on `bucket` with an optional default retention and wait until reads
/// report it.
///
/// The bucket must already have versioning enabled. A service rejection such as
/// `InvalidBucketState` is returned unchanged and never repaired.
#[tracing::instrument(skip(client))]
pub async fn put_lock_configuration_and_confirm(
    client: &Client,
    bucket: &str,
    retention: Option<Retention>,
) -> Result<(), Error> {
    let rule = retention.map(|retention| {
        ObjectLockRule::builder()
            .default_retention(
                DefaultRetention::builder()
                    .mode(retention.mode.into())
                    .days(retention.days)
                    .build(),
            )
            .build()
    });
    let configuration = ObjectLockConfiguration::builder()
        .object_lock_enabled(ObjectLockEnabled::Enabled)
        .set_rule(rule)
        .build();

    client
        .s3()
        .put_object_lock_configuration()
        .bucket(bucket)
        .object_lock_configuration(configuration)
        .send()
        .await?;

    let expected = LockConfiguration {
        enabled: true,
        retention,
    };
    client
        .prober()
        .probe(
            || lock_configuration(client, bucket),
            |config| config.as_ref() == Some(&expected),
        )
        .await?
        .into_stable("object lock configuration")?;
    tracing::debug!("object lock configured");
    Ok(())
}

/// Retention of one object version: mode and retain-until date. `None` when not retained.
pub async fn object_retention(
    client: &Client,
    bucket: &str,
    key: &str,
    version_id: Option<&str>,
) -> Result<Option<(LockMode, DateTime)>, Error> {
    let result = client
        .s3()
        .get_object_retention()
        .bucket(bucket)
        .key(key)
        .set_version_id(version_id.map(str::to_owned))
        .send()
        .await
        .map_err(Error::from);
    let output = match result {
        Ok(output) => output,
        Err(err) if err.code() == Some("NoSuchObjectLockConfiguration") => return Ok(None),
        Err(err) => return Err(err),
    };

    Ok(output.retention().and_then(|retention| {
        let mode = lock_mode(retention.mode())?;
        Some((mode, *retention.retain_until_date()?))
    }))
}

/// Apply retention to an existing object version.
pub async fn put_object_retention(
    client: &Client,
    bucket: &str,
    key: &str,
    version_id: Option<&str>,
    mode: LockMode,
    retain_until: DateTime,
) -> Result<(), Error> {
    client
        .s3()
        .put_object_retention()
        .bucket(bucket)
        .key(key)
        .set_version_id(version_id.map(str::to_owned))
        .retention(
            ObjectLockRetention::builder()
                .mode(mode.into())
                .retain_until_date(retain_until)
                .build(),
        )
        .send()
        .await?;
    Ok(())
}
