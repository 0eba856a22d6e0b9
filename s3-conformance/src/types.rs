/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::fmt;

use serde::Deserialize;

/// The target part size for a multipart upload or ranged download.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PartSize {
    /// Use the default part size (8 MiB).
    #[default]
    Auto,

    /// Target part size explicitly given.
    Target(u64),
}

/// The number of workers to use for bulk transfers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConcurrencySetting {
    /// Use the number of available CPUs.
    #[default]
    Auto,

    /// Explicitly configured concurrency setting.
    Explicit(usize),
}

/// Object lock retention mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LockMode {
    /// Versions can be deleted by callers allowed to bypass governance retention.
    Governance,
    /// Versions cannot be deleted by anyone until retention expires.
    Compliance,
}

impl LockMode {
    /// The wire value of the mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            LockMode::Governance => "GOVERNANCE",
            LockMode::Compliance => "COMPLIANCE",
        }
    }
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<LockMode> for aws_sdk_s3::types::ObjectLockRetentionMode {
    fn from(value: LockMode) -> Self {
        match value {
            LockMode::Governance => Self::Governance,
            LockMode::Compliance => Self::Compliance,
        }
    }
}

impl From<LockMode> for aws_sdk_s3::types::ObjectLockMode {
    fn from(value: LockMode) -> Self {
        match value {
            LockMode::Governance => Self::Governance,
            LockMode::Compliance => Self::Compliance,
        }
    }
}

/// Bucket versioning state as observed through `GetBucketVersioning`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersioningState {
    /// Versioning was never configured on the bucket.
    Unset,
    /// Versioning is enabled.
    Enabled,
    /// Versioning was enabled and later suspended.
    Suspended,
}

impl From<Option<&aws_sdk_s3::types::BucketVersioningStatus>> for VersioningState {
    fn from(value: Option<&aws_sdk_s3::types::BucketVersioningStatus>) -> Self {
        use aws_sdk_s3::types::BucketVersioningStatus;
        match value {
            Some(BucketVersioningStatus::Enabled) => VersioningState::Enabled,
            Some(BucketVersioningStatus::Suspended) => VersioningState::Suspended,
            _ => VersioningState::Unset,
        }
    }
}

/// Canned ACLs understood by the bucket and object ACL APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CannedAcl {
    /// Owner gets full control, nobody else has access.
    Private,
    /// Anyone can read.
    PublicRead,
    /// Anyone can read and write.
    PublicReadWrite,
    /// Authenticated users can read.
    AuthenticatedRead,
    /// Bucket owner can read the object.
    BucketOwnerRead,
    /// Bucket owner gets full control of the object.
    BucketOwnerFullControl,
    /// Log delivery group can write to the bucket.
    LogDeliveryWrite,
}

impl CannedAcl {
    /// All canned ACLs, in the order used by permission matrices.
    pub const ALL: [CannedAcl; 7] = [
        CannedAcl::Private,
        CannedAcl::PublicRead,
        CannedAcl::PublicReadWrite,
        CannedAcl::AuthenticatedRead,
        CannedAcl::BucketOwnerRead,
        CannedAcl::BucketOwnerFullControl,
        CannedAcl::LogDeliveryWrite,
    ];

    /// The wire value of the ACL.
    pub fn as_str(&self) -> &'static str {
        match self {
            CannedAcl::Private => "private",
            CannedAcl::PublicRead => "public-read",
            CannedAcl::PublicReadWrite => "public-read-write",
            CannedAcl::AuthenticatedRead => "authenticated-read",
            CannedAcl::BucketOwnerRead => "bucket-owner-read",
            CannedAcl::BucketOwnerFullControl => "bucket-owner-full-control",
            CannedAcl::LogDeliveryWrite => "log-delivery-write",
        }
    }
}

impl fmt::Display for CannedAcl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage classes exercised by the suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageClass {
    /// The default class.
    Standard,
    /// Cold storage with instant retrieval, reported as `GLACIER_IR` or `COLD_INSTANT`.
    ColdInstant,
}

impl StorageClass {
    /// Parse the class reported by the service. `COLD_INSTANT` is an alias of `GLACIER_IR`.
    pub fn from_wire(value: &str) -> Option<StorageClass> {
        match value {
            "STANDARD" => Some(StorageClass::Standard),
            "GLACIER_IR" | "COLD_INSTANT" => Some(StorageClass::ColdInstant),
            _ => None,
        }
    }
}

impl From<StorageClass> for aws_sdk_s3::types::StorageClass {
    fn from(value: StorageClass) -> Self {
        match value {
            StorageClass::Standard => Self::Standard,
            StorageClass::ColdInstant => Self::GlacierIr,
        }
    }
}
