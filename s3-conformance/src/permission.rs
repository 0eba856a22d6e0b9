/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Operation dispatch for permission matrices.
//!
//! Every cell of a matrix invokes one [`S3Operation`] as some identity and records what the
//! service answered as an [`Outcome`], so the expected table can be compared in one assertion.

use std::fmt;

use aws_sdk_s3::primitives::ByteStream;

use crate::error::Error;
use crate::operation::acl::{put_bucket_acl, put_object_acl};
use crate::types::CannedAcl;
use crate::Client;

const PROBE_BODY: &[u8] = b"permission probe";

/// Operations that permission matrices dispatch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum S3Operation {
    /// `ListObjectsV2` on the bucket
    ListObjectsV2,
    /// `PutObject` on the key
    PutObject,
    /// `GetObject` on the key
    GetObject,
    /// `DeleteObject` on the key
    DeleteObject,
    /// `HeadObject` on the key
    HeadObject,
    /// `GetObjectAcl` on the key
    GetObjectAcl,
    /// `GetBucketAcl` on the bucket
    GetBucketAcl,
}

impl S3Operation {
    /// Every dispatchable operation
    pub const ALL: [S3Operation; 7] = [
        S3Operation::ListObjectsV2,
        S3Operation::PutObject,
        S3Operation::GetObject,
        S3Operation::DeleteObject,
        S3Operation::HeadObject,
        S3Operation::GetObjectAcl,
        S3Operation::GetBucketAcl,
    ];

    /// The HTTP status the service answers with when the operation succeeds
    pub fn success_status(&self) -> u16 {
        match self {
            S3Operation::DeleteObject => 204,
            _ => 200,
        }
    }

    /// The wire name of the operation
    pub fn as_str(&self) -> &'static str {
        match self {
            S3Operation::ListObjectsV2 => "ListObjectsV2",
            S3Operation::PutObject => "PutObject",
            S3Operation::GetObject => "GetObject",
            S3Operation::DeleteObject => "DeleteObject",
            S3Operation::HeadObject => "HeadObject",
            S3Operation::GetObjectAcl => "GetObjectAcl",
            S3Operation::GetBucketAcl => "GetBucketAcl",
        }
    }
}

impl fmt::Display for S3Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the service answered: a status on success, or the error code (the status when the
/// error carried no code, as with `HEAD` requests).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// HTTP status of the response
    Status(u16),
    /// Service error code such as `AccessDenied`
    Code(String),
}

impl Outcome {
    /// Shorthand for an error code outcome
    pub fn code(code: impl Into<String>) -> Self {
        Outcome::Code(code.into())
    }

    fn from_result<T>(result: Result<T, Error>, success_status: u16) -> Result<Outcome, Error> {
        match result {
            Ok(_) => Ok(Outcome::Status(success_status)),
            Err(err) => match (err.code(), err.status()) {
                (Some(code), _) => Ok(Outcome::Code(code.to_owned())),
                (None, Some(status)) => Ok(Outcome::Status(status)),
                // no response at all, nothing to record
                (None, None) => Err(err),
            },
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Status(status) => write!(f, "{status}"),
            Outcome::Code(code) => f.write_str(code),
        }
    }
}

async fn send(client: &Client, op: S3Operation, bucket: &str, key: &str) -> Result<(), Error> {
    let s3 = client.s3();
    match op {
        S3Operation::ListObjectsV2 => {
            s3.list_objects_v2().bucket(bucket).send().await?;
        }
        S3Operation::PutObject => {
            s3.put_object()
                .bucket(bucket)
                .key(key)
                .body(ByteStream::from_static(PROBE_BODY))
                .send()
                .await?;
        }
        S3Operation::GetObject => {
            s3.get_object().bucket(bucket).key(key).send().await?;
        }
        S3Operation::DeleteObject => {
            s3.delete_object().bucket(bucket).key(key).send().await?;
        }
        S3Operation::HeadObject => {
            s3.head_object().bucket(bucket).key(key).send().await?;
        }
        S3Operation::GetObjectAcl => {
            s3.get_object_acl().bucket(bucket).key(key).send().await?;
        }
        S3Operation::GetBucketAcl => {
            s3.get_bucket_acl().bucket(bucket).send().await?;
        }
    }
    Ok(())
}

/// Invoke `op` as `client` and record the outcome.
///
/// Service rejections are outcomes, not errors. Only failures without any response, such as a
/// connection error, are returned as `Err`.
#[tracing::instrument(skip(client), fields(profile = client.profile().name()))]
pub async fn invoke(
    client: &Client,
    op: S3Operation,
    bucket: &str,
    key: &str,
) -> Result<Outcome, Error> {
    let outcome = Outcome::from_result(send(client, op, bucket, key).await, op.success_status())?;
    tracing::debug!(%outcome, "invoked");
    Ok(outcome)
}

/// Which resource an ACL matrix applies canned ACLs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AclScope {
    /// `PutBucketAcl` on the bucket
    Bucket,
    /// `PutObjectAcl` on the key
    Object,
}

/// One row of an ACL matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclCell {
    acl: CannedAcl,
    applied: Outcome,
    guest: Outcome,
}

impl AclCell {
    /// The canned ACL the owner applied
    pub fn acl(&self) -> CannedAcl {
        self.acl
    }

    /// Outcome of applying the ACL as the owner
    pub fn applied(&self) -> &Outcome {
        &self.applied
    }

    /// Outcome of the operation invoked as the guest afterwards
    pub fn guest(&self) -> &Outcome {
        &self.guest
    }
}

/// Apply each canned ACL in `acls` as `owner`, then invoke `op` as `guest` and record both
/// outcomes. Rows are in the order of `acls`.
#[tracing::instrument(skip(owner, guest, acls))]
pub async fn acl_matrix(
    owner: &Client,
    guest: &Client,
    bucket: &str,
    key: &str,
    scope: AclScope,
    acls: &[CannedAcl],
    op: S3Operation,
) -> Result<Vec<AclCell>, Error> {
    let mut cells = Vec::with_capacity(acls.len());
    for &acl in acls {
        let applied = match scope {
            AclScope::Bucket => put_bucket_acl(owner, bucket, acl).await,
            AclScope::Object => put_object_acl(owner, bucket, key, acl).await,
        };
        let applied = Outcome::from_result(applied, 200)?;
        let guest = invoke(guest, op, bucket, key).await?;
        tracing::debug!(%acl, %applied, %guest, "acl matrix cell");
        cells.push(AclCell {
            acl,
            applied,
            guest,
        });
    }
    Ok(cells)
}
