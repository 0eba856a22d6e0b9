/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use aws_sdk_s3::types::{BucketCannedAcl, Grant, ObjectCannedAcl};

use crate::error::Error;
use crate::types::CannedAcl;
use crate::Client;

/// Apply a canned ACL to `bucket`.
pub async fn put_bucket_acl(client: &Client, bucket: &str, acl: CannedAcl) -> Result<(), Error> {
    client
        .s3()
        .put_bucket_acl()
        .bucket(bucket)
        .acl(BucketCannedAcl::from(acl.as_str()))
        .send()
        .await?;
    tracing::debug!(bucket, %acl, "applied bucket acl");
    Ok(())
}

/// Apply a canned ACL to `key`.
pub async fn put_object_acl(
    client: &Client,
    bucket: &str,
    key: &str,
    acl: CannedAcl,
) -> Result<(), Error> {
    client
        .s3()
        .put_object_acl()
        .bucket(bucket)
        .key(key)
        .acl(ObjectCannedAcl::from(acl.as_str()))
        .send()
        .await?;
    tracing::debug!(bucket, key, %acl, "applied object acl");
    Ok(())
}

/// Grants on `bucket`
pub async fn bucket_grants(client: &Client, bucket: &str) -> Result<Vec<Grant>, Error> {
    let output = client.s3().get_bucket_acl().bucket(bucket).send().await?;
    Ok(output.grants().to_vec())
}

/// Grants on `key`
pub async fn object_grants(client: &Client, bucket: &str, key: &str) -> Result<Vec<Grant>, Error> {
    let output = client
        .s3()
        .get_object_acl()
        .bucket(bucket)
        .key(key)
        .send()
        .await?;
    Ok(output.grants().to_vec())
}
