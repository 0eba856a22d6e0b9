/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::time::Duration;

use aws_sdk_s3::presigning::{PresignedRequest, PresigningConfig};

use crate::error::Error;
use crate::Client;

/// Expiry used by the presigned URL scenarios
pub const DEFAULT_PRESIGN_EXPIRY: Duration = Duration::from_secs(3600);

/// A presigned `GetObject` request for `key`, valid for `expires_in`.
pub async fn presign_get(
    client: &Client,
    bucket: &str,
    key: &str,
    expires_in: Duration,
) -> Result<PresignedRequest, Error> {
    let request = client
        .s3()
        .get_object()
        .bucket(bucket)
        .key(key)
        .presigned(PresigningConfig::expires_in(expires_in)?)
        .await?;
    tracing::debug!(bucket, key, "presigned GetObject");
    Ok(request)
}

/// A presigned `PutObject` request for `key`, valid for `expires_in`.
pub async fn presign_put(
    client: &Client,
    bucket: &str,
    key: &str,
    expires_in: Duration,
) -> Result<PresignedRequest, Error> {
    let request = client
        .s3()
        .put_object()
        .bucket(bucket)
        .key(key)
        .presigned(PresigningConfig::expires_in(expires_in)?)
        .await?;
    tracing::debug!(bucket, key, "presigned PutObject");
    Ok(request)
}
