/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use aws_sdk_s3::types::{BucketVersioningStatus, VersioningConfiguration};

use crate::error::Error;
use crate::types::VersioningState;
use crate::Client;

/// Read the versioning state of `bucket`.
pub async fn versioning_state(client: &Client, bucket: &str) -> Result<VersioningState, Error> {
    let output = client
        .s3()
        .get_bucket_versioning()
        .bucket(bucket)
        .send()
        .await?;
    Ok(VersioningState::from(output.status()))
}

async fn put_versioning(
    client: &Client,
    bucket: &str,
    status: BucketVersioningStatus,
) -> Result<(), Error> {
    client
        .s3()
        .put_bucket_versioning()
        .bucket(bucket)
        .versioning_configuration(VersioningConfiguration::builder().status(status).build())
        .send()
        .await?;
    Ok(())
}

/// Enable versioning on `bucket` and wait until reads consistently report `Enabled`.
///
/// A rejected write is returned as is.
#[tracing::instrument(skip(client))]
pub async fn enable_versioning_and_confirm(client: &Client, bucket: &str) -> Result<(), Error> {
    put_versioning(client, bucket, BucketVersioningStatus::Enabled).await?;
    client
        .prober()
        .probe(
            || versioning_state(client, bucket),
            |state| *state == VersioningState::Enabled,
        )
        .await?
        .into_stable("versioning status")?;
    tracing::debug!("versioning enabled");
    Ok(())
}

/// Suspend versioning on `bucket` and wait until reads consistently report `Suspended`.
#[tracing::instrument(skip(client))]
pub async fn suspend_versioning_and_confirm(client: &Client, bucket: &str) -> Result<(), Error> {
    put_versioning(client, bucket, BucketVersioningStatus::Suspended).await?;
    client
        .prober()
        .probe(
            || versioning_state(client, bucket),
            |state| *state == VersioningState::Suspended,
        )
        .await?
        .into_stable("versioning status")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::test_util;
    use aws_sdk_s3::operation::get_bucket_versioning::GetBucketVersioningOutput;
    use aws_sdk_s3::operation::put_bucket_versioning::PutBucketVersioningOutput;
    use aws_smithy_mocks_experimental::{mock, mock_client, RuleMode};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_enable_waits_for_enabled_status() {
        let put = mock!(aws_sdk_s3::Client::put_bucket_versioning)
            .match_requests(|r| {
                r.versioning_configuration().and_then(|c| c.status())
                    == Some(&BucketVersioningStatus::Enabled)
            })
            .then_output(|| PutBucketVersioningOutput::builder().build());

        let reads = Arc::new(AtomicUsize::new(0));
        let counter = reads.clone();
        let get = mock!(aws_sdk_s3::Client::get_bucket_versioning).then_output(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            if n < 3 {
                GetBucketVersioningOutput::builder().build()
            } else {
                GetBucketVersioningOutput::builder()
                    .status(BucketVersioningStatus::Enabled)
                    .build()
            }
        });
        let s3 = mock_client!(aws_sdk_s3, RuleMode::MatchAny, &[&put, &get]);

        enable_versioning_and_confirm(&test_util::client(s3), "b")
            .await
            .unwrap();
        // 3 unset reads, each ending an attempt, then 2 matching reads
        assert_eq!(5, reads.load(Ordering::SeqCst));
    }
}
