/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use serde_json::Value;

use crate::error::Error;
use crate::policy;
use crate::Client;

/// Attach `document` to `bucket`.
pub async fn put_policy(client: &Client, bucket: &str, document: &Value) -> Result<(), Error> {
    put_raw_policy(client, bucket, &serde_json::to_string(document)?).await
}

/// Attach a policy given as raw text. Malformed documents are sent unchanged so the service's
/// `MalformedPolicy` and `MalformedJSON` rejections can be asserted.
pub async fn put_raw_policy(client: &Client, bucket: &str, policy: &str) -> Result<(), Error> {
    client
        .s3()
        .put_bucket_policy()
        .bucket(bucket)
        .policy(policy)
        .send()
        .await?;
    Ok(())
}

/// The policy attached to `bucket`, `None` when there is none.
pub async fn get_policy(client: &Client, bucket: &str) -> Result<Option<Value>, Error> {
    let result = client.s3().get_bucket_policy().bucket(bucket).send().await;
    match result.map_err(Error::from) {
        Ok(output) => match output.policy() {
            Some(policy) => Ok(Some(serde_json::from_str(policy)?)),
            None => Ok(None),
        },
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => Err(err),
    }
}

async fn overwrite_and_delete(client: &Client, bucket: &str) -> Result<(), Error> {
    // a deny policy may block the delete itself, open it up first
    put_policy(client, bucket, &policy::allow_all(bucket)).await?;
    client
        .s3()
        .delete_bucket_policy()
        .bucket(bucket)
        .send()
        .await?;
    Ok(())
}

/// Remove the policy of `bucket`, overwriting it with an allow-all policy first.
///
/// Retries with the prober's backoff. Returns whether the bucket is left without a policy;
/// giving up is logged rather than raised.
#[tracing::instrument(skip(client))]
pub async fn purge_policy(client: &Client, bucket: &str) -> bool {
    let probe = client.prober().config();
    for attempt in 1..=probe.max_attempts() {
        match overwrite_and_delete(client, bucket).await {
            Ok(()) => {
                tracing::debug!(attempt, "policy removed");
                return true;
            }
            Err(err) if err.is_not_found() => {
                tracing::debug!("no policy or bucket to remove");
                return true;
            }
            Err(err) => {
                tracing::debug!(attempt, "failed to remove policy: {err}");
                if attempt < probe.max_attempts() {
                    tokio::time::sleep(probe.backoff().delay(attempt)).await;
                }
            }
        }
    }
    tracing::warn!("giving up removing policy");
    false
}
