/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use aws_sdk_s3::types::{BucketCannedAcl, BucketLocationConstraint, CreateBucketConfiguration};

use crate::client::DEFAULT_REGION;
use crate::error::{self, Error};
use crate::types::CannedAcl;
use crate::Client;

/// Options applied when a bucket is created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketSpec {
    object_lock_enabled: bool,
    acl: Option<CannedAcl>,
}

impl BucketSpec {
    /// Create the bucket with object lock enabled (which also enables versioning).
    pub fn object_lock_enabled(mut self, enabled: bool) -> Self {
        self.object_lock_enabled = enabled;
        self
    }

    /// Canned ACL applied at creation
    pub fn acl(mut self, acl: CannedAcl) -> Self {
        self.acl = Some(acl);
        self
    }
}

/// Create `name` if needed and wait until `HeadBucket` sees it.
///
/// A bucket already owned by the caller counts as success. A name owned by another account is
/// reported as [`ErrorKind::NamingCollision`](crate::error::ErrorKind::NamingCollision).
pub async fn ensure_bucket(client: &Client, name: &str) -> Result<(), Error> {
    ensure_bucket_with(client, name, &BucketSpec::default()).await
}

/// [`ensure_bucket`] with creation options.
#[tracing::instrument(skip(client, spec), fields(profile = client.profile().name()))]
pub async fn ensure_bucket_with(
    client: &Client,
    name: &str,
    spec: &BucketSpec,
) -> Result<(), Error> {
    let mut request = client.s3().create_bucket().bucket(name);
    if let Some(region) = client.region().filter(|region| *region != DEFAULT_REGION) {
        request = request.create_bucket_configuration(
            CreateBucketConfiguration::builder()
                .location_constraint(BucketLocationConstraint::from(region))
                .build(),
        );
    }
    if spec.object_lock_enabled {
        request = request.object_lock_enabled_for_bucket(true);
    }
    if let Some(acl) = spec.acl {
        request = request.acl(BucketCannedAcl::from(acl.as_str()));
    }

    match request.send().await.map_err(Error::from) {
        Ok(_) => tracing::debug!("created bucket"),
        Err(err) => match err.code() {
            Some("BucketAlreadyOwnedByYou") => tracing::debug!("bucket already owned by caller"),
            Some("BucketAlreadyExists") => return Err(error::naming_collision(name)),
            _ => return Err(err),
        },
    }

    client
        .prober()
        .probe(|| bucket_exists(client, name), |exists| *exists)
        .await?
        .into_stable("bucket existence")?;
    Ok(())
}

/// Whether `HeadBucket` finds the bucket.
pub async fn bucket_exists(client: &Client, name: &str) -> Result<bool, Error> {
    match client.s3().head_bucket().bucket(name).send().await {
        Ok(_) => Ok(true),
        Err(err) => {
            let err = Error::from(err);
            if err.is_not_found() {
                Ok(false)
            } else {
                Err(err)
            }
        }
    }
}

/// Delete `name` and wait until it is gone. A bucket that is already gone counts as success.
///
/// Any other failure, e.g. `BucketNotEmpty`, is returned unchanged.
#[tracing::instrument(skip(client), fields(profile = client.profile().name()))]
pub async fn delete_bucket_and_confirm(client: &Client, name: &str) -> Result<(), Error> {
    match client.s3().delete_bucket().bucket(name).send().await {
        Ok(_) => tracing::debug!("deleted bucket"),
        Err(err) => {
            let err = Error::from(err);
            if !err.is_not_found() {
                return Err(err);
            }
            tracing::debug!("bucket already absent");
        }
    }

    client
        .prober()
        .probe(|| bucket_exists(client, name), |exists| !*exists)
        .await?
        .into_stable("bucket absence")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::operation::test_util;
    use aws_sdk_s3::error::ErrorMetadata;
    use aws_sdk_s3::operation::create_bucket::{CreateBucketError, CreateBucketOutput};
    use aws_sdk_s3::operation::delete_bucket::{DeleteBucketError, DeleteBucketOutput};
    use aws_sdk_s3::operation::head_bucket::{HeadBucketError, HeadBucketOutput};
    use aws_smithy_mocks_experimental::{mock, mock_client, RuleMode};

    fn not_found() -> HeadBucketError {
        HeadBucketError::generic(ErrorMetadata::builder().code("NotFound").build())
    }

    #[tokio::test]
    async fn test_ensure_bucket_creates_and_confirms() {
        let create = mock!(aws_sdk_s3::Client::create_bucket)
            .match_requests(|r| r.bucket() == Some("b"))
            .then_output(|| CreateBucketOutput::builder().build());
        let head = mock!(aws_sdk_s3::Client::head_bucket)
            .then_output(|| HeadBucketOutput::builder().build());
        let s3 = mock_client!(aws_sdk_s3, RuleMode::MatchAny, &[&create, &head]);

        ensure_bucket(&test_util::client(s3), "b").await.unwrap();
    }

    #[tokio::test]
    async fn test_ensure_bucket_already_owned_is_success() {
        let create = mock!(aws_sdk_s3::Client::create_bucket).then_error(|| {
            CreateBucketError::generic(
                ErrorMetadata::builder()
                    .code("BucketAlreadyOwnedByYou")
                    .build(),
            )
        });
        let head = mock!(aws_sdk_s3::Client::head_bucket)
            .then_output(|| HeadBucketOutput::builder().build());
        let s3 = mock_client!(aws_sdk_s3, RuleMode::MatchAny, &[&create, &head]);

        ensure_bucket(&test_util::client(s3), "b").await.unwrap();
    }

    #[tokio::test]
    async fn test_ensure_bucket_owned_by_other_account() {
        let create = mock!(aws_sdk_s3::Client::create_bucket).then_error(|| {
            CreateBucketError::generic(ErrorMetadata::builder().code("BucketAlreadyExists").build())
        });
        let s3 = mock_client!(aws_sdk_s3, RuleMode::MatchAny, &[&create]);

        let err = ensure_bucket(&test_util::client(s3), "b").await.unwrap_err();
        assert_eq!(&ErrorKind::NamingCollision, err.kind());
    }

    #[tokio::test]
    async fn test_ensure_bucket_never_visible() {
        let create = mock!(aws_sdk_s3::Client::create_bucket)
            .then_output(|| CreateBucketOutput::builder().build());
        let head = mock!(aws_sdk_s3::Client::head_bucket).then_error(not_found);
        let s3 = mock_client!(aws_sdk_s3, RuleMode::MatchAny, &[&create, &head]);

        let err = ensure_bucket(&test_util::client(s3), "b").await.unwrap_err();
        assert_eq!(&ErrorKind::ConsistencyTimeout, err.kind());
    }

    #[tokio::test]
    async fn test_delete_missing_bucket_is_success() {
        let delete = mock!(aws_sdk_s3::Client::delete_bucket).then_error(|| {
            DeleteBucketError::generic(ErrorMetadata::builder().code("NoSuchBucket").build())
        });
        let head = mock!(aws_sdk_s3::Client::head_bucket).then_error(not_found);
        let s3 = mock_client!(aws_sdk_s3, RuleMode::MatchAny, &[&delete, &head]);

        delete_bucket_and_confirm(&test_util::client(s3), "b")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_delete_non_empty_bucket_fails() {
        let delete = mock!(aws_sdk_s3::Client::delete_bucket).then_error(|| {
            DeleteBucketError::generic(ErrorMetadata::builder().code("BucketNotEmpty").build())
        });
        let s3 = mock_client!(aws_sdk_s3, RuleMode::MatchAny, &[&delete]);

        let err = delete_bucket_and_confirm(&test_util::client(s3), "b")
            .await
            .unwrap_err();
        assert_eq!(Some("BucketNotEmpty"), err.code());
    }

    #[tokio::test]
    async fn test_delete_confirms_absence() {
        let delete = mock!(aws_sdk_s3::Client::delete_bucket)
            .then_output(|| DeleteBucketOutput::builder().build());
        let head = mock!(aws_sdk_s3::Client::head_bucket).then_error(not_found);
        let s3 = mock_client!(aws_sdk_s3, RuleMode::MatchAny, &[&delete, &head]);

        delete_bucket_and_confirm(&test_util::client(s3), "b")
            .await
            .unwrap();
    }
}
