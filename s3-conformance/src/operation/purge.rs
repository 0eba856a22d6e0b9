/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use aws_sdk_s3::operation::list_object_versions::ListObjectVersionsOutput;

use crate::error::Error;
use crate::operation::bucket::delete_bucket_and_confirm;
use crate::operation::bucket_policy::purge_policy;
use crate::types::LockMode;
use crate::Client;

/// What [`purge_bucket`] removed and what it had to leave behind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeReport {
    deleted_versions: usize,
    deleted_markers: usize,
    bypassed: usize,
    retained: Vec<RetainedVersion>,
    aborted_uploads: usize,
}

impl PurgeReport {
    /// Object versions deleted, including those deleted with governance bypass
    pub fn deleted_versions(&self) -> usize {
        self.deleted_versions
    }

    /// Delete markers removed
    pub fn deleted_markers(&self) -> usize {
        self.deleted_markers
    }

    /// Versions that needed `BypassGovernanceRetention`
    pub fn bypassed(&self) -> usize {
        self.bypassed
    }

    /// Versions left in place because retention could not be bypassed
    pub fn retained(&self) -> &[RetainedVersion] {
        &self.retained
    }

    /// In-progress multipart uploads aborted
    pub fn aborted_uploads(&self) -> usize {
        self.aborted_uploads
    }
}

/// An object version that retention kept from being deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetainedVersion {
    key: String,
    version_id: Option<String>,
}

impl RetainedVersion {
    /// The object key
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The version id
    pub fn version_id(&self) -> Option<&str> {
        self.version_id.as_deref()
    }
}

/// Paginator for `ListObjectVersions` driven by key and version-id markers.
#[derive(Debug)]
struct VersionsPaginator<'a> {
    client: &'a Client,
    bucket: &'a str,
    state: Option<State>,
}

#[derive(Debug, PartialEq)]
enum State {
    Paginating {
        key_marker: Option<String>,
        version_id_marker: Option<String>,
    },
    Done,
}

impl State {
    fn next_state(self, output: &ListObjectVersionsOutput) -> State {
        let is_truncated = output.is_truncated().unwrap_or(false)
            && (output.next_key_marker().is_some() || output.next_version_id_marker().is_some());
        match self {
            State::Paginating { .. } if is_truncated => State::Paginating {
                key_marker: output.next_key_marker().map(str::to_owned),
                version_id_marker: output.next_version_id_marker().map(str::to_owned),
            },
            _ => State::Done,
        }
    }
}

impl<'a> VersionsPaginator<'a> {
    fn new(client: &'a Client, bucket: &'a str) -> Self {
        Self {
            client,
            bucket,
            state: Some(State::Paginating {
                key_marker: None,
                version_id_marker: None,
            }),
        }
    }

    async fn next_page(&mut self) -> Option<Result<ListObjectVersionsOutput, Error>> {
        let request = match self.state.as_ref()? {
            State::Done => return None,
            State::Paginating {
                key_marker,
                version_id_marker,
            } => self
                .client
                .s3()
                .list_object_versions()
                .bucket(self.bucket)
                .set_key_marker(key_marker.clone())
                .set_version_id_marker(version_id_marker.clone()),
        };

        match request.send().await {
            Ok(output) => {
                let prev_state = self.state.take()?;
                self.state = Some(prev_state.next_state(&output));
                Some(Ok(output))
            }
            Err(err) => {
                self.state = Some(State::Done);
                Some(Err(err.into()))
            }
        }
    }
}

enum Deleted {
    Plain,
    Bypassed,
    Retained,
}

async fn delete_version(
    client: &Client,
    bucket: &str,
    key: &str,
    version_id: Option<&str>,
    lock_mode: Option<LockMode>,
) -> Result<Deleted, Error> {
    let request = client
        .s3()
        .delete_object()
        .bucket(bucket)
        .key(key)
        .set_version_id(version_id.map(str::to_owned));

    let err = match request.clone().send().await {
        Ok(_) => return Ok(Deleted::Plain),
        Err(err) => Error::from(err),
    };
    if err.is_not_found() {
        return Ok(Deleted::Plain);
    }
    if err.code() != Some("AccessDenied") {
        return Err(err);
    }

    match lock_mode {
        Some(LockMode::Governance) => {
            match request.bypass_governance_retention(true).send().await {
                Ok(_) => {
                    tracing::debug!(key, version_id, "deleted with governance bypass");
                    Ok(Deleted::Bypassed)
                }
                Err(err) => {
                    let err = Error::from(err);
                    if err.code() != Some("AccessDenied") {
                        return Err(err);
                    }
                    // compliance retention or a legal hold on this version
                    tracing::warn!(key, version_id, "bypass denied, leaving version");
                    Ok(Deleted::Retained)
                }
            }
        }
        _ => {
            tracing::warn!(key, version_id, ?lock_mode, "version is retained, leaving it");
            Ok(Deleted::Retained)
        }
    }
}

/// Delete one object version, bypassing governance retention when `lock_mode` allows it.
///
/// Returns `false` when retention kept the version in place.
pub async fn delete_object_version(
    client: &Client,
    bucket: &str,
    key: &str,
    version_id: Option<&str>,
    lock_mode: Option<LockMode>,
) -> Result<bool, Error> {
    let deleted = delete_version(client, bucket, key, version_id, lock_mode).await?;
    Ok(!matches!(deleted, Deleted::Retained))
}

async fn abort_multipart_uploads(client: &Client, bucket: &str) -> Result<usize, Error> {
    let mut aborted = 0;
    let mut key_marker = None;
    let mut upload_id_marker = None;
    loop {
        let output = client
            .s3()
            .list_multipart_uploads()
            .bucket(bucket)
            .set_key_marker(key_marker)
            .set_upload_id_marker(upload_id_marker)
            .send()
            .await?;
        for upload in output.uploads() {
            let (Some(key), Some(upload_id)) = (upload.key(), upload.upload_id()) else {
                continue;
            };
            client
                .s3()
                .abort_multipart_upload()
                .bucket(bucket)
                .key(key)
                .upload_id(upload_id)
                .send()
                .await?;
            aborted += 1;
        }
        if !output.is_truncated().unwrap_or(false) {
            return Ok(aborted);
        }
        key_marker = output.next_key_marker().map(str::to_owned);
        upload_id_marker = output.next_upload_id_marker().map(str::to_owned);
        if key_marker.is_none() && upload_id_marker.is_none() {
            return Ok(aborted);
        }
    }
}

/// Delete every object version, delete marker and in-progress upload of `bucket`, leaving the
/// empty bucket in place.
///
/// `AccessDenied` on a version is retried with governance bypass when `lock_mode` is
/// [`LockMode::Governance`]. A version that still cannot be deleted is recorded in
/// [`PurgeReport::retained`] and the purge moves on. A bucket that does not exist yields an
/// empty report.
#[tracing::instrument(skip(client), fields(profile = client.profile().name()))]
pub async fn empty_bucket(
    client: &Client,
    bucket: &str,
    lock_mode: Option<LockMode>,
) -> Result<PurgeReport, Error> {
    Ok(empty_existing(client, bucket, lock_mode)
        .await?
        .unwrap_or_default())
}

/// Returns `None` when the bucket does not exist.
async fn empty_existing(
    client: &Client,
    bucket: &str,
    lock_mode: Option<LockMode>,
) -> Result<Option<PurgeReport>, Error> {
    let mut report = PurgeReport::default();
    let mut pages = VersionsPaginator::new(client, bucket);
    while let Some(page) = pages.next_page().await {
        let page = match page {
            Ok(page) => page,
            Err(err) if err.is_not_found() => {
                tracing::debug!(bucket, "bucket already absent");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        let versions = page
            .versions()
            .iter()
            .map(|v| (v.key(), v.version_id(), false));
        let markers = page
            .delete_markers()
            .iter()
            .map(|m| (m.key(), m.version_id(), true));
        for (key, version_id, is_marker) in versions.chain(markers) {
            let Some(key) = key else { continue };
            let deleted = match delete_version(client, bucket, key, version_id, lock_mode).await {
                Ok(deleted) => deleted,
                Err(err) => {
                    tracing::warn!(key, version_id, "failed to delete version: {err}");
                    Deleted::Retained
                }
            };
            match deleted {
                Deleted::Plain if is_marker => report.deleted_markers += 1,
                Deleted::Plain => report.deleted_versions += 1,
                Deleted::Bypassed => {
                    report.deleted_versions += 1;
                    report.bypassed += 1;
                }
                Deleted::Retained => report.retained.push(RetainedVersion {
                    key: key.to_owned(),
                    version_id: version_id.map(str::to_owned),
                }),
            }
        }
    }

    report.aborted_uploads = match abort_multipart_uploads(client, bucket).await {
        Ok(aborted) => aborted,
        Err(err) => {
            tracing::warn!("failed to abort in-progress uploads: {err}");
            0
        }
    };
    Ok(Some(report))
}

/// [`empty_bucket`] followed by deleting the bucket itself.
///
/// The bucket delete is attempted even when versions were retained; its `BucketNotEmpty`
/// failure is returned as an error. A bucket that does not exist counts as purged.
#[tracing::instrument(skip(client), fields(profile = client.profile().name()))]
pub async fn purge_bucket(
    client: &Client,
    bucket: &str,
    lock_mode: Option<LockMode>,
) -> Result<PurgeReport, Error> {
    let Some(report) = empty_existing(client, bucket, lock_mode).await? else {
        return Ok(PurgeReport::default());
    };

    if let Err(err) = delete_bucket_and_confirm(client, bucket).await {
        tracing::warn!(
            retained = report.retained.len(),
            "bucket could not be deleted: {err}"
        );
        return Err(err);
    }
    tracing::debug!(
        versions = report.deleted_versions,
        markers = report.deleted_markers,
        bypassed = report.bypassed,
        "purged bucket"
    );
    Ok(report)
}

/// Purge every bucket visible to `client` whose name starts with `prefix`, policies first.
///
/// Failures are logged and the remaining buckets are still purged. Returns the names of the
/// buckets that were removed.
#[tracing::instrument(skip(client), fields(profile = client.profile().name()))]
pub async fn purge_buckets_with_prefix(
    client: &Client,
    prefix: &str,
) -> Result<Vec<String>, Error> {
    let output = client.s3().list_buckets().send().await?;
    let names: Vec<String> = output
        .buckets()
        .iter()
        .filter_map(|b| b.name())
        .filter(|name| name.starts_with(prefix))
        .map(str::to_owned)
        .collect();
    tracing::info!("found {} bucket(s) with prefix {prefix:?}", names.len());

    let mut purged = Vec::with_capacity(names.len());
    for name in names {
        purge_policy(client, &name).await;
        match purge_bucket(client, &name, client.profile().lock_mode()).await {
            Ok(_) => purged.push(name),
            Err(err) => tracing::error!(bucket = %name, "failed to purge bucket: {err}"),
        }
    }
    Ok(purged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::test_util;

    #[test]
    fn test_state_follows_markers() {
        let start = State::Paginating {
            key_marker: None,
            version_id_marker: None,
        };
        let truncated = ListObjectVersionsOutput::builder()
            .is_truncated(true)
            .next_key_marker("k")
            .next_version_id_marker("v")
            .build();
        let next = start.next_state(&truncated);
        assert_eq!(
            State::Paginating {
                key_marker: Some("k".to_owned()),
                version_id_marker: Some("v".to_owned()),
            },
            next
        );

        let last = ListObjectVersionsOutput::builder().is_truncated(false).build();
        assert_eq!(State::Done, next.next_state(&last));
    }

    #[test]
    fn test_truncated_without_markers_stops() {
        let start = State::Paginating {
            key_marker: None,
            version_id_marker: None,
        };
        let output = ListObjectVersionsOutput::builder().is_truncated(true).build();
        assert_eq!(State::Done, start.next_state(&output));
    }

    #[tokio::test]
    async fn test_missing_bucket_is_purged() {
        use aws_sdk_s3::error::ErrorMetadata;
        use aws_sdk_s3::operation::list_object_versions::ListObjectVersionsError;
        use aws_smithy_mocks_experimental::{mock, mock_client, RuleMode};

        let list = mock!(aws_sdk_s3::Client::list_object_versions).then_error(|| {
            ListObjectVersionsError::generic(ErrorMetadata::builder().code("NoSuchBucket").build())
        });
        let s3 = mock_client!(aws_sdk_s3, RuleMode::MatchAny, &[&list]);

        let report = purge_bucket(&test_util::client(s3), "gone", None)
            .await
            .unwrap();
        assert_eq!(PurgeReport::default(), report);
    }
}
