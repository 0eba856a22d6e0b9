/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::time::{Duration, SystemTime};

use aws_sdk_s3::primitives::{ByteStream, DateTime};
use aws_sdk_s3::types::ObjectCannedAcl;
use bytes::Bytes;

use crate::error::Error;
use crate::types::{CannedAcl, LockMode, StorageClass};
use crate::Client;

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Object level retention applied at upload.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectLock {
    mode: LockMode,
    retain_until: DateTime,
}

impl ObjectLock {
    /// Retain the object in `mode` until `retain_until`.
    pub fn new(mode: LockMode, retain_until: DateTime) -> Self {
        ObjectLock { mode, retain_until }
    }

    /// Retain the object in `mode` for `days` from now.
    pub fn for_days(mode: LockMode, days: u32) -> Self {
        let until = SystemTime::now() + Duration::from_secs(u64::from(days) * SECONDS_PER_DAY);
        ObjectLock::new(mode, DateTime::from(until))
    }

    /// The retention mode
    pub fn mode(&self) -> LockMode {
        self.mode
    }

    /// The retention deadline
    pub fn retain_until(&self) -> &DateTime {
        &self.retain_until
    }
}

/// Describes an object to upload.
#[derive(Debug, Clone)]
pub struct ObjectSpec {
    key: String,
    body: Bytes,
    expect_version_id: bool,
    acl: Option<CannedAcl>,
    storage_class: Option<StorageClass>,
    lock: Option<ObjectLock>,
}

impl ObjectSpec {
    /// An object with `key` and `body` and no other settings.
    pub fn new(key: impl Into<String>, body: impl Into<Bytes>) -> Self {
        ObjectSpec {
            key: key.into(),
            body: body.into(),
            expect_version_id: false,
            acl: None,
            storage_class: None,
            lock: None,
        }
    }

    /// Require a non-null version id, retrying the put when the service omits it.
    pub fn expect_version_id(mut self, expect: bool) -> Self {
        self.expect_version_id = expect;
        self
    }

    /// Canned ACL applied at upload
    pub fn acl(mut self, acl: CannedAcl) -> Self {
        self.acl = Some(acl);
        self
    }

    /// Storage class applied at upload
    pub fn storage_class(mut self, storage_class: StorageClass) -> Self {
        self.storage_class = Some(storage_class);
        self
    }

    /// Object level retention applied at upload
    pub fn lock(mut self, lock: ObjectLock) -> Self {
        self.lock = Some(lock);
        self
    }

    /// The object key
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The object lock settings, if any
    pub fn object_lock(&self) -> Option<&ObjectLock> {
        self.lock.as_ref()
    }
}

/// What the service returned for an uploaded object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutObjectResult {
    key: String,
    version_id: Option<String>,
    e_tag: Option<String>,
}

impl PutObjectResult {
    pub(crate) fn new(key: String, version_id: Option<String>, e_tag: Option<String>) -> Self {
        PutObjectResult {
            key,
            version_id,
            e_tag,
        }
    }

    /// The object key
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The version id, `None` for unversioned buckets
    pub fn version_id(&self) -> Option<&str> {
        self.version_id.as_deref()
    }

    /// The ETag of the uploaded content
    pub fn e_tag(&self) -> Option<&str> {
        self.e_tag.as_deref()
    }
}

/// Key written by the `attempt`th put of `spec`; retries never reuse an earlier key.
fn attempt_key(spec: &ObjectSpec, attempt: u32) -> String {
    if attempt <= 1 {
        spec.key.clone()
    } else {
        format!("{}-{attempt}", spec.key)
    }
}

async fn put_once(
    client: &Client,
    bucket: &str,
    spec: &ObjectSpec,
    key: String,
) -> Result<PutObjectResult, Error> {
    let mut request = client
        .s3()
        .put_object()
        .bucket(bucket)
        .key(&key)
        .body(ByteStream::from(spec.body.clone()));
    if let Some(acl) = spec.acl {
        request = request.acl(ObjectCannedAcl::from(acl.as_str()));
    }
    if let Some(storage_class) = spec.storage_class {
        request = request.storage_class(storage_class.into());
    }
    if let Some(lock) = &spec.lock {
        request = request
            .object_lock_mode(lock.mode.into())
            .object_lock_retain_until_date(lock.retain_until);
    }

    let output = request.send().await?;
    Ok(PutObjectResult::new(
        key,
        output.version_id().map(str::to_owned),
        output.e_tag().map(str::to_owned),
    ))
}

/// Upload `spec` into `bucket` and wait until `HeadObject` sees it.
///
/// When `spec` asks for a version id and the service returns none, the body is written again
/// under a new key (`{key}-{attempt}`) until a version id comes back or the prober gives up,
/// which is reported as
/// [`ErrorKind::ConsistencyTimeout`](crate::error::ErrorKind::ConsistencyTimeout). The returned
/// [`PutObjectResult::key`] names the key that was finally written.
#[tracing::instrument(skip(client, spec), fields(key = spec.key()))]
pub async fn ensure_object(
    client: &Client,
    bucket: &str,
    spec: &ObjectSpec,
) -> Result<PutObjectResult, Error> {
    let written = client
        .prober()
        .retry_write(
            |attempt| put_once(client, bucket, spec, attempt_key(spec, attempt)),
            |result| !spec.expect_version_id || result.version_id.is_some(),
        )
        .await?;
    if written.attempts() > 1 {
        tracing::info!(
            key = written.value().key(),
            attempts = written.attempts(),
            elapsed_ms = written.elapsed().as_millis() as u64,
            stable = written.is_stable(),
            "compensated missing version id"
        );
    }
    let result = written.into_stable("version id of put")?;

    client
        .prober()
        .probe(
            || object_exists(client, bucket, &result.key, result.version_id()),
            |exists| *exists,
        )
        .await?
        .into_stable("object existence")?;
    Ok(result)
}

/// Whether `HeadObject` finds the object (or the given version of it).
pub async fn object_exists(
    client: &Client,
    bucket: &str,
    key: &str,
    version_id: Option<&str>,
) -> Result<bool, Error> {
    let result = client
        .s3()
        .head_object()
        .bucket(bucket)
        .key(key)
        .set_version_id(version_id.map(str::to_owned))
        .send()
        .await;
    match result {
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

/// Read the whole body of an object.
pub async fn get_object_bytes(client: &Client, bucket: &str, key: &str) -> Result<Bytes, Error> {
    let output = client.s3().get_object().bucket(bucket).key(key).send().await?;
    let body = output
        .body
        .collect()
        .await
        .map_err(crate::error::from_kind(crate::error::ErrorKind::IOError))?;
    Ok(body.into_bytes())
}

/// Delete `key` and wait until `HeadObject` no longer finds it. A missing key counts as success.
#[tracing::instrument(skip(client))]
pub async fn delete_object_and_confirm(
    client: &Client,
    bucket: &str,
    key: &str,
) -> Result<(), Error> {
    match client.s3().delete_object().bucket(bucket).key(key).send().await {
        Ok(_) => tracing::debug!("deleted object"),
        Err(err) => {
            let err = Error::from(err);
            if !err.is_not_found() {
                return Err(err);
            }
            tracing::debug!("object already absent");
        }
    }

    client
        .prober()
        .probe(|| object_exists(client, bucket, key, None), |exists| !*exists)
        .await?
        .into_stable("object absence")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::operation::test_util;
    use aws_sdk_s3::error::ErrorMetadata;
    use aws_sdk_s3::operation::delete_object::DeleteObjectOutput;
    use aws_sdk_s3::operation::head_object::{HeadObjectError, HeadObjectOutput};
    use aws_sdk_s3::operation::put_object::PutObjectOutput;
    use aws_smithy_mocks_experimental::{mock, mock_client, RuleMode};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn test_versioned_put_retries_under_new_key() {
        let put_keys: Arc<Mutex<Vec<String>>> = Arc::default();
        let keys = put_keys.clone();
        let put = mock!(aws_sdk_s3::Client::put_object)
            .match_requests(move |r| {
                keys.lock().unwrap().push(r.key().unwrap_or_default().to_owned());
                true
            })
            .then_output({
                let puts = AtomicUsize::new(0);
                move || {
                    // the first two writes land before versioning is visible
                    let n = puts.fetch_add(1, Ordering::SeqCst);
                    let builder = PutObjectOutput::builder().e_tag("\"etag\"");
                    if n < 2 {
                        builder.build()
                    } else {
                        builder.version_id("v3").build()
                    }
                }
            });
        let head = mock!(aws_sdk_s3::Client::head_object)
            .match_requests(|r| r.key() == Some("k-3") && r.version_id() == Some("v3"))
            .then_output(|| HeadObjectOutput::builder().build());
        let s3 = mock_client!(aws_sdk_s3, RuleMode::MatchAny, &[&put, &head]);

        let spec = ObjectSpec::new("k", Bytes::from_static(b"hello")).expect_version_id(true);
        let result = ensure_object(&test_util::client(s3), "b", &spec)
            .await
            .unwrap();

        assert_eq!("k-3", result.key());
        assert_eq!(Some("v3"), result.version_id());
        assert_eq!(vec!["k", "k-2", "k-3"], *put_keys.lock().unwrap());
    }

    #[test]
    fn test_first_attempt_keeps_key() {
        let spec = ObjectSpec::new("k", Bytes::new());
        assert_eq!("k", attempt_key(&spec, 1));
        assert_eq!("k-4", attempt_key(&spec, 4));
    }

    #[tokio::test]
    async fn test_versioned_put_gives_up() {
        let put = mock!(aws_sdk_s3::Client::put_object)
            .then_output(|| PutObjectOutput::builder().build());
        let s3 = mock_client!(aws_sdk_s3, RuleMode::MatchAny, &[&put]);

        let spec = ObjectSpec::new("k", Bytes::from_static(b"hello")).expect_version_id(true);
        let err = ensure_object(&test_util::client(s3), "b", &spec)
            .await
            .unwrap_err();
        assert_eq!(&ErrorKind::ConsistencyTimeout, err.kind());
    }

    #[tokio::test]
    async fn test_unversioned_put_writes_once() {
        let puts = Arc::new(AtomicUsize::new(0));
        let counter = puts.clone();
        let put = mock!(aws_sdk_s3::Client::put_object)
            .match_requests(|r| r.acl() == Some(&ObjectCannedAcl::PublicRead))
            .then_output(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                PutObjectOutput::builder().build()
            });
        let head = mock!(aws_sdk_s3::Client::head_object)
            .then_output(|| HeadObjectOutput::builder().build());
        let s3 = mock_client!(aws_sdk_s3, RuleMode::MatchAny, &[&put, &head]);

        let spec = ObjectSpec::new("k", Bytes::from_static(b"hello")).acl(CannedAcl::PublicRead);
        let result = ensure_object(&test_util::client(s3), "b", &spec)
            .await
            .unwrap();
        assert_eq!(None, result.version_id());
        assert_eq!(1, puts.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_delete_object_confirms_absence() {
        let delete = mock!(aws_sdk_s3::Client::delete_object)
            .then_output(|| DeleteObjectOutput::builder().build());
        let head = mock!(aws_sdk_s3::Client::head_object).then_error(|| {
            HeadObjectError::generic(ErrorMetadata::builder().code("NotFound").build())
        });
        let s3 = mock_client!(aws_sdk_s3, RuleMode::MatchAny, &[&delete, &head]);

        delete_object_and_confirm(&test_util::client(s3), "b", "k")
            .await
            .unwrap();
    }
}
