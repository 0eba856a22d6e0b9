/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use aws_sdk_s3::error::ErrorMetadata;
use aws_sdk_s3::operation::create_bucket::CreateBucketError;
use aws_sdk_s3::operation::delete_bucket::{DeleteBucketError, DeleteBucketOutput};
use aws_sdk_s3::operation::delete_object::{DeleteObjectError, DeleteObjectOutput};
use aws_sdk_s3::operation::head_bucket::{HeadBucketError, HeadBucketOutput};
use aws_sdk_s3::operation::list_multipart_uploads::ListMultipartUploadsOutput;
use aws_sdk_s3::operation::list_object_versions::ListObjectVersionsOutput;
use aws_sdk_s3::types::{DeleteMarkerEntry, ObjectVersion};
use aws_smithy_mocks_experimental::{mock, mock_client, RuleMode};
use s3_conformance::error::ErrorKind;
use s3_conformance::operation::bucket::ensure_bucket;
use s3_conformance::operation::purge::{empty_bucket, purge_bucket};
use s3_conformance::types::LockMode;

fn one_locked_version() -> ListObjectVersionsOutput {
    ListObjectVersionsOutput::builder()
        .versions(
            ObjectVersion::builder()
                .key("locked.txt")
                .version_id("v1")
                .build(),
        )
        .is_truncated(false)
        .build()
}

#[tokio::test]
async fn test_ensure_bucket_is_idempotent() {
    test_common::init_tracing();
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
    let client = test_common::client(s3);

    ensure_bucket(&client, "test-abc-idempotent").await.unwrap();
    ensure_bucket(&client, "test-abc-idempotent").await.unwrap();
}

#[tokio::test]
async fn test_bucket_owned_elsewhere_is_collision() {
    let create = mock!(aws_sdk_s3::Client::create_bucket).then_error(|| {
        CreateBucketError::generic(ErrorMetadata::builder().code("BucketAlreadyExists").build())
    });
    let s3 = mock_client!(aws_sdk_s3, RuleMode::MatchAny, &[&create]);

    let err = ensure_bucket(&test_common::client(s3), "taken")
        .await
        .unwrap_err();
    assert_eq!(&ErrorKind::NamingCollision, err.kind());
}

#[tokio::test]
async fn test_compliance_retention_leaves_bucket() {
    test_common::init_tracing();
    let bypass_attempts = Arc::new(AtomicUsize::new(0));
    let counter = bypass_attempts.clone();

    let versions = mock!(aws_sdk_s3::Client::list_object_versions).then_output(one_locked_version);
    let bypassed = mock!(aws_sdk_s3::Client::delete_object)
        .match_requests(|r| r.bypass_governance_retention() == Some(true))
        .then_output(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            DeleteObjectOutput::builder().build()
        });
    let denied = mock!(aws_sdk_s3::Client::delete_object)
        .match_requests(|r| r.bypass_governance_retention() != Some(true))
        .then_error(|| {
            DeleteObjectError::generic(ErrorMetadata::builder().code("AccessDenied").build())
        });
    let uploads = mock!(aws_sdk_s3::Client::list_multipart_uploads)
        .then_output(|| ListMultipartUploadsOutput::builder().build());
    let delete_bucket = mock!(aws_sdk_s3::Client::delete_bucket).then_error(|| {
        DeleteBucketError::generic(ErrorMetadata::builder().code("BucketNotEmpty").build())
    });
    let s3 = mock_client!(
        aws_sdk_s3,
        RuleMode::MatchAny,
        &[&versions, &bypassed, &denied, &uploads, &delete_bucket]
    );
    let client = test_common::locked_client(s3, LockMode::Compliance);

    let err = purge_bucket(&client, "compliance-bucket", Some(LockMode::Compliance))
        .await
        .unwrap_err();
    assert_eq!(Some("BucketNotEmpty"), err.code());
    assert_eq!(0, bypass_attempts.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_governance_retention_is_bypassed() {
    let bucket_deleted = Arc::new(AtomicBool::new(false));

    let versions = mock!(aws_sdk_s3::Client::list_object_versions).then_output(|| {
        ListObjectVersionsOutput::builder()
            .versions(
                ObjectVersion::builder()
                    .key("locked.txt")
                    .version_id("v1")
                    .build(),
            )
            .delete_markers(
                DeleteMarkerEntry::builder()
                    .key("locked.txt")
                    .version_id("m1")
                    .build(),
            )
            .build()
    });
    let bypassed = mock!(aws_sdk_s3::Client::delete_object)
        .match_requests(|r| r.bypass_governance_retention() == Some(true))
        .then_output(|| DeleteObjectOutput::builder().build());
    let marker = mock!(aws_sdk_s3::Client::delete_object)
        .match_requests(|r| r.version_id() == Some("m1"))
        .then_output(|| DeleteObjectOutput::builder().build());
    let denied = mock!(aws_sdk_s3::Client::delete_object)
        .match_requests(|r| {
            r.version_id() == Some("v1") && r.bypass_governance_retention() != Some(true)
        })
        .then_error(|| {
            DeleteObjectError::generic(ErrorMetadata::builder().code("AccessDenied").build())
        });
    let uploads = mock!(aws_sdk_s3::Client::list_multipart_uploads)
        .then_output(|| ListMultipartUploadsOutput::builder().build());
    let flag = bucket_deleted.clone();
    let delete_bucket = mock!(aws_sdk_s3::Client::delete_bucket).then_output(move || {
        flag.store(true, Ordering::SeqCst);
        DeleteBucketOutput::builder().build()
    });
    let deleted = bucket_deleted.clone();
    let head = mock!(aws_sdk_s3::Client::head_bucket)
        .match_requests(move |_| deleted.load(Ordering::SeqCst))
        .then_error(|| HeadBucketError::generic(ErrorMetadata::builder().code("NotFound").build()));
    let s3 = mock_client!(
        aws_sdk_s3,
        RuleMode::MatchAny,
        &[
            &versions,
            &bypassed,
            &marker,
            &denied,
            &uploads,
            &delete_bucket,
            &head
        ]
    );
    let client = test_common::locked_client(s3, LockMode::Governance);

    let report = purge_bucket(&client, "governance-bucket", Some(LockMode::Governance))
        .await
        .unwrap();
    assert_eq!(1, report.deleted_versions());
    assert_eq!(1, report.bypassed());
    assert_eq!(1, report.deleted_markers());
    assert!(report.retained().is_empty());
}

struct MixedBucket {
    free_deletes: Arc<AtomicUsize>,
    bucket_deletes: Arc<AtomicUsize>,
}

/// A bucket holding `locked.txt@v1`, which no delete can remove, and `free.txt@v2`.
fn mixed_bucket() -> (aws_sdk_s3::Client, MixedBucket) {
    let free_deletes = Arc::new(AtomicUsize::new(0));
    let bucket_deletes = Arc::new(AtomicUsize::new(0));

    let versions = mock!(aws_sdk_s3::Client::list_object_versions).then_output(|| {
        ListObjectVersionsOutput::builder()
            .versions(
                ObjectVersion::builder()
                    .key("locked.txt")
                    .version_id("v1")
                    .build(),
            )
            .versions(ObjectVersion::builder().key("free.txt").version_id("v2").build())
            .is_truncated(false)
            .build()
    });
    let locked = mock!(aws_sdk_s3::Client::delete_object)
        .match_requests(|r| r.version_id() == Some("v1"))
        .then_error(|| {
            DeleteObjectError::generic(ErrorMetadata::builder().code("AccessDenied").build())
        });
    let counter = free_deletes.clone();
    let free = mock!(aws_sdk_s3::Client::delete_object)
        .match_requests(|r| r.version_id() == Some("v2"))
        .then_output(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            DeleteObjectOutput::builder().build()
        });
    let uploads = mock!(aws_sdk_s3::Client::list_multipart_uploads)
        .then_output(|| ListMultipartUploadsOutput::builder().build());
    let counter = bucket_deletes.clone();
    let delete_bucket = mock!(aws_sdk_s3::Client::delete_bucket).then_error(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        DeleteBucketError::generic(ErrorMetadata::builder().code("BucketNotEmpty").build())
    });
    let s3 = mock_client!(
        aws_sdk_s3,
        RuleMode::MatchAny,
        &[&versions, &locked, &free, &uploads, &delete_bucket]
    );
    (
        s3,
        MixedBucket {
            free_deletes,
            bucket_deletes,
        },
    )
}

#[tokio::test]
async fn test_mixed_bucket_keeps_only_locked_version() {
    // a governance profile can still meet compliance-locked versions
    for lock_mode in [LockMode::Compliance, LockMode::Governance] {
        let (s3, calls) = mixed_bucket();
        let client = test_common::locked_client(s3, lock_mode);

        let err = purge_bucket(&client, "mixed-bucket", Some(lock_mode))
            .await
            .unwrap_err();
        assert_eq!(Some("BucketNotEmpty"), err.code(), "{lock_mode:?}");
        assert_eq!(1, calls.free_deletes.load(Ordering::SeqCst));
        assert_eq!(1, calls.bucket_deletes.load(Ordering::SeqCst));

        let report = empty_bucket(&client, "mixed-bucket", Some(lock_mode))
            .await
            .unwrap();
        assert_eq!(1, report.deleted_versions());
        assert_eq!(0, report.bypassed());
        let retained: Vec<_> = report
            .retained()
            .iter()
            .map(|v| (v.key(), v.version_id()))
            .collect();
        assert_eq!(vec![("locked.txt", Some("v1"))], retained);
    }
}

#[tokio::test]
async fn test_purge_follows_version_pages() {
    let deleted_keys: Arc<Mutex<Vec<String>>> = Arc::default();
    let bucket_deleted = Arc::new(AtomicBool::new(false));

    let first_page = mock!(aws_sdk_s3::Client::list_object_versions)
        .match_requests(|r| r.key_marker().is_none() && r.version_id_marker().is_none())
        .then_output(|| {
            ListObjectVersionsOutput::builder()
                .versions(ObjectVersion::builder().key("a.txt").version_id("v1").build())
                .is_truncated(true)
                .next_key_marker("a.txt")
                .next_version_id_marker("v1")
                .build()
        });
    let second_page = mock!(aws_sdk_s3::Client::list_object_versions)
        .match_requests(|r| r.key_marker() == Some("a.txt") && r.version_id_marker() == Some("v1"))
        .then_output(|| {
            ListObjectVersionsOutput::builder()
                .versions(ObjectVersion::builder().key("b.txt").version_id("v2").build())
                .delete_markers(
                    DeleteMarkerEntry::builder()
                        .key("b.txt")
                        .version_id("m2")
                        .build(),
                )
                .is_truncated(false)
                .build()
        });
    let keys = deleted_keys.clone();
    let delete = mock!(aws_sdk_s3::Client::delete_object)
        .match_requests(move |r| {
            let deleted = format!(
                "{}@{}",
                r.key().unwrap_or_default(),
                r.version_id().unwrap_or_default()
            );
            keys.lock().unwrap().push(deleted);
            true
        })
        .then_output(|| DeleteObjectOutput::builder().build());
    let uploads = mock!(aws_sdk_s3::Client::list_multipart_uploads)
        .then_output(|| ListMultipartUploadsOutput::builder().build());
    let flag = bucket_deleted.clone();
    let delete_bucket = mock!(aws_sdk_s3::Client::delete_bucket).then_output(move || {
        flag.store(true, Ordering::SeqCst);
        DeleteBucketOutput::builder().build()
    });
    let deleted = bucket_deleted.clone();
    let head = mock!(aws_sdk_s3::Client::head_bucket)
        .match_requests(move |_| deleted.load(Ordering::SeqCst))
        .then_error(|| HeadBucketError::generic(ErrorMetadata::builder().code("NotFound").build()));
    let s3 = mock_client!(
        aws_sdk_s3,
        RuleMode::MatchAny,
        &[
            &first_page,
            &second_page,
            &delete,
            &uploads,
            &delete_bucket,
            &head
        ]
    );

    let report = purge_bucket(&test_common::client(s3), "paged-bucket", None)
        .await
        .unwrap();
    assert_eq!(2, report.deleted_versions());
    assert_eq!(1, report.deleted_markers());
    assert_eq!(
        vec!["a.txt@v1", "b.txt@v2", "b.txt@m2"],
        *deleted_keys.lock().unwrap()
    );
}
