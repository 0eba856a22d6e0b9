/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use aws_sdk_s3::error::ErrorMetadata;
use aws_sdk_s3::operation::create_bucket::CreateBucketOutput;
use aws_sdk_s3::operation::delete_bucket::DeleteBucketOutput;
use aws_sdk_s3::operation::delete_bucket_policy::DeleteBucketPolicyOutput;
use aws_sdk_s3::operation::delete_object::DeleteObjectOutput;
use aws_sdk_s3::operation::head_bucket::{HeadBucketError, HeadBucketOutput};
use aws_sdk_s3::operation::head_object::HeadObjectOutput;
use aws_sdk_s3::operation::list_buckets::ListBucketsOutput;
use aws_sdk_s3::operation::list_multipart_uploads::ListMultipartUploadsOutput;
use aws_sdk_s3::operation::list_object_versions::ListObjectVersionsOutput;
use aws_sdk_s3::operation::put_bucket_policy::PutBucketPolicyOutput;
use aws_sdk_s3::operation::put_object::PutObjectOutput;
use aws_sdk_s3::types::Owner;
use aws_smithy_mocks_experimental::{mock, mock_client, RuleMode};
use s3_conformance::client::Clients;
use s3_conformance::policy::Effect;
use s3_conformance::scenario::{self, Step};

type CallLog = Arc<Mutex<Vec<&'static str>>>;

fn record(log: &CallLog, call: &'static str) {
    log.lock().unwrap().push(call);
}

/// Owner mock that records every mutating call in order.
fn recording_owner(log: CallLog) -> aws_sdk_s3::Client {
    let bucket_deleted = Arc::new(AtomicBool::new(false));

    let l = log.clone();
    let create = mock!(aws_sdk_s3::Client::create_bucket).then_output(move || {
        record(&l, "create_bucket");
        CreateBucketOutput::builder().build()
    });
    let deleted = bucket_deleted.clone();
    let present = mock!(aws_sdk_s3::Client::head_bucket)
        .match_requests(move |_| !deleted.load(Ordering::SeqCst))
        .then_output(|| HeadBucketOutput::builder().build());
    let deleted = bucket_deleted.clone();
    let absent = mock!(aws_sdk_s3::Client::head_bucket)
        .match_requests(move |_| deleted.load(Ordering::SeqCst))
        .then_error(|| HeadBucketError::generic(ErrorMetadata::builder().code("NotFound").build()));
    let l = log.clone();
    let put = mock!(aws_sdk_s3::Client::put_object).then_output(move || {
        record(&l, "put_object");
        PutObjectOutput::builder().e_tag("\"e\"").build()
    });
    let head_object = mock!(aws_sdk_s3::Client::head_object)
        .then_output(|| HeadObjectOutput::builder().build());
    let l = log.clone();
    let put_policy = mock!(aws_sdk_s3::Client::put_bucket_policy)
        .match_requests(|r| r.policy().is_some_and(|p| p.contains("tenant-2")))
        .then_output(move || {
            record(&l, "put_tenant_policy");
            PutBucketPolicyOutput::builder().build()
        });
    let l = log.clone();
    let open_policy = mock!(aws_sdk_s3::Client::put_bucket_policy)
        .match_requests(|r| r.policy().is_some_and(|p| p.contains("\"s3:*\"")))
        .then_output(move || {
            record(&l, "put_allow_all_policy");
            PutBucketPolicyOutput::builder().build()
        });
    let l = log.clone();
    let delete_policy = mock!(aws_sdk_s3::Client::delete_bucket_policy).then_output(move || {
        record(&l, "delete_bucket_policy");
        DeleteBucketPolicyOutput::builder().build()
    });
    let l = log.clone();
    let delete_object = mock!(aws_sdk_s3::Client::delete_object).then_output(move || {
        record(&l, "delete_object");
        DeleteObjectOutput::builder().build()
    });
    let versions = mock!(aws_sdk_s3::Client::list_object_versions)
        .then_output(|| ListObjectVersionsOutput::builder().build());
    let uploads = mock!(aws_sdk_s3::Client::list_multipart_uploads)
        .then_output(|| ListMultipartUploadsOutput::builder().build());
    let l = log.clone();
    let deleted = bucket_deleted.clone();
    let delete_bucket = mock!(aws_sdk_s3::Client::delete_bucket).then_output(move || {
        record(&l, "delete_bucket");
        deleted.store(true, Ordering::SeqCst);
        DeleteBucketOutput::builder().build()
    });

    mock_client!(
        aws_sdk_s3,
        RuleMode::MatchAny,
        &[
            &create,
            &present,
            &absent,
            &put,
            &head_object,
            &put_policy,
            &open_policy,
            &delete_policy,
            &delete_object,
            &versions,
            &uploads,
            &delete_bucket
        ]
    )
}

fn tenant(canonical_id: &'static str) -> aws_sdk_s3::Client {
    let list = mock!(aws_sdk_s3::Client::list_buckets).then_output(move || {
        ListBucketsOutput::builder()
            .owner(Owner::builder().id(canonical_id).build())
            .build()
    });
    mock_client!(aws_sdk_s3, RuleMode::MatchAny, &[&list])
}

fn position(log: &[&'static str], call: &str) -> usize {
    log.iter()
        .position(|c| *c == call)
        .unwrap_or_else(|| panic!("{call} was never called: {log:?}"))
}

#[tokio::test]
async fn test_tenant_policy_teardown_runs_in_reverse() {
    test_common::init_tracing();
    let log: CallLog = Arc::default();
    let clients = Clients::new(vec![
        test_common::client(recording_owner(log.clone())),
        test_common::client(tenant("tenant-2")),
    ])
    .unwrap();

    let fixture = scenario::bucket_with_tenant_policy(
        &clients,
        "tenant_deny",
        Effect::Deny,
        &["s3:GetObject"],
    )
    .await
    .unwrap();

    assert_eq!("tenant-2", fixture.value().tenant_id());
    assert_eq!(
        "tenant-2",
        fixture.value().policy()["Statement"][0]["Principal"]["MGC"][0]
    );
    assert!(matches!(
        fixture.pending_steps(),
        [Step::Bucket { .. }, Step::Object { .. }, Step::Policy { .. }]
    ));

    let setup_log = log.lock().unwrap().clone();
    assert_eq!(
        vec!["create_bucket", "put_object", "put_tenant_policy"],
        setup_log
    );
    log.lock().unwrap().clear();

    assert_eq!(0, fixture.teardown().await);

    let teardown_log = log.lock().unwrap().clone();
    let policy = position(&teardown_log, "delete_bucket_policy");
    let object = position(&teardown_log, "delete_object");
    let bucket = position(&teardown_log, "delete_bucket");
    assert!(position(&teardown_log, "put_allow_all_policy") < policy);
    assert!(policy < object && object < bucket, "{teardown_log:?}");
}

#[tokio::test]
async fn test_tenant_policy_requires_guest() {
    let log: CallLog = Arc::default();
    let clients = Clients::new(vec![test_common::client(recording_owner(log.clone()))]).unwrap();

    let err = scenario::bucket_with_tenant_policy(&clients, "no_guest", Effect::Allow, &["s3:*"])
        .await
        .unwrap_err();
    assert!(err.is_skip());
    assert!(log.lock().unwrap().is_empty());
}
