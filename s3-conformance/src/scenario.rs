/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Named preconditions built from the lifecycle operations.
//!
//! Every scenario returns a [`Fixture`]: the value the test needs plus the [`Teardown`] that
//! undoes exactly what setup created, newest first. If setup fails half way, whatever was
//! already created is torn down before the error is returned.
//!
//! ```no_run
//! # async fn example(client: s3_conformance::Client) -> Result<(), s3_conformance::error::Error> {
//! let fixture = s3_conformance::scenario::bucket_with_one_object(&client, "acl_read").await?;
//! let bucket = fixture.value().bucket();
//! // ... assertions against `bucket` ...
//! fixture.teardown().await;
//! # Ok(())
//! # }
//! ```

use bytes::Bytes;

use crate::client::Clients;
use crate::error::Error;
use crate::naming;
use crate::operation::bucket::{ensure_bucket_with, BucketSpec};
use crate::operation::bucket_policy::put_policy;
use crate::operation::bulk_objects::upload_objects;
use crate::operation::lock::{put_lock_configuration_and_confirm, Retention};
use crate::operation::object::{ensure_object, ObjectLock, ObjectSpec, PutObjectResult};
use crate::operation::versioning::enable_versioning_and_confirm;
use crate::policy::{self, Effect, Principal, Statement};
use crate::types::{CannedAcl, LockMode, StorageClass};
use crate::Client;

mod teardown;
pub use teardown::{Step, Teardown};

/// Key of the first object created by single-object scenarios
pub const OBJECT_KEY: &str = "test-object.txt";

/// Key of the sibling object in [`bucket_with_two_objects`]
pub const SIBLING_KEY: &str = "test-object-sibling.txt";

/// Key of the object written before the lock rule in [`versioned_bucket_with_lock_config`]
pub const PRE_LOCK_KEY: &str = "pre-lock-object.txt";

/// Key of the object written after the lock rule in [`versioned_bucket_with_lock_config`]
pub const POST_LOCK_KEY: &str = "post-lock-object.txt";

/// Prefix of the keys written by [`bucket_with_objects`]
pub const BULK_PREFIX: &str = "bulk-object";

const OBJECT_BODY: &[u8] = b"Test object content";

/// A precondition together with its teardown.
#[derive(Debug)]
pub struct Fixture<T> {
    value: T,
    teardown: Teardown,
}

impl<T> Fixture<T> {
    /// What setup produced
    pub fn value(&self) -> &T {
        &self.value
    }

    /// The owner client that created the resources
    pub fn client(&self) -> &Client {
        self.teardown.client()
    }

    /// Resources registered for teardown, in creation order
    pub fn pending_steps(&self) -> &[Step] {
        self.teardown.steps()
    }

    /// Undo setup, newest resource first. Failures are logged and counted, never raised.
    pub async fn teardown(self) -> usize {
        self.teardown.run().await
    }
}

/// A bucket and the objects setup put in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketFixture {
    bucket: String,
    objects: Vec<PutObjectResult>,
}

impl BucketFixture {
    fn new(bucket: String) -> Self {
        BucketFixture {
            bucket,
            objects: Vec::new(),
        }
    }

    /// The bucket name
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Objects in creation order
    pub fn objects(&self) -> &[PutObjectResult] {
        &self.objects
    }

    /// The first object, if setup created any
    pub fn object(&self) -> Option<&PutObjectResult> {
        self.objects.first()
    }
}

/// A locked bucket holding one object written before its lock rule and one written after.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockedBucket {
    bucket: BucketFixture,
    retention: Retention,
}

impl LockedBucket {
    /// The bucket name
    pub fn bucket(&self) -> &str {
        self.bucket.bucket()
    }

    /// The default retention configured on the bucket
    pub fn retention(&self) -> Retention {
        self.retention
    }

    /// The object written before the lock rule existed
    pub fn pre_lock(&self) -> &PutObjectResult {
        &self.bucket.objects[0]
    }

    /// The object written after the lock rule
    pub fn post_lock(&self) -> &PutObjectResult {
        &self.bucket.objects[1]
    }
}

/// A bucket whose policy names a second tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantPolicyBucket {
    bucket: BucketFixture,
    tenant_id: String,
    policy: serde_json::Value,
}

impl TenantPolicyBucket {
    /// The bucket name
    pub fn bucket(&self) -> &str {
        self.bucket.bucket()
    }

    /// The object owned by the first client
    pub fn object(&self) -> Option<&PutObjectResult> {
        self.bucket.object()
    }

    /// Canonical ID of the tenant named in the policy
    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    /// The policy document that was attached
    pub fn policy(&self) -> &serde_json::Value {
        &self.policy
    }
}

/// A bucket populated through the bulk worker pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopulatedBucket {
    bucket: String,
    uploaded: usize,
}

impl PopulatedBucket {
    /// The bucket name
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// How many uploads succeeded
    pub fn uploaded(&self) -> usize {
        self.uploaded
    }
}

/// Per-object setting given to only the first object of [`bucket_with_two_objects`].
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectOverride {
    /// Canned ACL on the first object
    Acl(CannedAcl),
    /// Retention on the first object. The bucket is created with object lock enabled.
    Lock(ObjectLock),
}

/// Turn the outcome of setup into a fixture, tearing down partial setup on failure.
async fn finish<T>(teardown: Teardown, setup: Result<T, Error>) -> Result<Fixture<T>, Error> {
    match setup {
        Ok(value) => Ok(Fixture { value, teardown }),
        Err(err) => {
            tracing::warn!("setup failed, tearing down partial fixture: {err}");
            teardown.run().await;
            Err(err)
        }
    }
}

async fn create_bucket(
    client: &Client,
    teardown: &mut Teardown,
    test_name: &str,
    spec: &BucketSpec,
    lock_mode: Option<LockMode>,
) -> Result<String, Error> {
    let bucket = naming::test_bucket_name(test_name);
    ensure_bucket_with(client, &bucket, spec).await?;
    teardown.push(Step::Bucket {
        bucket: bucket.clone(),
        lock_mode,
    });
    Ok(bucket)
}

async fn create_object(
    client: &Client,
    teardown: &mut Teardown,
    bucket: &str,
    spec: &ObjectSpec,
) -> Result<PutObjectResult, Error> {
    let result = ensure_object(client, bucket, spec).await?;
    teardown.push(Step::Object {
        bucket: bucket.to_owned(),
        key: result.key().to_owned(),
        version_id: result.version_id().map(str::to_owned),
        lock_mode: spec.object_lock().map(ObjectLock::mode),
    });
    Ok(result)
}

async fn create_versioned_bucket(
    client: &Client,
    teardown: &mut Teardown,
    test_name: &str,
    spec: &BucketSpec,
    lock_mode: Option<LockMode>,
) -> Result<String, Error> {
    let bucket = create_bucket(client, teardown, test_name, spec, lock_mode).await?;
    enable_versioning_and_confirm(client, &bucket).await?;
    Ok(bucket)
}

/// An existing, empty bucket.
#[tracing::instrument(skip(client), fields(profile = client.profile().name()))]
pub async fn bucket(client: &Client, test_name: &str) -> Result<Fixture<BucketFixture>, Error> {
    let mut teardown = Teardown::new(client.clone());
    let setup = create_bucket(client, &mut teardown, test_name, &BucketSpec::default(), None)
        .await
        .map(BucketFixture::new);
    finish(teardown, setup).await
}

async fn setup_one_object(
    client: &Client,
    teardown: &mut Teardown,
    test_name: &str,
    versioned: bool,
    storage_class: Option<StorageClass>,
) -> Result<BucketFixture, Error> {
    let bucket = if versioned {
        create_versioned_bucket(client, teardown, test_name, &BucketSpec::default(), None).await?
    } else {
        create_bucket(client, teardown, test_name, &BucketSpec::default(), None).await?
    };
    let mut spec = ObjectSpec::new(OBJECT_KEY, OBJECT_BODY).expect_version_id(versioned);
    if let Some(storage_class) = storage_class {
        spec = spec.storage_class(storage_class);
    }
    let object = create_object(client, teardown, &bucket, &spec).await?;
    Ok(BucketFixture {
        bucket,
        objects: vec![object],
    })
}

/// A bucket holding [`OBJECT_KEY`].
#[tracing::instrument(skip(client), fields(profile = client.profile().name()))]
pub async fn bucket_with_one_object(
    client: &Client,
    test_name: &str,
) -> Result<Fixture<BucketFixture>, Error> {
    let mut teardown = Teardown::new(client.clone());
    let setup = setup_one_object(client, &mut teardown, test_name, false, None).await;
    finish(teardown, setup).await
}

/// A bucket with versioning confirmed `Enabled` holding [`OBJECT_KEY`] with a version id.
#[tracing::instrument(skip(client), fields(profile = client.profile().name()))]
pub async fn versioned_bucket_with_one_object(
    client: &Client,
    test_name: &str,
) -> Result<Fixture<BucketFixture>, Error> {
    let mut teardown = Teardown::new(client.clone());
    let setup = setup_one_object(client, &mut teardown, test_name, true, None).await;
    finish(teardown, setup).await
}

/// A bucket holding [`OBJECT_KEY`] stored in the cold instant-retrieval class.
#[tracing::instrument(skip(client), fields(profile = client.profile().name()))]
pub async fn bucket_with_one_cold_object(
    client: &Client,
    test_name: &str,
) -> Result<Fixture<BucketFixture>, Error> {
    let mut teardown = Teardown::new(client.clone());
    let setup = setup_one_object(
        client,
        &mut teardown,
        test_name,
        false,
        Some(StorageClass::ColdInstant),
    )
    .await;
    finish(teardown, setup).await
}

/// A versioned bucket with object lock enabled and no default retention.
#[tracing::instrument(skip(client), fields(profile = client.profile().name()))]
pub async fn bucket_with_lock(
    client: &Client,
    test_name: &str,
) -> Result<Fixture<BucketFixture>, Error> {
    let mut teardown = Teardown::new(client.clone());
    let lock_mode = client.profile().lock_mode();
    let setup = async {
        let bucket = create_versioned_bucket(
            client,
            &mut teardown,
            test_name,
            &BucketSpec::default(),
            lock_mode,
        )
        .await?;
        put_lock_configuration_and_confirm(client, &bucket, None).await?;
        Ok::<_, Error>(BucketFixture::new(bucket))
    }
    .await;
    finish(teardown, setup).await
}

async fn setup_lock_config(
    client: &Client,
    teardown: &mut Teardown,
    test_name: &str,
    retention: Retention,
) -> Result<LockedBucket, Error> {
    let mode = Some(retention.mode());
    let bucket =
        create_versioned_bucket(client, teardown, test_name, &BucketSpec::default(), mode).await?;
    let pre_spec = ObjectSpec::new(PRE_LOCK_KEY, OBJECT_BODY).expect_version_id(true);
    let pre_lock = create_object(client, teardown, &bucket, &pre_spec).await?;

    put_lock_configuration_and_confirm(client, &bucket, Some(retention)).await?;

    let post_spec = ObjectSpec::new(POST_LOCK_KEY, OBJECT_BODY).expect_version_id(true);
    let post_lock = ensure_object(client, &bucket, &post_spec).await?;
    // retained by the bucket default, not by the put itself
    teardown.push(Step::Object {
        bucket: bucket.clone(),
        key: post_lock.key().to_owned(),
        version_id: post_lock.version_id().map(str::to_owned),
        lock_mode: mode,
    });

    Ok(LockedBucket {
        bucket: BucketFixture {
            bucket,
            objects: vec![pre_lock, post_lock],
        },
        retention,
    })
}

/// A versioned bucket with a default retention of `days` in `mode`, holding [`PRE_LOCK_KEY`]
/// written before the rule and [`POST_LOCK_KEY`] written after it.
///
/// Versioning is confirmed `Enabled` before the lock configuration is sent.
#[tracing::instrument(skip(client), fields(profile = client.profile().name()))]
pub async fn versioned_bucket_with_lock_config(
    client: &Client,
    test_name: &str,
    mode: LockMode,
    days: i32,
) -> Result<Fixture<LockedBucket>, Error> {
    let mut teardown = Teardown::new(client.clone());
    let setup =
        setup_lock_config(client, &mut teardown, test_name, Retention::new(mode, days)).await;
    finish(teardown, setup).await
}

async fn setup_two_objects(
    client: &Client,
    teardown: &mut Teardown,
    test_name: &str,
    object_override: ObjectOverride,
) -> Result<BucketFixture, Error> {
    let mut first = ObjectSpec::new(OBJECT_KEY, OBJECT_BODY);
    let bucket = match object_override {
        ObjectOverride::Acl(acl) => {
            first = first.acl(acl);
            create_bucket(client, teardown, test_name, &BucketSpec::default(), None).await?
        }
        ObjectOverride::Lock(lock) => {
            let lock_mode = Some(lock.mode());
            first = first.lock(lock).expect_version_id(true);
            create_versioned_bucket(
                client,
                teardown,
                test_name,
                &BucketSpec::default().object_lock_enabled(true),
                lock_mode,
            )
            .await?
        }
    };

    let overridden = create_object(client, teardown, &bucket, &first).await?;
    let sibling_spec = ObjectSpec::new(SIBLING_KEY, OBJECT_BODY);
    let sibling = create_object(client, teardown, &bucket, &sibling_spec).await?;
    Ok(BucketFixture {
        bucket,
        objects: vec![overridden, sibling],
    })
}

/// A bucket with [`OBJECT_KEY`] carrying `object_override` and [`SIBLING_KEY`] left at the
/// defaults.
#[tracing::instrument(skip(client), fields(profile = client.profile().name()))]
pub async fn bucket_with_two_objects(
    client: &Client,
    test_name: &str,
    object_override: ObjectOverride,
) -> Result<Fixture<BucketFixture>, Error> {
    let mut teardown = Teardown::new(client.clone());
    let setup = setup_two_objects(client, &mut teardown, test_name, object_override).await;
    finish(teardown, setup).await
}

async fn setup_tenant_policy(
    owner: &Client,
    teardown: &mut Teardown,
    test_name: &str,
    tenant_id: String,
    statement: impl FnOnce(Principal) -> Statement,
) -> Result<TenantPolicyBucket, Error> {
    let bucket = create_bucket(owner, teardown, test_name, &BucketSpec::default(), None).await?;
    let object_spec = ObjectSpec::new(OBJECT_KEY, OBJECT_BODY);
    let object = create_object(owner, teardown, &bucket, &object_spec).await?;

    let document =
        policy::policy_document(&bucket, &[statement(Principal::tenant(tenant_id.clone()))]);
    put_policy(owner, &bucket, &document).await?;
    teardown.push(Step::Policy {
        bucket: bucket.clone(),
    });

    Ok(TenantPolicyBucket {
        bucket: BucketFixture {
            bucket,
            objects: vec![object],
        },
        tenant_id,
        policy: document,
    })
}

/// A bucket and object owned by `clients[0]` whose policy applies `effect` on `actions` to the
/// canonical ID of `clients[1]`.
#[tracing::instrument(skip(clients), fields(profile = clients.owner().profile().name()))]
pub async fn bucket_with_tenant_policy(
    clients: &Clients,
    test_name: &str,
    effect: Effect,
    actions: &[&str],
) -> Result<Fixture<TenantPolicyBucket>, Error> {
    let owner = clients.owner();
    let tenant_id = clients.guest()?.canonical_id().await?;
    tracing::debug!(tenant_id, "resolved tenant canonical id");

    let mut teardown = Teardown::new(owner.clone());
    let setup = setup_tenant_policy(owner, &mut teardown, test_name, tenant_id, |principal| {
        Statement::new(effect, principal, actions.iter().copied())
    })
    .await;
    finish(teardown, setup).await
}

/// A bucket holding `quantity` copies of `body` under [`BULK_PREFIX`], uploaded by the worker
/// pool. Objects are removed with the bucket at teardown.
#[tracing::instrument(skip(client, body), fields(profile = client.profile().name()))]
pub async fn bucket_with_objects(
    client: &Client,
    test_name: &str,
    quantity: usize,
    body: Bytes,
) -> Result<Fixture<PopulatedBucket>, Error> {
    let mut teardown = Teardown::new(client.clone());
    let setup = async {
        let bucket =
            create_bucket(client, &mut teardown, test_name, &BucketSpec::default(), None).await?;
        let uploaded = upload_objects(client, &bucket, BULK_PREFIX, body, quantity).await?;
        Ok::<_, Error>(PopulatedBucket { bucket, uploaded })
    }
    .await;
    finish(teardown, setup).await
}
