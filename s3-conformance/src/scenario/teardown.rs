/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use crate::error::Error;
use crate::operation::bucket_policy::purge_policy;
use crate::operation::purge::{delete_object_version, purge_bucket};
use crate::types::LockMode;
use crate::Client;

/// One resource created during setup, undone at teardown.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Step {
    /// An object version, deleted with governance bypass when `lock_mode` allows it
    Object {
        /// Bucket holding the object
        bucket: String,
        /// Object key
        key: String,
        /// Version created by setup, `None` on unversioned buckets
        version_id: Option<String>,
        /// Retention the version may be under
        lock_mode: Option<LockMode>,
    },
    /// A bucket policy, overwritten and then removed
    Policy {
        /// Bucket the policy is attached to
        bucket: String,
    },
    /// A bucket, purged of every version and then deleted
    Bucket {
        /// Bucket name
        bucket: String,
        /// Retention objects in the bucket may be under
        lock_mode: Option<LockMode>,
    },
}

impl Step {
    async fn undo(&self, client: &Client) -> Result<(), Error> {
        match self {
            Step::Object {
                bucket,
                key,
                version_id,
                lock_mode,
            } => {
                let deleted =
                    delete_object_version(client, bucket, key, version_id.as_deref(), *lock_mode)
                        .await?;
                if !deleted {
                    tracing::warn!(bucket, key, "object version is retained");
                }
            }
            Step::Policy { bucket } => {
                purge_policy(client, bucket).await;
            }
            Step::Bucket { bucket, lock_mode } => {
                let report = purge_bucket(client, bucket, *lock_mode).await?;
                tracing::debug!(bucket, ?report, "bucket torn down");
            }
        }
        Ok(())
    }
}

/// Stack of [`Step`]s undone in reverse order of creation.
///
/// Failures while undoing are logged and never returned, so a failing cleanup cannot change the
/// verdict of the test that used the fixture.
#[derive(Debug)]
pub struct Teardown {
    client: Client,
    steps: Vec<Step>,
}

impl Teardown {
    pub(crate) fn new(client: Client) -> Self {
        Teardown {
            client,
            steps: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, step: Step) {
        tracing::trace!(?step, "registered teardown step");
        self.steps.push(step);
    }

    /// The client steps are undone with
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Steps still to undo, in creation order
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Undo every step, newest first. Returns the number of steps that failed.
    #[tracing::instrument(
        skip(self),
        fields(profile = self.client.profile().name(), steps = self.steps.len())
    )]
    pub async fn run(mut self) -> usize {
        let steps = std::mem::take(&mut self.steps);
        let mut failed = 0;
        for step in steps.iter().rev() {
            if let Err(err) = step.undo(&self.client).await {
                failed += 1;
                tracing::warn!(?step, "teardown step failed: {err}");
            }
        }
        failed
    }
}

impl Drop for Teardown {
    fn drop(&mut self) {
        if !self.steps.is_empty() {
            tracing::warn!(
                pending = self.steps.len(),
                "fixture dropped without teardown, resources may leak: {:?}",
                self.steps
            );
        }
    }
}
