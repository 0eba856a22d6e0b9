/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::task::JoinSet;
use tracing::Instrument;

use crate::error::Error;
use crate::Client;

use super::TransferContext;

mod worker;

use worker::Job;

/// State shared by the workers of one bulk operation
#[derive(Debug)]
pub(crate) struct BulkState {
    bucket: String,
    succeeded: AtomicU64,
}

type BulkContext = TransferContext<BulkState>;

impl BulkContext {
    fn new(handle: Arc<crate::client::Handle>, bucket: &str) -> Self {
        let state = Arc::new(BulkState {
            bucket: bucket.to_owned(),
            succeeded: AtomicU64::default(),
        });
        TransferContext { handle, state }
    }
}

/// Run `jobs` through a bounded worker pool and return how many succeeded.
async fn run_jobs(client: &Client, bucket: &str, jobs: Vec<Job>) -> Result<usize, Error> {
    let concurrency = client.handle.num_workers();
    let total = jobs.len();
    let ctx = BulkContext::new(client.handle.clone(), bucket);

    // every task lives in the same JoinSet so dropping it cancels all of them
    let mut tasks = JoinSet::new();
    let (work_tx, work_rx) = async_channel::bounded(concurrency);

    tasks.spawn(worker::distribute(jobs, work_tx));
    for i in 0..concurrency {
        let worker = worker::process_jobs(ctx.clone(), work_rx.clone())
            .instrument(tracing::debug_span!("bulk-worker", worker = i));
        tasks.spawn(worker);
    }
    drop(work_rx);

    while let Some(joined) = tasks.join_next().await {
        joined??;
    }

    let succeeded = ctx.state.succeeded.load(Ordering::SeqCst) as usize;
    tracing::info!(bucket, succeeded, total, "bulk operation finished");
    Ok(succeeded)
}

/// Upload `quantity` copies of `body` as `{prefix}-0` .. `{prefix}-{quantity - 1}`.
///
/// Returns the number of successful uploads. Individual failures are logged, not returned.
#[tracing::instrument(skip(client, body), fields(size = body.len()))]
pub async fn upload_objects(
    client: &Client,
    bucket: &str,
    prefix: &str,
    body: Bytes,
    quantity: usize,
) -> Result<usize, Error> {
    let jobs = (0..quantity)
        .map(|i| Job::Upload {
            key: format!("{prefix}-{i}"),
            body: body.clone(),
        })
        .collect();
    run_jobs(client, bucket, jobs).await
}

/// Download every object of `bucket`, discarding the bodies. Returns the number downloaded.
#[tracing::instrument(skip(client))]
pub async fn download_objects(client: &Client, bucket: &str) -> Result<usize, Error> {
    let jobs = list_all_keys(client, bucket)
        .await?
        .into_iter()
        .map(|key| Job::Download { key })
        .collect();
    run_jobs(client, bucket, jobs).await
}

/// Delete every object of `bucket`. Returns the number deleted.
#[tracing::instrument(skip(client))]
pub async fn delete_objects(client: &Client, bucket: &str) -> Result<usize, Error> {
    let jobs = list_all_keys(client, bucket)
        .await?
        .into_iter()
        .map(|key| Job::Delete { key })
        .collect();
    run_jobs(client, bucket, jobs).await
}

/// Every key in `bucket`, following `ListObjectsV2` continuation tokens.
pub async fn list_all_keys(client: &Client, bucket: &str) -> Result<Vec<String>, Error> {
    let mut pages = client
        .s3()
        .list_objects_v2()
        .bucket(bucket)
        .into_paginator()
        .send();

    let mut keys = Vec::new();
    while let Some(page) = pages.next().await {
        let page = page?;
        keys.extend(
            page.contents()
                .iter()
                .filter_map(|object| object.key())
                .map(str::to_owned),
        );
    }
    Ok(keys)
}
