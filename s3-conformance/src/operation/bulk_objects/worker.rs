/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::sync::atomic::Ordering;

use async_channel::{Receiver, Sender};
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;

use crate::error::{self, ErrorKind};

use super::BulkContext;

/// One object operation handed to a worker.
#[derive(Debug)]
pub(super) enum Job {
    Upload { key: String, body: Bytes },
    Download { key: String },
    Delete { key: String },
}

impl Job {
    fn key(&self) -> &str {
        match self {
            Job::Upload { key, .. } | Job::Download { key } | Job::Delete { key } => key,
        }
    }
}

pub(super) async fn distribute(jobs: Vec<Job>, work_tx: Sender<Job>) -> Result<(), error::Error> {
    for job in jobs {
        if work_tx.send(job).await.is_err() {
            tracing::warn!("all workers have exited, dropping remaining jobs");
            break;
        }
    }
    Ok(())
}

pub(super) async fn process_jobs(
    ctx: BulkContext,
    work_rx: Receiver<Job>,
) -> Result<(), error::Error> {
    while let Ok(job) = work_rx.recv().await {
        let key = job.key().to_owned();
        match run_job(&ctx, job).await {
            Ok(()) => {
                ctx.state.succeeded.fetch_add(1, Ordering::SeqCst);
                tracing::trace!("worker finished {key:?}");
            }
            Err(err) => {
                tracing::debug!("worker failed on {key:?}: {err}");
            }
        }
    }

    tracing::trace!("req channel closed, worker finished");
    Ok(())
}

async fn run_job(ctx: &BulkContext, job: Job) -> Result<(), error::Error> {
    let bucket = ctx.state.bucket.as_str();
    match job {
        Job::Upload { key, body } => {
            ctx.client()
                .put_object()
                .bucket(bucket)
                .key(key)
                .body(ByteStream::from(body))
                .send()
                .await?;
        }
        Job::Download { key } => {
            let output = ctx
                .client()
                .get_object()
                .bucket(bucket)
                .key(key)
                .send()
                .await?;
            // drain the body so a truncated download counts as a failure
            output
                .body
                .collect()
                .await
                .map_err(error::from_kind(ErrorKind::IOError))?;
        }
        Job::Delete { key } => {
            ctx.client()
                .delete_object()
                .bucket(bucket)
                .key(key)
                .send()
                .await?;
        }
    }
    Ok(())
}
