/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */
use std::error::Error;
use std::path::PathBuf;

use clap::Parser;
use s3_conformance::client::create_client;
use s3_conformance::naming::TEST_BUCKET_PREFIX;
use s3_conformance::operation::purge::purge_buckets_with_prefix;
use tracing::Instrument;

type BoxError = Box<dyn Error + Send + Sync>;

#[derive(Debug, Clone, clap::Parser)]
#[command(name = "cleanup")]
#[command(about = "Deletes buckets left behind by interrupted conformance runs.")]
pub struct Args {
    /// Params file holding the profiles
    #[arg(long, env = "CONFIG", default_value = "params.yaml")]
    config: PathBuf,

    /// Profile whose buckets are purged
    #[arg(long, env = "PROFILE", default_value = "default")]
    profile: String,

    /// Only buckets whose name starts with this prefix are purged
    #[arg(long, default_value = TEST_BUCKET_PREFIX)]
    prefix: String,
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_thread_ids(true)
        .init();

    let config = s3_conformance::from_env()
        .path(&args.config)
        .load()
        .await?;
    let client = create_client(config.profile(&args.profile)?, &config).await?;

    let purged = purge_buckets_with_prefix(&client, &args.prefix)
        .instrument(tracing::info_span!("cleanup", profile = %args.profile))
        .await?;

    println!("purged {} bucket(s)", purged.len());
    for bucket in purged {
        println!("  {bucket}");
    }
    Ok(())
}
