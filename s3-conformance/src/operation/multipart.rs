/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::collections::HashMap;

use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use bytes::{Bytes, BytesMut};
use futures_util::{StreamExt, TryStreamExt};

use crate::error::{self, Error, ErrorKind};
use crate::types::StorageClass;
use crate::Client;

/// Part layout of multipart transfers
pub mod parts;

use parts::{part_ranges, PartRange};

/// Per-request overrides for [`multipart_upload`]. Unset values come from the client config.
#[derive(Debug, Clone, Default)]
pub struct MultipartOptions {
    threshold: Option<u64>,
    part_size: Option<u64>,
    storage_class: Option<StorageClass>,
}

impl MultipartOptions {
    /// Objects smaller than `threshold` bytes are uploaded with a single `PutObject`.
    pub fn threshold(mut self, threshold: u64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    /// Size of each part in bytes. Not rounded up, the service enforces its own minimum.
    pub fn part_size(mut self, part_size: u64) -> Self {
        self.part_size = Some(part_size);
        self
    }

    /// Storage class of the resulting object
    pub fn storage_class(mut self, storage_class: StorageClass) -> Self {
        self.storage_class = Some(storage_class);
        self
    }
}

/// Result of [`multipart_upload`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartUploadOutput {
    upload_id: Option<String>,
    e_tag: Option<String>,
    version_id: Option<String>,
    parts: usize,
}

impl MultipartUploadOutput {
    /// The multipart upload id, `None` when the object was small enough for a single put
    pub fn upload_id(&self) -> Option<&str> {
        self.upload_id.as_deref()
    }

    /// The ETag of the completed object
    pub fn e_tag(&self) -> Option<&str> {
        self.e_tag.as_deref()
    }

    /// The version id of the completed object
    pub fn version_id(&self) -> Option<&str> {
        self.version_id.as_deref()
    }

    /// Number of parts uploaded, 1 for a single put
    pub fn parts(&self) -> usize {
        self.parts
    }
}

fn normalize_e_tag(e_tag: &str) -> &str {
    e_tag.trim_matches('"')
}

async fn upload_part(
    client: &Client,
    bucket: &str,
    key: &str,
    upload_id: &str,
    body: &Bytes,
    range: PartRange,
) -> Result<CompletedPart, Error> {
    let chunk = body.slice(range.offset() as usize..range.end() as usize);
    let output = client
        .s3()
        .upload_part()
        .bucket(bucket)
        .key(key)
        .upload_id(upload_id)
        .part_number(range.part_number())
        .content_length(range.len() as i64)
        .body(ByteStream::from(chunk))
        .send()
        .await?;
    let e_tag = output.e_tag().ok_or_else(|| {
        Error::new(
            ErrorKind::RuntimeError,
            format!("UploadPart {} response did not include an ETag", range.part_number()),
        )
    })?;
    tracing::trace!(part_number = range.part_number(), e_tag, "uploaded part");

    Ok(CompletedPart::builder()
        .part_number(range.part_number())
        .e_tag(e_tag)
        .build())
}

async fn listed_e_tags(
    client: &Client,
    bucket: &str,
    key: &str,
    upload_id: &str,
) -> Result<HashMap<i32, String>, Error> {
    let mut listed = HashMap::new();
    let mut marker = None;
    loop {
        let output = client
            .s3()
            .list_parts()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .set_part_number_marker(marker)
            .send()
            .await?;
        for part in output.parts() {
            if let (Some(number), Some(e_tag)) = (part.part_number(), part.e_tag()) {
                listed.insert(number, normalize_e_tag(e_tag).to_owned());
            }
        }
        marker = output.next_part_number_marker().map(str::to_owned);
        if !output.is_truncated().unwrap_or(false) || marker.is_none() {
            return Ok(listed);
        }
    }
}

/// Check every recorded part against `ListParts`, failing on the first mismatch.
async fn verify_parts(
    client: &Client,
    bucket: &str,
    key: &str,
    upload_id: &str,
    parts: &[CompletedPart],
) -> Result<(), Error> {
    let listed = listed_e_tags(client, bucket, key, upload_id).await?;
    for part in parts {
        let number = part.part_number().unwrap_or_default();
        let expected = normalize_e_tag(part.e_tag().unwrap_or_default());
        let actual = listed.get(&number).map(String::as_str);
        if actual != Some(expected) {
            return Err(error::etag_mismatch(number, expected, actual));
        }
    }
    Ok(())
}

async fn upload_verify_complete(
    client: &Client,
    bucket: &str,
    key: &str,
    upload_id: &str,
    body: &Bytes,
    part_size: u64,
) -> Result<MultipartUploadOutput, Error> {
    let ranges = part_ranges(body.len() as u64, part_size);
    let mut parts: Vec<CompletedPart> = futures_util::stream::iter(ranges)
        .map(|range| upload_part(client, bucket, key, upload_id, body, range))
        .buffer_unordered(client.handle.num_workers())
        .try_collect()
        .await?;

    verify_parts(client, bucket, key, upload_id, &parts).await?;

    parts.sort_by_key(|p| p.part_number());
    let num_parts = parts.len();
    let output = client
        .s3()
        .complete_multipart_upload()
        .bucket(bucket)
        .key(key)
        .upload_id(upload_id)
        .multipart_upload(
            CompletedMultipartUpload::builder()
                .set_parts(Some(parts))
                .build(),
        )
        .send()
        .await?;
    tracing::debug!(parts = num_parts, "completed multipart upload");

    Ok(MultipartUploadOutput {
        upload_id: Some(upload_id.to_owned()),
        e_tag: output.e_tag().map(str::to_owned),
        version_id: output.version_id().map(str::to_owned),
        parts: num_parts,
    })
}

/// Upload `body` to `key`, as a multipart upload when it reaches the threshold.
///
/// Parts are uploaded concurrently. Before completing, `ListParts` is compared with the ETags
/// recorded at upload; any mismatch aborts the upload with
/// [`ErrorKind::ETagMismatch`](crate::error::ErrorKind::ETagMismatch) and the completion is never
/// sent. Any other failure also aborts the upload.
#[tracing::instrument(skip(client, body, options), fields(size = body.len()))]
pub async fn multipart_upload(
    client: &Client,
    bucket: &str,
    key: &str,
    body: Bytes,
    options: &MultipartOptions,
) -> Result<MultipartUploadOutput, Error> {
    let threshold = options
        .threshold
        .unwrap_or_else(|| client.handle.mpu_threshold_bytes());
    if (body.len() as u64) < threshold {
        let output = client
            .s3()
            .put_object()
            .bucket(bucket)
            .key(key)
            .set_storage_class(options.storage_class.map(Into::into))
            .body(ByteStream::from(body))
            .send()
            .await?;
        return Ok(MultipartUploadOutput {
            upload_id: None,
            e_tag: output.e_tag().map(str::to_owned),
            version_id: output.version_id().map(str::to_owned),
            parts: 1,
        });
    }

    let part_size = options
        .part_size
        .unwrap_or_else(|| client.handle.part_size_bytes());
    let created = client
        .s3()
        .create_multipart_upload()
        .bucket(bucket)
        .key(key)
        .set_storage_class(options.storage_class.map(Into::into))
        .send()
        .await?;
    let upload_id = created.upload_id().ok_or_else(|| {
        Error::new(
            ErrorKind::RuntimeError,
            "CreateMultipartUpload response did not include an upload id",
        )
    })?;

    match upload_verify_complete(client, bucket, key, upload_id, &body, part_size).await {
        Ok(output) => Ok(output),
        Err(err) => {
            tracing::debug!("aborting multipart upload: {err}");
            let aborted = client
                .s3()
                .abort_multipart_upload()
                .bucket(bucket)
                .key(key)
                .upload_id(upload_id)
                .send()
                .await;
            if let Err(abort_err) = aborted {
                tracing::warn!("failed to abort multipart upload {upload_id}: {abort_err}");
            }
            Err(err)
        }
    }
}

async fn get_range(
    client: &Client,
    bucket: &str,
    key: &str,
    range: PartRange,
) -> Result<Bytes, Error> {
    let output = client
        .s3()
        .get_object()
        .bucket(bucket)
        .key(key)
        .range(range.http_range())
        .send()
        .await?;
    let body = output
        .body
        .collect()
        .await
        .map_err(error::from_kind(ErrorKind::IOError))?;
    Ok(body.into_bytes())
}

/// Download `key` with concurrent ranged `GetObject` requests and reassemble it in order.
#[tracing::instrument(skip(client))]
pub async fn multipart_download(
    client: &Client,
    bucket: &str,
    key: &str,
    part_size: Option<u64>,
) -> Result<Bytes, Error> {
    let head = client
        .s3()
        .head_object()
        .bucket(bucket)
        .key(key)
        .send()
        .await?;
    let total = head.content_length().unwrap_or_default().max(0) as u64;
    if total == 0 {
        return Ok(Bytes::new());
    }

    let part_size = part_size.unwrap_or_else(|| client.handle.part_size_bytes());
    let chunks: Vec<Bytes> = futures_util::stream::iter(part_ranges(total, part_size))
        .map(|range| get_range(client, bucket, key, range))
        .buffered(client.handle.num_workers())
        .try_collect()
        .await?;

    let mut body = BytesMut::with_capacity(total as usize);
    for chunk in chunks {
        body.extend_from_slice(&chunk);
    }
    Ok(body.freeze())
}
