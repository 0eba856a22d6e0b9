/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use aws_sdk_s3::types::{MetadataDirective, ObjectAttributes};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::error::Error;
use crate::types::StorageClass;
use crate::Client;

/// Characters escaped in the key part of `x-amz-copy-source`; `/` separates key segments.
const COPY_SOURCE_KEY: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

fn copy_source(bucket: &str, key: &str) -> String {
    format!("{bucket}/{}", utf8_percent_encode(key, COPY_SOURCE_KEY))
}

/// The storage class the service reports for `key`, as sent on the wire.
///
/// Objects in the default class may be reported without a class, which is returned as `None`.
pub async fn storage_class_of(
    client: &Client,
    bucket: &str,
    key: &str,
) -> Result<Option<String>, Error> {
    let output = client
        .s3()
        .get_object_attributes()
        .bucket(bucket)
        .key(key)
        .object_attributes(ObjectAttributes::StorageClass)
        .send()
        .await?;
    Ok(output.storage_class().map(|class| class.as_str().to_owned()))
}

/// Whether `key` is stored in `expected`, accepting the aliases [`StorageClass::from_wire`]
/// knows about. A missing class is read as `STANDARD`.
pub async fn is_stored_as(
    client: &Client,
    bucket: &str,
    key: &str,
    expected: StorageClass,
) -> Result<bool, Error> {
    let reported = storage_class_of(client, bucket, key).await?;
    let class = reported.as_deref().unwrap_or("STANDARD");
    Ok(StorageClass::from_wire(class) == Some(expected))
}

/// Move `key` to another storage class by copying it onto itself.
#[tracing::instrument(skip(client))]
pub async fn change_storage_class(
    client: &Client,
    bucket: &str,
    key: &str,
    storage_class: StorageClass,
) -> Result<(), Error> {
    client
        .s3()
        .copy_object()
        .bucket(bucket)
        .key(key)
        .copy_source(copy_source(bucket, key))
        .storage_class(storage_class.into())
        .metadata_directive(MetadataDirective::Copy)
        .send()
        .await?;
    Ok(())
}
