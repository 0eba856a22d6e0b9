/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::sync::Arc;

/// Bucket creation and deletion
pub mod bucket;

/// Object creation and deletion
pub mod object;

/// Bucket versioning
pub mod versioning;

/// Object lock configuration and retention
pub mod lock;

/// Bucket policy management
pub mod bucket_policy;

/// Canned ACLs on buckets and objects
pub mod acl;

/// Teardown of versioned, locked and leaked buckets
pub mod purge;

/// Storage class changes and inspection
pub mod storage_class;

/// Presigned GET and PUT requests
pub mod presign;

/// Multipart upload and ranged download of a single object
pub mod multipart;

/// Worker-pool upload, download and delete of many objects
pub mod bulk_objects;

/// Container for maintaining context required to carry out a single multi-object operation.
///
/// `State` is whatever additional operation specific state is required for the operation.
#[derive(Debug)]
pub(crate) struct TransferContext<State> {
    handle: Arc<crate::client::Handle>,
    state: Arc<State>,
}

impl<State> TransferContext<State> {
    /// The S3 client to use for SDK operations
    pub(crate) fn client(&self) -> &aws_sdk_s3::Client {
        &self.handle.s3
    }
}

impl<State> Clone for TransferContext<State> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
            state: self.state.clone(),
        }
    }
}
