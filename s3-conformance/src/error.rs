/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::fmt;
use std::time::Duration;

use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_smithy_runtime_api::client::orchestrator::HttpResponse;

/// A boxed error that is `Send` and `Sync`.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors returned by this library
///
/// NOTE: Use [`aws_smithy_types::error::display::DisplayErrorContext`] or similar to display
/// the entire error cause/source chain.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    source: BoxError,
    service: Option<ServiceFailure>,
}

/// General categories of conformance fixture errors.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Operation input validation issues
    InputInvalid,

    /// The configuration file is missing, unreadable or malformed
    ConfigInvalid,

    /// A profile required by the test is not configured. Tests treat this as a skip.
    ProfileUnavailable,

    /// An external command line tool is not installed. Tests treat this as a skip.
    ToolUnavailable,

    /// The bucket name is already taken by another account
    NamingCollision,

    /// A read never converged to a stable value within the configured attempts
    ConsistencyTimeout,

    /// The ETag reported by the service for a part differs from the one recorded at upload
    ETagMismatch(ETagMismatch),

    /// The service rejected a request, see [`Error::code`] and [`Error::status`]
    ServiceError,

    /// Resource not found (e.g. bucket, key, version, policy)
    NotFound,

    /// An external command line tool ran but exited unsuccessfully
    ToolFailed,

    /// I/O errors
    IOError,

    /// Some kind of internal runtime issue (e.g. task failure, poisoned mutex, etc)
    RuntimeError,
}

/// Stores information about a multipart part whose ETag did not match.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ETagMismatch {
    part_number: i32,
}

impl ETagMismatch {
    /// The part number that was reported with an unexpected ETag
    pub fn part_number(&self) -> i32 {
        self.part_number
    }
}

/// The error code and HTTP status reported by the service for a failed request.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ServiceFailure {
    code: Option<String>,
    status: Option<u16>,
}

impl Error {
    /// Creates a new [`Error`] from a known kind of error as well as an arbitrary error
    /// source.
    pub fn new<E>(kind: ErrorKind, err: E) -> Error
    where
        E: Into<BoxError>,
    {
        Error {
            kind,
            source: err.into(),
            service: None,
        }
    }

    /// Returns the corresponding [`ErrorKind`] for this error.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// The service error code (e.g. `AccessDenied`, `InvalidBucketState`), if the service
    /// reported one.
    pub fn code(&self) -> Option<&str> {
        self.service.as_ref().and_then(|s| s.code.as_deref())
    }

    /// The HTTP status code of the failed response, if a response was received.
    pub fn status(&self) -> Option<u16> {
        self.service.as_ref().and_then(|s| s.status)
    }

    /// True when the error means the test should be skipped rather than failed.
    pub fn is_skip(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::ProfileUnavailable | ErrorKind::ToolUnavailable
        )
    }

    /// True when the error reports a missing resource.
    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::InputInvalid => write!(f, "invalid input"),
            ErrorKind::ConfigInvalid => write!(f, "invalid configuration"),
            ErrorKind::ProfileUnavailable => write!(f, "profile not configured"),
            ErrorKind::ToolUnavailable => write!(f, "command line tool not available"),
            ErrorKind::NamingCollision => write!(f, "bucket name owned by another account"),
            ErrorKind::ConsistencyTimeout => write!(f, "read did not converge"),
            ErrorKind::ETagMismatch(mismatch) => {
                write!(f, "ETag mismatch for part {}", mismatch.part_number)
            }
            ErrorKind::ServiceError => match self.code() {
                Some(code) => write!(f, "service error: {code}"),
                None => write!(f, "service error"),
            },
            ErrorKind::NotFound => write!(f, "resource not found"),
            ErrorKind::ToolFailed => write!(f, "command line tool failed"),
            ErrorKind::IOError => write!(f, "I/O error"),
            ErrorKind::RuntimeError => write!(f, "runtime error"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::new(ErrorKind::IOError, value)
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(value: tokio::task::JoinError) -> Self {
        Self::new(ErrorKind::RuntimeError, value)
    }
}

impl From<aws_smithy_types::error::operation::BuildError> for Error {
    fn from(value: aws_smithy_types::error::operation::BuildError) -> Self {
        Self::new(ErrorKind::InputInvalid, value)
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(value: serde_yaml::Error) -> Self {
        Self::new(ErrorKind::ConfigInvalid, value)
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Self::new(ErrorKind::InputInvalid, value)
    }
}

impl From<aws_sdk_s3::presigning::PresigningConfigError> for Error {
    fn from(value: aws_sdk_s3::presigning::PresigningConfigError) -> Self {
        Self::new(ErrorKind::InputInvalid, value)
    }
}

const NOT_FOUND_CODES: &[&str] = &[
    "NotFound",
    "NoSuchKey",
    "NoSuchUpload",
    "NoSuchBucket",
    "NoSuchVersion",
    "NoSuchBucketPolicy",
    "NoSuchObjectLockConfiguration",
];

impl<E> From<aws_sdk_s3::error::SdkError<E, HttpResponse>> for Error
where
    E: std::error::Error + ProvideErrorMetadata + Send + Sync + 'static,
{
    fn from(value: aws_sdk_s3::error::SdkError<E, HttpResponse>) -> Self {
        let code = value.code().map(str::to_owned);
        let status = value.raw_response().map(|resp| resp.status().as_u16());

        let kind = match code.as_deref() {
            Some(code) if NOT_FOUND_CODES.contains(&code) => ErrorKind::NotFound,
            // HEAD responses carry no body and therefore no error code
            None if status == Some(404) => ErrorKind::NotFound,
            _ => ErrorKind::ServiceError,
        };

        let mut err = Error::new(kind, value);
        err.service = Some(ServiceFailure { code, status });
        err
    }
}

pub(crate) fn invalid_input<E>(err: E) -> Error
where
    E: Into<BoxError>,
{
    Error::new(ErrorKind::InputInvalid, err)
}

pub(crate) fn invalid_config<E>(err: E) -> Error
where
    E: Into<BoxError>,
{
    Error::new(ErrorKind::ConfigInvalid, err)
}

pub(crate) fn profile_unavailable(name: &str) -> Error {
    Error::new(
        ErrorKind::ProfileUnavailable,
        format!("profile `{name}` is not configured"),
    )
}

pub(crate) fn tool_unavailable(tool: &str) -> Error {
    Error::new(
        ErrorKind::ToolUnavailable,
        format!("`{tool}` was not found on PATH"),
    )
}

pub(crate) fn naming_collision(bucket: &str) -> Error {
    Error::new(
        ErrorKind::NamingCollision,
        format!("bucket `{bucket}` already exists and is owned by another account"),
    )
}

pub(crate) fn consistency_timeout(what: &str, attempts: u32, waited: Duration) -> Error {
    Error::new(
        ErrorKind::ConsistencyTimeout,
        format!("{what} did not converge after {attempts} attempts ({waited:?})"),
    )
}

pub(crate) fn etag_mismatch(part_number: i32, expected: &str, actual: Option<&str>) -> Error {
    Error::new(
        ErrorKind::ETagMismatch(ETagMismatch { part_number }),
        format!("expected ETag {expected} for part {part_number}, service listed {actual:?}"),
    )
}

pub(crate) fn from_kind<E>(kind: ErrorKind) -> impl FnOnce(E) -> Error
where
    E: Into<BoxError>,
{
    |err| Error::new(kind, err)
}
