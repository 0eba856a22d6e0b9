/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::sync::OnceLock;

/// Longest bucket name accepted by the protocol
pub const MAX_BUCKET_NAME_LEN: usize = 63;

/// Prefix shared by every bucket created through [`test_bucket_name`]
pub const TEST_BUCKET_PREFIX: &str = "test-";

// 48 random bits
const SUFFIX_HEX_LEN: usize = 12;
const SUFFIX_MASK: u64 = (1 << (SUFFIX_HEX_LEN * 4)) - 1;

/// Normalize `raw` into the bucket name charset `[a-z0-9-]`.
///
/// Upper case is folded, `_`, `.` and whitespace become `-`, anything else outside the charset
/// is dropped. Runs of `-` are collapsed and leading or trailing `-` trimmed.
pub fn sanitize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars().flat_map(char::to_lowercase) {
        let c = match c {
            'a'..='z' | '0'..='9' => c,
            '-' | '_' | '.' => '-',
            c if c.is_whitespace() => '-',
            _ => continue,
        };
        if c == '-' && (out.is_empty() || out.ends_with('-')) {
            continue;
        }
        out.push(c);
    }
    out.truncate(out.trim_end_matches('-').len());
    out
}

/// A collision-free, protocol-valid name derived from `base`.
///
/// The result is `sanitize(base)` followed by a random hexadecimal suffix, truncated so the
/// whole name fits [`MAX_BUCKET_NAME_LEN`].
pub fn unique_name(base: &str) -> String {
    let suffix = format!("{:0width$x}", fastrand::u64(..) & SUFFIX_MASK, width = SUFFIX_HEX_LEN);
    let mut base = sanitize(base);

    let max_base = MAX_BUCKET_NAME_LEN - SUFFIX_HEX_LEN - 1;
    if base.len() > max_base {
        // sanitized names are ASCII
        base.truncate(max_base);
        base.truncate(base.trim_end_matches('-').len());
    }

    if base.is_empty() {
        suffix
    } else {
        format!("{base}-{suffix}")
    }
}

/// Prefix unique to this process, `test-` followed by 6 hex characters.
///
/// Prefix based cleanup with this value only touches buckets created by the current run.
pub fn run_prefix() -> &'static str {
    static PREFIX: OnceLock<String> = OnceLock::new();
    PREFIX.get_or_init(|| format!("{TEST_BUCKET_PREFIX}{:06x}", fastrand::u32(..) & 0xff_ffff))
}

/// Bucket name for a test, e.g. `test_acl_matrix` becomes `test-1a2b3c-acl-matrix-<suffix>`.
pub fn test_bucket_name(test_name: &str) -> String {
    let test_name = test_name.strip_prefix("test_").unwrap_or(test_name);
    unique_name(&format!("{}-{}", run_prefix(), test_name))
}
