/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::cmp;

/// Maximum number of parts in a single multipart upload
pub const MAX_PARTS: u64 = 10_000;

/// One part of an object: its 1-based number and the byte range it covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartRange {
    part_number: i32,
    offset: u64,
    len: u64,
}

impl PartRange {
    /// The 1-based part number
    pub fn part_number(&self) -> i32 {
        self.part_number
    }

    /// Offset of the first byte of the part
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Length of the part in bytes
    pub fn len(&self) -> u64 {
        self.len
    }

    /// True for the single part of an empty object
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Offset one past the last byte of the part
    pub fn end(&self) -> u64 {
        self.offset + self.len
    }

    /// The HTTP `Range` header value for this part
    pub fn http_range(&self) -> String {
        format!("bytes={}-{}", self.offset, self.end().saturating_sub(1))
    }
}

/// Split `total` bytes into consecutive parts of `part_size` bytes, the last one possibly shorter.
///
/// The part size is raised if needed to stay within [`MAX_PARTS`]. An empty object yields a single
/// empty part.
pub fn part_ranges(total: u64, part_size: u64) -> Vec<PartRange> {
    let part_size = cmp::max(cmp::max(part_size, 1), total.div_ceil(MAX_PARTS));
    if total == 0 {
        return vec![PartRange {
            part_number: 1,
            offset: 0,
            len: 0,
        }];
    }

    (0..total.div_ceil(part_size))
        .map(|idx| {
            let offset = idx * part_size;
            PartRange {
                // bounded by MAX_PARTS
                part_number: idx as i32 + 1,
                offset,
                len: cmp::min(part_size, total - offset),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_multiple() {
        let parts = part_ranges(30, 10);
        assert_eq!(3, parts.len());
        assert!(parts.iter().all(|p| p.len() == 10));
        assert_eq!(vec![1, 2, 3], parts.iter().map(|p| p.part_number()).collect::<Vec<_>>());
    }

    #[test]
    fn test_short_last_part() {
        let parts = part_ranges(25, 10);
        assert_eq!(3, parts.len());
        assert_eq!(20, parts[2].offset());
        assert_eq!(5, parts[2].len());
        assert_eq!("bytes=20-24", parts[2].http_range());
    }

    #[test]
    fn test_parts_cover_object() {
        let total = 1_048_583;
        let parts = part_ranges(total, 4096);
        let mut expected_offset = 0;
        for part in &parts {
            assert_eq!(expected_offset, part.offset());
            expected_offset = part.end();
        }
        assert_eq!(total, expected_offset);
    }

    #[test]
    fn test_part_count_is_capped() {
        let parts = part_ranges(MAX_PARTS * 3, 1);
        assert_eq!(MAX_PARTS as usize, parts.len());
        assert_eq!(3, parts[0].len());
    }

    #[test]
    fn test_empty_object() {
        let parts = part_ranges(0, 10);
        assert_eq!(1, parts.len());
        assert!(parts[0].is_empty());
    }
}
