//! Page list discovery and shard partitioning.
//!
//! The full page set can be split across independent worker processes:
//! a shard index/count pair selects a contiguous index range, computed with
//! ceiling division so every page lands in exactly one shard.

use std::fs;
use std::io;
use std::ops::Range;
use std::path::Path;

/// Collect page ids from a directory of example pages.
///
/// Every `*.html` file contributes its stem as a page id; results are
/// sorted so shard assignment is deterministic across workers.
pub fn discover_pages(dir: &Path) -> io::Result<Vec<String>> {
    let mut pages = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().map(|e| e == "html").unwrap_or(false) {
            if let Some(stem) = path.file_stem() {
                pages.push(stem.to_string_lossy().to_string());
            }
        }
    }
    pages.sort();
    Ok(pages)
}

/// Contiguous index range handled by one shard.
///
/// Shards are sized by ceiling division; the last shard may be short, and
/// out-of-range shards get an empty range.
pub fn shard_range(total: usize, index: usize, count: usize) -> Range<usize> {
    if count == 0 {
        return 0..total;
    }
    let size = total.div_ceil(count);
    let start = (index * size).min(total);
    let end = (start + size).min(total);
    start..end
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shard_range_even_split() {
        // 40 pages over 4 shards, shard 1 handles [10, 20)
        assert_eq!(shard_range(40, 0, 4), 0..10);
        assert_eq!(shard_range(40, 1, 4), 10..20);
        assert_eq!(shard_range(40, 3, 4), 30..40);
    }

    #[test]
    fn test_shard_range_uneven_split() {
        // 10 pages over 3 shards: 4 + 4 + 2
        assert_eq!(shard_range(10, 0, 3), 0..4);
        assert_eq!(shard_range(10, 1, 3), 4..8);
        assert_eq!(shard_range(10, 2, 3), 8..10);
    }

    #[test]
    fn test_shard_range_covers_everything_once() {
        let total = 37;
        let count = 5;
        let mut seen = vec![0u32; total];
        for index in 0..count {
            for i in shard_range(total, index, count) {
                seen[i] += 1;
            }
        }
        assert!(seen.iter().all(|&n| n == 1));
    }

    #[test]
    fn test_shard_range_out_of_range_index() {
        assert_eq!(shard_range(10, 9, 3), 10..10);
    }

    #[test]
    fn test_shard_range_single_shard() {
        assert_eq!(shard_range(7, 0, 1), 0..7);
    }

    #[test]
    fn test_discover_pages_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["zebra.html", "cube.html", "lights.html", "notes.txt"] {
            fs::write(dir.path().join(name), "<html></html>").unwrap();
        }

        let pages = discover_pages(dir.path()).unwrap();
        assert_eq!(pages, vec!["cube", "lights", "zebra"]);
    }
}
