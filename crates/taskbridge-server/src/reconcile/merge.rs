//! Longest suffix/prefix overlap merge.

/// Append `chunk` to `clean`, skipping the longest prefix of `chunk` that is
/// already a suffix of `clean`.
///
/// Only char boundaries of `chunk` are considered, so multi-byte text never
/// splits. A cumulative chunk (one that repeats everything seen so far)
/// therefore contributes only its new tail.
pub fn merge_overlap(clean: &mut String, chunk: &str) {
    let overlap = overlap_len(clean, chunk);
    clean.push_str(&chunk[overlap..]);
}

/// Byte length of the longest prefix of `chunk` that `clean` ends with.
pub fn overlap_len(clean: &str, chunk: &str) -> usize {
    let limit = clean.len().min(chunk.len());
    chunk
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(chunk.len()))
        .filter(|&i| i <= limit)
        .rev()
        .find(|&i| clean.ends_with(&chunk[..i]))
        .unwrap_or(0)
}
