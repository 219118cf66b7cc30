//! Benchmark inputs for the Populator ingestion pipeline.
//!
//! - [`keyed_input`]: `count` newline-separated `key:value` records
//! - [`distinct_keys`]: keys that spread across buckets

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

/// `count` distinct keys of the form `key-<n>`, in a scrambled order.
pub fn distinct_keys(count: usize, seed: u64) -> Vec<Vec<u8>> {
    (0..count as u64)
        .map(|i| {
            let n = seed
                .wrapping_mul(6364136223846793005)
                .wrapping_add(i.wrapping_mul(1442695040888963407));
            format!("key-{i}-{:x}", n >> 40).into_bytes()
        })
        .collect()
}

/// `count` newline-separated `key:value` records with `value_len`-byte
/// values, keys repeating every `distinct` records.
pub fn keyed_input(count: usize, distinct: usize, value_len: usize) -> Vec<u8> {
    let value = "v".repeat(value_len);
    let mut out = Vec::with_capacity(count * (value_len + 12));
    for i in 0..count {
        out.extend_from_slice(format!("k{}:{value}\n", i % distinct.max(1)).as_bytes());
    }
    out
}
