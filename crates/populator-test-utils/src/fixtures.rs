//! Record fixtures with independently computed expectations.

use std::collections::BTreeMap;

/// A keyed input and the store contents it must produce.
pub struct RecordFixture {
    pub input: Vec<u8>,
    pub expected: BTreeMap<Vec<u8>, Vec<u8>>,
}

/// `count` records `"<prefix>-<i>:<i*i>"`, newline-separated, without a
/// trailing newline.
pub fn keyed_records(prefix: &str, count: usize) -> RecordFixture {
    let lines: Vec<String> = (0..count).map(|i| format!("{prefix}-{i}:{}", i * i)).collect();
    RecordFixture {
        input: lines.join("\n").into_bytes(),
        expected: expected_pairs(&lines, ":"),
    }
}

/// Expected store contents for `lines` split at `sub`, later keys winning.
pub fn expected_pairs<S: AsRef<str>>(lines: &[S], sub: &str) -> BTreeMap<Vec<u8>, Vec<u8>> {
    lines
        .iter()
        .map(AsRef::as_ref)
        .filter(|line| !line.is_empty())
        .map(|line| match line.split_once(sub) {
            Some((k, v)) => (k.as_bytes().to_vec(), v.as_bytes().to_vec()),
            None => (line.as_bytes().to_vec(), Vec::new()),
        })
        .filter(|(k, _)| !k.is_empty())
        .collect()
}
