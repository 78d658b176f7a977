//! Content fingerprints and fuzzy key comparison.
//!
//! A fingerprint is a short base-36 string derived from a normalized form of
//! the content: lower-cased, whitespace collapsed within each line, blank
//! lines dropped, and the remaining lines sorted. Two texts that differ only
//! in line order, case or incidental whitespace share a fingerprint.
//!
//! The hash is the classic 32-bit `h = h * 31 + unit` over UTF-16 code units
//! with wrapping arithmetic, so fingerprints are stable across processes.

/// Normalize content for fingerprinting. Returns an empty string when the
/// content has no non-whitespace characters.
pub fn normalize(content: &str) -> String {
    let lowered = content.to_lowercase();
    let mut lines: Vec<String> = lowered
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect();
    lines.sort_unstable_by(|a, b| a.encode_utf16().cmp(b.encode_utf16()));
    lines.join("\n")
}

/// Fingerprint `content`, or `None` if it normalizes to nothing.
///
/// ```rust
/// # use cuecard::cache::fingerprint;
/// assert_eq!(fingerprint("b\na"), fingerprint("a\n  B "));
/// assert_eq!(fingerprint("   \n\t"), None);
/// ```
pub fn fingerprint(content: &str) -> Option<String> {
    let normalized = normalize(content);
    if normalized.is_empty() {
        return None;
    }
    Some(to_base36(rolling_hash(&normalized).unsigned_abs()))
}

fn rolling_hash(text: &str) -> i32 {
    text.encode_utf16().fold(0i32, |h, unit| {
        h.wrapping_shl(5).wrapping_sub(h).wrapping_add(i32::from(unit))
    })
}

fn to_base36(mut n: u32) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::with_capacity(7);
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    out.into_iter().map(char::from).collect()
}

/// Levenshtein edit distance over characters.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// `1 - distance / max(len)`, in `[0, 1]`. Two empty strings are identical.
pub fn similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / longest as f64
}
