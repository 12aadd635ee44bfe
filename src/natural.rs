//! Numeric-aware ordering for file names and paths.
//!
//! Every list that reaches a caller (directory children, archive entries,
//! recursive listings) is sorted with [`natural_cmp`] so that `img2.png`
//! comes before `img10.png`, the way a file browser shows them.
//!
//! ## Rules
//!
//! Names are split into runs of ASCII digits and runs of everything else:
//!
//! - `"img10.png"` → `["img", "10", ".png"]`
//!
//! Runs are compared pairwise:
//! - digit vs digit: by numeric value (leading zeros ignored, no overflow since
//!   the comparison is on the trimmed digit strings)
//! - text vs text: case-insensitively
//! - digit vs text: digits sort first
//!
//! When two names are equal under these rules (`"a01"` vs `"a1"`, `"A"` vs
//! `"a"`), the plain byte order breaks the tie so sorting is deterministic.

use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Run<'a> {
    Digits(&'a str),
    Text(&'a str),
}

fn runs(s: &str) -> impl Iterator<Item = Run<'_>> {
    let mut rest = s;
    std::iter::from_fn(move || {
        let first = rest.chars().next()?;
        let digits = first.is_ascii_digit();
        let end = rest
            .char_indices()
            .find(|(_, c)| c.is_ascii_digit() != digits)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let (run, tail) = rest.split_at(end);
        rest = tail;
        Some(if digits { Run::Digits(run) } else { Run::Text(run) })
    })
}

fn cmp_digits(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn cmp_text(a: &str, b: &str) -> Ordering {
    let a = a.chars().flat_map(char::to_lowercase);
    let b = b.chars().flat_map(char::to_lowercase);
    a.cmp(b)
}

/// Compare two names the way a file browser orders them.
///
/// ```
/// # use zipview::natural::natural_cmp;
/// use std::cmp::Ordering;
/// assert_eq!(natural_cmp("img2.png", "img10.png"), Ordering::Less);
/// assert_eq!(natural_cmp("Page 3", "page 03"), Ordering::Less);
/// ```
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = runs(a);
    let mut right = runs(b);
    loop {
        let ord = match (left.next(), right.next()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(Run::Digits(x)), Some(Run::Digits(y))) => cmp_digits(x, y),
            (Some(Run::Text(x)), Some(Run::Text(y))) => cmp_text(x, y),
            (Some(Run::Digits(_)), Some(Run::Text(_))) => Ordering::Less,
            (Some(Run::Text(_)), Some(Run::Digits(_))) => Ordering::Greater,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
}

/// Sort a list of names in place with [`natural_cmp`].
pub fn sort_natural<S: AsRef<str>>(names: &mut [S]) {
    names.sort_by(|a, b| natural_cmp(a.as_ref(), b.as_ref()));
}
