//! Natural (digit-aware) ordering of interface names.
//!
//! Names are split into alternating runs of non-digits and ASCII digits.
//! Digit runs compare as integers, text runs compare byte-wise, so
//! `enp1s0f0 < enp8s0 < enp10s0`.

use std::cmp::Ordering;

#[derive(Debug, PartialEq, Eq)]
enum Segment<'a> {
    Text(&'a str),
    /// Digit run with leading zeros stripped.
    Number(&'a str),
}

impl Ord for Segment<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Segment::Text(a), Segment::Text(b)) => a.cmp(b),
            (Segment::Number(a), Segment::Number(b)) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
            (Segment::Number(_), Segment::Text(_)) => Ordering::Less,
            (Segment::Text(_), Segment::Number(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for Segment<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Splits `name` so that every key starts and ends with a text segment,
/// which keeps text and number segments aligned between any two keys.
fn segments(name: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut in_digits = false;

    for (idx, ch) in name.char_indices() {
        let digit = ch.is_ascii_digit();
        if digit != in_digits {
            push_segment(&mut out, &name[start..idx], in_digits);
            start = idx;
            in_digits = digit;
        }
    }
    push_segment(&mut out, &name[start..], in_digits);
    if in_digits {
        out.push(Segment::Text(""));
    }
    out
}

fn push_segment<'a>(out: &mut Vec<Segment<'a>>, run: &'a str, digits: bool) {
    if digits {
        out.push(Segment::Number(run.trim_start_matches('0')));
    } else {
        out.push(Segment::Text(run));
    }
}

/// Compares two names in natural order.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    segments(a).cmp(&segments(b))
}

/// Sorts names in place in natural order (stable).
pub fn natural_sort(names: &mut [String]) {
    names.sort_by(|a, b| natural_cmp(a, b));
}
