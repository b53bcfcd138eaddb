use std::cmp::Ordering;

use crate::error::{Error, Result};

fn common_prefix(a: &str, b: &str) -> usize {
    a.bytes().zip(b.bytes()).take_while(|(x, y)| x == y).count()
}

/// The 0-based, half-open interval one alternate allele touches once the shared leading
/// bases are stripped.
pub(crate) fn allele_span(pos: i64, reference: &str, alt: &str) -> (i64, i64) {
    let prefix = common_prefix(reference, alt);
    let start = pos - 1 + prefix as i64;
    match alt.len().cmp(&reference.len()) {
        Ordering::Equal => (start, start + (alt.len() - prefix) as i64),
        // VCF prepends one base to indels
        Ordering::Less => (start, start + reference.len() as i64),
        Ordering::Greater => (start + 1, start + 1),
    }
}

/// Smallest interval covering every alternate allele, or the reference if there are none.
pub(crate) fn record_span(pos: i64, reference: &str, alts: &[String]) -> Result<(i64, i64)> {
    if alts.is_empty() {
        return Ok((pos - 1, pos - 1 + reference.len() as i64));
    }
    let (start, stop) = alts
        .iter()
        .map(|alt| allele_span(pos, reference, alt))
        .fold((i64::MAX, i64::MIN), |(start, stop), (s, e)| {
            (start.min(s), stop.max(e))
        });
    if start > stop {
        return Err(Error::SerializationInvariant(format!(
            "span [{}, {}) of {} {}>{} is inverted",
            start,
            stop,
            pos,
            reference,
            alts.join(",")
        )));
    }
    Ok((start, stop))
}
