//! Combining the records several inputs report for the same site.
//!
//! How an INFO field is combined is decided by the [`MergePolicy`] attached to its
//! [`FieldType`] in the merged header. Policies come from a [`MergeStrategy`], which
//! reads a small `key=value` text format:
//!
//! ```text
//! # fields not listed use the default
//! default=enforce
//! qual=max
//! DP=sum
//! CALLER=uniq-concat
//! ```

use std::ops::{Add, Range};
use std::str::FromStr;

use getset::Getters;
use indexmap::IndexMap;
use itertools::Itertools;
use strum::{Display, EnumString};

use crate::error::{Error, MergeError, Result};
use crate::header::{Header, HeaderRef, Scope};
use crate::record::Record;
use crate::types::{FieldKind, FieldType, Number, TypedValue, Values};

/// FORMAT field whose allele indices are rewritten when alternate alleles are merged.
pub const GENOTYPE_FIELD: &str = "GT";

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Default, EnumString, Display)]
pub enum MergePolicy {
    /// Leave the field out of the merged record.
    #[strum(serialize = "ignore")]
    Ignore,
    /// Keep the first value present.
    #[strum(serialize = "first")]
    First,
    /// Element-wise sum of numeric values.
    #[strum(serialize = "sum")]
    Sum,
    #[strum(serialize = "concat")]
    Concat,
    /// Concatenate, dropping repeated elements.
    #[strum(serialize = "uniq-concat")]
    UniqueConcat,
    /// All present values must be identical.
    #[default]
    #[strum(serialize = "enforce")]
    Enforce,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Default, EnumString, Display)]
pub enum QualityPolicy {
    #[default]
    #[strum(serialize = "first")]
    First,
    #[strum(serialize = "max")]
    Max,
    #[strum(serialize = "min")]
    Min,
}

#[derive(Debug, Clone, Default, PartialEq, Getters)]
#[getset(get = "pub")]
pub struct MergeStrategy {
    default_policy: MergePolicy,
    quality: QualityPolicy,
    fields: IndexMap<String, MergePolicy>,
}

impl MergeStrategy {
    pub fn policy_for(&self, id: &str) -> MergePolicy {
        self.fields.get(id).copied().unwrap_or(self.default_policy)
    }

    pub fn with_default(mut self, policy: MergePolicy) -> Self {
        self.default_policy = policy;
        self
    }

    pub fn with_quality(mut self, policy: QualityPolicy) -> Self {
        self.quality = policy;
        self
    }

    pub fn with_field(mut self, id: &str, policy: MergePolicy) -> Self {
        self.fields.insert(id.to_owned(), policy);
        self
    }
}

impl FromStr for MergeStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut strategy = Self::default();
        for line in s.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let invalid = |reason: &str| Error::Strategy {
                line: line.to_owned(),
                reason: reason.to_owned(),
            };
            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| invalid("expected key=value"))?;
            let (key, value) = (key.trim(), value.trim());
            match key {
                "default" => {
                    strategy.default_policy = value.parse().map_err(|_| invalid("unknown policy"))?;
                }
                "qual" => {
                    strategy.quality =
                        value.parse().map_err(|_| invalid("unknown quality policy"))?;
                }
                id => {
                    let policy = value.parse().map_err(|_| invalid("unknown policy"))?;
                    strategy.fields.insert(id.to_owned(), policy);
                }
            }
        }
        Ok(strategy)
    }
}

/// Merges records from several inputs that describe the same site into one record of the
/// merged header.
pub struct RecordMerger {
    header: HeaderRef,
    quality: QualityPolicy,
    /// Column of each input's first sample in `header`, followed by the sample count.
    offsets: Vec<usize>,
}

impl RecordMerger {
    /// Merges the headers of `inputs`, in order, into one header whose fields take their
    /// policies from `strategy`. Input `i` owns the sample columns of
    /// [`sample_range(i)`](RecordMerger::sample_range), even when its sample names repeat
    /// those of another input.
    pub fn from_inputs(strategy: MergeStrategy, inputs: &[HeaderRef]) -> Result<Self> {
        let mut header = Header::with_strategy(strategy);
        let mut offsets = Vec::with_capacity(inputs.len() + 1);
        for input in inputs {
            offsets.push(header.samples().len());
            header.merge(input)?;
        }
        offsets.push(header.samples().len());
        let quality = *header.strategy().quality();
        Ok(RecordMerger {
            header: HeaderRef::new(header),
            quality,
            offsets,
        })
    }

    #[must_use]
    pub fn with_quality_policy(mut self, policy: QualityPolicy) -> Self {
        self.quality = policy;
        self
    }

    pub fn header(&self) -> &HeaderRef {
        &self.header
    }

    pub fn inputs(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Columns of the merged header that hold the samples of input `source`.
    pub fn sample_range(&self, source: usize) -> Result<Range<usize>> {
        match (self.offsets.get(source), self.offsets.get(source + 1)) {
            (Some(&start), Some(&end)) => Ok(start..end),
            _ => Err(MergeError::UnknownInput {
                input: source,
                inputs: self.inputs(),
            }
            .into()),
        }
    }

    /// Each record is paired with the index of the input it was read from. Inputs without a
    /// record at the site are simply left out, and their samples stay empty.
    ///
    /// The caller is responsible for lining records up; they must all share chromosome and
    /// position.
    pub fn merge(&self, records: &[(usize, &Record)]) -> Result<Record> {
        let &(_, first) = records.first().ok_or(MergeError::NoInputs)?;
        let inputs = records.iter().map(|&(_, record)| record).collect_vec();
        if let Some(other) = inputs
            .iter()
            .find(|r| r.chrom != first.chrom || r.pos != first.pos)
        {
            return Err(MergeError::PositionMismatch {
                expected: format!("{}:{}", first.chrom, first.pos),
                found: format!("{}:{}", other.chrom, other.pos),
            }
            .into());
        }

        let (ref_allele, alt_alleles, allele_maps) = merge_alleles(&inputs)?;
        let (format, samples) = self.merge_samples(records, &allele_maps)?;
        let info = self.merge_info(&inputs, &allele_maps, alt_alleles.len())?;
        let mut merged = Record {
            header: self.header.clone(),
            chrom: first.chrom.clone(),
            pos: first.pos,
            ids: union(inputs.iter().map(|r| &r.ids)),
            ref_allele,
            alt_alleles,
            qual: self.merge_quality(&inputs),
            failed_filters: union(inputs.iter().map(|r| &r.failed_filters)),
            info,
            format,
            samples,
            start: 0,
            stop: 0,
        };
        merged.normalize()?;
        Ok(merged)
    }

    fn merge_quality(&self, records: &[&Record]) -> Option<f64> {
        let mut present = records.iter().filter_map(|r| r.qual);
        match self.quality {
            QualityPolicy::First => present.next(),
            QualityPolicy::Max => present.reduce(f64::max),
            QualityPolicy::Min => present.reduce(f64::min),
        }
    }

    fn merge_info(
        &self,
        records: &[&Record],
        allele_maps: &[Vec<usize>],
        alt_count: usize,
    ) -> Result<IndexMap<String, TypedValue>> {
        let mut grouped: IndexMap<&str, Vec<(usize, &TypedValue)>> = IndexMap::new();
        for (idx, record) in records.iter().enumerate() {
            for (id, value) in &record.info {
                grouped.entry(id.as_str()).or_default().push((idx, value));
            }
        }

        let mut info = IndexMap::new();
        for (id, values) in grouped {
            let field = self
                .header
                .lookup_info(id)
                .ok_or_else(|| MergeError::UnknownField {
                    scope: Scope::Info,
                    id: id.to_owned(),
                })?;
            let values = values
                .into_iter()
                .map(|(idx, value)| align_alleles(field, value, &allele_maps[idx], alt_count))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            if let Some(value) = combine(field, &values)? {
                info.insert(id.to_owned(), value);
            }
        }
        Ok(info)
    }

    fn merge_samples(
        &self,
        records: &[(usize, &Record)],
        allele_maps: &[Vec<usize>],
    ) -> Result<(Vec<String>, Vec<Vec<TypedValue>>)> {
        let format = records
            .iter()
            .flat_map(|(_, r)| r.format.iter())
            .unique()
            .cloned()
            .collect_vec();
        let kinds = format
            .iter()
            .map(|id| {
                self.header
                    .lookup_format(id)
                    .map(|f| *f.kind())
                    .ok_or_else(|| MergeError::UnknownField {
                        scope: Scope::Format,
                        id: id.clone(),
                    })
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut samples = vec![Vec::new(); self.header.samples().len()];
        for (&(source, record), alleles) in records.iter().zip(allele_maps) {
            let columns = self.sample_range(source)?;
            if record.samples.len() > columns.len() {
                return Err(MergeError::SampleCount {
                    input: source,
                    expected: columns.len(),
                    found: record.samples.len(),
                }
                .into());
            }
            for (slot, data) in columns.zip(&record.samples) {
                if data.is_empty() {
                    continue;
                }
                samples[slot] = format
                    .iter()
                    .zip(&kinds)
                    .map(|(id, kind)| {
                        let value = record
                            .format
                            .iter()
                            .position(|f| f == id)
                            .and_then(|offset| data.get(offset));
                        match value {
                            Some(value) if id == GENOTYPE_FIELD => remap_genotype(value, alleles),
                            Some(value) => value.clone(),
                            None => TypedValue::empty(id, *kind),
                        }
                    })
                    .collect();
            }
        }
        Ok((format, samples))
    }
}

fn union<'a>(lists: impl Iterator<Item = &'a Vec<String>>) -> Vec<String> {
    lists.flatten().unique().cloned().collect()
}

fn is_symbolic(alt: &str) -> bool {
    alt.starts_with('<') || alt == "*" || alt.contains('[') || alt.contains(']')
}

/// Picks the longest reference allele and rewrites every input's alternate alleles against
/// it. Returns the merged reference, the merged alternate alleles and, per input, the merged
/// index of each of its alleles (reference first).
fn merge_alleles(
    records: &[&Record],
) -> std::result::Result<(String, Vec<String>, Vec<Vec<usize>>), MergeError> {
    let reference = records
        .iter()
        .map(|r| &r.ref_allele)
        .fold(&records[0].ref_allele, |longest, r| {
            if r.len() > longest.len() {
                r
            } else {
                longest
            }
        });

    let mut alts: Vec<String> = Vec::new();
    let mut maps = Vec::with_capacity(records.len());
    for record in records {
        let suffix = reference
            .strip_prefix(record.ref_allele.as_str())
            .ok_or_else(|| MergeError::Reference {
                first: reference.clone(),
                second: record.ref_allele.clone(),
            })?;
        let mut map = vec![0];
        for alt in &record.alt_alleles {
            let extended = if suffix.is_empty() || is_symbolic(alt) {
                alt.clone()
            } else {
                format!("{}{}", alt, suffix)
            };
            let idx = match alts.iter().position(|a| *a == extended) {
                Some(idx) => idx,
                None => {
                    alts.push(extended);
                    alts.len() - 1
                }
            };
            map.push(idx + 1);
        }
        maps.push(map);
    }
    Ok((reference.clone(), alts, maps))
}

fn remap_genotype(value: &TypedValue, alleles: &[usize]) -> TypedValue {
    let mut remapped = value.clone();
    if let Values::String(calls) = value.values() {
        let calls = calls
            .iter()
            .map(|gt| gt.as_deref().map(|gt| remap_alleles(gt, alleles)))
            .collect();
        remapped.set_values(Values::String(calls));
    }
    remapped
}

fn remap_alleles(gt: &str, alleles: &[usize]) -> String {
    fn flush(digits: &mut String, out: &mut String, alleles: &[usize]) {
        if digits.is_empty() {
            return;
        }
        match digits.parse::<usize>().ok().and_then(|i| alleles.get(i)) {
            Some(idx) => out.push_str(&idx.to_string()),
            None => out.push_str(digits),
        }
        digits.clear();
    }

    let mut out = String::with_capacity(gt.len());
    let mut digits = String::new();
    for c in gt.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
        } else {
            flush(&mut digits, &mut out, alleles);
            out.push(c);
        }
    }
    flush(&mut digits, &mut out, alleles);
    out
}

/// Rewrites a per-allele value of one input into the allele order of the merged record.
/// Alleles the input does not report are left missing.
fn align_alleles(
    field: &FieldType,
    value: &TypedValue,
    alleles: &[usize],
    alt_count: usize,
) -> std::result::Result<TypedValue, MergeError> {
    let (targets, len) = match field.number() {
        Number::PerAllele => (alleles[1..].iter().map(|i| i - 1).collect_vec(), alt_count),
        Number::PerAlleleWithRef => (alleles.to_vec(), alt_count + 1),
        _ => return Ok(value.clone()),
    };
    // alleles already in merged order leave the value as it was written
    let in_place = targets.len() == len && targets.iter().copied().eq(0..len);
    if in_place || value.is_empty() || *value.kind() == FieldKind::Flag {
        return Ok(value.clone());
    }
    if value.num_values() != targets.len() {
        return Err(MergeError::LengthMismatch {
            id: field.id().clone(),
            first: targets.len(),
            second: value.num_values(),
        });
    }

    fn scatter<T: Clone>(items: &[Option<T>], targets: &[usize], len: usize) -> Vec<Option<T>> {
        let mut out = vec![None; len];
        for (item, &target) in items.iter().zip(targets) {
            out[target] = item.clone();
        }
        out
    }
    let values = match value.values() {
        Values::Integer(v) => Values::Integer(scatter(v, &targets, len)),
        Values::Float(v) => Values::Float(scatter(v, &targets, len)),
        Values::Character(v) => Values::Character(scatter(v, &targets, len)),
        Values::String(v) => Values::String(scatter(v, &targets, len)),
        other => other.clone(),
    };
    let mut aligned = value.clone();
    aligned.set_values(values);
    Ok(aligned)
}

fn combine(field: &FieldType, values: &[TypedValue]) -> Result<Option<TypedValue>> {
    let first = match values.first() {
        Some(first) => first,
        None => return Ok(None),
    };
    let present = values.iter().filter(|v| !v.is_empty()).collect_vec();
    let id = field.id();
    let kind = *field.kind();
    let policy = *field.merge_policy();
    let per_allele = matches!(field.number(), Number::PerAllele | Number::PerAlleleWithRef)
        && kind != FieldKind::Flag;
    let unsupported = || MergeError::Unsupported {
        id: id.clone(),
        kind,
        policy: policy.to_string(),
    };

    let combined = match policy {
        MergePolicy::Ignore => return Ok(None),
        MergePolicy::First | MergePolicy::Enforce if per_allele => {
            let mut acc: Option<Values> = None;
            for value in &present {
                acc = Some(match acc {
                    None => value.values().clone(),
                    Some(a) => overlay(id, a, value.values(), policy == MergePolicy::Enforce)?,
                });
            }
            acc.unwrap_or(Values::Empty)
        }
        MergePolicy::First => present.first().copied().unwrap_or(first).values().clone(),
        MergePolicy::Enforce => {
            if let Some((head, rest)) = present.split_first() {
                if let Some(other) = rest.iter().find(|v| v.values() != head.values()) {
                    return Err(MergeError::Conflict {
                        id: id.clone(),
                        first: head.to_string(),
                        second: other.to_string(),
                    }
                    .into());
                }
            }
            present.first().copied().unwrap_or(first).values().clone()
        }
        MergePolicy::Sum => {
            if kind != FieldKind::Integer && kind != FieldKind::Float {
                return Err(unsupported().into());
            }
            let mut acc: Option<Values> = None;
            for value in &present {
                acc = Some(match (acc, value.values()) {
                    (None, values) => values.clone(),
                    (Some(Values::Integer(a)), Values::Integer(b)) => {
                        Values::Integer(add_elements(id, a, b)?)
                    }
                    (Some(Values::Float(a)), Values::Float(b)) => {
                        Values::Float(add_elements(id, a, b)?)
                    }
                    _ => return Err(unsupported().into()),
                });
            }
            acc.unwrap_or(Values::Empty)
        }
        // one value per allele leaves nothing to append to
        MergePolicy::Concat | MergePolicy::UniqueConcat if per_allele => {
            return Err(unsupported().into())
        }
        MergePolicy::Concat | MergePolicy::UniqueConcat => {
            let mut acc: Option<Values> = None;
            for value in &present {
                acc = Some(match acc {
                    None => value.values().clone(),
                    Some(a) => concat(a, value.values()).ok_or_else(unsupported)?,
                });
            }
            let combined = acc.unwrap_or(Values::Empty);
            if policy == MergePolicy::UniqueConcat {
                dedup(combined)
            } else {
                combined
            }
        }
    };
    Ok(Some(TypedValue::new(id, kind, combined)))
}

/// Fills the missing elements of `a` from `b`. With `enforce`, elements present in both must
/// agree.
fn overlay(
    id: &str,
    a: Values,
    b: &Values,
    enforce: bool,
) -> std::result::Result<Values, MergeError> {
    fn fill<T: Clone + PartialEq + ToString>(
        id: &str,
        mut a: Vec<Option<T>>,
        b: &[Option<T>],
        enforce: bool,
    ) -> std::result::Result<Vec<Option<T>>, MergeError> {
        if a.len() != b.len() {
            return Err(MergeError::LengthMismatch {
                id: id.to_owned(),
                first: a.len(),
                second: b.len(),
            });
        }
        for (x, y) in a.iter_mut().zip(b) {
            match (x.as_ref(), y) {
                (None, y) => *x = y.clone(),
                (Some(x), Some(y)) if enforce && x != y => {
                    return Err(MergeError::Conflict {
                        id: id.to_owned(),
                        first: x.to_string(),
                        second: y.to_string(),
                    })
                }
                _ => {}
            }
        }
        Ok(a)
    }
    Ok(match (a, b) {
        (Values::Integer(a), Values::Integer(b)) => Values::Integer(fill(id, a, b, enforce)?),
        (Values::Float(a), Values::Float(b)) => Values::Float(fill(id, a, b, enforce)?),
        (Values::Character(a), Values::Character(b)) => Values::Character(fill(id, a, b, enforce)?),
        (Values::String(a), Values::String(b)) => Values::String(fill(id, a, b, enforce)?),
        (a, _) => a,
    })
}

fn add_elements<T: Copy + Add<Output = T>>(
    id: &str,
    a: Vec<Option<T>>,
    b: &[Option<T>],
) -> std::result::Result<Vec<Option<T>>, MergeError> {
    if a.len() != b.len() {
        return Err(MergeError::LengthMismatch {
            id: id.to_owned(),
            first: a.len(),
            second: b.len(),
        });
    }
    Ok(a.into_iter()
        .zip(b)
        .map(|(x, y)| match (x, *y) {
            (Some(x), Some(y)) => Some(x + y),
            (x, None) => x,
            (None, y) => y,
        })
        .collect())
}

fn concat(a: Values, b: &Values) -> Option<Values> {
    Some(match (a, b) {
        (Values::Integer(mut a), Values::Integer(b)) => {
            a.extend_from_slice(b);
            Values::Integer(a)
        }
        (Values::Float(mut a), Values::Float(b)) => {
            a.extend_from_slice(b);
            Values::Float(a)
        }
        (Values::Character(mut a), Values::Character(b)) => {
            a.extend_from_slice(b);
            Values::Character(a)
        }
        (Values::String(mut a), Values::String(b)) => {
            a.extend(b.iter().cloned());
            Values::String(a)
        }
        (Values::Flag, Values::Flag) => Values::Flag,
        _ => return None,
    })
}

fn dedup(values: Values) -> Values {
    fn first_occurrences<T: PartialEq>(items: Vec<T>) -> Vec<T> {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            if !out.contains(&item) {
                out.push(item);
            }
        }
        out
    }
    match values {
        Values::Integer(v) => Values::Integer(first_occurrences(v)),
        Values::Float(v) => Values::Float(first_occurrences(v)),
        Values::Character(v) => Values::Character(first_occurrences(v)),
        Values::String(v) => Values::String(first_occurrences(v)),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TYPES: &[&str] = &[
        r#"##INFO=<ID=DP,Number=1,Type=Integer,Description="Depth">"#,
        r#"##INFO=<ID=AC,Number=A,Type=Integer,Description="Allele count">"#,
        r#"##INFO=<ID=AD,Number=R,Type=Integer,Description="Allele depth">"#,
        r#"##INFO=<ID=CALLER,Number=.,Type=String,Description="Callers">"#,
        r#"##INFO=<ID=SOMATIC,Number=0,Type=Flag,Description="Somatic">"#,
        r#"##FORMAT=<ID=GT,Number=1,Type=String,Description="Genotype">"#,
        r#"##FORMAT=<ID=DP,Number=1,Type=Integer,Description="Depth">"#,
        r#"##FORMAT=<ID=GQ,Number=1,Type=Integer,Description="Genotype quality">"#,
    ];

    fn input_header(sample: &str) -> HeaderRef {
        let mut lines = TYPES.iter().map(|l| l.to_string()).collect::<Vec<_>>();
        lines.push(format!(
            "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\t{}",
            sample
        ));
        HeaderRef::new(Header::from_lines(&lines).unwrap())
    }

    fn merger_for(samples: &[&str], strategy: &str) -> (Vec<HeaderRef>, RecordMerger) {
        let inputs = samples.iter().map(|s| input_header(s)).collect::<Vec<_>>();
        let merger = RecordMerger::from_inputs(strategy.parse().unwrap(), &inputs).unwrap();
        (inputs, merger)
    }

    fn setup(strategy: &str) -> (HeaderRef, HeaderRef, RecordMerger) {
        let (inputs, merger) = merger_for(&["S1", "S2"], strategy);
        (inputs[0].clone(), inputs[1].clone(), merger)
    }

    fn record(header: &HeaderRef, line: &str) -> Record {
        Record::parse(header, line).unwrap()
    }

    #[test]
    fn test_parse_strategy() {
        let strategy: MergeStrategy = "# comment\ndefault=first\nqual = max\nDP=sum\n\nCALLER=uniq-concat"
            .parse()
            .unwrap();
        assert_eq!(strategy.default_policy(), &MergePolicy::First);
        assert_eq!(strategy.quality(), &QualityPolicy::Max);
        assert_eq!(strategy.policy_for("DP"), MergePolicy::Sum);
        assert_eq!(strategy.policy_for("CALLER"), MergePolicy::UniqueConcat);
        assert_eq!(strategy.policy_for("AC"), MergePolicy::First);

        assert!(matches!(
            "DP=average".parse::<MergeStrategy>(),
            Err(Error::Strategy { .. })
        ));
        assert!(matches!(
            "DP".parse::<MergeStrategy>(),
            Err(Error::Strategy { .. })
        ));
    }

    #[test]
    fn test_sum() {
        let (a, b, merger) = setup("DP=sum");
        let merged = merger
            .merge(&[
                (0, &record(&a, "1\t10\t.\tA\tG\t.\tPASS\tDP=10")),
                (1, &record(&b, "1\t10\t.\tA\tG\t.\tPASS\tDP=15")),
            ])
            .unwrap();
        assert_eq!(merged.info_value("DP").unwrap().integer(0), Some(25));
    }

    #[test]
    fn test_enforce_conflict() {
        let (a, b, merger) = setup("");
        let err = merger
            .merge(&[
                (0, &record(&a, "1\t10\t.\tA\tG\t.\tPASS\tDP=10")),
                (1, &record(&b, "1\t10\t.\tA\tG\t.\tPASS\tDP=15")),
            ])
            .unwrap_err();
        match err {
            Error::Merge(MergeError::Conflict { id, first, second }) => {
                assert_eq!((id.as_str(), first.as_str(), second.as_str()), ("DP", "10", "15"));
            }
            other => panic!("unexpected {:?}", other),
        }

        // agreeing values and absent values are fine
        let merged = merger
            .merge(&[
                (0, &record(&a, "1\t10\t.\tA\tG\t.\tPASS\tDP=10")),
                (1, &record(&b, "1\t10\t.\tA\tG\t.\tPASS\t.")),
            ])
            .unwrap();
        assert_eq!(merged.info_value("DP").unwrap().integer(0), Some(10));
    }

    #[test]
    fn test_position_mismatch() {
        let (a, b, merger) = setup("");
        let err = merger
            .merge(&[
                (0, &record(&a, "1\t10\t.\tA\tG\t.\tPASS\t.")),
                (1, &record(&b, "1\t11\t.\tA\tG\t.\tPASS\t.")),
            ])
            .unwrap_err();
        assert!(matches!(err, Error::Merge(MergeError::PositionMismatch { .. })));
        assert!(matches!(
            merger.merge(&[]),
            Err(Error::Merge(MergeError::NoInputs))
        ));
    }

    #[test]
    fn test_identifiers_filters_quality() {
        let (a, b, merger) = setup("qual=max");
        let merged = merger
            .merge(&[
                (0, &record(&a, "1\t10\trs1\tA\tG\t20\tq10\t.")),
                (1, &record(&b, "1\t10\trs2;rs1\tA\tG\t35\tlowdp;q10\t.")),
            ])
            .unwrap();
        assert_eq!(merged.ids(), &vec!["rs1", "rs2"]);
        assert_eq!(merged.failed_filters(), &vec!["q10", "lowdp"]);
        assert_eq!(merged.qual(), Some(35.0));

        let merger = merger.with_quality_policy(QualityPolicy::First);
        let merged = merger
            .merge(&[
                (0, &record(&a, "1\t10\t.\tA\tG\t.\tPASS\t.")),
                (1, &record(&b, "1\t10\t.\tA\tG\t35\tPASS\t.")),
            ])
            .unwrap();
        assert_eq!(merged.qual(), Some(35.0));
        assert!(merged.failed_filters().is_empty());
    }

    #[test]
    fn test_policies() {
        let (a, b, merger) = setup("CALLER=uniq-concat\nSOMATIC=ignore\nDP=first");
        let merged = merger
            .merge(&[
                (0, &record(&a, "1\t10\t.\tA\tG\t.\tPASS\tCALLER=gatk,strelka;SOMATIC;DP=3")),
                (1, &record(&b, "1\t10\t.\tA\tG\t.\tPASS\tCALLER=strelka,varscan;DP=4")),
            ])
            .unwrap();
        assert_eq!(
            merged.info_value("CALLER").unwrap().to_string(),
            "gatk,strelka,varscan"
        );
        assert!(merged.info_value("SOMATIC").is_none());
        assert_eq!(merged.info_value("DP").unwrap().integer(0), Some(3));
    }

    #[test]
    fn test_sum_rejects_strings() {
        let (a, b, merger) = setup("CALLER=sum");
        let err = merger
            .merge(&[
                (0, &record(&a, "1\t10\t.\tA\tG\t.\tPASS\tCALLER=x")),
                (1, &record(&b, "1\t10\t.\tA\tG\t.\tPASS\tCALLER=y")),
            ])
            .unwrap_err();
        assert!(matches!(err, Error::Merge(MergeError::Unsupported { .. })));
    }

    #[test]
    fn test_samples_follow_merged_header() {
        let (a, b, merger) = setup("");
        let merged = merger
            .merge(&[
                (0, &record(&a, "1\t10\t.\tA\tG\t.\tPASS\t.\tGT:DP\t0/1:12")),
                (1, &record(&b, "1\t10\t.\tA\tG\t.\tPASS\t.\tGT:GQ\t1/1:40")),
            ])
            .unwrap();
        assert_eq!(merged.format(), &vec!["GT", "DP", "GQ"]);
        assert_eq!(
            merged.to_string(),
            "1\t10\t.\tA\tG\t.\tPASS\t.\tGT:DP:GQ\t0/1:12:.\t1/1:.:40"
        );

        let merged = merger
            .merge(&[(1, &record(&b, "1\t10\t.\tA\tG\t.\tPASS\t.\tGT\t0/1"))])
            .unwrap();
        assert!(merged.samples()[0].is_empty());
        assert_eq!(merged.genotype_data(1, "GT").unwrap().string(0), Some("0/1"));
    }

    #[test]
    fn test_repeated_sample_names_keep_their_input_column() {
        let (inputs, merger) = merger_for(&["S1", "S1"], "");
        assert_eq!(merger.header().samples(), &vec!["S1", "S1"]);
        assert_eq!(merger.inputs(), 2);
        assert_eq!(merger.sample_range(1).unwrap(), 1..2);

        let second = record(&inputs[1], "1\t10\t.\tA\tG\t.\tPASS\t.\tGT\t1/1");
        let merged = merger.merge(&[(1, &second)]).unwrap();
        assert_eq!(merged.to_string(), "1\t10\t.\tA\tG\t.\tPASS\t.\tGT\t.\t1/1");

        let first = record(&inputs[0], "1\t10\t.\tA\tG\t.\tPASS\t.\tGT\t0/1");
        let merged = merger.merge(&[(1, &second), (0, &first)]).unwrap();
        assert_eq!(merged.to_string(), "1\t10\t.\tA\tG\t.\tPASS\t.\tGT\t0/1\t1/1");

        assert!(matches!(
            merger.merge(&[(2, &first)]),
            Err(Error::Merge(MergeError::UnknownInput { input: 2, inputs: 2 }))
        ));
    }

    #[test]
    fn test_record_with_more_samples_than_its_input() {
        let (_, merger) = merger_for(&["S1", "S2"], "");
        let wide = input_header("S1\tS2");
        let record = record(&wide, "1\t10\t.\tA\tG\t.\tPASS\t.\tGT\t0/1\t1/1");
        assert!(matches!(
            merger.merge(&[(1, &record)]),
            Err(Error::Merge(MergeError::SampleCount { input: 1, expected: 1, found: 2 }))
        ));
    }

    #[test]
    fn test_per_allele_values_follow_merged_alleles() {
        let (a, b, merger) = setup("AC=sum");
        let merged = merger
            .merge(&[
                (0, &record(&a, "1\t10\t.\tA\tG\t.\tPASS\tAC=3")),
                (1, &record(&b, "1\t10\t.\tA\tT\t.\tPASS\tAC=4")),
            ])
            .unwrap();
        assert_eq!(merged.alt_alleles(), &vec!["G", "T"]);
        assert_eq!(merged.info_value("AC").unwrap().to_string(), "3,4");

        // a shared allele is summed, a private one keeps its own count
        let merged = merger
            .merge(&[
                (0, &record(&a, "1\t10\t.\tA\tG,T\t.\tPASS\tAC=3,1")),
                (1, &record(&b, "1\t10\t.\tA\tT\t.\tPASS\tAC=4")),
            ])
            .unwrap();
        assert_eq!(merged.info_value("AC").unwrap().to_string(), "3,5");

        let (a, b, merger) = setup("default=enforce");
        let merged = merger
            .merge(&[
                (0, &record(&a, "1\t10\t.\tA\tG\t.\tPASS\tAC=3;AD=10,3")),
                (1, &record(&b, "1\t10\t.\tA\tT\t.\tPASS\tAC=4;AD=10,4")),
            ])
            .unwrap();
        assert_eq!(merged.info_value("AC").unwrap().to_string(), "3,4");
        assert_eq!(merged.info_value("AD").unwrap().to_string(), "10,3,4");

        let err = merger
            .merge(&[
                (0, &record(&a, "1\t10\t.\tA\tG\t.\tPASS\tAC=3")),
                (1, &record(&b, "1\t10\t.\tA\tG,T\t.\tPASS\tAC=2,4")),
            ])
            .unwrap_err();
        assert!(matches!(err, Error::Merge(MergeError::Conflict { .. })));

        let err = merger
            .merge(&[
                (0, &record(&a, "1\t10\t.\tA\tG\t.\tPASS\tAC=3,4")),
                (1, &record(&b, "1\t10\t.\tA\tT\t.\tPASS\tAC=4")),
            ])
            .unwrap_err();
        assert!(matches!(err, Error::Merge(MergeError::LengthMismatch { .. })));

        // a lone record keeps whatever it wrote
        let merged = merger
            .merge(&[(0, &record(&a, "1\t10\t.\tA\t.\t.\tPASS\tAC=0"))])
            .unwrap();
        assert_eq!(merged.info_value("AC").unwrap().to_string(), "0");
    }

    #[test]
    fn test_alleles_are_reconciled() {
        let (a, b, merger) = setup("");
        let merged = merger
            .merge(&[
                (0, &record(&a, "1\t10\t.\tA\tG\t.\tPASS\t.\tGT\t0/1")),
                (1, &record(&b, "1\t10\t.\tAT\tA,GT\t.\tPASS\t.\tGT\t1|2")),
            ])
            .unwrap();
        assert_eq!(merged.ref_allele(), "AT");
        assert_eq!(merged.alt_alleles(), &vec!["GT", "A"]);
        assert_eq!(merged.genotype_data(0, "GT").unwrap().string(0), Some("0/1"));
        assert_eq!(merged.genotype_data(1, "GT").unwrap().string(0), Some("2|1"));
        assert_eq!((merged.start(), merged.stop()), (9, 12));

        let err = merger
            .merge(&[
                (0, &record(&a, "1\t10\t.\tAC\tA\t.\tPASS\t.")),
                (1, &record(&b, "1\t10\t.\tAT\tA\t.\tPASS\t.")),
            ])
            .unwrap_err();
        assert!(matches!(err, Error::Merge(MergeError::Reference { .. })));
    }

    #[test]
    fn test_remap_alleles() {
        assert_eq!(remap_alleles("0/1", &[0, 2]), "0/2");
        assert_eq!(remap_alleles("./.", &[0, 2]), "./.");
        assert_eq!(remap_alleles("1|0", &[0, 3]), "3|0");
    }
}
