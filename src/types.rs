use std::fmt;

use getset::Getters;
use itertools::Itertools;
use strum::{Display, EnumString};

use crate::error::TypeError;
use crate::header::{Header, Scope};
use crate::merge::MergePolicy;

pub type Sample = String;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, EnumString, Display)]
pub enum FieldKind {
    Integer,
    Float,
    Flag,
    Character,
    String,
}

/// How many values a field holds, relative to the record it is attached to.
#[derive(Debug, Eq, PartialEq, Copy, Clone, Hash)]
pub enum Number {
    Fixed(usize),
    /// One value per alternate allele (`A`).
    PerAllele,
    /// One value per allele, reference included (`R`).
    PerAlleleWithRef,
    /// One value per possible genotype (`G`).
    PerGenotype,
    /// Unknown or varying count (`.`).
    Variable,
    /// Legacy VCF 3.3 spelling of an unbounded count (`-1`).
    Unbounded,
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Fixed(n) => write!(f, "{}", n),
            Number::PerAllele => f.write_str("A"),
            Number::PerAlleleWithRef => f.write_str("R"),
            Number::PerGenotype => f.write_str("G"),
            Number::Variable => f.write_str("."),
            Number::Unbounded => f.write_str("-1"),
        }
    }
}

/// A declared INFO or FORMAT field.
#[derive(Debug, Clone, PartialEq, Getters)]
#[getset(get = "pub")]
pub struct FieldType {
    id: String,
    number: Number,
    kind: FieldKind,
    description: String,
    merge_policy: MergePolicy,
}

impl FieldType {
    pub fn new(id: &str, number: Number, kind: FieldKind, description: &str) -> Self {
        FieldType {
            id: id.to_owned(),
            number,
            kind,
            description: description.to_owned(),
            merge_policy: MergePolicy::default(),
        }
    }

    pub fn with_merge_policy(mut self, policy: MergePolicy) -> Self {
        self.merge_policy = policy;
        self
    }

    /// Two declarations of the same id are compatible if they agree on kind and multiplicity.
    pub fn is_compatible(&self, other: &FieldType) -> bool {
        self.kind == other.kind && self.number == other.number
    }

    pub(crate) fn header_line(&self, scope: Scope) -> String {
        format!(
            "##{}=<ID={},Number={},Type={},Description=\"{}\">",
            scope, self.id, self.number, self.kind, self.description
        )
    }
}

/// The payload of a [`TypedValue`].
///
/// `Empty` is the whole-field missing marker (`.`), which is not the same thing as a present
/// list of length zero. Individual elements of a list may be missing as well.
#[derive(Debug, Clone, PartialEq)]
pub enum Values {
    Empty,
    Flag,
    Integer(Vec<Option<i64>>),
    Float(Vec<Option<f64>>),
    Character(Vec<Option<char>>),
    String(Vec<Option<String>>),
}

impl Values {
    fn zero_length(kind: FieldKind) -> Self {
        match kind {
            FieldKind::Integer => Values::Integer(vec![]),
            FieldKind::Float => Values::Float(vec![]),
            FieldKind::Character => Values::Character(vec![]),
            FieldKind::String => Values::String(vec![]),
            FieldKind::Flag => Values::Flag,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Values::Empty | Values::Flag => 0,
            Values::Integer(v) => v.len(),
            Values::Float(v) => v.len(),
            Values::Character(v) => v.len(),
            Values::String(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Values::Empty)
    }
}

fn join_opt<T: fmt::Display>(f: &mut fmt::Formatter<'_>, values: &[Option<T>]) -> fmt::Result {
    let joined = values
        .iter()
        .map(|v| match v {
            Some(v) => v.to_string(),
            None => ".".to_owned(),
        })
        .join(",");
    f.write_str(&joined)
}

impl fmt::Display for Values {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Values::Empty => f.write_str("."),
            Values::Flag => Ok(()),
            Values::Integer(v) => join_opt(f, v),
            Values::Float(v) => join_opt(f, v),
            Values::Character(v) => join_opt(f, v),
            Values::String(v) => join_opt(f, v),
        }
    }
}

/// A value parsed against the declared type of its field.
#[derive(Debug, Clone, PartialEq, Getters)]
#[getset(get = "pub")]
pub struct TypedValue {
    id: String,
    kind: FieldKind,
    values: Values,
}

impl TypedValue {
    pub fn new(id: &str, kind: FieldKind, values: Values) -> Self {
        TypedValue {
            id: id.to_owned(),
            kind,
            values,
        }
    }

    pub fn empty(id: &str, kind: FieldKind) -> Self {
        Self::new(id, kind, Values::Empty)
    }

    /// Looks up the declared type of `id` in `header` and parses `text` against it.
    pub fn parse_in(header: &Header, scope: Scope, id: &str, text: &str) -> Result<Self, TypeError> {
        let field = header
            .lookup(scope, id)
            .ok_or_else(|| TypeError::UnknownField {
                scope,
                id: id.to_owned(),
            })?;
        Self::parse(field, text)
    }

    pub fn parse(field: &FieldType, text: &str) -> Result<Self, TypeError> {
        let id = field.id();
        let kind = *field.kind();
        let values = if text == "." {
            Values::Empty
        } else if kind == FieldKind::Flag {
            if !text.is_empty() {
                return Err(TypeError::FlagWithValue {
                    id: id.clone(),
                    text: text.to_owned(),
                });
            }
            Values::Flag
        } else if text.is_empty() {
            Values::zero_length(kind)
        } else {
            // a single string is taken verbatim, commas and all
            let parts = if kind == FieldKind::String && *field.number() == Number::Fixed(1) {
                vec![text]
            } else {
                text.split(',').collect_vec()
            };
            match kind {
                FieldKind::Integer => Values::Integer(elements(field, &parts, |s| s.parse().ok())?),
                FieldKind::Float => Values::Float(elements(field, &parts, |s| s.parse().ok())?),
                FieldKind::Character => Values::Character(elements(field, &parts, |s| {
                    let mut chars = s.chars();
                    match (chars.next(), chars.next()) {
                        (Some(c), None) => Some(c),
                        _ => None,
                    }
                })?),
                FieldKind::String => {
                    Values::String(elements(field, &parts, |s| Some(s.to_owned()))?)
                }
                FieldKind::Flag => Values::Flag,
            }
        };

        if let (Number::Fixed(expected), false) = (*field.number(), values.is_empty()) {
            if kind != FieldKind::Flag && expected > 0 && values.len() != expected {
                return Err(TypeError::Arity {
                    id: id.clone(),
                    expected,
                    found: values.len(),
                });
            }
        }
        Ok(TypedValue::new(id, kind, values))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn num_values(&self) -> usize {
        self.values.len()
    }

    pub fn integer(&self, idx: usize) -> Option<i64> {
        match &self.values {
            Values::Integer(v) => v.get(idx).copied().flatten(),
            _ => None,
        }
    }

    pub fn float(&self, idx: usize) -> Option<f64> {
        match &self.values {
            Values::Float(v) => v.get(idx).copied().flatten(),
            _ => None,
        }
    }

    pub fn character(&self, idx: usize) -> Option<char> {
        match &self.values {
            Values::Character(v) => v.get(idx).copied().flatten(),
            _ => None,
        }
    }

    pub fn string(&self, idx: usize) -> Option<&str> {
        match &self.values {
            Values::String(v) => v.get(idx).and_then(|s| s.as_deref()),
            _ => None,
        }
    }

    pub fn flag(&self) -> bool {
        matches!(self.values, Values::Flag)
    }

    pub(crate) fn set_values(&mut self, values: Values) {
        self.values = values;
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.values.fmt(f)
    }
}

fn elements<T>(
    field: &FieldType,
    parts: &[&str],
    convert: impl Fn(&str) -> Option<T>,
) -> Result<Vec<Option<T>>, TypeError> {
    parts
        .iter()
        .map(|&part| {
            if part == "." {
                return Ok(None);
            }
            convert(part).map(Some).ok_or_else(|| TypeError::Coercion {
                id: field.id().clone(),
                kind: *field.kind(),
                text: part.to_owned(),
            })
        })
        .collect()
}
