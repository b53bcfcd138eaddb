use std::collections::HashMap;
use std::fmt;
use std::io::{self, BufRead};
#[cfg(not(feature = "sync"))]
use std::rc::Rc;
#[cfg(feature = "sync")]
use std::sync::Arc;

use getset::Getters;
use indexmap::IndexMap;
use itertools::Itertools;
use log::warn;
use multimap::MultiMap;
use nom::combinator::all_consuming;
use std::str::FromStr;
use strum::Display;

use crate::error::{Error, Result};
use crate::merge::MergeStrategy;
use crate::parser::{self, MetaLine};
use crate::types::{FieldKind, FieldType, Sample};

/// Shared handle to the header records were parsed against.
#[cfg(not(feature = "sync"))]
pub type HeaderRef = Rc<Header>;
#[cfg(feature = "sync")]
pub type HeaderRef = Arc<Header>;

pub(crate) const FIXED_COLUMNS: [&str; 8] =
    ["#CHROM", "POS", "ID", "REF", "ALT", "QUAL", "FILTER", "INFO"];

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Display)]
pub enum Scope {
    #[strum(serialize = "INFO")]
    Info,
    #[strum(serialize = "FORMAT")]
    Format,
}

/// The type registry of a VCF stream: declared INFO and FORMAT fields, filters and samples.
///
/// Every `##` line is kept verbatim, in order, so writing the header back out reproduces
/// what was read.
#[derive(Debug, Clone, Default, Getters)]
pub struct Header {
    #[getset(get = "pub")]
    meta_lines: Vec<String>,
    #[getset(get = "pub")]
    meta: MultiMap<String, String>,
    #[getset(get = "pub")]
    info: IndexMap<String, FieldType>,
    #[getset(get = "pub")]
    format: IndexMap<String, FieldType>,
    #[getset(get = "pub")]
    filters: IndexMap<String, String>,
    #[getset(get = "pub")]
    samples: Vec<Sample>,
    #[getset(get = "pub")]
    strategy: MergeStrategy,
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    /// A header whose INFO fields take their merge policy from `strategy` as they are declared.
    pub fn with_strategy(strategy: MergeStrategy) -> Self {
        Header {
            strategy,
            ..Default::default()
        }
    }

    pub fn from_lines<S: AsRef<str>>(lines: &[S]) -> Result<Self> {
        let mut header = Header::new();
        for line in lines {
            header.add(line.as_ref())?;
        }
        Ok(header)
    }

    /// Consumes the leading `#` lines of `input`, leaving it at the first data line.
    pub fn read_from<R: BufRead>(input: &mut R) -> Result<Self> {
        let lines = read_header_lines(input)?;
        Self::from_lines(&lines)
    }

    pub fn is_empty(&self) -> bool {
        self.meta_lines.is_empty() && self.samples.is_empty()
    }

    /// Adds one header line, either a `##` meta line or the `#CHROM` column line.
    pub fn add(&mut self, line: &str) -> Result<()> {
        if line.starts_with("##") {
            self.add_meta(line)
        } else if line.starts_with("#CHROM") {
            self.set_columns(line)
        } else {
            Err(Error::Header {
                line: line.to_owned(),
                reason: "not a header line".into(),
            })
        }
    }

    fn add_meta(&mut self, line: &str) -> Result<()> {
        let meta = match parser::meta_line(line) {
            Ok((_, meta)) => meta,
            Err(_) => {
                // a bare `##comment`
                if !self.meta_lines.iter().any(|l| l == line) {
                    self.meta_lines.push(line.to_owned());
                }
                return Ok(());
            }
        };
        match meta {
            MetaLine::Structured { key: "INFO", fields } => {
                let field = self.field_type(line, fields)?;
                self.register(Scope::Info, field, Some(line))
            }
            MetaLine::Structured {
                key: "FORMAT",
                fields,
            } => {
                let field = self.field_type(line, fields)?;
                self.register(Scope::Format, field, Some(line))
            }
            MetaLine::Structured {
                key: "FILTER",
                fields,
            } => {
                let mut h: HashMap<_, _> = fields.into_iter().collect();
                let id = h.remove("ID").ok_or_else(|| invalid(line, "ID is mandatory"))?;
                let description = h.remove("Description").unwrap_or("");
                if !self.filters.contains_key(id) {
                    self.filters.insert(id.to_owned(), description.to_owned());
                    self.meta_lines.push(line.to_owned());
                }
                Ok(())
            }
            MetaLine::Plain {
                key: "INFO" | "FORMAT" | "FILTER",
                ..
            } => Err(invalid(line, "expected <ID=...,...>")),
            MetaLine::Structured { key, .. } | MetaLine::Plain { key, .. } => {
                let value = &line[key.len() + 3..];
                if key == "fileformat" && self.meta.contains_key(key) {
                    return Ok(());
                }
                if !self.meta_lines.iter().any(|l| l == line) {
                    self.meta.insert(key.to_owned(), value.to_owned());
                    self.meta_lines.push(line.to_owned());
                }
                Ok(())
            }
        }
    }

    fn field_type(&self, line: &str, fields: Vec<(&str, &str)>) -> Result<FieldType> {
        let mut h: HashMap<_, _> = fields.into_iter().collect();
        let id = h.remove("ID").ok_or_else(|| invalid(line, "ID is mandatory"))?;
        let number = h
            .remove("Number")
            .ok_or_else(|| invalid(line, "Number is mandatory"))?;
        let (_, number) =
            all_consuming(parser::number)(number).map_err(|_| invalid(line, "bad Number"))?;
        let kind = h.remove("Type").ok_or_else(|| invalid(line, "Type is mandatory"))?;
        let kind = FieldKind::from_str(kind).map_err(|_| invalid(line, "unknown Type"))?;
        let description = h.remove("Description").unwrap_or("");
        let policy = self.strategy.policy_for(id);
        Ok(FieldType::new(id, number, kind, description).with_merge_policy(policy))
    }

    fn table(&self, scope: Scope) -> &IndexMap<String, FieldType> {
        match scope {
            Scope::Info => &self.info,
            Scope::Format => &self.format,
        }
    }

    fn check_compatible(&self, scope: Scope, field: &FieldType) -> Result<()> {
        match self.table(scope).get(field.id()) {
            Some(existing) if !existing.is_compatible(field) => Err(Error::SchemaConflict {
                scope,
                id: field.id().clone(),
                existing_kind: *existing.kind(),
                existing_number: *existing.number(),
                incoming_kind: *field.kind(),
                incoming_number: *field.number(),
            }),
            _ => Ok(()),
        }
    }

    /// Registers `field`. Redeclaring a compatible type is a no-op, an incompatible one fails.
    fn register(&mut self, scope: Scope, field: FieldType, line: Option<&str>) -> Result<()> {
        self.check_compatible(scope, &field)?;
        if self.table(scope).contains_key(field.id()) {
            return Ok(());
        }
        let line = line.map_or_else(|| field.header_line(scope), str::to_owned);
        self.meta_lines.push(line);
        let table = match scope {
            Scope::Info => &mut self.info,
            Scope::Format => &mut self.format,
        };
        table.insert(field.id().clone(), field);
        Ok(())
    }

    pub fn add_info(&mut self, field: FieldType) -> Result<()> {
        self.register(Scope::Info, field, None)
    }

    pub fn add_format(&mut self, field: FieldType) -> Result<()> {
        self.register(Scope::Format, field, None)
    }

    pub fn add_filter(&mut self, id: &str, description: &str) {
        if !self.filters.contains_key(id) {
            self.filters.insert(id.to_owned(), description.to_owned());
            self.meta_lines
                .push(format!("##FILTER=<ID={},Description=\"{}\">", id, description));
        }
    }

    pub fn add_sample(&mut self, name: &str) {
        self.samples.push(name.to_owned());
    }

    fn set_columns(&mut self, line: &str) -> Result<()> {
        let columns = line.split('\t').collect_vec();
        if columns.len() < FIXED_COLUMNS.len() || columns[..FIXED_COLUMNS.len()] != FIXED_COLUMNS {
            return Err(invalid(line, "unexpected column names"));
        }
        // merged headers repeat names across inputs; columns stay positional
        self.samples = columns
            .iter()
            .skip(FIXED_COLUMNS.len() + 1)
            .map(|s| s.to_string())
            .collect();
        let repeated = self.repeated_samples();
        if !repeated.is_empty() {
            warn!("sample names repeated in the column line: {}", repeated.iter().join(", "));
        }
        Ok(())
    }

    pub fn lookup(&self, scope: Scope, id: &str) -> Option<&FieldType> {
        self.table(scope).get(id)
    }

    pub fn lookup_info(&self, id: &str) -> Option<&FieldType> {
        self.lookup(Scope::Info, id)
    }

    pub fn lookup_format(&self, id: &str) -> Option<&FieldType> {
        self.lookup(Scope::Format, id)
    }

    /// Sample names that occur in more than one column, each listed once.
    pub fn repeated_samples(&self) -> Vec<&Sample> {
        self.samples.iter().duplicates().collect()
    }

    /// Column of the first sample called `name`.
    pub fn sample_index(&self, name: &str) -> Result<usize> {
        self.samples
            .iter()
            .position(|s| s == name)
            .ok_or_else(|| Error::UnknownSample(name.to_owned()))
    }

    /// Merges `other` into this header.
    ///
    /// Field declarations and filters are unioned; an incompatible redeclaration fails
    /// before anything is changed. Samples of `other` are appended as they are, and the
    /// names that were already present are returned.
    pub fn merge(&mut self, other: &Header) -> Result<Vec<Sample>> {
        for (scope, table) in [(Scope::Info, &other.info), (Scope::Format, &other.format)] {
            for field in table.values() {
                self.check_compatible(scope, field)?;
            }
        }

        for line in &other.meta_lines {
            self.add_meta(line)?;
        }

        let collisions = other
            .samples
            .iter()
            .filter(|s| self.samples.contains(s))
            .cloned()
            .collect_vec();
        if !collisions.is_empty() {
            warn!(
                "sample names present in more than one input: {}",
                collisions.join(", ")
            );
        }
        self.samples.extend(other.samples.iter().cloned());
        Ok(collisions)
    }

    pub fn column_line(&self) -> String {
        let mut line = FIXED_COLUMNS.join("\t");
        if !self.samples.is_empty() {
            line.push_str("\tFORMAT\t");
            line.push_str(&self.samples.join("\t"));
        }
        line
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.meta_lines {
            writeln!(f, "{}", line)?;
        }
        writeln!(f, "{}", self.column_line())
    }
}

fn invalid(line: &str, reason: &str) -> Error {
    Error::Header {
        line: line.to_owned(),
        reason: reason.to_owned(),
    }
}

/// Reads consecutive lines starting with `#`, line endings stripped.
pub(crate) fn read_header_lines<R: BufRead>(input: &mut R) -> io::Result<Vec<String>> {
    let mut lines = Vec::new();
    loop {
        let next = input.fill_buf()?;
        if next.first() != Some(&b'#') {
            break;
        }
        let mut line = String::new();
        input.read_line(&mut line)?;
        let len = line.trim_end_matches(&['\n', '\r'][..]).len();
        line.truncate(len);
        lines.push(line);
    }
    Ok(lines)
}
