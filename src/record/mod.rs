mod order;
mod span;

use std::cmp::Ordering;
use std::fmt;
use std::io::{self, Write};

use getset::{CopyGetters, Getters};
use indexmap::IndexMap;
use itertools::Itertools;

use crate::error::{Field, ParseError, Result};
use crate::header::{Header, HeaderRef, Scope};
use crate::parser::{Token, Tokenizer};
use crate::reader::LineRecord;
use crate::types::TypedValue;

pub use order::natural_cmp;

/// FORMAT field consulted by [`Record::drop_low_depth_genotypes`].
pub const DEPTH_FIELD: &str = "DP";

/// One VCF data line, parsed against the header it came from.
#[derive(Debug, Clone, Getters, CopyGetters)]
pub struct Record {
    #[getset(get = "pub")]
    pub(crate) header: HeaderRef,
    #[getset(get = "pub")]
    pub(crate) chrom: String,
    /// 1-based position.
    #[getset(get_copy = "pub")]
    pub(crate) pos: i64,
    #[getset(get = "pub")]
    pub(crate) ids: Vec<String>,
    #[getset(get = "pub")]
    pub(crate) ref_allele: String,
    #[getset(get = "pub")]
    pub(crate) alt_alleles: Vec<String>,
    #[getset(get_copy = "pub")]
    pub(crate) qual: Option<f64>,
    /// Empty when the record passed all filters.
    #[getset(get = "pub")]
    pub(crate) failed_filters: Vec<String>,
    #[getset(get = "pub")]
    pub(crate) info: IndexMap<String, TypedValue>,
    #[getset(get = "pub")]
    pub(crate) format: Vec<String>,
    /// Per-sample values, in `format` order. An empty list means no data for that sample.
    #[getset(get = "pub")]
    pub(crate) samples: Vec<Vec<TypedValue>>,
    #[getset(get_copy = "pub")]
    pub(crate) start: i64,
    #[getset(get_copy = "pub")]
    pub(crate) stop: i64,
}

fn column<'a>(
    columns: &mut Tokenizer<'a>,
    field: Field,
    line: &str,
) -> std::result::Result<Token<'a>, ParseError> {
    columns
        .next()
        .ok_or_else(|| ParseError::new(field, "", line.len(), "missing column"))
}

fn list(token: Token<'_>, delimiter: char, field: Field) -> std::result::Result<Vec<String>, ParseError> {
    if token.text == "." {
        return Ok(vec![]);
    }
    token
        .split(delimiter)
        .map(|item| {
            if item.text.is_empty() {
                Err(ParseError::new(field, token.text, token.begin, "empty list entry"))
            } else {
                Ok(item.text.to_owned())
            }
        })
        .collect()
}

impl Record {
    /// Parses one tab-delimited data line. Every INFO and FORMAT id must be declared in `header`.
    pub fn parse(header: &HeaderRef, line: &str) -> Result<Self> {
        let mut columns = Tokenizer::new(line, '\t');

        let chrom = column(&mut columns, Field::Chrom, line)?;
        if chrom.text.is_empty() {
            return Err(ParseError::new(Field::Chrom, chrom.text, chrom.begin, "empty chromosome").into());
        }

        let pos = column(&mut columns, Field::Pos, line)?;
        let pos_value = pos
            .text
            .parse::<i64>()
            .map_err(|_| ParseError::new(Field::Pos, pos.text, pos.begin, "not an integer"))?;

        let ids = list(column(&mut columns, Field::Id, line)?, ';', Field::Id)?;

        let ref_allele = column(&mut columns, Field::Ref, line)?;
        if ref_allele.text.is_empty() {
            return Err(ParseError::new(Field::Ref, "", ref_allele.begin, "empty reference allele").into());
        }

        let alt_alleles = list(column(&mut columns, Field::Alt, line)?, ',', Field::Alt)?;

        let qual = column(&mut columns, Field::Qual, line)?;
        let qual_value = match qual.text {
            "." => None,
            text => Some(text.parse::<f64>().map_err(|_| {
                ParseError::new(Field::Qual, text, qual.begin, "not a number")
            })?),
        };

        let filters = column(&mut columns, Field::Filter, line)?;
        let failed_filters = match filters.text {
            "PASS" => vec![],
            "" => {
                return Err(ParseError::new(Field::Filter, "", filters.begin, "empty filter column").into())
            }
            _ => filters.split(';').map(|t| t.text.to_owned()).collect(),
        };

        let info = Self::parse_info(header, column(&mut columns, Field::Info, line)?)?;

        let format = match columns.next() {
            Some(token) => Self::parse_format(header, token)?,
            None => vec![],
        };

        let samples = columns
            .enumerate()
            .map(|(idx, token)| Self::parse_sample(header, &format, idx, token))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut record = Record {
            header: header.clone(),
            chrom: chrom.text.to_owned(),
            pos: pos_value,
            ids,
            ref_allele: ref_allele.text.to_owned(),
            alt_alleles,
            qual: qual_value,
            failed_filters,
            info,
            format,
            samples,
            start: 0,
            stop: 0,
        };
        record.normalize()?;
        Ok(record)
    }

    fn parse_info(
        header: &Header,
        token: Token<'_>,
    ) -> std::result::Result<IndexMap<String, TypedValue>, ParseError> {
        let mut info = IndexMap::new();
        if token.text == "." {
            return Ok(info);
        }
        for entry in token.split(';') {
            if entry.text.is_empty() {
                continue;
            }
            let (key, value) = entry.split_once('=');
            let field = header.lookup_info(key.text).ok_or_else(|| {
                ParseError::new(Field::Info, key.text, key.begin, "no type declared for field")
            })?;
            let (text, begin) = value.map_or(("", key.end), |v| (v.text, v.begin));
            let value = TypedValue::parse(field, text)
                .map_err(|e| ParseError::new(Field::Info, text, begin, e.to_string()))?;
            if info.insert(key.text.to_owned(), value).is_some() {
                return Err(ParseError::new(
                    Field::Info,
                    key.text,
                    key.begin,
                    "duplicate field",
                ));
            }
        }
        Ok(info)
    }

    fn parse_format(header: &Header, token: Token<'_>) -> std::result::Result<Vec<String>, ParseError> {
        if token.text == "." {
            return Ok(vec![]);
        }
        token
            .split(':')
            .map(|id| {
                if header.lookup_format(id.text).is_none() {
                    Err(ParseError::new(
                        Field::Format,
                        id.text,
                        id.begin,
                        "no type declared for field",
                    ))
                } else {
                    Ok(id.text.to_owned())
                }
            })
            .collect()
    }

    fn parse_sample(
        header: &Header,
        format: &[String],
        idx: usize,
        token: Token<'_>,
    ) -> std::result::Result<Vec<TypedValue>, ParseError> {
        let declared = header.samples().len();
        if declared > 0 && idx >= declared {
            return Err(ParseError::new(
                Field::Sample(idx),
                token.text,
                token.begin,
                format!("header declares {} samples", declared),
            ));
        }
        if token.text == "." {
            return Ok(vec![]);
        }
        let values = token.split(':').collect_vec();
        if values.len() > format.len() {
            return Err(ParseError::new(
                Field::Sample(idx),
                token.text,
                token.begin,
                format!(
                    "{} values but only {} FORMAT fields",
                    values.len(),
                    format.len()
                ),
            ));
        }
        values
            .iter()
            .zip(format)
            .map(|(value, id)| {
                TypedValue::parse_in(header, Scope::Format, id, value.text)
                    .map_err(|e| ParseError::new(Field::Sample(idx), value.text, value.begin, e.to_string()))
            })
            .collect()
    }

    /// Recomputes [`start`](Record::start) and [`stop`](Record::stop) from the alleles.
    pub fn normalize(&mut self) -> Result<()> {
        let (start, stop) = span::record_span(self.pos, &self.ref_allele, &self.alt_alleles)?;
        self.start = start;
        self.stop = stop;
        Ok(())
    }

    pub fn set_alt_alleles(&mut self, alts: Vec<String>) -> Result<()> {
        self.alt_alleles = alts;
        self.normalize()
    }

    /// Orders by chromosome (numeric runs compared by value), then position.
    pub fn compare(&self, other: &Record) -> Ordering {
        natural_cmp(&self.chrom, &other.chrom).then_with(|| self.pos.cmp(&other.pos))
    }

    pub fn info_value(&self, id: &str) -> Option<&TypedValue> {
        self.info.get(id)
    }

    pub fn genotype_data(&self, sample: usize, id: &str) -> Option<&TypedValue> {
        let offset = self.format.iter().position(|f| f == id)?;
        self.samples.get(sample)?.get(offset)
    }

    pub fn alt_idx(&self, alt: &str) -> Option<usize> {
        self.alt_alleles.iter().position(|a| a == alt)
    }

    pub fn samples_with_data(&self) -> usize {
        self.samples.iter().filter(|s| !s.is_empty()).count()
    }

    /// Clears every sample whose depth is missing or below `threshold`. Records without a
    /// depth FORMAT field are left alone.
    pub fn drop_low_depth_genotypes(&mut self, threshold: i64) {
        let offset = match self.format.iter().position(|f| f == DEPTH_FIELD) {
            Some(offset) => offset,
            None => return,
        };
        for sample in self.samples.iter_mut().filter(|s| !s.is_empty()) {
            let depth = sample.get(offset).and_then(|v| v.integer(0));
            if depth.map_or(true, |d| d < threshold) {
                sample.clear();
            }
        }
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.chrom == other.chrom
            && self.pos == other.pos
            && self.ids == other.ids
            && self.ref_allele == other.ref_allele
            && self.alt_alleles == other.alt_alleles
            && self.qual == other.qual
            && self.failed_filters == other.failed_filters
            && self.info == other.info
            && self.format == other.format
            && self.samples == other.samples
    }
}

fn or_dot(items: &[String], delimiter: &str) -> String {
    if items.is_empty() {
        ".".to_owned()
    } else {
        items.join(delimiter)
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}\t",
            self.chrom,
            self.pos,
            or_dot(&self.ids, ";"),
            self.ref_allele,
            or_dot(&self.alt_alleles, ",")
        )?;
        match self.qual {
            Some(qual) => write!(f, "{}\t", qual)?,
            None => f.write_str(".\t")?,
        }
        if self.failed_filters.is_empty() {
            f.write_str("PASS\t")?;
        } else {
            write!(f, "{}\t", self.failed_filters.join(";"))?;
        }

        if self.info.is_empty() {
            f.write_str(".")?;
        } else {
            let info = self
                .info
                .iter()
                .map(|(id, value)| {
                    let value = value.to_string();
                    if value.is_empty() {
                        id.clone()
                    } else {
                        format!("{}={}", id, value)
                    }
                })
                .join(";");
            f.write_str(&info)?;
        }

        if self.format.is_empty() && self.samples.is_empty() {
            return Ok(());
        }
        write!(f, "\t{}", or_dot(&self.format, ":"))?;
        for sample in &self.samples {
            if sample.is_empty() {
                f.write_str("\t.")?;
            } else {
                write!(f, "\t{}", sample.iter().join(":"))?;
            }
        }
        Ok(())
    }
}

impl LineRecord for Record {
    type Header = HeaderRef;

    fn parse_header(lines: &[String]) -> Result<HeaderRef> {
        Ok(HeaderRef::new(Header::from_lines(lines)?))
    }

    fn write_header<W: Write>(header: &HeaderRef, out: &mut W) -> io::Result<()> {
        write!(out, "{}", header)
    }

    fn parse_line(header: &HeaderRef, line: &str) -> Result<Self> {
        Record::parse(header, line)
    }

    fn write_line<W: Write>(&self, out: &mut W) -> io::Result<()> {
        write!(out, "{}", self)
    }

    fn sort_cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::Error;

    pub(crate) const HEADER: &[&str] = &[
        "##fileformat=VCFv4.1",
        r#"##INFO=<ID=DP,Number=1,Type=Integer,Description="Total depth">"#,
        r#"##INFO=<ID=AF,Number=A,Type=Float,Description="Allele frequency">"#,
        r#"##INFO=<ID=DB,Number=0,Type=Flag,Description="dbSNP membership">"#,
        r#"##INFO=<ID=CALLER,Number=.,Type=String,Description="Callers">"#,
        r#"##FORMAT=<ID=GT,Number=1,Type=String,Description="Genotype">"#,
        r#"##FORMAT=<ID=DP,Number=1,Type=Integer,Description="Read depth">"#,
        r#"##FORMAT=<ID=FT,Number=1,Type=String,Description="Sample filter">"#,
        r#"##FILTER=<ID=q10,Description="Quality below 10">"#,
        "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tS1\tS2",
    ];

    pub(crate) fn header() -> HeaderRef {
        HeaderRef::new(Header::from_lines(HEADER).unwrap())
    }

    const LINE: &str =
        "chr1\t100\trs1;rs2\tA\tG,AT\t30.5\tPASS\tDP=14;AF=0.5,0.25;DB\tGT:DP\t0/1:10\t1/2:4";

    #[test]
    fn test_parse_fields() {
        let record = Record::parse(&header(), LINE).unwrap();
        assert_eq!(record.chrom(), "chr1");
        assert_eq!(record.pos(), 100);
        assert_eq!(record.ids(), &vec!["rs1", "rs2"]);
        assert_eq!(record.ref_allele(), "A");
        assert_eq!(record.alt_alleles(), &vec!["G", "AT"]);
        assert_eq!(record.qual(), Some(30.5));
        assert!(record.failed_filters().is_empty());
        assert_eq!(record.info_value("DP").unwrap().integer(0), Some(14));
        assert!(record.info_value("DB").unwrap().flag());
        assert_eq!(record.format(), &vec!["GT", "DP"]);
        assert_eq!(record.genotype_data(1, "GT").unwrap().string(0), Some("1/2"));
        assert_eq!(record.genotype_data(0, "DP").unwrap().integer(0), Some(10));
        assert_eq!(record.alt_idx("AT"), Some(1));
        assert_eq!(record.samples_with_data(), 2);
        assert_eq!((record.start(), record.stop()), (99, 101));
    }

    #[test]
    fn test_round_trip() {
        let header = header();
        let lines = [
            LINE,
            "chr2\t5\t.\tAT\tA\t.\tq10;q10\t.",
            "chr2\t7\t.\tC\t.\t.\tPASS\tCALLER=gatk,.,varscan\tGT:FT\t.\t0/0:.",
            "chrX\t1\t.\tC\tT\t0\tPASS\tDP=.\tGT:DP\t.:.",
        ];
        for line in lines {
            let record = Record::parse(&header, line).unwrap();
            let text = record.to_string();
            assert_eq!(text, line);
            assert_eq!(Record::parse(&header, &text).unwrap(), record);
        }
    }

    #[test]
    fn test_info_order_is_preserved() {
        let line = "1\t1\t.\tA\tG\t.\tPASS\tDB;DP=3;CALLER=x";
        let record = Record::parse(&header(), line).unwrap();
        assert_eq!(record.info().keys().collect_vec(), vec!["DB", "DP", "CALLER"]);
        assert_eq!(record.to_string(), line);
    }

    #[test]
    fn test_filters_kept_verbatim() {
        let record = Record::parse(&header(), "1\t1\t.\tA\tG\t.\tq10;q10\t.").unwrap();
        assert_eq!(record.failed_filters(), &vec!["q10", "q10"]);
    }

    #[test]
    fn test_missing_quality() {
        let record = Record::parse(&header(), "1\t1\t.\tA\tG\t.\tPASS\t.").unwrap();
        assert_eq!(record.qual(), None);
        let record = Record::parse(&header(), "1\t1\t.\tA\tG\t0\tPASS\t.").unwrap();
        assert_eq!(record.qual(), Some(0.0));
    }

    fn parse_error(line: &str) -> ParseError {
        match Record::parse(&header(), line) {
            Err(Error::Parse(e)) => e,
            other => panic!("expected a parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_errors_name_the_field() {
        let e = parse_error("1\tx\t.\tA\tG\t.\tPASS\t.");
        assert_eq!((e.field, e.text.as_str(), e.column), (Field::Pos, "x", 2));

        let e = parse_error("1\t1\t.\tA\tG\tbad\tPASS\t.");
        assert_eq!((e.field, e.text.as_str()), (Field::Qual, "bad"));

        let e = parse_error("1\t1\t.\tA\tG\t.\tPASS\tNOPE=1");
        assert_eq!((e.field, e.text.as_str(), e.column), (Field::Info, "NOPE", 17));

        let e = parse_error("1\t1\t.\tA\tG\t.\tPASS\tDP=x");
        assert_eq!((e.field, e.text.as_str(), e.column), (Field::Info, "x", 20));

        let e = parse_error("1\t1\t.\tA\tG\t.\tPASS\tDP=1;DP=2");
        assert_eq!(e.field, Field::Info);

        let e = parse_error("1\t1\t.\tA\tG\t.\tPASS\t.\tGT:XX\t0/1");
        assert_eq!((e.field, e.text.as_str()), (Field::Format, "XX"));

        let e = parse_error("1\t1\t.\tA\tG\t.\tPASS\t.\tGT\t0/1:5");
        assert_eq!(e.field, Field::Sample(0));

        let e = parse_error("1\t1\t.\tA");
        assert_eq!(e.field, Field::Alt);
    }

    #[test]
    fn test_undeclared_sample_column() {
        let e = parse_error("1\t1\t.\tA\tG\t.\tPASS\t.\tGT\t0/1\t1/1\t0/0");
        assert_eq!((e.field, e.text.as_str()), (Field::Sample(2), "0/0"));

        // a header without samples does not constrain the columns
        let bare = HeaderRef::new(Header::from_lines(&HEADER[..HEADER.len() - 1]).unwrap());
        let record = Record::parse(&bare, "1\t1\t.\tA\tG\t.\tPASS\t.\t.\t.\t.").unwrap();
        assert_eq!(record.samples().len(), 3);
    }

    #[test]
    fn test_normalized_spans() {
        let header = header();
        let span = |line: &str| {
            let r = Record::parse(&header, line).unwrap();
            (r.start(), r.stop())
        };
        assert_eq!(span("1\t100\t.\tA\tAT\t.\tPASS\t."), (101, 101));
        assert_eq!(span("1\t100\t.\tAT\tA\t.\tPASS\t."), (100, 102));
        assert_eq!(span("1\t100\t.\tA\tG\t.\tPASS\t."), (99, 100));
    }

    #[test]
    fn test_set_alt_alleles_recomputes_span() {
        let mut record = Record::parse(&header(), "1\t100\t.\tA\tG\t.\tPASS\t.").unwrap();
        record.set_alt_alleles(vec!["AT".into()]).unwrap();
        assert_eq!((record.start(), record.stop()), (101, 101));
    }

    #[test]
    fn test_compare() {
        let header = header();
        let at = |chrom: &str, pos: i64| {
            Record::parse(&header, &format!("{}\t{}\t.\tA\tG\t.\tPASS\t.", chrom, pos)).unwrap()
        };
        assert_eq!(at("chr2", 5).compare(&at("chr10", 1)), Ordering::Less);
        assert_eq!(at("chr2", 5).compare(&at("chr2", 5)), Ordering::Equal);
        assert_eq!(at("chr2", 6).compare(&at("chr2", 5)), Ordering::Greater);
    }

    #[test]
    fn test_drop_low_depth_genotypes() {
        let header = header();
        let mut record =
            Record::parse(&header, "1\t1\t.\tA\tG\t.\tPASS\t.\tGT:DP\t0/1:5\t0/1:12").unwrap();
        record.drop_low_depth_genotypes(10);
        assert!(record.samples()[0].is_empty());
        assert_eq!(record.samples()[1].len(), 2);

        let mut record =
            Record::parse(&header, "1\t1\t.\tA\tG\t.\tPASS\t.\tGT:DP\t0/1:.\t0/1").unwrap();
        record.drop_low_depth_genotypes(10);
        assert_eq!(record.samples_with_data(), 0);

        let mut record = Record::parse(&header, "1\t1\t.\tA\tG\t.\tPASS\t.\tGT\t0/1\t1/1").unwrap();
        let before = record.clone();
        record.drop_low_depth_genotypes(10);
        assert_eq!(record, before);
    }
}
