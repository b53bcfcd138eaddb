use nom::branch::alt;
use nom::bytes::complete::{escaped, is_not, tag};
use nom::character::complete::{digit1, none_of};
use nom::combinator::{all_consuming, map_res, rest, value};
use nom::multi::separated_list0;
use nom::sequence::{delimited, preceded, separated_pair};
use nom::IResult;

use crate::types::Number;

pub(crate) fn number(input: &str) -> IResult<&str, Number> {
    alt((
        map_res(digit1, |digits: &str| digits.parse().map(Number::Fixed)),
        value(Number::Unbounded, tag("-1")),
        value(Number::PerAllele, tag("A")),
        value(Number::PerAlleleWithRef, tag("R")),
        value(Number::PerGenotype, tag("G")),
        value(Number::Variable, tag(".")),
    ))(input)
}

fn string(input: &str) -> IResult<&str, &str> {
    delimited(
        tag("\""),
        escaped(none_of("\\\""), '\\', alt((tag("\\"), tag("\"")))),
        tag("\""),
    )(input)
}

pub(crate) fn keys_and_values(input: &str) -> IResult<&str, Vec<(&str, &str)>> {
    fn key_value(input: &str) -> IResult<&str, (&str, &str)> {
        separated_pair(is_not("<,=>"), tag("="), alt((string, is_not(">,"))))(input)
    }
    separated_list0(tag(","), key_value)(input)
}

#[derive(Debug, PartialEq)]
pub(crate) enum MetaLine<'a> {
    /// `##KEY=<K1=V1,K2="V2",...>`
    Structured {
        key: &'a str,
        fields: Vec<(&'a str, &'a str)>,
    },
    /// `##KEY=VALUE`
    Plain { key: &'a str, value: &'a str },
}

pub(crate) fn meta_line(line: &str) -> IResult<&str, MetaLine<'_>> {
    let (_, (key, value)) = preceded(tag("##"), separated_pair(is_not("="), tag("="), rest))(line)?;
    let structured: IResult<&str, Vec<(&str, &str)>> =
        all_consuming(delimited(tag("<"), keys_and_values, tag(">")))(value);
    let meta = match structured {
        Ok((_, fields)) => MetaLine::Structured { key, fields },
        Err(_) => MetaLine::Plain { key, value },
    };
    Ok(("", meta))
}

/// A piece of a delimited line, with its byte offsets into the full line.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) struct Token<'a> {
    pub text: &'a str,
    pub begin: usize,
    pub end: usize,
}

impl<'a> Token<'a> {
    pub fn split(&self, delimiter: char) -> Tokenizer<'a> {
        Tokenizer::with_offset(self.text, delimiter, self.begin)
    }

    /// Splits at the first `delimiter`; the second half is `None` if it does not occur.
    pub fn split_once(&self, delimiter: char) -> (Token<'a>, Option<Token<'a>>) {
        let mut parts = self.split(delimiter);
        let head = match parts.next() {
            Some(head) => head,
            None => return (*self, None),
        };
        let tail = parts.rest();
        (head, tail)
    }
}

/// Splits a line on a single character, like `str::split`, but remembers where each piece
/// starts so errors can point at the offending column.
pub(crate) struct Tokenizer<'a> {
    input: &'a str,
    base: usize,
    pos: usize,
    delimiter: char,
    finished: bool,
}

impl<'a> Tokenizer<'a> {
    pub fn new(input: &'a str, delimiter: char) -> Self {
        Self::with_offset(input, delimiter, 0)
    }

    pub fn with_offset(input: &'a str, delimiter: char, base: usize) -> Self {
        Tokenizer {
            input,
            base,
            pos: 0,
            delimiter,
            finished: false,
        }
    }

    /// Everything not yet consumed, as a single token.
    pub fn rest(&mut self) -> Option<Token<'a>> {
        if self.finished {
            return None;
        }
        self.finished = true;
        Some(Token {
            text: &self.input[self.pos..],
            begin: self.base + self.pos,
            end: self.base + self.input.len(),
        })
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let remaining = &self.input[self.pos..];
        let begin = self.base + self.pos;
        match remaining.find(self.delimiter) {
            Some(idx) => {
                self.pos += idx + self.delimiter.len_utf8();
                Some(Token {
                    text: &remaining[..idx],
                    begin,
                    end: begin + idx,
                })
            }
            None => {
                self.finished = true;
                Some(Token {
                    text: remaining,
                    begin,
                    end: begin + remaining.len(),
                })
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use itertools::Itertools;

    #[test]
    fn test_number() {
        assert_eq!(number("3"), Ok(("", Number::Fixed(3))));
        assert_eq!(number("A"), Ok(("", Number::PerAllele)));
        assert_eq!(number("R"), Ok(("", Number::PerAlleleWithRef)));
        assert_eq!(number("G"), Ok(("", Number::PerGenotype)));
        assert_eq!(number("."), Ok(("", Number::Variable)));
        assert_eq!(number("-1"), Ok(("", Number::Unbounded)));
        assert!(number("X").is_err());
    }

    #[test]
    fn test_keys_and_values() {
        let (rest, kv) =
            keys_and_values(r#"ID=DP,Number=1,Type=Integer,Description="Depth, \"raw\"""#).unwrap();
        assert!(rest.is_empty());
        assert_eq!(
            kv,
            vec![
                ("ID", "DP"),
                ("Number", "1"),
                ("Type", "Integer"),
                ("Description", r#"Depth, \"raw\""#)
            ]
        );
    }

    #[test]
    fn test_meta_line() {
        let (_, meta) = meta_line("##fileformat=VCFv4.2").unwrap();
        assert_eq!(
            meta,
            MetaLine::Plain {
                key: "fileformat",
                value: "VCFv4.2"
            }
        );
        let (_, meta) = meta_line(r#"##FILTER=<ID=q10,Description="Quality below 10">"#).unwrap();
        assert_eq!(
            meta,
            MetaLine::Structured {
                key: "FILTER",
                fields: vec![("ID", "q10"), ("Description", "Quality below 10")]
            }
        );
        assert!(meta_line("#CHROM").is_err());
    }

    #[test]
    fn test_tokenizer_offsets() {
        let tokens = Tokenizer::new("1\t100\t\tA", '\t').collect_vec();
        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens[1], Token { text: "100", begin: 2, end: 5 });
        assert_eq!(tokens[2], Token { text: "", begin: 6, end: 6 });
        assert_eq!(tokens[3], Token { text: "A", begin: 7, end: 8 });

        let sub = tokens[1].split('0').collect_vec();
        assert_eq!(sub[0], Token { text: "1", begin: 2, end: 3 });
    }

    #[test]
    fn test_split_once() {
        let token = Token { text: "AF=0.5,0.25", begin: 10, end: 21 };
        let (key, value) = token.split_once('=');
        assert_eq!(key.text, "AF");
        let value = value.unwrap();
        assert_eq!(value.text, "0.5,0.25");
        assert_eq!(value.begin, 13);

        let (key, value) = Token { text: "DB", begin: 0, end: 2 }.split_once('=');
        assert_eq!(key.text, "DB");
        assert!(value.is_none());
    }
}
