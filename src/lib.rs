pub mod config;
pub mod error;
pub mod header;
pub mod merge;
pub(crate) mod parser;
pub mod reader;
pub mod record;
pub mod sort;
pub mod types;

pub use error::{Error, Result};
pub use header::{Header, HeaderRef};
pub use merge::{MergeStrategy, RecordMerger};
pub use reader::VcfRecords;
pub use record::Record;
pub use sort::{CompressionMode, SortBuffer};

#[cfg(test)]
mod test {
    use itertools::Itertools;

    use super::reader::VcfRecords;
    use super::sort::{CompressionMode, SortBuffer};

    const PATH: &str = "resources/example.vcf";

    #[test]
    fn test_samples() {
        let records = VcfRecords::from_path(PATH).unwrap();
        assert_eq!(records.header().samples(), &vec!["HG001", "HG002"]);
    }

    #[test]
    fn test_sort_example() {
        let records = VcfRecords::from_path(PATH).unwrap();
        let mut buffer = SortBuffer::new(records.header().clone());
        for record in records {
            buffer.push(record.unwrap());
        }
        buffer.sort(true);
        buffer.spill_to_disk(CompressionMode::Gzip).unwrap();
        let sites = buffer
            .map(|r| {
                let r = r.unwrap();
                format!("{}:{}:{}", r.chrom(), r.pos(), r.ids().join(";"))
            })
            .collect_vec();
        assert_eq!(
            sites,
            vec![
                "chr2:300:rs2",
                "chr2:300:rs3",
                "chr2:5400:",
                "chr10:95:",
                "chr10:1200:rs10"
            ]
        );
    }

    #[test]
    fn test_example_round_trips() {
        let text = std::fs::read_to_string(PATH).unwrap();
        let records = VcfRecords::from_path(PATH).unwrap();
        let mut out = records.header().to_string();
        for record in records {
            out.push_str(&record.unwrap().to_string());
            out.push('\n');
        }
        assert_eq!(out, text);
    }
}
