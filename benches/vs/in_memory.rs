use rust_vcfmerge::{SortBuffer, VcfRecords};
use std::path::Path;

pub fn parse<P: AsRef<Path>>(path: P) {
    let records = VcfRecords::from_path(path).unwrap();
    records.for_each(|record| {
        record.unwrap().pos();
    });
}

pub fn sort<P: AsRef<Path>>(path: P) {
    let records = VcfRecords::from_path(path).unwrap();
    let mut buffer = SortBuffer::new(records.header().clone());
    records.for_each(|record| buffer.push(record.unwrap()));
    buffer.sort(true);
    buffer.for_each(|record| {
        record.unwrap();
    });
}
