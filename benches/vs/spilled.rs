use rust_vcfmerge::{CompressionMode, SortBuffer, VcfRecords};
use std::path::Path;

pub fn sort<P: AsRef<Path>>(path: P, compression: CompressionMode) {
    let records = VcfRecords::from_path(path).unwrap();
    let mut buffer = SortBuffer::new(records.header().clone());
    records.for_each(|record| buffer.push(record.unwrap()));
    buffer.sort(true);
    buffer.spill_to_disk(compression).unwrap();
    buffer.for_each(|record| {
        record.unwrap();
    });
}
