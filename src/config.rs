use std::fmt;
use std::path::PathBuf;

use getset::{CopyGetters, Getters};

use crate::reader::LineRecord;
use crate::sort::{CompressionMode, SortBuffer};

/// Name and build of the running program, written into output headers.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
#[getset(get = "pub")]
pub struct ProgramInfo {
    name: String,
    version: String,
    commit: Option<String>,
}

impl ProgramInfo {
    pub fn new(name: &str, version: &str, commit: Option<&str>) -> Self {
        ProgramInfo {
            name: name.to_owned(),
            version: version.to_owned(),
            commit: commit.map(str::to_owned),
        }
    }

    /// Version of this crate; the commit is taken from `VCFMERGE_COMMIT` at build time.
    pub fn from_env(name: &str) -> Self {
        Self::new(name, env!("CARGO_PKG_VERSION"), option_env!("VCFMERGE_COMMIT"))
    }

    /// `##source=` header line naming this program.
    pub fn source_line(&self) -> String {
        format!("##source={}", self)
    }
}

impl fmt::Display for ProgramInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} version {}", self.name, self.version)?;
        if let Some(commit) = &self.commit {
            write!(f, " (commit {})", commit)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, CopyGetters, Getters)]
pub struct SortConfig {
    /// Records held per run before it is spilled.
    #[getset(get_copy = "pub")]
    max_records_in_memory: usize,
    #[getset(get_copy = "pub")]
    stable: bool,
    #[getset(get_copy = "pub")]
    compression: CompressionMode,
    /// `None` uses the system temporary directory.
    #[getset(get = "pub")]
    tmp_dir: Option<PathBuf>,
}

impl Default for SortConfig {
    fn default() -> Self {
        SortConfig {
            max_records_in_memory: 100_000,
            stable: false,
            compression: CompressionMode::None,
            tmp_dir: None,
        }
    }
}

impl SortConfig {
    #[must_use]
    pub fn with_max_records_in_memory(mut self, n: usize) -> Self {
        self.max_records_in_memory = n.max(1);
        self
    }

    #[must_use]
    pub fn with_stable(mut self, stable: bool) -> Self {
        self.stable = stable;
        self
    }

    #[must_use]
    pub fn with_compression(mut self, compression: CompressionMode) -> Self {
        self.compression = compression;
        self
    }

    #[must_use]
    pub fn with_tmp_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.tmp_dir = Some(dir.into());
        self
    }

    /// An empty run that spills into the configured directory.
    pub fn buffer<T: LineRecord>(&self, header: T::Header) -> SortBuffer<T> {
        let buffer = SortBuffer::new(header);
        match &self.tmp_dir {
            Some(dir) => buffer.tmp_dir(dir.clone()),
            None => buffer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_program_info() {
        let info = ProgramInfo::new("vcf-sort", "0.3.0", Some("1a2b3c"));
        assert_eq!(info.to_string(), "vcf-sort version 0.3.0 (commit 1a2b3c)");
        assert_eq!(
            info.source_line(),
            "##source=vcf-sort version 0.3.0 (commit 1a2b3c)"
        );
        let info = ProgramInfo::new("vcf-sort", "0.3.0", None);
        assert_eq!(info.to_string(), "vcf-sort version 0.3.0");

        let info = ProgramInfo::from_env("vcf-sort");
        assert_eq!(info.version(), env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_sort_config() {
        let config = SortConfig::default();
        assert_eq!(config.max_records_in_memory(), 100_000);
        assert!(!config.stable());
        assert_eq!(config.compression(), CompressionMode::None);
        assert!(config.tmp_dir().is_none());

        let dir = tempfile::tempdir().unwrap();
        let config = SortConfig::default()
            .with_max_records_in_memory(0)
            .with_stable(true)
            .with_compression(CompressionMode::Bzip2)
            .with_tmp_dir(dir.path());
        assert_eq!(config.max_records_in_memory(), 1);
        assert!(config.stable());
        assert_eq!(config.tmp_dir().as_deref(), Some(dir.path()));
    }
}
