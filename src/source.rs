//! # Byte Sources
//!
//! The engine never touches files or bundled assets directly. It asks a
//! [`ByteSource`] for a reader over one port's bytes, so data can come from a
//! directory of `.tdat` files, memory, or anything else that can hand out a
//! [`Read`].

use crate::error::{Result, TideError};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Supplies the raw bytes for each port.
pub trait ByteSource: Send + Sync {
    /// Open a reader over `port`'s data file.
    ///
    /// Returns [`TideError::PortNotFound`] if the source has no such port.
    fn open(&self, port: &str) -> Result<Box<dyn Read + Send>>;

    /// Names of every port this source can open, sorted.
    fn ports(&self) -> Result<Vec<String>>;
}

/// A directory of `<port>.<extension>` files.
#[derive(Debug, Clone)]
pub struct DirSource {
    dir: PathBuf,
    extension: String,
}

impl DirSource {
    /// Directory source using the standard `tdat` extension.
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self::with_extension(dir, "tdat")
    }

    pub fn with_extension<P: AsRef<Path>>(dir: P, extension: &str) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, port: &str) -> PathBuf {
        self.dir.join(format!("{port}.{}", self.extension))
    }
}

impl ByteSource for DirSource {
    fn open(&self, port: &str) -> Result<Box<dyn Read + Send>> {
        // Port names map straight to file names, so refuse anything path-like
        if port.is_empty() || port.contains(['/', '\\']) || port == ".." {
            return Err(TideError::PortNotFound(port.to_string()));
        }

        match File::open(self.path_for(port)) {
            Ok(file) => Ok(Box::new(file)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(TideError::PortNotFound(port.to_string()))
            }
            Err(e) => Err(TideError::Io(e)),
        }
    }

    fn ports(&self) -> Result<Vec<String>> {
        let mut ports = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let matches_ext = path
                .extension()
                .is_some_and(|ext| ext == self.extension.as_str());
            if !matches_ext {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ports.push(stem.to_string());
            }
        }
        ports.sort();
        Ok(ports)
    }
}

/// Port data held in memory, e.g. files compiled into the binary.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    files: HashMap<String, Arc<[u8]>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a port's bytes.
    pub fn insert(&mut self, port: &str, bytes: impl Into<Arc<[u8]>>) {
        self.files.insert(port.to_string(), bytes.into());
    }

    pub fn with_port(mut self, port: &str, bytes: impl Into<Arc<[u8]>>) -> Self {
        self.insert(port, bytes);
        self
    }
}

impl ByteSource for MemorySource {
    fn open(&self, port: &str) -> Result<Box<dyn Read + Send>> {
        let bytes = self
            .files
            .get(port)
            .ok_or_else(|| TideError::PortNotFound(port.to_string()))?;
        Ok(Box::new(Cursor::new(Arc::clone(bytes))))
    }

    fn ports(&self) -> Result<Vec<String>> {
        let mut ports: Vec<String> = self.files.keys().cloned().collect();
        ports.sort();
        Ok(ports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_dir_source_lists_and_opens_ports() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Wellington.tdat"), b"Wellington\n").unwrap();
        fs::write(dir.path().join("Auckland.tdat"), b"Auckland\n").unwrap();
        fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let source = DirSource::new(dir.path());
        assert_eq!(source.ports().unwrap(), vec!["Auckland", "Wellington"]);

        let mut contents = String::new();
        source
            .open("Wellington")
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert_eq!(contents, "Wellington\n");
    }

    #[test]
    fn test_dir_source_missing_port() {
        let dir = TempDir::new().unwrap();
        let source = DirSource::new(dir.path());
        assert!(matches!(
            source.open("Gisborne"),
            Err(TideError::PortNotFound(port)) if port == "Gisborne"
        ));
        assert!(matches!(
            source.open("../etc/passwd"),
            Err(TideError::PortNotFound(_))
        ));
    }

    #[test]
    fn test_memory_source() {
        let source = MemorySource::new()
            .with_port("Tauranga", b"Tauranga\n".to_vec())
            .with_port("Dunedin", b"Dunedin\n".to_vec());

        assert_eq!(source.ports().unwrap(), vec!["Dunedin", "Tauranga"]);

        let mut bytes = Vec::new();
        source.open("Dunedin").unwrap().read_to_end(&mut bytes).unwrap();
        assert_eq!(bytes, b"Dunedin\n");
        assert!(matches!(
            source.open("Onehunga"),
            Err(TideError::PortNotFound(_))
        ));
    }
}
