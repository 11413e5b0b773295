// Compressed, checksummed graph archives
use anyhow::{anyhow, Result};
use atomicwrites::{AtomicFile, OverwriteBehavior};
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use hyphae_core::{Graph, GraphStore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

use crate::document::GraphDocument;

const EXTENSION: &str = "graph.gz";

/// Archive description for listings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveDescription {
    pub name: String,
    pub creation_time: Option<String>,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

/// Stores gzip-compressed JSON graph documents under `<root>/<graph name>/`.
pub struct GraphArchive {
    root: PathBuf,
}

fn checksum(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

fn format_time(time: Option<std::time::SystemTime>) -> Option<String> {
    let secs = time?.duration_since(std::time::UNIX_EPOCH).ok()?.as_secs();
    DateTime::from_timestamp(secs as i64, 0).map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
}

impl GraphArchive {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn graph_dir(&self, graph_name: &str) -> Result<PathBuf> {
        if graph_name.is_empty() || graph_name.contains(['/', '\\']) || graph_name.starts_with('.') {
            return Err(anyhow!("invalid graph name '{}'", graph_name));
        }
        Ok(self.root.join(graph_name))
    }

    fn archive_path(&self, graph_name: &str, archive_name: &str) -> Result<PathBuf> {
        if archive_name.contains(['/', '\\']) || !archive_name.ends_with(EXTENSION) {
            return Err(anyhow!("invalid archive name '{}'", archive_name));
        }
        Ok(self.graph_dir(graph_name)?.join(archive_name))
    }

    /// Timestamped name, made unique within `dir`.
    fn generate_name(dir: &Path, graph_name: &str) -> String {
        let now: DateTime<Utc> = Utc::now();
        let stamp = now.format("%Y-%m-%d-%H-%M-%S-%3f");
        let mut name = format!("{graph_name}-{stamp}.{EXTENSION}");
        let mut n = 1;
        while dir.join(&name).exists() {
            name = format!("{graph_name}-{stamp}-{n}.{EXTENSION}");
            n += 1;
        }
        name
    }

    /// Saves `graph` as a new archive.
    pub fn save(&self, graph_name: &str, graph: &Graph) -> Result<ArchiveDescription> {
        let dir = self.graph_dir(graph_name)?;
        fs::create_dir_all(&dir)?;

        let json = serde_json::to_vec(&GraphDocument::from_graph(graph))?;
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&json)?;
        let bytes = encoder.finish()?;
        let digest = checksum(&bytes);

        let name = Self::generate_name(&dir, graph_name);
        let path = dir.join(&name);
        AtomicFile::new(&path, OverwriteBehavior::DisallowOverwrite).write(|f| f.write_all(&bytes))?;

        tracing::info!(
            graph = graph_name,
            archive = %name,
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            bytes = bytes.len(),
            "graph archived"
        );
        Ok(ArchiveDescription {
            name,
            creation_time: format_time(fs::metadata(&path).and_then(|m| m.modified()).ok()),
            size: bytes.len() as u64,
            checksum: Some(digest),
        })
    }

    /// Archives a snapshot of the committed state in `store`.
    pub fn save_store(&self, graph_name: &str, store: &GraphStore) -> Result<ArchiveDescription> {
        self.save(graph_name, &store.snapshot())
    }

    /// Archives of one graph, newest first.
    pub fn list(&self, graph_name: &str) -> Result<Vec<ArchiveDescription>> {
        let dir = self.graph_dir(graph_name)?;
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut archives = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !name.ends_with(EXTENSION) {
                continue;
            }
            let metadata = fs::metadata(&path)?;
            let bytes = fs::read(&path)?;
            archives.push(ArchiveDescription {
                name: name.to_string(),
                creation_time: format_time(metadata.modified().ok()),
                size: metadata.len(),
                checksum: Some(checksum(&bytes)),
            });
        }

        // names embed the timestamp
        archives.sort_by(|a, b| b.name.cmp(&a.name));
        Ok(archives)
    }

    /// Archives of every graph, newest first.
    pub fn list_all(&self) -> Result<Vec<ArchiveDescription>> {
        let mut all = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.path().is_dir() {
                if let Some(graph_name) = entry.file_name().to_str() {
                    all.extend(self.list(graph_name)?);
                }
            }
        }
        all.sort_by(|a, b| b.name.cmp(&a.name));
        Ok(all)
    }

    pub fn load(&self, graph_name: &str, archive_name: &str) -> Result<Graph> {
        let path = self.existing(graph_name, archive_name)?;
        Self::decode(BufReader::new(File::open(&path)?))
    }

    /// Loads only if the archive's SHA-256 matches `expected`.
    pub fn load_verified(&self, graph_name: &str, archive_name: &str, expected: &str) -> Result<Graph> {
        let path = self.existing(graph_name, archive_name)?;
        let bytes = fs::read(&path)?;
        let actual = checksum(&bytes);
        if !actual.eq_ignore_ascii_case(expected) {
            tracing::warn!(archive = archive_name, %expected, %actual, "archive checksum mismatch");
            return Err(anyhow!("Checksum mismatch: expected {}, got {}", expected, actual));
        }
        Self::decode(bytes.as_slice())
    }

    /// Loads an archive from an arbitrary path.
    pub fn load_from_path(path: &Path) -> Result<Graph> {
        Self::decode(BufReader::new(File::open(path)?))
    }

    fn existing(&self, graph_name: &str, archive_name: &str) -> Result<PathBuf> {
        let path = self.archive_path(graph_name, archive_name)?;
        if !path.exists() {
            return Err(anyhow!("Archive '{}' not found for graph '{}'", archive_name, graph_name));
        }
        Ok(path)
    }

    fn decode<R: Read>(reader: R) -> Result<Graph> {
        let mut json = Vec::new();
        GzDecoder::new(reader).read_to_end(&mut json)?;
        let document: GraphDocument = serde_json::from_slice(&json)?;
        document.into_graph()
    }

    pub fn delete(&self, graph_name: &str, archive_name: &str) -> Result<bool> {
        let path = self.archive_path(graph_name, archive_name)?;
        if path.exists() {
            fs::remove_file(&path)?;
            tracing::info!(graph = graph_name, archive = archive_name, "archive deleted");
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub fn path(&self, graph_name: &str, archive_name: &str) -> Option<PathBuf> {
        self.archive_path(graph_name, archive_name).ok().filter(|p| p.exists())
    }
}
