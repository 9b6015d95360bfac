//! File-based raw document store

use crate::config::StorageConfig;
use crate::error::{Error, Result};
use regex::Regex;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// A JSON document found in the store directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDocument {
    /// Page number, when the file name follows the store's naming scheme
    pub page: Option<u32>,
    /// Full path of the document
    pub path: PathBuf,
}

impl StoredDocument {
    /// File name, used as the document identifier in logs
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

impl Ord for StoredDocument {
    fn cmp(&self, other: &Self) -> Ordering {
        // numbered pages first, in page order; anything else after, by name
        match (self.page, other.page) {
            (Some(a), Some(b)) => a.cmp(&b).then_with(|| self.path.cmp(&other.path)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.path.cmp(&other.path),
        }
    }
}

impl PartialOrd for StoredDocument {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Directory of raw page documents
#[derive(Clone)]
pub struct RawStore {
    dir: PathBuf,
    prefix: String,
    page_pattern: Regex,
}

impl RawStore {
    /// Create a store rooted at `dir`, naming files `{prefix}{page}.json`
    pub fn new(dir: impl AsRef<Path>, prefix: impl Into<String>) -> Result<Self> {
        let prefix = prefix.into();
        let page_pattern = Regex::new(&format!(r"^{}(\d+)\.json$", regex::escape(&prefix)))
            .map_err(|e| Error::invalid_value("storage.file_prefix", e.to_string()))?;

        Ok(Self {
            dir: dir.as_ref().to_path_buf(),
            prefix,
            page_pattern,
        })
    }

    /// Create a store from the storage section of the configuration
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        Self::new(&config.raw_dir, config.file_prefix.clone())
    }

    /// Store directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the store directory if needed
    pub async fn ensure_dir(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| Error::store(&self.dir, format!("Failed to create directory: {e}")))
    }

    /// Deterministic path of the document for `page`
    pub fn path_for(&self, page: u32) -> PathBuf {
        self.dir.join(format!("{}{page}.json", self.prefix))
    }

    /// Whether a document for `page` has been stored
    pub async fn exists(&self, page: u32) -> bool {
        tokio::fs::try_exists(self.path_for(page))
            .await
            .unwrap_or(false)
    }

    /// Persist `payload` as the document for `page`.
    ///
    /// The document is written to a temporary sibling, flushed to disk and
    /// renamed into place, so readers never see a partial file. On failure
    /// the temporary file is removed.
    pub async fn write(&self, page: u32, payload: &Value) -> Result<PathBuf> {
        let path = self.path_for(page);
        let contents = to_pretty_json(payload)?;

        let temp_path = path.with_extension("json.tmp");
        if let Err(e) = write_synced(&temp_path, &contents).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(Error::store(&temp_path, format!("Failed to write document: {e}")));
        }

        if let Err(e) = tokio::fs::rename(&temp_path, &path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(Error::store(&path, format!("Failed to rename document: {e}")));
        }

        debug!(page, path = %path.display(), bytes = contents.len(), "Stored page");
        Ok(path)
    }

    /// Every `*.json` document in the store, numbered pages first.
    /// A missing directory lists as empty.
    pub async fn list_all(&self) -> Result<Vec<StoredDocument>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(Error::store(
                    &self.dir,
                    format!("Failed to list directory: {e}"),
                ))
            }
        };

        let mut documents = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::store(&self.dir, format!("Failed to list directory: {e}")))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.ends_with(".json") {
                continue;
            }
            let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
            if !is_file {
                continue;
            }
            documents.push(StoredDocument {
                page: self.page_of(&name),
                path: entry.path(),
            });
        }

        documents.sort();
        Ok(documents)
    }

    /// Read the raw text of a stored document
    pub async fn read(&self, document: &StoredDocument) -> Result<String> {
        tokio::fs::read_to_string(&document.path)
            .await
            .map_err(|e| Error::store(&document.path, format!("Failed to read document: {e}")))
    }

    /// Page number encoded in a file name, if it follows the naming scheme
    pub fn page_of(&self, file_name: &str) -> Option<u32> {
        self.page_pattern
            .captures(file_name)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok())
    }
}

impl fmt::Debug for RawStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawStore")
            .field("dir", &self.dir)
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

/// Pretty-print with a four-space indent; non-ASCII text is kept as is
fn to_pretty_json(payload: &Value) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    payload.serialize(&mut serializer)?;
    Ok(buf)
}

async fn write_synced(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(contents).await?;
    file.sync_all().await?;
    Ok(())
}
