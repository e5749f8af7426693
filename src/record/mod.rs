//! Persisted per-keyword record of already-downloaded source URLs.
//!
//! One pretty-printed JSON document per `(provider, keyword)` lives at
//! `<records_dir>/<provider>_<keyword>_downloads.json`:
//!
//! ```json
//! {
//!   "https://img.example.com/a.jpg": {
//!     "filename": "1718000000_0a1b2c3d.jpg",
//!     "download_time": "2024-06-10 08:13:20"
//!   }
//! }
//! ```
//!
//! Every write replaces the whole document through a temp file and a rename,
//! so readers see either the previous or the new mapping, never a torn one.
//! The file is owned by one pipeline at a time; nothing here locks it.

mod error;

pub use error::RecordStoreError;

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, warn};

use crate::download::sanitize_path_component;
use crate::provider::Provider;

/// Timestamp layout of the `download_time` field.
pub const DOWNLOAD_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One remembered download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRecord {
    /// Candidate URL the image was fetched from.
    pub source_url: String,
    /// File name under the keyword's download directory.
    pub saved_filename: String,
    /// Local time of the download.
    pub downloaded_at: NaiveDateTime,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredRecord {
    filename: String,
    #[serde(with = "download_time")]
    download_time: NaiveDateTime,
}

mod download_time {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::DOWNLOAD_TIME_FORMAT;

    pub(super) fn serialize<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&value.format(DOWNLOAD_TIME_FORMAT))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, DOWNLOAD_TIME_FORMAT).map_err(serde::de::Error::custom)
    }
}

/// Locates and opens per-keyword record files under one directory.
#[derive(Debug, Clone)]
pub struct DownloadRecordStore {
    records_dir: PathBuf,
}

impl DownloadRecordStore {
    #[must_use]
    pub fn new(records_dir: impl Into<PathBuf>) -> Self {
        Self {
            records_dir: records_dir.into(),
        }
    }

    #[must_use]
    pub fn records_dir(&self) -> &Path {
        &self.records_dir
    }

    /// Path of the record file for `(provider, keyword)`.
    #[must_use]
    pub fn path_for(&self, provider: Provider, keyword: &str) -> PathBuf {
        self.records_dir.join(format!(
            "{}_{}_downloads.json",
            provider.as_str(),
            sanitize_path_component(keyword)
        ))
    }

    /// Loads the mapping for `(provider, keyword)`; a missing file is an empty mapping.
    ///
    /// # Errors
    ///
    /// Returns [`RecordStoreError::Read`] or [`RecordStoreError::Corrupt`] when
    /// the file exists but cannot be used.
    #[instrument(skip(self), fields(provider = %provider))]
    pub async fn load(&self, provider: Provider, keyword: &str) -> Result<KeywordRecords, RecordStoreError> {
        let path = self.path_for(provider, keyword);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no record file yet");
                return Ok(KeywordRecords::empty(path));
            }
            Err(e) => return Err(RecordStoreError::read(path, e)),
        };

        let stored: BTreeMap<String, StoredRecord> =
            serde_json::from_slice(&raw).map_err(|e| RecordStoreError::corrupt(path.clone(), e))?;
        let entries = stored
            .into_iter()
            .map(|(url, record)| {
                let entry = DownloadRecord {
                    source_url: url.clone(),
                    saved_filename: record.filename,
                    downloaded_at: record.download_time,
                };
                (url, entry)
            })
            .collect::<BTreeMap<_, _>>();
        debug!(path = %path.display(), count = entries.len(), "records loaded");

        Ok(KeywordRecords { path, entries })
    }

    /// Loads the mapping, degrading to an empty one when the file is unusable.
    ///
    /// The error, if any, is returned alongside so callers can surface it. The
    /// unusable file is left in place until the next successful write replaces it.
    pub async fn load_or_default(
        &self,
        provider: Provider,
        keyword: &str,
    ) -> (KeywordRecords, Option<RecordStoreError>) {
        match self.load(provider, keyword).await {
            Ok(records) => (records, None),
            Err(error) => {
                warn!(
                    %provider,
                    keyword,
                    error = %error,
                    "record file unusable, starting from an empty record"
                );
                (KeywordRecords::empty(self.path_for(provider, keyword)), Some(error))
            }
        }
    }

    /// Loads, records one URL, and persists. Convenience for one-off writes.
    ///
    /// # Errors
    ///
    /// Returns any load or write error; nothing is written after a load error.
    pub async fn record(
        &self,
        provider: Provider,
        keyword: &str,
        source_url: &str,
        filename: &str,
    ) -> Result<DownloadRecord, RecordStoreError> {
        let mut records = self.load(provider, keyword).await?;
        records.record(source_url, filename).await.cloned()
    }
}

/// In-memory view of one keyword's record file, written through on every change.
#[derive(Debug, Clone)]
pub struct KeywordRecords {
    path: PathBuf,
    entries: BTreeMap<String, DownloadRecord>,
}

impl KeywordRecords {
    fn empty(path: PathBuf) -> Self {
        Self {
            path,
            entries: BTreeMap::new(),
        }
    }

    /// Backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn contains(&self, source_url: &str) -> bool {
        self.entries.contains_key(source_url)
    }

    #[must_use]
    pub fn get(&self, source_url: &str) -> Option<&DownloadRecord> {
        self.entries.get(source_url)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DownloadRecord> {
        self.entries.values()
    }

    /// Records `source_url` as saved under `filename` and persists the mapping.
    ///
    /// Records are append-only: an already-present URL keeps its original entry
    /// and nothing is written. When persisting fails the entry stays in memory,
    /// so the current run still will not fetch the URL again, while the file on
    /// disk keeps its previous content.
    ///
    /// # Errors
    ///
    /// Returns [`RecordStoreError::Encode`] or [`RecordStoreError::Write`].
    pub async fn record(&mut self, source_url: &str, filename: &str) -> Result<&DownloadRecord, RecordStoreError> {
        if !self.entries.contains_key(source_url) {
            let entry = DownloadRecord {
                source_url: source_url.to_string(),
                saved_filename: filename.to_string(),
                downloaded_at: Local::now().naive_local(),
            };
            self.entries.insert(source_url.to_string(), entry);
            self.persist().await?;
        }

        self.entries
            .get(source_url)
            .ok_or_else(|| RecordStoreError::write(self.path.clone(), ErrorKind::NotFound.into()))
    }

    async fn persist(&self) -> Result<(), RecordStoreError> {
        let stored = self
            .entries
            .iter()
            .map(|(url, record)| {
                let stored = StoredRecord {
                    filename: record.saved_filename.clone(),
                    download_time: record.downloaded_at,
                };
                (url.as_str(), stored)
            })
            .collect::<BTreeMap<_, _>>();
        let json =
            serde_json::to_vec_pretty(&stored).map_err(|e| RecordStoreError::encode(self.path.clone(), e))?;

        write_atomic(&self.path, &json)
            .await
            .map_err(|e| RecordStoreError::write(self.path.clone(), e))?;
        debug!(path = %self.path.display(), count = self.entries.len(), "records persisted");
        Ok(())
    }
}

/// Writes `contents` to a sibling temp file, syncs it, then renames over `path`.
async fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let tmp_path = temp_path_for(path);
    let mut file = tokio::fs::File::create(&tmp_path).await?;
    let written = async {
        file.write_all(contents).await?;
        file.flush().await?;
        file.sync_all().await
    }
    .await;
    drop(file);

    if let Err(e) = written {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(e);
    }

    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(e);
    }
    Ok(())
}

pub(crate) fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(std::ffi::OsStr::to_os_string).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
