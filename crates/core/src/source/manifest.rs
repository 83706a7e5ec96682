//! Offline listings exported from a cloud drive or a mailbox.
//!
//! Drive manifest:
//!
//! ```json
//! {
//!   "account": "office@example.com",
//!   "quota": { "used_bytes": 1200, "limit_bytes": 2000 },
//!   "items": [
//!     { "id": "f1", "name": "Clients", "mime_type": "application/vnd.google-apps.folder" },
//!     { "id": "d1", "name": "Engagement.pdf", "mime_type": "application/pdf",
//!       "size": 52000, "parents": ["f1"], "shared": true, "md5_checksum": "9e10..." }
//!   ]
//! }
//! ```
//!
//! Mailbox manifest:
//!
//! ```json
//! {
//!   "account": "office@example.com",
//!   "folders": [ { "id": "l1", "name": "Clients/Smith" } ],
//!   "messages": [
//!     { "id": "m1", "thread_id": "t1", "subject": "Re: hearing", "sender": "a@b.com",
//!       "date": "2024-05-01T09:00:00Z", "folder": "Clients/Smith", "size_bytes": 5120 }
//!   ]
//! }
//! ```

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{EntrySource, FolderRecord, ListedItem, Listing, RecordLocation, SourceRecord};
use crate::dedupe::{ContentAccess, ContentProvider};
use crate::error::{EntryReadError, SourceUnavailableError};
use crate::model::{Entry, QuotaUsage, SourceKind, MESSAGE_CONTENT_TYPE};

pub const DRIVE_FOLDER_TYPE: &str = "application/vnd.google-apps.folder";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DriveManifest {
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub quota: Option<QuotaUsage>,
    #[serde(default)]
    pub items: Vec<DriveItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DriveItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    /// Absent for provider-native documents.
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default)]
    pub created_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub modified_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub shared: bool,
    #[serde(default)]
    pub md5_checksum: Option<String>,
}

impl DriveItem {
    fn is_folder(&self) -> bool {
        self.mime_type.as_deref() == Some(DRIVE_FOLDER_TYPE)
    }

    fn parent(&self) -> RecordLocation {
        RecordLocation::Parent(self.parents.first().cloned())
    }

    fn to_listed(&self) -> Result<ListedItem, EntryReadError> {
        if self.id.trim().is_empty() {
            return Err(EntryReadError::Malformed {
                id: self.name.clone(),
                reason: "drive item has no id".to_string(),
            });
        }
        if self.is_folder() {
            return Ok(ListedItem::Folder(FolderRecord {
                id: self.id.clone(),
                name: self.name.clone(),
                location: self.parent(),
            }));
        }

        let mut record = SourceRecord::new(&self.id, &self.name, self.size.unwrap_or(0));
        record.content_type = self.mime_type.clone();
        record.created = self.created_time;
        record.modified = self.modified_time;
        record.location = self.parent();
        record.shared_externally = self.shared;
        record.checksum = self.md5_checksum.clone();
        Ok(ListedItem::Entry(record))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct MailboxManifest {
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub folders: Vec<MailFolder>,
    #[serde(default)]
    pub messages: Vec<MailMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct MailFolder {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct MailMessage {
    pub id: String,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    /// Folder path the message is filed under; absent means the top level.
    #[serde(default)]
    pub folder: Option<String>,
    #[serde(default)]
    pub size_bytes: u64,
}

impl MailMessage {
    fn to_listed(&self) -> Result<ListedItem, EntryReadError> {
        if self.id.trim().is_empty() {
            return Err(EntryReadError::Malformed {
                id: self.subject.clone(),
                reason: "message has no id".to_string(),
            });
        }
        let subject = if self.subject.trim().is_empty() {
            "(no subject)".to_string()
        } else {
            self.subject.trim().to_string()
        };

        let mut record = SourceRecord::new(&self.id, subject, self.size_bytes);
        record.content_type = Some(MESSAGE_CONTENT_TYPE.to_string());
        record.created = self.date;
        record.modified = self.date;
        record.location = RecordLocation::Path(self.folder.clone().unwrap_or_default());
        record.sender = self.sender.clone();
        record.thread_id = self.thread_id.clone();
        Ok(ListedItem::Entry(record))
    }
}

/// A manifest read from disk on first use, or handed over already parsed.
struct ManifestCell<M> {
    path: Option<PathBuf>,
    loaded: OnceCell<M>,
}

impl<M: DeserializeOwned> ManifestCell<M> {
    fn from_path(path: PathBuf) -> Self {
        Self {
            path: Some(path),
            loaded: OnceCell::new(),
        }
    }

    fn from_value(manifest: M) -> Self {
        Self {
            path: None,
            loaded: OnceCell::with_value(manifest),
        }
    }

    fn get(&self) -> Option<&M> {
        self.loaded.get()
    }

    fn load(&self, source_id: &str) -> Result<&M, SourceUnavailableError> {
        self.loaded.get_or_try_init(|| match &self.path {
            Some(path) => read_manifest(source_id, path),
            None => Err(SourceUnavailableError::NotFound {
                source_id: source_id.to_string(),
                detail: "no manifest configured".to_string(),
            }),
        })
    }
}

fn read_manifest<M: DeserializeOwned>(
    source_id: &str,
    path: &Path,
) -> Result<M, SourceUnavailableError> {
    debug!(source = source_id, path = %path.display(), "loading manifest");
    let raw = fs::read_to_string(path).map_err(|err| {
        let detail = format!("{}: {err}", path.display());
        match err.kind() {
            ErrorKind::NotFound => SourceUnavailableError::NotFound {
                source_id: source_id.to_string(),
                detail,
            },
            ErrorKind::PermissionDenied => SourceUnavailableError::Unauthorized {
                source_id: source_id.to_string(),
                detail,
            },
            _ => SourceUnavailableError::Unreachable {
                source_id: source_id.to_string(),
                detail,
            },
        }
    })?;
    serde_json::from_str(&raw).map_err(|err| SourceUnavailableError::Invalid {
        source_id: source_id.to_string(),
        detail: format!("{}: {err}", path.display()),
    })
}

pub struct DriveManifestSource {
    id: String,
    manifest: ManifestCell<DriveManifest>,
}

impl DriveManifestSource {
    pub fn from_path(id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            manifest: ManifestCell::from_path(path.into()),
        }
    }

    pub fn from_manifest(id: impl Into<String>, manifest: DriveManifest) -> Self {
        Self {
            id: id.into(),
            manifest: ManifestCell::from_value(manifest),
        }
    }
}

impl ContentProvider for DriveManifestSource {
    fn open_content(&self, _entry: &Entry) -> Result<ContentAccess<'_>, EntryReadError> {
        Ok(ContentAccess::MetadataOnly)
    }
}

impl EntrySource for DriveManifestSource {
    fn source_id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> SourceKind {
        SourceKind::CloudDrive
    }

    fn open(&self, _max_entries: usize) -> Result<Listing<'_>, SourceUnavailableError> {
        let manifest = self.manifest.load(&self.id)?;
        let declared = manifest.items.iter().filter(|item| !item.is_folder()).count();
        Ok(Listing {
            declared_total: Some(declared as u64),
            items: Box::new(manifest.items.iter().map(DriveItem::to_listed)),
        })
    }

    fn quota(&self) -> Option<QuotaUsage> {
        self.manifest.get().and_then(|manifest| manifest.quota)
    }
}

pub struct MailboxManifestSource {
    id: String,
    manifest: ManifestCell<MailboxManifest>,
}

impl MailboxManifestSource {
    pub fn from_path(id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            manifest: ManifestCell::from_path(path.into()),
        }
    }

    pub fn from_manifest(id: impl Into<String>, manifest: MailboxManifest) -> Self {
        Self {
            id: id.into(),
            manifest: ManifestCell::from_value(manifest),
        }
    }
}

impl ContentProvider for MailboxManifestSource {
    fn open_content(&self, _entry: &Entry) -> Result<ContentAccess<'_>, EntryReadError> {
        Ok(ContentAccess::MetadataOnly)
    }
}

impl EntrySource for MailboxManifestSource {
    fn source_id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Mailbox
    }

    fn open(&self, _max_entries: usize) -> Result<Listing<'_>, SourceUnavailableError> {
        let manifest = self.manifest.load(&self.id)?;
        let folders = manifest.folders.iter().map(|folder| {
            Ok(ListedItem::Folder(FolderRecord {
                id: folder.id.clone(),
                name: folder.name.clone(),
                location: RecordLocation::Path(String::new()),
            }))
        });
        let messages = manifest.messages.iter().map(MailMessage::to_listed);
        Ok(Listing {
            declared_total: Some(manifest.messages.len() as u64),
            items: Box::new(folders.chain(messages)),
        })
    }
}
