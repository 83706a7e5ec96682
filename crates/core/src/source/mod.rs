//! Listing providers. A source knows how to enumerate its records lazily,
//! how to open an entry's bytes and, optionally, how full it is.

mod filesystem;
mod manifest;
mod memory;

use chrono::{DateTime, Utc};

use crate::dedupe::ContentProvider;
use crate::error::{EntryReadError, SourceUnavailableError};
use crate::model::{QuotaUsage, SourceKind};

pub use filesystem::FilesystemSource;
pub use manifest::{
    DriveItem, DriveManifest, DriveManifestSource, MailFolder, MailMessage, MailboxManifest,
    MailboxManifestSource, DRIVE_FOLDER_TYPE,
};
pub use memory::MemorySource;

/// Where a record lives before the scanner normalizes it into a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordLocation {
    /// Already a `/`-separated path relative to the scan root.
    Path(String),
    /// Parent folder id to be resolved against the listed folders; `None` is the root.
    Parent(Option<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord {
    pub id: String,
    pub name: String,
    pub size_bytes: u64,
    pub content_type: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    pub location: RecordLocation,
    pub shared_externally: bool,
    pub checksum: Option<String>,
    pub sender: Option<String>,
    pub thread_id: Option<String>,
}

impl SourceRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            size_bytes,
            content_type: None,
            created: None,
            modified: None,
            location: RecordLocation::Path(String::new()),
            shared_externally: false,
            checksum: None,
            sender: None,
            thread_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderRecord {
    pub id: String,
    pub name: String,
    pub location: RecordLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ListedItem {
    Entry(SourceRecord),
    Folder(FolderRecord),
}

pub type ListingIter<'a> = Box<dyn Iterator<Item = Result<ListedItem, EntryReadError>> + 'a>;

pub struct Listing<'a> {
    /// Total the provider announced up front, when it knows one.
    pub declared_total: Option<u64>,
    pub items: ListingIter<'a>,
}

pub trait EntrySource: ContentProvider + Send + Sync {
    fn source_id(&self) -> &str;

    fn kind(&self) -> SourceKind;

    /// `max_entries` is a hint for providers that page; the scanner enforces the cap.
    fn open(&self, max_entries: usize) -> Result<Listing<'_>, SourceUnavailableError>;

    fn quota(&self) -> Option<QuotaUsage> {
        None
    }

    /// Problems found while setting the source up, copied into the report.
    fn warnings(&self) -> Vec<String> {
        Vec::new()
    }
}
