use std::collections::{HashMap, HashSet};
use std::io::Cursor;

use super::{EntrySource, FolderRecord, ListedItem, Listing, SourceRecord};
use crate::dedupe::{ContentAccess, ContentProvider};
use crate::error::{EntryReadError, SourceUnavailableError};
use crate::model::{Entry, QuotaUsage, SourceKind};

enum MemoryItem {
    Listed(ListedItem),
    Broken(String),
}

/// A source held entirely in memory, for embedding callers and fixtures.
pub struct MemorySource {
    id: String,
    kind: SourceKind,
    items: Vec<MemoryItem>,
    content: HashMap<String, Vec<u8>>,
    unreadable: HashSet<String>,
    quota: Option<QuotaUsage>,
    unavailable: Option<String>,
}

impl MemorySource {
    pub fn new(id: impl Into<String>, kind: SourceKind) -> Self {
        Self {
            id: id.into(),
            kind,
            items: Vec::new(),
            content: HashMap::new(),
            unreadable: HashSet::new(),
            quota: None,
            unavailable: None,
        }
    }

    pub fn with_entry(mut self, record: SourceRecord) -> Self {
        self.items.push(MemoryItem::Listed(ListedItem::Entry(record)));
        self
    }

    /// Adds an entry whose bytes can be streamed; the size follows the content.
    pub fn with_content(mut self, mut record: SourceRecord, bytes: impl Into<Vec<u8>>) -> Self {
        let bytes = bytes.into();
        record.size_bytes = bytes.len() as u64;
        self.content.insert(record.id.clone(), bytes);
        self.with_entry(record)
    }

    pub fn with_folder(mut self, folder: FolderRecord) -> Self {
        self.items.push(MemoryItem::Listed(ListedItem::Folder(folder)));
        self
    }

    /// A listing slot that fails to read.
    pub fn with_broken_record(mut self, id: impl Into<String>) -> Self {
        self.items.push(MemoryItem::Broken(id.into()));
        self
    }

    pub fn with_unreadable_content(mut self, id: impl Into<String>) -> Self {
        self.unreadable.insert(id.into());
        self
    }

    pub fn with_quota(mut self, quota: QuotaUsage) -> Self {
        self.quota = Some(quota);
        self
    }

    /// Every `open` fails with this reason.
    pub fn unavailable(mut self, reason: impl Into<String>) -> Self {
        self.unavailable = Some(reason.into());
        self
    }
}

impl ContentProvider for MemorySource {
    fn open_content(&self, entry: &Entry) -> Result<ContentAccess<'_>, EntryReadError> {
        if self.unreadable.contains(&entry.id) {
            return Err(EntryReadError::Inaccessible {
                id: entry.id.clone(),
                reason: "content is locked".to_string(),
            });
        }
        Ok(match self.content.get(&entry.id) {
            Some(bytes) => ContentAccess::Stream(Box::new(Cursor::new(bytes.as_slice()))),
            None => ContentAccess::MetadataOnly,
        })
    }
}

impl EntrySource for MemorySource {
    fn source_id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn open(&self, _max_entries: usize) -> Result<Listing<'_>, SourceUnavailableError> {
        if let Some(reason) = &self.unavailable {
            return Err(SourceUnavailableError::Unreachable {
                source_id: self.id.clone(),
                detail: reason.clone(),
            });
        }
        let declared = self
            .items
            .iter()
            .filter(|item| !matches!(item, MemoryItem::Listed(ListedItem::Folder(_))))
            .count();
        let items = self.items.iter().map(|item| match item {
            MemoryItem::Listed(listed) => Ok(listed.clone()),
            MemoryItem::Broken(id) => Err(EntryReadError::Malformed {
                id: id.clone(),
                reason: "record could not be decoded".to_string(),
            }),
        });
        Ok(Listing {
            declared_total: Some(declared as u64),
            items: Box::new(items),
        })
    }

    fn quota(&self) -> Option<QuotaUsage> {
        self.quota
    }
}
