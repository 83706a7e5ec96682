use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufReader, ErrorKind};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use super::{EntrySource, FolderRecord, ListedItem, Listing, RecordLocation, SourceRecord};
use crate::config::FilesystemConfig;
use crate::dedupe::{ContentAccess, ContentProvider};
use crate::error::{EntryReadError, SourceUnavailableError};
use crate::model::{Entry, SourceKind};

/// Walks a local directory tree. Entry ids are `/`-separated paths relative to the root.
pub struct FilesystemSource {
    id: String,
    root: PathBuf,
    excluded_dirs: HashSet<String>,
    excluded_extensions: HashSet<String>,
    skip_hidden: bool,
    max_depth: Option<usize>,
    excludes: ExcludeMatcher,
    setup_warnings: Vec<String>,
}

impl FilesystemSource {
    pub fn new(root: impl Into<PathBuf>, config: &FilesystemConfig) -> Self {
        let root = root.into();
        let mut setup_warnings = Vec::new();
        let excludes = ExcludeMatcher::new(&config.excludes, &mut setup_warnings);
        Self {
            id: root.to_string_lossy().to_string(),
            root,
            excluded_dirs: config.excluded_dirs.iter().cloned().collect(),
            excluded_extensions: config
                .excluded_extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
            skip_hidden: config.skip_hidden,
            max_depth: config.max_depth,
            excludes,
            setup_warnings,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn is_pruned(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 {
            return false;
        }
        let name = entry.file_name().to_string_lossy();
        if self.skip_hidden && name.starts_with('.') {
            return true;
        }
        if entry.file_type().is_dir() && self.excluded_dirs.contains(&*name) {
            return true;
        }
        self.excludes.is_excluded(entry.path())
    }

    fn has_excluded_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.excluded_extensions.contains(&ext.to_lowercase()))
    }

    fn relative(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    fn parent_location(&self, path: &Path) -> RecordLocation {
        let parent = path
            .parent()
            .map(|parent| self.relative(parent))
            .unwrap_or_default();
        RecordLocation::Path(parent)
    }

    fn list_item(&self, item: walkdir::Result<DirEntry>) -> Option<Result<ListedItem, EntryReadError>> {
        let entry = match item {
            Ok(entry) => entry,
            Err(err) => {
                let path = err
                    .path()
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| self.root.display().to_string());
                return Some(Err(EntryReadError::Walk {
                    path,
                    detail: err.to_string(),
                }));
            }
        };
        if entry.depth() == 0 {
            return None;
        }

        let path = entry.path();
        if entry.file_type().is_dir() {
            return Some(Ok(ListedItem::Folder(FolderRecord {
                id: self.relative(path),
                name: entry.file_name().to_string_lossy().to_string(),
                location: self.parent_location(path),
            })));
        }
        if !entry.file_type().is_file() || self.has_excluded_extension(path) {
            return None;
        }

        let id = self.relative(path);
        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(err) => {
                return Some(Err(EntryReadError::Walk {
                    path: id,
                    detail: err.to_string(),
                }))
            }
        };

        let mut record = SourceRecord::new(
            id,
            entry.file_name().to_string_lossy().to_string(),
            metadata.len(),
        );
        record.created = metadata.created().ok().map(DateTime::<Utc>::from);
        record.modified = metadata.modified().ok().map(DateTime::<Utc>::from);
        record.location = self.parent_location(path);
        Some(Ok(ListedItem::Entry(record)))
    }
}

impl ContentProvider for FilesystemSource {
    fn open_content(&self, entry: &Entry) -> Result<ContentAccess<'_>, EntryReadError> {
        let path = self.root.join(&entry.id);
        let file = File::open(&path).map_err(|source| EntryReadError::Io {
            id: entry.id.clone(),
            source,
        })?;
        Ok(ContentAccess::Stream(Box::new(BufReader::new(file))))
    }
}

impl EntrySource for FilesystemSource {
    fn source_id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Filesystem
    }

    fn open(&self, _max_entries: usize) -> Result<Listing<'_>, SourceUnavailableError> {
        let metadata = fs::metadata(&self.root).map_err(|err| {
            let detail = format!("{}: {err}", self.root.display());
            match err.kind() {
                ErrorKind::NotFound => SourceUnavailableError::NotFound {
                    source_id: self.id.clone(),
                    detail,
                },
                ErrorKind::PermissionDenied => SourceUnavailableError::Unauthorized {
                    source_id: self.id.clone(),
                    detail,
                },
                _ => SourceUnavailableError::Unreachable {
                    source_id: self.id.clone(),
                    detail,
                },
            }
        })?;
        if !metadata.is_dir() {
            return Err(SourceUnavailableError::NotFound {
                source_id: self.id.clone(),
                detail: format!("{} is not a directory", self.root.display()),
            });
        }

        debug!(root = %self.root.display(), "walking filesystem source");
        let mut walker = WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name();
        if let Some(depth) = self.max_depth {
            walker = walker.max_depth(depth);
        }
        let items = walker
            .into_iter()
            .filter_entry(move |entry| !self.is_pruned(entry))
            .filter_map(move |item| self.list_item(item));

        Ok(Listing {
            declared_total: None,
            items: Box::new(items),
        })
    }

    fn warnings(&self) -> Vec<String> {
        self.setup_warnings.clone()
    }
}

/// Glob patterns plus a lower-cased substring fallback for plain words and
/// globs that fail to compile.
struct ExcludeMatcher {
    globset: Option<GlobSet>,
    substrings: Vec<String>,
}

impl ExcludeMatcher {
    fn new(patterns: &[String], warnings: &mut Vec<String>) -> Self {
        let mut builder = GlobSetBuilder::new();
        let mut substrings = Vec::new();
        let mut globs = 0_usize;
        for pattern in patterns {
            let pattern = pattern.trim();
            if pattern.is_empty() {
                continue;
            }
            if is_plain_substring_pattern(pattern) {
                substrings.push(pattern.to_lowercase());
                continue;
            }
            match Glob::new(pattern) {
                Ok(glob) => {
                    builder.add(glob);
                    globs += 1;
                }
                Err(err) => {
                    warnings.push(format!(
                        "invalid exclude glob '{pattern}': {err}; using substring fallback."
                    ));
                    substrings.push(pattern.to_lowercase());
                }
            }
        }

        let globset = if globs == 0 {
            None
        } else {
            match builder.build() {
                Ok(set) => Some(set),
                Err(err) => {
                    warnings.push(format!(
                        "failed to compile exclude glob set: {err}; glob excludes disabled."
                    ));
                    None
                }
            }
        };

        Self {
            globset,
            substrings,
        }
    }

    fn is_excluded(&self, path: &Path) -> bool {
        if self
            .globset
            .as_ref()
            .is_some_and(|globset| globset.is_match(path))
        {
            return true;
        }
        if self.substrings.is_empty() {
            return false;
        }
        let lowered = path.to_string_lossy().to_lowercase();
        self.substrings
            .iter()
            .any(|pattern| lowered.contains(pattern))
    }
}

fn is_plain_substring_pattern(pattern: &str) -> bool {
    !pattern
        .chars()
        .any(|ch| matches!(ch, '*' | '?' | '[' | ']' | '{' | '}'))
}
