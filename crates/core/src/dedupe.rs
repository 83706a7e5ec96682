use std::collections::{BTreeMap, HashMap};
use std::io::Read;

use rayon::prelude::*;
use tracing::debug;

use crate::config::{DedupeConfig, KeepPolicy};
use crate::error::EntryReadError;
use crate::model::{DuplicateGroup, Entry, FingerprintConfidence};

const HASH_BUFFER_BYTES: usize = 64 * 1024;

/// How a source exposes the bytes behind an entry.
pub enum ContentAccess<'a> {
    Stream(Box<dyn Read + 'a>),
    /// Bytes are not readable; fall back to the provider checksum or metadata.
    MetadataOnly,
}

pub trait ContentProvider: Sync {
    fn open_content(&self, entry: &Entry) -> Result<ContentAccess<'_>, EntryReadError>;
}

#[derive(Debug, Default)]
pub struct DedupeOutcome {
    pub groups: Vec<DuplicateGroup>,
    pub skipped_entries: u64,
    pub warnings: Vec<String>,
}

#[derive(Debug)]
struct Fingerprint {
    key: String,
    confidence: FingerprintConfidence,
}

pub fn find_duplicates<C>(entries: &[Entry], content: &C, config: &DedupeConfig) -> DedupeOutcome
where
    C: ContentProvider + ?Sized,
{
    let mut by_size: BTreeMap<u64, Vec<usize>> = BTreeMap::new();
    for (index, entry) in entries.iter().enumerate() {
        if entry.size_bytes <= config.min_size_bytes {
            continue;
        }
        by_size.entry(entry.size_bytes).or_default().push(index);
    }

    let mut candidates = by_size
        .into_values()
        .filter(|bucket| bucket.len() >= 2)
        .flatten()
        .collect::<Vec<_>>();
    candidates.sort_unstable();

    let fingerprint_at = |index: &usize| (*index, fingerprint(&entries[*index], content));
    let fingerprints = if config.parallel_reads {
        candidates.par_iter().map(fingerprint_at).collect::<Vec<_>>()
    } else {
        candidates.iter().map(fingerprint_at).collect::<Vec<_>>()
    };

    let mut outcome = DedupeOutcome::default();
    let mut bucket_order: Vec<String> = Vec::new();
    let mut buckets: HashMap<String, (FingerprintConfidence, Vec<usize>)> = HashMap::new();
    let mut reduced_confidence = 0_u64;

    for (index, result) in fingerprints {
        match result {
            Ok(print) => {
                if print.confidence != FingerprintConfidence::Content {
                    reduced_confidence += 1;
                }
                let slot = buckets.entry(print.key.clone()).or_insert_with(|| {
                    bucket_order.push(print.key.clone());
                    (print.confidence, Vec::new())
                });
                slot.1.push(index);
            }
            Err(err) => {
                debug!(entry = %entries[index].id, error = %err, "dedupe fingerprint skipped");
                outcome.skipped_entries += 1;
                outcome
                    .warnings
                    .push(format!("dedupe skipped {}: {err}", entries[index].id));
            }
        }
    }

    if reduced_confidence > 0 {
        outcome.warnings.push(format!(
            "{reduced_confidence} entries were fingerprinted without reading content; duplicate confidence is reduced."
        ));
    }

    for key in bucket_order {
        let Some((confidence, members)) = buckets.remove(&key) else {
            continue;
        };
        if members.len() < 2 {
            continue;
        }

        let kept = keep_index(entries, &members, config.keep_policy);
        let size_bytes = entries[members[0]].size_bytes;
        let wasted_bytes = members
            .iter()
            .filter(|index| **index != kept)
            .map(|index| entries[*index].size_bytes)
            .fold(0_u64, u64::saturating_add);

        outcome.groups.push(DuplicateGroup {
            fingerprint: key,
            size_bytes,
            members: members
                .iter()
                .map(|index| entries[*index].id.clone())
                .collect(),
            kept: entries[kept].id.clone(),
            wasted_bytes,
            confidence,
        });
    }

    outcome.groups.sort_by(|a, b| {
        b.wasted_bytes
            .cmp(&a.wasted_bytes)
            .then_with(|| a.fingerprint.cmp(&b.fingerprint))
    });
    outcome
}

fn fingerprint<C>(entry: &Entry, content: &C) -> Result<Fingerprint, EntryReadError>
where
    C: ContentProvider + ?Sized,
{
    match content.open_content(entry)? {
        ContentAccess::Stream(reader) => {
            let digest = hash_reader(reader).map_err(|source| EntryReadError::Io {
                id: entry.id.clone(),
                source,
            })?;
            Ok(Fingerprint {
                key: format!("blake3:{digest}"),
                confidence: FingerprintConfidence::Content,
            })
        }
        ContentAccess::MetadataOnly => match entry.provider_checksum.as_deref() {
            Some(checksum) if !checksum.trim().is_empty() => Ok(Fingerprint {
                key: format!("checksum:{}:{}", entry.size_bytes, checksum.trim().to_lowercase()),
                confidence: FingerprintConfidence::ProviderChecksum,
            }),
            _ => {
                let identity = format!("{}\0{}", entry.name.to_lowercase(), entry.size_bytes);
                Ok(Fingerprint {
                    key: format!("meta:{}", blake3::hash(identity.as_bytes()).to_hex()),
                    confidence: FingerprintConfidence::Metadata,
                })
            }
        },
    }
}

fn hash_reader(mut reader: Box<dyn Read + '_>) -> std::io::Result<String> {
    let mut hasher = blake3::Hasher::new();
    let mut buffer = vec![0_u8; HASH_BUFFER_BYTES];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher.finalize().to_hex().to_string())
}

/// Ties on the modification time (or missing times) fall back to scan order.
fn keep_index(entries: &[Entry], members: &[usize], policy: KeepPolicy) -> usize {
    let first = members[0];
    match policy {
        KeepPolicy::FirstSeen => first,
        KeepPolicy::OldestModified => members
            .iter()
            .copied()
            .filter(|index| entries[*index].modified.is_some())
            .min_by(|a, b| {
                entries[*a]
                    .modified
                    .cmp(&entries[*b].modified)
                    .then_with(|| a.cmp(b))
            })
            .unwrap_or(first),
        KeepPolicy::NewestModified => members
            .iter()
            .copied()
            .filter(|index| entries[*index].modified.is_some())
            .max_by(|a, b| {
                entries[*a]
                    .modified
                    .cmp(&entries[*b].modified)
                    .then_with(|| b.cmp(a))
            })
            .unwrap_or(first),
    }
}
