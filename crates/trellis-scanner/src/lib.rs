//! Trellis Scanner — repository walk, language classification, and
//! manifest diffing
//!
//! The scanner is the engine's only filesystem-facing component: it walks a
//! repository tree (gitignore-aware), classifies files by language, and
//! fingerprints content. Everything downstream consumes the resulting
//! `FileManifest` and never touches the filesystem itself.

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use trellis_core::Language;

/// One file in the manifest: path (relative to the scanned root), detected
/// language, content fingerprint, and the content itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub path: PathBuf,
    pub language: Language,
    pub fingerprint: String,
    pub content: Vec<u8>,
}

impl ManifestEntry {
    pub fn new(path: impl Into<PathBuf>, content: Vec<u8>) -> Self {
        let path = path.into();
        ManifestEntry {
            language: Language::from_path(&path),
            fingerprint: fingerprint(&content),
            path,
            content,
        }
    }
}

/// A stable, ordered view of a repository's files at one point in time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileManifest {
    pub root: PathBuf,
    pub entries: BTreeMap<PathBuf, ManifestEntry>,
}

impl FileManifest {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FileManifest {
            root: root.into(),
            entries: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, entry: ManifestEntry) {
        self.entries.insert(entry.path.clone(), entry);
    }

    pub fn get(&self, path: &Path) -> Option<&ManifestEntry> {
        self.entries.get(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Classify what changed between this manifest and a newer one.
    /// Fingerprint comparison is authoritative; a touched-but-identical file
    /// does not count as modified.
    pub fn diff(&self, newer: &FileManifest) -> ManifestDelta {
        let mut delta = ManifestDelta::default();
        for (path, entry) in &newer.entries {
            match self.entries.get(path) {
                None => delta.created.push(path.clone()),
                Some(old) if old.fingerprint != entry.fingerprint => {
                    delta.modified.push(path.clone());
                }
                Some(_) => {}
            }
        }
        for path in self.entries.keys() {
            if !newer.entries.contains_key(path) {
                delta.deleted.push(path.clone());
            }
        }
        delta
    }
}

/// Changed paths between two manifests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestDelta {
    pub created: Vec<PathBuf>,
    pub modified: Vec<PathBuf>,
    pub deleted: Vec<PathBuf>,
}

impl ManifestDelta {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }

    /// Every path that needs attention, in one list.
    pub fn touched(&self) -> Vec<PathBuf> {
        let mut all = Vec::with_capacity(self.created.len() + self.modified.len() + self.deleted.len());
        all.extend(self.created.iter().cloned());
        all.extend(self.modified.iter().cloned());
        all.extend(self.deleted.iter().cloned());
        all
    }
}

/// SHA-256 content fingerprint, hex-encoded.
pub fn fingerprint(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// What to include in a scan.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Include globs; empty means everything.
    pub include: Vec<String>,
    /// Exclude globs, applied after includes.
    pub exclude: Vec<String>,
}

fn build_globset(patterns: &[String]) -> anyhow::Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(Some(builder.build()?))
}

/// Walk a repository tree and produce its manifest. Respects .gitignore and
/// hidden-file conventions the way the `ignore` crate does.
pub fn scan(root: &Path, options: &ScanOptions) -> anyhow::Result<FileManifest> {
    let include = build_globset(&options.include)?;
    let exclude = build_globset(&options.exclude)?;

    let mut manifest = FileManifest::new(root);
    for result in ignore::WalkBuilder::new(root).build() {
        let dent = match result {
            Ok(dent) => dent,
            Err(err) => {
                tracing::warn!(error = %err, "skipping unreadable directory entry");
                continue;
            }
        };
        if !dent.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let relative = dent.path().strip_prefix(root).unwrap_or(dent.path());
        if let Some(include) = &include {
            if !include.is_match(relative) {
                continue;
            }
        }
        if let Some(exclude) = &exclude {
            if exclude.is_match(relative) {
                continue;
            }
        }
        match std::fs::read(dent.path()) {
            Ok(content) => {
                manifest.insert(ManifestEntry::new(relative, content));
            }
            Err(err) => {
                tracing::warn!(file = %dent.path().display(), error = %err, "unreadable file skipped");
            }
        }
    }
    tracing::debug!(root = %root.display(), files = manifest.len(), "scan complete");
    Ok(manifest)
}
