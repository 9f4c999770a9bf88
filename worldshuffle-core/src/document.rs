use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::allocator::ScopedAllocator;
use crate::config::{OpaqueBranches, ShuffleConfig, SkipList};
use crate::locate::locate_mut;
use crate::nbt::NbtDocument;
use crate::pool::IdentifierPool;
use crate::rewrite::{rewrite_fields, rewrite_palette};
use crate::{json, Result, ShuffleError};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize)]
pub enum DocumentKind {
    /// Worldgen/config JSON rewritten field by field.
    Text,
    /// Structure NBT rewritten through its palette.
    Binary,
}

impl DocumentKind {
    pub fn from_path(path: &Path) -> Option<DocumentKind> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "json" => Some(DocumentKind::Text),
            "nbt" => Some(DocumentKind::Binary),
            _ => None,
        }
    }
}

/// Per-file result of a successful rewrite.
#[derive(Clone, Debug, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    pub kind: DocumentKind,
    pub modified: usize,
    pub total: usize,
    pub skipped_entries: usize,
    pub palette_path: Option<String>,
    pub exhaustions: u64,
}

/// Everything a worker needs to rewrite one document: the shared pool and
/// the fixed skip and opaque-branch sets.
pub struct Shuffler {
    pool: IdentifierPool,
    skip: SkipList,
    opaque: OpaqueBranches,
    seed: u64,
}

impl Shuffler {
    pub fn new(pool: IdentifierPool, config: &ShuffleConfig, seed: u64) -> Self {
        Self {
            pool,
            skip: config.skip_list(),
            opaque: config.opaque_branches(),
            seed,
        }
    }

    pub fn pool(&self) -> &IdentifierPool {
        &self.pool
    }

    /// Per-document randomness, fixed by the run seed and the order the
    /// document was discovered in.
    fn document_rng(&self, index: usize) -> StdRng {
        StdRng::seed_from_u64(self.seed ^ 0x0BAD_CAFE_u64 ^ (index as u64))
    }

    /// Loads, rewrites and saves one document. Nothing is written when the
    /// document has no target or every target is protected.
    pub fn process_document(
        &self,
        path: &Path,
        kind: DocumentKind,
        index: usize,
    ) -> Result<FileReport> {
        match kind {
            DocumentKind::Text => self.process_text(path, index),
            DocumentKind::Binary => self.process_binary(path, index),
        }
    }

    fn process_text(&self, path: &Path, index: usize) -> Result<FileReport> {
        let mut root = json::load(path).map_err(|e| malformed(path, e.to_string()))?;

        let mut alloc = ScopedAllocator::new(&self.pool, self.document_rng(index));
        let stats = rewrite_fields(&mut root, &mut alloc, &self.skip);
        if stats.total == 0 {
            return Err(malformed(path, "no Name/name fields".to_string()));
        }

        if stats.modified > 0 {
            json::save(path, &root).map_err(|e| persist_failure(path, e.to_string()))?;
        }
        log::info!(
            "JSON processed: {} ({}/{} names)",
            path.display(),
            stats.modified,
            stats.total
        );

        Ok(FileReport {
            path: path.to_path_buf(),
            kind: DocumentKind::Text,
            modified: stats.modified,
            total: stats.total,
            skipped_entries: stats.total - stats.modified,
            palette_path: None,
            exhaustions: alloc.exhaustions(),
        })
    }

    fn process_binary(&self, path: &Path, index: usize) -> Result<FileReport> {
        let mut doc = NbtDocument::load(path).map_err(|e| malformed(path, e.to_string()))?;
        log::debug!("loaded {} ({:?})", path.display(), doc.compression);

        let source = path.display().to_string();
        let mut alloc = ScopedAllocator::new(&self.pool, self.document_rng(index));
        let (report, palette_path) = match locate_mut(&mut doc.root, &self.opaque) {
            Some((palette, palette_path)) => {
                log::info!("found palette in {source} at {palette_path}");
                let report = rewrite_palette(palette, &mut alloc, &self.skip, &source);
                (report, palette_path)
            }
            None => {
                log::warn!("no palette list in {source}");
                return Err(malformed(path, "no palette list found".to_string()));
            }
        };

        if report.modified > 0 {
            doc.save(path).map_err(|e| persist_failure(path, e.to_string()))?;
        }

        Ok(FileReport {
            path: path.to_path_buf(),
            kind: DocumentKind::Binary,
            modified: report.modified,
            total: report.total,
            skipped_entries: report.skipped.len(),
            palette_path: Some(palette_path.to_string()),
            exhaustions: alloc.exhaustions(),
        })
    }
}

fn malformed(path: &Path, reason: String) -> ShuffleError {
    ShuffleError::MalformedDocument {
        path: path.to_path_buf(),
        reason,
    }
}

fn persist_failure(path: &Path, reason: String) -> ShuffleError {
    ShuffleError::PersistFailure {
        path: path.to_path_buf(),
        reason,
    }
}
