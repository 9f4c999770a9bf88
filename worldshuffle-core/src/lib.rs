use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

pub mod allocator;
pub mod catalog;
pub mod config;
pub mod dispatch;
pub mod document;
pub mod json;
pub mod locate;
pub mod nbt;
pub mod package;
pub mod pool;
pub mod rewrite;
pub mod tree;

pub use config::{ShuffleConfig, ShuffleSettings};
pub use dispatch::{Dispatcher, RunSummary};
pub use document::{DocumentKind, FileReport, Shuffler};
pub use pool::IdentifierPool;

use nbt::NbtError;

#[derive(Debug, Error)]
pub enum ShuffleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("catalog has no usable identifiers after exclusions")]
    EmptySource,
    #[error("malformed document {}: {reason}", .path.display())]
    MalformedDocument { path: PathBuf, reason: String },
    #[error("could not write {}: {reason}", .path.display())]
    PersistFailure { path: PathBuf, reason: String },
    #[error("NBT error: {0}")]
    Nbt(#[from] NbtError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("catalog error: {0}")]
    Csv(#[from] csv::Error),
    #[error("directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("worker error: {0}")]
    Worker(String),
}

pub type Result<T> = std::result::Result<T, ShuffleError>;

/// Where a run put its output, plus the per-file results.
#[derive(Debug)]
pub struct RunOutcome {
    pub seed: u64,
    pub staging_dir: PathBuf,
    pub archive_path: Option<PathBuf>,
    pub summary: RunSummary,
}

pub fn run(settings: ShuffleSettings) -> Result<RunOutcome> {
    let config = &settings.config;
    config.validate()?;

    if !settings.input_path.is_dir() {
        return Err(ShuffleError::Config(format!(
            "Input path is not a directory: {}",
            settings.input_path.display()
        )));
    }

    if !settings.catalog_path.is_file() {
        return Err(ShuffleError::Config(format!(
            "Catalog file does not exist: {}",
            settings.catalog_path.display()
        )));
    }

    // The pool is built before anything is copied or written, so an empty
    // catalog aborts the run with the filesystem untouched.
    let records = catalog::read_catalog(&settings.catalog_path, &config.namespace)?;
    let pool = IdentifierPool::build(
        records,
        &config.exclusion_set(),
        &config.weights,
        &config.namespace,
        settings.seed,
    )?;

    if !settings.output_path.exists() {
        fs::create_dir_all(&settings.output_path)?;
    }

    let input_abs = settings.input_path.canonicalize()?;
    let output_abs = settings.output_path.canonicalize()?;
    if output_abs.starts_with(&input_abs) {
        return Err(ShuffleError::Config(
            "Output path must not be inside the input path".to_string(),
        ));
    }

    // Each seed gets its own folder so runs never overwrite each other's
    // archives; a rerun of the same seed starts from a clean copy.
    let out_root = settings
        .output_path
        .join(format!("Shuffled_{}", settings.seed));
    let staging_dir = out_root.join("pack");
    if staging_dir.exists() {
        fs::remove_dir_all(&staging_dir)?;
    }
    fs::create_dir_all(&staging_dir)?;

    let documents = package::stage_tree(&settings.input_path, &staging_dir)?;

    let shuffler = Shuffler::new(pool, config, settings.seed);
    let mut dispatcher = Dispatcher::new(Arc::new(shuffler), config.workers);
    for (path, kind) in documents {
        dispatcher.dispatch(path, kind);
    }
    let summary = dispatcher.wait_for_completion();

    log::info!(
        "finished | succeeded: {} | failed: {} | total resets: {}",
        summary.succeeded.len(),
        summary.failed.len(),
        summary.reset_count
    );

    let archive_path = if settings.archive {
        let path = out_root.join(format!("Shuffled_{}.zip", settings.seed));
        package::package_directory(&staging_dir, &path)?;
        Some(path)
    } else {
        None
    };

    if settings.debug {
        let mut log = format!("World shuffle seed: {}\n", settings.seed);
        log.push_str(&format!(
            "input: {} -> {}\n",
            settings.input_path.display(),
            staging_dir.display()
        ));
        if let Some(path) = &archive_path {
            log.push_str(&format!("archive: {}\n", path.display()));
        } else {
            log.push_str("archive: not generated (packaging disabled)\n");
        }
        log.push_str(&summary.to_log());
        fs::write(out_root.join("shuffle_log.txt"), log)?;
    }

    Ok(RunOutcome {
        seed: settings.seed,
        staging_dir,
        archive_path,
        summary,
    })
}
