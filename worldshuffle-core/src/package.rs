use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::document::DocumentKind;
use crate::{Result, ShuffleError};

fn relative_to<'a>(base: &Path, path: &'a Path) -> Result<&'a Path> {
    path.strip_prefix(base).map_err(|_| {
        ShuffleError::Config(format!(
            "{} is not under {}",
            path.display(),
            base.display()
        ))
    })
}

/// Copies `src` into `dst`, returning the documents found on the way in
/// walk order (sorted by file name, so the order is stable across runs).
pub fn stage_tree(src: &Path, dst: &Path) -> Result<Vec<(PathBuf, DocumentKind)>> {
    let mut documents = Vec::new();

    for entry in WalkDir::new(src).sort_by_file_name() {
        let entry = entry?;
        let rel = relative_to(src, entry.path())?;
        let target = dst.join(rel);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }
        if !entry.file_type().is_file() {
            log::debug!("skipping non-regular file {}", entry.path().display());
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(entry.path(), &target)?;

        if let Some(kind) = DocumentKind::from_path(&target) {
            documents.push((target, kind));
        }
    }

    log::info!(
        "staged {} into {} ({} documents)",
        src.display(),
        dst.display(),
        documents.len()
    );
    Ok(documents)
}

/// Zips everything under `dir` into `archive_path` with deflate. Entry
/// names are relative to `dir` and always use `/`. Returns the number of
/// files written.
pub fn package_directory(dir: &Path, archive_path: &Path) -> Result<usize> {
    if let Some(parent) = archive_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut zip = ZipWriter::new(File::create(archive_path)?);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut files = 0usize;

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        let rel = relative_to(dir, entry.path())?;
        if rel.as_os_str().is_empty() {
            continue;
        }

        let name = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if entry.file_type().is_dir() {
            zip.add_directory(format!("{name}/"), options)?;
        } else if entry.file_type().is_file() {
            zip.start_file(name, options)?;
            let mut src = File::open(entry.path())?;
            io::copy(&mut src, &mut zip)?;
            files += 1;
        }
    }

    zip.finish()?;
    log::info!("packed {} files into {}", files, archive_path.display());
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn sample_tree(root: &Path) {
        fs::create_dir_all(root.join("data/demo/worldgen")).unwrap();
        fs::create_dir_all(root.join("data/demo/structure")).unwrap();
        fs::write(root.join("pack.mcmeta"), "{\"pack\":{}}").unwrap();
        fs::write(root.join("data/demo/worldgen/tree.json"), "{\"name\":\"a\"}").unwrap();
        fs::write(root.join("data/demo/structure/house.NBT"), [0x0Au8, 0, 0, 0]).unwrap();
        fs::write(root.join("data/demo/readme.txt"), "hi").unwrap();
    }

    #[test]
    fn staging_copies_everything_and_lists_documents() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        sample_tree(src.path());

        let docs = stage_tree(src.path(), &dst.path().join("pack")).unwrap();
        let rel: Vec<(String, DocumentKind)> = docs
            .iter()
            .map(|(p, k)| {
                (
                    p.strip_prefix(dst.path()).unwrap().to_string_lossy().replace('\\', "/"),
                    *k,
                )
            })
            .collect();
        assert_eq!(
            rel,
            vec![
                ("pack/data/demo/structure/house.NBT".to_string(), DocumentKind::Binary),
                ("pack/data/demo/worldgen/tree.json".to_string(), DocumentKind::Text),
            ]
        );
        assert!(dst.path().join("pack/pack.mcmeta").exists());
        assert!(dst.path().join("pack/data/demo/readme.txt").exists());
    }

    #[test]
    fn archive_holds_relative_entries() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        sample_tree(src.path());

        let archive_path = out.path().join("nested/out.zip");
        let files = package_directory(src.path(), &archive_path).unwrap();
        assert_eq!(files, 4);

        let mut archive = zip::ZipArchive::new(File::open(&archive_path).unwrap()).unwrap();
        let mut text = String::new();
        archive
            .by_name("data/demo/worldgen/tree.json")
            .unwrap()
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!(text, "{\"name\":\"a\"}");
        assert!(archive.by_name("pack.mcmeta").is_ok());
        assert!(archive.by_name("data/demo/").is_ok());
    }
}
