use std::fs;
use std::io;
use std::path::Path;

use flate2::read::GzDecoder;
use tracing::{debug, info, warn};
use zip::ZipArchive;

use crate::error::CatalogError;

pub fn unpack(archive: &Path, destination_dir: &Path) -> Result<(), CatalogError> {
    let name = archive
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if name.ends_with(".zip") {
        let files = extract_zip(archive, destination_dir)?;
        debug!(archive = %archive.display(), files, "zip members written");
    } else if name.ends_with(".gz") && !name.ends_with(".tar.gz") {
        extract_gzip(archive, destination_dir)?;
    } else {
        return Err(CatalogError::Extract(format!(
            "unsupported archive type: {}",
            archive.display()
        )));
    }
    info!(archive = %archive.display(), destination = %destination_dir.display(), "archive extracted");

    if let Err(err) = fs::remove_file(archive) {
        warn!(archive = %archive.display(), error = %err, "failed to remove extracted archive");
    }
    Ok(())
}

pub fn extract_zip(zip_path: &Path, target_dir: &Path) -> Result<usize, CatalogError> {
    let archive_name = zip_path.display();
    let file = fs::File::open(zip_path)
        .map_err(|err| CatalogError::Extract(format!("open {archive_name}: {err}")))?;
    let mut archive = ZipArchive::new(file)
        .map_err(|err| CatalogError::Extract(format!("{archive_name} is not a zip: {err}")))?;

    let mut written = 0;
    for index in 0..archive.len() {
        let mut member = archive.by_index(index).map_err(|err| {
            CatalogError::Extract(format!("{archive_name}: member #{index}: {err}"))
        })?;
        let member_name = member.name().to_string();
        let Some(relative) = member.enclosed_name() else {
            return Err(CatalogError::Extract(format!(
                "{archive_name}: member {member_name} escapes the destination"
            )));
        };
        let out_path = target_dir.join(relative);

        let dir = if member.is_dir() {
            Some(out_path.as_path())
        } else {
            out_path.parent()
        };
        if let Some(dir) = dir {
            fs::create_dir_all(dir).map_err(|err| {
                CatalogError::Filesystem(format!("create directory {}: {err}", dir.display()))
            })?;
        }
        if member.is_dir() {
            continue;
        }

        let mut out = fs::File::create(&out_path).map_err(|err| {
            CatalogError::Filesystem(format!("create {}: {err}", out_path.display()))
        })?;
        io::copy(&mut member, &mut out).map_err(|err| {
            CatalogError::Extract(format!("{archive_name}: member {member_name}: {err}"))
        })?;
        written += 1;
    }
    Ok(written)
}

/// Single-member gzip: `game.gba.gz` becomes `game.gba`.
pub fn extract_gzip(gz_path: &Path, target_dir: &Path) -> Result<(), CatalogError> {
    let stem = gz_path
        .file_stem()
        .ok_or_else(|| CatalogError::Extract(format!("no file name: {}", gz_path.display())))?;
    let target = target_dir.join(stem);
    fs::create_dir_all(target_dir).map_err(|err| CatalogError::Filesystem(err.to_string()))?;

    let file = fs::File::open(gz_path)
        .map_err(|err| CatalogError::Extract(format!("open gzip {}: {err}", gz_path.display())))?;
    let mut decoder = GzDecoder::new(file);
    let mut outfile = fs::File::create(&target)
        .map_err(|err| CatalogError::Filesystem(format!("create {}: {err}", target.display())))?;
    io::copy(&mut decoder, &mut outfile)
        .map_err(|err| CatalogError::Extract(format!("{}: {err}", gz_path.display())))?;
    Ok(())
}
