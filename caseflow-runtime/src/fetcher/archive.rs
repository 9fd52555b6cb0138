//! Package archive handling
//!
//! A package is an uncompressed tar holding `data.tar.gz`; only the `lib/`
//! part of that inner archive is installed.

use std::fs;
use std::io::{Cursor, Read};
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;

use crate::error::FetchError;
use crate::version;

/// Inner archive entry carrying the installable files
pub const DATA_ARCHIVE: &str = "data.tar.gz";

const INSTALL_PREFIX: &str = "lib";

fn strip_cur_dir(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

/// Pull the bytes of `data.tar.gz` out of an outer package archive
pub fn extract_data_archive(package: &[u8]) -> Result<Option<Vec<u8>>, FetchError> {
    let mut archive = Archive::new(Cursor::new(package));
    for entry in archive.entries().map_err(FetchError::Archive)? {
        let mut entry = entry.map_err(FetchError::Archive)?;
        let path = strip_cur_dir(&entry.path().map_err(FetchError::Archive)?);
        if path == Path::new(DATA_ARCHIVE) {
            let mut data = Vec::new();
            entry.read_to_end(&mut data).map_err(FetchError::Archive)?;
            return Ok(Some(data));
        }
    }
    Ok(None)
}

/// Unpack the `lib/` entries of a gzipped tar into `dest`
///
/// Returns how many files were written. Entries escaping `dest` are skipped.
pub fn unpack_lib(data: &[u8], dest: &Path) -> Result<usize, FetchError> {
    let mut archive = Archive::new(GzDecoder::new(data));
    let mut written = 0;

    for entry in archive.entries().map_err(FetchError::Archive)? {
        let mut entry = entry.map_err(FetchError::Archive)?;
        let path = strip_cur_dir(&entry.path().map_err(FetchError::Archive)?);
        if !path.starts_with(INSTALL_PREFIX) {
            continue;
        }
        let is_file = entry.header().entry_type().is_file();
        if !entry.unpack_in(dest).map_err(FetchError::Archive)? {
            tracing::warn!(path = %path.display(), "Skipping archive entry outside install root");
            continue;
        }
        if is_file {
            written += 1;
        }
    }

    Ok(written)
}

/// Install a package into `<plugin_dir>/<name>-<version>`
///
/// Files are unpacked into a hidden staging directory first and renamed into
/// place, so the version directory appears complete. An existing directory
/// for the same version is replaced.
pub fn install_package(
    package: &[u8],
    plugin_dir: &Path,
    name: &str,
    version: &str,
) -> Result<PathBuf, FetchError> {
    let data = extract_data_archive(package)?.ok_or_else(|| FetchError::MissingDataArchive {
        name: name.to_string(),
        version: version.to_string(),
    })?;

    fs::create_dir_all(plugin_dir)?;
    let staging = tempfile::Builder::new()
        .prefix(".staging-")
        .tempdir_in(plugin_dir)?;

    let written = unpack_lib(&data, staging.path())?;
    if written == 0 {
        return Err(FetchError::EmptyPackage {
            name: name.to_string(),
            version: version.to_string(),
        });
    }

    // tempfile creates the staging dir private to the owner
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(staging.path(), fs::Permissions::from_mode(0o755))?;
    }

    let target = version::version_dir(plugin_dir, name, version);
    if target.exists() {
        fs::remove_dir_all(&target)?;
    }

    let staged = staging.keep();
    if let Err(e) = fs::rename(&staged, &target) {
        let _ = fs::remove_dir_all(&staged);
        return Err(e.into());
    }

    Ok(target)
}
