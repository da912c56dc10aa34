// ─── JDK archive extraction ───
// Zip (windows builds) and tar.gz (linux/macos builds). The archive's single
// top-level directory is stripped so the JDK lands directly in `dest`.

use std::fs::File;
use std::io::Read;
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use tokio_util::sync::CancellationToken;

use crate::core::error::{LauncherError, LauncherResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    TarGz,
}

impl ArchiveFormat {
    /// Sniff the format from the first bytes; mirror URLs often carry no extension.
    pub fn detect(path: &Path) -> LauncherResult<Self> {
        let mut magic = [0_u8; 2];
        File::open(path)
            .and_then(|mut f| f.read_exact(&mut magic))
            .map_err(|e| LauncherError::io(path, e))?;
        match magic {
            [b'P', b'K'] => Ok(ArchiveFormat::Zip),
            [0x1f, 0x8b] => Ok(ArchiveFormat::TarGz),
            _ => Err(LauncherError::JavaProvisioning(format!(
                "{} is neither zip nor tar.gz",
                path.display()
            ))),
        }
    }
}

/// Drops the first component and anything that could escape `dest`.
fn stripped(path: &Path) -> Option<PathBuf> {
    let mut components = path.components();
    components.next();
    let rel: PathBuf = components
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part),
            _ => None,
        })
        .collect();
    (!rel.as_os_str().is_empty()).then_some(rel)
}

/// Blocking. Run through `spawn_blocking`.
pub fn extract_archive(
    archive: &Path,
    dest: &Path,
    cancel: &CancellationToken,
) -> LauncherResult<()> {
    if dest.exists() {
        std::fs::remove_dir_all(dest).map_err(|e| LauncherError::io(dest, e))?;
    }
    std::fs::create_dir_all(dest).map_err(|e| LauncherError::io(dest, e))?;

    match ArchiveFormat::detect(archive)? {
        ArchiveFormat::Zip => extract_zip(archive, dest, cancel),
        ArchiveFormat::TarGz => extract_tar_gz(archive, dest, cancel),
    }
}

fn extract_zip(archive: &Path, dest: &Path, cancel: &CancellationToken) -> LauncherResult<()> {
    let file = File::open(archive).map_err(|e| LauncherError::io(archive, e))?;
    let mut zip = zip::ZipArchive::new(file)?;

    for index in 0..zip.len() {
        if cancel.is_cancelled() {
            return Err(LauncherError::Cancelled);
        }
        let mut entry = zip.by_index(index)?;
        let Some(rel) = entry.enclosed_name().as_deref().and_then(stripped) else {
            continue;
        };
        let out_path = dest.join(rel);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path).map_err(|e| LauncherError::io(&out_path, e))?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LauncherError::io(parent, e))?;
        }
        let mut out = File::create(&out_path).map_err(|e| LauncherError::io(&out_path, e))?;
        std::io::copy(&mut entry, &mut out).map_err(|e| LauncherError::io(&out_path, e))?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&out_path, std::fs::Permissions::from_mode(mode))
                .map_err(|e| LauncherError::io(&out_path, e))?;
        }
    }
    Ok(())
}

fn extract_tar_gz(archive: &Path, dest: &Path, cancel: &CancellationToken) -> LauncherResult<()> {
    let file = File::open(archive).map_err(|e| LauncherError::io(archive, e))?;
    let mut tar = tar::Archive::new(GzDecoder::new(file));
    let entries = tar.entries().map_err(|e| LauncherError::io(archive, e))?;

    for entry in entries {
        if cancel.is_cancelled() {
            return Err(LauncherError::Cancelled);
        }
        let mut entry = entry.map_err(|e| LauncherError::io(archive, e))?;
        let path = entry
            .path()
            .map_err(|e| LauncherError::io(archive, e))?
            .into_owned();
        let Some(rel) = stripped(&path) else {
            continue;
        };
        let out_path = dest.join(rel);
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LauncherError::io(parent, e))?;
        }
        entry
            .unpack(&out_path)
            .map_err(|e| LauncherError::io(&out_path, e))?;
    }
    Ok(())
}
