//! Moving completed downloads into the media library.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::job_db::Job;
use crate::naming::{sanitize_base_name, NAME_MAX};

/// Places a staged file into the library and returns its final path.
///
/// On error the staged file must be left where it was.
pub trait LibraryPlacer: Send + Sync {
    fn move_to_library(&self, job: &Job, staged: &Path) -> Result<PathBuf>;
}

/// Library on the local filesystem: `<root>/<category>/<file name>`.
pub struct FsLibrary {
    root: PathBuf,
}

impl FsLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn target_dir(&self, job: &Job) -> PathBuf {
        match job
            .category
            .as_deref()
            .map(|c| sanitize_base_name(c, NAME_MAX))
            .filter(|c| !c.is_empty())
        {
            Some(cat) => self.root.join(cat),
            None => self.root.clone(),
        }
    }
}

/// `name.ext`, then `name (1).ext`, `name (2).ext`, ... until free.
pub fn unique_destination(dir: &Path, file_name: &str) -> PathBuf {
    let first = dir.join(file_name);
    if !first.exists() {
        return first;
    }
    let (stem, ext) = match file_name.rsplit_once('.') {
        Some((s, e)) if !s.is_empty() => (s, Some(e)),
        _ => (file_name, None),
    };
    (1u32..)
        .map(|n| match ext {
            Some(e) => dir.join(format!("{stem} ({n}).{e}")),
            None => dir.join(format!("{stem} ({n})")),
        })
        .find(|p| !p.exists())
        .unwrap_or(first)
}

/// Rename, falling back to copy + remove across filesystems. A failed
/// fallback removes the destination and leaves the source untouched.
pub(crate) fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            tracing::debug!("rename {} failed ({rename_err}); copying", from.display());
            copy_then_remove(from, to, |p| fs::remove_file(p))
        }
    }
}

/// On error the destination copy is dropped again, so only `from` remains.
fn copy_then_remove(
    from: &Path,
    to: &Path,
    remove_source: impl FnOnce(&Path) -> io::Result<()>,
) -> io::Result<()> {
    if let Err(e) = fs::copy(from, to) {
        let _ = fs::remove_file(to);
        return Err(e);
    }
    if let Err(e) = remove_source(from) {
        let _ = fs::remove_file(to);
        return Err(e);
    }
    Ok(())
}

impl LibraryPlacer for FsLibrary {
    fn move_to_library(&self, job: &Job, staged: &Path) -> Result<PathBuf> {
        let meta = fs::metadata(staged)
            .with_context(|| format!("staged file missing: {}", staged.display()))?;
        if !meta.is_file() {
            anyhow::bail!("staged path is not a file: {}", staged.display());
        }
        let file_name = staged
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("staged path has no usable file name: {}", staged.display()))?;

        let dir = self.target_dir(job);
        fs::create_dir_all(&dir)
            .with_context(|| format!("create library dir {}", dir.display()))?;
        let dest = unique_destination(&dir, file_name);
        move_file(staged, &dest).with_context(|| {
            format!("move {} to {}", staged.display(), dest.display())
        })?;
        Ok(dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job_db::JobStatus;

    fn job(category: Option<&str>) -> Job {
        Job {
            id: 1,
            user_id: 1,
            provider_id: 1,
            external_id: "x".into(),
            title: "X".into(),
            source_url: None,
            category: category.map(str::to_string),
            status: JobStatus::Downloading,
            progress: 100,
            speed_bps: None,
            eta_seconds: None,
            priority: 100,
            position: 1,
            aria2_gid: Some("G1".into()),
            tmp_path: None,
            final_path: None,
            error_text: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn moves_into_category_dir() {
        let stage = tempfile::tempdir().unwrap();
        let lib = tempfile::tempdir().unwrap();
        let staged = stage.path().join("X.mkv");
        fs::write(&staged, b"data").unwrap();

        let placer = FsLibrary::new(lib.path());
        let dest = placer.move_to_library(&job(Some("Movies")), &staged).unwrap();
        assert_eq!(dest, lib.path().join("Movies").join("X.mkv"));
        assert!(!staged.exists());
        assert_eq!(fs::read(&dest).unwrap(), b"data");
    }

    #[test]
    fn collisions_get_numbered() {
        let stage = tempfile::tempdir().unwrap();
        let lib = tempfile::tempdir().unwrap();
        fs::write(lib.path().join("X.mkv"), b"old").unwrap();
        let staged = stage.path().join("X.mkv");
        fs::write(&staged, b"new").unwrap();

        let dest = FsLibrary::new(lib.path())
            .move_to_library(&job(None), &staged)
            .unwrap();
        assert_eq!(dest, lib.path().join("X (1).mkv"));
        assert_eq!(fs::read(lib.path().join("X.mkv")).unwrap(), b"old");
    }

    #[test]
    fn missing_staged_file_fails_without_side_effects() {
        let lib = tempfile::tempdir().unwrap();
        let err = FsLibrary::new(lib.path())
            .move_to_library(&job(Some("TV")), Path::new("/nonexistent/stage/X.mkv"))
            .unwrap_err();
        assert!(format!("{err:#}").contains("staged file missing"));
        assert!(!lib.path().join("TV").exists());
    }

    #[test]
    fn failed_source_removal_drops_the_copy() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("X.mkv");
        let to = dir.path().join("copy.mkv");
        fs::write(&from, b"video").unwrap();

        let err = copy_then_remove(&from, &to, |_| {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only staging"))
        })
        .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
        assert!(from.exists());
        assert!(!to.exists());

        copy_then_remove(&from, &to, |p| fs::remove_file(p)).unwrap();
        assert!(!from.exists());
        assert_eq!(fs::read(&to).unwrap(), b"video");
    }

    #[test]
    fn unique_destination_without_extension() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("README"), b"").unwrap();
        assert_eq!(
            unique_destination(dir.path(), "README"),
            dir.path().join("README (1)")
        );
    }
}
