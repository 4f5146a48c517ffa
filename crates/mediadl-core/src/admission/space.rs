//! Free-space probing via statvfs.

use std::path::Path;

/// Bytes available to unprivileged users on the filesystem holding `p`.
#[cfg(unix)]
pub fn free_bytes(p: &Path) -> Option<u64> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c = CString::new(p.as_os_str().as_bytes()).ok()?;
    let mut s: libc::statvfs = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::statvfs(c.as_ptr(), &mut s) };
    if rc != 0 {
        return None;
    }
    Some((s.f_bsize as u64).saturating_mul(s.f_bavail as u64))
}

#[cfg(not(unix))]
pub fn free_bytes(_p: &Path) -> Option<u64> {
    None
}

/// Like [`free_bytes`], but a root that does not exist yet is measured on
/// its nearest existing ancestor (the scheduler creates the directory later).
pub fn free_bytes_nearest(p: &Path) -> Option<u64> {
    let mut cur = Some(p);
    while let Some(dir) = cur {
        if dir.exists() {
            return free_bytes(dir);
        }
        cur = dir.parent();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn temp_dir_reports_free_space() {
        let dir = tempfile::tempdir().unwrap();
        assert!(free_bytes(dir.path()).is_some());
        let missing = dir.path().join("not/yet/created");
        assert!(free_bytes(&missing).is_none());
        assert!(free_bytes_nearest(&missing).is_some());
    }
}
