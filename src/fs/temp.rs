//! Self-cleaning temporary files and directories.

use std::path::{Path, PathBuf};

use log::warn;

use crate::error::{Error, Result};
use crate::fd::FileDescriptor;
use crate::fs::{FdFile, OpenFlags};
use crate::types::SysString;

/// A temporary file that unlinks its path when closed.
///
/// The path is produced by expanding a template: a `{}` placeholder in the
/// template's basename is replaced by a random component, otherwise the
/// random component is appended. A template with an empty basename is a
/// usage error. Moving the object transfers the unlink responsibility.
#[derive(Debug)]
pub struct TempFile {
    file: FdFile,
    path: Option<PathBuf>,
}

impl TempFile {
    /// Creates a temporary file from `template`, e.g. `/tmp/myprog-{}.dat`.
    pub fn new<'a>(template: impl Into<SysString<'a>>) -> Result<TempFile> {
        Self::with_flags(template, OpenFlags::CLOEXEC)
    }

    /// Creates a temporary file passing extra open flags.
    pub fn with_flags<'a>(
        template: impl Into<SysString<'a>>,
        flags: OpenFlags,
    ) -> Result<TempFile> {
        let (fd, path) = crate::fs::make_tempfile(template, flags)?;
        Ok(TempFile {
            file: FdFile::new(fd),
            path: Some(path),
        })
    }

    /// The expanded path of the file.
    ///
    /// Only valid while the file is open; querying a closed temp file is a
    /// usage error.
    pub fn path(&self) -> Result<&Path> {
        self.path
            .as_deref()
            .ok_or(Error::Usage("path() queried on closed TempFile"))
    }

    pub fn fd(&self) -> FileDescriptor {
        self.file.fd()
    }

    pub fn is_open(&self) -> bool {
        self.file.is_open()
    }

    pub fn read_bytes(&self, buf: &mut [u8]) -> Result<usize> {
        self.file.read_bytes(buf)
    }

    pub fn write_bytes(&self, buf: &[u8]) -> Result<usize> {
        self.file.write_bytes(buf)
    }

    /// Unlinks the path and closes the file.
    pub fn close(&mut self) -> Result<()> {
        if let Some(path) = self.path.take() {
            let path = crate::fs::to_path_arg(&path)?;
            crate::fs::unlink_file(&path)?;
        }
        self.file.close()
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if self.path.is_some() {
            if let Err(err) = self.close() {
                warn!("failed to clean up temporary file: {err}");
            }
        }
    }
}

impl std::io::Read for TempFile {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        std::io::Read::read(&mut self.file, buf)
    }
}

impl std::io::Write for TempFile {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        std::io::Write::write(&mut self.file, buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl std::io::Seek for TempFile {
    fn seek(&mut self, pos: std::io::SeekFrom) -> std::io::Result<u64> {
        std::io::Seek::seek(&mut self.file, pos)
    }
}

/// A temporary directory that recursively removes itself when closed.
#[derive(Debug)]
pub struct TempDir {
    path: Option<PathBuf>,
}

impl TempDir {
    /// Creates a temporary directory from `template`; the random portion
    /// must terminate the template's basename.
    pub fn new<'a>(template: impl Into<SysString<'a>>) -> Result<TempDir> {
        let path = crate::fs::make_tempdir(template)?;
        Ok(TempDir { path: Some(path) })
    }

    /// The expanded path of the directory.
    ///
    /// Only valid while the directory has not been closed.
    pub fn path(&self) -> Result<&Path> {
        self.path
            .as_deref()
            .ok_or(Error::Usage("path() queried on closed TempDir"))
    }

    /// Recursively removes the directory tree.
    pub fn close(&mut self) -> Result<()> {
        if let Some(path) = self.path.take() {
            let path = crate::fs::to_path_arg(&path)?;
            crate::fs::remove_tree(&path)?;
        }
        Ok(())
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!("failed to clean up temporary directory: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FollowSymlinks;

    #[test]
    fn file_vanishes_on_close() {
        let mut tmp = TempFile::new(c"/tmp/syscore-test-{}.dat").unwrap();
        let path = tmp.path().unwrap().to_owned();
        let path_str = path.to_str().unwrap();
        assert!(path_str.starts_with("/tmp/syscore-test-"));
        assert!(path_str.ends_with(".dat"));
        tmp.write_bytes(b"payload").unwrap();
        let arg = crate::fs::to_path_arg(&path).unwrap();
        assert!(crate::fs::exists_file(&arg));
        tmp.close().unwrap();
        assert!(!crate::fs::exists_file(&arg));
        assert!(tmp.path().is_err());
    }

    #[test]
    fn dir_tree_removed_on_drop() {
        let kept_path;
        {
            let dir = TempDir::new(c"/tmp/syscore-dir-{}").unwrap();
            kept_path = dir.path().unwrap().to_owned();
            let sub = crate::fs::to_path_arg(kept_path.join("sub")).unwrap();
            crate::fs::make_dir(&sub, crate::fs::FileMode::from_raw(0o700)).unwrap();
            let inner = crate::fs::to_path_arg(kept_path.join("sub/file")).unwrap();
            let mut fd = crate::fs::open(
                &inner,
                crate::fs::OpenMode::WriteOnly,
                crate::fs::OpenFlags::CREATE | crate::fs::OpenFlags::CLOEXEC,
                Some(crate::fs::FileMode::from_raw(0o600)),
            )
            .unwrap();
            fd.close().unwrap();
            assert!(
                crate::fs::FileStatus::of_path(&sub, FollowSymlinks::new(false))
                    .unwrap()
                    .file_type()
                    .is_directory()
            );
        }
        let arg = crate::fs::to_path_arg(&kept_path).unwrap();
        assert!(!crate::fs::exists_file(&arg));
    }

    #[test]
    fn empty_basename_rejected() {
        assert!(matches!(TempFile::new(c"/tmp/"), Err(Error::Usage(_))));
    }
}
