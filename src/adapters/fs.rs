//! Flash filesystem adapter.
//!
//! Implements [`FilesystemPort`] on top of `std::fs`, rooted at a
//! directory. On the device that directory is the SPIFFS mount point;
//! on host builds it is any directory (tests use a temp dir).
//!
//! Paths are absolute, `/`-separated and flat-or-nested; `..`, empty
//! components and backslashes are rejected before touching the disk.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::app::ports::{FilesystemPort, FsEntry, FsError};

/// Longest accepted path, matching the SPIFFS object name limit.
const MAX_PATH_LEN: usize = 32;

/// Bytes moved per step of a streamed write.
const WRITE_CHUNK_LEN: usize = 512;

/// Check and normalise a console/upload path.
pub fn sanitize(path: &str) -> Result<&str, FsError> {
    let rel = path.strip_prefix('/').ok_or(FsError::InvalidPath)?;
    if rel.is_empty() || path.len() > MAX_PATH_LEN || path.contains('\\') {
        return Err(FsError::InvalidPath);
    }
    if rel
        .split('/')
        .any(|c| c.is_empty() || c == "." || c == "..")
    {
        return Err(FsError::InvalidPath);
    }
    Ok(rel)
}

fn map_io(e: &io::Error) -> FsError {
    match e.kind() {
        io::ErrorKind::NotFound => FsError::NotFound,
        io::ErrorKind::StorageFull => FsError::NoSpace,
        _ => FsError::Io,
    }
}

/// Handle on a directory tree. Clones share the same files, so the HTTP
/// server task and the console can each hold one.
#[derive(Debug, Clone)]
pub struct StdFs {
    root: PathBuf,
    capacity: u64,
}

impl StdFs {
    /// Filesystem rooted at `root` with `capacity` bytes of space.
    pub fn new(root: impl Into<PathBuf>, capacity: u64) -> Result<Self, FsError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| map_io(&e))?;
        Ok(Self { root, capacity })
    }

    /// Register the SPIFFS partition at `base` and size the port from it.
    #[cfg(target_os = "espidf")]
    pub fn mount_spiffs(base: &'static core::ffi::CStr) -> Result<Self, FsError> {
        use esp_idf_svc::sys::{esp, esp_spiffs_info, esp_vfs_spiffs_conf_t, esp_vfs_spiffs_register};

        let conf = esp_vfs_spiffs_conf_t {
            base_path: base.as_ptr(),
            partition_label: core::ptr::null(),
            max_files: 4,
            format_if_mount_failed: true,
        };
        // SAFETY: `conf` outlives the call and `base` is 'static.
        esp!(unsafe { esp_vfs_spiffs_register(&conf) }).map_err(|e| {
            warn!("fs: SPIFFS mount failed: {:?}", e);
            FsError::Io
        })?;

        let (mut total, mut used) = (0usize, 0usize);
        esp!(unsafe { esp_spiffs_info(core::ptr::null(), &mut total, &mut used) })
            .map_err(|_| FsError::Io)?;
        let root = base.to_str().map_err(|_| FsError::InvalidPath)?;
        info!("fs: SPIFFS at {} ({} / {} bytes)", root, used, total);
        Ok(Self {
            root: PathBuf::from(root),
            capacity: total as u64,
        })
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, FsError> {
        Ok(self.root.join(sanitize(path)?))
    }

    fn walk(&self, dir: &Path, out: &mut Vec<FsEntry>) -> Result<(), FsError> {
        for entry in fs::read_dir(dir).map_err(|e| map_io(&e))? {
            let entry = entry.map_err(|e| map_io(&e))?;
            let meta = entry.metadata().map_err(|e| map_io(&e))?;
            let path = entry.path();
            if meta.is_dir() {
                self.walk(&path, out)?;
                continue;
            }
            let Ok(rel) = path.strip_prefix(&self.root) else {
                continue;
            };
            let rel: Vec<_> = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            out.push(FsEntry {
                path: format!("/{}", rel.join("/")),
                size: meta.len(),
            });
        }
        Ok(())
    }
}

impl FilesystemPort for StdFs {
    fn total_bytes(&self) -> u64 {
        self.capacity
    }

    fn used_bytes(&self) -> u64 {
        self.list()
            .map(|entries| entries.iter().map(|e| e.size).sum())
            .unwrap_or(0)
    }

    fn list(&self) -> Result<Vec<FsEntry>, FsError> {
        let mut entries = Vec::new();
        self.walk(&self.root, &mut entries)?;
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    fn stat(&self, path: &str) -> Result<FsEntry, FsError> {
        let meta = fs::metadata(self.resolve(path)?).map_err(|e| map_io(&e))?;
        if !meta.is_file() {
            return Err(FsError::NotFound);
        }
        Ok(FsEntry {
            path: path.to_string(),
            size: meta.len(),
        })
    }

    fn remove(&mut self, path: &str) -> Result<(), FsError> {
        fs::remove_file(self.resolve(path)?).map_err(|e| map_io(&e))
    }

    fn write_from(&mut self, path: &str, source: &mut dyn Read) -> Result<u64, FsError> {
        let target = self.resolve(path)?;
        let existing = self.stat(path).map(|e| e.size).unwrap_or(0);
        let budget = self
            .capacity
            .saturating_sub(self.used_bytes().saturating_sub(existing));
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| map_io(&e))?;
        }

        let mut partial = target.clone().into_os_string();
        partial.push(".part");
        let partial = PathBuf::from(partial);
        let written = match copy_limited(source, &partial, budget) {
            Ok(n) => n,
            Err(e) => {
                let _ = fs::remove_file(&partial);
                return Err(e);
            }
        };

        // SPIFFS refuses to rename over an existing object.
        if let Err(e) = fs::remove_file(&target) {
            if e.kind() != io::ErrorKind::NotFound {
                let _ = fs::remove_file(&partial);
                return Err(map_io(&e));
            }
        }
        fs::rename(&partial, &target).map_err(|e| map_io(&e))?;
        Ok(written)
    }

    fn format(&mut self) -> Result<(), FsError> {
        for entry in fs::read_dir(&self.root).map_err(|e| map_io(&e))? {
            let path = entry.map_err(|e| map_io(&e))?.path();
            let result = if path.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            if let Err(e) = result {
                warn!("fs: format could not remove {}: {}", path.display(), e);
                return Err(FsError::Io);
            }
        }
        info!("fs: formatted");
        Ok(())
    }
}

/// Copy `source` into a fresh file at `dest`, at most `budget` bytes.
fn copy_limited(source: &mut dyn Read, dest: &Path, budget: u64) -> Result<u64, FsError> {
    let mut file = File::create(dest).map_err(|e| map_io(&e))?;
    let mut buf = [0u8; WRITE_CHUNK_LEN];
    let mut written = 0u64;
    loop {
        let n = match source.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!("fs: write source failed: {}", e);
                return Err(FsError::SourceFailed);
            }
        };
        written += n as u64;
        if written > budget {
            return Err(FsError::NoSpace);
        }
        file.write_all(&buf[..n]).map_err(|e| map_io(&e))?;
    }
    file.flush().map_err(|e| map_io(&e))?;
    Ok(written)
}
