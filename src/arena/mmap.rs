//! # Memory-Mapped Backing File
//!
//! This module implements `MappedFile`, the low-level building block under
//! the arena: a single read-write memory-mapped file that can be extended
//! and remapped in place.
//!
//! ## Scratch Semantics
//!
//! The backing file is a scratch region, not a database. It is created
//! fresh on open (a stale file at the same path is removed first), grown by
//! `set_len` + remap when the arena runs out of space, and deleted again
//! when the `MappedFile` is dropped. No on-disk format survives a process
//! restart.
//!
//! ## Safety Considerations
//!
//! Memory-mapped regions become invalid when remapped (during `grow()`).
//! The typical solutions involve runtime overhead:
//!
//! - **Hazard pointers**: Defer unmapping until no readers
//! - **Epoch-based reclamation**: Track read epochs
//! - **Reference counting**: Arc-wrapped regions
//!
//! This crate instead leverages Rust's borrow checker:
//!
//! ```text
//! bytes(&self) -> &[u8]           // Immutable borrow of self
//! bytes_mut(&mut self) -> &mut [u8]  // Mutable borrow of self
//! grow(&mut self)                 // Mutable borrow (exclusive)
//! ```
//!
//! Since `grow()` requires `&mut self`, the compiler ensures no slice into
//! the mapping exists when grow is called. This provides:
//!
//! - **Zero runtime overhead**: No locks, guards, or epoch tracking
//! - **Compile-time safety**: Dangling pointer bugs are caught by rustc
//!
//! This is also why arena-relative offsets, not references, are the only
//! long-lived form of reference the upper layers hand out.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use eyre::{ensure, Result, WrapErr};
use memmap2::MmapMut;
use tracing::warn;

#[derive(Debug)]
pub struct MappedFile {
    file: File,
    mmap: MmapMut,
    path: PathBuf,
    size: u64,
}

impl MappedFile {
    /// Creates the backing file at `path`, replacing any stale file left by
    /// a previous run, and maps it read-write.
    pub fn create<P: AsRef<Path>>(path: P, size: u64) -> Result<Self> {
        let path = path.as_ref();

        ensure!(size > 0, "backing file size must be non-zero");

        match fs::remove_file(path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                return Err(err).wrap_err_with(|| {
                    format!("failed to remove stale store file '{}'", path.display())
                })
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
            .wrap_err_with(|| format!("failed to create store file '{}'", path.display()))?;

        file.set_len(size)
            .wrap_err_with(|| format!("failed to set store file size to {} bytes", size))?;

        // SAFETY: MmapMut::map_mut is unsafe because memory-mapped files can
        // be modified externally, leading to undefined behavior. This is safe
        // because:
        // 1. The file was just created with create_new, so no other process
        //    holds it open
        // 2. The file is scratch data owned exclusively by this process and
        //    removed on drop
        // 3. The mmap lifetime is tied to MappedFile, preventing
        //    use-after-unmap
        let mmap = unsafe {
            MmapMut::map_mut(&file)
                .wrap_err_with(|| format!("failed to memory-map '{}'", path.display()))?
        };

        Ok(Self {
            file,
            mmap,
            path: path.to_path_buf(),
            size,
        })
    }

    /// Extends the file on disk and remaps it. All slices into the old
    /// mapping are invalidated; the `&mut self` receiver makes holding one
    /// across this call a compile error.
    pub fn grow(&mut self, new_size: u64) -> Result<()> {
        if new_size <= self.size {
            return Ok(());
        }

        self.mmap
            .flush_async()
            .wrap_err("failed to flush mapping before grow")?;

        self.file
            .set_len(new_size)
            .wrap_err_with(|| format!("failed to extend store file to {} bytes", new_size))?;

        // SAFETY: MmapMut::map_mut is unsafe because the old mapping becomes
        // invalid. This is safe because:
        // 1. grow() takes &mut self, so no slice into the old mapping can
        //    exist (borrow checker)
        // 2. The file was extended to new_size before remapping
        // 3. The old mapping is dropped when the new one is assigned
        self.mmap = unsafe {
            MmapMut::map_mut(&self.file).wrap_err("failed to remap store file after grow")?
        };

        self.size = new_size;

        Ok(())
    }

    pub fn bytes(&self) -> &[u8] {
        &self.mmap
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.mmap
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for MappedFile {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            warn!(
                path = %self.path.display(),
                error = %err,
                "failed to remove store file on drop"
            );
        }
    }
}
