//! Safe wrapper over one POSIX named shared-memory segment.
//!
//! Uses `shm_open`/`ftruncate`/`mmap` directly. Names on the wire carry no
//! leading slash (`sl-<uuid>`); the slash POSIX requires is added at the
//! syscall boundary.

use std::ffi::CString;
use std::io;

use uuid::Uuid;

/// One mapped named shared-memory segment.
///
/// A segment is either *created* (this process owns the name and unlinks it
/// on drop) or *opened* (mapped view of a peer's segment; dropping only
/// unmaps). Access is single-owner on each side, so the mapping is `Send`
/// but deliberately not `Sync`.
#[derive(Debug)]
pub struct ShmSegment {
    name: String,
    ptr: *mut u8,
    len: usize,
    owned: bool,
}

// SAFETY: the mapping is only ever accessed through &self/&mut self of the
// single owner; moving that owner across threads is sound.
unsafe impl Send for ShmSegment {}

impl ShmSegment {
    /// Creates a fresh segment of exactly `size` bytes under a new unique
    /// name.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidInput` for `size == 0` (zero-length payloads are
    /// represented by an empty name, not a segment) or with the OS error
    /// from `shm_open`/`ftruncate`/`mmap`.
    pub fn create(size: usize) -> io::Result<Self> {
        if size == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "shared segments must have a non-zero size",
            ));
        }

        let name = format!("sl-{}", Uuid::new_v4().simple());
        let c_name = os_name(&name)?;

        // SAFETY: c_name is a valid NUL-terminated string.
        let fd = unsafe {
            libc::shm_open(
                c_name.as_ptr(),
                libc::O_CREAT | libc::O_EXCL | libc::O_RDWR,
                0o600 as libc::c_uint,
            )
        };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }

        // SAFETY: fd is a valid descriptor owned by this function.
        let truncated = unsafe { libc::ftruncate(fd, size as libc::off_t) };
        if truncated != 0 {
            let err = io::Error::last_os_error();
            // SAFETY: fd is valid; the name was created above and must not leak.
            unsafe {
                libc::close(fd);
                libc::shm_unlink(c_name.as_ptr());
            }
            return Err(err);
        }

        let ptr = map(fd, size);
        // SAFETY: the mapping (if any) keeps the segment alive without the fd.
        unsafe {
            libc::close(fd);
        }
        let ptr = match ptr {
            Ok(ptr) => ptr,
            Err(err) => {
                // SAFETY: unlink the name we created; nothing references it.
                unsafe {
                    libc::shm_unlink(c_name.as_ptr());
                }
                return Err(err);
            }
        };

        Ok(Self {
            name,
            ptr,
            len: size,
            owned: true,
        })
    }

    /// Maps an existing segment by its wire name. The segment remains owned
    /// by its creator; dropping this handle only unmaps the view.
    ///
    /// # Errors
    ///
    /// Fails with the OS error if the name does not exist, or `InvalidData`
    /// if the segment reports a zero size.
    pub fn open(name: &str) -> io::Result<Self> {
        let c_name = os_name(name)?;

        // SAFETY: c_name is a valid NUL-terminated string.
        let fd = unsafe { libc::shm_open(c_name.as_ptr(), libc::O_RDWR, 0) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }

        // SAFETY: fd is valid; stat is fully written by fstat on success.
        let len = unsafe {
            let mut stat: libc::stat = std::mem::zeroed();
            if libc::fstat(fd, &mut stat) != 0 {
                let err = io::Error::last_os_error();
                libc::close(fd);
                return Err(err);
            }
            stat.st_size as usize
        };
        if len == 0 {
            // SAFETY: fd is valid.
            unsafe {
                libc::close(fd);
            }
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("shared segment {name:?} has zero size"),
            ));
        }

        let ptr = map(fd, len);
        // SAFETY: fd is valid; the mapping no longer needs it.
        unsafe {
            libc::close(fd);
        }

        Ok(Self {
            name: name.to_string(),
            ptr: ptr?,
            len,
            owned: false,
        })
    }

    /// The wire name (no leading slash).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: ptr/len describe a live mapping held for self's lifetime.
        unsafe { std::slice::from_raw_parts(self.ptr, self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as above; &mut self guarantees exclusive access on this side.
        unsafe { std::slice::from_raw_parts_mut(self.ptr, self.len) }
    }
}

impl Drop for ShmSegment {
    fn drop(&mut self) {
        // SAFETY: ptr/len came from a successful mmap of this length.
        unsafe {
            libc::munmap(self.ptr as *mut libc::c_void, self.len);
        }
        if self.owned {
            if let Ok(c_name) = os_name(&self.name) {
                // SAFETY: c_name is valid; unlinking an already-removed name
                // is harmless.
                unsafe {
                    libc::shm_unlink(c_name.as_ptr());
                }
            }
        }
    }
}

/// Maps `len` bytes of `fd` read-write, shared.
fn map(fd: libc::c_int, len: usize) -> io::Result<*mut u8> {
    // SAFETY: fd is a valid shared-memory descriptor of at least len bytes.
    let ptr = unsafe {
        libc::mmap(
            std::ptr::null_mut(),
            len,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_SHARED,
            fd,
            0,
        )
    };
    if ptr == libc::MAP_FAILED {
        return Err(io::Error::last_os_error());
    }
    Ok(ptr as *mut u8)
}

/// The POSIX form of a wire name: a leading slash, no interior NUL.
fn os_name(name: &str) -> io::Result<CString> {
    CString::new(format!("/{name}"))
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "segment name contains NUL"))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_write_open_read() {
        let mut created = ShmSegment::create(16).unwrap();
        created.as_mut_slice().copy_from_slice(&[7u8; 16]);

        let opened = ShmSegment::open(created.name()).unwrap();
        assert_eq!(opened.len(), 16);
        assert_eq!(opened.as_slice(), &[7u8; 16]);
    }

    #[test]
    fn test_created_names_are_unique() {
        let a = ShmSegment::create(8).unwrap();
        let b = ShmSegment::create(8).unwrap();
        assert_ne!(a.name(), b.name());
    }

    #[test]
    fn test_zero_size_create_is_rejected() {
        let err = ShmSegment::create(0).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_open_unknown_name_fails() {
        assert!(ShmSegment::open("sl-does-not-exist").is_err());
    }

    #[test]
    fn test_drop_of_owner_unlinks_name() {
        let name = {
            let seg = ShmSegment::create(4).unwrap();
            seg.name().to_string()
        };
        assert!(ShmSegment::open(&name).is_err());
    }

    #[test]
    fn test_drop_of_opened_view_keeps_segment() {
        let mut created = ShmSegment::create(4).unwrap();
        created.as_mut_slice().copy_from_slice(&[1, 2, 3, 4]);
        {
            let view = ShmSegment::open(created.name()).unwrap();
            assert_eq!(view.as_slice(), &[1, 2, 3, 4]);
        }
        // The creator's mapping and name survive the view being dropped.
        let again = ShmSegment::open(created.name()).unwrap();
        assert_eq!(again.as_slice(), &[1, 2, 3, 4]);
    }
}
