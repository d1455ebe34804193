// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Read-only access to physical memory through `/dev/mem`.
//!
//! The device is opened with `O_SYNC`, which makes the kernel map the range
//! uncached, as required for memory that the hypervisor can change at any
//! time.

#![cfg(target_os = "linux")]
// UNSAFETY: Calling mmap/munmap and reading the mapped range.
#![expect(unsafe_code)]

use generation_id_guest::MappedRegion;
use generation_id_guest::PhysicalAddress;
use generation_id_guest::PhysicalMapper;
use fs_err::os::unix::fs::OpenOptionsExt;
use std::ffi::c_void;
use std::io;
use std::os::fd::AsRawFd;
use std::path::Path;
use std::ptr::NonNull;

/// Default path of the physical memory device.
pub const DEV_MEM: &str = "/dev/mem";

/// An open physical memory device.
#[derive(Debug)]
pub struct DevMem {
    file: fs_err::File,
}

impl DevMem {
    /// Opens [`DEV_MEM`].
    pub fn open() -> io::Result<Self> {
        Self::open_path(DEV_MEM.as_ref())
    }

    /// Opens the memory device at `path`.
    pub fn open_path(path: &Path) -> io::Result<Self> {
        let file = fs_err::OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_SYNC)
            .open(path)?;
        Ok(Self { file })
    }

    /// Maps `len` bytes starting at physical address `address`, read-only.
    ///
    /// `address` need not be page aligned; the containing pages are mapped.
    pub fn map(&self, address: u64, len: usize) -> io::Result<Mapping> {
        if len == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "cannot map an empty range",
            ));
        }

        let page_size = page_size();
        let offset = (address % page_size as u64) as usize;
        let base = address - offset as u64;
        let map_len = offset
            .checked_add(len)
            .and_then(|end| end.checked_next_multiple_of(page_size))
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "range too large"))?;
        let file_offset = libc::off_t::try_from(base).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("address {address:#x} is out of range"),
            )
        })?;

        // SAFETY: The file descriptor is valid and no address is being passed.
        // The result is being validated.
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                map_len,
                libc::PROT_READ,
                libc::MAP_SHARED,
                self.file.file().as_raw_fd(),
                file_offset,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }
        let ptr = NonNull::new(ptr).ok_or_else(|| io::Error::other("mmap returned null"))?;

        tracing::trace!(address, len, map_len, "mapped physical memory");
        Ok(Mapping {
            ptr,
            map_len,
            offset,
            len,
        })
    }
}

impl PhysicalMapper for DevMem {
    type Region = Mapping;

    fn map(&self, address: PhysicalAddress, len: usize) -> io::Result<Mapping> {
        DevMem::map(self, address.get(), len)
    }
}

/// A read-only mapping of physical memory, unmapped on drop.
#[derive(Debug)]
pub struct Mapping {
    ptr: NonNull<c_void>,
    map_len: usize,
    offset: usize,
    len: usize,
}

// SAFETY: The mapping is read-only and only accessed through volatile reads,
// so it can be used from any thread.
unsafe impl Send for Mapping {}
// SAFETY: See above.
unsafe impl Sync for Mapping {}

impl Mapping {
    /// The number of bytes requested when mapping.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Copies bytes out of the mapping one volatile access at a time.
    ///
    /// Panics if `offset..offset + data.len()` is outside the requested range.
    pub fn read_volatile(&self, offset: usize, data: &mut [u8]) {
        assert!(
            offset
                .checked_add(data.len())
                .is_some_and(|end| end <= self.len),
            "read of {:#x} bytes at offset {offset:#x} is outside the {:#x} byte mapping",
            data.len(),
            self.len
        );
        let start = self.ptr.as_ptr().cast::<u8>().wrapping_add(self.offset + offset);
        for (i, b) in data.iter_mut().enumerate() {
            // SAFETY: The range was validated to be within the mapping above.
            *b = unsafe { std::ptr::read_volatile(start.add(i)) };
        }
    }
}

impl MappedRegion for Mapping {
    fn read_volatile(&self, offset: usize, data: &mut [u8]) {
        Mapping::read_volatile(self, offset, data)
    }
}

impl Drop for Mapping {
    fn drop(&mut self) {
        // SAFETY: The address and length are a valid mmap result.
        unsafe {
            libc::munmap(self.ptr.as_ptr(), self.map_len);
        }
    }
}

fn page_size() -> usize {
    // SAFETY: sysconf has no preconditions.
    unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize }
}

#[cfg(test)]
mod tests {
    use super::*;
    use generation_id_guest::MemoryWindow;
    use std::io::Write;
    use test_with_tracing::test;

    /// A file standing in for physical memory, with byte `i` of page `p`
    /// holding `(p + i) as u8`.
    fn fake_memory(pages: usize) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let page_size = page_size();
        let contents: Vec<u8> = (0..pages * page_size)
            .map(|i| (i / page_size + i % page_size) as u8)
            .collect();
        file.write_all(&contents).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn reads_unaligned_range() {
        let memory = fake_memory(2);
        let devmem = DevMem::open_path(memory.path()).unwrap();
        let address = page_size() as u64 + 0x40;

        let mapping = devmem.map(address, 16).unwrap();
        assert_eq!(mapping.len(), 16);
        let mut data = [0; 16];
        mapping.read_volatile(0, &mut data);
        let expected: Vec<u8> = (0..16).map(|i| (1 + 0x40 + i) as u8).collect();
        assert_eq!(&data[..], &expected[..]);
    }

    #[test]
    fn reads_range_crossing_pages() {
        let memory = fake_memory(2);
        let devmem = DevMem::open_path(memory.path()).unwrap();
        let address = page_size() as u64 - 8;

        let mut data = [0; 16];
        devmem.map(address, 16).unwrap().read_volatile(0, &mut data);
        let page_size = page_size();
        let expected: Vec<u8> = (page_size - 8..page_size + 8)
            .map(|i| (i / page_size + i % page_size) as u8)
            .collect();
        assert_eq!(&data[..], &expected[..]);
    }

    #[test]
    fn serves_memory_window() {
        let memory = fake_memory(1);
        let devmem = DevMem::open_path(memory.path()).unwrap();
        let window = MemoryWindow::new(&devmem);

        let id = window
            .read_physical(PhysicalAddress::from_halves(0x10, 0))
            .unwrap();
        let expected: [u8; 16] = std::array::from_fn(|i| (0x10 + i) as u8);
        assert_eq!(id.to_bytes(), expected);
    }

    #[test]
    #[should_panic(expected = "outside the 0x10 byte mapping")]
    fn rejects_out_of_bounds_read() {
        let memory = fake_memory(1);
        let devmem = DevMem::open_path(memory.path()).unwrap();
        let mapping = devmem.map(0, 16).unwrap();
        mapping.read_volatile(8, &mut [0; 16]);
    }

    #[test]
    fn rejects_empty_and_out_of_range_requests() {
        let memory = fake_memory(1);
        let devmem = DevMem::open_path(memory.path()).unwrap();

        assert_eq!(
            devmem.map(0, 0).unwrap_err().kind(),
            io::ErrorKind::InvalidInput
        );
        assert_eq!(
            devmem.map(u64::MAX & !0xfff, 16).unwrap_err().kind(),
            io::ErrorKind::InvalidInput
        );
    }

    #[test]
    fn missing_device_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mem");
        let err = DevMem::open_path(&path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(err.to_string().contains(&*path.to_string_lossy()), "{err}");
    }
}
