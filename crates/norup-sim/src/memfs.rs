//! In-memory filesystem backing store
//!
//! Stands in for the FAT volume on the real board. Paths arrive from the
//! router with their leading separator still attached ("/firmware.bin");
//! it is stripped before lookup.

use std::collections::BTreeMap;

use norup_core::xfer::Filesystem;

/// In-memory filesystem
#[derive(Default)]
pub struct MemFs {
    files: BTreeMap<String, Vec<u8>>,
    open_handles: u32,
}

/// Handle to an open [`MemFs`] file
#[derive(Debug)]
pub struct MemFile {
    path: String,
}

impl MemFs {
    /// An empty filesystem
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a file with the given contents.
    pub fn insert(&mut self, path: &str, data: &[u8]) {
        self.files.insert(normalize(path).to_string(), data.to_vec());
    }

    /// Contents of a file, if it exists
    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.files.get(normalize(path)).map(Vec::as_slice)
    }

    /// Number of handles currently open
    pub fn open_handles(&self) -> u32 {
        self.open_handles
    }
}

fn normalize(path: &str) -> &str {
    path.trim_start_matches('/')
}

impl Filesystem for MemFs {
    type File = MemFile;

    fn file_size(&mut self, path: &str) -> Option<u32> {
        self.files.get(normalize(path)).map(|data| data.len() as u32)
    }

    fn open_read(&mut self, path: &str) -> Option<MemFile> {
        let path = normalize(path);
        if !self.files.contains_key(path) {
            return None;
        }
        self.open_handles += 1;
        Some(MemFile { path: path.to_string() })
    }

    fn create(&mut self, path: &str) -> Option<MemFile> {
        let path = normalize(path);
        if path.is_empty() {
            return None;
        }
        self.files.insert(path.to_string(), Vec::new());
        self.open_handles += 1;
        Some(MemFile { path: path.to_string() })
    }

    fn read_at(&mut self, file: &mut MemFile, offset: u32, buf: &mut [u8]) -> Option<usize> {
        let data = self.files.get(&file.path)?;
        let offset = offset as usize;
        if offset > data.len() {
            return None;
        }
        let end = (offset + buf.len()).min(data.len());
        let count = end - offset;
        buf[..count].copy_from_slice(&data[offset..end]);
        Some(count)
    }

    fn write_at(&mut self, file: &mut MemFile, offset: u32, data: &[u8]) -> Option<usize> {
        let contents = self.files.get_mut(&file.path)?;
        let offset = offset as usize;
        if contents.len() < offset + data.len() {
            contents.resize(offset + data.len(), 0);
        }
        contents[offset..offset + data.len()].copy_from_slice(data);
        Some(data.len())
    }

    fn close(&mut self, _file: MemFile) {
        self.open_handles = self.open_handles.saturating_sub(1);
    }
}
