//! Network flash-programming protocol router
//!
//! Maps inbound GET/PUT block-transfer requests onto one of three backing
//! stores: the raw NOR flash, a serial (EEPROM-style) flash, or a file
//! inside a mounted filesystem. The transport layer delivering the
//! request/get/put/close callbacks is an external collaborator; it invokes
//! the router synchronously, one operation at a time.
//!
//! Flash-backed PUTs erase a physical block whenever a block's offset lands
//! exactly on an erase-block boundary. This relies on the transfer block
//! size evenly dividing the erase-block size, a deployment invariant the
//! router does not verify itself.

use core::fmt;

use crate::bus::FlashBus;
use crate::image::ImageHeader;
use crate::nor::NorFlash;

/// Fixed transfer block size of the network protocol, in bytes
pub const BLOCK_SIZE: u32 = 512;

/// Longest resource name a session keeps around for diagnostics
const NAME_CAPACITY: usize = 64;

/// Error codes surfaced to the remote client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XferCode {
    /// Undefined error; the diagnostic string says more
    NotDefined = 0,
    /// The requested resource does not exist
    FileNotFound = 1,
    /// The resource exists but cannot be accessed right now
    AccessViolation = 2,
}

/// Protocol-level failure: a short enumerated code plus a diagnostic string
/// passed back to the remote client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XferError {
    /// Wire error code
    pub code: XferCode,
    /// Short human-readable diagnostic
    pub detail: &'static str,
}

impl XferError {
    fn not_defined(detail: &'static str) -> Self {
        Self { code: XferCode::NotDefined, detail }
    }

    fn file_not_found(detail: &'static str) -> Self {
        Self { code: XferCode::FileNotFound, detail }
    }

    fn access_violation(detail: &'static str) -> Self {
        Self { code: XferCode::AccessViolation, detail }
    }
}

impl fmt::Display for XferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error {}: {}", self.code as u16, self.detail)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for XferError {}

/// Direction of a transfer, from the client's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Client reads from a backing store
    Get,
    /// Client writes into a backing store
    Put,
}

impl Direction {
    fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Put => "PUT",
        }
    }
}

/// Serial (EEPROM-style) flash backing-store contract
///
/// The device behind this is driven by its own command set; the router only
/// relies on the read/write/erase shape of it.
pub trait SerialStore {
    /// Erase granularity in bytes
    fn sector_size(&self) -> u32;
    /// Read into `buf` at `offset`; returns the number of bytes read
    fn read(&mut self, offset: u32, buf: &mut [u8]) -> usize;
    /// Write `data` at `offset`; returns the number of bytes written
    fn write(&mut self, offset: u32, data: &[u8]) -> usize;
    /// Erase the sector containing `offset`
    fn erase_sector(&mut self, offset: u32) -> bool;
}

/// Filesystem backing-store contract (FAT or similar, external collaborator)
pub trait Filesystem {
    /// Open-file handle
    type File;

    /// Size of the named file, or `None` if it does not exist
    fn file_size(&mut self, path: &str) -> Option<u32>;
    /// Open an existing file for reading
    fn open_read(&mut self, path: &str) -> Option<Self::File>;
    /// Create or truncate a file for writing
    fn create(&mut self, path: &str) -> Option<Self::File>;
    /// Read into `buf` at `offset`; `None` on I/O failure
    fn read_at(&mut self, file: &mut Self::File, offset: u32, buf: &mut [u8]) -> Option<usize>;
    /// Write `data` at `offset`; `None` on I/O failure
    fn write_at(&mut self, file: &mut Self::File, offset: u32, data: &[u8]) -> Option<usize>;
    /// Close the handle
    fn close(&mut self, file: Self::File);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backing {
    Serial,
    Nor,
    File,
}

/// The router's record of one in-flight transfer
#[derive(Debug)]
pub struct TransferSession<FH> {
    backing: Backing,
    dir: Direction,
    /// Most recent block number handled, 1-based
    pub block: u32,
    /// Bytes left to send on a GET; zero means an empty transfer
    pub bytes_remaining: u32,
    file: Option<FH>,
    name: heapless::String<NAME_CAPACITY>,
}

impl<FH> TransferSession<FH> {
    fn new(backing: Backing, dir: Direction, name: &str) -> Self {
        let mut stored = heapless::String::new();
        for ch in name.chars() {
            if stored.push(ch).is_err() {
                break;
            }
        }
        Self {
            backing,
            dir,
            block: 0,
            bytes_remaining: 0,
            file: None,
            name: stored,
        }
    }

    /// The resource name the session was opened for
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Transfer direction
    pub fn direction(&self) -> Direction {
        self.dir
    }
}

/// Routes block-transfer requests to the right backing store
///
/// At most one filesystem-backed session can be open at a time; a singleton
/// flag guards the shared file handle underneath.
pub struct Router<B: FlashBus, S: SerialStore, F: Filesystem> {
    nor: Option<NorFlash<B>>,
    serial: S,
    fs: F,
    fs_prefix: &'static str,
    fs_busy: bool,
}

impl<B: FlashBus, S: SerialStore, F: Filesystem> Router<B, S, F> {
    /// Create a router over the given backing stores.
    ///
    /// `nor` is `None` when the flash device was not detected at probe
    /// time; requests for it are then rejected as not found.
    pub fn new(nor: Option<NorFlash<B>>, serial: S, fs: F) -> Self {
        Self {
            nor,
            serial,
            fs,
            fs_prefix: "sdcard",
            fs_busy: false,
        }
    }

    /// Override the resource-name prefix that routes to the filesystem.
    pub fn with_fs_prefix(mut self, prefix: &'static str) -> Self {
        self.fs_prefix = prefix;
        self
    }

    /// The NOR device, if one was detected
    pub fn nor_mut(&mut self) -> Option<&mut NorFlash<B>> {
        self.nor.as_mut()
    }

    /// Whether a filesystem-backed session is currently open
    pub fn fs_busy(&self) -> bool {
        self.fs_busy
    }

    fn serial_image_size(&mut self) -> u32 {
        let mut raw = [0u8; ImageHeader::LEN];
        if self.serial.read(0, &mut raw) != raw.len() {
            return 0;
        }
        ImageHeader::probe(&raw).map_or(0, |header| header.len)
    }

    fn fs_path<'n>(&self, name: &'n str) -> Option<&'n str> {
        let head = name.get(..self.fs_prefix.len())?;
        if head.eq_ignore_ascii_case(self.fs_prefix) {
            name.get(self.fs_prefix.len()..)
        } else {
            None
        }
    }

    /// Route a new request to a backing store.
    ///
    /// Resource names are matched case-insensitively: `"eeprom"` is the
    /// serial flash, `"extflash"` the raw NOR device, and anything starting
    /// with the filesystem prefix is a file path inside the mounted
    /// filesystem. For GETs the image header decides `bytes_remaining`; a
    /// missing header is an empty transfer, not an error.
    pub fn request(
        &mut self,
        dir: Direction,
        name: &str,
    ) -> Result<TransferSession<F::File>, XferError> {
        log::info!("incoming {} request for {:?}", dir.as_str(), name);

        if name.eq_ignore_ascii_case("eeprom") {
            let mut session = TransferSession::new(Backing::Serial, dir, name);
            if dir == Direction::Get {
                session.bytes_remaining = self.serial_image_size();
            }
            return Ok(session);
        }

        if name.eq_ignore_ascii_case("extflash") {
            let Some(nor) = self.nor.as_mut() else {
                return Err(XferError::file_not_found("File not found."));
            };
            let mut session = TransferSession::new(Backing::Nor, dir, name);
            if dir == Direction::Get {
                session.bytes_remaining = nor.image_size();
            }
            return Ok(session);
        }

        if let Some(path) = self.fs_path(name) {
            if self.fs_busy {
                // Only one file handle exists; the open session keeps it.
                return Err(XferError::access_violation(
                    "Can't support overlapping requests.",
                ));
            }

            let mut session = TransferSession::new(Backing::File, dir, name);
            match dir {
                Direction::Get => {
                    let Some(size) = self.fs.file_size(path) else {
                        return Err(XferError::file_not_found("File not found."));
                    };
                    let Some(file) = self.fs.open_read(path) else {
                        return Err(XferError::not_defined("Error opening file."));
                    };
                    session.bytes_remaining = size;
                    session.file = Some(file);
                }
                Direction::Put => {
                    let Some(file) = self.fs.create(path) else {
                        return Err(XferError::not_defined("Error opening file."));
                    };
                    session.file = Some(file);
                }
            }
            self.fs_busy = true;
            return Ok(session);
        }

        Err(XferError::file_not_found("File not found."))
    }

    /// Fill `buf` with the data for `block` of a GET transfer.
    pub fn get_block(
        &mut self,
        session: &mut TransferSession<F::File>,
        block: u32,
        buf: &mut [u8],
    ) -> Result<(), XferError> {
        session.block = block;
        let offset = block.saturating_sub(1) * BLOCK_SIZE;

        match session.backing {
            Backing::Serial => {
                if self.serial.read(offset, buf) != buf.len() {
                    return Err(XferError::not_defined("Serial flash read error."));
                }
                Ok(())
            }
            Backing::Nor => {
                let Some(nor) = self.nor.as_mut() else {
                    return Err(XferError::not_defined("Flash not present."));
                };
                // Direct copy out of the memory-mapped window.
                nor.read(offset, buf);
                Ok(())
            }
            Backing::File => {
                let Some(file) = session.file.as_mut() else {
                    return Err(XferError::not_defined("No open file."));
                };
                match self.fs.read_at(file, offset, buf) {
                    Some(read) if read == buf.len() => Ok(()),
                    _ => Err(XferError::not_defined("File read error.")),
                }
            }
        }
    }

    /// Write the data for `block` of a PUT transfer.
    ///
    /// For the flash-backed stores, a block landing exactly on an
    /// erase-block boundary erases that physical block before programming.
    pub fn put_block(
        &mut self,
        session: &mut TransferSession<F::File>,
        block: u32,
        data: &[u8],
    ) -> Result<(), XferError> {
        session.block = block;
        let offset = block.saturating_sub(1) * BLOCK_SIZE;

        match session.backing {
            Backing::Serial => {
                if offset % self.serial.sector_size() == 0 {
                    // New sector; erase before programming.
                    if !self.serial.erase_sector(offset) {
                        return Err(XferError::not_defined("Flash erase failure."));
                    }
                }
                if self.serial.write(offset, data) != data.len() {
                    return Err(XferError::not_defined("Flash write failure."));
                }
                Ok(())
            }
            Backing::Nor => {
                let Some(nor) = self.nor.as_mut() else {
                    return Err(XferError::not_defined("Flash not present."));
                };
                let info = nor.block_info(offset);
                if info.is_valid() && info.start == offset {
                    // This block starts a new physical erase block.
                    if nor.erase_block(info.start).is_err() {
                        return Err(XferError::not_defined("Flash erase failure."));
                    }
                }
                if nor.write(offset, data).is_err() {
                    return Err(XferError::not_defined("Flash write failure."));
                }
                Ok(())
            }
            Backing::File => {
                let Some(file) = session.file.as_mut() else {
                    return Err(XferError::not_defined("No open file."));
                };
                match self.fs.write_at(file, offset, data) {
                    Some(written) if written == data.len() => Ok(()),
                    _ => Err(XferError::not_defined("File write error.")),
                }
            }
        }
    }

    /// Tear down a finished transfer.
    ///
    /// Closes the file handle and releases the filesystem slot for
    /// filesystem-backed sessions; the flash-backed stores hold no
    /// per-session resources. A session whose close notification is never
    /// delivered keeps the slot occupied; there is no timeout-based
    /// reclamation.
    pub fn close(&mut self, session: TransferSession<F::File>) {
        log::debug!("closing {} session for {:?}", session.dir.as_str(), session.name());
        if let Some(file) = session.file {
            self.fs.close(file);
        }
        if session.backing == Backing::File {
            self.fs_busy = false;
        }
    }
}
