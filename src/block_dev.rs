use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::Result;


pub trait BlockDevice: Send + Sync {
    /// Returns the size of the underlying storage in bytes.
    fn size(&self) -> Result<u64>;

    /// Reads exactly buf.len() bytes starting at the byte offset.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// Writes the whole buffer starting at the byte offset.
    /// Returns the number of bytes written.
    fn write_at(&self, offset: u64, buf: &[u8]) -> Result<usize>;

    /// Flushes any buffered data down to the storage.
    fn flush(&self) -> Result<()>;

    /// Reads a whole block. buf.len() is the block size.
    fn read_block(&self, block_id: u64, buf: &mut [u8]) -> Result<()> {
        self.read_at(block_id * buf.len() as u64, buf)
    }

    /// Writes a whole block. buf.len() is the block size.
    fn write_block(&self, block_id: u64, buf: &[u8]) -> Result<usize> {
        self.write_at(block_id * buf.len() as u64, buf)
    }
}

/// A partition backed by a host file, opened once for the whole mount.
#[derive(Debug)]
pub struct BlockFile {
    file: File,
}

impl BlockFile {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::options().read(true).write(true).open(path)?;
        Ok(Self { file })
    }

    pub fn new(file: File) -> Self {
        Self { file }
    }
}

impl BlockDevice for BlockFile {
    fn size(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let mut file = &self.file;
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)?;
        log::trace!("read {} bytes at {:#x}", buf.len(), offset);
        Ok(())
    }

    fn write_at(&self, offset: u64, buf: &[u8]) -> Result<usize> {
        let mut file = &self.file;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(buf)?;
        log::trace!("wrote {} bytes at {:#x}", buf.len(), offset);
        Ok(buf.len())
    }

    fn flush(&self) -> Result<()> {
        self.file.sync_data()?;
        Ok(())
    }
}
