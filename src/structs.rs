use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::*;
use crate::error::{FsError, Result};

/// In-memory copy of the on-disk superblock.
/// Stored at offset 0 as eight little-endian u32 fields in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuperBlock {
    pub magic: u32,             // Magic number to identify the filesystem
    pub block_size: u32,        // One of BLOCK_SIZES
    pub total_blocks: u32,      // Total number of blocks in the partition
    pub total_data_blocks: u32, // Number of blocks in the data region
    pub free_data_blocks: u32,
    pub total_inodes: u32,
    pub free_inodes: u32,
    pub inode_blocks: u32,      // Blocks reserved for the inode table
}

impl SuperBlock {
    pub fn encode(&self) -> [u8; SUPERBLOCK_SIZE] {
        let fields = [
            self.magic,
            self.block_size,
            self.total_blocks,
            self.total_data_blocks,
            self.free_data_blocks,
            self.total_inodes,
            self.free_inodes,
            self.inode_blocks,
        ];
        let mut buf = [0u8; SUPERBLOCK_SIZE];
        for (chunk, field) in buf.chunks_exact_mut(4).zip(fields) {
            chunk.copy_from_slice(&field.to_le_bytes());
        }
        buf
    }

    pub fn decode(buf: &[u8; SUPERBLOCK_SIZE]) -> Self {
        let mut fields = [0u32; SUPERBLOCK_FIELDS];
        for (field, chunk) in fields.iter_mut().zip(buf.chunks_exact(4)) {
            *field = read_u32(chunk);
        }
        let [magic, block_size, total_blocks, total_data_blocks, free_data_blocks, total_inodes, free_inodes, inode_blocks] =
            fields;
        Self {
            magic,
            block_size,
            total_blocks,
            total_data_blocks,
            free_data_blocks,
            total_inodes,
            free_inodes,
            inode_blocks,
        }
    }
}

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Regular = 1,
}

impl TryFrom<u32> for FileType {
    type Error = FsError;

    fn try_from(tag: u32) -> Result<Self> {
        match tag {
            1 => Ok(FileType::Regular),
            _ => Err(FsError::CorruptFilesystem),
        }
    }
}

/// Fixed-size inode record.
/// A slot of the inode table is meaningful only while its inode bitmap entry is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inode {
    pub size: u32,
    pub last_modification: u32,
    pub last_access: u32,
    pub ftype: FileType,
    pub direct_ptrs: [Option<u32>; NUM_DIRECT_PTRS], // Data block indices, slot 0 is the first block
}

impl Inode {
    /// A fresh, empty regular file owning a single data block.
    pub fn new(first_block: u32) -> Self {
        let now = now();
        let mut direct_ptrs = [None; NUM_DIRECT_PTRS];
        direct_ptrs[0] = Some(first_block);
        Self {
            size: 0,
            last_modification: now,
            last_access: now,
            ftype: FileType::Regular,
            direct_ptrs,
        }
    }

    /// Number of populated block slots.
    pub fn blocks(&self) -> usize {
        self.direct_ptrs.iter().take_while(|ptr| ptr.is_some()).count()
    }

    pub fn encode(&self) -> [u8; INODE_SIZE] {
        let mut buf = [0u8; INODE_SIZE];
        let head = [self.size, self.last_modification, self.last_access, self.ftype as u32];
        let ptrs = self.direct_ptrs.map(|ptr| ptr.unwrap_or(EMPTY_PTR));
        for (chunk, field) in buf.chunks_exact_mut(4).zip(head.into_iter().chain(ptrs)) {
            chunk.copy_from_slice(&field.to_le_bytes());
        }
        buf
    }

    pub fn decode(buf: &[u8; INODE_SIZE]) -> Result<Self> {
        let mut direct_ptrs = [None; NUM_DIRECT_PTRS];
        for (ptr, chunk) in direct_ptrs.iter_mut().zip(buf[16..].chunks_exact(4)) {
            *ptr = match read_u32(chunk) {
                EMPTY_PTR => None,
                block => Some(block),
            };
        }
        Ok(Self {
            size: read_u32(&buf[0..4]),
            last_modification: read_u32(&buf[4..8]),
            last_access: read_u32(&buf[8..12]),
            ftype: FileType::try_from(read_u32(&buf[12..16]))?,
            direct_ptrs,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    pub name: [u8; MAX_FILE_NAME_LEN], // NUL padded, not NUL terminated when full
    pub inode_id: u32,
}

impl DirEntry {
    pub const NULL: Self = Self {
        name: [0; MAX_FILE_NAME_LEN],
        inode_id: 0,
    };

    pub fn new(inode_id: u32, name: &[u8]) -> Result<Self> {
        if name.is_empty() || name.len() > MAX_FILE_NAME_LEN || name.contains(&0) {
            return Err(FsError::InvalidFileName);
        }
        Ok(Self {
            name: {
                let mut arr = [0; MAX_FILE_NAME_LEN];
                arr[..name.len()].copy_from_slice(name);
                arr
            },
            inode_id,
        })
    }

    pub fn encode(&self) -> [u8; DIR_ENTRY_SIZE] {
        let mut buf = [0u8; DIR_ENTRY_SIZE];
        buf[..MAX_FILE_NAME_LEN].copy_from_slice(&self.name);
        buf[MAX_FILE_NAME_LEN..].copy_from_slice(&self.inode_id.to_le_bytes());
        buf
    }

    pub fn decode(buf: &[u8]) -> Self {
        let mut name = [0; MAX_FILE_NAME_LEN];
        name.copy_from_slice(&buf[..MAX_FILE_NAME_LEN]);
        Self {
            name,
            inode_id: read_u32(&buf[MAX_FILE_NAME_LEN..DIR_ENTRY_SIZE]),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeUnit {
    KB,
    MB,
    GB,
}

impl SizeUnit {
    pub fn multiplier(self) -> u64 {
        match self {
            SizeUnit::KB => KB,
            SizeUnit::MB => MB,
            SizeUnit::GB => GB,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Start,
    Current,
    End,
}

/// Maps the classic SEEK_SET / SEEK_CUR / SEEK_END values.
impl TryFrom<i32> for Whence {
    type Error = FsError;

    fn try_from(base: i32) -> Result<Self> {
        match base {
            0 => Ok(Whence::Start),
            1 => Ok(Whence::Current),
            2 => Ok(Whence::End),
            _ => Err(FsError::InvalidWhence(base)),
        }
    }
}

pub(crate) fn read_u32(bytes: &[u8]) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[..4]);
    u32::from_le_bytes(word)
}

/// Seconds since the epoch, truncated to the 32-bit on-disk field.
pub(crate) fn now() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as u32)
        .unwrap_or(0)
}
