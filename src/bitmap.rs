//! Management of data bitmap and inode bitmap.
//! One byte per unit: 0 is free, 1 is used. The bitmap is mirrored in memory
//! while mounted and every change is written through together with the
//! superblock's free counter.

use crate::error::{FsError, Result};
use crate::superblock::write_superblock;
use crate::{BlockDevice, SuperBlock};

const FREE: u8 = 0;
const USED: u8 = 1;

/// Which superblock counter a bitmap keeps in lock-step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitmapKind {
    Data,
    Inode,
}

#[derive(Debug)]
pub struct Bitmap {
    kind: BitmapKind,
    offset: u64, // Byte offset of the bitmap region
    map: Vec<u8>,
}

impl Bitmap {
    /// Zero-fills and persists a fresh bitmap of `units` entries.
    pub fn create(
        device: &impl BlockDevice,
        kind: BitmapKind,
        offset: u64,
        units: u32,
    ) -> Result<Self> {
        let bitmap = Self {
            kind,
            offset,
            map: vec![FREE; units as usize],
        };
        bitmap.flush(device)?;
        log::debug!("{:?} bitmap created with {} units", kind, units);
        Ok(bitmap)
    }

    /// Reads a persisted bitmap back into memory.
    /// Fails with `CorruptFilesystem` when the bytes disagree with the superblock.
    pub fn load(
        device: &impl BlockDevice,
        superblock: &SuperBlock,
        kind: BitmapKind,
        offset: u64,
        units: u32,
    ) -> Result<Self> {
        let mut map = vec![FREE; units as usize];
        device.read_at(offset, &mut map)?;
        if map.iter().any(|&byte| byte != FREE && byte != USED) {
            log::error!("{:?} bitmap holds bytes other than 0 and 1", kind);
            return Err(FsError::CorruptFilesystem);
        }

        let bitmap = Self { kind, offset, map };
        let (total, free) = bitmap.counters(superblock);
        if bitmap.used() != (total - free) as usize {
            log::error!(
                "{:?} bitmap marks {} used but the superblock says {}",
                kind,
                bitmap.used(),
                total - free
            );
            return Err(FsError::CorruptFilesystem);
        }
        Ok(bitmap)
    }

    /// Writes the whole in-memory bitmap back.
    pub fn flush(&self, device: &impl BlockDevice) -> Result<()> {
        device.write_at(self.offset, &self.map)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Count of units marked used.
    pub fn used(&self) -> usize {
        self.map.iter().filter(|&&byte| byte == USED).count()
    }

    pub fn is_free(&self, index: u32) -> Result<bool> {
        self.map
            .get(index as usize)
            .map(|&byte| byte == FREE)
            .ok_or(FsError::InvalidIndex(index))
    }

    pub fn mark_used(
        &mut self,
        device: &impl BlockDevice,
        superblock: &mut SuperBlock,
        index: u32,
    ) -> Result<()> {
        self.set(device, superblock, index, USED)
    }

    pub fn mark_free(
        &mut self,
        device: &impl BlockDevice,
        superblock: &mut SuperBlock,
        index: u32,
    ) -> Result<()> {
        self.set(device, superblock, index, FREE)
    }

    /// First free unit, scanning from 0.
    /// The scan is skipped when the superblock already reports nothing free.
    pub fn next_free(&self, superblock: &SuperBlock) -> Result<u32> {
        let (_, free) = self.counters(superblock);
        if free == 0 {
            log::warn!("no free unit left in {:?} bitmap", self.kind);
            return Err(FsError::OutOfSpace);
        }
        match self.map.iter().position(|&byte| byte == FREE) {
            Some(index) => Ok(index as u32),
            None => {
                log::error!("{:?} bitmap is full but {} units are counted free", self.kind, free);
                Err(FsError::CorruptFilesystem)
            }
        }
    }

    fn set(
        &mut self,
        device: &impl BlockDevice,
        superblock: &mut SuperBlock,
        index: u32,
        value: u8,
    ) -> Result<()> {
        let current = *self.map.get(index as usize).ok_or(FsError::InvalidIndex(index))?;
        if current == value {
            return Err(FsError::InvalidState(index));
        }

        // Memory follows the device, one region at a time.
        device.write_at(self.offset + index as u64, &[value])?;
        self.map[index as usize] = value;

        let mut updated = *superblock;
        let counter = match self.kind {
            BitmapKind::Data => &mut updated.free_data_blocks,
            BitmapKind::Inode => &mut updated.free_inodes,
        };
        if value == USED {
            *counter -= 1;
        } else {
            *counter += 1;
        }
        write_superblock(device, &updated)?;
        *superblock = updated;
        log::trace!("{:?} unit {} set to {}", self.kind, index, value);
        Ok(())
    }

    fn counters(&self, superblock: &SuperBlock) -> (u32, u32) {
        match self.kind {
            BitmapKind::Data => (superblock.total_data_blocks, superblock.free_data_blocks),
            BitmapKind::Inode => (superblock.total_inodes, superblock.free_inodes),
        }
    }
}
