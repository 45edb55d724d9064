use std::io::ErrorKind;

use crate::config::*;
use crate::error::{FsError, Result};
use crate::{BlockDevice, SuperBlock};


pub fn read_superblock<D: BlockDevice>(device: &D) -> Result<SuperBlock> {
    let mut buf = [0u8; SUPERBLOCK_SIZE];
    match device.read_at(0, &mut buf) {
        Ok(()) => {}
        Err(FsError::Io(e)) if e.kind() == ErrorKind::UnexpectedEof => {
            log::error!("partition is shorter than a superblock");
            return Err(FsError::CorruptFilesystem);
        }
        Err(e) => return Err(e),
    }
    let superblock = SuperBlock::decode(&buf);

    if superblock.magic != MAGIC {
        log::error!("bad magic number {:#x}", superblock.magic);
        return Err(FsError::CorruptFilesystem);
    }
    if !BLOCK_SIZES.contains(&superblock.block_size) {
        log::error!("bad block size {}", superblock.block_size);
        return Err(FsError::CorruptFilesystem);
    }
    if superblock.free_data_blocks > superblock.total_data_blocks
        || superblock.free_inodes > superblock.total_inodes
    {
        log::error!("free counters exceed totals: {:?}", superblock);
        return Err(FsError::CorruptFilesystem);
    }

    Ok(superblock)
}

/// Writes the superblock fields. The rest of block 0 is left as formatted.
pub fn write_superblock<D: BlockDevice>(device: &D, superblock: &SuperBlock) -> Result<()> {
    device.write_at(0, &superblock.encode())?;
    Ok(())
}
