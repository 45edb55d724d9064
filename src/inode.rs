//! Management of reading and writing to inodes.
//! Record positions come from `Layout::inode_offset`, validity from the inode bitmap.

use crate::config::INODE_SIZE;
use crate::error::{FsError, Result};
use crate::bitmap::Bitmap;
use crate::layout::Layout;
use crate::{BlockDevice, Inode, SuperBlock};

fn check_bounds(superblock: &SuperBlock, inode_id: u32) -> Result<()> {
    if inode_id >= superblock.total_inodes {
        return Err(FsError::InvalidInode(inode_id));
    }
    Ok(())
}

fn check_allocated(superblock: &SuperBlock, bitmap: &Bitmap, inode_id: u32) -> Result<()> {
    check_bounds(superblock, inode_id)?;
    if bitmap.is_free(inode_id)? {
        log::warn!("inode {} is not allocated", inode_id);
        return Err(FsError::InodeNotAllocated(inode_id));
    }
    Ok(())
}

/// Marks inode `inode_id` used. The record itself is written by a later `write_inode`.
pub fn alloc_inode(
    device: &impl BlockDevice,
    superblock: &mut SuperBlock,
    bitmap: &mut Bitmap,
    inode_id: u32,
) -> Result<()> {
    check_bounds(superblock, inode_id)?;
    if !bitmap.is_free(inode_id)? {
        return Err(FsError::InodeAlreadyAllocated(inode_id));
    }
    bitmap.mark_used(device, superblock, inode_id)?;
    log::trace!("inode {} allocated", inode_id);
    Ok(())
}

pub fn get_inode(
    device: &impl BlockDevice,
    layout: &Layout,
    superblock: &SuperBlock,
    bitmap: &Bitmap,
    inode_id: u32,
) -> Result<Inode> {
    check_allocated(superblock, bitmap, inode_id)?;
    let mut buf = [0u8; INODE_SIZE];
    device.read_at(layout.inode_offset(inode_id), &mut buf)?;
    let inode = Inode::decode(&buf)?;
    let needed = (inode.size as u64).div_ceil(layout.block_size);
    if needed > inode.blocks() as u64 {
        log::error!(
            "inode {} holds {} bytes in only {} blocks",
            inode_id,
            inode.size,
            inode.blocks()
        );
        return Err(FsError::CorruptFilesystem);
    }
    Ok(inode)
}

pub fn write_inode(
    device: &impl BlockDevice,
    layout: &Layout,
    superblock: &SuperBlock,
    bitmap: &Bitmap,
    inode_id: u32,
    inode: &Inode,
) -> Result<()> {
    check_allocated(superblock, bitmap, inode_id)?;
    device.write_at(layout.inode_offset(inode_id), &inode.encode())?;
    Ok(())
}

/// Marks inode `inode_id` free. Its data blocks are the caller's to release.
pub fn free_inode(
    device: &impl BlockDevice,
    superblock: &mut SuperBlock,
    bitmap: &mut Bitmap,
    inode_id: u32,
) -> Result<()> {
    check_allocated(superblock, bitmap, inode_id)?;
    bitmap.mark_free(device, superblock, inode_id)?;
    log::trace!("inode {} freed", inode_id);
    Ok(())
}
