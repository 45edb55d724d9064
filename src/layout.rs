//! Region and offset math of a formatted partition.
//! Every other module asks this one where things live on disk.
//!
//! Regions, block aligned, in this order:
//! - Superblock      1 block
//! - Data Bitmap     total_data_blocks bytes
//! - Inode Bitmap    total_inodes bytes
//! - Inode Table     total_inodes * INODE_SIZE bytes
//! - Directory       total_inodes * DIR_ENTRY_SIZE bytes
//! - Data Blocks     total_data_blocks * block_size bytes

use crate::config::*;
use crate::error::{FsError, Result};
use crate::structs::SuperBlock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub block_size: u64,
    pub data_bitmap_start: u64, // Block number where the data bitmap starts
    pub data_bitmap_blocks: u64,
    pub inode_bitmap_start: u64,
    pub inode_bitmap_blocks: u64,
    pub inode_table_start: u64,
    pub inode_table_blocks: u64,
    pub directory_start: u64,
    pub directory_blocks: u64,
    pub data_start: u64,
    pub data_blocks: u64,
}

/// Number of blocks needed to hold `bytes`.
fn blocks_for(bytes: u64, block_size: u64) -> u64 {
    bytes.div_ceil(block_size)
}

impl Layout {
    /// Derives the layout from the superblock alone.
    pub fn new(superblock: &SuperBlock) -> Self {
        let block_size = superblock.block_size as u64;
        let inodes = superblock.total_inodes as u64;
        let data_blocks = superblock.total_data_blocks as u64;

        let data_bitmap_start = 1;
        let data_bitmap_blocks = blocks_for(data_blocks, block_size);
        let inode_bitmap_start = data_bitmap_start + data_bitmap_blocks;
        let inode_bitmap_blocks = blocks_for(inodes, block_size);
        let inode_table_start = inode_bitmap_start + inode_bitmap_blocks;
        let inode_table_blocks = blocks_for(inodes * INODE_SIZE as u64, block_size);
        let directory_start = inode_table_start + inode_table_blocks;
        let directory_blocks = blocks_for(inodes * DIR_ENTRY_SIZE as u64, block_size);
        let data_start = directory_start + directory_blocks;

        Self {
            block_size,
            data_bitmap_start,
            data_bitmap_blocks,
            inode_bitmap_start,
            inode_bitmap_blocks,
            inode_table_start,
            inode_table_blocks,
            directory_start,
            directory_blocks,
            data_start,
            data_blocks,
        }
    }

    /// Plans a fresh superblock for a partition of `partition_size` bytes.
    /// `inode_ratio` percent of the blocks (rounded up) go to the inode table,
    /// and the inode count is what fits in those blocks.
    pub fn plan(partition_size: u64, block_size: u32, inode_ratio: u32) -> Result<SuperBlock> {
        if !BLOCK_SIZES.contains(&block_size) {
            return Err(FsError::InvalidBlockSize(block_size));
        }
        if inode_ratio == 0 || inode_ratio > 100 {
            return Err(FsError::InvalidInodeRatio(inode_ratio));
        }

        let bs = block_size as u64;
        let total_blocks = partition_size / bs;
        let inode_blocks = (total_blocks * inode_ratio as u64).div_ceil(100);
        let total_inodes = inode_blocks * bs / INODE_SIZE as u64;

        let inode_bitmap_blocks = blocks_for(total_inodes, bs);
        let directory_blocks = blocks_for(total_inodes * DIR_ENTRY_SIZE as u64, bs);
        let overhead = 1 + inode_bitmap_blocks + inode_blocks + directory_blocks;
        if total_inodes == 0 || total_blocks <= overhead + 1 {
            return Err(FsError::PartitionTooSmall);
        }

        // Each data bitmap block covers `bs` data blocks, so the remaining
        // blocks are shared as bs data blocks per bitmap block plus one.
        let remaining = total_blocks - overhead;
        let data_bitmap_blocks = remaining.div_ceil(bs + 1);
        let total_data_blocks = remaining - data_bitmap_blocks;

        let total_blocks = u32::try_from(total_blocks).map_err(|_| FsError::PartitionTooSmall)?;
        Ok(SuperBlock {
            magic: MAGIC,
            block_size,
            total_blocks,
            total_data_blocks: total_data_blocks as u32,
            free_data_blocks: total_data_blocks as u32,
            total_inodes: total_inodes as u32,
            free_inodes: total_inodes as u32,
            inode_blocks: inode_blocks as u32,
        })
    }

    #[inline]
    fn byte_offset(&self, block: u64) -> u64 {
        block * self.block_size
    }

    pub fn data_bitmap_offset(&self) -> u64 {
        self.byte_offset(self.data_bitmap_start)
    }

    pub fn inode_bitmap_offset(&self) -> u64 {
        self.byte_offset(self.inode_bitmap_start)
    }

    /// Byte offset of inode record `inode_id` inside the inode table.
    pub fn inode_offset(&self, inode_id: u32) -> u64 {
        self.byte_offset(self.inode_table_start) + inode_id as u64 * INODE_SIZE as u64
    }

    pub fn directory_offset(&self) -> u64 {
        self.byte_offset(self.directory_start)
    }

    /// Byte offset of directory slot `slot`.
    pub fn dir_entry_offset(&self, slot: usize) -> u64 {
        self.directory_offset() + (slot * DIR_ENTRY_SIZE) as u64
    }

    /// Byte offset of data block `index` of the data region.
    pub fn data_block_offset(&self, index: u32) -> u64 {
        self.byte_offset(self.data_start + index as u64)
    }

    /// Number of blocks the layout spans, superblock included.
    pub fn total_blocks(&self) -> u64 {
        self.data_start + self.data_blocks
    }

    /// First byte past the data region.
    pub fn end(&self) -> u64 {
        self.byte_offset(self.total_blocks())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_plan_one_mib() {
        let sb = Layout::plan(1_048_576, 4096, 10).unwrap();
        assert_eq!(sb.total_blocks, 256);
        assert_eq!(sb.inode_blocks, 26);
        assert_eq!(sb.total_inodes, 26 * 4096 / 64);
        assert_eq!(sb.free_inodes, sb.total_inodes);
        assert_eq!(sb.free_data_blocks, sb.total_data_blocks);

        let layout = Layout::new(&sb);
        assert_eq!(layout.inode_table_blocks, sb.inode_blocks as u64);
        assert_eq!(layout.data_blocks, sb.total_data_blocks as u64);
        assert!(layout.total_blocks() <= sb.total_blocks as u64);
    }

    #[test]
    fn test_regions_are_contiguous() {
        for block_size in BLOCK_SIZES {
            let sb = Layout::plan(3_000_000, block_size, 10).unwrap();
            let layout = Layout::new(&sb);
            assert_eq!(layout.data_bitmap_start, 1);
            assert_eq!(layout.inode_bitmap_start, layout.data_bitmap_start + layout.data_bitmap_blocks);
            assert_eq!(layout.inode_table_start, layout.inode_bitmap_start + layout.inode_bitmap_blocks);
            assert_eq!(layout.directory_start, layout.inode_table_start + layout.inode_table_blocks);
            assert_eq!(layout.data_start, layout.directory_start + layout.directory_blocks);
            assert!(layout.end() <= 3_000_000);
            // The data bitmap must cover every data block.
            assert!(layout.data_bitmap_blocks * layout.block_size >= layout.data_blocks);
        }
    }

    #[test]
    fn test_offsets() {
        let sb = Layout::plan(1_048_576, 4096, 10).unwrap();
        let layout = Layout::new(&sb);
        assert_eq!(layout.inode_offset(0), layout.inode_table_start * 4096);
        assert_eq!(layout.inode_offset(3) - layout.inode_offset(2), INODE_SIZE as u64);
        assert_eq!(layout.dir_entry_offset(1) - layout.dir_entry_offset(0), DIR_ENTRY_SIZE as u64);
        assert_eq!(layout.data_block_offset(0), layout.data_start * 4096);
    }

    #[test]
    fn test_plan_rejects() {
        assert!(matches!(Layout::plan(1_048_576, 512, 10), Err(FsError::InvalidBlockSize(512))));
        assert!(matches!(Layout::plan(1_048_576, 4096, 0), Err(FsError::InvalidInodeRatio(0))));
        assert!(matches!(Layout::plan(1_048_576, 4096, 101), Err(FsError::InvalidInodeRatio(101))));
        assert!(matches!(Layout::plan(4096 * 3, 4096, 10), Err(FsError::PartitionTooSmall)));
    }
}
