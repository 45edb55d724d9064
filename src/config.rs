pub const MAGIC: u32 = 0x55465353; // "UFSS" in ASCII

pub const BLOCK_SIZES: [u32; 3] = [1024, 2048, 4096];
pub const DEFAULT_BLOCK_SIZE: u32 = 4096;
pub const DEFAULT_INODE_RATIO: u32 = 10; // Percent of blocks reserved for the inode table
pub const SUPERBLOCK_FIELDS: usize = 8;
pub const SUPERBLOCK_SIZE: usize = SUPERBLOCK_FIELDS * 4; // Padded to one block on disk

pub const NUM_DIRECT_PTRS: usize = 12; // Number of data block slots in an inode
pub const INODE_SIZE: usize = 4 * 4 + NUM_DIRECT_PTRS * 4; // size, mtime, atime, type + block slots
pub const EMPTY_PTR: u32 = u32::MAX; // On-disk marker of an unused block slot

pub const MAX_FILE_NAME_LEN: usize = 60;
pub const DIR_ENTRY_SIZE: usize = MAX_FILE_NAME_LEN + 4; // Name + inode number

pub const MAX_OPENED_FILES: usize = 64;

pub const KB: u64 = 1_000;
pub const MB: u64 = 1_000_000;
pub const GB: u64 = 1_000_000_000;
