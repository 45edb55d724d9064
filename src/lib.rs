//! A Unix-style filesystem simulated inside a single host file used as a partition.
//! One flat directory, no permissions, files of at most 12 direct blocks.
//!
//! Partition linear layout:
//! - Superblock
//! - Data Bitmap
//! - Inode Bitmap
//! - Inode Table
//! - Directory
//! - Data Blocks
//!
//! Layers (from bottom to top):
//! 1. Block Device: positioned byte I/O on the partition storage.
//! 2. Layout: every region and record offset, derived from the superblock.
//! 3. Bitmap: per unit used/free byte maps for data blocks and inodes.
//! 4. Inode / Directory: fixed-size records and the sorted name table.
//! 5. File: open file table, read/write/seek on top of the layers below.
//! 6. Partition: create, format, mount and unmount; the session every file call goes through.
//!
//! Every mutation is written through to the device right away, there is no cache.

mod config;
mod block_dev;
mod structs;
mod layout;
mod bitmap;
mod superblock;
mod inode;
mod directory;
mod file;
mod fs;
mod mount;
mod error;

pub use block_dev::{BlockDevice, BlockFile};
pub use config::*;
pub use structs::*;
pub use layout::Layout;
pub use bitmap::{Bitmap, BitmapKind};
pub use superblock::*;
pub use inode::*;
pub use directory::*;
pub use file::*;
pub use fs::*;
pub use mount::MountSlot;
pub use error::FsError as Error;
pub use error::Result;
