use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum FsError {
    #[error("the partition file already exists")]
    AlreadyExists,
    #[error("no such partition or file")]
    NotFound,
    #[error("the partition does not hold a valid filesystem")]
    CorruptFilesystem,
    #[error("no free inode or data block left")]
    OutOfSpace,
    #[error("inode {0} is beyond the inode table")]
    InvalidInode(u32),
    #[error("index {0} is beyond the bitmap")]
    InvalidIndex(u32),
    #[error("bitmap slot {0} is already in the requested state")]
    InvalidState(u32),
    #[error("inode {0} is not allocated")]
    InodeNotAllocated(u32),
    #[error("inode {0} is already allocated")]
    InodeAlreadyAllocated(u32),
    #[error("a file with this name already exists")]
    DuplicateName,
    #[error("invalid file name")]
    InvalidFileName,
    #[error("too many open files")]
    TooManyOpenFiles,
    #[error("file handle is not open")]
    InvalidHandle,
    #[error("file would exceed the maximum file size")]
    FileTooLarge,
    #[error("unknown seek base {0}")]
    InvalidWhence(i32),
    #[error("offset {0} lies outside the file")]
    InvalidOffset(i64),
    #[error("block size {0} is not one of 1024, 2048, 4096")]
    InvalidBlockSize(u32),
    #[error("inode ratio {0}% is not within 1..=100")]
    InvalidInodeRatio(u32),
    #[error("the partition is too small for a filesystem")]
    PartitionTooSmall,
    #[error("the partition size overflows 64 bits")]
    PartitionTooLarge,
    #[error("no partition is mounted")]
    NotMounted,
    #[error("a partition is already mounted")]
    AlreadyMounted,
    #[error("files are still open, close them first")]
    FilesStillOpen,
    #[error("the file is still open")]
    FileBusy,
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = core::result::Result<T, FsError>;
