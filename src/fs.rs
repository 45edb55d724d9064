use std::fmt;
use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;

use crate::bitmap::{Bitmap, BitmapKind};
use crate::config::*;
use crate::directory::Directory;
use crate::error::{FsError, Result};
use crate::file::OpenFiles;
use crate::inode::{free_inode, get_inode};
use crate::layout::Layout;
use crate::superblock::read_superblock;
use crate::{BlockDevice, BlockFile, DirEntry, Inode, SizeUnit, SuperBlock};

/// Creates a sparse partition file of `size` units.
pub fn create_partition(path: &Path, size: u64, unit: SizeUnit) -> Result<()> {
    let bytes = size.checked_mul(unit.multiplier()).ok_or_else(|| {
        log::error!("partition of {} x {:?} does not fit in 64 bits", size, unit);
        FsError::PartitionTooLarge
    })?;
    let file = File::options()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => {
                log::error!("partition {} already exists", path.display());
                FsError::AlreadyExists
            }
            _ => FsError::Io(e),
        })?;
    if let Err(e) = file.set_len(bytes) {
        drop(file);
        let _ = fs::remove_file(path);
        log::error!("cannot size partition {} to {} bytes: {}", path.display(), bytes, e);
        return Err(e.into());
    }
    log::info!("partition {} created ({} bytes)", path.display(), bytes);
    Ok(())
}

fn open_partition(path: &Path) -> Result<BlockFile> {
    BlockFile::open(path).map_err(|e| match e {
        FsError::Io(io) if io.kind() == ErrorKind::NotFound => {
            log::error!("partition {} does not exist", path.display());
            FsError::NotFound
        }
        e => e,
    })
}

/// Formats the partition file at `path`.
pub fn format(path: &Path, block_size: u32, inode_ratio: u32) -> Result<SuperBlock> {
    let device = open_partition(path)?;
    format_device(&device, block_size, inode_ratio)
}

/// Writes the superblock, both empty bitmaps and the empty directory.
/// All free counters start equal to their totals.
pub fn format_device(device: &impl BlockDevice, block_size: u32, inode_ratio: u32) -> Result<SuperBlock> {
    let superblock = Layout::plan(device.size()?, block_size, inode_ratio)?;
    let layout = Layout::new(&superblock);

    let mut block = vec![0u8; block_size as usize];
    block[..SUPERBLOCK_SIZE].copy_from_slice(&superblock.encode());
    device.write_block(0, &block)?;
    Bitmap::create(device, BitmapKind::Data, layout.data_bitmap_offset(), superblock.total_data_blocks)?;
    Bitmap::create(device, BitmapKind::Inode, layout.inode_bitmap_offset(), superblock.total_inodes)?;
    Directory::create(device, &layout, superblock.total_inodes)?;
    device.flush()?;

    log::info!(
        "filesystem created: {} blocks of {} bytes, {} data blocks, {} inodes",
        superblock.total_blocks,
        superblock.block_size,
        superblock.total_data_blocks,
        superblock.total_inodes
    );
    Ok(superblock)
}

/// A mounted partition: the only way to reach files.
/// Dropping it or calling `unmount` ends the mount session.
pub struct Partition<D: BlockDevice> {
    pub(crate) device: Arc<D>,
    pub(crate) superblock: SuperBlock,
    pub(crate) layout: Layout,
    pub(crate) data_bitmap: Bitmap,
    pub(crate) inode_bitmap: Bitmap,
    pub(crate) directory: Directory,
    pub(crate) files: OpenFiles,
}

impl Partition<BlockFile> {
    pub fn mount(path: &Path) -> Result<Self> {
        let device = open_partition(path)?;
        let partition = Self::mount_device(Arc::new(device))?;
        log::info!("partition {} mounted", path.display());
        Ok(partition)
    }
}

impl<D: BlockDevice> Partition<D> {
    /// Loads the superblock, both bitmaps and the directory.
    pub fn mount_device(device: Arc<D>) -> Result<Self> {
        let superblock = read_superblock(&*device)?;
        let layout = Layout::new(&superblock);
        if layout.total_blocks() > superblock.total_blocks as u64 || layout.end() > device.size()? {
            log::error!("layout does not fit the partition: {:?}", layout);
            return Err(FsError::CorruptFilesystem);
        }

        let data_bitmap = Bitmap::load(
            &*device,
            &superblock,
            BitmapKind::Data,
            layout.data_bitmap_offset(),
            superblock.total_data_blocks,
        )?;
        let inode_bitmap = Bitmap::load(
            &*device,
            &superblock,
            BitmapKind::Inode,
            layout.inode_bitmap_offset(),
            superblock.total_inodes,
        )?;
        let directory = Directory::load(
            &*device,
            &layout,
            superblock.total_inodes,
            superblock.total_inodes - superblock.free_inodes,
        )?;

        Ok(Self {
            device,
            superblock,
            layout,
            data_bitmap,
            inode_bitmap,
            directory,
            files: OpenFiles::new(MAX_OPENED_FILES),
        })
    }

    /// Ends the mount session and hands the device back.
    /// Refused while files are open; the partition is then returned inside the error.
    pub fn unmount(self) -> core::result::Result<Arc<D>, UnmountError<D>> {
        if !self.files.is_empty() {
            log::warn!("{} files are still open", self.files.len());
            return Err(UnmountError {
                partition: self,
                error: FsError::FilesStillOpen,
            });
        }
        if let Err(error) = self.device.flush() {
            return Err(UnmountError { partition: self, error });
        }
        log::info!("partition unmounted");
        Ok(self.device)
    }

    pub fn superblock(&self) -> &SuperBlock {
        &self.superblock
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn device(&self) -> Arc<D> {
        Arc::clone(&self.device)
    }

    pub fn open_files(&self) -> usize {
        self.files.len()
    }

    /// Live directory entries in name order.
    pub fn list(&self) -> &[DirEntry] {
        self.directory.entries()
    }

    pub fn stat(&self, name: &str) -> Result<Inode> {
        let inode_id = self.directory.lookup(name.as_bytes())?;
        self.inode(inode_id)
    }

    pub fn usage(&self) -> Usage {
        let sb = &self.superblock;
        Usage {
            block_size: sb.block_size,
            total_blocks: sb.total_blocks,
            total_data_blocks: sb.total_data_blocks,
            free_data_blocks: sb.free_data_blocks,
            total_inodes: sb.total_inodes,
            free_inodes: sb.free_inodes,
            files: self.directory.len(),
        }
    }

    /// Deletes a file: its directory entry, then its data blocks, then its inode.
    pub fn remove(&mut self, name: &str) -> Result<()> {
        let inode_id = self.directory.lookup(name.as_bytes())?;
        if self.files.is_open(inode_id) {
            return Err(FsError::FileBusy);
        }
        let inode = self.inode(inode_id)?;

        let device = &*self.device;
        self.directory.delete(device, name.as_bytes())?;
        for &block in inode.direct_ptrs.iter().flatten() {
            self.data_bitmap.mark_free(device, &mut self.superblock, block)?;
        }
        free_inode(device, &mut self.superblock, &mut self.inode_bitmap, inode_id)?;

        log::info!("file {:?} removed", name);
        Ok(())
    }

    pub(crate) fn inode(&self, inode_id: u32) -> Result<Inode> {
        get_inode(&*self.device, &self.layout, &self.superblock, &self.inode_bitmap, inode_id)
    }
}

/// Returned by `Partition::unmount` when the session cannot end yet.
pub struct UnmountError<D: BlockDevice> {
    partition: Partition<D>,
    error: FsError,
}

impl<D: BlockDevice> UnmountError<D> {
    pub fn error(&self) -> &FsError {
        &self.error
    }

    pub fn into_partition(self) -> Partition<D> {
        self.partition
    }

    pub fn into_parts(self) -> (Partition<D>, FsError) {
        (self.partition, self.error)
    }
}

impl<D: BlockDevice> fmt::Debug for UnmountError<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnmountError")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl<D: BlockDevice> fmt::Display for UnmountError<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot unmount: {}", self.error)
    }
}

impl<D: BlockDevice> From<UnmountError<D>> for FsError {
    fn from(e: UnmountError<D>) -> Self {
        e.error
    }
}

/// Geometry and allocation counters of a mounted partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Usage {
    pub block_size: u32,
    pub total_blocks: u32,
    pub total_data_blocks: u32,
    pub free_data_blocks: u32,
    pub total_inodes: u32,
    pub free_inodes: u32,
    pub files: usize,
}

impl fmt::Display for Usage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "block size:  {} bytes", self.block_size)?;
        writeln!(f, "blocks:      {}", self.total_blocks)?;
        writeln!(
            f,
            "data blocks: {} used, {} free, {} total",
            self.total_data_blocks - self.free_data_blocks,
            self.free_data_blocks,
            self.total_data_blocks
        )?;
        writeln!(
            f,
            "inodes:      {} used, {} free, {} total",
            self.total_inodes - self.free_inodes,
            self.free_inodes,
            self.total_inodes
        )?;
        write!(f, "files:       {}", self.files)
    }
}
