//! Holder of the one mounted partition of a front end.
//! `Partition` is the session itself; `MountSlot` adds the "nothing mounted"
//! and "already mounted" states for callers that keep one slot around.

use std::path::Path;
use std::sync::Arc;

use crate::error::{FsError, Result};
use crate::file::FileHandle;
use crate::{BlockDevice, BlockFile, Partition, Whence};

pub struct MountSlot<D: BlockDevice = BlockFile> {
    mounted: Option<Partition<D>>,
}

impl MountSlot<BlockFile> {
    pub fn mount(&mut self, path: &Path) -> Result<()> {
        if self.mounted.is_some() {
            return Err(FsError::AlreadyMounted);
        }
        self.mounted = Some(Partition::mount(path)?);
        Ok(())
    }
}

impl<D: BlockDevice> MountSlot<D> {
    pub fn new() -> Self {
        Self { mounted: None }
    }

    pub fn mount_device(&mut self, device: Arc<D>) -> Result<()> {
        if self.mounted.is_some() {
            return Err(FsError::AlreadyMounted);
        }
        self.mounted = Some(Partition::mount_device(device)?);
        Ok(())
    }

    /// Unmounts; on failure the partition stays mounted.
    pub fn unmount(&mut self) -> Result<()> {
        let partition = self.mounted.take().ok_or(FsError::NotMounted)?;
        match partition.unmount() {
            Ok(_) => Ok(()),
            Err(e) => {
                let (partition, error) = e.into_parts();
                self.mounted = Some(partition);
                Err(error)
            }
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.is_some()
    }

    pub fn partition(&self) -> Result<&Partition<D>> {
        self.mounted.as_ref().ok_or(FsError::NotMounted)
    }

    pub fn partition_mut(&mut self) -> Result<&mut Partition<D>> {
        self.mounted.as_mut().ok_or(FsError::NotMounted)
    }

    pub fn open(&mut self, name: &str) -> Result<FileHandle> {
        self.partition_mut()?.open(name)
    }

    pub fn read(&mut self, handle: FileHandle, len: usize) -> Result<Vec<u8>> {
        self.partition_mut()?.read(handle, len)
    }

    pub fn write(&mut self, handle: FileHandle, buf: &[u8]) -> Result<usize> {
        self.partition_mut()?.write(handle, buf)
    }

    pub fn seek(&mut self, handle: FileHandle, offset: i64, whence: Whence) -> Result<()> {
        self.partition_mut()?.seek(handle, offset, whence)
    }

    pub fn close(&mut self, handle: FileHandle) -> Result<()> {
        self.partition_mut()?.close(handle)
    }

    pub fn size(&self, handle: FileHandle) -> Result<u64> {
        self.partition()?.size(handle)
    }
}

impl<D: BlockDevice> Default for MountSlot<D> {
    fn default() -> Self {
        Self::new()
    }
}
