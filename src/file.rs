//! Open file table and the read/write path of a mounted partition.
//! A file offset maps to (direct slot offset / block_size, in-block offset % block_size).

use crate::config::*;
use crate::error::{FsError, Result};
use crate::inode::{alloc_inode, write_inode};
use crate::structs::now;
use crate::{BlockDevice, DirEntry, Inode, Partition, Whence};

/// Slot of the open file table of one mount, tagged with the slot's generation.
/// A handle goes stale once closed, even if its slot is handed out again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileHandle {
    slot: usize,
    generation: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenFile {
    pub name: String,
    pub inode_id: u32,
    pub offset: i64, // Not clamped, validated by the next read or write
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32, // Bumped every time the slot is vacated
    file: Option<OpenFile>,
}

/// Bounded arena of open files. Freed slots are reused under a new generation.
#[derive(Debug)]
pub struct OpenFiles {
    slots: Vec<Slot>,
    capacity: usize,
}

impl OpenFiles {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::new(),
            capacity,
        }
    }

    fn free_slot(&self) -> Option<usize> {
        match self.slots.iter().position(|slot| slot.file.is_none()) {
            Some(slot) => Some(slot),
            None if self.slots.len() < self.capacity => Some(self.slots.len()),
            None => None,
        }
    }

    /// Fails with `TooManyOpenFiles` if another file cannot be registered.
    pub fn ensure_room(&self) -> Result<()> {
        self.free_slot().map(|_| ()).ok_or(FsError::TooManyOpenFiles)
    }

    pub fn insert(&mut self, file: OpenFile) -> Result<FileHandle> {
        let index = self.free_slot().ok_or(FsError::TooManyOpenFiles)?;
        if index == self.slots.len() {
            self.slots.push(Slot::default());
        }
        let slot = &mut self.slots[index];
        slot.file = Some(file);
        Ok(FileHandle {
            slot: index,
            generation: slot.generation,
        })
    }

    fn slot(&self, handle: FileHandle) -> Option<&Slot> {
        self.slots
            .get(handle.slot)
            .filter(|slot| slot.generation == handle.generation)
    }

    fn slot_mut(&mut self, handle: FileHandle) -> Option<&mut Slot> {
        self.slots
            .get_mut(handle.slot)
            .filter(|slot| slot.generation == handle.generation)
    }

    pub fn get(&self, handle: FileHandle) -> Result<&OpenFile> {
        self.slot(handle)
            .and_then(|slot| slot.file.as_ref())
            .ok_or(FsError::InvalidHandle)
    }

    pub fn get_mut(&mut self, handle: FileHandle) -> Result<&mut OpenFile> {
        self.slot_mut(handle)
            .and_then(|slot| slot.file.as_mut())
            .ok_or(FsError::InvalidHandle)
    }

    pub fn remove(&mut self, handle: FileHandle) -> Result<OpenFile> {
        let slot = self.slot_mut(handle).ok_or(FsError::InvalidHandle)?;
        let file = slot.file.take().ok_or(FsError::InvalidHandle)?;
        slot.generation = slot.generation.wrapping_add(1);
        Ok(file)
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.file.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether any handle refers to `inode_id`.
    pub fn is_open(&self, inode_id: u32) -> bool {
        self.slots
            .iter()
            .filter_map(|slot| slot.file.as_ref())
            .any(|file| file.inode_id == inode_id)
    }
}

impl<D: BlockDevice> Partition<D> {
    /// Opens `name`, creating an empty file when the directory has no such entry.
    /// The new handle starts at offset 0.
    pub fn open(&mut self, name: &str) -> Result<FileHandle> {
        self.files.ensure_room()?;
        let inode_id = match self.directory.lookup(name.as_bytes()) {
            Ok(inode_id) => inode_id,
            Err(FsError::NotFound) => self.create_file(name)?,
            Err(e) => return Err(e),
        };
        let handle = self.files.insert(OpenFile {
            name: name.to_string(),
            inode_id,
            offset: 0,
        })?;
        log::info!("file {:?} opened (inode {})", name, inode_id);
        Ok(handle)
    }

    /// Allocates an inode and its first data block, then links the name.
    fn create_file(&mut self, name: &str) -> Result<u32> {
        DirEntry::new(0, name.as_bytes())?;

        let inode_id = self.inode_bitmap.next_free(&self.superblock)?;
        let block = self.data_bitmap.next_free(&self.superblock)?;

        let device = &*self.device;
        alloc_inode(device, &mut self.superblock, &mut self.inode_bitmap, inode_id)?;
        self.data_bitmap.mark_used(device, &mut self.superblock, block)?;
        write_inode(
            device,
            &self.layout,
            &self.superblock,
            &self.inode_bitmap,
            inode_id,
            &Inode::new(block),
        )?;
        self.directory.insert(device, name.as_bytes(), inode_id)?;

        log::debug!("file {:?} created with inode {} and data block {}", name, inode_id, block);
        Ok(inode_id)
    }

    pub fn close(&mut self, handle: FileHandle) -> Result<()> {
        let file = self.files.remove(handle)?;
        log::info!("file {:?} closed", file.name);
        Ok(())
    }

    /// Recorded size of the file behind `handle`.
    pub fn size(&self, handle: FileHandle) -> Result<u64> {
        let file = self.files.get(handle)?;
        Ok(self.inode(file.inode_id)?.size as u64)
    }

    pub fn seek(&mut self, handle: FileHandle, offset: i64, whence: Whence) -> Result<()> {
        let file = self.files.get(handle)?;
        let new_offset = match whence {
            Whence::Start => Some(offset),
            Whence::Current => file.offset.checked_add(offset),
            Whence::End => (self.inode(file.inode_id)?.size as i64).checked_sub(offset),
        }
        .ok_or(FsError::InvalidOffset(offset))?;
        self.files.get_mut(handle)?.offset = new_offset;
        Ok(())
    }

    /// Reads up to `len` bytes at the handle's offset.
    /// Returns fewer bytes only at end of file.
    pub fn read(&mut self, handle: FileHandle, len: usize) -> Result<Vec<u8>> {
        let file = self.files.get(handle)?;
        let (inode_id, offset) = (file.inode_id, file.offset);
        let mut inode = self.inode(inode_id)?;
        if offset < 0 || offset > inode.size as i64 {
            log::warn!("read at offset {} outside a file of {} bytes", offset, inode.size);
            return Err(FsError::InvalidOffset(offset));
        }

        let block_size = self.layout.block_size;
        let len = len.min((inode.size as i64 - offset) as usize);
        let mut buf = vec![0u8; len];
        let mut pos = offset as u64;
        let mut bytes_read = 0;

        while bytes_read < len {
            let slot = (pos / block_size) as usize;
            let inner = pos % block_size;
            let chunk = ((block_size - inner) as usize).min(len - bytes_read);
            let block = inode.direct_ptrs.get(slot).copied().flatten().ok_or_else(|| {
                log::error!("inode {} has no block in slot {} below its size", inode_id, slot);
                FsError::CorruptFilesystem
            })?;
            self.device.read_at(
                self.layout.data_block_offset(block) + inner,
                &mut buf[bytes_read..bytes_read + chunk],
            )?;
            bytes_read += chunk;
            pos += chunk as u64;
        }

        inode.last_access = now();
        write_inode(&*self.device, &self.layout, &self.superblock, &self.inode_bitmap, inode_id, &inode)?;
        self.files.get_mut(handle)?.offset = pos as i64;
        log::debug!("read {} bytes from inode {}", bytes_read, inode_id);
        Ok(buf)
    }

    /// Writes `buf` at the handle's offset, growing the block list one block at a time.
    /// Returns the number of bytes written.
    pub fn write(&mut self, handle: FileHandle, buf: &[u8]) -> Result<usize> {
        let file = self.files.get(handle)?;
        let (inode_id, offset) = (file.inode_id, file.offset);
        let mut inode = self.inode(inode_id)?;
        if offset < 0 || offset > inode.size as i64 {
            log::warn!("write at offset {} outside a file of {} bytes", offset, inode.size);
            return Err(FsError::InvalidOffset(offset));
        }
        if buf.is_empty() {
            return Ok(0);
        }

        let block_size = self.layout.block_size;
        let end = offset as u64 + buf.len() as u64;
        if end > NUM_DIRECT_PTRS as u64 * block_size {
            log::warn!("write up to {} bytes exceeds the {} block limit", end, NUM_DIRECT_PTRS);
            return Err(FsError::FileTooLarge);
        }

        let device = &*self.device;
        let mut pos = offset as u64;
        let mut bytes_written = 0;

        while bytes_written < buf.len() {
            let slot = (pos / block_size) as usize;
            let inner = pos % block_size;
            let chunk = ((block_size - inner) as usize).min(buf.len() - bytes_written);

            let ptr = inode.direct_ptrs.get_mut(slot).ok_or(FsError::FileTooLarge)?;
            let (block, fresh) = match *ptr {
                Some(block) => (block, false),
                None => {
                    let block = self.data_bitmap.next_free(&self.superblock)?;
                    self.data_bitmap.mark_used(device, &mut self.superblock, block)?;
                    *ptr = Some(block);
                    (block, true)
                }
            };

            device.write_at(
                self.layout.data_block_offset(block) + inner,
                &buf[bytes_written..bytes_written + chunk],
            )?;
            bytes_written += chunk;
            pos += chunk as u64;

            if fresh {
                inode.size = inode.size.max(pos as u32);
                write_inode(device, &self.layout, &self.superblock, &self.inode_bitmap, inode_id, &inode)?;
                log::trace!("inode {} grew to block {} in slot {}", inode_id, block, slot);
            }
        }

        inode.size = inode.size.max(pos as u32);
        inode.last_modification = now();
        write_inode(device, &self.layout, &self.superblock, &self.inode_bitmap, inode_id, &inode)?;
        self.files.get_mut(handle)?.offset = pos as i64;
        log::debug!("wrote {} bytes to inode {}", bytes_written, inode_id);
        Ok(bytes_written)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn file(inode_id: u32) -> OpenFile {
        OpenFile {
            name: format!("f{}", inode_id),
            inode_id,
            offset: 0,
        }
    }

    #[test]
    fn test_table_capacity() {
        let mut files = OpenFiles::new(2);
        let a = files.insert(file(0)).unwrap();
        files.insert(file(1)).unwrap();
        assert!(matches!(files.insert(file(2)), Err(FsError::TooManyOpenFiles)));
        assert!(matches!(files.ensure_room(), Err(FsError::TooManyOpenFiles)));

        files.remove(a).unwrap();
        assert_eq!(files.len(), 1);
        let c = files.insert(file(2)).unwrap();
        assert_eq!(c.slot, a.slot); // Slot reused under a new generation.
        assert_ne!(c, a);
    }

    #[test]
    fn test_stale_handle() {
        let mut files = OpenFiles::new(4);
        let a = files.insert(file(3)).unwrap();
        assert!(files.is_open(3));
        files.remove(a).unwrap();
        assert!(!files.is_open(3));
        assert!(matches!(files.get(a), Err(FsError::InvalidHandle)));
        assert!(matches!(files.remove(a), Err(FsError::InvalidHandle)));

        // The slot now belongs to another file, the old handle must not reach it.
        let b = files.insert(file(4)).unwrap();
        assert!(matches!(files.get(a), Err(FsError::InvalidHandle)));
        assert!(matches!(files.get_mut(a), Err(FsError::InvalidHandle)));
        assert!(matches!(files.remove(a), Err(FsError::InvalidHandle)));
        assert_eq!(files.get(b).unwrap().inode_id, 4);
    }
}
