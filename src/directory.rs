//! The single flat directory.
//! A capacity-sized array of entries (one slot per inode) whose live prefix
//! is kept sorted by name bytes, so `[u8]` ordering applies:
//! lexicographic, and a name sorts before any longer name it prefixes.

use crate::config::*;
use crate::error::{FsError, Result};
use crate::layout::Layout;
use crate::structs::DirEntry;
use crate::BlockDevice;

pub fn trim_zero(name: &[u8]) -> &[u8] {
    let mut end = name.len();
    while end > 0 && name[end - 1] == 0 {
        end -= 1;
    }
    &name[..end]
}

impl DirEntry {
    pub fn name(&self) -> &[u8] {
        trim_zero(&self.name)
    }

    pub fn name_str(&self) -> String {
        String::from_utf8_lossy(self.name()).into_owned()
    }
}

#[derive(Debug)]
pub struct Directory {
    layout: Layout,
    entries: Vec<DirEntry>,
    live: usize,
}

impl Directory {
    /// Persists an empty directory with `capacity` slots.
    pub fn create(device: &impl BlockDevice, layout: &Layout, capacity: u32) -> Result<Self> {
        let dir = Self {
            layout: *layout,
            entries: vec![DirEntry::NULL; capacity as usize],
            live: 0,
        };
        dir.flush(device)?;
        log::debug!("directory created with {} slots", capacity);
        Ok(dir)
    }

    /// Reads the whole directory array. The first `live` slots are entries.
    pub fn load(device: &impl BlockDevice, layout: &Layout, capacity: u32, live: u32) -> Result<Self> {
        if live > capacity {
            return Err(FsError::CorruptFilesystem);
        }
        let mut buf = vec![0u8; capacity as usize * DIR_ENTRY_SIZE];
        device.read_at(layout.directory_offset(), &mut buf)?;
        let entries: Vec<DirEntry> = buf.chunks_exact(DIR_ENTRY_SIZE).map(DirEntry::decode).collect();

        let live = live as usize;
        let sorted = entries[..live]
            .windows(2)
            .all(|pair| pair[0].name() < pair[1].name());
        if !sorted || entries[..live].iter().any(|entry| entry.name().is_empty()) {
            log::error!("directory live prefix is not a sorted set of names");
            return Err(FsError::CorruptFilesystem);
        }

        Ok(Self {
            layout: *layout,
            entries,
            live,
        })
    }

    /// Writes every slot back, unused ones included.
    pub fn flush(&self, device: &impl BlockDevice) -> Result<()> {
        self.write_slots(device, 0, self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Live entries in name order.
    pub fn entries(&self) -> &[DirEntry] {
        &self.entries[..self.live]
    }

    fn search(&self, name: &[u8]) -> core::result::Result<usize, usize> {
        self.entries().binary_search_by(|entry| entry.name().cmp(name))
    }

    pub fn lookup(&self, name: &[u8]) -> Result<u32> {
        match self.search(name) {
            Ok(slot) => Ok(self.entries[slot].inode_id),
            Err(_) => Err(FsError::NotFound),
        }
    }

    /// Inserts keeping the live prefix sorted; the tail shifts right by one slot.
    pub fn insert(
        &mut self,
        device: &impl BlockDevice,
        name: &[u8],
        inode_id: u32,
    ) -> Result<()> {
        let entry = DirEntry::new(inode_id, name)?;
        if inode_id as usize >= self.capacity() {
            return Err(FsError::InvalidInode(inode_id));
        }
        let slot = match self.search(name) {
            Ok(_) => return Err(FsError::DuplicateName),
            Err(slot) => slot,
        };
        if self.live == self.capacity() {
            return Err(FsError::OutOfSpace);
        }

        self.entries.copy_within(slot..self.live, slot + 1);
        self.entries[slot] = entry;
        self.live += 1;
        self.write_slots(device, slot, self.live)?;
        log::debug!("directory entry {:?} -> inode {} at slot {}", entry.name_str(), inode_id, slot);
        Ok(())
    }

    /// Removes an entry; the tail shifts left by one slot.
    /// Returns the inode number the entry pointed to.
    pub fn delete(&mut self, device: &impl BlockDevice, name: &[u8]) -> Result<u32> {
        let slot = self.search(name).map_err(|_| FsError::NotFound)?;
        let inode_id = self.entries[slot].inode_id;

        let end = self.live;
        self.entries.copy_within(slot + 1..end, slot);
        self.live -= 1;
        self.entries[self.live] = DirEntry::NULL;
        self.write_slots(device, slot, end)?;
        log::debug!("directory entry at slot {} removed", slot);
        Ok(inode_id)
    }

    /// Persists slots `start..end` in one write.
    fn write_slots(&self, device: &impl BlockDevice, start: usize, end: usize) -> Result<()> {
        if start >= end {
            return Ok(());
        }
        let buf: Vec<u8> = self.entries[start..end]
            .iter()
            .flat_map(|entry| entry.encode())
            .collect();
        device.write_at(self.layout.dir_entry_offset(start), &buf)?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::sync::Mutex;

    use super::*;
    use crate::structs::SuperBlock;

    struct MemDisk(Mutex<Vec<u8>>);

    impl BlockDevice for MemDisk {
        fn size(&self) -> Result<u64> {
            Ok(self.0.lock().unwrap().len() as u64)
        }

        fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
            let data = self.0.lock().unwrap();
            let start = offset as usize;
            buf.copy_from_slice(&data[start..start + buf.len()]);
            Ok(())
        }

        fn write_at(&self, offset: u64, buf: &[u8]) -> Result<usize> {
            let mut data = self.0.lock().unwrap();
            let start = offset as usize;
            data[start..start + buf.len()].copy_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&self) -> Result<()> {
            Ok(())
        }
    }

    fn setup() -> (MemDisk, Layout, Directory) {
        let sb: SuperBlock = Layout::plan(64 * 1024, 1024, 10).unwrap();
        let layout = Layout::new(&sb);
        let disk = MemDisk(Mutex::new(vec![0; layout.end() as usize]));
        let dir = Directory::create(&disk, &layout, sb.total_inodes).unwrap();
        (disk, layout, dir)
    }

    fn names(dir: &Directory) -> Vec<String> {
        dir.entries().iter().map(DirEntry::name_str).collect()
    }

    #[test]
    fn test_trim_zero() {
        assert_eq!(trim_zero(b"test\0\0"), b"test");
        assert_eq!(trim_zero(b"\0"), b"");
    }

    #[test]
    fn test_insert_sorted() {
        let (disk, _, mut dir) = setup();
        for (i, name) in ["m", "b", "ab", "a", "z", "abc"].iter().enumerate() {
            dir.insert(&disk, name.as_bytes(), i as u32).unwrap();
        }
        assert_eq!(names(&dir), ["a", "ab", "abc", "b", "m", "z"]);
        assert_eq!(dir.lookup(b"ab").unwrap(), 2);
        assert_eq!(dir.lookup(b"z").unwrap(), 4);
        assert!(matches!(dir.lookup(b"abcd"), Err(FsError::NotFound)));
    }

    #[test]
    fn test_insert_rejects() {
        let (disk, _, mut dir) = setup();
        dir.insert(&disk, b"a.txt", 0).unwrap();
        assert!(matches!(dir.insert(&disk, b"a.txt", 1), Err(FsError::DuplicateName)));
        let cap = dir.capacity() as u32;
        assert!(matches!(dir.insert(&disk, b"b.txt", cap), Err(FsError::InvalidInode(_))));
        assert!(matches!(dir.insert(&disk, b"", 1), Err(FsError::InvalidFileName)));
        assert_eq!(dir.len(), 1);
    }

    #[test]
    fn test_delete_compacts() {
        let (disk, _, mut dir) = setup();
        for (i, name) in ["c", "a", "b", "d"].iter().enumerate() {
            dir.insert(&disk, name.as_bytes(), i as u32).unwrap();
        }
        assert_eq!(dir.delete(&disk, b"b").unwrap(), 2);
        assert_eq!(names(&dir), ["a", "c", "d"]);
        assert!(matches!(dir.lookup(b"b"), Err(FsError::NotFound)));
        assert!(matches!(dir.delete(&disk, b"b"), Err(FsError::NotFound)));
        dir.delete(&disk, b"d").unwrap();
        dir.delete(&disk, b"a").unwrap();
        assert_eq!(names(&dir), ["c"]);
    }

    #[test]
    fn test_persisted_after_each_change() {
        let (disk, layout, mut dir) = setup();
        let cap = dir.capacity() as u32;
        for (i, name) in ["delta", "alpha", "charlie", "bravo"].iter().enumerate() {
            dir.insert(&disk, name.as_bytes(), i as u32).unwrap();
        }
        dir.delete(&disk, b"charlie").unwrap();

        let loaded = Directory::load(&disk, &layout, cap, dir.len() as u32).unwrap();
        assert_eq!(names(&loaded), ["alpha", "bravo", "delta"]);
        assert_eq!(loaded.lookup(b"delta").unwrap(), 0);
    }

    #[test]
    fn test_full_directory() {
        let (disk, _, mut dir) = setup();
        let cap = dir.capacity();
        for i in 0..cap {
            dir.insert(&disk, format!("f{:05}", i).as_bytes(), i as u32).unwrap();
        }
        assert!(matches!(dir.insert(&disk, b"extra", 0), Err(FsError::OutOfSpace)));
    }
}
