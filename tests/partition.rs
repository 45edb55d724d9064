#![allow(unused)]

mod common;

use common::init_logger;
use tempfile::TempDir;
use ufs::create_partition;
use ufs::format;
use ufs::Error;
use ufs::MountSlot;
use ufs::Partition;
use ufs::SizeUnit;
use ufs::Whence;
use ufs::DEFAULT_BLOCK_SIZE;
use ufs::DEFAULT_INODE_RATIO;

#[test]
fn test_create_partition() {
    init_logger();
    let dir = TempDir::new().unwrap();
    let part = dir.path().join("create.part");
    create_partition(&part, 2, SizeUnit::MB).unwrap();
    let meta = std::fs::metadata(&part).unwrap();
    assert_eq!(meta.len(), 2_000_000);

    assert!(matches!(create_partition(&part, 1, SizeUnit::KB), Err(Error::AlreadyExists)));
    assert_eq!(std::fs::metadata(&part).unwrap().len(), 2_000_000);
}

#[test]
fn test_create_partition_overflow() {
    init_logger();
    let dir = TempDir::new().unwrap();
    let part = dir.path().join("huge.part");
    assert!(matches!(
        create_partition(&part, u64::MAX / 10, SizeUnit::GB),
        Err(Error::PartitionTooLarge)
    ));
    assert!(!part.exists());
}

#[test]
fn test_missing_partition() {
    init_logger();
    let dir = TempDir::new().unwrap();
    let part = dir.path().join("missing.part");
    assert!(matches!(format(&part, 4096, 10), Err(Error::NotFound)));
    assert!(matches!(Partition::mount(&part), Err(Error::NotFound)));
}

#[test]
fn test_mount_before_format() {
    init_logger();
    let dir = TempDir::new().unwrap();
    let part = dir.path().join("raw.part");
    create_partition(&part, 1, SizeUnit::MB).unwrap();
    assert!(matches!(Partition::mount(&part), Err(Error::CorruptFilesystem)));
}

#[test]
fn test_format_defaults() {
    init_logger();
    let dir = TempDir::new().unwrap();
    let part = dir.path().join("defaults.part");
    create_partition(&part, 1, SizeUnit::MB).unwrap();
    let sb = format(&part, DEFAULT_BLOCK_SIZE, DEFAULT_INODE_RATIO).unwrap();
    // 1_000_000 / 4096 = 244 blocks, 25 of them for inodes.
    assert_eq!(sb.total_blocks, 244);
    assert_eq!(sb.inode_blocks, 25);
    assert_eq!(sb.total_inodes, 1600);
    assert_eq!(sb.free_inodes, sb.total_inodes);
    assert_eq!(sb.free_data_blocks, sb.total_data_blocks);

    let fs = Partition::mount(&part).unwrap();
    assert_eq!(fs.superblock(), &sb);
    fs.unmount().unwrap();
}

#[test]
fn test_reformat_wipes_files() {
    init_logger();
    let dir = TempDir::new().unwrap();
    let part = dir.path().join("reformat.part");
    create_partition(&part, 512, SizeUnit::KB).unwrap();
    format(&part, 1024, 10).unwrap();

    let mut fs = Partition::mount(&part).unwrap();
    let fd = fs.open("old").unwrap();
    fs.write(fd, b"old data").unwrap();
    fs.close(fd).unwrap();
    fs.unmount().unwrap();

    let sb = format(&part, 2048, 20).unwrap();
    let fs = Partition::mount(&part).unwrap();
    assert!(fs.list().is_empty());
    assert_eq!(fs.superblock().block_size, 2048);
    assert_eq!(fs.superblock().free_inodes, sb.total_inodes);
}

#[test]
fn test_session_round_trip() {
    init_logger();
    let dir = TempDir::new().unwrap();
    let part = dir.path().join("session.part");
    create_partition(&part, 1, SizeUnit::MB).unwrap();
    format(&part, 4096, 10).unwrap();

    let text = "The quick brown fox jumps over the lazy dog.\n".repeat(200);
    let mut slot: MountSlot = MountSlot::new();
    slot.mount(&part).unwrap();
    assert!(matches!(slot.mount(&part), Err(Error::AlreadyMounted)));
    let fd = slot.open("fox.txt").unwrap();
    assert_eq!(slot.write(fd, text.as_bytes()).unwrap(), text.len());
    slot.close(fd).unwrap();
    slot.unmount().unwrap();

    slot.mount(&part).unwrap();
    let fd = slot.open("fox.txt").unwrap();
    assert_eq!(slot.size(fd).unwrap(), text.len() as u64);
    slot.seek(fd, 45, Whence::Start).unwrap();
    let line = slot.read(fd, 45).unwrap();
    assert_eq!(line, &text.as_bytes()[45..90]);
    slot.close(fd).unwrap();

    let usage = slot.partition().unwrap().usage();
    log!("{}", usage);
    assert_eq!(usage.files, 1);
    assert_eq!(usage.total_data_blocks - usage.free_data_blocks, 3);
    slot.unmount().unwrap();
}
