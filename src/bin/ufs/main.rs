mod cli;

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use cli::{Cli, Command};
use ufs::{Error, MountSlot};

/// Step of a command that failed; each one has its own exit status.
#[derive(Debug, Clone, Copy)]
enum Stage {
    Mkpart,
    Mkfs,
    Mount,
    Open,
    Read,
    Write,
    Close,
    Umount,
}

impl Stage {
    fn exit_code(self) -> u8 {
        match self {
            Stage::Mkpart => 11,
            Stage::Mkfs => 12,
            Stage::Mount => 13,
            Stage::Open => 14,
            Stage::Read => 15,
            Stage::Write => 16,
            Stage::Close => 17,
            Stage::Umount => 18,
        }
    }
}

const USAGE_EXIT: u8 = 19;

#[derive(Debug)]
struct Failure {
    stage: Stage,
    error: Error,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} failed: {}", self.stage, self.error)
    }
}

trait At<T> {
    fn at(self, stage: Stage) -> Result<T, Failure>;
}

impl<T, E: Into<Error>> At<T> for Result<T, E> {
    fn at(self, stage: Stage) -> Result<T, Failure> {
        self.map_err(|e| Failure {
            stage,
            error: e.into(),
        })
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(USAGE_EXIT)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match run(&cli.partition, cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(failure) => {
            log::error!("{}", failure);
            eprintln!("ufs: {}", failure);
            ExitCode::from(failure.stage.exit_code())
        }
    }
}

fn run(partition: &Path, command: Command) -> Result<(), Failure> {
    match command {
        Command::Mkpart { size, unit } => ufs::create_partition(partition, size, unit.into()).at(Stage::Mkpart),
        Command::Mkfs {
            block_size,
            inode_ratio,
        } => {
            let sb = ufs::format(partition, block_size, inode_ratio).at(Stage::Mkfs)?;
            println!(
                "{} blocks of {} bytes, {} data blocks, {} inodes",
                sb.total_blocks, sb.block_size, sb.total_data_blocks, sb.total_inodes
            );
            Ok(())
        }
        Command::Put { source, name } => {
            let data = fs::read(&source).at(Stage::Read)?;
            let name = match name {
                Some(name) => name,
                None => source
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .ok_or(Error::InvalidFileName)
                    .at(Stage::Open)?,
            };

            let mut slot: MountSlot = MountSlot::new();
            slot.mount(partition).at(Stage::Mount)?;
            // Replace, never merge with, an existing file of the same name.
            match slot.partition_mut().and_then(|p| p.remove(&name)) {
                Ok(()) => log::info!("replacing {:?}", name),
                Err(Error::NotFound) => {}
                Err(e) => return Err(e).at(Stage::Open),
            }
            let handle = slot.open(&name).at(Stage::Open)?;
            let written = slot.write(handle, &data).at(Stage::Write)?;
            slot.close(handle).at(Stage::Close)?;
            slot.unmount().at(Stage::Umount)?;
            println!("{}: {} bytes", name, written);
            Ok(())
        }
        Command::Cat { name } => {
            let mut slot: MountSlot = MountSlot::new();
            slot.mount(partition).at(Stage::Mount)?;
            slot.partition().and_then(|p| p.stat(&name)).at(Stage::Open)?;
            let handle = slot.open(&name).at(Stage::Open)?;
            let size = slot.size(handle).at(Stage::Read)?;
            let data = slot.read(handle, size as usize).at(Stage::Read)?;
            slot.close(handle).at(Stage::Close)?;
            slot.unmount().at(Stage::Umount)?;

            let mut stdout = io::stdout().lock();
            stdout.write_all(&data).at(Stage::Read)?;
            stdout.flush().at(Stage::Read)
        }
        Command::Ls => {
            let mut slot: MountSlot = MountSlot::new();
            slot.mount(partition).at(Stage::Mount)?;
            let p = slot.partition().at(Stage::Mount)?;
            for entry in p.list() {
                let inode = p.stat(&entry.name_str()).at(Stage::Read)?;
                println!("{:>5} {:>10} {}", entry.inode_id, inode.size, entry.name_str());
            }
            slot.unmount().at(Stage::Umount)
        }
        Command::Rm { name } => {
            let mut slot: MountSlot = MountSlot::new();
            slot.mount(partition).at(Stage::Mount)?;
            slot.partition_mut().and_then(|p| p.remove(&name)).at(Stage::Open)?;
            slot.unmount().at(Stage::Umount)
        }
        Command::Usage => {
            let mut slot: MountSlot = MountSlot::new();
            slot.mount(partition).at(Stage::Mount)?;
            println!("{}", slot.partition().at(Stage::Mount)?.usage());
            slot.unmount().at(Stage::Umount)
        }
    }
}

#[cfg(test)]
mod test {
    use std::path::PathBuf;

    use tempfile::TempDir;
    use ufs::{Partition, DEFAULT_INODE_RATIO};

    use super::*;
    use crate::cli::Unit;

    fn formatted(dir: &TempDir) -> PathBuf {
        let part = dir.path().join("disk.part");
        run(&part, Command::Mkpart { size: 256, unit: Unit::Kb }).unwrap();
        run(
            &part,
            Command::Mkfs {
                block_size: 1024,
                inode_ratio: DEFAULT_INODE_RATIO,
            },
        )
        .unwrap();
        part
    }

    fn put(part: &Path, source: &Path) {
        let command = Command::Put {
            source: source.to_path_buf(),
            name: Some("f".to_string()),
        };
        run(part, command).unwrap();
    }

    fn contents(part: &Path, name: &str) -> Vec<u8> {
        let mut fs = Partition::mount(part).unwrap();
        let fd = fs.open(name).unwrap();
        let size = fs.size(fd).unwrap();
        let data = fs.read(fd, size as usize).unwrap();
        fs.close(fd).unwrap();
        fs.unmount().unwrap();
        data
    }

    #[test]
    fn test_put_replaces_existing_file() {
        let dir = TempDir::new().unwrap();
        let part = formatted(&dir);
        let long = dir.path().join("long");
        let short = dir.path().join("short");
        fs::write(&long, b"ORIGINAL-CONTENT-LONG").unwrap();
        fs::write(&short, b"new").unwrap();

        put(&part, &long);
        assert_eq!(contents(&part, "f"), b"ORIGINAL-CONTENT-LONG");
        put(&part, &short);
        assert_eq!(contents(&part, "f"), b"new");

        let fs = Partition::mount(&part).unwrap();
        assert_eq!(fs.list().len(), 1);
        assert_eq!(fs.usage().total_inodes - fs.usage().free_inodes, 1);
    }

    #[test]
    fn test_failures_map_to_stages() {
        let dir = TempDir::new().unwrap();
        let part = dir.path().join("absent.part");
        let err = run(&part, Command::Ls).unwrap_err();
        assert_eq!(err.stage.exit_code(), 13);

        let part = formatted(&dir);
        let err = run(&part, Command::Mkpart { size: 1, unit: Unit::Kb }).unwrap_err();
        assert!(matches!(err.error, Error::AlreadyExists));
        assert_eq!(err.stage.exit_code(), 11);
    }
}
