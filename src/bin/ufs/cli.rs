use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use ufs::{SizeUnit, DEFAULT_BLOCK_SIZE, DEFAULT_INODE_RATIO};

#[derive(Parser)]
#[command(name = "ufs", version, about = "Single-file Unix-style filesystem")]
pub struct Cli {
    /// Partition file
    pub partition: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create a new, zero-filled partition file
    Mkpart {
        size: u64,

        #[arg(long, short, value_enum, default_value_t = Unit::Mb)]
        unit: Unit,
    },

    /// Format the partition
    Mkfs {
        #[arg(long, short, default_value_t = DEFAULT_BLOCK_SIZE)]
        block_size: u32,

        /// Percent of blocks reserved for inodes
        #[arg(long, short, default_value_t = DEFAULT_INODE_RATIO)]
        inode_ratio: u32,
    },

    /// Copy a host file into the partition
    Put {
        source: PathBuf,

        /// Name inside the partition, defaults to the source file name
        #[arg(long, short)]
        name: Option<String>,
    },

    /// Print a file to stdout
    Cat { name: String },

    /// List files
    Ls,

    /// Delete a file
    Rm { name: String },

    /// Print partition geometry and counters
    Usage,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Unit {
    Kb,
    Mb,
    Gb,
}

impl From<Unit> for SizeUnit {
    fn from(unit: Unit) -> Self {
        match unit {
            Unit::Kb => SizeUnit::KB,
            Unit::Mb => SizeUnit::MB,
            Unit::Gb => SizeUnit::GB,
        }
    }
}
