use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(about = "Build and inspect ECS150FS disk images")]
pub struct Cli {
    /// Disk image
    #[arg(long, short)]
    pub image: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create an empty filesystem, overwriting the image
    Format {
        /// Total blocks, superblock and metadata included
        #[arg(long, short)]
        blocks: usize,
    },

    /// Print the layout and free ratios
    Info,

    /// List every file in the root directory
    Ls,

    /// Copy a host file into the image
    Add {
        host_file: PathBuf,

        /// Name inside the image, defaults to the host file name
        #[arg(long, short)]
        name: Option<String>,
    },

    /// Write a file's content to stdout
    Cat { name: String },

    /// Delete a file
    Rm { name: String },

    /// Print a file's size
    Stat { name: String },
}
