use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
pub struct Cli {
    /// Volume image file
    #[arg(long, short, default_value = "fs.img")]
    pub image: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create the image and format an empty volume on it
    Format,
    /// Print volume statistics
    Info,
    /// List a directory
    Ls {
        #[arg(default_value = "/")]
        path: String,
    },
    /// Copy a host file into the volume
    Put { source: PathBuf, dest: String },
    /// Print a file to stdout
    Cat { path: String },
    /// Create a directory
    Mkdir { path: String },
    /// Create a symbolic link at `path` pointing to `target`
    Symlink { target: String, path: String },
    /// Remove a file, a symbolic link or an empty directory
    Rm { path: String },
    /// Check free counts against the bitmap and inode table
    Check,
}
