//! # 磁盘数据结构层
//!
//! toy-fs 的磁盘布局，每块 2048 字节：
//! 超级块(0) | inode 表(1) | 块位图(2) | 数据块(3..=511)

mod super_block;
pub use super_block::{DiskSuperBlock, SuperBlockFlag};

mod bitmap;
pub(crate) use bitmap::Bitmap;

mod inode;
pub use inode::DiskInode;

/// 文件项，也属于磁盘文件系统数据结构
mod dir_entry;
pub use dir_entry::{DirBlock, DirEntry};
