use enumflags2::BitFlags;

use crate::{FileKind, Permission};

/// 单个 inode 的元信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stat {
    pub ino: u32,
    pub kind: FileKind,
    pub permissions: BitFlags<Permission>,
    /// 硬链接个数
    pub links: u32,
    pub uid: u32,
    pub gid: u32,
    /// File size
    pub size: u64,
    /// Occupying blocks
    pub blocks: u32,
    /// 直接块的块号，未使用的槽位不列出
    pub direct: alloc::vec::Vec<u32>,
    pub atime: u32,
    pub mtime: u32,
    pub ctime: u32,
}

/// 整个卷的统计信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatFs {
    /// Optimal I/O block size
    pub block_size: u64,
    pub total_blocks: u64,
    pub free_blocks: u64,
    pub total_inodes: u64,
    pub free_inodes: u64,
    pub name_max: u64,
}
