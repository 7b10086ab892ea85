//! 磁盘上的 inode 记录。
//!
//! 每条记录 36 字节的元信息加 7 个直接块号，恰好凑成 64 字节，
//! 一个 2048 字节的 inode 块正好容纳 32 个 inode。
//! 没有间接索引：文件最多占用 [`MAX_INODE_BLOCKS`] 个数据块。

use crate::{INVALID, MAX_INODE_BLOCKS};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[repr(C)]
pub struct DiskInode {
    /// 种类与权限
    pub mode: u32,
    /// 硬链接个数
    pub links: u32,
    pub atime: u32,
    pub mtime: u32,
    pub ctime: u32,
    pub uid: u32,
    pub gid: u32,
    // 不用usize是为了严控布局
    pub size: u32,
    /// 已分配的数据块个数
    pub blocks: u32,
    /// 直接索引块，未使用的槽位为 [`INVALID`]
    pub direct: [u32; MAX_INODE_BLOCKS],
}

impl DiskInode {
    pub const SIZE: usize = 64;

    /// 清空记录，槽位回到空闲状态时使用
    #[inline]
    pub fn clear(&mut self) {
        *self = Self {
            direct: [INVALID; MAX_INODE_BLOCKS],
            ..Default::default()
        }
    }

    /// 块内偏移
    #[inline]
    pub fn offset(ino: u32) -> usize {
        ino as usize * Self::SIZE
    }
}
