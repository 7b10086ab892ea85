use core::str;

use crate::{BLOCK_SIZE, INVALID, NAME_MAX_LEN};

/// 目录项：inode 号加定长的名字。
/// inode 号为 [`INVALID`] 的槽位是空闲的。
#[derive(Debug, Clone)]
#[repr(C)]
pub struct DirEntry {
    inode_id: u32,
    // 名字占满 28 字节时没有结尾的 \0
    name: [u8; NAME_MAX_LEN],
}

/// 一个目录块里的全部槽位
pub type DirBlock = [DirEntry; DirEntry::PER_BLOCK];

impl DirEntry {
    /// 元信息大小恒为32字节
    pub const SIZE: usize = 32;
    pub const PER_BLOCK: usize = BLOCK_SIZE / Self::SIZE;

    #[inline]
    pub fn new(name: &str, inode_id: u32) -> Self {
        let mut entry = Self::empty();
        entry.set(name, inode_id);
        entry
    }

    #[inline]
    pub const fn empty() -> Self {
        Self {
            inode_id: INVALID,
            name: [0; NAME_MAX_LEN],
        }
    }

    /// 覆盖该槽位。名字长度须已校验过。
    pub fn set(&mut self, name: &str, inode_id: u32) {
        let bytes = name.as_bytes();
        debug_assert!(bytes.len() <= NAME_MAX_LEN);
        self.name.fill(0);
        self.name[..bytes.len()].copy_from_slice(bytes);
        self.inode_id = inode_id;
    }

    /// 清空槽位
    #[inline]
    pub fn clear(&mut self) {
        *self = Self::empty();
    }

    #[inline]
    pub fn is_free(&self) -> bool {
        self.inode_id == INVALID
    }

    pub fn name_bytes(&self) -> &[u8] {
        let len = self
            .name
            .iter()
            .position(|&c| c == 0)
            .unwrap_or(NAME_MAX_LEN);
        &self.name[..len]
    }

    /// 名字不是合法的 UTF-8 时返回空
    #[inline]
    pub fn name(&self) -> Option<&str> {
        str::from_utf8(self.name_bytes()).ok()
    }

    #[inline]
    pub fn matches(&self, name: &str) -> bool {
        !self.is_free() && self.name_bytes() == name.as_bytes()
    }

    #[inline]
    pub fn inode_id(&self) -> u32 {
        self.inode_id
    }
}
