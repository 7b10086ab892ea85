use crate::{INODE_COUNT, MAGIC};

/// 超级块：
/// - 提供文件系统合法性校验；
/// - 记录空闲计数与 inode 占用表
#[derive(Debug, Clone)]
#[repr(C)]
pub struct DiskSuperBlock {
    /// 魔数：用于校验文件系统合法性
    magic: u32,
    flags: u32,
    /// 空闲 inode 数
    pub free_inodes: u32,
    /// 空闲块数
    pub free_blocks: u32,
    /// 每个 inode 槽位是否在用
    pub inodes: [u32; INODE_COUNT as usize],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum SuperBlockFlag {
    Clean = 0,
    Dirty = 1,
}

impl DiskSuperBlock {
    pub const INODE_FREE: u32 = 0;
    pub const INODE_IN_USE: u32 = 1;

    #[inline]
    pub fn init(&mut self, free_inodes: u32, free_blocks: u32, inodes: [u32; INODE_COUNT as usize]) {
        *self = Self {
            magic: MAGIC,
            flags: SuperBlockFlag::Clean as u32,
            free_inodes,
            free_blocks,
            inodes,
        };
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.magic == MAGIC
    }

    /// 除 `Clean` 以外的任何值都当作脏
    #[inline]
    pub fn flag(&self) -> SuperBlockFlag {
        if self.flags == SuperBlockFlag::Clean as u32 {
            SuperBlockFlag::Clean
        } else {
            SuperBlockFlag::Dirty
        }
    }

    #[inline]
    pub fn set_flag(&mut self, flag: SuperBlockFlag) {
        self.flags = flag as u32;
    }
}
