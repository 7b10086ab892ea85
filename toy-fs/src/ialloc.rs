//! inode 分配器：线性扫描超级块里的占用表。

use log::{debug, error, warn};
use vfs::{Error, Result};

use crate::{INODE_COUNT, ROOT_INO};
use crate::efs::ToyFileSystem;
use crate::layout::{DiskInode, DiskSuperBlock};

impl ToyFileSystem {
    /// 分配编号最小的空闲 inode，槽位的世代随之加一
    pub fn alloc_inode(&mut self) -> Result<u32> {
        self.check_mounted()?;
        if self.free_inodes == 0 {
            debug!("no free inode left");
            return Err(Error::NoSpace);
        }

        let Some(slot) = self
            .inode_map
            .iter()
            .position(|&state| state == DiskSuperBlock::INODE_FREE)
        else {
            error!(
                "superblock reports {} free inodes but the table is full",
                self.free_inodes
            );
            return Err(Error::CorruptImage);
        };

        self.inode_map[slot] = DiskSuperBlock::INODE_IN_USE;
        self.free_inodes -= 1;
        self.generations[slot] = self.generations[slot].wrapping_add(1);
        debug!("allocated inode {slot}, {} left", self.free_inodes);
        Ok(slot as u32)
    }

    /// 释放 inode 槽位，并清空其在 inode 表里的记录
    pub fn dealloc_inode(&mut self, ino: u32) -> Result<()> {
        self.check_mounted()?;
        if ino >= INODE_COUNT || ino == ROOT_INO {
            warn!("refusing to free inode {ino}");
            return Err(Error::InvalidArgument);
        }
        if self.inode_map[ino as usize] == DiskSuperBlock::INODE_FREE {
            error!("double free of inode {ino}");
            return Err(Error::CorruptImage);
        }
        if self.icache.refs(ino) > 0 {
            warn!("inode {ino} is still referenced by open handles");
            return Err(Error::InvalidArgument);
        }

        self.modify_disk_inode(ino, DiskInode::clear);
        self.inode_map[ino as usize] = DiskSuperBlock::INODE_FREE;
        self.free_inodes += 1;
        debug!("freed inode {ino}, {} left", self.free_inodes);
        Ok(())
    }

    #[inline]
    pub fn is_inode_in_use(&self, ino: u32) -> bool {
        ino < INODE_COUNT && self.inode_map[ino as usize] == DiskSuperBlock::INODE_IN_USE
    }

    #[inline]
    pub(crate) fn generation(&self, ino: u32) -> u32 {
        self.generations[ino as usize]
    }
}
