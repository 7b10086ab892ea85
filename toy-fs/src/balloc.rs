//! 块分配器：在块位图上首次适配。

use log::{debug, error, warn};
use vfs::{Error, Result};

use crate::efs::ToyFileSystem;
use crate::{FIRST_DATA_BLOCK, TOTAL_BLOCKS};

impl ToyFileSystem {
    /// 分配编号最小的空闲数据块
    pub fn alloc_block(&mut self) -> Result<u32> {
        self.check_mounted()?;
        if self.free_blocks == 0 {
            debug!("no free block left");
            return Err(Error::NoSpace);
        }

        let Some(block_id) = self.bitmap.alloc() else {
            error!(
                "superblock reports {} free blocks but the bitmap is full",
                self.free_blocks
            );
            return Err(Error::CorruptImage);
        };
        if block_id < FIRST_DATA_BLOCK {
            error!("metadata block {block_id} was free in the bitmap");
            return Err(Error::CorruptImage);
        }

        self.free_blocks -= 1;
        debug!("allocated block {block_id}, {} left", self.free_blocks);
        Ok(block_id)
    }

    /// 释放一个数据块并清零其内容
    pub fn dealloc_block(&mut self, block_id: u32) -> Result<()> {
        self.check_mounted()?;
        if !(FIRST_DATA_BLOCK..TOTAL_BLOCKS).contains(&block_id) {
            warn!("refusing to free block {block_id} outside the data area");
            return Err(Error::InvalidArgument);
        }
        if !self.bitmap.is_set(block_id) {
            error!("double free of block {block_id}");
            return Err(Error::CorruptImage);
        }

        // 先清零：读块失败时位图与计数都保持原样
        self.block(block_id)?.lock().zeroize();
        self.bitmap.dealloc(block_id);
        self.free_blocks += 1;
        debug!("freed block {block_id}, {} left", self.free_blocks);
        Ok(())
    }
}
