//! 普通文件的数据读写与截断，以及符号链接的读取。

use alloc::string::String;

use log::{debug, warn};
use vfs::{Error, Result};

use crate::efs::ToyFileSystem;
use crate::icache::{InodeData, InodeKind};
use crate::{BLOCK_SIZE, DataBlock, INVALID, MAX_INODE_BLOCKS};

/// 文件的最大字节数
pub const MAX_FILE_SIZE: usize = MAX_INODE_BLOCKS * BLOCK_SIZE;

impl ToyFileSystem {
    /// 取普通文件 inode
    fn regular_inode(&mut self, ino: u32) -> Result<InodeData> {
        let data = self.inode(ino)?;
        match data.kind {
            InodeKind::Regular => Ok(data),
            InodeKind::Directory => Err(Error::IsADirectory),
            InodeKind::Symlink { .. } => Err(Error::InvalidArgument),
        }
    }

    /// 从指定位置(字节偏移)读出数据填充`buf`，返回读到的字节数。
    /// 未分配的块读作 0。
    pub fn read_at(&mut self, ino: u32, offset: usize, buf: &mut [u8]) -> Result<usize> {
        let data = self.regular_inode(ino)?;
        let size = data.size as usize;
        if offset >= size {
            return Ok(0);
        }
        let mut start = offset;
        let end = size.min(offset.saturating_add(buf.len()));

        // 已读取多少字节
        let mut read_size = 0;
        loop {
            let block_index = start / BLOCK_SIZE;
            // 当前块的末地址(字节)
            let current_block_end = ((block_index + 1) * BLOCK_SIZE).min(end);
            let block_read_size = current_block_end - start;
            let dest = &mut buf[read_size..read_size + block_read_size];

            match data.direct[block_index] {
                INVALID => dest.fill(0),
                block_id => self.block(block_id)?.lock().map(0, |data_block: &DataBlock| {
                    // 绝对地址 % 块大小 = 块内偏移
                    let src = &data_block[start % BLOCK_SIZE..start % BLOCK_SIZE + block_read_size];
                    dest.copy_from_slice(src);
                }),
            }

            read_size += block_read_size;
            if current_block_end == end {
                break;
            }
            start = current_block_end;
        }

        Ok(read_size)
    }

    /// 把`buf`写到指定位置，按需分配数据块，返回写入的字节数。
    ///
    /// 写入范围超出 [`MAX_FILE_SIZE`] 时不写任何内容。
    /// 分配中途空间耗尽时，已分配的块仍挂在文件上。
    pub fn write_at(&mut self, ino: u32, offset: usize, buf: &[u8]) -> Result<usize> {
        let mut data = self.regular_inode(ino)?;
        if buf.is_empty() {
            return Ok(0);
        }
        let end = match offset.checked_add(buf.len()) {
            Some(end) if end <= MAX_FILE_SIZE => end,
            _ => {
                debug!("write to inode {ino} at offset {offset} exceeds the direct blocks");
                return Err(Error::FileTooBig);
            }
        };

        let mut expand = Ok(());
        for block_index in offset / BLOCK_SIZE..=(end - 1) / BLOCK_SIZE {
            if data.direct[block_index] != INVALID {
                continue;
            }
            match self.alloc_block() {
                Ok(block_id) => {
                    data.direct[block_index] = block_id;
                    data.blocks += 1;
                }
                Err(e) => {
                    expand = Err(e);
                    break;
                }
            }
        }
        if let Err(e) = expand {
            warn!("write to inode {ino} ran out of space");
            self.put_inode(data);
            return Err(e);
        }

        let mut start = offset;
        let mut written_size = 0;
        loop {
            let block_index = start / BLOCK_SIZE;
            let current_block_end = ((block_index + 1) * BLOCK_SIZE).min(end);
            let block_write_size = current_block_end - start;

            self.block(data.direct[block_index])?
                .lock()
                .map_mut(0, |data_block: &mut DataBlock| {
                    let src = &buf[written_size..written_size + block_write_size];
                    let dest =
                        &mut data_block[start % BLOCK_SIZE..start % BLOCK_SIZE + block_write_size];
                    dest.copy_from_slice(src);
                });

            written_size += block_write_size;
            if current_block_end == end {
                break;
            }
            start = current_block_end;
        }

        let now = self.now();
        data.size = data.size.max(end as u32);
        data.mtime = now;
        data.ctime = now;
        self.put_inode(data);
        Ok(written_size)
    }

    /// 调整文件大小。缩小时释放尾部的块，并把最后一块里超出的部分清零。
    pub fn truncate(&mut self, ino: u32, new_size: usize) -> Result<()> {
        let mut data = self.regular_inode(ino)?;
        if new_size > MAX_FILE_SIZE {
            return Err(Error::FileTooBig);
        }

        let keep = new_size.div_ceil(BLOCK_SIZE);
        let mut shrink = Ok(());
        for block_index in keep..MAX_INODE_BLOCKS {
            let block_id = data.direct[block_index];
            if block_id == INVALID {
                continue;
            }
            if let Err(e) = self.dealloc_block(block_id) {
                shrink = Err(e);
                break;
            }
            data.direct[block_index] = INVALID;
            data.blocks -= 1;
        }
        if shrink.is_err() {
            // 已释放的块不能再留在文件上
            self.put_inode(data);
            return shrink;
        }

        let tail = new_size % BLOCK_SIZE;
        if new_size < data.size as usize && tail != 0 && data.direct[keep - 1] != INVALID {
            self.block(data.direct[keep - 1])?
                .lock()
                .map_mut(0, |data_block: &mut DataBlock| data_block[tail..].fill(0));
        }

        let now = self.now();
        data.size = new_size as u32;
        data.mtime = now;
        data.ctime = now;
        self.put_inode(data);
        debug!("truncated inode {ino} to {new_size} bytes");
        Ok(())
    }

    pub fn read_link(&mut self, ino: u32) -> Result<String> {
        match self.inode(ino)?.kind {
            InodeKind::Symlink { target } => Ok(target),
            _ => Err(Error::InvalidArgument),
        }
    }
}
