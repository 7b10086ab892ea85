//! # 目录项引擎
//!
//! 目录的数据块是定长目录项的数组。所有操作都只在目录已分配的块中进行，
//! 目录不会因为插入而增长新块。

use alloc::string::String;
use alloc::vec::Vec;

use log::{debug, trace};
use vfs::{Error, Result};

use crate::NAME_MAX_LEN;
use crate::efs::ToyFileSystem;
use crate::icache::InodeData;
use crate::layout::{DirBlock, DirEntry};

/// 目录项在目录里的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slot {
    block_id: u32,
    index: usize,
}

/// 名字非空、不含 `/` 与 `\0`，且不超过 28 字节
pub(crate) fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.bytes().any(|c| c == b'/' || c == 0) {
        return Err(Error::InvalidArgument);
    }
    if name.len() > NAME_MAX_LEN {
        return Err(Error::NameTooLong);
    }
    Ok(())
}

impl ToyFileSystem {
    /// 取目录 inode，不是目录则出错
    pub(crate) fn dir_inode(&mut self, ino: u32) -> Result<InodeData> {
        let data = self.inode(ino)?;
        if !data.is_dir() {
            return Err(Error::NotADirectory);
        }
        Ok(data)
    }

    /// 在目录中按名字查找，返回 inode 号
    pub fn dir_lookup(&mut self, dir: u32, name: &str) -> Result<u32> {
        let dir = self.dir_inode(dir)?;
        for block_id in dir.data_blocks() {
            trace!("looking up {name:?} in block {block_id} of directory {}", dir.ino);
            let found = self.block(block_id)?.lock().map(0, |entries: &DirBlock| {
                entries
                    .iter()
                    .find(|entry| entry.matches(name))
                    .map(DirEntry::inode_id)
            });
            if let Some(ino) = found {
                return Ok(ino);
            }
        }

        Err(Error::NotFound)
    }

    /// 插入目录项。
    ///
    /// 同名项存在时就地覆盖，否则占用第一个空槽位。
    /// 每次插入目录的链接数都加一；只有占用空槽位时目录大小才增长。
    pub fn dir_insert(&mut self, dir: u32, name: &str, ino: u32) -> Result<()> {
        validate_name(name)?;
        let dir_data = self.dir_inode(dir)?;

        let mut free_slot = None;
        let mut same_name = None;
        'scan: for block_id in dir_data.data_blocks() {
            let cache = self.block(block_id)?;
            let cache = cache.lock();
            let entries: &DirBlock = cache.get(0);
            for (index, entry) in entries.iter().enumerate() {
                if entry.matches(name) {
                    same_name = Some(Slot { block_id, index });
                    break 'scan;
                }
                if free_slot.is_none() && entry.is_free() {
                    free_slot = Some(Slot { block_id, index });
                }
            }
        }

        let (slot, overwrite) = match (same_name, free_slot) {
            (Some(slot), _) => (slot, true),
            (None, Some(slot)) => (slot, false),
            (None, None) => {
                debug!("directory {dir} is full, cannot insert {name:?}");
                return Err(Error::NoSpace);
            }
        };

        self.block(slot.block_id)?
            .lock()
            .map_mut(0, |entries: &mut DirBlock| entries[slot.index].set(name, ino));

        let now = self.now();
        self.update_inode(dir, |dir| {
            dir.touch(now);
            dir.links += 1;
            if !overwrite {
                dir.size += DirEntry::SIZE as u32;
            }
        })?;
        trace!("inserted {name:?} -> {ino} into directory {dir}");
        Ok(())
    }

    /// 删除目录项，返回它指向的 inode 号
    pub fn dir_remove(&mut self, dir: u32, name: &str) -> Result<u32> {
        let dir_data = self.dir_inode(dir)?;

        let mut removed = None;
        for block_id in dir_data.data_blocks() {
            removed = self.block(block_id)?.lock().map_mut(0, |entries: &mut DirBlock| {
                entries.iter_mut().find(|entry| entry.matches(name)).map(|entry| {
                    let ino = entry.inode_id();
                    entry.clear();
                    ino
                })
            });
            if removed.is_some() {
                break;
            }
        }
        let Some(ino) = removed else {
            return Err(Error::NotFound);
        };

        let now = self.now();
        self.update_inode(dir, |dir| {
            dir.touch(now);
            dir.links = dir.links.saturating_sub(1);
            dir.size = dir.size.saturating_sub(DirEntry::SIZE as u32);
        })?;
        trace!("removed {name:?} -> {ino} from directory {dir}");
        Ok(ino)
    }

    /// 列出目录里所有在用的目录项，按槽位顺序
    pub fn dir_entries(&mut self, dir: u32) -> Result<Vec<vfs::DirEntry>> {
        let dir_data = self.dir_inode(dir)?;

        let mut entries = Vec::new();
        for block_id in dir_data.data_blocks() {
            self.block(block_id)?.lock().map(0, |block: &DirBlock| {
                entries.extend(block.iter().filter(|entry| !entry.is_free()).map(|entry| {
                    vfs::DirEntry {
                        ino: entry.inode_id(),
                        name: String::from_utf8_lossy(entry.name_bytes()).into_owned(),
                    }
                }))
            });
        }

        Ok(entries)
    }

    /// 直接改写目录里某一项指向的 inode，不动链接数与时间戳
    pub(crate) fn dir_repoint(&mut self, dir: u32, name: &str, ino: u32) -> Result<()> {
        let dir_data = self.dir_inode(dir)?;
        for block_id in dir_data.data_blocks() {
            let found = self.block(block_id)?.lock().map_mut(0, |entries: &mut DirBlock| {
                entries
                    .iter_mut()
                    .find(|entry| entry.matches(name))
                    .map(|entry| entry.set(name, ino))
                    .is_some()
            });
            if found {
                return Ok(());
            }
        }

        Err(Error::NotFound)
    }
}
