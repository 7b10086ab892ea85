//! # inode 生命周期
//!
//! 创建、读取、写回、回收，以及链接、删除与改名。
//! 链接数降到 0 的 inode 只有在没有句柄引用时才会被回收，
//! 否则推迟到最后一个句柄释放。

use alloc::string::String;

use enumflags2::BitFlags;
use log::{debug, error, trace, warn};
use vfs::{Error, FileKind, Permission, Result, Stat};

use crate::dir::validate_name;
use crate::efs::ToyFileSystem;
use crate::icache::{InodeData, InodeKind};
use crate::layout::{DirBlock, DirEntry};
use crate::{BLOCK_SIZE, INODE_COUNT, INVALID, MAX_INODE_BLOCKS, NAME_MAX_LEN, ROOT_INO};

/// 新建 inode 时的种类与权限
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mode {
    pub kind: FileKind,
    pub permissions: BitFlags<Permission>,
}

impl Mode {
    /// 使用该种类的默认权限
    #[inline]
    pub fn new(kind: FileKind) -> Self {
        Self {
            kind,
            permissions: kind.default_permissions(),
        }
    }

    #[inline]
    pub fn regular() -> Self {
        Self::new(FileKind::Regular)
    }

    #[inline]
    pub fn directory() -> Self {
        Self::new(FileKind::Directory)
    }

    #[inline]
    pub fn with_permissions(self, permissions: BitFlags<Permission>) -> Self {
        Self {
            permissions,
            ..self
        }
    }
}

/* 读取与写回 */
impl ToyFileSystem {
    /// 取 inode 的当前内容：常驻的取缓存，否则从 inode 表解码
    pub(crate) fn inode(&mut self, ino: u32) -> Result<InodeData> {
        self.check_mounted()?;
        if !self.is_inode_in_use(ino) {
            return Err(Error::InvalidArgument);
        }
        match self.icache.get(ino) {
            Some(data) => Ok(data.clone()),
            None => self.load_inode(ino),
        }
    }

    /// 从 inode 表解码，符号链接连同目标一起读出
    fn load_inode(&mut self, ino: u32) -> Result<InodeData> {
        let disk_inode = self.read_disk_inode(ino);
        let mut data = InodeData::decode(ino, &disk_inode).inspect_err(|_| {
            error!("inode {ino} has unknown mode {:#o}", disk_inode.mode);
        })?;

        if let InodeKind::Symlink { target } = &mut data.kind {
            let block_id = disk_inode.direct[0];
            let len = disk_inode.size as usize;
            if block_id == INVALID || len >= NAME_MAX_LEN {
                error!("symlink {ino} has no valid target block");
                return Err(Error::CorruptImage);
            }
            let bytes = self
                .block(block_id)?
                .lock()
                .map(0, |block: &[u8; BLOCK_SIZE]| block[..len].to_vec());
            *target = String::from_utf8(bytes).map_err(|_| {
                error!("symlink {ino} target is not valid UTF-8");
                Error::CorruptImage
            })?;
        }

        trace!("loaded inode {ino}");
        Ok(data)
    }

    /// 存回 inode：常驻的更新缓存并标脏，否则直接写进 inode 表
    pub(crate) fn put_inode(&mut self, data: InodeData) {
        let ino = data.ino;
        match self.icache.get_mut(ino) {
            Some(resident) => *resident = data,
            None => self.modify_disk_inode(ino, |disk_inode| data.encode(disk_inode)),
        }
    }

    pub(crate) fn update_inode<V>(
        &mut self,
        ino: u32,
        f: impl FnOnce(&mut InodeData) -> V,
    ) -> Result<V> {
        let mut data = self.inode(ino)?;
        let ret = f(&mut data);
        self.put_inode(data);
        Ok(ret)
    }

    /// 读取 inode 的元信息
    pub fn stat(&mut self, ino: u32) -> Result<Stat> {
        Ok(self.inode(ino)?.stat())
    }

    /// 把内存中的 inode 写进 inode 表；`durable` 时等待设备落盘
    pub fn write_back(&mut self, ino: u32, durable: bool) -> Result<()> {
        let data = self.inode(ino)?;
        self.modify_disk_inode(ino, |disk_inode| data.encode(disk_inode));
        self.icache.mark_clean(ino);
        if durable {
            self.sync_inode_table()?;
        }
        trace!("wrote back inode {ino}, durable: {durable}");
        Ok(())
    }

    /// 回收链接数为 0 的 inode：释放数据块与槽位。
    /// 链接数不为 0 时什么也不做。
    /// 中途失败时，已释放的块从记录里摘掉，重试只会释放剩下的块。
    pub(crate) fn evict(&mut self, ino: u32) -> Result<()> {
        let mut data = self.inode(ino)?;
        if data.links > 0 {
            return Ok(());
        }

        for index in 0..MAX_INODE_BLOCKS {
            let block_id = data.direct[index];
            if block_id == INVALID {
                continue;
            }
            if let Err(e) = self.dealloc_block(block_id) {
                self.put_inode(data);
                return Err(e);
            }
            data.direct[index] = INVALID;
            data.blocks -= 1;
        }
        self.icache.remove(ino);
        self.dealloc_inode(ino)?;
        debug!("evicted inode {ino}");
        Ok(())
    }

    /// 取得一个引用，返回槽位当前的世代
    pub(crate) fn iget(&mut self, ino: u32) -> Result<u32> {
        self.check_mounted()?;
        if !self.is_inode_in_use(ino) {
            return Err(Error::InvalidArgument);
        }
        if !self.icache.hold(ino) {
            let data = self.load_inode(ino)?;
            self.icache.insert(data);
        }
        Ok(self.generation(ino))
    }

    /// 释放一个引用。最后一个引用释放时，孤儿被回收，其余写回。
    pub(crate) fn iput(&mut self, ino: u32) {
        let Some((data, dirty)) = self.icache.release(ino) else {
            return;
        };
        if !self.is_mounted() {
            return;
        }

        if data.links == 0 {
            // 先存回最新的内容，回收时按它释放数据块
            self.put_inode(data);
            if let Err(e) = self.evict(ino) {
                error!("failed to evict orphan inode {ino}: {e}");
            }
        } else if dirty {
            self.put_inode(data);
        }
    }

    /// 回收所有链接数为 0 的 inode，不论是否还有句柄引用。
    /// 卸载时调用，卷卸下之后句柄再释放也无从回收。
    pub(crate) fn evict_orphans(&mut self) -> Result<()> {
        for ino in (0..INODE_COUNT).filter(|&ino| ino != ROOT_INO) {
            if !self.is_inode_in_use(ino) || self.inode(ino)?.links > 0 {
                continue;
            }
            if self.icache.refs(ino) > 0 {
                debug!("evicting orphan inode {ino} still held by handles");
            }
            self.evict(ino)?;
        }
        Ok(())
    }

    /// 句柄仍然指向它打开时的那个 inode
    pub(crate) fn check_handle(&self, ino: u32, generation: u32) -> Result<()> {
        self.check_mounted()?;
        if !self.is_inode_in_use(ino) || self.generation(ino) != generation {
            warn!("stale handle for inode {ino}");
            return Err(Error::InvalidArgument);
        }
        Ok(())
    }

    pub fn set_owner(&mut self, ino: u32, uid: u32, gid: u32) -> Result<()> {
        let now = self.now();
        self.update_inode(ino, |data| {
            data.uid = uid;
            data.gid = gid;
            data.ctime = now;
        })
    }

    pub fn set_permissions(&mut self, ino: u32, permissions: BitFlags<Permission>) -> Result<()> {
        let now = self.now();
        self.update_inode(ino, |data| {
            data.permissions = permissions;
            data.ctime = now;
        })
    }
}

/* 创建、链接、删除、改名 */
impl ToyFileSystem {
    /// 在 `parent` 下创建名为 `name` 的 inode，返回新的 inode 号。
    ///
    /// 目录带一个含 `.` 与 `..` 的数据块；符号链接的目标存进一个数据块。
    /// 中途失败时已分配的块与 inode 都会退还。
    pub fn create_inode(
        &mut self,
        parent: u32,
        name: &str,
        mode: Mode,
        target: Option<&str>,
    ) -> Result<u32> {
        validate_name(name)?;
        let parent_data = self.dir_inode(parent)?;
        match self.dir_lookup(parent, name) {
            Ok(_) => return Err(Error::AlreadyExists),
            Err(Error::NotFound) => {}
            Err(e) => return Err(e),
        }
        match (mode.kind, target) {
            (FileKind::Symlink, Some(target)) => {
                if target.is_empty() || target.as_bytes().contains(&0) {
                    return Err(Error::InvalidArgument);
                }
                // 目标要以 \0 结尾
                if target.len() >= NAME_MAX_LEN {
                    return Err(Error::NameTooLong);
                }
            }
            (FileKind::Symlink, None) | (_, Some(_)) => return Err(Error::InvalidArgument),
            _ => {}
        }

        let ino = self.alloc_inode()?;
        let mut block = None;
        if let Err(e) = self.init_inode(ino, &parent_data, name, mode, target, &mut block) {
            warn!("creating {name:?} failed: {e}, rolling back inode {ino}");
            if let Some(block_id) = block {
                if let Err(e) = self.dealloc_block(block_id) {
                    error!("rollback of block {block_id} failed: {e}");
                }
            }
            if let Err(e) = self.dealloc_inode(ino) {
                error!("rollback of inode {ino} failed: {e}");
            }
            return Err(e);
        }

        debug!("created {:?} {name:?} as inode {ino} in {parent}", mode.kind);
        Ok(ino)
    }

    fn init_inode(
        &mut self,
        ino: u32,
        parent: &InodeData,
        name: &str,
        mode: Mode,
        target: Option<&str>,
        block: &mut Option<u32>,
    ) -> Result<()> {
        let now = self.now();
        let mut data = InodeData {
            ino,
            kind: InodeKind::Regular,
            permissions: mode.permissions,
            links: 1,
            uid: parent.uid,
            gid: parent.gid,
            size: 0,
            blocks: 0,
            direct: [INVALID; MAX_INODE_BLOCKS],
            atime: now,
            mtime: now,
            ctime: now,
        };

        match (mode.kind, target) {
            (FileKind::Regular, _) => {}
            (FileKind::Directory, _) => {
                let block_id = self.alloc_block()?;
                *block = Some(block_id);
                let parent_ino = parent.ino;
                self.block(block_id)?
                    .lock()
                    .map_mut(0, |entries: &mut DirBlock| {
                        entries.iter_mut().for_each(DirEntry::clear);
                        entries[0].set(".", ino);
                        entries[1].set("..", parent_ino);
                    });
                data.kind = InodeKind::Directory;
                data.links = 2;
                data.size = 2 * DirEntry::SIZE as u32;
                data.blocks = 1;
                data.direct[0] = block_id;
            }
            (FileKind::Symlink, target) => {
                let target = target.ok_or(Error::InvalidArgument)?;
                let block_id = self.alloc_block()?;
                *block = Some(block_id);
                self.block(block_id)?
                    .lock()
                    .map_mut(0, |bytes: &mut [u8; BLOCK_SIZE]| {
                        bytes[..target.len()].copy_from_slice(target.as_bytes());
                        bytes[target.len()] = 0;
                    });
                data.kind = InodeKind::Symlink {
                    target: target.into(),
                };
                data.size = target.len() as u32;
                data.blocks = 1;
                data.direct[0] = block_id;
            }
        }

        self.modify_disk_inode(ino, |disk_inode| data.encode(disk_inode));
        self.dir_insert(parent.ino, name, ino)
    }

    /// 为 `ino` 在 `parent` 下新增一个名字。
    /// 已经没有名字、只剩句柄引用的 inode 不能再链接回来。
    pub fn link(&mut self, ino: u32, parent: u32, name: &str) -> Result<()> {
        validate_name(name)?;
        self.dir_inode(parent)?;
        let data = self.inode(ino)?;
        if data.is_dir() {
            return Err(Error::IsADirectory);
        }
        if data.links == 0 {
            return Err(Error::NotFound);
        }
        match self.dir_lookup(parent, name) {
            Ok(_) => return Err(Error::AlreadyExists),
            Err(Error::NotFound) => {}
            Err(e) => return Err(e),
        }

        self.dir_insert(parent, name, ino)?;
        let now = self.now();
        self.update_inode(ino, |data| {
            data.links += 1;
            data.ctime = now;
        })?;
        debug!("linked inode {ino} as {name:?} in {parent}");
        Ok(())
    }

    /// 删除非目录的名字
    pub fn unlink(&mut self, parent: u32, name: &str) -> Result<()> {
        reject_dots(name)?;
        let ino = self.dir_lookup(parent, name)?;
        if self.inode(ino)?.is_dir() {
            return Err(Error::IsADirectory);
        }

        self.dir_remove(parent, name)?;
        self.drop_links(ino, 1)?;
        debug!("unlinked {name:?} (inode {ino}) from {parent}");
        Ok(())
    }

    /// 删除空目录
    pub fn rmdir(&mut self, parent: u32, name: &str) -> Result<()> {
        reject_dots(name)?;
        let ino = self.dir_lookup(parent, name)?;
        let data = self.inode(ino)?;
        if !data.is_dir() {
            return Err(Error::NotADirectory);
        }
        // 空目录的链接数恰好是 2
        if data.links > 2 {
            return Err(Error::DirectoryNotEmpty);
        }

        self.dir_remove(parent, name)?;
        self.drop_links(ino, 2)?;
        debug!("removed directory {name:?} (inode {ino}) from {parent}");
        Ok(())
    }

    /// 链接数减 `n`，降到 0 且无人引用时立即回收
    fn drop_links(&mut self, ino: u32, n: u32) -> Result<()> {
        let now = self.now();
        let links = self.update_inode(ino, |data| {
            data.links = data.links.saturating_sub(n);
            data.ctime = now;
            data.links
        })?;

        if links == 0 {
            if self.icache.refs(ino) == 0 {
                self.evict(ino)?;
            } else {
                debug!("inode {ino} is orphaned, eviction deferred to its last handle");
            }
        }
        Ok(())
    }

    /// 改名：先插入新名字，再删除旧名字。
    /// 删除旧名字失败时撤销插入，两个名字不会同时消失。
    pub fn rename(
        &mut self,
        old_parent: u32,
        old_name: &str,
        new_parent: u32,
        new_name: &str,
    ) -> Result<()> {
        reject_dots(old_name)?;
        reject_dots(new_name)?;
        validate_name(new_name)?;
        let ino = self.dir_lookup(old_parent, old_name)?;
        self.dir_inode(new_parent)?;
        let displaced = match self.dir_lookup(new_parent, new_name) {
            Ok(displaced) => Some(displaced),
            Err(Error::NotFound) => None,
            Err(e) => return Err(e),
        };
        if displaced == Some(ino) {
            return Ok(());
        }

        let moving = self.inode(ino)?;
        let displaced_is_dir = match displaced {
            Some(displaced) => {
                let displaced = self.inode(displaced)?;
                match (moving.is_dir(), displaced.is_dir()) {
                    (true, false) => return Err(Error::NotADirectory),
                    (false, true) => return Err(Error::IsADirectory),
                    (true, true) if displaced.links > 2 => {
                        return Err(Error::DirectoryNotEmpty);
                    }
                    (_, is_dir) => is_dir,
                }
            }
            None => false,
        };
        if moving.is_dir() && old_parent != new_parent && self.is_ancestor(ino, new_parent)? {
            return Err(Error::InvalidArgument);
        }

        self.dir_insert(new_parent, new_name, ino)?;
        if let Err(e) = self.dir_remove(old_parent, old_name) {
            warn!("rename of {old_name:?} failed: {e}, restoring {new_name:?}");
            let restored = match displaced {
                Some(displaced) => self.dir_insert(new_parent, new_name, displaced).and_then(|_| {
                    self.update_inode(new_parent, |dir| dir.links = dir.links.saturating_sub(2))
                }),
                None => self.dir_remove(new_parent, new_name).map(|_| ()),
            };
            if let Err(e) = restored {
                error!("restoring {new_name:?} in {new_parent} failed: {e}");
            }
            return Err(e);
        }

        if let Some(displaced) = displaced {
            // 覆盖插入也加了一次链接数，但目录项个数没变
            self.update_inode(new_parent, |dir| dir.links = dir.links.saturating_sub(1))?;
            self.drop_links(displaced, if displaced_is_dir { 2 } else { 1 })?;
        }
        if moving.is_dir() && old_parent != new_parent {
            self.dir_repoint(ino, "..", new_parent)?;
        }
        let now = self.now();
        self.update_inode(ino, |data| data.ctime = now)?;

        debug!("renamed {old_name:?} in {old_parent} to {new_name:?} in {new_parent}");
        Ok(())
    }

    /// `ancestor` 是否在 `dir` 到根的路径上（含 `dir` 本身）
    fn is_ancestor(&mut self, ancestor: u32, mut dir: u32) -> Result<bool> {
        for _ in 0..INODE_COUNT {
            if dir == ancestor {
                return Ok(true);
            }
            if dir == ROOT_INO {
                return Ok(false);
            }
            dir = self.dir_lookup(dir, "..")?;
        }

        error!("directory tree has a cycle above inode {dir}");
        Err(Error::CorruptImage)
    }
}

#[inline]
fn reject_dots(name: &str) -> Result<()> {
    if name == "." || name == ".." {
        return Err(Error::InvalidArgument);
    }
    Ok(())
}
