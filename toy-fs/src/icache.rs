//! # inode 对象缓存
//!
//! 以 inode 号为键，保存被句柄引用着的内存 inode。
//! 首次引用时从 inode 表解码，最后一个引用释放时移出缓存，
//! 由生命周期管理器决定写回还是回收。

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

use enumflags2::BitFlags;
use vfs::{Error, FileKind, Permission, Stat};

use crate::layout::DiskInode;
use crate::{INVALID, MAX_INODE_BLOCKS};

/// 内存中的 inode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InodeData {
    pub ino: u32,
    pub kind: InodeKind,
    pub permissions: BitFlags<Permission>,
    /// 硬链接个数
    pub links: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u32,
    pub blocks: u32,
    pub direct: [u32; MAX_INODE_BLOCKS],
    pub atime: u32,
    pub mtime: u32,
    pub ctime: u32,
}

/// 带数据的文件种类：符号链接的目标随 inode 一起常驻内存
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InodeKind {
    Regular,
    Directory,
    Symlink { target: String },
}

impl InodeData {
    /// 解码磁盘记录。符号链接的目标要另外从数据块读出。
    pub fn decode(ino: u32, disk_inode: &DiskInode) -> Result<Self, Error> {
        let kind = match FileKind::from_mode(disk_inode.mode)? {
            FileKind::Regular => InodeKind::Regular,
            FileKind::Directory => InodeKind::Directory,
            FileKind::Symlink => InodeKind::Symlink {
                target: String::new(),
            },
        };

        Ok(Self {
            ino,
            kind,
            permissions: BitFlags::from_bits_truncate(disk_inode.mode as u16),
            links: disk_inode.links,
            uid: disk_inode.uid,
            gid: disk_inode.gid,
            size: disk_inode.size,
            blocks: disk_inode.blocks,
            direct: disk_inode.direct,
            atime: disk_inode.atime,
            mtime: disk_inode.mtime,
            ctime: disk_inode.ctime,
        })
    }

    pub fn encode(&self, disk_inode: &mut DiskInode) {
        *disk_inode = DiskInode {
            mode: self.mode(),
            links: self.links,
            atime: self.atime,
            mtime: self.mtime,
            ctime: self.ctime,
            uid: self.uid,
            gid: self.gid,
            size: self.size,
            blocks: self.blocks,
            direct: self.direct,
        };
    }

    pub fn file_kind(&self) -> FileKind {
        match self.kind {
            InodeKind::Regular => FileKind::Regular,
            InodeKind::Directory => FileKind::Directory,
            InodeKind::Symlink { .. } => FileKind::Symlink,
        }
    }

    #[inline]
    pub fn mode(&self) -> u32 {
        self.file_kind().bits() | self.permissions.bits() as u32
    }

    #[inline]
    pub fn is_dir(&self) -> bool {
        self.kind == InodeKind::Directory
    }

    /// 已分配的直接块，按槽位顺序
    pub fn data_blocks(&self) -> impl Iterator<Item = u32> + '_ {
        self.direct.iter().copied().filter(|&block| block != INVALID)
    }

    pub fn touch(&mut self, now: u32) {
        self.atime = now;
        self.mtime = now;
        self.ctime = now;
    }

    pub fn stat(&self) -> Stat {
        Stat {
            ino: self.ino,
            kind: self.file_kind(),
            permissions: self.permissions,
            links: self.links,
            uid: self.uid,
            gid: self.gid,
            size: self.size as u64,
            blocks: self.blocks,
            direct: self.data_blocks().collect::<Vec<_>>(),
            atime: self.atime,
            mtime: self.mtime,
            ctime: self.ctime,
        }
    }
}

struct Resident {
    data: InodeData,
    /// 打开着的句柄数
    refs: usize,
    /// 内存中的修改尚未写回 inode 表
    dirty: bool,
}

#[derive(Default)]
pub struct InodeCache {
    resident: BTreeMap<u32, Resident>,
}

impl InodeCache {
    #[inline]
    pub fn get(&self, ino: u32) -> Option<&InodeData> {
        self.resident.get(&ino).map(|r| &r.data)
    }

    /// 取出可变引用并标记为脏
    pub fn get_mut(&mut self, ino: u32) -> Option<&mut InodeData> {
        self.resident.get_mut(&ino).map(|r| {
            r.dirty = true;
            &mut r.data
        })
    }

    /// 放入缓存，引用数为 1
    pub fn insert(&mut self, data: InodeData) {
        let ino = data.ino;
        let prev = self.resident.insert(
            ino,
            Resident {
                data,
                refs: 1,
                dirty: false,
            },
        );
        debug_assert!(prev.is_none(), "inode {ino} cached twice");
    }

    /// 已常驻则引用数加一
    pub fn hold(&mut self, ino: u32) -> bool {
        match self.resident.get_mut(&ino) {
            Some(r) => {
                r.refs += 1;
                true
            }
            None => false,
        }
    }

    /// 引用数减一；降到 0 时移出缓存并交还内容与脏标记
    pub fn release(&mut self, ino: u32) -> Option<(InodeData, bool)> {
        let r = self.resident.get_mut(&ino)?;
        r.refs -= 1;
        if r.refs > 0 {
            return None;
        }
        self.resident
            .remove(&ino)
            .map(|r| (r.data, r.dirty))
    }

    #[inline]
    pub fn refs(&self, ino: u32) -> usize {
        self.resident.get(&ino).map_or(0, |r| r.refs)
    }

    #[inline]
    pub fn mark_clean(&mut self, ino: u32) {
        if let Some(r) = self.resident.get_mut(&ino) {
            r.dirty = false;
        }
    }

    #[inline]
    pub fn remove(&mut self, ino: u32) {
        self.resident.remove(&ino);
    }

    /// 所有有未写回修改的 inode 号
    pub fn dirty(&self) -> Vec<u32> {
        self.resident
            .iter()
            .filter_map(|(&ino, r)| r.dirty.then_some(ino))
            .collect()
    }
}
