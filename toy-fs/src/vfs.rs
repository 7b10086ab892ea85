//! # 索引节点层
//!
//! 对外的 inode 句柄，确立了文件系统的操作逻辑：
//! 通过多个 [`Inode`] 形成文件树。
//!
//! 句柄在存活期间持有 inode 缓存里的一个引用，丢弃时释放；
//! 被删除的 inode 在最后一个句柄丢弃时才被回收。

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use enumflags2::BitFlags;
use spin::Mutex;
use vfs::{DirEntry, Error, FileKind, Permission, Result, Stat};

use crate::Mode;
use crate::efs::ToyFileSystem;

pub struct Inode {
    ino: u32,
    /// 打开时槽位的世代
    generation: u32,
    fs: Arc<Mutex<ToyFileSystem>>,
}

impl Inode {
    pub(crate) fn open(fs: &Arc<Mutex<ToyFileSystem>>, ino: u32) -> Result<Self> {
        let generation = fs.lock().iget(ino)?;
        Ok(Self {
            ino,
            generation,
            fs: Arc::clone(fs),
        })
    }

    #[inline]
    pub fn ino(&self) -> u32 {
        self.ino
    }

    /// 校验句柄后在锁内执行操作
    fn with_fs<V>(&self, f: impl FnOnce(&mut ToyFileSystem) -> Result<V>) -> Result<V> {
        let mut fs = self.fs.lock();
        fs.check_handle(self.ino, self.generation)?;
        f(&mut fs)
    }

    /// 同一把锁内取得新 inode 的引用
    fn child(&self, f: impl FnOnce(&mut ToyFileSystem) -> Result<u32>) -> Result<Self> {
        let (ino, generation) = self.with_fs(|fs| {
            let ino = f(fs)?;
            Ok((ino, fs.iget(ino)?))
        })?;
        Ok(Self {
            ino,
            generation,
            fs: Arc::clone(&self.fs),
        })
    }

    fn same_volume(&self, other: &Self) -> Result<()> {
        if Arc::ptr_eq(&self.fs, &other.fs) {
            Ok(())
        } else {
            Err(Error::InvalidArgument)
        }
    }

    /// 在当前目录下创建普通文件或目录
    pub fn create(&self, name: &str, mode: Mode) -> Result<Self> {
        self.child(|fs| fs.create_inode(self.ino, name, mode, None))
    }

    pub fn mkdir(&self, name: &str) -> Result<Self> {
        self.create(name, Mode::directory())
    }

    /// 在当前目录下创建指向 `target` 的符号链接
    pub fn symlink(&self, name: &str, target: &str) -> Result<Self> {
        self.child(|fs| fs.create_inode(self.ino, name, Mode::new(FileKind::Symlink), Some(target)))
    }

    /// 根据文件名获取 inode
    pub fn find(&self, name: &str) -> Result<Self> {
        self.child(|fs| fs.dir_lookup(self.ino, name))
    }

    pub fn lookup(&self, name: &str) -> Result<u32> {
        self.with_fs(|fs| fs.dir_lookup(self.ino, name))
    }

    /// 在当前目录下为 `target` 新增名字 `name`
    pub fn link(&self, name: &str, target: &Self) -> Result<()> {
        self.same_volume(target)?;
        self.with_fs(|fs| {
            fs.check_handle(target.ino, target.generation)?;
            fs.link(target.ino, self.ino, name)
        })
    }

    pub fn unlink(&self, name: &str) -> Result<()> {
        self.with_fs(|fs| fs.unlink(self.ino, name))
    }

    pub fn rmdir(&self, name: &str) -> Result<()> {
        self.with_fs(|fs| fs.rmdir(self.ino, name))
    }

    /// 把当前目录下的 `name` 移到 `new_parent` 下，改名为 `new_name`
    pub fn rename(&self, name: &str, new_parent: &Self, new_name: &str) -> Result<()> {
        self.same_volume(new_parent)?;
        self.with_fs(|fs| {
            fs.check_handle(new_parent.ino, new_parent.generation)?;
            fs.rename(self.ino, name, new_parent.ino, new_name)
        })
    }

    pub fn read_at(&self, offset: usize, buf: &mut [u8]) -> Result<usize> {
        self.with_fs(|fs| fs.read_at(self.ino, offset, buf))
    }

    pub fn write_at(&self, offset: usize, buf: &[u8]) -> Result<usize> {
        self.with_fs(|fs| fs.write_at(self.ino, offset, buf))
    }

    pub fn truncate(&self, size: usize) -> Result<()> {
        self.with_fs(|fs| fs.truncate(self.ino, size))
    }

    /// 读出整个文件
    pub fn read_all(&self) -> Result<Vec<u8>> {
        self.with_fs(|fs| {
            let size = fs.stat(self.ino)?.size as usize;
            let mut buf = alloc::vec![0; size];
            let len = fs.read_at(self.ino, 0, &mut buf)?;
            buf.truncate(len);
            Ok(buf)
        })
    }

    pub fn read_dir(&self) -> Result<Vec<DirEntry>> {
        self.with_fs(|fs| fs.dir_entries(self.ino))
    }

    pub fn read_link(&self) -> Result<String> {
        self.with_fs(|fs| fs.read_link(self.ino))
    }

    pub fn stat(&self) -> Result<Stat> {
        self.with_fs(|fs| fs.stat(self.ino))
    }

    /// 写回 inode；`durable` 时等待设备落盘
    pub fn write_back(&self, durable: bool) -> Result<()> {
        self.with_fs(|fs| fs.write_back(self.ino, durable))
    }

    pub fn set_owner(&self, uid: u32, gid: u32) -> Result<()> {
        self.with_fs(|fs| fs.set_owner(self.ino, uid, gid))
    }

    pub fn set_permissions(&self, permissions: BitFlags<Permission>) -> Result<()> {
        self.with_fs(|fs| fs.set_permissions(self.ino, permissions))
    }
}

impl Clone for Inode {
    fn clone(&self) -> Self {
        self.fs.lock().icache.hold(self.ino);
        Self {
            ino: self.ino,
            generation: self.generation,
            fs: Arc::clone(&self.fs),
        }
    }
}

impl Drop for Inode {
    fn drop(&mut self) {
        self.fs.lock().iput(self.ino);
    }
}
