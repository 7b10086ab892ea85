//! # 超级块管理器
//!
//! 构建出磁盘的布局并使用：格式化、挂载、卸载、统计。
//! 一个 [`ToyFileSystem`] 就是一个挂载着的卷，所有操作都经由它进行，
//! 外部以 `Arc<Mutex<ToyFileSystem>>` 持有，每个操作全程持锁。

use alloc::sync::Arc;

use block_dev::BlockDevice;
use log::{debug, error, info};
use spin::Mutex;
use vfs::{Error, FileKind, Result, StatFs};

use crate::block_cache::{BlockCache, BlockCacheManager};
use crate::icache::InodeCache;
use crate::layout::*;
use crate::vfs::Inode;
use crate::{BITMAP_BLOCK_ID, DataBlock, INODE_TABLE_BLOCK_ID, SUPER_BLOCK_ID};
use crate::{BLOCK_SIZE, Clock, FIRST_DATA_BLOCK, INODE_COUNT, INVALID, LAST_DATA_BLOCK};
use crate::{NAME_MAX_LEN, ROOT_INO, TOTAL_BLOCKS};

pub struct ToyFileSystem {
    pub(crate) cache: BlockCacheManager,
    clock: Arc<dyn Clock>,
    /// 挂载期间钉住的 inode 表
    inode_table: Arc<Mutex<BlockCache>>,
    /// 挂载期间钉住的块位图
    pub(crate) bitmap: Bitmap,
    pub(crate) free_blocks: u32,
    pub(crate) free_inodes: u32,
    /// 超级块里的 inode 占用表
    pub(crate) inode_map: [u32; INODE_COUNT as usize],
    /// 每个槽位被分配的次数，用来识别过期句柄
    pub(crate) generations: [u32; INODE_COUNT as usize],
    pub(crate) icache: InodeCache,
    mounted: bool,
}

impl ToyFileSystem {
    /// 在块设备上建立一个空卷并挂载。
    ///
    /// 根目录是 0 号 inode，它的数据块放在最后一块，
    /// 这样空卷上的首次分配从第一个数据块开始。
    pub fn format(
        block_device: Arc<dyn BlockDevice>,
        clock: Arc<dyn Clock>,
    ) -> Result<Arc<Mutex<Self>>> {
        info!("formatting a {TOTAL_BLOCKS}-block volume");
        let zero: DataBlock = [0; BLOCK_SIZE];
        for block_id in 0..TOTAL_BLOCKS as usize {
            block_device.write_block(block_id, &zero)?;
        }

        let now = clock.now();
        let mut cache = BlockCacheManager::new(block_device.clone());

        let bitmap = Bitmap::new(cache.get(BITMAP_BLOCK_ID as usize)?, TOTAL_BLOCKS as usize);
        for block_id in [SUPER_BLOCK_ID, INODE_TABLE_BLOCK_ID, BITMAP_BLOCK_ID, LAST_DATA_BLOCK] {
            bitmap.set(block_id);
        }

        cache
            .get(INODE_TABLE_BLOCK_ID as usize)?
            .lock()
            .map_mut(0, |table: &mut [DiskInode; INODE_COUNT as usize]| {
                table.iter_mut().for_each(DiskInode::clear);

                let root = &mut table[ROOT_INO as usize];
                root.mode = FileKind::Directory.bits()
                    | FileKind::Directory.default_permissions().bits() as u32;
                // 父目录中没有指向根的目录项，"." 额外算一个
                root.links = 2;
                root.atime = now;
                root.mtime = now;
                root.ctime = now;
                root.size = 2 * DirEntry::SIZE as u32;
                root.blocks = 1;
                root.direct[0] = LAST_DATA_BLOCK;
            });

        cache
            .get(LAST_DATA_BLOCK as usize)?
            .lock()
            .map_mut(0, |entries: &mut DirBlock| {
                entries.iter_mut().for_each(DirEntry::clear);
                entries[0].set(".", ROOT_INO);
                entries[1].set("..", ROOT_INO);
            });

        let mut inodes = [DiskSuperBlock::INODE_FREE; INODE_COUNT as usize];
        inodes[ROOT_INO as usize] = DiskSuperBlock::INODE_IN_USE;
        let free_blocks = bitmap.count_free();
        cache
            .get(SUPER_BLOCK_ID as usize)?
            .lock()
            .map_mut(0, |super_block: &mut DiskSuperBlock| {
                super_block.init(INODE_COUNT - 1, free_blocks, inodes)
            });

        drop(bitmap);
        cache.release_all()?;

        Self::mount(block_device, clock)
    }

    pub fn mount(
        block_device: Arc<dyn BlockDevice>,
        clock: Arc<dyn Clock>,
    ) -> Result<Arc<Mutex<Self>>> {
        let mut cache = BlockCacheManager::new(block_device);

        let super_block = cache
            .get(SUPER_BLOCK_ID as usize)?
            .lock()
            .map(0, |super_block: &DiskSuperBlock| super_block.clone());
        if !super_block.is_valid() {
            error!("bad magic number, not a toy-fs volume");
            return Err(Error::CorruptImage);
        }
        if super_block.flag() == SuperBlockFlag::Dirty {
            error!("volume was not cleanly unmounted, refusing to mount");
            return Err(Error::CorruptImage);
        }

        let inode_table = cache.get(INODE_TABLE_BLOCK_ID as usize)?;
        let bitmap = Bitmap::new(cache.get(BITMAP_BLOCK_ID as usize)?, TOTAL_BLOCKS as usize);

        let mut efs = Self {
            cache,
            clock,
            inode_table,
            bitmap,
            free_blocks: super_block.free_blocks,
            free_inodes: super_block.free_inodes,
            inode_map: super_block.inodes,
            generations: [0; INODE_COUNT as usize],
            icache: InodeCache::default(),
            mounted: true,
        };
        efs.verify()?;

        // 挂载期间超级块是脏的，异常中断后的下一次挂载会被拒绝
        efs.write_super_block(SuperBlockFlag::Dirty)?;
        debug!(
            "mounted: {} free inodes, {} free blocks",
            efs.free_inodes, efs.free_blocks
        );

        Ok(Arc::new(Mutex::new(efs)))
    }

    /// 回收孤儿 inode，写回所有修改并把超级块标记为干净。
    /// 此后卷上的操作都会失败。
    pub fn unmount(&mut self) -> Result<()> {
        self.check_mounted()?;
        self.evict_orphans()?;
        self.flush_inodes();
        self.cache.sync_all()?;
        self.write_super_block(SuperBlockFlag::Clean)?;
        self.cache.release_all()?;
        self.mounted = false;
        info!("volume unmounted");
        Ok(())
    }

    /// 写回所有修改，超级块保持脏标记
    pub fn sync(&mut self) -> Result<()> {
        self.check_mounted()?;
        self.flush_inodes();
        self.write_super_block(SuperBlockFlag::Dirty)?;
        self.cache.sync_all()?;
        Ok(())
    }

    pub fn statfs(&self) -> StatFs {
        StatFs {
            block_size: BLOCK_SIZE as u64,
            total_blocks: TOTAL_BLOCKS as u64,
            free_blocks: self.free_blocks as u64,
            total_inodes: INODE_COUNT as u64,
            free_inodes: self.free_inodes as u64,
            name_max: NAME_MAX_LEN as u64,
        }
    }

    /// 核对空闲计数与位图、占用表是否一致
    pub fn verify(&self) -> Result<()> {
        let bitmap_free = self.bitmap.count_free();
        if bitmap_free != self.free_blocks {
            error!(
                "free block count {} disagrees with bitmap ({bitmap_free} clear bits)",
                self.free_blocks
            );
            return Err(Error::CorruptImage);
        }

        let table_free = self
            .inode_map
            .iter()
            .filter(|&&slot| slot == DiskSuperBlock::INODE_FREE)
            .count() as u32;
        if table_free != self.free_inodes {
            error!(
                "free inode count {} disagrees with inode table ({table_free} free slots)",
                self.free_inodes
            );
            return Err(Error::CorruptImage);
        }

        if let Some(block_id) =
            (SUPER_BLOCK_ID..FIRST_DATA_BLOCK).find(|&block_id| !self.bitmap.is_set(block_id))
        {
            error!("metadata block {block_id} is marked free");
            return Err(Error::CorruptImage);
        }
        if self.inode_map[ROOT_INO as usize] != DiskSuperBlock::INODE_IN_USE {
            error!("root inode is marked free");
            return Err(Error::CorruptImage);
        }

        Ok(())
    }

    pub fn root_inode(efs: &Arc<Mutex<Self>>) -> Result<Inode> {
        Inode::open(efs, ROOT_INO)
    }

    /// 通过 inode 号取得句柄，首次引用时从 inode 表解码
    pub fn read_inode(efs: &Arc<Mutex<Self>>, ino: u32) -> Result<Inode> {
        Inode::open(efs, ino)
    }
}

impl ToyFileSystem {
    #[inline]
    pub(crate) fn check_mounted(&self) -> Result<()> {
        if self.mounted {
            Ok(())
        } else {
            Err(Error::InvalidArgument)
        }
    }

    #[inline]
    pub(crate) fn is_mounted(&self) -> bool {
        self.mounted
    }

    #[inline]
    pub(crate) fn now(&self) -> u32 {
        self.clock.now()
    }

    /// 经由块缓存取得一个块
    #[inline]
    pub(crate) fn block(&mut self, block_id: u32) -> Result<Arc<Mutex<BlockCache>>> {
        debug_assert_ne!(block_id, INVALID);
        Ok(self.cache.get(block_id as usize)?)
    }

    pub(crate) fn read_disk_inode(&self, ino: u32) -> DiskInode {
        self.inode_table
            .lock()
            .map(DiskInode::offset(ino), |disk_inode: &DiskInode| {
                disk_inode.clone()
            })
    }

    pub(crate) fn modify_disk_inode(&self, ino: u32, f: impl FnOnce(&mut DiskInode)) {
        self.inode_table.lock().map_mut(DiskInode::offset(ino), f)
    }

    /// 把 inode 表块写到设备上
    pub(crate) fn sync_inode_table(&self) -> Result<()> {
        self.inode_table.lock().sync()?;
        self.cache.device().flush()?;
        Ok(())
    }

    /// 把缓存里所有脏 inode 写进 inode 表
    fn flush_inodes(&mut self) {
        for ino in self.icache.dirty() {
            if let Some(data) = self.icache.get(ino) {
                let data = data.clone();
                self.modify_disk_inode(ino, |disk_inode| data.encode(disk_inode));
                self.icache.mark_clean(ino);
            }
        }
    }

    fn write_super_block(&mut self, flag: SuperBlockFlag) -> Result<()> {
        let (free_inodes, free_blocks, inodes) =
            (self.free_inodes, self.free_blocks, self.inode_map);
        let super_block = self.cache.get(SUPER_BLOCK_ID as usize)?;
        let mut super_block = super_block.lock();
        super_block.map_mut(0, |super_block: &mut DiskSuperBlock| {
            super_block.init(free_inodes, free_blocks, inodes);
            super_block.set_flag(flag);
        });
        super_block.sync()?;
        Ok(())
    }
}
