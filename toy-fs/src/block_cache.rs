//! # 块缓存层
//!
//! 块设备读写速度一般慢于内存读写速度，因此我们在内存中开辟缓冲区，
//! 把即将操作的块复制到内存中，提高对块设备的操作效率。
//! 同时，块缓存层也会尝试返回已缓存的块。
//!
//! 块缓存层对使用者来说是透明的，使用者对块设备的操作都经过块缓存层，
//! 且**操作块时一定在缓冲区当中**。
//!
//! 每个卷拥有自己的缓存管理器，不存在全局状态。
//! 被外部持有引用的块（[`Arc`] 强引用数大于 1）不会被换出，
//! 超级块管理器借此在整个挂载期间钉住 inode 表与位图。

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::mem;

use block_dev::{BlockDevice, DeviceError};
use log::{error, trace, warn};
use spin::Mutex;

use crate::BLOCK_SIZE;

/// 按 8 字节对齐，块内的磁盘结构都由 `u32`/`u64` 组成
#[repr(C, align(8))]
struct BlockData([u8; BLOCK_SIZE]);

/// 缓存、调度块缓存
pub struct BlockCacheManager {
    device: Arc<dyn BlockDevice>,
    queue: Vec<(usize, Arc<Mutex<BlockCache>>)>,
}

/// 内存中的块缓存
pub struct BlockCache {
    /// 缓存的数据
    data: Box<BlockData>,
    /// 对应的块ID
    block_id: usize,
    /// 底层块设备的引用
    block_device: Arc<dyn BlockDevice>,
    /// 是否为脏块
    modified: bool,
}

impl BlockCache {
    pub fn new(block_id: usize, block_device: Arc<dyn BlockDevice>) -> Result<Self, DeviceError> {
        let mut data = Box::new(BlockData([0; BLOCK_SIZE]));
        block_device.read_block(block_id, &mut data.0)?;

        Ok(Self {
            data,
            block_id,
            block_device,
            modified: false,
        })
    }

    /// 写出脏块。写失败时块仍然是脏的。
    pub fn sync(&mut self) -> Result<(), DeviceError> {
        if self.modified {
            self.block_device.write_block(self.block_id, &self.data.0)?;
            self.modified = false;
        }
        Ok(())
    }

    pub fn get<T: Sized>(&self, offset: usize) -> &T {
        assert!(mem::size_of::<T>() + offset <= BLOCK_SIZE);
        assert_eq!(offset % mem::align_of::<T>(), 0);
        let addr = self.data.0[offset..].as_ptr().cast::<T>();
        unsafe { &*addr }
    }

    pub fn get_mut<T: Sized>(&mut self, offset: usize) -> &mut T {
        assert!(mem::size_of::<T>() + offset <= BLOCK_SIZE);
        assert_eq!(offset % mem::align_of::<T>(), 0);
        self.modified = true;
        let addr = self.data.0[offset..].as_mut_ptr().cast::<T>();
        unsafe { &mut *addr }
    }

    #[inline]
    pub fn map<T: Sized, V>(&self, offset: usize, f: impl FnOnce(&T) -> V) -> V {
        f(self.get(offset))
    }

    #[inline]
    pub fn map_mut<T: Sized, V>(&mut self, offset: usize, f: impl FnOnce(&mut T) -> V) -> V {
        f(self.get_mut(offset))
    }

    #[inline]
    pub fn zeroize(&mut self) {
        self.data.0.fill(0);
        self.modified = true;
    }
}

impl Drop for BlockCache {
    fn drop(&mut self) {
        if let Err(e) = self.sync() {
            error!("lost dirty block {} on release: {e:?}", self.block_id);
        }
    }
}

impl BlockCacheManager {
    /// 块缓存个数的上限
    const CAPACITY: usize = 16;

    pub fn new(device: Arc<dyn BlockDevice>) -> Self {
        Self {
            device,
            queue: Vec::with_capacity(Self::CAPACITY),
        }
    }

    #[inline]
    pub fn device(&self) -> &Arc<dyn BlockDevice> {
        &self.device
    }

    // 块缓存调度策略：踢走闲置块
    pub fn get(&mut self, block_id: usize) -> Result<Arc<Mutex<BlockCache>>, DeviceError> {
        // 尝试从缓冲区中读取块
        if let Some(cache) = self
            .queue
            .iter()
            .find_map(|(id, cache)| (block_id == *id).then_some(cache))
        {
            return Ok(Arc::clone(cache));
        };

        // 触及上限，写回一个块
        if self.queue.len() >= Self::CAPACITY {
            // 没有其它引用的才能写回
            match self
                .queue
                .iter()
                .position(|(_, cache)| Arc::strong_count(cache) == 1)
            {
                Some(index) => {
                    // 先写回再移出，写失败时缓存保持原样
                    self.queue[index].1.lock().sync()?;
                    let (victim, _) = self.queue.remove(index);
                    trace!("block {victim} evicted from cache");
                }
                None => warn!("all {} cached blocks are in use", self.queue.len()),
            }
        }

        // 缓存新块
        let block_cache = Arc::new(Mutex::new(BlockCache::new(block_id, self.device.clone())?));
        self.queue.push((block_id, block_cache.clone()));

        Ok(block_cache)
    }

    pub fn sync_all(&self) -> Result<(), DeviceError> {
        for (_, cache) in &self.queue {
            cache.lock().sync()?;
        }
        self.device.flush()
    }

    /// 写回并丢弃所有缓存
    pub fn release_all(&mut self) -> Result<(), DeviceError> {
        self.sync_all()?;
        self.queue.clear();
        Ok(())
    }
}
