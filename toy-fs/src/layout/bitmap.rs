use alloc::sync::Arc;

use spin::Mutex;

use crate::BLOCK_BITS;
use crate::block_cache::BlockCache;

/// 位图块的结构：按 64 位分组
type BitmapBlock = [u64; BLOCK_BITS / 64];

/// 块位图，每一位记录卷上一个块是否在用。
/// 位图所在的块在挂载期间一直被钉在缓存里。
pub struct Bitmap {
    cache: Arc<Mutex<BlockCache>>,
    /// 有效位数，即卷的总块数
    bits: usize,
}

/// 位编号
struct BitId(u32);

impl Bitmap {
    #[inline]
    pub fn new(cache: Arc<Mutex<BlockCache>>, bits: usize) -> Self {
        assert!(bits <= BLOCK_BITS && bits % 64 == 0);
        Self { cache, bits }
    }

    /// 分配编号最小的空闲位。
    /// 逐组扫描，跳过已满的组；若位图的空间用尽，则返回空。
    pub fn alloc(&self) -> Option<u32> {
        let mut cache = self.cache.lock();
        let bitmap_block: &mut BitmapBlock = cache.get_mut(0);

        let (group_index, ingroup_index) = bitmap_block[..self.groups()]
            .iter()
            .enumerate()
            .find_map(|(group_index, &bits)| {
                (bits != u64::MAX).then_some((group_index, bits.trailing_ones()))
            })?;

        // 追加新位
        bitmap_block[group_index] |= 1 << ingroup_index;
        Some(BitId::encode(group_index, ingroup_index as usize))
    }

    /// 清除一位；若该位本来就是空闲的则返回 `false`
    pub fn dealloc(&self, id: u32) -> bool {
        let (group_index, ingroup_index) = BitId(id).decode();
        let mut cache = self.cache.lock();
        let bitmap_block: &mut BitmapBlock = cache.get_mut(0);

        if bitmap_block[group_index] & (1 << ingroup_index) == 0 {
            return false;
        }
        bitmap_block[group_index] &= !(1 << ingroup_index);
        true
    }

    /// 直接置位，只在格式化时使用
    pub fn set(&self, id: u32) {
        let (group_index, ingroup_index) = BitId(id).decode();
        self.cache
            .lock()
            .map_mut(0, |bitmap_block: &mut BitmapBlock| {
                bitmap_block[group_index] |= 1 << ingroup_index
            });
    }

    pub fn is_set(&self, id: u32) -> bool {
        let (group_index, ingroup_index) = BitId(id).decode();
        self.cache.lock().map(0, |bitmap_block: &BitmapBlock| {
            bitmap_block[group_index] & (1 << ingroup_index) != 0
        })
    }

    /// 空闲位的个数
    pub fn count_free(&self) -> u32 {
        self.cache.lock().map(0, |bitmap_block: &BitmapBlock| {
            bitmap_block[..self.groups()]
                .iter()
                .map(|bits| bits.count_zeros())
                .sum()
        })
    }

    #[inline]
    fn groups(&self) -> usize {
        self.bits / 64
    }
}

impl BitId {
    /// 线性映射编码得到位编号
    #[inline]
    fn encode(group_index: usize, ingroup_index: usize) -> u32 {
        (group_index * 64 + ingroup_index) as u32
    }

    #[inline]
    fn decode(self) -> (usize, usize) {
        let id = self.0 as usize;
        (id / 64, id % 64)
    }
}
