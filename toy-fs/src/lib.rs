#![no_std]

extern crate alloc;

/* toy-fs 的整体架构，自上而下 */

// 索引节点层：对外的 inode 句柄
mod vfs;
pub use self::vfs::Inode;

// inode 生命周期：创建、读取、写回、回收、链接、改名
mod lifecycle;
pub use lifecycle::Mode;

// 目录项引擎
mod dir;

// 文件数据读写
mod file;
pub use file::MAX_FILE_SIZE;

// inode 对象缓存
mod icache;

// 块分配器与 inode 分配器
mod balloc;
mod ialloc;

// 超级块管理器：格式化、挂载、卸载
mod efs;
pub use efs::ToyFileSystem;

// 磁盘数据结构层
pub mod layout;

// 块缓存层
mod block_cache;

mod clock;
pub use clock::{Clock, ZeroClock};

pub use block_dev::{BlockDevice, DeviceError};

pub const MAGIC: u32 = 0x5F54_4F59;
pub const BLOCK_SIZE: usize = 2048;
pub const BLOCK_BITS: usize = BLOCK_SIZE * 8;

/// 卷的总块数：2048 * 512 = 1MiB
pub const TOTAL_BLOCKS: u32 = 512;
/// inode 表只有一块，每块 32 个 inode
pub const INODE_COUNT: u32 = 32;
/// 每个 inode 最多使用的直接块
pub const MAX_INODE_BLOCKS: usize = 7;
/// 目录项名字的最大长度
pub const NAME_MAX_LEN: usize = 28;

/// 无效引用：标记空闲的目录项、未使用的直接块槽位。
/// 卷上不会出现如此大的块号或 inode 号，而 0 号 inode 是合法的根目录。
pub const INVALID: u32 = 0xdead_beef;

pub const SUPER_BLOCK_ID: u32 = 0;
pub const INODE_TABLE_BLOCK_ID: u32 = 1;
pub const BITMAP_BLOCK_ID: u32 = 2;
pub const FIRST_DATA_BLOCK: u32 = 3;
pub const LAST_DATA_BLOCK: u32 = TOTAL_BLOCKS - 1;

pub const ROOT_INO: u32 = 0;

type DataBlock = [u8; BLOCK_SIZE];
