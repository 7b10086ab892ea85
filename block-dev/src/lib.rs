//! # 块设备接口层
//!
//! 块设备是以**块**为单位存储数据的设备，例如磁盘、光盘、U盘等；
//! [`BlockDevice`] 就是对读写块设备的抽象，
//! 实现了此特质的类型称为**块设备驱动**。
//!
//! 与内核里的驱动不同，这里的读写可以失败，失败以 [`DeviceError`] 报告给文件系统。

#![no_std]

use core::any::Any;

/// 块设备驱动特质
pub trait BlockDevice: Send + Sync + Any {
    /// 读出第 `block_id` 块，`buf` 的长度即块大小
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), DeviceError>;

    /// 写入第 `block_id` 块
    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), DeviceError>;

    /// 等待此前的写入落盘
    fn flush(&self) -> Result<(), DeviceError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceError {
    /// 块号超出设备范围
    OutOfRange(usize),
    /// 读失败或读不满一块
    Read(usize),
    /// 写失败或写不满一块
    Write(usize),
    Flush,
}

impl DeviceError {
    /// 出错的块号
    pub fn block_id(&self) -> Option<usize> {
        match *self {
            Self::OutOfRange(id) | Self::Read(id) | Self::Write(id) => Some(id),
            Self::Flush => None,
        }
    }
}
