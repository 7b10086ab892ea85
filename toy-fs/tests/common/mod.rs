#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use spin::Mutex as SpinMutex;
use toy_fs::{BLOCK_SIZE, BlockDevice, Clock, DeviceError, TOTAL_BLOCKS, ToyFileSystem};

/// 内存盘，可按需让读写失败
pub struct RamDisk {
    blocks: Mutex<Vec<[u8; BLOCK_SIZE]>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
    flushes: AtomicUsize,
}

impl RamDisk {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            blocks: Mutex::new(vec![[0; BLOCK_SIZE]; TOTAL_BLOCKS as usize]),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            writes: AtomicUsize::new(0),
            flushes: AtomicUsize::new(0),
        })
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn flushes(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }

    /// 绕过文件系统直接看设备上的内容
    pub fn raw_block(&self, block_id: usize) -> [u8; BLOCK_SIZE] {
        self.blocks.lock().unwrap()[block_id]
    }

    pub fn patch_block(&self, block_id: usize, f: impl FnOnce(&mut [u8; BLOCK_SIZE])) {
        f(&mut self.blocks.lock().unwrap()[block_id]);
    }
}

impl BlockDevice for RamDisk {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), DeviceError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(DeviceError::Read(block_id));
        }
        let blocks = self.blocks.lock().unwrap();
        let block = blocks.get(block_id).ok_or(DeviceError::OutOfRange(block_id))?;
        buf.copy_from_slice(block);
        Ok(())
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), DeviceError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DeviceError::Write(block_id));
        }
        let mut blocks = self.blocks.lock().unwrap();
        let block = blocks
            .get_mut(block_id)
            .ok_or(DeviceError::OutOfRange(block_id))?;
        block.copy_from_slice(buf);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn flush(&self) -> Result<(), DeviceError> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// 手动拨动的时钟
#[derive(Default)]
pub struct FixedClock(AtomicU32);

impl FixedClock {
    pub fn new(now: u32) -> Arc<Self> {
        Arc::new(Self(AtomicU32::new(now)))
    }

    pub fn set(&self, now: u32) {
        self.0.store(now, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }
}

pub type Volume = Arc<SpinMutex<ToyFileSystem>>;

/// 在新内存盘上格式化一个卷
pub fn fresh_volume() -> (Arc<RamDisk>, Volume) {
    let disk = RamDisk::new();
    let fs = ToyFileSystem::format(disk.clone(), FixedClock::new(1_000)).unwrap();
    (disk, fs)
}

pub fn remount(disk: &Arc<RamDisk>, fs: &Volume) -> Volume {
    fs.lock().unmount().unwrap();
    ToyFileSystem::mount(disk.clone(), FixedClock::new(2_000)).unwrap()
}
