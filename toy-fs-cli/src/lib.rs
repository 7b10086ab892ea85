//! 宿主上的块设备：把一个镜像文件当作 toy-fs 的磁盘。


use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use block_dev::{BlockDevice, DeviceError};
use log::error;
use toy_fs::{BLOCK_SIZE, Clock, TOTAL_BLOCKS};

/// 镜像文件的字节数
pub const IMAGE_SIZE: u64 = TOTAL_BLOCKS as u64 * BLOCK_SIZE as u64;

pub struct BlockFile(pub Mutex<File>);

impl BlockFile {
    /// 新建（或截断）一个全零的镜像文件
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let fd = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        fd.set_len(IMAGE_SIZE)?;
        Ok(Self(Mutex::new(fd)))
    }

    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let fd = OpenOptions::new().read(true).write(true).open(path)?;
        let len = fd.metadata()?.len();
        if len < IMAGE_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("image is {len} bytes, expected {IMAGE_SIZE}"),
            ));
        }
        Ok(Self(Mutex::new(fd)))
    }

    fn seek_to(file: &mut File, block_id: usize) -> io::Result<()> {
        file.seek(SeekFrom::Start((block_id * BLOCK_SIZE) as u64))?;
        Ok(())
    }
}

impl BlockDevice for BlockFile {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), DeviceError> {
        if block_id >= TOTAL_BLOCKS as usize {
            return Err(DeviceError::OutOfRange(block_id));
        }
        let mut file = self.0.lock().map_err(|_| DeviceError::Read(block_id))?;
        Self::seek_to(&mut file, block_id)
            .and_then(|_| file.read_exact(buf))
            .map_err(|e| {
                error!("reading block {block_id}: {e}");
                DeviceError::Read(block_id)
            })
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), DeviceError> {
        if block_id >= TOTAL_BLOCKS as usize {
            return Err(DeviceError::OutOfRange(block_id));
        }
        let mut file = self.0.lock().map_err(|_| DeviceError::Write(block_id))?;
        Self::seek_to(&mut file, block_id)
            .and_then(|_| file.write_all(buf))
            .map_err(|e| {
                error!("writing block {block_id}: {e}");
                DeviceError::Write(block_id)
            })
    }

    fn flush(&self) -> Result<(), DeviceError> {
        let file = self.0.lock().map_err(|_| DeviceError::Flush)?;
        file.sync_data().map_err(|e| {
            error!("flushing image: {e}");
            DeviceError::Flush
        })
    }
}

/// 宿主的系统时间
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u32 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs() as u32)
    }
}
