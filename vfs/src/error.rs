use block_dev::DeviceError;
use derive_more::Display;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// 块、inode 耗尽，或目录已分配的块里没有空槽位
    #[display(fmt = "no space left on volume")]
    NoSpace,
    #[display(fmt = "no such file or directory")]
    NotFound,
    #[display(fmt = "file name too long")]
    NameTooLong,
    /// 魔数不对、挂载时为脏，或扫描中发现不变量被破坏
    #[display(fmt = "volume image is corrupted")]
    CorruptImage,
    #[display(fmt = "I/O error: {:?}", _0)]
    Io(DeviceError),
    #[display(fmt = "invalid argument")]
    InvalidArgument,
    /// 写入需要的直接块超过上限
    #[display(fmt = "file too large")]
    FileTooBig,
    #[display(fmt = "file exists")]
    AlreadyExists,
    #[display(fmt = "not a directory")]
    NotADirectory,
    #[display(fmt = "is a directory")]
    IsADirectory,
    #[display(fmt = "directory not empty")]
    DirectoryNotEmpty,
}

impl From<DeviceError> for Error {
    #[inline]
    fn from(e: DeviceError) -> Self {
        Self::Io(e)
    }
}

impl core::error::Error for Error {}

pub type Result<T> = core::result::Result<T, Error>;
