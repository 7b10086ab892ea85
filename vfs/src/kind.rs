use enumflags2::{BitFlags, bitflags};

use crate::Error;

/// 文件种类，编码在 mode 的高位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    Regular,
    Directory,
    Symlink,
}

impl FileKind {
    /// mode 中表示种类的掩码
    pub const MASK: u32 = 0o170000;

    pub const fn bits(self) -> u32 {
        match self {
            Self::Regular => 0o100000,
            Self::Directory => 0o040000,
            Self::Symlink => 0o120000,
        }
    }

    /// 从原始 mode 中解出种类；未知的种类说明镜像已损坏
    pub fn from_mode(mode: u32) -> Result<Self, Error> {
        match mode & Self::MASK {
            0o100000 => Ok(Self::Regular),
            0o040000 => Ok(Self::Directory),
            0o120000 => Ok(Self::Symlink),
            _ => Err(Error::CorruptImage),
        }
    }

    /// 新建该种类文件时的默认权限
    pub fn default_permissions(self) -> BitFlags<Permission> {
        match self {
            Self::Regular => Permission::OwnerRead
                | Permission::OwnerWrite
                | Permission::GroupRead
                | Permission::OtherRead,
            Self::Directory => {
                Permission::OwnerRead
                    | Permission::OwnerWrite
                    | Permission::OwnerExec
                    | Permission::GroupRead
                    | Permission::GroupExec
                    | Permission::OtherRead
                    | Permission::OtherExec
            }
            Self::Symlink => BitFlags::all(),
        }
    }
}

/// mode 的低 9 位
#[bitflags]
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    OtherExec = 0o001,
    OtherWrite = 0o002,
    OtherRead = 0o004,
    GroupExec = 0o010,
    GroupWrite = 0o020,
    GroupRead = 0o040,
    OwnerExec = 0o100,
    OwnerWrite = 0o200,
    OwnerRead = 0o400,
}
