//! 文件系统与宿主之间交换的类型：错误、元信息、目录项。

#![no_std]

extern crate alloc;

mod dirent;
mod error;
mod kind;
mod stat;

pub use self::{
    dirent::DirEntry,
    error::{Error, Result},
    kind::{FileKind, Permission},
    stat::{Stat, StatFs},
};
