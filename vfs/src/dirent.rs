use alloc::string::String;

/// 读目录时交给宿主的目录项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Inode number
    pub ino: u32,
    pub name: String,
}

impl DirEntry {
    #[inline]
    pub fn is_dot(&self) -> bool {
        self.name == "." || self.name == ".."
    }
}
