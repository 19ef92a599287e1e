//! 文件状态

/// 文件类型掩码
pub const S_IFMT: u32 = 0o170000;
pub const S_IFREG: u32 = 0o100000;
pub const S_IFDIR: u32 = 0o040000;
pub const S_IFCHR: u32 = 0o020000;
pub const S_IFBLK: u32 = 0o060000;

/// `fstat` 返回的文件状态
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stat {
    /// 文件类型（`S_IF*`）
    pub mode: u32,
    /// 硬链接数
    pub nlinks: u32,
    /// 占用块数
    pub blocks: u64,
    /// 文件大小（字节）
    pub size: u64,
}

impl Stat {
    pub fn is_dir(&self) -> bool {
        self.mode & S_IFMT == S_IFDIR
    }

    pub fn is_reg(&self) -> bool {
        self.mode & S_IFMT == S_IFREG
    }
}
