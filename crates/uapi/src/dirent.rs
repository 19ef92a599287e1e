//! 目录项

/// 文件名最大长度（不含结尾 NUL）
pub const FS_MAX_FNAME_LEN: usize = 255;

/// 目录项名字字段的长度；目录游标以它为单位推进
pub const DIRENT_NAME_SIZE: usize = FS_MAX_FNAME_LEN + 1;

/// `getdirentry` 使用的目录项
///
/// `offset` 是目录内的游标，由内核在每次调用后推进；
/// `name` 以 NUL 结尾。
#[repr(C)]
#[derive(Debug, Clone)]
pub struct Dirent {
    pub offset: u64,
    pub name: [u8; DIRENT_NAME_SIZE],
}

impl Dirent {
    pub const fn new() -> Self {
        Self {
            offset: 0,
            name: [0; DIRENT_NAME_SIZE],
        }
    }

    /// 名字中 NUL 之前的部分
    pub fn name_bytes(&self) -> &[u8] {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(self.name.len());
        &self.name[..end]
    }

    /// 名字的 UTF-8 视图；非法编码时返回 `None`
    pub fn name_str(&self) -> Option<&str> {
        core::str::from_utf8(self.name_bytes()).ok()
    }
}

impl Default for Dirent {
    fn default() -> Self {
        Self::new()
    }
}
