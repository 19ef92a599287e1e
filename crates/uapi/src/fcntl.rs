//! 打开标志与定位方式
//!
//! 数值与 Linux generic ABI 保持一致。

use bitflags::bitflags;

bitflags! {
    /// `open(2)` 的标志位
    ///
    /// 访问模式占最低两位，不是独立的位标志，需通过 [`OpenFlags::access_mode`] 解析。
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenFlags: u32 {
        const O_RDONLY = 0o0;
        const O_WRONLY = 0o1;
        const O_RDWR = 0o2;
        const O_ACCMODE = 0o3;
        const O_CREAT = 0o100;
        const O_EXCL = 0o200;
        const O_TRUNC = 0o1000;
        const O_APPEND = 0o2000;
    }
}

/// 访问模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl AccessMode {
    pub fn readable(self) -> bool {
        matches!(self, AccessMode::ReadOnly | AccessMode::ReadWrite)
    }

    pub fn writable(self) -> bool {
        matches!(self, AccessMode::WriteOnly | AccessMode::ReadWrite)
    }
}

impl OpenFlags {
    /// 解析访问模式；`O_ACCMODE` 全置位是非法组合，返回 `None`
    pub fn access_mode(self) -> Option<AccessMode> {
        match self.bits() & Self::O_ACCMODE.bits() {
            0 => Some(AccessMode::ReadOnly),
            1 => Some(AccessMode::WriteOnly),
            2 => Some(AccessMode::ReadWrite),
            _ => None,
        }
    }

    /// 去掉访问模式后的其余标志
    pub fn creation_flags(self) -> Self {
        self.difference(Self::O_ACCMODE)
    }
}

/// `lseek(2)` 的 whence
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekWhence {
    Set = 0,
    Cur = 1,
    End = 2,
}

impl TryFrom<i32> for SeekWhence {
    type Error = i32;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(SeekWhence::Set),
            1 => Ok(SeekWhence::Cur),
            2 => Ok(SeekWhence::End),
            other => Err(other),
        }
    }
}
