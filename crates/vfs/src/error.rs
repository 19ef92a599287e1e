//! VFS 错误类型
//!
//! 定义了与 POSIX 兼容的文件系统错误码，可通过 [`FsError::to_errno()`] 转换为系统调用错误码。

/// VFS 错误类型
///
/// 各错误码对应标准 POSIX errno 值。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    // 文件/目录相关
    /// 文件不存在 (-ENOENT)
    NotFound,
    /// 文件已存在 (-EEXIST)
    AlreadyExists,
    /// 不是目录 (-ENOTDIR)
    NotDirectory,
    /// 是目录 (-EISDIR)
    IsDirectory,
    /// 目录非空 (-ENOTEMPTY)
    DirectoryNotEmpty,

    // 文件描述符相关
    /// 打开的文件过多 (-EMFILE)
    TooManyOpenFiles,
    /// 描述符槽位或挂载点正被占用 (-EBUSY)
    Busy,

    // 参数相关
    /// 无效参数：非法标志、未对齐的 I/O、无效的描述符等 (-EINVAL)
    InvalidArgument,
    /// 名字过长 (-ENAMETOOLONG)
    NameTooLong,

    // 设备/文件系统相关
    /// 设备表中不存在该名字，或该设备不可挂载 (-ENXIO)
    NoDevice,
    /// 设备可挂载但尚未挂载 (-ENODEV)
    DeviceNotAvailable,
    /// 设备空间不足 (-ENOSPC)
    NoSpace,
    /// I/O 错误 (-EIO)
    IoError,

    // 其他
    /// 内存不足，或传输缓冲区容量不够 (-ENOMEM)
    OutOfMemory,
    /// 操作未实现 (-ENOSYS)
    NotImplemented,
    /// 操作不支持 (-ENOTSUP)
    NotSupported,
}

impl FsError {
    /// 转换为系统调用错误码（负数）
    pub fn to_errno(&self) -> isize {
        match self {
            FsError::NotFound => -2,
            FsError::IoError => -5,
            FsError::NoDevice => -6,
            FsError::OutOfMemory => -12,
            FsError::Busy => -16,
            FsError::AlreadyExists => -17,
            FsError::DeviceNotAvailable => -19,
            FsError::NotDirectory => -20,
            FsError::IsDirectory => -21,
            FsError::InvalidArgument => -22,
            FsError::TooManyOpenFiles => -24,
            FsError::NoSpace => -28,
            FsError::NameTooLong => -36,
            FsError::NotImplemented => -38,
            FsError::DirectoryNotEmpty => -39,
            FsError::NotSupported => -95,
        }
    }
}

impl core::fmt::Display for FsError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            FsError::NotFound => "no such file or directory",
            FsError::AlreadyExists => "file exists",
            FsError::NotDirectory => "not a directory",
            FsError::IsDirectory => "is a directory",
            FsError::DirectoryNotEmpty => "directory not empty",
            FsError::TooManyOpenFiles => "too many open files",
            FsError::Busy => "device or resource busy",
            FsError::InvalidArgument => "invalid argument",
            FsError::NameTooLong => "name too long",
            FsError::NoDevice => "no such device",
            FsError::DeviceNotAvailable => "device not available",
            FsError::NoSpace => "no space left on device",
            FsError::IoError => "i/o error",
            FsError::OutOfMemory => "out of memory",
            FsError::NotImplemented => "not implemented",
            FsError::NotSupported => "operation not supported",
        };
        f.write_str(msg)
    }
}

/// VFS 操作结果
pub type FsResult<T> = Result<T, FsError>;

#[cfg(test)]
mod tests {
    use super::FsError;

    #[test]
    fn test_errno_is_negative_and_distinct() {
        let all = [
            FsError::NotFound,
            FsError::AlreadyExists,
            FsError::NotDirectory,
            FsError::IsDirectory,
            FsError::DirectoryNotEmpty,
            FsError::TooManyOpenFiles,
            FsError::Busy,
            FsError::InvalidArgument,
            FsError::NameTooLong,
            FsError::NoDevice,
            FsError::DeviceNotAvailable,
            FsError::NoSpace,
            FsError::IoError,
            FsError::OutOfMemory,
            FsError::NotImplemented,
            FsError::NotSupported,
        ];
        for (i, a) in all.iter().enumerate() {
            assert!(a.to_errno() < 0);
            for b in &all[i + 1..] {
                assert_ne!(a.to_errno(), b.to_errno(), "{a:?} vs {b:?}");
            }
        }
        assert_eq!(FsError::Busy.to_errno(), -16);
        assert_eq!(FsError::NotImplemented.to_errno(), -38);
    }
}
