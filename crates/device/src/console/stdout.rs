//! 标准输出设备

use alloc::sync::Arc;

use uapi::fcntl::{AccessMode, OpenFlags};
use vfs::{Device, FsError, FsResult, IoBuf};

use super::Console;

/// 无缓冲的字符输出设备：每个字节立即交给控制台
pub struct Stdout {
    console: Arc<dyn Console>,
}

impl Stdout {
    /// 创建输出到 `console` 的设备
    pub fn new(console: Arc<dyn Console>) -> Self {
        Self { console }
    }
}

impl Device for Stdout {
    fn blocks(&self) -> usize {
        0
    }

    fn block_size(&self) -> usize {
        1
    }

    fn open(&self, flags: OpenFlags) -> FsResult<()> {
        match flags.access_mode() {
            Some(AccessMode::WriteOnly) => Ok(()),
            _ => Err(FsError::InvalidArgument),
        }
    }

    fn close(&self) -> FsResult<()> {
        Ok(())
    }

    fn io(&self, iob: &mut IoBuf<'_>, write: bool) -> FsResult<()> {
        if !write {
            return Err(FsError::InvalidArgument);
        }
        let n = iob.resid();
        iob.chunk().iter().for_each(|&c| self.console.put_char(c));
        iob.skip(n);
        Ok(())
    }

    fn ioctl(&self, _op: u32, _data: usize) -> FsResult<()> {
        Err(FsError::NotSupported)
    }
}
