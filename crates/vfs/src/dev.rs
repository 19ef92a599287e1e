//! 设备抽象与设备节点
//!
//! 具体驱动实现 [`Device`]；VFS 用 [`Inode::new_device`] 把设备包成节点，
//! 节点层的通用操作在这里转发到设备的 open/close/io/ioctl 上。

use alloc::sync::Arc;
use core::any::Any;

use uapi::fcntl::OpenFlags;
use uapi::stat::Stat;

use crate::inode::{InodeOps, InodeType};
use crate::{FsError, FsResult, Inode, InodeRef, IoBuf};

/// 设备接口
///
/// `blocks() == 0` 表示字符设备（不可定位，传输单位为 1 字节）；
/// 否则是块大小固定为 `block_size()` 的块设备。
pub trait Device: Send + Sync {
    /// 块数
    fn blocks(&self) -> usize;

    /// 块大小（字节）
    fn block_size(&self) -> usize;

    /// 打开设备
    fn open(&self, flags: OpenFlags) -> FsResult<()>;

    /// 关闭设备
    fn close(&self) -> FsResult<()>;

    /// 读写：`write` 为真时从 `iob` 取数据写入设备，否则把设备数据读入 `iob`
    fn io(&self, iob: &mut IoBuf<'_>, write: bool) -> FsResult<()>;

    /// 设备控制
    fn ioctl(&self, op: u32, data: usize) -> FsResult<()>;
}

/// 设备节点的操作实现
pub(crate) struct DevNode {
    dev: Arc<dyn Device>,
}

impl DevNode {
    pub(crate) fn new(dev: Arc<dyn Device>) -> Self {
        Self { dev }
    }

    pub(crate) fn device(&self) -> &Arc<dyn Device> {
        &self.dev
    }

    fn capacity(&self) -> u64 {
        self.dev.blocks() as u64 * self.dev.block_size() as u64
    }
}

impl InodeOps for DevNode {
    fn open(&self, flags: OpenFlags) -> FsResult<()> {
        let forbidden =
            OpenFlags::O_CREAT | OpenFlags::O_TRUNC | OpenFlags::O_EXCL | OpenFlags::O_APPEND;
        if flags.intersects(forbidden) {
            return Err(FsError::InvalidArgument);
        }
        self.dev.open(flags)
    }

    fn close(&self) -> FsResult<()> {
        self.dev.close()
    }

    // 设备节点常驻设备表，引用计数不会真正归零
    fn reclaim(&self, _this: &Inode) -> FsResult<()> {
        Ok(())
    }

    fn gettype(&self) -> FsResult<InodeType> {
        if self.dev.blocks() > 0 {
            Ok(InodeType::BlockDevice)
        } else {
            Ok(InodeType::CharDevice)
        }
    }

    fn fstat(&self) -> FsResult<Stat> {
        Ok(Stat {
            mode: self.gettype()?.mode(),
            nlinks: 1,
            blocks: self.dev.blocks() as u64,
            size: self.capacity(),
        })
    }

    fn read(&self, iob: &mut IoBuf<'_>) -> FsResult<()> {
        self.dev.io(iob, false)
    }

    fn write(&self, iob: &mut IoBuf<'_>) -> FsResult<()> {
        self.dev.io(iob, true)
    }

    fn ioctl(&self, op: u32, data: usize) -> FsResult<()> {
        self.dev.ioctl(op, data)
    }

    fn tryseek(&self, pos: i64) -> FsResult<()> {
        if self.dev.blocks() == 0 || pos < 0 {
            return Err(FsError::InvalidArgument);
        }
        let pos = pos as u64;
        if pos % self.dev.block_size() as u64 == 0 && pos < self.capacity() {
            Ok(())
        } else {
            Err(FsError::InvalidArgument)
        }
    }

    fn lookup(&self, this: &InodeRef, path: &str) -> FsResult<InodeRef> {
        if !path.is_empty() {
            return Err(FsError::NotFound);
        }
        Ok(this.acquire_ref())
    }

    fn getdirentry(&self, _iob: &mut IoBuf<'_>) -> FsResult<()> {
        Err(FsError::NotDirectory)
    }

    fn create(&self, _name: &str, _excl: bool) -> FsResult<InodeRef> {
        Err(FsError::NotDirectory)
    }

    fn mkdir(&self, _name: &str) -> FsResult<()> {
        Err(FsError::NotDirectory)
    }

    fn unlink(&self, _name: &str) -> FsResult<()> {
        Err(FsError::NotDirectory)
    }

    fn link(&self, _name: &str, _target: &InodeRef) -> FsResult<()> {
        Err(FsError::NotDirectory)
    }

    fn truncate(&self, _len: u64) -> FsResult<()> {
        Err(FsError::InvalidArgument)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
