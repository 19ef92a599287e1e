//! 文件级接口
//!
//! 面向系统调用的 open/close/read/write/seek/fstat/fsync/getdirentry/dup，
//! 以及依赖当前工作目录的路径操作。每个描述符操作都以 acquire/release 包住，
//! 期间并发的 `close` 只会把槽位标记为 `Closed`，由最后一个操作负责收尾。

use uapi::dirent::Dirent;
use uapi::fcntl::{OpenFlags, SeekWhence};
use uapi::stat::Stat;

use crate::fd_table::Acquired;
use crate::path::lookup;
use crate::vfs_file::{
    vfs_close, vfs_link, vfs_mkdir, vfs_open, vfs_readlink, vfs_rename, vfs_symlink, vfs_unlink,
};
use crate::{FilesStruct, FsError, FsResult, InodeRef, IoBuf};

impl FilesStruct {
    /// 打开 `path`，返回新的描述符
    pub fn open(&self, path: &str, flags: OpenFlags) -> FsResult<usize> {
        let mode = flags.access_mode().ok_or(FsError::InvalidArgument)?;
        let fd = self.alloc(None)?;
        let node = match self.with_cwd(|cwd| vfs_open(self.vfs(), cwd, path, flags)) {
            Ok(node) => node,
            Err(e) => {
                self.free_init(fd);
                return Err(e);
            }
        };
        let pos = if flags.contains(OpenFlags::O_APPEND) {
            match node.fstat() {
                Ok(stat) => stat.size,
                Err(e) => {
                    vfs_close(node);
                    self.free_init(fd);
                    return Err(e);
                }
            }
        } else {
            0
        };
        self.install(fd, node, pos, mode.readable(), mode.writable());
        Ok(fd)
    }

    /// 关闭描述符
    pub fn close(&self, fd: usize) -> FsResult<()> {
        self.close_fd(fd)
    }

    /// 在 acquire/release 之间执行 `f`
    fn with_file<R>(&self, fd: usize, f: impl FnOnce(&Acquired) -> FsResult<R>) -> FsResult<R> {
        let file = self.acquire(fd)?;
        let result = f(&file);
        self.release(fd);
        result
    }

    /// 从当前游标读入 `buf`，返回读到的字节数；游标随之推进
    pub fn read(&self, fd: usize, buf: &mut [u8]) -> FsResult<usize> {
        self.with_file(fd, |file| {
            if !file.readable {
                return Err(FsError::InvalidArgument);
            }
            let mut iob = IoBuf::for_read(buf, file.pos);
            let result = file.node.read(&mut iob);
            let copied = iob.used();
            self.advance(fd, copied);
            result.map(|()| copied)
        })
    }

    /// 从当前游标写入 `buf`，返回写入的字节数；游标随之推进
    pub fn write(&self, fd: usize, buf: &[u8]) -> FsResult<usize> {
        self.with_file(fd, |file| {
            if !file.writable {
                return Err(FsError::InvalidArgument);
            }
            let mut iob = IoBuf::for_write(buf, file.pos);
            let result = file.node.write(&mut iob);
            let copied = iob.used();
            self.advance(fd, copied);
            result.map(|()| copied)
        })
    }

    /// 移动游标，返回新位置；目标位置由节点的 `tryseek` 校验
    pub fn seek(&self, fd: usize, offset: i64, whence: SeekWhence) -> FsResult<u64> {
        self.with_file(fd, |file| {
            let base = match whence {
                SeekWhence::Set => 0,
                SeekWhence::Cur => file.pos as i64,
                SeekWhence::End => file.node.fstat()?.size as i64,
            };
            let pos = base.checked_add(offset).ok_or(FsError::InvalidArgument)?;
            file.node.tryseek(pos)?;
            self.set_pos(fd, pos as u64);
            Ok(pos as u64)
        })
    }

    /// 文件状态
    pub fn fstat(&self, fd: usize) -> FsResult<Stat> {
        self.with_file(fd, |file| file.node.fstat())
    }

    /// 把文件刷回存储
    pub fn fsync(&self, fd: usize) -> FsResult<()> {
        self.with_file(fd, |file| file.node.fsync())
    }

    /// 读取 `dirent.offset` 处的目录项名字到 `dirent.name`，并推进 `dirent.offset`
    pub fn getdirentry(&self, fd: usize, dirent: &mut Dirent) -> FsResult<()> {
        self.with_file(fd, |file| {
            let mut iob = IoBuf::for_read(&mut dirent.name, dirent.offset);
            file.node.getdirentry(&mut iob)?;
            let used = iob.used() as u64;
            dirent.offset += used;
            Ok(())
        })
    }

    /// 复制描述符 `from`；`to` 为 `None` 时取最小空闲描述符
    pub fn dup(&self, from: usize, to: Option<usize>) -> FsResult<usize> {
        self.dup_fd(from, to)
    }

    /// 创建目录
    pub fn mkdir(&self, path: &str) -> FsResult<()> {
        self.with_cwd(|cwd| vfs_mkdir(self.vfs(), cwd, path))
    }

    /// 删除目录项
    pub fn unlink(&self, path: &str) -> FsResult<()> {
        self.with_cwd(|cwd| vfs_unlink(self.vfs(), cwd, path))
    }

    /// 建立硬链接
    pub fn link(&self, old_path: &str, new_path: &str) -> FsResult<()> {
        self.with_cwd(|cwd| vfs_link(self.vfs(), cwd, old_path, new_path))
    }

    /// 重命名（不支持）
    pub fn rename(&self, old_path: &str, new_path: &str) -> FsResult<()> {
        vfs_rename(old_path, new_path)
    }

    /// 创建符号链接（不支持）
    pub fn symlink(&self, old_path: &str, new_path: &str) -> FsResult<()> {
        vfs_symlink(old_path, new_path)
    }

    /// 读取符号链接（不支持）
    pub fn readlink(&self, path: &str, buf: &mut [u8]) -> FsResult<usize> {
        vfs_readlink(path, buf)
    }

    /// 把路径解析为节点，返回的句柄已持有一个引用
    pub fn lookup(&self, path: &str) -> FsResult<InodeRef> {
        self.with_cwd(|cwd| lookup(self.vfs(), cwd, path))
    }

    /// 切换当前工作目录
    pub fn chdir(&self, path: &str) -> FsResult<()> {
        let node = self.lookup(path)?;
        let result = self.set_curdir(&node);
        node.put();
        result
    }

    /// 把当前工作目录的完整路径（`设备名:路径`）写入 `buf`，返回写入的字节数
    pub fn getcwd(&self, buf: &mut [u8]) -> FsResult<usize> {
        let cwd = self.get_curdir()?;
        let result = self.write_cwd(&cwd, buf);
        cwd.put();
        result
    }

    fn write_cwd(&self, cwd: &InodeRef, buf: &mut [u8]) -> FsResult<usize> {
        let fs = cwd.fs().ok_or(FsError::NotFound)?;
        let name = self.vfs().get_devname(&fs).ok_or(FsError::NotFound)?;
        let mut iob = IoBuf::for_read(buf, 0);
        iob.copy_in(name.as_bytes())?;
        iob.copy_in(b":")?;
        cwd.namefile(&mut iob)?;
        Ok(iob.used())
    }
}
