//! 文件系统子系统的启动与关闭

use alloc::sync::Arc;

use device::{Disk, Stdin, Stdout};
use log::{info, warn};
use vfs::{FsResult, Inode, Vfs};

use crate::tmpfs;

/// 设备表中的固定名字
pub const STDIN_NAME: &str = "stdin";
/// 设备表中的固定名字
pub const STDOUT_NAME: &str = "stdout";
/// 设备表中的固定名字
pub const DISK0_NAME: &str = "disk0";

/// 建立 VFS：依次注册 `stdin`、`stdout`、`disk0`（可挂载），
/// 在 `disk0` 上挂载 tmpfs 并设为启动文件系统
pub fn fs_init(stdin: Arc<Stdin>, stdout: Arc<Stdout>, disk: Arc<Disk>) -> FsResult<Arc<Vfs>> {
    let vfs = Arc::new(Vfs::new());
    vfs.add_dev(STDIN_NAME, Inode::new_device(stdin), false)?;
    vfs.add_dev(STDOUT_NAME, Inode::new_device(stdout), false)?;
    vfs.add_dev(DISK0_NAME, Inode::new_device(disk), true)?;
    vfs.mount(DISK0_NAME, tmpfs::mount)?;
    vfs.set_bootfs(Some(DISK0_NAME))?;
    info!("fs: boot filesystem is {}.", DISK0_NAME);
    Ok(vfs)
}

/// 关闭文件系统子系统：同步，放下启动根，清理并卸载所有文件系统
///
/// 调用前所有进程的 [`vfs::FilesStruct`] 都应已销毁，否则卸载会因节点在用而失败。
pub fn fs_cleanup(vfs: &Vfs) {
    if let Err(e) = vfs.sync_all() {
        warn!("fs: warning: sync failed: {}.", e);
    }
    if let Err(e) = vfs.set_bootfs(None) {
        warn!("fs: warning: release boot root failed: {}.", e);
    }
    vfs.cleanup();
    vfs.unmount_all();
}
