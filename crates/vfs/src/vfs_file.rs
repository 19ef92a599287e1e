//! 路径级文件操作
//!
//! 这一层只和路径、节点打交道，不涉及文件描述符；
//! 描述符层（[`crate::FilesStruct`]）在它之上实现系统调用语义。

use alloc::sync::Arc;

use log::warn;
use uapi::fcntl::OpenFlags;

use crate::path::{lookup, lookup_parent};
use crate::{FsError, FsResult, Inode, InodeRef, Vfs};

/// 按 `flags` 打开路径，返回的节点持有一个引用和一个打开计数
///
/// - 访问模式非法，或带 `O_TRUNC` 却不可写：[`FsError::InvalidArgument`]
/// - 目标不存在：带 `O_CREAT` 时在父目录中创建，否则 [`FsError::NotFound`]
/// - 目标已存在且同时带 `O_CREAT | O_EXCL`：[`FsError::AlreadyExists`]
/// - 带 `O_TRUNC` 时截断到 0
pub fn vfs_open(
    vfs: &Vfs,
    cwd: Option<&InodeRef>,
    path: &str,
    flags: OpenFlags,
) -> FsResult<InodeRef> {
    let mode = flags.access_mode().ok_or(FsError::InvalidArgument)?;
    if flags.contains(OpenFlags::O_TRUNC) && !mode.writable() {
        return Err(FsError::InvalidArgument);
    }
    let creat = flags.contains(OpenFlags::O_CREAT);
    let excl = flags.contains(OpenFlags::O_EXCL);

    let node = match lookup(vfs, cwd, path) {
        Ok(node) if creat && excl => {
            node.put();
            return Err(FsError::AlreadyExists);
        }
        Ok(node) => node,
        Err(FsError::NotFound) if creat => {
            let (dir, name) = lookup_parent(vfs, cwd, path)?;
            let created = dir.create(name, excl);
            dir.put();
            created?
        }
        Err(e) => return Err(e),
    };

    if let Err(e) = node.open(flags) {
        node.put();
        return Err(e);
    }
    node.acquire_open();
    if flags.contains(OpenFlags::O_TRUNC) {
        if let Err(e) = node.truncate(0) {
            vfs_close(node);
            return Err(e);
        }
    }
    Ok(node)
}

/// 撤销 [`vfs_open`]：归还打开计数和引用
///
/// 关闭回调和回收回调的失败只记录日志，不影响计数的归还。
pub fn vfs_close(node: InodeRef) {
    if let Err(e) = node.release_open() {
        warn!("vfs: warning: close failed: {}.", e);
    }
    node.put();
}

/// 创建目录
pub fn vfs_mkdir(vfs: &Vfs, cwd: Option<&InodeRef>, path: &str) -> FsResult<()> {
    let (dir, name) = lookup_parent(vfs, cwd, path)?;
    let result = dir.mkdir(name);
    dir.put();
    result
}

/// 删除目录项
pub fn vfs_unlink(vfs: &Vfs, cwd: Option<&InodeRef>, path: &str) -> FsResult<()> {
    let (dir, name) = lookup_parent(vfs, cwd, path)?;
    let result = dir.unlink(name);
    dir.put();
    result
}

/// 为 `old_path` 建立名为 `new_path` 的硬链接；两者必须在同一文件系统内
pub fn vfs_link(
    vfs: &Vfs,
    cwd: Option<&InodeRef>,
    old_path: &str,
    new_path: &str,
) -> FsResult<()> {
    let target = lookup(vfs, cwd, old_path)?;
    let result = lookup_parent(vfs, cwd, new_path).and_then(|(dir, name)| {
        let result = if same_fs(&dir, &target) {
            dir.link(name, &target)
        } else {
            Err(FsError::InvalidArgument)
        };
        dir.put();
        result
    });
    target.put();
    result
}

fn same_fs(a: &Inode, b: &Inode) -> bool {
    match (a.fs(), b.fs()) {
        (Some(a), Some(b)) => core::ptr::addr_eq(Arc::as_ptr(&a), Arc::as_ptr(&b)),
        _ => false,
    }
}

/// 重命名（不支持）
pub fn vfs_rename(_old_path: &str, _new_path: &str) -> FsResult<()> {
    Err(FsError::NotImplemented)
}

/// 创建符号链接（不支持）
pub fn vfs_symlink(_old_path: &str, _new_path: &str) -> FsResult<()> {
    Err(FsError::NotImplemented)
}

/// 读取符号链接（不支持）
pub fn vfs_readlink(_path: &str, _buf: &mut [u8]) -> FsResult<usize> {
    Err(FsError::NotImplemented)
}
