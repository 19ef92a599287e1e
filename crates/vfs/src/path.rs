//! 路径解析
//!
//! 路径语法：`["设备名" ":"] ["/"]* 组件 ("/" 组件)*`。
//! 扫描到第一个 `:` 或 `/` 为止来区分四种起点：
//!
//! 1. `name:rest`：从设备表中 `name` 的根开始
//! 2. `/rest`：从启动文件系统的根开始
//! 3. `:rest`：从当前工作目录所在文件系统的根开始
//! 4. `rest`：从当前工作目录开始
//!
//! 选定起点后跳过 `rest` 开头多余的 `/`，剩余部分交给起点节点的 `lookup`。

use crate::{FsError, FsResult, InodeRef, Vfs};

/// 路径解析的起点
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathRoot<'a> {
    /// 设备表中的某个名字
    Device(&'a str),
    /// 启动文件系统
    BootFs,
    /// 当前工作目录所在的文件系统
    CurrentDevice,
    /// 当前工作目录
    Cwd,
}

/// 拆出路径的起点和剩余部分
pub fn split_device(path: &str) -> (PathRoot<'_>, &str) {
    let sep = path.find([':', '/']);
    let (root, rest) = match sep {
        Some(0) if path.starts_with('/') => (PathRoot::BootFs, &path[1..]),
        Some(0) => (PathRoot::CurrentDevice, &path[1..]),
        Some(i) if path.as_bytes()[i] == b':' => (PathRoot::Device(&path[..i]), &path[i + 1..]),
        _ => return (PathRoot::Cwd, path),
    };
    (root, rest.trim_start_matches('/'))
}

/// 取得解析起点，返回的句柄已持有一个引用
fn get_device<'p>(
    vfs: &Vfs,
    cwd: Option<&InodeRef>,
    path: &'p str,
) -> FsResult<(InodeRef, &'p str)> {
    let (root, rest) = split_device(path);
    let node = match root {
        PathRoot::Device(name) => vfs.get_root(name)?,
        PathRoot::BootFs => vfs.get_bootfs()?,
        PathRoot::Cwd => cwd.ok_or(FsError::NotFound)?.acquire_ref(),
        PathRoot::CurrentDevice => {
            let fs = cwd.ok_or(FsError::NotFound)?.fs().ok_or(FsError::NoDevice)?;
            fs.root()?
        }
    };
    Ok((node, rest))
}

/// 把路径解析为节点，返回的句柄已持有一个引用
///
/// `cwd` 是调用者的当前工作目录，调用期间必须保持有效。
pub fn lookup(vfs: &Vfs, cwd: Option<&InodeRef>, path: &str) -> FsResult<InodeRef> {
    let (node, rest) = get_device(vfs, cwd, path)?;
    if rest.is_empty() {
        return Ok(node);
    }
    let result = node.lookup(rest);
    node.put();
    result
}

/// 解析到最后一个组件的父目录，返回父目录（已持有一个引用）和最后一个组件名
pub fn lookup_parent<'p>(
    vfs: &Vfs,
    cwd: Option<&InodeRef>,
    path: &'p str,
) -> FsResult<(InodeRef, &'p str)> {
    let (node, rest) = get_device(vfs, cwd, path)?;
    let rest = rest.trim_end_matches('/');
    if rest.is_empty() {
        node.put();
        return Err(FsError::InvalidArgument);
    }
    let Some(pos) = rest.rfind('/') else {
        return Ok((node, rest));
    };
    let (dir, name) = (rest[..pos].trim_end_matches('/'), &rest[pos + 1..]);
    let parent = node.lookup(dir);
    node.put();
    Ok((parent?, name))
}
