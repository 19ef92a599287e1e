//! Tmpfs 文件系统实现

use alloc::boxed::Box;
use alloc::sync::{Arc, Weak};

use log::debug;
use sync::SpinLock;
use vfs::{Device, FileSystem, FsError, FsResult, Inode, InodeRef};

use super::inode::{TmpfsInode, TmpfsNode};

/// Tmpfs 统计信息
#[derive(Debug, Clone)]
struct TmpfsStats {
    /// 文件数据占用的字节数
    used: usize,

    /// 容量上限（字节）
    capacity: usize,

    /// 尚未回收的 VFS 节点数
    live_vnodes: usize,
}

/// Tmpfs 文件系统
///
/// 目录树常驻内存；VFS 节点按需创建并缓存在树节点上，
/// 最后一个引用释放时回收。
pub struct Tmpfs {
    me: Weak<Tmpfs>,
    root: Arc<TmpfsNode>,
    block_size: usize,
    stats: SpinLock<TmpfsStats>,
}

/// 挂载函数：在块设备上建立一个空的 tmpfs，容量为设备容量
///
/// 设备必须是块大小为 2 的幂的块设备，否则返回 [`FsError::InvalidArgument`]。
pub fn mount(dev: &Arc<dyn Device>) -> FsResult<Arc<dyn FileSystem>> {
    let (blocks, block_size) = (dev.blocks(), dev.block_size());
    if blocks == 0 || !block_size.is_power_of_two() {
        return Err(FsError::InvalidArgument);
    }
    let capacity = blocks
        .checked_mul(block_size)
        .ok_or(FsError::InvalidArgument)?;
    debug!("tmpfs: {} blocks of {} bytes.", blocks, block_size);
    Ok(Tmpfs::new(capacity, block_size))
}

impl Tmpfs {
    /// 创建容量为 `capacity` 字节的 tmpfs；`block_size` 只用于统计块数
    pub fn new(capacity: usize, block_size: usize) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            root: TmpfsNode::new_root(),
            block_size,
            stats: SpinLock::new(TmpfsStats {
                used: 0,
                capacity,
                live_vnodes: 0,
            }),
        })
    }

    /// 已使用的容量（字节）
    pub fn used_size(&self) -> usize {
        self.stats.lock().used
    }

    /// 总容量（字节）
    pub fn total_size(&self) -> usize {
        self.stats.lock().capacity
    }

    /// 尚未回收的 VFS 节点数
    pub fn live_vnodes(&self) -> usize {
        self.stats.lock().live_vnodes
    }

    pub(super) fn block_size(&self) -> usize {
        self.block_size
    }

    /// 取 `node` 的 VFS 节点，返回的句柄已持有一个引用
    ///
    /// 已有未回收的节点时复用它，否则新建并缓存。
    pub(super) fn vnode(&self, node: &Arc<TmpfsNode>) -> FsResult<InodeRef> {
        let mut slot = node.vnode.lock();
        if let Some(vnode) = slot.upgrade().and_then(|v| v.try_acquire_ref()) {
            return Ok(vnode);
        }
        let fs = self.me.upgrade().ok_or(FsError::NoDevice)?;
        let weak: Weak<dyn FileSystem> = self.me.clone();
        let vnode = Inode::new_fs_node(Box::new(TmpfsInode::new(node.clone(), fs)), weak);
        *slot = Arc::downgrade(&vnode);
        self.stats.lock().live_vnodes += 1;
        Ok(vnode)
    }

    pub(super) fn vnode_reclaimed(&self) {
        let mut stats = self.stats.lock();
        assert!(stats.live_vnodes > 0, "tmpfs: reclaim with no live vnode");
        stats.live_vnodes -= 1;
    }

    /// 文件长度从 `old` 变为 `new`，按差值调整已用容量；超出容量返回 [`FsError::NoSpace`]
    pub(super) fn resize(&self, old: usize, new: usize) -> FsResult<()> {
        let mut stats = self.stats.lock();
        if new > old {
            let used = stats
                .used
                .checked_add(new - old)
                .filter(|&used| used <= stats.capacity)
                .ok_or(FsError::NoSpace)?;
            stats.used = used;
        } else {
            stats.used -= old - new;
        }
        Ok(())
    }
}

impl FileSystem for Tmpfs {
    fn fs_type(&self) -> &'static str {
        "tmpfs"
    }

    fn root(&self) -> FsResult<InodeRef> {
        self.vnode(&self.root)
    }

    fn sync(&self) -> FsResult<()> {
        // tmpfs 完全在内存中，无需同步
        Ok(())
    }

    fn unmount(&self) -> FsResult<()> {
        if self.live_vnodes() > 0 {
            return Err(FsError::Busy);
        }
        Ok(())
    }
}
