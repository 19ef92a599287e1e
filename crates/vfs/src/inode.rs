//! Inode 抽象层
//!
//! [`Inode`] 是 VFS 中统一的节点句柄：要么包着一个设备（[`crate::dev`]），
//! 要么包着某个文件系统自己的节点状态（实现 [`InodeOps`]）。
//!
//! # 生命周期
//!
//! 每个 inode 有两个互相独立的计数：
//!
//! - 引用计数：每多一个别名（lookup、dup、目录遍历）加一，释放时减一；
//!   归零时恰好调用一次 `reclaim`。
//! - 打开计数：描述符真正为 I/O 打开节点时加一，关闭时减一；
//!   归零时恰好调用一次 `close`。
//!
//! 一个引用计数对应一个持有中的 [`InodeRef`]。获取引用用
//! [`Inode::acquire_ref`]（得到新的 `InodeRef`），归还引用用
//! [`Inode::release_ref`]（消耗该 `InodeRef`）。`Arc` 只负责内存，
//! 回调语义完全由显式计数驱动。

use alloc::boxed::Box;
use alloc::sync::{Arc, Weak};
use core::any::Any;
use core::fmt;

use log::{debug, warn};
use sync::SpinLock;
use uapi::fcntl::OpenFlags;
use uapi::stat::{S_IFBLK, S_IFCHR, S_IFDIR, S_IFREG, Stat};

use crate::config::{MAX_INODE_COUNT, VOP_MAGIC};
use crate::dev::{DevNode, Device};
use crate::{FileSystem, FsError, FsResult, IoBuf};

/// 持有一个引用计数的 inode 句柄
pub type InodeRef = Arc<Inode>;

/// 文件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InodeType {
    /// 普通文件
    File,
    /// 目录
    Directory,
    /// 字符设备
    CharDevice,
    /// 块设备
    BlockDevice,
}

impl InodeType {
    /// 对应的 `S_IF*` 类型位
    pub fn mode(self) -> u32 {
        match self {
            InodeType::File => S_IFREG,
            InodeType::Directory => S_IFDIR,
            InodeType::CharDevice => S_IFCHR,
            InodeType::BlockDevice => S_IFBLK,
        }
    }
}

/// 节点操作表
///
/// 由每种节点实现。需要拿到自身句柄的操作（如返回自身的 `lookup`）
/// 额外接收 `this`。除基本操作外都有默认实现，返回 [`FsError::NotImplemented`]。
pub trait InodeOps: Send + Sync {
    /// 以 `flags` 打开节点
    fn open(&self, flags: OpenFlags) -> FsResult<()>;

    /// 最后一个打开者关闭时调用
    fn close(&self) -> FsResult<()>;

    /// 最后一个引用释放时调用；返回 [`FsError::Busy`] 表示节点仍需保留
    fn reclaim(&self, this: &Inode) -> FsResult<()>;

    /// 节点类型
    fn gettype(&self) -> FsResult<InodeType>;

    /// 文件状态
    fn fstat(&self) -> FsResult<Stat>;

    /// 从 `iob.offset()` 处读取，填满 `iob` 或到达末尾为止
    fn read(&self, _iob: &mut IoBuf<'_>) -> FsResult<()> {
        Err(FsError::NotImplemented)
    }

    /// 在 `iob.offset()` 处写入
    fn write(&self, _iob: &mut IoBuf<'_>) -> FsResult<()> {
        Err(FsError::NotImplemented)
    }

    /// 设备控制
    fn ioctl(&self, _op: u32, _data: usize) -> FsResult<()> {
        Err(FsError::NotImplemented)
    }

    /// 把节点数据刷回存储
    fn fsync(&self) -> FsResult<()> {
        Ok(())
    }

    /// 检查 `pos` 是否是合法的定位目标，必要时为其做准备（如扩展文件）
    fn tryseek(&self, _pos: i64) -> FsResult<()> {
        Err(FsError::NotImplemented)
    }

    /// 截断或扩展到 `len` 字节
    fn truncate(&self, _len: u64) -> FsResult<()> {
        Err(FsError::NotImplemented)
    }

    /// 把节点在所属文件系统内的路径写入 `iob`
    fn namefile(&self, _iob: &mut IoBuf<'_>) -> FsResult<()> {
        Err(FsError::NotImplemented)
    }

    /// 读取 `iob.offset()` 所指的目录项名字
    fn getdirentry(&self, _iob: &mut IoBuf<'_>) -> FsResult<()> {
        Err(FsError::NotImplemented)
    }

    /// 从本节点出发解析相对路径 `path`，返回的句柄已持有一个引用
    fn lookup(&self, _this: &InodeRef, _path: &str) -> FsResult<InodeRef> {
        Err(FsError::NotImplemented)
    }

    /// 在本目录下创建普通文件；`excl` 为真时已存在即失败
    fn create(&self, _name: &str, _excl: bool) -> FsResult<InodeRef> {
        Err(FsError::NotImplemented)
    }

    /// 在本目录下创建子目录
    fn mkdir(&self, _name: &str) -> FsResult<()> {
        Err(FsError::NotImplemented)
    }

    /// 删除本目录下的目录项
    fn unlink(&self, _name: &str) -> FsResult<()> {
        Err(FsError::NotImplemented)
    }

    /// 在本目录下为 `target` 建立硬链接
    fn link(&self, _name: &str, _target: &InodeRef) -> FsResult<()> {
        Err(FsError::NotImplemented)
    }

    /// 转换为 Any 以便向下转型
    fn as_any(&self) -> &dyn Any;
}

enum NodeKind {
    Device(DevNode),
    Fs(Box<dyn InodeOps>),
}

#[derive(Debug, Default)]
struct Counts {
    refs: usize,
    opens: usize,
}

/// VFS 节点
pub struct Inode {
    magic: u32,
    counts: SpinLock<Counts>,
    node: NodeKind,
    fs: Option<Weak<dyn FileSystem>>,
}

impl Inode {
    fn new(node: NodeKind, fs: Option<Weak<dyn FileSystem>>) -> InodeRef {
        Arc::new(Self {
            magic: VOP_MAGIC,
            counts: SpinLock::new(Counts { refs: 1, opens: 0 }),
            node,
            fs,
        })
    }

    /// 创建设备节点，返回的句柄持有创建者的那一个引用
    pub fn new_device(dev: Arc<dyn Device>) -> InodeRef {
        Self::new(NodeKind::Device(DevNode::new(dev)), None)
    }

    /// 创建属于 `fs` 的文件系统节点，返回的句柄持有创建者的那一个引用
    pub fn new_fs_node(ops: Box<dyn InodeOps>, fs: Weak<dyn FileSystem>) -> InodeRef {
        Self::new(NodeKind::Fs(ops), Some(fs))
    }

    /// 校验魔数和计数不变式，违反即 panic
    pub fn check(&self) {
        assert_eq!(self.magic, VOP_MAGIC, "vfs: inode magic mismatch");
        let counts = self.counts.lock();
        assert!(
            counts.refs < MAX_INODE_COUNT && counts.opens < MAX_INODE_COUNT,
            "vfs: inode counter overflow: ref {}, open {}",
            counts.refs,
            counts.opens
        );
        assert!(
            counts.refs >= counts.opens,
            "vfs: inode ref count {} < open count {}",
            counts.refs,
            counts.opens
        );
    }

    fn ops(&self) -> &dyn InodeOps {
        self.check();
        match &self.node {
            NodeKind::Device(dev) => dev,
            NodeKind::Fs(ops) => ops.as_ref(),
        }
    }

    /// 当前引用计数
    pub fn ref_count(&self) -> usize {
        self.counts.lock().refs
    }

    /// 当前打开计数
    pub fn open_count(&self) -> usize {
        self.counts.lock().opens
    }

    /// 增加一个引用，返回代表该引用的新句柄
    pub fn acquire_ref(self: &Arc<Self>) -> InodeRef {
        {
            let mut counts = self.counts.lock();
            assert!(counts.refs > 0, "vfs: acquire_ref on a reclaimed inode");
            counts.refs += 1;
        }
        self.check();
        Arc::clone(self)
    }

    /// 仅在节点仍存活（引用计数非零）时增加引用
    ///
    /// 供文件系统的节点缓存使用：缓存中可能残留着正在回收的节点。
    pub fn try_acquire_ref(self: &Arc<Self>) -> Option<InodeRef> {
        let mut counts = self.counts.lock();
        if counts.refs == 0 {
            return None;
        }
        counts.refs += 1;
        Some(Arc::clone(self))
    }

    /// 归还 `self` 代表的引用，返回剩余引用数。
    ///
    /// 归零时调用 `reclaim`。`reclaim` 返回 [`FsError::Busy`] 视为成功（节点保留），
    /// 其它错误原样返回，此时计数已经扣减。
    pub fn release_ref(self: Arc<Self>) -> FsResult<usize> {
        let remaining = {
            let mut counts = self.counts.lock();
            assert!(
                counts.refs > counts.opens,
                "vfs: release_ref with ref count {} and open count {}",
                counts.refs,
                counts.opens
            );
            counts.refs -= 1;
            counts.refs
        };
        if remaining == 0 {
            assert_eq!(self.magic, VOP_MAGIC, "vfs: inode magic mismatch");
            match self.node_ops().reclaim(&self) {
                Ok(()) => {}
                Err(FsError::Busy) => debug!("vfs: reclaim deferred, inode busy"),
                Err(e) => return Err(e),
            }
        }
        Ok(remaining)
    }

    /// 归还引用并吞掉回收错误，用于无法向上报告的清理路径
    pub fn put(self: Arc<Self>) {
        if let Err(e) = self.release_ref() {
            warn!("vfs: warning: reclaim failed: {}.", e);
        }
    }

    /// 增加打开计数，返回新值
    pub fn acquire_open(&self) -> usize {
        let opens = {
            let mut counts = self.counts.lock();
            counts.opens += 1;
            counts.opens
        };
        self.check();
        opens
    }

    /// 减少打开计数，返回剩余值；归零时调用 `close`，其错误原样返回
    pub fn release_open(&self) -> FsResult<usize> {
        let remaining = {
            let mut counts = self.counts.lock();
            assert!(counts.opens > 0, "vfs: release_open on a closed inode");
            counts.opens -= 1;
            counts.opens
        };
        if remaining == 0 {
            self.ops().close()?;
        }
        Ok(remaining)
    }

    // reclaim 时引用计数已为零，不能再走带计数检查的 ops()
    fn node_ops(&self) -> &dyn InodeOps {
        match &self.node {
            NodeKind::Device(dev) => dev,
            NodeKind::Fs(ops) => ops.as_ref(),
        }
    }

    /// 若为设备节点，返回其设备
    pub fn device(&self) -> Option<&Arc<dyn Device>> {
        match &self.node {
            NodeKind::Device(dev) => Some(dev.device()),
            NodeKind::Fs(_) => None,
        }
    }

    /// 所属文件系统；设备节点或文件系统已被释放时为 `None`
    pub fn fs(&self) -> Option<Arc<dyn FileSystem>> {
        self.fs.as_ref().and_then(Weak::upgrade)
    }

    /// 把文件系统节点向下转型为具体类型
    pub fn downcast_ref<T: InodeOps + 'static>(&self) -> Option<&T> {
        match &self.node {
            NodeKind::Fs(ops) => ops.as_any().downcast_ref::<T>(),
            NodeKind::Device(_) => None,
        }
    }

    /// 两个句柄是否指向同一节点
    pub fn ptr_eq(a: &InodeRef, b: &InodeRef) -> bool {
        Arc::ptr_eq(a, b)
    }

    /// 打开节点
    pub fn open(&self, flags: OpenFlags) -> FsResult<()> {
        self.ops().open(flags)
    }

    /// 读
    pub fn read(&self, iob: &mut IoBuf<'_>) -> FsResult<()> {
        self.ops().read(iob)
    }

    /// 写
    pub fn write(&self, iob: &mut IoBuf<'_>) -> FsResult<()> {
        self.ops().write(iob)
    }

    /// 设备控制
    pub fn ioctl(&self, op: u32, data: usize) -> FsResult<()> {
        self.ops().ioctl(op, data)
    }

    /// 文件状态
    pub fn fstat(&self) -> FsResult<Stat> {
        self.ops().fstat()
    }

    /// 刷回存储
    pub fn fsync(&self) -> FsResult<()> {
        self.ops().fsync()
    }

    /// 节点类型
    pub fn gettype(&self) -> FsResult<InodeType> {
        self.ops().gettype()
    }

    /// 检查定位目标
    pub fn tryseek(&self, pos: i64) -> FsResult<()> {
        self.ops().tryseek(pos)
    }

    /// 截断
    pub fn truncate(&self, len: u64) -> FsResult<()> {
        self.ops().truncate(len)
    }

    /// 节点在所属文件系统内的路径
    pub fn namefile(&self, iob: &mut IoBuf<'_>) -> FsResult<()> {
        self.ops().namefile(iob)
    }

    /// 读取一个目录项
    pub fn getdirentry(&self, iob: &mut IoBuf<'_>) -> FsResult<()> {
        self.ops().getdirentry(iob)
    }

    /// 解析相对路径
    pub fn lookup(self: &Arc<Self>, path: &str) -> FsResult<InodeRef> {
        self.ops().lookup(self, path)
    }

    /// 创建普通文件
    pub fn create(&self, name: &str, excl: bool) -> FsResult<InodeRef> {
        self.ops().create(name, excl)
    }

    /// 创建子目录
    pub fn mkdir(&self, name: &str) -> FsResult<()> {
        self.ops().mkdir(name)
    }

    /// 删除目录项
    pub fn unlink(&self, name: &str) -> FsResult<()> {
        self.ops().unlink(name)
    }

    /// 建立硬链接
    pub fn link(&self, name: &str, target: &InodeRef) -> FsResult<()> {
        self.ops().link(name, target)
    }
}

impl fmt::Debug for Inode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts = self.counts.lock();
        f.debug_struct("Inode")
            .field("device", &matches!(self.node, NodeKind::Device(_)))
            .field("ref_count", &counts.refs)
            .field("open_count", &counts.opens)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use core::sync::atomic::{AtomicUsize, Ordering};

    /// 记录回调次数的测试节点
    struct CountingNode {
        closes: Arc<AtomicUsize>,
        reclaims: Arc<AtomicUsize>,
        reclaim_result: FsResult<()>,
    }

    impl InodeOps for CountingNode {
        fn open(&self, _flags: OpenFlags) -> FsResult<()> {
            Ok(())
        }

        fn close(&self) -> FsResult<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn reclaim(&self, _this: &Inode) -> FsResult<()> {
            self.reclaims.fetch_add(1, Ordering::SeqCst);
            self.reclaim_result
        }

        fn gettype(&self) -> FsResult<InodeType> {
            Ok(InodeType::File)
        }

        fn fstat(&self) -> FsResult<Stat> {
            Ok(Stat::default())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    struct NoFs;

    impl FileSystem for NoFs {
        fn fs_type(&self) -> &'static str {
            "none"
        }

        fn root(&self) -> FsResult<InodeRef> {
            Err(FsError::NotImplemented)
        }

        fn sync(&self) -> FsResult<()> {
            Ok(())
        }

        fn unmount(&self) -> FsResult<()> {
            Ok(())
        }
    }

    fn node(reclaim_result: FsResult<()>) -> (InodeRef, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        test_support::init_arch_ops();
        let closes = Arc::new(AtomicUsize::new(0));
        let reclaims = Arc::new(AtomicUsize::new(0));
        let ops = CountingNode {
            closes: closes.clone(),
            reclaims: reclaims.clone(),
            reclaim_result,
        };
        let fs: Weak<dyn FileSystem> = Weak::<NoFs>::new();
        (Inode::new_fs_node(Box::new(ops), fs), closes, reclaims)
    }

    #[test]
    fn test_new_inode_counts() {
        let (inode, _, _) = node(Ok(()));
        assert_eq!(inode.ref_count(), 1);
        assert_eq!(inode.open_count(), 0);
        assert!(inode.fs().is_none());
        assert!(inode.device().is_none());
        assert!(inode.downcast_ref::<CountingNode>().is_some());
    }

    #[test]
    fn test_reclaim_fires_once_at_zero() {
        let (inode, _, reclaims) = node(Ok(()));
        let alias = inode.acquire_ref();
        assert_eq!(inode.ref_count(), 2);
        assert_eq!(alias.release_ref(), Ok(1));
        assert_eq!(reclaims.load(Ordering::SeqCst), 0);
        assert_eq!(inode.release_ref(), Ok(0));
        assert_eq!(reclaims.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_close_fires_once_per_open_drain() {
        let (inode, closes, _) = node(Ok(()));
        // 每个打开者各持一个引用
        let alias = inode.acquire_ref();
        assert_eq!(inode.acquire_open(), 1);
        assert_eq!(alias.acquire_open(), 2);
        assert_eq!(alias.release_open(), Ok(1));
        assert_eq!(closes.load(Ordering::SeqCst), 0);
        assert_eq!(inode.release_open(), Ok(0));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert_eq!(alias.release_ref(), Ok(1));
        assert_eq!(inode.ref_count(), 1);
    }

    #[test]
    fn test_busy_reclaim_is_tolerated() {
        let (inode, _, reclaims) = node(Err(FsError::Busy));
        assert_eq!(inode.release_ref(), Ok(0));
        assert_eq!(reclaims.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_other_reclaim_error_is_reported() {
        let (inode, _, _) = node(Err(FsError::IoError));
        assert_eq!(inode.release_ref(), Err(FsError::IoError));
    }

    #[test]
    fn test_try_acquire_ref_skips_dead_inode() {
        let (inode, _, _) = node(Ok(()));
        let cached = Arc::downgrade(&inode);
        let strong = cached.upgrade().unwrap();
        inode.release_ref().unwrap();
        assert!(strong.try_acquire_ref().is_none());
    }

    #[test]
    #[should_panic]
    fn test_release_ref_below_open_count_panics() {
        let (inode, _, _) = node(Ok(()));
        inode.acquire_open();
        let _ = inode.release_ref();
    }
}
