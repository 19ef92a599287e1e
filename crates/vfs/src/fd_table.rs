//! 文件描述符表
//!
//! 每个进程一张固定大小的描述符表（[`FilesStruct`]），外加当前工作目录。
//!
//! 槽位状态机：`None → Init → Opened → Closed → None`
//!
//! - `None`：空闲，可分配
//! - `Init`：已分配但尚未绑定节点（`open` 过程中的过渡态）
//! - `Opened`：已绑定节点，可做 I/O；`open_count` 记录进行中的操作数
//! - `Closed`：已请求关闭，但仍有进行中的操作；最后一个操作结束时才真正释放
//!
//! 槽位状态的变更都在表锁内完成；真正的 I/O 和节点的关闭回调在锁外进行。

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use sync::SpinLock;

use crate::config::FILES_STRUCT_NENTRY;
use crate::vfs_file::vfs_close;
use crate::{FsError, FsResult, InodeRef, InodeType, Vfs};

/// 描述符槽位状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FdStatus {
    /// 空闲
    None,
    /// 已分配，未绑定节点
    Init,
    /// 已打开
    Opened,
    /// 已关闭，等待进行中的操作结束
    Closed,
}

#[derive(Debug)]
struct FdSlot {
    status: FdStatus,
    node: Option<InodeRef>,
    pos: u64,
    readable: bool,
    writable: bool,
    open_count: usize,
}

impl FdSlot {
    const fn new() -> Self {
        Self {
            status: FdStatus::None,
            node: None,
            pos: 0,
            readable: false,
            writable: false,
            open_count: 0,
        }
    }

    fn node(&self, fd: usize) -> &InodeRef {
        match self.node.as_ref() {
            Some(node) => node,
            None => panic!("fd_table: fd {} opened without inode", fd),
        }
    }

    /// `Init`/`Closed → None`；`Closed` 槽位交出节点，由调用者在锁外关闭
    fn free(&mut self, fd: usize) -> Option<InodeRef> {
        assert!(
            matches!(self.status, FdStatus::Init | FdStatus::Closed),
            "fd_table: free fd {} in state {:?}",
            fd,
            self.status
        );
        assert_eq!(self.open_count, 0, "fd_table: free fd {} still in use", fd);
        let node = self.node.take();
        let closed = self.status == FdStatus::Closed;
        self.status = FdStatus::None;
        if closed { node } else { None }
    }

    /// `Init → Opened`
    fn open(&mut self, fd: usize, node: InodeRef, pos: u64, readable: bool, writable: bool) {
        assert_eq!(
            self.status,
            FdStatus::Init,
            "fd_table: open fd {} in state {:?}",
            fd,
            self.status
        );
        self.node = Some(node);
        self.pos = pos;
        self.readable = readable;
        self.writable = writable;
        self.status = FdStatus::Opened;
        self.open_count = 1;
    }

    /// `Opened → Closed`，扣掉打开时隐含的那次 acquire；计数归零则立即释放
    fn close(&mut self, fd: usize) -> Option<InodeRef> {
        assert!(self.open_count > 0, "fd_table: close fd {} with no holders", fd);
        self.status = FdStatus::Closed;
        self.open_count -= 1;
        if self.open_count == 0 {
            self.free(fd)
        } else {
            None
        }
    }
}

/// 一次 acquire 得到的槽位快照
///
/// `node` 是不计数的 `Arc` 克隆：acquire 期间槽位不会被释放，槽位持有的引用保证节点存活。
pub(crate) struct Acquired {
    pub(crate) node: InodeRef,
    pub(crate) pos: u64,
    pub(crate) readable: bool,
    pub(crate) writable: bool,
}

/// 进程的文件状态：工作目录与描述符表
pub struct FilesStruct {
    vfs: Arc<Vfs>,
    cwd: SpinLock<Option<InodeRef>>,
    slots: SpinLock<Box<[FdSlot]>>,
}

impl fmt::Debug for FilesStruct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots = self.slots.lock();
        let used = slots
            .iter()
            .filter(|slot| slot.status != FdStatus::None)
            .count();
        f.debug_struct("FilesStruct")
            .field("slots", &slots.len())
            .field("used", &used)
            .finish()
    }
}

impl FilesStruct {
    /// 进程创建时调用：空工作目录，所有槽位空闲
    pub fn new(vfs: Arc<Vfs>) -> Self {
        let slots: Vec<FdSlot> = (0..FILES_STRUCT_NENTRY).map(|_| FdSlot::new()).collect();
        Self {
            vfs,
            cwd: SpinLock::new(None),
            slots: SpinLock::new(slots.into_boxed_slice()),
        }
    }

    /// 所属的 VFS
    pub fn vfs(&self) -> &Arc<Vfs> {
        &self.vfs
    }

    /// 槽位状态；越界返回 `None`
    pub fn status(&self, fd: usize) -> Option<FdStatus> {
        self.slots.lock().get(fd).map(|slot| slot.status)
    }

    /// 分配槽位（`None → Init`）
    ///
    /// - `fd` 为 `None`：取第一个空闲槽位，没有则 [`FsError::TooManyOpenFiles`]
    /// - 指定 `fd`：越界 [`FsError::InvalidArgument`]，非空闲 [`FsError::Busy`]
    pub(crate) fn alloc(&self, fd: Option<usize>) -> FsResult<usize> {
        let mut slots = self.slots.lock();
        Self::alloc_locked(&mut slots, fd)
    }

    fn alloc_locked(slots: &mut [FdSlot], fd: Option<usize>) -> FsResult<usize> {
        let fd = match fd {
            None => slots
                .iter()
                .position(|slot| slot.status == FdStatus::None)
                .ok_or(FsError::TooManyOpenFiles)?,
            Some(fd) if fd >= slots.len() => return Err(FsError::InvalidArgument),
            Some(fd) if slots[fd].status != FdStatus::None => return Err(FsError::Busy),
            Some(fd) => fd,
        };
        let slot = &mut slots[fd];
        assert_eq!(slot.open_count, 0, "fd_table: alloc fd {} still in use", fd);
        slot.status = FdStatus::Init;
        slot.node = None;
        Ok(fd)
    }

    /// 放弃一个刚分配、尚未绑定的槽位（`Init → None`）
    pub(crate) fn free_init(&self, fd: usize) {
        let node = self.slots.lock()[fd].free(fd);
        debug_assert!(node.is_none());
    }

    /// 绑定节点并进入 `Opened`，槽位接管 `node` 持有的引用和打开计数
    pub(crate) fn install(
        &self,
        fd: usize,
        node: InodeRef,
        pos: u64,
        readable: bool,
        writable: bool,
    ) {
        self.slots.lock()[fd].open(fd, node, pos, readable, writable);
    }

    /// 描述符是否处于 `Opened`，且满足所要求的读写权限
    pub fn testfd(&self, fd: usize, readable: bool, writable: bool) -> bool {
        let slots = self.slots.lock();
        match slots.get(fd) {
            Some(slot) if slot.status == FdStatus::Opened => {
                (!readable || slot.readable) && (!writable || slot.writable)
            }
            _ => false,
        }
    }

    /// 开始一次操作：要求 `Opened`，并增加进行中计数
    pub(crate) fn acquire(&self, fd: usize) -> FsResult<Acquired> {
        let mut slots = self.slots.lock();
        let slot = slots
            .get_mut(fd)
            .filter(|slot| slot.status == FdStatus::Opened)
            .ok_or(FsError::InvalidArgument)?;
        slot.open_count += 1;
        Ok(Acquired {
            node: slot.node(fd).clone(),
            pos: slot.pos,
            readable: slot.readable,
            writable: slot.writable,
        })
    }

    /// 结束一次操作；若这是 `Closed` 槽位上的最后一个操作，释放槽位并关闭节点
    pub(crate) fn release(&self, fd: usize) {
        let node = {
            let mut slots = self.slots.lock();
            let slot = &mut slots[fd];
            assert!(
                matches!(slot.status, FdStatus::Opened | FdStatus::Closed),
                "fd_table: release fd {} in state {:?}",
                fd,
                slot.status
            );
            assert!(slot.open_count > 0, "fd_table: release fd {} with no holders", fd);
            slot.open_count -= 1;
            if slot.open_count == 0 {
                slot.free(fd)
            } else {
                None
            }
        };
        if let Some(node) = node {
            vfs_close(node);
        }
    }

    /// 推进游标；槽位已不再是 `Opened` 时不做任何事
    pub(crate) fn advance(&self, fd: usize, n: usize) {
        let mut slots = self.slots.lock();
        let slot = &mut slots[fd];
        if slot.status == FdStatus::Opened {
            slot.pos += n as u64;
        }
    }

    /// 设置游标；槽位已不再是 `Opened` 时不做任何事
    pub(crate) fn set_pos(&self, fd: usize, pos: u64) {
        let mut slots = self.slots.lock();
        let slot = &mut slots[fd];
        if slot.status == FdStatus::Opened {
            slot.pos = pos;
        }
    }

    /// `Opened → Closed`；没有进行中的操作时立即释放槽位并关闭节点
    pub(crate) fn close_fd(&self, fd: usize) -> FsResult<()> {
        let node = {
            let mut slots = self.slots.lock();
            let slot = slots
                .get_mut(fd)
                .filter(|slot| slot.status == FdStatus::Opened)
                .ok_or(FsError::InvalidArgument)?;
            slot.close(fd)
        };
        if let Some(node) = node {
            vfs_close(node);
        }
        Ok(())
    }

    /// 复制描述符：`from` 必须 `Opened`；`to` 为 `None` 时自动分配
    ///
    /// 新槽位复制游标和读写权限，节点的引用计数和打开计数各加一。
    pub(crate) fn dup_fd(&self, from: usize, to: Option<usize>) -> FsResult<usize> {
        let mut slots = self.slots.lock();
        let src = slots
            .get(from)
            .filter(|slot| slot.status == FdStatus::Opened)
            .ok_or(FsError::InvalidArgument)?;
        let (node, pos, readable, writable) = (
            src.node(from).clone(),
            src.pos,
            src.readable,
            src.writable,
        );
        let to = Self::alloc_locked(&mut slots, to)?;
        let node = node.acquire_ref();
        node.acquire_open();
        slots[to].open(to, node, pos, readable, writable);
        Ok(to)
    }

    /// 关闭除 0、1 号以外所有已打开的描述符（exec 时调用）
    pub fn close_all(&self) {
        let closed: Vec<InodeRef> = {
            let mut slots = self.slots.lock();
            slots
                .iter_mut()
                .enumerate()
                .skip(2)
                .filter(|(_, slot)| slot.status == FdStatus::Opened)
                .filter_map(|(fd, slot)| slot.close(fd))
                .collect()
        };
        closed.into_iter().for_each(vfs_close);
    }

    /// 进程退出时调用：释放工作目录，关闭所有已打开的描述符
    ///
    /// # Panics
    /// 仍有描述符上的操作未结束时 panic。
    pub fn destroy(&self) {
        let cwd = self.cwd.lock().take();
        if let Some(cwd) = cwd {
            cwd.put();
        }
        let closed: Vec<InodeRef> = {
            let mut slots = self.slots.lock();
            slots
                .iter_mut()
                .enumerate()
                .filter(|(_, slot)| slot.status == FdStatus::Opened)
                .filter_map(|(fd, slot)| slot.close(fd))
                .collect()
        };
        closed.into_iter().for_each(vfs_close);
        let slots = self.slots.lock();
        for (fd, slot) in slots.iter().enumerate() {
            assert_eq!(
                slot.status,
                FdStatus::None,
                "fd_table: fd {} still busy at destroy",
                fd
            );
        }
    }

    /// fork 时调用：复制工作目录引用，把每个已打开的描述符复制到子进程的同一位置
    pub fn fork(&self) -> Self {
        let child = Self::new(self.vfs.clone());
        let cwd = self.get_curdir().ok();
        *child.cwd.lock() = cwd;
        let slots = self.slots.lock();
        let mut child_slots = child.slots.lock();
        for (fd, (src, dst)) in slots.iter().zip(child_slots.iter_mut()).enumerate() {
            if src.status != FdStatus::Opened {
                continue;
            }
            let node = src.node(fd).acquire_ref();
            node.acquire_open();
            dst.status = FdStatus::Init;
            dst.open(fd, node, src.pos, src.readable, src.writable);
        }
        drop(child_slots);
        child
    }

    /// 当前工作目录，返回的句柄已持有一个引用；未设置时 [`FsError::NotFound`]
    pub fn get_curdir(&self) -> FsResult<InodeRef> {
        self.cwd
            .lock()
            .as_ref()
            .map(|cwd| cwd.acquire_ref())
            .ok_or(FsError::NotFound)
    }

    /// 设置当前工作目录；`dir` 必须是目录。旧的工作目录引用被释放，调用者仍持有 `dir` 的引用
    pub fn set_curdir(&self, dir: &InodeRef) -> FsResult<()> {
        if dir.gettype()? != InodeType::Directory {
            return Err(FsError::NotDirectory);
        }
        let new = dir.acquire_ref();
        let old = self.cwd.lock().replace(new);
        if let Some(old) = old {
            old.put();
        }
        Ok(())
    }

    /// 取当前工作目录的一个临时引用，交给 `f` 使用后归还
    pub(crate) fn with_cwd<R>(&self, f: impl FnOnce(Option<&InodeRef>) -> R) -> R {
        let cwd = self.get_curdir().ok();
        let result = f(cwd.as_ref());
        if let Some(cwd) = cwd {
            cwd.put();
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inode::InodeOps;
    use crate::{FileSystem, Inode, IoBuf};
    use alloc::sync::Weak;
    use core::any::Any;
    use core::sync::atomic::{AtomicUsize, Ordering};
    use uapi::dirent::Dirent;
    use uapi::fcntl::OpenFlags;
    use uapi::stat::Stat;

    fn files() -> FilesStruct {
        test_support::init_arch_ops();
        FilesStruct::new(Arc::new(Vfs::new()))
    }

    /// 目录项只有一个，之后的读取先搬一部分数据再报错
    struct ListNode {
        closes: Arc<AtomicUsize>,
    }

    impl InodeOps for ListNode {
        fn open(&self, _flags: OpenFlags) -> FsResult<()> {
            Ok(())
        }

        fn close(&self) -> FsResult<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn reclaim(&self, _this: &Inode) -> FsResult<()> {
            Ok(())
        }

        fn gettype(&self) -> FsResult<InodeType> {
            Ok(InodeType::Directory)
        }

        fn fstat(&self) -> FsResult<Stat> {
            Ok(Stat::default())
        }

        fn getdirentry(&self, iob: &mut IoBuf<'_>) -> FsResult<()> {
            if iob.offset() == 0 {
                iob.copy_in(b"only")?;
                let pad = iob.resid();
                iob.fill_zeros(pad)
            } else {
                iob.copy_in(b"x")?;
                Err(FsError::IoError)
            }
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

    /// 打开一个 `ListNode`，返回描述符、不计数的节点句柄和关闭计数
    fn open_list(files: &FilesStruct) -> (usize, InodeRef, Arc<AtomicUsize>) {
        let closes = Arc::new(AtomicUsize::new(0));
        let fs: Weak<dyn FileSystem> = Weak::<NoFs>::new();
        let node = Inode::new_fs_node(
            Box::new(ListNode {
                closes: closes.clone(),
            }),
            fs,
        );
        node.acquire_open();
        let fd = files.alloc(None).unwrap();
        files.install(fd, node.clone(), 0, true, false);
        (fd, node, closes)
    }

    #[test]
    fn test_close_during_operation_defers_finalization() {
        let files = files();
        let (fd, node, closes) = open_list(&files);

        let op = files.acquire(fd).unwrap();
        files.close_fd(fd).unwrap();
        assert_eq!(files.status(fd), Some(FdStatus::Closed));
        assert_eq!(closes.load(Ordering::SeqCst), 0);
        assert_eq!(node.open_count(), 1);

        // 已关闭的槽位不再接受游标更新和新的操作
        files.advance(fd, 5);
        files.set_pos(fd, 9);
        assert_eq!(files.slots.lock()[fd].pos, 0);
        assert!(files.acquire(fd).is_err());
        assert_eq!(files.close_fd(fd), Err(FsError::InvalidArgument));
        assert!(!files.testfd(fd, true, false));

        drop(op);
        files.release(fd);
        assert_eq!(files.status(fd), Some(FdStatus::None));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert_eq!(node.open_count(), 0);
        assert_eq!(node.ref_count(), 0);
        assert_eq!(files.alloc(None), Ok(fd));
    }

    #[test]
    fn test_getdirentry_error_keeps_offset() {
        let files = files();
        let (fd, _node, _closes) = open_list(&files);
        let mut dirent = Dirent::new();

        files.getdirentry(fd, &mut dirent).unwrap();
        assert_eq!(dirent.name_str(), Some("only"));
        assert_eq!(dirent.offset, dirent.name.len() as u64);

        assert_eq!(files.getdirentry(fd, &mut dirent), Err(FsError::IoError));
        assert_eq!(dirent.offset, dirent.name.len() as u64);
        files.close_fd(fd).unwrap();
    }

    #[test]
    fn test_alloc_auto_and_explicit() {
        let files = files();
        assert_eq!(files.alloc(None), Ok(0));
        assert_eq!(files.alloc(None), Ok(1));
        assert_eq!(files.alloc(Some(5)), Ok(5));
        assert_eq!(files.alloc(Some(5)), Err(FsError::Busy));
        assert_eq!(
            files.alloc(Some(FILES_STRUCT_NENTRY)),
            Err(FsError::InvalidArgument)
        );
        assert_eq!(files.status(5), Some(FdStatus::Init));
        files.free_init(5);
        assert_eq!(files.status(5), Some(FdStatus::None));
        assert_eq!(files.alloc(None), Ok(2));
    }

    #[test]
    fn test_alloc_exhaustion() {
        let files = files();
        for fd in 0..FILES_STRUCT_NENTRY {
            assert_eq!(files.alloc(None), Ok(fd));
        }
        assert_eq!(files.alloc(None), Err(FsError::TooManyOpenFiles));
    }

    #[test]
    fn test_unopened_fd_rejected() {
        let files = files();
        let fd = files.alloc(None).unwrap();
        assert!(files.acquire(fd).is_err());
        assert_eq!(files.close_fd(fd), Err(FsError::InvalidArgument));
        assert!(!files.testfd(fd, false, false));
        assert!(!files.testfd(FILES_STRUCT_NENTRY + 3, false, false));
        assert_eq!(files.get_curdir().unwrap_err(), FsError::NotFound);
    }

    #[test]
    #[should_panic]
    fn test_double_free_panics() {
        let files = files();
        let fd = files.alloc(None).unwrap();
        files.free_init(fd);
        files.free_init(fd);
    }
}
