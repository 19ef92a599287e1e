//! Tmpfs 节点实现
//!
//! [`TmpfsNode`] 是目录树中的持久节点，保存数据和目录项；
//! [`TmpfsInode`] 是挂在 VFS 节点上的操作实现，只在有引用时存在。
//!
//! 锁顺序：父目录的 `state` 先于子节点的 `state`，`state` 先于文件系统统计；
//! `vnode` 槽位从不与 `state` 嵌套。

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::sync::{Arc, Weak};
use alloc::vec::Vec;
use core::any::Any;

use sync::SpinLock;
use uapi::dirent::{DIRENT_NAME_SIZE, FS_MAX_FNAME_LEN};
use uapi::fcntl::{AccessMode, OpenFlags};
use uapi::stat::Stat;
use vfs::{FsError, FsResult, Inode, InodeOps, InodeRef, InodeType, IoBuf};

use super::tmpfs::Tmpfs;

struct NodeState {
    data: Vec<u8>,
    children: BTreeMap<String, Arc<TmpfsNode>>,
    parent: Weak<TmpfsNode>,
    name: String,
    nlinks: u32,
}

/// 目录树中的节点
pub(super) struct TmpfsNode {
    kind: InodeType,
    state: SpinLock<NodeState>,
    pub(super) vnode: SpinLock<Weak<Inode>>,
}

impl TmpfsNode {
    pub(super) fn new_root() -> Arc<Self> {
        Self::new(InodeType::Directory, Weak::new(), String::new())
    }

    fn new(kind: InodeType, parent: Weak<TmpfsNode>, name: String) -> Arc<Self> {
        Arc::new(Self {
            kind,
            state: SpinLock::new(NodeState {
                data: Vec::new(),
                children: BTreeMap::new(),
                parent,
                name,
                nlinks: if kind == InodeType::Directory { 2 } else { 1 },
            }),
            vnode: SpinLock::new(Weak::new()),
        })
    }

    fn is_dir(&self) -> bool {
        self.kind == InodeType::Directory
    }

    fn has_vnode(&self) -> bool {
        self.vnode.lock().strong_count() > 0
    }
}

fn check_name(name: &str) -> FsResult<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains('/') {
        return Err(FsError::InvalidArgument);
    }
    if name.len() > FS_MAX_FNAME_LEN {
        return Err(FsError::NameTooLong);
    }
    Ok(())
}

/// Tmpfs 节点的操作实现
pub struct TmpfsInode {
    node: Arc<TmpfsNode>,
    fs: Arc<Tmpfs>,
}

impl TmpfsInode {
    pub(super) fn new(node: Arc<TmpfsNode>, fs: Arc<Tmpfs>) -> Self {
        Self { node, fs }
    }

    fn require_dir(&self) -> FsResult<()> {
        if self.node.is_dir() {
            Ok(())
        } else {
            Err(FsError::NotDirectory)
        }
    }

    fn require_file(&self) -> FsResult<()> {
        if self.node.is_dir() {
            Err(FsError::IsDirectory)
        } else {
            Ok(())
        }
    }

    /// 调整文件长度，扩展部分填零
    fn set_len(&self, len: u64) -> FsResult<()> {
        let len = usize::try_from(len).map_err(|_| FsError::NoSpace)?;
        let mut state = self.node.state.lock();
        self.fs.resize(state.data.len(), len)?;
        state.data.resize(len, 0);
        Ok(())
    }

    /// 释放已无名字的节点的数据
    fn free_data(fs: &Tmpfs, node: &TmpfsNode) {
        let mut state = node.state.lock();
        if state.nlinks == 0 {
            let data = core::mem::take(&mut state.data);
            // 缩小不会失败
            let _ = fs.resize(data.len(), 0);
        }
    }

    fn insert_child(&self, name: &str, kind: InodeType) -> FsResult<()> {
        check_name(name)?;
        self.require_dir()?;
        let mut state = self.node.state.lock();
        if state.nlinks == 0 {
            return Err(FsError::NotFound);
        }
        if state.children.contains_key(name) {
            return Err(FsError::AlreadyExists);
        }
        let child = TmpfsNode::new(kind, Arc::downgrade(&self.node), name.to_string());
        state.children.insert(name.to_string(), child);
        if kind == InodeType::Directory {
            state.nlinks += 1;
        }
        Ok(())
    }
}

impl InodeOps for TmpfsInode {
    fn open(&self, flags: OpenFlags) -> FsResult<()> {
        match flags.access_mode() {
            Some(AccessMode::ReadOnly) => Ok(()),
            Some(_) if self.node.is_dir() => Err(FsError::IsDirectory),
            Some(_) => Ok(()),
            None => Err(FsError::InvalidArgument),
        }
    }

    fn close(&self) -> FsResult<()> {
        Ok(())
    }

    fn reclaim(&self, this: &Inode) -> FsResult<()> {
        {
            let mut slot = self.node.vnode.lock();
            if core::ptr::eq(slot.as_ptr(), this) {
                *slot = Weak::new();
            }
        }
        self.fs.vnode_reclaimed();
        Self::free_data(&self.fs, &self.node);
        Ok(())
    }

    fn gettype(&self) -> FsResult<InodeType> {
        Ok(self.node.kind)
    }

    fn fstat(&self) -> FsResult<Stat> {
        let state = self.node.state.lock();
        let size = state.data.len() as u64;
        Ok(Stat {
            mode: self.node.kind.mode(),
            nlinks: state.nlinks,
            blocks: size.div_ceil(self.fs.block_size() as u64),
            size,
        })
    }

    fn read(&self, iob: &mut IoBuf<'_>) -> FsResult<()> {
        self.require_file()?;
        let state = self.node.state.lock();
        let len = state.data.len() as u64;
        let offset = iob.offset();
        if offset >= len {
            return Ok(());
        }
        let end = len.min(offset + iob.resid() as u64);
        iob.copy_in(&state.data[offset as usize..end as usize])
    }

    fn write(&self, iob: &mut IoBuf<'_>) -> FsResult<()> {
        self.require_file()?;
        if iob.resid() == 0 {
            return Ok(());
        }
        let offset = iob.offset();
        let end = offset
            .checked_add(iob.resid() as u64)
            .filter(|&end| end <= self.fs.total_size() as u64)
            .ok_or(FsError::NoSpace)?;
        let mut state = self.node.state.lock();
        if end > state.data.len() as u64 {
            self.fs.resize(state.data.len(), end as usize)?;
            state.data.resize(end as usize, 0);
        }
        iob.copy_out(&mut state.data[offset as usize..end as usize])
    }

    fn fsync(&self) -> FsResult<()> {
        Ok(())
    }

    fn tryseek(&self, pos: i64) -> FsResult<()> {
        if self.node.is_dir() {
            return if pos == 0 {
                Ok(())
            } else {
                Err(FsError::InvalidArgument)
            };
        }
        let pos = u64::try_from(pos).map_err(|_| FsError::InvalidArgument)?;
        if pos > self.fs.total_size() as u64 {
            return Err(FsError::InvalidArgument);
        }
        let len = self.node.state.lock().data.len() as u64;
        if pos > len {
            self.set_len(pos)?;
        }
        Ok(())
    }

    fn truncate(&self, len: u64) -> FsResult<()> {
        self.require_file()?;
        self.set_len(len)
    }

    fn namefile(&self, iob: &mut IoBuf<'_>) -> FsResult<()> {
        let mut names = Vec::new();
        let mut cur = self.node.clone();
        loop {
            let (parent, name) = {
                let state = cur.state.lock();
                (state.parent.upgrade(), state.name.clone())
            };
            let Some(parent) = parent else {
                break;
            };
            names.push(name);
            cur = parent;
        }
        if names.is_empty() {
            return iob.copy_in(b"/");
        }
        for name in names.iter().rev() {
            iob.copy_in(b"/")?;
            iob.copy_in(name.as_bytes())?;
        }
        Ok(())
    }

    fn getdirentry(&self, iob: &mut IoBuf<'_>) -> FsResult<()> {
        self.require_dir()?;
        let offset = iob.offset();
        if offset % DIRENT_NAME_SIZE as u64 != 0 {
            return Err(FsError::InvalidArgument);
        }
        let slot = (offset / DIRENT_NAME_SIZE as u64) as usize;
        let name = match slot {
            0 => String::from("."),
            1 => String::from(".."),
            n => {
                let state = self.node.state.lock();
                state
                    .children
                    .keys()
                    .nth(n - 2)
                    .cloned()
                    .ok_or(FsError::NotFound)?
            }
        };
        iob.copy_in(name.as_bytes())?;
        let pad = iob.resid();
        iob.fill_zeros(pad)
    }

    fn lookup(&self, this: &InodeRef, path: &str) -> FsResult<InodeRef> {
        let mut cur = self.node.clone();
        for comp in path.split('/').filter(|comp| !comp.is_empty()) {
            if !cur.is_dir() {
                return Err(FsError::NotDirectory);
            }
            if comp.len() > FS_MAX_FNAME_LEN {
                return Err(FsError::NameTooLong);
            }
            let next = {
                let state = cur.state.lock();
                match comp {
                    "." => None,
                    // 根目录的 `..` 仍是根目录
                    ".." => state.parent.upgrade(),
                    _ => Some(state.children.get(comp).cloned().ok_or(FsError::NotFound)?),
                }
            };
            if let Some(next) = next {
                cur = next;
            }
        }
        if Arc::ptr_eq(&cur, &self.node) {
            return Ok(this.acquire_ref());
        }
        self.fs.vnode(&cur)
    }

    fn create(&self, name: &str, excl: bool) -> FsResult<InodeRef> {
        check_name(name)?;
        self.require_dir()?;
        let node = {
            let mut state = self.node.state.lock();
            if state.nlinks == 0 {
                return Err(FsError::NotFound);
            }
            match state.children.get(name) {
                Some(_) if excl => return Err(FsError::AlreadyExists),
                Some(child) if child.is_dir() => return Err(FsError::IsDirectory),
                Some(child) => child.clone(),
                None => {
                    let child = TmpfsNode::new(
                        InodeType::File,
                        Arc::downgrade(&self.node),
                        name.to_string(),
                    );
                    state.children.insert(name.to_string(), child.clone());
                    child
                }
            }
        };
        self.fs.vnode(&node)
    }

    fn mkdir(&self, name: &str) -> FsResult<()> {
        self.insert_child(name, InodeType::Directory)
    }

    fn unlink(&self, name: &str) -> FsResult<()> {
        check_name(name)?;
        self.require_dir()?;
        let removed = {
            let mut state = self.node.state.lock();
            let child = state.children.get(name).cloned().ok_or(FsError::NotFound)?;
            {
                let mut child_state = child.state.lock();
                if child.is_dir() {
                    if !child_state.children.is_empty() {
                        return Err(FsError::DirectoryNotEmpty);
                    }
                    child_state.nlinks = 0;
                } else {
                    child_state.nlinks -= 1;
                }
            }
            if child.is_dir() {
                state.nlinks -= 1;
            }
            state.children.remove(name);
            child
        };
        // 仍被引用的节点等到回收时再释放数据
        if !removed.has_vnode() {
            Self::free_data(&self.fs, &removed);
        }
        Ok(())
    }

    fn link(&self, name: &str, target: &InodeRef) -> FsResult<()> {
        check_name(name)?;
        self.require_dir()?;
        let target = target
            .downcast_ref::<TmpfsInode>()
            .filter(|target| Arc::ptr_eq(&target.fs, &self.fs))
            .ok_or(FsError::InvalidArgument)?;
        if target.node.is_dir() {
            return Err(FsError::IsDirectory);
        }
        let mut state = self.node.state.lock();
        if state.nlinks == 0 {
            return Err(FsError::NotFound);
        }
        if state.children.contains_key(name) {
            return Err(FsError::AlreadyExists);
        }
        {
            let mut target_state = target.node.state.lock();
            if target_state.nlinks == 0 {
                return Err(FsError::NotFound);
            }
            target_state.nlinks += 1;
        }
        state.children.insert(name.to_string(), target.node.clone());
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
