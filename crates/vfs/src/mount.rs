//! 设备表与挂载表
//!
//! [`Vfs`] 维护“名字 → 设备/文件系统”的映射。每个表项有三种合法形态：
//!
//! - 不可挂载的裸设备（如控制台）：有设备节点，无文件系统
//! - 可挂载但尚未挂载的块设备：有设备节点，`mountable`，无文件系统
//! - 已挂载的文件系统：有文件系统（通过 [`Vfs::add_fs`] 注册的表项没有设备节点）
//!
//! 所有结构性修改和遍历都在同一把锁下进行。

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::sync::Arc;

use log::{debug, info, warn};
use sync::SpinLock;

use crate::config::FS_MAX_DNAME_LEN;
use crate::dev::Device;
use crate::{FileSystem, FsError, FsResult, InodeRef};

struct VfsDev {
    dev_node: Option<InodeRef>,
    fs: Option<Arc<dyn FileSystem>>,
    mountable: bool,
}

/// 设备表与启动文件系统，启动时创建一次并以 `Arc` 共享
pub struct Vfs {
    devs: SpinLock<BTreeMap<String, VfsDev>>,
    bootfs: SpinLock<Option<InodeRef>>,
}

fn same_fs(a: &Arc<dyn FileSystem>, b: &Arc<dyn FileSystem>) -> bool {
    core::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

impl Vfs {
    /// 创建空的设备表
    pub fn new() -> Self {
        Self {
            devs: SpinLock::new(BTreeMap::new()),
            bootfs: SpinLock::new(None),
        }
    }

    fn do_add(
        &self,
        name: &str,
        dev_node: Option<InodeRef>,
        fs: Option<Arc<dyn FileSystem>>,
        mountable: bool,
    ) -> FsResult<()> {
        if name.len() > FS_MAX_DNAME_LEN {
            return Err(FsError::NameTooLong);
        }
        let mut devs = self.devs.lock();
        if devs.contains_key(name) {
            return Err(FsError::AlreadyExists);
        }
        devs.insert(
            name.to_string(),
            VfsDev {
                dev_node,
                fs,
                mountable,
            },
        );
        Ok(())
    }

    /// 注册设备节点，设备表接管 `dev_node` 持有的引用
    ///
    /// # Panics
    /// `dev_node` 不是设备节点时 panic。
    pub fn add_dev(&self, name: &str, dev_node: InodeRef, mountable: bool) -> FsResult<()> {
        assert!(
            dev_node.device().is_some(),
            "vfs: add_dev({}) with a non-device inode",
            name
        );
        match self.do_add(name, Some(dev_node.clone()), None, mountable) {
            Ok(()) => {
                debug!("vfs: add device {} (mountable: {})", name, mountable);
                Ok(())
            }
            Err(e) => {
                dev_node.release_ref()?;
                Err(e)
            }
        }
    }

    /// 注册一个不依附于设备的文件系统
    pub fn add_fs(&self, name: &str, fs: Arc<dyn FileSystem>) -> FsResult<()> {
        self.do_add(name, None, Some(fs), false)?;
        debug!("vfs: add filesystem {}", name);
        Ok(())
    }

    /// 在名为 `name` 的可挂载设备上挂载文件系统
    ///
    /// `mount_fn` 在设备表锁内以该设备为参数调用，不得再访问本设备表。
    pub fn mount<F>(&self, name: &str, mount_fn: F) -> FsResult<()>
    where
        F: FnOnce(&Arc<dyn Device>) -> FsResult<Arc<dyn FileSystem>>,
    {
        let mut devs = self.devs.lock();
        let vdev = devs
            .get_mut(name)
            .filter(|vdev| vdev.mountable)
            .ok_or(FsError::NoDevice)?;
        if vdev.fs.is_some() {
            return Err(FsError::Busy);
        }
        let dev = vdev
            .dev_node
            .as_ref()
            .and_then(|node| node.device())
            .ok_or(FsError::NoDevice)?;
        let fs = mount_fn(dev)?;
        info!("vfs: mount {}.", name);
        vdev.fs = Some(fs);
        Ok(())
    }

    /// 卸载 `name` 上的文件系统：先同步再卸载，两步都成功才清除挂载
    pub fn unmount(&self, name: &str) -> FsResult<()> {
        let mut devs = self.devs.lock();
        let vdev = devs
            .get_mut(name)
            .filter(|vdev| vdev.mountable)
            .ok_or(FsError::NoDevice)?;
        let fs = vdev.fs.as_ref().ok_or(FsError::InvalidArgument)?;
        fs.sync()?;
        fs.unmount()?;
        vdev.fs = None;
        info!("vfs: unmount {}.", name);
        Ok(())
    }

    /// 尽力卸载所有已挂载的文件系统，单个表项失败只记录日志
    pub fn unmount_all(&self) {
        let mut devs = self.devs.lock();
        for (name, vdev) in devs.iter_mut() {
            if !vdev.mountable {
                continue;
            }
            let Some(fs) = vdev.fs.as_ref() else {
                continue;
            };
            if let Err(e) = fs.sync() {
                warn!("vfs: warning: sync failed for {}: {}.", name, e);
                continue;
            }
            if let Err(e) = fs.unmount() {
                warn!("vfs: warning: unmount failed for {}: {}.", name, e);
                continue;
            }
            vdev.fs = None;
            info!("vfs: unmount {}.", name);
        }
    }

    /// 同步所有已挂载的文件系统，返回遇到的第一个错误
    pub fn sync_all(&self) -> FsResult<()> {
        let devs = self.devs.lock();
        let mut result = Ok(());
        for (name, vdev) in devs.iter() {
            if let Some(fs) = vdev.fs.as_ref() {
                if let Err(e) = fs.sync() {
                    warn!("vfs: warning: sync failed for {}: {}.", name, e);
                    result = result.and(Err(e));
                }
            }
        }
        result
    }

    /// 调用每个文件系统的清理钩子
    pub fn cleanup(&self) {
        let devs = self.devs.lock();
        for vdev in devs.values() {
            if let Some(fs) = vdev.fs.as_ref() {
                fs.cleanup();
            }
        }
    }

    /// 按名字取根节点，返回的句柄已持有一个引用
    ///
    /// - 已挂载：文件系统的根
    /// - 不可挂载的设备：设备节点本身
    /// - 可挂载但未挂载：[`FsError::DeviceNotAvailable`]
    /// - 名字不存在：[`FsError::NoDevice`]
    pub fn get_root(&self, name: &str) -> FsResult<InodeRef> {
        let devs = self.devs.lock();
        let vdev = devs.get(name).ok_or(FsError::NoDevice)?;
        if let Some(fs) = vdev.fs.as_ref() {
            return fs.root();
        }
        if vdev.mountable {
            return Err(FsError::DeviceNotAvailable);
        }
        vdev.dev_node
            .as_ref()
            .map(|node| node.acquire_ref())
            .ok_or(FsError::NoDevice)
    }

    /// 反查文件系统注册的名字；已卸载或未注册时返回 `None`
    pub fn get_devname(&self, fs: &Arc<dyn FileSystem>) -> Option<String> {
        let devs = self.devs.lock();
        devs.iter()
            .find(|(_, vdev)| vdev.fs.as_ref().is_some_and(|f| same_fs(f, fs)))
            .map(|(name, _)| name.clone())
    }

    /// 设置启动文件系统；`"/"` 开头的路径从它的根开始解析
    ///
    /// 名字可以带一个结尾的 `:`。传入 `None` 清除设置。旧的根引用会被释放。
    pub fn set_bootfs(&self, name: Option<&str>) -> FsResult<()> {
        let root = match name {
            Some(name) => {
                let name = name.strip_suffix(':').unwrap_or(name);
                if name.is_empty() || name.contains(':') {
                    return Err(FsError::InvalidArgument);
                }
                Some(self.get_root(name)?)
            }
            None => None,
        };
        let old = core::mem::replace(&mut *self.bootfs.lock(), root);
        if let Some(old) = old {
            old.release_ref()?;
        }
        Ok(())
    }

    /// 启动文件系统的根，返回的句柄已持有一个引用
    pub fn get_bootfs(&self) -> FsResult<InodeRef> {
        self.bootfs
            .lock()
            .as_ref()
            .map(|root| root.acquire_ref())
            .ok_or(FsError::NotFound)
    }
}

impl Default for Vfs {
    fn default() -> Self {
        Self::new()
    }
}
