//! 文件系统抽象

use crate::{FsResult, InodeRef};

/// 文件系统 trait
///
/// 所有可挂载的文件系统都必须实现此 trait。挂载函数由调用者提供给
/// [`crate::Vfs::mount`]，它检查设备几何、读取并校验超级块后构造出实现者。
pub trait FileSystem: Send + Sync {
    /// 文件系统类型名称
    fn fs_type(&self) -> &'static str;

    /// 获取根节点，返回的句柄已持有一个引用
    fn root(&self) -> FsResult<InodeRef>;

    /// 同步文件系统
    fn sync(&self) -> FsResult<()>;

    /// 卸载文件系统；仍有节点在用时返回 [`crate::FsError::Busy`]
    fn unmount(&self) -> FsResult<()>;

    /// 关机前的清理
    fn cleanup(&self) {}
}
