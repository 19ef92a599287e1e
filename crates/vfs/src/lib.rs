//! 内核虚拟文件系统层
//!
//! 此 crate 提供与具体文件系统无关的文件抽象，包括：
//!
//! - [`IoBuf`] - 带偏移和剩余量的 I/O 缓冲区描述
//! - [`Inode`] / [`InodeOps`] - 引用计数与打开计数分离的统一节点
//! - [`Device`] - 设备驱动接口，设备以节点形式挂进设备表
//! - [`FileSystem`] - 文件系统接口
//! - [`Vfs`] - 设备表与挂载、启动文件系统
//! - 路径解析（`设备名:路径`、`/路径`、`:路径`、相对路径）
//! - [`FilesStruct`] - 每进程的描述符表与文件级接口

#![no_std]

extern crate alloc;

pub mod config;
pub mod error;

mod dev;
mod fd_table;
mod file;
mod file_system;
mod inode;
mod iobuf;
mod mount;
mod path;
mod vfs_file;

// Re-export error
pub use error::{FsError, FsResult};

// Re-export iobuf
pub use iobuf::IoBuf;

// Re-export dev
pub use dev::Device;

// Re-export inode
pub use inode::{Inode, InodeOps, InodeRef, InodeType};

// Re-export file_system
pub use file_system::FileSystem;

// Re-export mount
pub use mount::Vfs;

// Re-export path
pub use path::{PathRoot, lookup, lookup_parent, split_device};

// Re-export vfs_file
pub use vfs_file::{
    vfs_close, vfs_link, vfs_mkdir, vfs_open, vfs_readlink, vfs_rename, vfs_symlink, vfs_unlink,
};

// Re-export fd_table
pub use fd_table::{FdStatus, FilesStruct};

// Re-export uapi types for convenience
pub use uapi::dirent::Dirent;
pub use uapi::fcntl::{AccessMode, OpenFlags, SeekWhence};
pub use uapi::stat::Stat;
