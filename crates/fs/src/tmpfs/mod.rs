//! Tmpfs - 内存临时文件系统
//!
//! 该模块提供了一个**完全驻留在内存中的文件系统**，以块设备的容量为上限，
//! 通过 [`mount`] 挂到设备表中的可挂载设备上。

mod inode;
mod tmpfs;

pub use inode::TmpfsInode;
pub use tmpfs::{Tmpfs, mount};
