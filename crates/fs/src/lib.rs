//! # 文件系统模块 (FS)
//!
//! 本模块提供具体的文件系统实现和文件系统子系统的启动/关闭流程。
//!
//! ## 支持的文件系统
//!
//! - **[tmpfs](tmpfs)**: 临时文件系统(纯内存)，以挂载设备的容量为上限
//!
//! ## 启动
//!
//! [`fs_init`] 按固定顺序注册 `stdin`、`stdout`、`disk0`，
//! 在 `disk0` 上挂载 tmpfs 并设为启动文件系统。

#![no_std]

extern crate alloc;

mod init;
pub mod tmpfs;

pub use init::{DISK0_NAME, STDIN_NAME, STDOUT_NAME, fs_cleanup, fs_init};
pub use tmpfs::{Tmpfs, TmpfsInode};
