//! 内核设备驱动
//!
//! 此 crate 提供挂进 VFS 设备表的三个设备，以及它们依赖的协作接口：
//!
//! - [`Disk`] - 以 [`DISK0_BLKSIZE`](config::DISK0_BLKSIZE) 为块的磁盘设备
//! - [`Stdin`] - 由中断喂数据、读者可阻塞的字符输入设备
//! - [`Stdout`] - 无缓冲的字符输出设备
//! - [`BlockDriver`] trait - 磁盘之下的扇区驱动接口
//! - [`Console`] trait - 控制台输出接口
//! - [`WaitQueue`] trait - 调度器提供的等待队列接口
//!
//! # 架构解耦
//!
//! 调度器和控制台都以 trait 对象注入，本 crate 不依赖具体内核。

#![no_std]

extern crate alloc;

pub mod block;
pub mod config;
pub mod console;
pub mod wait;

// Re-export block
pub use block::{BlockDriver, Disk, RamDisk};

// Re-export console
pub use console::{Console, Stdin, Stdout};

// Re-export wait
pub use wait::{WaitQueue, WakeReason};
