//! 测试支持 crate
//!
//! 提供宿主机测试所需的 Mock 实现和一次性初始化

#![no_std]

extern crate std;

pub mod mock;

pub use mock::arch::{MOCK_ARCH_OPS, MockArchOps};

use core::sync::atomic::{AtomicUsize, Ordering};

static ARCH_INIT: AtomicUsize = AtomicUsize::new(0);

/// 注册 Mock 架构操作；可在每个测试开头重复调用
pub fn init_arch_ops() {
    match ARCH_INIT.compare_exchange(0, 1, Ordering::AcqRel, Ordering::Acquire) {
        Ok(_) => {
            if !sync::arch_ops_registered() {
                // SAFETY: MOCK_ARCH_OPS 是静态实例，注册发生在任何锁使用之前
                unsafe { sync::register_arch_ops(&MOCK_ARCH_OPS) };
            }
            ARCH_INIT.store(2, Ordering::Release);
        }
        Err(_) => {
            while ARCH_INIT.load(Ordering::Acquire) != 2 {
                core::hint::spin_loop();
            }
        }
    }
}
