//! 中断保护器
//!
//! 基于 RAII 实现中断保护，在创建时禁用中断，销毁时恢复。
//!
//! 注意：禁用中断只能阻止**本地 CPU** 的“任务 vs 本地中断”并发，
//! 并不能阻止其他 CPU 的并行访问；多核共享数据仍需要配合自旋锁。

use crate::arch_ops;
use core::mem::ManuallyDrop;

/// 中断保护器，基于 RAII 实现中断保护。
///
/// 在创建时原子地禁用中断并保存之前的状态；
/// 在销毁时自动恢复之前的中断状态。
///
/// # 示例
/// ```ignore
/// {
///     let guard = IntrGuard::new(); // 禁用中断
///     // 临界区代码
/// } // 离开作用域，自动恢复中断状态
/// ```
pub struct IntrGuard {
    flags: usize,
}

impl IntrGuard {
    /// 原子地禁用中断并返回一个 IntrGuard 实例。
    pub fn new() -> Self {
        // SAFETY: 保存的 flags 只会在 drop 或 into_flags 的接收方处恢复一次
        let flags = unsafe { arch_ops().read_and_disable_interrupts() };
        IntrGuard { flags }
    }

    /// 检查进入临界区前，中断是否处于启用状态。
    pub fn was_enabled(&self) -> bool {
        self.flags & arch_ops().interrupt_enable_mask() != 0
    }

    /// 交出保存的中断状态，由调用者负责之后调用 [`restore`] 恢复。
    ///
    /// 用于锁的获取与释放不在同一个作用域内的场景（见 [`crate::RawSpinLock`]）。
    pub(crate) fn into_flags(self) -> usize {
        ManuallyDrop::new(self).flags
    }
}

impl Default for IntrGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for IntrGuard {
    /// 当 IntrGuard 离开作用域时，自动恢复中断状态。
    fn drop(&mut self) {
        restore(self.flags);
    }
}

/// 恢复由 [`IntrGuard::into_flags`] 交出的中断状态
pub(crate) fn restore(flags: usize) {
    // SAFETY: flags 来自 read_and_disable_interrupts
    unsafe { arch_ops().restore_interrupts(flags) };
}
