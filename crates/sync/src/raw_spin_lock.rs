//! 自旋锁实现
//!
//! 基于原子操作实现 [`lock_api::RawMutex`]，结合 [`IntrGuard`] 实现中断保护。

use crate::intr_guard::{self, IntrGuard};
use core::{
    hint,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};

/// 原始自旋锁，作为 [`crate::SpinLock`] 的底层实现。
///
/// 获取锁前先屏蔽本地中断，持锁者保存的中断状态存放在锁内部，
/// 释放锁之后再恢复。不可重入。
#[derive(Debug)]
pub struct RawSpinLock {
    lock: AtomicBool,
    /// 持锁者进入临界区前的中断状态，仅由持锁者读写
    saved_flags: AtomicUsize,
}

impl RawSpinLock {
    /// 创建一个未上锁的 RawSpinLock
    pub const fn new() -> Self {
        RawSpinLock {
            lock: AtomicBool::new(false),
            saved_flags: AtomicUsize::new(0),
        }
    }

    fn acquired(&self, guard: IntrGuard) {
        self.saved_flags.store(guard.into_flags(), Ordering::Relaxed);
    }
}

impl Default for RawSpinLock {
    fn default() -> Self {
        Self::new()
    }
}

// SAFETY: 同一时刻只有一个持有者能把 lock 从 false 置为 true
unsafe impl lock_api::RawMutex for RawSpinLock {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = RawSpinLock::new();

    // 持锁期间中断被屏蔽，守卫不能被转移到其他 CPU
    type GuardMarker = lock_api::GuardNoSend;

    fn lock(&self) {
        let guard = IntrGuard::new();

        while self
            .lock
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            hint::spin_loop();
        }

        self.acquired(guard);
    }

    fn try_lock(&self) -> bool {
        let guard = IntrGuard::new();

        if self
            .lock
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            self.acquired(guard);
            true
        } else {
            // guard 在此 drop，恢复中断状态
            false
        }
    }

    unsafe fn unlock(&self) {
        let flags = self.saved_flags.load(Ordering::Relaxed);
        self.lock.store(false, Ordering::Release);
        intr_guard::restore(flags);
    }

    fn is_locked(&self) -> bool {
        self.lock.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use crate::SpinLock;
    use crate::tests::interrupts_enabled;

    #[test]
    fn test_lock_masks_interrupts_while_held() {
        let lock = SpinLock::new(0usize);
        {
            let mut guard = lock.lock();
            *guard += 1;
            assert!(lock.is_locked());
            assert!(!interrupts_enabled());
        }
        assert!(!lock.is_locked());
        assert!(interrupts_enabled());
        assert_eq!(*lock.lock(), 1);
    }

    #[test]
    fn test_try_lock_fails_while_held() {
        let lock = SpinLock::new(());
        let guard = lock.lock();
        assert!(lock.try_lock().is_none());
        // 失败的 try_lock 不应提前恢复外层持锁时的屏蔽状态
        assert!(!interrupts_enabled());
        drop(guard);
        assert!(lock.try_lock().is_some());
        assert!(interrupts_enabled());
    }

    #[test]
    fn test_nested_locks_restore_in_reverse_order() {
        let a = SpinLock::new(1u32);
        let b = SpinLock::new(2u32);
        let ga = a.lock();
        let gb = b.lock();
        assert_eq!(*ga + *gb, 3);
        drop(gb);
        assert!(!interrupts_enabled());
        drop(ga);
        assert!(interrupts_enabled());
    }

    #[test]
    fn test_contended_counter() {
        extern crate std;
        use std::sync::Arc;
        use std::thread;

        let counter = Arc::new(SpinLock::new(0usize));
        let handles: std::vec::Vec<_> = (0..4)
            .map(|_| {
                let counter = counter.clone();
                thread::spawn(move || {
                    for _ in 0..1000 {
                        *counter.lock() += 1;
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(*counter.lock(), 4000);
    }
}
