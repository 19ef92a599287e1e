//! 架构相关操作的 Mock 实现

use core::cell::Cell;

use sync::ArchOps;

const SIE: usize = 0x2;

std::thread_local! {
    // 每个测试线程相当于一颗 CPU，各自维护中断使能位
    static SSTATUS: Cell<usize> = const { Cell::new(SIE) };
}

/// Mock 架构操作
pub struct MockArchOps;

impl MockArchOps {
    /// 当前线程的中断是否处于启用状态
    pub fn interrupts_enabled(&self) -> bool {
        SSTATUS.with(|s| s.get() & SIE != 0)
    }
}

impl ArchOps for MockArchOps {
    unsafe fn read_and_disable_interrupts(&self) -> usize {
        SSTATUS.with(|s| s.replace(s.get() & !SIE))
    }

    unsafe fn restore_interrupts(&self, flags: usize) {
        SSTATUS.with(|s| s.set(flags));
    }

    fn interrupt_enable_mask(&self) -> usize {
        SIE
    }
}

/// 全局 Mock 实例
pub static MOCK_ARCH_OPS: MockArchOps = MockArchOps;
