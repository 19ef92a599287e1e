//! 等待队列接口
//!
//! 阻塞读需要的调度原语由内核提供。一次等待分三步：
//! 持锁时 `prepare_to_wait` 入队，放锁后 `schedule` 让出 CPU，
//! 被唤醒后 `finish_wait` 出队并取回唤醒原因。
//! 入队发生在放锁之前，因此两步之间到来的唤醒不会丢失。

/// 唤醒原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeReason {
    /// 键盘输入到达
    Keyboard,
    /// 与输入无关的唤醒（信号、进程被杀等）
    Interrupted,
}

/// 等待队列
pub trait WaitQueue: Send + Sync {
    /// 队列中是否有等待者
    fn has_waiters(&self) -> bool;

    /// 把当前任务以 `reason` 挂入队列，返回出队时使用的令牌
    fn prepare_to_wait(&self, reason: WakeReason) -> usize;

    /// 让出 CPU，直到被唤醒
    fn schedule(&self);

    /// 把令牌对应的任务移出队列，返回它被唤醒的原因；尚未被唤醒时返回 `None`
    fn finish_wait(&self, token: usize) -> Option<WakeReason>;

    /// 以 `reason` 唤醒所有等待者
    fn wake_up_all(&self, reason: WakeReason);
}
