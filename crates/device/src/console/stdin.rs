//! 标准输入设备
//!
//! 生产者是键盘/串口中断，调用 [`Stdin::push`] 每次送入一个字节；
//! 消费者是 `read`，缓冲区空时挂到等待队列上阻塞。
//! 环形缓冲区的读写游标单调递增、只在取下标时取模，从不回绕清零。

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec;

use sync::SpinLock;
use uapi::fcntl::{AccessMode, OpenFlags};
use vfs::{Device, FsError, FsResult, IoBuf};

use crate::config::STDIN_BUFSIZE;
use crate::wait::{WaitQueue, WakeReason};

struct Ring {
    buf: Box<[u8]>,
    rpos: u64,
    wpos: u64,
}

impl Ring {
    fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity].into_boxed_slice(),
            rpos: 0,
            wpos: 0,
        }
    }

    fn capacity(&self) -> u64 {
        self.buf.len() as u64
    }

    fn index(&self, pos: u64) -> usize {
        (pos % self.capacity()) as usize
    }

    /// 写入一个字节；缓冲区满时覆盖最旧的未读字节
    fn push(&mut self, c: u8) {
        if self.wpos - self.rpos == self.capacity() {
            self.rpos += 1;
        }
        let i = self.index(self.wpos);
        self.buf[i] = c;
        self.wpos += 1;
    }

    fn pop(&mut self) -> Option<u8> {
        if self.rpos == self.wpos {
            return None;
        }
        let c = self.buf[self.index(self.rpos)];
        self.rpos += 1;
        Some(c)
    }
}

/// 字符输入设备
pub struct Stdin {
    ring: SpinLock<Ring>,
    wait: Arc<dyn WaitQueue>,
}

impl Stdin {
    /// 创建容量为 [`STDIN_BUFSIZE`] 的输入设备，读者在 `wait` 上阻塞
    pub fn new(wait: Arc<dyn WaitQueue>) -> Self {
        Self::with_capacity(STDIN_BUFSIZE, wait)
    }

    /// 指定环形缓冲区容量
    ///
    /// # Panics
    /// `capacity` 为零时 panic。
    pub fn with_capacity(capacity: usize, wait: Arc<dyn WaitQueue>) -> Self {
        assert!(capacity > 0, "stdin: zero-sized ring buffer");
        Self {
            ring: SpinLock::new(Ring::new(capacity)),
            wait,
        }
    }

    /// 送入一个输入字节（中断上下文调用），`'\0'` 被忽略
    ///
    /// 有读者在等待时以 [`WakeReason::Keyboard`] 唤醒全部读者。
    pub fn push(&self, c: u8) {
        if c == 0 {
            return;
        }
        let waiting = {
            let mut ring = self.ring.lock();
            ring.push(c);
            self.wait.has_waiters()
        };
        if waiting {
            self.wait.wake_up_all(WakeReason::Keyboard);
        }
    }

    /// 缓冲区中尚未读取的字节数
    pub fn available(&self) -> usize {
        let ring = self.ring.lock();
        (ring.wpos - ring.rpos) as usize
    }

    // 读满 iob；被无关原因唤醒时提前返回，已读的部分保留
    fn read(&self, iob: &mut IoBuf<'_>) -> FsResult<()> {
        let mut ring = self.ring.lock();
        while iob.resid() != 0 {
            if let Some(c) = ring.pop() {
                iob.copy_in(&[c])?;
                continue;
            }
            let token = self.wait.prepare_to_wait(WakeReason::Keyboard);
            drop(ring);
            self.wait.schedule();
            if self.wait.finish_wait(token) != Some(WakeReason::Keyboard) {
                return Ok(());
            }
            ring = self.ring.lock();
        }
        Ok(())
    }
}

impl Device for Stdin {
    fn blocks(&self) -> usize {
        0
    }

    fn block_size(&self) -> usize {
        1
    }

    fn open(&self, flags: OpenFlags) -> FsResult<()> {
        match flags.access_mode() {
            Some(AccessMode::ReadOnly) => Ok(()),
            _ => Err(FsError::InvalidArgument),
        }
    }

    fn close(&self) -> FsResult<()> {
        Ok(())
    }

    fn io(&self, iob: &mut IoBuf<'_>, write: bool) -> FsResult<()> {
        if write {
            return Err(FsError::InvalidArgument);
        }
        self.read(iob)
    }

    fn ioctl(&self, _op: u32, _data: usize) -> FsResult<()> {
        Err(FsError::NotSupported)
    }
}
