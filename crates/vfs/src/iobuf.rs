//! I/O 缓冲区
//!
//! [`IoBuf`] 是 VFS 中所有读写路径共用的传输游标：它包住调用者的一段内存，
//! 同时记录对应的文件逻辑偏移和剩余可传输字节数。
//! 每次传输都在一次调用内同时推进内存位置、偏移并扣减剩余量。

use crate::{FsError, FsResult};

enum Base<'a> {
    /// 读路径：节点把数据写入调用者的缓冲区
    Sink(&'a mut [u8]),
    /// 写路径：节点从调用者的缓冲区取数据
    Source(&'a [u8]),
}

/// I/O 缓冲区游标
///
/// 不变式：`resid <= len`，`used() == len - resid`。
pub struct IoBuf<'a> {
    base: Base<'a>,
    offset: u64,
    len: usize,
    resid: usize,
}

impl<'a> IoBuf<'a> {
    /// 为读操作构造：数据将被搬入 `buf`
    pub fn for_read(buf: &'a mut [u8], offset: u64) -> Self {
        let len = buf.len();
        Self {
            base: Base::Sink(buf),
            offset,
            len,
            resid: len,
        }
    }

    /// 为写操作构造：数据将从 `buf` 取出
    pub fn for_write(buf: &'a [u8], offset: u64) -> Self {
        let len = buf.len();
        Self {
            base: Base::Source(buf),
            offset,
            len,
            resid: len,
        }
    }
}

impl IoBuf<'_> {
    /// 当前逻辑偏移
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// 构造时的总长度
    pub fn len(&self) -> usize {
        self.len
    }

    /// 构造时长度是否为零
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// 剩余可传输字节数
    pub fn resid(&self) -> usize {
        self.resid
    }

    /// 已传输字节数
    pub fn used(&self) -> usize {
        self.len - self.resid
    }

    /// 缓冲区是否支持搬入数据（即是否为读路径）
    pub fn is_sink(&self) -> bool {
        matches!(self.base, Base::Sink(_))
    }

    /// 跳过 `n` 字节：推进位置和偏移，扣减剩余量。
    ///
    /// # Panics
    /// `n` 超过剩余量时 panic。
    pub fn skip(&mut self, n: usize) {
        assert!(
            n <= self.resid,
            "iobuf: skip {} bytes with only {} remaining",
            n,
            self.resid
        );
        self.offset += n as u64;
        self.resid -= n;
    }

    /// 把 `data` 搬入缓冲区（数据 → 调用者内存）。
    ///
    /// 搬运 `min(resid, data.len())` 字节；若不能全部搬完，
    /// 已搬的部分仍然生效并返回 [`FsError::OutOfMemory`]。
    pub fn copy_in(&mut self, data: &[u8]) -> FsResult<()> {
        let pos = self.used();
        let alen = self.resid.min(data.len());
        match &mut self.base {
            Base::Sink(buf) => buf[pos..pos + alen].copy_from_slice(&data[..alen]),
            Base::Source(_) => return Err(FsError::InvalidArgument),
        }
        self.skip(alen);
        if alen == data.len() {
            Ok(())
        } else {
            Err(FsError::OutOfMemory)
        }
    }

    /// 从缓冲区搬出数据到 `out`（调用者内存 → 数据）。
    ///
    /// 语义与 [`IoBuf::copy_in`] 对称。
    pub fn copy_out(&mut self, out: &mut [u8]) -> FsResult<()> {
        let alen = self.resid.min(out.len());
        out[..alen].copy_from_slice(&self.chunk()[..alen]);
        self.skip(alen);
        if alen == out.len() {
            Ok(())
        } else {
            Err(FsError::OutOfMemory)
        }
    }

    /// 向缓冲区填充至多 `len` 个零字节，语义与 [`IoBuf::copy_in`] 相同。
    pub fn fill_zeros(&mut self, len: usize) -> FsResult<()> {
        let pos = self.used();
        let alen = self.resid.min(len);
        match &mut self.base {
            Base::Sink(buf) => buf[pos..pos + alen].fill(0),
            Base::Source(_) => return Err(FsError::InvalidArgument),
        }
        self.skip(alen);
        if alen == len {
            Ok(())
        } else {
            Err(FsError::OutOfMemory)
        }
    }

    /// 尚未传输的那段内存
    pub fn chunk(&self) -> &[u8] {
        let pos = self.used();
        match &self.base {
            Base::Sink(buf) => &buf[pos..pos + self.resid],
            Base::Source(buf) => &buf[pos..pos + self.resid],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_in_advances_offset_and_resid() {
        let mut mem = [0u8; 8];
        let mut iob = IoBuf::for_read(&mut mem, 100);
        iob.copy_in(b"abc").unwrap();
        assert_eq!(iob.offset(), 103);
        assert_eq!(iob.resid(), 5);
        assert_eq!(iob.used(), 3);
        iob.copy_in(b"de").unwrap();
        assert_eq!(iob.used(), 5);
        drop(iob);
        assert_eq!(&mem[..5], b"abcde");
    }

    #[test]
    fn test_partial_copy_reports_out_of_memory() {
        let mut mem = [0u8; 4];
        let mut iob = IoBuf::for_read(&mut mem, 0);
        assert_eq!(iob.copy_in(b"123456"), Err(FsError::OutOfMemory));
        assert_eq!(iob.resid(), 0);
        assert_eq!(iob.used(), 4);
        // 已经满了，再搬入空数据不算失败
        assert_eq!(iob.copy_in(b""), Ok(()));
        drop(iob);
        assert_eq!(&mem, b"1234");
    }

    #[test]
    fn test_copy_out_from_source() {
        let src = *b"hello world";
        let mut iob = IoBuf::for_write(&src, 0);
        let mut out = [0u8; 5];
        iob.copy_out(&mut out).unwrap();
        assert_eq!(&out, b"hello");
        assert_eq!(iob.chunk(), b" world");
        iob.skip(1);
        let mut rest = [0u8; 8];
        assert_eq!(iob.copy_out(&mut rest), Err(FsError::OutOfMemory));
        assert_eq!(&rest[..5], b"world");
        assert_eq!(iob.resid(), 0);
    }

    #[test]
    fn test_copy_in_rejected_on_source() {
        let src = [1u8; 4];
        let mut iob = IoBuf::for_write(&src, 0);
        assert_eq!(iob.copy_in(b"x"), Err(FsError::InvalidArgument));
        assert_eq!(iob.fill_zeros(1), Err(FsError::InvalidArgument));
        assert_eq!(iob.resid(), 4);
    }

    #[test]
    fn test_fill_zeros() {
        let mut mem = [0xffu8; 6];
        let mut iob = IoBuf::for_read(&mut mem, 0);
        iob.skip(2);
        iob.fill_zeros(3).unwrap();
        assert_eq!(iob.fill_zeros(3), Err(FsError::OutOfMemory));
        drop(iob);
        assert_eq!(mem, [0xff, 0xff, 0, 0, 0, 0]);
    }

    #[test]
    #[should_panic]
    fn test_skip_past_end_panics() {
        let mut mem = [0u8; 2];
        let mut iob = IoBuf::for_read(&mut mem, 0);
        iob.skip(3);
    }
}
