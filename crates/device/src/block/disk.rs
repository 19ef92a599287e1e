//! 磁盘设备
//!
//! 以 [`DISK0_BLKSIZE`] 为块大小，把 VFS 的块读写翻译成底层驱动的扇区读写。
//! 所有传输都经过一块几个块宽的暂存缓冲区，缓冲区由锁保护，
//! 同一时刻只有一次传输在进行。

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec;

use log::debug;
use sync::SpinLock;
use uapi::fcntl::OpenFlags;
use vfs::{Device, FsError, FsResult, IoBuf};

use super::BlockDriver;
use crate::config::{DISK0_BLK_NSECT, DISK0_BLKSIZE, DISK0_BUFSIZE, SECTOR_SIZE};

/// 磁盘设备
pub struct Disk {
    driver: Arc<dyn BlockDriver>,
    blocks: usize,
    buf: SpinLock<Box<[u8]>>,
}

impl Disk {
    /// 包装一个扇区大小为 [`SECTOR_SIZE`] 的原始驱动
    ///
    /// 扇区大小不符返回 [`FsError::InvalidArgument`]，容量不足一块返回 [`FsError::NoDevice`]。
    pub fn new(driver: Arc<dyn BlockDriver>) -> FsResult<Self> {
        if driver.block_size() != SECTOR_SIZE {
            return Err(FsError::InvalidArgument);
        }
        let blocks = driver.total_blocks() / DISK0_BLK_NSECT;
        if blocks == 0 {
            return Err(FsError::NoDevice);
        }
        debug!("disk: {} blocks of {} bytes.", blocks, DISK0_BLKSIZE);
        Ok(Self {
            driver,
            blocks,
            buf: SpinLock::new(vec![0u8; DISK0_BUFSIZE].into_boxed_slice()),
        })
    }

    fn read_blks(&self, buf: &mut [u8], blkno: usize, nblks: usize) {
        let first = blkno * DISK0_BLK_NSECT;
        let sectors = buf[..nblks * DISK0_BLKSIZE].chunks_exact_mut(SECTOR_SIZE);
        for (sectno, sector) in (first..).zip(sectors) {
            if !self.driver.read_block(sectno, sector) {
                panic!(
                    "disk: read blkno = {}, nblks = {}, sectno = {} failed",
                    blkno, nblks, sectno
                );
            }
        }
    }

    fn write_blks(&self, buf: &[u8], blkno: usize, nblks: usize) {
        let first = blkno * DISK0_BLK_NSECT;
        let sectors = buf[..nblks * DISK0_BLKSIZE].chunks_exact(SECTOR_SIZE);
        for (sectno, sector) in (first..).zip(sectors) {
            if !self.driver.write_block(sectno, sector) {
                panic!(
                    "disk: write blkno = {}, nblks = {}, sectno = {} failed",
                    blkno, nblks, sectno
                );
            }
        }
    }
}

impl Device for Disk {
    fn blocks(&self) -> usize {
        self.blocks
    }

    fn block_size(&self) -> usize {
        DISK0_BLKSIZE
    }

    fn open(&self, _flags: OpenFlags) -> FsResult<()> {
        Ok(())
    }

    fn close(&self) -> FsResult<()> {
        if self.driver.flush() {
            Ok(())
        } else {
            Err(FsError::IoError)
        }
    }

    fn io(&self, iob: &mut IoBuf<'_>, write: bool) -> FsResult<()> {
        let offset = iob.offset();
        let resid = iob.resid();
        if offset % DISK0_BLKSIZE as u64 != 0 || resid % DISK0_BLKSIZE != 0 {
            return Err(FsError::InvalidArgument);
        }
        let blkno = offset / DISK0_BLKSIZE as u64;
        let nblks = resid / DISK0_BLKSIZE;
        if blkno > self.blocks as u64 || nblks > self.blocks - blkno as usize {
            return Err(FsError::InvalidArgument);
        }
        if nblks == 0 {
            return Ok(());
        }

        let mut blkno = blkno as usize;
        let mut buf = self.buf.lock();
        while iob.resid() != 0 {
            let alen = iob.resid().min(DISK0_BUFSIZE);
            let n = alen / DISK0_BLKSIZE;
            if write {
                iob.copy_out(&mut buf[..alen])?;
                self.write_blks(&buf, blkno, n);
            } else {
                self.read_blks(&mut buf, blkno, n);
                iob.copy_in(&buf[..alen])?;
            }
            blkno += n;
        }
        Ok(())
    }

    fn ioctl(&self, _op: u32, _data: usize) -> FsResult<()> {
        Err(FsError::NotImplemented)
    }
}
