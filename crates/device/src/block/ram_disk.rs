//! 内存模拟块设备

use super::BlockDriver;
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use sync::SpinLock;

/// 内存模拟的块设备
///
/// 用于测试和开发
pub struct RamDisk {
    data: SpinLock<Vec<u8>>,
    block_size: usize,
    device_id: usize,
}

impl RamDisk {
    /// 创建指定大小的内存磁盘
    pub fn new(size: usize, block_size: usize, device_id: usize) -> Arc<Self> {
        Self::from_bytes(vec![0u8; size], block_size, device_id)
    }

    /// 从字节数组创建
    pub fn from_bytes(data: Vec<u8>, block_size: usize, device_id: usize) -> Arc<Self> {
        Arc::new(Self {
            data: SpinLock::new(data),
            block_size,
            device_id,
        })
    }

    /// 获取原始数据（用于调试）
    pub fn raw_data(&self) -> Vec<u8> {
        self.data.lock().clone()
    }

    /// 获取设备 ID
    pub fn device_id(&self) -> usize {
        self.device_id
    }

    fn range(&self, block_id: usize, len: usize, total: usize) -> Option<core::ops::Range<usize>> {
        if len != self.block_size {
            return None;
        }
        let start = block_id.checked_mul(self.block_size)?;
        let end = start.checked_add(self.block_size)?;
        (end <= total).then_some(start..end)
    }
}

impl BlockDriver for RamDisk {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> bool {
        let data = self.data.lock();
        match self.range(block_id, buf.len(), data.len()) {
            Some(range) => {
                buf.copy_from_slice(&data[range]);
                true
            }
            None => false,
        }
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> bool {
        let mut data = self.data.lock();
        let total = data.len();
        match self.range(block_id, buf.len(), total) {
            Some(range) => {
                data[range].copy_from_slice(buf);
                true
            }
            None => false,
        }
    }

    fn flush(&self) -> bool {
        true // 内存设备无需 flush
    }

    fn block_size(&self) -> usize {
        self.block_size
    }

    fn total_blocks(&self) -> usize {
        self.data.lock().len() / self.block_size
    }
}
