//! 块设备模块
//!
//! [`BlockDriver`] 是扇区级的原始驱动接口；[`Disk`] 在它之上实现
//! VFS 的块设备，[`RamDisk`] 是内存模拟的原始驱动。

mod disk;
mod ram_disk;

pub use disk::Disk;
pub use ram_disk::RamDisk;

/// 块设备驱动程序接口
pub trait BlockDriver: Send + Sync {
    /// 读取块设备数据
    /// # 参数：
    /// * `block_id` - 块设备的块号
    /// * `buf` - 用于存储读取数据的缓冲区
    /// # 返回值：
    /// 如果读取成功则返回 true，否则返回 false
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> bool;

    /// 写入块设备数据
    /// # 参数：
    /// * `block_id` - 块设备的块号
    /// * `buf` - 包含要写入数据的缓冲区
    /// # 返回值：
    /// 如果写入成功则返回 true，否则返回 false
    fn write_block(&self, block_id: usize, buf: &[u8]) -> bool;

    /// 刷新到磁盘
    /// # 返回值：
    /// 如果刷新成功则返回 true，否则返回 false
    fn flush(&self) -> bool;

    /// 获取块大小（字节）
    fn block_size(&self) -> usize;

    /// 获取总块数
    fn total_blocks(&self) -> usize;
}
