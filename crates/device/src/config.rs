//! 设备常量

/// 底层扇区大小
pub const SECTOR_SIZE: usize = 512;

/// 磁盘设备的块大小
pub const DISK0_BLKSIZE: usize = 4096;

/// 磁盘暂存缓冲区大小，一次循环最多搬运这么多字节
pub const DISK0_BUFSIZE: usize = 4 * DISK0_BLKSIZE;

/// 每块包含的扇区数
pub const DISK0_BLK_NSECT: usize = DISK0_BLKSIZE / SECTOR_SIZE;

/// 标准输入环形缓冲区容量
pub const STDIN_BUFSIZE: usize = 4096;
