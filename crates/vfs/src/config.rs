//! VFS 编译期配置

/// 设备名最大长度
pub const FS_MAX_DNAME_LEN: usize = 31;

/// 文件名最大长度（不含结尾 NUL）
pub use uapi::dirent::FS_MAX_FNAME_LEN;

/// 每个进程的文件描述符槽位数
pub const FILES_STRUCT_NENTRY: usize = 256;

/// 引用计数/打开计数的防御性上限，超过即视为计数损坏
pub const MAX_INODE_COUNT: usize = 0x10000;

/// inode 操作表的魔数，每次分发前校验
pub const VOP_MAGIC: u32 = 0x8c4b_a476;
