//! 控制台设备
//!
//! [`Stdin`] 和 [`Stdout`] 是挂在设备表 `stdin`、`stdout` 下的两个字符设备。

mod stdin;
mod stdout;

pub use stdin::Stdin;
pub use stdout::Stdout;

/// 控制台输出接口
pub trait Console: Send + Sync {
    /// 输出一个字节
    fn put_char(&self, c: u8);
}
