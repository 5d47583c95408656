#![no_std]

extern crate alloc;

/* ecs-fs 的整体架构，自上而下 */

// 会话层：挂载、卸载、文件系统信息
mod control;
pub use control::{FileSystem, FsInfo, Session};

// 文件接口层：创建、删除、打开、读写等
mod ops;

// 读写引擎：字节区间与块链表之间的转换
mod file;

// 打开文件表
mod fd;
pub use fd::Fd;

// 磁盘数据结构层：超级块 | FAT | 根目录 | 数据区
pub mod volume;

// 块编号与块缓冲
mod block;
pub use block::{BlockId, ChainError};

pub use block_dev::BLOCK_SIZE;

/// 根目录的槽位数
pub const MAX_FILES: usize = 128;

/// 同时打开的文件数上限
pub const MAX_OPEN_FILES: usize = 32;

/// 文件名字段的宽度，包含结尾的NUL
pub const FILENAME_LEN: usize = 16;
