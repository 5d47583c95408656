//! # 块设备接口层
//!
//! 块设备是以**块**为单位存储数据的设备，
//! [`BlockDevice`] 就是对读写块设备的抽象，
//! 实现了此特质的类型称为**块设备驱动**。
//!
//! 文件系统只通过块设备驱动读写块设备，每次读写恰好一整块。

#![no_std]

extern crate alloc;

mod ram;

use core::any::Any;
use core::fmt::Debug;

use derive_more::Display;

pub use self::ram::RamDisk;

/// 块大小，读写缓冲区的长度必须与之相等
pub const BLOCK_SIZE: usize = 4096;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[display(fmt = "block {} is out of range", _0)]
    OutOfRange(usize),
    #[display(fmt = "buffer of {} bytes isn't a whole block", _0)]
    BadBuffer(usize),
    #[display(fmt = "device failure")]
    Device,
}

/// 块设备驱动特质
pub trait BlockDevice: Send + Sync + Any + Debug {
    /// 设备上的总块数
    fn block_count(&self) -> usize;
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), Error>;
    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), Error>;
}

/// 检查读写请求是否落在设备范围内、缓冲区是否为整块
pub fn check_request(block_id: usize, block_count: usize, buf_len: usize) -> Result<(), Error> {
    if block_id >= block_count {
        return Err(Error::OutOfRange(block_id));
    }
    if buf_len != BLOCK_SIZE {
        return Err(Error::BadBuffer(buf_len));
    }
    Ok(())
}
