//! 卷的布局
//!
//! 超级块 | FAT区 | 根目录 | 数据区
//!
//! 所有多字节整数都按小端序存放。

pub mod fat;
pub mod root_dir;
pub mod super_block;

/// 在整块缓冲区上编解码只会因为越界而失败，出现即说明布局被破坏。
fn codec_error(e: binrw::Error) -> vfs::Error {
    log::error!("Metadata codec failed: {e}");
    vfs::Error::InvalidImage
}
