use core::mem;
use core::ops::Range;

use binrw::io::Cursor;
use binrw::{BinRead, BinWrite};

use crate::volume::codec_error;
use crate::BLOCK_SIZE;

/// 超级块：
/// - 提供文件系统合法性校验；
/// - 定位其它连续区域
///
/// 位于0号块，块内剩余部分皆填0。
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little, magic = b"ECS150FS")]
pub struct SuperBlock {
    /// 虚拟磁盘的总块数
    total_blocks: u16,
    /// 根目录所在块
    root_block: u16,
    /// 数据区的起始块
    data_start: u16,
    /// 数据块数量
    data_blocks: u16,
    /// FAT占用块数
    fat_blocks: u8,
}

impl SuperBlock {
    pub const SIGNATURE: &'static [u8; 8] = b"ECS150FS";

    /// 为`total_blocks`个块的磁盘规划布局。
    ///
    /// 选取能覆盖整个数据区的最少FAT块数；
    /// 块数超出16位编号范围、容不下一个数据块或凑不出自洽的布局时返回空。
    pub fn new(total_blocks: usize) -> Option<Self> {
        if !(4..=u16::MAX as usize).contains(&total_blocks) {
            return None;
        }

        let mut fat_blocks = 1;
        let data_blocks = loop {
            let data_blocks = total_blocks - 2 - fat_blocks;
            if fat_blocks_for(data_blocks) <= fat_blocks {
                break data_blocks;
            }
            fat_blocks += 1;
        };
        // NOTE: 少一个数据块就可能少一个FAT块，此时布局无法自洽
        if fat_blocks_for(data_blocks) != fat_blocks {
            return None;
        }

        let root_block = 1 + fat_blocks;
        Some(Self {
            total_blocks: total_blocks as u16,
            root_block: root_block as u16,
            data_start: (root_block + 1) as u16,
            data_blocks: data_blocks as u16,
            fat_blocks: fat_blocks as u8,
        })
    }

    pub fn decode(block: &[u8]) -> vfs::Result<Self> {
        Self::read(&mut Cursor::new(block)).map_err(|e| {
            log::warn!("Unrecognized superblock: {e}");
            vfs::Error::InvalidImage
        })
    }

    pub fn encode(&self, block: &mut [u8]) -> vfs::Result<()> {
        block.fill(0);
        self.write(&mut Cursor::new(block)).map_err(codec_error)
    }

    /// 校验布局字段之间、以及与设备实际块数之间的关系
    pub fn validate(&self, device_blocks: usize) -> vfs::Result<()> {
        let checks = [
            (self.total_blocks() == device_blocks, "total block count"),
            (self.fat_blocks() == fat_blocks_for(self.data_blocks()), "FAT block count"),
            (self.root_block() == 1 + self.fat_blocks(), "root directory index"),
            (self.data_start() == self.root_block() + 1, "data region index"),
            (
                self.total_blocks().checked_sub(self.data_start()) == Some(self.data_blocks()),
                "data block count",
            ),
        ];

        match checks.iter().find(|(ok, _)| !ok) {
            Some((_, field)) => {
                log::warn!(
                    "Superblock mismatch on {field}: {:?}, device has {device_blocks} blocks",
                    self
                );
                Err(vfs::Error::InvalidImage)
            }
            None => Ok(()),
        }
    }

    pub const fn total_blocks(&self) -> usize {
        self.total_blocks as usize
    }

    pub const fn fat_blocks(&self) -> usize {
        self.fat_blocks as usize
    }

    pub const fn root_block(&self) -> usize {
        self.root_block as usize
    }

    pub const fn data_start(&self) -> usize {
        self.data_start as usize
    }

    pub const fn data_blocks(&self) -> usize {
        self.data_blocks as usize
    }

    /// FAT区占据的块
    pub const fn fat_area(&self) -> Range<usize> {
        1..1 + self.fat_blocks as usize
    }

    /// 数据块编号对应的设备块号
    pub const fn data_block(&self, index: usize) -> usize {
        self.data_start as usize + index
    }
}

/// 容纳`data_blocks`个FAT条目所需的块数
pub const fn fat_blocks_for(data_blocks: usize) -> usize {
    (data_blocks * mem::size_of::<u16>()).div_ceil(BLOCK_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometry() {
        let sb = SuperBlock::new(8198).unwrap();
        assert_eq!(sb.fat_blocks(), 4);
        assert_eq!(sb.root_block(), 5);
        assert_eq!(sb.data_start(), 6);
        assert_eq!(sb.data_blocks(), 8192);
        assert_eq!(sb.fat_area(), 1..5);
        sb.validate(8198).unwrap();

        let sb = SuperBlock::new(4).unwrap();
        assert_eq!((sb.fat_blocks(), sb.data_blocks()), (1, 1));
    }

    #[test]
    fn unsupported_sizes() {
        assert!(SuperBlock::new(3).is_none());
        assert!(SuperBlock::new(70000).is_none());
        // 2049个数据块要2个FAT块，2个FAT块又只剩2048个数据块
        assert!(SuperBlock::new(2052).is_none());
    }

    #[test]
    fn round_trip_through_block() {
        let sb = SuperBlock::new(100).unwrap();
        let mut block = [0xFF; BLOCK_SIZE];
        sb.encode(&mut block).unwrap();

        assert_eq!(&block[..8], SuperBlock::SIGNATURE);
        assert_eq!(&block[8..10], &100u16.to_le_bytes());
        assert!(block[17..].iter().all(|&b| b == 0));
        assert_eq!(SuperBlock::decode(&block).unwrap(), sb);
    }

    #[test]
    fn rejects_bad_signature() {
        let mut block = [0; BLOCK_SIZE];
        SuperBlock::new(100).unwrap().encode(&mut block).unwrap();
        block[0] = b'X';
        assert_eq!(SuperBlock::decode(&block), Err(vfs::Error::InvalidImage));
    }

    #[test]
    fn rejects_inconsistent_geometry() {
        let sb = SuperBlock::new(100).unwrap();
        assert_eq!(sb.validate(101), Err(vfs::Error::InvalidImage));

        let mut broken = sb.clone();
        broken.data_blocks -= 1;
        assert_eq!(broken.validate(100), Err(vfs::Error::InvalidImage));

        let mut broken = sb.clone();
        broken.root_block += 1;
        broken.data_start += 1;
        assert_eq!(broken.validate(100), Err(vfs::Error::InvalidImage));

        let mut broken = sb;
        broken.fat_blocks = 2;
        assert_eq!(broken.validate(100), Err(vfs::Error::InvalidImage));
    }
}
