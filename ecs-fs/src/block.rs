use alloc::boxed::Box;
use alloc::vec;
use core::ops::{Deref, DerefMut};

use binrw::{BinRead, BinWrite};
use block_dev::{BlockDevice, BLOCK_SIZE};
use derive_more::{From, Into};

/// 数据块编号，以数据区起点为0。
///
/// FAT条目存放的也是这种编号：`0`表示块未分配，`0xFFFF`表示链表结束，
/// 所以0号块永远不可能被链表引用，分配器从[`BlockId::MIN`]开始找。
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, From, Into, BinRead, BinWrite,
)]
#[brw(little)]
#[repr(transparent)]
pub struct BlockId(u16);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainError {
    Free,
    Eoc,
    OutOfRange,
    /// 走过的块数超过了数据块总数
    Cycle,
}

impl From<BlockId> for usize {
    fn from(id: BlockId) -> Self {
        id.0 as usize
    }
}

impl From<ChainError> for vfs::Error {
    fn from(e: ChainError) -> Self {
        log::error!("Broken chain: {e:?}");
        vfs::Error::CorruptChain
    }
}

impl BlockId {
    pub const FREE: Self = Self(0);

    /// 最小的可分配块号
    pub const MIN: Self = Self(1);

    pub const EOC: Self = Self(0xFFFF);

    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    /// 检查编号是否指向一个真实的数据块
    pub fn validate(self, data_blocks: usize) -> Result<Self, ChainError> {
        match self {
            BlockId::FREE => Err(ChainError::Free),
            BlockId::EOC => Err(ChainError::Eoc),
            id if usize::from(id) >= data_blocks => Err(ChainError::OutOfRange),
            id => Ok(id),
        }
    }
}

/// 内存中的一个整块，读写引擎拿它当暂存区
#[derive(Debug, Clone)]
pub struct Block {
    data: Box<[u8]>,
}

impl Block {
    pub fn zeroed() -> Self {
        Self {
            data: vec![0; BLOCK_SIZE].into(),
        }
    }

    pub fn load(&mut self, dev: &dyn BlockDevice, block_id: usize) -> vfs::Result<()> {
        log::trace!("load block {block_id}");
        Ok(dev.read_block(block_id, &mut self.data)?)
    }

    pub fn store(&self, dev: &dyn BlockDevice, block_id: usize) -> vfs::Result<()> {
        log::trace!("store block {block_id}");
        Ok(dev.write_block(block_id, &self.data)?)
    }

    #[inline]
    pub fn zeroize(&mut self) {
        self.data.fill(0);
    }
}

impl Deref for Block {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

impl DerefMut for Block {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.data
    }
}
