//! 文件分配表：每个数据块对应一个16位条目，条目里存着链表上下一个块的编号。
//!
//! 挂载时整张表读进内存，卸载时整张写回，
//! 期间的分配、追加、释放只改内存里的[`FatTable`]。

use alloc::vec;
use alloc::vec::Vec;
use core::mem;

use binrw::io::Cursor;
use binrw::{BinRead, BinWrite};
use block_dev::{BlockDevice, BLOCK_SIZE};

use crate::block::Block;
use crate::volume::codec_error;
use crate::volume::super_block::SuperBlock;
use crate::{BlockId, ChainError};

/// 一个块能容纳多少条FAT条目
const ENTRIES_PER_BLOCK: usize = BLOCK_SIZE / mem::size_of::<u16>();

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FatTable {
    /// 下标即数据块编号
    entries: Vec<BlockId>,
}

impl FatTable {
    /// 空表，0号条目保留为链尾。
    pub fn new(data_blocks: usize) -> Self {
        let mut entries = vec![BlockId::FREE; data_blocks];
        if let Some(reserved) = entries.first_mut() {
            *reserved = BlockId::EOC;
        }
        Self { entries }
    }

    pub fn load(dev: &dyn BlockDevice, sb: &SuperBlock) -> vfs::Result<Self> {
        let mut entries = Vec::with_capacity(sb.fat_blocks() * ENTRIES_PER_BLOCK);
        let mut block = Block::zeroed();

        for block_id in sb.fat_area() {
            block.load(dev, block_id)?;
            let mut cursor = Cursor::new(&block[..]);
            for _ in 0..ENTRIES_PER_BLOCK {
                entries.push(BlockId::read(&mut cursor).map_err(codec_error)?);
            }
        }
        // 最后一个FAT块的尾部不对应任何数据块
        entries.truncate(sb.data_blocks());

        Ok(Self { entries })
    }

    pub fn persist(&self, dev: &dyn BlockDevice, sb: &SuperBlock) -> vfs::Result<()> {
        let mut block = Block::zeroed();
        let mut entries = self.entries.iter();

        for block_id in sb.fat_area() {
            block.zeroize();
            {
                let mut cursor = Cursor::new(&mut block[..]);
                for entry in entries.by_ref().take(ENTRIES_PER_BLOCK) {
                    entry.write(&mut cursor).map_err(codec_error)?;
                }
            }
            block.store(dev, block_id)?;
        }

        Ok(())
    }

    /// 条目总数，即数据块总数
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 0号条目保留，不计入
    pub fn free_count(&self) -> usize {
        self.entries
            .iter()
            .skip(usize::from(BlockId::MIN))
            .filter(|&&entry| entry == BlockId::FREE)
            .count()
    }

    /// 获取下一个块编号。
    /// 若`id`指向未分配块，则报错。
    /// `Ok(None)`表示`id`为链表上最后一个块。
    pub fn next(&self, id: BlockId) -> Result<Option<BlockId>, ChainError> {
        let id = id.validate(self.len())?;

        match self.entries[usize::from(id)].validate(self.len()) {
            Ok(next) => Ok(Some(next)),
            Err(ChainError::Eoc) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// 同[`FatTable::next`]，但还要求下一个块自己的条目有效，
    /// 链接指向未分配块时报错。
    pub fn follow(&self, id: BlockId) -> Result<Option<BlockId>, ChainError> {
        let next = self.next(id)?;
        if let Some(next) = next {
            self.next(next)?;
        }
        Ok(next)
    }

    /// 从`first`开始遍历链表，`first`为[`BlockId::EOC`]时是空链表。
    pub fn chain(&self, first: BlockId) -> Chain<'_> {
        Chain {
            fat: self,
            next: (first != BlockId::EOC).then_some(first),
            steps: 0,
        }
    }

    /// 寻找未分配的块，按编号从小到大，找到后标为链尾。
    pub fn alloc_block(&mut self) -> vfs::Result<BlockId> {
        let min = usize::from(BlockId::MIN);
        let index = self
            .entries
            .iter()
            .skip(min)
            .position(|&entry| entry == BlockId::FREE)
            .map(|index| index + min)
            .ok_or(vfs::Error::DiskFull)?;

        self.entries[index] = BlockId::EOC;
        log::debug!("alloc block {index}");

        Ok(BlockId::new(index as u16))
    }

    /// 在链尾`tail`后面接上一个新块，返回新块的编号。
    pub fn append_block(&mut self, tail: BlockId) -> vfs::Result<BlockId> {
        let tail = tail.validate(self.len())?;
        if self.entries[usize::from(tail)] != BlockId::EOC {
            log::error!("Block {tail:?} isn't the tail of its chain");
            return Err(vfs::Error::CorruptChain);
        }

        let new = self.alloc_block()?;
        self.entries[usize::from(tail)] = new;

        Ok(new)
    }

    /// 撤销一次分配：`block`重新标为空闲，`prev`（若有）重新成为链尾。
    pub fn unlink_last(&mut self, prev: Option<BlockId>, block: BlockId) {
        if let Some(prev) = prev {
            self.entries[usize::from(prev)] = BlockId::EOC;
        }
        self.entries[usize::from(block)] = BlockId::FREE;
        log::debug!("unlink block {block:?} after {prev:?}");
    }

    /// 移除整个块链表，返回释放的块数。
    ///
    /// 先完整校验链表再动手，链表损坏时一个块也不释放。
    pub fn free_chain(&mut self, first: BlockId) -> vfs::Result<usize> {
        let blocks = self.chain(first).collect::<Result<Vec<_>, _>>()?;
        for &id in &blocks {
            self.entries[usize::from(id)] = BlockId::FREE;
        }
        log::debug!("free {} blocks from {first:?}", blocks.len());

        Ok(blocks.len())
    }

    /// 链表上第`n`个块（0起）。
    pub fn nth_block(&self, first: BlockId, n: usize) -> vfs::Result<BlockId> {
        match self.chain(first).nth(n) {
            Some(id) => Ok(id?),
            None => {
                log::error!("Chain from {first:?} ends before block #{n}");
                Err(vfs::Error::CorruptChain)
            }
        }
    }

    /// 链表的块数
    pub fn chain_len(&self, first: BlockId) -> vfs::Result<usize> {
        self.chain(first).try_fold(0, |len, id| id.map(|_| len + 1).map_err(Into::into))
    }

    /// 链表的最后一个块，空链表返回空
    pub fn last_block(&self, first: BlockId) -> vfs::Result<Option<BlockId>> {
        self.chain(first)
            .try_fold(None, |_, id| id.map(Some).map_err(Into::into))
    }
}

/// 块链表的迭代器，遇到损坏的链表时产出一次错误后结束。
#[derive(Debug)]
pub struct Chain<'a> {
    fat: &'a FatTable,
    next: Option<BlockId>,
    steps: usize,
}

impl Iterator for Chain<'_> {
    type Item = Result<BlockId, ChainError>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next.take()?;

        if self.steps == self.fat.len() {
            return Some(Err(ChainError::Cycle));
        }
        self.steps += 1;
        log::trace!("chain step {} -> {id:?}", self.steps);

        match self.fat.next(id) {
            Ok(next) => {
                self.next = next;
                Some(Ok(id))
            }
            Err(e) => Some(Err(e)),
        }
    }
}
