//! 读写引擎：把文件内的字节区间映射到块链表上。
//!
//! 每次只经过暂存块读写一个整块；
//! 写入不满一块时先读出旧内容再覆盖，保住块内其余字节。

use block_dev::BLOCK_SIZE;

use crate::{BlockId, FileSystem};

/// 已有进展时吞下错误、返回短计数，错误留给下一次调用
fn settle(done: usize, e: vfs::Error) -> vfs::Result<usize> {
    if done > 0 {
        log::warn!("stopped after {done} bytes: {e}");
        Ok(done)
    } else {
        Err(e)
    }
}

impl FileSystem {
    /// 从`offset`处读取，最多读到文件末尾，返回读取的字节数。
    pub(crate) fn read_at(
        &mut self,
        slot: usize,
        offset: usize,
        buf: &mut [u8],
    ) -> vfs::Result<usize> {
        let entry = *self.root.entry(slot);

        let start = offset;
        let end = (start + buf.len()).min(entry.size()); // exclusive
        if start >= end {
            return Ok(0);
        }

        let mut block_id = self.fat.nth_block(entry.first_block(), start / BLOCK_SIZE)?;
        let mut read_size = 0;
        loop {
            let pos = start + read_size;
            let inblock = pos % BLOCK_SIZE;
            let block_read_size = (BLOCK_SIZE - inblock).min(end - pos);

            let device_block = self.sb.data_block(block_id.into());
            if let Err(e) = self.scratch.load(&*self.dev, device_block) {
                return settle(read_size, e);
            }
            buf[read_size..read_size + block_read_size]
                .copy_from_slice(&self.scratch[inblock..inblock + block_read_size]);
            read_size += block_read_size;

            if start + read_size == end {
                break;
            }
            block_id = match self.fat.follow(block_id) {
                Ok(Some(next)) => next,
                Ok(None) => {
                    log::error!("Chain of slot {slot} is shorter than its size");
                    return settle(read_size, vfs::Error::CorruptChain);
                }
                Err(e) => return settle(read_size, e.into()),
            };
        }

        Ok(read_size)
    }

    /// 随机写入，必要时在链尾追加新块，对于空文件会先分配起始块。
    /// 返回写入的字节数，空间耗尽时可能少于`buf.len()`。
    pub(crate) fn write_at(
        &mut self,
        slot: usize,
        offset: usize,
        buf: &[u8],
    ) -> vfs::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let start = offset;
        let end = start + buf.len(); // exclusive

        let (mut block_id, mut origin) = self.block_for_write(slot, start / BLOCK_SIZE)?;
        let mut wrote_size = 0;
        loop {
            let pos = start + wrote_size;
            let inblock = pos % BLOCK_SIZE;
            let block_write_size = (BLOCK_SIZE - inblock).min(end - pos);

            let device_block = self.sb.data_block(block_id.into());
            if block_write_size < BLOCK_SIZE {
                if origin.is_fresh() {
                    self.scratch.zeroize();
                } else if let Err(e) = self.scratch.load(&*self.dev, device_block) {
                    return settle(wrote_size, e);
                }
            }
            self.scratch[inblock..inblock + block_write_size]
                .copy_from_slice(&buf[wrote_size..wrote_size + block_write_size]);
            if let Err(e) = self.scratch.store(&*self.dev, device_block) {
                self.undo_alloc(slot, block_id, origin);
                return settle(wrote_size, e);
            }
            wrote_size += block_write_size;

            // 块落盘之后才扩大文件
            let entry = self.root.entry_mut(slot);
            if start + wrote_size > entry.size() {
                entry.resize(start + wrote_size);
            }

            if start + wrote_size == end {
                break;
            }
            (block_id, origin) = match self.next_block_for_write(block_id) {
                Ok(next) => next,
                Err(e) => return settle(wrote_size, e),
            };
        }

        Ok(wrote_size)
    }
}

/// 写入的块从何而来
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    /// 链表上原有的块
    Chained,
    /// 空文件新分配的起始块
    First,
    /// 新追加在该块之后
    Appended(BlockId),
}

impl Origin {
    #[inline]
    fn is_fresh(self) -> bool {
        self != Origin::Chained
    }
}

impl FileSystem {
    /// 找到链表上第`nth`个块，恰好缺这一块时就地追加。
    fn block_for_write(&mut self, slot: usize, nth: usize) -> vfs::Result<(BlockId, Origin)> {
        let first = self.root.entry(slot).first_block();

        if first == BlockId::EOC {
            /* 空文件 */
            if nth > 0 {
                log::error!("Slot {slot} has no blocks but a write starts at block #{nth}");
                return Err(vfs::Error::CorruptChain);
            }
            let id = self.fat.alloc_block()?;
            self.root.entry_mut(slot).set_first_block(id);
            return Ok((id, Origin::First));
        }

        match nth {
            0 => Ok((self.fat.nth_block(first, 0)?, Origin::Chained)),
            _ => {
                let prev = self.fat.nth_block(first, nth - 1)?;
                self.next_block_for_write(prev)
            }
        }
    }

    fn next_block_for_write(&mut self, current: BlockId) -> vfs::Result<(BlockId, Origin)> {
        match self.fat.follow(current)? {
            Some(next) => Ok((next, Origin::Chained)),
            None => Ok((self.fat.append_block(current)?, Origin::Appended(current))),
        }
    }

    /// 新块没能落盘，把它从链表上摘下来
    fn undo_alloc(&mut self, slot: usize, block_id: BlockId, origin: Origin) {
        match origin {
            Origin::Chained => {}
            Origin::First => {
                self.fat.unlink_last(None, block_id);
                self.root.entry_mut(slot).set_first_block(BlockId::EOC);
            }
            Origin::Appended(prev) => self.fat.unlink_last(Some(prev), block_id),
        }
    }
}
