//! 根目录：占一个块，[`MAX_FILES`]个定长目录项，平铺的命名空间。

use alloc::borrow::Cow;
use alloc::string::String;

use binrw::io::Cursor;
use binrw::{BinRead, BinWrite};
use block_dev::BlockDevice;

use crate::block::Block;
use crate::volume::codec_error;
use crate::volume::super_block::SuperBlock;
use crate::{BlockId, FILENAME_LEN, MAX_FILES};

/// 文件的元信息，恒为32字节
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct DirEntry {
    /// NUL结尾，首字节为0表示空槽
    name: [u8; FILENAME_LEN],
    /// 文件大小（字节）
    size: u32,
    /// 首个数据块，空文件为[`BlockId::EOC`]
    #[brw(pad_after = 10)]
    first_block: BlockId,
}

impl DirEntry {
    pub const EMPTY: Self = Self {
        name: [0; FILENAME_LEN],
        size: 0,
        first_block: BlockId::FREE,
    };

    /// 名称须事先经过[`check_name`]
    fn new_file(name: &str) -> Self {
        let mut entry = Self {
            first_block: BlockId::EOC,
            ..Self::EMPTY
        };
        entry.name[..name.len()].copy_from_slice(name.as_bytes());
        entry
    }

    #[inline]
    pub fn is_free(&self) -> bool {
        self.name[0] == 0
    }

    pub fn name_bytes(&self) -> &[u8] {
        let len = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(FILENAME_LEN);
        &self.name[..len]
    }

    pub fn name(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.name_bytes())
    }

    #[inline]
    pub const fn size(&self) -> usize {
        self.size as usize
    }

    pub fn resize(&mut self, size: usize) {
        self.size = size as u32;
    }

    #[inline]
    pub const fn first_block(&self) -> BlockId {
        self.first_block
    }

    pub fn set_first_block(&mut self, id: BlockId) {
        self.first_block = id;
    }
}

/// 文件名非空、不含NUL，且给结尾的NUL留出一字节
pub fn check_name(name: &str) -> vfs::Result<()> {
    if name.is_empty() || name.contains('\0') {
        Err(vfs::Error::InvalidName)
    } else if name.len() >= FILENAME_LEN {
        Err(vfs::Error::NameTooLong)
    } else {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct RootDir {
    entries: [DirEntry; MAX_FILES],
}

impl Default for RootDir {
    fn default() -> Self {
        Self::new()
    }
}

impl RootDir {
    pub const fn new() -> Self {
        Self {
            entries: [DirEntry::EMPTY; MAX_FILES],
        }
    }

    pub fn load(dev: &dyn BlockDevice, sb: &SuperBlock) -> vfs::Result<Self> {
        let mut block = Block::zeroed();
        block.load(dev, sb.root_block())?;
        Self::read(&mut Cursor::new(&block[..])).map_err(codec_error)
    }

    pub fn persist(&self, dev: &dyn BlockDevice, sb: &SuperBlock) -> vfs::Result<()> {
        let mut block = Block::zeroed();
        self.write(&mut Cursor::new(&mut block[..]))
            .map_err(codec_error)?;
        block.store(dev, sb.root_block())
    }

    /// 寻找同名文件所在的槽位
    pub fn lookup(&self, name: &str) -> vfs::Result<usize> {
        self.entries
            .iter()
            .position(|entry| !entry.is_free() && entry.name_bytes() == name.as_bytes())
            .ok_or(vfs::Error::NotFound)
    }

    /// 在编号最小的空槽创建空文件，返回槽位。
    pub fn create(&mut self, name: &str) -> vfs::Result<usize> {
        check_name(name)?;
        if self.lookup(name).is_ok() {
            return Err(vfs::Error::DuplicateName);
        }
        let slot = self
            .entries
            .iter()
            .position(DirEntry::is_free)
            .ok_or(vfs::Error::DirectoryFull)?;

        self.entries[slot] = DirEntry::new_file(name);
        log::debug!("create {name:?} at slot {slot}");

        Ok(slot)
    }

    /// 清空槽位，块链表须由调用者先行释放
    pub fn clear(&mut self, slot: usize) {
        self.entries[slot] = DirEntry::EMPTY;
    }

    #[inline]
    pub fn entry(&self, slot: usize) -> &DirEntry {
        &self.entries[slot]
    }

    #[inline]
    pub fn entry_mut(&mut self, slot: usize) -> &mut DirEntry {
        &mut self.entries[slot]
    }

    /// 按槽位顺序遍历已占用的目录项
    pub fn iter(&self) -> impl Iterator<Item = (usize, &DirEntry)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| !entry.is_free())
    }

    pub fn free_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.is_free()).count()
    }
}

#[cfg(test)]
mod tests {
    use alloc::format;
    use alloc::vec::Vec;

    use block_dev::{RamDisk, BLOCK_SIZE};

    use super::*;

    #[test]
    fn name_rules() {
        assert_eq!(check_name(""), Err(vfs::Error::InvalidName));
        assert_eq!(check_name("a\0b"), Err(vfs::Error::InvalidName));
        assert_eq!(check_name("fifteen_bytes__"), Ok(()));
        assert_eq!(check_name("sixteen_bytes___"), Err(vfs::Error::NameTooLong));
    }

    #[test]
    fn create_lookup_clear() {
        let mut root = RootDir::new();
        assert_eq!(root.create("a.txt"), Ok(0));
        assert_eq!(root.create("b.txt"), Ok(1));
        assert_eq!(root.create("a.txt"), Err(vfs::Error::DuplicateName));
        assert_eq!(root.lookup("b.txt"), Ok(1));
        assert_eq!(root.lookup("c.txt"), Err(vfs::Error::NotFound));

        let entry = root.entry(0);
        assert_eq!(entry.name(), "a.txt");
        assert_eq!(entry.size(), 0);
        assert_eq!(entry.first_block(), BlockId::EOC);

        root.clear(0);
        assert_eq!(root.lookup("a.txt"), Err(vfs::Error::NotFound));
        // 空出来的槽位优先复用
        assert_eq!(root.create("c.txt"), Ok(0));
        assert_eq!(root.free_count(), MAX_FILES - 2);
    }

    #[test]
    fn fills_up() {
        let mut root = RootDir::new();
        for i in 0..MAX_FILES {
            root.create(&format!("file{i}")).unwrap();
        }
        assert_eq!(root.free_count(), 0);
        assert_eq!(root.create("one_more"), Err(vfs::Error::DirectoryFull));

        let names: Vec<_> = root.iter().map(|(_, entry)| entry.name().into_owned()).collect();
        assert_eq!(names.len(), MAX_FILES);
        assert_eq!(names[0], "file0");
        assert_eq!(names[MAX_FILES - 1], format!("file{}", MAX_FILES - 1));
    }

    #[test]
    fn persist_and_load() {
        let sb = SuperBlock::new(16).unwrap();
        let disk = RamDisk::new(sb.total_blocks());

        let mut root = RootDir::new();
        let slot = root.create("hello").unwrap();
        root.entry_mut(slot).resize(5000);
        root.entry_mut(slot).set_first_block(BlockId::new(3));
        root.persist(&disk, &sb).unwrap();

        assert_eq!(RootDir::load(&disk, &sb).unwrap(), root);

        let mut raw = [0; BLOCK_SIZE];
        disk.read_block(sb.root_block(), &mut raw).unwrap();
        assert_eq!(&raw[..6], b"hello\0");
        assert_eq!(&raw[16..20], &5000u32.to_le_bytes());
        assert_eq!(&raw[20..22], &3u16.to_le_bytes());
        assert!(raw[22..32].iter().all(|&b| b == 0));
    }
}
