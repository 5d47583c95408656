use alloc::string::ToString;

use vfs::{DirEntry, Stat};

use crate::{Fd, FileSystem, BLOCK_SIZE};

impl FileSystem {
    /// 在根目录创建空文件。
    pub fn create(&mut self, name: &str) -> vfs::Result<()> {
        self.root.create(name).map(drop)
    }

    /// 删除文件并释放它的块链表，文件仍被打开时拒绝。
    pub fn delete(&mut self, name: &str) -> vfs::Result<()> {
        let slot = self.root.lookup(name)?;
        if self.fds.is_open(slot) {
            return Err(vfs::Error::FileOpen);
        }

        self.fat.free_chain(self.root.entry(slot).first_block())?;
        self.root.clear(slot);
        log::debug!("delete {name:?} from slot {slot}");

        Ok(())
    }

    /// 按槽位顺序列出所有文件，每次调用都从头开始。
    pub fn ls(&self) -> impl Iterator<Item = DirEntry> + '_ {
        self.root.iter().map(|(_, entry)| DirEntry {
            name: entry.name().to_string(),
            size: entry.size(),
            first_block: entry.first_block().into(),
        })
    }

    pub fn open(&mut self, name: &str) -> vfs::Result<Fd> {
        let slot = self.root.lookup(name)?;
        let fd = self.fds.alloc(slot)?;
        log::debug!("open {name:?} as {fd:?}");
        Ok(fd)
    }

    pub fn close(&mut self, fd: Fd) -> vfs::Result<()> {
        self.fds.release(fd).map(drop)
    }

    /// 文件当前的大小
    pub fn stat(&self, fd: Fd) -> vfs::Result<usize> {
        let file = self.fds.get(fd)?;
        Ok(self.root.entry(file.slot).size())
    }

    pub fn metadata(&self, fd: Fd) -> vfs::Result<Stat> {
        let file = self.fds.get(fd)?;
        let entry = self.root.entry(file.slot);
        Ok(Stat {
            size: entry.size(),
            blocks: self.fat.chain_len(entry.first_block())?,
            block_size: BLOCK_SIZE,
        })
    }

    /// 移动读写位置，不能越过文件末尾。
    pub fn seek(&mut self, fd: Fd, offset: usize) -> vfs::Result<()> {
        let size = self.stat(fd)?;
        if offset > size {
            return Err(vfs::Error::InvalidOffset);
        }
        self.fds.get_mut(fd)?.offset = offset;
        Ok(())
    }

    /// 当前的读写位置
    pub fn tell(&self, fd: Fd) -> vfs::Result<usize> {
        self.fds.get(fd).map(|file| file.offset)
    }

    /// 从读写位置读入`buf`，返回读取的字节数，到达文件末尾时为0。
    pub fn read(&mut self, fd: Fd, buf: &mut [u8]) -> vfs::Result<usize> {
        let file = *self.fds.get(fd)?;
        let read_size = self.read_at(file.slot, file.offset, buf)?;
        self.fds.get_mut(fd)?.offset += read_size;
        Ok(read_size)
    }

    /// 在读写位置写入`buf`，返回写入的字节数。
    ///
    /// 磁盘写满时保留已写入的部分并返回短计数，
    /// 一个字节也写不进去时返回[`vfs::Error::DiskFull`]。
    pub fn write(&mut self, fd: Fd, buf: &[u8]) -> vfs::Result<usize> {
        let file = *self.fds.get(fd)?;
        let wrote_size = self.write_at(file.slot, file.offset, buf)?;
        self.fds.get_mut(fd)?.offset += wrote_size;
        Ok(wrote_size)
    }
}
