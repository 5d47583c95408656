use derive_more::{From, Into};

use crate::MAX_OPEN_FILES;

/// 打开文件的句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, From, Into)]
#[repr(transparent)]
pub struct Fd(usize);

/// 打开的文件：指向根目录的槽位，而非目录项的拷贝，
/// 这样写入引起的大小变化对所有句柄都可见。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenFile {
    pub slot: usize,
    /// 读写位置
    pub offset: usize,
}

#[derive(Debug, Clone)]
pub struct FdTable {
    files: [Option<OpenFile>; MAX_OPEN_FILES],
}

impl Default for FdTable {
    fn default() -> Self {
        Self::new()
    }
}

impl FdTable {
    pub const fn new() -> Self {
        Self {
            files: [None; MAX_OPEN_FILES],
        }
    }

    /// 占用编号最小的空闲句柄
    pub fn alloc(&mut self, slot: usize) -> vfs::Result<Fd> {
        let fd = self
            .files
            .iter()
            .position(Option::is_none)
            .ok_or(vfs::Error::TooManyOpenFiles)?;
        self.files[fd] = Some(OpenFile { slot, offset: 0 });

        Ok(Fd(fd))
    }

    pub fn release(&mut self, fd: Fd) -> vfs::Result<OpenFile> {
        self.files
            .get_mut(fd.0)
            .and_then(Option::take)
            .ok_or(vfs::Error::InvalidHandle)
    }

    pub fn get(&self, fd: Fd) -> vfs::Result<&OpenFile> {
        self.files
            .get(fd.0)
            .and_then(Option::as_ref)
            .ok_or(vfs::Error::InvalidHandle)
    }

    pub fn get_mut(&mut self, fd: Fd) -> vfs::Result<&mut OpenFile> {
        self.files
            .get_mut(fd.0)
            .and_then(Option::as_mut)
            .ok_or(vfs::Error::InvalidHandle)
    }

    /// 是否有句柄指向该槽位
    pub fn is_open(&self, slot: usize) -> bool {
        self.files.iter().flatten().any(|file| file.slot == slot)
    }

    pub fn open_count(&self) -> usize {
        self.files.iter().flatten().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_release() {
        let mut fds = FdTable::new();
        let a = fds.alloc(3).unwrap();
        let b = fds.alloc(3).unwrap();
        assert_ne!(a, b);
        assert!(fds.is_open(3));
        assert!(!fds.is_open(4));
        assert_eq!(fds.open_count(), 2);

        fds.get_mut(a).unwrap().offset = 10;
        assert_eq!(fds.get(b).unwrap().offset, 0);

        assert_eq!(fds.release(a), Ok(OpenFile { slot: 3, offset: 10 }));
        assert_eq!(fds.release(a), Err(vfs::Error::InvalidHandle));
        assert_eq!(fds.get(a), Err(vfs::Error::InvalidHandle));
        assert!(fds.is_open(3));

        fds.release(b).unwrap();
        assert!(!fds.is_open(3));
        assert_eq!(fds.get(Fd::from(MAX_OPEN_FILES)), Err(vfs::Error::InvalidHandle));
    }

    #[test]
    fn pool_is_bounded() {
        let mut fds = FdTable::new();
        for _ in 0..MAX_OPEN_FILES {
            fds.alloc(0).unwrap();
        }
        assert_eq!(fds.alloc(0), Err(vfs::Error::TooManyOpenFiles));

        fds.release(Fd::from(7)).unwrap();
        assert_eq!(fds.alloc(1), Ok(Fd::from(7)));
    }
}
