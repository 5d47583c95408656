use derive_more::Display;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// 底层块设备读写失败
    #[display(fmt = "i/o error: {}", _0)]
    Io(block_dev::Error),
    /// 挂载时镜像校验失败
    #[display(fmt = "invalid filesystem image")]
    InvalidImage,
    #[display(fmt = "no filesystem is mounted")]
    NotMounted,
    #[display(fmt = "a filesystem is already mounted")]
    AlreadyMounted,
    /// 文件名为空或含有NUL
    #[display(fmt = "invalid file name")]
    InvalidName,
    #[display(fmt = "file name too long")]
    NameTooLong,
    #[display(fmt = "file already exists")]
    DuplicateName,
    #[display(fmt = "root directory is full")]
    DirectoryFull,
    #[display(fmt = "no such file")]
    NotFound,
    /// 文件仍被打开
    #[display(fmt = "file is still open")]
    FileOpen,
    #[display(fmt = "too many open files")]
    TooManyOpenFiles,
    #[display(fmt = "invalid file descriptor")]
    InvalidHandle,
    #[display(fmt = "offset beyond end of file")]
    InvalidOffset,
    #[display(fmt = "no free data block left")]
    DiskFull,
    /// 遍历FAT时发现链表损坏
    #[display(fmt = "corrupted block chain")]
    CorruptChain,
}

impl From<block_dev::Error> for Error {
    fn from(e: block_dev::Error) -> Self {
        Self::Io(e)
    }
}
