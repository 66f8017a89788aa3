//! Unix file primitives
//!
//! Unix 文件原语

use super::DumpFile;
use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::{AsFd, IntoRawFd};
use std::os::unix::fs::{FileExt, OpenOptionsExt};
use std::path::Path;

/// Owner read/write only
const CREATE_MODE: u32 = 0o600;

/// Dump file backed by a Unix file descriptor
///
/// 基于 Unix 文件描述符的转储文件
#[derive(Debug)]
pub struct PlatformFile {
    file: File,
}

impl PlatformFile {
    /// Create a new file, failing if the path already exists
    ///
    /// 创建新文件，路径已存在时失败
    ///
    /// The file is opened write-only with mode `0600`.
    ///
    /// 文件以只写方式打开，权限为 `0600`。
    pub fn create_new(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(CREATE_MODE)
            .open(path)?;
        Ok(Self { file })
    }

    /// Take write access to a descriptor owned by someone else
    ///
    /// 接管他人拥有的描述符的写权限
    ///
    /// The descriptor is duplicated, so closing this value never closes the
    /// caller's descriptor. Both share the same open file description.
    ///
    /// 描述符会被复制，因此关闭此值不会关闭调用方的描述符。两者共享同一个打开的文件描述。
    pub fn adopt(handle: impl AsFd) -> io::Result<Self> {
        let owned = handle.as_fd().try_clone_to_owned()?;
        Ok(Self {
            file: File::from(owned),
        })
    }
}

impl DumpFile for PlatformFile {
    #[inline]
    fn extend_to(&mut self, len: u64) -> io::Result<()> {
        self.file.set_len(len)
    }

    #[inline]
    fn write_all_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<()> {
        FileExt::write_all_at(&self.file, buf, offset)
    }

    #[inline]
    fn truncate_to(&mut self, len: u64) -> io::Result<()> {
        self.file.set_len(len)
    }

    fn close(self) -> io::Result<()> {
        let fd = self.file.into_raw_fd();
        // SAFETY: `fd` was just released from an owned `File` and is closed exactly once.
        if unsafe { libc::close(fd) } == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }
}

pub(super) fn query_page_size() -> Option<u64> {
    // SAFETY: sysconf has no memory-safety preconditions.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    u64::try_from(size).ok().filter(|&size| size > 0)
}
