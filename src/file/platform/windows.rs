//! Windows file primitives
//!
//! Windows 文件原语

use super::DumpFile;
use std::ffi::c_void;
use std::fs::{File, OpenOptions};
use std::io;
use std::os::windows::fs::FileExt;
use std::os::windows::io::{AsHandle, IntoRawHandle};
use std::path::Path;

::windows_targets::link!("kernel32.dll" "system" fn CloseHandle(hobject: *mut c_void) -> i32);
::windows_targets::link!("kernel32.dll" "system" fn GetSystemInfo(lpsysteminfo: *mut SystemInfo));

// https://learn.microsoft.com/en-us/windows/win32/api/sysinfoapi/ns-sysinfoapi-system_info
#[allow(dead_code)]
#[repr(C)]
struct SystemInfo {
    processor_architecture: u16,
    reserved: u16,
    page_size: u32,
    minimum_application_address: *mut c_void,
    maximum_application_address: *mut c_void,
    active_processor_mask: usize,
    number_of_processors: u32,
    processor_type: u32,
    allocation_granularity: u32,
    processor_level: u16,
    processor_revision: u16,
}

/// Dump file backed by a Windows file handle
///
/// 基于 Windows 文件句柄的转储文件
#[derive(Debug)]
pub struct PlatformFile {
    file: File,
}

impl PlatformFile {
    /// Create a new file, failing if the path already exists
    ///
    /// 创建新文件，路径已存在时失败
    pub fn create_new(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)?;
        Ok(Self { file })
    }

    /// Take write access to a handle owned by someone else
    ///
    /// 接管他人拥有的句柄的写权限
    ///
    /// The handle is duplicated, so closing this value never closes the
    /// caller's handle.
    ///
    /// 句柄会被复制，因此关闭此值不会关闭调用方的句柄。
    pub fn adopt(handle: impl AsHandle) -> io::Result<Self> {
        let owned = handle.as_handle().try_clone_to_owned()?;
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

    fn write_all_at(&mut self, mut offset: u64, mut buf: &[u8]) -> io::Result<()> {
        while !buf.is_empty() {
            match self.file.seek_write(buf, offset) {
                Ok(0) => return Err(io::Error::from(io::ErrorKind::WriteZero)),
                Ok(written) => {
                    buf = &buf[written..];
                    offset += written as u64;
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    #[inline]
    fn truncate_to(&mut self, len: u64) -> io::Result<()> {
        self.file.set_len(len)
    }

    fn close(self) -> io::Result<()> {
        let handle = self.file.into_raw_handle();
        // SAFETY: `handle` was just released from an owned `File` and is closed exactly once.
        if unsafe { CloseHandle(handle) } != 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }
}

pub(super) fn query_page_size() -> Option<u64> {
    let mut info = std::mem::MaybeUninit::<SystemInfo>::zeroed();
    // SAFETY: GetSystemInfo fully initializes the struct it is given.
    let info = unsafe {
        GetSystemInfo(info.as_mut_ptr());
        info.assume_init()
    };
    Some(u64::from(info.page_size)).filter(|&size| size > 0)
}
