//! Platform file primitives
//!
//! 平台文件原语
//!
//! The writer only talks to a [`DumpFile`]. Each target gets exactly one
//! implementation, [`PlatformFile`], so the allocator itself never branches on
//! the operating system.
//!
//! 写入器只与 [`DumpFile`] 交互。每个目标平台只有一个实现 [`PlatformFile`]，
//! 因此分配器本身从不按操作系统分支。

use std::io;
use std::num::NonZeroU64;
use std::sync::OnceLock;

#[cfg(unix)]
mod unix;
#[cfg(unix)]
pub use unix::PlatformFile;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub use windows::PlatformFile;

/// Minimal file capability needed to write a dump
///
/// 写入转储所需的最小文件能力
///
/// Creating and adopting handles are platform specific and live on
/// [`PlatformFile`]; everything the writer does after that goes through this
/// trait.
///
/// 创建和接管句柄与平台相关，位于 [`PlatformFile`] 上；
/// 之后写入器的所有操作都通过此 trait 完成。
pub trait DumpFile {
    /// Grow the file to exactly `len` bytes
    ///
    /// 将文件扩展到恰好 `len` 字节
    fn extend_to(&mut self, len: u64) -> io::Result<()>;

    /// Write all of `buf` at `offset`
    ///
    /// 在 `offset` 处写入全部 `buf`
    fn write_all_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<()>;

    /// Shrink the file to exactly `len` bytes
    ///
    /// 将文件截断到恰好 `len` 字节
    fn truncate_to(&mut self, len: u64) -> io::Result<()>;

    /// Release the handle, reporting any error the OS returns
    ///
    /// 释放句柄并报告操作系统返回的错误
    fn close(self) -> io::Result<()>;
}

/// Fallback when the OS refuses to report a page size
const DEFAULT_PAGE_SIZE: NonZeroU64 = NonZeroU64::new(4096).unwrap();

/// Size of a memory page on this machine
///
/// 本机内存页大小
///
/// Queried once and cached.
///
/// 仅查询一次并缓存。
pub fn page_size() -> NonZeroU64 {
    static PAGE_SIZE: OnceLock<NonZeroU64> = OnceLock::new();
    *PAGE_SIZE.get_or_init(|| {
        query_page_size()
            .filter(|size| size.is_power_of_two())
            .and_then(NonZeroU64::new)
            .unwrap_or_else(|| {
                log::warn!("page size query failed, assuming {DEFAULT_PAGE_SIZE} bytes");
                DEFAULT_PAGE_SIZE
            })
    })
}

#[cfg(unix)]
use unix::query_page_size;

#[cfg(windows)]
use windows::query_page_size;
