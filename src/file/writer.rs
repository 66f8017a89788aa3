//! Dump file writer: file lifecycle, allocation and raw copies
//!
//! 转储文件写入器：文件生命周期、分配与原始复制

use super::allocator::BumpAllocator;
use super::error::{Error, Result};
use super::platform::{page_size, DumpFile, PlatformFile};
use super::rva::Rva;
use std::num::NonZeroU64;
use std::path::Path;

/// Writer configuration
///
/// 写入器配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WriterOptions {
    /// Minimum number of pages the file grows by at once
    ///
    /// 文件每次至少扩展的页数
    pub growth_pages: NonZeroU64,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            growth_pages: NonZeroU64::MIN,
        }
    }
}

/// Append-only dump file writer
///
/// 只追加的转储文件写入器
///
/// Hands out 8-byte aligned, non-overlapping ranges of the file through a bump
/// allocator and writes bytes into them. The file is grown in whole pages and
/// truncated back to the logical size on [`close`](Self::close).
///
/// 通过 bump 分配器分发 8 字节对齐、互不重叠的文件范围，并向其中写入字节。
/// 文件按整页扩展，并在 [`close`](Self::close) 时截断回逻辑大小。
///
/// # Invariants
///
/// - `position() <= size()`
/// - `size()` only grows, by multiples of [`granularity`](Self::granularity)
/// - `position()` only grows, by multiples of 8
///
/// # 不变量
///
/// - `position() <= size()`
/// - `size()` 只增长，且增量为 [`granularity`](Self::granularity) 的倍数
/// - `position()` 只增长，且增量为 8 的倍数
///
/// # Usage Example
///
/// ```
/// # use minidump_file_writer::{FileWriter, Result};
/// # use tempfile::tempdir;
/// # fn main() -> Result<()> {
/// # let dir = tempdir()?;
/// # let path = dir.path().join("crash.dmp");
/// # use std::num::NonZeroU64;
/// let mut writer = FileWriter::create(&path)?;
///
/// // Reserve 12 bytes, the cursor advances by 16
/// // 预留 12 字节，游标前进 16
/// let rva = writer.allocate(NonZeroU64::new(12).unwrap())?;
/// writer.copy(rva, b"hello, dump!")?;
/// assert_eq!(writer.position(), 16);
///
/// writer.close()?;
/// assert_eq!(std::fs::metadata(&path)?.len(), 16);
/// # Ok(())
/// # }
/// ```
///
/// # Panics
///
/// [`allocate`](Self::allocate) and [`copy`](Self::copy) panic if the writer
/// holds no file.
///
/// # Panics
///
/// 写入器未持有文件时，[`allocate`](Self::allocate) 和 [`copy`](Self::copy) 会 panic。
#[derive(Debug)]
pub struct FileWriter<F: DumpFile = PlatformFile> {
    /// Backing file, `None` before open and after close
    ///
    /// 底层文件，打开前和关闭后为 `None`
    file: Option<F>,

    /// Whether close releases the handle
    ///
    /// 关闭时是否释放句柄
    owns_file: bool,

    /// Cursor and backing size
    ///
    /// 游标与底层大小
    allocator: BumpAllocator,
}

impl FileWriter<PlatformFile> {
    /// Create a writer with default options and no file
    ///
    /// 使用默认配置创建一个未持有文件的写入器
    pub fn new() -> Self {
        Self::with_options(WriterOptions::default())
    }

    /// Create a new dump file at `path` and return a writer owning it
    ///
    /// 在 `path` 创建新的转储文件并返回拥有它的写入器
    ///
    /// # Errors
    /// Fails if the file already exists or cannot be created.
    ///
    /// # Errors
    /// 文件已存在或无法创建时失败。
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let mut writer = Self::new();
        writer.open(path)?;
        Ok(writer)
    }

    /// Exclusively create the file at `path` and take ownership of it
    ///
    /// 独占地创建 `path` 处的文件并取得其所有权
    ///
    /// An existing file at `path` is left untouched and reported as an I/O error.
    ///
    /// `path` 处已存在的文件不会被修改，并以 I/O 错误报告。
    ///
    /// # Errors
    /// - [`Error::AlreadyOpen`] if the writer already holds a file
    /// - [`Error::Io`] if creation fails, including when the path exists
    ///
    /// # Errors
    /// - 写入器已持有文件时返回 [`Error::AlreadyOpen`]
    /// - 创建失败（包括路径已存在）时返回 [`Error::Io`]
    pub fn open(&mut self, path: impl AsRef<Path>) -> Result<()> {
        if self.file.is_some() {
            return Err(Error::AlreadyOpen);
        }
        let path = path.as_ref();
        let file = PlatformFile::create_new(path)?;
        log::debug!("created dump file {}", path.display());
        self.install(file, true);
        Ok(())
    }

    /// Write through a descriptor managed by the caller
    ///
    /// 通过调用方管理的描述符写入
    ///
    /// The writer works on a duplicate of `handle`; [`close`](Self::close) only
    /// truncates the file to its logical size and the caller's descriptor stays open.
    ///
    /// 写入器使用 `handle` 的副本；[`close`](Self::close) 只会将文件截断到逻辑大小，
    /// 调用方的描述符保持打开。
    #[cfg(unix)]
    pub fn adopt_handle(&mut self, handle: impl std::os::fd::AsFd) -> Result<()> {
        if self.file.is_some() {
            return Err(Error::AlreadyOpen);
        }
        let file = PlatformFile::adopt(handle)?;
        self.adopt(file)
    }

    /// Write through a handle managed by the caller
    ///
    /// 通过调用方管理的句柄写入
    #[cfg(windows)]
    pub fn adopt_handle(&mut self, handle: impl std::os::windows::io::AsHandle) -> Result<()> {
        if self.file.is_some() {
            return Err(Error::AlreadyOpen);
        }
        let file = PlatformFile::adopt(handle)?;
        self.adopt(file)
    }
}

impl Default for FileWriter<PlatformFile> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: DumpFile> FileWriter<F> {
    /// Create a writer with the given options and no file
    ///
    /// 使用给定配置创建一个未持有文件的写入器
    pub fn with_options(options: WriterOptions) -> Self {
        let granularity = page_size().saturating_mul(options.growth_pages);
        Self {
            file: None,
            owns_file: true,
            allocator: BumpAllocator::new(granularity),
        }
    }

    /// Take ownership of an already created file
    ///
    /// 取得已创建文件的所有权
    ///
    /// [`close`](Self::close) truncates and then closes it.
    ///
    /// [`close`](Self::close) 会先截断再关闭它。
    pub fn attach(&mut self, file: F) -> Result<()> {
        if self.file.is_some() {
            return Err(Error::AlreadyOpen);
        }
        self.install(file, true);
        Ok(())
    }

    /// Borrow write access to a file without owning it
    ///
    /// 借用文件的写权限而不拥有它
    ///
    /// [`close`](Self::close) only truncates; the file value is dropped without
    /// an explicit close.
    ///
    /// [`close`](Self::close) 只截断；文件值被丢弃而不显式关闭。
    pub fn adopt(&mut self, file: F) -> Result<()> {
        if self.file.is_some() {
            return Err(Error::AlreadyOpen);
        }
        log::debug!("adopted external dump file handle");
        self.install(file, false);
        Ok(())
    }

    fn install(&mut self, file: F, owns_file: bool) {
        self.file = Some(file);
        self.owns_file = owns_file;
        self.allocator = BumpAllocator::new(self.allocator.granularity());
    }

    /// Truncate the file to the logical size and release it
    ///
    /// 将文件截断到逻辑大小并释放
    ///
    /// Page padding added by growth is dropped; no allocated byte is. Owned
    /// files are closed, adopted ones are only truncated. Does nothing when the
    /// writer holds no file.
    ///
    /// 扩展时添加的页填充会被丢弃，已分配的字节不会。拥有的文件会被关闭，
    /// 接管的文件只会被截断。写入器未持有文件时不做任何事。
    ///
    /// # Errors
    /// Returns the truncate or close failure. The file is released either way.
    ///
    /// # Errors
    /// 返回截断或关闭的失败。无论如何文件都会被释放。
    pub fn close(&mut self) -> Result<()> {
        let Some(mut file) = self.file.take() else {
            return Ok(());
        };

        let position = self.allocator.position();
        file.truncate_to(position)?;
        if self.owns_file {
            file.close()?;
        }
        log::debug!(
            "closed dump file at {position} bytes ({} bytes of padding released)",
            self.allocator.size() - position
        );
        Ok(())
    }

    /// Allocate `size` bytes at the end of the file
    ///
    /// 在文件末尾分配 `size` 字节
    ///
    /// Returns the start of the range. The cursor advances by `size` rounded up
    /// to 8. When the range overruns the backed region the file grows first, by
    /// whole multiples of the growth granularity.
    ///
    /// 返回范围的起始位置。游标前进 `size` 向上对齐到 8 的字节数。
    /// 当范围超出已扩展区域时先扩展文件，增量为扩展步长的整数倍。
    ///
    /// # Errors
    /// - [`Error::Grow`] if extending the file fails; cursor and size are unchanged
    /// - [`Error::AddressSpaceExhausted`] if the range would not be addressable by an RVA
    ///
    /// # Errors
    /// - 扩展文件失败时返回 [`Error::Grow`]；游标和大小保持不变
    /// - 范围无法用 RVA 寻址时返回 [`Error::AddressSpaceExhausted`]
    pub fn allocate(&mut self, size: NonZeroU64) -> Result<Rva> {
        let Some(file) = self.file.as_mut() else {
            not_open()
        };

        let grant = self.allocator.plan(size)?;
        if let Some(new_size) = grant.grow_to {
            file.extend_to(new_size)
                .map_err(|source| Error::Grow { new_size, source })?;
            log::debug!("grew dump file to {new_size} bytes");
        }
        self.allocator.commit(grant);
        log::trace!("allocated {size} bytes at {}", grant.rva);

        Ok(grant.rva)
    }

    /// Write `src` at `at`
    ///
    /// 在 `at` 处写入 `src`
    ///
    /// The write must end inside the backed region. Writes are not rolled back:
    /// on failure the dump should be abandoned.
    ///
    /// 写入必须在已扩展区域内结束。写入不会回滚：失败时应放弃整个转储。
    ///
    /// # Errors
    /// - [`Error::ZeroLength`] if `src` is empty
    /// - [`Error::OutOfBounds`] if `at + src.len()` exceeds [`size`](Self::size)
    /// - [`Error::Io`] if the write does not complete
    ///
    /// # Errors
    /// - `src` 为空时返回 [`Error::ZeroLength`]
    /// - `at + src.len()` 超过 [`size`](Self::size) 时返回 [`Error::OutOfBounds`]
    /// - 写入未完成时返回 [`Error::Io`]
    pub fn copy(&mut self, at: Rva, src: &[u8]) -> Result<()> {
        let Some(file) = self.file.as_mut() else {
            not_open()
        };
        if src.is_empty() {
            return Err(Error::ZeroLength);
        }

        self.allocator.check_backed(at.offset(), src.len() as u64)?;
        file.write_all_at(at.offset(), src)?;
        Ok(())
    }

    /// Logical size: where the next allocation starts
    ///
    /// 逻辑大小：下一次分配的起始位置
    #[inline]
    pub fn position(&self) -> u64 {
        self.allocator.position()
    }

    /// Bytes currently backed by the file
    ///
    /// 文件当前已扩展的字节数
    #[inline]
    pub fn size(&self) -> u64 {
        self.allocator.size()
    }

    /// Minimum growth step in bytes
    ///
    /// 最小扩展步长（字节）
    #[inline]
    pub fn granularity(&self) -> NonZeroU64 {
        self.allocator.granularity()
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Whether [`close`](Self::close) will close the handle
    ///
    /// [`close`](Self::close) 是否会关闭句柄
    #[inline]
    pub fn owns_file(&self) -> bool {
        self.owns_file
    }
}

impl<F: DumpFile> Drop for FileWriter<F> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            log::warn!("failed to close dump file on drop: {err}");
        }
    }
}

#[cold]
#[track_caller]
fn not_open() -> ! {
    panic!("dump file writer used without an open file / 写入器未打开文件")
}
