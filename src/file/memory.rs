//! Captured memory regions
//!
//! 捕获的内存区域

use super::error::{Error, Result};
use super::platform::DumpFile;
use super::rva::MemoryDescriptor;
use super::section::UntypedSection;
use super::writer::FileWriter;
use std::num::NonZeroU64;

impl<F: DumpFile> FileWriter<F> {
    /// Copy a memory region into the dump
    ///
    /// 将内存区域复制到转储中
    ///
    /// Allocates exactly `bytes.len()` bytes, copies them verbatim and returns a
    /// descriptor pairing `source_address` with their location.
    ///
    /// 分配恰好 `bytes.len()` 字节，原样复制，并返回将 `source_address`
    /// 与其位置配对的描述符。
    ///
    /// # Errors
    /// - [`Error::ZeroLength`] if `bytes` is empty
    /// - any allocation or copy error; no descriptor is produced
    ///
    /// # Errors
    /// - `bytes` 为空时返回 [`Error::ZeroLength`]
    /// - 任何分配或复制错误；此时不会产生描述符
    ///
    /// # Examples
    ///
    /// ```
    /// # use minidump_file_writer::{FileWriter, Result};
    /// # use tempfile::tempdir;
    /// # fn main() -> Result<()> {
    /// # let dir = tempdir()?;
    /// # let path = dir.path().join("memory.dmp");
    /// let mut writer = FileWriter::create(&path)?;
    /// let stack = [0xccu8; 20];
    ///
    /// let desc = writer.write_memory(0x7ffd_1000, &stack)?;
    /// assert_eq!(desc.start_of_memory_range, 0x7ffd_1000);
    /// assert_eq!(desc.memory.data_size, 20);
    /// assert_eq!(writer.position(), 24);
    /// # Ok(())
    /// # }
    /// ```
    pub fn write_memory(&mut self, source_address: u64, bytes: &[u8]) -> Result<MemoryDescriptor> {
        let size = NonZeroU64::new(bytes.len() as u64).ok_or(Error::ZeroLength)?;
        let section = UntypedSection::allocate(self, size)?;
        section.write(self, bytes)?;

        Ok(MemoryDescriptor {
            start_of_memory_range: source_address,
            memory: section.location(),
        })
    }
}
