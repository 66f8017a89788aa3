//! Append-only minidump file writer
//!
//! 只追加的 minidump 文件写入器
//!
//! This library writes crash dumps as a graph of records linked by relative
//! virtual addresses (RVAs) instead of pointers. A bump allocator hands out
//! aligned, non-overlapping ranges of the file, sections let callers fill those
//! ranges piece by piece, and encoders turn strings and memory regions into the
//! on-disk format.
//!
//! 本库将崩溃转储写成通过相对虚拟地址（RVA）而非指针链接的记录图。
//! bump 分配器分发对齐且互不重叠的文件范围，段允许调用方逐块填充这些范围，
//! 编码器将字符串和内存区域转换为磁盘格式。
//!
//! # Features
//!
//! - **Append-only**: ranges are never reused, freed or moved
//! - **Page-granular growth**: the file grows in whole pages and is truncated to its logical size on close
//! - **Bounded memory**: strings of any length are transcoded without a heap buffer
//! - **No recovery path**: every operation is one bounded step that either succeeds or reports an error
//!
//! # 特性
//!
//! - **只追加**：范围从不重用、释放或移动
//! - **按页扩展**：文件按整页扩展，关闭时截断到逻辑大小
//! - **有界内存**：任意长度的字符串都无需堆缓冲区即可转码
//! - **无恢复路径**：每个操作都是一个有界步骤，要么成功，要么报告错误
//!
//! # Quick Start
//!
//! ## 快速开始
//!
//! ```
//! use minidump_file_writer::{FileWriter, Result};
//! # use tempfile::tempdir;
//! # fn main() -> Result<()> {
//! # let dir = tempdir()?;
//! # let path = dir.path().join("crash.dmp");
//!
//! // Create the dump file exclusively
//! // 独占地创建转储文件
//! let mut writer = FileWriter::create(&path)?;
//!
//! // Strings become length-prefixed UTF-16
//! // 字符串变为带长度前缀的 UTF-16
//! let name = writer.write_str("worker-3")?;
//! assert_eq!(name.data_size, 4 + 9 * 2);
//!
//! // Memory regions keep their original address
//! // 内存区域保留其原始地址
//! let stack = writer.write_memory(0x7ffe_0000, &[0u8; 256])?;
//! assert_eq!(stack.memory.data_size, 256);
//!
//! // Drop the page padding
//! // 去掉页填充
//! writer.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Main Types
//!
//! - [`FileWriter`]: Owns the file, allocates ranges and copies bytes
//! - [`UntypedSection`]: One reserved range
//! - [`TypedSection`]: A reserved range holding a fixed-layout record
//! - [`Rva`], [`LocationDescriptor`], [`MemoryDescriptor`]: Offsets and descriptors embedded in records
//! - [`DumpFile`]: The file primitives the writer needs
//!
//! # 主要类型
//!
//! - [`FileWriter`]：拥有文件，分配范围并复制字节
//! - [`UntypedSection`]：一个预留范围
//! - [`TypedSection`]：存放固定布局记录的预留范围
//! - [`Rva`]、[`LocationDescriptor`]、[`MemoryDescriptor`]：嵌入记录中的偏移和描述符
//! - [`DumpFile`]：写入器所需的文件原语

mod file;

pub use file::allocator;
pub use file::{
    page_size, DumpFile, Error, FileWriter, LocationDescriptor, MemoryDescriptor, PlatformFile,
    Record, Result, Rva, SourceUnit, TypedSection, UntypedSection, WireStringHeader,
    WriterOptions,
};
