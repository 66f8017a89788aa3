//! Dump file implementation based on positional file I/O
//!
//! 基于定位文件 I/O 的转储文件实现
//!
//! Layers, bottom up:
//! - [`DumpFile`] / [`PlatformFile`]: create, adopt, extend, write, truncate, close
//! - [`FileWriter`]: bump allocator over the file plus bounds-checked copies
//! - [`UntypedSection`] / [`TypedSection`]: one reserved range each, filled in place
//! - [`FileWriter::write_string`] and [`FileWriter::write_memory`]: the encoders
//!
//! 分层（自底向上）：
//! - [`DumpFile`] / [`PlatformFile`]：创建、接管、扩展、写入、截断、关闭
//! - [`FileWriter`]：文件上的 bump 分配器以及带边界检查的复制
//! - [`UntypedSection`] / [`TypedSection`]：各自对应一个预留范围，原地填充
//! - [`FileWriter::write_string`] 与 [`FileWriter::write_memory`]：编码器
//!
//! # Recommended Usage
//!
//! Build records bottom up: write the leaves, keep their location descriptors,
//! then embed those descriptors in the parent record.
//!
//! # 推荐用法
//!
//! 自底向上构建记录：先写叶子节点并保留其位置描述符，再将描述符嵌入父记录。
//!
//! ```
//! # use minidump_file_writer::{FileWriter, LocationDescriptor, Result, TypedSection};
//! # use tempfile::tempdir;
//! # fn main() -> Result<()> {
//! # let dir = tempdir()?;
//! # let path = dir.path().join("module.dmp");
//! let mut writer = FileWriter::create(&path)?;
//!
//! // Leaf records first
//! // 先写叶子记录
//! let name = writer.write_str("libcrash.so")?;
//! let code = writer.write_memory(0x5555_0000, &[0x90; 64])?;
//!
//! // Then a parent that points at them
//! // 再写指向它们的父记录
//! let parent = TypedSection::<LocationDescriptor>::alloc_array(&mut writer, 2)?;
//! parent.set_value_at(&mut writer, name, 0)?;
//! parent.set_value_at(&mut writer, code.memory, 1)?;
//!
//! writer.close()?;
//! # Ok(())
//! # }
//! ```

pub mod allocator;
mod error;
mod memory;
mod platform;
mod rva;
mod section;
mod string;
mod writer;

#[cfg(test)]
mod tests;

// Re-export public API
// 重新导出公共 API
pub use error::{Error, Result};
pub use platform::{page_size, DumpFile, PlatformFile};
pub use rva::{LocationDescriptor, MemoryDescriptor, Rva};
pub use section::{Record, TypedSection, UntypedSection};
pub use string::{SourceUnit, WireStringHeader};
pub use writer::{FileWriter, WriterOptions};
