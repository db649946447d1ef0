//! Storage layer: file management and page I/O.
//!
//! This module provides abstractions for creating and opening files,
//! reading and writing their pages, and the on-disk file header.

mod disk_manager;
mod file_header;
mod file_manager;
mod memory;

pub use disk_manager::{DiskManager, DiskManagerImpl, FileHandle};
pub use file_header::FileHeader;
pub use file_manager::{
    validate_file_name, DiskFileManager, FileManager, MemoryFileManager, MAX_FILE_NAME_LEN,
};
pub use memory::MemoryDiskManager;
