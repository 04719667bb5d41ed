//! What the host must provide for each hook.
//!
//! The host owns inodes and descriptors; the subsystem only reads them and
//! mutates the security blobs they carry.

use common::{InodeId, ReadAt};
use warden::{FileSecurity, InodeSecurity, Media};

pub trait InodeHandle {
    fn id(&self) -> InodeId;

    /// Current size of the file content in bytes.
    fn size(&self) -> u64;

    /// Descriptors the host currently has open for writing.
    fn open_writers(&self) -> u32;

    fn security(&self) -> &InodeSecurity;

    fn media(&self) -> &Media;
}

/// An open descriptor that is about to be mapped.
pub trait ExecFile: ReadAt {
    /// Display name for logs.
    fn name(&self) -> &str;

    fn inode(&self) -> &dyn InodeHandle;

    fn security(&self) -> &FileSecurity;
}

/// Directory entry being unlinked.
#[derive(Clone, Copy)]
pub struct DirEntry<'a> {
    pub name: &'a str,
    /// `None` for a negative entry.
    pub inode: Option<&'a dyn InodeHandle>,
}
