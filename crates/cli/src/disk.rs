//! On-disk host adapter: runs real files through the hooks.
//!
//! The filesystem type comes from `/proc/self/mounts` (longest mount point
//! that prefixes the file's canonical path); the bus from the device's
//! `/sys/dev/block` link.

use common::{InodeId, ReadAt};
use gate::{ExecFile, InodeHandle};
use std::fs::File;
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use warden::{FileSecurity, InodeSecurity, Media};

/// One `/proc/self/mounts` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub point: PathBuf,
    pub fs_type: String,
}

#[derive(Debug, Clone, Default)]
pub struct MountTable {
    mounts: Vec<Mount>,
}

impl MountTable {
    pub fn load() -> io::Result<Self> {
        Ok(Self::parse(&std::fs::read_to_string("/proc/self/mounts")?))
    }

    pub fn parse(text: &str) -> Self {
        let mounts = text
            .lines()
            .filter_map(|line| {
                let mut fields = line.split_whitespace();
                let _device = fields.next()?;
                let point = unescape(fields.next()?);
                let fs_type = fields.next()?.to_string();
                Some(Mount {
                    point: PathBuf::from(point),
                    fs_type,
                })
            })
            .collect();
        Self { mounts }
    }

    /// Filesystem type of the mount holding `path` (already canonical).
    pub fn fs_type_of(&self, path: &Path) -> Option<&str> {
        self.mounts
            .iter()
            .filter(|m| path.starts_with(&m.point))
            // Later entries shadow earlier ones on the same mount point.
            .max_by_key(|m| m.point.components().count())
            .map(|m| m.fs_type.as_str())
    }
}

/// Undoes the octal escaping used for spaces and tabs in mount points.
fn unescape(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() {
            let digits = std::str::from_utf8(&bytes[i + 1..i + 4]).ok();
            if let Some(v) = digits.and_then(|d| u8::from_str_radix(d, 8).ok()) {
                out.push(v);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Splits a `st_dev` into major and minor with glibc's bit layout.
fn dev_numbers(dev: u64) -> (u64, u64) {
    let major = ((dev >> 8) & 0xfff) | ((dev >> 32) & 0xffff_f000);
    let minor = (dev & 0xff) | ((dev >> 12) & 0xffff_ff00);
    (major, minor)
}

/// Bus of the block device behind `dev`, if sysfs says it is USB.
fn bus_of(dev: u64) -> Option<String> {
    let (major, minor) = dev_numbers(dev);
    let link = std::fs::canonicalize(format!("/sys/dev/block/{major}:{minor}")).ok()?;
    link.components()
        .any(|c| c.as_os_str().to_str().is_some_and(|s| s.starts_with("usb")))
        .then(|| "usb".to_string())
}

pub struct DiskInode {
    id: InodeId,
    size: u64,
    security: InodeSecurity,
    media: Media,
}

impl InodeHandle for DiskInode {
    fn id(&self) -> InodeId {
        self.id
    }

    fn size(&self) -> u64 {
        self.size
    }

    /// Not observable from user space; the check runs as if there were none.
    fn open_writers(&self) -> u32 {
        0
    }

    fn security(&self) -> &InodeSecurity {
        &self.security
    }

    fn media(&self) -> &Media {
        &self.media
    }
}

pub struct DiskFile {
    name: String,
    file: File,
    inode: DiskInode,
    security: FileSecurity,
}

impl DiskFile {
    pub fn open(path: &Path, mounts: &MountTable) -> io::Result<Self> {
        let file = File::open(path)?;
        let meta = file.metadata()?;
        let canonical = std::fs::canonicalize(path)?;
        let mut media = Media::new(mounts.fs_type_of(&canonical).unwrap_or("unknown"));
        media.bus = bus_of(meta.dev());
        Ok(Self {
            name: path.display().to_string(),
            file,
            inode: DiskInode {
                id: InodeId::new(meta.dev(), meta.ino()),
                size: meta.len(),
                security: InodeSecurity::new(),
                media,
            },
            security: FileSecurity::new(),
        })
    }
}

impl ReadAt for DiskFile {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read_at(offset, buf)
    }
}

impl ExecFile for DiskFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn inode(&self) -> &dyn InodeHandle {
        &self.inode
    }

    fn security(&self) -> &FileSecurity {
        &self.security
    }
}
