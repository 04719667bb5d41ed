//! In-memory host for exercising the hooks.

use crate::host::{ExecFile, InodeHandle};
use common::{InodeId, ReadAt};
use parking_lot::{Mutex, RwLock};
use std::io;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use warden::{FileSecurity, InodeSecurity, Media};

pub struct MemInode {
    id: InodeId,
    data: RwLock<Vec<u8>>,
    writers: AtomicU32,
    security: InodeSecurity,
    media: Media,
}

impl MemInode {
    pub fn new(ino: u64, data: Vec<u8>) -> Arc<Self> {
        Self::on(ino, data, Media::new("ext4"))
    }

    pub fn on(ino: u64, data: Vec<u8>, media: Media) -> Arc<Self> {
        Arc::new(Self {
            id: InodeId::new(1, ino),
            data: RwLock::new(data),
            writers: AtomicU32::new(0),
            security: InodeSecurity::new(),
            media,
        })
    }

    pub fn open_writer(&self) {
        self.writers.fetch_add(1, Ordering::SeqCst);
    }

    pub fn close_writer(&self) {
        self.writers.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn flip(&self, offset: usize) {
        self.data.write()[offset] ^= 0xff;
    }
}

impl InodeHandle for MemInode {
    fn id(&self) -> InodeId {
        self.id
    }

    fn size(&self) -> u64 {
        self.data.read().len() as u64
    }

    fn open_writers(&self) -> u32 {
        self.writers.load(Ordering::SeqCst)
    }

    fn security(&self) -> &InodeSecurity {
        &self.security
    }

    fn media(&self) -> &Media {
        &self.media
    }
}

type Probe = Box<dyn FnOnce() + Send>;

pub struct MemFile {
    name: String,
    inode: Arc<MemInode>,
    security: FileSecurity,
    reads: AtomicUsize,
    probe: Mutex<Option<Probe>>,
}

impl MemFile {
    pub fn open(name: &str, inode: &Arc<MemInode>) -> Self {
        Self {
            name: name.to_string(),
            inode: Arc::clone(inode),
            security: FileSecurity::new(),
            reads: AtomicUsize::new(0),
            probe: Mutex::new(None),
        }
    }

    /// Runs `probe` once, during the first read.
    pub fn on_first_read(&self, probe: impl FnOnce() + Send + 'static) {
        *self.probe.lock() = Some(Box::new(probe));
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl ReadAt for MemFile {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let probe = self.probe.lock().take();
        if let Some(probe) = probe {
            probe();
        }
        self.inode.data.read().as_slice().read_at(offset, buf)
    }
}

impl ExecFile for MemFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn inode(&self) -> &dyn InodeHandle {
        &*self.inode
    }

    fn security(&self) -> &FileSecurity {
        &self.security
    }
}
