//! # The Gate: Signature Check on Exec Mappings
//!
//! [`Digsig`] is the subsystem context: configuration, trusted key,
//! revocation set, validation cache and the global verification lock. The
//! host calls one hook per event and acts on the returned [`Status`].
//!
//! ## Exec mapping, in order
//! 1. Mappings without `EXEC` and calls before a key is installed pass.
//! 2. Files on blacklisted media are denied without being read.
//! 3. The descriptor takes a write-hold on the inode, unless the host
//!    already has it open for writing (`busy`).
//! 4. A cached inode is permitted without reading anything.
//! 5. Under the global lock: ELF header, section table, signature record,
//!    revocation check, digest, signature check.
//! 6. Success caches the inode. The hold is given back on every path except
//!    a successful one with `hold_until_close` set.
//!
//! Permissive mode turns every denial into a logged warning.

pub mod host;
mod pipeline;
pub mod stats;

#[cfg(test)]
mod mem;

pub use host::{DirEntry, ExecFile, InodeHandle};
pub use stats::{Stats, StatsSnapshot};

use common::{
    AccessMask, ConfigError, DenyReason, DigsigConfig, InodeId, Protection, Status, PERMIT,
};
use parking_lot::{Mutex, RwLock};
use pipeline::{Pipeline, Trust};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use vault::{PublicKey, RevocationSet, SignatureId, SignatureRecord, VaultError, Verifier};
use warden::{ExecTicket, Warden};

/// Log target for trust failures, kept apart from infrastructure errors.
pub const SECURITY_TARGET: &str = "digsig::security";

#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("key: {0}")]
    Vault(#[from] VaultError),
}

pub struct Digsig {
    config: DigsigConfig,
    verifier: RwLock<Option<Arc<Verifier>>>,
    revocations: RwLock<RevocationSet>,
    warden: Warden,
    verify_lock: Mutex<()>,
    stopped: AtomicBool,
    stats: Stats,
}

impl Digsig {
    /// Starts the subsystem without a key. Hooks pass until
    /// [`install_key`](Self::install_key).
    pub fn new(config: DigsigConfig) -> Result<Self, GateError> {
        config.validate()?;
        let warden = Warden::new(&config)?;
        log::info!(
            "digsig starting: mode={:?} hash={:?} scheme={:?} buckets={}",
            config.mode,
            config.hash,
            config.scheme,
            config.cache_buckets
        );
        Ok(Self {
            config,
            verifier: RwLock::new(None),
            revocations: RwLock::new(RevocationSet::new()),
            warden,
            verify_lock: Mutex::new(()),
            stopped: AtomicBool::new(false),
            stats: Stats::default(),
        })
    }

    pub fn with_key(config: DigsigConfig, key: PublicKey) -> Result<Self, GateError> {
        let digsig = Self::new(config)?;
        digsig.install_key(key)?;
        Ok(digsig)
    }

    pub fn with_revocations(self, revocations: RevocationSet) -> Self {
        *self.revocations.write() = revocations;
        self
    }

    pub fn config(&self) -> &DigsigConfig {
        &self.config
    }

    /// Installs or replaces the trusted key. No verification is in flight
    /// while the key changes. Trust established under the old key is
    /// dropped.
    pub fn install_key(&self, key: PublicKey) -> Result<(), GateError> {
        let verifier = Verifier::new(key, self.config.hash, self.config.scheme)?;
        let _serial = self.verify_lock.lock();
        log::info!("installing {:?}", verifier.key());
        *self.verifier.write() = Some(Arc::new(verifier));
        self.warden.clear();
        Ok(())
    }

    pub fn revoke(&self, id: SignatureId) -> bool {
        let added = self.revocations.write().insert(id);
        if added {
            log::info!(target: SECURITY_TARGET, "revoked signature {id}");
        }
        added
    }

    pub fn revoke_record(&self, record: &SignatureRecord) -> bool {
        self.revoke(record.id())
    }

    pub fn is_validated(&self, id: InodeId) -> bool {
        self.warden.cache().is_cached(id)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Tears down the cache. Later hooks pass.
    pub fn shutdown(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        let _serial = self.verify_lock.lock();
        self.warden.clear();
        log::info!("digsig stopped");
    }

    fn active(&self) -> bool {
        !self.stopped.load(Ordering::SeqCst) && self.verifier.read().is_some()
    }

    /// Hook: `file` is being mapped with `prot`.
    pub fn on_map_for_execution(&self, file: &dyn ExecFile, prot: Protection) -> Status {
        if !prot.contains(Protection::EXEC) || !self.active() {
            return PERMIT;
        }
        self.stats.map_check();
        let inode = file.inode();

        if let Err(reason) = self.warden.check_media(inode.media()) {
            return self.deny(file.name(), reason);
        }

        let id = inode.id();
        let ticket = self.warden.begin_exec(
            id,
            inode.security(),
            file.security(),
            inode.open_writers(),
        );

        let outcome = if ticket.cached {
            if ticket.busy {
                Err(DenyReason::Busy)
            } else {
                self.stats.cache_hit();
                log::debug!("{}: cached validation", file.name());
                Ok(Trust::Verified)
            }
        } else {
            self.verify(file, &ticket)
        };

        let keep_hold = self.config.hold_until_close && outcome == Ok(Trust::Verified);
        if ticket.acquired && !keep_hold {
            self.warden.release(inode.security(), file.security());
        }

        match outcome {
            Ok(trust) => {
                self.stats.permit();
                log::debug!("{}: permitted ({trust:?})", file.name());
                PERMIT
            }
            Err(reason) => self.deny(file.name(), reason),
        }
    }

    /// Runs the pipeline and caches a success, all under the global lock so
    /// a key change or shutdown cannot interleave with the cache update.
    fn verify(&self, file: &dyn ExecFile, ticket: &ExecTicket) -> Result<Trust, DenyReason> {
        let _serial = self.verify_lock.lock();
        let started = Instant::now();
        if self.stopped.load(Ordering::SeqCst) {
            return Ok(Trust::Stopped);
        }
        let Some(verifier) = self.verifier.read().clone() else {
            return Ok(Trust::Stopped);
        };
        let pipeline = Pipeline {
            verifier: &verifier,
            revocations: &self.revocations,
            block_size: self.config.block_size,
        };
        let result = pipeline.run(file, ticket.busy);
        if result == Ok(Trust::Verified) {
            let inode = file.inode();
            self.warden.commit(inode.id(), inode.security(), ticket.generation);
        }
        match result {
            Ok(Trust::Verified) | Err(DenyReason::Mismatch) | Err(DenyReason::VerifyError(_)) => {
                self.stats.verification(started.elapsed())
            }
            _ => self.stats.add_time(started.elapsed()),
        }
        result
    }

    /// Hook: access check on `inode` with `mask`.
    pub fn on_permission_check(&self, inode: &dyn InodeHandle, mask: AccessMask) -> Status {
        if !mask.intersects(AccessMask::WRITE | AccessMask::APPEND) || !self.active() {
            return PERMIT;
        }
        match self.warden.write_requested(inode.id(), inode.security()) {
            Ok(()) => PERMIT,
            Err(reason) => self.deny(&inode.id().to_string(), reason),
        }
    }

    /// Hook: `entry` is being removed from `parent`.
    pub fn on_unlink(&self, parent: &dyn InodeHandle, entry: &DirEntry<'_>) -> Status {
        if !self.active() {
            return PERMIT;
        }
        if let Some(inode) = entry.inode {
            if self.warden.forget(inode.id(), inode.security()) {
                log::debug!("unlinked {} from {}", entry.name, parent.id());
            }
        }
        PERMIT
    }

    /// Hook: `file` is being closed. Runs even after shutdown so no hold
    /// outlives its descriptor.
    pub fn on_descriptor_release(&self, file: &dyn ExecFile) {
        if file.security().exec_mapped() {
            self.warden.release(file.inode().security(), file.security());
        }
    }

    /// Hook: `inode` is being freed.
    pub fn on_inode_teardown(&self, inode: &dyn InodeHandle) {
        self.warden.forget(inode.id(), inode.security());
    }

    fn deny(&self, subject: &str, reason: DenyReason) -> Status {
        self.stats.denial();
        if reason.is_security_event() {
            log::error!(target: SECURITY_TARGET, "{subject}: {reason}");
        } else if reason == DenyReason::Busy {
            log::info!("{subject}: {reason}");
        } else {
            log::error!("{subject}: {reason}");
        }
        let status = self.config.mode.resolve(&reason);
        if status == PERMIT {
            log::warn!("permissive mode, allowing {subject} despite: {reason}");
        }
        status
    }
}

impl std::fmt::Debug for Digsig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Digsig")
            .field("config", &self.config)
            .field("active", &self.active())
            .field("warden", &self.warden)
            .finish()
    }
}
