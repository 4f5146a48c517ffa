//! Admission gates consulted before every claim: capacity and free space.

pub mod space;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;

use crate::config::{MediadlConfig, SpaceCheckPolicy};
use crate::job_db::JobDb;

/// Free-byte probe for a storage root; `None` means the root could not be read.
pub type SpaceProbe = Arc<dyn Fn(&Path) -> Option<u64> + Send + Sync>;

/// Why the scheduler may not claim right now.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdmissionBlocked {
    #[error("capacity reached: {active} active of {max}")]
    Capacity { active: i64, max: i64 },

    #[error("low disk space on {}: {free} bytes free, {required} required", root.display())]
    LowSpace {
        root: PathBuf,
        free: u64,
        required: u64,
    },

    #[error("cannot read free space on {}", root.display())]
    Unreadable { root: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Open,
    Blocked(AdmissionBlocked),
}

pub struct AdmissionController {
    max_active: i64,
    min_free_bytes: u64,
    roots: Vec<PathBuf>,
    policy: SpaceCheckPolicy,
    probe: SpaceProbe,
}

impl AdmissionController {
    pub fn from_config(cfg: &MediadlConfig) -> Self {
        Self {
            max_active: cfg.max_active_downloads,
            min_free_bytes: cfg.min_free_space_bytes,
            roots: cfg.storage_roots(),
            policy: cfg.space_check_policy,
            probe: Arc::new(space::free_bytes_nearest),
        }
    }

    /// Replace the statvfs probe (tests, or a mount-aware probe).
    pub fn with_probe(mut self, probe: SpaceProbe) -> Self {
        self.probe = probe;
        self
    }

    /// Capacity gate. A ceiling of zero or less disables it.
    pub fn check_capacity(&self, active: i64) -> Option<AdmissionBlocked> {
        if self.max_active <= 0 || active < self.max_active {
            return None;
        }
        Some(AdmissionBlocked::Capacity {
            active,
            max: self.max_active,
        })
    }

    /// Free-space gate over every storage root. A zero minimum disables it.
    pub fn check_space(&self) -> Option<AdmissionBlocked> {
        if self.min_free_bytes == 0 {
            return None;
        }
        for root in &self.roots {
            match (self.probe)(root) {
                Some(free) if free >= self.min_free_bytes => {}
                Some(free) => {
                    return Some(AdmissionBlocked::LowSpace {
                        root: root.clone(),
                        free,
                        required: self.min_free_bytes,
                    })
                }
                None => match self.policy {
                    SpaceCheckPolicy::FailOpen => {
                        tracing::warn!(root = %root.display(), "free space unreadable; admitting (fail_open)");
                    }
                    SpaceCheckPolicy::FailClosed => {
                        return Some(AdmissionBlocked::Unreadable { root: root.clone() })
                    }
                },
            }
        }
        None
    }

    /// Both gates, capacity first (it is one cheap query).
    pub async fn evaluate(&self, db: &JobDb) -> Result<Admission> {
        let active = db.count_active().await?;
        if let Some(b) = self.check_capacity(active) {
            return Ok(Admission::Blocked(b));
        }
        Ok(match self.check_space() {
            Some(b) => Admission::Blocked(b),
            None => Admission::Open,
        })
    }
}
