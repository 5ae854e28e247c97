//! Single-flight guard for synchronization jobs.
//!
//! At most one sync of each kind runs at a time. Starting a sync hands out a
//! [`SyncPermit`]; the slot is released when the permit is dropped, also when
//! the job bails out early with an error.

use crate::error::{Result, RevenueError};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncKind {
    Projects,
    Employees,
    Hours,
    Invoices,
    Absences,
}

impl SyncKind {
    pub const ALL: [SyncKind; 5] = [
        SyncKind::Projects,
        SyncKind::Employees,
        SyncKind::Hours,
        SyncKind::Invoices,
        SyncKind::Absences,
    ];

    fn slot(&self) -> usize {
        match self {
            SyncKind::Projects => 0,
            SyncKind::Employees => 1,
            SyncKind::Hours => 2,
            SyncKind::Invoices => 3,
            SyncKind::Absences => 4,
        }
    }
}

impl fmt::Display for SyncKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncKind::Projects => "projects",
            SyncKind::Employees => "employees",
            SyncKind::Hours => "hours",
            SyncKind::Invoices => "invoices",
            SyncKind::Absences => "absences",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Default)]
pub struct SyncRegistry {
    running: [AtomicBool; 5],
}

impl SyncRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the slot for `kind`, failing if a sync of that kind is running.
    pub fn try_begin(&self, kind: SyncKind) -> Result<SyncPermit<'_>> {
        self.running[kind.slot()]
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| RevenueError::SyncInProgress(kind))?;

        info!("Started {} sync", kind);
        Ok(SyncPermit {
            registry: self,
            kind,
        })
    }

    pub fn is_running(&self, kind: SyncKind) -> bool {
        self.running[kind.slot()].load(Ordering::Acquire)
    }
}

#[must_use = "the sync slot is released as soon as the permit is dropped"]
#[derive(Debug)]
pub struct SyncPermit<'a> {
    registry: &'a SyncRegistry,
    kind: SyncKind,
}

impl SyncPermit<'_> {
    pub fn kind(&self) -> SyncKind {
        self.kind
    }
}

impl Drop for SyncPermit<'_> {
    fn drop(&mut self) {
        self.registry.running[self.kind.slot()].store(false, Ordering::Release);
        debug!("Released {} sync", self.kind);
    }
}
