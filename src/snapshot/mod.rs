//! Serializable observation of a machine's active states.
//!
//! A snapshot records, for every region of a machine (nested regions
//! included), which state is active. It is meant for tests, logs and
//! diagnostics: nothing can be restored from it, and contexts are not part
//! of it.

use crate::engine::{RegionPath, RegionView};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Version identifier for snapshot format
pub const SNAPSHOT_VERSION: u32 = 1;

/// Active state of one region.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionSnapshot {
    pub path: RegionPath,

    /// Name of the active state, `None` when the region is stopped.
    pub active_state: Option<String>,

    /// Index of the active state in the region's state list.
    pub active_state_index: Option<usize>,
}

/// Serializable snapshot of a machine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MachineSnapshot {
    /// Snapshot format version
    pub version: u32,

    pub machine_id: Uuid,

    /// When the snapshot was taken
    pub taken_at: DateTime<Utc>,

    pub running: bool,

    /// Every region, parents before their children.
    pub regions: Vec<RegionSnapshot>,
}

impl MachineSnapshot {
    pub(crate) fn capture(machine_id: Uuid, running: bool, roots: &[&dyn RegionView]) -> Self {
        let mut regions = Vec::new();
        for root in roots {
            collect(*root, &mut regions);
        }
        Self {
            version: SNAPSHOT_VERSION,
            machine_id,
            taken_at: Utc::now(),
            running,
            regions,
        }
    }

    pub fn region(&self, path: &RegionPath) -> Option<&RegionSnapshot> {
        self.regions.iter().find(|region| &region.path == path)
    }

    /// Name of the state active in the region at `path`.
    pub fn active_state(&self, path: &RegionPath) -> Option<&str> {
        self.region(path)?.active_state.as_deref()
    }

    /// Names of every active state, in region order.
    pub fn active_states(&self) -> Vec<&str> {
        self.regions
            .iter()
            .filter_map(|region| region.active_state.as_deref())
            .collect()
    }
}

fn collect(region: &dyn RegionView, out: &mut Vec<RegionSnapshot>) {
    out.push(RegionSnapshot {
        path: region.path().clone(),
        active_state: region.active_state_name().map(str::to_string),
        active_state_index: region.active_state_index(),
    });
    for child in region.children() {
        collect(child, out);
    }
}
