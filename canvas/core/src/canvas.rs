//! Canvas / Dedup Controller
//!
//! Tracks which component instances are on the canvas, in display order.
//!
//! # Admission Rules
//!
//! ```text
//!   admit(desc, dedup_key)
//!     │
//!     ├─ dedup_key seen before ─────────────▶ no-op
//!     ├─ instance with desc.id exists ──────▶ replace in place
//!     │                                       (position + instanceId kept)
//!     └─ otherwise ─────────────────────────▶ append
//! ```
//!
//! A dedup key is remembered only when the admission changed the canvas.
//! Under [`DuplicatePolicy::Strict`] the replace branch fails instead.
//!
//! # Thread Safety
//!
//! The instance list and the dedup memory share one `parking_lot::Mutex`,
//! so [`CanvasController::clear`] empties both atomically.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::clock::{SystemClock, TimeSource};
use crate::component::ComponentDescription;

/// Result type alias for canvas operations
pub type CanvasResult<T> = Result<T, CanvasError>;

/// Errors from the canvas controller
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CanvasError {
    /// `strict` policy and the id is already on the canvas
    #[error("component {id:?} is already on the canvas")]
    DuplicateIdConflict {
        /// Logical component id
        id: String,
    },

    /// Appending would exceed `max_instances`
    #[error("canvas is full ({limit} instances)")]
    CapacityExceeded {
        /// Configured limit
        limit: usize,
    },
}

/// Render-scoped identity of an instance
///
/// Distinct from the description's logical `id`; never shown to the agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(Uuid);

impl InstanceId {
    /// Fresh random id
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Underlying UUID
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A materialized component
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasInstance {
    /// Render-scoped identity, stable across in-place replacement
    pub instance_id: InstanceId,
    /// The validated description
    pub description: ComponentDescription,
    /// Key the latest admission arrived with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dedup_key: Option<String>,
    /// Unix milliseconds of the latest admission
    pub inserted_at: u64,
}

/// What to do when an admitted id is already on the canvas
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Replace the existing instance in place
    #[default]
    Replace,
    /// Fail with `DuplicateIdConflict`
    Strict,
}

impl DuplicatePolicy {
    /// Wire name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Replace => "replace",
            Self::Strict => "strict",
        }
    }
}

impl fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DuplicatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "replace" => Ok(Self::Replace),
            "strict" => Ok(Self::Strict),
            other => Err(format!(
                "unknown duplicate policy {other:?} (expected replace or strict)"
            )),
        }
    }
}

/// How an admission changed the canvas
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Admission {
    /// Appended at the end
    Appended,
    /// Replaced an instance with the same id
    Replaced,
    /// Dedup key already seen; nothing changed
    Deduplicated,
}

/// Instances plus dedup memory, guarded together
#[derive(Debug, Default)]
pub(crate) struct CanvasState {
    pub(crate) instances: Vec<CanvasInstance>,
    /// Every dedup key admitted since the last clear; not bounded by capacity
    pub(crate) seen: HashSet<String>,
}

impl CanvasState {
    pub(crate) fn clear(&mut self) {
        self.instances.clear();
        self.seen.clear();
    }

    /// Dedup keys in sorted order
    pub(crate) fn dedup_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.seen.iter().cloned().collect();
        keys.sort();
        keys
    }
}

/// Owner of the canvas instance list
#[derive(Debug)]
pub struct CanvasController {
    state: Mutex<CanvasState>,
    policy: DuplicatePolicy,
    /// Instance limit, 0 = unlimited
    ///
    /// Only instances count. Dedup keys are kept for the whole session
    /// (until `clear` or a session reset) so a late re-emission of an old
    /// tool call is still recognized, which means the key set grows with
    /// the number of distinct keys seen.
    max_instances: usize,
    clock: Arc<dyn TimeSource>,
}

impl Default for CanvasController {
    fn default() -> Self {
        Self::new(DuplicatePolicy::default(), 0)
    }
}

impl CanvasController {
    /// Empty canvas on the system clock
    #[must_use]
    pub fn new(policy: DuplicatePolicy, max_instances: usize) -> Self {
        Self::with_clock(policy, max_instances, Arc::new(SystemClock))
    }

    /// Empty canvas on a custom clock
    #[must_use]
    pub fn with_clock(
        policy: DuplicatePolicy,
        max_instances: usize,
        clock: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            state: Mutex::new(CanvasState::default()),
            policy,
            max_instances,
            clock,
        }
    }

    /// Duplicate-id policy in force
    #[must_use]
    pub fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    /// Instance limit, 0 = unlimited
    ///
    /// Dedup keys are not counted against it.
    #[must_use]
    pub fn max_instances(&self) -> usize {
        self.max_instances
    }

    /// Admit a description; returns the full ordered list afterwards
    ///
    /// # Errors
    ///
    /// [`CanvasError::DuplicateIdConflict`] under the strict policy, and
    /// [`CanvasError::CapacityExceeded`] when appending to a full canvas.
    /// Neither changes the canvas or the dedup memory.
    pub fn admit(
        &self,
        description: ComponentDescription,
        dedup_key: Option<&str>,
    ) -> CanvasResult<Vec<CanvasInstance>> {
        self.admit_tracked(description, dedup_key)
            .map(|(_, instances)| instances)
    }

    /// Like [`admit`](Self::admit), also reporting which branch was taken
    ///
    /// # Errors
    ///
    /// Same as [`admit`](Self::admit).
    pub fn admit_tracked(
        &self,
        description: ComponentDescription,
        dedup_key: Option<&str>,
    ) -> CanvasResult<(Admission, Vec<CanvasInstance>)> {
        let mut state = self.state.lock();

        if let Some(key) = dedup_key {
            if state.seen.contains(key) {
                tracing::debug!(dedup_key = key, id = %description.id, "Duplicate emission ignored");
                return Ok((Admission::Deduplicated, state.instances.clone()));
            }
        }

        let now = self.clock.now_ms();
        let position = state
            .instances
            .iter()
            .position(|i| i.description.id == description.id);

        let admission = match position {
            Some(_) if self.policy == DuplicatePolicy::Strict => {
                tracing::warn!(id = %description.id, "Rejected duplicate component id");
                return Err(CanvasError::DuplicateIdConflict { id: description.id });
            }
            Some(index) => {
                let existing = &mut state.instances[index];
                existing.description = description;
                existing.dedup_key = dedup_key.map(str::to_string);
                existing.inserted_at = now;
                tracing::debug!(
                    id = %existing.description.id,
                    instance_id = %existing.instance_id,
                    position = index,
                    "Replaced component in place"
                );
                Admission::Replaced
            }
            None => {
                if self.max_instances != 0 && state.instances.len() >= self.max_instances {
                    tracing::warn!(
                        id = %description.id,
                        limit = self.max_instances,
                        "Canvas full"
                    );
                    return Err(CanvasError::CapacityExceeded {
                        limit: self.max_instances,
                    });
                }
                let instance = CanvasInstance {
                    instance_id: InstanceId::new(),
                    description,
                    dedup_key: dedup_key.map(str::to_string),
                    inserted_at: now,
                };
                tracing::debug!(
                    id = %instance.description.id,
                    instance_id = %instance.instance_id,
                    kind = %instance.description.kind(),
                    "Appended component"
                );
                state.instances.push(instance);
                Admission::Appended
            }
        };

        if let Some(key) = dedup_key {
            state.seen.insert(key.to_string());
        }
        Ok((admission, state.instances.clone()))
    }

    /// Empty the canvas and forget every dedup key
    ///
    /// The shared state document is not affected.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        let count = state.instances.len();
        state.clear();
        tracing::debug!(removed = count, "Canvas cleared");
    }

    /// Remove one instance by logical id
    ///
    /// Dedup keys stay remembered.
    pub fn remove(&self, id: &str) -> Option<CanvasInstance> {
        let mut state = self.state.lock();
        let index = state.instances.iter().position(|i| i.description.id == id)?;
        let removed = state.instances.remove(index);
        tracing::debug!(id = id, "Removed component");
        Some(removed)
    }

    /// Copy of the instance list, in display order
    #[must_use]
    pub fn instances(&self) -> Vec<CanvasInstance> {
        self.state.lock().instances.clone()
    }

    /// Instance with the given logical id
    #[must_use]
    pub fn get(&self, id: &str) -> Option<CanvasInstance> {
        self.state
            .lock()
            .instances
            .iter()
            .find(|i| i.description.id == id)
            .cloned()
    }

    /// Number of instances
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().instances.len()
    }

    /// Whether the canvas is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().instances.is_empty()
    }

    /// Whether a dedup key has been remembered
    #[must_use]
    pub fn has_seen(&self, dedup_key: &str) -> bool {
        self.state.lock().seen.contains(dedup_key)
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, CanvasState> {
        self.state.lock()
    }
}
