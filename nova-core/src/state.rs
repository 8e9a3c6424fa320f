//! The canonical world-state store.
//!
//! [`StateStore`] owns the single mutable state tree for the simulation.
//! All reads and writes go through it, and every mutation synchronously
//! notifies registered observers in subscription order.
//!
//! The store is single-threaded: observers are plain `FnMut` closures and
//! may capture `Rc`/`RefCell` handles from the UI side.

use crate::error::{LogbookError, Result};
use crate::value::{assign, deep_merge, lookup, merged, split_path};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, error, warn};

/// Top-level fields captured by a [`Snapshot`].
pub const SNAPSHOT_FIELDS: [&str; 9] = [
    "navigation",
    "shipSystems",
    "crew",
    "mission",
    "environment",
    "contacts",
    "progress",
    "inventory",
    "settings",
];

/// Build the default world-state tree.
///
/// Every merge into the store starts from (or is backfilled by) this shape,
/// so fields added here appear in trees restored from older snapshots.
pub fn default_state() -> Value {
    json!({
        "navigation": {
            "depth": 0.0,
            "maxDepth": 6000.0,
            "heading": 0.0,
            "speed": 0.0,
            "position": { "lat": 0.0, "lon": 0.0 },
            "destination": null,
            "autopilot": false
        },
        "shipSystems": {
            "power": { "main": 100.0, "reserve": 100.0 },
            "hull": { "integrity": 100.0, "pressure": 1.0 },
            "lifeSupport": { "oxygen": 100.0, "co2Scrubbers": true },
            "propulsion": { "status": "nominal", "thrust": 0.0 },
            "sensors": { "sonar": true, "lidar": false, "range": 500.0 },
            "communications": { "surfaceLink": true, "signalStrength": 100.0 }
        },
        "crew": {
            "complement": 4,
            "morale": 80.0,
            "fatigue": 0.0,
            "onDuty": []
        },
        "mission": {
            "id": null,
            "title": "",
            "phase": "predive",
            "objectives": [],
            "completedObjectives": []
        },
        "environment": {
            "waterTemperature": 4.0,
            "salinity": 35.0,
            "visibility": 10.0,
            "current": { "speed": 0.0, "direction": 0.0 },
            "timeOfDay": "06:00"
        },
        "contacts": {
            "crew": {},
            "external": {}
        },
        "progress": {
            "chapter": 1,
            "flags": {},
            "discoveries": []
        },
        "settings": {
            "units": "metric",
            "audio": true,
            "textSpeed": "normal"
        },
        "inventory": {
            "samples": [],
            "equipment": [],
            "consumables": {}
        },
        "lastUpdated": Utc::now().to_rfc3339()
    })
}

/// An immutable deep copy of the snapshot field set at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// When the snapshot was taken.
    #[serde(default)]
    pub timestamp: String,

    /// The captured top-level fields, keyed by their tree names.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Snapshot {
    /// Read a captured field by dot-path, e.g. `navigation.depth`.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let segments = split_path(path);
        let (first, rest) = segments.split_first()?;
        lookup(self.fields.get(*first)?, rest)
    }

    /// The snapshot as a single object value (without its timestamp).
    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}

/// Capability of producing and restoring point-in-time snapshots.
pub trait Stateful {
    /// Capture the current state.
    fn snapshot(&self) -> Result<Snapshot>;

    /// Replace the current state with `snapshot`, backfilling absent fields from defaults.
    fn restore(&mut self, snapshot: &Snapshot) -> Result<()>;
}

/// Handle returned by [`StateStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Observer = Box<dyn FnMut(&Value)>;

/// The single source of truth for world state.
pub struct StateStore {
    state: Value,
    observers: Vec<(SubscriptionId, Observer)>,
    next_subscription: u64,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore")
            .field("state", &self.state)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl StateStore {
    /// Create a store holding the default tree.
    pub fn new() -> Self {
        Self {
            state: default_state(),
            observers: Vec::new(),
            next_subscription: 0,
        }
    }

    /// The whole tree.
    pub fn state(&self) -> &Value {
        &self.state
    }

    /// Read the value at a dot-path. Absence is not an error.
    pub fn get(&self, path: &str) -> Option<&Value> {
        lookup(&self.state, &split_path(path))
    }

    /// Read and deserialize the value at a dot-path.
    ///
    /// Returns `None` when the path is absent or the value has the wrong shape.
    pub fn get_as<T: DeserializeOwned>(&self, path: &str) -> Option<T> {
        self.get(path)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Write `value` at a dot-path, creating intermediate objects.
    pub fn set(&mut self, path: &str, value: Value) {
        self.set_at(&split_path(path), value);
    }

    /// Write `value` at pre-split path segments.
    ///
    /// Use this when a segment (such as a contact id) may itself contain dots.
    /// An empty path is ignored; whole-tree writes go through [`Self::replace`].
    pub fn set_at(&mut self, segments: &[&str], value: Value) {
        if !assign(&mut self.state, segments, value) {
            warn!("ignoring state write with an empty path");
            return;
        }
        self.touch();
        self.notify();
    }

    /// Deep-merge `partial` onto the current tree.
    pub fn replace(&mut self, partial: &Value) -> Result<()> {
        if !partial.is_object() {
            return Err(LogbookError::InvalidStructure(
                "state replacement must be an object".to_string(),
            ));
        }
        deep_merge(&mut self.state, partial);
        self.touch();
        self.notify();
        Ok(())
    }

    /// Replace the live tree with defaults merged under `value`.
    ///
    /// Fields missing from `value` are backfilled from [`default_state`].
    pub fn restore_value(&mut self, value: &Value) -> Result<()> {
        if !value.is_object() {
            return Err(LogbookError::InvalidStructure(
                "snapshot must be an object".to_string(),
            ));
        }
        self.state = merged(&default_state(), value);
        self.touch();
        self.notify();
        Ok(())
    }

    /// Replace the tree with fresh defaults.
    pub fn reset(&mut self) {
        self.state = default_state();
        self.notify();
    }

    /// Register an observer. It is called after every mutation.
    pub fn subscribe(&mut self, observer: impl FnMut(&Value) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    /// Remove an observer. Returns whether it was registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(existing, _)| *existing != id);
        self.observers.len() != before
    }

    /// Number of registered observers.
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Call every observer with the current tree.
    ///
    /// A panicking observer is logged and skipped; the rest still run.
    pub fn notify(&mut self) {
        let state = &self.state;
        for (id, observer) in &mut self.observers {
            let outcome = catch_unwind(AssertUnwindSafe(|| observer(state)));
            if outcome.is_err() {
                error!(subscription = id.0, "state observer panicked during notification");
            }
        }
    }

    fn touch(&mut self) {
        if let Value::Object(map) = &mut self.state {
            map.insert("lastUpdated".to_string(), json!(Utc::now().to_rfc3339()));
        }
    }
}

impl Stateful for StateStore {
    fn snapshot(&self) -> Result<Snapshot> {
        let Value::Object(map) = &self.state else {
            return Err(LogbookError::SnapshotFailed(
                "state tree is not an object".to_string(),
            ));
        };

        let fields = SNAPSHOT_FIELDS
            .iter()
            .filter_map(|key| map.get(*key).map(|v| (key.to_string(), v.clone())))
            .collect();

        Ok(Snapshot {
            timestamp: Utc::now().to_rfc3339(),
            fields,
        })
    }

    fn restore(&mut self, snapshot: &Snapshot) -> Result<()> {
        debug!(taken_at = %snapshot.timestamp, "restoring state from snapshot");
        self.restore_value(&snapshot.to_value())
    }
}
