//! Contact reconciliation.
//!
//! Contact definitions are authored content: names, roles, bios, portraits
//! and dialogue trees. The live state also tracks what the player has
//! learned about each contact. [`reconcile`] refreshes the authored half from
//! the latest definitions while keeping the learned half intact.
//!
//! Run it on fresh-start and bootstrap paths only. A restored snapshot
//! already holds authoritative contact state.

use crate::state::StateStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// The contact definitions document: `{ crew: {id: def}, contacts: {id: def} }`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ContactDefinitions {
    pub crew: BTreeMap<String, ContactDefinition>,
    pub contacts: BTreeMap<String, ContactDefinition>,
}

/// One authored contact. Dynamic fields here are only defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContactDefinition {
    pub id: Option<String>,
    pub name: String,
    pub role: String,
    pub bio: String,
    pub image: Option<String>,
    pub dialogue_options: Value,
    pub communicator: Option<bool>,
    pub known: Option<bool>,
    pub contextual: Option<Vec<Value>>,
}

/// A contact as stored in the state tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactRecord {
    pub id: String,
    pub name: String,
    pub role: String,
    pub bio: String,
    pub image: Option<String>,
    pub dialogue_options: Value,
    pub communicator: bool,
    pub known: bool,
    pub contextual: Vec<Value>,
}

/// Which branch of `contacts` a definition belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactGroup {
    Crew,
    External,
}

impl ContactGroup {
    /// Key under `contacts` in the state tree.
    pub fn key(self) -> &'static str {
        match self {
            Self::Crew => "crew",
            Self::External => "external",
        }
    }

    /// Crew are on the communicator by default; outsiders are not.
    fn default_communicator(self) -> bool {
        matches!(self, Self::Crew)
    }
}

impl ContactDefinitions {
    /// Parse a definitions document.
    pub fn from_value(doc: &Value) -> serde_json::Result<Self> {
        serde_json::from_value(doc.clone())
    }
}

/// Merge one definition with the live record (if any) for the same contact.
///
/// Authored fields always come from `def`. Dynamic fields come from `live`
/// when present there, then from `def`, then from the group default.
pub fn merge_contact(
    id: &str,
    def: &ContactDefinition,
    live: Option<&Value>,
    group: ContactGroup,
) -> ContactRecord {
    let live_bool = |field: &str| live.and_then(|l| l.get(field)).and_then(Value::as_bool);
    let live_contextual = live
        .and_then(|l| l.get("contextual"))
        .and_then(Value::as_array)
        .cloned();

    ContactRecord {
        id: def.id.clone().unwrap_or_else(|| id.to_string()),
        name: def.name.clone(),
        role: def.role.clone(),
        bio: def.bio.clone(),
        image: def.image.clone(),
        dialogue_options: def.dialogue_options.clone(),
        communicator: live_bool("communicator")
            .or(def.communicator)
            .unwrap_or(group.default_communicator()),
        known: live_bool("known").or(def.known).unwrap_or(false),
        contextual: live_contextual
            .or_else(|| def.contextual.clone())
            .unwrap_or_default(),
    }
}

/// Write every definition into `store`, preserving dynamic contact state.
pub fn reconcile(defs: &ContactDefinitions, store: &mut StateStore) {
    let groups = [
        (ContactGroup::Crew, &defs.crew),
        (ContactGroup::External, &defs.contacts),
    ];

    for (group, definitions) in groups {
        for (id, def) in definitions {
            let live = store
                .state()
                .get("contacts")
                .and_then(|c| c.get(group.key()))
                .and_then(|g| g.get(id))
                .cloned();
            let record = merge_contact(id, def, live.as_ref(), group);

            match serde_json::to_value(&record) {
                Ok(value) => store.set_at(&["contacts", group.key(), id.as_str()], value),
                Err(e) => debug!(contact = %id, error = %e, "skipping unserializable contact"),
            }
        }
    }

    debug!(
        crew = defs.crew.len(),
        external = defs.contacts.len(),
        "reconciled contact definitions"
    );
}
