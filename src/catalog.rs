//! Seed-catalog record types.
//!
//! These are the static reference lists the host application supplies:
//! machine, resource, frontend and backend definitions. The session core
//! only cares about them as rows to seed; their lab-automation semantics
//! live elsewhere.

use serde::{Deserialize, Serialize};

/// A machine definition (e.g. a liquid handler model).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineDef {
    /// Stable identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Vendor name, if known.
    #[serde(default)]
    pub vendor: Option<String>,
}

/// A resource definition (e.g. a plate or tip-rack type).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDef {
    /// Stable identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Resource category (plate, tip_rack, trough, ...).
    pub category: String,
}

/// A frontend definition (a user-facing machine interface).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontendDef {
    /// Stable identifier.
    pub id: String,
    /// Display name.
    pub name: String,
}

/// A backend definition (a machine driver).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendDef {
    /// Stable identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Driver kind (simulator, vendor, ...).
    pub kind: String,
}

/// The four parallel definition lists supplied by the host application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedCatalogs {
    #[serde(default)]
    pub machines: Vec<MachineDef>,
    #[serde(default)]
    pub resources: Vec<ResourceDef>,
    #[serde(default)]
    pub frontends: Vec<FrontendDef>,
    #[serde(default)]
    pub backends: Vec<BackendDef>,
}

impl SeedCatalogs {
    /// True when there is nothing to seed.
    pub fn is_empty(&self) -> bool {
        self.machines.is_empty()
            && self.resources.is_empty()
            && self.frontends.is_empty()
            && self.backends.is_empty()
    }

    /// Total number of definition rows across all four lists.
    pub fn len(&self) -> usize {
        self.machines.len() + self.resources.len() + self.frontends.len() + self.backends.len()
    }
}
