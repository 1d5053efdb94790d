//! Cartridge compatibility database
//!
//! Some cartridges need timing or device settings their header does not
//! describe. The database is a JSON object keyed by the lowercase MD5 digest
//! of the image; each entry lists only the settings it overrides:
//!
//! ```json
//! {
//!   "0123456789abcdef0123456789abcdef": { "cycle_stealing": false, "hblank": 28 }
//! }
//! ```

use crate::cartridge::CartridgeScheme;
use crate::region::Region;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Invalid compatibility database: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Settings that replace the header-derived defaults for one cartridge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QuirkOverrides {
    pub title: Option<String>,
    pub scheme: Option<CartridgeScheme>,
    pub pokey: Option<bool>,
    pub region: Option<Region>,
    pub wsync: Option<bool>,
    pub cycle_stealing: Option<bool>,
    pub light_gun: Option<bool>,
    pub hblank: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompatibilityDatabase {
    cartridges: HashMap<String, QuirkOverrides>,
}

impl CompatibilityDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(text: &str) -> Result<Self, DatabaseError> {
        let mut db: Self = serde_json::from_str(text)?;
        // Digests are compared in lowercase
        db.cartridges = db
            .cartridges
            .into_iter()
            .map(|(digest, entry)| (digest.to_ascii_lowercase(), entry))
            .collect();
        Ok(db)
    }

    pub fn lookup(&self, digest: &str) -> Option<&QuirkOverrides> {
        self.cartridges.get(digest)
    }

    pub fn insert(&mut self, digest: &str, overrides: QuirkOverrides) {
        self.cartridges.insert(digest.to_ascii_lowercase(), overrides);
    }

    pub fn len(&self) -> usize {
        self.cartridges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cartridges.is_empty()
    }
}
