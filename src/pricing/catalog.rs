//! Material catalog
//!
//! Maps free-text material labels ("PLA Basic", "petg", ...) onto canonical
//! [`MaterialProfile`]s. Resolution order:
//!
//! 1. exact key match on the upper-cased, trimmed label
//! 2. the first entry, in catalog order, whose key occurs inside the label
//! 3. the catalog default
//!
//! Catalog order is the order entries were configured in. "PLA" listed before
//! "PLA-CF" means "PLA-CF BLACK" resolves to PLA, so more specific keys must
//! be listed first.

use crate::config::MaterialsConfig;
use crate::pricing::models::{MaterialMatch, MaterialProfile};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error, PartialEq)]
pub enum CatalogError {
    #[error("material catalog is empty")]
    Empty,
    #[error("material key cannot be empty")]
    EmptyKey,
    #[error("duplicate material key: {0}")]
    DuplicateKey(String),
    #[error("material '{0}' must have a positive cost_per_gram")]
    InvalidCost(String),
    #[error("material '{0}' must have a non-negative machine_multiplier")]
    InvalidMultiplier(String),
    #[error("default material '{0}' is not in the catalog")]
    UnknownDefault(String),
}

/// Immutable, ordered set of material profiles
#[derive(Debug, Clone)]
pub struct MaterialCatalog {
    profiles: Vec<MaterialProfile>,
    default_index: usize,
}

impl MaterialCatalog {
    pub fn new(profiles: Vec<MaterialProfile>, default_key: &str) -> Result<Self, CatalogError> {
        if profiles.is_empty() {
            return Err(CatalogError::Empty);
        }

        let profiles: Vec<MaterialProfile> = profiles
            .into_iter()
            .map(|mut profile| {
                profile.key = normalize(&profile.key);
                profile
            })
            .collect();

        for (i, profile) in profiles.iter().enumerate() {
            // An empty key would substring-match every label
            if profile.key.is_empty() {
                return Err(CatalogError::EmptyKey);
            }
            if profiles[..i].iter().any(|p| p.key == profile.key) {
                return Err(CatalogError::DuplicateKey(profile.key.clone()));
            }
            if !(profile.cost_per_gram.is_finite() && profile.cost_per_gram > 0.0) {
                return Err(CatalogError::InvalidCost(profile.key.clone()));
            }
            if !(profile.machine_multiplier.is_finite() && profile.machine_multiplier >= 0.0) {
                return Err(CatalogError::InvalidMultiplier(profile.key.clone()));
            }
        }

        let default_key = normalize(default_key);
        let default_index = profiles
            .iter()
            .position(|p| p.key == default_key)
            .ok_or(CatalogError::UnknownDefault(default_key))?;

        Ok(Self {
            profiles,
            default_index,
        })
    }

    pub fn from_config(config: &MaterialsConfig) -> Result<Self, CatalogError> {
        Self::new(profiles_from_config(config), &config.default_material)
    }

    /// Resolve a label to a profile. Never fails; unknown labels get the default.
    pub fn resolve(&self, material_type: &str) -> &MaterialProfile {
        self.resolve_detailed(material_type).0
    }

    /// Resolve a label and report which rule produced the match
    pub fn resolve_detailed(&self, material_type: &str) -> (&MaterialProfile, MaterialMatch) {
        let label = normalize(material_type);

        if let Some(profile) = self.get(&label) {
            return (profile, MaterialMatch::Exact);
        }

        if let Some(profile) = self.profiles.iter().find(|p| label.contains(p.key.as_str())) {
            debug!(label = %material_type, key = %profile.key, "Material resolved by substring");
            return (profile, MaterialMatch::Substring);
        }

        let fallback = self.default_profile();
        warn!(
            label = %material_type,
            default = %fallback.key,
            "Unrecognized material, using catalog default"
        );
        (fallback, MaterialMatch::Default)
    }

    pub fn get(&self, key: &str) -> Option<&MaterialProfile> {
        self.profiles.iter().find(|p| p.key == key)
    }

    pub fn default_profile(&self) -> &MaterialProfile {
        &self.profiles[self.default_index]
    }

    /// Profiles in resolution order
    pub fn profiles(&self) -> &[MaterialProfile] {
        &self.profiles
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

/// PLA, ABS, PETG, TPU with PLA as the default
impl Default for MaterialCatalog {
    fn default() -> Self {
        Self {
            profiles: profiles_from_config(&MaterialsConfig::default()),
            default_index: 0,
        }
    }
}

fn profiles_from_config(config: &MaterialsConfig) -> Vec<MaterialProfile> {
    config
        .catalog
        .iter()
        .map(|m| MaterialProfile {
            key: normalize(&m.key),
            display_name: m.display_name.clone().unwrap_or_else(|| m.key.clone()),
            cost_per_gram: m.cost_per_gram,
            density: m.density,
            machine_multiplier: m.machine_multiplier,
            available: m.available,
        })
        .collect()
}

fn normalize(label: &str) -> String {
    label.trim().to_uppercase()
}
