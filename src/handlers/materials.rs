use axum::{extract::State, Json};
use serde::Serialize;

use crate::handlers::AppState;
use crate::pricing::MaterialProfile;

#[derive(Debug, Serialize)]
pub struct MaterialsResponse {
    pub success: bool,
    pub materials: Vec<MaterialEntry>,
    pub default_material: String,
    pub currency: String,
    pub last_updated: String,
}

#[derive(Debug, Serialize)]
pub struct MaterialEntry {
    pub id: String,
    pub name: String,
    pub display_name: String,
    pub cost_per_gram: f64,
    pub density_g_cm3: f64,
    pub machine_multiplier: f64,
    pub available: bool,
}

impl From<&MaterialProfile> for MaterialEntry {
    fn from(profile: &MaterialProfile) -> Self {
        Self {
            id: profile.key.to_lowercase(),
            name: profile.key.clone(),
            display_name: profile.display_name.clone(),
            cost_per_gram: profile.cost_per_gram,
            density_g_cm3: profile.density,
            machine_multiplier: profile.machine_multiplier,
            available: profile.available,
        }
    }
}

/// Handle /api/v1/materials
/// Lists the catalog in resolution order
pub async fn list_materials(State(state): State<AppState>) -> Json<MaterialsResponse> {
    let engine = state.engine.load();
    let catalog = engine.catalog();

    Json(MaterialsResponse {
        success: true,
        materials: catalog.profiles().iter().map(MaterialEntry::from).collect(),
        default_material: catalog.default_profile().key.clone(),
        currency: state.config.load().pricing.currency.clone(),
        last_updated: chrono::Utc::now().to_rfc3339(),
    })
}
