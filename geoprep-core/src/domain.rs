//! Domain types shared across the pipeline phases. Mirrors §3 of the pipeline
//! specification: one struct per named entity, kept intentionally thin so each
//! owning component (loaders, resolver, orchestrator, graph builder) can build
//! and mutate these without reaching into another component's internals.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single offer as read off the stream, after normalization but before
/// identity resolution. Offers without a usable location are dropped before
/// this type is constructed (see `geoprep-offers`'s reader).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawOffer {
    pub offer_id: String,
    pub siret: Option<String>,
    pub company_name: Option<String>,
    pub workplace_address: Option<String>,
    pub lat: f64,
    pub lon: f64,
    pub title: Option<String>,
    pub contract_type: Option<String>,
    pub contract_start: Option<String>,
    pub contract_duration: Option<String>,
    pub target_diploma: Option<String>,
    pub desired_skills: Option<String>,
    pub apply_url: Option<String>,
    pub description: Option<String>,
    pub access_conditions: Option<String>,
    pub naf_code: Option<String>,
    /// Fields filled in by the identity resolver; `None` until resolved.
    pub resolved: Option<ResolvedCompany>,
}

impl RawOffer {
    pub fn company_name_or_default(&self) -> String {
        self.resolved
            .as_ref()
            .map(|r| r.company_name.clone())
            .or_else(|| self.company_name.clone())
            .unwrap_or_else(|| "Inconnu".to_string())
    }

    pub fn effective_lat(&self) -> f64 {
        self.resolved.as_ref().and_then(|r| r.lat).unwrap_or(self.lat)
    }

    pub fn effective_lon(&self) -> f64 {
        self.resolved.as_ref().and_then(|r| r.lon).unwrap_or(self.lon)
    }
}

/// Registry fields grafted onto an offer once a SIRET match is found.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedCompany {
    pub siret: String,
    pub company_name: String,
    pub size: Option<String>,
    pub sector: Sector,
    pub is_public: bool,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

/// A row of the national company registry, as read back from the analytical
/// store. Only the fields the pipeline actually consumes are carried.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryRow {
    pub siret: String,
    pub siren: String,
    pub is_active: bool,
    pub legal_name: Option<String>,
    pub usual_name: Option<String>,
    pub sign_name: Option<String>,
    pub postal_code: Option<String>,
    pub commune_label: Option<String>,
    pub size_tranche: Option<String>,
    pub naf_code: Option<String>,
    pub sector_section: Option<String>,
    pub legal_category: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

impl RegistryRow {
    /// `isPublic` is driven by the legal category prefix per spec §3.
    pub fn is_public(&self) -> bool {
        self.legal_category
            .as_deref()
            .map(|c| c.starts_with('7') || c.starts_with('4'))
            .unwrap_or(false)
    }

    pub fn best_name(&self) -> Option<String> {
        self.legal_name
            .clone()
            .or_else(|| self.usual_name.clone())
            .or_else(|| self.sign_name.clone())
    }
}

/// A transport stop as read from the stops catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stop {
    pub stop_id: String,
    pub stop_name: String,
    pub lat: f64,
    pub lon: f64,
    pub location_type: Option<i32>,
    pub dataset_id: Option<String>,
    pub resource_id: Option<String>,
    pub dataset_datagouv_id: Option<String>,
    pub resource_datagouv_id: Option<String>,
    pub dataset_custom_title: Option<String>,
}

/// Sector classification carried on `CompanyLocation` and `ResolvedCompany`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Sector {
    pub section: Option<String>,
    pub naf: Option<String>,
    pub label: Option<String>,
}

/// One (employer, location) point in the output FeatureCollection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyLocation {
    pub storage_id: String,
    pub siret: Option<String>,
    pub lat: f64,
    pub lon: f64,
    pub company: String,
    pub sector: Sector,
    pub size: Option<String>,
    pub is_virtual: bool,
    pub is_public: bool,
    pub stations_count: usize,
    pub offers_count: u64,
    pub transport_modes: Vec<String>,
    pub transport_score: f64,
}

impl CompanyLocation {
    pub fn to_geojson_feature(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "Feature",
            "id": self.storage_id,
            "geometry": {
                "type": "Point",
                "coordinates": [self.lon, self.lat],
            },
            "properties": {
                "siret": self.siret,
                "storage_id": self.storage_id,
                "company": self.company,
                "sector": {
                    "section": self.sector.section,
                    "naf": self.sector.naf,
                    "label": self.sector.label,
                },
                "size": self.size,
                "is_virtual": self.is_virtual,
                "transport_score": self.transport_score,
                "isPublic": self.is_public,
                "stations_count": self.stations_count,
                "offers_count": self.offers_count,
                "transport_modes": self.transport_modes,
            },
        })
    }
}

/// One entry in a `StopLink`'s ordered station list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopLinkStation {
    pub id: String,
    #[serde(rename = "distance")]
    pub distance_m: f64,
    #[serde(default)]
    pub modes: Vec<String>,
    #[serde(default)]
    pub lines: Vec<String>,
}

/// Per-location record of nearby stops, ordered by ascending distance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopLink {
    pub radius: f64,
    pub stations: Vec<StopLinkStation>,
}

/// The offer-facing output record stored in `offers_by_siret.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferRecord {
    pub offer_id: String,
    pub title: Option<String>,
    pub contract_type: Option<String>,
    pub offer_description: Option<String>,
    pub apply_url: Option<String>,
    pub target_diploma: Option<String>,
    pub contract_duration: Option<String>,
    pub contract_start: Option<String>,
    pub access_conditions: Option<String>,
    pub desired_skills: Option<String>,
}

impl From<&RawOffer> for OfferRecord {
    fn from(o: &RawOffer) -> Self {
        Self {
            offer_id: o.offer_id.clone(),
            title: o.title.clone(),
            contract_type: o.contract_type.clone(),
            offer_description: o.description.clone(),
            apply_url: o.apply_url.clone(),
            target_diploma: o.target_diploma.clone(),
            contract_duration: o.contract_duration.clone(),
            contract_start: o.contract_start.clone(),
            access_conditions: o.access_conditions.clone(),
            desired_skills: o.desired_skills.clone(),
        }
    }
}

/// Entry written into the global stops-ref output file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopRefEntry {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub dataset_source_name: Option<String>,
    pub dataset_id: Option<String>,
    pub resource_id: Option<String>,
    pub dataset_datagouv_id: Option<String>,
    pub resource_datagouv_id: Option<String>,
}

impl From<&Stop> for StopRefEntry {
    fn from(s: &Stop) -> Self {
        Self {
            name: s.stop_name.clone(),
            lat: s.lat,
            lon: s.lon,
            dataset_source_name: s.dataset_custom_title.clone(),
            dataset_id: s.dataset_id.clone(),
            resource_id: s.resource_id.clone(),
            dataset_datagouv_id: s.dataset_datagouv_id.clone(),
            resource_datagouv_id: s.resource_datagouv_id.clone(),
        }
    }
}

/// Modes a `TransitEdge` can carry, per spec §3.
pub mod mode {
    pub const BUS: &str = "Bus";
    pub const METRO: &str = "Métro";
    pub const TRAM: &str = "Tram";
    pub const TRAIN: &str = "Train";
    pub const FERRY: &str = "Ferry";
    pub const FUNICULAIRE: &str = "Funiculaire";
    pub const WALK: &str = "WALK";
}

/// One directed edge of the routable transport graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitEdge {
    pub node: String,
    pub weight: u64,
    #[serde(rename = "type")]
    pub kind: String,
    pub line: String,
    pub headsign: String,
}

/// A master station of the routable graph, keyed by `parent_station` when set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

/// The full serialized routing graph.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TransitGraph {
    pub nodes: BTreeMap<String, GraphNode>,
    pub adjacency: BTreeMap<String, Vec<TransitEdge>>,
}
