//! Dataset aggregator (C8). Collects the distinct GTFS resources referenced
//! by the stops-ref output of P2, deduplicated by `resource_datagouv_id`.

use geoprep_core::domain::StopRefEntry;
use itertools::Itertools;
use std::collections::HashMap;

/// One GTFS resource worth fetching, carrying enough identity to build both
/// the `data.gouv.fr` direct-file URL and the `transport.data.gouv.fr`
/// fallback URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetRef {
    pub dataset_id: Option<String>,
    pub resource_id: Option<String>,
    pub dataset_datagouv_id: Option<String>,
    pub resource_datagouv_id: String,
    pub dataset_custom_title: Option<String>,
}

/// Returns the distinct datasets referenced by `stops_ref`, in first-seen
/// order. Entries with no `resource_datagouv_id` cannot be downloaded and
/// are silently skipped, per spec §4.8.
pub fn distinct_datasets(stops_ref: &HashMap<String, StopRefEntry>) -> Vec<DatasetRef> {
    stops_ref
        .values()
        .filter_map(|stop| {
            stop.resource_datagouv_id.clone().map(|resource_datagouv_id| DatasetRef {
                dataset_id: stop.dataset_id.clone(),
                resource_id: stop.resource_id.clone(),
                dataset_datagouv_id: stop.dataset_datagouv_id.clone(),
                resource_datagouv_id,
                dataset_custom_title: stop.dataset_source_name.clone(),
            })
        })
        .sorted_by_cached_key(|d| d.resource_datagouv_id.clone())
        .dedup_by(|a, b| a.resource_datagouv_id == b.resource_datagouv_id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(resource_datagouv_id: Option<&str>) -> StopRefEntry {
        StopRefEntry {
            name: "Gare".to_string(),
            lat: 48.8,
            lon: 2.3,
            dataset_source_name: None,
            dataset_id: Some("d1".to_string()),
            resource_id: Some("r1".to_string()),
            dataset_datagouv_id: Some("dd1".to_string()),
            resource_datagouv_id: resource_datagouv_id.map(|s| s.to_string()),
        }
    }

    #[test]
    fn dedups_by_resource_datagouv_id_and_skips_missing() {
        let mut stops = HashMap::new();
        stops.insert("s1".to_string(), entry(Some("res-1")));
        stops.insert("s2".to_string(), entry(Some("res-1")));
        stops.insert("s3".to_string(), entry(Some("res-2")));
        stops.insert("s4".to_string(), entry(None));

        let datasets = distinct_datasets(&stops);
        assert_eq!(datasets.len(), 2);
        let ids: Vec<&str> = datasets.iter().map(|d| d.resource_datagouv_id.as_str()).collect();
        assert!(ids.contains(&"res-1"));
        assert!(ids.contains(&"res-2"));
    }
}
