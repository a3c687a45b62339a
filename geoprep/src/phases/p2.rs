//! P2: pipeline orchestrator (C7). Drains the offer stream in batches of
//! 100, resolves identity per batch, finalizes each offer under bounded
//! concurrency, and owns the four shared output maps from a single task so
//! no per-key locking is needed.

use crate::error::PipelineError;
use crate::files::write_json;
use futures::stream::{self, StreamExt};
use geoprep_core::domain::{CompanyLocation, OfferRecord, RawOffer, Sector, StopLink, StopLinkStation, StopRefEntry};
use geoprep_core::ids;
use geoprep_core::settings::Settings;
use geoprep_core::stop_grid::StopGrid;
use geoprep_offers::IdentityResolver;
use geoprep_store::Store;
use kdam::{tqdm, BarExt};
use std::collections::HashMap;

const BATCH_SIZE: usize = 100;
const FINALIZATION_CONCURRENCY: usize = 20;
const NEARBY_RADIUS_M: f64 = 2000.0;
const MAX_STATIONS: usize = 10;

struct FinalizationResult {
    storage_id: String,
    candidate_location: CompanyLocation,
    candidate_stop_link: StopLink,
    stop_ref_entries: Vec<(String, StopRefEntry)>,
    offer_record: OfferRecord,
}

fn finalize_offer(offer: &RawOffer, stop_grid: &StopGrid) -> FinalizationResult {
    let lat = offer.effective_lat();
    let lon = offer.effective_lon();
    let siret = offer.resolved.as_ref().map(|r| r.siret.clone());
    let company_name = offer.company_name_or_default();
    let storage_id = ids::storage_id(siret.as_deref(), Some(&company_name), lat, lon);
    let is_virtual = ids::is_virtual(&storage_id);

    let mut nearby = stop_grid.find_nearby(lat, lon, NEARBY_RADIUS_M);
    nearby.truncate(MAX_STATIONS);

    let stations: Vec<StopLinkStation> = nearby
        .iter()
        .map(|n| StopLinkStation {
            id: n.stop.stop_id.clone(),
            distance_m: n.distance_m,
            modes: Vec::new(),
            lines: Vec::new(),
        })
        .collect();
    let stop_ref_entries = nearby
        .iter()
        .map(|n| (n.stop.stop_id.clone(), StopRefEntry::from(&n.stop)))
        .collect();

    let resolved = offer.resolved.as_ref();
    let candidate_location = CompanyLocation {
        storage_id: storage_id.clone(),
        siret,
        lat,
        lon,
        company: company_name,
        sector: resolved.map(|r| r.sector.clone()).unwrap_or_else(Sector::default),
        size: resolved.and_then(|r| r.size.clone()),
        is_virtual,
        is_public: resolved.map(|r| r.is_public).unwrap_or(false),
        stations_count: stations.len(),
        offers_count: 0,
        transport_modes: Vec::new(),
        transport_score: 0.0,
    };
    let candidate_stop_link = StopLink {
        radius: NEARBY_RADIUS_M,
        stations,
    };

    FinalizationResult {
        storage_id,
        candidate_location,
        candidate_stop_link,
        stop_ref_entries,
        offer_record: OfferRecord::from(offer),
    }
}

pub async fn run(
    settings: &Settings,
    store: &Store,
    stop_grid: &StopGrid,
    dry_run: bool,
) -> Result<(), PipelineError> {
    let (tx, mut rx) = tokio::sync::mpsc::channel::<RawOffer>(1);
    let reader_path = settings.path_source_offers_json.clone();
    let reader_handle = tokio::spawn(geoprep_offers::reader::read_into(reader_path, tx));

    let resolver = IdentityResolver::new(store);
    let mut companies: HashMap<String, CompanyLocation> = HashMap::new();
    let mut offers_by_storage: HashMap<String, Vec<OfferRecord>> = HashMap::new();
    let mut stop_links: HashMap<String, StopLink> = HashMap::new();
    let mut global_stops_ref: HashMap<String, StopRefEntry> = HashMap::new();
    let mut pbar = tqdm!(desc = "p2-enrich");

    let mut batch = Vec::with_capacity(BATCH_SIZE);
    while let Some(offer) = rx.recv().await {
        batch.push(offer);
        if batch.len() >= BATCH_SIZE {
            process_batch(
                &resolver,
                stop_grid,
                &mut batch,
                &mut companies,
                &mut offers_by_storage,
                &mut stop_links,
                &mut global_stops_ref,
                &mut pbar,
            )
            .await?;
        }
    }
    if !batch.is_empty() {
        process_batch(
            &resolver,
            stop_grid,
            &mut batch,
            &mut companies,
            &mut offers_by_storage,
            &mut stop_links,
            &mut global_stops_ref,
            &mut pbar,
        )
        .await?;
    }
    pbar.refresh().ok();

    reader_handle.await.expect("offer reader task panicked")?;

    let offer_count: usize = offers_by_storage.values().map(Vec::len).sum();
    log::info!(
        "p2-enrich complete: {} locations, {offer_count} offers",
        companies.len()
    );

    if !dry_run {
        write_outputs(settings, &companies, &offers_by_storage, &stop_links, &global_stops_ref)?;
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn process_batch(
    resolver: &IdentityResolver<'_>,
    stop_grid: &StopGrid,
    batch: &mut Vec<RawOffer>,
    companies: &mut HashMap<String, CompanyLocation>,
    offers_by_storage: &mut HashMap<String, Vec<OfferRecord>>,
    stop_links: &mut HashMap<String, StopLink>,
    global_stops_ref: &mut HashMap<String, StopRefEntry>,
    pbar: &mut kdam::Bar,
) -> Result<(), PipelineError> {
    resolver.enrich_batch(batch).await?;

    let results: Vec<FinalizationResult> = stream::iter(batch.drain(..))
        .map(|offer| async move { finalize_offer(&offer, stop_grid) })
        .buffer_unordered(FINALIZATION_CONCURRENCY)
        .collect()
        .await;

    for result in results {
        companies
            .entry(result.storage_id.clone())
            .or_insert(result.candidate_location);
        stop_links
            .entry(result.storage_id.clone())
            .or_insert(result.candidate_stop_link);
        for (stop_id, entry) in result.stop_ref_entries {
            global_stops_ref.entry(stop_id).or_insert(entry);
        }
        offers_by_storage
            .entry(result.storage_id.clone())
            .or_default()
            .push(result.offer_record);
        if let Some(location) = companies.get_mut(&result.storage_id) {
            location.offers_count += 1;
        }
        pbar.update(1).ok();
    }
    Ok(())
}

fn write_outputs(
    settings: &Settings,
    companies: &HashMap<String, CompanyLocation>,
    offers_by_storage: &HashMap<String, Vec<OfferRecord>>,
    stop_links: &HashMap<String, StopLink>,
    global_stops_ref: &HashMap<String, StopRefEntry>,
) -> Result<(), PipelineError> {
    let features: Vec<serde_json::Value> = companies.values().map(CompanyLocation::to_geojson_feature).collect();
    let feature_collection = serde_json::json!({"type": "FeatureCollection", "features": features});
    write_json(&settings.path_output_companies_geojson, &feature_collection)?;
    write_json(&settings.path_output_offers_by_siret, offers_by_storage)?;
    write_json(&settings.path_output_transport_stops, global_stops_ref)?;
    write_json(&settings.path_output_stops_by_siret, stop_links)?;
    Ok(())
}
