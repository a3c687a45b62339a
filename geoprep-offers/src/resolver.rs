//! Identity resolver (C5). Maps each offer in a batch to a registry row,
//! SIRET-first with a cascading name+zip+geo fallback, per spec §4.5.

use futures::stream::{self, StreamExt};
use geoprep_core::domain::{RawOffer, RegistryRow, ResolvedCompany, Sector};
use geoprep_core::ids::round4;
use geoprep_core::similarity::normalized_similarity;
use geoprep_store::registry::{self, columns};
use geoprep_store::Store;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::OffersError;
use crate::reader::extract_postal_code;

const IDENTITY_CONCURRENCY: usize = 5;
const GEO_AND_NAME_BOX_DEG: f64 = 0.02;
const SIMILARITY_BOX_DEG: f64 = 0.001;
const SIMILARITY_THRESHOLD: f64 = 0.5;
const SPATIAL_CANDIDATE_LIMIT: i64 = 15;

/// `(cleaned_name, postal_code, rounded_lat)` — the cascade memoization key
/// from spec §4.5. Rounding the latitude keeps the key finite-cardinality
/// without losing the "coordinates known" distinction the spec calls for.
type CascadeKey = (String, String, String);

pub struct IdentityResolver<'a> {
    store: &'a Store,
    siret_cache: Mutex<HashMap<String, Option<RegistryRow>>>,
    cascade_cache: Mutex<HashMap<CascadeKey, Option<String>>>,
}

impl<'a> IdentityResolver<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self {
            store,
            siret_cache: Mutex::new(HashMap::new()),
            cascade_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Enriches a batch of up to 100 offers in place. Pre-fetches every
    /// not-yet-cached SIRET in one query, then resolves each offer under a
    /// bounded concurrency of 5.
    pub async fn enrich_batch(&self, offers: &mut [RawOffer]) -> Result<(), OffersError> {
        self.prefetch_sirets(offers)?;

        let resolved: Vec<(usize, Option<ResolvedCompany>)> =
            stream::iter(offers.iter().enumerate().map(|(idx, o)| (idx, o.clone())))
                .map(|(idx, offer)| async move { (idx, self.resolve_one(&offer)) })
                .buffer_unordered(IDENTITY_CONCURRENCY)
                .collect()
                .await;

        for (idx, resolved_company) in resolved {
            offers[idx].resolved = resolved_company;
        }
        Ok(())
    }

    fn prefetch_sirets(&self, offers: &[RawOffer]) -> Result<(), OffersError> {
        let mut cache = self.siret_cache.lock().expect("siret cache poisoned");
        let mut missing: Vec<String> = offers
            .iter()
            .filter_map(|o| o.siret.clone())
            .filter(|s| !cache.contains_key(s))
            .collect();
        missing.sort_unstable();
        missing.dedup();
        drop(cache);

        if missing.is_empty() {
            return Ok(());
        }

        let placeholders = vec!["?"; missing.len()].join(", ");
        let sql = format!(
            "SELECT {} FROM {} WHERE {} IN ({placeholders})",
            registry::SELECT_COLUMNS,
            registry::TABLE,
            columns::SIRET,
        );
        let params: Vec<&dyn duckdb::ToSql> =
            missing.iter().map(|s| s as &dyn duckdb::ToSql).collect();
        let rows = self.store.query(&sql, &params, registry::map_row)?;

        let mut found: HashMap<String, RegistryRow> =
            rows.into_iter().map(|r| (r.siret.clone(), r)).collect();

        let mut cache = self.siret_cache.lock().expect("siret cache poisoned");
        for siret in missing {
            let row = found.remove(&siret);
            cache.insert(siret, row);
        }
        Ok(())
    }

    /// Resolves one offer. Any SQL failure along the cascade is treated as
    /// a miss for that step, per spec §4.5, rather than propagated.
    fn resolve_one(&self, offer: &RawOffer) -> Option<ResolvedCompany> {
        if let Some(siret) = &offer.siret {
            if let Some(cached) = self.cached_row(siret) {
                return Some(to_resolved(&cached));
            }
        }

        let address = offer.workplace_address.as_deref()?;
        let postal_code = extract_postal_code(address)?;
        let cleaned_name = clean_name(offer.company_name.as_deref().unwrap_or(""));
        let key = (cleaned_name.clone(), postal_code.clone(), format!("{:.4}", round4(offer.lat)));

        let found_siret = {
            let mut cache = self.cascade_cache.lock().expect("cascade cache poisoned");
            if let Some(existing) = cache.get(&key) {
                existing.clone()
            } else {
                let result =
                    self.run_cascade(&cleaned_name, &postal_code, offer.lat, offer.lon);
                cache.insert(key, result.clone());
                result
            }
        };

        let siret = found_siret?;
        self.fetch_by_siret(&siret).map(|row| to_resolved(&row))
    }

    fn run_cascade(&self, cleaned_name: &str, postal_code: &str, lat: f64, lon: f64) -> Option<String> {
        if let Some(siret) = self.name_and_geo_search(cleaned_name, postal_code, lat, lon) {
            return Some(siret);
        }
        self.spatial_similarity_search(cleaned_name, postal_code, lat, lon)
    }

    /// Step (c): active rows, exact postal code, ±0.02° box, case-insensitive
    /// substring match against legal or sign name.
    fn name_and_geo_search(&self, cleaned_name: &str, postal_code: &str, lat: f64, lon: f64) -> Option<String> {
        if cleaned_name.is_empty() {
            return None;
        }
        let sql = format!(
            "SELECT siret FROM {table} \
             WHERE {status} = 'A' \
               AND {postal} = ? \
               AND {lat_col} BETWEEN ? AND ? \
               AND {lon_col} BETWEEN ? AND ? \
               AND (LOWER({legal}) LIKE ? OR LOWER({sign}) LIKE ?) \
             LIMIT 1",
            table = registry::TABLE,
            status = columns::STATUS,
            postal = columns::POSTAL_CODE,
            lat_col = columns::LAT_CACHED,
            lon_col = columns::LON_CACHED,
            legal = columns::LEGAL_NAME,
            sign = columns::SIGN_NAME,
        );
        let like_pattern = format!("%{cleaned_name}%");
        let lat_min = lat - GEO_AND_NAME_BOX_DEG;
        let lat_max = lat + GEO_AND_NAME_BOX_DEG;
        let lon_min = lon - GEO_AND_NAME_BOX_DEG;
        let lon_max = lon + GEO_AND_NAME_BOX_DEG;
        let params: Vec<&dyn duckdb::ToSql> = vec![
            &postal_code,
            &lat_min,
            &lat_max,
            &lon_min,
            &lon_max,
            &like_pattern,
            &like_pattern,
        ];
        self.store
            .query(&sql, &params, |row| row.get::<usize, String>(0))
            .ok()
            .and_then(|mut rows| if rows.is_empty() { None } else { Some(rows.remove(0)) })
    }

    /// Step (d): tight ±0.001° box within the same postal code, top 15
    /// candidates ranked by normalized Levenshtein similarity.
    fn spatial_similarity_search(&self, cleaned_name: &str, postal_code: &str, lat: f64, lon: f64) -> Option<String> {
        let sql = format!(
            "SELECT siret, {legal}, {sign} FROM {table} \
             WHERE {status} = 'A' \
               AND {postal} = ? \
               AND {lat_col} BETWEEN ? AND ? \
               AND {lon_col} BETWEEN ? AND ? \
             LIMIT ?",
            table = registry::TABLE,
            status = columns::STATUS,
            postal = columns::POSTAL_CODE,
            lat_col = columns::LAT_CACHED,
            lon_col = columns::LON_CACHED,
            legal = columns::LEGAL_NAME,
            sign = columns::SIGN_NAME,
        );
        let lat_min = lat - SIMILARITY_BOX_DEG;
        let lat_max = lat + SIMILARITY_BOX_DEG;
        let lon_min = lon - SIMILARITY_BOX_DEG;
        let lon_max = lon + SIMILARITY_BOX_DEG;
        let params: Vec<&dyn duckdb::ToSql> = vec![
            &postal_code,
            &lat_min,
            &lat_max,
            &lon_min,
            &lon_max,
            &SPATIAL_CANDIDATE_LIMIT,
        ];
        let candidates = self
            .store
            .query(&sql, &params, |row| {
                Ok((
                    row.get::<usize, String>(0)?,
                    row.get::<usize, Option<String>>(1)?,
                    row.get::<usize, Option<String>>(2)?,
                ))
            })
            .ok()?;

        let mut best: Option<(String, f64)> = None;
        for (siret, legal_name, sign_name) in candidates {
            let score = [legal_name, sign_name]
                .into_iter()
                .flatten()
                .map(|name| normalized_similarity(cleaned_name, &name))
                .fold(0.0_f64, f64::max);
            if best.as_ref().map(|(_, b)| score > *b).unwrap_or(true) {
                best = Some((siret, score));
            }
        }
        best.filter(|(_, score)| *score >= SIMILARITY_THRESHOLD)
            .map(|(siret, _)| siret)
    }

    fn cached_row(&self, siret: &str) -> Option<RegistryRow> {
        self.siret_cache
            .lock()
            .expect("siret cache poisoned")
            .get(siret)
            .cloned()
            .flatten()
    }

    fn fetch_by_siret(&self, siret: &str) -> Option<RegistryRow> {
        if let Some(row) = self.cached_row(siret) {
            return Some(row);
        }
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ? LIMIT 1",
            registry::SELECT_COLUMNS,
            registry::TABLE,
            columns::SIRET,
        );
        let row = self
            .store
            .query(&sql, &[&siret], registry::map_row)
            .ok()
            .and_then(|mut rows| if rows.is_empty() { None } else { Some(rows.remove(0)) });
        self.siret_cache
            .lock()
            .expect("siret cache poisoned")
            .insert(siret.to_string(), row.clone());
        row
    }
}

fn to_resolved(row: &RegistryRow) -> ResolvedCompany {
    ResolvedCompany {
        siret: row.siret.clone(),
        company_name: row.best_name().unwrap_or_else(|| "Inconnu".to_string()),
        size: row.size_tranche.clone(),
        sector: Sector {
            section: row.sector_section.clone(),
            naf: row.naf_code.clone(),
            label: None,
        },
        is_public: row.is_public(),
        lat: row.lat,
        lon: row.lon,
    }
}

/// Collapses quotes/dashes to spaces and normalizes whitespace, per §4.5.
fn clean_name(name: &str) -> String {
    let collapsed: String = name
        .chars()
        .map(|c| match c {
            '\'' | '"' | '-' | '\u{2019}' => ' ',
            other => other,
        })
        .collect();
    collapsed.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_name_collapses_punctuation_and_whitespace() {
        assert_eq!(clean_name("L'Atelier-Bleu   SARL"), "l atelier bleu sarl");
    }

    #[test]
    fn clean_name_lowercases() {
        assert_eq!(clean_name("ACME Transit"), "acme transit");
    }
}
