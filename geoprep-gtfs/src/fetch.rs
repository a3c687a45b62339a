//! GTFS fetcher (C9). Downloads zipped GTFS resources and extracts them to
//! a working tree, with an operator-assisted fallback path for ambiguous or
//! failed lookups.

use crate::dataset::DatasetRef;
use crate::error::GtfsError;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Supplies a direct URL (or gives up) when automatic resolution can't pick
/// a single candidate. Prompts MUST be serialized so concurrent dataset
/// fetches never interleave output, per spec §4.9/§5.
pub trait Resolver: Sync {
    fn resolve(&self, dataset_id: &str) -> Option<String>;
}

/// Always skips — the non-interactive variant for unattended runs.
pub struct SkipResolver;

impl Resolver for SkipResolver {
    fn resolve(&self, dataset_id: &str) -> Option<String> {
        log::warn!("no usable candidate for dataset {dataset_id}, skipping (non-interactive run)");
        None
    }
}

static PROMPT_LOCK: Mutex<()> = Mutex::new(());

/// Prompts on stdin/stderr for a direct URL or `"skip"`.
pub struct InteractiveResolver;

impl Resolver for InteractiveResolver {
    fn resolve(&self, dataset_id: &str) -> Option<String> {
        let _guard = PROMPT_LOCK.lock().expect("prompt mutex poisoned");
        loop {
            eprint!("dataset {dataset_id}: enter a direct GTFS zip URL, or \"skip\": ");
            std::io::stderr().flush().ok();
            let mut line = String::new();
            if std::io::stdin().read_line(&mut line).is_err() {
                return None;
            }
            let line = line.trim();
            if line.eq_ignore_ascii_case("skip") {
                return None;
            }
            if !line.is_empty() {
                return Some(line.to_string());
            }
        }
    }
}

fn candidate_urls(dataset: &DatasetRef) -> Vec<String> {
    let mut urls = vec![format!(
        "https://www.data.gouv.fr/fr/datasets/r/{}",
        dataset.resource_datagouv_id
    )];
    if let Some(resource_id) = &dataset.resource_id {
        urls.push(format!(
            "https://transport.data.gouv.fr/resources/{resource_id}/download"
        ));
    }
    urls
}

fn dir_is_non_empty(path: &Path) -> bool {
    fs::read_dir(path)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

fn fetch_and_extract(url: &str, target: &Path) -> Result<(), GtfsError> {
    let response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|e| GtfsError::Download {
            url: url.to_string(),
            source: e,
        })?;
    let bytes = response.bytes().map_err(|e| GtfsError::Download {
        url: url.to_string(),
        source: e,
    })?;

    let mut tmp = tempfile::NamedTempFile::new()?;
    tmp.write_all(&bytes)?;

    fs::create_dir_all(target)?;
    let file = fs::File::open(tmp.path())?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| GtfsError::Extract {
        path: target.display().to_string(),
        source: e,
    })?;
    archive.extract(target).map_err(|e| GtfsError::Extract {
        path: target.display().to_string(),
        source: e,
    })?;
    Ok(())
}

/// Downloads every dataset in `datasets` to `<base_dir>/dataset_<i+1>/`,
/// skipping any target that already exists and is non-empty. Per spec
/// §4.9/§4.8 ("per-dataset errors ... logged, dataset skipped"), a dataset
/// whose every candidate URL fails is logged and dropped — it never aborts
/// the remaining datasets in `datasets`. This is the bulk, non-interactive
/// path; ambiguous datasets (more than one candidate sharing a `dataset_id`)
/// are handled separately by `download`, via `fetch_all`.
pub fn download_list(
    base_dir: &Path,
    datasets: &[DatasetRef],
) -> Result<Vec<(DatasetRef, PathBuf)>, GtfsError> {
    let mut extracted = Vec::with_capacity(datasets.len());
    for (i, dataset) in datasets.iter().enumerate() {
        let target = base_dir.join(format!("dataset_{}", i + 1));
        if target.exists() && dir_is_non_empty(&target) {
            log::info!("dataset_{} already present, skipping download", i + 1);
            extracted.push((dataset.clone(), target));
            continue;
        }
        let mut last_err = None;
        let mut ok = false;
        for url in candidate_urls(dataset) {
            match fetch_and_extract(&url, &target) {
                Ok(()) => {
                    ok = true;
                    break;
                }
                Err(e) => last_err = Some(e),
            }
        }
        if ok {
            extracted.push((dataset.clone(), target));
        } else if let Some(e) = last_err {
            log::error!("dataset_{}: every candidate URL failed ({e}), skipping", i + 1);
        }
    }
    Ok(extracted)
}

/// Fetches every dataset, routing datasets that share a `dataset_id` with at
/// least one sibling (ambiguous — more than one resource claims the same
/// logical dataset) through the operator-assisted `download`, and batching
/// the rest (unique `dataset_id`, or none) through `download_list`. Either
/// path's per-dataset failures are logged and skipped, never aborting the
/// others, per spec §4.8/§4.9.
pub fn fetch_all(
    base_dir: &Path,
    datasets: &[DatasetRef],
    resolver: &dyn Resolver,
) -> Vec<(DatasetRef, PathBuf)> {
    let mut by_dataset_id: HashMap<String, Vec<DatasetRef>> = HashMap::new();
    let mut unambiguous: Vec<DatasetRef> = Vec::new();
    for dataset in datasets {
        match &dataset.dataset_id {
            Some(id) => by_dataset_id.entry(id.clone()).or_default().push(dataset.clone()),
            None => unambiguous.push(dataset.clone()),
        }
    }

    let mut result = Vec::with_capacity(datasets.len());
    for (dataset_id, mut group) in by_dataset_id {
        if group.len() == 1 {
            unambiguous.push(group.remove(0));
            continue;
        }
        match download(&dataset_id, &group, base_dir, resolver) {
            Ok(Some(dir)) => result.push((group[0].clone(), dir)),
            Ok(None) => log::warn!("dataset {dataset_id}: operator skipped, no data fetched"),
            Err(e) => log::error!("dataset {dataset_id}: {e}, skipping"),
        }
    }

    match download_list(base_dir, &unambiguous) {
        Ok(mut pairs) => result.append(&mut pairs),
        Err(e) => log::error!("bulk GTFS download failed: {e}"),
    }
    result
}

/// Operator-assisted single-dataset download, per spec §4.9. `candidates`
/// is the set of plausible matches found upstream for `dataset_id`; more
/// than one is treated as ambiguous and falls straight to the resolver.
pub fn download(
    dataset_id: &str,
    candidates: &[DatasetRef],
    base_dir: &Path,
    resolver: &dyn Resolver,
) -> Result<Option<PathBuf>, GtfsError> {
    let target = base_dir.join(dataset_id.replace(['/', '\\'], "_"));
    if target.exists() && dir_is_non_empty(&target) {
        return Ok(Some(target));
    }

    if let [only] = candidates {
        for url in candidate_urls(only) {
            if fetch_and_extract(&url, &target).is_ok() {
                return Ok(Some(target));
            }
        }
    }

    loop {
        match resolver.resolve(dataset_id) {
            Some(url) => {
                if fetch_and_extract(&url, &target).is_ok() {
                    return Ok(Some(target));
                }
                log::warn!("failed to fetch {url} for dataset {dataset_id}, retrying");
            }
            None => return Ok(None),
        }
    }
}

/// Wipes and recreates the GTFS working tree.
pub fn clear_base_dir(base_dir: &Path) -> Result<(), GtfsError> {
    if base_dir.exists() {
        fs::remove_dir_all(base_dir)?;
    }
    fs::create_dir_all(base_dir)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(resource_datagouv_id: &str, resource_id: Option<&str>) -> DatasetRef {
        DatasetRef {
            dataset_id: Some("d1".to_string()),
            resource_id: resource_id.map(|s| s.to_string()),
            dataset_datagouv_id: Some("dd1".to_string()),
            resource_datagouv_id: resource_datagouv_id.to_string(),
            dataset_custom_title: None,
        }
    }

    #[test]
    fn candidate_urls_includes_fallback_when_resource_id_present() {
        let d = dataset("abc", Some("xyz"));
        let urls = candidate_urls(&d);
        assert_eq!(urls.len(), 2);
        assert!(urls[0].contains("data.gouv.fr/fr/datasets/r/abc"));
        assert!(urls[1].contains("transport.data.gouv.fr/resources/xyz/download"));
    }

    #[test]
    fn candidate_urls_is_primary_only_without_resource_id() {
        let d = dataset("abc", None);
        assert_eq!(candidate_urls(&d).len(), 1);
    }

    #[test]
    fn skip_resolver_never_returns_a_url() {
        assert_eq!(SkipResolver.resolve("dataset-1"), None);
    }
}
