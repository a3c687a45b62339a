//! Offer stream reader (C4). Parses the offer file as a top-level JSON array
//! one element at a time, so the whole array is never held in memory, and
//! applies backpressure by pushing each parsed element through a
//! capacity-1 channel before moving on to the next.

use geoprep_core::domain::RawOffer;
use regex::Regex;
use serde::de::{SeqAccess, Visitor};
use serde_json::Value;
use std::fmt;
use std::path::Path;
use std::sync::OnceLock;
use tokio::sync::mpsc::Sender;

use crate::error::OffersError;

fn company_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:enseigne|soci[ée]t[ée]|groupe|entreprise|[ée]tablissement)\s+([A-ZÀ-Ý][\wÀ-ÿ'\-]*)").unwrap()
    })
}

fn postal_code_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\d{5}\b").unwrap())
}

/// Extracts a 5-digit postal code from a free-form address, per §4.5's
/// cascade precondition.
pub fn extract_postal_code(address: &str) -> Option<String> {
    postal_code_regex()
        .find(address)
        .map(|m| m.as_str().to_string())
}

/// Reads the offer stream at `path`, normalizing each raw JSON record into a
/// `RawOffer` and sending it into `tx`. Runs on a blocking thread pool via
/// `spawn_blocking`; `tx.blocking_send` is what actually implements
/// backpressure, since it blocks this thread until the consumer has taken
/// the previous element.
pub async fn read_into(path: impl AsRef<Path>, tx: Sender<RawOffer>) -> Result<(), OffersError> {
    let path = path.as_ref().to_path_buf();
    tokio::task::spawn_blocking(move || read_blocking(&path, tx))
        .await
        .expect("offer reader task panicked")
}

fn read_blocking(path: &Path, tx: Sender<RawOffer>) -> Result<(), OffersError> {
    let file = std::fs::File::open(path).map_err(|e| OffersError::Open {
        path: path.display().to_string(),
        source: e,
    })?;
    let reader = std::io::BufReader::new(file);
    let mut de = serde_json::Deserializer::from_reader(reader);
    de.deserialize_seq(OfferSeqVisitor { tx })?;
    Ok(())
}

struct OfferSeqVisitor {
    tx: Sender<RawOffer>,
}

impl<'de> Visitor<'de> for OfferSeqVisitor {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a top-level JSON array of offer records")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        while let Some(raw) = seq.next_element::<Value>()? {
            if let Some(offer) = normalize(&raw) {
                if self.tx.blocking_send(offer).is_err() {
                    break;
                }
            }
        }
        Ok(())
    }
}

/// Normalizes one raw JSON record into a `RawOffer`, per §4.4. Returns
/// `None` for records missing the `workplace` or `offer` blocks.
fn normalize(raw: &Value) -> Option<RawOffer> {
    let workplace = raw.get("workplace")?;
    let offer = raw.get("offer")?;

    let coordinates = workplace
        .get("location")
        .and_then(|l| l.get("geopoint"))
        .and_then(|g| g.get("coordinates"))
        .and_then(|c| c.as_array())?;
    let lon = coordinates.first()?.as_f64()?;
    let lat = coordinates.get(1)?.as_f64()?;

    let description = str_field(offer, "description");
    let company_name = str_field(workplace, "legal_name")
        .or_else(|| str_field(workplace, "name"))
        .or_else(|| str_field(workplace, "brand"))
        .or_else(|| {
            description
                .as_deref()
                .and_then(|d| company_name_regex().captures(d))
                .map(|c| c[1].to_string())
        });

    let naf_code = str_field(workplace, "naf_code").map(|s| s.replace('.', ""));

    Some(RawOffer {
        offer_id: str_field(raw, "id").unwrap_or_default(),
        siret: str_field(workplace, "siret"),
        company_name,
        workplace_address: str_field(workplace, "address"),
        lat,
        lon,
        title: str_field(offer, "title"),
        contract_type: str_field(offer, "contract_type"),
        contract_start: str_field(offer, "desired_start_date"),
        contract_duration: str_field(offer, "contract_duration"),
        target_diploma: str_field(offer, "target_diploma_level"),
        desired_skills: str_field(offer, "desired_skills"),
        apply_url: str_field(offer, "apply_url"),
        description,
        access_conditions: str_field(offer, "access_conditions"),
        naf_code,
        resolved: None,
    })
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalizes_a_complete_record() {
        let raw = json!({
            "id": "off-1",
            "workplace": {
                "siret": "12345678900011",
                "legal_name": "Acme Transit",
                "address": "10 rue de la Gare 75010 Paris",
                "naf_code": "49.31Z",
                "location": {"geopoint": {"coordinates": [2.35, 48.85]}},
            },
            "offer": {
                "title": "Conducteur de bus",
                "contract_type": "Apprentissage",
                "description": "Rejoignez notre enseigne Acme dès maintenant",
            },
        });
        let offer = normalize(&raw).expect("record has workplace and offer blocks");
        assert_eq!(offer.offer_id, "off-1");
        assert_eq!(offer.siret.as_deref(), Some("12345678900011"));
        assert_eq!(offer.company_name.as_deref(), Some("Acme Transit"));
        assert_eq!(offer.naf_code.as_deref(), Some("4931Z"));
        assert_eq!(offer.lat, 48.85);
        assert_eq!(offer.lon, 2.35);
    }

    #[test]
    fn falls_back_to_regex_extracted_name() {
        let raw = json!({
            "id": "off-2",
            "workplace": {
                "address": "1 place du marché 13001 Marseille",
                "location": {"geopoint": {"coordinates": [5.37, 43.30]}},
            },
            "offer": {"description": "Poste proposé par la société Voyages du Sud"},
        });
        let offer = normalize(&raw).expect("record has workplace and offer blocks");
        assert_eq!(offer.company_name.as_deref(), Some("Voyages"));
    }

    #[test]
    fn drops_records_missing_workplace_or_offer() {
        assert!(normalize(&json!({"offer": {}})).is_none());
        assert!(normalize(&json!({"workplace": {}})).is_none());
    }

    #[test]
    fn drops_records_missing_coordinates() {
        let raw = json!({
            "workplace": {"address": "12 rue Haute 75001 Paris"},
            "offer": {"title": "x"},
        });
        assert!(normalize(&raw).is_none());
    }

    #[test]
    fn extracts_postal_code_from_address() {
        assert_eq!(
            extract_postal_code("10 rue de la Gare 75010 Paris"),
            Some("75010".to_string())
        );
        assert_eq!(extract_postal_code("no postal code here"), None);
    }
}
