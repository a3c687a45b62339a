//! Storage-id derivation (spec §3). Two offers that resolve to the same
//! SIRET (or lack one entirely) and round to the same location collapse into
//! a single `CompanyLocation`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

/// Rounds a coordinate to 4 decimal places, matching the spec's `round(lat, 4)`.
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Derives the canonical storage id for one (employer, location) tuple.
///
/// When `siret` is present the id is `"<SIRET>_<lat4>_<lon4>"`. Otherwise a
/// virtual id is derived from the company name (or `"Inconnu"`) by
/// base64url-encoding `"<name>_<lat4>_<lon4>"`, stripping `=` padding (the
/// base64 engine used here already omits it) and never producing a `/`
/// character (the URL-safe alphabet uses `_` in its place already).
pub fn storage_id(siret: Option<&str>, company_name: Option<&str>, lat: f64, lon: f64) -> String {
    let lat4 = round4(lat);
    let lon4 = round4(lon);
    match siret {
        Some(siret) => format!("{siret}_{lat4}_{lon4}"),
        None => {
            let name = company_name.unwrap_or("Inconnu");
            let raw = format!("{name}_{lat4}_{lon4}");
            let encoded = URL_SAFE_NO_PAD.encode(raw);
            format!("VIRTUAL_{encoded}")
        }
    }
}

pub fn is_virtual(storage_id: &str) -> bool {
    storage_id.starts_with("VIRTUAL_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn siret_backed_id_is_deterministic_and_collapses() {
        let a = storage_id(Some("12345678900010"), Some("ACME"), 48.85660001, 2.35220004);
        let b = storage_id(Some("12345678900010"), Some("ACME"), 48.8566, 2.3522);
        assert_eq!(a, b);
        assert_eq!(a, "12345678900010_48.8566_2.3522");
    }

    #[test]
    fn virtual_id_is_prefixed_and_url_safe() {
        let id = storage_id(None, Some("Secret Corp"), 45.0, 5.0);
        assert!(is_virtual(&id));
        assert!(!id.contains('/'));
        assert!(!id.contains('='));
    }

    #[test]
    fn virtual_id_defaults_name_when_missing() {
        let with_name = storage_id(None, None, 45.0, 5.0);
        assert!(with_name.starts_with("VIRTUAL_"));
    }

    #[test]
    fn round4_matches_spec_rounding() {
        assert_eq!(round4(48.856_601), 48.8566);
        assert_eq!(round4(2.352_199_9), 2.3522);
    }
}
