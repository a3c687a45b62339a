//! Exercises the identity resolver (C5) against a real in-memory analytical
//! store, covering both the SIRET-direct path and the name+zip+geo cascade.

use geoprep_core::domain::RawOffer;
use geoprep_offers::IdentityResolver;
use geoprep_store::Store;

fn sample_offer(id: &str, siret: Option<&str>, company_name: Option<&str>, address: Option<&str>, lat: f64, lon: f64) -> RawOffer {
    RawOffer {
        offer_id: id.to_string(),
        siret: siret.map(str::to_string),
        company_name: company_name.map(str::to_string),
        workplace_address: address.map(str::to_string),
        lat,
        lon,
        title: None,
        contract_type: None,
        contract_start: None,
        contract_duration: None,
        target_diploma: None,
        desired_skills: None,
        apply_url: None,
        description: None,
        access_conditions: None,
        naf_code: None,
        resolved: None,
    }
}

fn seed_registry(store: &Store) {
    store
        .execute_batch(
            "CREATE TABLE sirene (
                siret VARCHAR, siren VARCHAR, nic VARCHAR,
                etatadministratifetablissement VARCHAR,
                denominationunitelegale VARCHAR, denominationusuelleetablissement VARCHAR,
                enseigne1etablissement VARCHAR, codepostaletablissement VARCHAR,
                libellecommuneetablissement VARCHAR, trancheeffectifsetablissement VARCHAR,
                activiteprincipaleetablissement VARCHAR, sectionetablissement VARCHAR,
                categoriejuridiqueunitelegale VARCHAR, etablissementsiege VARCHAR,
                lat_cached DOUBLE, lon_cached DOUBLE
            );
            INSERT INTO sirene VALUES
                ('12345678900010', '123456789', '00010', 'A', 'ACME SAS', NULL, NULL, '75001', 'Paris', '50-99', '4931Z', 'J', '5710', 'true', 48.8566, 2.3522),
                ('98765432100011', '987654321', '00011', 'A', 'BOULANGERIE DU PONT', NULL, NULL, '75001', 'Paris', '1-2', '1071Z', 'C', '5499', 'true', 48.8601, 2.3498);",
        )
        .expect("seed registry");
}

#[tokio::test]
async fn resolves_by_siret_directly() {
    let store = Store::initialize(":memory:", 1, "1GB", false, false).expect("open store");
    seed_registry(&store);
    let resolver = IdentityResolver::new(&store);

    let mut offers = vec![sample_offer("o1", Some("12345678900010"), Some("ACME"), None, 48.8566, 2.3522)];
    resolver.enrich_batch(&mut offers).await.expect("enrich batch");

    let resolved = offers[0].resolved.as_ref().expect("offer resolves via siret");
    assert_eq!(resolved.siret, "12345678900010");
    assert_eq!(resolved.company_name, "ACME SAS");
    assert_eq!(resolved.sector.section.as_deref(), Some("J"));
}

#[tokio::test]
async fn resolves_via_name_and_geo_cascade_without_siret() {
    let store = Store::initialize(":memory:", 1, "1GB", false, false).expect("open store");
    seed_registry(&store);
    let resolver = IdentityResolver::new(&store);

    let mut offers = vec![sample_offer(
        "o2",
        None,
        Some("Boulangerie du Pont"),
        Some("5 rue X 75001 Paris"),
        48.86,
        2.35,
    )];
    resolver.enrich_batch(&mut offers).await.expect("enrich batch");

    let resolved = offers[0].resolved.as_ref().expect("cascade should find a SIRET match");
    assert_eq!(resolved.siret, "98765432100011");
}

#[tokio::test]
async fn leaves_offer_unresolved_without_postal_code_or_siret() {
    let store = Store::initialize(":memory:", 1, "1GB", false, false).expect("open store");
    seed_registry(&store);
    let resolver = IdentityResolver::new(&store);

    let mut offers = vec![sample_offer("o3", None, Some("Secret Corp"), None, 45.0, 5.0)];
    resolver.enrich_batch(&mut offers).await.expect("enrich batch");

    assert!(offers[0].resolved.is_none());
}
