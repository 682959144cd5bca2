//! Property-based tests for certificate validation and storage
//!
//! Malformed material must never reach storage; well-formed material must
//! round-trip byte for byte.

use proptest::prelude::*;
use std::sync::Arc;
use tether_core::certificate::{MAX_CERT_SIZE, MIN_CERT_SIZE};
use tether_core::testing::MockTimeSource;
use tether_core::{
    CertError, CertificateManager, CertificateSource, ManagerConfig, MemoryStore,
    ValidationResult,
};

const BEGIN: &str = "-----BEGIN CERTIFICATE-----";
const END: &str = "-----END CERTIFICATE-----";

fn manager() -> CertificateManager {
    let mut manager = CertificateManager::new(
        Arc::new(MemoryStore::new()),
        Arc::new(MockTimeSource::new()),
    );
    manager
        .init(ManagerConfig {
            allow_development_fallback: false,
            ..ManagerConfig::default()
        })
        .unwrap();
    manager
}

/// Base64-looking body text, wrapped into lines
fn arb_body(len: std::ops::Range<usize>) -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop::sample::select(
            "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/"
                .chars()
                .collect::<Vec<_>>(),
        ),
        len,
    )
    .prop_map(|chars| {
        chars
            .chunks(64)
            .map(|line| line.iter().collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    })
}

fn arb_source() -> impl Strategy<Value = CertificateSource> {
    prop_oneof![
        Just(CertificateSource::Manufacturing),
        Just(CertificateSource::OtaUpdate),
        Just(CertificateSource::ConfigEndpoint),
        Just(CertificateSource::Development),
    ]
}

/// Material that is missing a marker or is too short
fn arb_malformed() -> impl Strategy<Value = String> {
    prop_oneof![
        arb_body(0..600),
        arb_body(200..600).prop_map(|body| format!("{}\n{}\n", BEGIN, body)),
        arb_body(200..600).prop_map(|body| format!("{}\n{}\n", body, END)),
        arb_body(0..100).prop_map(|body| format!("{}\n{}\n{}\n", BEGIN, body, END)),
    ]
}

fn arb_well_formed() -> impl Strategy<Value = String> {
    arb_body(MIN_CERT_SIZE..4000).prop_map(|body| format!("{}\n{}\n{}\n", BEGIN, body, END))
}

proptest! {
    /// Property: malformed material is rejected and nothing is written
    #[test]
    fn malformed_material_is_never_stored(pem in arb_malformed(), source in arb_source()) {
        let manager = manager();
        prop_assert!(matches!(manager.store(&pem, source), Err(CertError::InvalidFormat)));
        prop_assert!(matches!(manager.load(MAX_CERT_SIZE), Err(CertError::NotFound)));
        prop_assert_eq!(manager.validate(&pem).unwrap(), ValidationResult::InvalidFormat);
    }

    /// Property: malformed material does not displace an existing primary
    #[test]
    fn malformed_material_keeps_prior_primary(
        existing in arb_well_formed(),
        pem in arb_malformed(),
    ) {
        let manager = manager();
        manager.store(&existing, CertificateSource::Manufacturing).unwrap();

        prop_assert!(manager.store(&pem, CertificateSource::OtaUpdate).is_err());
        prop_assert!(manager.rotate(&pem, CertificateSource::OtaUpdate).is_err());
        prop_assert_eq!(manager.load(MAX_CERT_SIZE).unwrap().pem, existing);
    }

    /// Property: well-formed material round-trips byte for byte
    #[test]
    fn well_formed_material_round_trips(pem in arb_well_formed(), source in arb_source()) {
        let manager = manager();
        manager.store(&pem, source).unwrap();

        let loaded = manager.load(MAX_CERT_SIZE).unwrap();
        prop_assert_eq!(&loaded.pem, &pem);
        prop_assert_eq!(loaded.source, source);
        prop_assert!(manager.is_certificate_valid());
    }

    /// Property: any other well-formed material fails the integrity check
    #[test]
    fn different_material_fails_integrity(a in arb_well_formed(), b in arb_well_formed()) {
        prop_assume!(a != b);
        let manager = manager();
        manager.store(&a, CertificateSource::Manufacturing).unwrap();

        let result = manager.validate(&b).unwrap();
        prop_assert_ne!(result, ValidationResult::Valid);
    }
}
