//! Integration tests for the engine contract.
//!
//! These tests validate that every engine:
//! - Exposes each weight slot exactly once through enumeration
//! - Skips recomputation for an unchanged parameter vector
//! - Recomputes for any changed parameter vector
//! - Clamps near-physical weights into [0, 1]
//! - Resolves handles to the latest weights

mod common;

use approx::assert_relative_eq;
use common::{calls, scripted_engine, ScriptedBackend};
use nuoscillator::engine::UNFILLED;
use nuoscillator::{Error, NuType};
use proptest::prelude::*;

const CHANNELS: [&str; 3] = ["Muon:Muon", "Muon:Electron", "Electron:Tau"];

fn energy_weight(params: &[f64], nu: NuType, channel: usize, e: f64, cz: Option<f64>) -> f64 {
    let nu_shift = if nu == NuType::Neutrino { 0.0 } else { 0.5 };
    let cz_shift = cz.map_or(0.0, |c| (c + 1.0) / 8.0);
    (params[0] * e / 100.0 + nu_shift + channel as f64 / 16.0 + cz_shift).min(1.0)
}

#[test]
fn test_enumeration_visits_every_slot_once() {
    for reversed in [false, true] {
        let mut backend = ScriptedBackend::new(true, energy_weight);
        backend.reversed = reversed;
        let mut engine = scripted_engine(backend, &CHANNELS);
        engine.set_energy_grid(vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        engine.set_cosine_z_grid(vec![-1.0, 0.0, 1.0]).unwrap();
        engine.setup().unwrap();
        engine.reweight(&[1.0]).unwrap();

        let records = engine.enumerate_all().unwrap();
        assert_eq!(records.len(), 2 * 3 * 4 * 3);
        for r in &records {
            let channel = engine.channels().as_slice().iter().position(|c| *c == r.channel).unwrap();
            let expected = energy_weight(&[1.0], r.nu_type, channel, r.energy, r.cosine_z);
            assert_eq!(r.probability, expected);
        }
    }
}

#[test]
fn test_enumeration_without_cosine_z() {
    let mut engine = scripted_engine(ScriptedBackend::new(false, energy_weight), &CHANNELS);
    engine.set_energy_grid(vec![0.5, 5.0]).unwrap();
    engine.setup().unwrap();
    assert!(engine.weights().iter().all(|&w| w == UNFILLED));
    engine.reweight(&[2.0]).unwrap();

    let records = engine.enumerate_all().unwrap();
    assert_eq!(records.len(), 2 * 3 * 2);
    assert!(records.iter().all(|r| r.cosine_z.is_none()));
}

#[test]
fn test_identical_parameters_skip_backend() {
    let backend = ScriptedBackend::new(false, energy_weight);
    let counter = backend.calls.clone();
    let mut engine = scripted_engine(backend, &CHANNELS);
    engine.set_energy_grid(vec![1.0, 2.0]).unwrap();
    engine.setup().unwrap();

    assert!(engine.reweight(&[3.0]).unwrap());
    let before = engine.probability(2, 1, 2.0, None).unwrap();
    assert!(!engine.reweight(&[3.0]).unwrap());
    assert_eq!(calls(&counter), 1);
    assert_eq!(engine.probability(2, 1, 2.0, None).unwrap(), before);
}

#[test]
fn test_handles_follow_recomputation() {
    let mut engine = scripted_engine(ScriptedBackend::new(false, energy_weight), &CHANNELS);
    engine.set_energy_grid(vec![10.0]).unwrap();
    engine.setup().unwrap();
    let handle = engine.query(2, 2, 10.0, None).unwrap();

    engine.reweight(&[1.0]).unwrap();
    assert_relative_eq!(engine.weight(handle).unwrap(), 0.1, epsilon = 1e-15);
    engine.reweight(&[4.0]).unwrap();
    assert_relative_eq!(engine.weight(handle).unwrap(), 0.4, epsilon = 1e-15);
}

#[test]
fn test_cross_sign_query_is_configuration_error() {
    let mut engine = scripted_engine(ScriptedBackend::new(false, energy_weight), &CHANNELS);
    engine.set_energy_grid(vec![1.0]).unwrap();
    engine.setup().unwrap();
    engine.reweight(&[1.0]).unwrap();
    assert!(matches!(engine.query(2, -1, 1.0, None), Err(Error::Configuration { .. })));
    assert!(matches!(engine.query(-2, 1, 1.0, None), Err(Error::Configuration { .. })));
}

#[test]
fn test_unknown_channel_and_point_are_lookup_errors() {
    let mut engine = scripted_engine(ScriptedBackend::new(false, energy_weight), &CHANNELS);
    engine.set_energy_grid(vec![1.0, 2.0]).unwrap();
    engine.setup().unwrap();
    assert!(matches!(engine.query(1, 1, 1.0, None), Err(Error::Lookup { .. })));
    assert!(matches!(engine.query(2, 2, 1.5, None), Err(Error::Lookup { .. })));
    assert!(!engine.has_channel(3, 3));
    assert!(engine.has_channel(-1, -3));
}

proptest! {
    #[test]
    fn prop_changed_parameters_recompute(a in -1e3f64..1e3, b in -1e3f64..1e3) {
        prop_assume!(a != b);
        let backend = ScriptedBackend::new(false, |p: &[f64], _, _, _, _| (p[0].abs() / 1e3).min(1.0));
        let counter = backend.calls.clone();
        let mut engine = scripted_engine(backend, &["Tau:Tau"]);
        engine.set_energy_grid(vec![1.0]).unwrap();
        engine.setup().unwrap();

        prop_assert!(engine.reweight(&[a]).unwrap());
        prop_assert!(engine.reweight(&[b]).unwrap());
        prop_assert!(!engine.reweight(&[b]).unwrap());
        prop_assert_eq!(calls(&counter), 2);
    }

    #[test]
    fn prop_sanitized_weights_in_unit_interval(
        raw in proptest::collection::vec(-1e-6f64..=1.0 + 1e-6, 8)
    ) {
        let table = raw.clone();
        let backend = ScriptedBackend::new(false, move |_: &[f64], nu, _, e, _| {
            let offset = if nu == NuType::Neutrino { 0 } else { 4 };
            table[offset + e as usize - 1]
        });
        let mut engine = scripted_engine(backend, &["Muon:Muon"]);
        engine.set_energy_grid(vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        engine.setup().unwrap();
        engine.reweight(&[0.0]).unwrap();

        for &w in engine.weights() {
            prop_assert!((0.0..=1.0).contains(&w));
        }
        for (i, &w) in raw.iter().enumerate() {
            if (0.0..=1.0).contains(&w) {
                let (nu, e) = if i < 4 { (2, i + 1) } else { (-2, i - 3) };
                prop_assert_eq!(engine.probability(nu, nu, e as f64, None).unwrap(), w);
            }
        }
    }
}
