// SPDX-License-Identifier: MPL-2.0

//! Integration tests for the effect registry and stock chains

use filter_preview::backends::camera::StreamGeometry;
use filter_preview::effects::custom::invert_grayscale;
use filter_preview::effects::{EffectChain, EffectDescriptor, EffectId, EffectRegistry, ParamValue};
use filter_preview::errors::{ConfigurationError, RenderError};
use filter_preview::media::formats::pack_bgra;

fn gradient(geometry: StreamGeometry) -> Vec<u32> {
    (0..geometry.pixel_count())
        .map(|i| {
            let x = (i % geometry.width as usize) as u32;
            let y = (i / geometry.width as usize) as u32;
            pack_bgra(
                (x * 255 / geometry.width) as u8,
                (y * 255 / geometry.height) as u8,
                128,
                255,
            )
        })
        .collect()
}

#[test]
fn test_standard_table_order() {
    let registry = EffectRegistry::standard().unwrap();
    let names: Vec<&str> = registry.descriptors().map(|d| d.name.as_str()).collect();
    assert_eq!(
        names,
        [
            "Lomo",
            "MagicPen",
            "Grayscale",
            "Antique",
            "Stamp",
            "Cartoon",
            "Sepia",
            "Sharpness",
            "AutoEnhance",
            "No filter",
            "Inverted grayscale",
        ]
    );
    assert_eq!(registry.label(2).unwrap(), "3/11 - Grayscale");
    assert_eq!(registry.find("no FILTER"), Some(9));
    assert!(registry.descriptor(10).unwrap().is_custom);
}

#[test]
fn test_every_effect_renders() {
    let registry = EffectRegistry::standard().unwrap();
    let geometry = StreamGeometry::bgra(32, 24);

    for index in 0..registry.len() {
        let mut chain = registry.build(index).unwrap();
        let mut pixels = gradient(geometry);
        chain.apply(&mut pixels, geometry).unwrap();
        assert_eq!(pixels.len(), geometry.pixel_count());
    }
}

#[test]
fn test_no_filter_leaves_frame_unchanged() {
    let registry = EffectRegistry::standard().unwrap();
    let geometry = StreamGeometry::bgra(16, 16);
    let original = gradient(geometry);

    let mut chain = registry.build(9).unwrap();
    assert!(chain.is_identity());

    let mut pixels = original.clone();
    chain.apply(&mut pixels, geometry).unwrap();
    assert_eq!(pixels, original);
}

#[test]
fn test_inverted_grayscale_chain() {
    let registry = EffectRegistry::standard().unwrap();
    let geometry = StreamGeometry::bgra(4, 4);
    let mut chain = registry.build(10).unwrap();

    let mut pixels = vec![pack_bgra(50, 100, 200, 255); geometry.pixel_count()];
    chain.apply(&mut pixels, geometry).unwrap();

    assert!(pixels.iter().all(|&p| p == 0x009E_9E9E));
    assert_eq!(invert_grayscale(0xFFFF_FFFF), 0x0000_0000);
    assert_eq!(invert_grayscale(0xFF00_0000), 0x00FF_FFFF);
}

#[test]
fn test_chain_rejects_wrong_length() {
    let registry = EffectRegistry::standard().unwrap();
    let mut chain = registry.build(2).unwrap();
    let mut pixels = vec![0u32; 10];

    assert!(matches!(
        chain.apply(&mut pixels, StreamGeometry::bgra(4, 4)),
        Err(RenderError::Stage { .. })
    ));
}

#[test]
fn test_register_rejects_duplicates_and_bad_parameters() {
    let mut registry = EffectRegistry::standard().unwrap();

    let duplicate = registry.register(
        EffectDescriptor::new(EffectId::Grayscale, "Grayscale", vec![]),
        |_| Ok(EffectChain::identity()),
    );
    assert!(matches!(duplicate, Err(ConfigurationError::InvalidEffect { .. })));

    let bad = registry.register(
        EffectDescriptor::new(EffectId::Sharpness, "Too sharp", vec![ParamValue::Int(99)]),
        |p| match p {
            [ParamValue::Int(level)] => Ok(EffectChain::single(
                filter_preview::effects::library::Sharpness::new(*level)?,
            )),
            _ => Ok(EffectChain::identity()),
        },
    );
    assert!(bad.is_err());
    assert_eq!(registry.len(), 11);
}

#[test]
fn test_build_out_of_range() {
    let registry = EffectRegistry::standard().unwrap();
    assert!(registry.build(11).is_err());
    assert!(registry.label(11).is_none());
}
