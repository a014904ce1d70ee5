//! Mask compositor tests: size reconciliation, stencil and soft masks,
//! colour-key ranges.

use sucre_core::DecodeConfig;
use sucre_core::image::mask::{
    apply_color_key, apply_explicit_mask, apply_soft_mask, reconcile_sizes,
};
use sucre_core::image::{Pixmap, Transparency};
use sucre_core::model::{ColorKeyMask, ColorSpace};

fn quality(on: bool) -> DecodeConfig {
    DecodeConfig {
        scale_quality: on,
        ..DecodeConfig::default()
    }
}

#[test]
fn quality_mode_scales_base_up_to_mask() {
    let base = Pixmap::new(4, 4, 0xFF00_0000);
    let mask = Pixmap::new(16, 16, 0xFFFF_FFFF);
    let (base, mask) = reconcile_sizes(base, mask, &quality(true));
    assert_eq!((base.width(), base.height()), (16, 16));
    assert_eq!((mask.width(), mask.height()), (16, 16));
}

#[test]
fn quality_mode_scales_mask_up_to_base() {
    let base = Pixmap::new(16, 8, 0xFF00_0000);
    let mask = Pixmap::new(4, 2, 0xFFFF_FFFF);
    let (base, mask) = reconcile_sizes(base, mask, &quality(true));
    assert_eq!((base.width(), base.height()), (16, 8));
    assert_eq!((mask.width(), mask.height()), (16, 8));
}

#[test]
fn quality_off_shrinks_mask_to_base() {
    let base = Pixmap::new(4, 4, 0xFF00_0000);
    let mask = Pixmap::new(16, 16, 0xFFFF_FFFF);
    let (base, mask) = reconcile_sizes(base, mask, &quality(false));
    assert_eq!((base.width(), base.height()), (4, 4));
    assert_eq!((mask.width(), mask.height()), (4, 4));
}

#[test]
fn oversized_mask_is_subsampled_first() {
    // Mask is 64x the base pixel count with the default oversize ratio of
    // 16: it gets subsampled before the base is scaled up, so the common
    // size ends up well under the raw mask size.
    let base = Pixmap::new(8, 8, 0xFF00_0000);
    let mask = Pixmap::new(64, 64, 0xFFFF_FFFF);
    let (base, mask) = reconcile_sizes(base, mask, &quality(true));
    assert_eq!((base.width(), base.height()), (mask.width(), mask.height()));
    assert!(mask.width() < 64);
}

#[test]
fn explicit_mask_clears_masked_pixels() {
    let base = Pixmap::new(2, 2, 0xFFAA_BBCC);
    // Mask in decoded stencil form: transparent = masked.
    let mut mask = Pixmap::new(2, 2, 0xFF00_0000);
    mask.set(0, 0, 0x0000_0000);
    mask.set(1, 1, 0xFFFF_FFFF); // white convention also masks
    let out = apply_explicit_mask(base, mask, &quality(true));
    assert_eq!(out.get(0, 0), 0);
    assert_eq!(out.get(1, 0), 0xFFAA_BBCC);
    assert_eq!(out.get(0, 1), 0xFFAA_BBCC);
    assert_eq!(out.get(1, 1), 0);
    assert_eq!(out.transparency(), Transparency::Bitmask);
}

#[test]
fn soft_mask_modulates_not_replaces_alpha() {
    let mut base = Pixmap::new(1, 2, 0xFFFF_0000);
    base.set(0, 1, 0x80FF_0000);
    base.set_transparency(Transparency::Translucent);
    let mask = Pixmap::new(1, 2, 0xFF80_8080);
    let out = apply_soft_mask(base, mask, &quality(true));
    // Opaque pixel: alpha 255 * 128 / 255 = 128.
    assert_eq!(out.get(0, 0) >> 24, 0x80);
    // Half-transparent pixel: alpha 128 * 128 / 255 = 64.
    assert_eq!(out.get(0, 1) >> 24, 0x40);
    assert_eq!(out.transparency(), Transparency::Translucent);
}

#[test]
fn soft_mask_with_differing_sizes_reconciles_first() {
    let base = Pixmap::new(4, 4, 0xFFFF_0000);
    let mask = Pixmap::new(8, 8, 0xFF00_0000);
    let out = apply_soft_mask(base, mask, &quality(true));
    assert_eq!((out.width(), out.height()), (8, 8));
    assert_eq!(out.get(0, 0) >> 24, 0);
}

#[test]
fn color_key_masks_inclusive_range() {
    let key = ColorKeyMask::resolve(&[100, 200, 100, 200, 100, 200], &ColorSpace::DeviceRgb, 8)
        .unwrap();
    let mut base = Pixmap::new(3, 1, 0xFF96_9696); // 150,150,150: inside
    base.set(1, 0, 0xFF64_6464); // 100: boundary, inside
    base.set(2, 0, 0xFF63_6363); // 99: outside
    apply_color_key(&mut base, &key);
    assert_eq!(base.get(0, 0), 0);
    assert_eq!(base.get(1, 0), 0);
    assert_eq!(base.get(2, 0), 0xFF63_6363);
    assert_eq!(base.transparency(), Transparency::Bitmask);
}
