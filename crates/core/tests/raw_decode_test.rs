//! Raw sample decoder tests: direct unpacking, decode-domain handling,
//! indexed lookup and the stencil path.

use sucre_core::DecodeConfig;
use sucre_core::codec::raw;
use sucre_core::image::{ImageParams, Transparency};
use sucre_core::model::{Dict, MemoryResolver, Object, ObjRef, Stream};

fn make_params(entries: &[(&str, Object)]) -> ImageParams {
    let mut attrs = Dict::new();
    for (k, v) in entries {
        attrs.insert((*k).to_string(), v.clone());
    }
    let stream = Stream::new(attrs, Vec::new());
    ImageParams::from_stream(&stream, &MemoryResolver::new(), &DecodeConfig::default())
}

fn cfg() -> DecodeConfig {
    DecodeConfig::default()
}

#[test]
fn rgb8_round_trip() {
    // A 2x2 DeviceRGB image of known pixel values reproduces those exact
    // ARGB values with full alpha.
    let params = make_params(&[
        ("Width", Object::Int(2)),
        ("Height", Object::Int(2)),
        ("BitsPerComponent", Object::Int(8)),
        ("ColorSpace", Object::Name("DeviceRGB".into())),
    ]);
    let data = hex::decode("ff000000ff000000ff0a141e").unwrap();
    let px = raw::decode(&data, &params, &cfg(), None).unwrap().unwrap();
    assert_eq!(px.get(0, 0), 0xFFFF_0000);
    assert_eq!(px.get(1, 0), 0xFF00_FF00);
    assert_eq!(px.get(0, 1), 0xFF00_00FF);
    assert_eq!(px.get(1, 1), 0xFF0A_141E);
    assert_eq!(px.transparency(), Transparency::Opaque);
}

#[test]
fn gray_1bit_default_and_inverted() {
    let base = [
        ("Width", Object::Int(8)),
        ("Height", Object::Int(1)),
        ("BitsPerComponent", Object::Int(1)),
        ("ColorSpace", Object::Name("DeviceGray".into())),
    ];
    let data = [0b1010_0000u8];

    let params = make_params(&base);
    let px = raw::decode(&data, &params, &cfg(), None).unwrap().unwrap();
    assert_eq!(px.get(0, 0), 0xFFFF_FFFF);
    assert_eq!(px.get(1, 0), 0xFF00_0000);

    let mut inverted = base.to_vec();
    inverted.push((
        "Decode",
        Object::Array(vec![Object::Real(1.0), Object::Real(0.0)]),
    ));
    let params = make_params(&inverted);
    let px = raw::decode(&data, &params, &cfg(), None).unwrap().unwrap();
    assert_eq!(px.get(0, 0), 0xFF00_0000);
    assert_eq!(px.get(1, 0), 0xFFFF_FFFF);
}

#[test]
fn gray_4bit_uses_lookup_levels() {
    let params = make_params(&[
        ("Width", Object::Int(2)),
        ("Height", Object::Int(1)),
        ("BitsPerComponent", Object::Int(4)),
        ("ColorSpace", Object::Name("DeviceGray".into())),
    ]);
    // Samples 0x0 and 0xF.
    let px = raw::decode(&[0x0F], &params, &cfg(), None).unwrap().unwrap();
    assert_eq!(px.get(0, 0), 0xFF00_0000);
    assert_eq!(px.get(1, 0), 0xFFFF_FFFF);
}

#[test]
fn cmyk8_arithmetic_conversion() {
    let params = make_params(&[
        ("Width", Object::Int(2)),
        ("Height", Object::Int(1)),
        ("BitsPerComponent", Object::Int(8)),
        ("ColorSpace", Object::Name("DeviceCMYK".into())),
    ]);
    // Pure cyan and pure black.
    let data = [255, 0, 0, 0, 0, 0, 0, 255];
    let px = raw::decode(&data, &params, &cfg(), None).unwrap().unwrap();
    assert_eq!(px.get(0, 0), 0xFF00_FFFF);
    assert_eq!(px.get(1, 0), 0xFF00_0000);
}

#[test]
fn sixteen_bit_samples_use_high_byte() {
    let params = make_params(&[
        ("Width", Object::Int(1)),
        ("Height", Object::Int(1)),
        ("BitsPerComponent", Object::Int(16)),
        ("ColorSpace", Object::Name("DeviceGray".into())),
    ]);
    let px = raw::decode(&[0x80, 0x00], &params, &cfg(), None)
        .unwrap()
        .unwrap();
    assert_eq!(px.get(0, 0), 0xFF80_8080);
}

#[test]
fn indexed_lookup_with_out_of_table_index() {
    let cs = Object::Array(vec![
        Object::Name("Indexed".into()),
        Object::Name("DeviceRGB".into()),
        Object::Int(1),
        Object::String(vec![255, 0, 0, 0, 255, 0]),
    ]);
    let params = make_params(&[
        ("Width", Object::Int(4)),
        ("Height", Object::Int(1)),
        ("BitsPerComponent", Object::Int(2)),
        ("ColorSpace", cs),
    ]);
    // Samples 0, 1, 2, 3: indices 2 and 3 are past the declared table
    // and read the opaque-black padding.
    let px = raw::decode(&[0b00_01_10_11], &params, &cfg(), None)
        .unwrap()
        .unwrap();
    assert_eq!(px.get(0, 0), 0xFFFF_0000);
    assert_eq!(px.get(1, 0), 0xFF00_FF00);
    assert_eq!(px.get(2, 0), 0xFF00_0000);
    assert_eq!(px.get(3, 0), 0xFF00_0000);
}

#[test]
fn stencil_mask_paints_fill_color() {
    let params = make_params(&[
        ("Width", Object::Int(8)),
        ("Height", Object::Int(1)),
        ("ImageMask", Object::Bool(true)),
    ]);
    let fill = 0xFF12_3456;
    // Default decode: sample 0 paints, sample 1 clears.
    let px = raw::decode(&[0b0101_0101], &params, &cfg(), Some(fill))
        .unwrap()
        .unwrap();
    assert_eq!(px.get(0, 0), fill);
    assert_eq!(px.get(1, 0), 0);
    assert_eq!(px.transparency(), Transparency::Bitmask);
}

#[test]
fn stencil_mask_inverted_decode() {
    let params = make_params(&[
        ("Width", Object::Int(2)),
        ("Height", Object::Int(1)),
        ("ImageMask", Object::Bool(true)),
        (
            "Decode",
            Object::Array(vec![Object::Real(1.0), Object::Real(0.0)]),
        ),
    ]);
    let fill = 0xFFAB_CDEF;
    let px = raw::decode(&[0b0100_0000], &params, &cfg(), Some(fill))
        .unwrap()
        .unwrap();
    // Inverted: sample 1 paints, sample 0 clears.
    assert_eq!(px.get(0, 0), 0);
    assert_eq!(px.get(1, 0), fill);
}

#[test]
fn truncated_data_still_produces_an_image() {
    let params = make_params(&[
        ("Width", Object::Int(4)),
        ("Height", Object::Int(4)),
        ("BitsPerComponent", Object::Int(8)),
        ("ColorSpace", Object::Name("DeviceRGB".into())),
    ]);
    // Only one of 48 bytes present: missing samples read as zero.
    let px = raw::decode(&[200], &params, &cfg(), None).unwrap().unwrap();
    assert_eq!(px.width(), 4);
    assert_eq!(px.height(), 4);
    assert_eq!(px.get(0, 0), 0xFFC8_0000);
    assert_eq!(px.get(3, 3), 0xFF00_0000);
}

#[test]
fn zero_dimensions_floor_to_one_pixel() {
    let mut attrs = Dict::new();
    attrs.insert("Width".into(), Object::Int(0));
    attrs.insert("Height".into(), Object::Int(0));
    let stream = Stream::new(attrs, Vec::new()).with_ref(1, 0);
    assert_eq!(stream.obj_ref(), Some(ObjRef::new(1, 0)));
    let params =
        ImageParams::from_stream(&stream, &MemoryResolver::new(), &DecodeConfig::default());
    assert_eq!((params.width, params.height), (1, 1));
}
