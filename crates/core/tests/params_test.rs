//! Image parameter extraction tests: decode-array normalization,
//! permissive defaulting, and the missing-dimension heuristic.

use sucre_core::DecodeConfig;
use sucre_core::image::ImageParams;
use sucre_core::model::{Dict, MemoryResolver, Object, Stream};

fn stream_with(entries: &[(&str, Object)]) -> Stream {
    let mut attrs = Dict::new();
    for (k, v) in entries {
        attrs.insert((*k).to_string(), v.clone());
    }
    Stream::new(attrs, Vec::new())
}

fn params(stream: &Stream) -> ImageParams {
    ImageParams::from_stream(stream, &MemoryResolver::new(), &DecodeConfig::default())
}

fn real_array(values: &[f64]) -> Object {
    Object::Array(values.iter().map(|&v| Object::Real(v)).collect())
}

#[test]
fn default_decode_is_unit_scale() {
    let stream = stream_with(&[
        ("Width", Object::Int(4)),
        ("Height", Object::Int(4)),
        ("BitsPerComponent", Object::Int(8)),
        ("ColorSpace", Object::Name("DeviceRGB".into())),
    ]);
    let p = params(&stream);
    assert_eq!(p.decode.len(), 6);
    for i in 0..3 {
        assert_eq!(p.decode[2 * i], 0.0);
        assert!((p.decode[2 * i + 1] - 1.0 / 255.0).abs() < 1e-6);
    }
    assert!(!p.explicit_decode);
}

#[test]
fn decode_array_normalizes_to_min_and_scale() {
    // For every (Dmin, Dmax, bits): scale == (Dmax-Dmin)/(2^bits-1),
    // sample 0 maps to Dmin and the max sample to Dmax.
    for &(dmin, dmax, bits) in &[(0.0, 1.0, 8u32), (1.0, 0.0, 1), (0.2, 0.8, 4), (-1.0, 1.0, 16)] {
        let stream = stream_with(&[
            ("Width", Object::Int(1)),
            ("Height", Object::Int(1)),
            ("BitsPerComponent", Object::Int(bits as i64)),
            ("ColorSpace", Object::Name("DeviceGray".into())),
            ("Decode", real_array(&[dmin, dmax])),
        ]);
        let p = params(&stream);
        let maxval = ((1u64 << bits) - 1) as f32;
        let expect_scale = (dmax as f32 - dmin as f32) / maxval;
        assert!((p.decode[1] - expect_scale).abs() < 1e-6);
        let at_zero = p.decode[0];
        let at_max = p.decode[0] + maxval * p.decode[1];
        assert!((at_zero - dmin as f32).abs() < 1e-5);
        assert!((at_max - dmax as f32).abs() < 1e-5);
    }
}

#[test]
fn inverted_decode_is_detected() {
    let stream = stream_with(&[
        ("Width", Object::Int(1)),
        ("Height", Object::Int(1)),
        ("BitsPerComponent", Object::Int(1)),
        ("ColorSpace", Object::Name("DeviceGray".into())),
        ("Decode", real_array(&[1.0, 0.0])),
    ]);
    assert!(params(&stream).decode_inverted(0));
}

#[test]
fn missing_width_is_inferred_from_height() {
    let stream = stream_with(&[
        ("Height", Object::Int(1100)),
        ("ColorSpace", Object::Name("DeviceGray".into())),
    ]);
    let p = params(&stream);
    assert_eq!(p.height, 1100);
    // Default page ratio is 8.5/11.
    assert_eq!(p.width, 850);
}

#[test]
fn missing_height_is_inferred_from_width() {
    let stream = stream_with(&[("Width", Object::Int(850))]);
    let p = params(&stream);
    assert_eq!(p.width, 850);
    assert_eq!(p.height, 1100);
}

#[test]
fn image_mask_forces_one_bit_gray() {
    let stream = stream_with(&[
        ("Width", Object::Int(8)),
        ("Height", Object::Int(8)),
        ("ImageMask", Object::Bool(true)),
        ("BitsPerComponent", Object::Int(8)),
    ]);
    let p = params(&stream);
    assert!(p.is_image_mask);
    assert_eq!(p.bits_per_component, 1);
    assert_eq!(p.ncomponents(), 1);
}

#[test]
fn missing_colorspace_defaults_to_gray() {
    let stream = stream_with(&[("Width", Object::Int(2)), ("Height", Object::Int(2))]);
    let p = params(&stream);
    assert_eq!(p.ncomponents(), 1);
}

#[test]
fn inline_abbreviations_are_recognized() {
    let stream = stream_with(&[
        ("W", Object::Int(3)),
        ("H", Object::Int(5)),
        ("BPC", Object::Int(8)),
        ("CS", Object::Name("RGB".into())),
    ]);
    let p = params(&stream);
    assert_eq!((p.width, p.height), (3, 5));
    assert_eq!(p.ncomponents(), 3);
}

#[test]
fn expected_len_accounts_for_row_alignment() {
    // 10 pixels at 1 bit: rows are byte-aligned, 2 bytes per row.
    let stream = stream_with(&[
        ("Width", Object::Int(10)),
        ("Height", Object::Int(3)),
        ("BitsPerComponent", Object::Int(1)),
    ]);
    let p = params(&stream);
    assert_eq!(p.row_bytes(), 2);
    assert_eq!(p.expected_len(), 6);
}

#[test]
fn single_decode_parms_dict_broadcasts_over_filter_array() {
    let mut parms = Dict::new();
    parms.insert("K".into(), Object::Int(-1));
    let stream = stream_with(&[
        ("Width", Object::Int(8)),
        ("Height", Object::Int(8)),
        (
            "Filter",
            Object::Array(vec![
                Object::Name("ASCII85Decode".into()),
                Object::Name("CCITTFaxDecode".into()),
            ]),
        ),
        ("DecodeParms", Object::Dict(parms)),
    ]);
    let p = params(&stream);
    assert_eq!(p.filters.len(), 2);
    // Both entries got the one dict.
    assert!(p.filters[0].1.is_some());
    assert!(p.filters[1].1.is_some());
    let (name, parms) = p.image_filter().unwrap();
    assert_eq!(name, "CCITTFaxDecode");
    assert_eq!(parms.as_ref().unwrap().get("K").unwrap().as_int().unwrap(), -1);
}
