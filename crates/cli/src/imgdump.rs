//! imgdump - decode a single embedded PDF image stream to a BMP file.
//!
//! Debugging tool for the decode pipeline: takes the raw stream payload
//! on disk plus the dictionary parameters as flags, runs the full facade
//! (filters, codec, fallback) and writes the composited result.

use anyhow::{Context, bail};
use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;
use sucre_core::image::export::write_bmp_file;
use sucre_core::model::{Dict, MemoryResolver, Object, Stream};
use sucre_core::{CmykStrategy, DecodeConfig, ImageDecoder};

/// Colour space of the sample data.
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum ColorSpaceArg {
    /// DeviceGray (default)
    #[default]
    Gray,
    /// DeviceRGB
    Rgb,
    /// DeviceCMYK
    Cmyk,
}

impl ColorSpaceArg {
    fn name(self) -> &'static str {
        match self {
            Self::Gray => "DeviceGray",
            Self::Rgb => "DeviceRGB",
            Self::Cmyk => "DeviceCMYK",
        }
    }
}

/// Decode one embedded PDF image stream to a BMP file.
#[derive(Parser, Debug)]
#[command(name = "imgdump")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the raw image stream payload
    input: PathBuf,

    /// Output BMP path (default: input path with .bmp appended)
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Image width in pixels
    #[arg(short = 'W', long)]
    width: u32,

    /// Image height in pixels
    #[arg(short = 'H', long)]
    height: u32,

    /// Bits per component
    #[arg(short = 'b', long, default_value_t = 8)]
    bits: u32,

    /// Colour space of the samples
    #[arg(short = 'c', long, value_enum, default_value_t = ColorSpaceArg::Gray)]
    colorspace: ColorSpaceArg,

    /// Filter name applied to the payload (e.g. FlateDecode, DCTDecode,
    /// CCITTFaxDecode); repeat for a chain
    #[arg(short = 'f', long = "filter")]
    filters: Vec<String>,

    /// CCITT K parameter (used with CCITTFaxDecode)
    #[arg(long)]
    k: Option<i64>,

    /// CCITT BlackIs1 flag
    #[arg(long = "black-is-1", action = ArgAction::SetTrue)]
    black_is_1: bool,

    /// Treat the stream as a 1-bit image mask
    #[arg(long = "image-mask", action = ArgAction::SetTrue)]
    image_mask: bool,

    /// Use the ICC CMYK conversion strategy when available
    #[arg(long, action = ArgAction::SetTrue)]
    icc: bool,
}

fn build_stream(args: &Args, data: Vec<u8>) -> Stream {
    let mut attrs = Dict::new();
    attrs.insert("Width".into(), Object::Int(args.width as i64));
    attrs.insert("Height".into(), Object::Int(args.height as i64));
    attrs.insert("BitsPerComponent".into(), Object::Int(args.bits as i64));
    attrs.insert(
        "ColorSpace".into(),
        Object::Name(args.colorspace.name().into()),
    );
    if args.image_mask {
        attrs.insert("ImageMask".into(), Object::Bool(true));
    }
    if !args.filters.is_empty() {
        let names = args
            .filters
            .iter()
            .map(|f| Object::Name(f.clone()))
            .collect();
        attrs.insert("Filter".into(), Object::Array(names));

        let mut parms = Dict::new();
        if let Some(k) = args.k {
            parms.insert("K".into(), Object::Int(k));
        }
        if args.black_is_1 {
            parms.insert("BlackIs1".into(), Object::Bool(true));
        }
        parms.insert("Columns".into(), Object::Int(args.width as i64));
        parms.insert("Rows".into(), Object::Int(args.height as i64));
        attrs.insert("DecodeParms".into(), Object::Dict(parms));
    }
    Stream::new(attrs, data)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let data = std::fs::read(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;
    let stream = build_stream(&args, data);

    let cfg = DecodeConfig {
        cmyk_strategy: if args.icc {
            CmykStrategy::Icc
        } else {
            CmykStrategy::Arithmetic
        },
        ..DecodeConfig::default()
    };
    let decoder = ImageDecoder::new(cfg);
    let resolver = MemoryResolver::new();

    let Some(image) = decoder.get_image(&stream, &resolver, 0xFF00_0000) else {
        bail!("no image could be decoded from {}", args.input.display());
    };

    let output = args.output.clone().unwrap_or_else(|| {
        let mut p = args.input.clone().into_os_string();
        p.push(".bmp");
        PathBuf::from(p)
    });
    write_bmp_file(&output, &image)
        .with_context(|| format!("writing {}", output.display()))?;

    println!(
        "{} -> {} ({}x{})",
        args.input.display(),
        output.display(),
        image.width(),
        image.height()
    );
    Ok(())
}
