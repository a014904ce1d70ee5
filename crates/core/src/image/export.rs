//! BMP export for decoded pixmaps.
//!
//! 24-bit uncompressed BMP, rows written bottom-up with 32-bit row
//! alignment. Alpha is flattened against white, since the format has no
//! transparency.

use crate::error::Result;
use crate::image::pixmap::Pixmap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Align a row size to a 4-byte boundary.
pub const fn align32(x: u32) -> u32 {
    x.div_ceil(4) * 4
}

/// Write a pixmap as a 24-bit BMP.
pub fn write_bmp<W: Write>(out: &mut W, image: &Pixmap) -> Result<()> {
    let width = image.width();
    let height = image.height();
    let linesize = align32(width * 3);
    let datasize = linesize * height;
    let headersize = 14 + 40;

    // BITMAPFILEHEADER (14 bytes)
    out.write_all(b"BM")?;
    out.write_all(&(headersize + datasize).to_le_bytes())?;
    out.write_all(&0u16.to_le_bytes())?;
    out.write_all(&0u16.to_le_bytes())?;
    out.write_all(&headersize.to_le_bytes())?;

    // BITMAPINFOHEADER (40 bytes)
    out.write_all(&40u32.to_le_bytes())?;
    out.write_all(&(width as i32).to_le_bytes())?;
    out.write_all(&(height as i32).to_le_bytes())?;
    out.write_all(&1u16.to_le_bytes())?;
    out.write_all(&24u16.to_le_bytes())?;
    out.write_all(&0u32.to_le_bytes())?;
    out.write_all(&datasize.to_le_bytes())?;
    out.write_all(&0i32.to_le_bytes())?;
    out.write_all(&0i32.to_le_bytes())?;
    out.write_all(&0u32.to_le_bytes())?;
    out.write_all(&0u32.to_le_bytes())?;

    // Pixel rows, bottom-up, BGR order.
    let mut line = vec![0u8; linesize as usize];
    for y in (0..height).rev() {
        for x in 0..width {
            let px = image.get(x, y);
            let a = (px >> 24) & 0xFF;
            // Flatten alpha against white.
            let flatten = |c: u32| ((c * a + 255 * (255 - a)) / 255) as u8;
            let i = x as usize * 3;
            line[i] = flatten(px & 0xFF);
            line[i + 1] = flatten((px >> 8) & 0xFF);
            line[i + 2] = flatten((px >> 16) & 0xFF);
        }
        out.write_all(&line)?;
    }
    Ok(())
}

/// Write a pixmap to a BMP file.
pub fn write_bmp_file(path: impl AsRef<Path>, image: &Pixmap) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    write_bmp(&mut out, image)?;
    out.flush()?;
    Ok(())
}
