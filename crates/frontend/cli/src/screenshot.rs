//! PNG screenshots of the software display.

use crate::HostError;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tile_core::types::Frame;

/// ARGB32 pixels as RGBA bytes, alpha forced opaque
fn rgba_bytes(frame: &Frame) -> Vec<u8> {
    let mut rgba = Vec::with_capacity(frame.pixels.len() * 4);
    for &pixel in &frame.pixels {
        rgba.push((pixel >> 16) as u8);
        rgba.push((pixel >> 8) as u8);
        rgba.push(pixel as u8);
        rgba.push(0xFF);
    }
    rgba
}

/// Encode `frame` as an 8-bit RGBA PNG into `w`.
pub fn encode_png<W: Write>(w: W, frame: &Frame) -> Result<(), png::EncodingError> {
    let mut encoder = png::Encoder::new(w, frame.width, frame.height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(&rgba_bytes(frame))?;
    writer.finish()
}

pub fn write_png(path: &Path, frame: &Frame) -> Result<(), HostError> {
    let file = File::create(path).map_err(|source| HostError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    encode_png(BufWriter::new(file), frame).map_err(|source| HostError::Encode {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(bytes: &[u8]) -> (png::OutputInfo, Vec<u8>) {
        let decoder = png::Decoder::new(bytes);
        let mut reader = decoder.read_info().unwrap();
        let mut buf = vec![0; reader.output_buffer_size()];
        let info = reader.next_frame(&mut buf).unwrap();
        buf.truncate(info.buffer_size());
        (info, buf)
    }

    #[test]
    fn test_pixels_survive_encoding() {
        let mut frame = Frame::new(2, 1);
        frame.pixels = vec![0xFFE0_F8D0, 0x0008_1820];
        let mut out = Vec::new();
        encode_png(&mut out, &frame).unwrap();

        let (info, rgba) = decode(&out);
        assert_eq!((info.width, info.height), (2, 1));
        assert_eq!(info.color_type, png::ColorType::Rgba);
        assert_eq!(rgba, vec![0xE0, 0xF8, 0xD0, 0xFF, 0x08, 0x18, 0x20, 0xFF]);
    }

    #[test]
    fn test_unwritable_path_reports_it() {
        let path = std::env::temp_dir()
            .join("tile_host_no_such_dir")
            .join("shot.png");
        let frame = Frame::new(1, 1);
        assert!(matches!(
            write_png(&path, &frame),
            Err(HostError::Write { path: p, .. }) if p == path
        ));
    }
}
