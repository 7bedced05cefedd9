//! On-screen readout of the arm pose, drawn into the frame before encoding.
//!
//! Text is rendered with a built-in 5×7 bitmap font covering only the glyphs
//! the readout needs. Each line gets a dark backing box so it stays legible on
//! bright scenes. Drawing is clipped to the frame.

use armlink_hal::Frame;
use armlink_types::{ArmSnapshot, JointIndex};
use image::{Rgb, RgbImage};

const GLYPH_W: u32 = 5;
const GLYPH_H: u32 = 7;
const MARGIN: u32 = 6;

const TEXT: Rgb<u8> = Rgb([0, 255, 0]);
const BACKING: Rgb<u8> = Rgb([0, 0, 0]);

/// Lines of the readout, top to bottom: `J1:45.0` … `J6:…`, then `GRIP:50%`.
pub fn overlay_lines(snapshot: &ArmSnapshot) -> Vec<String> {
    JointIndex::all()
        .map(|j| format!("{j}:{:.1}", snapshot.angles.get(j)))
        .chain(std::iter::once(format!("GRIP:{}", snapshot.gripper)))
        .collect()
}

/// Return a copy of `frame` with the pose readout in the top-left corner.
///
/// A frame whose buffer does not match its dimensions is returned unchanged.
pub fn annotate(frame: &Frame, snapshot: &ArmSnapshot) -> Frame {
    let Some(mut img) = RgbImage::from_raw(frame.width, frame.height, frame.data.clone()) else {
        return frame.clone();
    };
    // Double size on anything larger than a thumbnail.
    let scale = if frame.height >= 240 { 2 } else { 1 };
    let line_h = (GLYPH_H + 3) * scale;

    for (row, line) in overlay_lines(snapshot).iter().enumerate() {
        let y = MARGIN + row as u32 * line_h;
        let w = line.chars().count() as u32 * (GLYPH_W + 1) * scale;
        fill_rect(&mut img, MARGIN - 2, y.saturating_sub(1), w + 3, line_h, BACKING);
        draw_text(&mut img, MARGIN, y, line, scale, TEXT);
    }

    Frame {
        width: frame.width,
        height: frame.height,
        data: img.into_raw(),
    }
}

fn draw_text(img: &mut RgbImage, x0: u32, y0: u32, text: &str, scale: u32, color: Rgb<u8>) {
    for (i, ch) in text.chars().enumerate() {
        let Some(rows) = glyph(ch) else { continue };
        let gx = x0 + i as u32 * (GLYPH_W + 1) * scale;
        for (ry, bits) in rows.iter().enumerate() {
            for rx in 0..GLYPH_W {
                if bits & (1 << (GLYPH_W - 1 - rx)) != 0 {
                    fill_rect(img, gx + rx * scale, y0 + ry as u32 * scale, scale, scale, color);
                }
            }
        }
    }
}

fn fill_rect(img: &mut RgbImage, x: u32, y: u32, w: u32, h: u32, color: Rgb<u8>) {
    for py in y..y.saturating_add(h) {
        for px in x..x.saturating_add(w) {
            if let Some(pixel) = img.get_pixel_mut_checked(px, py) {
                *pixel = color;
            }
        }
    }
}

/// Row bitmaps, MSB of the low five bits is the leftmost column.
fn glyph(ch: char) -> Option<[u8; 7]> {
    Some(match ch {
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        'G' => [0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0F],
        'I' => [0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E],
        'J' => [0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0C],
        'P' => [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10],
        'R' => [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11],
        ':' => [0x00, 0x0C, 0x0C, 0x00, 0x0C, 0x0C, 0x00],
        '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
        '-' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
        '%' => [0x18, 0x19, 0x02, 0x04, 0x08, 0x13, 0x03],
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use armlink_types::{GripperValue, JointVector};

    fn pose() -> ArmSnapshot {
        ArmSnapshot {
            angles: JointVector([45.0, -12.5, 0.0, 0.0, 0.0, 180.0]),
            gripper: GripperValue::new(50).unwrap(),
        }
    }

    #[test]
    fn lines_cover_every_joint_and_the_gripper() {
        let lines = overlay_lines(&pose());
        assert_eq!(
            lines,
            vec!["J1:45.0", "J2:-12.5", "J3:0.0", "J4:0.0", "J5:0.0", "J6:180.0", "GRIP:50%"]
        );
        // Every character of the readout has a glyph.
        assert!(lines.iter().flat_map(|l| l.chars()).all(|c| glyph(c).is_some()));
    }

    #[test]
    fn annotate_draws_top_left_only() {
        let frame = Frame::solid(480, 360, [200, 200, 200]);
        let out = annotate(&frame, &pose());
        assert_eq!((out.width, out.height), (480, 360));
        assert_eq!(out.data.len(), frame.data.len());

        let px = |f: &Frame, x: u32, y: u32| {
            let i = (y as usize * f.width as usize + x as usize) * 3;
            [f.data[i], f.data[i + 1], f.data[i + 2]]
        };
        // Backing box behind the first line.
        assert_eq!(px(&out, MARGIN - 1, MARGIN), [0, 0, 0]);
        // Some text pixels are lit.
        assert!(out.data.chunks(3).any(|p| p == [0, 255, 0]));
        // Far corner untouched.
        assert_eq!(px(&out, 479, 359), [200, 200, 200]);
        // Input is not modified.
        assert!(frame.data.chunks(3).all(|p| p == [200, 200, 200]));
    }

    #[test]
    fn tiny_frame_is_clipped_without_panic() {
        let frame = Frame::solid(4, 4, [10, 10, 10]);
        let out = annotate(&frame, &pose());
        assert_eq!(out.data.len(), 4 * 4 * 3);
    }

    #[test]
    fn bad_buffer_passes_through() {
        let frame = Frame {
            width: 8,
            height: 8,
            data: vec![1; 3],
        };
        assert_eq!(annotate(&frame, &pose()), frame);
    }
}
