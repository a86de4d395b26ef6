//! The raster surface: the single source of pixel truth.
//!
//! Draw coordinates are logical pixels; the backing raster is sized in device
//! pixels (`round(css * dpr)`) and every draw call is mapped through that scale.

use egui::{Color32, Pos2};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

use crate::color::BACKGROUND;
use crate::error::SurfaceError;
use crate::snapshot::Snapshot;

/// Ticket for one in-flight decode. Only the most recently issued ticket may
/// apply its result; older ones are stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeTicket(u64);

#[derive(Debug)]
pub struct Surface {
    raster: RgbaImage,
    css_width: f32,
    css_height: f32,
    dpr: f32,
    decode_generation: u64,
    revision: u64,
}

impl Surface {
    /// A white surface of the given logical size.
    pub fn new(css_width: f32, css_height: f32, dpr: f32) -> Self {
        let dpr = sanitize_dpr(dpr);
        let (w, h) = device_size(css_width, css_height, dpr);
        Self {
            raster: RgbaImage::from_pixel(w, h, rgba(BACKGROUND)),
            css_width,
            css_height,
            dpr,
            decode_generation: 0,
            revision: 0,
        }
    }

    pub fn pixel_width(&self) -> u32 {
        self.raster.width()
    }

    pub fn pixel_height(&self) -> u32 {
        self.raster.height()
    }

    pub fn device_pixel_ratio(&self) -> f32 {
        self.dpr
    }

    pub fn raster(&self) -> &RgbaImage {
        &self.raster
    }

    /// Bumped on every pixel mutation; lets the UI skip texture uploads.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn to_device(&self, pos: Pos2) -> Pos2 {
        Pos2::new(pos.x * self.dpr, pos.y * self.dpr)
    }

    /// Color at a logical coordinate, `None` outside the surface.
    pub fn sample(&self, pos: Pos2) -> Option<Color32> {
        let device = self.to_device(pos);
        if device.x < 0.0 || device.y < 0.0 {
            return None;
        }
        let (x, y) = (device.x as u32, device.y as u32);
        self.raster.get_pixel_checked(x, y).map(|p| {
            let [r, g, b, a] = p.0;
            Color32::from_rgba_unmultiplied(r, g, b, a)
        })
    }

    /// Reallocates to the new size and fills white. Returns the previous
    /// content as a snapshot for the caller to decode back in, or `None` if
    /// the size is unchanged.
    pub fn resize(&mut self, css_width: f32, css_height: f32, dpr: f32) -> Option<Snapshot> {
        let dpr = sanitize_dpr(dpr);
        let (w, h) = device_size(css_width, css_height, dpr);
        self.css_width = css_width;
        self.css_height = css_height;
        self.dpr = dpr;
        if (w, h) == self.raster.dimensions() {
            return None;
        }

        let previous = match Snapshot::from_raster(&self.raster) {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                log::error!("Failed to capture surface before resize: {err}");
                None
            }
        };
        log::debug!(
            "Resizing surface {}x{} -> {w}x{h} (dpr {dpr})",
            self.raster.width(),
            self.raster.height()
        );
        self.raster = RgbaImage::from_pixel(w, h, rgba(BACKGROUND));
        self.revision += 1;
        previous
    }

    /// Fills the whole raster opaque white.
    pub fn clear(&mut self) {
        let white = rgba(BACKGROUND);
        for pixel in self.raster.pixels_mut() {
            *pixel = white;
        }
        self.revision += 1;
    }

    pub fn encode(&self) -> Result<Snapshot, SurfaceError> {
        Snapshot::from_raster(&self.raster)
    }

    /// Starts a decode, superseding any decode still in flight.
    pub fn begin_decode(&mut self) -> DecodeTicket {
        self.decode_generation += 1;
        DecodeTicket(self.decode_generation)
    }

    pub fn is_current(&self, ticket: DecodeTicket) -> bool {
        ticket.0 == self.decode_generation
    }

    /// Swaps a decoded image in, scaled to the current size. Returns `false`
    /// and leaves the raster untouched when the ticket has been superseded.
    pub fn apply_decoded(&mut self, ticket: DecodeTicket, decoded: RgbaImage) -> bool {
        if !self.is_current(ticket) {
            log::debug!("Dropping superseded decode {:?}", ticket);
            return false;
        }
        let (w, h) = self.raster.dimensions();
        self.raster = if decoded.dimensions() == (w, h) {
            decoded
        } else {
            imageops::resize(&decoded, w, h, FilterType::Triangle)
        };
        self.revision += 1;
        true
    }

    /// Synchronous decode: replaces the raster or, on failure, keeps it.
    pub fn decode_into(&mut self, snapshot: &Snapshot) -> Result<(), SurfaceError> {
        let decoded = snapshot.decode()?;
        let ticket = self.begin_decode();
        self.apply_decoded(ticket, decoded);
        Ok(())
    }

    /// Paints a round-capped segment between two logical points.
    /// A zero-length segment paints a dot.
    pub fn stroke_segment(&mut self, from: Pos2, to: Pos2, width: f32, color: Color32) {
        let a = self.to_device(from);
        let b = self.to_device(to);
        let radius = (width.max(1.0) * self.dpr / 2.0).max(0.5);
        let fill = rgba(color);

        let (w, h) = self.raster.dimensions();
        let min_x = (a.x.min(b.x) - radius).floor().max(0.0) as u32;
        let min_y = (a.y.min(b.y) - radius).floor().max(0.0) as u32;
        let max_x = ((a.x.max(b.x) + radius).ceil().max(0.0) as u32).min(w);
        let max_y = ((a.y.max(b.y) + radius).ceil().max(0.0) as u32).min(h);

        let radius_sq = radius * radius;
        let mut touched = false;
        for y in min_y..max_y {
            for x in min_x..max_x {
                let center = Pos2::new(x as f32 + 0.5, y as f32 + 0.5);
                if distance_sq_to_segment(center, a, b) <= radius_sq {
                    self.raster.put_pixel(x, y, fill);
                    touched = true;
                }
            }
        }
        if touched {
            self.revision += 1;
        }
    }
}

fn distance_sq_to_segment(p: Pos2, a: Pos2, b: Pos2) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_sq();
    let t = if len_sq <= f32::EPSILON {
        0.0
    } else {
        ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0)
    };
    (p - (a + ab * t)).length_sq()
}

fn sanitize_dpr(dpr: f32) -> f32 {
    if dpr.is_finite() && dpr >= 1.0 { dpr } else { 1.0 }
}

fn device_size(css_width: f32, css_height: f32, dpr: f32) -> (u32, u32) {
    let scale = |v: f32| (v.max(0.0) * dpr).round().max(1.0) as u32;
    (scale(css_width), scale(css_height))
}

fn rgba(color: Color32) -> Rgba<u8> {
    Rgba([color.r(), color.g(), color.b(), 255])
}
