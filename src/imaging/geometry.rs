//! Geometry strings: crop rectangles, aspect-ratio crops, gravity anchors and
//! resize boxes.
//!
//! Crops come in two shapes:
//!
//! ```text
//! 300x200+10+20     explicit pixels (or percentages: 50%x50%+0+0)
//! 16:9+0+0          aspect ratio, resolved per image by normalize_crop
//! ```
//!
//! Both require an offset. A crop without `+` anywhere is malformed. Ratio
//! crops cannot be handed to the pixel stage as-is: the same `1:1` means
//! `500x500` on a 1000x500 photo and `300x300` on a 300x400 one, so
//! [`CropSpec::resolve`] turns them into concrete pixels against the image
//! actually being processed.
//!
//! Resize geometries (`400x400>`, `50%`, `@100000`, `300x300!`) are parsed
//! into [`ResizeGeometry`]; see [`calculations::resize_dimensions`](super::calculations::resize_dimensions)
//! for the sizing rules.

use super::calculations::{Anchor, normalize_ratio};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("malformed crop '{0}': use {{geometry}}+{{x}}+{{y}} or {{w}}:{{h}}+{{x}}+{{y}}")]
    MalformedCrop(String),
    #[error("crop '{spec}' leaves no pixels on a {width}x{height} image")]
    DegenerateCrop {
        spec: String,
        width: u32,
        height: u32,
    },
}

/// Named reference point a crop offset is measured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gravity {
    NorthWest,
    North,
    NorthEast,
    West,
    Center,
    East,
    SouthWest,
    South,
    SouthEast,
}

impl Gravity {
    /// Case-insensitive; `-`/`_` separators and the `centre` spelling are accepted.
    pub fn parse(name: &str) -> Option<Self> {
        let normalized: String = name
            .trim()
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect::<String>()
            .to_ascii_lowercase();
        let gravity = match normalized.as_str() {
            "northwest" => Gravity::NorthWest,
            "north" => Gravity::North,
            "northeast" => Gravity::NorthEast,
            "west" => Gravity::West,
            "center" | "centre" => Gravity::Center,
            "east" => Gravity::East,
            "southwest" => Gravity::SouthWest,
            "south" => Gravity::South,
            "southeast" => Gravity::SouthEast,
            _ => return None,
        };
        Some(gravity)
    }

    /// Horizontal and vertical anchoring.
    pub fn anchor(self) -> (Anchor, Anchor) {
        use Anchor::{End, Middle, Start};
        match self {
            Gravity::NorthWest => (Start, Start),
            Gravity::North => (Middle, Start),
            Gravity::NorthEast => (End, Start),
            Gravity::West => (Start, Middle),
            Gravity::Center => (Middle, Middle),
            Gravity::East => (End, Middle),
            Gravity::SouthWest => (Start, End),
            Gravity::South => (Middle, End),
            Gravity::SouthEast => (End, End),
        }
    }
}

impl fmt::Display for Gravity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Gravity::NorthWest => "northwest",
            Gravity::North => "north",
            Gravity::NorthEast => "northeast",
            Gravity::West => "west",
            Gravity::Center => "center",
            Gravity::East => "east",
            Gravity::SouthWest => "southwest",
            Gravity::South => "south",
            Gravity::SouthEast => "southeast",
        };
        f.write_str(name)
    }
}

/// One edge of an explicit crop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Extent {
    Pixels(u32),
    Percent(f64),
    /// Edge omitted in the geometry: use the whole image edge.
    Full,
}

impl Extent {
    fn parse(text: &str) -> Option<Self> {
        if text.is_empty() {
            return Some(Extent::Full);
        }
        if let Some(pct) = text.strip_suffix('%') {
            let value: f64 = pct.parse().ok()?;
            return value.is_finite().then_some(Extent::Percent(value));
        }
        text.parse().ok().map(Extent::Pixels)
    }

    fn resolve(self, edge: u32) -> u32 {
        match self {
            Extent::Pixels(px) => px,
            Extent::Percent(pct) => (edge as f64 * pct / 100.0).round().max(0.0) as u32,
            Extent::Full => edge,
        }
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Extent::Pixels(px) => write!(f, "{px}"),
            Extent::Percent(pct) => write!(f, "{pct}%"),
            Extent::Full => Ok(()),
        }
    }
}

/// A parsed crop, explicit or aspect-ratio.
#[derive(Debug, Clone, PartialEq)]
pub enum CropSpec {
    Ratio {
        aspect_w: f64,
        aspect_h: f64,
        offset: (i64, i64),
    },
    Geometry {
        width: Extent,
        height: Extent,
        offset: (i64, i64),
    },
}

impl CropSpec {
    pub fn parse(text: &str) -> Result<Self, GeometryError> {
        let text = text.trim();
        let malformed = || GeometryError::MalformedCrop(text.to_string());

        if !text.contains('+') {
            return Err(malformed());
        }
        let split = text.find(['+', '-']).ok_or_else(malformed)?;
        let (size, offsets) = text.split_at(split);
        if size.is_empty() {
            return Err(malformed());
        }
        let offset = parse_offsets(offsets).ok_or_else(malformed)?;

        if let Some((w, h)) = size.split_once(':') {
            let aspect_w: f64 = w.trim().parse().map_err(|_| malformed())?;
            let aspect_h: f64 = h.trim().parse().map_err(|_| malformed())?;
            if !(aspect_w.is_finite() && aspect_h.is_finite()) {
                return Err(malformed());
            }
            return Ok(CropSpec::Ratio {
                aspect_w,
                aspect_h,
                offset,
            });
        }

        let (width, height) = match size.split_once('x') {
            Some((w, h)) => (Extent::parse(w), Extent::parse(h)),
            // A lone percentage scales both edges; a lone pixel count is the width
            None => match Extent::parse(size) {
                Some(pct @ Extent::Percent(_)) => (Some(pct), Some(pct)),
                other => (other, Some(Extent::Full)),
            },
        };
        match (width, height) {
            (Some(Extent::Full), Some(Extent::Full)) => Err(malformed()),
            (Some(width), Some(height)) => Ok(CropSpec::Geometry {
                width,
                height,
                offset,
            }),
            _ => Err(malformed()),
        }
    }

    pub fn offset(&self) -> (i64, i64) {
        match self {
            CropSpec::Ratio { offset, .. } | CropSpec::Geometry { offset, .. } => *offset,
        }
    }

    /// Concrete pixel geometry of this crop on an image of `dims`.
    pub fn resolve(&self, dims: (u32, u32)) -> Result<CropGeometry, GeometryError> {
        let degenerate = || GeometryError::DegenerateCrop {
            spec: self.to_string(),
            width: dims.0,
            height: dims.1,
        };
        let (width, height) = match *self {
            CropSpec::Ratio {
                aspect_w, aspect_h, ..
            } => normalize_ratio((aspect_w, aspect_h), dims).ok_or_else(degenerate)?,
            CropSpec::Geometry { width, height, .. } => (width.resolve(dims.0), height.resolve(dims.1)),
        };
        if width == 0 || height == 0 {
            return Err(degenerate());
        }
        let (x, y) = self.offset();
        Ok(CropGeometry {
            width,
            height,
            x,
            y,
        })
    }
}

impl fmt::Display for CropSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (x, y) = self.offset();
        match self {
            CropSpec::Ratio {
                aspect_w, aspect_h, ..
            } => write!(f, "{aspect_w}:{aspect_h}")?,
            CropSpec::Geometry { width, height, .. } => match height {
                Extent::Full => write!(f, "{width}")?,
                _ => write!(f, "{width}x{height}")?,
            },
        }
        write!(f, "{x:+}{y:+}")
    }
}

fn parse_offsets(text: &str) -> Option<(i64, i64)> {
    let second = text.get(1..)?.find(['+', '-'])? + 1;
    let (x, y) = text.split_at(second);
    Some((x.parse().ok()?, y.parse().ok()?))
}

/// A crop in exact pixels: `{width}x{height}+{x}+{y}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropGeometry {
    pub width: u32,
    pub height: u32,
    pub x: i64,
    pub y: i64,
}

impl fmt::Display for CropGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}{:+}{:+}", self.width, self.height, self.x, self.y)
    }
}

/// Resolve a crop string against real image dimensions.
///
/// Ratio crops (`W:H+x+y`) become the largest rectangle of that ratio that
/// fits the image; explicit crops only have their percentages resolved.
///
/// ```
/// # use imgpipe::imaging::normalize_crop;
/// assert_eq!(normalize_crop("1:1+0+0", 1000, 500).unwrap(), "500x500+0+0");
/// ```
pub fn normalize_crop(spec: &str, width: u32, height: u32) -> Result<String, GeometryError> {
    CropSpec::parse(spec)?
        .resolve((width, height))
        .map(|geometry| geometry.to_string())
}

/// How a resize box is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeModifier {
    /// Scale to fit inside the box, preserving aspect ratio.
    Fit,
    /// `>`: only shrink images larger than the box.
    OnlyShrink,
    /// `<`: only enlarge images smaller than the box.
    OnlyEnlarge,
    /// `!`: take the box dimensions literally.
    Exact,
    /// `^`: scale to cover the box.
    Fill,
}

impl ResizeModifier {
    fn from_suffix(c: char) -> Option<Self> {
        match c {
            '>' => Some(ResizeModifier::OnlyShrink),
            '<' => Some(ResizeModifier::OnlyEnlarge),
            '!' => Some(ResizeModifier::Exact),
            '^' => Some(ResizeModifier::Fill),
            _ => None,
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            ResizeModifier::Fit => "",
            ResizeModifier::OnlyShrink => ">",
            ResizeModifier::OnlyEnlarge => "<",
            ResizeModifier::Exact => "!",
            ResizeModifier::Fill => "^",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResizeSize {
    Box {
        width: Option<u32>,
        height: Option<u32>,
    },
    Scale {
        x_percent: f64,
        y_percent: f64,
    },
    /// `@N`: at most N pixels.
    Area(u64),
}

/// A parsed resize geometry such as `400x400>`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizeGeometry {
    pub size: ResizeSize,
    pub modifier: ResizeModifier,
}

impl ResizeGeometry {
    /// Returns `None` for anything that is not a usable geometry.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let (body, modifier) = match text.chars().last().and_then(ResizeModifier::from_suffix) {
            Some(modifier) => (&text[..text.len() - 1], modifier),
            None => (text, ResizeModifier::Fit),
        };

        let size = if let Some(area) = body.strip_prefix('@') {
            let area: u64 = area.parse().ok()?;
            (area > 0).then_some(ResizeSize::Area(area))?
        } else if body.contains('%') {
            let body = body.replace('%', "");
            let (x, y) = match body.split_once('x') {
                Some((x, y)) => (x.parse::<f64>().ok()?, y.parse::<f64>().ok()?),
                None => {
                    let both = body.parse::<f64>().ok()?;
                    (both, both)
                }
            };
            let valid = |p: f64| p.is_finite() && p > 0.0;
            (valid(x) && valid(y)).then_some(ResizeSize::Scale {
                x_percent: x,
                y_percent: y,
            })?
        } else {
            let edge = |s: &str| -> Option<Option<u32>> {
                if s.is_empty() {
                    return Some(None);
                }
                let px: u32 = s.parse().ok()?;
                (px > 0).then_some(Some(px))
            };
            let (width, height) = match body.split_once('x') {
                Some((w, h)) => (edge(w)?, edge(h)?),
                None => (edge(body)?, None),
            };
            if width.is_none() && height.is_none() {
                return None;
            }
            ResizeSize::Box { width, height }
        };

        Some(Self { size, modifier })
    }
}

impl fmt::Display for ResizeGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.size {
            ResizeSize::Box { width, height } => {
                if let Some(w) = width {
                    write!(f, "{w}")?;
                }
                if let Some(h) = height {
                    write!(f, "x{h}")?;
                }
            }
            ResizeSize::Scale {
                x_percent,
                y_percent,
            } => write!(f, "{x_percent}%x{y_percent}%")?,
            ResizeSize::Area(area) => write!(f, "@{area}")?,
        }
        f.write_str(self.modifier.suffix())
    }
}
