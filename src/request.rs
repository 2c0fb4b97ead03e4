//! Typed transform requests.
//!
//! Templates hand over one comma-joined option string per call. It is parsed
//! once here, at the boundary, into a [`TransformSpec`] with validated fields.
//! Positional fields per operation:
//!
//! | Operation | Fields |
//! |---|---|
//! | `resize` | geometry, format, quality, crop, gravity |
//! | `format` | format |
//! | `crop` | crop, gravity |
//! | `quality` | quality |
//! | `magick` | whitespace-separated tool arguments (no comma split) |
//!
//! Empty or unrecognised fields are no-ops and logged at `warn`. The one
//! exception is crop: a crop that cannot be parsed fails the request here,
//! before any path is resolved or pixel decoded.

use crate::imaging::{
    CropSpec, GeometryError, Gravity, OutputFormat, PixelOps, Quality, ResizeGeometry,
};
use crate::transform::TransformError;
use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The five operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Resize,
    Format,
    Crop,
    Quality,
    /// Options are passed straight to the external pixel tool.
    #[serde(rename = "magick", alias = "raw")]
    RawTool,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::Resize,
        Operation::Format,
        Operation::Crop,
        Operation::Quality,
        Operation::RawTool,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Operation::Resize => "resize",
            Operation::Format => "format",
            Operation::Crop => "crop",
            Operation::Quality => "quality",
            Operation::RawTool => "magick",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        if name == "raw" {
            return Ok(Operation::RawTool);
        }
        Operation::ALL
            .into_iter()
            .find(|op| op.name() == name)
            .ok_or_else(|| format!("unknown operation '{s}'"))
    }
}

/// Parsed parameters of one request, tagged by operation kind.
#[derive(Debug, Clone, PartialEq)]
pub enum TransformSpec {
    Resize {
        geometry: Option<ResizeGeometry>,
        format: Option<OutputFormat>,
        quality: Option<Quality>,
        crop: Option<CropSpec>,
        gravity: Option<Gravity>,
    },
    Format {
        format: Option<OutputFormat>,
    },
    Crop {
        crop: CropSpec,
        gravity: Option<Gravity>,
    },
    Quality {
        quality: Option<Quality>,
    },
    RawTool {
        args: Vec<String>,
    },
}

/// Positional fields of an option string, consumed in order.
struct Fields<'a> {
    operation: Operation,
    fields: std::vec::IntoIter<&'a str>,
}

impl<'a> Fields<'a> {
    fn new(operation: Operation, options: &'a str) -> Self {
        let fields: Vec<&str> = options.split(',').map(str::trim).collect();
        Self {
            operation,
            fields: fields.into_iter(),
        }
    }

    /// The next field, or `None` when absent or blank.
    fn next(&mut self) -> Option<&'a str> {
        self.fields.next().filter(|f| !f.is_empty())
    }

    /// Parse the next field; an unparseable value is dropped with a warning.
    fn parse<T>(&mut self, what: &str, parse: impl FnOnce(&str) -> Option<T>) -> Option<T> {
        let raw = self.next()?;
        let parsed = parse(raw);
        if parsed.is_none() {
            warn!("{}: ignoring unrecognised {what} '{raw}'", self.operation);
        }
        parsed
    }

    fn finish(mut self) {
        let extra: Vec<&str> = self.fields.by_ref().filter(|f| !f.is_empty()).collect();
        if !extra.is_empty() {
            warn!("{}: ignoring extra fields {extra:?}", self.operation);
        }
    }
}

impl TransformSpec {
    /// Parse an option string for `operation`.
    ///
    /// Fails with [`TransformError::InvalidInput`] on blank options and with
    /// [`GeometryError::MalformedCrop`] on a crop without an offset.
    pub fn parse(operation: Operation, options: &str) -> Result<Self, TransformError> {
        if options.trim().is_empty() {
            return Err(TransformError::InvalidInput("options must not be empty".into()));
        }

        let mut fields = Fields::new(operation, options);
        let spec = match operation {
            Operation::Resize => {
                let geometry = fields.parse("geometry", ResizeGeometry::parse);
                let format = fields.parse("format", OutputFormat::parse);
                let quality = fields.parse("quality", Quality::parse);
                let crop = fields.next().map(CropSpec::parse).transpose()?;
                let gravity = fields.parse("gravity", Gravity::parse);
                TransformSpec::Resize {
                    geometry,
                    format,
                    quality,
                    crop,
                    gravity,
                }
            }
            Operation::Format => TransformSpec::Format {
                format: fields.parse("format", OutputFormat::parse),
            },
            Operation::Crop => {
                let crop = match fields.next() {
                    Some(text) => CropSpec::parse(text)?,
                    None => return Err(GeometryError::MalformedCrop(options.trim().into()).into()),
                };
                let gravity = fields.parse("gravity", Gravity::parse);
                TransformSpec::Crop { crop, gravity }
            }
            Operation::Quality => TransformSpec::Quality {
                quality: fields.parse("quality", Quality::parse),
            },
            Operation::RawTool => {
                return Ok(TransformSpec::RawTool {
                    args: options.split_whitespace().map(String::from).collect(),
                });
            }
        };
        fields.finish();
        Ok(spec)
    }

    pub fn operation(&self) -> Operation {
        match self {
            TransformSpec::Resize { .. } => Operation::Resize,
            TransformSpec::Format { .. } => Operation::Format,
            TransformSpec::Crop { .. } => Operation::Crop,
            TransformSpec::Quality { .. } => Operation::Quality,
            TransformSpec::RawTool { .. } => Operation::RawTool,
        }
    }

    /// Canonical, kind-tagged rendering used as filename key material.
    ///
    /// Requests that parse to the same spec share a key; different kinds
    /// never do.
    pub fn cache_key(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        let mut push = |name: &str, value: Option<String>| {
            if let Some(value) = value {
                parts.push(format!("{name}={value}"));
            }
        };
        match self {
            TransformSpec::Resize {
                geometry,
                format,
                quality,
                crop,
                gravity,
            } => {
                push("geometry", geometry.as_ref().map(ToString::to_string));
                push("format", format.as_ref().map(ToString::to_string));
                push("quality", quality.map(|q| q.to_string()));
                push("crop", crop.as_ref().map(ToString::to_string));
                push("gravity", gravity.map(|g| g.to_string()));
            }
            TransformSpec::Format { format } => {
                push("format", format.as_ref().map(ToString::to_string));
            }
            TransformSpec::Crop { crop, gravity } => {
                push("crop", Some(crop.to_string()));
                push("gravity", gravity.map(|g| g.to_string()));
            }
            TransformSpec::Quality { quality } => {
                push("quality", quality.map(|q| q.to_string()));
            }
            TransformSpec::RawTool { args } => push("args", Some(args.join(" "))),
        }
        format!("{}:{}", self.operation(), parts.join(","))
    }

    /// Extension override for the destination filename.
    pub fn output_format(&self) -> Option<&OutputFormat> {
        match self {
            TransformSpec::Resize { format, .. } | TransformSpec::Format { format } => {
                format.as_ref()
            }
            _ => None,
        }
    }

    /// Pipeline stages for typed operations; `None` for the raw tool.
    pub fn pixel_ops(&self) -> Option<PixelOps> {
        let ops = match self {
            TransformSpec::Resize {
                geometry,
                format,
                quality,
                crop,
                gravity,
            } => PixelOps {
                crop: crop.clone(),
                gravity: *gravity,
                resize: geometry.clone(),
                format: format.clone(),
                quality: *quality,
            },
            TransformSpec::Format { format } => PixelOps {
                format: format.clone(),
                ..PixelOps::default()
            },
            TransformSpec::Crop { crop, gravity } => PixelOps {
                crop: Some(crop.clone()),
                gravity: *gravity,
                ..PixelOps::default()
            },
            TransformSpec::Quality { quality } => PixelOps {
                quality: *quality,
                ..PixelOps::default()
            },
            TransformSpec::RawTool { .. } => return None,
        };
        Some(ops)
    }

    pub fn tool_args(&self) -> Option<&[String]> {
        match self {
            TransformSpec::RawTool { args } => Some(args),
            _ => None,
        }
    }
}
