// Copyright @yucwang 2026

use std::fs;
use std::path::{ Path, PathBuf };

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::core::transfer::{
    ColorScheme, Interpolation, OpacityCurve, OpacityTriangle, PiecewiseFunction,
};
use crate::math::constants::{ Float, Vector2i, Vector3f, Vector4f };
use crate::volume::voxel::{ CuttingPlane, MaskMode };

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(String),
    MissingField(&'static str),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "config io error: {}", err),
            ConfigError::Parse(msg) => write!(f, "config parse error: {}", msg),
            ConfigError::MissingField(field) => write!(f, "config is missing field: {}", field),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub size: Vector2i,
    pub samples: usize,
    pub itrs: u32,
    pub bake_resolution: usize,
    pub table_resolution: usize,
}

/// Everything a render session needs besides the scan folder itself.
#[derive(Debug)]
pub struct SessionConfig {
    pub render: RenderSettings,
    pub mask_mode: MaskMode,
    pub cutting_plane: Option<CuttingPlane>,
    pub color: ColorScheme,
    pub opacity: OpacityCurve,
    pub cubemap_folder: Option<PathBuf>,
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<SessionConfig, ConfigError> {
    let xml = fs::read_to_string(path)?;
    parse_config(&xml)
}

pub fn parse_config(xml: &str) -> Result<SessionConfig, ConfigError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();

    let mut render: Option<RenderSettings> = None;
    let mut mask_mode = MaskMode::None;
    let mut cutting_plane: Option<CuttingPlane> = None;
    let mut color_hsv: Option<ColorScheme> = None;
    let mut color_stops: Option<PiecewiseFunction<Vector4f>> = None;
    let mut opacity_stops: Option<PiecewiseFunction<Float>> = None;
    let mut opacity_triangles: Vec<OpacityTriangle> = Vec::new();
    let mut cubemap_folder: Option<PathBuf> = None;

    // Stop lists accumulate into whichever table's element we are inside.
    let mut in_color = false;
    let mut in_opacity = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                match e.name().as_ref() {
                    b"render" => {
                        let mut size_x: Option<i32> = None;
                        let mut size_y: Option<i32> = None;
                        let mut samples = 1usize;
                        let mut itrs = 1u32;
                        let mut bake_resolution = 64usize;
                        let mut table_resolution = 100usize;
                        for attr in e.attributes().flatten() {
                            let value = attr.unescape_value().unwrap_or_default();
                            match attr.key.as_ref() {
                                b"size_x" => size_x = Some(parse_num(&value, "render.size_x")?),
                                b"size_y" => size_y = Some(parse_num(&value, "render.size_y")?),
                                b"samples" => samples = parse_num(&value, "render.samples")?,
                                b"itrs" => itrs = parse_num(&value, "render.itrs")?,
                                b"bake_resolution" => {
                                    bake_resolution = parse_num(&value, "render.bake_resolution")?;
                                }
                                b"table_resolution" => {
                                    table_resolution = parse_num(&value, "render.table_resolution")?;
                                }
                                _ => {}
                            }
                        }
                        let size_x = size_x.ok_or(ConfigError::MissingField("render.size_x"))?;
                        let size_y = size_y.ok_or(ConfigError::MissingField("render.size_y"))?;
                        render = Some(RenderSettings {
                            size: Vector2i::new(size_x, size_y),
                            samples,
                            itrs,
                            bake_resolution,
                            table_resolution,
                        });
                    }
                    b"volume" => {
                        for attr in e.attributes().flatten() {
                            if attr.key.as_ref() == b"mask_mode" {
                                let value = attr.unescape_value().unwrap_or_default();
                                mask_mode = match value.as_ref() {
                                    "none" => MaskMode::None,
                                    "body" => MaskMode::Body,
                                    "isolate" => MaskMode::Isolate,
                                    other => {
                                        return Err(ConfigError::Parse(
                                            format!("unknown mask_mode: {}", other)));
                                    }
                                };
                            }
                        }
                    }
                    b"cutting_plane" => {
                        let mut point: Option<Vector3f> = None;
                        let mut normal: Option<Vector3f> = None;
                        for attr in e.attributes().flatten() {
                            let value = attr.unescape_value().unwrap_or_default();
                            match attr.key.as_ref() {
                                b"point" => point = Some(parse_vec3(&value)?),
                                b"normal" => normal = Some(parse_vec3(&value)?),
                                _ => {}
                            }
                        }
                        let point = point.ok_or(ConfigError::MissingField("cutting_plane.point"))?;
                        let normal = normal.ok_or(ConfigError::MissingField("cutting_plane.normal"))?;
                        cutting_plane = Some(CuttingPlane::new(point, normal));
                    }
                    b"color" => {
                        let mut scheme = String::new();
                        let mut contrast: Option<Vector3f> = None;
                        for attr in e.attributes().flatten() {
                            let value = attr.unescape_value().unwrap_or_default();
                            match attr.key.as_ref() {
                                b"scheme" => scheme = value.to_string(),
                                b"contrast" => contrast = Some(parse_vec3(&value)?),
                                _ => {}
                            }
                        }
                        match scheme.as_str() {
                            "hsv" => {
                                let contrast = contrast
                                    .ok_or(ConfigError::MissingField("color.contrast"))?;
                                color_hsv = Some(ColorScheme::Hsv {
                                    contrast_bottom: contrast.x,
                                    contrast_top: contrast.y,
                                    value: contrast.z,
                                });
                                in_color = false;
                            }
                            "" | "stops" => {
                                color_stops = Some(PiecewiseFunction::new(parse_interpolation(&e)?));
                                in_color = true;
                                in_opacity = false;
                            }
                            other => {
                                return Err(ConfigError::Parse(
                                    format!("unknown color scheme: {}", other)));
                            }
                        }
                    }
                    b"opacity" => {
                        opacity_stops = Some(PiecewiseFunction::new(parse_interpolation(&e)?));
                        in_opacity = true;
                        in_color = false;
                    }
                    b"triangle" => {
                        if !in_opacity {
                            return Err(ConfigError::Parse(
                                "triangle outside an opacity element".to_string()));
                        }
                        let mut overall: Option<Float> = None;
                        let mut lowest: Option<Float> = None;
                        let mut bottom_width: Option<Float> = None;
                        let mut top_width: Option<Float> = None;
                        let mut center: Option<Float> = None;
                        for attr in e.attributes().flatten() {
                            let value = attr.unescape_value().unwrap_or_default();
                            match attr.key.as_ref() {
                                b"overall" => overall = Some(parse_num(&value, "triangle.overall")?),
                                b"lowest" => lowest = Some(parse_num(&value, "triangle.lowest")?),
                                b"bottom_width" => {
                                    bottom_width = Some(parse_num(&value, "triangle.bottom_width")?);
                                }
                                b"top_width" => {
                                    top_width = Some(parse_num(&value, "triangle.top_width")?);
                                }
                                b"center" => center = Some(parse_num(&value, "triangle.center")?),
                                _ => {}
                            }
                        }
                        opacity_triangles.push(OpacityTriangle {
                            overall: overall.ok_or(ConfigError::MissingField("triangle.overall"))?,
                            lowest: lowest.ok_or(ConfigError::MissingField("triangle.lowest"))?,
                            bottom_width: bottom_width
                                .ok_or(ConfigError::MissingField("triangle.bottom_width"))?,
                            top_width: top_width
                                .ok_or(ConfigError::MissingField("triangle.top_width"))?,
                            center: center.ok_or(ConfigError::MissingField("triangle.center"))?,
                        });
                    }
                    b"stop" => {
                        let mut key: Option<Float> = None;
                        let mut rgba: Option<Vector4f> = None;
                        let mut scalar: Option<Float> = None;
                        for attr in e.attributes().flatten() {
                            let value = attr.unescape_value().unwrap_or_default();
                            match attr.key.as_ref() {
                                b"key" => key = Some(parse_num(&value, "stop.key")?),
                                b"rgba" => rgba = Some(parse_vec4(&value)?),
                                b"value" => scalar = Some(parse_num(&value, "stop.value")?),
                                _ => {}
                            }
                        }
                        let key = key.ok_or(ConfigError::MissingField("stop.key"))?;
                        if in_color {
                            let rgba = rgba.ok_or(ConfigError::MissingField("stop.rgba"))?;
                            if let Some(stops) = color_stops.as_mut() {
                                stops.add_stop(key, rgba);
                            }
                        } else if in_opacity {
                            let scalar = scalar.ok_or(ConfigError::MissingField("stop.value"))?;
                            if let Some(stops) = opacity_stops.as_mut() {
                                stops.add_stop(key, scalar);
                            }
                        }
                    }
                    b"cubemap" => {
                        for attr in e.attributes().flatten() {
                            if attr.key.as_ref() == b"folder" {
                                let value = attr.unescape_value().unwrap_or_default();
                                cubemap_folder = Some(PathBuf::from(value.as_ref()));
                            }
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::End(e)) => {
                match e.name().as_ref() {
                    b"color" => in_color = false,
                    b"opacity" => in_opacity = false,
                    _ => {}
                }
            }
            Ok(_) => {}
            Err(err) => return Err(ConfigError::Parse(err.to_string())),
        }
        buf.clear();
    }

    let render = render.ok_or(ConfigError::MissingField("render"))?;
    let color = match color_hsv {
        Some(scheme) => scheme,
        None => {
            let mut stops = color_stops.ok_or(ConfigError::MissingField("color"))?;
            // Density 0 and 1 always resolve to a color, whatever range the
            // stops were authored over.
            stops.pad_to_unit_domain();
            ColorScheme::Stops(stops)
        }
    };
    let opacity = if !opacity_triangles.is_empty() {
        OpacityCurve::Triangles(opacity_triangles)
    } else {
        OpacityCurve::Stops(opacity_stops.ok_or(ConfigError::MissingField("opacity"))?)
    };

    Ok(SessionConfig {
        render,
        mask_mode,
        cutting_plane,
        color,
        opacity,
        cubemap_folder,
    })
}

fn parse_interpolation(e: &quick_xml::events::BytesStart<'_>) -> Result<Interpolation, ConfigError> {
    let mut interpolation = Interpolation::Linear;
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == b"interpolation" {
            let value = attr.unescape_value().unwrap_or_default();
            interpolation = match value.as_ref() {
                "linear" => Interpolation::Linear,
                "constant" => Interpolation::Constant,
                other => {
                    return Err(ConfigError::Parse(format!("unknown interpolation: {}", other)));
                }
            };
        }
    }
    Ok(interpolation)
}

fn parse_num<T: std::str::FromStr>(value: &str, field: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>()
        .map_err(|_| ConfigError::Parse(format!("bad value for {}: {}", field, value)))
}

fn parse_floats(value: &str) -> Result<Vec<Float>, ConfigError> {
    value.split_whitespace()
        .map(|part| parse_num::<Float>(part, "vector component"))
        .collect()
}

fn parse_vec3(value: &str) -> Result<Vector3f, ConfigError> {
    let parts = parse_floats(value)?;
    if parts.len() != 3 {
        return Err(ConfigError::Parse(format!("expected 3 components: {}", value)));
    }
    Ok(Vector3f::new(parts[0], parts[1], parts[2]))
}

fn parse_vec4(value: &str) -> Result<Vector4f, ConfigError> {
    let parts = parse_floats(value)?;
    if parts.len() != 4 {
        return Err(ConfigError::Parse(format!("expected 4 components: {}", value)));
    }
    Ok(Vector4f::new(parts[0], parts[1], parts[2], parts[3]))
}
