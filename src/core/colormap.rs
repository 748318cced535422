//! Velocity colour mapping
//!
//! Colour scales form a closed registry resolved once by name. A `ColorMapper`
//! binds a scale to a (vmin, vmax) range and turns velocities into KML colour
//! strings (`aabbggrr`).

use crate::types::{KmzError, KmzResult, ValidityMask, VelocityGrid};
use std::fmt;
use std::str::FromStr;

/// RGBA colour with components in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba { r: 0.0, g: 0.0, b: 0.0, a: 0.0 };

    pub fn opaque(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// KML colour string: alpha, blue, green, red as lowercase hex
    pub fn to_kml_hex(&self) -> String {
        format!(
            "{:02x}{:02x}{:02x}{:02x}",
            quantize(self.a),
            quantize(self.b),
            quantize(self.g),
            quantize(self.r)
        )
    }

    /// 8-bit RGBA, used by the legend renderer
    pub fn to_rgba8(&self) -> [u8; 4] {
        [quantize(self.r), quantize(self.g), quantize(self.b), quantize(self.a)]
    }
}

fn quantize(channel: f64) -> u8 {
    (channel.clamp(0.0, 1.0) * 255.0).round() as u8
}

// Piecewise-linear channel anchors: (position, value)
type Channel = &'static [(f64, f64)];

const JET_RED: Channel = &[(0.0, 0.0), (0.35, 0.0), (0.66, 1.0), (0.89, 1.0), (1.0, 0.5)];
const JET_GREEN: Channel = &[
    (0.0, 0.0),
    (0.125, 0.0),
    (0.375, 1.0),
    (0.64, 1.0),
    (0.91, 0.0),
    (1.0, 0.0),
];
const JET_BLUE: Channel = &[(0.0, 0.5), (0.11, 1.0), (0.34, 1.0), (0.65, 0.0), (1.0, 0.0)];

// Sampled from the perceptually uniform viridis table at every 32nd entry
const VIRIDIS: &[[f64; 3]] = &[
    [0.267004, 0.004874, 0.329415],
    [0.282623, 0.140926, 0.457517],
    [0.229739, 0.322361, 0.545706],
    [0.172719, 0.448791, 0.557885],
    [0.127568, 0.566949, 0.550556],
    [0.134692, 0.658636, 0.517649],
    [0.266941, 0.748751, 0.440573],
    [0.565498, 0.842430, 0.262877],
    [0.993248, 0.906157, 0.143936],
];

// ColorBrewer 11-class RdBu
const RDBU: &[[f64; 3]] = &[
    [0.403922, 0.000000, 0.121569],
    [0.698039, 0.094118, 0.168627],
    [0.839216, 0.376471, 0.301961],
    [0.956863, 0.647059, 0.509804],
    [0.992157, 0.858824, 0.780392],
    [0.968627, 0.968627, 0.968627],
    [0.819608, 0.898039, 0.941176],
    [0.572549, 0.772549, 0.870588],
    [0.262745, 0.576471, 0.764706],
    [0.129412, 0.400000, 0.674510],
    [0.019608, 0.188235, 0.380392],
];

// Nine-stop samples of the matplotlib perceptual and diverging maps
const PLASMA: &[[f64; 3]] = &[
    [0.050383, 0.029803, 0.527975],
    [0.254627, 0.013882, 0.615419],
    [0.417642, 0.000564, 0.658390],
    [0.562738, 0.051545, 0.641509],
    [0.692840, 0.165141, 0.564522],
    [0.798216, 0.280197, 0.469538],
    [0.881443, 0.392529, 0.383229],
    [0.949217, 0.517763, 0.295662],
    [0.940015, 0.975158, 0.131326],
];

const INFERNO: &[[f64; 3]] = &[
    [0.001462, 0.000466, 0.013866],
    [0.087411, 0.044556, 0.224813],
    [0.258234, 0.038571, 0.406485],
    [0.416331, 0.090203, 0.432943],
    [0.578304, 0.148039, 0.404411],
    [0.735683, 0.215906, 0.330245],
    [0.865006, 0.316822, 0.226055],
    [0.954506, 0.468744, 0.099874],
    [0.988362, 0.998364, 0.644924],
];

const MAGMA: &[[f64; 3]] = &[
    [0.001462, 0.000466, 0.013866],
    [0.078815, 0.054184, 0.211667],
    [0.232077, 0.059889, 0.437695],
    [0.390384, 0.100379, 0.501864],
    [0.550287, 0.161158, 0.505719],
    [0.716387, 0.214982, 0.475290],
    [0.868793, 0.287728, 0.409303],
    [0.967671, 0.439703, 0.359630],
    [0.987053, 0.991438, 0.749504],
];

const CIVIDIS: &[[f64; 3]] = &[
    [0.000000, 0.135112, 0.304751],
    [0.084338, 0.200868, 0.420529],
    [0.225000, 0.288000, 0.428000],
    [0.340000, 0.368000, 0.436000],
    [0.441000, 0.453000, 0.473000],
    [0.560000, 0.535000, 0.470000],
    [0.688000, 0.628000, 0.441000],
    [0.830000, 0.730000, 0.380000],
    [0.995737, 0.909344, 0.217772],
];

const COOLWARM: &[[f64; 3]] = &[
    [0.229806, 0.298718, 0.753683],
    [0.347031, 0.462645, 0.875771],
    [0.484206, 0.622218, 0.974868],
    [0.666622, 0.779176, 0.992505],
    [0.865003, 0.865003, 0.865003],
    [0.957107, 0.777049, 0.676860],
    [0.968203, 0.656917, 0.536844],
    [0.905557, 0.439134, 0.353013],
    [0.705673, 0.015556, 0.150233],
];

// Cold-to-hot ramp through white
const TEMPERATURE: &[[f64; 3]] = &[
    [0.141176, 0.000000, 0.847059],
    [0.094118, 0.109804, 0.968627],
    [0.156863, 0.341176, 1.000000],
    [0.505882, 0.756863, 1.000000],
    [1.000000, 1.000000, 1.000000],
    [1.000000, 0.854902, 0.498039],
    [1.000000, 0.576471, 0.258824],
    [0.968627, 0.152941, 0.207843],
    [0.647059, 0.000000, 0.129412],
];

const SEISMIC_RED: Channel = &[(0.0, 0.0), (0.25, 0.0), (0.5, 1.0), (0.75, 1.0), (1.0, 0.5)];
const SEISMIC_GREEN: Channel = &[(0.0, 0.0), (0.25, 0.0), (0.5, 1.0), (0.75, 0.0), (1.0, 0.0)];
const SEISMIC_BLUE: Channel = &[(0.0, 0.3), (0.25, 1.0), (0.5, 1.0), (0.75, 0.0), (1.0, 0.0)];

/// Supported colour scales
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorScale {
    Jet,
    Viridis,
    Plasma,
    Inferno,
    Magma,
    Cividis,
    RdBu,
    Coolwarm,
    Seismic,
    Temperature,
    Hsv,
    Gray,
}

impl ColorScale {
    pub const ALL: [ColorScale; 12] = [
        ColorScale::Jet,
        ColorScale::Viridis,
        ColorScale::Plasma,
        ColorScale::Inferno,
        ColorScale::Magma,
        ColorScale::Cividis,
        ColorScale::RdBu,
        ColorScale::Coolwarm,
        ColorScale::Seismic,
        ColorScale::Temperature,
        ColorScale::Hsv,
        ColorScale::Gray,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ColorScale::Jet => "jet",
            ColorScale::Viridis => "viridis",
            ColorScale::Plasma => "plasma",
            ColorScale::Inferno => "inferno",
            ColorScale::Magma => "magma",
            ColorScale::Cividis => "cividis",
            ColorScale::RdBu => "RdBu",
            ColorScale::Coolwarm => "coolwarm",
            ColorScale::Seismic => "seismic",
            ColorScale::Temperature => "temperature",
            ColorScale::Hsv => "hsv",
            ColorScale::Gray => "gray",
        }
    }

    /// Evaluate at `x` in [0, 1]
    fn eval(&self, x: f64) -> Rgba {
        match self {
            ColorScale::Jet => Rgba::opaque(
                interp_channel(JET_RED, x),
                interp_channel(JET_GREEN, x),
                interp_channel(JET_BLUE, x),
            ),
            ColorScale::Viridis => interp_table(VIRIDIS, x),
            ColorScale::Plasma => interp_table(PLASMA, x),
            ColorScale::Inferno => interp_table(INFERNO, x),
            ColorScale::Magma => interp_table(MAGMA, x),
            ColorScale::Cividis => interp_table(CIVIDIS, x),
            ColorScale::RdBu => interp_table(RDBU, x),
            ColorScale::Coolwarm => interp_table(COOLWARM, x),
            ColorScale::Seismic => Rgba::opaque(
                interp_channel(SEISMIC_RED, x),
                interp_channel(SEISMIC_GREEN, x),
                interp_channel(SEISMIC_BLUE, x),
            ),
            ColorScale::Temperature => interp_table(TEMPERATURE, x),
            ColorScale::Hsv => hsv_to_rgb(x * 360.0, 1.0, 1.0),
            ColorScale::Gray => Rgba::opaque(x, x, x),
        }
    }
}

fn interp_channel(anchors: Channel, x: f64) -> f64 {
    for pair in anchors.windows(2) {
        let (x0, y0) = pair[0];
        let (x1, y1) = pair[1];
        if x <= x1 {
            let t = if x1 > x0 { (x - x0) / (x1 - x0) } else { 0.0 };
            return y0 + (y1 - y0) * t;
        }
    }
    anchors[anchors.len() - 1].1
}

fn interp_table(table: &[[f64; 3]], x: f64) -> Rgba {
    let last = (table.len() - 1) as f64;
    let pos = x * last;
    let lo = (pos.floor() as usize).min(table.len() - 2);
    let t = pos - lo as f64;
    let [r0, g0, b0] = table[lo];
    let [r1, g1, b1] = table[lo + 1];
    Rgba::opaque(r0 + (r1 - r0) * t, g0 + (g1 - g0) * t, b0 + (b1 - b0) * t)
}

/// HSV to RGB with hue in degrees and s, v in [0, 1]
fn hsv_to_rgb(h: f64, s: f64, v: f64) -> Rgba {
    let h = h % 360.0;
    let c = v * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = v - c;

    let (r, g, b) = if h < 60.0 {
        (c, x, 0.0)
    } else if h < 120.0 {
        (x, c, 0.0)
    } else if h < 180.0 {
        (0.0, c, x)
    } else if h < 240.0 {
        (0.0, x, c)
    } else if h < 300.0 {
        (x, 0.0, c)
    } else {
        (c, 0.0, x)
    };
    Rgba::opaque(r + m, g + m, b + m)
}

/// A named colour scale, optionally reversed (`_r` suffix)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorMap {
    pub scale: ColorScale,
    pub reversed: bool,
}

impl ColorMap {
    /// Colour at position `x`. Out-of-range positions take the endpoint
    /// colours; NaN is transparent.
    pub fn color_at(&self, x: f64) -> Rgba {
        if x.is_nan() {
            return Rgba::TRANSPARENT;
        }
        let x = x.clamp(0.0, 1.0);
        let x = if self.reversed { 1.0 - x } else { x };
        self.scale.eval(x)
    }
}

impl FromStr for ColorMap {
    type Err = KmzError;

    fn from_str(name: &str) -> KmzResult<Self> {
        let (base, reversed) = match name.strip_suffix("_r") {
            Some(base) => (base, true),
            None => (name, false),
        };
        ColorScale::ALL
            .iter()
            .find(|s| s.name().eq_ignore_ascii_case(base))
            .map(|&scale| ColorMap { scale, reversed })
            .ok_or_else(|| {
                let known: Vec<_> = ColorScale::ALL.iter().map(|s| s.name()).collect();
                KmzError::InvalidConfiguration(format!(
                    "Unknown colormap '{}' (supported: {}, optionally with _r)",
                    name,
                    known.join(", ")
                ))
            })
    }
}

impl fmt::Display for ColorMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.reversed {
            write!(f, "{}_r", self.scale.name())
        } else {
            write!(f, "{}", self.scale.name())
        }
    }
}

/// Colour mapping of velocities over a fixed display range
#[derive(Debug, Clone, Copy)]
pub struct ColorMapper {
    colormap: ColorMap,
    vmin: f64,
    vmax: f64,
}

impl ColorMapper {
    /// Mapper with explicit bounds
    pub fn new(colormap: ColorMap, vmin: f64, vmax: f64) -> KmzResult<Self> {
        if !vmin.is_finite() || !vmax.is_finite() {
            return Err(KmzError::InvalidConfiguration(format!(
                "Display limits must be finite, got [{}, {}]",
                vmin, vmax
            )));
        }
        if vmin > vmax {
            return Err(KmzError::InvalidConfiguration(format!(
                "vmin ({}) must not exceed vmax ({})",
                vmin, vmax
            )));
        }
        if vmin == vmax {
            log::warn!(
                "Degenerate display range [{}, {}], all markers share one colour",
                vmin,
                vmax
            );
        }
        Ok(Self { colormap, vmin, vmax })
    }

    /// Mapper with explicit bounds if given, otherwise the min/max of the
    /// valid velocities
    pub fn from_field(
        colormap: ColorMap,
        vlim: Option<(f64, f64)>,
        velocity: &VelocityGrid,
        mask: &ValidityMask,
        scale: f64,
    ) -> KmzResult<Self> {
        let (vmin, vmax) = match vlim {
            Some(bounds) => bounds,
            None => {
                let mut bounds: Option<(f64, f64)> = None;
                for (&v, _) in velocity.iter().zip(mask.iter()).filter(|(_, m)| **m) {
                    let v = v as f64 * scale;
                    bounds = Some(match bounds {
                        Some((lo, hi)) => (lo.min(v), hi.max(v)),
                        None => (v, v),
                    });
                }
                bounds.ok_or_else(|| {
                    KmzError::InvalidConfiguration(
                        "Cannot derive display limits: velocity has no valid pixels".to_string(),
                    )
                })?
            }
        };
        log::debug!("Velocity display range: [{}, {}]", vmin, vmax);
        Self::new(colormap, vmin, vmax)
    }

    pub fn colormap(&self) -> ColorMap {
        self.colormap
    }

    pub fn vmin(&self) -> f64 {
        self.vmin
    }

    pub fn vmax(&self) -> f64 {
        self.vmax
    }

    /// Affine map of [vmin, vmax] onto [0, 1]; not clamped
    pub fn normalize(&self, v: f64) -> f64 {
        if self.vmax == self.vmin {
            return 0.0;
        }
        (v - self.vmin) / (self.vmax - self.vmin)
    }

    pub fn color_of(&self, v: f64) -> Rgba {
        self.colormap.color_at(self.normalize(v))
    }

    pub fn encode(&self, color: Rgba) -> String {
        color.to_kml_hex()
    }
}
