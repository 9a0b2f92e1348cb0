//! Encoder parameter families resolved per tile-component.

use std::fmt;
use std::str::FromStr;

use log::debug;

use super::layers::LayerPlan;
use super::spec_grid::{SpecGrid, SpecKind, SpecScope};
use crate::constants::{
    COMPONENT_TRANSFORM_COMPONENTS, DEFAULT_CODE_BLOCK_DIMENSION, DEFAULT_DECOMPOSITION_LEVELS,
    DEFAULT_GUARD_BITS, MAXIMUM_CODE_BLOCK_AREA, MAXIMUM_CODE_BLOCK_DIMENSION,
    MAXIMUM_DECOMPOSITION_LEVELS, MAXIMUM_GUARD_BITS, MINIMUM_CODE_BLOCK_DIMENSION,
};
use crate::error::{J2kError, J2kResult};

/// Quantization applied to the wavelet coefficients of a tile-component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuantizationType {
    /// No quantization, used with the reversible 5-3 filter.
    Reversible,
    /// Scalar derived: only the LL step size is signalled.
    Derived,
    /// Scalar expounded: a step size is signalled for every subband.
    Expounded,
}

impl QuantizationType {
    pub fn is_reversible(self) -> bool {
        self == Self::Reversible
    }
}

impl FromStr for QuantizationType {
    type Err = J2kError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "reversible" => Ok(Self::Reversible),
            "derived" => Ok(Self::Derived),
            "expounded" => Ok(Self::Expounded),
            _ => Err(J2kError::config(format!("unknown quantization type '{s}'"))),
        }
    }
}

impl fmt::Display for QuantizationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Reversible => "reversible",
            Self::Derived => "derived",
            Self::Expounded => "expounded",
        })
    }
}

/// Extent of an analysis filter around the sample it is centred on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterSupport {
    pub negative: i64,
    pub positive: i64,
}

/// Wavelet filter pair used for the decomposition of a tile-component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WaveletFilter {
    /// 5-3 reversible integer lifting filter.
    Reversible5x3,
    /// 9-7 irreversible (Daubechies) filter.
    Irreversible9x7,
}

impl WaveletFilter {
    pub fn is_reversible(self) -> bool {
        self == Self::Reversible5x3
    }

    pub fn low_pass_support(self) -> FilterSupport {
        match self {
            Self::Reversible5x3 => FilterSupport { negative: 2, positive: 2 },
            Self::Irreversible9x7 => FilterSupport { negative: 4, positive: 4 },
        }
    }

    pub fn high_pass_support(self) -> FilterSupport {
        match self {
            Self::Reversible5x3 => FilterSupport { negative: 1, positive: 1 },
            Self::Irreversible9x7 => FilterSupport { negative: 3, positive: 3 },
        }
    }

    /// The filter normally paired with a quantization type.
    pub fn for_quantization(quantization: QuantizationType) -> Self {
        if quantization.is_reversible() {
            Self::Reversible5x3
        } else {
            Self::Irreversible9x7
        }
    }
}

impl FromStr for WaveletFilter {
    type Err = J2kError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "w5x3" => Ok(Self::Reversible5x3),
            "w9x7" => Ok(Self::Irreversible9x7),
            _ => Err(J2kError::config(format!("unknown wavelet filter '{s}'"))),
        }
    }
}

impl fmt::Display for WaveletFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Reversible5x3 => "w5x3",
            Self::Irreversible9x7 => "w9x7",
        })
    }
}

/// Multiple component transform of a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentTransform {
    None,
    /// Reversible component transform, paired with the 5-3 filter.
    Rct,
    /// Irreversible component transform, paired with the 9-7 filter.
    Ict,
}

impl ComponentTransform {
    pub fn for_filter(filter: WaveletFilter) -> Self {
        match filter {
            WaveletFilter::Reversible5x3 => Self::Rct,
            WaveletFilter::Irreversible9x7 => Self::Ict,
        }
    }
}

impl fmt::Display for ComponentTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Rct => "rct",
            Self::Ict => "ict",
        })
    }
}

/// Nominal code-block size of a tile-component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CodeBlockSize {
    pub width: u32,
    pub height: u32,
}

impl CodeBlockSize {
    pub fn new(width: u32, height: u32) -> J2kResult<Self> {
        for (name, value) in [("width", width), ("height", height)] {
            if !(MINIMUM_CODE_BLOCK_DIMENSION..=MAXIMUM_CODE_BLOCK_DIMENSION).contains(&value)
                || !value.is_power_of_two()
            {
                return Err(J2kError::config(format!(
                    "code-block {name} {value} must be a power of two from \
                     {MINIMUM_CODE_BLOCK_DIMENSION} to {MAXIMUM_CODE_BLOCK_DIMENSION}"
                )));
            }
        }
        // Both are at most 1024, the product fits.
        if width * height > MAXIMUM_CODE_BLOCK_AREA {
            return Err(J2kError::config(format!(
                "code-block area {width}x{height} exceeds {MAXIMUM_CODE_BLOCK_AREA}"
            )));
        }
        Ok(Self { width, height })
    }
}

impl Default for CodeBlockSize {
    fn default() -> Self {
        Self {
            width: DEFAULT_CODE_BLOCK_DIMENSION,
            height: DEFAULT_CODE_BLOCK_DIMENSION,
        }
    }
}

impl FromStr for CodeBlockSize {
    type Err = J2kError;

    /// Parses `<width>x<height>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || J2kError::config(format!("bad code-block size '{s}'"));
        let (width, height) = s.split_once(['x', 'X']).ok_or_else(bad)?;
        let width = width.parse().map_err(|_| bad())?;
        let height = height.parse().map_err(|_| bad())?;
        Self::new(width, height)
    }
}

impl fmt::Display for CodeBlockSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Raw encoder options, one string per parameter family.
///
/// A `None` family takes its built-in default for every tile-component.
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderOptions {
    pub lossless: bool,
    pub quantization_type: Option<String>,
    pub filters: Option<String>,
    pub guard_bits: Option<String>,
    pub decomposition_levels: Option<String>,
    /// `on`/`off` per tile; by default the transform is used whenever the
    /// first three components share a filter.
    pub component_transform: Option<String>,
    /// Width and height pairs, e.g. `"64 64 t1 32 32"`.
    pub code_block_size: Option<String>,
    /// Overall target bitrate in bits per pixel.
    pub rate: f32,
    /// Layer formation, see [`LayerPlan::parse`].
    pub layers: String,
}

impl Default for EncoderOptions {
    fn default() -> Self {
        Self {
            lossless: false,
            quantization_type: None,
            filters: None,
            guard_bits: None,
            decomposition_levels: None,
            component_transform: None,
            code_block_size: None,
            rate: f32::MAX,
            layers: "sl".to_string(),
        }
    }
}

/// The resolved coding parameters of every tile-component of an image.
#[derive(Debug, Clone)]
pub struct EncoderSpecs {
    pub quantization_types: SpecGrid<QuantizationType>,
    pub filters: SpecGrid<WaveletFilter>,
    pub guard_bits: SpecGrid<u8>,
    pub decomposition_levels: SpecGrid<u8>,
    pub component_transforms: SpecGrid<ComponentTransform>,
    pub code_block_sizes: SpecGrid<CodeBlockSize>,
    pub layers: LayerPlan,
}

impl EncoderSpecs {
    pub fn new(
        num_tiles: usize,
        num_components: usize,
        options: &EncoderOptions,
    ) -> J2kResult<Self> {
        if num_tiles == 0 || num_components == 0 {
            return Err(J2kError::config(format!(
                "cannot code {num_tiles} tiles of {num_components} components"
            )));
        }
        let quantization_types = quantization_types(num_tiles, num_components, options)?;
        let filters = filters(num_tiles, num_components, options, &quantization_types)?;

        let guard_bits = integers(
            num_tiles,
            num_components,
            options.guard_bits.as_deref(),
            "guard bits",
            DEFAULT_GUARD_BITS,
            0..=MAXIMUM_GUARD_BITS,
        )?;
        let decomposition_levels = integers(
            num_tiles,
            num_components,
            options.decomposition_levels.as_deref(),
            "decomposition levels",
            DEFAULT_DECOMPOSITION_LEVELS,
            0..=MAXIMUM_DECOMPOSITION_LEVELS,
        )?;
        let component_transforms =
            component_transforms(num_tiles, num_components, options, &filters)?;
        let code_block_sizes = code_block_sizes(num_tiles, num_components, options)?;
        let layers = LayerPlan::parse(&options.layers, options.rate)?;

        debug!(
            "encoder specs for {num_tiles} tiles x {num_components} components, {} layers",
            layers.total_layers()
        );

        Ok(Self {
            quantization_types,
            filters,
            guard_bits,
            decomposition_levels,
            component_transforms,
            code_block_sizes,
            layers,
        })
    }

    pub fn is_reversible(&self, t: usize, c: usize) -> bool {
        self.quantization_types.get(t, c).is_reversible()
    }

    pub fn is_derived(&self, t: usize, c: usize) -> bool {
        *self.quantization_types.get(t, c) == QuantizationType::Derived
    }

    /// True when every tile-component uses reversible quantization through
    /// the default, without any override.
    pub fn is_fully_reversible(&self) -> bool {
        let grid = &self.quantization_types;
        grid.default_value().is_reversible()
            && grid
                .iter()
                .all(|(t, c, _)| grid.kind(t, c) == SpecKind::Default)
    }

    pub fn max_code_block_width(&self) -> u32 {
        self.code_block_sizes
            .iter()
            .map(|(_, _, size)| size.width)
            .max()
            .unwrap_or(DEFAULT_CODE_BLOCK_DIMENSION)
    }

    pub fn max_code_block_height(&self) -> u32 {
        self.code_block_sizes
            .iter()
            .map(|(_, _, size)| size.height)
            .max()
            .unwrap_or(DEFAULT_CODE_BLOCK_DIMENSION)
    }

    /// True when no tile-component uses reversible quantization.
    pub fn is_fully_non_reversible(&self) -> bool {
        self.quantization_types
            .iter()
            .all(|(_, _, q)| !q.is_reversible())
    }
}

fn quantization_types(
    num_tiles: usize,
    num_components: usize,
    options: &EncoderOptions,
) -> J2kResult<SpecGrid<QuantizationType>> {
    let fallback = if options.lossless {
        QuantizationType::Reversible
    } else {
        QuantizationType::Expounded
    };
    let Some(option) = options.quantization_type.as_deref() else {
        return Ok(SpecGrid::new(
            SpecScope::TileComponent,
            num_tiles,
            num_components,
            fallback,
        ));
    };

    SpecGrid::parse(
        SpecScope::TileComponent,
        num_tiles,
        num_components,
        option,
        |word| {
            let quantization: QuantizationType = word.parse()?;
            if options.lossless && !quantization.is_reversible() {
                return Err(J2kError::config(format!(
                    "cannot use {quantization} quantization in lossless mode"
                )));
            }
            Ok(quantization)
        },
        || Ok(fallback),
    )
}

fn filters(
    num_tiles: usize,
    num_components: usize,
    options: &EncoderOptions,
    quantization_types: &SpecGrid<QuantizationType>,
) -> J2kResult<SpecGrid<WaveletFilter>> {
    let fallback = if options.lossless {
        WaveletFilter::Reversible5x3
    } else {
        WaveletFilter::for_quantization(*quantization_types.default_value())
    };

    let grid = match options.filters.as_deref() {
        Some(option) => SpecGrid::parse(
            SpecScope::TileComponent,
            num_tiles,
            num_components,
            option,
            |word| {
                let filter: WaveletFilter = word.parse()?;
                if options.lossless && !filter.is_reversible() {
                    return Err(J2kError::config(format!(
                        "cannot use the {filter} filter in lossless mode"
                    )));
                }
                Ok(filter)
            },
            || Ok(fallback),
        )?,
        None => {
            // Follow the quantization type cell by cell.
            let mut grid =
                SpecGrid::new(SpecScope::TileComponent, num_tiles, num_components, fallback);
            for (t, c, quantization) in quantization_types.iter() {
                let filter = WaveletFilter::for_quantization(*quantization);
                if filter != fallback {
                    grid.set_tile_comp(t, c, filter)?;
                }
            }
            grid
        }
    };

    for (t, c, filter) in grid.iter() {
        if quantization_types.get(t, c).is_reversible() && !filter.is_reversible() {
            return Err(J2kError::config(format!(
                "tile {t} component {c}: reversible quantization requires the w5x3 filter"
            )));
        }
    }
    Ok(grid)
}

fn integers(
    num_tiles: usize,
    num_components: usize,
    option: Option<&str>,
    name: &str,
    default: u8,
    range: std::ops::RangeInclusive<u8>,
) -> J2kResult<SpecGrid<u8>> {
    let Some(option) = option else {
        return Ok(SpecGrid::new(
            SpecScope::TileComponent,
            num_tiles,
            num_components,
            default,
        ));
    };

    SpecGrid::parse(
        SpecScope::TileComponent,
        num_tiles,
        num_components,
        option,
        |word| {
            word.parse::<u8>()
                .ok()
                .filter(|v| range.contains(v))
                .ok_or_else(|| {
                    J2kError::config(format!(
                        "bad value '{word}' for {name}, expected {}..={}",
                        range.start(),
                        range.end()
                    ))
                })
        },
        || Ok(default),
    )
}

/// The transform tile `t` takes when it is switched on, or `None` when its
/// first three components do not share one filter.
fn tile_component_transform(
    t: usize,
    num_components: usize,
    filters: &SpecGrid<WaveletFilter>,
) -> Option<ComponentTransform> {
    if num_components < COMPONENT_TRANSFORM_COMPONENTS {
        return None;
    }
    let filter = *filters.get(t, 0);
    (1..COMPONENT_TRANSFORM_COMPONENTS)
        .all(|c| *filters.get(t, c) == filter)
        .then(|| ComponentTransform::for_filter(filter))
}

fn component_transforms(
    num_tiles: usize,
    num_components: usize,
    options: &EncoderOptions,
    filters: &SpecGrid<WaveletFilter>,
) -> J2kResult<SpecGrid<ComponentTransform>> {
    // None means the option left the tile to the automatic choice.
    let switches = match options.component_transform.as_deref() {
        Some(option) => SpecGrid::parse(
            SpecScope::Tile,
            num_tiles,
            num_components,
            option,
            |word| match word {
                "on" if num_components < COMPONENT_TRANSFORM_COMPONENTS => {
                    Err(J2kError::config(format!(
                        "cannot use a component transform on {num_components} components"
                    )))
                }
                "on" => Ok(Some(true)),
                "off" => Ok(Some(false)),
                _ => Err(J2kError::config(format!(
                    "unknown component transform '{word}', expected on or off"
                ))),
            },
            || Ok(None),
        )?,
        None => SpecGrid::new(SpecScope::Tile, num_tiles, num_components, None),
    };

    let transforms = (0..num_tiles)
        .map(|t| {
            let automatic = tile_component_transform(t, num_components, filters);
            match *switches.get(t, 0) {
                Some(false) => Ok(ComponentTransform::None),
                Some(true) => automatic.ok_or_else(|| {
                    J2kError::config(format!(
                        "tile {t}: the component transform needs one filter on the first three components"
                    ))
                }),
                None => Ok(automatic.unwrap_or(ComponentTransform::None)),
            }
        })
        .collect::<J2kResult<Vec<_>>>()?;

    let Some(&first) = transforms.first() else {
        return Err(J2kError::config("no tiles"));
    };
    let mut grid = SpecGrid::new(SpecScope::Tile, num_tiles, num_components, first);
    for (t, &transform) in transforms.iter().enumerate().skip(1) {
        if transform != first {
            grid.set_tile_default(t, transform)?;
        }
    }
    Ok(grid)
}

fn code_block_sizes(
    num_tiles: usize,
    num_components: usize,
    options: &EncoderOptions,
) -> J2kResult<SpecGrid<CodeBlockSize>> {
    let Some(option) = options.code_block_size.as_deref() else {
        return Ok(SpecGrid::new(
            SpecScope::TileComponent,
            num_tiles,
            num_components,
            CodeBlockSize::default(),
        ));
    };

    // Sizes are written as two words; join them so that each is one value.
    let mut words = option.split_whitespace();
    let mut joined = Vec::new();
    while let Some(word) = words.next() {
        if word.starts_with(|c: char| c.is_ascii_digit()) {
            let height = words.next().ok_or_else(|| {
                J2kError::config(format!("code-block width {word} without a height"))
            })?;
            joined.push(format!("{word}x{height}"));
        } else {
            joined.push(word.to_string());
        }
    }

    SpecGrid::parse(
        SpecScope::TileComponent,
        num_tiles,
        num_components,
        &joined.join(" "),
        str::parse,
        || Ok(CodeBlockSize::default()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> EncoderOptions {
        EncoderOptions::default()
    }

    #[test]
    fn test_defaults() {
        let specs = EncoderSpecs::new(2, 3, &options()).unwrap();
        assert_eq!(*specs.quantization_types.get(1, 2), QuantizationType::Expounded);
        assert_eq!(*specs.filters.get(0, 0), WaveletFilter::Irreversible9x7);
        assert_eq!(*specs.guard_bits.get(1, 1), DEFAULT_GUARD_BITS);
        assert_eq!(*specs.decomposition_levels.get(0, 2), DEFAULT_DECOMPOSITION_LEVELS);
        assert_eq!(specs.layers.total_layers(), 1);
        assert!(specs.is_fully_non_reversible());
        assert!(!specs.is_fully_reversible());
    }

    #[test]
    fn test_lossless_defaults() {
        let opts = EncoderOptions {
            lossless: true,
            ..options()
        };
        let specs = EncoderSpecs::new(1, 3, &opts).unwrap();
        assert!(specs.is_fully_reversible());
        assert_eq!(*specs.filters.get(0, 1), WaveletFilter::Reversible5x3);
    }

    #[test]
    fn test_lossless_rejects_irreversible_values() {
        let opts = EncoderOptions {
            lossless: true,
            quantization_type: Some("derived".into()),
            ..options()
        };
        assert!(matches!(EncoderSpecs::new(1, 1, &opts), Err(J2kError::Config(_))));

        let opts = EncoderOptions {
            lossless: true,
            filters: Some("w9x7".into()),
            ..options()
        };
        assert!(EncoderSpecs::new(1, 1, &opts).is_err());
    }

    #[test]
    fn test_filters_follow_quantization_per_cell() {
        let opts = EncoderOptions {
            quantization_type: Some("expounded t1 c0 reversible".into()),
            ..options()
        };
        let specs = EncoderSpecs::new(2, 2, &opts).unwrap();
        assert!(specs.is_reversible(1, 0));
        assert!(!specs.is_reversible(1, 1));
        assert_eq!(*specs.filters.get(1, 0), WaveletFilter::Reversible5x3);
        assert_eq!(*specs.filters.get(1, 1), WaveletFilter::Irreversible9x7);
        assert!(!specs.is_fully_non_reversible());
    }

    #[test]
    fn test_reversible_cell_with_9x7_is_rejected() {
        let opts = EncoderOptions {
            quantization_type: Some("reversible".into()),
            filters: Some("w5x3 t0 w9x7".into()),
            ..options()
        };
        assert!(EncoderSpecs::new(2, 1, &opts).is_err());
    }

    #[test]
    fn test_integer_families() {
        let opts = EncoderOptions {
            guard_bits: Some("1 c2 3".into()),
            decomposition_levels: Some("t0 4 t1 6".into()),
            ..options()
        };
        let specs = EncoderSpecs::new(2, 3, &opts).unwrap();
        assert_eq!(*specs.guard_bits.get(0, 0), 1);
        assert_eq!(*specs.guard_bits.get(1, 2), 3);
        assert_eq!(*specs.decomposition_levels.get(0, 1), 4);
        assert_eq!(*specs.decomposition_levels.get(1, 1), 6);
        assert_eq!(*specs.decomposition_levels.max(), 6);

        let opts = EncoderOptions {
            guard_bits: Some("8".into()),
            ..options()
        };
        assert!(EncoderSpecs::new(1, 1, &opts).is_err());
    }

    #[test]
    fn test_derived() {
        let opts = EncoderOptions {
            quantization_type: Some("derived c1 expounded".into()),
            ..options()
        };
        let specs = EncoderSpecs::new(1, 2, &opts).unwrap();
        assert!(specs.is_derived(0, 0));
        assert!(!specs.is_derived(0, 1));
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("W9X7".parse::<WaveletFilter>().unwrap(), WaveletFilter::Irreversible9x7);
        assert_eq!(QuantizationType::Derived.to_string(), "derived");
        assert!("w7x9".parse::<WaveletFilter>().is_err());
    }

    #[test]
    fn test_component_transform_defaults() {
        let specs = EncoderSpecs::new(2, 3, &options()).unwrap();
        assert_eq!(*specs.component_transforms.get(1, 0), ComponentTransform::Ict);

        let lossless = EncoderOptions {
            lossless: true,
            ..options()
        };
        let specs = EncoderSpecs::new(1, 3, &lossless).unwrap();
        assert_eq!(*specs.component_transforms.get(0, 2), ComponentTransform::Rct);

        let specs = EncoderSpecs::new(1, 2, &options()).unwrap();
        assert_eq!(*specs.component_transforms.get(0, 0), ComponentTransform::None);
    }

    #[test]
    fn test_component_transform_follows_tile_filters() {
        let opts = EncoderOptions {
            quantization_type: Some("t0 reversible expounded".into()),
            ..options()
        };
        let specs = EncoderSpecs::new(2, 3, &opts).unwrap();
        assert_eq!(*specs.component_transforms.get(0, 1), ComponentTransform::Rct);
        assert_eq!(*specs.component_transforms.get(1, 1), ComponentTransform::Ict);
        assert_eq!(specs.component_transforms.kind(1, 0), SpecKind::TileDefault);

        let opts = EncoderOptions {
            component_transform: Some("on t1 off".into()),
            ..options()
        };
        let specs = EncoderSpecs::new(2, 3, &opts).unwrap();
        assert_eq!(*specs.component_transforms.get(0, 0), ComponentTransform::Ict);
        assert_eq!(*specs.component_transforms.get(1, 0), ComponentTransform::None);
    }

    #[test]
    fn test_component_transform_with_mixed_filters() {
        let opts = EncoderOptions {
            filters: Some("w9x7 c1 w5x3".into()),
            ..options()
        };
        let specs = EncoderSpecs::new(1, 3, &opts).unwrap();
        assert_eq!(*specs.component_transforms.get(0, 0), ComponentTransform::None);

        let opts = EncoderOptions {
            component_transform: Some("on".into()),
            ..opts
        };
        assert!(matches!(EncoderSpecs::new(1, 3, &opts), Err(J2kError::Config(_))));
    }

    #[test]
    fn test_component_transform_errors() {
        let on = |option: &str| EncoderOptions {
            component_transform: Some(option.into()),
            ..options()
        };
        assert!(EncoderSpecs::new(1, 2, &on("on")).is_err());
        assert!(EncoderSpecs::new(1, 3, &on("c0 on")).is_err());
        assert!(EncoderSpecs::new(1, 3, &on("rct")).is_err());
        assert!(EncoderSpecs::new(1, 2, &on("off")).is_ok());
    }

    #[test]
    fn test_code_block_sizes() {
        let opts = EncoderOptions {
            code_block_size: Some("32 32 t1 c0 64 16".into()),
            ..options()
        };
        let specs = EncoderSpecs::new(2, 2, &opts).unwrap();
        assert_eq!(*specs.code_block_sizes.get(0, 0), CodeBlockSize::new(32, 32).unwrap());
        assert_eq!(*specs.code_block_sizes.get(1, 0), CodeBlockSize::new(64, 16).unwrap());
        assert_eq!(specs.max_code_block_width(), 64);
        assert_eq!(specs.max_code_block_height(), 32);

        let specs = EncoderSpecs::new(1, 1, &options()).unwrap();
        assert_eq!(specs.code_block_sizes.get(0, 0).to_string(), "64x64");
    }

    #[test]
    fn test_code_block_size_limits() {
        assert!(CodeBlockSize::new(4, 1024).is_ok());
        assert!(CodeBlockSize::new(2, 4).is_err());
        assert!(CodeBlockSize::new(2048, 4).is_err());
        assert!(CodeBlockSize::new(48, 32).is_err());
        assert!(CodeBlockSize::new(128, 64).is_err());
        assert!("16X16".parse::<CodeBlockSize>().is_ok());

        let size = |option: &str| EncoderOptions {
            code_block_size: Some(option.into()),
            ..options()
        };
        assert!(EncoderSpecs::new(1, 1, &size("64")).is_err());
        assert!(EncoderSpecs::new(1, 1, &size("64 t0")).is_err());
        assert!(EncoderSpecs::new(1, 1, &size("64 64 c0")).is_err());
    }

    #[test]
    fn test_empty_image_is_rejected() {
        assert!(EncoderSpecs::new(0, 3, &options()).is_err());
        assert!(EncoderSpecs::new(1, 0, &options()).is_err());
    }
}
