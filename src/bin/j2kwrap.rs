//! j2kwrap CLI - JPEG 2000 codestream wrapping and encoder parameter inspection.
//!
//! Wraps raw codestreams into JP2 files and shows how encoder options resolve
//! into layers, per tile-component parameters and ROI masks.

use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};

use j2k_assembly::jpeg2000::jp2::is_jp2;
use j2k_assembly::jpeg2000::roi_mask::MaskNode;
use j2k_assembly::{
    EncoderOptions, EncoderSpecs, Jp2Header, Jp2Reader, LayerPlan, Rect, SubbandMaskTree,
    WaveletFilter, wrap_codestream_file, write_jp2_file,
};

/// JPEG 2000 codestream wrapping and encoder parameter inspection
#[derive(Parser)]
#[command(name = "j2kwrap")]
#[command(version)]
#[command(about = "Wrap JPEG 2000 codestreams in JP2 files and inspect encoder options", long_about = None)]
#[command(after_help = "EXAMPLES:
    j2kwrap wrap -i image.j2k -W 512 -H 512 --bpc 8,8,8
    j2kwrap wrap -i image.j2k -o image.jp2 -W 512 -H 512 --bpc 12
    j2kwrap info -i image.jp2
    j2kwrap layers --rate 2.0 --layers \"0.25 +2 0.5 1.0\"
    j2kwrap specs --tiles 4 --components 3 --qtype \"t0 reversible expounded\" --mct on
    j2kwrap roi -W 256 -H 256 --levels 2 --rect 10,10,32,32")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Wrap a raw codestream in a JP2 container
    ///
    /// Without an output path the input file is replaced by the JP2 file.
    /// The replacement only happens once the new file is completely written.
    #[command(visible_alias = "w")]
    Wrap {
        /// Raw codestream file
        #[arg(short, long, help = "Path to the raw codestream")]
        input: PathBuf,

        /// Output JP2 file (defaults to replacing the input)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Image width in pixels
        #[arg(short = 'W', long)]
        width: u32,

        /// Image height in pixels
        #[arg(short = 'H', long)]
        height: u32,

        /// Bit depth of each component, comma separated
        #[arg(long, value_delimiter = ',', required = true)]
        bpc: Vec<u8>,
    },

    /// Display the JP2 header of a file
    #[command(visible_alias = "i")]
    Info {
        /// JP2 file
        #[arg(short, long, help = "Path to the JP2 file to inspect")]
        input: PathBuf,
    },

    /// Show the quality layers produced by a layer option
    #[command(visible_alias = "l")]
    Layers {
        /// Overall target bitrate in bits per pixel
        #[arg(short, long)]
        rate: f32,

        /// Layer option, e.g. "0.25 +2 0.5 1.0" or "sl"
        #[arg(long, default_value = "sl")]
        layers: String,
    },

    /// Resolve encoder options for every tile-component
    #[command(visible_alias = "s")]
    Specs {
        #[arg(short, long, default_value = "1")]
        tiles: usize,

        #[arg(short = 'n', long, default_value = "1")]
        components: usize,

        /// Lossless coding (reversible quantization and 5x3 filters)
        #[arg(long)]
        lossless: bool,

        /// Quantization type option: reversible, derived or expounded
        #[arg(long)]
        qtype: Option<String>,

        /// Wavelet filter option: w5x3 or w9x7
        #[arg(long)]
        filters: Option<String>,

        /// Guard bits option
        #[arg(long)]
        guard_bits: Option<String>,

        /// Decomposition levels option
        #[arg(long)]
        levels: Option<String>,

        /// Component transform option: on or off per tile
        #[arg(long)]
        mct: Option<String>,

        /// Code-block size option, e.g. "64 64 t1 32 32"
        #[arg(long)]
        code_blocks: Option<String>,
    },

    /// Show the subbands of a decomposition and the ROI mask of each
    #[command(visible_alias = "r")]
    Roi {
        /// Tile-component width
        #[arg(short = 'W', long)]
        width: i64,

        /// Tile-component height
        #[arg(short = 'H', long)]
        height: i64,

        /// Number of decomposition levels
        #[arg(long, default_value = "5")]
        levels: u8,

        /// ROI rectangle as x,y,w,h (repeatable)
        #[arg(long, value_delimiter = ',', num_args = 4)]
        rect: Vec<i64>,

        /// Wavelet filter: w5x3 or w9x7
        #[arg(long, default_value = "w5x3")]
        filter: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Wrap {
            input,
            output,
            width,
            height,
            bpc,
        } => wrap(&input, output.as_deref(), width, height, bpc),
        Commands::Info { input } => show_info(&input),
        Commands::Layers { rate, layers } => show_layers(rate, &layers),
        Commands::Specs {
            tiles,
            components,
            lossless,
            qtype,
            filters,
            guard_bits,
            levels,
            mct,
            code_blocks,
        } => {
            let options = EncoderOptions {
                lossless,
                quantization_type: qtype,
                filters,
                guard_bits,
                decomposition_levels: levels,
                component_transform: mct,
                code_block_size: code_blocks,
                ..EncoderOptions::default()
            };
            show_specs(tiles, components, &options)
        }
        Commands::Roi {
            width,
            height,
            levels,
            rect,
            filter,
        } => show_roi(width, height, levels, &rect, &filter),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn wrap(
    input: &Path,
    output: Option<&Path>,
    width: u32,
    height: u32,
    bpc: Vec<u8>,
) -> Result<(), Box<dyn std::error::Error>> {
    let header = Jp2Header::new(width, height, bpc)?;

    let (written, target) = match output {
        Some(output) => {
            let codestream = fs::read(input)?;
            (write_jp2_file(output, &codestream, &header)?, output)
        }
        None => (wrap_codestream_file(input, &header)?, input),
    };

    println!(
        "✓ Wrote {:?}: {} bytes ({} bytes of boxes)",
        target,
        written,
        header.overhead()
    );
    Ok(())
}

fn show_info(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let data = fs::read(input)?;
    if !is_jp2(&data) {
        return Err(format!("{:?} is not a JP2 file", input).into());
    }

    let mut reader = Jp2Reader::new(&data);
    let header = reader
        .read_header()?
        .ok_or("missing JP2 header")?;
    let codestream = reader
        .find_codestream()?
        .ok_or("missing contiguous codestream box")?;

    println!("File: {:?}", input);
    println!("Size: {} bytes", data.len());
    println!("Dimensions: {}x{}", header.width, header.height);
    println!("Components: {}", header.num_components());
    println!("Bits per component: {:?}", header.bits_per_component);
    println!("Colourspace: {:?}", header.colour_space());
    println!("Codestream: {} bytes", codestream.len());
    Ok(())
}

fn show_layers(rate: f32, layers: &str) -> Result<(), Box<dyn std::error::Error>> {
    let plan = LayerPlan::parse(layers, rate)?;

    println!("Overall bitrate: {} bpp", plan.overall_bitrate());
    println!("Total layers: {}", plan.total_layers());
    for n in 0..plan.num_optimization_points() {
        println!(
            "  point {}: {} bpp, {} extra layers",
            n,
            plan.target_bitrate(n),
            plan.extra_layers(n)
        );
    }
    Ok(())
}

fn show_specs(
    tiles: usize,
    components: usize,
    options: &EncoderOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let specs = EncoderSpecs::new(tiles, components, options)?;

    println!("Fully reversible: {}", specs.is_fully_reversible());
    println!("Fully non-reversible: {}", specs.is_fully_non_reversible());
    println!(
        "Maximum code-block: {}x{}",
        specs.max_code_block_width(),
        specs.max_code_block_height()
    );
    println!(
        "{:>4} {:>4}  {:<10} {:<6} {:>10} {:>7} {:<4} {:<9}",
        "tile", "comp", "quant", "filter", "guard bits", "levels", "mct", "blocks"
    );
    for t in 0..tiles {
        for c in 0..components {
            println!(
                "{:>4} {:>4}  {:<10} {:<6} {:>10} {:>7} {:<4} {:<9}",
                t,
                c,
                specs.quantization_types.get(t, c).to_string(),
                specs.filters.get(t, c).to_string(),
                specs.guard_bits.get(t, c),
                specs.decomposition_levels.get(t, c),
                specs.component_transforms.get(t, c).to_string(),
                specs.code_block_sizes.get(t, c).to_string()
            );
        }
    }
    Ok(())
}

fn show_roi(
    width: i64,
    height: i64,
    levels: u8,
    rect: &[i64],
    filter: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let filter: WaveletFilter = filter.parse()?;
    let rois: Vec<Rect> = rect
        .chunks_exact(4)
        .map(|r| Rect::new(r[0], r[1], r[2], r[3]))
        .collect();

    let tree = SubbandMaskTree::with_rois(Rect::new(0, 0, width, height), &rois, levels, filter)?;
    for leaf in tree.leaves() {
        print_leaf(leaf);
    }
    Ok(())
}

fn print_leaf(leaf: &MaskNode) {
    let subband = leaf.subband();
    let r = subband.rect;
    println!(
        "{:?}{} at ({}, {}) {}x{}",
        subband.orientation, subband.level, r.ulx, r.uly, r.w, r.h
    );
    for roi in &subband.rois {
        println!(
            "    ROI ({}, {}) {}x{}",
            roi.ulx, roi.uly, roi.w, roi.h
        );
    }
}
