use argscene::{
    build_scene, diff, DisplayParams, FilterMode, GeographicContext, GeographicMode,
    GeographicShape, NodeId, SpacingMode, TreeSequencePayload,
};
use clap::Parser;
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "argscene")]
#[command(about = "Lay out an ancestral recombination graph as a 3D scene.", long_about = None)]
struct Args {
    // MANDATORY OPTIONS
    /// Load a tree-sequence payload (JSON) from this FILE. Repeat to lay out several.
    #[arg(short = 'i', long = "input", value_name = "FILE", required = true)]
    inputs: Vec<PathBuf>,

    /// Write the scene to this FILE, or into this directory when several inputs are given.
    #[arg(short = 'o', long = "out", value_name = "PATH")]
    out: PathBuf,

    // Diff Options
    /// Compare the input against a second spatial inference of the same graph.
    #[arg(short = 'd', long = "diff-with", value_name = "FILE")]
    diff_with: Option<PathBuf>,

    // Geography Options
    /// Overlay shape (GeoJSON-like, with optional bounds) for the custom geographic mode.
    #[arg(short = 'g', long = "shape", value_name = "FILE")]
    shape: Option<PathBuf>,

    /// Geographic mode (defaults to the mode suggested by the payload metadata).
    #[arg(short = 'G', long = "geographic-mode", value_name = "MODE")]
    geographic_mode: Option<GeographicMode>,

    /// Anchor the spatial frame to the shape bounds.
    #[arg(long = "anchor", conflicts_with = "no_anchor")]
    anchor: bool,

    /// Frame the data by its own extent even when a shape is shown.
    #[arg(long = "no-anchor")]
    no_anchor: bool,

    // Layout Options
    /// Read display parameters from this JSON FILE; flags below override it.
    #[arg(short = 'P', long = "params", value_name = "FILE")]
    params: Option<PathBuf>,

    /// Temporal spacing mode.
    #[arg(short = 'm', long = "spacing-mode", value_name = "MODE")]
    spacing_mode: Option<SpacingMode>,

    /// Rendered footprint of the planar frame.
    #[arg(short = 'x', long = "spatial-spacing", value_name = "FLOAT")]
    spatial_spacing: Option<f64>,

    /// Depth distance between consecutive time steps.
    #[arg(short = 'z', long = "temporal-spacing", value_name = "FLOAT")]
    temporal_spacing: Option<f64>,

    /// Do not fold indistinguishable ancestors together.
    #[arg(short = 'n', long = "no-combine")]
    no_combine: bool,

    /// Do not add per-node depth jitter.
    #[arg(short = 'J', long = "no-jitter")]
    no_jitter: bool,

    // Styling Options
    /// Temporal window to isolate: MIN:MAX.
    #[arg(short = 'w', long = "time-window", value_name = "MIN:MAX")]
    time_window: Option<String>,

    /// What happens outside the temporal window.
    #[arg(short = 'f', long = "filter-mode", value_name = "MODE")]
    filter_mode: Option<FilterMode>,

    /// Highlight the node with this id.
    #[arg(short = 's', long = "select", value_name = "ID")]
    select: Option<NodeId>,

    // Output
    /// Pretty-print the JSON output.
    #[arg(short = 'p', long = "pretty")]
    pretty: bool,

    // Threading
    /// Number of threads to use when laying out several inputs.
    #[arg(short = 't', long = "threads", value_name = "N")]
    threads: Option<usize>,

    // Logging
    /// Verbosity level (0 = error, 1 = info, 2 = debug).
    #[arg(short = 'v', long = "verbose", value_name = "N", default_value_t = 1)]
    verbose: u8,
}

/// Parse `MIN:MAX` into a time window.
fn parse_time_window(s: &str) -> Option<[f64; 2]> {
    let (min, max) = s.split_once(':')?;
    let min: f64 = min.trim().parse().ok()?;
    let max: f64 = max.trim().parse().ok()?;
    Some([min, max])
}

fn display_params(args: &Args) -> argscene::Result<DisplayParams> {
    let mut params = match &args.params {
        Some(path) => DisplayParams::load(path)?,
        None => DisplayParams::default(),
    };

    if let Some(mode) = args.spacing_mode {
        params.spacing_mode = mode;
    }
    if let Some(spacing) = args.spatial_spacing {
        params.spatial_spacing = spacing;
    }
    if let Some(spacing) = args.temporal_spacing {
        params.temporal_spacing = spacing;
    }
    if args.no_combine {
        params.combine_nodes = false;
    }
    if args.no_jitter {
        params.jitter = false;
    }
    if let Some(mode) = args.geographic_mode {
        params.geographic_mode = Some(mode);
    }
    if args.anchor {
        params.anchor_to_shape = Some(true);
    } else if args.no_anchor {
        params.anchor_to_shape = Some(false);
    }
    if let Some(ref window) = args.time_window {
        let window = parse_time_window(window).ok_or_else(|| {
            argscene::Error::InvalidParams(format!("time window '{}' is not MIN:MAX", window))
        })?;
        params.temporal_filter.window = Some(window);
    }
    if let Some(mode) = args.filter_mode {
        params.temporal_filter.mode = mode;
    }
    if args.select.is_some() {
        params.selected_node = args.select;
    }

    params.validate()?;
    Ok(params)
}

fn load_payload(path: &Path) -> argscene::Result<TreeSequencePayload> {
    let text = std::fs::read_to_string(path)?;
    let payload = TreeSequencePayload::from_json_str(&text)?;
    info!(
        "Loaded {:?}: {} nodes, {} edges",
        path,
        payload.nodes.len(),
        payload.edges.len()
    );
    Ok(payload)
}

fn load_shape(path: &Path) -> argscene::Result<GeographicShape> {
    let text = std::fs::read_to_string(path)?;
    GeographicShape::from_json_str(&text)
}

fn write_json<T: Serialize>(path: &Path, value: &T, pretty: bool) -> argscene::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    if pretty {
        serde_json::to_writer_pretty(&mut writer, value)?;
    } else {
        serde_json::to_writer(&mut writer, value)?;
    }
    writer.flush()?;
    Ok(())
}

/// Lay out one payload and write its scene. Returns false when nothing was spatial.
fn render_one(
    input: &Path,
    out: &Path,
    params: &DisplayParams,
    shape: Option<&GeographicShape>,
    pretty: bool,
) -> argscene::Result<bool> {
    let (graph, metadata) = load_payload(input)?.split();
    let geo = GeographicContext::resolve(
        params.geographic_mode,
        params.anchor_to_shape,
        shape,
        &metadata,
    );
    debug!("{:?}: geographic mode {:?}, anchored: {}", input, geo.mode, geo.anchor);

    match build_scene(&graph, &geo, params) {
        Some(scene) => {
            info!(
                "Saving {} nodes and {} edges to {:?}...",
                scene.nodes.len(),
                scene.edges.len(),
                out
            );
            write_json(out, &scene, pretty)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

fn render_diff(
    input: &Path,
    second: &Path,
    out: &Path,
    params: &DisplayParams,
    shape: Option<&GeographicShape>,
    pretty: bool,
) -> argscene::Result<()> {
    let (first, metadata) = load_payload(input)?.split();
    let (second, _) = load_payload(second)?.split();
    let geo = GeographicContext::resolve(
        params.geographic_mode,
        params.anchor_to_shape,
        shape,
        &metadata,
    );

    let scene = diff(&first, &second.nodes, &geo, params)?;
    info!(
        "Saving {} nodes and {} movement connectors to {:?}...",
        scene.nodes.len(),
        scene.diff_edges.len(),
        out
    );
    write_json(out, &scene, pretty)
}

fn scene_path(out_dir: &Path, input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "scene".to_string());
    out_dir.join(format!("{}.scene.json", stem))
}

fn main() {
    let args = Args::parse();

    // Initialize logger based on verbosity
    env_logger::Builder::new()
        .filter_level(match args.verbose {
            0 => log::LevelFilter::Error,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .init();

    if let Some(threads) = args.threads {
        if let Err(e) = rayon::ThreadPoolBuilder::new().num_threads(threads).build_global() {
            warn!("Could not configure {} threads: {}", threads, e);
        }
    }

    info!("Starting layout...");

    let params = match display_params(&args) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let shape = match args.shape.as_deref().map(load_shape).transpose() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error loading shape: {}", e);
            std::process::exit(1);
        }
    };

    if let Some(ref second) = args.diff_with {
        if args.inputs.len() != 1 {
            eprintln!("Error: --diff-with takes exactly one --input.");
            std::process::exit(1);
        }
        if let Err(e) = render_diff(
            &args.inputs[0],
            second,
            &args.out,
            &params,
            shape.as_ref(),
            args.pretty,
        ) {
            eprintln!("Error computing diff: {}", e);
            std::process::exit(1);
        }
        info!("Done.");
        return;
    }

    let jobs: Vec<(PathBuf, PathBuf)> = if args.inputs.len() == 1 {
        vec![(args.inputs[0].clone(), args.out.clone())]
    } else {
        if let Err(e) = std::fs::create_dir_all(&args.out) {
            eprintln!("Error creating directory {:?}: {}", args.out, e);
            std::process::exit(1);
        }
        args.inputs
            .iter()
            .map(|input| (input.clone(), scene_path(&args.out, input)))
            .collect()
    };

    let results: Vec<(PathBuf, argscene::Result<bool>)> = jobs
        .par_iter()
        .map(|(input, out)| {
            let result = render_one(input, out, &params, shape.as_ref(), args.pretty);
            (input.clone(), result)
        })
        .collect();

    let mut failed = false;
    for (input, result) in results {
        match result {
            Ok(true) => {}
            Ok(false) => {
                eprintln!(
                    "Warning: no node in {:?} has a spatial location; nothing to lay out.",
                    input
                );
            }
            Err(e) => {
                eprintln!("Error processing {:?}: {}", input, e);
                failed = true;
            }
        }
    }
    if failed {
        std::process::exit(1);
    }

    info!("Done.");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_window_parses() {
        assert_eq!(parse_time_window("10:250.5"), Some([10.0, 250.5]));
        assert_eq!(parse_time_window(" 0 : 1 "), Some([0.0, 1.0]));
        assert_eq!(parse_time_window("10"), None);
        assert_eq!(parse_time_window("a:b"), None);
    }

    #[test]
    fn flags_override_defaults() {
        let args = Args::parse_from([
            "argscene",
            "-i",
            "a.json",
            "-o",
            "out.json",
            "-m",
            "log",
            "-w",
            "1:5",
            "-f",
            "hide",
            "-G",
            "eastern-hemisphere",
            "--no-anchor",
            "-n",
        ]);
        let params = display_params(&args).unwrap();
        assert_eq!(params.spacing_mode, SpacingMode::Log);
        assert_eq!(params.temporal_filter.window, Some([1.0, 5.0]));
        assert_eq!(params.temporal_filter.mode, FilterMode::Hide);
        assert_eq!(params.geographic_mode, Some(GeographicMode::EasternHemisphere));
        assert_eq!(params.anchor_to_shape, Some(false));
        assert!(!params.combine_nodes);
    }

    #[test]
    fn scene_paths_use_input_stem() {
        assert_eq!(
            scene_path(Path::new("out"), Path::new("data/run1.json")),
            PathBuf::from("out/run1.scene.json")
        );
    }
}
