use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use wrp_decode::{Polygon, ReadOptions, WorldData, forest};

#[derive(Parser)]
#[command(name = "wrp-info")]
#[command(about = "Summarize a WRP terrain file")]
struct Args {
    /// Terrain file to read
    path: PathBuf,

    /// Walk object records without decoding them
    #[arg(long)]
    skip_objects: bool,

    /// Reconstruct forest polygons
    #[arg(long)]
    forests: bool,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct Report<'a> {
    format: &'a wrp_decode::world::FormatInfo,
    grid: &'a wrp_decode::GridInfo,
    bounds: &'a wrp_decode::world::Bounds,
    stats: &'a wrp_decode::WorldStats,
    warnings: &'a [wrp_decode::Warning],
    #[serde(skip_serializing_if = "Option::is_none")]
    forests: Option<&'a [Polygon]>,
}

fn print_text(world: &WorldData, forests: Option<&[Polygon]>) {
    let grid = &world.grid;
    println!("format:    {} v{}", world.format.signature, world.format.version);
    println!(
        "land:      {}x{} cells of {} m",
        grid.land_size_x, grid.land_size_y, grid.cell_size
    );
    println!("terrain:   {}x{}", grid.terrain_size_x, grid.terrain_size_y);
    println!(
        "elevation: {:.2} .. {:.2}",
        world.bounds.min_elevation, world.bounds.max_elevation
    );
    let stats = &world.stats;
    println!("textures:  {}", stats.texture_count);
    println!("models:    {}", stats.model_count);
    println!("objects:   {}", stats.object_count);
    println!("roads:     {} nets, {} links", stats.road_net_count, stats.road_link_count);
    println!(
        "cells:     {} forest, {} roadway, {} sea",
        stats.cell_flags.forest, stats.cell_flags.roadway, stats.cell_flags.sea
    );
    if let Some(polygons) = forests {
        let area: f64 = polygons.iter().map(|p| p.area).sum();
        println!("forests:   {} polygons, {:.0} m2", polygons.len(), area);
        for p in polygons {
            println!(
                "  #{:<4} {:?} cells={} area={:.0} vertices={} holes={}",
                p.id,
                p.forest_type,
                p.cell_count,
                p.area,
                p.exterior.len().saturating_sub(1),
                p.holes.len()
            );
        }
    }
    for warning in &world.warnings {
        println!("warning:   {:?}: {}", warning.kind, warning.message);
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let options = ReadOptions { skip_objects: args.skip_objects };
    let file = BufReader::new(File::open(&args.path)?);
    let world = wrp_decode::read(file, &options)?;

    let forests = args.forests.then(|| forest::extract_from_world(&world));

    if args.json {
        let report = Report {
            format: &world.format,
            grid: &world.grid,
            bounds: &world.bounds,
            stats: &world.stats,
            warnings: &world.warnings,
            forests: forests.as_deref(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_text(&world, forests.as_deref());
    }
    Ok(())
}
