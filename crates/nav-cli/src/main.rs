//! CLI utility for inspecting navigation meshes and prebuilding crumb caches

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use glam::Vec3;
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};

use nav_core::binary_format::{nav_mesh_from_bytes, nav_mesh_to_bytes};
use nav_core::{
    append_cached_crumbs, cache_path, CostContext, Crumb, CrumbCache, CrumbTrail, NavConfig,
    NavMap, NavMesh, PathOutcome,
};

/// Tooling for `.nav` navigation meshes
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Navigation config (JSON); defaults are used for missing fields
    #[clap(long, global = true, value_parser)]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print header fields, counts, signature and bounds of a mesh
    Info {
        /// Input navigation mesh file
        #[clap(long, value_parser)]
        mesh: PathBuf,

        /// Map name used for the signature (defaults to the file stem)
        #[clap(long)]
        map: Option<String>,
    },

    /// Re-serialize a mesh and report whether the output matches the input
    Export {
        /// Input navigation mesh file
        #[clap(long, value_parser)]
        mesh: PathBuf,

        /// Output navigation mesh file
        #[clap(long, value_parser)]
        output: PathBuf,
    },

    /// Build crumbs for every connection and save the cache
    BuildCache {
        /// Input navigation mesh file
        #[clap(long, value_parser)]
        mesh: PathBuf,

        /// Map name the cache is stored under (defaults to the file stem)
        #[clap(long)]
        map: Option<String>,

        /// Cache directory (defaults to `crumb_cache_dir` from the config)
        #[clap(long, value_parser)]
        cache_dir: Option<PathBuf>,
    },

    /// Find a path on a navigation mesh, ignoring trace checks
    FindPath {
        /// Input navigation mesh file
        #[clap(long, value_parser)]
        mesh: PathBuf,

        /// Start position (x,y,z)
        #[clap(long, value_parser = parse_vector)]
        start: Vec3,

        /// End position (x,y,z)
        #[clap(long, value_parser = parse_vector)]
        end: Vec3,

        /// Output path file (JSON)
        #[clap(long, value_parser)]
        output: Option<PathBuf>,
    },
}

/// Parse a comma-separated vector
fn parse_vector(s: &str) -> Result<Vec3, String> {
    let parts: Vec<&str> = s.split(',').collect();

    if parts.len() != 3 {
        return Err(format!(
            "Vector must have 3 components, got {}",
            parts.len()
        ));
    }

    let x = parts[0].trim().parse::<f32>().map_err(|e| e.to_string())?;
    let y = parts[1].trim().parse::<f32>().map_err(|e| e.to_string())?;
    let z = parts[2].trim().parse::<f32>().map_err(|e| e.to_string())?;

    Ok(Vec3::new(x, y, z))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;

    match args.command {
        Commands::Info { mesh, map } => print_info(&mesh, map.as_deref()),
        Commands::Export { mesh, output } => export_mesh(&mesh, &output),
        Commands::BuildCache {
            mesh,
            map,
            cache_dir,
        } => {
            let dir = cache_dir
                .or_else(|| config.crumb_cache_dir.clone())
                .ok_or_else(|| anyhow!("No cache directory given and none configured"))?;
            build_cache(&mesh, map.as_deref(), &dir)
        }
        Commands::FindPath {
            mesh,
            start,
            end,
            output,
        } => find_path(&config, &mesh, start, end, output.as_deref()),
    }
}

fn load_config(path: Option<&Path>) -> Result<NavConfig> {
    let Some(path) = path else {
        return Ok(NavConfig::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid config: {}", path.display()))
}

fn map_name(mesh_path: &Path, map: Option<&str>) -> String {
    match map {
        Some(name) => name.to_string(),
        None => mesh_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default(),
    }
}

fn load_mesh(path: &Path) -> Result<NavMesh> {
    info!("Loading navigation mesh from {}", path.display());
    NavMesh::load(path).with_context(|| format!("Failed to load mesh: {}", path.display()))
}

/// Print a summary of a mesh
fn print_info(mesh_path: &Path, map: Option<&str>) -> Result<()> {
    let mesh = load_mesh(mesh_path)?;
    let signature = mesh.signature(&map_name(mesh_path, map));

    println!("Version: {} (sub-version {})", mesh.version, mesh.sub_version);
    println!("Source size: {}", mesh.source_size);
    println!("Analyzed: {}", mesh.analyzed);
    println!("Places: {}", mesh.places.len());
    println!("Areas: {}", mesh.area_count());

    let connections: usize = mesh.areas().iter().map(|area| area.connections().len()).sum();
    let hiding_spots: usize = mesh.areas().iter().map(|area| area.hiding_spots.len()).sum();
    println!("Connections: {}", connections);
    println!("Hiding spots: {}", hiding_spots);
    println!(
        "Signature: {} size={} areas={}",
        signature.name, signature.size, signature.area_count
    );
    if let Some((min, max)) = mesh.bounds() {
        println!("Bounds: min={:?}, max={:?}", min, max);
    }

    Ok(())
}

/// Re-serialize a mesh and compare the result against the input bytes
fn export_mesh(input: &Path, output: &Path) -> Result<()> {
    let original =
        fs::read(input).with_context(|| format!("Failed to read mesh: {}", input.display()))?;
    let mesh = nav_mesh_from_bytes(&original)
        .with_context(|| format!("Failed to parse mesh: {}", input.display()))?;
    let bytes = nav_mesh_to_bytes(&mesh)?;

    fs::write(output, &bytes)
        .with_context(|| format!("Failed to write mesh: {}", output.display()))?;
    println!("Wrote {} areas to {}", mesh.area_count(), output.display());

    if bytes == original {
        println!("Output is byte-identical to the input");
    } else {
        let first_diff = bytes
            .iter()
            .zip(&original)
            .position(|(a, b)| a != b)
            .unwrap_or(bytes.len().min(original.len()));
        warn!(
            "Output differs from input at byte {} ({} vs {} bytes)",
            first_diff,
            bytes.len(),
            original.len()
        );
        println!("Output differs from the input");
    }

    Ok(())
}

/// Build the crumb cache for every connection and write it to `dir`
fn build_cache(mesh_path: &Path, map: Option<&str>, dir: &Path) -> Result<()> {
    let mesh = load_mesh(mesh_path)?;
    let name = map_name(mesh_path, map);
    if name.is_empty() {
        bail!("Cannot derive a map name from {}", mesh_path.display());
    }

    let mut cache = CrumbCache::build(&mesh, None);
    let path = cache_path(dir, &name);
    cache.save(&path, &mesh.signature(&name))?;

    println!("Cached crumbs for {} connections in {}", cache.len(), path.display());
    Ok(())
}

/// Find a path on a navigation mesh
fn find_path(
    config: &NavConfig,
    mesh_path: &Path,
    start: Vec3,
    end: Vec3,
    output: Option<&Path>,
) -> Result<()> {
    let mesh = load_mesh(mesh_path)?;
    let mut map = NavMap::new(map_name(mesh_path, None), mesh);

    let start_area = map
        .find_closest_area(&start, true)
        .ok_or_else(|| anyhow!("No nav area near start {:?}", start))?;
    let end_area = map
        .find_closest_area(&end, false)
        .ok_or_else(|| anyhow!("No nav area near end {:?}", end))?;

    println!("Finding path from {:?} to {:?}...", start, end);

    let ctx = CostContext::new(config, 0).with_ignore_traces(true);
    let outcome = map.find_path(&ctx, start_area, end_area)?;
    let (areas, cost) = match outcome {
        PathOutcome::Found(path) => (path.areas, path.cost),
        PathOutcome::StartEndSame => (vec![start_area], 0.0),
        PathOutcome::NoSolution { .. } => bail!("No path between {} and {}", start_area, end_area),
    };

    let mut trail = CrumbTrail::new();
    for pair in areas.windows(2) {
        let cached = map.connection_crumbs(pair[0], pair[1], None);
        append_cached_crumbs(&mut trail, pair[0], &cached);
    }
    trail.push_back(Crumb::new(end, end_area));

    let area_ids: Vec<u32> = areas
        .iter()
        .filter_map(|handle| map.mesh().area(*handle).map(|area| area.id))
        .collect();

    println!("Found path through {} areas, cost {:.1}", area_ids.len(), cost);

    if let Some(output_path) = output {
        let crumbs: Vec<serde_json::Value> = trail
            .iter()
            .map(|crumb| {
                serde_json::json!({
                    "pos": [crumb.pos.x, crumb.pos.y, crumb.pos.z],
                    "area": map.mesh().area(crumb.area).map(|area| area.id),
                    "requiresDrop": crumb.requires_drop,
                })
            })
            .collect();
        let report = serde_json::json!({
            "start": [start.x, start.y, start.z],
            "end": [end.x, end.y, end.z],
            "cost": cost,
            "areas": area_ids,
            "crumbs": crumbs,
        });

        fs::write(output_path, serde_json::to_string_pretty(&report)?)
            .with_context(|| format!("Failed to write output: {}", output_path.display()))?;
        println!("Saved path to {}", output_path.display());
    } else {
        println!("Areas: {:?}", area_ids);
        println!("Crumbs:");
        for (i, crumb) in trail.iter().enumerate() {
            let drop = if crumb.requires_drop { " (drop)" } else { "" };
            println!("{}: {},{},{}{}", i, crumb.pos.x, crumb.pos.y, crumb.pos.z, drop);
        }
    }

    Ok(())
}
