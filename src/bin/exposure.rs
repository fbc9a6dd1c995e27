//! Exposure CLI: build snapshots, index them, search and explore.
//!
//! Usage:
//!   exposure build [--protocol id]... [--out dir]
//!   exposure index [--out dir]
//!   exposure all [--out dir]
//!   exposure search [query] [--protocol p] [--chain c] [--curator c] [--apy-min n] [--apy-max n]
//!   exposure explore <id> [--chain c] [--protocol p] [--focus id] [--drill id]... [--api [url]]

use clap::{ArgAction, Parser, Subcommand};
use exposure_graph::explore::{
    format::{chain_label, format_apy, format_percent, format_usd_compact},
    Drilldown, ExplorerSession, FileSnapshotSource, HttpSnapshotSource, SnapshotRequest, SnapshotSource, ViewState,
};
use exposure_graph::index::{build_from_store, rebuild_search_index};
use exposure_graph::{
    build_draft_graphs_by_asset, persist_build, AdapterRegistry, ExposureConfig, FileSnapshotStore, OpenStore,
    RootIdSet, SearchIndexEntry, SearchQuery, SnapshotStore,
};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::runtime::Runtime;
use tracing::Level;

#[derive(Parser)]
#[command(name = "exposure", version, about = "Capital allocation graphs for DeFi assets")]
struct Cli {
    /// Path to a YAML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// More logging (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch protocol data and write snapshots plus deployment aliases
    Build {
        /// Only these protocols (repeatable); default is every registered protocol
        #[arg(long = "protocol")]
        protocols: Vec<String>,
        /// Output directory
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Rebuild the search index from the snapshots on disk
    Index {
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Build every protocol, then rebuild the index
    All {
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Filter the search index
    Search {
        /// Free text over name, ids, protocol and chain
        query: Option<String>,
        #[arg(long)]
        protocol: Option<String>,
        #[arg(long)]
        chain: Option<String>,
        #[arg(long)]
        curator: Option<String>,
        /// Minimum APY in percent
        #[arg(long)]
        apy_min: Option<f64>,
        /// Maximum APY in percent
        #[arg(long)]
        apy_max: Option<f64>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Walk a snapshot the way the asset page does
    Explore {
        /// Root node id
        id: String,
        #[arg(long)]
        chain: Option<String>,
        #[arg(long)]
        protocol: Option<String>,
        /// Initial focus node
        #[arg(long)]
        focus: Option<String>,
        /// Click these nodes in order (repeatable)
        #[arg(long = "drill")]
        drills: Vec<String>,
        /// Treemap container width in px
        #[arg(long, default_value_t = 1280.0)]
        width: f64,
        /// Treemap container height in px
        #[arg(long, default_value_t = 720.0)]
        height: f64,
        /// Read from the HTTP API instead of the output directory
        /// (bare `--api` uses the configured base URL)
        #[arg(long, num_args = 0..=1)]
        api: Option<Option<String>>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .try_init();
}

fn runtime() -> Result<Runtime, i32> {
    Runtime::new().map_err(|e| {
        eprintln!("Error: failed to create tokio runtime: {}", e);
        1
    })
}

fn open_store(config: &ExposureConfig, out: Option<PathBuf>) -> Result<FileSnapshotStore, i32> {
    let dir = out.unwrap_or_else(|| config.output_dir.clone());
    FileSnapshotStore::open(&dir).map_err(|e| {
        eprintln!("Error: cannot open output directory '{}': {}", dir.display(), e);
        1
    })
}

fn cmd_build(config: &ExposureConfig, store: &FileSnapshotStore, protocols: &[String], sorted: bool) -> i32 {
    let registry = match AdapterRegistry::from_config(config) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let adapters = if !protocols.is_empty() {
        match registry.select(protocols) {
            Ok(selected) => selected,
            Err(unknown) => {
                eprintln!(
                    "Error: unknown protocol(s) {}; known: {}",
                    unknown.join(", "),
                    registry.ids().join(", ")
                );
                return 2;
            }
        }
    } else if sorted {
        registry.sorted()
    } else {
        registry.adapters().to_vec()
    };

    let rt = match runtime() {
        Ok(rt) => rt,
        Err(code) => return code,
    };
    let build = rt.block_on(build_draft_graphs_by_asset(&adapters, config.max_parallel_fetches));
    let report = build.report.clone();

    for id in &report.succeeded {
        println!("ok      {}", id);
    }
    for (id, error) in &report.failed {
        println!("failed  {}: {}", id, error);
    }
    for (id, asset) in &report.assets_skipped {
        println!("skipped {} asset {}", id, asset);
    }
    if report.is_empty() {
        eprintln!("Error: no assets built");
        return 1;
    }

    match persist_build(store, build) {
        Ok(persisted) => {
            println!(
                "Wrote {} snapshot(s) and {} alias(es) to {}",
                persisted.snapshots.len(),
                persisted.aliases.len(),
                store.path().display()
            );
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_index(store: &FileSnapshotStore) -> i32 {
    match rebuild_search_index(store) {
        Ok(count) => {
            println!("Indexed {} root(s) in {}", count, store.path().display());
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn load_index(store: &FileSnapshotStore) -> Result<Vec<SearchIndexEntry>, String> {
    match store.load_search_index() {
        Ok(Some(entries)) => Ok(entries),
        Ok(None) => build_from_store(store).map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    }
}

fn cmd_search(store: &FileSnapshotStore, query: SearchQuery) -> i32 {
    let entries = match load_index(store) {
        Ok(entries) => entries,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let hits = query.apply(&entries);
    if hits.is_empty() {
        println!("No matching assets.");
        return 0;
    }

    println!(
        "{:<28}  {:<10}  {:<10}  {:>8}  {:>9}  {}",
        "NAME", "PROTOCOL", "CHAIN", "APY", "TVL", "ID"
    );
    println!("{}", "-".repeat(100));
    for entry in &hits {
        println!(
            "{:<28}  {:<10}  {:<10}  {:>8}  {:>9}  {}",
            entry.display_name.as_deref().unwrap_or(&entry.name),
            entry.protocol,
            chain_label(Some(&entry.chain)),
            format_apy(entry.apy),
            entry.tvl_usd.map(format_usd_compact).unwrap_or_else(|| "-".into()),
            entry.node_id
        );
    }

    let facets = query.facets(&entries);
    println!();
    println!("{} of {} assets", hits.len(), entries.len());
    if !facets.curators.is_empty() {
        println!("curators: {}", facets.curators.join(", "));
    }
    0
}

struct ExploreArgs {
    request: SnapshotRequest,
    focus: Option<String>,
    drills: Vec<String>,
    area_px: f64,
}

fn print_view(
    session: &ExplorerSession,
    index: &[SearchIndexEntry],
    roots: Option<&RootIdSet>,
    area_px: f64,
    min_tile: f64,
) {
    let Some(view) = session.view() else {
        return;
    };
    let crumbs: Vec<String> = view.breadcrumbs(index).into_iter().map(|c| c.label).collect();
    println!("{}", view.page_title());
    println!("{}", crumbs.join(" > "));
    println!("TVL {}", format_usd_compact(view.tvl()));
    if let Some(focus) = view.focus_param() {
        println!("focus {}", focus);
    }
    if let Some(others) = view.others() {
        println!("Others ({})", others.len());
    }

    let tiles = view.tiles(area_px, min_tile, roots);
    if tiles.is_empty() {
        println!("No data channels");
        return;
    }
    for tile in tiles {
        let flag = if tile.is_others() {
            format!("[{} more]", tile.child_count())
        } else if tile.is_terminal() {
            "[terminal]".to_string()
        } else {
            String::new()
        };
        println!(
            "  {:<32}  {:>9}  {:>7}  {}",
            tile.name,
            format_usd_compact(tile.original_value),
            format_percent(tile.percent),
            flag
        );
    }
}

async fn explore(source: &dyn SnapshotSource, args: ExploreArgs, min_tile: f64) -> i32 {
    let mut session = ExplorerSession::new();
    let index = match source.fetch_search_index().await {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(error = %e, "search index unavailable, terminal detection disabled");
            Vec::new()
        }
    };
    let roots = (!index.is_empty()).then(|| RootIdSet::from_entries(&index));

    let id = args.request.id.clone();
    if let ViewState::NotFound = session.load(source, args.request, args.focus.as_deref()).await {
        eprintln!("Error: {} not found", id);
        return 1;
    }

    for node in &args.drills {
        if node.eq_ignore_ascii_case("back") {
            if let Some(view) = session.view_mut() {
                view.back_one_step();
            }
            continue;
        }
        match session.drill(source, node, None, Instant::now()).await {
            Some(Drilldown::Route(request)) => println!("-> {}", request.id),
            Some(Drilldown::Local(id)) => println!("   {}", id),
            Some(Drilldown::Terminal { .. }) => {
                if let Some(notice) = session.notices().current() {
                    println!("!  {}", notice.message);
                }
            }
            None => break,
        }
    }

    match session.state() {
        ViewState::Loaded(_) => {
            print_view(&session, &index, roots.as_ref(), args.area_px, min_tile);
            0
        }
        _ => {
            eprintln!("Error: snapshot not found");
            1
        }
    }
}

fn cmd_explore(config: &ExposureConfig, args: ExploreArgs, api: Option<Option<String>>, out: Option<PathBuf>) -> i32 {
    let rt = match runtime() {
        Ok(rt) => rt,
        Err(code) => return code,
    };
    let min_tile = config.explorer.min_tile_area_px;

    match api {
        Some(base) => {
            let base = base.unwrap_or_else(|| config.explorer.api_base_url.clone());
            match HttpSnapshotSource::new(base, &config.user_agent) {
                Ok(source) => rt.block_on(explore(&source, args, min_tile)),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    1
                }
            }
        }
        None => match open_store(config, out) {
            Ok(store) => rt.block_on(explore(&FileSnapshotSource::new(store), args, min_tile)),
            Err(code) => code,
        },
    }
}

fn load_config(path: Option<&Path>) -> Result<ExposureConfig, i32> {
    ExposureConfig::load(path).map_err(|e| {
        eprintln!("Error: {}", e);
        1
    })
}

fn run(cli: Cli) -> i32 {
    let config = match load_config(cli.config.as_deref()) {
        Ok(c) => c,
        Err(code) => return code,
    };

    match cli.command {
        Commands::Build { protocols, out } => match open_store(&config, out) {
            Ok(store) => cmd_build(&config, &store, &protocols, false),
            Err(code) => code,
        },
        Commands::Index { out } => match open_store(&config, out) {
            Ok(store) => cmd_index(&store),
            Err(code) => code,
        },
        Commands::All { out } => match open_store(&config, out) {
            Ok(store) => match cmd_build(&config, &store, &[], true) {
                0 => cmd_index(&store),
                code => code,
            },
            Err(code) => code,
        },
        Commands::Search {
            query,
            protocol,
            chain,
            curator,
            apy_min,
            apy_max,
            out,
        } => match open_store(&config, out) {
            Ok(store) => {
                let query = SearchQuery {
                    text: query,
                    protocol,
                    chain,
                    curator,
                    ..SearchQuery::default()
                }
                .with_apy_range(apy_min, apy_max);
                cmd_search(&store, query)
            }
            Err(code) => code,
        },
        Commands::Explore {
            id,
            chain,
            protocol,
            focus,
            drills,
            width,
            height,
            api,
            out,
        } => {
            let args = ExploreArgs {
                request: SnapshotRequest::new(id).with_chain(chain).with_protocol(protocol),
                focus,
                drills,
                area_px: (width.max(0.0) * height.max(0.0)).floor(),
            };
            cmd_explore(&config, args, api, out)
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    std::process::exit(run(cli));
}
