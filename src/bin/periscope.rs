use std::process::exit;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use itertools::Itertools;
use periscope::lens::graph::RouteGraphBuilder;
use periscope::lens::reachability::{ReachabilityLens, ResolverAlgorithm};
use periscope::*;
use tabled::settings::Style;
use tabled::{Table, Tabled};
use tracing::Level;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    /// configuration file path, by default $HOME/.periscope/periscope.toml is used
    #[clap(short, long)]
    config: Option<String>,

    /// Topology store path, overriding the configuration
    #[clap(short, long)]
    db: Option<String>,

    /// Print debug information
    #[clap(long)]
    debug: bool,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest MRT route dumps (and optionally a registry) into the store
    Ingest {
        /// MRT dump files or URLs to ingest
        #[clap(required = true)]
        files: Vec<String>,

        /// Registry checkout for ROA objects and AS names
        #[clap(short, long)]
        registry: Option<String>,
    },
    /// Resolve how a set of source ASes reaches a prefix
    Resolve {
        /// Target prefix or address
        target: String,

        /// Source ASN to resolve from (repeatable)
        #[clap(short, long = "asn", required = true)]
        asns: Vec<u32>,

        /// Algorithm for guessing paths without collector history
        #[clap(long, value_enum, default_value = "collector")]
        algo: ResolverAlgorithm,

        /// Write a DOT graph description to this file
        #[clap(long)]
        dot: Option<String>,

        /// Base URL for hyperlink attributes in the graph
        #[clap(long)]
        link_base: Option<String>,

        /// Output the result as JSON
        #[clap(long)]
        json: bool,
    },
    /// Route Origin Authorization queries
    #[clap(subcommand)]
    Roa(RoaCommands),
    /// List the most-connected ASes as query suggestions
    Asns {
        /// Number of ASes to list
        #[clap(short, long, default_value = "10")]
        limit: u32,
    },
    /// Show the prefixes and peers of an AS
    Whois {
        /// AS number to look up
        asn: u32,
    },
}

#[derive(Subcommand)]
enum RoaCommands {
    /// Check whether an announcement is authorized
    Check {
        /// Announced prefix
        prefix: String,
        /// Origin ASN
        asn: u32,
    },
    /// List entries that would authorize some origin for a prefix
    Origins {
        /// Announced prefix
        prefix: String,
    },
}

#[derive(Tabled)]
struct RoaOriginRow {
    asn: u32,
    roa_cidr: String,
    max_length: u8,
}

#[derive(Tabled)]
struct PeerRow {
    peer_asn: u32,
    name: String,
    receives_transit: &'static str,
    sends_transit: &'static str,
}

fn main() {
    let cli = Cli::parse();

    let config = match PeriscopeConfig::new(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            exit(1);
        }
    };
    let db_path = cli.db.unwrap_or_else(|| config.db_path.clone());

    tracing_subscriber::fmt()
        .with_max_level(if cli.debug { Level::DEBUG } else { Level::INFO })
        .init();

    let result = match cli.command {
        Commands::Ingest { files, registry } => run_ingest(&config, &db_path, files, registry),
        Commands::Resolve {
            target,
            asns,
            algo,
            dot,
            link_base,
            json,
        } => run_resolve(&config, &db_path, &target, &asns, algo, dot, link_base, json),
        Commands::Roa(command) => run_roa(&db_path, command),
        Commands::Asns { limit } => run_asns(&db_path, limit),
        Commands::Whois { asn } => run_whois(&db_path, asn),
    };

    if let Err(e) = result {
        eprintln!("{e}");
        exit(1);
    }
}

fn run_ingest(
    config: &PeriscopeConfig,
    db_path: &str,
    files: Vec<String>,
    registry: Option<String>,
) -> Result<()> {
    let db = PeriscopeDatabase::open(db_path)?;
    let registry = registry
        .or_else(|| config.registry_root.clone())
        .map(Registry::new);

    // open every dump up front: an unreadable input aborts before any write
    let mut sources = Vec::with_capacity(files.len());
    for file in &files {
        sources.push(MrtSource::open(file)?);
    }

    let announcements = sources.into_iter().flat_map(MrtSource::announcements);
    let stats = Ingestor::new(&db).run(announcements, registry.as_ref())?;

    println!(
        "ingested {} announcements into {}: {} ASNs, {} prefixes, {} paths, {} ROA entries",
        stats.announcements, db_path, stats.asns, stats.prefixes, stats.paths, stats.roa_entries
    );
    if stats.skipped_paths > 0 {
        println!("skipped {} paths (digest collisions)", stats.skipped_paths);
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_resolve(
    config: &PeriscopeConfig,
    db_path: &str,
    target: &str,
    asns: &[u32],
    algo: ResolverAlgorithm,
    dot: Option<String>,
    link_base: Option<String>,
    json: bool,
) -> Result<()> {
    let db = PeriscopeDatabase::open_read_only(db_path)?;
    let lens = ReachabilityLens::with_config(&db, config.resolver_config());

    let result = lens.resolve(target, asns, algo)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("prefix: {}", result.prefix);
        for path in &result.paths {
            println!("path: {}", format_path(path));
        }
        for path in &result.guessed_paths {
            println!("guessed: {}", format_path(path));
        }
        if result.is_empty() {
            println!("no path found");
        }
    }

    if let Some(dot_path) = dot {
        let origins = db.roa().valid_origins(&result.prefix)?;
        let mut builder = RouteGraphBuilder::new();
        if let Some(base) = link_base {
            builder = builder.with_link_base(base);
        }
        let graph = builder.build(asns, &result, Some(&origins));
        std::fs::write(&dot_path, graph.to_dot())
            .map_err(|e| anyhow!("Failed to write {}: {}", dot_path, e))?;
        println!("wrote graph description to {}", dot_path);
    }

    Ok(())
}

fn run_roa(db_path: &str, command: RoaCommands) -> Result<()> {
    let db = PeriscopeDatabase::open_read_only(db_path)?;

    match command {
        RoaCommands::Check { prefix, asn } => {
            let prefix = prefix
                .parse()
                .map_err(|e| anyhow!("invalid prefix '{}': {}", prefix, e))?;
            let authorized = db.roa().is_authorized(&prefix, asn)?;
            println!("{}", if authorized { "valid" } else { "invalid" });
        }
        RoaCommands::Origins { prefix } => {
            let prefix = prefix
                .parse()
                .map_err(|e| anyhow!("invalid prefix '{}': {}", prefix, e))?;
            let origins = db.roa().valid_origins(&prefix)?;

            let rows: Vec<RoaOriginRow> = origins
                .iter()
                .flat_map(|(asn, matches)| {
                    matches.iter().map(|m| RoaOriginRow {
                        asn: *asn,
                        roa_cidr: m.roa_cidr.clone(),
                        max_length: m.max_length,
                    })
                })
                .collect();
            println!("{}", Table::new(rows).with(Style::rounded()));
        }
    }

    Ok(())
}

fn run_asns(db_path: &str, limit: u32) -> Result<()> {
    let db = PeriscopeDatabase::open_read_only(db_path)?;
    let suggested = db.topology().suggested_asns(limit)?;
    println!("{}", Table::new(suggested).with(Style::rounded()));
    Ok(())
}

fn run_whois(db_path: &str, asn: u32) -> Result<()> {
    let db = PeriscopeDatabase::open_read_only(db_path)?;
    let topology = db.topology();

    let name = topology.asn_name(asn)?.unwrap_or_default();
    println!("AS{} {}", asn, name);

    println!("\nprefixes:");
    for prefix in topology.originated_prefixes(asn)? {
        println!("  {}", prefix);
    }

    let local_is_feed = topology.is_direct_feed(asn)?;
    let rows: Vec<PeerRow> = topology
        .peers_of(asn)?
        .into_iter()
        .map(|peer| PeerRow {
            peer_asn: peer.peer_asn,
            name: peer.name.unwrap_or_default(),
            // absence of transit evidence is conclusive only when the
            // learning side feeds the collector directly
            receives_transit: tri_state(peer.receives_transit, local_is_feed),
            sends_transit: tri_state(peer.sends_transit, peer.peer_direct_feed),
        })
        .collect();
    println!("\npeers:\n{}", Table::new(rows).with(Style::rounded()));

    Ok(())
}

fn tri_state(observed: bool, conclusive: bool) -> &'static str {
    if observed {
        "yes"
    } else if conclusive {
        "no"
    } else {
        "unknown"
    }
}

fn format_path(path: &[u32]) -> String {
    path.iter().map(|asn| format!("AS{}", asn)).join(" -> ")
}
