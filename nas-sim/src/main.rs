//! nas-sim: command-line driver for the ERAM/STARS flight data simulation.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use comfy_table::{Cell, Table};
use tracing_subscriber::EnvFilter;

use nas_core::abbreviated::parse_abbreviated_fp;
use nas_core::config::{self, Config};
use nas_core::registry::EramComputers;
use nas_core::NasDatabase;

mod scenario;

use scenario::Scenario;

#[derive(Parser)]
#[command(name = "nas", version, about = "ERAM/STARS flight data and handoff simulator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List centers and terminal facilities in the adaptation database
    Facilities {
        /// Adaptation database (JSON); defaults to the configured path
        #[arg(long, env = "NAS_DB")]
        db: Option<PathBuf>,
    },

    /// Parse an abbreviated flight plan entry as a terminal facility would
    Parse {
        /// TRACON whose adaptation applies
        #[arg(long)]
        facility: String,

        #[arg(long, env = "NAS_DB")]
        db: Option<PathBuf>,

        /// Entry tokens, aircraft id first
        #[arg(required = true)]
        tokens: Vec<String>,
    },

    /// Replay a scenario file and print transfer events and facility state
    Run {
        /// Scenario file (JSON)
        scenario: PathBuf,

        #[arg(long, env = "NAS_DB")]
        db: Option<PathBuf>,

        /// Override the scenario's tick count
        #[arg(long)]
        ticks: Option<u32>,
    },

    /// Allocate beacon codes from a facility's pool
    Squawk {
        /// Center (NAS codes) or TRACON (local bank)
        #[arg(long)]
        facility: String,

        #[arg(long, env = "NAS_DB")]
        db: Option<PathBuf>,

        #[arg(long, default_value = "1")]
        count: u32,
    },
}

fn main() {
    let cli = Cli::parse();
    let config = config::load_config();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Facilities { db } => cmd_facilities(&open_db(db, &config)),
        Commands::Parse {
            facility,
            db,
            tokens,
        } => cmd_parse(&open_db(db, &config), &facility, &tokens),
        Commands::Run {
            scenario,
            db,
            ticks,
        } => cmd_run(&open_db(db, &config), &config, &scenario, ticks),
        Commands::Squawk {
            facility,
            db,
            count,
        } => cmd_squawk(&open_db(db, &config), &config, &facility, count),
    }
}

fn open_db(db: Option<PathBuf>, config: &Config) -> NasDatabase {
    let path = db.unwrap_or_else(|| PathBuf::from(&config.database.path));
    NasDatabase::load(&path).unwrap_or_else(|e| {
        eprintln!("Error opening database {}: {e}", path.display());
        std::process::exit(1);
    })
}

fn cmd_facilities(db: &NasDatabase) {
    let mut table = Table::new();
    table.set_header(vec!["Facility", "Kind", "Center", "Coord fixes", "Long SP"]);

    for (artcc, adaptation) in &db.eram_adaptations {
        table.add_row(vec![
            Cell::new(artcc),
            Cell::new("ERAM"),
            Cell::new("-"),
            Cell::new(adaptation.coordination_fixes.len()),
            Cell::new("-"),
        ]);
        for tracon in db.tracons_for(artcc) {
            let stars = db.stars_adaptations.get(tracon);
            let long_sp = stars
                .map(|a| match a.allow_long_scratchpad {
                    [true, true] => "1,2",
                    [true, false] => "1",
                    [false, true] => "2",
                    [false, false] => "-",
                })
                .unwrap_or("-");
            table.add_row(vec![
                Cell::new(tracon),
                Cell::new("STARS"),
                Cell::new(artcc),
                Cell::new(stars.map_or(0, |a| a.coordination_fixes.len())),
                Cell::new(long_sp),
            ]);
        }
    }

    println!();
    println!(
        "{} centers, {} terminal facilities, {} fixes, {} aircraft types",
        db.eram_adaptations.len(),
        db.tracons.len(),
        db.fixes.len(),
        db.aircraft_performance.len()
    );
    println!();
    println!("{table}");
}

fn cmd_parse(db: &NasDatabase, facility: &str, tokens: &[String]) {
    if !db.tracons.contains_key(facility) {
        eprintln!("Error: {facility} is not a terminal facility");
        std::process::exit(1);
    }
    let adaptation = db.stars_adaptations.get(facility).cloned().unwrap_or_default();
    let fields: Vec<&str> = tokens.iter().map(String::as_str).collect();
    let fp = parse_abbreviated_fp(&adaptation, db, &fields);

    let or_dash = |s: &str| if s.is_empty() { "-".to_string() } else { s.to_string() };
    let mut table = Table::new();
    table.set_header(vec!["Field", "Value"]);
    table.add_row(vec![Cell::new("ACID"), Cell::new(or_dash(&fp.acid))]);
    table.add_row(vec![
        Cell::new("Beacon"),
        Cell::new(fp.bcn.map(|sq| sq.to_string()).unwrap_or("-".into())),
    ]);
    table.add_row(vec![Cell::new("Position"), Cell::new(or_dash(&fp.controlling_position))]);
    table.add_row(vec![
        Cell::new("Flight type"),
        Cell::new(fp.type_of_flight.map(|t| format!("{t:?}")).unwrap_or("-".into())),
    ]);
    table.add_row(vec![Cell::new("Airport"), Cell::new(or_dash(&fp.departure_airport))]);
    table.add_row(vec![Cell::new("Aircraft"), Cell::new(or_dash(&fp.aircraft_type))]);
    table.add_row(vec![Cell::new("Altitude"), Cell::new(or_dash(&fp.requested_alt))]);
    table.add_row(vec![
        Cell::new("Rules"),
        Cell::new(fp.rules.map(|r| r.to_string()).unwrap_or("-".into())),
    ]);
    table.add_row(vec![Cell::new("SP1"), Cell::new(or_dash(&fp.sc1))]);
    table.add_row(vec![Cell::new("SP2"), Cell::new(or_dash(&fp.sc2))]);

    println!();
    println!("{table}");
    if fp.errors.is_empty() {
        println!("OK");
    } else {
        for e in &fp.errors {
            println!("  {e}");
        }
        std::process::exit(2);
    }
}

fn cmd_run(db: &NasDatabase, config: &Config, path: &Path, ticks: Option<u32>) {
    let scenario = Scenario::load(path).unwrap_or_else(|e| {
        eprintln!("Error loading scenario {}: {e}", path.display());
        std::process::exit(1);
    });
    let mut registry = EramComputers::new(db, config.simulation.beacon_bank);
    let ticks = ticks.unwrap_or(scenario.ticks);

    let events = scenario
        .run(&mut registry, ticks, config.simulation.tick_seconds)
        .unwrap_or_else(|e| {
            eprintln!("Error running scenario: {e}");
            std::process::exit(1);
        });

    println!();
    println!(
        "Scenario: {} ({ticks} ticks from {})",
        path.display(),
        scenario.start.format("%Y-%m-%d %H:%M:%SZ")
    );
    println!("  Transfer events: {}", events.len());

    if !events.is_empty() {
        println!();
        let mut table = Table::new();
        table.set_header(vec!["Tick", "Time", "Event", "Callsign", "Controller"]);
        for ev in &events {
            let (kind, callsign, controller) = match &ev.event {
                nas_core::TransferEvent::TransferAccepted {
                    callsign,
                    to_controller,
                } => ("accepted", callsign, to_controller),
                nas_core::TransferEvent::TransferRejected {
                    callsign,
                    to_controller,
                } => ("rejected", callsign, to_controller),
            };
            table.add_row(vec![
                Cell::new(ev.tick),
                Cell::new(ev.time.format("%H%MZ")),
                Cell::new(kind),
                Cell::new(callsign),
                Cell::new(controller),
            ]);
        }
        println!("{table}");
    }

    println!();
    print_summary(&registry);
}

fn cmd_squawk(db: &NasDatabase, config: &Config, facility: &str, count: u32) {
    let mut registry = EramComputers::new(db, config.simulation.beacon_bank);
    for _ in 0..count {
        match registry.create_squawk(facility) {
            Ok(sq) => println!("{sq}"),
            Err(e) => {
                eprintln!("Error allocating code at {facility}: {e}");
                std::process::exit(1);
            }
        }
    }
}

fn print_summary(registry: &EramComputers) {
    let mut table = Table::new();
    table.set_header(vec!["Facility", "Kind", "Center", "Plans", "Tracks", "Queued", "Free codes"]);
    for row in registry.summary() {
        table.add_row(vec![
            Cell::new(&row.facility),
            Cell::new(row.kind),
            Cell::new(&row.center),
            Cell::new(row.plans),
            Cell::new(row.tracks),
            Cell::new(row.queued),
            Cell::new(row.codes_available),
        ]);
    }
    println!("{table}");
}
