use clap::{Parser, Subcommand};
use std::sync::Arc;
use tairis::config::Settings;
use tairis::discovery::{FacilityCache, FacilityFinder, NominatimProvider, PoiQuery};
use tairis::safety::emergency;
use tairis::server::{self, AppState};
use tairis::triage::{facility_actions, ReasoningError, TriageEngine, TriageOutcome, TriageRequest};
use tracing_subscriber::EnvFilter;

/// Tairis: find nearby medical facilities and triage symptoms safely.
///
/// Red-flag phrases ("chest pain", "not breathing", ...) are detected
/// locally and answered with an emergency-call response before any
/// remote reasoning happens.
///
/// Examples:
///   tairis facilities --lat 40.7128 --lon -74.0060
///   tairis facilities --address "Karolinska, Stockholm" --category pharmacy
///   tairis triage "my father has chest pain" --country US
///   tairis numbers --country IN
///   tairis serve --port 3000
#[derive(Parser)]
#[command(name = "tairis", version, about, long_about = None)]
struct Cli {
    /// Keep the result cache in memory instead of ~/.tairis/cache.json.
    #[arg(long, global = true)]
    no_disk_cache: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Discover medical facilities near a point, nearest first.
    Facilities {
        /// Latitude (-90 to 90).
        #[arg(long, allow_hyphen_values = true)]
        lat: Option<f64>,

        /// Longitude (-180 to 180).
        #[arg(long, allow_hyphen_values = true)]
        lon: Option<f64>,

        /// Free-text address, geocoded when --lat/--lon are absent.
        #[arg(long)]
        address: Option<String>,

        /// Search radius in meters.
        #[arg(long)]
        radius: Option<u32>,

        /// Facility category (medical, hospital, clinic, pharmacy, doctors, dentist).
        #[arg(long, default_value = "medical")]
        category: String,
    },

    /// Triage a symptom description.
    Triage {
        /// Free-text symptoms.
        text: String,

        /// ISO 3166-1 alpha-2 country code for emergency numbers.
        #[arg(long)]
        country: Option<String>,

        /// Vital signs, if known.
        #[arg(long)]
        vitals: Option<String>,

        /// Latitude used to attach nearby facilities as context.
        #[arg(long, allow_hyphen_values = true, requires = "lon")]
        lat: Option<f64>,

        /// Longitude used to attach nearby facilities as context.
        #[arg(long, allow_hyphen_values = true, requires = "lat")]
        lon: Option<f64>,
    },

    /// Show emergency numbers for a country.
    Numbers {
        #[arg(long)]
        country: Option<String>,
    },

    /// Run the HTTP API.
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        #[arg(long, default_value_t = 3000)]
        port: u16,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tairis=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut settings = Settings::load().unwrap_or_else(|e| fail(&e.to_string()));
    if cli.no_disk_cache {
        settings.cache_path = None;
    }

    match cli.command {
        Command::Facilities { lat, lon, address, radius, category } => {
            let origin = resolve_origin(&settings, lat, lon, address.as_deref());
            let query = PoiQuery::new(origin.0, origin.1)
                .with_radius(radius.unwrap_or(settings.default_radius_m))
                .with_category(category);

            let finder = FacilityFinder::from_settings(&settings, FacilityCache::from_settings(&settings));
            let found = finder.discover(&query).unwrap_or_else(|e| {
                fail(&format!("{}\n  Retry later, or pass --address to search elsewhere.", e))
            });

            let listing: Vec<serde_json::Value> = found
                .iter()
                .map(|f| serde_json::json!({ "facility": f, "actions": facility_actions(f) }))
                .collect();
            print_json(&listing);
        }

        Command::Triage { text, country, vitals, lat, lon } => {
            let engine = TriageEngine::from_settings(&settings);
            let finder = FacilityFinder::from_settings(&settings, FacilityCache::from_settings(&settings));

            let request = TriageRequest {
                message: text,
                history: Vec::new(),
                vitals,
                country,
                lat,
                lon,
            };

            // Red flags answer before any facility lookup happens.
            match engine.assess_near(&request, &finder, settings.default_radius_m) {
                Ok(outcome @ TriageOutcome::Immediate(_)) => print_json(&outcome),
                Ok(TriageOutcome::Advice { text }) => println!("{}", text),
                Err(ReasoningError::NotConfigured) => fail(
                    "No red flags detected. Set reasoning_url in ~/.tairis/config.toml for full triage.",
                ),
                Err(e) => fail(&e.to_string()),
            }
        }

        Command::Numbers { country } => {
            let numbers = emergency::resolve(country.as_deref());
            print_json(&serde_json::json!({ "country": country, "numbers": numbers }));
        }

        Command::Serve { host, port } => {
            let state = Arc::new(AppState::from_settings(&settings));
            let runtime = tokio::runtime::Runtime::new()
                .unwrap_or_else(|e| fail(&format!("Cannot start runtime: {}", e)));
            if let Err(e) = runtime.block_on(server::start(&host, port, state)) {
                fail(&format!("Server error on {}:{}: {}", host, port, e));
            }
        }
    }
}

fn resolve_origin(
    settings: &Settings,
    lat: Option<f64>,
    lon: Option<f64>,
    address: Option<&str>,
) -> (f64, f64) {
    // Priority: --lat/--lon > --address > error
    if let (Some(lat), Some(lon)) = (lat, lon) {
        return (lat, lon);
    }

    if let Some(address) = address {
        return match NominatimProvider::from_settings(settings).geocode(address) {
            Ok(Some(c)) => (c.lat, c.lon),
            Ok(None) => fail(&format!("Address not found: '{}'", address)),
            Err(e) => fail(&format!("Geocoding failed: {}", e)),
        };
    }

    eprintln!("Error: No location specified.");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  tairis facilities --lat 40.7128 --lon -74.0060");
    eprintln!("  tairis facilities --address \"221B Baker Street, London\"");
    std::process::exit(1);
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => fail(&format!("Cannot serialize output: {}", e)),
    }
}

fn fail(msg: &str) -> ! {
    eprintln!("Error: {}", msg);
    std::process::exit(1);
}
