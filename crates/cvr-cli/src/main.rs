use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cvr_core::{Decision, Incident, IncidentId, Location, ReportSource, Status, WorkerId};
use cvr_detect::Detection;
use cvr_engine::{AutoReportBridge, Dispatcher, Engine, NewReport, ReporterContext, VerificationGate};

#[derive(Parser)]
#[command(name = "cvr", version, about = "Civic incident workflow engine")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Initialize the data root in the current directory (config, db)
    Init,

    /// Submit a citizen report with a problem photo
    Report {
        #[arg(long)]
        category: String,
        #[arg(long)]
        lat: f64,
        #[arg(long)]
        lng: f64,
        #[arg(long)]
        address: String,
        #[arg(long)]
        image: PathBuf,
        #[arg(long)]
        reporter: String,
    },

    /// Feed a camera frame plus vision-model detections to the auto-report bridge
    Ingest {
        #[arg(long)]
        image: PathBuf,
        /// Detection list as JSON, e.g. '[{"class":"pothole","confidence":0.9}]'
        #[arg(long)]
        detections: String,
        #[arg(long)]
        node: String,
        #[arg(long)]
        lat: f64,
        #[arg(long)]
        lng: f64,
        #[arg(long)]
        address: String,
    },

    /// List incidents, optionally filtered by status
    List {
        #[arg(long)]
        status: Option<String>,
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Assign a pending incident to a worker
    Assign {
        #[arg(long)]
        id: u64,
        #[arg(long)]
        worker: String,
    },

    /// List a worker's open tasks
    Tasks {
        #[arg(long)]
        worker: String,
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Mark an assigned incident completed with a resolution photo
    Complete {
        #[arg(long)]
        id: u64,
        #[arg(long)]
        worker: String,
        #[arg(long)]
        image: PathBuf,
    },

    /// Approve or reject a completed incident
    Verify {
        #[arg(long)]
        id: u64,
        /// "approve" or "reject"
        #[arg(long)]
        decision: String,
        #[arg(long)]
        note: Option<String>,
    },

    /// Show the dispatch pool and verification queue
    Status,

    /// Show incident counts by category and status
    Stats,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let data_root = std::env::current_dir()?;

    match cli.cmd {
        Command::Init => {
            let cfg_path = Engine::init_root(&data_root)?;
            println!("Initialized cvr at {}", cfg_path.display());
        }
        Command::Report {
            category,
            lat,
            lng,
            address,
            image,
            reporter,
        } => {
            let (engine, _cfg) = Engine::open(&data_root)?;
            let incident = engine.submit_report(NewReport {
                category,
                location: Location { lat, lng, address },
                image: read_image(&image)?,
                ext: image_ext(&image),
                source: ReportSource::Citizen { reporter },
            })?;
            println!(
                "Report saved as incident #{} ({})",
                incident.id, incident.original
            );
        }
        Command::Ingest {
            image,
            detections,
            node,
            lat,
            lng,
            address,
        } => {
            let (engine, cfg) = Engine::open(&data_root)?;
            let detections: Vec<Detection> =
                serde_json::from_str(&detections).context("parse detection list")?;
            let bridge = AutoReportBridge::with_min_confidence(&engine, cfg.bridge.min_confidence);
            let ctx = ReporterContext {
                node,
                location: Location { lat, lng, address },
            };
            match bridge.ingest(&read_image(&image)?, &image_ext(&image), &detections, &ctx)? {
                Some(incident) => println!(
                    "Anomaly detected: {} -> ticket #{}",
                    incident.category, incident.id
                ),
                None => println!("No anomaly detected"),
            }
        }
        Command::List { status, json } => {
            let (engine, _cfg) = Engine::open(&data_root)?;
            let status = status.as_deref().map(parse_status).transpose()?;
            let incidents = engine.list(status)?;
            print_incidents(&incidents, json)?;
        }
        Command::Assign { id, worker } => {
            let (engine, _cfg) = Engine::open(&data_root)?;
            let dispatcher = Dispatcher::new(&engine);
            let incident = dispatcher.dispatch(IncidentId(id), WorkerId::from_str(worker))?;
            println!(
                "Incident #{} assigned to {}",
                incident.id,
                incident.assignee().map(|w| w.as_str()).unwrap_or("-")
            );
        }
        Command::Tasks { worker, json } => {
            let (engine, _cfg) = Engine::open(&data_root)?;
            let tasks = engine.worker_tasks(&WorkerId::from_str(worker))?;
            print_incidents(&tasks, json)?;
        }
        Command::Complete { id, worker, image } => {
            let (engine, _cfg) = Engine::open(&data_root)?;
            let incident = engine.complete(
                IncidentId(id),
                WorkerId::from_str(worker),
                &read_image(&image)?,
                &image_ext(&image),
            )?;
            println!(
                "Incident #{} completed ({})",
                incident.id,
                incident.state.resolved().map(|r| r.as_str()).unwrap_or("-")
            );
        }
        Command::Verify { id, decision, note } => {
            let (engine, _cfg) = Engine::open(&data_root)?;
            let gate = VerificationGate::new(&engine);
            let decision = parse_decision(&decision)?;
            let incident = gate.review(IncidentId(id), decision, note)?;
            println!(
                "Incident #{} is now {}",
                incident.id,
                incident.status().as_str()
            );
        }
        Command::Status => {
            let (engine, _cfg) = Engine::open(&data_root)?;
            let dispatcher = Dispatcher::new(&engine);
            let gate = VerificationGate::new(&engine);
            let pool = dispatcher.unassigned_pool()?;
            println!("Unassigned pool: {}", pool.len());
            for incident in pool {
                println!("- {}", summarize(&incident));
            }
            let queue = gate.queue()?;
            println!("Awaiting verification: {}", queue.len());
            for incident in queue {
                println!("- {}", summarize(&incident));
            }
        }
        Command::Stats => {
            let (engine, _cfg) = Engine::open(&data_root)?;
            let stats = engine.stats()?;
            println!("Total incidents: {}", stats.total);
            for (status, count) in &stats.by_status {
                println!("  {status}: {count}");
            }
            for (category, count) in &stats.by_category {
                println!("  {category}: {count}");
            }
        }
    }

    Ok(())
}

fn read_image(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("read image {}", path.display()))
}

fn image_ext(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("jpg")
        .to_string()
}

fn parse_status(s: &str) -> Result<Status> {
    Status::parse(s).ok_or_else(|| anyhow!("unknown status '{s}' (pending|completed|verified)"))
}

fn parse_decision(s: &str) -> Result<Decision> {
    match s {
        "approve" => Ok(Decision::Approve),
        "reject" => Ok(Decision::Reject),
        _ => Err(anyhow!("unknown decision '{s}' (approve|reject)")),
    }
}

fn summarize(incident: &Incident) -> String {
    format!(
        "#{} [{}] {} @ {} (worker: {})",
        incident.id,
        incident.status().as_str(),
        incident.category,
        incident.location.address,
        incident.assignee().map(|w| w.as_str()).unwrap_or("-"),
    )
}

fn print_incidents(incidents: &[Incident], json: bool) -> Result<()> {
    if json {
        let views: Vec<_> = incidents.iter().map(Incident::view).collect();
        println!("{}", serde_json::to_string_pretty(&views)?);
    } else {
        println!("Incidents: {}", incidents.len());
        for incident in incidents {
            println!("- {}", summarize(incident));
        }
    }
    Ok(())
}
