use std::io::Read;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::Context;
use clap::{Arg, Command};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use abx_steward::config;
use abx_steward::knowledge::{InteractionFact, KnowledgeBase};
use abx_steward::models::ClinicalContext;
use abx_steward::validation::{AuditEntry, ValidationEngine, ValidationPolicy, ValidationReport};

/// One prescription to validate, read as JSON.
#[derive(Debug, Deserialize)]
struct Request {
    drugs: Vec<String>,
    #[serde(default)]
    context: ClinicalContext,
    /// Overrides applied in order after validation.
    #[serde(default)]
    overrides: Vec<OverrideRequest>,
}

#[derive(Debug, Deserialize)]
struct OverrideRequest {
    alert_id: Uuid,
    justification: Option<String>,
    actor: String,
}

#[derive(Debug, Serialize)]
struct Response {
    report: ValidationReport,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    audit: Vec<AuditEntry>,
}

fn main() {
    let matches = Command::new("abx-validate")
        .version(config::APP_VERSION)
        .about("Validate an antibiotic selection against a patient's clinical context")
        .arg(
            Arg::new("request")
                .value_name("FILE")
                .help("JSON request {drugs, context, overrides}; reads stdin when omitted"),
        )
        .arg(
            Arg::new("data-dir")
                .long("data-dir")
                .value_name("DIR")
                .help("Directory with drugs.json, interactions.json, rules.json and policy.json")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("interactions-only")
                .long("interactions-only")
                .help("Only list interactions among the requested drugs")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("compact")
                .long("compact")
                .help("Print single-line JSON")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    let data_dir = matches
        .get_one::<String>("data-dir")
        .map(PathBuf::from)
        .or_else(config::reference_data_dir);

    let outcome = run(
        matches.get_one::<String>("request").map(Path::new),
        data_dir.as_deref(),
        matches.get_flag("interactions-only"),
        matches.get_flag("compact"),
    );

    if let Err(e) = outcome {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn run(
    request_path: Option<&Path>,
    data_dir: Option<&Path>,
    interactions_only: bool,
    compact: bool,
) -> anyhow::Result<()> {
    let engine = build_engine(data_dir)?;
    let request = read_request(request_path)?;

    let json = if interactions_only {
        let facts: Vec<InteractionFact> = engine.check_interactions(&request.drugs)?;
        to_json(&facts, compact)?
    } else {
        let report = engine.validate(&request.drugs, &request.context)?;
        let mut session = engine.start_session(report);
        for o in &request.overrides {
            session
                .apply(&o.alert_id, o.justification.as_deref(), &o.actor, chrono::Utc::now())
                .with_context(|| format!("Override of alert {} by {}", o.alert_id, o.actor))?;
        }
        let (report, audit) = session.finish();
        to_json(&Response { report, audit }, compact)?
    };

    println!("{json}");
    Ok(())
}

fn build_engine(data_dir: Option<&Path>) -> anyhow::Result<ValidationEngine> {
    let Some(dir) = data_dir else {
        return Ok(ValidationEngine::builtin()?);
    };
    tracing::info!(dir = %dir.display(), "Loading reference data");
    let knowledge = KnowledgeBase::load(dir)
        .with_context(|| format!("Loading reference data from {}", dir.display()))?;
    let policy = ValidationPolicy::load(dir)
        .with_context(|| format!("Loading policy from {}", dir.display()))?;
    Ok(ValidationEngine::new(knowledge, policy))
}

fn read_request(path: Option<&Path>) -> anyhow::Result<Request> {
    let raw = match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Reading request {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Reading request from stdin")?;
            buf
        }
    };
    serde_json::from_str(&raw).context("Parsing request JSON")
}

fn to_json<T: Serialize>(value: &T, compact: bool) -> anyhow::Result<String> {
    let json = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    Ok(json)
}
