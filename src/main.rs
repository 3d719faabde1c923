use clap::{Parser, Subcommand};
use edurisk::api::{
    handle_feature_importance, handle_health, handle_predict, handle_predict_risk, handle_whatif, ErrorResponse,
    PredictRequest, PredictRiskRequest, WhatIfRequest,
};
use edurisk::errors::{Result, RiskError};
use edurisk::{ModelManager, ServiceConfig};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;

/// Student risk inference, from the command line.
#[derive(Parser, Debug)]
#[command(name = "edurisk")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Dataset root, overrides DATA_ROOT
    #[arg(long, global = true)]
    data_root: Option<PathBuf>,

    /// Artifact directory, overrides ARTIFACT_DIR
    #[arg(long, global = true)]
    artifact_dir: Option<PathBuf>,

    /// Training dataset name, overrides TRAIN_DATASET
    #[arg(long, global = true)]
    train_dataset: Option<String>,

    /// Seed, overrides RANDOM_STATE
    #[arg(long, global = true)]
    random_state: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load or train the model and report its status
    Health,

    /// Score a student, body as `{"features": {...}}`
    Predict {
        #[arg(long)]
        request: String,
    },

    /// Simulate overrides, body as `{"baselineFeatures": {...}, "overrides": {...}}`
    Whatif {
        #[arg(long)]
        request: String,
    },

    /// Global feature importance of the selected model
    FeatureImportance,

    /// Course level fail probability, body as `{"features": {...}}`
    PredictRisk {
        #[arg(long)]
        request: String,
    },

    /// Validation metrics of every candidate
    Metrics,
}

fn parse_request<T: DeserializeOwned>(body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| RiskError::InvalidRequest(e.to_string()))
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| RiskError::UnableToWrite(e.to_string()))
}

fn run(cli: Cli) -> Result<String> {
    let mut config = ServiceConfig::from_env();
    if let Some(v) = cli.data_root {
        config = config.set_data_root(v);
    }
    if let Some(v) = cli.artifact_dir {
        config = config.set_artifact_dir(v);
    }
    if let Some(v) = cli.train_dataset {
        config = config.set_train_dataset(v);
    }
    if let Some(v) = cli.random_state {
        config = config.set_random_state(v);
    }
    let manager = ModelManager::new(config);

    match cli.command {
        Command::Health => to_json(&handle_health(&manager)?),
        Command::Predict { request } => {
            let request: PredictRequest = parse_request(&request)?;
            to_json(&handle_predict(&manager, &request)?)
        }
        Command::Whatif { request } => {
            let request: WhatIfRequest = parse_request(&request)?;
            to_json(&handle_whatif(&manager, &request)?)
        }
        Command::FeatureImportance => to_json(&handle_feature_importance(&manager)?),
        Command::PredictRisk { request } => {
            let request: PredictRiskRequest = parse_request(&request)?;
            to_json(&handle_predict_risk(&manager, &request)?)
        }
        Command::Metrics => to_json(&manager.metrics()?),
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Cli::parse()) {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            let body = ErrorResponse::from(&e);
            match serde_json::to_string_pretty(&body) {
                Ok(s) => eprintln!("{}", s),
                Err(_) => eprintln!("{}", e),
            }
            if e.is_client_error() {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}
