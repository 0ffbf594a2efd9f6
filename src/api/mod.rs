use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::{Map, Value};
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::info;

use crate::core::{DepositPolicy, DerivedOutputs, Engine, EngineConfig, PrimaryInputs};
use crate::state::{
    FileStore, LoadSource, MemoryStore, QueryParams, StateCodec, numeric_value, parse_number,
    record_from_map,
};

const DEFAULT_DEPOSIT_PERCENTAGE: f64 = 20.0;

#[derive(Debug, Error, PartialEq)]
pub enum OptionsError {
    #[error("deposit percentage must be between 0 and 100, got {0}")]
    DepositPercentage(f64),
    #[error("unknown deposit policy '{0}'")]
    UnknownPolicy(String),
    #[error("{key} must be a number, got '{value}'")]
    NotANumber { key: &'static str, value: String },
    #[error("surcharge must be true/false or 1/0, got '{0}'")]
    Surcharge(String),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliDepositPolicy {
    #[value(aliases = ["funds", "fundsDriven", "funds_driven"])]
    FundsDriven,
    #[value(aliases = ["fixed", "fixedPercentage", "fixed_percentage"])]
    FixedPercentage,
}

#[derive(Parser, Debug)]
#[command(
    name = "lbtt",
    about = "Scottish property move calculator (LBTT, deposit, mortgage and cash flow)"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Decode inputs and print the derived figures as JSON
    Calculate(CalculateArgs),
    /// Print the minimal query string for a JSON input record
    Encode(EncodeArgs),
    /// Strip all input keys from a query string
    Reset(ResetArgs),
    /// Serve the calculation API over HTTP
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
}

#[derive(Args, Debug, Clone)]
pub struct EngineArgs {
    #[arg(long, value_enum, default_value_t = CliDepositPolicy::FundsDriven)]
    deposit_policy: CliDepositPolicy,
    #[arg(
        long,
        default_value_t = DEFAULT_DEPOSIT_PERCENTAGE,
        help = "Deposit as percent of home report value, used when --deposit-policy=fixed-percentage"
    )]
    deposit_percentage: f64,
    #[arg(long, help = "Apply the Additional Dwelling Supplement (buying before selling)")]
    surcharge: bool,
}

#[derive(Args, Debug)]
pub struct CalculateArgs {
    #[command(flatten)]
    engine: EngineArgs,
    #[arg(long, default_value = "", help = "Query string with short input keys, e.g. 'bid=270000&ir=4.1'")]
    query: String,
    #[arg(long, help = "JSON key-value file holding a legacy persisted blob")]
    state_file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    #[arg(long, help = "JSON object of input fields; missing fields take defaults")]
    json: String,
}

#[derive(Args, Debug)]
pub struct ResetArgs {
    #[arg(long, default_value = "")]
    query: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CalculateResponse {
    deposit_policy: DepositPolicy,
    surcharge_applicable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<&'static str>,
    query: String,
    inputs: PrimaryInputs,
    outputs: DerivedOutputs,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn build_engine_config(
    policy: CliDepositPolicy,
    deposit_percentage: f64,
    surcharge: bool,
) -> Result<EngineConfig, OptionsError> {
    let deposit_policy = match policy {
        CliDepositPolicy::FundsDriven => DepositPolicy::FundsDriven,
        CliDepositPolicy::FixedPercentage => {
            if !(0.0..=100.0).contains(&deposit_percentage) {
                return Err(OptionsError::DepositPercentage(deposit_percentage));
            }
            DepositPolicy::FixedPercentage(deposit_percentage)
        }
    };
    Ok(EngineConfig {
        deposit_policy,
        surcharge_applicable: surcharge,
        ..EngineConfig::default()
    })
}

fn engine_config_from_args(args: &EngineArgs) -> Result<EngineConfig, OptionsError> {
    build_engine_config(args.deposit_policy, args.deposit_percentage, args.surcharge)
}

fn parse_policy(raw: &str) -> Result<CliDepositPolicy, OptionsError> {
    <CliDepositPolicy as ValueEnum>::from_str(raw.trim(), true)
        .map_err(|_| OptionsError::UnknownPolicy(raw.to_string()))
}

fn parse_deposit_percentage(raw: &str) -> Result<f64, OptionsError> {
    parse_number(raw).ok_or_else(|| OptionsError::NotANumber {
        key: "depositPct",
        value: raw.to_string(),
    })
}

fn parse_surcharge(raw: &str) -> Result<bool, OptionsError> {
    match raw.trim() {
        "1" | "true" => Ok(true),
        "0" | "false" => Ok(false),
        other => Err(OptionsError::Surcharge(other.to_string())),
    }
}

fn engine_config_from_query(query: &QueryParams) -> Result<EngineConfig, OptionsError> {
    let policy = match query.get("policy") {
        Some(raw) => parse_policy(raw)?,
        None => CliDepositPolicy::FundsDriven,
    };
    let deposit_percentage = match query.get("depositPct") {
        Some(raw) => parse_deposit_percentage(raw)?,
        None => DEFAULT_DEPOSIT_PERCENTAGE,
    };
    let surcharge = match query.get("surcharge") {
        Some(raw) => parse_surcharge(raw)?,
        None => false,
    };
    build_engine_config(policy, deposit_percentage, surcharge)
}

/// Same options as the query form; JSON numbers and booleans are accepted
/// alongside their string spellings. `null` means absent.
fn engine_config_from_map(map: &Map<String, Value>) -> Result<EngineConfig, OptionsError> {
    let policy = match map.get("policy") {
        None | Some(Value::Null) => CliDepositPolicy::FundsDriven,
        Some(Value::String(raw)) => parse_policy(raw)?,
        Some(other) => return Err(OptionsError::UnknownPolicy(other.to_string())),
    };
    let deposit_percentage = match map.get("depositPct") {
        None | Some(Value::Null) => DEFAULT_DEPOSIT_PERCENTAGE,
        Some(value) => numeric_value(value).ok_or_else(|| OptionsError::NotANumber {
            key: "depositPct",
            value: value.to_string(),
        })?,
    };
    let surcharge = match map.get("surcharge") {
        None | Some(Value::Null) => false,
        Some(Value::Bool(flag)) => *flag,
        Some(Value::String(raw)) => parse_surcharge(raw)?,
        Some(Value::Number(n)) => parse_surcharge(&n.to_string())?,
        Some(other) => return Err(OptionsError::Surcharge(other.to_string())),
    };
    build_engine_config(policy, deposit_percentage, surcharge)
}

/// Splits a POSTed body into engine options and inputs. Input fields that
/// are missing or malformed take their defaults; only options can fail.
fn request_from_map(
    map: &Map<String, Value>,
) -> Result<(EngineConfig, PrimaryInputs), OptionsError> {
    let config = engine_config_from_map(map)?;
    let inputs = record_from_map(map, &PrimaryInputs::default());
    Ok((config, inputs))
}

fn source_label(source: LoadSource) -> &'static str {
    match source {
        LoadSource::Query => "query",
        LoadSource::MigratedBlob(_) => "migrated-blob",
        LoadSource::Defaults => "defaults",
    }
}

fn build_calculate_response(
    engine: &Engine,
    codec: &StateCodec,
    inputs: PrimaryInputs,
    source: Option<LoadSource>,
) -> CalculateResponse {
    CalculateResponse {
        deposit_policy: engine.config().deposit_policy,
        surcharge_applicable: engine.config().surcharge_applicable,
        source: source.map(source_label),
        query: codec.encode(&inputs).to_string(),
        inputs,
        outputs: engine.reconcile(&inputs),
    }
}

/// Runs one subcommand. Everything but `serve` writes JSON or a query
/// string to stdout and returns.
pub async fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Calculate(args) => println!("{}", calculate_command(&args)?),
        Command::Encode(args) => println!("{}", encode_command(&args)?),
        Command::Reset(args) => println!("{}", reset_command(&args)),
        Command::Serve { port } => run_http_server(port).await?,
    }
    Ok(())
}

fn calculate_command(args: &CalculateArgs) -> anyhow::Result<String> {
    let codec = StateCodec::default();
    let engine = Engine::new(engine_config_from_args(&args.engine)?);
    let mut query = QueryParams::parse(&args.query);
    let outcome = match &args.state_file {
        Some(path) => codec.load(&mut query, &mut FileStore::new(path)),
        None => codec.load(&mut query, &mut MemoryStore::new()),
    };
    let response = build_calculate_response(&engine, &codec, outcome.inputs, Some(outcome.source));
    Ok(serde_json::to_string_pretty(&response)?)
}

fn encode_command(args: &EncodeArgs) -> anyhow::Result<String> {
    let record = match serde_json::from_str::<Value>(&args.json)? {
        Value::Object(record) => record,
        other => anyhow::bail!("expected a JSON object of input fields, got {other}"),
    };
    let codec = StateCodec::default();
    let inputs = record_from_map(&record, codec.defaults());
    Ok(codec.encode(&inputs).to_string())
}

fn reset_command(args: &ResetArgs) -> String {
    let mut query = QueryParams::parse(&args.query);
    StateCodec::default().reset(&mut query);
    query.to_string()
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "calculator API listening");

    axum::serve(listener, router()).await
}

fn router() -> Router {
    Router::new()
        .route(
            "/api/calculate",
            get(calculate_get_handler).post(calculate_post_handler),
        )
        .route("/api/defaults", get(defaults_handler))
        .fallback(not_found_handler)
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn defaults_handler() -> Response {
    json_response(StatusCode::OK, PrimaryInputs::default())
}

async fn calculate_get_handler(Query(pairs): Query<Vec<(String, String)>>) -> Response {
    let query = QueryParams::from_pairs(pairs);
    let config = match engine_config_from_query(&query) {
        Ok(config) => config,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    };
    let codec = StateCodec::default();
    let inputs = codec.decode_query(&query);
    let response = build_calculate_response(&Engine::new(config), &codec, inputs, None);
    json_response(StatusCode::OK, response)
}

async fn calculate_post_handler(Json(body): Json<Map<String, Value>>) -> Response {
    let (config, inputs) = match request_from_map(&body) {
        Ok(request) => request,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    };
    let codec = StateCodec::default();
    let response = build_calculate_response(&Engine::new(config), &codec, inputs, None);
    json_response(StatusCode::OK, response)
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}
