//! churn - serve, deploy and invoke the churn predictor

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};

use churn::invoke::{build_record, Invoker, Target};
use churn_common::retry::RetryConfig;
use churn_common::sigv4::Credentials;
use churn_common::telemetry::{init_telemetry, LogFormat, TelemetryConfig};
use churn_common::{DEFAULT_ENDPOINT_NAME, DEFAULT_SERVING_PORT};
use churn_deploy::{DeployConfig, DeployIdentity, DeployPlan, DesiredState, Reconciler, SageMakerProvider};
use churn_serving::fallback::DEFAULT_FALLBACK_FEATURES;
use churn_serving::server::{DEFAULT_MAX_BODY_BYTES, DEFAULT_MODEL_PATH};
use churn_serving::{shutdown_signal, start_server, ServerConfig};

/// Churn predictor - inference gateway, endpoint reconciler and client
#[derive(Parser, Debug)]
#[command(name = "churn", version, about, long_about = None)]
struct Cli {
    /// Log output format (text or json)
    #[arg(long, global = true, env = "CHURN_LOG_FORMAT", default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the inference gateway (inside the serving container)
    ///
    /// Loads the model artifact in the background, answers `GET /ping` and
    /// `POST /invocations`, and stops on Ctrl+C or SIGTERM.
    Serve(ServeArgs),

    /// Converge the managed model, serving config and endpoint
    ///
    /// Replaces the model and serving config, then creates, updates or
    /// recreates the endpoint depending on its current status.
    Deploy(DeployArgs),

    /// Score one customer record
    Invoke(InvokeArgs),
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Address to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = DEFAULT_SERVING_PORT)]
    port: u16,

    /// Path to the model artifact
    #[arg(long, env = "MODEL_PATH", default_value = DEFAULT_MODEL_PATH)]
    model_path: PathBuf,

    /// Feature count of the placeholder model used when the artifact
    /// cannot be loaded
    #[arg(long, env = "CHURN_FALLBACK_FEATURES", default_value_t = DEFAULT_FALLBACK_FEATURES)]
    fallback_features: usize,

    /// Maximum request body size in bytes
    #[arg(long, env = "CHURN_MAX_BODY_BYTES", default_value_t = DEFAULT_MAX_BODY_BYTES)]
    max_body_bytes: usize,
}

#[derive(Args, Debug)]
struct DeployArgs {
    /// Desired-state YAML file; defaults apply to anything it omits
    #[arg(short = 'f', long = "config", env = "CHURN_DEPLOY_CONFIG")]
    config_file: Option<PathBuf>,

    /// Validate configuration and print the plan without calling the provider
    #[arg(long)]
    dry_run: bool,

    /// Cloud account id
    #[arg(long, env = "AWS_ACCOUNT_ID")]
    account_id: Option<String>,

    /// Region the resources live in
    #[arg(long, env = "AWS_REGION")]
    region: Option<String>,

    /// Execution role the serving container runs as
    #[arg(long, env = "ROLE_ARN")]
    role_arn: Option<String>,

    /// Override the provider API endpoint (VPC endpoint or local stub)
    #[arg(long, env = "CHURN_SAGEMAKER_ENDPOINT")]
    provider_endpoint: Option<String>,
}

#[derive(Args, Debug)]
struct InvokeArgs {
    /// Gateway invocation URL, e.g. http://localhost:8080/invocations
    #[arg(long, env = "CHURN_GATEWAY_URL", conflicts_with = "endpoint_name")]
    url: Option<String>,

    /// Managed endpoint to invoke when no URL is given
    #[arg(long, env = "CHURN_ENDPOINT_NAME", default_value = DEFAULT_ENDPOINT_NAME)]
    endpoint_name: String,

    /// Region of the managed endpoint
    #[arg(long, env = "AWS_REGION", default_value = "us-east-1")]
    region: String,

    /// JSON file with record fields layered over the defaults
    #[arg(short = 'i', long)]
    input: Option<PathBuf>,

    /// Override one field (repeatable)
    #[arg(long = "set", value_name = "KEY=VALUE")]
    overrides: Vec<String>,

    /// Attempts for transient failures (1 disables retries)
    #[arg(long, default_value_t = 3)]
    max_attempts: u32,
}

impl Commands {
    fn service_name(&self) -> &'static str {
        match self {
            Commands::Serve(_) => "churn-serve",
            Commands::Deploy(_) => "churn-deploy",
            Commands::Invoke(_) => "churn-invoke",
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_telemetry(TelemetryConfig {
        service_name: cli.command.service_name().to_string(),
        format: cli.log_format,
    })?;

    match cli.command {
        Commands::Serve(args) => run_serve(args).await,
        Commands::Deploy(args) => run_deploy(args).await,
        Commands::Invoke(args) => run_invoke(args).await,
    }
}

/// Run the gateway until a shutdown signal arrives
async fn run_serve(args: ServeArgs) -> anyhow::Result<()> {
    let config = ServerConfig {
        addr: SocketAddr::new(args.host, args.port),
        model_path: args.model_path,
        fallback_features: args.fallback_features,
        max_body_bytes: args.max_body_bytes,
    };
    start_server(config, shutdown_signal()).await?;
    Ok(())
}

/// Run one reconcile pass
async fn run_deploy(args: DeployArgs) -> anyhow::Result<()> {
    let desired = match &args.config_file {
        Some(path) => DesiredState::from_file(path)?,
        None => DesiredState::default(),
    };
    let identity = DeployIdentity {
        account_id: args.account_id,
        region: args.region,
        role_arn: args.role_arn,
    };
    let config = DeployConfig::new(identity, desired);

    // Fails before any credential lookup or provider call
    let plan = config.resolve()?;

    if args.dry_run {
        print_plan(&plan);
        return Ok(());
    }

    let credentials = Credentials::resolve().await?;
    let provider = match &args.provider_endpoint {
        Some(endpoint) => SageMakerProvider::with_endpoint(&plan.region, credentials, endpoint)?,
        None => SageMakerProvider::new(&plan.region, credentials)?,
    };

    let reconciler = Reconciler::new(Arc::new(provider), config);
    let report = reconciler.reconcile().await?;
    println!("{}", report);
    Ok(())
}

fn print_plan(plan: &DeployPlan) {
    println!("=== Deployment plan (dry run) ===");
    println!("Region: {}", plan.region);
    println!("Model: {:?}", plan.model);
    println!("Serving config: {:?}", plan.serving_config);
    println!("Endpoint: {:?}", plan.endpoint);
    println!(
        "Failed-endpoint deletion wait: {:?} (poll every {:?})",
        plan.deletion_timeout, plan.poll_interval
    );
}

/// Score one record and print the probability with its risk label
async fn run_invoke(args: InvokeArgs) -> anyhow::Result<()> {
    let record = build_record(args.input.as_deref(), &args.overrides)?;

    let target = match &args.url {
        Some(url) => Target::direct(url)?,
        None => Target::runtime(&args.region, &args.endpoint_name, Credentials::resolve().await?)?,
    };

    let invoker = Invoker::new(target, RetryConfig::with_max_attempts(args.max_attempts))?;
    let prediction = invoker.invoke(record).await?;
    println!("{}", prediction);
    Ok(())
}
