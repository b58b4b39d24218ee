use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use mzcld::argo::{self, AppQuery, ArgoClient, ArgoConfig, ArgoSession, SyncRequest};
use mzcld::duration::parse_duration;
use mzcld::iap::{self, OutputFormat, TokenClaims};
use mzcld::maintenance::{
    MaintenanceConfig, MaintenanceController, MaintenanceMode, DEFAULT_NAMESPACE,
};
use mzcld::selector::LabelSelector;
use mzcld::snapshot::default_state_path;
use mzcld::store::KubeApplicationStore;
use tracing::{debug, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "mzcld", author, version, about = "MozCloud CLI utilities", long_about = None)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log line format on stderr
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// ArgoCD utilities
    #[command(subcommand)]
    Argo(ArgoCommand),
    /// Generate an IAP token for ArgoCD
    Iap(IapArgs),
}

#[derive(Subcommand, Debug)]
enum ArgoCommand {
    /// Inspect and manage Argo CD Applications sync state
    ///
    /// Without flags, writes a snapshot of every Application's sync policy
    /// and prints a status table; nothing in the cluster changes. If active
    /// sync operations are found, waits up to --timeout for them first.
    Maintenance(MaintenanceArgs),
    /// Manage ArgoCD applications
    #[command(subcommand)]
    App(AppCommand),
    /// Login to ArgoCD with IAP and SSO
    Login(LoginArgs),
    /// Run the ArgoCD CLI with IAP authentication
    Cli(CliArgs),
}

#[derive(Args, Debug)]
struct MaintenanceArgs {
    /// Namespace containing Argo CD Applications
    #[arg(short, long, env = "MZCLD_NAMESPACE", default_value = DEFAULT_NAMESPACE)]
    namespace: String,

    /// Path to snapshot file [default: ~/.local/state/mzcld/argo-maintenance/<namespace>-snapshot.json]
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// Label selector to filter Applications
    #[arg(long)]
    selector: Option<String>,

    /// Overwrite existing snapshot file
    #[arg(long)]
    force: bool,

    /// Disable AutoSync for matching Applications (save snapshot first)
    #[arg(long)]
    disable_sync: bool,

    /// Restore AutoSync state from snapshot
    #[arg(long)]
    restore_sync: bool,

    /// Maximum time to wait for active syncs to complete before giving up
    #[arg(long, default_value = "2m", value_parser = parse_duration)]
    timeout: Duration,
}

#[derive(Subcommand, Debug)]
enum AppCommand {
    /// List applications
    List(AppListArgs),
    /// Sync an application
    Sync(AppSyncArgs),
    /// Rollback an application
    Rollback(AppRollbackArgs),
}

#[derive(Args, Debug)]
struct HostArg {
    /// ArgoCD hostname (uses current context if not specified)
    #[arg(long, env = "ARGOCD_HOST")]
    host: Option<String>,
}

#[derive(Args, Debug)]
struct AppListArgs {
    #[command(flatten)]
    host: HostArg,

    /// Filter by namespace (queries all namespaces if not specified)
    #[arg(short, long)]
    namespace: Option<String>,

    /// Label selector to filter applications
    #[arg(long)]
    selector: Option<String>,
}

#[derive(Args, Debug)]
struct AppSyncArgs {
    #[command(flatten)]
    host: HostArg,

    /// Application name
    #[arg(long)]
    name: String,

    /// Allow deleting unexpected resources
    #[arg(long)]
    prune: bool,

    /// Preview sync without executing
    #[arg(long)]
    dry_run: bool,

    /// Sync to a specific revision
    #[arg(long)]
    revision: Option<String>,
}

#[derive(Args, Debug)]
struct AppRollbackArgs {
    #[command(flatten)]
    host: HostArg,

    /// Application name
    #[arg(long)]
    name: String,

    /// Deployment ID to rollback to
    #[arg(long)]
    id: i64,
}

#[derive(Args, Debug)]
struct LoginArgs {
    /// ArgoCD hostname (e.g., sandbox.argocd.global.mozgcp.net)
    #[arg(long, env = "ARGOCD_HOST")]
    host: String,
}

#[derive(Args, Debug)]
struct CliArgs {
    /// Arguments passed through to argocd
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

#[derive(Args, Debug)]
struct IapArgs {
    /// ArgoCD hostname (e.g., sandbox.argocd.global.mozgcp.net)
    #[arg(long, env = "ARGOCD_HOST")]
    host: String,

    /// Service account to impersonate (defaults based on hostname)
    #[arg(long)]
    service_account: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Raw)]
    format: OutputFormat,

    /// Print the decoded token claims to stderr
    #[arg(short, long)]
    debug: bool,
}

fn init_tracing(verbose: bool, format: LogFormat) {
    let default_level = if verbose { Level::DEBUG } else { Level::WARN };
    let env_filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    let registry = tracing_subscriber::registry().with(env_filter);
    match format {
        LogFormat::Text => registry
            .with(fmt::layer().compact().with_target(false).with_writer(io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(io::stderr))
            .init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format);
    debug!("mzcld v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Argo(ArgoCommand::Maintenance(args)) => run_maintenance(args).await,
        Commands::Argo(ArgoCommand::App(cmd)) => run_app(cmd).await,
        Commands::Argo(ArgoCommand::Login(args)) => run_login(args).await,
        Commands::Argo(ArgoCommand::Cli(args)) => {
            let code = run_cli(args).await?;
            std::process::exit(code);
        }
        Commands::Iap(args) => run_iap(args).await,
    }
}

/// Name of the active kubeconfig context, recorded in snapshots
fn current_kube_context() -> String {
    kube::config::Kubeconfig::read()
        .ok()
        .and_then(|k| k.current_context)
        .unwrap_or_default()
}

async fn run_maintenance(args: MaintenanceArgs) -> anyhow::Result<()> {
    let mode = MaintenanceMode::from_flags(args.disable_sync, args.restore_sync)?;
    let selector = LabelSelector::parse_opt(args.selector.as_deref())?;
    let state_file = match args.state_file {
        Some(path) => path,
        None => default_state_path(&args.namespace)?,
    };

    let mut config = MaintenanceConfig::new(args.namespace, state_file);
    config.selector = selector;
    config.force = args.force;
    config.mode = mode;
    config.timeout = args.timeout;
    config.cluster = current_kube_context();

    let store = KubeApplicationStore::try_default().await?;
    let controller = MaintenanceController::new(&store, config);
    let outcome = controller.run(&mut io::stdout().lock()).await?;
    info!("Maintenance run finished: {:?}", outcome);
    Ok(())
}

async fn run_app(cmd: AppCommand) -> anyhow::Result<()> {
    let config_path = argo::default_config_path()?;
    let host_flag = match &cmd {
        AppCommand::List(a) => a.host.host.as_deref(),
        AppCommand::Sync(a) => a.host.host.as_deref(),
        AppCommand::Rollback(a) => a.host.host.as_deref(),
    };
    let host = argo::resolve_host(host_flag, &config_path)?;
    let session = ArgoSession::connect(&host, &config_path)
        .await
        .context("generate IAP token")?;

    let mut out = io::stdout().lock();
    match cmd {
        AppCommand::List(args) => {
            let query = AppQuery {
                namespace: args.namespace,
                selector: args.selector,
            };
            argo::app::list(&session.client, &query, &mut out)
                .await
                .context("list applications")?;
        }
        AppCommand::Sync(args) => {
            let request = SyncRequest {
                prune: args.prune,
                dry_run: args.dry_run,
                revision: args.revision.filter(|r| !r.is_empty()),
            };
            argo::app::sync(&session.client, &args.name, &request, &mut out)
                .await
                .context("sync application")?;
        }
        AppCommand::Rollback(args) => {
            argo::app::rollback(&session.client, &args.name, args.id, &mut out)
                .await
                .context("rollback application")?;
        }
    }
    Ok(())
}

async fn run_login(args: LoginArgs) -> anyhow::Result<()> {
    let host = iap::normalize_host(&args.host).to_string();
    info!("Generating IAP token");
    let iap = iap::token_for_host(&host, None)
        .await
        .context("generate IAP token")?;

    info!("Authenticating with ArgoCD via SSO");
    let client = ArgoClient::for_host(&host, &iap.token, None)?;
    let mut out = io::stdout().lock();
    let tokens = argo::sso_login(&client, &host, &mut out)
        .await
        .context("SSO login")?;

    let config_path = argo::default_config_path()?;
    let mut config = ArgoConfig::load_or_default(&config_path).context("save config")?;
    config.upsert_session(&host, &tokens.id_token, tokens.refresh_token.as_deref());
    config.save(&config_path).context("save config")?;

    writeln!(out, "Successfully logged in to {host}")?;
    info!("Auth token will expire after 24 hours, re-run login when needed");
    Ok(())
}

async fn run_cli(args: CliArgs) -> anyhow::Result<i32> {
    let config_path = argo::default_config_path()?;
    let host = ArgoConfig::current_context_at(&config_path)?;
    let iap = iap::token_for_host(&host, None)
        .await
        .context("generate IAP token")?;

    let client = ArgoClient::for_host(&host, &iap.token, None)?;
    let bin_dir = argo::cli::default_bin_dir()?;
    let cli_path = argo::cli::ensure_cli(
        client.http(),
        client.base_url(),
        &host,
        &bin_dir,
        &mut io::stdout().lock(),
    )
    .await
    .context("ensure ArgoCD CLI")?;

    Ok(argo::cli::run_cli(&cli_path, &host, &iap.token, &args.args).await?)
}

async fn run_iap(args: IapArgs) -> anyhow::Result<()> {
    let token = iap::token_for_host(&args.host, args.service_account.as_deref())
        .await
        .with_context(|| format!("generate IAP token for {}", args.host))?;

    if args.debug {
        let decoded = TokenClaims::decode(&token.token).and_then(|claims| {
            iap::write_debug(
                &mut io::stderr().lock(),
                &claims,
                &token.client_id,
                chrono::Utc::now(),
            )
        });
        if let Err(e) = decoded {
            eprintln!("Warning: failed to decode token for debugging: {e}");
        }
    }

    token.write(args.format, &mut io::stdout().lock())?;
    info!("IAP token generated successfully");
    Ok(())
}
