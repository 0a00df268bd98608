use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use oneview_client::{Connection, Credentials, ListQuery, LogicalEnclosures, OneViewClient, Timeout};
use reqwest::Method;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "oneview-cli",
    version,
    about = "Small async CLI for managing OneView logical enclosures"
)]
struct Cli {
    /// Appliance host name, IP address or URL.
    #[arg(long, env = "ONEVIEW_HOST")]
    host: String,

    /// User name used to open a session when no session id is given.
    #[arg(long, env = "ONEVIEW_USER")]
    user: Option<String>,

    /// Password for `--user`.
    #[arg(long, env = "ONEVIEW_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Authentication directory for `--user` (for example LOCAL).
    #[arg(long, env = "ONEVIEW_AUTH_DOMAIN")]
    auth_domain: Option<String>,

    /// Existing session id sent in the Auth header.
    #[arg(long, env = "ONEVIEW_SESSION_ID", hide_env_values = true)]
    session_id: Option<String>,

    /// Value of the X-API-Version header.
    #[arg(long, env = "ONEVIEW_API_VERSION")]
    api_version: Option<u32>,

    /// Accept self-signed appliance certificates.
    #[arg(long)]
    insecure: bool,

    /// Emit compact JSON instead of pretty-printed output.
    #[arg(long)]
    compact: bool,

    /// Log filter used when RUST_LOG is unset (for example `debug`).
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show the appliance's supported API versions.
    Version,
    /// Logical enclosure operations.
    #[command(subcommand)]
    LogicalEnclosures(EnclosureCommand),
    /// Send a raw HTTP request using method + path.
    Request(RequestArgs),
}

#[derive(Debug, Subcommand)]
enum EnclosureCommand {
    /// List logical enclosures.
    List {
        #[arg(long, default_value_t = 0)]
        start: u32,
        /// Maximum number of members; all when omitted.
        #[arg(long)]
        count: Option<u32>,
        #[arg(long, default_value = "")]
        filter: String,
        #[arg(long, default_value = "")]
        sort: String,
    },
    /// Get one logical enclosure by id or URI.
    Get { id_or_uri: String },
    /// Find logical enclosures whose FIELD equals VALUE.
    GetBy { field: String, value: String },
    /// Get a logical enclosure by name.
    GetByName { name: String },
    /// Create a logical enclosure.
    Create {
        #[command(flatten)]
        body: BodyInput,
        #[command(flatten)]
        wait: WaitArgs,
    },
    /// Update a logical enclosure; the body must carry its `uri`.
    Update {
        #[command(flatten)]
        body: BodyInput,
        #[command(flatten)]
        wait: WaitArgs,
    },
    /// Apply one patch operation.
    Patch {
        id_or_uri: String,
        operation: String,
        path: String,
        /// Patch value as JSON.
        value: String,
        #[command(flatten)]
        wait: WaitArgs,
    },
    /// Delete a logical enclosure.
    Delete {
        id_or_uri: String,
        #[arg(long)]
        force: bool,
        #[command(flatten)]
        wait: WaitArgs,
    },
    /// Reapply the appliance configuration.
    UpdateConfiguration {
        id_or_uri: String,
        #[command(flatten)]
        wait: WaitArgs,
    },
    /// Show the configuration script.
    GetScript { id_or_uri: String },
    /// Replace the configuration script.
    UpdateScript {
        id_or_uri: String,
        #[command(flatten)]
        body: BodyInput,
        #[command(flatten)]
        wait: WaitArgs,
    },
    /// Generate a support dump.
    SupportDump {
        id_or_uri: String,
        #[command(flatten)]
        body: BodyInput,
        #[command(flatten)]
        wait: WaitArgs,
    },
    /// Bring the logical enclosure back in line with its enclosure group.
    UpdateFromGroup {
        id_or_uri: String,
        #[command(flatten)]
        wait: WaitArgs,
    },
}

#[derive(Debug, Args)]
struct WaitArgs {
    /// Seconds to wait for the resulting task; waits indefinitely when omitted.
    #[arg(long, value_name = "SECONDS")]
    timeout: Option<u64>,
}

impl WaitArgs {
    fn timeout(&self) -> Timeout {
        self.timeout.map_or(Timeout::Unlimited, Timeout::from_secs)
    }
}

#[derive(Debug, Args)]
struct RequestArgs {
    /// HTTP method (GET, POST, PUT, DELETE, ...).
    method: String,

    /// Request path (for example: /rest/logical-enclosures).
    path: String,

    #[command(flatten)]
    body: BodyInput,
}

#[derive(Debug, Args)]
struct BodyInput {
    /// JSON request body literal.
    #[arg(long, conflicts_with = "body_file")]
    body_json: Option<String>,

    /// Path to a file containing a JSON request body.
    #[arg(long, value_name = "PATH", conflicts_with = "body_json")]
    body_file: Option<PathBuf>,
}

/// Entry point for the async CLI.
///
/// Parses command-line arguments, opens or reuses a session, dispatches
/// subcommands, and prints JSON output.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let mut connection = Connection::new(&cli.host)
        .with_context(|| format!("failed to create connection to '{}'", cli.host))?;
    if cli.insecure {
        connection = connection
            .accept_invalid_certs(true)
            .context("failed to build HTTP client")?;
    }
    if let Some(version) = cli.api_version {
        connection = connection.with_api_version(version);
    }
    let mut client = OneViewClient::from_connection(connection);

    // A fresh session is opened only when none was supplied, and closed again on exit.
    let opened_session = match (&cli.session_id, &cli.user) {
        (Some(session_id), _) => {
            client = client.with_session_id(session_id.clone());
            false
        }
        (None, Some(user)) => {
            let password = cli
                .password
                .clone()
                .context("--password is required together with --user")?;
            let mut credentials = Credentials::new(user.clone(), password);
            if let Some(domain) = &cli.auth_domain {
                credentials = credentials.with_auth_login_domain(domain.clone());
            }
            client
                .login(&credentials)
                .await
                .with_context(|| format!("login failed for user '{user}'"))?;
            true
        }
        (None, None) => false,
    };

    let result = run(&client, &cli.command).await;

    if opened_session {
        if let Err(error) = client.logout().await {
            tracing::warn!("failed to close session: {error}");
        }
    }

    print_json(&result?, cli.compact).context("failed to print JSON output")?;
    Ok(())
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

async fn run(client: &OneViewClient, command: &Command) -> Result<Value> {
    match command {
        Command::Version => client
            .get_version()
            .await
            .context("failed to read appliance version"),
        Command::LogicalEnclosures(command) => run_enclosures(&client.logical_enclosures(), command)
            .await
            .context("logical enclosure operation failed"),
        Command::Request(args) => send_request(client, args)
            .await
            .with_context(|| format!("request failed: {} {}", args.method, args.path)),
    }
}

async fn run_enclosures(
    enclosures: &LogicalEnclosures<Connection>,
    command: &EnclosureCommand,
) -> Result<Value> {
    let value = match command {
        EnclosureCommand::List {
            start,
            count,
            filter,
            sort,
        } => {
            let mut query = ListQuery::default()
                .start(*start)
                .filter(filter.clone())
                .sort(sort.clone());
            query.count = *count;
            Value::Array(enclosures.get_all(&query).await?)
        }
        EnclosureCommand::Get { id_or_uri } => enclosures.get(id_or_uri).await?,
        EnclosureCommand::GetBy { field, value } => {
            Value::Array(enclosures.get_by(field, value).await?)
        }
        EnclosureCommand::GetByName { name } => enclosures
            .get_by_name(name)
            .await?
            .with_context(|| format!("no logical enclosure named '{name}'"))?,
        EnclosureCommand::Create { body, wait } => {
            enclosures
                .create(require_body(body)?, wait.timeout())
                .await?
        }
        EnclosureCommand::Update { body, wait } => {
            enclosures
                .update(require_body(body)?, wait.timeout())
                .await?
        }
        EnclosureCommand::Patch {
            id_or_uri,
            operation,
            path,
            value,
            wait,
        } => {
            let value: Value =
                serde_json::from_str(value).context("patch value must be valid JSON")?;
            enclosures
                .patch(id_or_uri, operation, path, value, wait.timeout())
                .await?
        }
        EnclosureCommand::Delete {
            id_or_uri,
            force,
            wait,
        } => {
            enclosures.delete(id_or_uri, *force, wait.timeout()).await?;
            Value::Bool(true)
        }
        EnclosureCommand::UpdateConfiguration { id_or_uri, wait } => {
            enclosures
                .update_configuration(id_or_uri, wait.timeout())
                .await?
        }
        EnclosureCommand::GetScript { id_or_uri } => enclosures.get_script(id_or_uri).await?,
        EnclosureCommand::UpdateScript {
            id_or_uri,
            body,
            wait,
        } => {
            enclosures
                .update_script(id_or_uri, require_body(body)?, wait.timeout())
                .await?
        }
        EnclosureCommand::SupportDump {
            id_or_uri,
            body,
            wait,
        } => {
            enclosures
                .generate_support_dump(require_body(body)?, id_or_uri, wait.timeout())
                .await?
        }
        EnclosureCommand::UpdateFromGroup { id_or_uri, wait } => {
            enclosures
                .update_from_group(id_or_uri, wait.timeout())
                .await?
        }
    };
    Ok(value)
}

/// Sends a raw HTTP request using method + path.
async fn send_request(client: &OneViewClient, args: &RequestArgs) -> Result<Value> {
    // Validate method eagerly so CLI errors are explicit before any network call.
    let method = Method::from_str(&args.method)
        .with_context(|| format!("invalid HTTP method '{}'", args.method))?;
    let body = parse_body(&args.body).context("failed to parse request body input")?;

    let value = client
        .request_json(method, &args.path, body)
        .await
        .with_context(|| format!("HTTP request failed for path '{}'", args.path))?;
    Ok(value)
}

fn require_body(body: &BodyInput) -> Result<Value> {
    parse_body(body)
        .context("failed to parse request body input")?
        .context("a body is required: use --body-json or --body-file")
}

/// Parses an optional JSON body from inline text or a file path.
///
/// Exactly one of `--body-json` or `--body-file` may be set.
fn parse_body(body: &BodyInput) -> Result<Option<Value>> {
    match (&body.body_json, &body.body_file) {
        (Some(raw), None) => serde_json::from_str(raw)
            .context("failed to parse JSON from --body-json")
            .map(Some),
        (None, Some(path)) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read --body-file '{}'", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| {
                    format!("failed to parse JSON in --body-file '{}'", path.display())
                })
                .map(Some)
        }
        (None, None) => Ok(None),
        (Some(_), Some(_)) => bail!("use only one of --body-json or --body-file"),
    }
}

/// Prints a JSON value either compact or pretty-formatted.
fn print_json(value: &Value, compact: bool) -> Result<()> {
    if compact {
        println!(
            "{}",
            serde_json::to_string(value).context("Failed to render JSON")?
        );
    } else {
        println!(
            "{}",
            serde_json::to_string_pretty(value).context("Failed to render JSON")?
        );
    }
    Ok(())
}
