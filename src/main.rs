//! Data Platform CLI
//!
//! Command-line front end for the data platform. Every command enters the
//! view it belongs to through the router, so the authentication guard applies
//! exactly as it does for navigation:
//! - Health check (`/`)
//! - Login / logout (`/login`)
//! - Upload URLs and file registration (`/upload`)
//! - Dataset and file browsing (`/files`)
//! - Metrics (`/metrics`) and reports (`/reports`)

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dataplatform::config::generate_default_config;
use dataplatform::{
    ApiClient, ApiError, ApiStatus, Config, Credentials, FileStore, FileUploadRequest,
    LoggingConfig, MemoryStore, Navigation, PlatformApi, RecordFilter, ReportRequest, Route,
    Router, SharedStore, Store, UploadUrlParams,
};

#[derive(Parser)]
#[command(name = "dataplatform")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Client for the data platform API")]
#[command(long_about = "Browse datasets and files, request signed upload/download URLs,\nand inspect metrics and reports on the data platform.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// API server URL (overrides config and DATAPLATFORM_API_BASE_URL)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,

    /// Config file (default: search standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Keep the session in memory only. It ends with this process, so guarded
    /// commands redirect to login; only useful with `login` and `open`
    #[arg(long, global = true)]
    pub ephemeral: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check API health
    Health,

    /// Log in and persist the session token
    Login {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        password: String,
    },

    /// Forget the persisted session token
    Logout,

    /// Show whether a session token is held
    Whoami,

    /// List datasets
    Datasets,

    /// List files in a dataset
    Files {
        /// Dataset ID
        dataset: String,
    },

    /// Get a signed download URL for a file
    DownloadUrl {
        /// File ID
        file: String,
    },

    /// Get a signed upload URL
    UploadUrl {
        #[arg(long)]
        bucket: String,
        #[arg(long)]
        object_key: String,
    },

    /// Register an uploaded file under a dataset
    RegisterFile {
        /// Dataset ID
        dataset: String,
        #[arg(long)]
        file_id: String,
        #[arg(long)]
        filename: String,
        #[arg(long)]
        bucket: String,
        #[arg(long)]
        object_key: String,
        /// Size in bytes
        #[arg(long)]
        size: i64,
        #[arg(long)]
        content_type: Option<String>,
        #[arg(long)]
        checksum: Option<String>,
    },

    /// List metrics
    Metrics {
        #[arg(short, long)]
        dataset: Option<String>,
        #[arg(long)]
        file: Option<String>,
    },

    /// List reports
    Reports {
        #[arg(short, long)]
        dataset: Option<String>,
        #[arg(long)]
        file: Option<String>,
    },

    /// Register a report
    CreateReport {
        #[arg(long)]
        dataset: String,
        #[arg(long)]
        file: String,
        #[arg(long)]
        bucket: String,
        #[arg(long)]
        object_key: String,
        #[arg(long)]
        report_type: Option<String>,
    },

    /// Resolve a path through the router
    Open {
        /// Client path, e.g. /metrics
        path: String,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Config { output } = &cli.command {
        let content = generate_default_config();
        match output {
            Some(path) => {
                std::fs::write(path, content)
                    .with_context(|| format!("Failed to write {:?}", path))?;
                println!("Config written to {:?}", path);
            }
            None => print!("{}", content),
        }
        return Ok(());
    }

    let mut config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    if let Some(url) = &cli.api_url {
        config.api.base_url = url.clone();
    }

    init_logging(&config.logging);
    tracing::debug!(base_url = %config.api.base_url, "Data platform client v{}", env!("CARGO_PKG_VERSION"));

    let storage: SharedStore = if cli.ephemeral {
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(FileStore::new(config.session.path()))
    };

    let client = Arc::new(ApiClient::new(config.api.client_config(), storage.clone())?);
    let store = Store::new(client.clone(), storage.clone());
    let mut router = Router::new(storage);
    let json = cli.format == "json";

    match cli.command {
        Commands::Health => {
            enter(&mut router, Route::Home);
            store.ping_health().await;

            let state = store.snapshot();
            if json {
                print_json(&serde_json::json!({
                    "apiStatus": state.api_status,
                    "healthMessage": state.health_message,
                }))?;
            } else {
                println!("API: {}", config.api.base_url);
                println!("Status: {}", state.api_status);
                println!("Message: {}", state.health_message);
            }

            if state.api_status == ApiStatus::Error {
                std::process::exit(1);
            }
        }

        Commands::Login { username, password } => {
            enter(&mut router, Route::Login);

            let credentials = Credentials::new(username, password);
            if let Err(e) = store.login(&credentials).await {
                fail("Login failed", e);
            }

            let user = store.current_user().map(|u| u.username).unwrap_or_default();
            println!("Logged in as {}", user);
        }

        Commands::Logout => {
            store.logout().context("Failed to clear session")?;
            println!("Logged out");
        }

        Commands::Whoami => {
            if store.is_authenticated() {
                println!("Session token present");
            } else {
                println!("Not logged in");
                std::process::exit(1);
            }
        }

        Commands::Datasets => {
            enter(&mut router, Route::Files);
            if let Err(e) = store.fetch_datasets().await {
                fail("Failed to fetch datasets", e);
            }

            let datasets = store.snapshot().datasets;
            if json {
                print_json(&datasets)?;
            } else if datasets.is_empty() {
                println!("No datasets found.");
            } else {
                println!("{:<24} {:<28} {:<10} {}", "ID", "Name", "Status", "Created By");
                println!("{}", "-".repeat(76));
                for d in datasets {
                    println!(
                        "{:<24} {:<28} {:<10} {}",
                        d.dataset_id,
                        d.name.as_deref().unwrap_or("-"),
                        d.status.as_deref().unwrap_or("-"),
                        d.created_by.as_deref().unwrap_or("-")
                    );
                }
            }
        }

        Commands::Files { dataset } => {
            enter(&mut router, Route::Files);
            if let Err(e) = store.fetch_files(&dataset).await {
                fail("Failed to fetch files", e);
            }

            let files = store.snapshot().files;
            if json {
                print_json(&files)?;
            } else if files.is_empty() {
                println!("No files in dataset {}.", dataset);
            } else {
                println!("{:<24} {:<32} {:>12} {}", "ID", "Filename", "Size", "Status");
                println!("{}", "-".repeat(80));
                for f in files {
                    println!(
                        "{:<24} {:<32} {:>12} {}",
                        f.file_id,
                        f.filename.as_deref().unwrap_or("-"),
                        f.size.map(format_size).unwrap_or_else(|| "-".to_string()),
                        f.status.as_deref().unwrap_or("-")
                    );
                }
            }
        }

        Commands::DownloadUrl { file } => {
            enter(&mut router, Route::Files);
            match client.get_download_url(&file).await {
                Ok(response) => println!("{}", response.data.url),
                Err(e) => fail("Failed to get download URL", e),
            }
        }

        Commands::UploadUrl { bucket, object_key } => {
            enter(&mut router, Route::Upload);
            let params = UploadUrlParams { bucket, object_key };
            match client.create_upload_url(&params).await {
                Ok(response) => println!("{}", response.data.url),
                Err(e) => fail("Failed to create upload URL", e),
            }
        }

        Commands::RegisterFile {
            dataset,
            file_id,
            filename,
            bucket,
            object_key,
            size,
            content_type,
            checksum,
        } => {
            enter(&mut router, Route::Upload);
            let payload = FileUploadRequest {
                file_id,
                filename,
                bucket,
                object_key,
                size,
                storage_type: None,
                checksum,
                content_type,
                version: None,
                encrypt_flag: None,
                status: None,
            };

            match client.create_file(&dataset, &payload).await {
                Ok(response) if json => print_json(&response.data)?,
                Ok(response) => println!(
                    "Registered {} in dataset {}",
                    response.data.file_id, response.data.dataset_id
                ),
                Err(e) => fail("Failed to register file", e),
            }
        }

        Commands::Metrics { dataset, file } => {
            enter(&mut router, Route::Metrics);
            let filter = RecordFilter {
                dataset_id: dataset,
                file_id: file,
            };
            if let Err(e) = store.fetch_metrics(&filter).await {
                fail("Failed to fetch metrics", e);
            }

            let metrics = store.snapshot().metrics;
            if json {
                print_json(&metrics)?;
            } else if metrics.is_empty() {
                println!("No metrics found.");
            } else {
                println!("{:<20} {:<20} {:<24} {}", "Dataset", "File", "Metric", "Value");
                println!("{}", "-".repeat(84));
                for m in metrics {
                    println!(
                        "{:<20} {:<20} {:<24} {}",
                        m.dataset_id,
                        m.file_id,
                        m.metric_name.as_deref().unwrap_or("-"),
                        m.metric_value.as_deref().unwrap_or("-")
                    );
                }
            }
        }

        Commands::Reports { dataset, file } => {
            enter(&mut router, Route::Reports);
            let filter = RecordFilter {
                dataset_id: dataset,
                file_id: file,
            };
            if let Err(e) = store.fetch_reports(&filter).await {
                fail("Failed to fetch reports", e);
            }

            let reports = store.snapshot().reports;
            if json {
                print_json(&reports)?;
            } else if reports.is_empty() {
                println!("No reports found.");
            } else {
                println!("{:<8} {:<20} {:<20} {:<12} {}", "ID", "Dataset", "File", "Type", "Location");
                println!("{}", "-".repeat(90));
                for r in reports {
                    let location = match (&r.bucket, &r.object_key) {
                        (Some(bucket), Some(key)) => format!("{}/{}", bucket, key),
                        _ => "-".to_string(),
                    };
                    println!(
                        "{:<8} {:<20} {:<20} {:<12} {}",
                        r.id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string()),
                        r.dataset_id,
                        r.file_id,
                        r.report_type.as_deref().unwrap_or("-"),
                        location
                    );
                }
            }
        }

        Commands::CreateReport {
            dataset,
            file,
            bucket,
            object_key,
            report_type,
        } => {
            enter(&mut router, Route::Reports);
            let payload = ReportRequest {
                dataset_id: dataset,
                file_id: file,
                bucket,
                object_key,
                report_type,
                storage_type: None,
            };

            match client.create_report(&payload).await {
                Ok(response) if json => print_json(&response.data)?,
                Ok(response) => println!(
                    "Created report {}",
                    response
                        .data
                        .id
                        .map(|id| id.to_string())
                        .unwrap_or_else(|| "(no id)".to_string())
                ),
                Err(e) => fail("Failed to create report", e),
            }
        }

        Commands::Open { path } => match router.navigate(&path) {
            Navigation::Resolved { route, first_load } => {
                let loading = if first_load { " (loaded)" } else { "" };
                println!("{} -> {}{}", path, route, loading);
            }
            Navigation::Redirected { requested, to } => {
                println!("{} -> {} (not logged in)", requested, to.path());
            }
            Navigation::NotFound { path } => {
                eprintln!("No view for {}", path);
                std::process::exit(1);
            }
        },

        Commands::Config { .. } => unreachable!("handled before setup"),
    }

    Ok(())
}

/// Install the tracing subscriber. `RUST_LOG` wins over the configured level.
fn init_logging(config: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("dataplatform={}", config.level)));

    let registry = tracing_subscriber::registry().with(filter);

    if config.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Navigate to the view backing a command, exiting when the guard redirects
fn enter(router: &mut Router, route: Route) {
    if let Navigation::Redirected { .. } = router.navigate(route.path()) {
        eprintln!("Not logged in.");
        eprintln!();
        eprintln!("Log in first with:");
        eprintln!("  dataplatform login -u <username> -p <password>");
        std::process::exit(1);
    }
}

fn fail(context: &str, err: ApiError) -> ! {
    eprintln!("{}: {}", context, err);
    if err.is_unauthorized() {
        eprintln!();
        eprintln!("The session may have expired. Log in again with:");
        eprintln!("  dataplatform login -u <username> -p <password>");
    }
    std::process::exit(1);
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn format_size(bytes: i64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn test_cli_parses_metrics_filter() {
        let cli = Cli::parse_from(["dataplatform", "metrics", "--dataset", "ds-1"]);
        match cli.command {
            Commands::Metrics { dataset, file } => {
                assert_eq!(dataset.as_deref(), Some("ds-1"));
                assert!(file.is_none());
            }
            _ => panic!("expected metrics command"),
        }
    }

    #[test]
    fn test_cli_global_flags() {
        let cli = Cli::parse_from([
            "dataplatform",
            "datasets",
            "--format",
            "json",
            "--api-url",
            "http://api:9000",
            "--ephemeral",
        ]);
        assert_eq!(cli.format, "json");
        assert_eq!(cli.api_url.as_deref(), Some("http://api:9000"));
        assert!(cli.ephemeral);
    }

    #[test]
    fn test_ephemeral_help_names_useful_commands() {
        use clap::CommandFactory;

        let command = Cli::command();
        let help = command
            .get_arguments()
            .find(|arg| arg.get_id() == "ephemeral")
            .and_then(|arg| arg.get_help())
            .map(|help| help.to_string())
            .unwrap();

        assert!(help.contains("only useful with `login` and `open`"), "{help}");
    }
}
