use std::io::Write;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde::Serialize;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use slotio::{
    ErrorStatus, FetchBackend, FetchConfig, FsBackend, RequestHandle, RequestRegistry,
    RequestStatus, RoutingBackend,
};

#[derive(Debug)]
struct Args {
    root: Option<PathBuf>,
    timeout: Option<Duration>,
    poll_interval: Duration,
    resources: Vec<String>,
}

#[derive(Debug, Serialize)]
struct RequestReport<'a> {
    resource: &'a str,
    handle: String,
    status: RequestStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorStatus>,
    len: usize,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let argv: Vec<String> = std::env::args().collect();

    let args = match parse_args(&argv) {
        Ok(v) => v,
        Err(msg) => {
            if !msg.is_empty() {
                eprintln!("error: {msg}");
                eprintln!();
            }
            eprintln!(
                "Usage: slotio-fetch [--root <dir>] [--timeout <secs>] [--poll-ms <ms>] <resource>..."
            );
            eprintln!();
            eprintln!("Arguments:");
            eprintln!("  <resource>        File path or http(s) URL to read");
            eprintln!();
            eprintln!("Options:");
            eprintln!("  --root <dir>      Resolve relative file paths against <dir>");
            eprintln!("  --timeout <secs>  HTTP timeout [default: SLOTIO_FETCH_TIMEOUT or 30]");
            eprintln!("  --poll-ms <ms>    Status polling interval [default: 10]");
            process::exit(2);
        }
    };

    init_tracing();

    match run(args).await {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("error: {e:#}");
            process::exit(1);
        }
    }
}

/// Initialize tracing with SLOTIO_LOG and LOG_FORMAT support.
fn init_tracing() {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match std::env::var("SLOTIO_LOG").as_deref() {
            Ok("debug") => "debug",
            Ok("trace") => "trace",
            Ok("warn") | Ok("warning") => "warn",
            Ok("error") => "error",
            _ => "info",
        };
        EnvFilter::new(format!("slotio={level},slotio_fetch={level}"))
    };

    let use_json = std::env::var("LOG_FORMAT").as_deref() == Ok("json");

    if use_json {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    }
}

fn parse_args(args: &[String]) -> Result<Args, String> {
    let mut root = None;
    let mut timeout = None;
    let mut poll_interval = Duration::from_millis(10);
    let mut resources = Vec::new();

    let mut i = 1; // skip argv[0]
    while i < args.len() {
        match args[i].as_str() {
            "--root" => {
                i += 1;
                root = Some(PathBuf::from(args.get(i).ok_or("--root requires a value")?));
            }
            "--timeout" => {
                i += 1;
                let value = args.get(i).ok_or("--timeout requires a value")?;
                let secs = value
                    .parse::<f64>()
                    .ok()
                    .filter(|s| s.is_finite() && *s > 0.0)
                    .ok_or_else(|| format!("invalid timeout: {value}"))?;
                timeout = Some(Duration::from_secs_f64(secs));
            }
            "--poll-ms" => {
                i += 1;
                let value = args.get(i).ok_or("--poll-ms requires a value")?;
                let ms = value
                    .parse::<u64>()
                    .map_err(|_| format!("invalid poll interval: {value}"))?;
                poll_interval = Duration::from_millis(ms);
            }
            "--help" | "-h" => return Err(String::new()),
            arg if arg.starts_with("--") => return Err(format!("unknown flag: {arg}")),
            arg => resources.push(arg.to_string()),
        }
        i += 1;
    }

    if resources.is_empty() {
        return Err("missing required argument: <resource>".to_string());
    }

    Ok(Args {
        root,
        timeout,
        poll_interval,
        resources,
    })
}

/// Submit all resources, wait for them, print one JSON report per request.
///
/// Returns `Ok(false)` if any request failed.
async fn run(args: Args) -> anyhow::Result<bool> {
    let fs = match &args.root {
        Some(root) => FsBackend::with_root(root),
        None => FsBackend::new(),
    };

    let mut config = FetchConfig::default();
    if let Some(timeout) = args.timeout {
        config.timeout = timeout;
    }
    let fetch = FetchBackend::new(config).context("failed to set up fetch backend")?;

    let backend = RoutingBackend::new(Arc::new(fs), Arc::new(fetch));
    let mut registry = RequestRegistry::new(Arc::new(backend));

    let mut handles: Vec<(&str, RequestHandle)> = Vec::with_capacity(args.resources.len());
    for resource in &args.resources {
        let handle = registry
            .submit(resource)
            .with_context(|| format!("failed to submit {resource}"))?;
        handles.push((resource.as_str(), handle));
    }

    loop {
        let mut pending = 0;
        for (_, handle) in &handles {
            if !registry.status(*handle)?.is_terminal() {
                pending += 1;
            }
        }
        if pending == 0 {
            break;
        }
        tracing::debug!(pending, "Waiting for requests");
        tokio::time::sleep(args.poll_interval).await;
    }

    let mut all_succeeded = true;
    let mut out = std::io::stdout().lock();

    for (resource, handle) in handles {
        let status = registry.status(handle)?;
        let error = registry.error_status(handle)?;
        let len = registry.data(handle)?.len();

        if status != RequestStatus::Success {
            all_succeeded = false;
            tracing::warn!(resource = %resource, error = %error, "Request failed");
        }

        let report = RequestReport {
            resource,
            handle: handle.to_string(),
            status,
            error: (error != ErrorStatus::None).then_some(error),
            len,
        };
        serde_json::to_writer(&mut out, &report)?;
        writeln!(out)?;

        registry.close(handle)?;
    }

    Ok(all_succeeded)
}
