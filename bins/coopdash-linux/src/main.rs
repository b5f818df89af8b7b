use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use coopdash_client::{AppContext, HttpParamsApi, LogNotifier, ParameterSet, ViewOptions};
use coopdash_core::config::{default_config_dir, FileStorage};
use coopdash_core::routes::Navigation;
use coopdash_core::{DashboardSettings, ParameterRegistry, ThemePreference};
use coopdash_device::{create_router, simulation, DeviceState};
use serde_json::Value;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str = "\
Usage: coopdash <command> [args]

Commands:
  serve [addr] [static-dir]     Run the device emulator (default 0.0.0.0:8080)
  watch <route> <key>... [--period <ms>]
                                Open a view and print its parameters live
  set <route> <key=value>...    Submit the given parameters from a view
  level                         Print the device-reported access level
  log [pos] [count]             Print a page of the device log
  routes                        List routes and whether they are open
  theme [light|dark]            Show or change the theme preference

Environment:
  COOPDASH_CONFIG      settings file (default ~/.coopdash/settings.json)
  COOPDASH_DEVICE_URL  device base URL, overrides the settings file
  RUST_LOG             log filter";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,coopdash_client=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some((command, rest)) = args.split_first() else {
        println!("{USAGE}");
        return Ok(());
    };

    match command.as_str() {
        "serve" => serve(rest).await,
        "watch" => watch(rest).await,
        "set" => set(rest).await,
        "level" => level().await,
        "log" => log(rest).await,
        "routes" => routes().await,
        "theme" => theme(rest),
        "help" | "--help" | "-h" => {
            println!("{USAGE}");
            Ok(())
        }
        other => bail!("unknown command {other:?}\n\n{USAGE}"),
    }
}

// ============================================================================
// Configuration
// ============================================================================

struct Loaded {
    settings: DashboardSettings,
    config_dir: PathBuf,
}

fn load_settings() -> anyhow::Result<Loaded> {
    let config_dir = default_config_dir();
    let path = std::env::var_os("COOPDASH_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| config_dir.join("settings.json"));

    let mut settings = DashboardSettings::load_or_default(&path)
        .with_context(|| format!("loading settings from {}", path.display()))?;
    if let Ok(url) = std::env::var("COOPDASH_DEVICE_URL") {
        settings.device_url = Some(url);
    }
    tracing::debug!("Device at {}", settings.device_url());

    Ok(Loaded {
        settings,
        config_dir,
    })
}

fn storage(loaded: &Loaded) -> anyhow::Result<Arc<FileStorage>> {
    let path = loaded.settings.storage_path(&loaded.config_dir);
    let storage = FileStorage::open(&path)
        .with_context(|| format!("opening client storage {}", path.display()))?;
    Ok(Arc::new(storage))
}

fn http_api(settings: &DashboardSettings) -> anyhow::Result<Arc<HttpParamsApi>> {
    let api = HttpParamsApi::with_timeout(settings.device_url(), settings.request_timeout())?;
    Ok(Arc::new(api))
}

/// Build the dashboard context and run the startup access level fetch.
async fn start_app() -> anyhow::Result<AppContext> {
    let loaded = load_settings()?;
    let api = http_api(&loaded.settings)?;
    let app = AppContext::new(
        api,
        Arc::new(LogNotifier),
        storage(&loaded)?,
        &loaded.settings,
    );
    app.start().await;
    Ok(app)
}

fn open_route(app: &AppContext, path: &str) -> anyhow::Result<Navigation> {
    let navigation = app.navigate(path)?;
    if let Navigation::Redirected { requested, to } = &navigation {
        println!(
            "{} requires a higher access level (current {}); showing {}",
            requested,
            app.access_level(),
            to.path
        );
    }
    Ok(navigation)
}

fn print_params(params: &ParameterSet) {
    for (key, value) in params {
        match value {
            Value::String(s) => println!("  {key:<20} {s}"),
            other => println!("  {key:<20} {other}"),
        }
    }
}

// ============================================================================
// Commands
// ============================================================================

/// Run the device emulator until Ctrl+C.
async fn serve(args: &[String]) -> anyhow::Result<()> {
    let addr: SocketAddr = args
        .first()
        .map(String::as_str)
        .unwrap_or("0.0.0.0:8080")
        .parse()
        .context("invalid bind address")?;

    let mut state = DeviceState::new(ParameterRegistry::coop_controller());
    if let Some(dir) = args.get(1) {
        state = state.with_static_dir(dir);
    }
    let state = Arc::new(state);

    let app = create_router(state.clone());
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Device emulator listening on {}", addr);
    tracing::info!("Try these commands:");
    tracing::info!("   curl 'http://{}/api/get_params?AccessLvl=&DoorState='", addr);
    tracing::info!(
        "   curl -X POST -d '{{\"Pin\":1234}}' -H 'Content-Type: application/json' http://{}/api/set_params",
        addr
    );

    let http_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("HTTP server error: {}", e);
        }
    });
    let sim_handle = simulation::spawn(state, Duration::from_secs(1));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl+C, shutting down...");
        }
        _ = http_handle => {
            tracing::warn!("HTTP server stopped");
        }
        _ = sim_handle => {
            tracing::warn!("Simulation stopped");
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Split `watch` arguments into keys and the poll period.
fn parse_watch_args(args: &[String]) -> anyhow::Result<(Vec<String>, Duration)> {
    let mut keys = Vec::new();
    let mut period = Duration::from_millis(1000);
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--period" {
            let ms: u64 = iter
                .next()
                .ok_or_else(|| anyhow!("--period needs a value"))?
                .parse()
                .context("invalid --period")?;
            if ms == 0 {
                bail!("--period must be greater than zero");
            }
            period = Duration::from_millis(ms);
        } else {
            keys.push(arg.clone());
        }
    }
    if keys.is_empty() {
        bail!("watch needs at least one key");
    }
    Ok((keys, period))
}

/// Mount a view and print its parameters whenever they change.
async fn watch(args: &[String]) -> anyhow::Result<()> {
    let (route, rest) = args
        .split_first()
        .ok_or_else(|| anyhow!("watch needs a route and at least one key"))?;

    let (keys, period) = parse_watch_args(rest)?;

    let app = start_app().await?;
    let navigation = open_route(&app, route)?;
    let resolved = navigation.route().clone();
    println!("{}", resolved.title().unwrap_or(resolved.path.as_str()));

    let view = app
        .mount_view(resolved, ViewOptions::new(keys).live(period))
        .await;
    let client = view.client().clone();
    let mut last = ParameterSet::new();
    let mut ticker = tokio::time::interval(period);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {
                let params = client.params();
                if params != last {
                    println!("--");
                    print_params(&params);
                    last = params;
                }
            }
        }
    }

    view.unmount().await;
    app.shutdown().await;
    Ok(())
}

/// Parse `key=value`; values that are valid JSON keep their type.
fn parse_assignment(arg: &str) -> anyhow::Result<(String, Value)> {
    let (key, raw) = arg
        .split_once('=')
        .ok_or_else(|| anyhow!("expected key=value, got {arg:?}"))?;
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}

async fn set(args: &[String]) -> anyhow::Result<()> {
    let (route, rest) = args
        .split_first()
        .ok_or_else(|| anyhow!("set needs a route and at least one key=value"))?;
    let assignments = rest
        .iter()
        .map(|arg| parse_assignment(arg))
        .collect::<anyhow::Result<Vec<_>>>()?;
    if assignments.is_empty() {
        bail!("set needs at least one key=value");
    }
    let keys: Vec<String> = assignments.iter().map(|(k, _)| k.clone()).collect();

    let app = start_app().await?;
    let navigation = open_route(&app, route)?;
    if navigation.is_redirect() {
        app.shutdown().await;
        bail!("not allowed to edit {route}");
    }

    let view = app
        .mount_view(navigation.route().clone(), ViewOptions::new(keys.clone()))
        .await;
    let client = view.client().clone();
    for (key, value) in assignments {
        client.set_param(&key, value);
    }

    let status = client.submit_subset(&keys, true).await;
    println!("{status:?}");
    print_params(&client.params());

    view.unmount().await;
    app.shutdown().await;
    Ok(())
}

async fn level() -> anyhow::Result<()> {
    let app = start_app().await?;
    println!("{}", app.access_level());
    app.shutdown().await;
    Ok(())
}

async fn log(args: &[String]) -> anyhow::Result<()> {
    let pos: usize = args.first().map(|s| s.parse()).transpose()?.unwrap_or(0);
    let count: usize = args.get(1).map(|s| s.parse()).transpose()?.unwrap_or(20);

    let loaded = load_settings()?;
    let page = http_api(&loaded.settings)?.get_log(pos, count).await?;
    println!("{} entries", page.total);
    for entry in page.logs {
        println!(
            "{} {:<5} {}",
            entry.timestamp,
            format!("{:?}", entry.level).to_uppercase(),
            entry.message
        );
    }
    Ok(())
}

async fn routes() -> anyhow::Result<()> {
    let app = start_app().await?;
    println!("Access level {}", app.access_level());
    for path in app.routes().paths() {
        let navigation = app.navigate(&path)?;
        let title = navigation.route().title().unwrap_or_default().to_string();
        let mark = if navigation.is_redirect() { "locked" } else { "open" };
        println!("  {path:<22} {mark:<7} {title}");
    }
    app.shutdown().await;
    Ok(())
}

fn theme(args: &[String]) -> anyhow::Result<()> {
    let loaded = load_settings()?;
    let storage = storage(&loaded)?;
    match args.first() {
        Some(name) => {
            let theme: ThemePreference = name.parse()?;
            theme.store(storage.as_ref())?;
            println!("{theme}");
        }
        None => println!("{}", ThemePreference::load(storage.as_ref())),
    }
    Ok(())
}
