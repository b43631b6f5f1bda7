//! Portico headless driver.
//!
//! Mounts an embedded view against the configured backend, then walks the
//! routes given on the command line, printing the navigation menu and each
//! extracted fragment.
//!
//! Usage: `portico [--config FILE] [--session FILE] [--timeout SECS] ROUTE...`
//!
//! `PORTICO_CONFIG` and `PORTICO_SESSION` stand in for the flags, and
//! `PORTICO_TOKEN` overrides the session token.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};

use portico_core::{HttpFetcher, LoadState, PageView, RoutePath, Session, SharedSession};
use portico_types::PorticoConfig;

const USAGE: &str = "Usage: portico [--config FILE] [--session FILE] [--timeout SECS] ROUTE...";

// ---------------------------------------------------------------------------
// CLI parsing
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq)]
struct Args {
    config: Option<PathBuf>,
    session: Option<PathBuf>,
    timeout: Duration,
    routes: Vec<String>,
}

fn parse_args(mut iter: impl Iterator<Item = String>) -> Result<Args> {
    let mut args = Args {
        config: None,
        session: None,
        timeout: Duration::from_secs(30),
        routes: Vec::new(),
    };
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => args.config = Some(iter.next().context(USAGE)?.into()),
            "--session" => args.session = Some(iter.next().context(USAGE)?.into()),
            "--timeout" => {
                let secs: u64 = iter
                    .next()
                    .context(USAGE)?
                    .parse()
                    .context("--timeout takes whole seconds")?;
                args.timeout = Duration::from_secs(secs);
            },
            "-h" | "--help" => bail!(USAGE),
            other if other.starts_with("--") => bail!("Unknown argument: {other}\n{USAGE}"),
            route => args.routes.push(route.to_string()),
        }
    }
    if args.config.is_none() {
        args.config = std::env::var_os("PORTICO_CONFIG").map(PathBuf::from);
    }
    if args.session.is_none() {
        args.session = std::env::var_os("PORTICO_SESSION").map(PathBuf::from);
    }
    Ok(args)
}

// ---------------------------------------------------------------------------
// Setup
// ---------------------------------------------------------------------------

fn load_config(args: &Args) -> Result<PorticoConfig> {
    match &args.config {
        Some(path) => PorticoConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Ok(PorticoConfig::default()),
    }
}

fn load_session(args: &Args) -> Result<Session> {
    let mut session = match &args.session {
        Some(path) => Session::load(path)
            .with_context(|| format!("loading session from {}", path.display()))?,
        None => Session::default(),
    };
    if let Ok(token) = std::env::var("PORTICO_TOKEN") {
        session.token = Some(token);
    }
    Ok(session)
}

fn build_fetcher(config: &PorticoConfig) -> Result<HttpFetcher> {
    let fetcher = HttpFetcher::new(config)?;
    #[cfg(feature = "tls-rustls")]
    let fetcher = fetcher.with_tls(Arc::new(portico_net::RustlsTlsProvider::new()));
    Ok(fetcher)
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn print_navigation(view: &PageView) {
    println!("== navigation ({}) ==", view.route());
    for entry in view.nav_entries() {
        let marker = if entry.active { '*' } else { ' ' };
        println!("{marker} {:<32} {}", entry.label, entry.href);
    }
}

fn print_fragment(view: &PageView) {
    println!("== content ({}) ==", view.route());
    println!("{}", view.fragment().content());
    if !view.styles().is_empty() {
        println!("== styles ==");
        println!("{}", view.styles());
    }
}

/// Wait for the view and report what happened. Returns `false` on error.
fn settle(view: &mut PageView, timeout: Duration) -> bool {
    if !view.run_until_idle(timeout) {
        log::warn!("Timed out waiting for {}", view.route());
    }
    match view.state() {
        LoadState::Error(message) => {
            log::error!("{}: {message}", view.route());
            false
        },
        state => {
            log::debug!("{} -> {state:?}", view.route());
            true
        },
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = parse_args(std::env::args().skip(1))?;
    let config = load_config(&args)?;
    let session = SharedSession::new(load_session(&args)?);
    log::info!("Starting Portico against {}", config.backend_origin);

    let fetcher = build_fetcher(&config)?;
    let mut view = PageView::new(config, Arc::new(fetcher), session)?;

    let mut routes = args.routes.iter().map(|r| RoutePath::new(r));
    let first = routes.next().unwrap_or_else(|| RoutePath::new("/"));

    view.mount(first);
    let mut ok = settle(&mut view, args.timeout);
    print_navigation(&view);
    print_fragment(&view);

    for route in routes {
        view.navigate(route);
        ok &= settle(&mut view, args.timeout);
        print_fragment(&view);
    }

    if !ok {
        bail!("one or more routes failed to load");
    }
    Ok(())
}
