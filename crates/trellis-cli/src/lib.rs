use axum::Router;
use axum::extract::Path as AxumPath;
use axum::extract::State as AxumState;
use axum::http::HeaderMap;
use axum::response::Response;
use axum::routing::get;
use serde_json::Value;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use trellis_core::{ComponentLoader, Node, Store};
use trellis_web::{AxumTrellisAdapter, PageManifest, ServeContext, TrellisEngine};

const PAGE_MANIFEST_FILENAME: &str = "page.json";
const COMPONENTS_DIRNAME: &str = "components";

#[derive(Debug, Clone)]
enum CliCommand {
    Serve { dir: PathBuf, port: u16 },
    Render { dir: PathBuf, out: Option<PathBuf> },
}

pub async fn run_from_env() -> Result<(), String> {
    run_from_args(env::args().skip(1).collect()).await
}

pub async fn run_from_args(args: Vec<String>) -> Result<(), String> {
    match parse_command(args)? {
        CliCommand::Serve { dir, port } => run_server(dir, port).await,
        CliCommand::Render { dir, out } => run_render(dir, out),
    }
}

fn parse_command(args: Vec<String>) -> Result<CliCommand, String> {
    if args.is_empty() {
        return Err(help_text());
    }

    match args[0].as_str() {
        "serve" => parse_serve(args),
        "render" => parse_render(args),
        "help" | "--help" | "-h" => Err(help_text()),
        cmd => Err(format!("unknown command: {cmd}\n\n{}", help_text())),
    }
}

fn parse_serve(args: Vec<String>) -> Result<CliCommand, String> {
    let mut dir: Option<PathBuf> = None;
    let mut port: u16 = 8080;

    let mut i = 1usize;
    while i < args.len() {
        let token = &args[i];
        match token.as_str() {
            "--port" => {
                i += 1;
                let value = args
                    .get(i)
                    .ok_or_else(|| "--port requires a value".to_string())?;
                port = value
                    .parse::<u16>()
                    .map_err(|_| format!("invalid port: {value}"))?;
            }
            x if x.starts_with("--") => return Err(format!("unknown flag: {x}")),
            _ => {
                if dir.is_some() {
                    return Err("only one DIR positional argument is allowed".to_string());
                }
                dir = Some(PathBuf::from(token));
            }
        }
        i += 1;
    }

    Ok(CliCommand::Serve {
        dir: dir.unwrap_or_else(|| PathBuf::from(".")),
        port,
    })
}

fn parse_render(args: Vec<String>) -> Result<CliCommand, String> {
    let mut dir: Option<PathBuf> = None;
    let mut out: Option<PathBuf> = None;

    let mut i = 1usize;
    while i < args.len() {
        let token = &args[i];
        match token.as_str() {
            "--out" => {
                i += 1;
                out = Some(PathBuf::from(
                    args.get(i)
                        .ok_or_else(|| "--out requires a value".to_string())?,
                ));
            }
            x if x.starts_with("--") => return Err(format!("unknown flag: {x}")),
            _ => {
                if dir.is_some() {
                    return Err("only one DIR positional argument is allowed".to_string());
                }
                dir = Some(PathBuf::from(token));
            }
        }
        i += 1;
    }

    Ok(CliCommand::Render {
        dir: dir.unwrap_or_else(|| PathBuf::from(".")),
        out,
    })
}

fn help_text() -> String {
    [
        "trellis CLI",
        "",
        "Commands:",
        "  trellis serve [DIR] [--port 8080]",
        "  trellis render [DIR] [--out FILE]",
    ]
    .join("\n")
}

/// Reads `DIR/page.json` and builds a fresh tree against `DIR/components`.
/// Called once per request so component edits show up on the next reload.
fn load_page(dir: &Path) -> Result<(Node, Store), String> {
    let manifest_path = dir.join(PAGE_MANIFEST_FILENAME);
    let source = fs::read_to_string(&manifest_path)
        .map_err(|e| format!("failed to read {}: {e}", manifest_path.display()))?;
    let manifest = PageManifest::parse(&source)?;
    let loader = ComponentLoader::new(dir.join(COMPONENTS_DIRNAME));
    manifest.build(&loader)
}

fn run_render(dir: PathBuf, out: Option<PathBuf>) -> Result<(), String> {
    let (root, store) = load_page(&dir)?;
    let mut engine = TrellisEngine::new();
    let html = engine.compile(&root, &store)?;

    match out {
        Some(path) => {
            fs::write(&path, html).map_err(|e| format!("failed to write {}: {e}", path.display()))?;
            println!("wrote {}", path.display());
        }
        None => println!("{html}"),
    }
    Ok(())
}

async fn run_server(dir: PathBuf, port: u16) -> Result<(), String> {
    let dir = dir
        .canonicalize()
        .map_err(|e| format!("failed to resolve {}: {e}", dir.display()))?;

    // fail fast on a broken app before binding the listener
    load_page(&dir)?;

    let requests = Arc::new(AtomicU64::new(0));
    let page_dir = dir.clone();
    let adapter = AxumTrellisAdapter::new(Arc::new(Mutex::new(TrellisEngine::new())))
        .with_request_handler(move |request| {
            let (root, mut store) = load_page(&page_dir)?;
            store.set_value(
                "requests",
                Value::from(requests.fetch_add(1, Ordering::SeqCst)),
            );
            if let Some(useragent) = request.headers.get("user-agent") {
                store.set_value("useragent", Value::String(useragent.clone()));
            }
            println!("Render: {}", root);
            Ok(ServeContext { root, store })
        });

    let app = Router::new()
        .route("/", get(route_index))
        .route("/{*path}", get(route_asset))
        .with_state(adapter);

    println!("TRELLIS serve");
    println!("Root: {}", dir.display());
    println!("URL:  http://localhost:{port}");

    let host = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&host)
        .await
        .map_err(|e| format!("failed to bind {host}: {e}"))?;
    axum::serve(listener, app)
        .await
        .map_err(|e| format!("server failed: {e}"))
}

async fn route_index(
    AxumState(adapter): AxumState<AxumTrellisAdapter>,
    headers: HeaderMap,
) -> Response {
    adapter.render_request("GET", "/", &headers)
}

async fn route_asset(
    AxumPath(path): AxumPath<String>,
    AxumState(adapter): AxumState<AxumTrellisAdapter>,
) -> Response {
    adapter.serve_asset(&path)
}
