use std::fs;
use std::io::{Read, Write};
use std::net::{IpAddr, Ipv4Addr, TcpListener, TcpStream};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use tempfile::TempDir;

use super::*;
use crate::route::{Handler, Middleware, ResponseContext};
use crate::utils::normalize_path;

const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

struct Fixture {
    // dropped before the temp dir, so cleanup runs while files still exist
    orchestrator: Orchestrator,
    errors: Arc<AtomicUsize>,
    root: PathBuf,
    _temp: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let root = normalize_path(temp.path());
        let errors = Arc::new(AtomicUsize::new(0));
        let counter = errors.clone();
        let orchestrator = Orchestrator::builder()
            .reload(ReloadConfig {
                settle_ms: 20,
                ..ReloadConfig::default()
            })
            .serve(ServeConfig {
                workers: 2,
                ..ServeConfig::default()
            })
            .on_error(Arc::new(move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .build()
            .unwrap();
        Self {
            _temp: temp,
            root,
            errors,
            orchestrator,
        }
    }

    fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.root.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn errors(&self) -> usize {
        self.errors.load(Ordering::SeqCst)
    }

    fn inline(&self, name: &str, routes: Vec<RouteDescriptor>) -> String {
        self.orchestrator
            .create_instance(
                name,
                RouteSource::Inline(routes),
                free_port(),
                InstanceOptions::default(),
            )
            .unwrap()
    }

    fn watched(&self, name: &str, file: &PathBuf) -> String {
        self.orchestrator
            .create_instance(
                name,
                RouteSource::File(file.clone()),
                free_port(),
                InstanceOptions {
                    watch: true,
                    ..InstanceOptions::default()
                },
            )
            .unwrap()
    }
}

fn free_port() -> u16 {
    TcpListener::bind((LOCALHOST, 0))
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

fn module(body: &str) -> String {
    format!("[handlers.msg]\nbody = \"{body}\"\n\n[[routes]]\npath = \"/\"\nhandler = \"msg\"\n")
}

/// Minimal HTTP/1.1 client: `(status, body)`.
fn request(url: &str, method: &str, path: &str) -> (u16, String) {
    let addr = url.trim_start_matches("http://");
    let mut stream = TcpStream::connect(addr).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    write!(
        stream,
        "{method} {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\nContent-Length: 0\r\n\r\n"
    )
    .unwrap();

    let mut raw = String::new();
    stream.read_to_string(&mut raw).unwrap();
    let (head, body) = raw.split_once("\r\n\r\n").unwrap_or((raw.as_str(), ""));
    let status = head
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap();
    (status, body.to_string())
}

fn get(url: &str, path: &str) -> (u16, String) {
    request(url, "GET", path)
}

fn wait_until(timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if done() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(25));
    }
    done()
}

// =============================================================================
// Lifecycle
// =============================================================================

#[test]
fn test_inline_instance_serves_routes() {
    let fx = Fixture::new();
    let url = fx.inline(
        "api",
        vec![
            RouteDescriptor::get("/", Handler::text("home")),
            RouteDescriptor::get(
                "/users/:id",
                Handler::func(|req| {
                    ResponseContext::text(format!(
                        "{}?{}",
                        req.param("id").unwrap_or_default(),
                        req.query.as_deref().unwrap_or_default()
                    ))
                }),
            ),
        ],
    );

    assert!(url.starts_with("http://127.0.0.1:"));
    assert_eq!(get(&url, "/"), (200, "home".to_string()));
    assert_eq!(get(&url, "/users/42?full=1"), (200, "42?full=1".to_string()));
    assert_eq!(get(&url, "/missing").0, 404);
    assert_eq!(request(&url, "POST", "/").0, 404);
}

#[test]
fn test_create_is_idempotent() {
    let fx = Fixture::new();
    let first = fx.inline("api", vec![RouteDescriptor::get("/", Handler::text("a"))]);
    let second = fx.inline("api", vec![RouteDescriptor::get("/", Handler::text("b"))]);

    assert_eq!(first, second);
    assert_eq!(get(&first, "/").1, "a");
    assert_eq!(fx.orchestrator.list_instances().len(), 1);
}

#[test]
fn test_create_rejects_bad_input() {
    let fx = Fixture::new();
    let err = fx
        .orchestrator
        .create_instance(" ", RouteSource::Inline(vec![]), 4000, InstanceOptions::default())
        .unwrap_err();
    assert!(err.is_validation());

    let err = fx
        .orchestrator
        .create_instance(
            "bad",
            RouteSource::Inline(vec![RouteDescriptor::get("nope", Handler::text("x"))]),
            free_port(),
            InstanceOptions::default(),
        )
        .unwrap_err();
    assert!(matches!(err, ServeError::InvalidRoute { .. }));
    // a failed create leaves nothing behind
    assert!(fx.orchestrator.get_instance("bad").is_none());

    let err = fx
        .orchestrator
        .create_instance("zero", RouteSource::Inline(vec![]), 0, InstanceOptions::default())
        .unwrap_err();
    assert!(matches!(err, ServeError::InvalidPort(0)));
}

#[test]
fn test_port_negotiation_skips_busy_port() {
    let fx = Fixture::new();
    let occupied = TcpListener::bind((LOCALHOST, 0)).unwrap();
    let base = occupied.local_addr().unwrap().port();

    let url = fx
        .orchestrator
        .create_instance(
            "api",
            RouteSource::Inline(vec![RouteDescriptor::get("/", Handler::text("ok"))]),
            base,
            InstanceOptions::default(),
        )
        .unwrap();

    let summary = fx.orchestrator.get_instance("api").unwrap();
    assert_ne!(summary.port, base);
    assert!(summary.port > base);
    assert_eq!(summary.requested_port, base);
    assert_eq!(get(&url, "/").1, "ok");
}

#[test]
fn test_instance_debug_shows_listener() {
    let fx = Fixture::new();
    fx.inline("api", vec![RouteDescriptor::get("/", Handler::text("v1"))]);

    let instance = fx.orchestrator.instances.get("api").unwrap();
    let shown = format!("{instance:?}");
    assert!(shown.contains("Listener"));
    assert!(shown.contains("running: true"));

    instance.close();
    let shown = format!("{instance:?}");
    assert!(!shown.contains("Listener"));
    assert!(shown.contains("Stopped"));
}

#[test]
fn test_stop_releases_name() {
    let fx = Fixture::new();
    fx.inline("api", vec![RouteDescriptor::get("/", Handler::text("v1"))]);

    fx.orchestrator.stop_instance("api").unwrap();
    assert!(fx.orchestrator.get_instance("api").is_none());
    assert!(matches!(
        fx.orchestrator.stop_instance("api"),
        Err(ServeError::NotFound { .. })
    ));

    let url = fx.inline("api", vec![RouteDescriptor::get("/", Handler::text("v2"))]);
    assert_eq!(get(&url, "/").1, "v2");
}

#[test]
fn test_reset_drops_added_routes() {
    let fx = Fixture::new();
    fx.inline("api", vec![RouteDescriptor::get("/", Handler::text("home"))]);
    fx.orchestrator
        .add_route("api", RouteDescriptor::get("/extra", Handler::text("extra")))
        .unwrap();
    assert_eq!(fx.orchestrator.get_instance("api").unwrap().routes.len(), 2);

    let url = fx.orchestrator.reset_instance("api").unwrap();
    assert_eq!(get(&url, "/").1, "home");
    assert_eq!(get(&url, "/extra").0, 404);

    assert!(matches!(
        fx.orchestrator.reset_instance("ghost"),
        Err(ServeError::NotFound { .. })
    ));
}

#[test]
fn test_add_route() {
    let fx = Fixture::new();
    let url = fx.inline("api", vec![]);

    let no_cache = fx.orchestrator.handlers().middleware("no-cache").unwrap();
    fx.orchestrator
        .add_route(
            "api",
            RouteDescriptor::post("/echo", Handler::func(|req| {
                ResponseContext::text(req.method.to_string())
            }))
            .with_middleware(no_cache),
        )
        .unwrap();
    assert_eq!(request(&url, "POST", "/echo"), (200, "POST".to_string()));

    let err = fx
        .orchestrator
        .add_route("api", RouteDescriptor::new("FETCH", "/", Handler::text("x")))
        .unwrap_err();
    assert!(matches!(err, ServeError::InvalidRoute { .. }));

    let err = fx
        .orchestrator
        .add_route("ghost", RouteDescriptor::get("/", Handler::text("x")))
        .unwrap_err();
    assert!(matches!(err, ServeError::NotFound { .. }));
}

#[test]
fn test_cleanup() {
    let fx = Fixture::new();
    assert!(fx.orchestrator.cleanup().stopped.is_empty());

    fx.inline("a", vec![]);
    fx.inline("b", vec![]);
    fx.inline("c", vec![]);

    let report = fx.orchestrator.cleanup();
    let mut stopped = report.stopped.clone();
    stopped.sort();
    assert_eq!(stopped, vec!["a", "b", "c"]);
    assert!(report.failed.is_empty());
    assert!(fx.orchestrator.list_instances().is_empty());

    // idempotent
    let again = fx.orchestrator.cleanup();
    assert!(again.stopped.is_empty() && again.failed.is_empty());
}

// =============================================================================
// Request handling
// =============================================================================

#[test]
fn test_panicking_handler_returns_500() {
    let fx = Fixture::new();
    let url = fx.inline(
        "api",
        vec![
            RouteDescriptor::get("/boom", Handler::func(|_| panic!("boom"))),
            RouteDescriptor::get("/ok", Handler::text("ok")),
        ],
    );

    assert_eq!(get(&url, "/boom").0, 500);
    assert_eq!(get(&url, "/ok"), (200, "ok".to_string()));
}

#[test]
fn test_middleware_and_head() {
    let fx = Fixture::new();
    let deny = Middleware::new(|req, next| {
        if req.header("x-key").is_some() {
            next.run(req)
        } else {
            ResponseContext::text("denied").with_status(403)
        }
    });
    let url = fx.inline(
        "api",
        vec![
            RouteDescriptor::get("/secret", Handler::text("secret")).with_middleware(deny),
            RouteDescriptor::get("/page", Handler::text("page")),
        ],
    );

    assert_eq!(get(&url, "/secret"), (403, "denied".to_string()));
    assert_eq!(request(&url, "HEAD", "/page"), (200, String::new()));
}

#[test]
fn test_static_directories() {
    let fx = Fixture::new();
    let public = fx.root.join("public");
    let views = fx.root.join("views");

    let url = fx
        .orchestrator
        .create_instance(
            "site",
            RouteSource::Inline(vec![RouteDescriptor::get("/api", Handler::text("api"))]),
            free_port(),
            InstanceOptions {
                views: Some(views.clone()),
                public: vec![public.clone()],
                ..InstanceOptions::default()
            },
        )
        .unwrap();

    // missing directories are created
    assert!(public.is_dir() && views.is_dir());

    fs::write(public.join("index.html"), "<h1>home</h1>").unwrap();
    fs::write(public.join("app.css"), "body{}").unwrap();

    assert_eq!(get(&url, "/"), (200, "<h1>home</h1>".to_string()));
    assert_eq!(get(&url, "/app.css").1, "body{}");
    assert_eq!(get(&url, "/api").1, "api");
    assert_eq!(get(&url, "/../secret").0, 404);
    assert_eq!(request(&url, "POST", "/app.css").0, 404);
}

// =============================================================================
// Route files and hot reload
// =============================================================================

#[test]
fn test_file_source_validation() {
    let fx = Fixture::new();
    let err = fx
        .orchestrator
        .create_instance(
            "api",
            RouteSource::File(fx.root.join("missing.toml")),
            free_port(),
            InstanceOptions::default(),
        )
        .unwrap_err();
    assert!(matches!(err, ServeError::NotFound { kind: "file", .. }));

    let file = fx.write("api.toml", &module("v1"));
    let err = fx
        .orchestrator
        .create_instance(
            "api",
            RouteSource::File(file),
            free_port(),
            InstanceOptions {
                launch: Some("admin".into()),
                ..InstanceOptions::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, ServeError::Validation(_)));
}

#[test]
fn test_launch_selects_export() {
    let fx = Fixture::new();
    let file = fx.write(
        "api.toml",
        "[handlers.msg]\nbody = \"admin\"\n\n[[routes]]\npath = \"/\"\nhandler = \"msg\"\n\n[exports.admin]\nroutes = [{ path = \"/admin\", handler = \"msg\" }]\n",
    );
    let url = fx
        .orchestrator
        .create_instance(
            "admin",
            RouteSource::File(file),
            free_port(),
            InstanceOptions {
                launch: Some("admin".into()),
                ..InstanceOptions::default()
            },
        )
        .unwrap();

    assert_eq!(get(&url, "/admin").1, "admin");
    assert_eq!(get(&url, "/").0, 404);
}

#[test]
fn test_hot_reload_swaps_routes() {
    let fx = Fixture::new();
    let file = fx.write("api.toml", &module("v1"));
    let url = fx.watched("api", &file);

    let summary = fx.orchestrator.get_instance("api").unwrap();
    assert!(summary.hot_reload);
    assert_eq!(summary.version, Some(1));
    assert_eq!(summary.state, InstanceState::Listening);
    assert_eq!(get(&url, "/").1, "v1");

    fx.write("api.toml", &module("v2"));
    assert!(wait_until(Duration::from_secs(10), || get(&url, "/").1 == "v2"));
    assert_eq!(fx.orchestrator.get_instance("api").unwrap().version, Some(2));

    // a broken edit is reported and the last good routes keep serving
    fx.write("api.toml", "[[routes]\n");
    assert!(wait_until(Duration::from_secs(10), || fx.errors() > 0));
    std::thread::sleep(Duration::from_millis(300));
    assert_eq!(fx.errors(), 1);
    assert_eq!(get(&url, "/").1, "v2");
    assert_eq!(fx.orchestrator.get_instance("api").unwrap().version, Some(2));
}

#[test]
fn test_dependency_change_reloads_instance() {
    let fx = Fixture::new();
    fx.write("shared.toml", "[handlers.msg]\nbody = \"v1\"\n");
    let file = fx.write(
        "api.toml",
        "use = \"./shared\"\n\n[[routes]]\npath = \"/\"\nhandler = \"msg\"\n",
    );
    let url = fx.watched("api", &file);
    assert_eq!(get(&url, "/").1, "v1");

    fx.write("shared.toml", "[handlers.msg]\nbody = \"v2\"\n");
    assert!(wait_until(Duration::from_secs(10), || get(&url, "/").1 == "v2"));
}

#[test]
fn test_broken_dependency_reported_once() {
    let fx = Fixture::new();
    fx.write("shared.toml", "[handlers.msg]\nbody = \"v1\"\n");
    let file = fx.write(
        "api.toml",
        "use = \"./shared\"\n\n[[routes]]\npath = \"/\"\nhandler = \"msg\"\n",
    );
    let url = fx.watched("api", &file);

    fx.write("shared.toml", "[handlers.msg\n");
    assert!(wait_until(Duration::from_secs(10), || fx.errors() > 0));
    std::thread::sleep(Duration::from_millis(300));

    assert_eq!(fx.errors(), 1);
    assert_eq!(get(&url, "/"), (200, "v1".to_string()));
    let summary = fx.orchestrator.get_instance("api").unwrap();
    assert_eq!(summary.version, Some(1));
    assert_eq!(summary.state, InstanceState::Listening);
}

#[test]
fn test_requests_never_fail_during_swap() {
    let fx = Fixture::new();
    let file = fx.write("api.toml", &module("v1"));
    let url = fx.watched("api", &file);

    let done = AtomicBool::new(false);
    let served = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);

    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                while !done.load(Ordering::SeqCst) {
                    let (status, body) = get(&url, "/");
                    if status == 200 && body.starts_with('v') {
                        served.fetch_add(1, Ordering::SeqCst);
                    } else {
                        failed.fetch_add(1, Ordering::SeqCst);
                    }
                }
            });
        }

        for version in 2..=5 {
            let body = format!("v{version}");
            fx.write("api.toml", &module(&body));
            let swapped = wait_until(Duration::from_secs(10), || get(&url, "/").1 == body);
            if !swapped {
                done.store(true, Ordering::SeqCst);
                panic!("{body} was never served");
            }
        }
        done.store(true, Ordering::SeqCst);
    });

    assert!(served.load(Ordering::SeqCst) > 0);
    assert_eq!(failed.load(Ordering::SeqCst), 0);
    assert_eq!(fx.errors(), 0);
    assert_eq!(get(&url, "/").1, "v5");
}

#[test]
fn test_added_routes_survive_reload() {
    let fx = Fixture::new();
    let file = fx.write("api.toml", &module("v1"));
    let url = fx.watched("api", &file);
    fx.orchestrator
        .add_route("api", RouteDescriptor::get("/extra", Handler::text("extra")))
        .unwrap();

    fx.write("api.toml", &module("v2"));
    assert!(wait_until(Duration::from_secs(10), || get(&url, "/").1 == "v2"));
    assert_eq!(get(&url, "/extra").1, "extra");

    let origins: Vec<_> = fx
        .orchestrator
        .get_instance("api")
        .unwrap()
        .routes
        .into_iter()
        .map(|r| r.origin)
        .collect();
    assert_eq!(origins, vec![RouteOrigin::Source, RouteOrigin::Added]);
}

#[test]
fn test_shared_route_file_outlives_one_instance() {
    let fx = Fixture::new();
    let file = fx.write("api.toml", &module("v1"));
    fx.watched("one", &file);
    let two = fx.watched("two", &file);

    fx.orchestrator.stop_instance("one").unwrap();
    assert_eq!(fx.orchestrator.engine().subscriber_count(&file), 1);

    fx.write("api.toml", &module("v2"));
    assert!(wait_until(Duration::from_secs(10), || get(&two, "/").1 == "v2"));

    fx.orchestrator.stop_instance("two").unwrap();
    assert_eq!(fx.orchestrator.engine().subscriber_count(&file), 0);
}
