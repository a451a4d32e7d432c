//! Development server driving the reloader.
//!
//! Every application request runs a reload check first. Two endpoints let
//! tooling talk to the reloader directly:
//!
//! | Endpoint                                 | Action                      |
//! |------------------------------------------|-----------------------------|
//! | `POST /@devloop/reload`                  | Force a reload next check   |
//! | `GET /@devloop/source?class=..&line=..`  | Map a class back to source  |

mod lifecycle;
mod response;

pub use response::Reply;

use crate::{build::BuildOutcome, config::cfg, core::is_shutdown, debug, log, reloader::Reloader};
use anyhow::{Context, Result};
use percent_encoding::percent_decode_str;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tiny_http::{Method, Request, Server};

const RELOAD_PATH: &str = "/@devloop/reload";
const SOURCE_PATH: &str = "/@devloop/source";

/// Routes requests to the reloader and tracks application generations.
pub struct DevServer {
    reloader: Arc<Reloader>,
    /// Bumped on every `ReloadRequired`; stands in for a fresh application.
    generation: AtomicU64,
}

impl DevServer {
    pub fn new(reloader: Arc<Reloader>) -> Self {
        Self {
            reloader,
            generation: AtomicU64::new(0),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Bind `[serve]` and serve until shutdown is requested.
    pub fn run(self: Arc<Self>) -> Result<()> {
        let config = cfg();
        let (server, addr) = lifecycle::bind_with_retry(config.serve.interface, config.serve.port)?;
        let server = Arc::new(server);
        lifecycle::register_server_for_shutdown(Arc::clone(&server));

        log!("serve"; "http://{}", addr);
        self.run_request_loop(&server, addr)
    }

    fn run_request_loop(self: &Arc<Self>, server: &Server, addr: SocketAddr) -> Result<()> {
        // Builds serialize inside the reloader; the pool keeps endpoint
        // requests responsive while one is running.
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(4)
            .thread_name(|i| format!("devloop-http-{i}"))
            .build()
            .context("failed to create request thread pool")?;

        for request in server.incoming_requests() {
            let this = Arc::clone(self);
            pool.spawn(move || {
                if let Err(e) = this.handle_request(request) {
                    log!("serve"; "request error: {e:#}");
                }
            });
        }

        debug!("serve"; "stopped listening on {}", addr);
        Ok(())
    }

    fn handle_request(&self, request: Request) -> Result<()> {
        let reply = if is_shutdown() {
            Reply::plain(503, "503 Service Unavailable")
        } else {
            self.route(request.method(), request.url())
        };
        reply.send(request)
    }

    /// Produce the reply for one request.
    pub fn route(&self, method: &Method, url: &str) -> Reply {
        let (path, query) = url.split_once('?').unwrap_or((url, ""));

        match (method, path) {
            (Method::Post, RELOAD_PATH) => {
                self.reloader.force_reload();
                log!("reload"; "reload requested");
                Reply::plain(202, "reload scheduled")
            }
            (_, RELOAD_PATH) => Reply::plain(405, "use POST"),
            (Method::Get, SOURCE_PATH) => self.find_source(query),
            (_, SOURCE_PATH) => Reply::plain(405, "use GET"),
            _ => self.check(),
        }
    }

    /// Run a reload check and render its outcome.
    fn check(&self) -> Reply {
        let outcome = self.reloader.build();
        if outcome == BuildOutcome::ReloadRequired {
            self.generation.fetch_add(1, Ordering::SeqCst);
        }
        let generation = self.generation();
        if outcome != BuildOutcome::NoChange {
            outcome.report(generation);
        }

        match &outcome {
            BuildOutcome::CompilationFailure(failure) => {
                Reply::html(500, response::compilation_failure_page(failure))
            }
            BuildOutcome::OpaqueBuildError(error) => {
                Reply::html(500, response::build_error_page(error))
            }
            _ => Reply::plain(
                200,
                format!("devloop: {} (generation {generation})\n", outcome.label()),
            ),
        }
    }

    fn find_source(&self, query: &str) -> Reply {
        let params = parse_query(query);
        let param = |name: &str| {
            params
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str())
        };

        let Some(class) = param("class").filter(|c| !c.is_empty()) else {
            return Reply::json(400, &json!({ "error": "missing `class` parameter" }));
        };
        let line = match param("line").map(str::parse::<u32>) {
            None => None,
            Some(Ok(line)) => Some(line),
            Some(Err(_)) => {
                return Reply::json(400, &json!({ "error": "`line` must be a positive integer" }));
            }
        };

        match self.reloader.find_source(class, line) {
            Some(position) => Reply::json(
                200,
                &json!({ "file": position.file.to_string_lossy(), "line": position.line }),
            ),
            None => Reply::json(404, &json!({ "error": format!("no source for `{class}`") })),
        }
    }
}

/// Decode `a=1&b=2` pairs. Keys without `=` get an empty value.
fn parse_query(query: &str) -> Vec<(String, String)> {
    let decode = |s: &str| {
        let s = s.replace('+', " ");
        percent_decode_str(&s).decode_utf8_lossy().into_owned()
    };
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode(key), decode(value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{AnalysisError, AnalysisReader, CompiledSource, ModuleAnalysis};
    use crate::build::driver::BuildDriver;
    use crate::build::throwable::RecordedThrowable;
    use crate::build::{BuildReport, RebuildExecutor};
    use crate::project::{Module, ModuleGraph};
    use crate::reloader::ReloadOptions;
    use parking_lot::Mutex;
    use serde_json::Value;
    use std::collections::VecDeque;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    #[derive(Default)]
    struct ScriptedDriver {
        failures: Mutex<VecDeque<RecordedThrowable>>,
    }

    impl BuildDriver for ScriptedDriver {
        fn run_goals(&self, _modules: &[Module], _goals: &[String]) -> BuildReport {
            match self.failures.lock().pop_front() {
                Some(exception) => BuildReport::failed(exception),
                None => BuildReport::success(),
            }
        }
    }

    struct OneClass;

    impl AnalysisReader for OneClass {
        fn read_analysis(&self, module: &Module, _cache: &Path) -> Result<ModuleAnalysis, AnalysisError> {
            Ok(ModuleAnalysis {
                sources: vec![CompiledSource {
                    source: module.base.join("app/controllers/Home.scala"),
                    products: vec![module.output_dir.join("controllers/Home.class")],
                    compiled_at: 0,
                }],
            })
        }
    }

    struct Fixture {
        _dir: TempDir,
        root: PathBuf,
        driver: Arc<ScriptedDriver>,
        server: DevServer,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("web");
        let module = Module {
            name: "web".into(),
            base: root.clone(),
            source_roots: vec![root.join("app")],
            resource_roots: vec![root.join("conf")],
            output_dir: root.join("target/classes"),
            build_dir: root.join("target"),
            template_output_dir: None,
            analysis_cache: Some(root.join("target/analysis.json")),
            depends_on: Vec::new(),
        };
        let graph = Arc::new(ModuleGraph::new(vec![module]).unwrap());
        let driver = Arc::new(ScriptedDriver::default());
        let options = ReloadOptions {
            goals: vec!["compile".into()],
            additional_goals: Vec::new(),
            main_module: 0,
            watch: false,
        };
        let reloader = Reloader::new(graph, RebuildExecutor::new(driver.clone()), options)
            .with_analysis_reader(Arc::new(OneClass));

        Fixture {
            _dir: dir,
            root,
            driver,
            server: DevServer::new(Arc::new(reloader)),
        }
    }

    fn get(server: &DevServer, url: &str) -> Reply {
        server.route(&Method::Get, url)
    }

    fn body_json(reply: &Reply) -> Value {
        serde_json::from_str(&reply.body).unwrap()
    }

    #[test]
    fn test_first_request_reloads() {
        let f = fixture();
        let reply = get(&f.server, "/");
        assert_eq!(reply.status, 200);
        assert_eq!(reply.body, "devloop: reload required (generation 1)\n");

        let reply = get(&f.server, "/assets/main.css");
        assert_eq!(reply.body, "devloop: no change (generation 1)\n");
        assert_eq!(f.server.generation(), 1);
    }

    #[test]
    fn test_forced_reload_bumps_generation() {
        let f = fixture();
        get(&f.server, "/");

        let reply = f.server.route(&Method::Post, RELOAD_PATH);
        assert_eq!(reply.status, 202);
        assert_eq!(f.server.generation(), 1);

        get(&f.server, "/");
        assert_eq!(f.server.generation(), 2);
    }

    #[test]
    fn test_reload_endpoint_requires_post() {
        let f = fixture();
        assert_eq!(get(&f.server, RELOAD_PATH).status, 405);
        assert_eq!(f.server.route(&Method::Post, SOURCE_PATH).status, 405);
        // Neither ran a build
        assert_eq!(f.server.generation(), 0);
    }

    #[test]
    fn test_compilation_failure_renders_error_page() {
        let f = fixture();
        let source = f.root.join("app/controllers/Home.scala");
        fs::create_dir_all(source.parent().unwrap()).unwrap();
        fs::write(&source, "class Home {\n  def index = Ok(<b>)\n}\n").unwrap();

        f.driver.failures.lock().push_back(
            RecordedThrowable::new(
                "com.google.code.play2.provider.api.TemplateCompilationException",
                "not found: value b",
            )
            .with_accessor("getSource", json!(source.to_string_lossy()))
            .with_accessor("getMessage", json!("not found: value b"))
            .with_accessor("getLine", json!(2))
            .with_accessor("getPosition", json!(18)),
        );

        let reply = get(&f.server, "/");
        assert_eq!(reply.status, 500);
        assert_eq!(reply.content_type, response::HTML);
        assert!(reply.body.contains("not found: value b"));
        assert!(reply.body.contains("  def index = Ok(&lt;b&gt;)\n                  ^"));
        assert_eq!(f.server.generation(), 0);

        // The next request retries and recovers
        let reply = get(&f.server, "/");
        assert_eq!(reply.status, 200);
        assert_eq!(f.server.generation(), 1);
    }

    #[test]
    fn test_opaque_error_page() {
        let f = fixture();
        f.driver.failures.lock().push_back(RecordedThrowable::new(
            "org.eclipse.aether.resolution.DependencyResolutionException",
            "Could not resolve com.acme:core:1.0",
        ));

        let reply = get(&f.server, "/");
        assert_eq!(reply.status, 500);
        assert!(reply.body.contains("<h1>Build error</h1>"));
        assert!(reply.body.contains("DependencyResolutionException"));
        assert!(reply.body.contains("Could not resolve com.acme:core:1.0"));
    }

    #[test]
    fn test_source_endpoint() {
        let f = fixture();
        get(&f.server, "/");

        let reply = get(&f.server, "/@devloop/source?class=controllers.Home&line=12");
        assert_eq!(reply.status, 200);
        let body = body_json(&reply);
        assert_eq!(
            body["file"],
            f.root
                .join("app/controllers/Home.scala")
                .to_string_lossy()
                .into_owned()
        );
        assert_eq!(body["line"], 12);

        // Nested classes resolve through their top-level class
        let reply = get(&f.server, "/@devloop/source?class=controllers.Home%24anonfun%241");
        assert_eq!(reply.status, 200);
        assert!(body_json(&reply)["line"].is_null());
    }

    #[test]
    fn test_source_endpoint_errors() {
        let f = fixture();
        assert_eq!(get(&f.server, SOURCE_PATH).status, 400);
        assert_eq!(get(&f.server, "/@devloop/source?class=a.B&line=x").status, 400);

        let reply = get(&f.server, "/@devloop/source?class=a.Unknown");
        assert_eq!(reply.status, 404);
        assert!(body_json(&reply)["error"].as_str().unwrap().contains("a.Unknown"));
    }

    #[test]
    fn test_parse_query() {
        assert_eq!(
            parse_query("class=a.B%24c&line=3&flag"),
            vec![
                ("class".to_string(), "a.B$c".to_string()),
                ("line".to_string(), "3".to_string()),
                ("flag".to_string(), String::new()),
            ]
        );
        assert!(parse_query("").is_empty());
    }
}
