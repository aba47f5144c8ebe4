//! End-to-end journeys: branch isolation across every participating
//! system, collaborator ports inside steps, and autonomous exploration
//! over the same schema.

use serde_json::json;
use std::sync::Mutex;
use viajar::checkpoint::SharedSystem;
use viajar::context::Context;
use viajar::explorer::frontier::FrontierExplorer;
use viajar::explorer::mcts::{MctsConfig, MctsExplorer};
use viajar::explorer::{run_exploration, Action, Seed, SimpleAction, StopCondition};
use viajar::graph::ResourceGraph;
use viajar::http::{HttpClient, Method, Response, StubHttpClient};
use viajar::journey::Journey;
use viajar::ports::{CachePort, InMemoryCache};
use viajar::result::{ViajarError, ViajarResult};
use viajar::runner::JourneyRunner;
use viajar::schema::{ResourceSchema, ResourceType};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn shop_schema() -> ResourceSchema {
    ResourceSchema::from_types(vec![
        ResourceType::new("user"),
        ResourceType::new("order").with_parent("user"),
    ])
    .expect("valid schema")
}

#[test]
fn branch_isolation_covers_cache_collaborator() {
    init_tracing();
    let cache = SharedSystem::new(InMemoryCache::new());
    let handle = cache.share();

    let mut context = Context::new();
    context.register_client_arc("cache", handle);

    let journey = Journey::builder("cache isolation")
        .step("seed cache", |ctx| {
            let cache = ctx
                .context
                .client::<Mutex<InMemoryCache>>("cache")
                .expect("cache registered");
            cache.lock().expect("lock").set("counter", json!(1));
            Ok(())
        })
        .checkpoint("seeded")
        .branch("continuations", "seeded", |b| {
            b.path("mutator", |p| {
                p.step("bump counter", |ctx| {
                    let cache = ctx
                        .context
                        .client::<Mutex<InMemoryCache>>("cache")
                        .expect("cache registered");
                    cache.lock().expect("lock").set("counter", json!(99));
                    Ok(())
                })
            })
            .path("observer", |p| {
                p.step("counter untouched", |ctx| {
                    let cache = ctx
                        .context
                        .client::<Mutex<InMemoryCache>>("cache")
                        .expect("cache registered");
                    let value = cache.lock().expect("lock").get("counter");
                    if value == Some(json!(1)) {
                        Ok(())
                    } else {
                        Err(ViajarError::AssertionFailed {
                            message: format!("saw sibling's cache write: {value:?}"),
                        })
                    }
                })
            })
        })
        .build()
        .expect("valid journey");

    let mut runner =
        JourneyRunner::new(ResourceGraph::new(shop_schema()), context).with_system(Box::new(cache));
    let report = runner.run(&journey).expect("run succeeds");
    assert!(report.passed(), "issues: {:?}", report.issues);
}

#[test]
fn http_stub_drives_resource_tracking() {
    init_tracing();
    let stub = StubHttpClient::new();
    stub.script(
        Method::Post,
        "/users",
        Response::new(201, json!({"id": "u1"})),
    );
    stub.script(Method::Get, "/users/u1", Response::new(200, json!({"id": "u1"})));

    let mut context = Context::new();
    context.register_client("http", stub);

    let journey = Journey::builder("signup")
        .step("create user via api", |ctx| {
            let http = ctx
                .context
                .client::<StubHttpClient>("http")
                .expect("http registered");
            let response = http.post("/users", json!({"name": "Ada"}))?;
            let id = response.body["id"].as_str().unwrap_or_default().to_string();
            ctx.graph.create("user", &id, None, Some(response.body))?;
            ctx.context.set("user_id", json!(id));
            Ok(())
        })
        .step("fetch user back", |ctx| {
            let http = ctx
                .context
                .client::<StubHttpClient>("http")
                .expect("http registered");
            let id = ctx.context.get_str("user_id").unwrap_or_default().to_string();
            let response = http.get(&format!("/users/{id}"))?;
            if response.is_success() {
                Ok(())
            } else {
                Err(ViajarError::AssertionFailed {
                    message: format!("unexpected status {}", response.status),
                })
            }
        })
        .build()
        .expect("valid journey");

    let mut runner = JourneyRunner::new(ResourceGraph::new(shop_schema()), context);
    let report = runner.run(&journey).expect("run succeeds");
    assert!(report.passed(), "issues: {:?}", report.issues);
    assert!(runner.graph().exists("user", "u1"));
}

#[test]
fn dangling_branch_reference_is_never_scheduled() {
    let result = Journey::builder("broken")
        .step("would run", |_| {
            panic!("steps must not execute for an invalid journey")
        })
        .branch("b", "never_declared", |b| b.path("p", |p| p.step("s", |_| Ok(()))))
        .build();
    assert!(matches!(
        result,
        Err(ViajarError::DanglingCheckpoint { .. })
    ));
}

fn crud_actions() -> Vec<Box<dyn Action>> {
    vec![
        Box::new(SimpleAction::new("create_user", Vec::<String>::new())),
        Box::new(SimpleAction::new("place_order", vec!["user"])),
        Box::new(SimpleAction::new("delete_user", vec!["user"])),
    ]
}

fn apply_crud(action: &dyn Action, graph: &mut ResourceGraph) -> ViajarResult<()> {
    match action.name() {
        "create_user" => {
            let id = format!("u{}", graph.tracked_count());
            graph.create("user", &id, None, None)?;
            Ok(())
        }
        "place_order" => {
            let user = graph.get_all("user")[0].id.clone();
            let id = format!("o{}", graph.tracked_count());
            graph.create("order", &id, Some(&user), None)?;
            Ok(())
        }
        "delete_user" => {
            let user = graph.get_all("user")[0].id.clone();
            graph.destroy("user", &user)
        }
        other => Err(ViajarError::InvalidState {
            message: format!("unknown action {other}"),
        }),
    }
}

#[test]
fn bfs_and_mcts_explore_the_same_space() {
    init_tracing();
    let mut bfs = FrontierExplorer::bfs(StopCondition::max_steps(25));
    let mut graph = ResourceGraph::new(shop_schema());
    let bfs_report = run_exploration(&mut bfs, &mut graph, &crud_actions(), apply_crud);
    assert!(bfs_report.distinct_states > 1);

    let mut mcts = MctsExplorer::new(
        MctsConfig::default()
            .with_seed(Seed::from_u64(9))
            .with_stop(StopCondition::max_steps(25)),
    );
    let mut graph = ResourceGraph::new(shop_schema());
    let mcts_report = run_exploration(&mut mcts, &mut graph, &crud_actions(), apply_crud);
    assert!(mcts_report.distinct_states > 1);
    assert_eq!(mcts_report.steps_taken, 25);
}
