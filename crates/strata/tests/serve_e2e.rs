//! End-to-end tests: full request dispatch through routers, chains,
//! error handling, logging, and panic capture.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};
use http::{Method, StatusCode};
use strata::testing::{CapturedLog, ResponseRecorder};
use strata::{
    Env, Error, Failure, Hooks, PanicFailure, Params, PatternError, Request, Router, Rw, Stack,
};

/// A clock that advances a fixed amount per reading.
fn ticking_clock(start: DateTime<Utc>, step_ms: i64) -> strata::Clock {
    let state = Mutex::new(start);
    Arc::new(move || {
        let mut now = state.lock().unwrap();
        let current = *now;
        *now += chrono::Duration::milliseconds(step_ms);
        current
    })
}

fn test_env(captured: &CapturedLog) -> Arc<Env> {
    Arc::new(Env::default().with_log_sink(captured.sink()))
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct UserId(String);
impl strata::Injectable for UserId {}

#[derive(Clone, Debug, PartialEq, Eq)]
struct User {
    name: String,
}
impl strata::Injectable for User {}

trait UserDb: Send + Sync {
    fn lookup(&self, id: &UserId) -> Option<User>;
}

struct FixedDb;
impl UserDb for FixedDb {
    fn lookup(&self, id: &UserId) -> Option<User> {
        match id.0.as_str() {
            "bob" => Some(User {
                name: "Bob".to_string(),
            }),
            "alice" => Some(User {
                name: "Alice".to_string(),
            }),
            _ => None,
        }
    }
}

fn get_id_from_request(req: Request) -> Result<UserId, Error> {
    req.form_value("user")
        .map(UserId)
        .ok_or_else(|| Error::new(StatusCode::BAD_REQUEST, "Must specify user"))
}

fn lookup_user(db: Arc<dyn UserDb>, id: UserId) -> Result<User, Error> {
    db.lookup(&id).ok_or_else(|| {
        Error::new(StatusCode::UNAUTHORIZED, format!("Invalid id: {}", id.0))
            .log(format!("no user row for {:?}", id.0))
    })
}

fn write_json_user(rw: Rw, user: User) {
    rw.set_header("content-type", "application/json");
    let _ = rw.write_str(&format!(r#"{{"name":"{}"}}"#, user.name));
}

fn user_stack(env: Arc<Env>) -> Stack {
    Stack::the_usual(env)
        .provide_as::<dyn UserDb>(Arc::new(FixedDb))
        .then(get_id_from_request)
        .then(lookup_user)
        .then(write_json_user)
}

#[test]
fn happy_path_with_trait_object_db() {
    let captured = CapturedLog::new();
    let stack = user_stack(test_env(&captured));

    let recorder = ResponseRecorder::new();
    stack.serve(recorder.clone(), Request::get("/user?user=bob"));

    assert_eq!(recorder.status(), Some(StatusCode::OK));
    assert_eq!(recorder.body_string(), r#"{"name":"Bob"}"#);
    assert_eq!(recorder.header("content-type"), Some("application/json".to_string()));
}

#[test]
fn error_short_circuits_and_logs_internal_detail() {
    let captured = CapturedLog::new();
    let stack = user_stack(test_env(&captured));

    let recorder = ResponseRecorder::new();
    stack.serve(recorder.clone(), Request::get("/user?user=ghost"));

    assert_eq!(recorder.status(), Some(StatusCode::UNAUTHORIZED));
    assert_eq!(recorder.body_string(), "Invalid id: ghost\n");

    // write_json_user never ran, and the deferred log commit carries the
    // internal message.
    let entries = captured.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status_code, 401);
    assert!(entries[0].error.as_ref().unwrap().contains("no user row for \"ghost\""));
}

#[test]
fn deferred_handlers_run_in_reverse_registration_order() {
    fn say(s: &'static str) -> impl Fn(Rw) + Clone + Send + Sync + 'static {
        move |rw: Rw| {
            let _ = rw.write_str(s);
            let _ = rw.write_str(":");
        }
    }

    let stack = Stack::new(Env::shared())
        .then(say("a"))
        .then(say("b"))
        .defer(say("f"))
        .defer(say("e"))
        .then(say("c"))
        .defer(say("d"));

    let recorder = ResponseRecorder::new();
    stack.serve(recorder.clone(), Request::get("/"));
    assert_eq!(recorder.body_string(), "a:b:c:d:e:f:");
}

#[test]
fn panic_capture_preserves_middleware_stack_and_runs_defers() {
    fn a() -> String {
        "a".to_string()
    }
    fn b(s: String) -> (String, i64) {
        (s, 1)
    }
    fn c(_s: String, _n: i64) {}
    fn boom() {
        panic!("ahhhh");
    }

    let captured: Arc<Mutex<Option<Failure>>> = Arc::default();
    let capture = {
        let captured = captured.clone();
        move |failure: Failure| {
            *captured.lock().unwrap() = Some(failure);
        }
    };

    let cleanup_ran = Arc::new(Mutex::new(false));
    let cleanup = {
        let ran = cleanup_ran.clone();
        move |_s: String, _n: i64| {
            *ran.lock().unwrap() = true;
        }
    };

    let stack = Stack::new(Env::shared())
        .on_err(capture)
        .then(a)
        .then(b)
        .then(c)
        .defer(cleanup)
        .then(boom);

    stack.serve(ResponseRecorder::new(), Request::get("/"));

    let failure = captured.lock().unwrap().clone().expect("error handler ran");
    let panic_failure = failure.downcast_ref::<PanicFailure>().expect("panic failure");
    assert_eq!(panic_failure.value, "ahhhh");

    let names: Vec<&str> = panic_failure
        .middleware_stack
        .iter()
        .map(|s| s.name)
        .collect();
    assert!(names[0].contains("boom"));
    assert!(names[1].contains("::c"));
    assert!(names[2].contains("::b"));
    assert!(names[3].contains("::a"));
    assert_eq!(names.len(), 4, "the deferred step is not on the stack");

    assert!(*cleanup_ran.lock().unwrap(), "deferred cleanup still ran");
}

#[test]
fn router_priority_and_params() {
    let captured = CapturedLog::new();
    let mut router = Router::new(test_env(&captured));
    router.get("/a/b/c", |rw: Rw| {
        let _ = rw.write_str("first");
    });
    router.get("/a/:x/c", |rw: Rw, params: Params| {
        let _ = rw.write_str(&format!("second x={}", params.get("x").unwrap()));
    });
    router.get("/a/:m*", |rw: Rw, params: Params| {
        let _ = rw.write_str(&format!("third m={}", params.get("m").unwrap()));
    });

    let recorder = ResponseRecorder::new();
    router.serve(recorder.clone(), Request::get("/a/b/c"));
    assert_eq!(recorder.body_string(), "first");

    let recorder = ResponseRecorder::new();
    router.serve(recorder.clone(), Request::get("/a/z/c"));
    assert_eq!(recorder.body_string(), "second x=z");

    let recorder = ResponseRecorder::new();
    router.serve(recorder.clone(), Request::get("/a/z/d"));
    assert_eq!(recorder.body_string(), "third m=z/d");
}

#[test]
fn ambiguous_greedy_registration_is_rejected() {
    let mut router = Router::new(Env::shared());
    router.get("/b/:b*/x", |_rw: Rw| {});
    let err: PatternError = router
        .try_on(Method::GET, "/b/:a*/x", |_rw: Rw| {})
        .unwrap_err();
    assert!(err.to_string().contains("ambiguous"));
}

#[test]
fn full_router_scenario_with_db() {
    use parking_lot::RwLock;

    #[derive(Default)]
    struct MemDb {
        rows: RwLock<std::collections::HashMap<String, String>>,
    }

    let captured = CapturedLog::new();
    let mut router = Router::the_usual(test_env(&captured));

    let db = Arc::new(MemDb::default());
    db.rows.write().insert("1".to_string(), "bob".to_string());
    db.rows.write().insert("2".to_string(), "alice".to_string());
    router.provide(db);

    fn load_user(db: Arc<MemDb>, params: Params) -> Result<User, Error> {
        let id = params
            .get("user_id")
            .ok_or_else(|| Error::new(StatusCode::BAD_REQUEST, "Must specify user ID"))?;
        db.rows
            .read()
            .get(id)
            .map(|name| User { name: name.clone() })
            .ok_or_else(|| Error::new(StatusCode::NOT_FOUND, "No such user"))
    }

    router.get("/user/:user_id", (load_user, |rw: Rw, user: User| {
        let _ = rw.write_str(&format!("Hi user `{}`", user.name));
    }));
    router.post("/user/", (
        |req: Request| -> Result<(UserId, User), Error> {
            let id = req
                .form_value("uid")
                .ok_or_else(|| Error::new(StatusCode::BAD_REQUEST, "missing user id"))?;
            let name = req
                .form_value("name")
                .ok_or_else(|| Error::new(StatusCode::BAD_REQUEST, "missing user info"))?;
            Ok((UserId(id), User { name }))
        },
        |db: Arc<MemDb>, id: UserId, user: User| {
            db.rows.write().insert(id.0, user.name);
        },
        |rw: Rw, id: UserId, user: User| {
            let _ = rw.write_str(&format!("Made user `{}` = `{}`", id.0, user.name));
        },
    ));
    router.any("/user/:user_id/:cmd*", (load_user, |rw: Rw, req: Request, params: Params, user: User| {
        let _ = rw.write_str(&format!(
            "Doing `{}` ({}) to user `{}`",
            req.method(),
            params.get("cmd").unwrap(),
            user.name
        ));
    }));

    let recorder = ResponseRecorder::new();
    router.serve(recorder.clone(), Request::get("/user/1"));
    assert_eq!(recorder.status(), Some(StatusCode::OK));
    assert_eq!(recorder.body_string(), "Hi user `bob`");

    let recorder = ResponseRecorder::new();
    router.serve(recorder.clone(), Request::get("/user/3"));
    assert_eq!(recorder.status(), Some(StatusCode::NOT_FOUND));
    assert_eq!(recorder.body_string(), "No such user\n");

    let recorder = ResponseRecorder::new();
    router.serve(
        recorder.clone(),
        Request::builder()
            .method(Method::POST)
            .uri("/user/")
            .form("uid=3&name=sid")
            .build(),
    );
    assert_eq!(recorder.status(), Some(StatusCode::OK));
    assert_eq!(recorder.body_string(), "Made user `3` = `sid`");

    let recorder = ResponseRecorder::new();
    router.serve(recorder.clone(), Request::get("/user/3"));
    assert_eq!(recorder.body_string(), "Hi user `sid`");

    let recorder = ResponseRecorder::new();
    router.serve(
        recorder.clone(),
        Request::builder()
            .method(Method::DELETE)
            .uri("/user/3/boom")
            .build(),
    );
    assert_eq!(recorder.body_string(), "Doing `DELETE` (boom) to user `sid`");
}

#[test]
fn log_entries_reflect_clock_status_and_notes() {
    let captured = CapturedLog::new();
    let start = Utc.with_ymd_and_hms(2001, 2, 3, 4, 5, 6).unwrap();
    let env = Arc::new(
        Env::default()
            .with_log_sink(captured.sink())
            .with_clock(ticking_clock(start, 13)),
    );

    let stack = Stack::the_usual(env).then(|rw: Rw, log: strata::Log| {
        log.note("user", "bob");
        let _ = rw.write_str("hello");
    });

    stack.serve(
        ResponseRecorder::new(),
        Request::builder()
            .method(Method::GET)
            .uri("/greet")
            .remote_addr("4.5.6.7:123")
            .build(),
    );

    let entries = captured.entries();
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(entry.start, start);
    assert_eq!(entry.remote_ip, "4.5.6.7:123");
    assert_eq!(entry.method, Method::GET);
    assert_eq!(entry.request_uri, "/greet");
    assert_eq!(entry.status_code, 200);
    assert_eq!(entry.response_size, 5);
    assert_eq!(entry.elapsed, std::time::Duration::from_millis(13));
    assert_eq!(entry.notes.get("user").unwrap(), "bob");
    assert!(!entry.quiet);
}

#[test]
fn no_log_suppresses_entry_output() {
    let captured = CapturedLog::new();
    let stack = Stack::the_usual(test_env(&captured)).then(strata::no_log).then(|rw: Rw| {
        let _ = rw.write_str("quiet");
    });

    stack.serve(ResponseRecorder::new(), Request::get("/favicon.ico"));

    // The entry is still committed to the sink; the quiet flag tells the
    // default stderr sink to drop it.
    let entries = captured.entries();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].quiet);
}

#[test]
fn done_sentinel_aborts_without_error_response() {
    let captured = CapturedLog::new();
    let stack = Stack::the_usual(test_env(&captured))
        .then(|rw: Rw| -> Result<(), Error> {
            let _ = rw.write_str("partial");
            Err(Error::done())
        })
        .then(|rw: Rw| {
            let _ = rw.write_str("never");
        });

    let recorder = ResponseRecorder::new();
    stack.serve(recorder.clone(), Request::get("/"));

    assert_eq!(recorder.body_string(), "partial");
    assert!(captured.entries()[0].error.is_none());
}

#[test]
fn unhandled_failure_routes_to_env_hooks() {
    let seen: Arc<Mutex<usize>> = Arc::default();
    let count = seen.clone();
    let hooks = Hooks {
        on_unhandled: Arc::new(move |_| {
            *count.lock().unwrap() += 1;
        }),
        ..Hooks::logging()
    };
    let env = Arc::new(Env::default().with_hooks(Arc::new(hooks)));

    // A bare stack has no error handler.
    let stack = Stack::new(env).then(|| -> Result<(), Error> {
        Err(Error::new(StatusCode::IM_A_TEAPOT, "short and stout"))
    });
    stack.serve(ResponseRecorder::new(), Request::get("/"));

    assert_eq!(*seen.lock().unwrap(), 1);
}
