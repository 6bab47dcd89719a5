use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context as TaskContext, Poll, Waker};

use bytes::Bytes;
use flock::{
    Application, Context, Error, HandlerFunc, HttpError, MiddlewareFunc, Opaque, Request,
    ResponseWriter,
};
use http::{Method, StatusCode};
use http_body_util::Full;
use hyper::body::Body;

type Log = Arc<Mutex<Vec<String>>>;

fn request(method: Method, uri: &str) -> Request {
    Request::from(http::Request::builder().method(method).uri(uri).body(Bytes::new()).unwrap())
}

fn get(uri: &str) -> Request {
    request(Method::GET, uri)
}

fn body_of(resp: http::Response<Full<Bytes>>) -> (StatusCode, String) {
    let status = resp.status();
    let bytes = read_body(resp.into_body());
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

// `Full` yields its single frame on the first poll.
fn read_body(mut body: Full<Bytes>) -> Bytes {
    let mut cx = TaskContext::from_waker(Waker::noop());
    match Pin::new(&mut body).poll_frame(&mut cx) {
        Poll::Ready(Some(Ok(frame))) => frame.into_data().unwrap_or_default(),
        _ => Bytes::new(),
    }
}

fn hello(ctx: &mut Context) -> Result<(), Error> {
    ctx.text(StatusCode::OK, "hello");
    Ok(())
}

fn recording(log: &Log, name: &'static str) -> MiddlewareFunc {
    let log = Arc::clone(log);
    Arc::new(move |next: HandlerFunc| -> HandlerFunc {
        let log = Arc::clone(&log);
        Arc::new(move |ctx: &mut Context| -> Result<(), Error> {
            log.lock().unwrap().push(format!("{name}:pre"));
            let result = next(ctx);
            log.lock().unwrap().push(format!("{name}:post"));
            result
        })
    })
}

#[test]
fn middleware_wraps_in_registration_order() {
    let log: Log = Arc::default();
    let mut app = Application::new();
    app.use_middleware(recording(&log, "first")).unwrap()
        .use_middleware(recording(&log, "second")).unwrap()
        .use_middleware(recording(&log, "third")).unwrap();

    let seen = Arc::clone(&log);
    app.get("/", move |ctx: &mut Context| -> Result<(), Error> {
        seen.lock().unwrap().push("handler".to_owned());
        ctx.text(StatusCode::OK, "ok");
        Ok(())
    })
    .unwrap();

    let app = Arc::new(app);
    for round in 0..2 {
        log.lock().unwrap().clear();
        let (status, _) = body_of(app.dispatch(get("/")));
        assert_eq!(status, StatusCode::OK, "round {round}");
        assert_eq!(
            *log.lock().unwrap(),
            [
                "first:pre", "second:pre", "third:pre", "handler",
                "third:post", "second:post", "first:post",
            ],
        );
    }
}

#[test]
fn middleware_also_wraps_not_found() {
    let log: Log = Arc::default();
    let mut app = Application::new();
    app.use_middleware(recording(&log, "outer")).unwrap();
    let app = Arc::new(app);

    let (status, body) = body_of(app.dispatch(get("/nowhere")));
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, "404 page not found");
    assert_eq!(*log.lock().unwrap(), ["outer:pre", "outer:post"]);
}

#[test]
fn gate_middleware_short_circuits_and_error_handler_answers() {
    let handler_ran = Arc::new(Mutex::new(false));
    let mut app = Application::new();
    app.use_middleware(|ctx: &mut Context| -> Result<(), Error> {
        match ctx.req().header("authorization") {
            Some(_) => Ok(()),
            None => Err(HttpError::new(StatusCode::UNAUTHORIZED).into()),
        }
    })
    .unwrap();

    let ran = Arc::clone(&handler_ran);
    app.get("/secret", move |ctx: &mut Context| -> Result<(), Error> {
        *ran.lock().unwrap() = true;
        ctx.text(StatusCode::OK, "secret");
        Ok(())
    })
    .unwrap();
    let app = Arc::new(app);

    let (status, body) = body_of(app.dispatch(get("/secret")));
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, "Unauthorized");
    assert!(!*handler_ran.lock().unwrap());

    let authed = Request::from(
        http::Request::get("/secret").header("authorization", "Bearer t").body(Bytes::new()).unwrap(),
    );
    let (status, body) = body_of(app.dispatch(authed));
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "secret");
}

#[test]
fn generic_middleware_cannot_stop_the_chain() {
    let mut app = Application::new();
    app.use_middleware(|_: &flock::Request, w: &mut ResponseWriter| {
        w.headers_mut().insert("x-powered-by", "flock".parse().unwrap());
    })
    .unwrap();
    app.get("/", hello).unwrap();
    let app = Arc::new(app);

    let resp = app.dispatch(get("/"));
    assert_eq!(resp.headers()["x-powered-by"], "flock");
    let (status, body) = body_of(resp);
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "hello");
}

#[test]
fn gate_can_pass_values_to_handlers() {
    let mut app = Application::new();
    app.use_middleware(|ctx: &mut Context| -> Result<(), Error> {
        ctx.set("user", String::from("alice"));
        Ok(())
    })
    .unwrap();
    app.get("/me", |ctx: &mut Context| -> Result<(), Error> {
        let user = ctx.get::<String>("user").cloned().unwrap_or_default();
        ctx.text(StatusCode::OK, user);
        Ok(())
    })
    .unwrap();
    let app = Arc::new(app);

    assert_eq!(body_of(app.dispatch(get("/me"))).1, "alice");
}

#[test]
fn http_error_uses_reason_phrase_unless_message_given() {
    let mut app = Application::new();
    app.get("/plain", |_: &mut Context| -> Result<(), Error> {
        Err(HttpError::new(StatusCode::NOT_FOUND).into())
    })
    .unwrap();
    app.get("/custom", |_: &mut Context| -> Result<(), Error> {
        Err(HttpError::new(StatusCode::NOT_FOUND).with_message("no such user").into())
    })
    .unwrap();
    let app = Arc::new(app);

    assert_eq!(body_of(app.dispatch(get("/plain"))), (StatusCode::NOT_FOUND, "Not Found".to_owned()));
    assert_eq!(body_of(app.dispatch(get("/custom"))), (StatusCode::NOT_FOUND, "no such user".to_owned()));
}

#[test]
fn internal_errors_are_hidden_unless_debug() {
    fn leaky(_: &mut Context) -> Result<(), Error> {
        Err(Error::msg("connection refused: db-primary:5432"))
    }

    let mut app = Application::new();
    app.get("/", leaky).unwrap();
    let app = Arc::new(app);
    assert_eq!(
        body_of(app.dispatch(get("/"))),
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_owned()),
    );

    let mut app = Application::new();
    app.set_debug(true);
    app.get("/", leaky).unwrap();
    let app = Arc::new(app);
    assert_eq!(
        body_of(app.dispatch(get("/"))),
        (StatusCode::INTERNAL_SERVER_ERROR, "connection refused: db-primary:5432".to_owned()),
    );
}

#[test]
fn missing_route_without_custom_handler_is_default_404_and_releases_context() {
    let app = Arc::new(Application::new());
    let (status, body) = body_of(app.dispatch(get("/missing")));
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, "404 page not found");
    assert_eq!(app.pool().idle(), 1);
}

#[test]
fn custom_not_found_handler_is_used() {
    let mut app = Application::new();
    app.not_found(|ctx: &mut Context| -> Result<(), Error> {
        ctx.json(StatusCode::NOT_FOUND, r#"{"error":"not found"}"#);
        Ok(())
    })
    .unwrap();
    let app = Arc::new(app);

    let resp = app.dispatch(get("/missing"));
    assert_eq!(resp.headers()[http::header::CONTENT_TYPE], "application/json");
    assert_eq!(body_of(resp), (StatusCode::NOT_FOUND, r#"{"error":"not found"}"#.to_owned()));
}

#[test]
fn wrong_method_falls_through_to_not_found() {
    let mut app = Application::new();
    app.post("/users", hello).unwrap();
    let app = Arc::new(app);
    assert_eq!(body_of(app.dispatch(get("/users"))).0, StatusCode::NOT_FOUND);
    assert_eq!(body_of(app.dispatch(request(Method::POST, "/users"))).0, StatusCode::OK);
}

#[test]
fn no_state_leaks_between_sequential_requests() {
    let mut app = Application::new();
    app.get("/users/{id}", |ctx: &mut Context| -> Result<(), Error> {
        assert!(ctx.get::<String>("previous").is_none(), "request store leaked");
        assert!(!ctx.resp().written(), "response state leaked");
        assert_eq!(ctx.params().len(), 1, "path params leaked");
        let id = ctx.param("id").unwrap_or_default().to_owned();
        ctx.set("previous", id.clone());
        ctx.resp_mut().headers_mut().insert("x-user", id.parse().unwrap());
        ctx.text(StatusCode::OK, id);
        Ok(())
    })
    .unwrap();
    app.get("/static", |ctx: &mut Context| -> Result<(), Error> {
        assert!(ctx.params().is_empty(), "path params leaked");
        assert!(ctx.resp().headers().is_empty(), "headers leaked");
        ctx.text(StatusCode::OK, "static");
        Ok(())
    })
    .unwrap();
    let app = Arc::new(app);

    for n in 0..5 {
        let (status, body) = body_of(app.dispatch(get(&format!("/users/{n}"))));
        assert_eq!((status, body), (StatusCode::OK, n.to_string()));
        let (status, body) = body_of(app.dispatch(get("/static")));
        assert_eq!((status, body), (StatusCode::OK, "static".to_owned()));
    }
    assert_eq!(app.pool().created(), 1);
}

#[test]
fn unknown_shapes_fail_at_registration() {
    let mut app = Application::new();

    let err = app.get("/", Opaque::new(0u32)).err().unwrap();
    assert!(matches!(err, Error::UnknownHandler { .. }));

    let err = app.use_middleware(Opaque::new(vec![1, 2, 3])).err().unwrap();
    assert!(matches!(err, Error::UnknownMiddleware { .. }));

    assert!(app.router().routes().is_empty());
    let app = Arc::new(app);
    assert_eq!(body_of(app.dispatch(get("/"))).0, StatusCode::NOT_FOUND);
}

#[test]
fn raw_handlers_are_served() {
    fn raw(req: &Request, w: &mut ResponseWriter) {
        w.write_header(StatusCode::ACCEPTED);
        w.write_bytes(req.path().as_bytes());
    }

    let mut app = Application::new();
    app.put("/raw", raw).unwrap();
    app.any("/opaque", Opaque::new(raw as flock::RawHandlerFn)).unwrap();
    let app = Arc::new(app);

    assert_eq!(body_of(app.dispatch(request(Method::PUT, "/raw"))), (StatusCode::ACCEPTED, "/raw".to_owned()));
    assert_eq!(
        body_of(app.dispatch(request(Method::PATCH, "/opaque"))),
        (StatusCode::ACCEPTED, "/opaque".to_owned()),
    );
}

#[test]
fn panics_become_500_and_context_is_released() {
    let mut app = Application::new();
    app.get("/boom", |_: &mut Context| -> Result<(), Error> { panic!("kaboom") }).unwrap();
    app.get("/", hello).unwrap();
    let app = Arc::new(app);

    assert_eq!(
        body_of(app.dispatch(get("/boom"))),
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_owned()),
    );
    assert_eq!(app.pool().idle(), 1);
    assert_eq!(body_of(app.dispatch(get("/"))).1, "hello");
}

#[test]
fn custom_error_handler_is_invoked_once() {
    let calls = Arc::new(Mutex::new(0));
    let counted = Arc::clone(&calls);

    let mut app = Application::new();
    app.set_error_handler(move |err: &Error, ctx: &mut Context| {
        *counted.lock().unwrap() += 1;
        ctx.text(StatusCode::IM_A_TEAPOT, format!("custom: {err}"));
    });
    app.get("/", |_: &mut Context| -> Result<(), Error> { Err(Error::msg("oops")) }).unwrap();
    let app = Arc::new(app);

    assert_eq!(body_of(app.dispatch(get("/"))), (StatusCode::IM_A_TEAPOT, "custom: oops".to_owned()));
    assert_eq!(*calls.lock().unwrap(), 1);
}

#[test]
fn handlers_reach_dependencies_through_context() {
    struct Greeter {
        greeting: &'static str,
    }

    let mut app = Application::new();
    app.set_di("greeter", Greeter { greeting: "howdy" });
    app.get("/greet", |ctx: &mut Context| -> Result<(), Error> {
        let greeter = ctx
            .di::<Greeter>("greeter")
            .ok_or_else(|| Error::msg("greeter not registered"))?;
        ctx.text(StatusCode::OK, greeter.greeting);
        Ok(())
    })
    .unwrap();
    let app = Arc::new(app);

    assert!(app.get_di("greeter").is_some());
    assert_eq!(body_of(app.dispatch(get("/greet"))).1, "howdy");
}

#[test]
fn concurrent_dispatches_do_not_share_contexts() {
    let mut app = Application::new();
    app.get("/echo/{n}", |ctx: &mut Context| -> Result<(), Error> {
        let n = ctx.param("n").unwrap_or_default().to_owned();
        ctx.set("n", n.clone());
        std::thread::yield_now();
        let seen = ctx.get::<String>("n").cloned().unwrap_or_default();
        ctx.text(StatusCode::OK, seen);
        Ok(())
    })
    .unwrap();
    let app = Arc::new(app);

    let workers: Vec<_> = (0..8)
        .map(|t| {
            let app = Arc::clone(&app);
            std::thread::spawn(move || {
                for i in 0..50 {
                    let n = format!("{t}-{i}");
                    let (_, body) = body_of(app.dispatch(get(&format!("/echo/{n}"))));
                    assert_eq!(body, n);
                }
            })
        })
        .collect();
    for w in workers {
        w.join().unwrap();
    }
    assert!(app.pool().created() <= 8);
}
