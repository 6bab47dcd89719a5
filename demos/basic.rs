//! Minimal flock example: a gate, a generic middleware, JSON endpoints and health checks.
//!
//! Run with:
//!   RUST_LOG=info FLOCK_DEBUG=1 cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/users/42
//!   curl -X POST http://localhost:3000/users -H 'x-api-key: secret' -d '{"name":"alice"}'
//!   curl -X POST http://localhost:3000/users -d '{"name":"alice"}'   # 401
//!   curl http://localhost:3000/healthz

use flock::{Application, Context, Error, HttpError, Request, ResponseWriter, Server, health};
use http::StatusCode;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt::init();

    let mut app = Application::classic();
    app.set_di("api_key", String::from("secret"));

    app.use_middleware(powered_by)?
        .get("/users/{id}", get_user)?
        .post("/users", create_user)?
        .delete("/users/{id}", delete_user)?
        .get("/healthz", health::liveness)?
        .get("/readyz", health::readiness)?;

    Server::bind("0.0.0.0:3000")?.serve(app).await
}

// Generic middleware: runs before every handler, cannot stop the chain.
fn powered_by(_req: &Request, w: &mut ResponseWriter) {
    w.headers_mut().insert("x-powered-by", http::HeaderValue::from_static("flock"));
}

// Called by the write endpoints before doing anything.
fn require_api_key(ctx: &Context) -> Result<(), Error> {
    let expected = ctx.di::<String>("api_key");
    match (ctx.req().header("x-api-key"), expected.as_deref()) {
        (Some(given), Some(expected)) if given == expected.as_str() => Ok(()),
        _ => Err(HttpError::new(StatusCode::UNAUTHORIZED).into()),
    }
}

// GET /users/{id}
fn get_user(ctx: &mut Context) -> Result<(), Error> {
    let id = ctx.param("id").unwrap_or("unknown").to_owned();
    ctx.json(StatusCode::OK, format!(r#"{{"id":"{id}","name":"alice"}}"#));
    Ok(())
}

// POST /users
fn create_user(ctx: &mut Context) -> Result<(), Error> {
    require_api_key(ctx)?;
    if ctx.req().body().is_empty() {
        return Err(HttpError::new(StatusCode::BAD_REQUEST).with_message("missing body").into());
    }
    ctx.resp_mut()
        .headers_mut()
        .insert(http::header::LOCATION, http::HeaderValue::from_static("/users/99"));
    ctx.json(StatusCode::CREATED, r#"{"id":"99","name":"new_user"}"#);
    Ok(())
}

// DELETE /users/{id} → 204 No Content
fn delete_user(ctx: &mut Context) -> Result<(), Error> {
    require_api_key(ctx)?;
    ctx.status(StatusCode::NO_CONTENT);
    Ok(())
}
