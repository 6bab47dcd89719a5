//! Built-in Kubernetes health-check handlers.
//!
//! | Probe | Path | Question |
//! |---|---|---|
//! | **Liveness** | `/healthz` | Is the process alive? Failure → restart. |
//! | **Readiness** | `/readyz` | Can the pod serve traffic? Failure → pulled from load-balancer. |
//!
//! ```rust
//! use flock::{Application, health};
//!
//! let mut app = Application::new();
//! app.get("/healthz", health::liveness)?
//!    .get("/readyz", health::readiness)?;
//! # Ok::<(), flock::Error>(())
//! ```
//!
//! Replace `readiness` with your own handler to gate on dependency availability;
//! returning an [`HttpError`](crate::HttpError) with `503` is enough.

use http::StatusCode;

use crate::{Context, Error};

/// Always `200 OK` with body `"ok"`.
pub fn liveness(ctx: &mut Context) -> Result<(), Error> {
    ctx.text(StatusCode::OK, "ok");
    Ok(())
}

/// `200 OK` with body `"ready"`.
pub fn readiness(ctx: &mut Context) -> Result<(), Error> {
    ctx.text(StatusCode::OK, "ready");
    Ok(())
}
