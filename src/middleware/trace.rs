use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use crate::context::Context;
use crate::error::Error;
use crate::handler::HandlerFunc;

use super::MiddlewareFunc;

/// Emits one `info` event per request after the inner chain returns.
///
/// Fields: `method`, `path`, `status`, `size`, `latency_us`, `failed`. On the error
/// path `status` is whatever was committed before the failure; the final status is
/// chosen later by the error handler.
pub fn trace() -> MiddlewareFunc {
    Arc::new(|next: HandlerFunc| -> HandlerFunc {
        Arc::new(move |ctx: &mut Context| -> Result<(), Error> {
            let start = Instant::now();
            let result = next(ctx);
            info!(
                method = %ctx.req().method(),
                path = ctx.req().path(),
                status = ctx.resp().status().as_u16(),
                size = ctx.resp().size(),
                latency_us = start.elapsed().as_micros() as u64,
                failed = result.is_err(),
                "request"
            );
            result
        })
    })
}
