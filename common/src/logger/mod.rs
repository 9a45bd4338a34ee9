//! Process-wide tracing setup plus the span helpers every analysis run uses.

mod init;
mod trace_id;

use std::future::Future;
use std::time::{Duration, Instant};

use tracing::{Span, field};

pub use init::init_logger;
pub use trace_id::TraceId;

/// Root span for one analysis run or one collector session.
pub fn root_span(name: &'static str, trace_id: &TraceId) -> Span {
    tracing::info_span!(
        "root",
        name = %name,
        trace_id = %trace_id,
        asset = field::Empty,
        attempt = field::Empty
    )
}

/// Child span; inherits `trace_id` from the enclosing root span.
pub fn child_span(name: &'static str) -> Span {
    tracing::info_span!("child", name = %name, asset = field::Empty, attempt = field::Empty)
}

/// Records the asset and/or attempt number on the current span.
pub fn annotate_span(asset: Option<&str>, attempt: Option<u32>) {
    let span = Span::current();
    if let Some(asset) = asset {
        span.record("asset", field::display(asset));
    }
    if let Some(attempt) = attempt {
        span.record("attempt", attempt);
    }
}

pub async fn warn_if_slow<F, T>(label: &'static str, max: Duration, fut: F) -> T
where
    F: Future<Output = T>,
{
    let start = Instant::now();
    let out = fut.await;
    let elapsed = start.elapsed();
    if elapsed > max {
        tracing::warn!(
            target: "performance",
            label = label,
            elapsed_ms = elapsed.as_millis() as u64,
            "slow operation detected"
        );
    }
    out
}
