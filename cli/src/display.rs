//! Plain-text rendering of command results for stdout.

use std::fmt::Write;

use advisor::AnalysisReport;
use corelib::{Direction, InsufficientAsset};

pub struct StoreStatus<'a> {
    pub database_url: &'a str,
    pub assets: &'a [String],
    pub count: u64,
    pub latest_ms: Option<u64>,
    pub now_ms: u64,
}

pub fn render_status(status: &StoreStatus<'_>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "database:   {}", status.database_url);
    let _ = writeln!(out, "assets:     {}", status.assets.join(", "));
    let _ = writeln!(out, "snapshots:  {}", status.count);
    match status.latest_ms {
        Some(ts) => {
            let age_s = status.now_ms.saturating_sub(ts) / 1_000;
            let _ = writeln!(out, "latest:     {} ({}s ago)", format_ts(ts), age_s);
        }
        None => {
            let _ = writeln!(out, "latest:     none");
        }
    }
    out
}

pub fn render_report(report: &AnalysisReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "run {} via {} ({} attempt{}), {} rejected",
        report.trace_id,
        report.backend,
        report.attempts,
        if report.attempts == 1 { "" } else { "s" },
        report.ranked.rejected
    );

    if report.ranked.setups.is_empty() {
        let _ = writeln!(out, "no setups");
    }

    for (rank, (setup, plan)) in report.ranked.setups.iter().zip(&report.plans).enumerate() {
        let side = match setup.direction {
            Direction::Long => "LONG",
            Direction::Short => "SHORT",
        };
        let targets: Vec<String> = setup.take_profits.iter().map(|tp| tp.to_string()).collect();
        let _ = writeln!(
            out,
            "#{} {} {} [{}] confidence {}",
            rank + 1,
            setup.asset,
            side,
            setup.playbook,
            setup.confidence
        );
        let _ = writeln!(
            out,
            "   entry {} ({}), stop {}, targets {}, r:r {:.2}",
            setup.entry.price,
            setup.entry.condition,
            setup.stop,
            targets.join(" / "),
            setup.risk_reward()
        );
        let _ = writeln!(
            out,
            "   risk ${:.2} ({:.2}%), notional ${:.2} at {}x, margin ${:.2}",
            plan.max_loss_usd, plan.risk_pct_equity, plan.notional_usd, plan.leverage, plan.margin_used_usd
        );
        if !setup.rationale.is_empty() {
            let _ = writeln!(out, "   {}", setup.rationale);
        }
    }

    render_insufficient_into(&mut out, &report.insufficient_data);
    out
}

pub fn render_insufficient(insufficient: &[InsufficientAsset]) -> String {
    let mut out = String::from("no usable data for any configured asset\n");
    render_insufficient_into(&mut out, insufficient);
    out
}

fn render_insufficient_into(out: &mut String, insufficient: &[InsufficientAsset]) {
    for a in insufficient {
        let _ = writeln!(out, "insufficient: {} ({} snapshots, {})", a.asset, a.snapshots, a.reason);
    }
}

fn format_ts(ts_ms: u64) -> String {
    chrono::DateTime::from_timestamp_millis(ts_ms as i64)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| ts_ms.to_string())
}
