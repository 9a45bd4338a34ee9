use chrono::{DateTime, TimeZone, Utc};
use corelib::{BookLevel, CandleSet, LastTrade, PlaybookMenu, RiskContext, Snapshot};
use serde_json::json;
use store::{MemorySnapshotStore, SnapshotStore};
use tokio::sync::watch;

use advisor::{
    AnalysisConfig, AnalysisMode, AnalysisOutcome, AnalysisRun, ConfidenceWeights, RetryPolicy, SamplingParams,
    WindowSettings,
};
use engine::EngineConfig;

use scripted_backend::{ScriptedBackend, breakdown_for};

///
/// End-to-end analysis runs over an in-memory snapshot store
///
///   · no usable data never reaches the model
///   · dry-run output is byte-identical to the document in the prompt
///   · accepted runs are ranked, sized and logged
///   · exhausted retries surface as unavailable
///
const T0: u64 = 1_700_000_000_000;

fn as_of() -> DateTime<Utc> {
    Utc.timestamp_millis_opt(T0 as i64 + 10 * 60_000).unwrap()
}

fn snapshot(asset: &str, i: u64, mid: f64) -> Snapshot {
    Snapshot {
        ts_ms: T0 + i * 60_000,
        asset: asset.into(),
        best_bid: BookLevel::new(mid - 0.5, 2.0),
        best_ask: BookLevel::new(mid + 0.5, 2.0),
        bids: vec![BookLevel::new(mid - 0.5, 2.0), BookLevel::new(mid - 3.0, 8.0)],
        asks: vec![BookLevel::new(mid + 0.5, 2.0), BookLevel::new(mid + 3.0, 5.0)],
        last_trade: Some(LastTrade {
            price: mid + 0.5,
            size: 0.1,
            side: None,
        }),
        cumulative_volume: 100.0 + i as f64,
        mark_price: Some(mid),
        funding_rate: Some(0.0001),
        open_interest: Some(5_000.0 + i as f64),
        prev_day_price: None,
        candles: CandleSet::default(),
    }
}

fn config(log: Option<std::path::PathBuf>) -> AnalysisConfig {
    AnalysisConfig {
        assets: vec!["BTC".into(), "ETH".into()],
        windows: WindowSettings::default(),
        engine: EngineConfig::default(),
        risk: RiskContext::from_percentages(10_000.0, 1.0, 2.0, 1, 6),
        menu: PlaybookMenu::default(),
        sampling: SamplingParams::default(),
        retry: RetryPolicy::default(),
        confidence_weights: ConfidenceWeights::default(),
        analysis_log: log,
    }
}

async fn seeded_store() -> anyhow::Result<MemorySnapshotStore> {
    let store = MemorySnapshotStore::new();
    for i in 0..8 {
        store.append(&snapshot("BTC", i, 100.0 + (i % 3) as f64)).await?;
    }
    // ETH has a single snapshot and stays insufficient
    store.append(&snapshot("ETH", 0, 10.0)).await?;
    Ok(store)
}

fn no_abort() -> watch::Receiver<bool> {
    watch::channel(false).1
}

#[tokio::test]
async fn test_no_usable_data_never_calls_backend() -> anyhow::Result<()> {
    let store = MemorySnapshotStore::new();
    store.append(&snapshot("BTC", 0, 100.0)).await?;
    let backend = ScriptedBackend::texts(["{\"setups\": []}"]);

    let cfg = config(None);
    let outcome = AnalysisRun::new(&cfg, as_of())
        .execute(&store, &backend, AnalysisMode::Full, no_abort())
        .await?;

    let AnalysisOutcome::NoUsableData(insufficient) = outcome else {
        panic!("expected no usable data");
    };
    assert_eq!(insufficient.len(), 2);
    assert_eq!(backend.calls().await, 0);
    Ok(())
}

#[tokio::test]
async fn test_dry_run_matches_prompt_document() -> anyhow::Result<()> {
    let store = seeded_store().await?;
    let cfg = config(None);
    let idle = ScriptedBackend::default();

    let first = AnalysisRun::new(&cfg, as_of())
        .execute(&store, &idle, AnalysisMode::DryRun, no_abort())
        .await?;
    let second = AnalysisRun::new(&cfg, as_of())
        .execute(&store, &idle, AnalysisMode::DryRun, no_abort())
        .await?;
    let (AnalysisOutcome::DryRun(a), AnalysisOutcome::DryRun(b)) = (first, second) else {
        panic!("expected dry runs");
    };
    let document = a.to_canonical_json()?;
    assert_eq!(document, b.to_canonical_json()?);
    assert_eq!(idle.calls().await, 0);
    assert_eq!(a.insufficient_data[0].asset, "ETH");

    let backend = ScriptedBackend::texts(["not json"; 3]);
    AnalysisRun::new(&cfg, as_of())
        .execute(&store, &backend, AnalysisMode::Full, no_abort())
        .await?;
    let sent = backend.requests.lock().await.clone();
    assert!(sent[0].user.contains(&document));
    Ok(())
}

#[tokio::test]
async fn test_accepted_run_is_ranked_sized_and_logged() -> anyhow::Result<()> {
    let store = seeded_store().await?;
    let log = std::env::temp_dir().join(format!("analysis-{}.jsonl", uuid_like()));
    let cfg = config(Some(log.clone()));

    let reply = json!({
        "setups": [
            {
                "asset": "BTC", "direction": "long",
                "entry": { "price": 101.0, "condition": "hold 101" },
                "stop": 99.0, "take_profits": [105.0],
                "playbook": "breakout_long", "confidence": 60,
                "confidence_breakdown": breakdown_for(60), "rationale": "a"
            },
            {
                "asset": "BTC", "direction": "short",
                "entry": { "price": 100.0, "condition": "lose 100" },
                "stop": 102.0, "take_profits": [95.0],
                "playbook": "breakdown_short", "confidence": 75,
                "confidence_breakdown": breakdown_for(75), "rationale": "b"
            },
            {
                "asset": "ETH", "direction": "long",
                "entry": { "price": 10.0, "condition": "x" },
                "stop": 9.5, "take_profits": [11.0],
                "playbook": "breakout_long", "confidence": 90,
                "confidence_breakdown": breakdown_for(90), "rationale": "no data"
            }
        ]
    });
    let backend = ScriptedBackend::texts([reply.to_string()]);

    let outcome = AnalysisRun::new(&cfg, as_of())
        .execute(&store, &backend, AnalysisMode::Full, no_abort())
        .await?;
    let AnalysisOutcome::Ranked(report) = outcome else {
        panic!("expected ranked result");
    };

    let confidences: Vec<u8> = report.ranked.setups.iter().map(|s| s.confidence).collect();
    assert_eq!(confidences, vec![75, 60]);
    assert_eq!(report.ranked.rejected, 1);
    assert_eq!(report.plans.len(), 2);
    let planned: f64 = report.plans.iter().map(|p| p.max_loss_usd).sum();
    assert!(planned <= 200.0 + 1e-9);

    let written = tokio::fs::read_to_string(&log).await?;
    assert_eq!(written.lines().count(), 1);
    assert!(written.contains(&report.trace_id));
    tokio::fs::remove_file(&log).await?;
    Ok(())
}

#[tokio::test]
async fn test_exhausted_retries_are_unavailable() -> anyhow::Result<()> {
    let store = seeded_store().await?;
    let cfg = config(None);
    let backend = ScriptedBackend::texts(["{}", "{}", "{}", "{}"]);

    let outcome = AnalysisRun::new(&cfg, as_of())
        .execute(&store, &backend, AnalysisMode::Full, no_abort())
        .await?;
    assert!(matches!(outcome, AnalysisOutcome::Unavailable { attempts: 3, .. }));
    assert_eq!(backend.calls().await, 3);
    Ok(())
}

fn uuid_like() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default()
}
