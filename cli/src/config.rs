use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use advisor::backend::{BackendConfig, Provider};
use advisor::{AnalysisConfig, ConfidenceWeights, RetryPolicy, SamplingParams, WindowSettings};
use corelib::{MenuError, PlaybookMenu, RiskContext};
use engine::{EngineConfig, LevelConfig, VolatilityConfig};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{key}: cannot parse {value:?}")]
    Invalid { key: String, value: String },

    #[error("ASSETS must name at least one asset")]
    NoAssets,

    #[error("PLAYBOOK_MENU: {0}")]
    Menu(#[from] MenuError),

    #[error("engine settings: {0}")]
    Engine(#[from] engine::ConfigError),

    #[error("{0}")]
    Backend(#[from] advisor::BackendError),

    #[error("leverage bounds must satisfy 1 <= MIN_LEVERAGE ({0}) <= MAX_LEVERAGE ({1})")]
    Leverage(u32, u32),

    #[error("{0} must be greater than zero")]
    Zero(String),

    #[error("CONFIDENCE_WEIGHTS: {0}")]
    Weights(#[from] advisor::WeightsError),
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Tracked assets, in the order they appear in the Market State.
    pub assets: Vec<String>,

    /// SQLite connection string for the snapshot log.
    pub database_url: String,

    // =========================
    // Collector
    // =========================
    pub poll_interval: Duration,
    /// Ladder levels kept per side.
    pub book_depth: usize,
    pub hl_info_url: String,

    // =========================
    // Analysis
    // =========================
    pub windows: WindowSettings,
    pub engine: EngineConfig,
    pub menu: PlaybookMenu,
    pub risk: RiskContext,
    pub sampling: SamplingParams,
    pub retry: RetryPolicy,
    pub confidence_weights: ConfidenceWeights,
    pub backend: BackendConfig,
    pub analysis_log: Option<PathBuf>,

    pub log_json: bool,
}

impl AppConfig {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup. Unset or blank keys
    /// take their defaults; set keys must parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Lookup(&lookup);

        let assets: Vec<String> = env
            .raw("ASSETS")
            .unwrap_or_else(|| "BTC,ETH".to_string())
            .split(',')
            .map(|s| s.trim().to_ascii_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        if assets.is_empty() {
            return Err(ConfigError::NoAssets);
        }

        let mut per_asset = HashMap::new();
        for asset in &assets {
            let key = format!("WINDOW_SNAPSHOTS_{asset}");
            if let Some(n) = env.opt::<usize>(&key)? {
                per_asset.insert(asset.clone(), nonzero(&key, n)?);
            }
        }
        let windows = WindowSettings {
            snapshots: env.positive("WINDOW_SNAPSHOTS", 60)?,
            per_asset,
            minutes: env.get("WINDOW_MINUTES", 90)?,
        };

        let levels = LevelConfig::default();
        let vol = VolatilityConfig::default();
        let engine = EngineConfig {
            levels: LevelConfig {
                cluster_pct: env.get("LEVEL_CLUSTER_PCT", levels.cluster_pct)?,
                recency_decay: env.get("LEVEL_RECENCY_DECAY", levels.recency_decay)?,
                top_k: env.get("LEVEL_TOP_K", levels.top_k)?,
                min_strength: env.get("LEVEL_MIN_STRENGTH", levels.min_strength)?,
                single_snapshot_floor: env.get("LEVEL_SINGLE_SNAPSHOT_FLOOR", levels.single_snapshot_floor)?,
            },
            volatility: VolatilityConfig {
                short_lookback: env.get("VOL_SHORT_LOOKBACK", vol.short_lookback)?,
                periods_per_year: env.get("VOL_PERIODS_PER_YEAR", vol.periods_per_year)?,
                compressed_below: env.get("VOL_COMPRESSED_BELOW", vol.compressed_below)?,
                expanding_above: env.get("VOL_EXPANDING_ABOVE", vol.expanding_above)?,
            },
        };
        engine.validate()?;

        let menu = match env.raw("PLAYBOOK_MENU") {
            Some(tags) => PlaybookMenu::from_tags(tags.split(',').map(str::trim).filter(|t| !t.is_empty()))?,
            None => PlaybookMenu::default(),
        };

        let min_leverage: u32 = env.get("MIN_LEVERAGE", 1)?;
        let max_leverage: u32 = env.get("MAX_LEVERAGE", 6)?;
        if min_leverage == 0 || min_leverage > max_leverage {
            return Err(ConfigError::Leverage(min_leverage, max_leverage));
        }
        let risk = RiskContext::from_percentages(
            env.get("EQUITY_USD", 10_000.0)?,
            env.get("MAX_RISK_PER_TRADE_PCT", 1.0)?,
            env.get("MAX_TOTAL_RISK_PCT", 2.0)?,
            min_leverage,
            max_leverage,
        );

        let sampling = SamplingParams {
            temperature: env.get("LLM_TEMPERATURE", 0.1)?,
            max_tokens: env.get("LLM_MAX_TOKENS", 4_000)?,
        };

        let call_timeout = Duration::from_secs(env.positive("LLM_TIMEOUT_SECONDS", 60)?);
        let retry = RetryPolicy {
            retries: env.get("LLM_RETRIES", 2)?,
            call_timeout,
            temperature_step: env.get("LLM_TEMPERATURE_STEP", 0.1)?,
        };

        let confidence_weights = match env.raw("CONFIDENCE_WEIGHTS") {
            Some(list) => list.parse::<ConfidenceWeights>()?,
            None => ConfidenceWeights::default(),
        };

        let provider = Provider::from_str(&env.raw("LLM_PROVIDER").unwrap_or_else(|| "openai".to_string()))?;
        let (key_var, default_model) = match provider {
            Provider::OpenAi => ("OPENAI_API_KEY", "gpt-4o-mini"),
            Provider::Anthropic => ("ANTHROPIC_API_KEY", "claude-3-5-sonnet-latest"),
        };
        let backend = BackendConfig {
            provider,
            model: env.raw("LLM_MODEL").unwrap_or_else(|| default_model.to_string()),
            api_key: env.raw(key_var),
            base_url: env.raw("LLM_BASE_URL"),
            timeout: call_timeout,
        };

        let log_json = match env.raw("LOG_FORMAT") {
            None => false,
            Some(f) if f.eq_ignore_ascii_case("pretty") => false,
            Some(f) if f.eq_ignore_ascii_case("json") => true,
            Some(f) => return Err(invalid("LOG_FORMAT", &f)),
        };

        Ok(Self {
            assets,
            database_url: env
                .raw("DATABASE_URL")
                .unwrap_or_else(|| "sqlite://data/snapshots.db".to_string()),
            poll_interval: Duration::from_secs(env.positive("POLL_INTERVAL_SECONDS", 60)?),
            book_depth: env.positive("BOOK_DEPTH", 20)?,
            hl_info_url: env
                .raw("HL_INFO_URL")
                .unwrap_or_else(|| market::hyperliquid::DEFAULT_INFO_URL.to_string()),
            windows,
            engine,
            menu,
            risk,
            sampling,
            retry,
            confidence_weights,
            backend,
            analysis_log: env.raw("ANALYSIS_LOG").map(PathBuf::from),
            log_json,
        })
    }

    pub fn analysis(&self) -> AnalysisConfig {
        AnalysisConfig {
            assets: self.assets.clone(),
            windows: self.windows.clone(),
            engine: self.engine,
            risk: self.risk,
            menu: self.menu.clone(),
            sampling: self.sampling,
            retry: self.retry,
            confidence_weights: self.confidence_weights,
            analysis_log: self.analysis_log.clone(),
        }
    }
}

struct Lookup<'a, F>(&'a F);

impl<F> Lookup<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn raw(&self, key: &str) -> Option<String> {
        (self.0)(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
    }

    fn opt<T: FromStr>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        self.raw(key)
            .map(|v| v.parse::<T>().map_err(|_| invalid(key, &v)))
            .transpose()
    }

    fn get<T: FromStr>(&self, key: &str, default: T) -> Result<T, ConfigError> {
        Ok(self.opt(key)?.unwrap_or(default))
    }

    fn positive<T: FromStr + Default + PartialEq>(&self, key: &str, default: T) -> Result<T, ConfigError> {
        nonzero(key, self.get(key, default)?)
    }
}

fn nonzero<T: Default + PartialEq>(key: &str, value: T) -> Result<T, ConfigError> {
    if value == T::default() {
        Err(ConfigError::Zero(key.to_string()))
    } else {
        Ok(value)
    }
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_without_any_keys() {
        let cfg = from_pairs(&[]).unwrap();

        assert_eq!(cfg.assets, vec!["BTC", "ETH"]);
        assert_eq!(cfg.database_url, "sqlite://data/snapshots.db");
        assert_eq!(cfg.poll_interval, Duration::from_secs(60));
        assert_eq!(cfg.book_depth, 20);
        assert_eq!(cfg.hl_info_url, "https://api.hyperliquid.xyz/info");
        assert_eq!(cfg.windows, WindowSettings::default());
        assert_eq!(cfg.engine, EngineConfig::default());
        assert_eq!(cfg.menu, PlaybookMenu::default());
        assert_eq!(cfg.retry.retries, 2);
        assert_eq!(cfg.retry.call_timeout, Duration::from_secs(60));
        assert_eq!(cfg.sampling.max_tokens, 4_000);
        assert_eq!(cfg.backend.provider, Provider::OpenAi);
        assert_eq!(cfg.backend.model, "gpt-4o-mini");
        assert!(cfg.backend.api_key.is_none());
        assert_eq!(cfg.risk.max_loss_per_trade_usd, 100.0);
        assert_eq!(cfg.risk.max_total_risk_usd, 200.0);
        assert!(cfg.analysis_log.is_none());
        assert!(!cfg.log_json);
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = from_pairs(&[
            ("ASSETS", " sol, btc ,"),
            ("WINDOW_SNAPSHOTS", "30"),
            ("WINDOW_SNAPSHOTS_SOL", "45"),
            ("LEVEL_TOP_K", "5"),
            ("VOL_SHORT_LOOKBACK", "4"),
            ("LLM_PROVIDER", "Anthropic"),
            ("ANTHROPIC_API_KEY", "ak"),
            ("OPENAI_API_KEY", "ignored"),
            ("LLM_RETRIES", "0"),
            ("PLAYBOOK_MENU", "breakout_long, range_fade"),
            ("ANALYSIS_LOG", "/tmp/a.jsonl"),
            ("LOG_FORMAT", "JSON"),
        ])
        .unwrap();

        assert_eq!(cfg.assets, vec!["SOL", "BTC"]);
        assert_eq!(cfg.windows.spec_for("SOL").max_snapshots, 45);
        assert_eq!(cfg.windows.spec_for("BTC").max_snapshots, 30);
        assert_eq!(cfg.engine.levels.top_k, 5);
        assert_eq!(cfg.engine.volatility.short_lookback, 4);
        assert_eq!(cfg.backend.provider, Provider::Anthropic);
        assert_eq!(cfg.backend.api_key.as_deref(), Some("ak"));
        assert_eq!(cfg.retry.max_attempts(), 1);
        assert_eq!(cfg.menu.tags().collect::<Vec<_>>(), vec!["breakout_long", "range_fade"]);
        assert_eq!(cfg.analysis_log, Some(PathBuf::from("/tmp/a.jsonl")));
        assert!(cfg.log_json);
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let cfg = from_pairs(&[("BOOK_DEPTH", "  "), ("LLM_MODEL", "")]).unwrap();
        assert_eq!(cfg.book_depth, 20);
        assert_eq!(cfg.backend.model, "gpt-4o-mini");
    }

    #[test]
    fn unparsable_values_name_the_key() {
        let err = from_pairs(&[("POLL_INTERVAL_SECONDS", "soon")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == "POLL_INTERVAL_SECONDS"));
    }

    #[test]
    fn invalid_settings_are_rejected() {
        assert!(matches!(from_pairs(&[("ASSETS", " , ")]), Err(ConfigError::NoAssets)));
        assert!(matches!(
            from_pairs(&[("LEVEL_RECENCY_DECAY", "1.5")]),
            Err(ConfigError::Engine(_))
        ));
        assert!(matches!(
            from_pairs(&[("MIN_LEVERAGE", "8")]),
            Err(ConfigError::Leverage(8, 6))
        ));
        assert!(matches!(
            from_pairs(&[("PLAYBOOK_MENU", "a,a")]),
            Err(ConfigError::Menu(MenuError::Duplicate(_)))
        ));
        assert!(matches!(from_pairs(&[("LLM_PROVIDER", "mystery")]), Err(ConfigError::Backend(_))));
        assert!(matches!(from_pairs(&[("LOG_FORMAT", "xml")]), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn zero_counts_and_durations_are_rejected() {
        for key in [
            "POLL_INTERVAL_SECONDS",
            "LLM_TIMEOUT_SECONDS",
            "WINDOW_SNAPSHOTS",
            "BOOK_DEPTH",
            "WINDOW_SNAPSHOTS_BTC",
        ] {
            let err = from_pairs(&[(key, "0")]).unwrap_err();
            assert!(matches!(err, ConfigError::Zero(ref k) if k == key), "{key}: {err}");
        }
        assert!(from_pairs(&[("POLL_INTERVAL_SECONDS", "1"), ("BOOK_DEPTH", "1")]).is_ok());
    }

    #[test]
    fn confidence_weights_are_configurable() {
        let cfg = from_pairs(&[]).unwrap();
        assert_eq!(cfg.confidence_weights, ConfidenceWeights::default());
        assert_eq!(cfg.analysis().confidence_weights, ConfidenceWeights::default());

        let cfg = from_pairs(&[("CONFIDENCE_WEIGHTS", "1,1,1,1,1,1,1,1,1,1")]).unwrap();
        assert_eq!(cfg.confidence_weights, ConfidenceWeights::new([1.0; 10]).unwrap());

        assert!(matches!(
            from_pairs(&[("CONFIDENCE_WEIGHTS", "2,1")]),
            Err(ConfigError::Weights(advisor::WeightsError::Count(2)))
        ));
    }
}
