//! Playbook menu: the fixed, ordered set of setup archetypes the model may use.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum MenuError {
    #[error("playbook menu is empty")]
    Empty,

    #[error("duplicate playbook tag: {0}")]
    Duplicate(String),

    #[error("invalid playbook tag: {0:?}")]
    InvalidTag(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playbook {
    pub tag: String,
    pub description: String,
}

/// Ordered set of allowed tags. Order is preserved for prompt rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybookMenu {
    entries: Vec<Playbook>,
}

impl PlaybookMenu {
    pub fn new(entries: Vec<Playbook>) -> Result<Self, MenuError> {
        if entries.is_empty() {
            return Err(MenuError::Empty);
        }
        for (i, p) in entries.iter().enumerate() {
            let tag = p.tag.as_str();
            if tag.is_empty() || tag.chars().any(char::is_whitespace) {
                return Err(MenuError::InvalidTag(p.tag.clone()));
            }
            if entries[..i].iter().any(|q| q.tag == tag) {
                return Err(MenuError::Duplicate(p.tag.clone()));
            }
        }
        Ok(Self { entries })
    }

    /// Builds a menu from bare tags, using the stock description where one exists.
    pub fn from_tags<I, S>(tags: I) -> Result<Self, MenuError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entries = tags
            .into_iter()
            .map(|t| {
                let tag = t.into();
                let description = stock_description(&tag).unwrap_or_default().to_string();
                Playbook { tag, description }
            })
            .collect();
        Self::new(entries)
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.entries.iter().any(|p| p.tag == tag)
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|p| p.tag.as_str())
    }

    pub fn entries(&self) -> &[Playbook] {
        &self.entries
    }
}

impl Default for PlaybookMenu {
    fn default() -> Self {
        Self {
            entries: DEFAULT_TAGS
                .iter()
                .map(|tag| Playbook {
                    tag: (*tag).to_string(),
                    description: stock_description(tag).unwrap_or_default().to_string(),
                })
                .collect(),
        }
    }
}

pub const DEFAULT_TAGS: [&str; 4] = [
    "breakout_long",
    "breakdown_short",
    "failed_breakdown_reclaim",
    "mean_reversion",
];

fn stock_description(tag: &str) -> Option<&'static str> {
    match tag {
        "breakout_long" => Some("price accepts above a resistance level and holds the retest"),
        "breakdown_short" => Some("price accepts below a support level and fails the retest"),
        "failed_breakdown_reclaim" => {
            Some("sweep below support followed by a reclaim and acceptance back above it")
        }
        "mean_reversion" => {
            Some("fade back toward value; only when volatility is compressed or normal")
        }
        _ => None,
    }
}
