//! Describing a distributor so another process can rebuild it.
//!
//! Batch jobs receive the distributor through their job configuration, the
//! same way they receive the scan range. [`StrategyConfig`] is the portable
//! form; [`JobConf`] is the string property bag it travels in.
use keyspread_common::{SpreadError, SpreadResult};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::strategy::{DistributionStrategy, HashPrefix, KeyHasher, RoundRobinPrefix, Strategy};

pub const STRATEGY_KEY: &str = "keyspread.distributor.strategy";
pub const PARAMS_KEY: &str = "keyspread.distributor.params";

fn one_byte() -> usize {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum StrategyConfig {
    Hash {
        bucket_count: u32,
        #[serde(default = "one_byte")]
        prefix_width: usize,
        #[serde(default)]
        hasher: KeyHasher,
    },
    RoundRobin {
        bucket_count: u32,
        #[serde(default = "one_byte")]
        prefix_width: usize,
    },
}

impl StrategyConfig {
    pub fn name(&self) -> &'static str {
        match self {
            StrategyConfig::Hash { .. } => "hash",
            StrategyConfig::RoundRobin { .. } => "round_robin",
        }
    }

    pub fn to_params(&self) -> String {
        // a derived `Serialize` on plain fields cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn from_params(params: &str) -> SpreadResult<Self> {
        Ok(serde_json::from_str(params)?)
    }

    pub fn build(&self) -> SpreadResult<Strategy> {
        Ok(match *self {
            StrategyConfig::Hash {
                bucket_count,
                prefix_width,
                hasher,
            } => HashPrefix::with_layout(bucket_count, prefix_width, hasher)?.into(),
            StrategyConfig::RoundRobin {
                bucket_count,
                prefix_width,
            } => RoundRobinPrefix::with_width(bucket_count, prefix_width)?.into(),
        })
    }
}

impl From<&Strategy> for StrategyConfig {
    fn from(strategy: &Strategy) -> Self {
        match strategy {
            Strategy::Hash(h) => StrategyConfig::Hash {
                bucket_count: h.bucket_count(),
                prefix_width: h.prefix_width(),
                hasher: h.hasher(),
            },
            Strategy::RoundRobin(r) => StrategyConfig::RoundRobin {
                bucket_count: r.bucket_count(),
                prefix_width: r.prefix_width(),
            },
        }
    }
}

/// String properties handed to batch jobs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobConf {
    props: FxHashMap<String, String>,
}

impl JobConf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.props.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.props.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.props.len()
    }

    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }

    /// Store `config` under [`STRATEGY_KEY`] and [`PARAMS_KEY`].
    pub fn add_strategy(&mut self, config: &StrategyConfig) {
        self.set(STRATEGY_KEY, config.name());
        self.set(PARAMS_KEY, config.to_params());
    }

    pub fn strategy(&self) -> SpreadResult<StrategyConfig> {
        let name = self.get(STRATEGY_KEY).ok_or_else(|| missing(STRATEGY_KEY))?;
        let params = self.get(PARAMS_KEY).ok_or_else(|| missing(PARAMS_KEY))?;
        let config = StrategyConfig::from_params(params)?;
        if config.name() != name {
            return Err(SpreadError::Config(
                format!(
                    "{} says \"{}\" but the params describe \"{}\"",
                    STRATEGY_KEY,
                    name,
                    config.name()
                )
                .into_boxed_str(),
            ));
        }
        Ok(config)
    }
}

fn missing(key: &str) -> SpreadError {
    SpreadError::Config(format!("job configuration has no {}", key).into_boxed_str())
}
