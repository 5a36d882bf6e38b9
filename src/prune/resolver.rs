//! Retention settings resolver
//!
//! Turns a `[prune]` setting such as `-6h:foo/* -12h:'bar/* baz/*' -1d` into
//! a list of absolute cycles, each optionally carrying extra path arguments.

use crate::prune::config::{
    PruneConfig, ARCHIVE_LOGS_AT, PRUNE_LOGS_AT, PRUNE_REMOTE_LOGS_AT, SECTION,
};
use crate::prune::engine::ItemCategory;
use crate::prune::env;
use crate::prune::error::{PruneError, UnboundVariableError};
use crate::prune::shift::CycleShifter;

/// One entry of a resolved setting
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleItem {
    /// A cycle on its own
    Cycle(String),
    /// A cycle followed by `:` and extra path arguments
    CycleWithArgs {
        /// Absolute cycle
        cycle: String,
        /// Unsplit argument text
        args: String,
    },
}

impl CycleItem {
    /// The absolute cycle
    #[must_use]
    pub fn cycle(&self) -> &str {
        match self {
            Self::Cycle(cycle) | Self::CycleWithArgs { cycle, .. } => cycle,
        }
    }

    /// The extra arguments, if any
    #[must_use]
    pub fn args(&self) -> Option<&str> {
        match self {
            Self::Cycle(_) => None,
            Self::CycleWithArgs { args, .. } => Some(args),
        }
    }
}

/// Resolves `[prune]` settings against a task cycle time
pub struct Resolver<'a, F = fn(&str) -> Result<String, UnboundVariableError>> {
    config: &'a PruneConfig,
    shifter: &'a CycleShifter,
    substitute: F,
}

impl<'a> Resolver<'a> {
    /// Create a resolver that substitutes from the process environment
    #[must_use]
    pub fn new(config: &'a PruneConfig, shifter: &'a CycleShifter) -> Self {
        Self {
            config,
            shifter,
            substitute: env::substitute,
        }
    }
}

impl<'a, F> Resolver<'a, F>
where
    F: Fn(&str) -> Result<String, UnboundVariableError>,
{
    /// Create a resolver with a custom variable substitution
    pub const fn with_substitution(
        config: &'a PruneConfig,
        shifter: &'a CycleShifter,
        substitute: F,
    ) -> Self {
        Self {
            config,
            shifter,
            substitute,
        }
    }

    /// Resolve a setting into a list of cycles, ignoring any `:` arguments.
    pub fn cycles(&self, key: &str) -> Result<Vec<String>, PruneError> {
        Ok(self
            .resolve(key, false)?
            .into_iter()
            .map(|item| match item {
                CycleItem::Cycle(cycle) | CycleItem::CycleWithArgs { cycle, .. } => cycle,
            })
            .collect())
    }

    /// Resolve a setting into cycles that may carry extra arguments.
    pub fn cycle_items(&self, key: &str) -> Result<Vec<CycleItem>, PruneError> {
        self.resolve(key, true)
    }

    /// Resolve a setting.
    ///
    /// With `allow_args`, a token `cycle:args` is split on its first colon.
    /// Without, the whole token is the cycle. An unset setting resolves to an
    /// empty list.
    pub fn resolve(&self, key: &str, allow_args: bool) -> Result<Vec<CycleItem>, PruneError> {
        let Some(raw) = self.config.get_value(SECTION, key) else {
            return Ok(Vec::new());
        };

        let value = (self.substitute)(raw).map_err(|source| PruneError::Config {
            section: SECTION.to_string(),
            key: key.to_string(),
            value: raw.to_string(),
            source,
        })?;

        let tokens = split_words(key, &value)?;

        let mut items = Vec::with_capacity(tokens.len());
        for token in tokens {
            let (cycle_token, args) = match token.split_once(':') {
                Some((cycle, args)) if allow_args => (cycle, Some(args)),
                _ => (token.as_str(), None),
            };

            let cycle = self.resolve_cycle(key, cycle_token)?;
            items.push(match args {
                Some(args) if !args.trim().is_empty() => CycleItem::CycleWithArgs {
                    cycle,
                    args: args.to_string(),
                },
                _ => CycleItem::Cycle(cycle),
            });
        }
        Ok(items)
    }

    /// Resolve every setting a prune run needs.
    ///
    /// All settings are resolved before anything is touched, so a bad setting
    /// aborts the run with no side effects.
    pub fn plan(&self) -> Result<RetentionPlan, PruneError> {
        let mut categories = Vec::with_capacity(ItemCategory::ALL.len());
        for category in ItemCategory::ALL {
            categories.push((category, self.cycle_items(category.setting_key())?));
        }

        Ok(RetentionPlan {
            prune_remote_logs: self.cycles(PRUNE_REMOTE_LOGS_AT)?,
            archive_logs: self.cycles(ARCHIVE_LOGS_AT)?,
            prune_logs: self.cycles(PRUNE_LOGS_AT)?,
            categories,
        })
    }

    fn resolve_cycle(&self, key: &str, token: &str) -> Result<String, PruneError> {
        if self.shifter.is_task_cycle_time_mode() && CycleShifter::is_offset(token) {
            self.shifter
                .shift(token)
                .map_err(|e| PruneError::Offset {
                    section: SECTION.to_string(),
                    key: key.to_string(),
                    token: token.to_string(),
                    message: e.to_string(),
                })
        } else {
            Ok(token.to_string())
        }
    }
}

/// Every resolved setting of a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetentionPlan {
    /// Cycles whose remote job logs are pulled and removed
    pub prune_remote_logs: Vec<String>,
    /// Cycles whose job logs are archived
    pub archive_logs: Vec<String>,
    /// Cycles whose job logs are deleted
    pub prune_logs: Vec<String>,
    /// Cycle items per category, in [`ItemCategory::ALL`] order
    pub categories: Vec<(ItemCategory, Vec<CycleItem>)>,
}

impl RetentionPlan {
    /// Remote-log cycles that are not also being archived.
    ///
    /// Archiving a cycle supersedes pruning its remote logs.
    #[must_use]
    pub fn remote_log_cycles_to_prune(&self) -> Vec<String> {
        self.prune_remote_logs
            .iter()
            .filter(|cycle| !self.archive_logs.contains(cycle))
            .cloned()
            .collect()
    }
}

/// Split text into words with shell quoting rules.
pub fn split_words(key: &str, text: &str) -> Result<Vec<String>, PruneError> {
    shell_words::split(text).map_err(|e| PruneError::Tokenize {
        section: SECTION.to_string(),
        key: key.to_string(),
        value: text.to_string(),
        message: e.to_string(),
    })
}
