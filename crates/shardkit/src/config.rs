//! TOML configuration for splitters and build options

use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use indexmap::IndexMap;
use serde::Deserialize;

use crate::{
    matcher::{Matcher, Rule},
    orchestrator::SplitOptions,
    splitter::Splitter,
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub options: OptionsConfig,
    #[serde(default, rename = "splitter")]
    pub splitters: Vec<SplitterConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OptionsConfig {
    /// Output path of the main shard
    pub dest: Option<String>,
    pub root_dir: Option<String>,
    pub hoist_dynamic_common: bool,
    pub common_shard: Option<String>,
}

impl Default for OptionsConfig {
    fn default() -> Self {
        Self {
            dest: None,
            root_dir: None,
            hoist_dynamic_common: true,
            common_shard: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SplitterConfig {
    pub name: Option<String>,
    pub dest: Option<DestConfig>,
    #[serde(default)]
    pub dynamic: bool,
    #[serde(rename = "match")]
    pub matches: Option<MatchConfig>,
}

/// `dest = "dist/vendor.js"` or `dest = false` to emit no file
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum DestConfig {
    Path(String),
    Enabled(bool),
}

/// A rule value: a string, `{ regex = "..." }`, or a list of either
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RuleConfig {
    Text(String),
    Pattern(PatternConfig),
    List(Vec<RuleConfig>),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatternConfig {
    pub regex: String,
}

/// Rules on the module path, or rules keyed by attribute name
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum MatchConfig {
    Rule(RuleConfig),
    Attributes(IndexMap<String, RuleConfig>),
}

impl Config {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).context("Failed to parse shardkit configuration")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&source)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Splitters in declaration order, which is also their match priority
    pub fn splitters(&self) -> Result<Vec<Splitter>> {
        self.splitters
            .iter()
            .enumerate()
            .map(|(index, splitter)| {
                splitter
                    .to_splitter()
                    .with_context(|| format!("Invalid splitter #{}", index + 1))
            })
            .collect()
    }

    pub fn split_options(&self) -> SplitOptions {
        SplitOptions {
            main_dest: self.options.dest.clone(),
            root_dir: self.options.root_dir.clone().unwrap_or_default(),
            hoist_dynamic_common: self.options.hoist_dynamic_common,
            common_shard: self.options.common_shard.clone(),
        }
    }
}

impl SplitterConfig {
    pub fn to_splitter(&self) -> Result<Splitter> {
        let path_dest = match &self.dest {
            Some(DestConfig::Path(path)) => Some(path.as_str()),
            _ => None,
        };
        let Some(name) = self.name.as_deref().or(path_dest) else {
            bail!("A splitter needs a name or a dest");
        };

        let matcher = match &self.matches {
            Some(matches) => matches.to_matcher()?,
            None => Matcher::default(),
        };

        let mut splitter = Splitter::new(name, matcher).with_dynamic(self.dynamic);
        match &self.dest {
            Some(DestConfig::Path(path)) => splitter = splitter.with_dest(Some(path.clone())),
            Some(DestConfig::Enabled(false)) => splitter = splitter.with_dest(None),
            Some(DestConfig::Enabled(true)) | None => {}
        }

        Ok(splitter)
    }
}

impl MatchConfig {
    pub fn to_matcher(&self) -> Result<Matcher> {
        match self {
            Self::Rule(rule) => Ok(Matcher::from_paths([rule.to_rule(true)?])),
            Self::Attributes(attributes) => {
                if attributes.is_empty() {
                    return Err(anyhow!("A match table needs at least one attribute"));
                }
                let rules = attributes
                    .iter()
                    .map(|(attribute, rule)| Ok((attribute.as_str(), rule.to_rule(false)?)))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Matcher::from_attributes(rules))
            }
        }
    }
}

impl RuleConfig {
    /// Bare strings are regexes at the top level and literals under an attribute
    pub fn to_rule(&self, text_is_pattern: bool) -> Result<Rule> {
        match self {
            Self::Text(text) if text_is_pattern => Rule::pattern(text),
            Self::Text(text) => Ok(Rule::literal(text.as_str())),
            Self::Pattern(pattern) => Rule::pattern(&pattern.regex),
            Self::List(rules) => Ok(Rule::any_of(
                rules
                    .iter()
                    .map(|rule| rule.to_rule(text_is_pattern))
                    .collect::<Result<Vec<_>>>()?,
            )),
        }
    }
}
