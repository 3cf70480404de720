// Configuration loading and validation (scout.toml).
//
// Everything has a default matching the stock player-search export, so a
// bare `fmscout ingest <file>` works with no config file at all; a config
// file only needs the sections it overrides.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::ingest::interner::LookupOffsets;
use crate::ingest::parser::{ColumnRange, ExportLayout};
use crate::ingest::record::{Category, StatLine};

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "scout.toml";

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for `{field}`: {message}")]
    Validation { field: String, message: String },
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Season tag stamped onto every ingested record.
    pub season: i32,
    pub db_path: String,
    /// Width of the asking-price obfuscation range: a true value V becomes
    /// a uniform draw from [V/n, V·n].
    pub obfuscation_factor: i64,
    /// Explicit interner offsets. When absent, offsets continue from the
    /// ids already in the database.
    pub offsets: Option<LookupOffsets>,
    pub layout: LayoutSection,
    pub score: ScoreSection,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            season: 0,
            db_path: "scout.db".to_string(),
            obfuscation_factor: 2,
            offsets: None,
            layout: LayoutSection::default(),
            score: ScoreSection::default(),
        }
    }
}

/// Shape of the export grid. Defaults describe the stock player-search
/// view.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LayoutSection {
    pub preamble_lines: usize,
    pub leading_cells: usize,
    pub trailing_cells: usize,
    pub divider_offset: usize,
    pub ranges: RangesSection,
}

impl Default for LayoutSection {
    fn default() -> Self {
        let stock = ExportLayout::default();
        Self {
            preamble_lines: stock.preamble_lines,
            leading_cells: stock.leading_cells,
            trailing_cells: stock.trailing_cells,
            divider_offset: stock.divider_offset,
            ranges: RangesSection::default(),
        }
    }
}

/// Inclusive [start, end] column range per category group.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RangesSection {
    pub stats: [usize; 2],
    pub attributes: [usize; 2],
    pub contract: [usize; 2],
    pub rating: [usize; 2],
    pub identity: [usize; 2],
    pub profile: [usize; 2],
}

impl Default for RangesSection {
    fn default() -> Self {
        Self {
            stats: [0, 22],
            attributes: [23, 69],
            contract: [70, 75],
            rating: [79, 79],
            identity: [80, 81],
            profile: [82, 90],
        }
    }
}

impl RangesSection {
    fn entries(&self) -> [(Category, [usize; 2]); 6] {
        [
            (Category::Stats, self.stats),
            (Category::Attributes, self.attributes),
            (Category::Contract, self.contract),
            (Category::Rating, self.rating),
            (Category::Identity, self.identity),
            (Category::Profile, self.profile),
        ]
    }
}

/// Defaults for the `score` subcommand.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScoreSection {
    /// Minimum minutes for membership in a comparison population.
    pub min_mins: i64,
    /// Statistics to score, in scoring order.
    pub stats: Vec<String>,
}

impl Default for ScoreSection {
    fn default() -> Self {
        Self {
            min_mins: 450,
            stats: StatLine::NAMES.iter().map(|n| n.to_string()).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Load from an explicit path (missing file is an error), or from
    /// `scout.toml` in the working directory, falling back to the built-in
    /// defaults when that does not exist.
    pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
        let config = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::FileNotFound {
                        path: path.to_path_buf(),
                    });
                }
                Self::from_file(path)?
            }
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::from_file(default)?
                } else {
                    Config::default()
                }
            }
        };
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Config, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.obfuscation_factor < 1 {
            return Err(ConfigError::Validation {
                field: "obfuscation_factor".to_string(),
                message: format!("must be >= 1, got {}", self.obfuscation_factor),
            });
        }

        let mut spans: Vec<(Category, [usize; 2])> = self.layout.ranges.entries().to_vec();
        for (category, [start, end]) in &spans {
            if start > end {
                return Err(ConfigError::Validation {
                    field: format!("layout.ranges.{category}"),
                    message: format!("range [{start}, {end}] is inverted"),
                });
            }
        }
        spans.sort_by_key(|(_, [start, _])| *start);
        for pair in spans.windows(2) {
            let (a, [_, a_end]) = pair[0];
            let (b, [b_start, _]) = pair[1];
            if a_end >= b_start {
                return Err(ConfigError::Validation {
                    field: format!("layout.ranges.{b}"),
                    message: format!("overlaps the {a} range"),
                });
            }
        }

        if self.score.stats.is_empty() {
            return Err(ConfigError::Validation {
                field: "score.stats".to_string(),
                message: "at least one statistic is required".to_string(),
            });
        }
        let mut seen = HashSet::new();
        for name in &self.score.stats {
            if !StatLine::NAMES.contains(&name.as_str()) {
                return Err(ConfigError::Validation {
                    field: "score.stats".to_string(),
                    message: format!("unknown statistic `{name}`"),
                });
            }
            if !seen.insert(name.as_str()) {
                return Err(ConfigError::Validation {
                    field: "score.stats".to_string(),
                    message: format!("statistic `{name}` listed twice"),
                });
            }
        }
        Ok(())
    }

    /// The export layout assembled from the layout section.
    pub fn export_layout(&self) -> ExportLayout {
        ExportLayout {
            preamble_lines: self.layout.preamble_lines,
            leading_cells: self.layout.leading_cells,
            trailing_cells: self.layout.trailing_cells,
            divider_offset: self.layout.divider_offset,
            ranges: self
                .layout
                .ranges
                .entries()
                .iter()
                .map(|(category, [start, end])| (*category, ColumnRange::new(*start, *end)))
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
