//! Manifest coordinates
//!
//! A coordinate addresses one node of the manifest tree. Higher levels omit
//! the lower fields. Each coordinate maps to exactly one document path below
//! the manifest root:
//!
//! ```text
//! manifest.json                          global
//! <category>/<series>/manifest.json      series
//! <category>/<series>/sNN/manifest.json  season
//! <category>/<series>/sNN/eNNN.json      episode (leaf)
//! ```

use crate::{ManifestError, Result};
use qp_common::db::validate_slug;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Node document name for aggregate levels
pub(crate) const NODE_FILE: &str = "manifest.json";

/// Depth in the manifest tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Global,
    Series,
    Season,
    Episode,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "level", rename_all = "snake_case")]
pub enum Coordinate {
    Global,
    Series {
        category: String,
        series: String,
    },
    Season {
        category: String,
        series: String,
        season: u32,
    },
    Episode {
        category: String,
        series: String,
        season: u32,
        episode: u32,
    },
}

impl Coordinate {
    pub fn series(category: &str, series: &str) -> Self {
        Coordinate::Series {
            category: category.to_string(),
            series: series.to_string(),
        }
    }

    pub fn season(category: &str, series: &str, season: u32) -> Self {
        Coordinate::Season {
            category: category.to_string(),
            series: series.to_string(),
            season,
        }
    }

    pub fn episode(category: &str, series: &str, season: u32, episode: u32) -> Self {
        Coordinate::Episode {
            category: category.to_string(),
            series: series.to_string(),
            season,
            episode,
        }
    }

    /// Build a coordinate from optional CLI-style parts
    ///
    /// Parts must be given as a prefix: a season needs a series, an episode
    /// needs a season. No parts at all addresses the global node.
    pub fn from_parts(
        category: Option<&str>,
        series: Option<&str>,
        season: Option<u32>,
        episode: Option<u32>,
    ) -> Result<Self> {
        let coordinate = match (category, series, season, episode) {
            (None, None, None, None) => Coordinate::Global,
            (Some(c), Some(s), None, None) => Coordinate::series(c, s),
            (Some(c), Some(s), Some(n), None) => Coordinate::season(c, s, n),
            (Some(c), Some(s), Some(n), Some(e)) => Coordinate::episode(c, s, n, e),
            (Some(c), None, None, None) => {
                return Err(ManifestError::InvalidCoordinate(format!(
                    "category '{}' alone is not a node; add a series/topic",
                    c
                )))
            }
            _ => {
                return Err(ManifestError::InvalidCoordinate(
                    "coordinate parts must be given in order: category, series, season, episode"
                        .to_string(),
                ))
            }
        };
        coordinate.validate()?;
        Ok(coordinate)
    }

    pub fn level(&self) -> Level {
        match self {
            Coordinate::Global => Level::Global,
            Coordinate::Series { .. } => Level::Series,
            Coordinate::Season { .. } => Level::Season,
            Coordinate::Episode { .. } => Level::Episode,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.level() == Level::Episode
    }

    /// Parent coordinate; `None` for the global node
    pub fn parent(&self) -> Option<Coordinate> {
        match self {
            Coordinate::Global => None,
            Coordinate::Series { .. } => Some(Coordinate::Global),
            Coordinate::Season {
                category, series, ..
            } => Some(Coordinate::series(category, series)),
            Coordinate::Episode {
                category,
                series,
                season,
                ..
            } => Some(Coordinate::season(category, series, *season)),
        }
    }

    /// Check that every path component is safe to use on disk
    pub fn validate(&self) -> Result<()> {
        match self {
            Coordinate::Global => Ok(()),
            Coordinate::Series { category, series }
            | Coordinate::Season {
                category, series, ..
            }
            | Coordinate::Episode {
                category, series, ..
            } => {
                validate_slug("category", category)?;
                validate_slug("series", series)?;
                Ok(())
            }
        }
    }

    /// Document path relative to the manifest root
    pub(crate) fn relative_path(&self) -> PathBuf {
        match self {
            Coordinate::Global => PathBuf::from(NODE_FILE),
            Coordinate::Series { category, series } => {
                PathBuf::from(category).join(series).join(NODE_FILE)
            }
            Coordinate::Season {
                category,
                series,
                season,
            } => PathBuf::from(category)
                .join(series)
                .join(season_dir(*season))
                .join(NODE_FILE),
            Coordinate::Episode {
                category,
                series,
                season,
                episode,
            } => PathBuf::from(category)
                .join(series)
                .join(season_dir(*season))
                .join(format!("e{:03}.json", episode)),
        }
    }
}

pub(crate) fn season_dir(season: u32) -> String {
    format!("s{:02}", season)
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Coordinate::Global => f.write_str("<global>"),
            Coordinate::Series { category, series } => write!(f, "{}/{}", category, series),
            Coordinate::Season {
                category,
                series,
                season,
            } => write!(f, "{}/{}/{}", category, series, season_dir(*season)),
            Coordinate::Episode {
                category,
                series,
                season,
                episode,
            } => write!(
                f,
                "{}/{}/{}/e{:03}",
                category,
                series,
                season_dir(*season),
                episode
            ),
        }
    }
}
