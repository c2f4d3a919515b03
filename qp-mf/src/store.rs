//! Manifest store
//!
//! Nodes are JSON documents read and written wholesale. A save is atomic per
//! node (temp file + rename); there is no locking beyond that, so concurrent
//! re-aggregation is last-write-wins and always recomputed from the children
//! currently on disk.

use crate::aggregate::{aggregate_status, summarize};
use crate::coordinate::{season_dir, NODE_FILE};
use crate::{Coordinate, ManifestError, ManifestNode, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub struct ManifestStore {
    root: PathBuf,
}

impl ManifestStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn node_path(&self, coordinate: &Coordinate) -> PathBuf {
        self.root.join(coordinate.relative_path())
    }

    /// Load the node at `coordinate`; never creates one
    pub fn get(&self, coordinate: &Coordinate) -> Result<Option<ManifestNode>> {
        coordinate.validate()?;
        let path = self.node_path(coordinate);
        if !path.exists() {
            return Ok(None);
        }
        load_node(&path).map(Some)
    }

    /// Create the node at `coordinate`; fails if one already exists
    pub fn init(
        &self,
        coordinate: &Coordinate,
        expected_children: Option<u32>,
    ) -> Result<ManifestNode> {
        if self.get(coordinate)?.is_some() {
            return Err(ManifestError::AlreadyExists(coordinate.to_string()));
        }
        let node = ManifestNode::new(coordinate.clone(), expected_children);
        self.save(coordinate, &node)?;
        info!(coordinate = %coordinate, "Manifest node created");
        Ok(node)
    }

    /// Overwrite the node at `coordinate` wholesale
    pub fn save(&self, coordinate: &Coordinate, node: &ManifestNode) -> Result<()> {
        coordinate.validate()?;
        if &node.coordinate != coordinate {
            return Err(ManifestError::CoordinateMismatch {
                expected: coordinate.to_string(),
                found: node.coordinate.to_string(),
            });
        }

        let path = self.node_path(coordinate);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(node)?;
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, content)?;
        fs::rename(&temp_path, &path)?;

        debug!(coordinate = %coordinate, status = %node.status, "Manifest node saved");
        Ok(())
    }

    /// Load every existing child node of `coordinate`
    pub fn children(&self, coordinate: &Coordinate) -> Result<Vec<ManifestNode>> {
        coordinate.validate()?;
        let mut paths = Vec::new();

        match coordinate {
            Coordinate::Global => {
                for category_dir in subdirectories(&self.root)? {
                    for series_dir in subdirectories(&category_dir)? {
                        paths.push(series_dir.join(NODE_FILE));
                    }
                }
            }
            Coordinate::Series { category, series } => {
                let series_dir = self.root.join(category).join(series);
                for season in subdirectories(&series_dir)? {
                    paths.push(season.join(NODE_FILE));
                }
            }
            Coordinate::Season {
                category,
                series,
                season,
            } => {
                let season_path = self.root.join(category).join(series).join(season_dir(*season));
                if season_path.is_dir() {
                    for entry in fs::read_dir(&season_path)? {
                        let path = entry?.path();
                        if is_episode_document(&path) {
                            paths.push(path);
                        }
                    }
                }
            }
            Coordinate::Episode { .. } => return Ok(Vec::new()),
        }

        let mut children = Vec::new();
        for path in paths {
            if path.is_file() {
                let node = load_node(&path)?;
                if node.coordinate.parent().as_ref() == Some(coordinate) {
                    children.push(node);
                }
            }
        }
        children.sort_by(|a, b| a.coordinate.cmp(&b.coordinate));
        Ok(children)
    }

    /// Re-derive `coordinate` from its children and propagate to the root
    ///
    /// For a leaf coordinate the fold starts at its parent. Missing aggregate
    /// nodes on the way up are created. A node whose derived state is
    /// unchanged is not rewritten, so redundant calls are no-ops. Returns the
    /// first node recomputed.
    pub fn recompute_aggregate(&self, coordinate: &Coordinate) -> Result<ManifestNode> {
        let mut current = if coordinate.is_leaf() {
            coordinate.parent()
        } else {
            Some(coordinate.clone())
        };

        let mut first = None;
        while let Some(coord) = current {
            let node = self.recompute_one(&coord)?;
            if first.is_none() {
                first = Some(node);
            }
            current = coord.parent();
        }

        first.ok_or_else(|| ManifestError::InvalidCoordinate(coordinate.to_string()))
    }

    fn recompute_one(&self, coordinate: &Coordinate) -> Result<ManifestNode> {
        let statuses: Vec<_> = self
            .children(coordinate)?
            .iter()
            .map(|child| child.status)
            .collect();

        let existing = self.get(coordinate)?;
        let expected = existing.as_ref().and_then(|n| n.expected_children);
        let counts = summarize(&statuses, expected);
        let status = aggregate_status(&counts);

        let mut node = match existing {
            Some(node) if node.status == status && node.children == counts => return Ok(node),
            Some(node) => node,
            None => ManifestNode::new(coordinate.clone(), None),
        };

        if node.status != status {
            info!(
                coordinate = %coordinate,
                from = %node.status,
                to = %status,
                "Aggregate status changed"
            );
        }
        node.status = status;
        node.children = counts;
        node.updated_at = qp_common::time::now();
        self.save(coordinate, &node)?;
        Ok(node)
    }

    /// Read-modify-write a leaf, then re-aggregate upward
    ///
    /// The leaf is created if it does not exist yet (first scrape attempt).
    pub fn update_leaf<F>(&self, coordinate: &Coordinate, mutate: F) -> Result<ManifestNode>
    where
        F: FnOnce(&mut ManifestNode) -> Result<()>,
    {
        if !coordinate.is_leaf() {
            return Err(ManifestError::NotALeaf(coordinate.to_string()));
        }
        let mut node = match self.get(coordinate)? {
            Some(node) => node,
            None => ManifestNode::new(coordinate.clone(), None),
        };
        mutate(&mut node)?;
        self.save(coordinate, &node)?;
        self.recompute_aggregate(coordinate)?;
        Ok(node)
    }

    /// `coordinate` and all its descendants, depth first
    pub fn walk(&self, coordinate: &Coordinate) -> Result<Vec<ManifestNode>> {
        let mut nodes = Vec::new();
        if let Some(node) = self.get(coordinate)? {
            nodes.push(node);
        }
        for child in self.children(coordinate)? {
            nodes.extend(self.walk(&child.coordinate)?);
        }
        Ok(nodes)
    }
}

fn load_node(path: &Path) -> Result<ManifestNode> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn subdirectories(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn is_episode_document(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name.starts_with('e') && name.ends_with(".json") && path.is_file()
}
