use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::StoreError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgeRange {
    pub label: String,
    pub min: i64,
    #[serde(default)]
    pub max: Option<i64>,
}

impl AgeRange {
    fn new(label: &str, min: i64, max: Option<i64>) -> Self {
        AgeRange {
            label: label.to_string(),
            min,
            max,
        }
    }

    pub fn contains(&self, age: i64) -> bool {
        age >= self.min && self.max.map_or(true, |max| age <= max)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub max_page_size: usize,
    pub default_page_size: usize,
    pub network_top_nodes: usize,
    /// Worker threads for the per-member fan-out; 0 lets rayon decide.
    pub member_concurrency: usize,
    pub member_batch_size: usize,
    pub listed_authors: usize,
    pub apc_reference_year: i64,
    pub apc_default_year: i64,
    pub default_subject_level: i64,
    pub age_ranges: Vec<AgeRange>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_page_size: 250,
            default_page_size: 100,
            network_top_nodes: 50,
            member_concurrency: 0,
            member_batch_size: 64,
            listed_authors: 10,
            apc_reference_year: 2022,
            apc_default_year: 2020,
            default_subject_level: 0,
            age_ranges: vec![
                AgeRange::new("14-26", 14, Some(26)),
                AgeRange::new("27-59", 27, Some(59)),
                AgeRange::new("60+", 60, None),
            ],
        }
    }
}

impl EngineConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, StoreError> {
        let file = File::open(path)?;
        serde_json::from_reader(BufReader::new(file)).map_err(|source| StoreError::Json {
            path: path.to_path_buf(),
            line: 0,
            source,
        })
    }

    pub fn age_label(&self, age: i64) -> Option<&str> {
        self.age_ranges
            .iter()
            .find(|r| r.contains(age))
            .map(|r| r.label.as_str())
    }
}
