use flate2::read::GzDecoder;
use log::{debug, info, warn};
use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use super::{AffiliationFilter, CorpusStore, Cursor, PersonFilter, WorkFilter, WorkOrder, WorkScope};
use crate::error::{StoreError, StoreResult};
use crate::model::{Affiliation, Person, Source, UnitSnapshot, Work};

pub const AFFILIATIONS: &str = "affiliations";
pub const PERSONS: &str = "person";
pub const WORKS: &str = "works";
pub const SOURCES: &str = "sources";
pub const SNAPSHOTS: &str = "snapshots";

/// In-memory corpus: one arena per entity kind, addressed by id through
/// index maps, plus the reverse indexes the engine's point queries need.
#[derive(Debug, Default)]
pub struct MemoryStore {
    affiliations: Vec<Affiliation>,
    persons: Vec<Person>,
    works: Vec<Work>,
    sources: Vec<Source>,
    snapshots: Vec<UnitSnapshot>,
    affiliation_index: FxHashMap<String, usize>,
    person_index: FxHashMap<String, usize>,
    source_index: FxHashMap<String, usize>,
    snapshot_index: FxHashMap<String, usize>,
    children: FxHashMap<String, Vec<usize>>,
    members: FxHashMap<String, Vec<usize>>,
    works_by_author: FxHashMap<String, Vec<usize>>,
    works_by_unit: FxHashMap<String, Vec<usize>>,
}

fn index_by_id<T>(kind: &str, items: &[T], id: impl Fn(&T) -> &str) -> FxHashMap<String, usize> {
    let mut index = FxHashMap::default();
    for (pos, item) in items.iter().enumerate() {
        let key = id(item);
        if index.contains_key(key) {
            warn!("Duplicate {} id '{}' at position {}; keeping the first.", kind, key, pos);
            continue;
        }
        index.insert(key.to_string(), pos);
    }
    index
}

fn push_unique(map: &mut FxHashMap<String, Vec<usize>>, key: &str, pos: usize) {
    let entry = map.entry(key.to_string()).or_default();
    if entry.last() != Some(&pos) {
        entry.push(pos);
    }
}

impl MemoryStore {
    pub fn new(
        affiliations: Vec<Affiliation>,
        persons: Vec<Person>,
        works: Vec<Work>,
        sources: Vec<Source>,
        snapshots: Vec<UnitSnapshot>,
    ) -> Self {
        let affiliation_index = index_by_id(AFFILIATIONS, &affiliations, |a| a.id.as_str());
        let person_index = index_by_id(PERSONS, &persons, |p| p.id.as_str());
        let source_index = index_by_id(SOURCES, &sources, |s| s.id.as_str());
        let snapshot_index = index_by_id(SNAPSHOTS, &snapshots, |s| s.id.as_str());

        let mut children = FxHashMap::default();
        for (pos, unit) in affiliations.iter().enumerate() {
            for parent in unit.relations.iter().filter_map(|r| r.id.as_deref()) {
                push_unique(&mut children, parent, pos);
            }
        }

        let mut members = FxHashMap::default();
        for (pos, person) in persons.iter().enumerate() {
            for unit in person.affiliations.iter().filter_map(|m| m.id.as_deref()) {
                push_unique(&mut members, unit, pos);
            }
        }

        let mut works_by_author = FxHashMap::default();
        let mut works_by_unit = FxHashMap::default();
        for (pos, work) in works.iter().enumerate() {
            for author in &work.authors {
                if let Some(id) = author.id.as_deref().filter(|id| !id.is_empty()) {
                    push_unique(&mut works_by_author, id, pos);
                }
                for unit in author.affiliations.iter().filter_map(|a| a.id.as_deref()) {
                    push_unique(&mut works_by_unit, unit, pos);
                }
            }
        }

        debug!(
            "Indexed {} affiliations, {} persons, {} works, {} sources, {} snapshots",
            affiliations.len(),
            persons.len(),
            works.len(),
            sources.len(),
            snapshots.len()
        );

        MemoryStore {
            affiliations,
            persons,
            works,
            sources,
            snapshots,
            affiliation_index,
            person_index,
            source_index,
            snapshot_index,
            children,
            members,
            works_by_author,
            works_by_unit,
        }
    }

    /// Loads `<collection>.jsonl` or `<collection>.jsonl.gz` dumps from `dir`.
    /// `affiliations`, `person` and `works` are required; `sources` and
    /// `snapshots` may be absent.
    pub fn load_dir(dir: &Path) -> StoreResult<Self> {
        info!("Loading corpus from {}", dir.display());
        let affiliations = read_collection(dir, AFFILIATIONS)?
            .ok_or_else(|| StoreError::CollectionNotFound(dir.join(AFFILIATIONS)))?;
        let persons = read_collection(dir, PERSONS)?
            .ok_or_else(|| StoreError::CollectionNotFound(dir.join(PERSONS)))?;
        let works = read_collection(dir, WORKS)?
            .ok_or_else(|| StoreError::CollectionNotFound(dir.join(WORKS)))?;
        let sources = read_collection(dir, SOURCES)?.unwrap_or_default();
        let snapshots = read_collection(dir, SNAPSHOTS)?.unwrap_or_default();
        info!(
            "Loaded {} affiliations, {} persons, {} works, {} sources, {} snapshots",
            affiliations.len(),
            persons.len(),
            works.len(),
            sources.len(),
            snapshots.len()
        );
        Ok(MemoryStore::new(affiliations, persons, works, sources, snapshots))
    }

    fn work_candidates(&self, scope: &WorkScope) -> Vec<usize> {
        match scope {
            WorkScope::TaggedUnit(id) => self.works_by_unit.get(id).cloned().unwrap_or_default(),
            WorkScope::Author(id) => self.works_by_author.get(id).cloned().unwrap_or_default(),
            WorkScope::AnyAuthor(ids) => {
                let mut positions: Vec<usize> = ids
                    .iter()
                    .filter_map(|id| self.works_by_author.get(id))
                    .flatten()
                    .copied()
                    .collect();
                positions.sort_unstable();
                positions.dedup();
                positions
            }
            WorkScope::All => (0..self.works.len()).collect(),
        }
    }
}

fn collection_path(dir: &Path, name: &str) -> Option<PathBuf> {
    [format!("{}.jsonl.gz", name), format!("{}.jsonl", name)]
        .into_iter()
        .map(|file| dir.join(file))
        .find(|path| path.is_file())
}

fn read_collection<T: DeserializeOwned>(dir: &Path, name: &str) -> StoreResult<Option<Vec<T>>> {
    match collection_path(dir, name) {
        Some(path) => read_jsonl(&path).map(Some),
        None => {
            debug!("No '{}' collection in {}", name, dir.display());
            Ok(None)
        }
    }
}

pub fn read_jsonl<T: DeserializeOwned>(path: &Path) -> StoreResult<Vec<T>> {
    let file = File::open(path)?;
    let reader: Box<dyn BufRead> = if path.extension().map_or(false, |ext| ext == "gz") {
        Box::new(BufReader::new(GzDecoder::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };

    let mut records = Vec::new();
    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<T>(&line) {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!(
                    "JSON parse error on line {} in {}: {} (Line: {}...). Skipping line.",
                    line_num + 1,
                    path.display(),
                    e,
                    line.chars().take(100).collect::<String>()
                );
            }
        }
    }
    Ok(records)
}

impl CorpusStore for MemoryStore {
    fn find_affiliation(&self, id: &str) -> StoreResult<Option<Affiliation>> {
        Ok(self
            .affiliation_index
            .get(id)
            .map(|&pos| self.affiliations[pos].clone()))
    }

    fn find_affiliations(&self, filter: &AffiliationFilter) -> StoreResult<Vec<Affiliation>> {
        let AffiliationFilter::PartOf { parent, .. } = filter;
        Ok(self
            .children
            .get(parent)
            .into_iter()
            .flatten()
            .map(|&pos| &self.affiliations[pos])
            .filter(|unit| filter.matches(unit))
            .cloned()
            .collect())
    }

    fn find_person(&self, id: &str) -> StoreResult<Option<Person>> {
        Ok(self.person_index.get(id).map(|&pos| self.persons[pos].clone()))
    }

    fn find_persons<'a>(&'a self, filter: &PersonFilter) -> StoreResult<Cursor<'a, Person>> {
        let PersonFilter::MemberOf(unit_id) = filter;
        let positions = self.members.get(unit_id).cloned().unwrap_or_default();
        let filter = filter.clone();
        Ok(Box::new(
            positions
                .into_iter()
                .map(move |pos| &self.persons[pos])
                .filter(move |person| filter.matches(person))
                .map(|person| Ok(person.clone())),
        ))
    }

    fn find_source(&self, id: &str) -> StoreResult<Option<Source>> {
        Ok(self.source_index.get(id).map(|&pos| self.sources[pos].clone()))
    }

    fn find_works<'a>(&'a self, filter: &WorkFilter) -> StoreResult<Cursor<'a, Work>> {
        let positions = self.work_candidates(&filter.scope);
        let filter = filter.clone();
        Ok(Box::new(
            positions
                .into_iter()
                .map(move |pos| &self.works[pos])
                .filter(move |work| filter.matches(work))
                .map(|work| Ok(work.clone())),
        ))
    }

    fn find_works_page(
        &self,
        filter: &WorkFilter,
        order: &WorkOrder,
        skip: usize,
        limit: usize,
    ) -> StoreResult<Vec<Work>> {
        let mut matched: Vec<&Work> = self
            .work_candidates(&filter.scope)
            .into_iter()
            .map(|pos| &self.works[pos])
            .filter(|work| filter.matches(work))
            .collect();
        matched.sort_by(|a, b| order.compare(a, b));
        Ok(matched.into_iter().skip(skip).take(limit).cloned().collect())
    }

    fn count_works(&self, filter: &WorkFilter) -> StoreResult<u64> {
        Ok(self
            .work_candidates(&filter.scope)
            .into_iter()
            .filter(|&pos| filter.matches(&self.works[pos]))
            .count() as u64)
    }

    fn find_snapshot(&self, unit_id: &str) -> StoreResult<Option<UnitSnapshot>> {
        Ok(self
            .snapshot_index
            .get(unit_id)
            .map(|&pos| self.snapshots[pos].clone()))
    }
}
