//! Declarative fold shared by every Work-stream metric.
//!
//! A [`ReducerSpec`] names what each Work is joined to and a pure extractor
//! that turns one joined Work into zero or more [`Observation`]s. [`fold`]
//! drives the stream through a [`Tally`] and shapes the result as a plot.

use log::debug;
use rustc_hash::FxHashMap;
use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;

use crate::config::EngineConfig;
use crate::error::StoreResult;
use crate::model::{Affiliation, Network, Person, Source, UnitType, Work};
use crate::store::CorpusStore;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum Key {
    Year(i64),
    Label(String),
}

impl Key {
    pub fn label(label: impl Into<String>) -> Self {
        Key::Label(label.into())
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Key::Year(year) => write!(f, "{}", year),
            Key::Label(label) => f.write_str(label),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Metric {
    Count(u64),
    Amount(f64),
    Citations(Vec<i64>),
}

impl Metric {
    fn magnitude(&self) -> f64 {
        match self {
            Metric::Count(n) => *n as f64,
            Metric::Amount(x) => *x,
            Metric::Citations(list) => list.len() as f64,
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Metric::Count(n) => write!(f, "{}", n),
            Metric::Amount(x) => write!(f, "{}", x),
            Metric::Citations(list) => {
                let joined: Vec<String> = list.iter().map(i64::to_string).collect();
                f.write_str(&joined.join(";"))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotRecord {
    pub dimension: Key,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series: Option<String>,
    pub value: Metric,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Plot {
    Records(Vec<PlotRecord>),
    Apc {
        reference_year: i64,
        records: Vec<PlotRecord>,
    },
    Network(Network),
    Words(Value),
}

impl Plot {
    /// Flat records, when the plot has any.
    pub fn records(&self) -> Option<&[PlotRecord]> {
        match self {
            Plot::Records(records) | Plot::Apc { records, .. } => Some(records),
            Plot::Network(_) | Plot::Words(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotResponse {
    pub plot: Option<Plot>,
}

impl PlotResponse {
    pub fn empty() -> Self {
        PlotResponse { plot: None }
    }
}

impl From<Option<Plot>> for PlotResponse {
    fn from(plot: Option<Plot>) -> Self {
        PlotResponse { plot }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    /// Ascending dimension, then series.
    ByDimension,
    /// Descending value, then ascending dimension and series.
    ByValueDesc,
    /// First-seen order of dimensions.
    Discovery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Count,
    Amount,
    List,
}

impl ValueKind {
    fn zero(self) -> Metric {
        match self {
            ValueKind::Count => Metric::Count(0),
            ValueKind::Amount => Metric::Amount(0.0),
            ValueKind::List => Metric::Citations(Vec::new()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Observed {
    Weight(u64),
    Amount(f64),
    Item(i64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub dimension: Key,
    pub series: Option<String>,
    pub value: Observed,
}

impl Observation {
    pub fn count(dimension: Key, series: Option<String>) -> Self {
        Observation::weighted(dimension, series, 1)
    }

    pub fn weighted(dimension: Key, series: Option<String>, weight: u64) -> Self {
        Observation {
            dimension,
            series,
            value: Observed::Weight(weight),
        }
    }

    pub fn amount(dimension: Key, series: Option<String>, amount: f64) -> Self {
        Observation {
            dimension,
            series,
            value: Observed::Amount(amount),
        }
    }

    pub fn item(dimension: Key, series: Option<String>, item: i64) -> Self {
        Observation {
            dimension,
            series,
            value: Observed::Item(item),
        }
    }
}

fn apply(metric: &mut Metric, observed: Observed) {
    match (metric, observed) {
        (Metric::Count(n), Observed::Weight(w)) => *n += w,
        (Metric::Count(n), _) => *n += 1,
        (Metric::Amount(total), Observed::Amount(x)) => *total += x,
        (Metric::Amount(total), Observed::Weight(w)) => *total += w as f64,
        (Metric::Amount(total), Observed::Item(v)) => *total += v as f64,
        (Metric::Citations(list), Observed::Item(v)) => list.push(v),
        (Metric::Citations(list), Observed::Weight(w)) => list.push(w as i64),
        (Metric::Citations(list), Observed::Amount(x)) => list.push(x as i64),
    }
}

/// Keyed accumulator over `(dimension, series)` cells.
#[derive(Debug, Clone)]
pub struct Tally {
    kind: ValueKind,
    order: Order,
    index: FxHashMap<(Key, Option<String>), usize>,
    cells: Vec<PlotRecord>,
}

impl Tally {
    pub fn new(kind: ValueKind, order: Order) -> Self {
        Tally {
            kind,
            order,
            index: FxHashMap::default(),
            cells: Vec::new(),
        }
    }

    fn cell(&mut self, dimension: Key, series: Option<String>) -> &mut Metric {
        let next = self.cells.len();
        let pos = *self
            .index
            .entry((dimension.clone(), series.clone()))
            .or_insert(next);
        if pos == next {
            self.cells.push(PlotRecord {
                dimension,
                series,
                value: self.kind.zero(),
            });
        }
        &mut self.cells[pos].value
    }

    pub fn add(&mut self, observation: Observation) {
        let value = observation.value;
        apply(self.cell(observation.dimension, observation.series), value);
    }

    /// Makes the cell present with a zero value.
    pub fn ensure(&mut self, dimension: Key, series: Option<String>) {
        self.cell(dimension, series);
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn into_records(self) -> Option<Vec<PlotRecord>> {
        if self.cells.is_empty() {
            return None;
        }
        let mut records = self.cells;
        match self.order {
            Order::ByDimension => records.sort_by(|a, b| {
                a.dimension
                    .cmp(&b.dimension)
                    .then_with(|| a.series.cmp(&b.series))
            }),
            Order::ByValueDesc => records.sort_by(|a, b| {
                b.value
                    .magnitude()
                    .partial_cmp(&a.value.magnitude())
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| a.dimension.cmp(&b.dimension))
                    .then_with(|| a.series.cmp(&b.series))
            }),
            Order::Discovery => {}
        }
        Some(records)
    }

    pub fn into_plot(self, shape: Shape, config: &EngineConfig) -> Option<Plot> {
        let records = self.into_records()?;
        Some(match shape {
            Shape::Flat => Plot::Records(records),
            Shape::Apc => Plot::Apc {
                reference_year: config.apc_reference_year,
                records,
            },
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Flat,
    Apc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorJoin {
    None,
    /// Every author with a resolvable id.
    All,
    /// Institution scope keeps only authors tagged with the unit; narrower
    /// scopes keep every author.
    ScopeTagged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Join {
    pub source: bool,
    pub authors: AuthorJoin,
    pub units: bool,
}

impl Join {
    pub const NONE: Join = Join {
        source: false,
        authors: AuthorJoin::None,
        units: false,
    };
    pub const SOURCE: Join = Join {
        source: true,
        ..Join::NONE
    };
}

/// A Work with the entities its metric needs.
#[derive(Debug, Clone)]
pub struct Joined {
    pub work: Work,
    pub source: Option<Source>,
    pub authors: Vec<Person>,
    /// One entry per author affiliation occurrence that resolves to a unit.
    pub units: Vec<Affiliation>,
}

pub struct Context<'a> {
    pub config: &'a EngineConfig,
    pub unit: &'a Affiliation,
    pub scope: UnitType,
    pub level: i64,
}

pub type Extractor = fn(&Joined, &Context<'_>) -> Vec<Observation>;

#[derive(Clone, Copy)]
pub struct ReducerSpec {
    pub name: &'static str,
    pub join: Join,
    pub kind: ValueKind,
    pub order: Order,
    pub shape: Shape,
    pub extract: Extractor,
}

/// Lookup memo scoped to one fold.
pub struct Joiner<'a> {
    store: &'a dyn CorpusStore,
    sources: FxHashMap<String, Option<Source>>,
    persons: FxHashMap<String, Option<Person>>,
    units: FxHashMap<String, Option<Affiliation>>,
}

impl<'a> Joiner<'a> {
    pub fn new(store: &'a dyn CorpusStore) -> Self {
        Joiner {
            store,
            sources: FxHashMap::default(),
            persons: FxHashMap::default(),
            units: FxHashMap::default(),
        }
    }

    pub fn source(&mut self, id: &str) -> StoreResult<Option<Source>> {
        if let Some(hit) = self.sources.get(id) {
            return Ok(hit.clone());
        }
        let found = self.store.find_source(id)?;
        self.sources.insert(id.to_string(), found.clone());
        Ok(found)
    }

    pub fn person(&mut self, id: &str) -> StoreResult<Option<Person>> {
        if let Some(hit) = self.persons.get(id) {
            return Ok(hit.clone());
        }
        let found = self.store.find_person(id)?;
        self.persons.insert(id.to_string(), found.clone());
        Ok(found)
    }

    pub fn unit(&mut self, id: &str) -> StoreResult<Option<Affiliation>> {
        if let Some(hit) = self.units.get(id) {
            return Ok(hit.clone());
        }
        let found = self.store.find_affiliation(id)?;
        self.units.insert(id.to_string(), found.clone());
        Ok(found)
    }

    pub fn join(&mut self, work: Work, join: &Join, ctx: &Context<'_>) -> StoreResult<Joined> {
        let source = match work.source_id() {
            Some(id) if join.source => self.source(id)?,
            _ => None,
        };

        let mut authors = Vec::new();
        if join.authors != AuthorJoin::None {
            let tagged_only = join.authors == AuthorJoin::ScopeTagged && !ctx.scope.is_narrow();
            for author in &work.authors {
                if tagged_only && !author.is_affiliated_with(&ctx.unit.id) {
                    continue;
                }
                if let Some(id) = author.id.as_deref().filter(|id| !id.is_empty()) {
                    if let Some(person) = self.person(id)? {
                        authors.push(person);
                    }
                }
            }
        }

        let mut units = Vec::new();
        if join.units {
            let ids: Vec<String> = work
                .authors
                .iter()
                .flat_map(|a| a.affiliations.iter())
                .filter_map(|a| a.id.clone())
                .collect();
            for id in ids {
                if let Some(unit) = self.unit(&id)? {
                    units.push(unit);
                }
            }
        }

        Ok(Joined {
            work,
            source,
            authors,
            units,
        })
    }
}

/// Runs `works` through `spec`. `None` when no observation was made.
pub fn fold<I>(
    spec: &ReducerSpec,
    works: I,
    store: &dyn CorpusStore,
    ctx: &Context<'_>,
) -> StoreResult<Option<Plot>>
where
    I: Iterator<Item = StoreResult<Work>>,
{
    let mut tally = Tally::new(spec.kind, spec.order);
    let mut joiner = Joiner::new(store);
    let mut folded = 0usize;
    for work in works {
        let joined = joiner.join(work?, &spec.join, ctx)?;
        for observation in (spec.extract)(&joined, ctx) {
            tally.add(observation);
        }
        folded += 1;
    }
    debug!("{}: folded {} works for {}", spec.name, folded, ctx.unit.id);
    Ok(tally.into_plot(spec.shape, ctx.config))
}
