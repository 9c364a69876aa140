//! Document-store collaborator.
//!
//! The engine never evaluates queries itself; it hands a backend typed
//! filters whose meaning is pinned down by [`WorkFilter::matches`] and
//! [`WorkOrder::compare`], so every backend agrees on what a filter selects
//! and how a page is ordered.

use rustc_hash::FxHashSet;
use std::cmp::Ordering;

use crate::conflict;
use crate::error::StoreResult;
use crate::model::{Affiliation, Person, Source, UnitSnapshot, UnitType, Work};
use crate::window::MembershipWindow;

pub mod memory;

pub use memory::MemoryStore;

/// Lazy, fallible result stream handed back by a backend.
pub type Cursor<'a, T> = Box<dyn Iterator<Item = StoreResult<T>> + Send + 'a>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct YearRange {
    pub start: Option<i64>,
    pub end: Option<i64>,
}

impl YearRange {
    pub fn new(start: Option<i64>, end: Option<i64>) -> Self {
        YearRange { start, end }
    }

    pub fn is_open(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// A bounded range never admits a Work without `year_published`.
    pub fn admits(&self, year: Option<i64>) -> bool {
        if self.is_open() {
            return true;
        }
        match year {
            Some(y) => self.start.map_or(true, |s| y >= s) && self.end.map_or(true, |e| y <= e),
            None => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkScope {
    /// `authors.affiliations.id == id`
    TaggedUnit(String),
    /// `authors.id == id`
    Author(String),
    /// `authors.id` in the set
    AnyAuthor(FxHashSet<String>),
    All,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkFilter {
    pub scope: WorkScope,
    pub years: YearRange,
    pub published: Option<MembershipWindow>,
    pub exclude_internal: bool,
}

impl WorkFilter {
    pub fn new(scope: WorkScope) -> Self {
        WorkFilter {
            scope,
            years: YearRange::default(),
            published: None,
            exclude_internal: false,
        }
    }

    pub fn tagged_unit(unit_id: &str) -> Self {
        WorkFilter::new(WorkScope::TaggedUnit(unit_id.to_string()))
    }

    pub fn by_author(person_id: &str) -> Self {
        WorkFilter::new(WorkScope::Author(person_id.to_string()))
    }

    pub fn by_any_author(person_ids: FxHashSet<String>) -> Self {
        WorkFilter::new(WorkScope::AnyAuthor(person_ids))
    }

    pub fn years(mut self, years: YearRange) -> Self {
        self.years = years;
        self
    }

    pub fn published_within(mut self, window: Option<MembershipWindow>) -> Self {
        self.published = window;
        self
    }

    pub fn excluding_internal(mut self) -> Self {
        self.exclude_internal = true;
        self
    }

    pub fn matches(&self, work: &Work) -> bool {
        let in_scope = match &self.scope {
            WorkScope::TaggedUnit(id) => work.is_tagged_with(id),
            WorkScope::Author(id) => work.has_author(id),
            WorkScope::AnyAuthor(ids) => work
                .authors
                .iter()
                .any(|a| a.id.as_ref().is_some_and(|id| ids.contains(id))),
            WorkScope::All => true,
        };
        in_scope
            && self.years.admits(work.year_published)
            && self
                .published
                .map_or(true, |w| w.admits(work.date_published))
            && !(self.exclude_internal && work.is_internal_record())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AffiliationFilter {
    /// Units holding a relation entry that points at `parent`.
    PartOf {
        parent: String,
        unit_type: Option<UnitType>,
    },
}

impl AffiliationFilter {
    pub fn part_of(parent: &str) -> Self {
        AffiliationFilter::PartOf {
            parent: parent.to_string(),
            unit_type: None,
        }
    }

    pub fn matches(&self, unit: &Affiliation) -> bool {
        match self {
            AffiliationFilter::PartOf { parent, unit_type } => {
                unit.is_part_of(parent) && unit_type.map_or(true, |t| unit.has_type(t))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersonFilter {
    MemberOf(String),
}

impl PersonFilter {
    pub fn matches(&self, person: &Person) -> bool {
        match self {
            PersonFilter::MemberOf(unit_id) => person.is_member_of(unit_id),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    #[default]
    Citations,
    Year,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    #[default]
    Descending,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkOrder {
    pub key: SortKey,
    pub direction: Direction,
}

impl WorkOrder {
    /// Total order: declared key and direction, then ascending title, then
    /// ascending id.
    pub fn compare(&self, a: &Work, b: &Work) -> Ordering {
        let primary = match self.key {
            SortKey::Citations => conflict::citations_count(&a.citations_count)
                .cmp(&conflict::citations_count(&b.citations_count)),
            SortKey::Year => a.year_published.cmp(&b.year_published),
        };
        let primary = match self.direction {
            Direction::Ascending => primary,
            Direction::Descending => primary.reverse(),
        };
        primary
            .then_with(|| conflict::title(&a.titles).cmp(&conflict::title(&b.titles)))
            .then_with(|| a.id.cmp(&b.id))
    }
}

/// Read-only view of the corpus. Implementations report failures and never
/// retry on the engine's behalf.
pub trait CorpusStore: Send + Sync {
    fn find_affiliation(&self, id: &str) -> StoreResult<Option<Affiliation>>;

    fn find_affiliations(&self, filter: &AffiliationFilter) -> StoreResult<Vec<Affiliation>>;

    fn find_person(&self, id: &str) -> StoreResult<Option<Person>>;

    fn find_persons<'a>(&'a self, filter: &PersonFilter) -> StoreResult<Cursor<'a, Person>>;

    fn find_source(&self, id: &str) -> StoreResult<Option<Source>>;

    /// Each matching Work is yielded once.
    fn find_works<'a>(&'a self, filter: &WorkFilter) -> StoreResult<Cursor<'a, Work>>;

    fn find_works_page(
        &self,
        filter: &WorkFilter,
        order: &WorkOrder,
        skip: usize,
        limit: usize,
    ) -> StoreResult<Vec<Work>>;

    fn count_works(&self, filter: &WorkFilter) -> StoreResult<u64>;

    fn find_snapshot(&self, unit_id: &str) -> StoreResult<Option<UnitSnapshot>>;
}
