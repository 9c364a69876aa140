//! Work selection for a unit scope.
//!
//! Institutions match Works directly by author affiliation tag. Faculties,
//! departments and groups go through their members: one Work query per
//! member, issued in batches over the engine's rayon pool and merged back in
//! member order, so the first-seen Work is the same for any thread count.

use log::debug;
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use std::collections::VecDeque;

use crate::engine::Engine;
use crate::error::{Result, StoreResult};
use crate::hierarchy;
use crate::model::{Person, UnitType, Work};
use crate::store::{CorpusStore, Cursor, WorkFilter, YearRange};
use crate::window::window;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Windowing {
    #[default]
    Off,
    /// Restrict each member's Works to `date_published` inside the member's
    /// window at the unit.
    Membership,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Selection {
    pub years: YearRange,
    pub windowing: Windowing,
}

impl Selection {
    pub fn years(start_year: Option<i64>, end_year: Option<i64>) -> Self {
        Selection {
            years: YearRange::new(start_year, end_year),
            windowing: Windowing::Off,
        }
    }

    pub fn windowed(mut self) -> Self {
        self.windowing = Windowing::Membership;
        self
    }
}

struct MemberFanout<'a> {
    store: &'a dyn CorpusStore,
    pool: &'a rayon::ThreadPool,
    batch_size: usize,
    unit_id: String,
    selection: Selection,
    members: Cursor<'a, Person>,
    buffer: VecDeque<Work>,
    drained: bool,
}

fn member_works(
    store: &dyn CorpusStore,
    person: &Person,
    unit_id: &str,
    selection: &Selection,
) -> StoreResult<Vec<Work>> {
    let mut filter = WorkFilter::by_author(&person.id).years(selection.years);
    if selection.windowing == Windowing::Membership {
        filter = filter.published_within(window(person, unit_id));
    }
    store.find_works(&filter)?.collect()
}

impl<'a> MemberFanout<'a> {
    fn fill(&mut self) -> StoreResult<()> {
        let mut batch = Vec::with_capacity(self.batch_size);
        while batch.len() < self.batch_size {
            match self.members.next() {
                Some(person) => batch.push(person?),
                None => {
                    self.drained = true;
                    break;
                }
            }
        }
        if batch.is_empty() {
            return Ok(());
        }

        let store = self.store;
        let unit_id = self.unit_id.as_str();
        let selection = &self.selection;
        let results: Vec<StoreResult<Vec<Work>>> = self.pool.install(|| {
            batch
                .par_iter()
                .map(|person| member_works(store, person, unit_id, selection))
                .collect()
        });
        debug!("Fanned out {} members of {}", batch.len(), self.unit_id);
        for works in results {
            self.buffer.extend(works?);
        }
        Ok(())
    }

    fn next_work(&mut self) -> Option<StoreResult<Work>> {
        loop {
            if let Some(work) = self.buffer.pop_front() {
                return Some(Ok(work));
            }
            if self.drained {
                return None;
            }
            if let Err(e) = self.fill() {
                return Some(Err(e));
            }
        }
    }
}

enum Inner<'a> {
    Direct(Cursor<'a, Work>),
    Members(Box<MemberFanout<'a>>),
}

/// Lazily selected Works, each id yielded once. The stream ends after the
/// first store error.
pub struct WorkStream<'a> {
    inner: Inner<'a>,
    seen: FxHashSet<String>,
    failed: bool,
}

impl<'a> WorkStream<'a> {
    fn new(inner: Inner<'a>) -> Self {
        WorkStream {
            inner,
            seen: FxHashSet::default(),
            failed: false,
        }
    }
}

impl<'a> Iterator for WorkStream<'a> {
    type Item = StoreResult<Work>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            let next = match &mut self.inner {
                Inner::Direct(cursor) => cursor.next(),
                Inner::Members(fanout) => fanout.next_work(),
            };
            match next? {
                Ok(work) => {
                    if self.seen.insert(work.id.clone()) {
                        return Some(Ok(work));
                    }
                }
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

impl<S: CorpusStore> Engine<S> {
    /// Works attributable to the unit within the optional year range.
    pub fn select(
        &self,
        unit_id: &str,
        unit_type: UnitType,
        start_year: Option<i64>,
        end_year: Option<i64>,
    ) -> Result<WorkStream<'_>> {
        self.select_with(unit_id, unit_type, &Selection::years(start_year, end_year))
    }

    pub fn select_with(
        &self,
        unit_id: &str,
        unit_type: UnitType,
        selection: &Selection,
    ) -> Result<WorkStream<'_>> {
        if unit_type.is_narrow() {
            return self.select_through_members(unit_id, selection);
        }
        debug!("Selecting works tagged with {}", unit_id);
        let filter = WorkFilter::tagged_unit(unit_id)
            .years(selection.years)
            .excluding_internal();
        Ok(WorkStream::new(Inner::Direct(self.store.find_works(&filter)?)))
    }

    /// Member-indirected selection regardless of the unit's type.
    pub fn select_through_members(
        &self,
        unit_id: &str,
        selection: &Selection,
    ) -> Result<WorkStream<'_>> {
        debug!("Selecting works through members of {}", unit_id);
        let members = hierarchy::members(&self.store, unit_id)?;
        let fanout = MemberFanout {
            store: &self.store,
            pool: &self.pool,
            batch_size: self.config.member_batch_size.max(1),
            unit_id: unit_id.to_string(),
            selection: *selection,
            members,
            buffer: VecDeque::new(),
            drained: false,
        };
        Ok(WorkStream::new(Inner::Members(Box::new(fanout))))
    }
}
