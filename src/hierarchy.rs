//! Navigation over the "is part of" relation between units.
//!
//! Children of a unit are the units whose `relations` point at it. Upstream
//! data is not guaranteed acyclic, so every traversal keeps a visited set
//! keyed by unit id.

use log::debug;
use rustc_hash::FxHashSet;
use serde::Serialize;
use std::collections::VecDeque;

use crate::error::StoreResult;
use crate::model::{Affiliation, Person, Relation, UnitRelation, UnitType};
use crate::resolve::unit_display_name;
use crate::store::{AffiliationFilter, CorpusStore, Cursor, PersonFilter};

/// The first group, department or faculty tag in list order; institution
/// when no tag names one of those.
pub fn dominant_type(unit: &Affiliation) -> UnitType {
    unit.types
        .iter()
        .filter_map(|t| t.unit_type())
        .find(|t| t.is_narrow())
        .unwrap_or(UnitType::Institution)
}

fn ranks_between(unit: &Affiliation, scope: UnitType, target: UnitType) -> bool {
    unit.types
        .iter()
        .filter_map(|t| t.unit_type())
        .any(|t| t > scope && t < target)
}

/// Distinct units of the relation's type under `unit_id`, in breadth-first
/// discovery order. Units of the requested type are collected and not
/// descended; units ranked between `scope` and the requested type are
/// descended through. The requested type must be strictly deeper than
/// `scope`, otherwise nothing is related.
pub fn related_units<S: CorpusStore + ?Sized>(
    store: &S,
    unit_id: &str,
    relation: Relation,
    scope: UnitType,
) -> StoreResult<Vec<Affiliation>> {
    let Some(target) = relation.unit_type() else {
        return Ok(Vec::new());
    };
    if target <= scope {
        debug!("No {} units under a {} scope for {}", target, scope, unit_id);
        return Ok(Vec::new());
    }

    let mut visited: FxHashSet<String> = FxHashSet::default();
    visited.insert(unit_id.to_string());
    let mut queue = VecDeque::from([unit_id.to_string()]);
    let mut related = Vec::new();

    while let Some(current) = queue.pop_front() {
        for child in store.find_affiliations(&AffiliationFilter::part_of(&current))? {
            if !visited.insert(child.id.clone()) {
                continue;
            }
            if child.has_type(target) {
                related.push(child);
            } else if ranks_between(&child, scope, target) {
                queue.push_back(child.id.clone());
            }
        }
    }

    debug!(
        "Found {} {} units under {} ({} visited)",
        related.len(),
        target,
        unit_id,
        visited.len()
    );
    Ok(related)
}

/// Persons holding a membership entry at the unit, yielded lazily.
pub fn members<'a, S: CorpusStore + ?Sized>(
    store: &'a S,
    unit_id: &str,
) -> StoreResult<Cursor<'a, Person>> {
    store.find_persons(&PersonFilter::MemberOf(unit_id.to_string()))
}

/// Relations pointing at units shallower than `unit_type`, e.g. the faculty
/// and institution above a department.
pub fn upside_relations(relations: &[UnitRelation], unit_type: UnitType) -> Vec<UnitRelation> {
    relations
        .iter()
        .filter(|r| {
            r.types
                .iter()
                .filter_map(|t| t.unit_type())
                .any(|t| t < unit_type)
        })
        .cloned()
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitSummary {
    pub id: String,
    pub name: String,
}

impl From<&Affiliation> for UnitSummary {
    fn from(unit: &Affiliation) -> Self {
        UnitSummary {
            id: unit.id.clone(),
            name: unit_display_name(unit),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthorSummary {
    pub id: String,
    pub full_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RelatedInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub faculties: Option<Vec<UnitSummary>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub departments: Option<Vec<UnitSummary>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<UnitSummary>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<AuthorSummary>>,
}

fn summaries<S: CorpusStore + ?Sized>(
    store: &S,
    unit_id: &str,
    relation: Relation,
    scope: UnitType,
) -> StoreResult<Option<Vec<UnitSummary>>> {
    let units = related_units(store, unit_id, relation, scope)?;
    Ok(Some(units.iter().map(UnitSummary::from).collect()))
}

/// Sub-units and members reachable from a unit at the given scope.
/// Institutions list faculties, departments and groups; narrower scopes list
/// the deeper sub-units plus their own members.
pub fn related_info<S: CorpusStore + ?Sized>(
    store: &S,
    unit_id: &str,
    scope: UnitType,
) -> StoreResult<RelatedInfo> {
    let mut info = RelatedInfo::default();
    if scope == UnitType::Institution {
        info.faculties = summaries(store, unit_id, Relation::Faculty, scope)?;
    }
    if scope < UnitType::Department {
        info.departments = summaries(store, unit_id, Relation::Department, scope)?;
    }
    if scope < UnitType::Group {
        info.groups = summaries(store, unit_id, Relation::Group, scope)?;
    }
    if scope.is_narrow() {
        let authors = members(store, unit_id)?
            .map(|person| {
                person.map(|p| AuthorSummary {
                    id: p.id,
                    full_name: p.full_name,
                })
            })
            .collect::<StoreResult<Vec<_>>>()?;
        info.authors = Some(authors);
    }
    Ok(info)
}
