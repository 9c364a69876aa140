#![allow(dead_code)]

use affiliation_analytics::model::{
    Affiliation, AuthorAffiliation, CitationCount, Membership, Name, Person, Title, TypeTag,
    UnitRelation, Work, WorkAuthor,
};
use affiliation_analytics::{Engine, EngineConfig, MemoryStore};

pub const SECONDS_PER_YEAR: i64 = 31_557_600;

/// Seconds since the epoch at the start of `year`, in Julian years.
pub fn epoch(year: i64) -> i64 {
    (year - 1970) * SECONDS_PER_YEAR
}

pub fn unit(id: &str, name: &str, kind: &str, parents: &[(&str, &str)]) -> Affiliation {
    Affiliation {
        id: id.to_string(),
        names: vec![Name::new(name, "es")],
        types: vec![TypeTag::new("staff", kind)],
        relations: parents
            .iter()
            .map(|(parent, parent_kind)| UnitRelation {
                id: Some(parent.to_string()),
                name: None,
                relation: Some("parent".to_string()),
                types: vec![TypeTag::new("staff", parent_kind)],
            })
            .collect(),
        ..Affiliation::default()
    }
}

pub fn membership(unit_id: &str, start: i64, end: i64) -> Membership {
    Membership {
        id: Some(unit_id.to_string()),
        name: None,
        types: Vec::new(),
        start_date: Some(start),
        end_date: Some(end),
    }
}

pub fn person(id: &str, memberships: Vec<Membership>) -> Person {
    Person {
        id: id.to_string(),
        full_name: format!("Person {}", id),
        affiliations: memberships,
        ..Person::default()
    }
}

pub fn author(id: &str, units: &[&str]) -> WorkAuthor {
    WorkAuthor {
        id: Some(id.to_string()),
        full_name: Some(format!("Person {}", id)),
        affiliations: units
            .iter()
            .map(|u| AuthorAffiliation {
                id: Some(u.to_string()),
                name: None,
                types: Vec::new(),
            })
            .collect(),
        external_ids: Vec::new(),
    }
}

pub fn work(id: &str, year: i64, authors: Vec<WorkAuthor>) -> Work {
    Work {
        id: id.to_string(),
        titles: vec![Title::new(&format!("Title {}", id), "en")],
        authors,
        year_published: Some(year),
        date_published: Some(epoch(year) + SECONDS_PER_YEAR / 2),
        ..Work::default()
    }
}

pub fn cited(mut work: Work, count: i64) -> Work {
    work.citations_count = vec![CitationCount::new("openalex", count)];
    work
}

pub fn store(affiliations: Vec<Affiliation>, persons: Vec<Person>, works: Vec<Work>) -> MemoryStore {
    MemoryStore::new(affiliations, persons, works, Vec::new(), Vec::new())
}

pub fn engine(store: MemoryStore) -> Engine<MemoryStore> {
    let config = EngineConfig {
        member_concurrency: 2,
        member_batch_size: 2,
        ..EngineConfig::default()
    };
    Engine::with_config(store, config).unwrap()
}

/// Group `U1` with `P1` (2010-2015) and `P2` (2016-open) authoring three
/// Works dated 2012, 2014 and 2017.
pub fn group_scenario() -> MemoryStore {
    store(
        vec![unit("U1", "Grupo Uno", "group", &[])],
        vec![
            person("P1", vec![membership("U1", epoch(2010), epoch(2015))]),
            person("P2", vec![membership("U1", epoch(2016), -1)]),
        ],
        vec![
            work("W2012", 2012, vec![author("P1", &[])]),
            work("W2014", 2014, vec![author("P1", &[])]),
            work("W2017", 2017, vec![author("P2", &[])]),
        ],
    )
}
