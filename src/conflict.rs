//! Per-field provider precedence.
//!
//! Every function here is pure: one field of one Work or Source in, one
//! resolved value out. Data-shape anomalies resolve to a default and never
//! fail.

use serde::Serialize;

use crate::model::{CitationCount, Publisher, Source, Subject, SubjectGroup, Title, Work};
use crate::resolve::resolve_name;

pub const CITATION_PRECEDENCE: [&str; 2] = ["scholar", "openalex"];
pub const SUBJECT_PROVIDER: &str = "openalex";
pub const UNNAMED_SUBJECT: &str = "No name specified";

/// First provider in [`CITATION_PRECEDENCE`] that reports a count; 0 when
/// none does.
pub fn citations_count(counts: &[CitationCount]) -> i64 {
    CITATION_PRECEDENCE
        .iter()
        .find_map(|provider| {
            counts
                .iter()
                .find(|c| c.source.as_deref() == Some(*provider))
                .and_then(|c| c.count)
        })
        .unwrap_or(0)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ResolvedSubject {
    pub id: Option<String>,
    pub name: String,
}

fn openalex_subjects(groups: &[SubjectGroup]) -> impl Iterator<Item = &Subject> {
    groups
        .iter()
        .filter(|g| g.source.as_deref() == Some(SUBJECT_PROVIDER))
        .flat_map(|g| g.subjects.iter())
}

fn resolved(subject: &Subject) -> ResolvedSubject {
    ResolvedSubject {
        id: subject.id.clone(),
        name: subject
            .name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| UNNAMED_SUBJECT.to_string()),
    }
}

/// OpenAlex subjects at `level`. Works without an OpenAlex entry yield an
/// empty list.
pub fn subjects(groups: &[SubjectGroup], level: i64) -> Vec<ResolvedSubject> {
    openalex_subjects(groups)
        .filter(|s| s.level == Some(level))
        .map(resolved)
        .collect()
}

pub fn all_subjects(groups: &[SubjectGroup]) -> Vec<ResolvedSubject> {
    openalex_subjects(groups).map(resolved).collect()
}

pub fn title(titles: &[Title]) -> String {
    let titled = || titles.iter().filter_map(|t| Some((t.title.as_deref()?, t.lang.as_deref())));
    titled()
        .find(|(_, lang)| matches!(lang, Some("es") | Some("en")))
        .or_else(|| titled().next())
        .map(|(title, _)| title.to_string())
        .unwrap_or_default()
}

/// Only a structured publisher record with a string name counts. Bare
/// strings are an upstream split and stay absent.
pub fn publisher(source: &Source) -> Option<&str> {
    match source.publisher.as_ref()? {
        Publisher::Record(record) => record
            .name
            .as_ref()?
            .as_str()
            .map(str::trim)
            .filter(|n| !n.is_empty()),
        Publisher::Bare(_) | Publisher::Other(_) => None,
    }
}

pub fn open_access_status(work: &Work) -> Option<&str> {
    work.bibliographic_info
        .as_ref()?
        .open_access_status
        .as_deref()
        .filter(|s| !s.is_empty())
}

pub fn is_open_access(work: &Work) -> Option<bool> {
    work.bibliographic_info.as_ref()?.is_open_access
}

/// String `source.name` on the Work, else the Source entity's resolved name.
pub fn work_source_name(work: &Work, source: Option<&Source>) -> String {
    work.source
        .as_ref()
        .and_then(|s| s.name.as_ref())
        .and_then(|name| name.as_str())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .or_else(|| source.map(|s| resolve_name(&s.names)))
        .unwrap_or_default()
}

/// APC charges with their currency, when the Source reports an amount.
pub fn valid_apc(source: &Source) -> Option<(f64, &str)> {
    let apc = source.apc.as_ref()?;
    let charges = apc.charges?;
    Some((charges, apc.currency.as_deref().unwrap_or("")))
}
