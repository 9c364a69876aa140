use log::{debug, info};
use rustc_hash::FxHashSet;
use serde::Serialize;

use crate::conflict::{self, ResolvedSubject};
use crate::engine::Engine;
use crate::error::{Result, StoreResult};
use crate::hierarchy;
use crate::model::{CitationCount, ExternalId, Person, UnitType, Work, WorkAuthor};
use crate::params::{ProductsQuery, RawProductsQuery};
use crate::reduce::Joiner;
use crate::resolve::{strip_identity_documents, unit_display_name};
use crate::store::{CorpusStore, WorkFilter};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductAffiliation {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductAuthor {
    pub id: String,
    pub full_name: String,
    pub external_ids: Vec<ExternalId>,
    pub affiliations: Vec<ProductAffiliation>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductSource {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResearchProduct {
    pub id: String,
    pub title: String,
    pub authors: Vec<ProductAuthor>,
    pub source: Option<ProductSource>,
    pub year_published: Option<i64>,
    /// Resolved by provider precedence.
    pub citations: i64,
    pub citations_count: Vec<CitationCount>,
    pub open_access_status: String,
    pub subjects: Vec<ResolvedSubject>,
    pub external_ids: Vec<ExternalId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductsPage {
    pub data: Vec<ResearchProduct>,
    pub count: usize,
    pub page: usize,
    pub total_results: u64,
}

/// Which listed author a long author list is cut around.
enum Anchor<'a> {
    Member(&'a FxHashSet<String>),
    TaggedWith(&'a str),
}

impl Anchor<'_> {
    fn holds(&self, author: &WorkAuthor) -> bool {
        match self {
            Anchor::Member(ids) => author.id.as_ref().is_some_and(|id| ids.contains(id)),
            Anchor::TaggedWith(unit_id) => author.is_affiliated_with(unit_id),
        }
    }
}

/// At most `limit` authors, ending at the first anchored author when it sits
/// past the first `limit` positions.
fn author_window<'w>(
    authors: &'w [WorkAuthor],
    anchor: &Anchor<'_>,
    limit: usize,
) -> &'w [WorkAuthor] {
    if authors.len() <= limit || limit == 0 {
        return authors;
    }
    match authors.iter().position(|a| anchor.holds(a)) {
        Some(i) if i >= limit => &authors[i + 1 - limit..=i],
        _ => &authors[..limit],
    }
}

fn product_author(
    joiner: &mut Joiner<'_>,
    author: &WorkAuthor,
    id: &str,
) -> StoreResult<ProductAuthor> {
    let person: Option<Person> = joiner.person(id)?;
    let mut affiliations = Vec::new();
    for aff_id in author.affiliations.iter().filter_map(|a| a.id.as_deref()) {
        let Some(unit) = joiner.unit(aff_id)? else {
            continue;
        };
        let membership = person
            .as_ref()
            .and_then(|p| p.affiliations.iter().find(|m| m.id.as_deref() == Some(aff_id)));
        affiliations.push(ProductAffiliation {
            id: unit.id.clone(),
            name: unit_display_name(&unit),
            start_date: membership.and_then(|m| m.start_date),
            end_date: membership.and_then(|m| m.end_date),
        });
    }
    Ok(match person {
        Some(person) => ProductAuthor {
            id: person.id,
            full_name: person.full_name,
            external_ids: strip_identity_documents(&person.external_ids),
            affiliations,
        },
        None => ProductAuthor {
            id: id.to_string(),
            full_name: author.full_name.clone().unwrap_or_default(),
            external_ids: strip_identity_documents(&author.external_ids),
            affiliations,
        },
    })
}

fn research_product(
    joiner: &mut Joiner<'_>,
    work: Work,
    anchor: &Anchor<'_>,
    listed_authors: usize,
) -> StoreResult<ResearchProduct> {
    let mut authors = Vec::new();
    for author in author_window(&work.authors, anchor, listed_authors) {
        if let Some(id) = author.id.as_deref().filter(|id| !id.is_empty()) {
            authors.push(product_author(joiner, author, id)?);
        }
    }

    let source = match work.source_id() {
        Some(id) => {
            let has_name = work
                .source
                .as_ref()
                .and_then(|s| s.name.as_ref())
                .is_some_and(|n| n.is_string());
            let entity = if has_name { None } else { joiner.source(id)? };
            Some(ProductSource {
                id: id.to_string(),
                name: conflict::work_source_name(&work, entity.as_ref()),
            })
        }
        None => None,
    };

    Ok(ResearchProduct {
        title: conflict::title(&work.titles),
        citations: conflict::citations_count(&work.citations_count),
        open_access_status: conflict::open_access_status(&work)
            .unwrap_or_default()
            .to_string(),
        subjects: conflict::all_subjects(&work.subjects),
        authors,
        source,
        year_published: work.year_published,
        id: work.id,
        citations_count: work.citations_count,
        external_ids: work.external_ids,
    })
}

impl<S: CorpusStore> Engine<S> {
    /// One page of the unit's Works, ordered by the query's sort key with
    /// ascending title and id as tiebreaks.
    pub fn research_products(
        &self,
        unit_id: &str,
        unit_type: Option<UnitType>,
        query: &ProductsQuery,
    ) -> Result<ProductsPage> {
        let unit = self.find_unit(unit_id)?;
        let scope = Self::scope_type(&unit, unit_type);
        info!(
            "Research products for {} as {} (page {}, max {})",
            unit_id, scope, query.page, query.max_results
        );

        let member_ids: FxHashSet<String>;
        let (filter, anchor) = if scope.is_narrow() {
            member_ids = hierarchy::members(&self.store, unit_id)?
                .map(|p| p.map(|p| p.id))
                .collect::<StoreResult<_>>()?;
            debug!("{} members in {}", member_ids.len(), unit_id);
            (
                WorkFilter::by_any_author(member_ids.clone()).years(query.years),
                Anchor::Member(&member_ids),
            )
        } else {
            (
                WorkFilter::tagged_unit(unit_id)
                    .years(query.years)
                    .excluding_internal(),
                Anchor::TaggedWith(unit_id),
            )
        };

        let total_results = self.store.count_works(&filter)?;
        let works = self.store.find_works_page(
            &filter,
            &query.order,
            query.skip(),
            query.max_results,
        )?;

        let mut joiner = Joiner::new(&self.store);
        let data = works
            .into_iter()
            .map(|work| research_product(&mut joiner, work, &anchor, self.config.listed_authors))
            .collect::<StoreResult<Vec<_>>>()?;

        Ok(ProductsPage {
            count: data.len(),
            page: query.page,
            total_results,
            data,
        })
    }

    /// Listing entry point taking raw transport parameters.
    pub fn get_research_products(
        &self,
        unit_id: &str,
        unit_type: Option<UnitType>,
        raw: &RawProductsQuery,
    ) -> Result<ProductsPage> {
        let query = ProductsQuery::parse(raw, &self.config)?;
        self.research_products(unit_id, unit_type, &query)
    }
}
