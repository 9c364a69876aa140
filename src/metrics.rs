//! Metric keys and their reducers.
//!
//! Most metrics are a [`ReducerSpec`] over the unit's selected Works. The
//! by-affiliation family folds each sibling sub-unit separately; `year_group`
//! and the two snapshot metrics have their own entry points.

use log::{debug, info, warn};
use rustc_hash::FxHashSet;
use std::fmt;
use std::str::FromStr;

use crate::config::EngineConfig;
use crate::conflict;
use crate::engine::Engine;
use crate::error::{AnalyticsError, Result, StoreResult};
use crate::hierarchy::{dominant_type, related_units};
use crate::model::{Affiliation, Ranking, Relation, UnitType, Work};
use crate::network::prune_network;
use crate::reduce::{
    fold, AuthorJoin, Context, Extractor, Join, Joined, Joiner, Key, Observation, Observed, Order,
    Plot, PlotResponse, ReducerSpec, Shape, Tally, ValueKind,
};
use crate::resolve::unit_display_name;
use crate::select::Selection;
use crate::store::{CorpusStore, WorkFilter};

/// Seconds in a Julian year, for ages at publication.
pub const SECONDS_PER_YEAR: i64 = 31_557_600;

pub const SAME_INSTITUTION: &str = "same_institution";
pub const OTHER_PUBLISHER: &str = "other_publisher";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    Type,
    Citations,
    Products,
    Apc,
    H,
}

impl Family {
    pub fn as_str(self) -> &'static str {
        match self {
            Family::Type => "type",
            Family::Citations => "citations",
            Family::Products => "products",
            Family::Apc => "apc",
            Family::H => "h",
        }
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "type" => Some(Family::Type),
            "citations" => Some(Family::Citations),
            "products" => Some(Family::Products),
            "apc" => Some(Family::Apc),
            "h" => Some(Family::H),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKey {
    YearType,
    YearCitations,
    YearApc,
    YearOa,
    YearPublisher,
    YearH,
    YearResearcher,
    YearGroup,
    TitleWords,
    ByAffiliation(Family, Relation),
    ProductsPublisher,
    ProductsSubject,
    ProductsDatabase,
    ProductsOa,
    ProductsSex,
    ProductsAge,
    ScientiRank,
    ScimagoRank,
    PublishedInstitution,
    CollaborationWorldmap,
    CollaborationColombiamap,
    CollaborationNetwork,
}

/// Every key the dispatch table accepts.
pub const METRIC_KEYS: [&str; 36] = [
    "year_type",
    "type,faculty",
    "type,department",
    "type,group",
    "year_citations",
    "year_apc",
    "year_oa",
    "year_publisher",
    "year_h",
    "year_researcher",
    "year_group",
    "title_words",
    "citations,faculty",
    "citations,department",
    "citations,group",
    "products,faculty",
    "products,department",
    "products,group",
    "apc,faculty",
    "apc,department",
    "apc,group",
    "h,faculty",
    "h,department",
    "h,group",
    "products_publisher",
    "products_subject",
    "products_database",
    "products_oa",
    "products_sex",
    "products_age",
    "scienti_rank",
    "scimago_rank",
    "published_institution",
    "collaboration_worldmap",
    "collaboration_colombiamap",
    "collaboration_network",
];

impl MetricKey {
    pub fn parse(raw: &str) -> Result<Self> {
        raw.parse()
    }

    fn simple_name(self) -> Option<&'static str> {
        Some(match self {
            MetricKey::YearType => "year_type",
            MetricKey::YearCitations => "year_citations",
            MetricKey::YearApc => "year_apc",
            MetricKey::YearOa => "year_oa",
            MetricKey::YearPublisher => "year_publisher",
            MetricKey::YearH => "year_h",
            MetricKey::YearResearcher => "year_researcher",
            MetricKey::YearGroup => "year_group",
            MetricKey::TitleWords => "title_words",
            MetricKey::ByAffiliation(..) => return None,
            MetricKey::ProductsPublisher => "products_publisher",
            MetricKey::ProductsSubject => "products_subject",
            MetricKey::ProductsDatabase => "products_database",
            MetricKey::ProductsOa => "products_oa",
            MetricKey::ProductsSex => "products_sex",
            MetricKey::ProductsAge => "products_age",
            MetricKey::ScientiRank => "scienti_rank",
            MetricKey::ScimagoRank => "scimago_rank",
            MetricKey::PublishedInstitution => "published_institution",
            MetricKey::CollaborationWorldmap => "collaboration_worldmap",
            MetricKey::CollaborationColombiamap => "collaboration_colombiamap",
            MetricKey::CollaborationNetwork => "collaboration_network",
        })
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricKey::ByAffiliation(family, relation) => {
                write!(f, "{},{}", family.as_str(), relation.as_str())
            }
            other => f.write_str(other.simple_name().unwrap_or_default()),
        }
    }
}

impl FromStr for MetricKey {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self> {
        let raw = s.trim();
        if let Some((prefix, relation)) = raw.split_once(',') {
            let family = Family::from_prefix(prefix.trim());
            let relation = relation.trim().parse::<Relation>().ok();
            return match (family, relation) {
                (Some(family), Some(relation)) if relation != Relation::Author => {
                    Ok(MetricKey::ByAffiliation(family, relation))
                }
                _ => Err(AnalyticsError::invalid("metric", raw)),
            };
        }
        Ok(match raw {
            "year_type" => MetricKey::YearType,
            "year_citations" => MetricKey::YearCitations,
            "year_apc" => MetricKey::YearApc,
            "year_oa" => MetricKey::YearOa,
            "year_publisher" => MetricKey::YearPublisher,
            "year_h" => MetricKey::YearH,
            "year_researcher" => MetricKey::YearResearcher,
            "year_group" => MetricKey::YearGroup,
            "title_words" => MetricKey::TitleWords,
            "products_publisher" => MetricKey::ProductsPublisher,
            "products_subject" => MetricKey::ProductsSubject,
            "products_database" => MetricKey::ProductsDatabase,
            "products_oa" => MetricKey::ProductsOa,
            "products_sex" => MetricKey::ProductsSex,
            "products_age" => MetricKey::ProductsAge,
            "scienti_rank" => MetricKey::ScientiRank,
            "scimago_rank" => MetricKey::ScimagoRank,
            "published_institution" => MetricKey::PublishedInstitution,
            "collaboration_worldmap" => MetricKey::CollaborationWorldmap,
            "collaboration_colombiamap" => MetricKey::CollaborationColombiamap,
            "collaboration_network" => MetricKey::CollaborationNetwork,
            other => return Err(AnalyticsError::invalid("metric", other)),
        })
    }
}

/// Arguments shared by every metric entry point.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlotRequest {
    pub unit_id: String,
    pub unit_type: Option<UnitType>,
    pub start_year: Option<i64>,
    pub end_year: Option<i64>,
    /// Scope the by-affiliation family resolves siblings under.
    pub aff_type: Option<UnitType>,
    /// Subject taxonomy level for `products_subject`.
    pub level: Option<i64>,
}

impl PlotRequest {
    pub fn new(unit_id: &str) -> Self {
        PlotRequest {
            unit_id: unit_id.to_string(),
            ..PlotRequest::default()
        }
    }

    pub fn unit_type(mut self, unit_type: UnitType) -> Self {
        self.unit_type = Some(unit_type);
        self
    }

    pub fn years(mut self, start_year: Option<i64>, end_year: Option<i64>) -> Self {
        self.start_year = start_year;
        self.end_year = end_year;
        self
    }
}

fn year(joined: &Joined) -> Option<Key> {
    joined.work.year_published.map(Key::Year)
}

fn first_type(joined: &Joined) -> Option<String> {
    joined
        .work
        .types
        .iter()
        .find_map(|t| t.kind.clone())
        .filter(|k| !k.is_empty())
}

fn scienti_labels(ranking: &[Ranking]) -> impl Iterator<Item = String> + '_ {
    ranking
        .iter()
        .filter(|r| r.source_is("scienti"))
        .filter_map(Ranking::label)
}

fn year_type(joined: &Joined, _: &Context<'_>) -> Vec<Observation> {
    match (year(joined), first_type(joined)) {
        (Some(year), Some(kind)) => vec![Observation::count(year, Some(kind))],
        _ => Vec::new(),
    }
}

fn year_citations(joined: &Joined, _: &Context<'_>) -> Vec<Observation> {
    joined
        .work
        .citations_by_year
        .iter()
        .filter_map(|c| Some((c.year?, c.cited_by_count?)))
        .filter(|(_, count)| *count > 0)
        .map(|(year, count)| Observation::weighted(Key::Year(year), None, count as u64))
        .collect()
}

fn year_apc(joined: &Joined, ctx: &Context<'_>) -> Vec<Observation> {
    let Some((charges, currency)) = joined.source.as_ref().and_then(conflict::valid_apc) else {
        return Vec::new();
    };
    let year = joined
        .work
        .year_published
        .unwrap_or(ctx.config.apc_default_year);
    vec![Observation::amount(
        Key::Year(year),
        Some(currency.to_string()),
        charges,
    )]
}

fn year_oa(joined: &Joined, _: &Context<'_>) -> Vec<Observation> {
    match (year(joined), conflict::is_open_access(&joined.work)) {
        (Some(year), Some(open)) => {
            let label = if open { "open" } else { "closed" };
            vec![Observation::count(year, Some(label.to_string()))]
        }
        _ => Vec::new(),
    }
}

fn year_publisher(joined: &Joined, _: &Context<'_>) -> Vec<Observation> {
    let publisher = joined.source.as_ref().and_then(conflict::publisher);
    match (year(joined), publisher) {
        (Some(year), Some(name)) => vec![Observation::count(year, Some(name.to_string()))],
        _ => Vec::new(),
    }
}

fn year_h(joined: &Joined, _: &Context<'_>) -> Vec<Observation> {
    joined
        .work
        .citations_by_year
        .iter()
        .filter_map(|c| Some((c.year?, c.cited_by_count?)))
        .filter(|(_, count)| *count > 0)
        .map(|(year, count)| Observation::item(Key::Year(year), None, count))
        .collect()
}

fn year_researcher(joined: &Joined, _: &Context<'_>) -> Vec<Observation> {
    let Some(year) = year(joined) else {
        return Vec::new();
    };
    joined
        .authors
        .iter()
        .flat_map(|person| scienti_labels(&person.ranking))
        .map(|label| Observation::count(year.clone(), Some(label)))
        .collect()
}

fn products_publisher(joined: &Joined, _: &Context<'_>) -> Vec<Observation> {
    joined
        .source
        .as_ref()
        .and_then(conflict::publisher)
        .map(|name| vec![Observation::count(Key::label(name), None)])
        .unwrap_or_default()
}

fn products_subject(joined: &Joined, ctx: &Context<'_>) -> Vec<Observation> {
    conflict::subjects(&joined.work.subjects, ctx.level)
        .into_iter()
        .map(|s| Observation::count(Key::Label(s.name), None))
        .collect()
}

fn products_database(joined: &Joined, _: &Context<'_>) -> Vec<Observation> {
    let mut seen = FxHashSet::default();
    joined
        .work
        .updated
        .iter()
        .filter_map(|u| u.source.as_deref())
        .filter(|source| !source.is_empty() && seen.insert(*source))
        .map(|source| Observation::count(Key::label(source), None))
        .collect()
}

fn products_oa(joined: &Joined, _: &Context<'_>) -> Vec<Observation> {
    conflict::open_access_status(&joined.work)
        .map(|status| vec![Observation::count(Key::label(status), None)])
        .unwrap_or_default()
}

fn products_sex(joined: &Joined, _: &Context<'_>) -> Vec<Observation> {
    joined
        .authors
        .iter()
        .filter_map(|p| p.known_sex())
        .map(|sex| Observation::count(Key::label(sex), None))
        .collect()
}

pub fn age_at(date: i64, birthdate: i64) -> i64 {
    (date - birthdate) / SECONDS_PER_YEAR
}

fn products_age(joined: &Joined, ctx: &Context<'_>) -> Vec<Observation> {
    let Some(date) = joined.work.date_published else {
        return Vec::new();
    };
    joined
        .authors
        .iter()
        .filter_map(|p| p.birthdate_epoch())
        .filter_map(|birth| ctx.config.age_label(age_at(date, birth)))
        .map(|label| Observation::count(Key::label(label), None))
        .collect()
}

fn scienti_rank(joined: &Joined, _: &Context<'_>) -> Vec<Observation> {
    scienti_labels(&joined.work.ranking)
        .next()
        .map(|label| vec![Observation::count(Key::Label(label), None)])
        .unwrap_or_default()
}

fn scimago_rank(joined: &Joined, _: &Context<'_>) -> Vec<Observation> {
    let (Some(date), Some(source)) = (joined.work.date_published, joined.source.as_ref()) else {
        return Vec::new();
    };
    source
        .ranking
        .iter()
        .filter(|r| r.source_is("scimago") && r.in_force_at(date))
        .find_map(Ranking::label)
        .map(|label| vec![Observation::count(Key::Label(label), None)])
        .unwrap_or_default()
}

fn published_institution(joined: &Joined, ctx: &Context<'_>) -> Vec<Observation> {
    let Some(publisher) = joined.source.as_ref().and_then(conflict::publisher) else {
        return Vec::new();
    };
    let publisher = publisher.to_lowercase();
    let same = ctx
        .unit
        .names
        .iter()
        .filter_map(|n| n.name.as_deref())
        .any(|name| name.trim().to_lowercase() == publisher);
    let label = if same { SAME_INSTITUTION } else { OTHER_PUBLISHER };
    vec![Observation::count(Key::label(label), None)]
}

fn collaboration_worldmap(joined: &Joined, _: &Context<'_>) -> Vec<Observation> {
    joined
        .units
        .iter()
        .flat_map(|unit| unit.addresses.iter())
        .filter_map(|a| {
            let code = a.country_code.as_deref().filter(|c| !c.is_empty())?;
            Some(Observation::count(Key::label(code), a.country.clone()))
        })
        .collect()
}

fn collaboration_colombiamap(joined: &Joined, _: &Context<'_>) -> Vec<Observation> {
    joined
        .units
        .iter()
        .flat_map(|unit| unit.addresses.iter())
        .filter(|a| a.country_code.as_deref() == Some("CO"))
        .filter_map(|a| a.city.as_deref().filter(|c| !c.is_empty()))
        .map(|city| Observation::count(Key::label(city), None))
        .collect()
}

fn spec(
    name: &'static str,
    join: Join,
    kind: ValueKind,
    order: Order,
    extract: Extractor,
) -> ReducerSpec {
    ReducerSpec {
        name,
        join,
        kind,
        order,
        shape: Shape::Flat,
        extract,
    }
}

const AUTHORS: Join = Join {
    authors: AuthorJoin::All,
    ..Join::NONE
};
const TAGGED_AUTHORS: Join = Join {
    authors: AuthorJoin::ScopeTagged,
    ..Join::NONE
};
const UNITS: Join = Join {
    units: true,
    ..Join::NONE
};

/// Reducer for every metric folded over the unit's own Work stream.
pub fn reducer_spec(key: MetricKey) -> Option<ReducerSpec> {
    use Order::{ByDimension, ByValueDesc};
    use ValueKind::{Amount, Count, List};
    Some(match key {
        MetricKey::YearType => spec("year_type", Join::NONE, Count, ByDimension, year_type),
        MetricKey::YearCitations => {
            spec("year_citations", Join::NONE, Count, ByDimension, year_citations)
        }
        MetricKey::YearApc => ReducerSpec {
            shape: Shape::Apc,
            ..spec("year_apc", Join::SOURCE, Amount, ByDimension, year_apc)
        },
        MetricKey::YearOa => spec("year_oa", Join::NONE, Count, ByDimension, year_oa),
        MetricKey::YearPublisher => {
            spec("year_publisher", Join::SOURCE, Count, ByDimension, year_publisher)
        }
        MetricKey::YearH => spec("year_h", Join::NONE, List, ByDimension, year_h),
        MetricKey::YearResearcher => spec(
            "year_researcher",
            TAGGED_AUTHORS,
            Count,
            ByDimension,
            year_researcher,
        ),
        MetricKey::ProductsPublisher => spec(
            "products_publisher",
            Join::SOURCE,
            Count,
            ByValueDesc,
            products_publisher,
        ),
        MetricKey::ProductsSubject => {
            spec("products_subject", Join::NONE, Count, ByValueDesc, products_subject)
        }
        MetricKey::ProductsDatabase => {
            spec("products_database", Join::NONE, Count, ByValueDesc, products_database)
        }
        MetricKey::ProductsOa => spec("products_oa", Join::NONE, Count, ByValueDesc, products_oa),
        MetricKey::ProductsSex => spec("products_sex", AUTHORS, Count, ByValueDesc, products_sex),
        MetricKey::ProductsAge => {
            spec("products_age", TAGGED_AUTHORS, Count, ByValueDesc, products_age)
        }
        MetricKey::ScientiRank => spec("scienti_rank", Join::NONE, Count, ByValueDesc, scienti_rank),
        MetricKey::ScimagoRank => {
            spec("scimago_rank", Join::SOURCE, Count, ByValueDesc, scimago_rank)
        }
        MetricKey::PublishedInstitution => spec(
            "published_institution",
            Join::SOURCE,
            Count,
            ByValueDesc,
            published_institution,
        ),
        MetricKey::CollaborationWorldmap => spec(
            "collaboration_worldmap",
            UNITS,
            Count,
            ByValueDesc,
            collaboration_worldmap,
        ),
        MetricKey::CollaborationColombiamap => spec(
            "collaboration_colombiamap",
            UNITS,
            Count,
            ByValueDesc,
            collaboration_colombiamap,
        ),
        MetricKey::YearGroup
        | MetricKey::TitleWords
        | MetricKey::CollaborationNetwork
        | MetricKey::ByAffiliation(..) => return None,
    })
}

type FamilyValue = fn(&Joined) -> Option<(Option<String>, Observed)>;

struct FamilySpec {
    join: Join,
    kind: ValueKind,
    shape: Shape,
    value: FamilyValue,
}

fn family_spec(family: Family) -> FamilySpec {
    match family {
        Family::Type => FamilySpec {
            join: Join::NONE,
            kind: ValueKind::Count,
            shape: Shape::Flat,
            value: |j| first_type(j).map(|kind| (Some(kind), Observed::Weight(1))),
        },
        Family::Citations => FamilySpec {
            join: Join::NONE,
            kind: ValueKind::Count,
            shape: Shape::Flat,
            value: |j| {
                if j.work.citations_count.is_empty() {
                    return None;
                }
                let count = conflict::citations_count(&j.work.citations_count).max(0);
                Some((None, Observed::Weight(count as u64)))
            },
        },
        Family::Products => FamilySpec {
            join: Join::NONE,
            kind: ValueKind::Count,
            shape: Shape::Flat,
            value: |_| Some((None, Observed::Weight(1))),
        },
        Family::Apc => FamilySpec {
            join: Join::SOURCE,
            kind: ValueKind::Amount,
            shape: Shape::Apc,
            value: |j| {
                let (charges, currency) = j.source.as_ref().and_then(conflict::valid_apc)?;
                Some((Some(currency.to_string()), Observed::Amount(charges)))
            },
        },
        Family::H => FamilySpec {
            join: Join::NONE,
            kind: ValueKind::List,
            shape: Shape::Flat,
            value: |j| {
                let count = conflict::citations_count(&j.work.citations_count);
                (count > 0).then_some((None, Observed::Item(count)))
            },
        },
    }
}

/// The rank label in force at `date`; undated Works take the first label.
fn category_at(ranking: &[Ranking], date: Option<i64>) -> Option<String> {
    ranking
        .iter()
        .filter(|r| date.map_or(true, |d| r.in_force_at(d)))
        .find_map(Ranking::label)
}

impl<S: CorpusStore> Engine<S> {
    /// Parses `key` and dispatches it.
    pub fn plot_key(&self, key: &str, request: &PlotRequest) -> Result<PlotResponse> {
        let key = MetricKey::parse(key)?;
        self.plot(key, request)
    }

    /// `{"plot": null}` for unknown units and for metrics that folded
    /// nothing.
    pub fn plot(&self, key: MetricKey, request: &PlotRequest) -> Result<PlotResponse> {
        let unit = match self.find_unit(&request.unit_id) {
            Ok(unit) => unit,
            Err(AnalyticsError::UnitNotFound(id)) => {
                info!("{}: unit {} not found, no plot", key, id);
                return Ok(PlotResponse::empty());
            }
            Err(e) => return Err(e),
        };
        let scope = Self::scope_type(&unit, request.unit_type);
        info!("{} for {} as {}", key, unit.id, scope);

        let ctx = Context {
            config: &self.config,
            unit: &unit,
            scope,
            level: request.level.unwrap_or(self.config.default_subject_level),
        };
        let selection = Selection::years(request.start_year, request.end_year);

        let plot = match key {
            MetricKey::TitleWords => self.title_words(&unit.id)?,
            MetricKey::CollaborationNetwork => self.collaboration_network(&unit.id, scope)?,
            MetricKey::YearGroup => self.year_group(&ctx, &selection)?,
            MetricKey::ByAffiliation(family, relation) => {
                let sibling_scope = request.aff_type.unwrap_or(scope);
                self.by_affiliation(family, relation, sibling_scope, &ctx, &selection)?
            }
            MetricKey::PublishedInstitution => {
                let works = self.select_through_members(&unit.id, &selection)?;
                self.fold_spec(key, works, &ctx)?
            }
            _ => {
                let works = self.select_with(&unit.id, scope, &selection)?;
                self.fold_spec(key, works, &ctx)?
            }
        };
        Ok(PlotResponse::from(plot))
    }

    fn fold_spec<I>(&self, key: MetricKey, works: I, ctx: &Context<'_>) -> Result<Option<Plot>>
    where
        I: Iterator<Item = StoreResult<Work>>,
    {
        match reducer_spec(key) {
            Some(spec) => Ok(fold(&spec, works, &self.store, ctx)?),
            None => Ok(None),
        }
    }

    fn title_words(&self, unit_id: &str) -> Result<Option<Plot>> {
        Ok(self
            .store
            .find_snapshot(unit_id)?
            .and_then(|s| s.top_words)
            .filter(|words| !words.is_null())
            .map(Plot::Words))
    }

    fn collaboration_network(&self, unit_id: &str, scope: UnitType) -> Result<Option<Plot>> {
        if scope.is_narrow() {
            debug!("No coauthorship network for {} scope", scope);
            return Ok(None);
        }
        Ok(self
            .store
            .find_snapshot(unit_id)?
            .and_then(|s| s.coauthorship_network)
            .map(|network| Plot::Network(prune_network(network, self.config.network_top_nodes))))
    }

    /// Year × group category. A group counts its own tagged Works under its
    /// own ranking; broader units count each related group's windowed
    /// member Works that carry a ranking, under that group's ranking.
    fn year_group(&self, ctx: &Context<'_>, selection: &Selection) -> Result<Option<Plot>> {
        let mut tally = Tally::new(ValueKind::Count, Order::ByDimension);
        let unit = ctx.unit;

        if dominant_type(unit) == UnitType::Group {
            let filter = WorkFilter::tagged_unit(&unit.id).years(selection.years);
            for work in self.store.find_works(&filter)? {
                let work = work?;
                let (Some(year), Some(category)) =
                    (work.year_published, category_at(&unit.ranking, work.date_published))
                else {
                    continue;
                };
                tally.add(Observation::count(Key::Year(year), Some(category)));
            }
            return Ok(tally.into_plot(Shape::Flat, ctx.config));
        }

        let groups = related_units(&self.store, &unit.id, Relation::Group, ctx.scope)?;
        debug!("year_group over {} groups of {}", groups.len(), unit.id);
        for group in &groups {
            for work in self.select_through_members(&group.id, &selection.windowed())? {
                let work = work?;
                if work.ranking.is_empty() {
                    continue;
                }
                let (Some(year), Some(category)) =
                    (work.year_published, category_at(&group.ranking, work.date_published))
                else {
                    continue;
                };
                tally.add(Observation::count(Key::Year(year), Some(category)));
            }
        }
        Ok(tally.into_plot(Shape::Flat, ctx.config))
    }

    fn sibling_values(
        &self,
        sibling: &Affiliation,
        family: &FamilySpec,
        config: &EngineConfig,
        level: i64,
        selection: &Selection,
    ) -> Result<Vec<(Option<String>, Observed)>> {
        let ctx = Context {
            config,
            unit: sibling,
            scope: dominant_type(sibling),
            level,
        };
        let mut joiner = Joiner::new(&self.store);
        let mut values = Vec::new();
        for work in self.select_through_members(&sibling.id, &selection.windowed())? {
            let joined = joiner.join(work?, &family.join, &ctx)?;
            values.extend((family.value)(&joined));
        }
        Ok(values)
    }

    /// One record group per sibling unit, in discovery order. A sibling whose
    /// fold fails is logged and left as an empty record. Records are keyed
    /// by display name, so siblings sharing a name fold into one record.
    fn by_affiliation(
        &self,
        family: Family,
        relation: Relation,
        sibling_scope: UnitType,
        ctx: &Context<'_>,
        selection: &Selection,
    ) -> Result<Option<Plot>> {
        let siblings = related_units(&self.store, &ctx.unit.id, relation, sibling_scope)?;
        if siblings.is_empty() {
            debug!(
                "No {} siblings under {} as {}",
                relation.as_str(),
                ctx.unit.id,
                sibling_scope
            );
            return Ok(None);
        }

        let spec = family_spec(family);
        let mut tally = Tally::new(spec.kind, Order::Discovery);
        for sibling in &siblings {
            let name = unit_display_name(sibling);
            match self.sibling_values(sibling, &spec, ctx.config, ctx.level, selection) {
                Ok(values) if !values.is_empty() => {
                    for (series, value) in values {
                        tally.add(Observation {
                            dimension: Key::label(name.clone()),
                            series,
                            value,
                        });
                    }
                }
                Ok(_) => tally.ensure(Key::label(name), None),
                Err(e) => {
                    warn!(
                        "{},{}: sibling {} failed: {}. Recording it empty.",
                        family.as_str(),
                        relation.as_str(),
                        sibling.id,
                        e
                    );
                    tally.ensure(Key::label(name), None);
                }
            }
        }
        Ok(tally.into_plot(spec.shape, ctx.config))
    }
}
