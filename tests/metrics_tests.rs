mod common;

use affiliation_analytics::error::{StoreError, StoreResult};
use affiliation_analytics::model::{
    Address, Affiliation, Apc, BibliographicInfo, CitationsByYear, Membership, Network,
    NetworkNode, Person, Publisher, PublisherRecord, Ranking, Source, SourceRef, TypeTag,
    UnitSnapshot, UnitType, Work,
};
use affiliation_analytics::reduce::{Key, Metric, Plot, PlotRecord};
use affiliation_analytics::store::{
    AffiliationFilter, CorpusStore, Cursor, PersonFilter, WorkFilter, WorkOrder, WorkScope,
};
use affiliation_analytics::{
    AnalyticsError, Engine, EngineConfig, MemoryStore, MetricKey, PlotRequest, METRIC_KEYS,
};
use common::{author, cited, engine, epoch, membership, person, store, unit, work};
use serde_json::{json, Map};

/// Delegates to a [`MemoryStore`] but fails every Work query for one author.
struct FailingStore {
    inner: MemoryStore,
    failing_author: String,
}

impl CorpusStore for FailingStore {
    fn find_affiliation(&self, id: &str) -> StoreResult<Option<Affiliation>> {
        self.inner.find_affiliation(id)
    }

    fn find_affiliations(&self, filter: &AffiliationFilter) -> StoreResult<Vec<Affiliation>> {
        self.inner.find_affiliations(filter)
    }

    fn find_person(&self, id: &str) -> StoreResult<Option<Person>> {
        self.inner.find_person(id)
    }

    fn find_persons<'a>(&'a self, filter: &PersonFilter) -> StoreResult<Cursor<'a, Person>> {
        self.inner.find_persons(filter)
    }

    fn find_source(&self, id: &str) -> StoreResult<Option<Source>> {
        self.inner.find_source(id)
    }

    fn find_works<'a>(&'a self, filter: &WorkFilter) -> StoreResult<Cursor<'a, Work>> {
        if filter.scope == WorkScope::Author(self.failing_author.clone()) {
            return Err(StoreError::Backend("connection reset".to_string()));
        }
        self.inner.find_works(filter)
    }

    fn find_works_page(
        &self,
        filter: &WorkFilter,
        order: &WorkOrder,
        skip: usize,
        limit: usize,
    ) -> StoreResult<Vec<Work>> {
        self.inner.find_works_page(filter, order, skip, limit)
    }

    fn count_works(&self, filter: &WorkFilter) -> StoreResult<u64> {
        self.inner.count_works(filter)
    }

    fn find_snapshot(&self, unit_id: &str) -> StoreResult<Option<UnitSnapshot>> {
        self.inner.find_snapshot(unit_id)
    }
}

fn records(plot: &Option<Plot>) -> Vec<PlotRecord> {
    plot.as_ref()
        .and_then(|p| p.records())
        .map(<[PlotRecord]>::to_vec)
        .unwrap_or_default()
}

fn typed(mut work: Work, kind: &str) -> Work {
    work.types = vec![TypeTag::new("openalex", kind)];
    work
}

fn from_source(mut work: Work, source_id: &str) -> Work {
    work.source = Some(SourceRef {
        id: Some(source_id.to_string()),
        name: None,
    });
    work
}

fn source(id: &str, publisher: Option<Publisher>, charges: Option<f64>) -> Source {
    Source {
        id: id.to_string(),
        publisher,
        apc: charges.map(|c| Apc {
            charges: Some(c),
            currency: Some("USD".to_string()),
        }),
        ..Source::default()
    }
}

fn record_publisher(name: &str) -> Option<Publisher> {
    Some(Publisher::Record(PublisherRecord {
        name: Some(json!(name)),
        country_code: None,
    }))
}

fn rank(source: &str, label: &str, from: Option<i64>, to: Option<i64>) -> Ranking {
    Ranking {
        from_date: from,
        to_date: to,
        ..Ranking::new(source, label)
    }
}

fn ranked_person(id: &str, label: &str, memberships: Vec<Membership>) -> Person {
    let mut p = person(id, memberships);
    p.ranking = vec![rank("scienti", label, None, None)];
    p
}

fn open_access(mut work: Work, open: Option<bool>, status: Option<&str>) -> Work {
    work.bibliographic_info = Some(BibliographicInfo {
        is_open_access: open,
        open_access_status: status.map(str::to_string),
        ..BibliographicInfo::default()
    });
    work
}

fn by_year(mut work: Work, counts: &[(Option<i64>, i64)]) -> Work {
    work.citations_by_year = counts
        .iter()
        .map(|(year, count)| CitationsByYear {
            cited_by_count: Some(*count),
            year: *year,
        })
        .collect();
    work
}

fn located(mut unit: Affiliation, code: &str, country: &str, city: &str) -> Affiliation {
    unit.addresses = vec![Address {
        country_code: Some(code.to_string()),
        country: Some(country.to_string()),
        city: Some(city.to_string()),
        ..Address::default()
    }];
    unit
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_dispatch_key_parses() -> Result<(), Box<dyn std::error::Error>> {
        for raw in METRIC_KEYS {
            let key = MetricKey::parse(raw)?;
            assert_eq!(key.to_string(), raw);
        }
        Ok(())
    }

    #[test]
    fn test_unknown_keys_are_invalid() {
        for raw in ["bogus", "type,author", "citations,", "weight,group"] {
            match MetricKey::parse(raw) {
                Err(AnalyticsError::InvalidQueryParameter { name, .. }) => assert_eq!(name, "metric"),
                other => panic!("{} should be rejected, got {:?}", raw, other),
            }
        }
    }

    #[test]
    fn test_missing_unit_yields_null_plot() -> Result<(), Box<dyn std::error::Error>> {
        let engine = engine(store(Vec::new(), Vec::new(), Vec::new()));
        for raw in ["year_type", "products,faculty", "collaboration_network"] {
            let response = engine.plot_key(raw, &PlotRequest::new("NOPE"))?;
            assert_eq!(serde_json::to_value(&response)?, json!({ "plot": null }));
        }
        Ok(())
    }

    #[test]
    fn test_year_type_sorted_by_year_then_type() -> Result<(), Box<dyn std::error::Error>> {
        let engine = engine(store(
            vec![unit("INST", "Universidad", "education", &[])],
            Vec::new(),
            vec![
                typed(work("W1", 2019, vec![author("A", &["INST"])]), "article"),
                typed(work("W2", 2018, vec![author("A", &["INST"])]), "book"),
                typed(work("W3", 2018, vec![author("A", &["INST"])]), "article"),
                work("W4", 2018, vec![author("A", &["INST"])]),
            ],
        ));
        let response = engine.plot(MetricKey::YearType, &PlotRequest::new("INST"))?;
        assert_eq!(
            serde_json::to_value(&response)?,
            json!({ "plot": [
                { "dimension": 2018, "series": "article", "value": 1 },
                { "dimension": 2018, "series": "book", "value": 1 },
                { "dimension": 2019, "series": "article", "value": 1 },
            ]})
        );
        Ok(())
    }

    #[test]
    fn test_year_filter_applies_to_institution_plots() -> Result<(), Box<dyn std::error::Error>> {
        let engine = engine(store(
            vec![unit("INST", "Universidad", "education", &[])],
            Vec::new(),
            vec![
                typed(work("W1", 2019, vec![author("A", &["INST"])]), "article"),
                typed(work("W2", 2015, vec![author("A", &["INST"])]), "article"),
            ],
        ));
        let request = PlotRequest::new("INST").years(Some(2018), None);
        let response = engine.plot(MetricKey::YearType, &request)?;
        let records = records(&response.plot);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].dimension, Key::Year(2019));
        Ok(())
    }

    #[test]
    fn test_year_apc_defaults_undated_works() -> Result<(), Box<dyn std::error::Error>> {
        let mut undated = from_source(work("W1", 2021, vec![author("A", &["INST"])]), "S1");
        undated.year_published = None;
        let engine = engine(MemoryStore::new(
            vec![unit("INST", "Universidad", "education", &[])],
            Vec::new(),
            vec![
                undated,
                from_source(work("W2", 2021, vec![author("A", &["INST"])]), "S1"),
                from_source(work("W3", 2021, vec![author("A", &["INST"])]), "S2"),
            ],
            vec![source("S1", None, Some(100.0)), source("S2", None, None)],
            Vec::new(),
        ));
        let response = engine.plot(MetricKey::YearApc, &PlotRequest::new("INST"))?;
        assert_eq!(
            serde_json::to_value(&response)?,
            json!({ "plot": {
                "reference_year": 2022,
                "records": [
                    { "dimension": 2020, "series": "USD", "value": 100.0 },
                    { "dimension": 2021, "series": "USD", "value": 100.0 },
                ]
            }})
        );
        Ok(())
    }

    #[test]
    fn test_bare_publisher_is_not_counted() -> Result<(), Box<dyn std::error::Error>> {
        let engine = engine(MemoryStore::new(
            vec![unit("INST", "Universidad", "education", &[])],
            Vec::new(),
            vec![
                from_source(work("W1", 2020, vec![author("A", &["INST"])]), "S1"),
                from_source(work("W2", 2020, vec![author("A", &["INST"])]), "S2"),
                from_source(work("W3", 2021, vec![author("A", &["INST"])]), "S1"),
            ],
            vec![
                source("S1", record_publisher("Elsevier"), None),
                source("S2", Some(Publisher::Bare("Springer".to_string())), None),
            ],
            Vec::new(),
        ));
        let response = engine.plot(MetricKey::ProductsPublisher, &PlotRequest::new("INST"))?;
        assert_eq!(
            serde_json::to_value(&response)?,
            json!({ "plot": [{ "dimension": "Elsevier", "value": 2 }] })
        );
        Ok(())
    }

    #[test]
    fn test_published_institution_matches_unit_name() -> Result<(), Box<dyn std::error::Error>> {
        let engine = engine(MemoryStore::new(
            vec![unit("INST", "Universidad de Antioquia", "education", &[])],
            vec![person("P1", vec![membership("INST", -1, -1)])],
            vec![
                from_source(work("W1", 2020, vec![author("P1", &[])]), "S1"),
                from_source(work("W2", 2020, vec![author("P1", &[])]), "S2"),
                from_source(work("W3", 2021, vec![author("P1", &[])]), "S2"),
            ],
            vec![
                source("S1", record_publisher("universidad de antioquia"), None),
                source("S2", record_publisher("Elsevier"), None),
            ],
            Vec::new(),
        ));
        let response = engine.plot(MetricKey::PublishedInstitution, &PlotRequest::new("INST"))?;
        let records = records(&response.plot);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].dimension, Key::label("other_publisher"));
        assert_eq!(records[0].value, Metric::Count(2));
        assert_eq!(records[1].dimension, Key::label("same_institution"));
        assert_eq!(records[1].value, Metric::Count(1));
        Ok(())
    }

    #[test]
    fn test_products_by_faculty_records_failed_sibling_empty() -> Result<(), Box<dyn std::error::Error>> {
        let inner = store(
            vec![
                unit("INST", "Universidad", "education", &[]),
                unit("F1", "Facultad Uno", "faculty", &[("INST", "education")]),
                unit("F2", "Facultad Dos", "faculty", &[("INST", "education")]),
                unit("F3", "Facultad Tres", "faculty", &[("INST", "education")]),
            ],
            vec![
                person("P1", vec![membership("F1", -1, -1)]),
                person("BAD", vec![membership("F2", -1, -1)]),
            ],
            vec![
                work("W1", 2020, vec![author("P1", &[])]),
                work("W2", 2021, vec![author("P1", &[])]),
                work("W3", 2021, vec![author("BAD", &[])]),
            ],
        );
        let engine = Engine::with_config(
            FailingStore {
                inner,
                failing_author: "BAD".to_string(),
            },
            EngineConfig {
                member_concurrency: 2,
                ..EngineConfig::default()
            },
        )?;
        let key = MetricKey::parse("products,faculty")?;
        let response = engine.plot(key, &PlotRequest::new("INST"))?;
        assert_eq!(
            serde_json::to_value(&response)?,
            json!({ "plot": [
                { "dimension": "Facultad Uno", "value": 2 },
                { "dimension": "Facultad Dos", "value": 0 },
                { "dimension": "Facultad Tres", "value": 0 },
            ]})
        );
        Ok(())
    }

    #[test]
    fn test_citations_by_group_sums_resolved_counts() -> Result<(), Box<dyn std::error::Error>> {
        let engine = engine(store(
            vec![
                unit("DEP", "Departamento", "department", &[]),
                unit("G1", "Grupo Uno", "group", &[("DEP", "department")]),
            ],
            vec![person("P1", vec![membership("G1", -1, -1)])],
            vec![
                cited(work("W1", 2020, vec![author("P1", &[])]), 4),
                cited(work("W2", 2021, vec![author("P1", &[])]), 6),
                work("W3", 2021, vec![author("P1", &[])]),
            ],
        ));
        let key = MetricKey::parse("citations,group")?;
        let response = engine.plot(key, &PlotRequest::new("DEP"))?;
        let records = records(&response.plot);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].dimension, Key::label("Grupo Uno"));
        assert_eq!(records[0].value, Metric::Count(10));
        Ok(())
    }

    #[test]
    fn test_collaboration_network_is_institution_only() -> Result<(), Box<dyn std::error::Error>> {
        let network = Network {
            nodes: (0..60)
                .map(|i| NetworkNode {
                    id: json!(format!("N{}", i)),
                    degree: (60 - i) as f64,
                    extra: Map::new(),
                })
                .collect(),
            edges: Vec::new(),
        };
        let snapshot = |id: &str| UnitSnapshot {
            id: id.to_string(),
            top_words: None,
            coauthorship_network: Some(network.clone()),
        };
        let engine = engine(MemoryStore::new(
            vec![
                unit("INST", "Universidad", "education", &[]),
                unit("G1", "Grupo", "group", &[]),
            ],
            Vec::new(),
            Vec::new(),
            Vec::new(),
            vec![snapshot("INST"), snapshot("G1")],
        ));

        let narrow = engine.plot(MetricKey::CollaborationNetwork, &PlotRequest::new("G1"))?;
        assert_eq!(narrow.plot, None);

        let wide = engine.plot(MetricKey::CollaborationNetwork, &PlotRequest::new("INST"))?;
        match wide.plot {
            Some(Plot::Network(pruned)) => assert_eq!(pruned.nodes.len(), 50),
            other => panic!("expected a network, got {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_title_words_pass_through() -> Result<(), Box<dyn std::error::Error>> {
        let words = json!([{ "name": "malaria", "value": 12 }]);
        let engine = engine(MemoryStore::new(
            vec![unit("G1", "Grupo", "group", &[])],
            Vec::new(),
            Vec::new(),
            Vec::new(),
            vec![UnitSnapshot {
                id: "G1".to_string(),
                top_words: Some(words.clone()),
                coauthorship_network: None,
            }],
        ));
        let response = engine.plot(MetricKey::TitleWords, &PlotRequest::new("G1"))?;
        assert_eq!(serde_json::to_value(&response)?, json!({ "plot": words }));
        Ok(())
    }

    #[test]
    fn test_group_metrics_count_shared_work_once() -> Result<(), Box<dyn std::error::Error>> {
        let engine = engine(store(
            vec![unit("G1", "Grupo", "group", &[])],
            vec![
                person("P1", vec![membership("G1", -1, -1)]),
                person("P2", vec![membership("G1", -1, -1)]),
            ],
            vec![typed(
                work("W1", 2020, vec![author("P1", &[]), author("P2", &[])]),
                "article",
            )],
        ));
        let request = PlotRequest::new("G1").unit_type(UnitType::Group);
        let response = engine.plot(MetricKey::YearType, &request)?;
        let records = records(&response.plot);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].value, Metric::Count(1));
        Ok(())
    }

    #[test]
    fn test_h_by_group_lists_positive_counts_per_sibling() -> Result<(), Box<dyn std::error::Error>> {
        let engine = engine(store(
            vec![
                unit("DEP", "Departamento", "department", &[]),
                unit("G1", "Grupo Uno", "group", &[("DEP", "department")]),
                unit("G2", "Grupo Dos", "group", &[("DEP", "department")]),
                unit("G3", "Grupo Tres", "group", &[("DEP", "department")]),
            ],
            vec![
                person("P1", vec![membership("G1", -1, -1)]),
                person("P2", vec![membership("G2", -1, -1)]),
            ],
            vec![
                cited(work("W1", 2020, vec![author("P1", &[])]), 4),
                cited(work("W2", 2020, vec![author("P1", &[])]), 0),
                work("W3", 2021, vec![author("P1", &[])]),
                cited(work("W4", 2021, vec![author("P2", &[])]), 7),
            ],
        ));
        let key = MetricKey::parse("h,group")?;
        let response = engine.plot(key, &PlotRequest::new("DEP"))?;
        assert_eq!(
            serde_json::to_value(&response)?,
            json!({ "plot": [
                { "dimension": "Grupo Uno", "value": [4] },
                { "dimension": "Grupo Dos", "value": [7] },
                { "dimension": "Grupo Tres", "value": [] },
            ]})
        );
        Ok(())
    }

    #[test]
    fn test_siblings_sharing_a_name_fold_together() -> Result<(), Box<dyn std::error::Error>> {
        let engine = engine(store(
            vec![
                unit("DEP", "Departamento", "department", &[]),
                unit("G1", "Grupo", "group", &[("DEP", "department")]),
                unit("G2", "Grupo", "group", &[("DEP", "department")]),
            ],
            vec![
                person("P1", vec![membership("G1", -1, -1)]),
                person("P2", vec![membership("G2", -1, -1)]),
            ],
            vec![
                work("W1", 2020, vec![author("P1", &[])]),
                work("W2", 2020, vec![author("P2", &[])]),
                work("W3", 2021, vec![author("P2", &[])]),
            ],
        ));
        let key = MetricKey::parse("products,group")?;
        let response = engine.plot(key, &PlotRequest::new("DEP"))?;
        assert_eq!(
            serde_json::to_value(&response)?,
            json!({ "plot": [{ "dimension": "Grupo", "value": 3 }] })
        );
        Ok(())
    }

    fn open_access_engine() -> Engine<MemoryStore> {
        engine(store(
            vec![unit("INST", "Universidad", "education", &[])],
            Vec::new(),
            vec![
                open_access(work("W1", 2020, vec![author("A", &["INST"])]), Some(true), Some("gold")),
                open_access(work("W2", 2020, vec![author("A", &["INST"])]), Some(false), Some("closed")),
                work("W3", 2021, vec![author("A", &["INST"])]),
                open_access(work("W4", 2021, vec![author("A", &["INST"])]), None, Some("gold")),
            ],
        ))
    }

    #[test]
    fn test_year_oa_skips_works_without_access_info() -> Result<(), Box<dyn std::error::Error>> {
        let response = open_access_engine().plot(MetricKey::YearOa, &PlotRequest::new("INST"))?;
        assert_eq!(
            serde_json::to_value(&response)?,
            json!({ "plot": [
                { "dimension": 2020, "series": "closed", "value": 1 },
                { "dimension": 2020, "series": "open", "value": 1 },
            ]})
        );
        Ok(())
    }

    #[test]
    fn test_products_oa_counts_statuses_only() -> Result<(), Box<dyn std::error::Error>> {
        let response = open_access_engine().plot(MetricKey::ProductsOa, &PlotRequest::new("INST"))?;
        assert_eq!(
            serde_json::to_value(&response)?,
            json!({ "plot": [
                { "dimension": "gold", "value": 2 },
                { "dimension": "closed", "value": 1 },
            ]})
        );
        Ok(())
    }

    #[test]
    fn test_year_group_for_a_group_uses_rank_in_force() -> Result<(), Box<dyn std::error::Error>> {
        let mut group = unit("G1", "Grupo Uno", "group", &[]);
        group.ranking = vec![
            rank("scienti", "A1", Some(epoch(2010)), Some(epoch(2015))),
            rank("scienti", "B", Some(epoch(2015) + 1), None),
        ];
        let mut undated = work("W2019", 2019, vec![author("P1", &["G1"])]);
        undated.date_published = None;
        let engine = engine(store(
            vec![group],
            Vec::new(),
            vec![
                work("W2012", 2012, vec![author("P1", &["G1"])]),
                work("W2017", 2017, vec![author("P1", &["G1"])]),
                undated,
                work("WOTHER", 2017, vec![author("P1", &[])]),
            ],
        ));
        let response = engine.plot(MetricKey::YearGroup, &PlotRequest::new("G1"))?;
        assert_eq!(
            serde_json::to_value(&response)?,
            json!({ "plot": [
                { "dimension": 2012, "series": "A1", "value": 1 },
                { "dimension": 2017, "series": "B", "value": 1 },
                { "dimension": 2019, "series": "A1", "value": 1 },
            ]})
        );
        Ok(())
    }

    #[test]
    fn test_year_group_for_an_institution_windows_group_members() -> Result<(), Box<dyn std::error::Error>> {
        let mut group = unit("G1", "Grupo Uno", "group", &[("INST", "education")]);
        group.ranking = vec![rank("scienti", "A1", None, None)];
        let with_rank = |mut w: Work| {
            w.ranking = vec![rank("scienti", "A", None, None)];
            w
        };
        let engine = engine(store(
            vec![unit("INST", "Universidad", "education", &[]), group],
            vec![person("P1", vec![membership("G1", epoch(2010), epoch(2016))])],
            vec![
                with_rank(work("W2012", 2012, vec![author("P1", &[])])),
                work("W2014", 2014, vec![author("P1", &[])]),
                with_rank(work("W2018", 2018, vec![author("P1", &[])])),
            ],
        ));
        let response = engine.plot(MetricKey::YearGroup, &PlotRequest::new("INST"))?;
        assert_eq!(
            serde_json::to_value(&response)?,
            json!({ "plot": [{ "dimension": 2012, "series": "A1", "value": 1 }] })
        );
        Ok(())
    }

    #[test]
    fn test_year_group_follows_first_type_tag() -> Result<(), Box<dyn std::error::Error>> {
        let mut mixed = unit("U", "Unidad", "faculty", &[]);
        mixed.types.push(TypeTag::new("scienti", "group"));
        mixed.ranking = vec![rank("scienti", "A1", None, None)];
        let engine = engine(store(
            vec![mixed],
            Vec::new(),
            vec![work("W1", 2020, vec![author("P1", &["U"])])],
        ));
        let response = engine.plot(MetricKey::YearGroup, &PlotRequest::new("U"))?;
        assert_eq!(response.plot, None);
        Ok(())
    }

    #[test]
    fn test_year_researcher_scopes_authors() -> Result<(), Box<dyn std::error::Error>> {
        let engine = engine(store(
            vec![
                unit("INST", "Universidad", "education", &[]),
                unit("G1", "Grupo Uno", "group", &[("INST", "education")]),
            ],
            vec![
                ranked_person("P1", "Senior", vec![membership("G1", -1, -1)]),
                ranked_person("P2", "Junior", vec![membership("G1", -1, -1)]),
            ],
            vec![work("W1", 2020, vec![author("P1", &["INST"]), author("P2", &[])])],
        ));

        let institution = engine.plot(MetricKey::YearResearcher, &PlotRequest::new("INST"))?;
        assert_eq!(
            serde_json::to_value(&institution)?,
            json!({ "plot": [{ "dimension": 2020, "series": "Senior", "value": 1 }] })
        );

        let group = engine.plot(MetricKey::YearResearcher, &PlotRequest::new("G1"))?;
        assert_eq!(
            serde_json::to_value(&group)?,
            json!({ "plot": [
                { "dimension": 2020, "series": "Junior", "value": 1 },
                { "dimension": 2020, "series": "Senior", "value": 1 },
            ]})
        );
        Ok(())
    }

    #[test]
    fn test_products_age_buckets_tagged_authors() -> Result<(), Box<dyn std::error::Error>> {
        let born = |id: &str, birthdate: serde_json::Value| {
            let mut p = person(id, Vec::new());
            p.birthdate = Some(birthdate);
            p
        };
        let engine = engine(store(
            vec![unit("INST", "Universidad", "education", &[])],
            vec![
                born("P1", json!(epoch(1990))),
                born("P2", json!(epoch(2000))),
                born("P3", json!(-1)),
                born("P4", json!(epoch(1990))),
            ],
            vec![
                work(
                    "W1",
                    2020,
                    vec![
                        author("P1", &["INST"]),
                        author("P2", &["INST"]),
                        author("P3", &["INST"]),
                        author("P4", &[]),
                    ],
                ),
                work("W2", 2020, vec![author("P1", &["INST"])]),
            ],
        ));
        let response = engine.plot(MetricKey::ProductsAge, &PlotRequest::new("INST"))?;
        assert_eq!(
            serde_json::to_value(&response)?,
            json!({ "plot": [
                { "dimension": "27-59", "value": 2 },
                { "dimension": "14-26", "value": 1 },
            ]})
        );
        Ok(())
    }

    #[test]
    fn test_products_sex_counts_every_author() -> Result<(), Box<dyn std::error::Error>> {
        let sexed = |id: &str, sex: Option<&str>| {
            let mut p = person(id, Vec::new());
            p.sex = sex.map(str::to_string);
            p
        };
        let engine = engine(store(
            vec![unit("INST", "Universidad", "education", &[])],
            vec![
                sexed("P1", Some("Hombre")),
                sexed("P2", Some("Mujer")),
                sexed("P3", Some("  ")),
                sexed("P4", None),
            ],
            vec![
                work(
                    "W1",
                    2020,
                    vec![author("P1", &["INST"]), author("P2", &[]), author("P3", &[])],
                ),
                work("W2", 2021, vec![author("P2", &["INST"]), author("P4", &[])]),
            ],
        ));
        let response = engine.plot(MetricKey::ProductsSex, &PlotRequest::new("INST"))?;
        assert_eq!(
            serde_json::to_value(&response)?,
            json!({ "plot": [
                { "dimension": "Mujer", "value": 2 },
                { "dimension": "Hombre", "value": 1 },
            ]})
        );
        Ok(())
    }

    #[test]
    fn test_scimago_rank_in_force_at_publication() -> Result<(), Box<dyn std::error::Error>> {
        let mut journal = source("S1", None, None);
        journal.ranking = vec![
            rank("scienti", "A", None, None),
            rank("scimago", "Q2", None, Some(epoch(2019))),
            rank("scimago", "Q1", Some(epoch(2019) + 1), None),
        ];
        let mut undated = from_source(work("W4", 2021, vec![author("A", &["INST"])]), "S1");
        undated.date_published = None;
        let engine = engine(MemoryStore::new(
            vec![unit("INST", "Universidad", "education", &[])],
            Vec::new(),
            vec![
                from_source(work("W1", 2018, vec![author("A", &["INST"])]), "S1"),
                from_source(work("W2", 2020, vec![author("A", &["INST"])]), "S1"),
                from_source(work("W3", 2021, vec![author("A", &["INST"])]), "S1"),
                undated,
            ],
            vec![journal],
            Vec::new(),
        ));
        let response = engine.plot(MetricKey::ScimagoRank, &PlotRequest::new("INST"))?;
        assert_eq!(
            serde_json::to_value(&response)?,
            json!({ "plot": [
                { "dimension": "Q1", "value": 2 },
                { "dimension": "Q2", "value": 1 },
            ]})
        );
        Ok(())
    }

    fn collaboration_engine() -> Engine<MemoryStore> {
        engine(store(
            vec![
                located(unit("INST", "Universidad", "education", &[]), "CO", "Colombia", "Medellín"),
                located(unit("EXT", "Harvard", "education", &[]), "US", "United States", "Boston"),
                located(unit("BOG", "Nacional", "education", &[]), "CO", "Colombia", "Bogotá"),
                unit("NOADDR", "Sin dirección", "education", &[]),
            ],
            Vec::new(),
            vec![
                work("W1", 2020, vec![author("A", &["INST"]), author("B", &["EXT"])]),
                work("W2", 2021, vec![author("A", &["INST", "NOADDR"]), author("C", &["BOG"])]),
            ],
        ))
    }

    #[test]
    fn test_worldmap_counts_author_affiliation_countries() -> Result<(), Box<dyn std::error::Error>> {
        let response =
            collaboration_engine().plot(MetricKey::CollaborationWorldmap, &PlotRequest::new("INST"))?;
        assert_eq!(
            serde_json::to_value(&response)?,
            json!({ "plot": [
                { "dimension": "CO", "series": "Colombia", "value": 3 },
                { "dimension": "US", "series": "United States", "value": 1 },
            ]})
        );
        Ok(())
    }

    #[test]
    fn test_colombiamap_counts_colombian_cities() -> Result<(), Box<dyn std::error::Error>> {
        let response = collaboration_engine()
            .plot(MetricKey::CollaborationColombiamap, &PlotRequest::new("INST"))?;
        assert_eq!(
            serde_json::to_value(&response)?,
            json!({ "plot": [
                { "dimension": "Medellín", "value": 2 },
                { "dimension": "Bogotá", "value": 1 },
            ]})
        );
        Ok(())
    }

    fn citations_by_year_engine() -> Engine<MemoryStore> {
        engine(store(
            vec![unit("INST", "Universidad", "education", &[])],
            Vec::new(),
            vec![
                by_year(
                    work("W1", 2018, vec![author("A", &["INST"])]),
                    &[(Some(2019), 3), (Some(2020), 0), (None, 9)],
                ),
                by_year(
                    work("W2", 2018, vec![author("A", &["INST"])]),
                    &[(Some(2019), 2), (Some(2021), 5)],
                ),
            ],
        ))
    }

    #[test]
    fn test_year_citations_sums_positive_counts() -> Result<(), Box<dyn std::error::Error>> {
        let response =
            citations_by_year_engine().plot(MetricKey::YearCitations, &PlotRequest::new("INST"))?;
        assert_eq!(
            serde_json::to_value(&response)?,
            json!({ "plot": [
                { "dimension": 2019, "value": 5 },
                { "dimension": 2021, "value": 5 },
            ]})
        );
        Ok(())
    }

    #[test]
    fn test_year_h_lists_counts_per_year() -> Result<(), Box<dyn std::error::Error>> {
        let response = citations_by_year_engine().plot(MetricKey::YearH, &PlotRequest::new("INST"))?;
        assert_eq!(
            serde_json::to_value(&response)?,
            json!({ "plot": [
                { "dimension": 2019, "value": [3, 2] },
                { "dimension": 2021, "value": [5] },
            ]})
        );
        Ok(())
    }
}
