use log::{debug, info};
use serde::Serialize;

use crate::config::EngineConfig;
use crate::conflict;
use crate::error::{AnalyticsError, Result};
use crate::hierarchy::{self, dominant_type, RelatedInfo};
use crate::model::{Address, Affiliation, ExternalId, ExternalUrl, TypeTag, UnitRelation, UnitType};
use crate::resolve::{non_logo_urls, resolve_logo, unit_display_name};
use crate::store::CorpusStore;

/// Stateless analytics entry point over a corpus store. Every request is an
/// independent fold; the engine only owns its configuration and the worker
/// pool used for per-member fan-out.
pub struct Engine<S> {
    pub(crate) store: S,
    pub(crate) config: EngineConfig,
    pub(crate) pool: rayon::ThreadPool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitInfo {
    pub id: String,
    pub name: String,
    pub citations_count: i64,
    pub products_count: u64,
    pub external_urls: Vec<ExternalUrl>,
    pub external_ids: Vec<ExternalId>,
    pub types: Vec<TypeTag>,
    pub addresses: Vec<Address>,
    pub logo: Option<String>,
    pub affiliations: Vec<UnitRelation>,
}

impl<S: CorpusStore> Engine<S> {
    pub fn new(store: S) -> Result<Self> {
        Engine::with_config(store, EngineConfig::default())
    }

    pub fn with_config(store: S, config: EngineConfig) -> Result<Self> {
        let mut builder =
            rayon::ThreadPoolBuilder::new().thread_name(|i| format!("member-fanout-{}", i));
        if config.member_concurrency > 0 {
            builder = builder.num_threads(config.member_concurrency);
        }
        let pool = builder.build()?;
        debug!(
            "Engine ready with {} fan-out threads, batches of {}",
            pool.current_num_threads(),
            config.member_batch_size
        );
        Ok(Engine {
            store,
            config,
            pool,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn find_unit(&self, unit_id: &str) -> Result<Affiliation> {
        self.store
            .find_affiliation(unit_id)?
            .ok_or_else(|| AnalyticsError::UnitNotFound(unit_id.to_string()))
    }

    /// The explicit type when given, otherwise the unit's dominant type.
    pub(crate) fn scope_type(unit: &Affiliation, unit_type: Option<UnitType>) -> UnitType {
        unit_type.unwrap_or_else(|| dominant_type(unit))
    }

    pub fn unit_info(&self, unit_id: &str, unit_type: Option<UnitType>) -> Result<UnitInfo> {
        let unit = self.find_unit(unit_id)?;
        let scope = Self::scope_type(&unit, unit_type);
        info!("Unit info for {} as {}", unit_id, scope);

        let mut citations_count = 0i64;
        let mut products_count = 0u64;
        for work in self.select(unit_id, scope, None, None)? {
            let work = work?;
            citations_count += conflict::citations_count(&work.citations_count);
            products_count += 1;
        }

        Ok(UnitInfo {
            id: unit.id.clone(),
            name: unit_display_name(&unit),
            citations_count,
            products_count,
            external_urls: non_logo_urls(&unit.external_urls),
            external_ids: unit.external_ids.clone(),
            types: unit.types.clone(),
            addresses: unit.addresses.clone(),
            logo: resolve_logo(&unit.external_urls),
            affiliations: hierarchy::upside_relations(&unit.relations, scope),
        })
    }

    /// Sub-units and members listed under a unit at its scope.
    pub fn related_info(&self, unit_id: &str, unit_type: Option<UnitType>) -> Result<RelatedInfo> {
        let unit = self.find_unit(unit_id)?;
        let scope = Self::scope_type(&unit, unit_type);
        Ok(hierarchy::related_info(&self.store, unit_id, scope)?)
    }
}
