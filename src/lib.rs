//! Affiliation-scoped analytics over a Person / Work / Affiliation / Source
//! corpus: unit scoping with membership windows, per-field provider
//! precedence, and chart-ready aggregate folds.

pub mod config;
pub mod conflict;
pub mod engine;
pub mod error;
pub mod hierarchy;
pub mod metrics;
pub mod model;
pub mod network;
pub mod params;
pub mod products;
pub mod reduce;
pub mod resolve;
pub mod select;
pub mod store;
pub mod window;

pub use config::EngineConfig;
pub use engine::{Engine, UnitInfo};
pub use error::{AnalyticsError, Result, StoreError, StoreResult};
pub use metrics::{MetricKey, PlotRequest, METRIC_KEYS};
pub use params::{ProductsQuery, RawProductsQuery};
pub use products::{ProductsPage, ResearchProduct};
pub use reduce::{Plot, PlotRecord, PlotResponse};
pub use select::{Selection, WorkStream};
pub use store::{CorpusStore, MemoryStore};
pub use window::{window, Bound, MembershipWindow};
