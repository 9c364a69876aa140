//! Request-parameter parsing. Every rejected value surfaces as
//! `InvalidQueryParameter`; the page-size clamp is the only coercion.

use log::debug;

use crate::config::EngineConfig;
use crate::error::{AnalyticsError, Result};
use crate::store::{Direction, SortKey, WorkOrder, YearRange};

/// Blank values are absent; anything else must be an integer year.
pub fn parse_year(name: &'static str, raw: Option<&str>) -> Result<Option<i64>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse::<i64>()
            .map(Some)
            .map_err(|_| AnalyticsError::invalid(name, value)),
    }
}

fn parse_positive(name: &'static str, raw: Option<&str>) -> Result<Option<usize>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => match value.parse::<usize>() {
            Ok(0) | Err(_) => Err(AnalyticsError::invalid(name, value)),
            Ok(n) => Ok(Some(n)),
        },
    }
}

pub fn parse_sort(raw: Option<&str>) -> Result<SortKey> {
    match raw.map(str::trim) {
        None | Some("") => Ok(SortKey::default()),
        Some("citations") => Ok(SortKey::Citations),
        Some("year") => Ok(SortKey::Year),
        Some(other) => Err(AnalyticsError::invalid("sort", other)),
    }
}

pub fn parse_direction(raw: Option<&str>) -> Result<Direction> {
    match raw.map(str::trim) {
        None | Some("") => Ok(Direction::default()),
        Some("ascending") => Ok(Direction::Ascending),
        Some("descending") => Ok(Direction::Descending),
        Some(other) => Err(AnalyticsError::invalid("direction", other)),
    }
}

/// Listing parameters as they arrive from the transport layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawProductsQuery {
    pub start_year: Option<String>,
    pub end_year: Option<String>,
    pub page: Option<String>,
    pub max: Option<String>,
    pub sort: Option<String>,
    pub direction: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductsQuery {
    pub years: YearRange,
    pub page: usize,
    pub max_results: usize,
    pub order: WorkOrder,
}

impl ProductsQuery {
    pub fn parse(raw: &RawProductsQuery, config: &EngineConfig) -> Result<Self> {
        let start_year = parse_year("start_year", raw.start_year.as_deref())?;
        let end_year = parse_year("end_year", raw.end_year.as_deref())?;
        let page = parse_positive("page", raw.page.as_deref())?.unwrap_or(1);
        let requested = parse_positive("max", raw.max.as_deref())?.unwrap_or(config.default_page_size);
        let max_results = requested.min(config.max_page_size);
        if max_results < requested {
            debug!("Clamped page size {} to {}", requested, max_results);
        }
        Ok(ProductsQuery {
            years: YearRange::new(start_year, end_year),
            page,
            max_results,
            order: WorkOrder {
                key: parse_sort(raw.sort.as_deref())?,
                direction: parse_direction(raw.direction.as_deref())?,
            },
        })
    }

    pub fn skip(&self) -> usize {
        (self.page - 1).saturating_mul(self.max_results)
    }
}
