use crate::error::AnalyticsError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitType {
    Institution,
    Faculty,
    Department,
    Group,
}

impl UnitType {
    pub fn as_str(self) -> &'static str {
        match self {
            UnitType::Institution => "institution",
            UnitType::Faculty => "faculty",
            UnitType::Department => "department",
            UnitType::Group => "group",
        }
    }

    /// Group, department and faculty scopes resolve Works through members.
    pub fn is_narrow(self) -> bool {
        !matches!(self, UnitType::Institution)
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "institution" | "education" => Some(UnitType::Institution),
            "faculty" => Some(UnitType::Faculty),
            "department" => Some(UnitType::Department),
            "group" => Some(UnitType::Group),
            _ => None,
        }
    }
}

impl fmt::Display for UnitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnitType {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "institution" => Ok(UnitType::Institution),
            "faculty" => Ok(UnitType::Faculty),
            "department" => Ok(UnitType::Department),
            "group" => Ok(UnitType::Group),
            other => Err(AnalyticsError::invalid("unit_type", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    Faculty,
    Department,
    Group,
    Author,
}

impl Relation {
    pub fn unit_type(self) -> Option<UnitType> {
        match self {
            Relation::Faculty => Some(UnitType::Faculty),
            Relation::Department => Some(UnitType::Department),
            Relation::Group => Some(UnitType::Group),
            Relation::Author => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Relation::Faculty => "faculty",
            Relation::Department => "department",
            Relation::Group => "group",
            Relation::Author => "author",
        }
    }
}

impl FromStr for Relation {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "faculty" => Ok(Relation::Faculty),
            "department" => Ok(Relation::Department),
            "group" => Ok(Relation::Group),
            "author" => Ok(Relation::Author),
            other => Err(AnalyticsError::invalid("relation", other)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Name {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub lang: Option<String>,
}

impl Name {
    pub fn new(name: &str, lang: &str) -> Self {
        Name {
            name: Some(name.to_string()),
            lang: Some(lang.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeTag {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

impl TypeTag {
    pub fn new(source: &str, kind: &str) -> Self {
        TypeTag {
            source: Some(source.to_string()),
            kind: Some(kind.to_string()),
        }
    }

    pub fn unit_type(&self) -> Option<UnitType> {
        self.kind.as_deref().and_then(UnitType::from_tag)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalId {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<String>,
}

impl ExternalId {
    pub fn new(source: &str, id: &str) -> Self {
        ExternalId {
            id: Value::String(id.to_string()),
            source: Some(source.to_string()),
            provenance: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalUrl {
    #[serde(default)]
    pub url: Value,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnitRelation {
    #[serde(default, deserialize_with = "opt_object_id")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation: Option<String>,
    #[serde(default)]
    pub types: Vec<TypeTag>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ranking {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub rank: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_date: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_date: Option<i64>,
}

impl Ranking {
    pub fn new(source: &str, rank: &str) -> Self {
        Ranking {
            source: Some(source.to_string()),
            rank: Some(Value::String(rank.to_string())),
            from_date: None,
            to_date: None,
        }
    }

    pub fn label(&self) -> Option<String> {
        value_label(self.rank.as_ref()?)
    }

    pub fn source_is(&self, prefix: &str) -> bool {
        self.source
            .as_deref()
            .is_some_and(|s| s.to_ascii_lowercase().starts_with(prefix))
    }

    /// Rankings without validity dates are in force at any date.
    pub fn in_force_at(&self, date: i64) -> bool {
        self.from_date.map_or(true, |from| from <= date) && self.to_date.map_or(true, |to| date <= to)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Affiliation {
    #[serde(alias = "_id", deserialize_with = "object_id")]
    pub id: String,
    #[serde(default)]
    pub names: Vec<Name>,
    #[serde(default)]
    pub types: Vec<TypeTag>,
    #[serde(default)]
    pub relations: Vec<UnitRelation>,
    #[serde(default)]
    pub addresses: Vec<Address>,
    #[serde(default)]
    pub external_ids: Vec<ExternalId>,
    #[serde(default)]
    pub external_urls: Vec<ExternalUrl>,
    #[serde(default)]
    pub ranking: Vec<Ranking>,
}

impl Affiliation {
    pub fn has_type(&self, unit_type: UnitType) -> bool {
        self.types.iter().any(|t| t.unit_type() == Some(unit_type))
    }

    pub fn is_part_of(&self, parent_id: &str) -> bool {
        self.relations
            .iter()
            .any(|r| r.id.as_deref() == Some(parent_id))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Membership {
    #[serde(default, alias = "affiliation_id", deserialize_with = "opt_object_id")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub types: Vec<TypeTag>,
    #[serde(default)]
    pub start_date: Option<i64>,
    #[serde(default)]
    pub end_date: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Person {
    #[serde(alias = "_id", deserialize_with = "object_id")]
    pub id: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub affiliations: Vec<Membership>,
    #[serde(default)]
    pub external_ids: Vec<ExternalId>,
    #[serde(default)]
    pub ranking: Vec<Ranking>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birthdate: Option<Value>,
}

impl Person {
    pub fn is_member_of(&self, unit_id: &str) -> bool {
        self.affiliations
            .iter()
            .any(|m| m.id.as_deref() == Some(unit_id))
    }

    /// Birthdates of `-1`, empty strings, or non-numeric values are unknown.
    pub fn birthdate_epoch(&self) -> Option<i64> {
        match self.birthdate.as_ref()? {
            Value::Number(n) => n.as_i64().filter(|v| *v != -1),
            _ => None,
        }
    }

    pub fn known_sex(&self) -> Option<&str> {
        self.sex.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Title {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Title {
    pub fn new(title: &str, lang: &str) -> Self {
        Title {
            title: Some(title.to_string()),
            lang: Some(lang.to_string()),
            source: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthorAffiliation {
    #[serde(default, deserialize_with = "opt_object_id")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub types: Vec<TypeTag>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkAuthor {
    #[serde(default, deserialize_with = "opt_object_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub affiliations: Vec<AuthorAffiliation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub external_ids: Vec<ExternalId>,
}

impl WorkAuthor {
    pub fn is_affiliated_with(&self, unit_id: &str) -> bool {
        self.affiliations
            .iter()
            .any(|a| a.id.as_deref() == Some(unit_id))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    #[serde(default, deserialize_with = "opt_object_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CitationCount {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub count: Option<i64>,
}

impl CitationCount {
    pub fn new(source: &str, count: i64) -> Self {
        CitationCount {
            source: Some(source.to_string()),
            count: Some(count),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CitationsByYear {
    #[serde(default)]
    pub cited_by_count: Option<i64>,
    #[serde(default)]
    pub year: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    #[serde(default, deserialize_with = "opt_object_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub level: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubjectGroup {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub subjects: Vec<Subject>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BibliographicInfo {
    #[serde(default)]
    pub is_open_access: Option<bool>,
    #[serde(default)]
    pub open_access_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Updated {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub time: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Work {
    #[serde(alias = "_id", deserialize_with = "object_id")]
    pub id: String,
    #[serde(default)]
    pub titles: Vec<Title>,
    #[serde(default)]
    pub authors: Vec<WorkAuthor>,
    #[serde(default, deserialize_with = "lenient")]
    pub source: Option<SourceRef>,
    #[serde(default)]
    pub citations_count: Vec<CitationCount>,
    #[serde(default)]
    pub citations_by_year: Vec<CitationsByYear>,
    #[serde(default)]
    pub subjects: Vec<SubjectGroup>,
    #[serde(default, deserialize_with = "lenient")]
    pub bibliographic_info: Option<BibliographicInfo>,
    #[serde(default)]
    pub ranking: Vec<Ranking>,
    #[serde(default)]
    pub types: Vec<TypeTag>,
    #[serde(default)]
    pub updated: Vec<Updated>,
    #[serde(default)]
    pub external_ids: Vec<ExternalId>,
    #[serde(default)]
    pub year_published: Option<i64>,
    #[serde(default)]
    pub date_published: Option<i64>,
}

impl Work {
    pub fn has_author(&self, person_id: &str) -> bool {
        self.authors
            .iter()
            .any(|a| a.id.as_deref() == Some(person_id))
    }

    pub fn is_tagged_with(&self, unit_id: &str) -> bool {
        self.authors.iter().any(|a| a.is_affiliated_with(unit_id))
    }

    pub fn source_id(&self) -> Option<&str> {
        self.source.as_ref()?.id.as_deref().filter(|id| !id.is_empty())
    }

    /// Internal records carry only department, faculty or group type tags.
    pub fn is_internal_record(&self) -> bool {
        !self.types.is_empty()
            && self.types.iter().all(|t| {
                matches!(
                    t.kind.as_deref(),
                    Some("department") | Some("faculty") | Some("group")
                )
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublisherRecord {
    #[serde(default)]
    pub name: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Publisher {
    Record(PublisherRecord),
    Bare(String),
    Other(Value),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Apc {
    #[serde(default)]
    pub charges: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Source {
    #[serde(alias = "_id", deserialize_with = "object_id")]
    pub id: String,
    #[serde(default)]
    pub names: Vec<Name>,
    #[serde(default)]
    pub publisher: Option<Publisher>,
    #[serde(default, deserialize_with = "lenient")]
    pub apc: Option<Apc>,
    #[serde(default)]
    pub ranking: Vec<Ranking>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkNode {
    pub id: Value,
    #[serde(default)]
    pub degree: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkEdge {
    pub source: Value,
    pub target: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Network {
    #[serde(default)]
    pub nodes: Vec<NetworkNode>,
    #[serde(default)]
    pub edges: Vec<NetworkEdge>,
}

/// Per-unit derived state maintained by the ingestion pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnitSnapshot {
    #[serde(alias = "_id", deserialize_with = "object_id")]
    pub id: String,
    #[serde(default)]
    pub top_words: Option<Value>,
    #[serde(default, deserialize_with = "lenient")]
    pub coauthorship_network: Option<Network>,
}

pub fn value_label(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn id_from_value(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(mut map) => match map.remove("$oid") {
            Some(Value::String(s)) => Some(s),
            _ => None,
        },
        _ => None,
    }
}

// Accepts plain ids and extended-JSON `{"$oid": ..}` ids.
fn object_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    id_from_value(value).ok_or_else(|| serde::de::Error::custom("expected a string or $oid id"))
}

fn opt_object_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(id_from_value(Value::deserialize(deserializer)?))
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}
