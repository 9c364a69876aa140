use serde_json::Value;

use crate::model::{Affiliation, ExternalId, ExternalUrl, Name};

/// National identity documents never leave the engine.
pub const IDENTITY_DOCUMENT_SOURCES: [&str; 3] =
    ["Cédula de Ciudadanía", "Cédula de Extranjería", "Passport"];

pub const LOGO_SOURCE: &str = "logo";

/// `es` wins, then `en`, then the first named entry.
pub fn resolve_name(names: &[Name]) -> String {
    let named = || names.iter().filter_map(|n| Some((n.name.as_deref()?, n.lang.as_deref())));
    named()
        .find(|(_, lang)| *lang == Some("es"))
        .or_else(|| named().find(|(_, lang)| *lang == Some("en")))
        .or_else(|| named().next())
        .map(|(name, _)| name.to_string())
        .unwrap_or_default()
}

pub fn unit_display_name(unit: &Affiliation) -> String {
    resolve_name(&unit.names)
}

fn is_logo(url: &ExternalUrl) -> bool {
    url.source.as_deref() == Some(LOGO_SOURCE)
}

pub fn resolve_logo(urls: &[ExternalUrl]) -> Option<String> {
    urls.iter().find(|u| is_logo(u)).and_then(|u| match &u.url {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    })
}

pub fn non_logo_urls(urls: &[ExternalUrl]) -> Vec<ExternalUrl> {
    urls.iter().filter(|u| !is_logo(u)).cloned().collect()
}

pub fn is_identity_document(id: &ExternalId) -> bool {
    id.source
        .as_deref()
        .is_some_and(|source| IDENTITY_DOCUMENT_SOURCES.contains(&source))
}

pub fn strip_identity_documents(external_ids: &[ExternalId]) -> Vec<ExternalId> {
    external_ids
        .iter()
        .filter(|id| !is_identity_document(id))
        .cloned()
        .collect()
}
