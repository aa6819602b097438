use crate::catalog::MetricPath;
use crate::document::{StatusDocument, StatusValue};
use crate::error::ExtractError;

/// Resolve `path` inside `document` to a number.
///
/// Every key but the last must name a nested mapping. The leaf is converted
/// through its textual form, so numeric strings such as `"17"` are accepted
/// alongside integers and doubles.
///
/// # Examples
///
/// ```
/// use mongomon_collector::catalog::MetricPath;
/// use mongomon_collector::document::StatusDocument;
/// use mongomon_collector::extractor::resolve;
/// use mongodb::bson::doc;
///
/// let status = StatusDocument::from(doc! { "connections": { "current": 42 } });
/// let value = resolve(&status, &MetricPath::new(&["connections", "current"])).unwrap();
/// assert_eq!(value, 42.0);
/// ```
pub fn resolve(document: &StatusDocument, path: &MetricPath) -> Result<f64, ExtractError> {
    let mut current = document;
    for &key in path.parents() {
        match current.get(key) {
            Some(StatusValue::Mapping(nested)) => current = nested,
            Some(_) => {
                return Err(ExtractError::NotAMapping {
                    key: key.to_string(),
                })
            }
            None => {
                return Err(ExtractError::KeyNotFound {
                    key: key.to_string(),
                })
            }
        }
    }

    let leaf = path.leaf();
    let value = current.get(leaf).ok_or_else(|| ExtractError::KeyNotFound {
        key: leaf.to_string(),
    })?;
    coerce(leaf, value)
}

fn coerce(key: &str, value: &StatusValue) -> Result<f64, ExtractError> {
    let raw = value.to_string();
    raw.parse::<f64>().map_err(|_| ExtractError::NotNumeric {
        key: key.to_string(),
        raw,
    })
}
