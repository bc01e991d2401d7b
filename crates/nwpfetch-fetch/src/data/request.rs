use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A single request parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Text(String),
    List(Vec<String>),
}

impl ParamValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s),
            ParamValue::List(_) => None,
        }
    }

    /// All values, a text parameter counting as a one-element list.
    pub fn values(&self) -> Vec<&str> {
        match self {
            ParamValue::Text(s) => vec![s.as_str()],
            ParamValue::List(items) => items.iter().map(String::as_str).collect(),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Text(s) => f.write_str(s),
            ParamValue::List(items) => f.write_str(&items.join("/")),
        }
    }
}

/// Provider-specific parameters identifying a remote resource.
///
/// The fetcher never looks inside; the bag is handed to the retriever as is.
///
/// # Examples
///
/// ```
/// use nwpfetch_fetch::FetchRequest;
///
/// let request = FetchRequest::new()
///     .param("type", "fc")
///     .param("step", "3")
///     .list("param", ["2t", "msl"]);
///
/// assert_eq!(request.text("step"), Some("3"));
/// assert_eq!(request.values("param"), vec!["2t", "msl"]);
/// assert_eq!(request.to_string(), "param=2t/msl,step=3,type=fc");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FetchRequest {
    params: BTreeMap<String, ParamValue>,
}

impl FetchRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request for a plain URL, as understood by the HTTP retriever.
    pub fn url(url: impl Into<String>) -> Self {
        Self::new().param("url", url)
    }

    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), ParamValue::Text(value.into()));
        self
    }

    #[must_use]
    pub fn list<I, S>(mut self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.params.insert(key.into(), ParamValue::List(values));
        self
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.params.get(key)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(ParamValue::as_text)
    }

    pub fn values(&self, key: &str) -> Vec<&str> {
        self.params.get(key).map(ParamValue::values).unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

impl fmt::Display for FetchRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{key}={value}")?;
        }
        Ok(())
    }
}

impl<K: Into<String>> FromIterator<(K, ParamValue)> for FetchRequest {
    fn from_iter<T: IntoIterator<Item = (K, ParamValue)>>(iter: T) -> Self {
        Self {
            params: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// One entry of a sequential batch: what to fetch and where it lands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchJob {
    pub request:     FetchRequest,
    pub destination: PathBuf,
}

impl FetchJob {
    pub fn new(request: FetchRequest, destination: impl Into<PathBuf>) -> Self {
        Self {
            request,
            destination: destination.into(),
        }
    }
}
