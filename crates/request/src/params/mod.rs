//! Request parameters and their encodings.
//!
//! [`Params`] is an ordered list of name/value entries. Names may repeat (`tag=a&tag=b`)
//! and values are either text or binary blobs (file uploads). Params can be built from a
//! query string, from any iterator of pairs or from a `serde::Serialize` value, and encode
//! into a query string, into a URL, or into a request body (see [`Payload`]).

use std::fmt;

use bytes::Bytes;
use mime::Mime;
use serde::Serialize;
use url::form_urlencoded;

use crate::protocol::BuildError;
use crate::urls;

mod payload;
pub use payload::Payload;

/// A binary param value, typically a file selected for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    data: Bytes,
    filename: Option<String>,
    content_type: Option<Mime>,
}

impl Blob {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into(), filename: None, content_type: None }
    }

    #[must_use]
    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    #[must_use]
    pub fn content_type(mut self, content_type: Mime) -> Self {
        self.content_type = Some(content_type);
        self
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Text(String),
    Binary(Blob),
}

impl ParamValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParamValue::Text(text) => Some(text),
            ParamValue::Binary(_) => None,
        }
    }

    #[inline]
    pub fn is_binary(&self) -> bool {
        matches!(self, ParamValue::Binary(_))
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_owned())
    }
}

impl From<&String> for ParamValue {
    fn from(value: &String) -> Self {
        ParamValue::Text(value.clone())
    }
}

impl From<Blob> for ParamValue {
    fn from(value: Blob) -> Self {
        ParamValue::Binary(value)
    }
}

/// An ordered, multi-valued set of request parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    entries: Vec<(String, ParamValue)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses an `application/x-www-form-urlencoded` query string.
    ///
    /// A leading `?` is ignored, so both `a=1&b=2` and `?a=1&b=2` are accepted.
    pub fn from_query(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        form_urlencoded::parse(query.as_bytes()).map(|(name, value)| (name.into_owned(), value.into_owned())).collect()
    }

    /// Reads the params from the query section of `url`.
    pub fn from_url(url: &str) -> Self {
        let (url, _hash) = urls::split_fragment(url);
        match url.split_once('?') {
            Some((_, query)) => Self::from_query(query),
            None => Self::new(),
        }
    }

    /// Encodes a serializable struct or map into params, e.g. a `#[derive(Serialize)]` form.
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<Self, BuildError> {
        let query = serde_urlencoded::to_string(value).map_err(BuildError::invalid_params)?;
        Ok(Self::from_query(&query))
    }

    pub fn add(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.entries.push((name.into(), value.into()));
    }

    pub fn add_all(&mut self, other: &Params) {
        self.entries.extend(other.entries.iter().cloned());
    }

    /// Replaces all values of `name` with a single value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        let name = name.into();
        self.delete(&name);
        self.entries.push((name, value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.entries.iter().find(|(entry_name, _)| entry_name == name).map(|(_, value)| value)
    }

    pub fn get_all(&self, name: &str) -> Vec<&ParamValue> {
        self.entries.iter().filter(|(entry_name, _)| entry_name == name).map(|(_, value)| value).collect()
    }

    pub fn delete(&mut self, name: &str) {
        self.entries.retain(|(entry_name, _)| entry_name != name);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn has_binary(&self) -> bool {
        self.entries.iter().any(|(_, value)| value.is_binary())
    }

    /// The text entries as owned pairs. Binary entries have no text form and are skipped.
    pub fn text_pairs(&self) -> Vec<(String, String)> {
        self.entries
            .iter()
            .filter_map(|(name, value)| value.as_text().map(|text| (name.clone(), text.to_owned())))
            .collect()
    }

    /// Encodes the text entries as a query string, without a leading `?`.
    ///
    /// Binary entries cannot travel in a URL and are skipped.
    pub fn to_query(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (name, value) in &self.entries {
            if let ParamValue::Text(text) = value {
                serializer.append_pair(name, text);
            }
        }
        serializer.finish()
    }

    /// Appends the encoded params to the query section of `url`.
    ///
    /// An existing query is kept and joined with `&`, a fragment stays at the end.
    pub fn to_url(&self, url: &str) -> String {
        merge_query(url, &self.to_query())
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self { entries: iter.into_iter().map(|(name, value)| (name.into(), value.into())).collect() }
    }
}

impl<K: Into<String>, V: Into<ParamValue>, const N: usize> From<[(K, V); N]> for Params {
    fn from(entries: [(K, V); N]) -> Self {
        entries.into_iter().collect()
    }
}

impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_query())
    }
}

fn merge_query(url: &str, query: &str) -> String {
    if query.is_empty() {
        return url.to_owned();
    }

    let (base, hash) = urls::split_fragment(url);
    let separator = match base.find('?') {
        None => "?",
        Some(_) if base.ends_with('?') || base.ends_with('&') => "",
        Some(_) => "&",
    };

    let mut merged = String::with_capacity(url.len() + query.len() + 1);
    merged.push_str(base);
    merged.push_str(separator);
    merged.push_str(query);
    if let Some(hash) = hash {
        merged.push_str(hash);
    }
    merged
}
