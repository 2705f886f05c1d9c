//! Ordered header list.
//!
//! Names keep their original spelling and position so a relayed message goes
//! back out the way it came in. Lookups ignore ASCII case; duplicates are kept.

use bytes::Bytes;

use crate::http::error::{ProtocolError, ProtocolErrorKind};

/// A single header line, split at the first colon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderField {
    name: String,
    value: Bytes,
}

impl HeaderField {
    pub fn new(name: impl Into<String>, value: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Value as UTF-8, if it is.
    pub fn value_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.value).ok()
    }
}

/// Header block of a request or response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    fields: Vec<HeaderField>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field at the end, keeping any existing fields of that name.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<Bytes>) {
        self.fields.push(HeaderField::new(name, value));
    }

    /// Replace the first field named `name` and drop the rest, or append if absent.
    pub fn set(&mut self, name: &str, value: impl Into<Bytes>) {
        let value = value.into();
        match self.position(name) {
            Some(first) => {
                self.fields[first].value = value;
                let mut index = 0;
                self.fields.retain(|field| {
                    let keep = index <= first || !field.name.eq_ignore_ascii_case(name);
                    index += 1;
                    keep
                });
            }
            None => self.append(name.to_string(), value),
        }
    }

    /// Remove every field named `name`. Returns how many were removed.
    pub fn remove(&mut self, name: &str) -> usize {
        let before = self.fields.len();
        self.fields.retain(|field| !field.name.eq_ignore_ascii_case(name));
        before - self.fields.len()
    }

    /// First value for `name`.
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.position(name).map(|i| self.fields[i].value())
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.position(name).and_then(|i| self.fields[i].value_str())
    }

    /// Every value for `name`, in message order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a [u8]> + 'a {
        self.fields
            .iter()
            .filter(move |field| field.name.eq_ignore_ascii_case(name))
            .map(HeaderField::value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HeaderField> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Parsed `Content-Length`.
    ///
    /// Repeated fields (or comma-joined lists) must all agree, otherwise the
    /// message is rejected rather than guessing which length applies.
    pub fn content_length(&self) -> Result<Option<u64>, ProtocolError> {
        let mut length = None;
        for raw in self.get_all("content-length") {
            let text = std::str::from_utf8(raw)
                .map_err(|_| ProtocolError::new(ProtocolErrorKind::InvalidContentLength, "not ascii"))?;
            for part in text.split(',') {
                let part = part.trim();
                if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(ProtocolError::new(
                        ProtocolErrorKind::InvalidContentLength,
                        format!("{:?}", part),
                    ));
                }
                let parsed: u64 = part.parse().map_err(|_| {
                    ProtocolError::new(ProtocolErrorKind::InvalidContentLength, "overflow")
                })?;
                match length {
                    Some(previous) if previous != parsed => {
                        return Err(ProtocolError::new(
                            ProtocolErrorKind::InvalidContentLength,
                            format!("conflicting values {} and {}", previous, parsed),
                        ));
                    }
                    _ => length = Some(parsed),
                }
            }
        }
        Ok(length)
    }

    /// Transfer codings, lowercased, flattened across repeated fields.
    pub fn transfer_codings(&self) -> Vec<String> {
        self.get_all("transfer-encoding")
            .filter_map(|raw| std::str::from_utf8(raw).ok())
            .flat_map(|value| value.split(','))
            .map(|coding| coding.trim().to_ascii_lowercase())
            .filter(|coding| !coding.is_empty())
            .collect()
    }

    /// Whether a comma-separated header such as `Connection` lists `token`.
    pub fn has_token(&self, name: &str, token: &str) -> bool {
        self.get_all(name)
            .filter_map(|raw| std::str::from_utf8(raw).ok())
            .flat_map(|value| value.split(','))
            .any(|item| item.trim().eq_ignore_ascii_case(token))
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|field| field.name.eq_ignore_ascii_case(name))
    }
}

impl<'a> IntoIterator for &'a Headers {
    type Item = &'a HeaderField;
    type IntoIter = std::slice::Iter<'a, HeaderField>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}
