//! Data-query rewrite: `GET /data?year=Y&month=M&day=D` becomes `GET /Y/M/D`.

use http::{Method, StatusCode};
use serde::{Deserialize, Serialize};

use crate::http::RequestHead;

/// Request rewriting applied by bridge sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Rewrite {
    /// Forward requests byte for byte.
    #[default]
    None,
    /// Translate date queries and answer with a text report.
    DataQuery,
}

/// Parameters of a `/data` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataQuery {
    pub year: String,
    pub month: String,
    pub day: String,
}

impl DataQuery {
    /// Extract the date from `GET /data?...`. Anything else yields `None`.
    pub fn from_request(head: &RequestHead) -> Option<Self> {
        if head.method != Method::GET || head.path() != "/data" {
            return None;
        }

        let mut year = None;
        let mut month = None;
        let mut day = None;
        for (key, value) in url::form_urlencoded::parse(head.query().as_bytes()) {
            let slot = match key.as_ref() {
                "year" => &mut year,
                "month" => &mut month,
                "day" => &mut day,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }

        let query = Self {
            year: year?,
            month: month?,
            day: day?,
        };
        query.is_path_safe().then_some(query)
    }

    /// Path on the destination, `/Y/M/D`.
    pub fn target(&self) -> String {
        format!("/{}/{}/{}", self.year, self.month, self.day)
    }

    /// Fresh request for the destination.
    pub fn upstream_request(&self, destination: &str) -> RequestHead {
        let mut head = RequestHead::new(Method::GET, self.target());
        head.headers.append("Host", destination.to_string());
        head.headers.append("Connection", "close");
        head
    }

    fn is_path_safe(&self) -> bool {
        [&self.year, &self.month, &self.day]
            .iter()
            .all(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-'))
    }
}

/// Text body sent back to the client once the destination has answered.
pub fn report(original: &RequestHead, status: StatusCode, body: &[u8]) -> String {
    if status == StatusCode::OK {
        format!(
            "Request processed.\nPath: {}\nQuery: {}\nResponse:\n===\n{}\n===\n",
            original.path(),
            original.query(),
            String::from_utf8_lossy(body)
        )
    } else {
        format!(
            "Request failed.\nPath: {}\nQuery: {}\nResponse code: {}\n",
            original.path(),
            original.query(),
            status.as_u16()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get(target: &str) -> RequestHead {
        RequestHead::new(Method::GET, target)
    }

    #[test]
    fn extracts_date_parameters() {
        let query = DataQuery::from_request(&get("/data?year=2024&month=02&day=29")).unwrap();
        assert_eq!(query.target(), "/2024/02/29");
    }

    #[test]
    fn parameter_order_and_extras_do_not_matter() {
        let query = DataQuery::from_request(&get("/data?day=01&trace=1&month=12&year=1999")).unwrap();
        assert_eq!(query.target(), "/1999/12/01");
    }

    #[test]
    fn other_requests_do_not_match() {
        assert!(DataQuery::from_request(&get("/data?year=2024&month=02")).is_none());
        assert!(DataQuery::from_request(&get("/other?year=2024&month=02&day=01")).is_none());
        assert!(DataQuery::from_request(&get("/data?year=20/24&month=02&day=01")).is_none());
        assert!(DataQuery::from_request(&RequestHead::new(Method::POST, "/data?year=2024&month=02&day=01")).is_none());
    }

    #[test]
    fn upstream_request_targets_destination() {
        let query = DataQuery::from_request(&get("/data?year=2024&month=02&day=29")).unwrap();
        let head = query.upstream_request("localhost:8090");
        assert_eq!(head.target, "/2024/02/29");
        assert_eq!(head.headers.get_str("host"), Some("localhost:8090"));
        assert!(!head.keep_alive());
    }

    #[test]
    fn report_formats() {
        let original = get("/data?year=2024&month=02&day=29");
        assert_eq!(
            report(&original, StatusCode::OK, b"Hello"),
            "Request processed.\nPath: /data\nQuery: year=2024&month=02&day=29\nResponse:\n===\nHello\n===\n"
        );
        assert_eq!(
            report(&original, StatusCode::NOT_FOUND, b""),
            "Request failed.\nPath: /data\nQuery: year=2024&month=02&day=29\nResponse code: 404\n"
        );
    }
}
