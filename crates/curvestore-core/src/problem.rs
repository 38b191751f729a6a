use serde::Deserialize;

use crate::codec::{JSON_MEDIA_TYPE, PROBLEM_JSON_MEDIA_TYPE};
use crate::http_client::HttpResponse;

/// RFC7807 problem document returned with failed calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub problem_type: Option<String>,
    pub title: Option<String>,
    pub detail: Option<String>,
    pub status: Option<u16>,
}

impl ProblemDetails {
    /// Most specific human-readable message: detail, then title.
    pub fn message(&self) -> Option<&str> {
        self.detail
            .as_deref()
            .filter(|detail| !detail.trim().is_empty())
            .or_else(|| self.title.as_deref().filter(|title| !title.trim().is_empty()))
    }
}

/// Server-provided detail for a failed response.
///
/// JSON bodies are read as problem documents; anything else, or a JSON body
/// without usable fields, falls back to the raw text.
pub(crate) fn failure_detail(response: &HttpResponse) -> String {
    let is_json = matches!(
        response.media_type().as_deref(),
        Some(JSON_MEDIA_TYPE | PROBLEM_JSON_MEDIA_TYPE)
    );

    if is_json {
        if let Ok(problem) = serde_json::from_slice::<ProblemDetails>(&response.body) {
            if let Some(message) = problem.message() {
                return message.to_owned();
            }
        }
    }

    let text = String::from_utf8_lossy(&response.body).trim().to_owned();
    if text.is_empty() {
        format!("HTTP {}", response.status)
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_wins_over_title() {
        let response = HttpResponse::new(
            400,
            Some("application/problem+json"),
            r#"{"type":"about:blank","title":"Bad Request","detail":"bad field","status":400}"#,
        );
        assert_eq!(failure_detail(&response), "bad field");
    }

    #[test]
    fn title_is_used_without_detail() {
        let response = HttpResponse::new(409, Some("application/json"), r#"{"title":"Conflict"}"#);
        assert_eq!(failure_detail(&response), "Conflict");
    }

    #[test]
    fn non_json_bodies_are_returned_verbatim() {
        let response = HttpResponse::new(500, Some("text/plain"), "oops");
        assert_eq!(failure_detail(&response), "oops");
    }

    #[test]
    fn empty_bodies_name_the_status() {
        assert_eq!(failure_detail(&HttpResponse::empty(502)), "HTTP 502");
    }
}
