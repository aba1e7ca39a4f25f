use regex::Regex;

use super::AlertFamily;

// https://stackoverflow.com/questions/3809401/what-is-a-good-regular-expression-to-match-a-url
const URL_MATCH: &str = r"https?:\/\/(?:www\.)?[-a-zA-Z0-9@:%._\+~#=]{2,256}\.[a-z]{2,4}\b(?:[-a-zA-Z0-9@:%_\+.~#?&//=]*)";

/// Error for a single alerts fetch. Non-success responses keep the body text
/// around so [ApiError::indicates_disabled] can classify them.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("GitHub API returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Failed to make request: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Failed to deserialize: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Known response phrasings for "this alert API is turned off here". The
/// upstream API has no structured code for this, so classification is by
/// substring match over an enumerated phrase list.
fn disabled_phrases(family: AlertFamily) -> &'static [&'static str] {
    match family {
        AlertFamily::SecretScanning => &[
            "secret scanning is disabled",
            "secret scanning is not enabled",
        ],
        AlertFamily::Dependabot => &[
            "dependabot alerts are disabled",
            "dependabot alerts are not enabled",
        ],
        AlertFamily::CodeScanning => &[],
    }
}

impl ApiError {
    /// True when the response body matches one of the known phrasings for the
    /// given family being turned off. Matching is case-insensitive. Callers
    /// skip the family instead of failing the run.
    pub fn indicates_disabled(&self, family: AlertFamily) -> bool {
        let body = match self {
            Self::Status { body, .. } => body.to_lowercase(),
            _ => return false,
        };
        disabled_phrases(family)
            .iter()
            .any(|phrase| body.contains(phrase))
    }
}

fn next_pattern() -> Regex {
    Regex::new(&("<(".to_owned() + URL_MATCH + ")>; rel=\"next\"")).unwrap()
}

/// Extract the `rel="next"` URL from a `Link` header value, if present.
fn next_link(pattern: &Regex, link_header: &str) -> Option<String> {
    pattern
        .captures(link_header)
        .map(|captures| captures.get(1).unwrap().as_str().to_owned())
}

/// # Retrieve paginated alert data from the rest api
///
/// Functions like an iterator, however that trait can't be implemented asyncfully
/// in a safe fashion (as of time of writing).
///
/// Pagination is driven entirely by the `Link` response header: the stored request
/// is re-targeted at the absolute `rel="next"` URL after every page. This covers
/// both `page=N` query parameters and the opaque `after=` cursor tokens GHES uses
/// for code scanning — no page number is ever constructed here.
pub struct PaginatedAlertsIter<'a> {
    client: &'a reqwest::Client,
    header_next_pattern: Regex,
    request: reqwest::Request,
    finished: bool,
}

impl<'a> PaginatedAlertsIter<'a> {
    /// Parse and store the information relative to the request.
    ///
    /// The first request won't happen until [PaginatedAlertsIter::next_page_data]
    /// is called for the first time. The URL is expected to already carry its
    /// query parameters, `per_page` included.
    pub fn new(
        client: &'a reqwest::Client,
        url: &str,
        token: &str,
    ) -> Result<Self, reqwest::Error> {
        let request = client
            .get(url)
            .header(reqwest::header::AUTHORIZATION, format!("token {token}"))
            .header(reqwest::header::ACCEPT, "application/vnd.github.v3+json")
            .header(reqwest::header::USER_AGENT, "ghas-report")
            .build()?;
        log::debug!("Created PaginatedAlertsIter. Main request:\n{:#?}", request);

        Ok(Self {
            client,
            header_next_pattern: next_pattern(),
            request,
            finished: false,
        })
    }

    /// Perform a request for the next page, and parse the json array to a vec.
    ///
    /// As [PaginatedAlertsIter] functions as an iterator, this function will
    /// continuously return None once no information is left to fetch.
    pub async fn next_page_data<T: serde::de::DeserializeOwned>(
        &mut self,
    ) -> Option<Result<Vec<T>, ApiError>> {
        if self.finished {
            return None;
        }
        Some(self.perform_request_and_parse_data().await)
    }

    async fn perform_request_and_parse_data<T: serde::de::DeserializeOwned>(
        &mut self,
    ) -> Result<Vec<T>, ApiError> {
        let response = self
            .client
            .execute(self.request.try_clone().unwrap())
            .await?;
        log::debug!("Received response:\n{:#?}", response);

        let status = response.status();
        let next_url_opt = response
            .headers()
            .get(reqwest::header::LINK)
            .and_then(|header| header.to_str().ok())
            .and_then(|header| next_link(&self.header_next_pattern, header));

        if !status.is_success() {
            self.finished = true;
            return Err(ApiError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let body = response.text().await?;
        let data = serde_json::from_str(&body)?;

        if let Some(next_url) = next_url_opt {
            let url = self.request.url_mut();
            *url = reqwest::Url::parse(&next_url)
                .expect("Failed to parse url returned from pagination header");
        } else {
            self.finished = true;
        }

        Ok(data)
    }

    /// Exhaust the paging iterator and get all data at once in a single vec,
    /// in page order.
    ///
    /// If an error occurs mid requests some data will be lost, so self is consumed.
    pub async fn exhaust<T: serde::de::DeserializeOwned>(
        mut self,
    ) -> Result<Vec<T>, ApiError> {
        let mut data = Vec::new();
        while let Some(next_page_res) = self.next_page_data().await {
            data.extend(next_page_res?);
        }
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_header_with_next_is_followed() {
        let pattern = next_pattern();
        let header = "<https://api.github.com/repositories/1/code-scanning/alerts?per_page=100&page=2>; rel=\"next\", <https://api.github.com/repositories/1/code-scanning/alerts?per_page=100&page=5>; rel=\"last\"";
        assert_eq!(
            next_link(&pattern, header).as_deref(),
            Some("https://api.github.com/repositories/1/code-scanning/alerts?per_page=100&page=2")
        );
    }

    #[test]
    fn link_header_with_cursor_is_followed() {
        let pattern = next_pattern();
        let header = "<https://ghes.example.com/api/v3/enterprises/acme/dependabot/alerts?per_page=100&after=Y3Vyc29yOnYy>; rel=\"next\"";
        assert_eq!(
            next_link(&pattern, header).as_deref(),
            Some("https://ghes.example.com/api/v3/enterprises/acme/dependabot/alerts?per_page=100&after=Y3Vyc29yOnYy")
        );
    }

    #[test]
    fn link_header_without_next_terminates() {
        let pattern = next_pattern();
        let header = "<https://api.github.com/repositories/1/alerts?page=1>; rel=\"prev\", <https://api.github.com/repositories/1/alerts?page=1>; rel=\"first\"";
        assert_eq!(next_link(&pattern, header), None);
        assert_eq!(next_link(&pattern, ""), None);
    }

    #[test]
    fn disabled_classification_is_case_insensitive_and_per_family() {
        let err = ApiError::Status {
            status: 404,
            body: "{\"message\": \"Secret Scanning is disabled on this repository.\"}".to_owned(),
        };
        assert!(err.indicates_disabled(AlertFamily::SecretScanning));
        assert!(!err.indicates_disabled(AlertFamily::Dependabot));
        assert!(!err.indicates_disabled(AlertFamily::CodeScanning));

        let err = ApiError::Status {
            status: 403,
            body: "{\"message\": \"Dependabot alerts are disabled for this repository.\"}"
                .to_owned(),
        };
        assert!(err.indicates_disabled(AlertFamily::Dependabot));
        assert!(!err.indicates_disabled(AlertFamily::SecretScanning));
    }

    #[test]
    fn unrelated_errors_are_not_classified_as_disabled() {
        let err = ApiError::Status {
            status: 401,
            body: "{\"message\": \"Bad credentials\"}".to_owned(),
        };
        assert!(!err.indicates_disabled(AlertFamily::SecretScanning));
        assert!(!err.indicates_disabled(AlertFamily::Dependabot));
    }
}
