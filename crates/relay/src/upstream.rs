//! Outbound relay
//!
//! Executes the decrypted request against the destination and collapses
//! every construction or network failure into a "no response" outcome
//! that the caller still seals and returns. No retries.

use axum::http::{HeaderMap, HeaderName, HeaderValue, Method};
use tracing::warn;
use url::Url;

use crate::server::header_str;

/// Outcome of an outbound request. Status 0 with an empty body is the
/// sentinel for "the destination never answered".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl UpstreamResponse {
    fn none() -> Self {
        Self {
            status: 0,
            body: Vec::new(),
        }
    }
}

#[derive(Clone)]
pub(crate) struct Upstream {
    client: reqwest::Client,
}

impl Upstream {
    pub(crate) fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub(crate) async fn fetch(
        &self,
        method: &str,
        url: Url,
        headers: &[(&str, &str)],
        body: Vec<u8>,
        inbound: &HeaderMap,
    ) -> UpstreamResponse {
        let Ok(method) = Method::from_bytes(method.as_bytes()) else {
            return UpstreamResponse::none();
        };

        let mut outbound = HeaderMap::new();
        for (name, value) in headers {
            let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
                continue;
            };
            let Ok(value) = HeaderValue::from_str(value) else {
                continue;
            };
            // Insert, not append: descriptor headers overwrite any
            // same-named default.
            outbound.insert(name, value);
        }

        if let Ok(chain) = HeaderValue::from_str(&forwarded_chain(inbound)) {
            outbound.insert("x-forwarded-for", chain);
        }

        let response = match self
            .client
            .request(method, url)
            .headers(outbound)
            .body(body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                warn!("Upstream request failed: {}", err);
                return UpstreamResponse::none();
            }
        };

        let status = response.status().as_u16();
        match response.bytes().await {
            Ok(bytes) => UpstreamResponse {
                status,
                body: bytes.to_vec(),
            },
            Err(err) => {
                warn!("Upstream body read failed: {}", err);
                UpstreamResponse::none()
            }
        }
    }
}

/// Proxy-chain attribution forwarded to the destination: the upstream
/// connecting IP joined with any existing forwarded-for list, with
/// empty ends trimmed.
fn forwarded_chain(inbound: &HeaderMap) -> String {
    let connecting_ip = header_str(inbound, "Cf-Connecting-Ip");
    let forwarded_for = header_str(inbound, "X-Forwarded-For");
    format!("{connecting_ip},{forwarded_for}")
        .trim_matches(',')
        .to_string()
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn inbound(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.insert(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        headers
    }

    #[test]
    fn test_forwarded_chain_joins_and_trims() {
        assert_eq!(
            forwarded_chain(&inbound(&[
                ("Cf-Connecting-Ip", "1.2.3.4"),
                ("X-Forwarded-For", "5.6.7.8"),
            ])),
            "1.2.3.4,5.6.7.8"
        );
        assert_eq!(
            forwarded_chain(&inbound(&[("X-Forwarded-For", "5.6.7.8")])),
            "5.6.7.8"
        );
        assert_eq!(
            forwarded_chain(&inbound(&[("Cf-Connecting-Ip", "1.2.3.4")])),
            "1.2.3.4"
        );
        assert_eq!(forwarded_chain(&inbound(&[])), "");
    }

    #[tokio::test]
    async fn test_fetch_passes_headers_and_body() {
        let origin = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/item"))
            .and(header("content-kind", "widget"))
            .and(header("x-forwarded-for", "1.2.3.4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"stored".to_vec()))
            .expect(1)
            .mount(&origin)
            .await;

        let url = Url::parse(&format!("{}/item", origin.uri())).unwrap();
        let result = Upstream::new()
            .fetch(
                "PUT",
                url,
                &[("Content-Kind", "widget")],
                b"payload".to_vec(),
                &inbound(&[("Cf-Connecting-Ip", "1.2.3.4")]),
            )
            .await;

        assert_eq!(result.status, 200);
        assert_eq!(result.body, b"stored");
    }

    #[tokio::test]
    async fn test_invalid_method_is_sentinel() {
        let url = Url::parse("http://a.example/").unwrap();
        let result = Upstream::new()
            .fetch("BAD METHOD", url, &[], Vec::new(), &HeaderMap::new())
            .await;

        assert_eq!(result, UpstreamResponse::none());
    }

    #[tokio::test]
    async fn test_connection_failure_is_sentinel() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = Url::parse(&format!("http://{addr}/")).unwrap();
        let result = Upstream::new()
            .fetch("GET", url, &[], Vec::new(), &HeaderMap::new())
            .await;

        assert_eq!(result.status, 0);
        assert!(result.body.is_empty());
    }

    #[tokio::test]
    async fn test_unparsable_header_lines_skipped() {
        let origin = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&origin)
            .await;

        let url = Url::parse(&origin.uri()).unwrap();
        let result = Upstream::new()
            .fetch(
                "GET",
                url,
                &[("bad name with spaces", "x"), ("Fine", "yes")],
                Vec::new(),
                &HeaderMap::new(),
            )
            .await;

        assert_eq!(result.status, 204);
    }
}
