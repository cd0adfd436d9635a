//! HTTP directory client with credential rotation
//!
//! Every operation goes through [`DirectoryClient::call`], a single bounded
//! loop that borrows a credential from the pool, issues the request, and on a
//! rate-limit response reports the credential and retries with a fresh one.
//! The loop runs at most once per configured credential.
//!
//! # Retry Logic
//!
//! | Condition | Action |
//! |-----------|--------|
//! | Transient code (6, 9, 29) | Report, cool down, retry with another credential |
//! | Other API error code | Report once, fail the call |
//! | HTTP error / transport failure | Report once, fail the call |
//! | Unparseable body | Report once, fail the call |

use crate::api::types::{
    compute_has_more, ActivityItem, ApiErrorBody, CandidateProfile, ClientError, ErrorCode,
    ItemList, PageQuery, PageResult, PlaceItem,
};
use crate::api::Directory;
use crate::config::{ApiConfig, DelayConfig, DelayRange};
use crate::pool::{CredentialLease, CredentialPool};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

/// How many places to ask for when resolving a name
const PLACE_CANDIDATES: u32 = 5;

/// How many recent activity items to inspect
const RECENT_ACTIVITY_ITEMS: u32 = 3;

/// Failure of one attempt, before retry classification
enum AttemptError {
    Api(ErrorCode, String),
    Http(u16),
    Transport(reqwest::Error),
    Malformed(String),
}

/// Builds the HTTP client used for all directory calls
pub fn build_http_client(config: &ApiConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(concat!("profile-sieve/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Directory API client backed by a shared credential pool
pub struct DirectoryClient {
    http: Client,
    pool: Arc<CredentialPool>,
    base_url: String,
    version: String,
    default_country_id: i64,
    max_pagination_depth: u32,
    min_population: u64,
    rate_limit_cooldown: DelayRange,
}

impl DirectoryClient {
    pub fn new(
        api: &ApiConfig,
        delays: &DelayConfig,
        pool: Arc<CredentialPool>,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: build_http_client(api)?,
            pool,
            base_url: api.base_url.trim_end_matches('/').to_string(),
            version: api.version.clone(),
            default_country_id: api.default_country_id,
            max_pagination_depth: api.max_pagination_depth,
            min_population: api.min_population,
            rate_limit_cooldown: delays.rate_limit_cooldown,
        })
    }

    pub fn pool(&self) -> &Arc<CredentialPool> {
        &self.pool
    }

    /// Issues one API method call with rotation on rate-limit responses
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &[(&str, String)],
    ) -> Result<T, ClientError> {
        let attempts = self.pool.health_count();
        if attempts == 0 {
            return Err(ClientError::NoCredentials);
        }

        for attempt in 1..=attempts {
            let lease = self.pool.select().await.ok_or(ClientError::NoCredentials)?;

            let error = match self.attempt(&lease, method, params).await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            match error {
                AttemptError::Api(code, message) if code.is_transient() => {
                    self.pool.report_error(lease.id, Some(code));
                    tracing::warn!(
                        credential = lease.id,
                        "{} rate limited (code {}): {}. Attempt {}/{}",
                        method,
                        code.0,
                        message,
                        attempt,
                        attempts
                    );
                    // Flood control is waited out by the pool gate on the next select
                    if attempt < attempts && !code.is_flood() {
                        self.rate_limit_cooldown.wait().await;
                    }
                }
                AttemptError::Api(code, message) => {
                    self.pool.report_error(lease.id, Some(code));
                    return Err(ClientError::Api {
                        method: method.to_string(),
                        code: code.0,
                        message,
                    });
                }
                AttemptError::Http(status) => {
                    self.pool.report_error(lease.id, None);
                    return Err(ClientError::Http {
                        method: method.to_string(),
                        status,
                    });
                }
                AttemptError::Transport(source) => {
                    self.pool.report_error(lease.id, None);
                    return Err(ClientError::Transport {
                        method: method.to_string(),
                        source,
                    });
                }
                AttemptError::Malformed(message) => {
                    self.pool.report_error(lease.id, None);
                    return Err(ClientError::Malformed {
                        method: method.to_string(),
                        message,
                    });
                }
            }
        }

        Err(ClientError::RetriesExhausted {
            method: method.to_string(),
            attempts,
        })
    }

    /// One HTTP round trip with one credential
    async fn attempt<T: DeserializeOwned>(
        &self,
        lease: &CredentialLease,
        method: &str,
        params: &[(&str, String)],
    ) -> Result<T, AttemptError> {
        let url = format!("{}/method/{}", self.base_url, method);

        let mut query: Vec<(&str, String)> = params.to_vec();
        query.push(("access_token", lease.token.clone()));
        query.push(("v", self.version.clone()));

        let response = self
            .http
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(AttemptError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(AttemptError::Http(status.as_u16()));
        }

        let mut body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AttemptError::Malformed(e.to_string()))?;

        if let Some(error) = body.get_mut("error").map(serde_json::Value::take) {
            let error: ApiErrorBody = serde_json::from_value(error)
                .map_err(|e| AttemptError::Malformed(format!("bad error object: {}", e)))?;
            return Err(AttemptError::Api(ErrorCode(error.error_code), error.error_msg));
        }

        match body.get_mut("response").map(serde_json::Value::take) {
            Some(payload) => serde_json::from_value(payload)
                .map_err(|e| AttemptError::Malformed(e.to_string())),
            None => Err(AttemptError::Malformed(
                "neither 'response' nor 'error' present".to_string(),
            )),
        }
    }

    async fn find_places(&self, name: &str, country_id: Option<i64>) -> Result<Vec<i64>, ClientError> {
        let mut params = vec![
            ("q", name.to_string()),
            ("count", PLACE_CANDIDATES.to_string()),
        ];
        if let Some(country_id) = country_id {
            params.push(("country_id", country_id.to_string()));
        }

        let list: ItemList<PlaceItem> = self.call("database.getCities", &params).await?;
        Ok(list.items.into_iter().map(|p| p.id).collect())
    }
}

#[async_trait]
impl Directory for DirectoryClient {
    async fn resolve_place(&self, name: &str) -> Result<Option<i64>, ClientError> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(None);
        }

        tracing::info!("Resolving place id for '{}'", name);
        let mut places = self.find_places(name, Some(self.default_country_id)).await?;

        if places.is_empty() {
            tracing::info!(
                "'{}' not found in default region, retrying unrestricted",
                name
            );
            places = self.find_places(name, None).await?;
        }

        match places.first() {
            Some(id) => {
                tracing::info!("Resolved '{}' -> {}", name, id);
                Ok(Some(*id))
            }
            None => {
                tracing::warn!("Place not found: {}", name);
                Ok(None)
            }
        }
    }

    async fn search_page(&self, query: &PageQuery) -> Result<PageResult, ClientError> {
        let params = [
            ("city", query.place_id.to_string()),
            ("offset", query.offset.to_string()),
            ("count", query.page_size.min(50).to_string()),
            ("fields", CandidateProfile::FIELDS.to_string()),
            ("has_photo", "1".to_string()),
            ("age_from", query.age.to_string()),
            ("age_to", query.age.to_string()),
            ("sex", query.strategy.sex_code().to_string()),
            ("sort", "1".to_string()),
        ];

        let list: ItemList<CandidateProfile> = self.call("users.search", &params).await?;

        let min_population_rejected = list.count < self.min_population;
        let has_more = !min_population_rejected
            && compute_has_more(
                query.offset,
                list.items.len(),
                list.count,
                self.max_pagination_depth,
            );

        tracing::debug!(
            place = query.place_id,
            age = query.age,
            strategy = %query.strategy,
            offset = query.offset,
            total = list.count,
            returned = list.items.len(),
            has_more,
            "Search page fetched"
        );

        Ok(PageResult {
            total_count: list.count,
            items: list.items,
            has_more,
            min_population_rejected,
        })
    }

    async fn fetch_recent_activity(&self, profile_id: i64) -> Vec<String> {
        let params = [
            ("owner_id", profile_id.to_string()),
            ("count", RECENT_ACTIVITY_ITEMS.to_string()),
            ("filter", "owner".to_string()),
        ];

        match self.call::<ItemList<ActivityItem>>("wall.get", &params).await {
            Ok(list) => list
                .items
                .into_iter()
                .map(|item| item.text)
                .filter(|text| !text.trim().is_empty())
                .take(RECENT_ACTIVITY_ITEMS as usize)
                .collect(),
            Err(e) => {
                tracing::debug!("No recent activity for {}: {}", profile_id, e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolConfig;
    use crate::state::GenderStrategy;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn api_config(base_url: &str) -> ApiConfig {
        ApiConfig {
            base_url: base_url.to_string(),
            version: "5.131".to_string(),
            default_country_id: 1,
            page_size: 50,
            max_pagination_depth: 1000,
            max_offset: 500,
            min_population: 50,
            request_timeout_secs: 5,
            profile_url_prefix: "https://vk.com/id".to_string(),
        }
    }

    fn client(server: &MockServer, tokens: &[&str]) -> DirectoryClient {
        let pool = Arc::new(CredentialPool::new(
            tokens.iter().map(|t| t.to_string()).collect(),
            PoolConfig::default(),
        ));
        DirectoryClient::new(&api_config(&server.uri()), &DelayConfig::none(), pool).unwrap()
    }

    fn ok(payload: serde_json::Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({ "response": payload }))
    }

    fn api_error(code: i64) -> ResponseTemplate {
        ResponseTemplate::new(200)
            .set_body_json(json!({ "error": { "error_code": code, "error_msg": "nope" } }))
    }

    fn query(offset: u32) -> PageQuery {
        PageQuery {
            place_id: 42,
            age: 21,
            strategy: GenderStrategy::Primary,
            offset,
            page_size: 50,
        }
    }

    fn profiles(n: usize) -> serde_json::Value {
        json!((0..n)
            .map(|i| json!({ "id": i + 1, "first_name": "P", "photo_200": "https://img/p.jpg" }))
            .collect::<Vec<_>>())
    }

    #[tokio::test]
    async fn test_resolve_place_default_region_first() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/method/database.getCities"))
            .and(query_param("country_id", "1"))
            .and(query_param("q", "Springfield"))
            .respond_with(ok(json!({ "count": 1, "items": [{ "id": 42, "title": "Springfield" }] })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server, &["a"]);
        assert_eq!(client.resolve_place(" Springfield ").await.unwrap(), Some(42));
    }

    #[tokio::test]
    async fn test_resolve_place_falls_back_to_unrestricted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/method/database.getCities"))
            .and(query_param("country_id", "1"))
            .respond_with(ok(json!({ "count": 0, "items": [] })))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/method/database.getCities"))
            .respond_with(ok(json!({ "count": 1, "items": [{ "id": 7, "title": "Paris" }] })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server, &["a"]);
        assert_eq!(client.resolve_place("Paris").await.unwrap(), Some(7));

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2);
        assert!(!requests[1].url.query_pairs().any(|(k, _)| k == "country_id"));
    }

    #[tokio::test]
    async fn test_resolve_place_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/method/database.getCities"))
            .respond_with(ok(json!({ "count": 0, "items": [] })))
            .expect(2)
            .mount(&server)
            .await;

        let client = client(&server, &["a"]);
        assert_eq!(client.resolve_place("Atlantis").await.unwrap(), None);
        assert_eq!(client.resolve_place("   ").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_search_page_parameters_and_paging() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/method/users.search"))
            .and(query_param("city", "42"))
            .and(query_param("offset", "0"))
            .and(query_param("count", "50"))
            .and(query_param("has_photo", "1"))
            .and(query_param("age_from", "21"))
            .and(query_param("age_to", "21"))
            .and(query_param("sex", "1"))
            .and(query_param("access_token", "a"))
            .and(query_param("v", "5.131"))
            .respond_with(ok(json!({ "count": 120, "items": profiles(50) })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server, &["a"]);
        let page = client.search_page(&query(0)).await.unwrap();

        assert_eq!(page.total_count, 120);
        assert_eq!(page.items.len(), 50);
        assert!(page.has_more);
        assert!(!page.min_population_rejected);
    }

    #[tokio::test]
    async fn test_search_page_low_population_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/method/users.search"))
            .respond_with(ok(json!({ "count": 30, "items": profiles(30) })))
            .mount(&server)
            .await;

        let client = client(&server, &["a"]);
        let page = client.search_page(&query(0)).await.unwrap();

        assert!(page.min_population_rejected);
        assert!(!page.has_more);
    }

    #[tokio::test]
    async fn test_transient_error_rotates_credential() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/method/users.search"))
            .respond_with(api_error(6))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/method/users.search"))
            .respond_with(ok(json!({ "count": 60, "items": profiles(50) })))
            .mount(&server)
            .await;

        let client = client(&server, &["a", "b"]);
        let page = client.search_page(&query(0)).await.unwrap();
        assert_eq!(page.items.len(), 50);

        let tokens: Vec<String> = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter_map(|r| {
                r.url
                    .query_pairs()
                    .find(|(k, _)| k == "access_token")
                    .map(|(_, v)| v.to_string())
            })
            .collect();
        assert_eq!(tokens, vec!["a".to_string(), "b".to_string()]);

        let snapshot = client.pool().snapshot();
        assert_eq!(snapshot[0].error_count, 1);
        assert_eq!(snapshot[1].error_count, 0);
    }

    #[tokio::test]
    async fn test_retries_bounded_by_pool_size() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/method/users.search"))
            .respond_with(api_error(6))
            .expect(3)
            .mount(&server)
            .await;

        let client = client(&server, &["a", "b", "c"]);
        let result = client.search_page(&query(0)).await;
        assert!(matches!(
            result,
            Err(ClientError::RetriesExhausted { attempts: 3, .. })
        ));
    }

    #[tokio::test]
    async fn test_fatal_error_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/method/users.search"))
            .respond_with(api_error(15))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server, &["a", "b"]);
        let result = client.search_page(&query(0)).await;
        assert!(matches!(result, Err(ClientError::Api { code: 15, .. })));
        assert_eq!(client.pool().snapshot()[0].error_count, 1);
    }

    #[tokio::test]
    async fn test_malformed_and_http_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/method/users.search"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/method/database.getCities"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let client = client(&server, &["a"]);
        assert!(matches!(
            client.search_page(&query(0)).await,
            Err(ClientError::Malformed { .. })
        ));
        assert!(matches!(
            client.resolve_place("Springfield").await,
            Err(ClientError::Http { status: 502, .. })
        ));
    }

    #[tokio::test]
    async fn test_recent_activity() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/method/wall.get"))
            .and(query_param("owner_id", "7"))
            .and(query_param("count", "3"))
            .respond_with(ok(json!({
                "count": 3,
                "items": [{ "text": "chess club tonight" }, { "text": "" }, { "text": "jazz" }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/method/wall.get"))
            .and(query_param("owner_id", "8"))
            .respond_with(api_error(30))
            .mount(&server)
            .await;

        let client = client(&server, &["a"]);
        assert_eq!(
            client.fetch_recent_activity(7).await,
            vec!["chess club tonight".to_string(), "jazz".to_string()]
        );
        assert!(client.fetch_recent_activity(8).await.is_empty());
    }
}
