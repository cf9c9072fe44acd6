//! Create-listing and remove-listing as executor operations.

use std::sync::Arc;

use async_trait::async_trait;

use super::error_body;
use super::listing::{DurationClass, ListingPayload, ListingTemplate};
use super::provider::{ApiResponse, MarketError, MarketplaceApi};
use crate::batch::executor::RemoteOperation;
use crate::batch::types::{AttemptOutcome, ResponseData, WorkItem};
use crate::links::{normalize_link, GIFT_LINK_PREFIX};

/// Upload one login as a new listing.
pub struct CreateListing {
    api: Arc<dyn MarketplaceApi>,
    template: ListingTemplate,
    price: u64,
    duration: DurationClass,
}

impl CreateListing {
    pub fn new(
        api: Arc<dyn MarketplaceApi>,
        template: ListingTemplate,
        price: u64,
        duration: DurationClass,
    ) -> Self {
        Self {
            api,
            template,
            price,
            duration,
        }
    }

    fn payload(&self, login: &str) -> ListingPayload {
        self.template.payload(login, self.price, self.duration)
    }
}

#[async_trait]
impl RemoteOperation for CreateListing {
    fn name(&self) -> &'static str {
        "upload"
    }

    fn login_of(&self, item: &WorkItem) -> Option<String> {
        Some(item.payload.clone())
    }

    async fn attempt(&self, item: &WorkItem) -> AttemptOutcome {
        let payload = self.payload(&item.payload);
        into_attempt(self.api.create_listing(&payload).await, |status| {
            (200..300).contains(&status)
        })
    }

    fn is_duplicate_conflict(&self, message: &str) -> bool {
        error_body::indicates_already_exists(message)
    }

    async fn confirm_exists(&self, item: &WorkItem) -> bool {
        listing_exists(self.api.as_ref(), self.template.category_id, &item.payload).await
    }
}

/// Remove one listing by id.
pub struct RemoveListing {
    api: Arc<dyn MarketplaceApi>,
    reason: String,
}

impl RemoveListing {
    pub fn new(api: Arc<dyn MarketplaceApi>, reason: impl Into<String>) -> Self {
        Self {
            api,
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl RemoteOperation for RemoveListing {
    fn name(&self) -> &'static str {
        "remove"
    }

    async fn attempt(&self, item: &WorkItem) -> AttemptOutcome {
        let Ok(item_id) = item.payload.trim().parse::<u64>() else {
            return AttemptOutcome::Invalid(format!("invalid listing id '{}'", item.payload));
        };
        into_attempt(
            self.api.remove_listing(item_id, &self.reason).await,
            |status| status == 200 || status == 204,
        )
    }
}

/// Map a raw response onto the executor's attempt outcome.
fn into_attempt(
    response: Result<ApiResponse, MarketError>,
    is_success: impl Fn(u16) -> bool,
) -> AttemptOutcome {
    match response {
        Ok(ApiResponse { status, body }) if is_success(status) => {
            AttemptOutcome::Success(ResponseData::from_body(&body))
        }
        Ok(ApiResponse { status: 429, body }) => AttemptOutcome::RateLimited { body },
        Ok(ApiResponse { status, body }) => AttemptOutcome::Rejected {
            status,
            message: error_body::normalize(status, &body),
            body,
        },
        Err(MarketError::Timeout) => AttemptOutcome::Timeout,
        Err(err) => AttemptOutcome::Transport(err.to_string()),
    }
}

/// Whether the seller already has a listing for `login`.
///
/// Matches when either login contains the other. This is a loose heuristic:
/// a short login can match an unrelated listing. It only decides between
/// "skip" and "fail" for a rejected upload, so a false positive never hides
/// a successful upload. Listings without a login never match. A failed
/// lookup counts as "not found".
pub async fn listing_exists(api: &dyn MarketplaceApi, category_id: u32, login: &str) -> bool {
    let normalized = normalize_link(login);
    let needle = normalized
        .strip_prefix(GIFT_LINK_PREFIX)
        .unwrap_or(&normalized);

    match api.list_items(category_id).await {
        Ok(items) => items
            .iter()
            .filter_map(|item| item.login.as_deref())
            .filter(|existing| !existing.is_empty())
            .any(|existing| existing.contains(needle) || needle.contains(existing)),
        Err(e) => {
            tracing::error!("Existence check for '{}' failed: {}", login, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::executor::BatchExecutor;
    use crate::batch::retry::RetryPolicy;
    use crate::batch::types::Outcome;
    use crate::config::MarketConfig;
    use crate::market::client::HttpMarketplace;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn api(server: &MockServer) -> Arc<dyn MarketplaceApi> {
        let config = MarketConfig {
            base_url: server.uri(),
            listing_url: "https://lzt.market".to_string(),
            token: "secret".to_string(),
            user_id: "42".to_string(),
            timeout: Duration::from_secs(5),
        };
        Arc::new(HttpMarketplace::new(&config).unwrap())
    }

    fn executor() -> BatchExecutor {
        BatchExecutor::new(RetryPolicy {
            max_attempts: 2,
            backoff_cap: Duration::ZERO,
            retry_server_errors: false,
        })
    }

    fn upload(api: Arc<dyn MarketplaceApi>) -> CreateListing {
        CreateListing::new(api, ListingTemplate::default(), 150, DurationClass::Short)
    }

    async fn mount_items(server: &MockServer, logins: &[&str]) {
        let items: Vec<_> = logins
            .iter()
            .enumerate()
            .map(|(i, login)| serde_json::json!({"item_id": i + 1, "login": login}))
            .collect();
        Mock::given(method("GET"))
            .and(path("/user/items"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "items": items })),
            )
            .mount(server)
            .await;
    }

    async fn mount_duplicate_rejection(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/item/fast-sell"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "errors": {"login": ["already being sold"]}
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_duplicate_confirmed_by_listing_is_skipped() {
        let server = MockServer::start().await;
        mount_duplicate_rejection(&server).await;
        mount_items(&server, &["abc123"]).await;

        let op = upload(api(&server).await);
        let item = WorkItem::new(1, "https://t.me/giftcode/abc123");
        let result = executor().execute_with_retry(&item, &op).await;

        assert_eq!(
            result.outcome,
            Outcome::Skipped {
                reason: "already being sold".to_string()
            }
        );
        assert_eq!(result.login.as_deref(), Some("https://t.me/giftcode/abc123"));
    }

    #[tokio::test]
    async fn test_duplicate_not_confirmed_is_failure() {
        let server = MockServer::start().await;
        mount_duplicate_rejection(&server).await;
        mount_items(&server, &["zzz999"]).await;

        let op = upload(api(&server).await);
        let item = WorkItem::new(1, "https://t.me/giftcode/abc123");
        let result = executor().execute_with_retry(&item, &op).await;

        assert!(result.is_failure());
        assert_eq!(result.error_message(), Some("already being sold"));
    }

    #[tokio::test]
    async fn test_success_without_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/item/fast-sell"))
            .and(body_partial_json(serde_json::json!({"login": "abc", "price": 150})))
            .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
            .mount(&server)
            .await;

        let op = upload(api(&server).await);
        let result = executor().execute_with_retry(&WorkItem::new(1, "abc"), &op).await;

        assert_eq!(
            result.outcome,
            Outcome::Success {
                response_data: ResponseData::Empty
            }
        );
    }

    #[tokio::test]
    async fn test_rate_limited_then_created() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/item/fast-sell"))
            .respond_with(ResponseTemplate::new(429).set_body_string("Too Many Requests"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/item/fast-sell"))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(serde_json::json!({"item": {"item_id": 777}})),
            )
            .mount(&server)
            .await;

        let op = upload(api(&server).await);
        let result = executor().execute_with_retry(&WorkItem::new(1, "abc"), &op).await;

        match result.outcome {
            Outcome::Success { response_data } => {
                assert_eq!(
                    crate::market::listing::listing_id(&response_data),
                    Some("777".to_string())
                );
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_remove_accepts_200_and_204_only() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/1"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/2"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/3"))
            .respond_with(ResponseTemplate::new(202))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/4"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(serde_json::json!({"errors": ["Item not found"]})),
            )
            .mount(&server)
            .await;

        let op = RemoveListing::new(api(&server).await, "issued");
        let executor = executor();

        assert!(executor.execute_with_retry(&WorkItem::new(1, "1"), &op).await.is_success());
        assert!(executor.execute_with_retry(&WorkItem::new(2, "2"), &op).await.is_success());
        assert!(executor.execute_with_retry(&WorkItem::new(3, "3"), &op).await.is_failure());

        let missing = executor.execute_with_retry(&WorkItem::new(4, "4"), &op).await;
        assert_eq!(missing.error_message(), Some("Item not found"));
        assert_eq!(missing.login, None);
    }

    #[tokio::test]
    async fn test_remove_rejects_non_numeric_id_without_request() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&server)
            .await;

        let op = RemoveListing::new(api(&server).await, "issued");
        let result = executor()
            .execute_with_retry(&WorkItem::new(1, "123/../user/items"), &op)
            .await;

        assert_eq!(
            result.error_message(),
            Some("invalid listing id '123/../user/items'")
        );
    }

    #[tokio::test]
    async fn test_existence_heuristic() {
        let server = MockServer::start().await;
        mount_items(&server, &["", "https://t.me/giftcode/LongCode42", "xy"]).await;
        let api = api(&server).await;

        assert!(listing_exists(api.as_ref(), 30, "https://t.me/giftcode/LongCode42").await);
        // substring either way
        assert!(listing_exists(api.as_ref(), 30, "Code42").await);
        assert!(listing_exists(api.as_ref(), 30, "https://t.me/giftcode/xyz").await);
        assert!(!listing_exists(api.as_ref(), 30, "https://t.me/giftcode/other").await);
    }

    #[tokio::test]
    async fn test_failed_lookup_means_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user/items"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let api = api(&server).await;
        assert!(!listing_exists(api.as_ref(), 30, "abc").await);
    }
}
