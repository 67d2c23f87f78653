use std::sync::Arc;

use reqwest::Method;
use serde::de::DeserializeOwned;
use tracing::{debug, error, info};

use crate::domain::error::PipelineError;
use crate::domain::models::{Auction, ConnectedRealm, ConnectedRealmIndex, Item};
use super::oauth2::AuthenticatedTransport;
use super::responses::{AuctionsResponse, ConnectedRealmIndexResponse, ConnectedRealmResponse, ItemResponse};

const API_HOST_FORMAT: &str = "https://{region}.api.blizzard.com";
const NAMESPACE_HEADER: &str = "Battlenet-Namespace";
// All output is requested in en_US.
const LOCALE: &str = "en_US";

pub fn api_base_url_for_region(region: &str) -> String {
    API_HOST_FORMAT.replace("{region}", region)
}

/// Typed access to the game-data API of one region.
pub struct RealmDataClient {
    transport: Arc<AuthenticatedTransport>,
    base_url: String,
    namespace: String,
}

impl RealmDataClient {
    pub fn new(transport: Arc<AuthenticatedTransport>, region: &str) -> Self {
        Self::with_base_url(transport, region, api_base_url_for_region(region))
    }

    pub fn with_base_url(transport: Arc<AuthenticatedTransport>, region: &str, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        debug!("Initializing realm data client for {} (region {})", base_url, region);
        Self {
            transport,
            base_url,
            namespace: format!("dynamic-{}", region),
        }
    }

    /// Fetches every connected realm in the region, indexed by member realm name.
    ///
    /// Fails as a whole if any single connected realm cannot be fetched.
    pub async fn list_connected_realms(&self) -> Result<ConnectedRealmIndex, PipelineError> {
        let index: ConnectedRealmIndexResponse = self.call_api("/data/wow/connected-realm/index").await?;
        info!("Realm index lists {} connected realms", index.connected_realms.len());

        let mut realms = Vec::with_capacity(index.connected_realms.len());
        for link in &index.connected_realms {
            let id = parse_realm_id(&link.href)?;
            debug!("Found connected realm id {}", id);

            let realm = self.connected_realm(id).await.map_err(|e| {
                error!("Failed to fetch connected realm {}: {}", id, e);
                PipelineError::Upstream {
                    context: format!("connected realm {}", id),
                    message: e.to_string(),
                }
            })?;
            realms.push(realm);
        }

        let index: ConnectedRealmIndex = realms.into_iter().collect();
        info!("Indexed {} realm names", index.len());
        Ok(index)
    }

    async fn connected_realm(&self, id: i64) -> Result<ConnectedRealm, PipelineError> {
        let path = format!("/data/wow/connected-realm/{}", id);
        let response: ConnectedRealmResponse = self.call_api(&path).await?;

        if response.realms.is_empty() {
            return Err(PipelineError::Decode {
                context: path,
                message: "connected realm has no member realms".to_string(),
            });
        }

        Ok(ConnectedRealm {
            id,
            member_realm_names: response.realms.into_iter().map(|r| r.name).collect(),
        })
    }

    /// Fetches all auctions of a connected realm. The first listing without a
    /// quantity or without a price voids the whole batch.
    pub async fn list_auctions(&self, connected_realm_id: i64) -> Result<Vec<Auction>, PipelineError> {
        let path = format!("/data/wow/connected-realm/{}/auctions", connected_realm_id);
        let response: AuctionsResponse = self.call_api(&path).await?;
        debug!("Validating {} auctions for connected realm {}", response.auctions.len(), connected_realm_id);

        let auctions = response
            .auctions
            .into_iter()
            .map(|raw| raw.into_auction(connected_realm_id))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| {
                error!("Rejecting auctions of connected realm {}: {}", connected_realm_id, e);
                e
            })?;

        info!("Fetched {} auctions for connected realm {}", auctions.len(), connected_realm_id);
        Ok(auctions)
    }

    pub async fn get_item(&self, item_id: i64) -> Result<Item, PipelineError> {
        let response: ItemResponse = self.call_api(&format!("/data/wow/item/{}", item_id)).await?;
        Ok(response.into())
    }

    async fn call_api<T: DeserializeOwned>(&self, path: &str) -> Result<T, PipelineError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);

        let request = self
            .transport
            .request(Method::GET, &url)
            .header(NAMESPACE_HEADER, &self.namespace)
            .query(&[("locale", LOCALE)]);
        let response = self.transport.send(request).await?;

        let status = response.status();
        if !status.is_success() {
            error!("GET {} returned {}", url, status);
            return Err(PipelineError::Upstream {
                context: url,
                message: format!("unexpected status {}", status),
            });
        }

        let body = response.text().await.map_err(|e| PipelineError::Upstream {
            context: url.clone(),
            message: e.to_string(),
        })?;

        serde_json::from_str(&body).map_err(|e| {
            error!("Failed to decode response from {}: {}", url, e);
            PipelineError::Decode {
                context: url,
                message: e.to_string(),
            }
        })
    }
}

/// Extracts the connected realm id from the last path segment of an index link.
pub fn parse_realm_id(href: &str) -> Result<i64, PipelineError> {
    let without_query = href.split('?').next().unwrap_or_default();
    let segment = without_query.rsplit('/').next().unwrap_or_default();

    segment
        .parse()
        .map_err(|_| PipelineError::MalformedReference(href.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::domain::models::TimeLeft;
    use crate::infrastructure::wow_api::oauth2::OAuth2Secrets;

    async fn client_for(server: &MockServer) -> RealmDataClient {
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "token",
                "token_type": "bearer",
                "expires_in": 86399
            })))
            .mount(server)
            .await;

        let secrets = OAuth2Secrets {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
        };
        let transport = AuthenticatedTransport::with_token_url(secrets, format!("{}/oauth/token", server.uri()))
            .await
            .unwrap();
        RealmDataClient::with_base_url(Arc::new(transport), "us", server.uri())
    }

    fn link(server: &MockServer, id: &str) -> serde_json::Value {
        serde_json::json!({
            "href": format!("{}/data/wow/connected-realm/{}?namespace=dynamic-us", server.uri(), id)
        })
    }

    async fn mount_json(server: &MockServer, at: &str, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[test]
    fn parses_trailing_segment_and_drops_query() {
        assert_eq!(
            parse_realm_id("https://us.api.blizzard.com/data/wow/connected-realm/61?namespace=dynamic-us").unwrap(),
            61
        );
        assert_eq!(parse_realm_id("/data/wow/connected-realm/3678").unwrap(), 3678);
    }

    #[test]
    fn non_numeric_segment_is_malformed_reference() {
        for href in ["/data/wow/connected-realm/abc", "/data/wow/connected-realm/", ""] {
            assert!(matches!(parse_realm_id(href), Err(PipelineError::MalformedReference(_))));
        }
    }

    #[test]
    fn derives_api_host_from_region() {
        assert_eq!(api_base_url_for_region("kr"), "https://kr.api.blizzard.com");
    }

    #[tokio::test]
    async fn region_sets_host_and_namespace() {
        let server = MockServer::start().await;
        let transport = client_for(&server).await.transport;

        let client = RealmDataClient::new(transport, "eu");

        assert_eq!(client.base_url, "https://eu.api.blizzard.com");
        assert_eq!(client.namespace, "dynamic-eu");
    }

    #[tokio::test]
    async fn lists_connected_realms_by_member_name() {
        let server = MockServer::start().await;
        let client = client_for(&server).await;

        Mock::given(method("GET"))
            .and(path("/data/wow/connected-realm/index"))
            .and(header("Battlenet-Namespace", "dynamic-us"))
            .and(query_param("locale", "en_US"))
            .and(header("Authorization", "Bearer token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "_links": { "self": { "href": "ignored" } },
                "connected_realms": [link(&server, "5"), link(&server, "9")]
            })))
            .expect(1)
            .mount(&server)
            .await;
        mount_json(
            &server,
            "/data/wow/connected-realm/5",
            serde_json::json!({ "id": 5, "has_queue": false, "realms": [{ "id": 1, "name": "Zul'jin" }] }),
        )
        .await;
        mount_json(
            &server,
            "/data/wow/connected-realm/9",
            serde_json::json!({
                "id": 9,
                "realms": [{ "id": 2, "name": "Area 52" }, { "id": 3, "name": "Kil'jaeden" }]
            }),
        )
        .await;

        let index = client.list_connected_realms().await.unwrap();

        let mut names: Vec<&str> = index.names().collect();
        names.sort_unstable();
        assert_eq!(names, vec!["area 52", "kil'jaeden", "zul'jin"]);
        assert_eq!(
            index.get("zul'jin"),
            Some(&ConnectedRealm { id: 5, member_realm_names: vec!["Zul'jin".to_string()] })
        );
        assert_eq!(index.get("Kil'jaeden").map(|r| r.id), Some(9));
    }

    #[tokio::test]
    async fn one_failed_realm_fetch_aborts_the_listing() {
        let server = MockServer::start().await;
        let client = client_for(&server).await;

        mount_json(
            &server,
            "/data/wow/connected-realm/index",
            serde_json::json!({ "connected_realms": [link(&server, "5"), link(&server, "9")] }),
        )
        .await;
        mount_json(
            &server,
            "/data/wow/connected-realm/5",
            serde_json::json!({ "realms": [{ "name": "Zul'jin" }] }),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/data/wow/connected-realm/9"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        match client.list_connected_realms().await {
            Err(PipelineError::Upstream { context, .. }) => assert_eq!(context, "connected realm 9"),
            other => panic!("expected upstream error, got {:?}", other.map(|i| i.len())),
        }
    }

    #[tokio::test]
    async fn malformed_index_link_is_rejected() {
        let server = MockServer::start().await;
        let client = client_for(&server).await;

        mount_json(
            &server,
            "/data/wow/connected-realm/index",
            serde_json::json!({ "connected_realms": [{ "href": "https://example.test/connected-realm/zuljin" }] }),
        )
        .await;

        let result = client.list_connected_realms().await;
        assert!(matches!(result, Err(PipelineError::MalformedReference(_))));
    }

    #[tokio::test]
    async fn lists_valid_auctions() {
        let server = MockServer::start().await;
        let client = client_for(&server).await;

        mount_json(
            &server,
            "/data/wow/connected-realm/61/auctions",
            serde_json::json!({
                "connected_realm": { "href": "ignored" },
                "auctions": [
                    { "id": 1, "item": { "id": 42 }, "quantity": 3, "unit_price": 100, "time_left": "SHORT" },
                    { "id": 2, "item": { "id": 7, "bonus_lists": [6654] }, "quantity": 1, "buyout": 5000,
                      "bid": 4000, "time_left": "VERY_LONG" }
                ]
            }),
        )
        .await;

        let auctions = client.list_auctions(61).await.unwrap();

        assert_eq!(auctions.len(), 2);
        assert_eq!(auctions[0].unit_price, 100);
        assert_eq!(auctions[0].buyout, 0);
        assert_eq!(auctions[1].bid, 4000);
        assert_eq!(auctions[1].time_left, TimeLeft::VeryLong);
        assert!(auctions.iter().all(|a| a.realm_id == 61));
    }

    #[tokio::test]
    async fn zero_quantity_voids_the_batch() {
        let server = MockServer::start().await;
        let client = client_for(&server).await;

        mount_json(
            &server,
            "/data/wow/connected-realm/61/auctions",
            serde_json::json!({
                "auctions": [
                    { "id": 1, "item": { "id": 42 }, "quantity": 3, "unit_price": 100, "time_left": "SHORT" },
                    { "id": 2, "item": { "id": 43 }, "quantity": 0, "unit_price": 100, "time_left": "LONG" }
                ]
            }),
        )
        .await;

        match client.list_auctions(61).await {
            Err(PipelineError::InvalidAuctionRecord { auction_id, item_id, .. }) => {
                assert_eq!((auction_id, item_id), (2, 43));
            }
            other => panic!("expected invalid auction record, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn unpriced_auction_voids_the_batch() {
        let server = MockServer::start().await;
        let client = client_for(&server).await;

        mount_json(
            &server,
            "/data/wow/connected-realm/61/auctions",
            serde_json::json!({
                "auctions": [{ "id": 8, "item": { "id": 9 }, "quantity": 1, "bid": 10, "time_left": "MEDIUM" }]
            }),
        )
        .await;

        let result = client.list_auctions(61).await;
        assert!(matches!(result, Err(PipelineError::InvalidAuctionRecord { auction_id: 8, .. })));
    }

    #[tokio::test]
    async fn unknown_time_left_is_a_decode_error() {
        let server = MockServer::start().await;
        let client = client_for(&server).await;

        mount_json(
            &server,
            "/data/wow/connected-realm/61/auctions",
            serde_json::json!({
                "auctions": [{ "id": 1, "item": { "id": 42 }, "quantity": 3, "unit_price": 100, "time_left": "FOREVER" }]
            }),
        )
        .await;

        assert!(matches!(client.list_auctions(61).await, Err(PipelineError::Decode { .. })));
    }

    #[tokio::test]
    async fn non_success_status_is_an_upstream_error() {
        let server = MockServer::start().await;
        let client = client_for(&server).await;

        Mock::given(method("GET"))
            .and(path("/data/wow/connected-realm/61/auctions"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        assert!(matches!(client.list_auctions(61).await, Err(PipelineError::Upstream { .. })));
    }

    #[tokio::test]
    async fn malformed_json_is_a_decode_error() {
        let server = MockServer::start().await;
        let client = client_for(&server).await;

        Mock::given(method("GET"))
            .and(path("/data/wow/connected-realm/61/auctions"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"auctions\": ["))
            .mount(&server)
            .await;

        assert!(matches!(client.list_auctions(61).await, Err(PipelineError::Decode { .. })));
    }

    #[tokio::test]
    async fn gets_item_with_class_names() {
        let server = MockServer::start().await;
        let client = client_for(&server).await;

        mount_json(
            &server,
            "/data/wow/item/19019",
            serde_json::json!({
                "id": 19019,
                "name": "Thunderfury, Blessed Blade of the Windseeker",
                "item_class": { "key": { "href": "ignored" }, "name": "Weapon", "id": 2 },
                "item_subclass": { "key": { "href": "ignored" }, "name": "Sword", "id": 7 }
            }),
        )
        .await;

        let item = client.get_item(19019).await.unwrap();

        assert_eq!(item.item_class, "Weapon");
        assert_eq!(item.item_subclass_id, 7);
    }
}
