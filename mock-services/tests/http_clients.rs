//! Exercises the squid HTTP clients against the mock services.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use mock_services::app;
use mock_services::state::{AppState, SharedState};
use squid::agreement::Template;
use squid::ddo::{AssetDescriptor, MetaDataBase, ServiceEndpoints};
use squid::{
    Address, AgreementId, AquariusClient, BrizoClient, Ddo, Did, Gateway, InMemoryLedger,
    InMemorySecretStore, InitializeAgreementRequest, MetaData, MetadataRegistry, Ocean,
    SearchQuery, SquidConfig, SquidError,
};

const PUBLISHER: &str = "0x2c0d5f47374b130ee398f4c34dbe8168824a8616";
const CONSUMER: &str = "0x00bd138abd70e2f00903268f3db08f2d25677c9e";

async fn spawn_server() -> (String, SharedState) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base_url = format!("http://{addr}");
    let state: SharedState = Arc::new(AppState::new(base_url.clone()));

    let router = app(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (base_url, state)
}

async fn closed_port() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

fn dummy_ddo(base_url: &str, name: &str, tags: &[&str]) -> Ddo {
    let did = Did::generate();
    let mut metadata = MetaData {
        base: MetaDataBase {
            name: name.into(),
            author: "Met Office".into(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            price: Some(10),
            ..Default::default()
        },
        ..Default::default()
    };
    let conditions = Template::Access
        .build_conditions(&metadata, did.id())
        .unwrap();
    metadata.base.content_urls = vec!["0xdeadbeef".into()];
    AssetDescriptor {
        did: did.clone(),
        publisher: Address::new(PUBLISHER),
        public_key: "0xkey".into(),
        metadata,
        conditions,
        endpoints: ServiceEndpoints {
            purchase: format!("{base_url}/api/v1/brizo/services/access/initialize"),
            consume: format!("{base_url}/api/v1/brizo/services/consume"),
            compute: format!("{base_url}/api/v1/brizo/services/compute"),
            metadata: format!("{base_url}/api/v1/aquarius/assets/metadata/{did}"),
        },
    }
    .build()
    .unwrap()
}

fn dummy_request(
    did: &Did,
    agreement_id: &AgreementId,
    signature: &str,
) -> InitializeAgreementRequest {
    InitializeAgreementRequest {
        did: did.to_string(),
        service_agreement_id: agreement_id.to_string(),
        service_definition_id: "0".into(),
        signature: signature.into(),
        consumer_address: CONSUMER.into(),
    }
}

#[tokio::test]
async fn aquarius_stores_and_retrieves_descriptors() {
    let (base_url, state) = spawn_server().await;
    let client = AquariusClient::new(&base_url, Duration::from_secs(5)).unwrap();
    let ddo = dummy_ddo(&base_url, "UK Weather information 2011", &["weather"]);

    let stored = client.store_ddo(&ddo).await.expect("store should succeed");
    assert_eq!(stored, ddo);
    assert_eq!(state.registry.len(), 1);

    let fetched = client.retrieve_ddo(ddo.id()).await.unwrap();
    assert_eq!(fetched, Some(ddo.clone()));

    let metadata: MetaData = reqwest::get(client.service_endpoint(ddo.id()))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(Some(&metadata), ddo.metadata());
}

#[tokio::test]
async fn missing_descriptor_is_none_but_dead_registry_is_an_error() {
    let (base_url, _state) = spawn_server().await;
    let client = AquariusClient::new(&base_url, Duration::from_secs(5)).unwrap();
    assert_eq!(client.retrieve_ddo(&Did::generate()).await.unwrap(), None);

    let dead_url = format!("http://{}", closed_port().await);
    let dead = AquariusClient::new(dead_url, Duration::from_secs(5)).unwrap();
    let err = dead.retrieve_ddo(&Did::generate()).await.unwrap_err();
    assert!(
        matches!(err, SquidError::RemoteUnavailable(_)),
        "unexpected: {err:?}"
    );
}

#[tokio::test]
async fn aquarius_structured_and_text_queries() {
    let (base_url, _state) = spawn_server().await;
    let client = AquariusClient::new(&base_url, Duration::from_secs(5)).unwrap();
    client
        .store_ddo(&dummy_ddo(&base_url, "UK Weather 2011", &["weather", "uk"]))
        .await
        .unwrap();
    client
        .store_ddo(&dummy_ddo(&base_url, "Office Occupancy", &["buildings"]))
        .await
        .unwrap();

    let hits = client
        .query_by_text(&SearchQuery::text("weather"))
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].metadata().unwrap().base.name, "UK Weather 2011");

    let hits = client
        .query(&SearchQuery::structured(json!({ "tags": "buildings" })))
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);

    let everything = client
        .query(&SearchQuery::structured(json!({})).with_page(0, 1))
        .await
        .unwrap();
    assert_eq!(everything.len(), 1);
}

#[tokio::test]
async fn registry_rejects_descriptors_breaking_service_invariants() {
    let (base_url, state) = spawn_server().await;
    let ddo = dummy_ddo(&base_url, "asset", &[]);
    let mut raw = serde_json::to_value(&ddo).unwrap();
    let services = raw["service"].as_array_mut().unwrap();
    let metadata = services[2].clone();
    services.push(metadata);

    let resp = reqwest::Client::new()
        .post(format!("{base_url}/api/v1/aquarius/assets/ddo"))
        .json(&raw)
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_client_error());
    assert!(state.registry.is_empty());
}

#[tokio::test]
async fn brizo_records_initialize_requests() {
    let (base_url, state) = spawn_server().await;
    let client = BrizoClient::new(&base_url, Duration::from_secs(5)).unwrap();
    let did = Did::generate();
    let agreement_id = AgreementId::generate();

    client
        .initialize_agreement(&dummy_request(&did, &agreement_id, "0x0102"))
        .await
        .expect("gateway should accept");
    let initialized = state.initialized.lock().await.clone();
    assert_eq!(initialized.len(), 1);
    assert_eq!(initialized[0].service_agreement_id, agreement_id.as_str());

    let err = client
        .initialize_agreement(&dummy_request(&did, &agreement_id, "not hex"))
        .await
        .unwrap_err();
    assert!(matches!(err, SquidError::RemoteUnavailable(_)));
    assert_eq!(state.initialized.lock().await.len(), 1);
}

#[tokio::test]
async fn purchase_over_http_delivers_consumable_urls() {
    let (base_url, state) = spawn_server().await;
    let mut config = SquidConfig::default();
    config.aquarius.base_url = base_url.clone();
    config.brizo.base_url = base_url.clone();
    config.agreement.event_timeout = Some(Duration::from_secs(5));
    config.agreement.scope_access_events = true;

    let ledger = Arc::new(
        InMemoryLedger::new()
            .with_account(Address::new(PUBLISHER), 1_000, 0)
            .with_account(Address::new(CONSUMER), 1_000, 100),
    );
    let ocean = Ocean::from_config(config, ledger, Arc::new(InMemorySecretStore::new())).unwrap();
    let publisher = ocean.account(PUBLISHER);
    let consumer = ocean.account(CONSUMER);

    let metadata = MetaData {
        base: MetaDataBase {
            name: "UK Weather information 2011".into(),
            content_urls: vec!["https://storage.example.com/weather.csv".into()],
            price: Some(10),
            ..Default::default()
        },
        ..Default::default()
    };
    let ddo = ocean.register_asset(metadata, &publisher).await.unwrap();
    let did = ddo.id().to_string();
    assert_eq!(state.registry.len(), 1);

    let order = ocean.order(&did, &consumer).await.unwrap();
    let agreement_id = order.agreement.agreement_id.clone();
    let signature = &order.signature;
    let delivery = ocean
        .initialize(&did, &agreement_id, signature, &consumer)
        .await
        .unwrap();
    assert_eq!(state.initialized.lock().await.len(), 1);

    ocean
        .execute(&did, &agreement_id, signature, &consumer, &publisher)
        .await
        .unwrap();
    order.payment.wait().await.unwrap();
    ocean
        .grant_access(&did, &agreement_id, &publisher)
        .await
        .unwrap();

    let files = delivery.wait().await.unwrap();
    assert_eq!(files.len(), 1);
    let body = reqwest::get(&files[0].url).await.unwrap();
    assert!(body.status().is_success());
    let locator = body.text().await.unwrap();
    assert_eq!(locator, "https://storage.example.com/weather.csv");
}

#[tokio::test]
async fn consume_refuses_unknown_agreements() {
    let (base_url, _state) = spawn_server().await;
    let resp = reqwest::Client::new()
        .get(format!("{base_url}/api/v1/brizo/services/consume"))
        .query(&[
            ("url", "https://storage.example.com/weather.csv"),
            ("serviceAgreementId", "0x01"),
            ("consumerAddress", CONSUMER),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn health_reports_ok() {
    let (base_url, _state) = spawn_server().await;
    let body: serde_json::Value = reqwest::get(format!("{base_url}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
}
