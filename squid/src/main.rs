//! Squid demo.
//!
//! Runs one complete purchase against in-process collaborators:
//!
//! - an in-memory ledger holding a publisher and a consumer account,
//! - an in-memory secret store,
//! - the in-memory registry, or an Aquarius instance when
//!   `SQUID_AQUARIUS_URI` is set,
//! - a simulated gateway whose publisher task executes the agreement and
//!   grants access once payment is locked.
//!
//! The delivered download URLs are logged and the metrics are printed at
//! the end.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use squid::config::ENV_AQUARIUS_URI;
use squid::ddo::MetaDataBase;
use squid::{
    Account, Address, AgreementId, AquariusClient, Collaborators, EventFilter, Gateway,
    InMemoryLedger, InMemoryRegistry, InMemorySecretStore, InitializeAgreementRequest, MetaData,
    MetadataRegistry, MetricsRegistry, Ocean, Signature, SquidConfig, SquidError, Template,
};

const PUBLISHER: &str = "0x2c0d5f47374b130ee398f4c34dbe8168824a8616";
const CONSUMER: &str = "0x00bd138abd70e2f00903268f3db08f2d25677c9e";

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "squid=info,squid_demo=info".into()),
        )
        .init();

    if let Err(e) = run().await {
        eprintln!("fatal error: {e}");
        std::process::exit(1);
    }
}

/// Gateway that hands initialize requests to the publisher task.
struct SimulatedBrizo {
    base_url: String,
    requests: mpsc::UnboundedSender<InitializeAgreementRequest>,
}

impl SimulatedBrizo {
    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}{}/{path}",
            self.base_url.trim_end_matches('/'),
            squid::brizo::SERVICES_API_PATH
        )
    }
}

#[async_trait]
impl Gateway for SimulatedBrizo {
    fn purchase_endpoint(&self) -> String {
        self.endpoint("access/initialize")
    }

    fn consume_endpoint(&self) -> String {
        self.endpoint("consume")
    }

    fn compute_endpoint(&self) -> String {
        self.endpoint("compute")
    }

    async fn initialize_agreement(
        &self,
        request: &InitializeAgreementRequest,
    ) -> Result<(), SquidError> {
        self.requests
            .send(request.clone())
            .map_err(|_| SquidError::RemoteUnavailable("publisher task has stopped".into()))
    }
}

async fn run() -> Result<(), String> {
    let config = SquidConfig::default()
        .with_env_overrides()
        .map_err(|e| format!("failed to load config: {e}"))?;

    // ---------------------------
    // Collaborators
    // ---------------------------

    let ledger = Arc::new(
        InMemoryLedger::new()
            .with_account(Address::new(PUBLISHER), 1_000_000, 0)
            .with_account(Address::new(CONSUMER), 1_000_000, 0),
    );

    let registry: Arc<dyn MetadataRegistry> = if std::env::var(ENV_AQUARIUS_URI).is_ok() {
        tracing::info!(url = %config.aquarius.base_url, "using remote metadata registry");
        Arc::new(
            AquariusClient::new(&config.aquarius.base_url, config.aquarius.timeout)
                .map_err(|e| format!("failed to create Aquarius client: {e}"))?,
        )
    } else {
        Arc::new(InMemoryRegistry::new(&config.aquarius.base_url))
    };

    let (requests_tx, requests_rx) = mpsc::unbounded_channel();
    let gateway = SimulatedBrizo {
        base_url: config.brizo.base_url.clone(),
        requests: requests_tx,
    };

    let metrics =
        MetricsRegistry::new().map_err(|e| format!("failed to initialise metrics registry: {e}"))?;

    let ocean = Arc::new(
        Ocean::new(
            Collaborators {
                registry,
                gateway: Arc::new(gateway),
                ledger,
                secret_store: Arc::new(InMemorySecretStore::new()),
            },
            config,
        )
        .with_metrics(metrics.clone()),
    );

    let publisher = ocean.account(PUBLISHER);
    let consumer = ocean.account(CONSUMER);

    tokio::spawn(run_publisher(ocean.clone(), requests_rx));

    // ---------------------------
    // Publish
    // ---------------------------

    ocean
        .register_template(Template::Access, &publisher)
        .await
        .map_err(|e| format!("failed to register template: {e}"))?;

    let metadata = MetaData {
        base: MetaDataBase {
            name: "UK Weather information 2011".into(),
            asset_type: "dataset".into(),
            description: "Weather information of UK including temperature and humidity".into(),
            author: "Met Office".into(),
            license: "CC-BY".into(),
            content_urls: vec![
                "https://storage.example.com/weather/2011.csv".into(),
                "https://storage.example.com/weather/README.txt".into(),
            ],
            tags: vec!["weather".into(), "uk".into(), "2011".into()],
            price: Some(10),
            ..Default::default()
        },
        ..Default::default()
    };
    let ddo = ocean
        .register_asset(metadata, &publisher)
        .await
        .map_err(|e| format!("failed to register asset: {e}"))?;
    let did = ddo.id().to_string();
    tracing::info!(%did, "asset published");

    let hits = ocean
        .search_by_text("weather")
        .await
        .map_err(|e| format!("search failed: {e}"))?;
    tracing::info!(hits = hits.len(), "text search for \"weather\"");

    // ---------------------------
    // Consume
    // ---------------------------

    ocean
        .request_tokens(&consumer, 100)
        .await
        .map_err(|e| format!("faucet request failed: {e}"))?;

    let order = ocean
        .order(&did, &consumer)
        .await
        .map_err(|e| format!("order failed: {e}"))?;
    let agreement_id = order.agreement.agreement_id.clone();

    let delivery = ocean
        .initialize(&did, &agreement_id, &order.signature, &consumer)
        .await
        .map_err(|e| format!("agreement initialization failed: {e}"))?;

    let receipt = order
        .payment
        .wait()
        .await
        .map_err(|e| format!("payment failed: {e}"))?;
    tracing::info!(%agreement_id, tx = %receipt.transaction_hash, "payment locked");

    let files = delivery
        .wait()
        .await
        .map_err(|e| format!("delivery failed: {e}"))?;
    for file in &files {
        tracing::info!(url = %file.url, "file available");
    }

    let balance = consumer
        .token_balance()
        .await
        .map_err(|e| format!("balance lookup failed: {e}"))?;
    tracing::info!(balance, "consumer token balance after purchase");

    println!("{}", metrics.gather_text());
    Ok(())
}

/// Publisher side of the simulated gateway.
///
/// For each initialize request: execute the agreement, wait for the
/// consumer's payment, then grant access.
async fn run_publisher(
    ocean: Arc<Ocean>,
    mut requests: mpsc::UnboundedReceiver<InitializeAgreementRequest>,
) {
    let publisher = ocean.account(PUBLISHER);
    while let Some(request) = requests.recv().await {
        let agreement_id = request.service_agreement_id.clone();
        if let Err(e) = serve_request(&ocean, &publisher, request).await {
            tracing::warn!(%agreement_id, error = %e, "publisher failed to serve agreement");
        }
    }
}

async fn serve_request(
    ocean: &Ocean,
    publisher: &Account,
    request: InitializeAgreementRequest,
) -> Result<(), SquidError> {
    let agreement_id = AgreementId::parse(&request.service_agreement_id)?;
    let signature = Signature::from_hex(&request.signature)?;
    let consumer = ocean.account(request.consumer_address.clone());

    let payment = ocean
        .orchestrator()
        .listener()
        .subscribe(
            "PaymentConditions",
            "PaymentLocked",
            EventFilter::any().with("serviceAgreementId", agreement_id.as_str()),
        )
        .await?;

    ocean
        .execute(
            &request.did,
            &agreement_id,
            &signature,
            &consumer,
            publisher,
        )
        .await?;
    payment
        .once_within(ocean.config().agreement.event_timeout)
        .await?;
    ocean
        .grant_access(&request.did, &agreement_id, publisher)
        .await?;
    Ok(())
}
