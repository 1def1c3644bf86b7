//! Service agreement orchestration.
//!
//! The orchestrator wires together:
//!
//! - a [`MetadataRegistry`] to resolve descriptors,
//! - a [`Ledger`] to sign, submit and watch agreement events,
//! - a [`SecretStore`] to decrypt content locators,
//! - a [`Gateway`] to hand signed agreements to the publisher.
//!
//! Consumer side, an asset purchase runs in two halves:
//!
//! 1. [`AgreementOrchestrator::order`] signs the agreement, checks the
//!    balance and returns once it is waiting for the "agreement executed"
//!    event. When that event fires, payment is locked.
//! 2. [`AgreementOrchestrator::initialize_service_agreement`] starts
//!    waiting for "access granted", then tells the gateway about the
//!    agreement. When access is granted the locators are decrypted and
//!    turned into download URLs.
//!
//! Both waits run as background tasks behind a [`FlowHandle`].

use std::sync::Arc;
use std::time::Instant;

use reqwest::Url;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::ServiceAgreement;
use super::signature::sign_agreement;
use super::state::{AgreementState, FlowHandle};
use crate::aquarius::MetadataRegistry;
use crate::brizo::{Gateway, InitializeAgreementRequest};
use crate::config::AgreementConfig;
use crate::ddo::{AccessService, Ddo, MetaData, ServiceType};
use crate::error::SquidError;
use crate::events::EventListener;
use crate::keeper::{EventFilter, KeeperCall, Ledger, Receipt};
use crate::metrics::AgreementMetrics;
use crate::secret_store::SecretStore;
use crate::types::{Address, AgreementId, Did, Signature};

/// Return-value field carrying the agreement id in agreement events.
const AGREEMENT_ID_FIELD: &str = "serviceAgreementId";

/// A signed agreement whose payment is pending.
#[derive(Debug)]
pub struct SignedOrder {
    pub agreement: ServiceAgreement,
    pub signature: Signature,
    /// Resolves with the `lockPayment` receipt once the agreement has been
    /// executed and payment submitted.
    pub payment: FlowHandle<Receipt>,
}

/// One deliverable file of an asset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetFile {
    /// Decrypted locator as stored by the publisher.
    pub locator: String,
    /// Gateway URL the consumer downloads from.
    pub url: String,
}

/// Drives service agreements against the injected collaborators.
pub struct AgreementOrchestrator {
    registry: Arc<dyn MetadataRegistry>,
    gateway: Arc<dyn Gateway>,
    ledger: Arc<dyn Ledger>,
    secret_store: Arc<dyn SecretStore>,
    listener: EventListener,
    config: AgreementConfig,
    metrics: Option<AgreementMetrics>,
}

impl AgreementOrchestrator {
    pub fn new(
        registry: Arc<dyn MetadataRegistry>,
        gateway: Arc<dyn Gateway>,
        ledger: Arc<dyn Ledger>,
        secret_store: Arc<dyn SecretStore>,
        config: AgreementConfig,
    ) -> Self {
        Self {
            registry,
            gateway,
            listener: EventListener::new(ledger.clone()),
            ledger,
            secret_store,
            config,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: AgreementMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn listener(&self) -> &EventListener {
        &self.listener
    }

    pub fn config(&self) -> &AgreementConfig {
        &self.config
    }

    async fn resolve(&self, did: &Did) -> Result<Ddo, SquidError> {
        self.registry
            .retrieve_ddo(did)
            .await?
            .ok_or_else(|| SquidError::DescriptorNotFound(did.to_string()))
    }

    fn agreement_for(
        ddo: &Ddo,
        access: &AccessService,
        agreement_id: AgreementId,
        consumer: &Address,
    ) -> ServiceAgreement {
        ServiceAgreement {
            agreement_id,
            did: ddo.id().clone(),
            service_definition_id: access.service_definition_id.clone(),
            template_id: access.template_id.clone(),
            consumer: consumer.clone(),
            publisher: ddo
                .public_key()
                .first()
                .map(|k| Address::new(k.owner.clone())),
            conditions: access.conditions.clone(),
        }
    }

    /// Signs a new agreement for `did` as `consumer` and arranges for
    /// payment once the publisher executes it.
    ///
    /// Fails without touching the ledger when the descriptor cannot be
    /// resolved, lacks an Access or Metadata service, or when the
    /// consumer's token balance is below the asset price.
    pub async fn order(&self, did: &str, consumer: &Address) -> Result<SignedOrder, SquidError> {
        let did = Did::parse(did)?;
        let ddo = self.resolve(&did).await?;
        let access = access_service(&ddo)?;
        let metadata = metadata(&ddo)?;
        let price = metadata.price().ok_or_else(|| SquidError::TemplateResolution {
            template: access.template_id.clone(),
            reason: "metadata has no price".to_string(),
        })?;

        let (state_tx, state_rx) = watch::channel(AgreementState::Init);
        let agreement = Self::agreement_for(&ddo, access, AgreementId::generate(), consumer);
        let agreement_id = agreement.agreement_id.clone();

        let signature = sign_agreement(self.ledger.as_ref(), &agreement).await?;
        state_tx.send_replace(AgreementState::Signed);

        let balance = self.ledger.token_balance(consumer).await?;
        if balance < price {
            state_tx.send_replace(AgreementState::Rejected);
            if let Some(m) = &self.metrics {
                m.orders_rejected.inc();
            }
            warn!(%agreement_id, %consumer, price, balance, "order rejected: insufficient balance");
            return Err(SquidError::InsufficientBalance { price, balance });
        }

        let contract = &access.service_agreement_contract;
        let executed = contract.events.first().ok_or_else(|| {
            SquidError::InvalidDescriptor(format!(
                "{} declares no agreement events",
                contract.contract_name
            ))
        })?;
        let subscription = self
            .listener
            .subscribe(
                &contract.contract_name,
                &executed.name,
                EventFilter::any().with(AGREEMENT_ID_FIELD, agreement_id.as_str()),
            )
            .await?;
        state_tx.send_replace(AgreementState::PaymentPending);
        if let Some(m) = &self.metrics {
            m.orders_started.inc();
        }
        info!(%agreement_id, %did, %consumer, price, "agreement signed, waiting for execution");

        let ledger = self.ledger.clone();
        let metrics = self.metrics.clone();
        let timeout = self.config.event_timeout;
        let consumer = consumer.clone();
        let asset_id = did.id().to_string();
        let flow_id = agreement_id.clone();

        let task = tokio::spawn(async move {
            let started = Instant::now();
            if let Err(e) = subscription.once_within(timeout).await {
                state_tx.send_replace(AgreementState::Failed);
                if let Some(m) = &metrics {
                    m.subscription_errors.inc();
                }
                warn!(agreement_id = %flow_id, error = %e, "agreement execution wait failed");
                return Err(e);
            }
            if let Some(m) = &metrics {
                let waited = started.elapsed().as_secs_f64();
                m.event_wait_seconds.observe(waited);
            }
            debug!(agreement_id = %flow_id, "agreement executed, locking payment");

            let call = KeeperCall::LockPayment {
                agreement_id: flow_id.clone(),
                asset_id,
                price,
            };
            match ledger.send(&consumer, call).await {
                Ok(receipt) => {
                    state_tx.send_replace(AgreementState::Paid);
                    if let Some(m) = &metrics {
                        m.payments_submitted.inc();
                    }
                    let tx = &receipt.transaction_hash;
                    info!(agreement_id = %flow_id, %tx, "payment locked");
                    Ok(receipt)
                }
                Err(e) => {
                    state_tx.send_replace(AgreementState::Failed);
                    warn!(agreement_id = %flow_id, error = %e, "lockPayment failed");
                    Err(e.into())
                }
            }
        });

        Ok(SignedOrder {
            agreement,
            signature,
            payment: FlowHandle::new(agreement_id, state_rx, task),
        })
    }

    /// Waits for access to be granted on `agreement_id`, then decrypts the
    /// asset's locators into download URLs.
    ///
    /// The subscription is in place before the gateway is contacted, so a
    /// publisher reacting immediately cannot be missed. If the gateway call
    /// fails the wait is cancelled and the error returned.
    pub async fn initialize_service_agreement(
        &self,
        did: &str,
        agreement_id: &AgreementId,
        signature: &Signature,
        consumer: &Address,
    ) -> Result<FlowHandle<Vec<AssetFile>>, SquidError> {
        let did = Did::parse(did)?;
        let ddo = self.resolve(&did).await?;
        let access = access_service(&ddo)?;
        let ciphertext = metadata(&ddo)?
            .base
            .content_urls
            .first()
            .cloned()
            .ok_or_else(|| {
                SquidError::InvalidDescriptor(format!("{did} has no encrypted content urls"))
            })?;

        let (condition, granted) = access
            .conditions
            .iter()
            .rev()
            .find_map(|c| c.consumer_event().map(|e| (c, e)))
            .ok_or_else(|| {
                SquidError::InvalidDescriptor(format!("{did} has no consumer-side access event"))
            })?;

        let filter = if self.config.scope_access_events {
            EventFilter::any().with(AGREEMENT_ID_FIELD, agreement_id.as_str())
        } else {
            EventFilter::any()
        };
        let subscription = self
            .listener
            .subscribe(&condition.contract_name, &granted.name, filter)
            .await?;
        let (state_tx, state_rx) = watch::channel(AgreementState::AccessPending);

        let secret_store = self.secret_store.clone();
        let metrics = self.metrics.clone();
        let timeout = self.config.event_timeout;
        let endpoint = access.service_endpoint.clone();
        let asset_id = did.id().to_string();
        let flow_id = agreement_id.clone();
        let consumer_address = consumer.clone();

        let task = tokio::spawn(async move {
            let started = Instant::now();
            if let Err(e) = subscription.once_within(timeout).await {
                state_tx.send_replace(AgreementState::Failed);
                if let Some(m) = &metrics {
                    m.subscription_errors.inc();
                }
                warn!(agreement_id = %flow_id, error = %e, "waiting for access grant failed");
                return Err(e);
            }
            state_tx.send_replace(AgreementState::AccessGranted);
            if let Some(m) = &metrics {
                let waited = started.elapsed().as_secs_f64();
                m.event_wait_seconds.observe(waited);
            }

            let delivered = async {
                let locators = secret_store
                    .decrypt_document(&asset_id, &ciphertext)
                    .await?;
                locators
                    .into_iter()
                    .map(|locator| -> Result<AssetFile, SquidError> {
                        let url = download_url(&endpoint, &locator, &flow_id, &consumer_address)?;
                        Ok(AssetFile { locator, url })
                    })
                    .collect::<Result<Vec<_>, _>>()
            }
            .await;

            match delivered {
                Ok(files) => {
                    state_tx.send_replace(AgreementState::Delivered);
                    if let Some(m) = &metrics {
                        m.deliveries.inc();
                    }
                    info!(agreement_id = %flow_id, files = files.len(), "files ready");
                    Ok(files)
                }
                Err(e) => {
                    state_tx.send_replace(AgreementState::Failed);
                    warn!(agreement_id = %flow_id, error = %e, "delivery failed");
                    Err(e)
                }
            }
        });
        let handle = FlowHandle::new(agreement_id.clone(), state_rx, task);

        let request = InitializeAgreementRequest {
            did: did.to_string(),
            service_agreement_id: agreement_id.to_string(),
            service_definition_id: access.service_definition_id.clone(),
            signature: signature.to_hex(),
            consumer_address: consumer.to_string(),
        };
        if let Err(e) = self.gateway.initialize_agreement(&request).await {
            handle.cancel();
            warn!(%agreement_id, error = %e, "gateway refused agreement initialization");
            return Err(e);
        }
        debug!(%agreement_id, "waiting for access grant");

        Ok(handle)
    }

    /// Publisher side: executes a consumer-signed agreement on the ledger.
    pub async fn execute_service_agreement(
        &self,
        did: &str,
        agreement_id: &AgreementId,
        signature: &Signature,
        consumer: &Address,
        publisher: &Address,
    ) -> Result<ServiceAgreement, SquidError> {
        let did = Did::parse(did)?;
        let ddo = self.resolve(&did).await?;
        let access = access_service(&ddo)?;
        let mut agreement = Self::agreement_for(&ddo, access, agreement_id.clone(), consumer);
        agreement.publisher = Some(publisher.clone());

        let call = KeeperCall::ExecuteAgreement {
            template_id: agreement.template_id.clone(),
            signature: signature.clone(),
            consumer: consumer.clone(),
            value_hashes: agreement.value_hashes(),
            timeouts: agreement.timeouts(),
            agreement_id: agreement_id.clone(),
            did_id: did.id().to_string(),
        };
        let receipt = self.ledger.send(publisher, call).await?;
        info!(%agreement_id, %did, tx = %receipt.transaction_hash, "agreement executed");
        Ok(agreement)
    }

    /// Publisher side: fulfils the access condition of an agreement.
    pub async fn grant_access(
        &self,
        did: &str,
        agreement_id: &AgreementId,
        publisher: &Address,
    ) -> Result<Receipt, SquidError> {
        let did = Did::parse(did)?;
        let call = KeeperCall::GrantAccess {
            agreement_id: agreement_id.clone(),
            asset_id: did.id().to_string(),
            document_key_id: did.id().to_string(),
        };
        let receipt = self.ledger.send(publisher, call).await?;
        info!(%agreement_id, %did, "access granted");
        Ok(receipt)
    }
}

fn access_service(ddo: &Ddo) -> Result<&AccessService, SquidError> {
    ddo.access_service().ok_or_else(|| SquidError::ServiceNotFound {
        did: ddo.id().to_string(),
        service_type: ServiceType::Access,
    })
}

fn metadata(ddo: &Ddo) -> Result<&MetaData, SquidError> {
    ddo.metadata().ok_or_else(|| SquidError::ServiceNotFound {
        did: ddo.id().to_string(),
        service_type: ServiceType::Metadata,
    })
}

/// `{endpoint}?url=<locator>&serviceAgreementId=<id>&consumerAddress=<addr>`
fn download_url(
    endpoint: &str,
    locator: &str,
    agreement_id: &AgreementId,
    consumer: &Address,
) -> Result<String, SquidError> {
    let mut url = Url::parse(endpoint).map_err(|e| {
        SquidError::InvalidDescriptor(format!("invalid service endpoint {endpoint:?}: {e}"))
    })?;
    url.query_pairs_mut()
        .append_pair("url", locator)
        .append_pair("serviceAgreementId", agreement_id.as_str())
        .append_pair("consumerAddress", consumer.as_str());
    Ok(url.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;

    use crate::agreement::template::Template;
    use crate::aquarius::InMemoryRegistry;
    use crate::ddo::{AssetDescriptor, MetaDataBase, ServiceEndpoints};
    use crate::keeper::{InMemoryLedger, SentCall};
    use crate::secret_store::InMemorySecretStore;

    const CONSUME_ENDPOINT: &str = "http://localhost:8030/api/v1/brizo/services/consume";
    const AGREEMENT_CONTRACT: &str = "ServiceAgreement";
    const EXECUTED: &str = "ExecuteAgreement";

    /// Gateway that records initialize requests and can be told to fail.
    #[derive(Default)]
    struct RecordingGateway {
        requests: Mutex<Vec<InitializeAgreementRequest>>,
        fail: bool,
    }

    #[async_trait]
    impl Gateway for RecordingGateway {
        fn purchase_endpoint(&self) -> String {
            "http://localhost:8030/api/v1/brizo/services/access/initialize".into()
        }

        fn consume_endpoint(&self) -> String {
            CONSUME_ENDPOINT.into()
        }

        fn compute_endpoint(&self) -> String {
            "http://localhost:8030/api/v1/brizo/services/compute".into()
        }

        async fn initialize_agreement(
            &self,
            request: &InitializeAgreementRequest,
        ) -> Result<(), SquidError> {
            if self.fail {
                return Err(SquidError::RemoteUnavailable("gateway down".into()));
            }
            self.requests.lock().unwrap().push(request.clone());
            Ok(())
        }
    }

    struct Fixture {
        ledger: Arc<InMemoryLedger>,
        registry: Arc<InMemoryRegistry>,
        secrets: Arc<InMemorySecretStore>,
        gateway: Arc<RecordingGateway>,
        orchestrator: AgreementOrchestrator,
        did: Did,
    }

    fn consumer() -> Address {
        Address::new("0x00bd138abd70e2f00903268f3db08f2d25677c9e")
    }

    fn publisher() -> Address {
        Address::new("0x2c0d5f47374b130ee398f4c34dbe8168824a8616")
    }

    fn dummy_urls() -> Vec<String> {
        vec![
            "https://storage.example.com/weather.csv".into(),
            "https://storage.example.com/readme.txt".into(),
        ]
    }

    async fn dummy_fixture(
        consumer_tokens: u64,
        config: AgreementConfig,
        gateway: RecordingGateway,
    ) -> Fixture {
        let ledger = Arc::new(
            InMemoryLedger::new()
                .with_account(consumer(), 1_000, consumer_tokens)
                .with_account(publisher(), 1_000, 0),
        );
        let registry = Arc::new(InMemoryRegistry::default());
        let secrets = Arc::new(InMemorySecretStore::new());
        let gateway = Arc::new(gateway);

        let did = Did::generate();
        let mut metadata = MetaData {
            base: MetaDataBase {
                name: "UK Weather information 2011".into(),
                price: Some(10),
                ..Default::default()
            },
            ..Default::default()
        };
        let conditions = Template::Access
            .build_conditions(&metadata, did.id())
            .unwrap();
        let cipher = secrets
            .encrypt_document(did.id(), &dummy_urls())
            .await
            .unwrap();
        metadata.base.content_urls = vec![cipher];

        let ddo = AssetDescriptor {
            did: did.clone(),
            publisher: publisher(),
            public_key: "0xkey".into(),
            metadata,
            conditions,
            endpoints: ServiceEndpoints {
                purchase: gateway.purchase_endpoint(),
                consume: gateway.consume_endpoint(),
                compute: gateway.compute_endpoint(),
                metadata: registry.service_endpoint(&did),
            },
        }
        .build()
        .unwrap();
        registry.insert(ddo);

        let orchestrator = AgreementOrchestrator::new(
            registry.clone(),
            gateway.clone(),
            ledger.clone(),
            secrets.clone(),
            config,
        );
        Fixture {
            ledger,
            registry,
            secrets,
            gateway,
            orchestrator,
            did,
        }
    }

    async fn funded_fixture(consumer_tokens: u64) -> Fixture {
        let gateway = RecordingGateway::default();
        dummy_fixture(consumer_tokens, AgreementConfig::default(), gateway).await
    }

    impl Fixture {
        fn emit_executed(&self, agreement_id: &AgreementId) {
            let fields = json!({ "serviceAgreementId": agreement_id.as_str() });
            self.ledger.emit(AGREEMENT_CONTRACT, EXECUTED, fields);
        }
    }

    fn lock_payments(sent: &[SentCall]) -> Vec<&KeeperCall> {
        sent.iter()
            .map(|s| &s.call)
            .filter(|c| matches!(c, KeeperCall::LockPayment { .. }))
            .collect()
    }

    #[tokio::test]
    async fn insufficient_balance_rejects_before_any_submission() {
        let fx = funded_fixture(5).await;

        let err = fx
            .orchestrator
            .order(&fx.did.to_string(), &consumer())
            .await
            .unwrap_err();

        match err {
            SquidError::InsufficientBalance { price, balance } => {
                assert_eq!((price, balance), (10, 5));
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(fx.ledger.sent().is_empty());
        assert_eq!(fx.ledger.subscriber_count(AGREEMENT_CONTRACT, EXECUTED), 0);
    }

    #[tokio::test]
    async fn payment_is_locked_once_after_agreement_execution() {
        let fx = funded_fixture(100).await;
        let order = fx
            .orchestrator
            .order(&fx.did.to_string(), &consumer())
            .await
            .expect("order should be signed");
        assert_eq!(order.payment.state(), AgreementState::PaymentPending);
        assert!(fx.ledger.sent().is_empty());

        // Another agreement's execution must not trigger our payment.
        let other = AgreementId::generate();
        fx.emit_executed(&other);
        tokio::task::yield_now().await;
        assert!(lock_payments(&fx.ledger.sent()).is_empty());

        let agreement_id = order.agreement.agreement_id.clone();
        fx.emit_executed(&agreement_id);
        fx.emit_executed(&agreement_id);

        let receipt = order.payment.wait().await.expect("payment should lock");
        assert!(receipt.status);

        let sent = fx.ledger.sent();
        let payments = lock_payments(&sent);
        assert_eq!(payments.len(), 1);
        assert_eq!(
            payments[0],
            &KeeperCall::LockPayment {
                agreement_id,
                asset_id: fx.did.id().to_string(),
                price: 10,
            }
        );
        assert_eq!(sent[0].from, consumer());
        assert_eq!(fx.ledger.token_balance(&consumer()).await.unwrap(), 90);
    }

    #[tokio::test]
    async fn decryption_waits_for_access_grant() {
        let fx = funded_fixture(100).await;
        let order = fx
            .orchestrator
            .order(&fx.did.to_string(), &consumer())
            .await
            .unwrap();
        let agreement_id = order.agreement.agreement_id.clone();

        let delivery = fx
            .orchestrator
            .initialize_service_agreement(
                &fx.did.to_string(),
                &agreement_id,
                &order.signature,
                &consumer(),
            )
            .await
            .expect("gateway accepts");

        let requests = fx.gateway.requests.lock().unwrap().clone();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].service_agreement_id, agreement_id.as_str());
        assert_eq!(requests[0].signature, order.signature.to_hex());

        tokio::task::yield_now().await;
        assert_eq!(fx.secrets.decrypt_calls(), 0);
        assert_eq!(delivery.state(), AgreementState::AccessPending);

        fx.orchestrator
            .grant_access(&fx.did.to_string(), &agreement_id, &publisher())
            .await
            .unwrap();
        let files = delivery.wait().await.expect("files delivered");

        assert_eq!(fx.secrets.decrypt_calls(), 1);
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].locator, dummy_urls()[0]);
        for file in &files {
            let url = Url::parse(&file.url).unwrap();
            let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
            assert!(file.url.starts_with(CONSUME_ENDPOINT));
            let expected: [(String, String); 3] = [
                ("serviceAgreementId".into(), agreement_id.to_string()),
                ("consumerAddress".into(), consumer().to_string()),
                ("url".into(), file.locator.clone()),
            ];
            for pair in &expected {
                assert!(pairs.contains(pair), "missing {pair:?}");
            }
        }
    }

    #[tokio::test]
    async fn scoped_access_wait_ignores_other_agreements() {
        let config = AgreementConfig {
            scope_access_events: true,
            ..AgreementConfig::default()
        };
        let fx = dummy_fixture(100, config, RecordingGateway::default()).await;
        let agreement_id = AgreementId::generate();
        let delivery = fx
            .orchestrator
            .initialize_service_agreement(
                &fx.did.to_string(),
                &agreement_id,
                &Signature(vec![1, 2, 3]),
                &consumer(),
            )
            .await
            .unwrap();

        fx.orchestrator
            .grant_access(&fx.did.to_string(), &AgreementId::generate(), &publisher())
            .await
            .unwrap();
        tokio::task::yield_now().await;
        assert_eq!(fx.secrets.decrypt_calls(), 0);

        fx.orchestrator
            .grant_access(&fx.did.to_string(), &agreement_id, &publisher())
            .await
            .unwrap();
        assert_eq!(delivery.wait().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn gateway_failure_cancels_the_access_wait() {
        let gateway = RecordingGateway {
            fail: true,
            ..RecordingGateway::default()
        };
        let fx = dummy_fixture(100, AgreementConfig::default(), gateway).await;
        let err = fx
            .orchestrator
            .initialize_service_agreement(
                &fx.did.to_string(),
                &AgreementId::generate(),
                &Signature(vec![1]),
                &consumer(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SquidError::RemoteUnavailable(_)));

        tokio::task::yield_now().await;
        fx.ledger
            .emit("AccessConditions", "AccessGranted", json!({}));
        tokio::task::yield_now().await;
        assert_eq!(fx.secrets.decrypt_calls(), 0);
    }

    #[tokio::test]
    async fn transport_errors_fail_the_payment_flow() {
        let fx = funded_fixture(100).await;
        let order = fx
            .orchestrator
            .order(&fx.did.to_string(), &consumer())
            .await
            .unwrap();

        fx.ledger
            .fail_subscribers(AGREEMENT_CONTRACT, EXECUTED, "websocket closed");
        let err = order.payment.wait().await.unwrap_err();
        assert!(
            matches!(err, SquidError::SubscriptionTransport { .. }),
            "unexpected: {err:?}"
        );
        assert!(fx.ledger.sent().is_empty());
    }

    #[tokio::test]
    async fn waits_time_out_when_configured() {
        let config = AgreementConfig {
            event_timeout: Some(Duration::from_millis(20)),
            ..AgreementConfig::default()
        };
        let fx = dummy_fixture(100, config, RecordingGateway::default()).await;
        let order = fx
            .orchestrator
            .order(&fx.did.to_string(), &consumer())
            .await
            .unwrap();

        let err = order.payment.wait().await.unwrap_err();
        assert!(
            matches!(err, SquidError::Timeout { .. }),
            "unexpected: {err:?}"
        );
    }

    #[tokio::test]
    async fn cancelled_orders_never_pay() {
        let fx = funded_fixture(100).await;
        let order = fx
            .orchestrator
            .order(&fx.did.to_string(), &consumer())
            .await
            .unwrap();
        let agreement_id = order.agreement.agreement_id.clone();

        order.payment.cancel();
        let waited = order.payment.wait().await;
        assert!(matches!(waited, Err(SquidError::Cancelled)));

        fx.emit_executed(&agreement_id);
        tokio::task::yield_now().await;
        assert!(fx.ledger.sent().is_empty());
    }

    #[tokio::test]
    async fn missing_descriptor_and_bad_did_are_typed_errors() {
        let fx = funded_fixture(100).await;
        let err = fx
            .orchestrator
            .order("did:op:0x123", &consumer())
            .await
            .unwrap_err();
        assert!(matches!(err, SquidError::InvalidDidFormat(_)));

        let err = fx
            .orchestrator
            .order(&Did::generate().to_string(), &consumer())
            .await
            .unwrap_err();
        assert!(matches!(err, SquidError::DescriptorNotFound(_)));
        assert_eq!(fx.registry.len(), 1);
    }

    #[tokio::test]
    async fn publisher_execution_emits_the_consumer_trigger() {
        let fx = funded_fixture(100).await;
        let order = fx
            .orchestrator
            .order(&fx.did.to_string(), &consumer())
            .await
            .unwrap();

        let agreement = fx
            .orchestrator
            .execute_service_agreement(
                &fx.did.to_string(),
                &order.agreement.agreement_id,
                &order.signature,
                &consumer(),
                &publisher(),
            )
            .await
            .unwrap();
        assert_eq!(agreement.publisher, Some(publisher()));
        assert_eq!(agreement.digest(), order.agreement.digest());

        order.payment.wait().await.expect("payment locked");
        let sent = fx.ledger.sent();
        assert!(matches!(sent[0].call, KeeperCall::ExecuteAgreement { .. }));
        assert!(matches!(sent[1].call, KeeperCall::LockPayment { .. }));
    }

    #[test]
    fn download_urls_escape_the_locator() {
        let url = download_url(
            CONSUME_ENDPOINT,
            "https://example.com/a b.csv?x=1",
            &AgreementId::parse("0x01").unwrap(),
            &consumer(),
        )
        .unwrap();
        let prefix = format!("{CONSUME_ENDPOINT}?url=https%3A%2F%2Fexample.com");
        assert!(url.starts_with(&prefix));
        assert!(url.contains("serviceAgreementId=0x01"));

        let agreement_id = AgreementId::parse("0x01").unwrap();
        let bad = download_url("not a url", "x", &agreement_id, &consumer());
        assert!(bad.is_err());
    }
}
