//! Client context.
//!
//! [`Ocean`] owns the injected collaborators and exposes the publisher and
//! consumer operations on top of them. There is no global state: build one
//! context per set of collaborators and share it behind an `Arc` if needed.

use std::sync::Arc;

use tracing::info;

use crate::account::Account;
use crate::agreement::{
    AgreementOrchestrator, AssetFile, FlowHandle, ServiceAgreement, SignedOrder, Template,
};
use crate::aquarius::{AquariusClient, MetadataRegistry, SearchQuery};
use crate::brizo::{BrizoClient, Gateway};
use crate::config::SquidConfig;
use crate::ddo::{AssetDescriptor, Ddo, MetaData, ServiceEndpoints};
use crate::error::SquidError;
use crate::keeper::{KeeperCall, Ledger, Receipt};
use crate::metrics::MetricsRegistry;
use crate::secret_store::SecretStore;
use crate::types::{Address, AgreementId, Did, Signature};

/// Attribute type under which a DID's metadata URL is registered.
pub const METADATA_ATTRIBUTE_TYPE: &str = "URL";
pub const METADATA_ATTRIBUTE_KEY: &str = "Metadata";

/// The four collaborators every client needs.
#[derive(Clone)]
pub struct Collaborators {
    pub registry: Arc<dyn MetadataRegistry>,
    pub gateway: Arc<dyn Gateway>,
    pub ledger: Arc<dyn Ledger>,
    pub secret_store: Arc<dyn SecretStore>,
}

pub struct Ocean {
    collaborators: Collaborators,
    orchestrator: AgreementOrchestrator,
    config: SquidConfig,
    metrics: Option<MetricsRegistry>,
}

impl Ocean {
    pub fn new(collaborators: Collaborators, config: SquidConfig) -> Self {
        let orchestrator = AgreementOrchestrator::new(
            collaborators.registry.clone(),
            collaborators.gateway.clone(),
            collaborators.ledger.clone(),
            collaborators.secret_store.clone(),
            config.agreement.clone(),
        );
        Self {
            collaborators,
            orchestrator,
            config,
            metrics: None,
        }
    }

    /// Records agreement metrics into `metrics`.
    pub fn with_metrics(mut self, metrics: MetricsRegistry) -> Self {
        self.orchestrator = self.orchestrator.with_metrics(metrics.agreements.clone());
        self.metrics = Some(metrics);
        self
    }

    /// Builds HTTP clients for the registry and gateway from `config`; the
    /// ledger and secret store are supplied by the caller.
    pub fn from_config(
        config: SquidConfig,
        ledger: Arc<dyn Ledger>,
        secret_store: Arc<dyn SecretStore>,
    ) -> Result<Self, SquidError> {
        let registry = AquariusClient::new(&config.aquarius.base_url, config.aquarius.timeout)?;
        let gateway = BrizoClient::new(&config.brizo.base_url, config.brizo.timeout)?;
        let metrics = if config.metrics.enabled {
            let registry = MetricsRegistry::new()
                .map_err(|e| SquidError::Config(format!("metrics registry: {e}")))?;
            Some(registry)
        } else {
            None
        };

        let collaborators = Collaborators {
            registry: Arc::new(registry),
            gateway: Arc::new(gateway),
            ledger,
            secret_store,
        };
        let ocean = Self::new(collaborators, config);
        Ok(match metrics {
            Some(m) => ocean.with_metrics(m),
            None => ocean,
        })
    }

    pub fn config(&self) -> &SquidConfig {
        &self.config
    }

    pub fn metrics(&self) -> Option<&MetricsRegistry> {
        self.metrics.as_ref()
    }

    pub fn orchestrator(&self) -> &AgreementOrchestrator {
        &self.orchestrator
    }

    pub async fn accounts(&self) -> Result<Vec<Account>, SquidError> {
        let addresses = self.collaborators.ledger.accounts().await?;
        Ok(addresses
            .into_iter()
            .map(|a| Account::new(a, self.collaborators.ledger.clone()))
            .collect())
    }

    pub fn account(&self, address: impl Into<String>) -> Account {
        Account::new(Address::new(address), self.collaborators.ledger.clone())
    }

    pub async fn resolve(&self, did: &str) -> Result<Ddo, SquidError> {
        let did = Did::parse(did)?;
        self.collaborators
            .registry
            .retrieve_ddo(&did)
            .await?
            .ok_or_else(|| SquidError::DescriptorNotFound(did.to_string()))
    }

    /// Publishes a new asset owned by `publisher`.
    ///
    /// Conditions are derived first so an unpriced asset fails before
    /// anything is encrypted or stored.
    pub async fn register_asset(
        &self,
        metadata: MetaData,
        publisher: &Account,
    ) -> Result<Ddo, SquidError> {
        let c = &self.collaborators;
        let did = Did::generate();
        let conditions = Template::Access.build_conditions(&metadata, did.id())?;

        let mut metadata = metadata;
        let ciphertext = c
            .secret_store
            .encrypt_document(did.id(), &metadata.base.content_urls)
            .await?;
        metadata.base.content_urls = vec![ciphertext];

        let metadata_endpoint = c.registry.service_endpoint(&did);
        let ddo = AssetDescriptor {
            did: did.clone(),
            publisher: publisher.address().clone(),
            public_key: publisher.public_key().await?,
            metadata,
            conditions,
            endpoints: ServiceEndpoints {
                purchase: c.gateway.purchase_endpoint(),
                consume: c.gateway.consume_endpoint(),
                compute: c.gateway.compute_endpoint(),
                metadata: metadata_endpoint.clone(),
            },
        }
        .build()?;

        let stored = c.registry.store_ddo(&ddo).await?;
        c.ledger
            .send(
                publisher.address(),
                KeeperCall::RegisterAttribute {
                    did_id: did.id().to_string(),
                    value_type: METADATA_ATTRIBUTE_TYPE.to_string(),
                    key: METADATA_ATTRIBUTE_KEY.to_string(),
                    value: metadata_endpoint,
                },
            )
            .await?;
        info!(%did, publisher = %publisher.address(), "asset registered");
        Ok(stored)
    }

    /// Deploys `template`'s condition graph with `owner` as provider.
    pub async fn register_template(
        &self,
        template: Template,
        owner: &Account,
    ) -> Result<Receipt, SquidError> {
        let receipt = self
            .collaborators
            .ledger
            .send(owner.address(), template.setup_call())
            .await?;
        info!(template = template.name(), template_id = %template.id(), "template registered");
        Ok(receipt)
    }

    pub async fn order(&self, did: &str, consumer: &Account) -> Result<SignedOrder, SquidError> {
        self.orchestrator.order(did, consumer.address()).await
    }

    pub async fn initialize(
        &self,
        did: &str,
        agreement_id: &AgreementId,
        signature: &Signature,
        consumer: &Account,
    ) -> Result<FlowHandle<Vec<AssetFile>>, SquidError> {
        self.orchestrator
            .initialize_service_agreement(did, agreement_id, signature, consumer.address())
            .await
    }

    pub async fn execute(
        &self,
        did: &str,
        agreement_id: &AgreementId,
        signature: &Signature,
        consumer: &Account,
        publisher: &Account,
    ) -> Result<ServiceAgreement, SquidError> {
        self.orchestrator
            .execute_service_agreement(
                did,
                agreement_id,
                signature,
                consumer.address(),
                publisher.address(),
            )
            .await
    }

    pub async fn grant_access(
        &self,
        did: &str,
        agreement_id: &AgreementId,
        publisher: &Account,
    ) -> Result<Receipt, SquidError> {
        self.orchestrator
            .grant_access(did, agreement_id, publisher.address())
            .await
    }

    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<Ddo>, SquidError> {
        self.collaborators.registry.query(query).await
    }

    pub async fn search_by_text(&self, text: &str) -> Result<Vec<Ddo>, SquidError> {
        self.collaborators
            .registry
            .query_by_text(&SearchQuery::text(text))
            .await
    }

    pub async fn request_tokens(
        &self,
        account: &Account,
        amount: u64,
    ) -> Result<Receipt, SquidError> {
        account.request_tokens(amount).await
    }
}
