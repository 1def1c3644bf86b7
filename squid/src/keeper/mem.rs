//! In-memory ledger.
//!
//! Keeps account balances in a map, records every submitted call and
//! emits the events a deployed contract set would emit for them. Tests can
//! also inject events (and transport failures) directly through
//! [`InMemoryLedger::emit`] and [`InMemoryLedger::fail_subscribers`].

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures::StreamExt;
use futures::channel::mpsc::{UnboundedSender, unbounded};
use serde_json::{Value, json};

use super::{ContractEvent, EventFilter, EventStream, KeeperCall, Ledger, LedgerError, Receipt};
use crate::types::{Address, Hash256, Signature};

/// A call submitted through [`InMemoryLedger::send`], in submission order.
#[derive(Clone, Debug, PartialEq)]
pub struct SentCall {
    pub from: Address,
    pub call: KeeperCall,
}

#[derive(Clone, Copy, Debug, Default)]
struct AccountState {
    native: u128,
    tokens: u64,
}

struct Subscriber {
    contract: String,
    event: String,
    filter: EventFilter,
    tx: UnboundedSender<Result<ContractEvent, LedgerError>>,
}

impl Subscriber {
    fn wants(&self, contract: &str, event: &str) -> bool {
        self.contract == contract && self.event == event
    }
}

#[derive(Default)]
struct State {
    order: Vec<Address>,
    accounts: HashMap<Address, AccountState>,
    sent: Vec<SentCall>,
    subscribers: Vec<Subscriber>,
    block_number: u64,
}

impl State {
    fn account_mut(&mut self, address: &Address) -> Result<&mut AccountState, LedgerError> {
        self.accounts
            .get_mut(address)
            .ok_or_else(|| LedgerError::UnknownAccount(address.clone()))
    }

    fn emit(&mut self, contract: &str, event: &str, values: Value) -> usize {
        self.block_number += 1;
        let event = ContractEvent {
            contract: contract.to_string(),
            name: event.to_string(),
            return_values: values.as_object().cloned().unwrap_or_default(),
            block_number: self.block_number,
        };

        self.subscribers.retain(|s| !s.tx.is_closed());

        let mut delivered = 0;
        for sub in &self.subscribers {
            if sub.wants(&event.contract, &event.name)
                && sub.filter.matches(&event)
                && sub.tx.unbounded_send(Ok(event.clone())).is_ok()
            {
                delivered += 1;
            }
        }
        delivered
    }
}

/// In-memory implementation of [`Ledger`].
#[derive(Default)]
pub struct InMemoryLedger {
    state: Mutex<State>,
}

impl InMemoryLedger {
    /// Creates a ledger with no accounts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an account with the given native and token balances.
    pub fn with_account(mut self, address: Address, native: u128, tokens: u64) -> Self {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if !state.accounts.contains_key(&address) {
            state.order.push(address.clone());
        }
        state
            .accounts
            .insert(address, AccountState { native, tokens });
        self
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Overwrites the token balance of a known account.
    pub fn set_token_balance(&self, address: &Address, tokens: u64) -> Result<(), LedgerError> {
        self.lock().account_mut(address)?.tokens = tokens;
        Ok(())
    }

    /// Returns every call submitted so far, reverted ones included.
    pub fn sent(&self) -> Vec<SentCall> {
        self.lock().sent.clone()
    }

    /// Emits an event to current subscribers. Returns how many received it.
    pub fn emit(&self, contract: &str, event: &str, values: Value) -> usize {
        self.lock().emit(contract, event, values)
    }

    /// Delivers a transport error to every subscriber of `contract.event`
    /// and drops them.
    pub fn fail_subscribers(&self, contract: &str, event: &str, reason: &str) -> usize {
        let mut state = self.lock();
        let mut failed = 0;
        state.subscribers.retain(|sub| {
            if !sub.wants(contract, event) {
                return true;
            }
            if sub
                .tx
                .unbounded_send(Err(LedgerError::Transport(reason.to_string())))
                .is_ok()
            {
                failed += 1;
            }
            false
        });
        failed
    }

    /// Number of live subscriptions to `contract.event`.
    pub fn subscriber_count(&self, contract: &str, event: &str) -> usize {
        let mut state = self.lock();
        state.subscribers.retain(|s| !s.tx.is_closed());
        state
            .subscribers
            .iter()
            .filter(|s| s.wants(contract, event))
            .count()
    }

    fn apply(state: &mut State, from: &Address, call: &KeeperCall) -> Result<(), LedgerError> {
        match call {
            KeeperCall::RequestTokens { amount } => {
                let account = state.account_mut(from)?;
                account.tokens = account.tokens.saturating_add(*amount);
            }
            KeeperCall::LockPayment {
                agreement_id,
                asset_id,
                price,
            } => {
                let account = state.account_mut(from)?;
                if account.tokens < *price {
                    return Err(LedgerError::Reverted {
                        contract: call.contract_name().to_string(),
                        method: call.method().to_string(),
                        reason: format!("balance {} below price {price}", account.tokens),
                    });
                }
                account.tokens -= *price;
                state.emit(
                    "PaymentConditions",
                    "PaymentLocked",
                    json!({
                        "serviceAgreementId": agreement_id.as_str(),
                        "assetId": asset_id,
                        "price": price,
                    }),
                );
            }
            KeeperCall::ExecuteAgreement {
                template_id,
                consumer,
                agreement_id,
                did_id,
                ..
            } => {
                state.emit(
                    "ServiceAgreement",
                    "ExecuteAgreement",
                    json!({
                        "serviceAgreementId": agreement_id.as_str(),
                        "templateId": template_id,
                        "did": did_id,
                        "consumer": consumer.as_str(),
                        "publisher": from.as_str(),
                        "state": true,
                    }),
                );
            }
            KeeperCall::GrantAccess {
                agreement_id,
                asset_id,
                document_key_id,
            } => {
                state.emit(
                    "AccessConditions",
                    "AccessGranted",
                    json!({
                        "serviceAgreementId": agreement_id.as_str(),
                        "assetId": asset_id,
                        "documentKeyId": document_key_id,
                    }),
                );
            }
            KeeperCall::SetupAgreementTemplate { template_id, .. } => {
                state.emit(
                    "ServiceAgreement",
                    "SetupAgreementTemplate",
                    json!({
                        "serviceTemplateId": template_id,
                        "provider": from.as_str(),
                    }),
                );
            }
            KeeperCall::RegisterAttribute {
                did_id, key, value, ..
            } => {
                state.emit(
                    "DIDRegistry",
                    "DIDAttributeRegistered",
                    json!({
                        "did": did_id,
                        "owner": from.as_str(),
                        "key": key,
                        "value": value,
                    }),
                );
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn accounts(&self) -> Result<Vec<Address>, LedgerError> {
        Ok(self.lock().order.clone())
    }

    async fn native_balance(&self, account: &Address) -> Result<u128, LedgerError> {
        Ok(self.lock().account_mut(account)?.native)
    }

    async fn token_balance(&self, account: &Address) -> Result<u64, LedgerError> {
        Ok(self.lock().account_mut(account)?.tokens)
    }

    async fn public_key(&self, account: &Address) -> Result<String, LedgerError> {
        self.lock().account_mut(account)?;
        let key = blake3::hash(account.as_str().as_bytes());
        Ok(format!("0x{}", hex::encode(key.as_bytes())))
    }

    async fn sign(&self, account: &Address, digest: &Hash256) -> Result<Signature, LedgerError> {
        self.lock().account_mut(account)?;
        let sig = Hash256::compute_fields([account.as_str().as_bytes(), &digest.as_bytes()[..]]);
        Ok(Signature(sig.as_bytes().to_vec()))
    }

    async fn send(&self, from: &Address, call: KeeperCall) -> Result<Receipt, LedgerError> {
        let mut state = self.lock();
        state.account_mut(from)?;
        state.sent.push(SentCall {
            from: from.clone(),
            call: call.clone(),
        });

        Self::apply(&mut state, from, &call)?;

        let block_number = state.block_number;
        let nonce = state.sent.len() as u64;
        let fields: [&[u8]; 4] = [
            from.as_str().as_bytes(),
            call.method().as_bytes(),
            &block_number.to_le_bytes(),
            &nonce.to_le_bytes(),
        ];
        let tx_hash = Hash256::compute_fields(fields);
        Ok(Receipt {
            transaction_hash: tx_hash.to_hex(),
            block_number,
            status: true,
        })
    }

    async fn subscribe(
        &self,
        contract: &str,
        event: &str,
        filter: &EventFilter,
    ) -> Result<EventStream, LedgerError> {
        let (tx, rx) = unbounded();
        self.lock().subscribers.push(Subscriber {
            contract: contract.to_string(),
            event: event.to_string(),
            filter: filter.clone(),
            tx,
        });
        Ok(rx.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AgreementId;

    const ACCESS_CONTRACT: &str = "AccessConditions";
    const GRANTED: &str = "AccessGranted";
    const AGREEMENT_CONTRACT: &str = "ServiceAgreement";
    const EXECUTED: &str = "ExecuteAgreement";

    fn dummy_address(n: u8) -> Address {
        Address::new(format!("0x{:040x}", n))
    }

    fn dummy_ledger(tokens: u64) -> InMemoryLedger {
        InMemoryLedger::new().with_account(dummy_address(1), 1_000, tokens)
    }

    #[tokio::test]
    async fn lock_payment_deducts_and_emits() {
        let ledger = dummy_ledger(100);
        let agreement_id = AgreementId::generate();
        let mut events = ledger
            .subscribe("PaymentConditions", "PaymentLocked", &EventFilter::any())
            .await
            .unwrap();

        let receipt = ledger
            .send(
                &dummy_address(1),
                KeeperCall::LockPayment {
                    agreement_id: agreement_id.clone(),
                    asset_id: "abc".into(),
                    price: 10,
                },
            )
            .await
            .expect("payment should lock");

        assert!(receipt.status);
        assert_eq!(ledger.token_balance(&dummy_address(1)).await.unwrap(), 90);

        let event = events.next().await.unwrap().unwrap();
        assert_eq!(
            event.str_value("serviceAgreementId"),
            Some(agreement_id.as_str())
        );
        assert_eq!(event.str_value("assetId"), Some("abc"));
    }

    #[tokio::test]
    async fn lock_payment_reverts_when_short() {
        let ledger = dummy_ledger(5);
        let err = ledger
            .send(
                &dummy_address(1),
                KeeperCall::LockPayment {
                    agreement_id: AgreementId::generate(),
                    asset_id: "abc".into(),
                    price: 10,
                },
            )
            .await
            .unwrap_err();

        assert!(
            matches!(err, LedgerError::Reverted { .. }),
            "unexpected: {err:?}"
        );
        assert_eq!(ledger.token_balance(&dummy_address(1)).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn unknown_sender_is_rejected_and_not_recorded() {
        let ledger = dummy_ledger(5);
        let err = ledger
            .send(&dummy_address(9), KeeperCall::RequestTokens { amount: 1 })
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::UnknownAccount(_)));
        assert!(ledger.sent().is_empty());
    }

    #[tokio::test]
    async fn subscribers_only_see_matching_events_emitted_after_subscribing() {
        let ledger = dummy_ledger(0);
        assert_eq!(ledger.emit(AGREEMENT_CONTRACT, EXECUTED, json!({})), 0);

        let filter = EventFilter::any().with("serviceAgreementId", "0x01");
        let mut events = ledger
            .subscribe(AGREEMENT_CONTRACT, EXECUTED, &filter)
            .await
            .unwrap();

        let other = json!({"serviceAgreementId": "0x02"});
        let ours = json!({"serviceAgreementId": "0x01"});
        assert_eq!(ledger.emit(AGREEMENT_CONTRACT, EXECUTED, other), 0);
        assert_eq!(ledger.emit(AGREEMENT_CONTRACT, EXECUTED, ours), 1);

        let event = events.next().await.unwrap().unwrap();
        assert_eq!(event.str_value("serviceAgreementId"), Some("0x01"));
    }

    #[tokio::test]
    async fn dropped_streams_are_pruned() {
        let ledger = dummy_ledger(0);
        let stream = ledger
            .subscribe(ACCESS_CONTRACT, GRANTED, &EventFilter::any())
            .await
            .unwrap();
        assert_eq!(ledger.subscriber_count(ACCESS_CONTRACT, GRANTED), 1);

        drop(stream);
        assert_eq!(ledger.subscriber_count(ACCESS_CONTRACT, GRANTED), 0);
    }

    #[tokio::test]
    async fn failing_subscribers_delivers_transport_errors() {
        let ledger = dummy_ledger(0);
        let mut stream = ledger
            .subscribe(ACCESS_CONTRACT, GRANTED, &EventFilter::any())
            .await
            .unwrap();

        assert_eq!(
            ledger.fail_subscribers(ACCESS_CONTRACT, GRANTED, "socket closed"),
            1
        );
        let item = stream.next().await.unwrap();
        assert!(matches!(item, Err(LedgerError::Transport(_))));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn signatures_depend_on_signer_and_digest() {
        let ledger = InMemoryLedger::new()
            .with_account(dummy_address(1), 0, 0)
            .with_account(dummy_address(2), 0, 0);
        let digest = Hash256::compute(b"agreement");

        let a = ledger.sign(&dummy_address(1), &digest).await.unwrap();
        let b = ledger.sign(&dummy_address(2), &digest).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(a, ledger.sign(&dummy_address(1), &digest).await.unwrap());
        assert_eq!(
            ledger.accounts().await.unwrap(),
            vec![dummy_address(1), dummy_address(2)]
        );
    }
}
