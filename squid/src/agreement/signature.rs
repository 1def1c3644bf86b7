//! Agreement digest and signing.
//!
//! The consumer signs a digest binding the asset, the agreement id, its own
//! address and the exact condition list it agreed to. The publisher passes
//! the same value hashes and timeouts to `executeAgreement`, so the ledger
//! can recompute the digest and check the signature.

use tracing::debug;

use super::ServiceAgreement;
use super::condition::Condition;
use crate::error::SquidError;
use crate::keeper::Ledger;
use crate::types::{Hash256, Signature};

pub fn value_hashes(conditions: &[Condition]) -> Vec<Hash256> {
    conditions.iter().map(Condition::value_hash).collect()
}

pub fn timeouts(conditions: &[Condition]) -> Vec<u64> {
    conditions.iter().map(|c| c.timeout).collect()
}

/// Digest over (asset id, service definition id, agreement id, consumer,
/// template id, condition keys, value hashes, timeouts).
pub fn agreement_digest(agreement: &ServiceAgreement) -> Hash256 {
    let mut fields: Vec<Vec<u8>> = vec![
        agreement.did.id().as_bytes().to_vec(),
        agreement.service_definition_id.as_bytes().to_vec(),
        agreement.agreement_id.as_str().as_bytes().to_vec(),
        agreement.consumer.as_str().as_bytes().to_vec(),
        agreement.template_id.as_bytes().to_vec(),
    ];
    fields.extend(
        agreement
            .conditions
            .iter()
            .map(|c| c.condition_key.as_bytes().to_vec()),
    );
    fields.extend(
        value_hashes(&agreement.conditions)
            .iter()
            .map(|h| h.as_bytes().to_vec()),
    );
    fields.extend(
        timeouts(&agreement.conditions)
            .iter()
            .map(|t| t.to_le_bytes().to_vec()),
    );
    Hash256::compute_fields(fields)
}

/// Signs the agreement digest under the consumer's key.
pub async fn sign_agreement(
    ledger: &dyn Ledger,
    agreement: &ServiceAgreement,
) -> Result<Signature, SquidError> {
    let digest = agreement_digest(agreement);
    debug!(
        agreement_id = %agreement.agreement_id,
        digest = %digest.to_hex(),
        "signing service agreement"
    );
    Ok(ledger.sign(&agreement.consumer, &digest).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agreement::template::Template;
    use crate::ddo::{MetaData, MetaDataBase};
    use crate::keeper::InMemoryLedger;
    use crate::types::{Address, AgreementId, Did};

    fn dummy_agreement(price: u64) -> ServiceAgreement {
        let did = Did::parse("did:op:abc").unwrap();
        let metadata = MetaData {
            base: MetaDataBase {
                name: "asset".into(),
                price: Some(price),
                ..Default::default()
            },
            ..Default::default()
        };
        let conditions = Template::Access
            .build_conditions(&metadata, did.id())
            .unwrap();
        ServiceAgreement {
            agreement_id: AgreementId::parse("0x01").unwrap(),
            conditions,
            did,
            service_definition_id: "0".into(),
            template_id: Template::Access.id(),
            consumer: Address::new("0xc0"),
            publisher: None,
        }
    }

    #[test]
    fn digest_binds_the_condition_values() {
        assert_eq!(
            agreement_digest(&dummy_agreement(10)),
            agreement_digest(&dummy_agreement(10))
        );
        assert_ne!(
            agreement_digest(&dummy_agreement(10)),
            agreement_digest(&dummy_agreement(11))
        );
    }

    #[test]
    fn digest_binds_the_consumer() {
        let a = dummy_agreement(10);
        let mut b = a.clone();
        b.consumer = Address::new("0xc1");
        assert_ne!(agreement_digest(&a), agreement_digest(&b));
    }

    #[tokio::test]
    async fn signing_uses_the_consumer_account() {
        let agreement = dummy_agreement(10);
        let ledger = InMemoryLedger::new();
        let err = sign_agreement(&ledger, &agreement).await.unwrap_err();
        assert!(matches!(err, SquidError::Ledger(_)));

        let ledger = InMemoryLedger::new().with_account(Address::new("0xc0"), 0, 0);
        let sig = sign_agreement(&ledger, &agreement).await.unwrap();
        assert!(!sig.as_bytes().is_empty());
    }
}
