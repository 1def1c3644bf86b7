//! Structural checks applied to every descriptor.
//!
//! All checks are local to the descriptor; nothing here talks to the
//! registry or the ledger.

use std::collections::HashSet;

use super::{Service, ServiceType};
use crate::agreement::condition::Condition;
use crate::error::SquidError;

#[derive(Clone, Copy, Debug, Default)]
pub struct DescriptorValidity;

impl DescriptorValidity {
    pub fn validate(&self, services: &[Service]) -> Result<(), SquidError> {
        self.check_unique_ids(services)?;
        self.check_service_counts(services)?;
        for service in services {
            self.check_condition_order(service.conditions())?;
        }
        Ok(())
    }

    fn check_unique_ids(&self, services: &[Service]) -> Result<(), SquidError> {
        let mut seen = HashSet::new();
        for service in services {
            if !seen.insert(service.service_definition_id()) {
                return Err(SquidError::InvalidDescriptor(format!(
                    "duplicate serviceDefinitionId {:?}",
                    service.service_definition_id()
                )));
            }
        }
        Ok(())
    }

    fn check_service_counts(&self, services: &[Service]) -> Result<(), SquidError> {
        let count = |ty: ServiceType| services.iter().filter(|s| s.service_type() == ty).count();

        let metadata = count(ServiceType::Metadata);
        if metadata != 1 {
            return Err(SquidError::InvalidDescriptor(format!(
                "expected exactly one Metadata service, found {metadata}"
            )));
        }
        let access = count(ServiceType::Access);
        if access > 1 {
            return Err(SquidError::InvalidDescriptor(format!(
                "expected at most one Access service, found {access}"
            )));
        }
        Ok(())
    }

    fn check_condition_order(&self, conditions: &[Condition]) -> Result<(), SquidError> {
        let mut earlier: HashSet<&str> = HashSet::new();
        for (position, condition) in conditions.iter().enumerate() {
            if condition.index as usize != position {
                return Err(SquidError::InvalidDescriptor(format!(
                    "condition {} has index {} at position {position}",
                    condition.name, condition.index
                )));
            }
            if let Some(dep) = condition
                .dependencies
                .iter()
                .find(|d| !earlier.contains(d.as_str()))
            {
                return Err(SquidError::InvalidDescriptor(format!(
                    "condition {} depends on {dep}, which does not precede it",
                    condition.name
                )));
            }
            earlier.insert(condition.name.as_str());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agreement::template::Template;
    use crate::ddo::{AccessService, MetaData, MetaDataBase, MetadataService};

    fn dummy_conditions() -> Vec<Condition> {
        let metadata = MetaData {
            base: MetaDataBase {
                name: "asset".into(),
                price: Some(10),
                ..Default::default()
            },
            ..Default::default()
        };
        Template::Access
            .build_conditions(&metadata, "abc")
            .expect("conditions should build")
    }

    fn dummy_services(conditions: Vec<Condition>) -> Vec<Service> {
        vec![
            Service::Access(AccessService {
                service_definition_id: "0".into(),
                service_endpoint: "http://brizo/consume".into(),
                purchase_endpoint: "http://brizo/initialize".into(),
                template_id: Template::Access.id(),
                service_agreement_contract: Template::Access.agreement_contract(),
                conditions,
            }),
            Service::Metadata(MetadataService {
                service_definition_id: "2".into(),
                service_endpoint: "http://aquarius".into(),
                metadata: MetaData::default(),
            }),
        ]
    }

    #[test]
    fn accepts_template_built_conditions() {
        DescriptorValidity
            .validate(&dummy_services(dummy_conditions()))
            .expect("template output should validate");
    }

    #[test]
    fn rejects_out_of_order_conditions() {
        let mut conditions = dummy_conditions();
        conditions.reverse();
        let err = DescriptorValidity
            .validate(&dummy_services(conditions))
            .unwrap_err();
        assert!(matches!(err, SquidError::InvalidDescriptor(_)));
    }

    #[test]
    fn rejects_forward_dependencies() {
        let mut conditions = dummy_conditions();
        conditions[0].dependencies.push("grantAccess".into());
        let err = DescriptorValidity
            .validate(&dummy_services(conditions))
            .unwrap_err();
        assert!(err.to_string().contains("does not precede"), "{err}");
    }

    #[test]
    fn rejects_second_access_service() {
        let mut services = dummy_services(dummy_conditions());
        let mut second = services[0].clone();
        if let Service::Access(a) = &mut second {
            a.service_definition_id = "5".into();
        }
        services.push(second);
        assert!(DescriptorValidity.validate(&services).is_err());
    }
}
