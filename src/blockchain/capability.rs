//! On-chain capability checks as injectable predicates.

use alloy::primitives::{Address, B256};
use async_trait::async_trait;
use std::sync::Arc;

use crate::blockchain::contracts::{decode_bool, issuer_role, ContractCall, ContractEncoder};
use crate::blockchain::transaction::TransactionManager;
use crate::blockchain::types::BlockchainResult;

/// Whether an address may publish status lists.
#[async_trait]
pub trait IssuerCapability: Send + Sync {
    async fn is_issuer(&self, address: Address) -> BlockchainResult<bool>;
}

/// Role query against the status list contract.
pub struct ContractRoleCheck {
    transactions: Arc<TransactionManager>,
    encoder: Arc<dyn ContractEncoder>,
    role: B256,
}

impl ContractRoleCheck {
    pub fn new(transactions: Arc<TransactionManager>, encoder: Arc<dyn ContractEncoder>) -> Self {
        Self {
            transactions,
            encoder,
            role: issuer_role(),
        }
    }
}

#[async_trait]
impl IssuerCapability for ContractRoleCheck {
    async fn is_issuer(&self, address: Address) -> BlockchainResult<bool> {
        let call = self.encoder.encode(&ContractCall::HasRole {
            role: self.role,
            account: address,
        })?;
        let output = self.transactions.call(call).await?;
        decode_bool(&output)
    }
}

/// Capability backed by a plain predicate.
pub struct FnCapability<F>(pub F);

#[async_trait]
impl<F> IssuerCapability for FnCapability<F>
where
    F: Fn(Address) -> bool + Send + Sync,
{
    async fn is_issuer(&self, address: Address) -> BlockchainResult<bool> {
        Ok((self.0)(address))
    }
}
