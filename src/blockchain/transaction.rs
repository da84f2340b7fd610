//! Transaction lifecycle: build, sign, submit, confirm.
//!
//! # State Machine
//! ```text
//! BUILT → SIGNED → SUBMITTED → { CONFIRMED | FAILED | TIMEOUT }
//! ```
//!
//! # Design Decisions
//! - The nonce is read from the latest confirmed state on every build, never
//!   held in memory; a rejected submission therefore consumes no nonce
//! - A node rejection is FAILED at once and is never retried (re-sending
//!   with the same nonce is unsafe)
//! - TIMEOUT is ambiguous: the transaction may still be mined, so callers
//!   reconcile by re-polling the same hash
//! - `build`/`sign`/`submit`/`confirm` do not lock; `execute` serializes per signer

use alloy::consensus::TxLegacy;
use alloy::primitives::{Address, Bytes, TxHash, TxKind, U256};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

use crate::blockchain::adapter::ChainAdapter;
use crate::blockchain::contracts::{function_name_for, EncodedCall};
use crate::blockchain::types::{
    BlockchainConfig, BlockchainError, BlockchainResult, ChainReceipt, ConfirmationStatus, TxState,
};
use crate::blockchain::wallet::SigningCredentials;
use crate::observability::metrics;
use crate::resilience::keyed_lock::KeyedMutex;

/// Fixed transaction parameters for the target network.
#[derive(Debug, Clone)]
pub struct TxParams {
    pub chain_id: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub confirmation_attempts: u32,
    pub confirmation_interval: Duration,
}

impl From<&BlockchainConfig> for TxParams {
    fn from(config: &BlockchainConfig) -> Self {
        Self {
            chain_id: config.chain_id,
            gas_price: config.gas_price_wei as u128,
            gas_limit: config.gas_limit,
            confirmation_attempts: config.confirmation_attempts,
            confirmation_interval: Duration::from_millis(config.confirmation_interval_ms),
        }
    }
}

/// A transaction as it moves through the lifecycle. Not persisted.
#[derive(Debug, Clone)]
pub struct TransactionRecord {
    pub from: Address,
    pub to: Address,
    pub input: Bytes,
    pub value: U256,
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub chain_id: u64,
    pub hash: Option<TxHash>,
    pub raw: Option<Bytes>,
    pub state: TxState,
    pub receipt: Option<ChainReceipt>,
    pub failure: Option<String>,
}

impl TransactionRecord {
    /// Contract function targeted by the input, for logging.
    pub fn function(&self) -> &'static str {
        function_name_for(&self.input).unwrap_or("unknown")
    }

    fn transition(&mut self, next: TxState) {
        tracing::debug!(
            from = %self.from,
            nonce = self.nonce,
            function = self.function(),
            state = next.as_str(),
            "Transaction state change"
        );
        self.state = next;
        if next.is_terminal() {
            metrics::record_transaction(next.as_str());
        }
    }
}

/// Drives transactions through the lifecycle against a [`ChainAdapter`].
pub struct TransactionManager {
    chain: Arc<dyn ChainAdapter>,
    params: TxParams,
    signer_locks: KeyedMutex<Address>,
}

impl TransactionManager {
    pub fn new(chain: Arc<dyn ChainAdapter>, params: TxParams) -> Self {
        Self {
            chain,
            params,
            signer_locks: KeyedMutex::new(),
        }
    }

    pub fn chain(&self) -> &Arc<dyn ChainAdapter> {
        &self.chain
    }

    pub fn params(&self) -> &TxParams {
        &self.params
    }

    /// Build an unsigned transaction at the sender's current confirmed nonce.
    pub async fn build(
        &self,
        from: Address,
        call: EncodedCall,
        value: U256,
    ) -> BlockchainResult<TransactionRecord> {
        let nonce = self.chain.get_nonce(from).await?;

        Ok(TransactionRecord {
            from,
            to: call.to,
            input: call.data,
            value,
            nonce,
            gas_price: self.params.gas_price,
            gas_limit: self.params.gas_limit,
            chain_id: self.params.chain_id,
            hash: None,
            raw: None,
            state: TxState::Built,
            receipt: None,
            failure: None,
        })
    }

    /// Sign a built transaction, binding it to the configured chain id.
    pub fn sign(
        &self,
        record: &mut TransactionRecord,
        signer: &SigningCredentials,
    ) -> BlockchainResult<()> {
        if record.state != TxState::Built {
            return Err(BlockchainError::Wallet(format!(
                "cannot sign a transaction in state {}",
                record.state.as_str()
            )));
        }
        if signer.address() != record.from {
            return Err(BlockchainError::Wallet(format!(
                "signer {} does not match sender {}",
                signer.address(),
                record.from
            )));
        }

        let tx = TxLegacy {
            chain_id: Some(record.chain_id),
            nonce: record.nonce,
            gas_price: record.gas_price,
            gas_limit: record.gas_limit,
            to: TxKind::Call(record.to),
            value: record.value,
            input: record.input.clone(),
        };

        let (hash, raw) = signer.sign_transaction(tx)?;
        record.hash = Some(hash);
        record.raw = Some(raw);
        record.transition(TxState::Signed);
        Ok(())
    }

    /// Broadcast a signed transaction.
    ///
    /// A node rejection moves the record to FAILED and returns
    /// [`BlockchainError::Submission`]. A transport failure leaves the
    /// outcome unknown: the record stays SUBMITTED under its locally computed
    /// hash and confirmation polling decides.
    pub async fn submit(&self, record: &mut TransactionRecord) -> BlockchainResult<TxHash> {
        let (Some(hash), Some(raw)) = (record.hash, record.raw.clone()) else {
            return Err(BlockchainError::Wallet("transaction is not signed".to_string()));
        };
        if record.state != TxState::Signed {
            return Err(BlockchainError::Wallet(format!(
                "cannot submit a transaction in state {}",
                record.state.as_str()
            )));
        }

        match self.chain.submit_raw(raw).await {
            Ok(node_hash) => {
                if node_hash != hash {
                    tracing::warn!(local = %hash, node = %node_hash, "Node reported a different transaction hash");
                }
                record.transition(TxState::Submitted);
                tracing::info!(
                    tx_hash = %hash,
                    from = %record.from,
                    nonce = record.nonce,
                    function = record.function(),
                    "Transaction submitted"
                );
                Ok(hash)
            }
            Err(BlockchainError::Submission(reason)) => {
                tracing::warn!(
                    tx_hash = %hash,
                    from = %record.from,
                    nonce = record.nonce,
                    reason = %reason,
                    "Transaction rejected by node"
                );
                record.failure = Some(reason.clone());
                record.transition(TxState::Failed);
                Err(BlockchainError::Submission(reason))
            }
            Err(e) => {
                tracing::warn!(
                    tx_hash = %hash,
                    error = %e,
                    "Submission outcome unknown, polling for receipt"
                );
                record.transition(TxState::Submitted);
                Ok(hash)
            }
        }
    }

    /// Poll for a receipt every `poll_interval`, at most `max_attempts` times.
    ///
    /// RPC errors while polling count as "not yet mined".
    pub async fn confirm(
        &self,
        tx_hash: TxHash,
        max_attempts: u32,
        poll_interval: Duration,
    ) -> BlockchainResult<ConfirmationStatus> {
        let mut ticker = interval(poll_interval.max(Duration::from_millis(1)));

        for attempt in 1..=max_attempts {
            ticker.tick().await;

            match self.chain.get_receipt(tx_hash).await {
                Ok(Some(receipt)) if receipt.success => {
                    return Ok(ConfirmationStatus::Confirmed(receipt));
                }
                Ok(Some(receipt)) => {
                    return Ok(ConfirmationStatus::Reverted(receipt));
                }
                Ok(None) => {
                    tracing::debug!(tx_hash = %tx_hash, attempt, "Transaction pending");
                }
                Err(e) => {
                    tracing::warn!(tx_hash = %tx_hash, attempt, error = %e, "Receipt query failed");
                }
            }
        }

        Ok(ConfirmationStatus::TimedOut {
            attempts: max_attempts,
        })
    }

    /// Confirm a submitted record with the configured bounds and apply the outcome.
    pub async fn await_confirmation(
        &self,
        record: &mut TransactionRecord,
    ) -> BlockchainResult<ConfirmationStatus> {
        let hash = record
            .hash
            .ok_or_else(|| BlockchainError::Wallet("transaction is not signed".to_string()))?;

        let status = self
            .confirm(
                hash,
                self.params.confirmation_attempts,
                self.params.confirmation_interval,
            )
            .await?;

        match &status {
            ConfirmationStatus::Confirmed(receipt) => {
                record.receipt = Some(receipt.clone());
                record.transition(TxState::Confirmed);
            }
            ConfirmationStatus::Reverted(receipt) => {
                record.receipt = Some(receipt.clone());
                record.failure = Some(format!(
                    "reverted (gas used {}, {} logs)",
                    receipt.gas_used,
                    receipt.logs.len()
                ));
                record.transition(TxState::Failed);
            }
            ConfirmationStatus::TimedOut { .. } => {
                record.transition(TxState::Timeout);
            }
        }
        Ok(status)
    }

    /// Run the full lifecycle for one call, holding the signer's lock throughout.
    ///
    /// Returns the confirmed record. A revert maps to
    /// [`BlockchainError::Reverted`] and an exhausted poll to
    /// [`BlockchainError::ConfirmationTimeout`].
    pub async fn execute(
        &self,
        signer: &SigningCredentials,
        call: EncodedCall,
    ) -> BlockchainResult<TransactionRecord> {
        let _guard = self.signer_locks.lock(&signer.address()).await;

        let mut record = self.build(signer.address(), call, U256::ZERO).await?;
        self.sign(&mut record, signer)?;
        let tx_hash = self.submit(&mut record).await?;

        match self.await_confirmation(&mut record).await? {
            ConfirmationStatus::Confirmed(receipt) => {
                tracing::info!(
                    tx_hash = %tx_hash,
                    function = record.function(),
                    block = ?receipt.block_number,
                    gas_used = receipt.gas_used,
                    "Transaction confirmed"
                );
                Ok(record)
            }
            ConfirmationStatus::Reverted(receipt) => {
                tracing::warn!(
                    tx_hash = %tx_hash,
                    function = record.function(),
                    gas_used = receipt.gas_used,
                    logs = receipt.logs.len(),
                    "Transaction reverted"
                );
                Err(BlockchainError::Reverted {
                    tx_hash,
                    gas_used: receipt.gas_used,
                    logs: receipt.logs,
                })
            }
            ConfirmationStatus::TimedOut { attempts } => {
                tracing::warn!(
                    tx_hash = %tx_hash,
                    function = record.function(),
                    attempts,
                    "Transaction not confirmed in time"
                );
                Err(BlockchainError::ConfirmationTimeout { tx_hash, attempts })
            }
        }
    }

    /// Single receipt lookup, used when reconciling an earlier timeout.
    pub async fn check(&self, tx_hash: TxHash) -> BlockchainResult<Option<ChainReceipt>> {
        self.chain.get_receipt(tx_hash).await
    }

    /// Read-only contract call.
    pub async fn call(&self, call: EncodedCall) -> BlockchainResult<Bytes> {
        self.chain.call(call.to, call.data).await
    }
}
