//! Failure injection: node rejections, reverts, lost responses and
//! confirmation timeouts at each chain write.

use alloy::primitives::{B256, U256};
use std::time::Duration;

use vc_custody::blockchain::{
    AbiEncoder, BlockchainError, ConfirmationStatus, ContractAddresses, ContractCall,
    ContractEncoder, EncodedCall, TxState,
};
use vc_custody::credential::{CredentialFilter, CredentialStatus};
use vc_custody::error::CustodyError;
use vc_custody::status_list::{ReconcileState, StatusPurpose};
use vc_custody::vault::PasswordContext;

mod common;

use common::{harness, Behavior, Harness};

fn publish_call(h: &Harness) -> EncodedCall {
    let encoder = AbiEncoder::new(ContractAddresses::from_config(&h.config.contracts).unwrap());
    encoder
        .encode(&ContractCall::Publish {
            list_id: "L1".to_string(),
            version: 2,
            uri: "https://status.example/lists/L1.json".to_string(),
            hash: B256::repeat_byte(7),
        })
        .unwrap()
}

#[tokio::test]
async fn test_rejected_submission_fails_without_nonce_bump() {
    let h = harness();
    let wallet = h.issuer_wallet();
    let signer = h
        .services
        .custody
        .resolve_signer(&wallet.address, PasswordContext::Master)
        .unwrap();
    let tm = &h.services.transactions;

    h.chain.script_once("publish", Behavior::Reject);
    let mut record = tm
        .build(signer.address(), publish_call(&h), U256::ZERO)
        .await
        .unwrap();
    assert_eq!(record.state, TxState::Built);
    tm.sign(&mut record, &signer).unwrap();
    assert_eq!(record.state, TxState::Signed);

    let err = tm.submit(&mut record).await.unwrap_err();
    assert!(matches!(err, BlockchainError::Submission(_)));
    assert_eq!(record.state, TxState::Failed);
    assert!(record.failure.is_some());

    // no retry, no nonce consumed
    assert_eq!(h.chain.rejected(), vec!["publish"]);
    assert!(h.chain.submitted().is_empty());
    assert_eq!(h.chain.nonce(signer.address()), 0);

    // the next transaction reuses nonce 0
    let next = tm.execute(&signer, publish_call(&h)).await.unwrap();
    assert_eq!(next.nonce, 0);
    assert_eq!(next.state, TxState::Confirmed);
}

#[tokio::test]
async fn test_timeout_is_distinct_and_repollable() {
    let h = harness();
    let wallet = h.issuer_wallet();
    let signer = h
        .services
        .custody
        .resolve_signer(&wallet.address, PasswordContext::Master)
        .unwrap();
    let tm = &h.services.transactions;

    h.chain.script_once("publish", Behavior::Hold);
    let mut record = tm
        .build(signer.address(), publish_call(&h), U256::ZERO)
        .await
        .unwrap();
    tm.sign(&mut record, &signer).unwrap();
    let hash = tm.submit(&mut record).await.unwrap();
    assert_eq!(record.state, TxState::Submitted);

    let status = tm.await_confirmation(&mut record).await.unwrap();
    assert_eq!(status, ConfirmationStatus::TimedOut { attempts: 3 });
    assert_eq!(record.state, TxState::Timeout);
    assert!(record.failure.is_none());

    h.chain.release_all();
    let later = tm.confirm(hash, 1, Duration::from_millis(1)).await.unwrap();
    assert!(matches!(later, ConfirmationStatus::Confirmed(r) if r.tx_hash == hash));
}

#[tokio::test]
async fn test_reverted_transaction_carries_diagnostics() {
    let h = harness();
    let wallet = h.issuer_wallet();
    let signer = h
        .services
        .custody
        .resolve_signer(&wallet.address, PasswordContext::Master)
        .unwrap();

    h.chain.script_once("publish", Behavior::Revert);
    let err = h
        .services
        .transactions
        .execute(&signer, publish_call(&h))
        .await
        .unwrap_err();
    match err {
        BlockchainError::Reverted { gas_used, .. } => assert_eq!(gas_used, 31_000),
        other => panic!("expected revert, got {:?}", other),
    }
    // a mined revert still consumes the nonce
    assert_eq!(h.chain.nonce(signer.address()), 1);
}

#[tokio::test]
async fn test_rejected_existence_anchor_persists_nothing() {
    let h = harness();
    let wallet = h.issuer_wallet();
    h.create_list("L1", &wallet, StatusPurpose::Revocation).await;

    h.chain.script_once("issueCredential", Behavior::Reject);
    let err = h
        .services
        .credentials
        .issue(h.issue_request(&wallet, "L1"))
        .await
        .unwrap_err();
    assert!(matches!(err, CustodyError::Chain(BlockchainError::Submission(_))));
    assert!(h.services.credentials.list(&CredentialFilter::default()).is_empty());
    assert_eq!(h.chain.nonce(h.admin_address()), 0);

    // the burned index is never handed out again
    let c = h.services.credentials.issue(h.issue_request(&wallet, "L1")).await.unwrap();
    assert_eq!(c.status_list_index, 1);
}

#[tokio::test]
async fn test_reverted_existence_anchor_persists_nothing() {
    let h = harness();
    let wallet = h.issuer_wallet();
    h.create_list("L1", &wallet, StatusPurpose::Revocation).await;

    h.chain.script_once("issueCredential", Behavior::Revert);
    let err = h
        .services
        .credentials
        .issue(h.issue_request(&wallet, "L1"))
        .await
        .unwrap_err();
    assert!(matches!(err, CustodyError::Chain(BlockchainError::Reverted { .. })));
    assert!(h.services.credentials.list(&CredentialFilter::default()).is_empty());
}

#[tokio::test]
async fn test_unconfirmed_existence_anchor_is_ambiguous() {
    let h = harness();
    let wallet = h.issuer_wallet();
    h.create_list("L1", &wallet, StatusPurpose::Revocation).await;

    h.chain.script_once("issueCredential", Behavior::Hold);
    let err = h
        .services
        .credentials
        .issue(h.issue_request(&wallet, "L1"))
        .await
        .unwrap_err();
    assert!(err.is_ambiguous());
    assert!(h.services.credentials.list(&CredentialFilter::default()).is_empty());

    let hash = h.chain.last_hash("issueCredential").unwrap();
    h.chain.release_all();
    let receipt = h.services.transactions.check(hash).await.unwrap().unwrap();
    assert!(receipt.success);
}

#[tokio::test]
async fn test_lost_submit_response_still_confirms() {
    let h = harness();
    let wallet = h.issuer_wallet();
    h.create_list("L1", &wallet, StatusPurpose::Revocation).await;

    h.chain.script_once("issueCredential", Behavior::DropResponse);
    let c = h.services.credentials.issue(h.issue_request(&wallet, "L1")).await.unwrap();
    assert_eq!(c.anchor_tx, h.chain.last_hash("issueCredential"));
    assert_eq!(h.chain.count("issueCredential"), 1);
}

#[tokio::test]
async fn test_revoke_list_write_timeout_parks_update() {
    let h = harness();
    let wallet = h.issuer_wallet();
    h.create_list("L1", &wallet, StatusPurpose::Revocation).await;
    let a = h.services.credentials.issue(h.issue_request(&wallet, "L1")).await.unwrap();
    let b = h.services.credentials.issue(h.issue_request(&wallet, "L1")).await.unwrap();

    h.chain.script_once("publish", Behavior::Hold);
    let change = h.services.credentials.revoke(&a.credential_id, None).await.unwrap();
    assert!(change.pending);
    assert_eq!(change.status, CredentialStatus::Valid);
    assert_eq!(change.list_version, Some(2));

    // nothing local moved
    assert_eq!(h.services.credentials.get(&a.credential_id).unwrap().status, CredentialStatus::Valid);
    assert!(!h.services.status_lists.is_revoked("L1", 0).unwrap());
    assert_eq!(h.services.status_lists.latest("L1").unwrap().version, 1);
    assert_eq!(h.services.status_lists.pending_lists(), vec!["L1".to_string()]);
    assert!(h.services.status_lists.metadata("L1").unwrap().pending_update);
    assert_eq!(h.chain.count("revokeAttribute"), 0);

    // the list is closed to further updates until reconciled
    assert!(matches!(
        h.services.credentials.revoke(&b.credential_id, None).await,
        Err(CustodyError::Consistency(_))
    ));

    // still unmined: stays pending
    let still = h.services.credentials.reconcile("L1", None).await.unwrap().unwrap();
    assert!(matches!(still.state, ReconcileState::Pending(_)));

    h.chain.release_all();
    let done = h.services.credentials.reconcile("L1", None).await.unwrap().unwrap();
    assert_eq!(done.state, ReconcileState::Applied);
    assert_eq!(done.credential_id.as_deref(), Some(a.credential_id.as_str()));
    assert_eq!(h.chain.count("revokeAttribute"), 1);
    // the same publish transaction was reused, not re-sent
    assert_eq!(h.chain.count("publish"), 1);

    assert_eq!(h.services.credentials.get(&a.credential_id).unwrap().status, CredentialStatus::Revoked);
    assert!(h.services.status_lists.is_revoked("L1", 0).unwrap());
    assert_eq!(h.services.status_lists.latest("L1").unwrap().version, 2);
    assert!(h.services.status_lists.pending_lists().is_empty());

    // nothing left to do
    assert!(h.services.credentials.reconcile("L1", None).await.unwrap().is_none());
    h.services.credentials.revoke(&b.credential_id, None).await.unwrap();
    assert_eq!(h.services.status_lists.latest("L1").unwrap().version, 3);
}

#[tokio::test]
async fn test_rejected_list_write_discards_candidate() {
    let h = harness();
    let wallet = h.issuer_wallet();
    h.create_list("L1", &wallet, StatusPurpose::Revocation).await;
    let c = h.services.credentials.issue(h.issue_request(&wallet, "L1")).await.unwrap();

    h.chain.script_once("publish", Behavior::Reject);
    let err = h.services.credentials.revoke(&c.credential_id, None).await.unwrap_err();
    assert!(matches!(err, CustodyError::Chain(BlockchainError::Submission(_))));

    assert_eq!(h.services.credentials.get(&c.credential_id).unwrap().status, CredentialStatus::Valid);
    assert_eq!(h.services.status_lists.latest("L1").unwrap().version, 1);
    assert!(h.services.status_lists.pending_lists().is_empty());

    // a fresh attempt goes through
    let change = h.services.credentials.revoke(&c.credential_id, None).await.unwrap();
    assert_eq!(change.status, CredentialStatus::Revoked);
    assert_eq!(change.list_version, Some(2));
}

#[tokio::test]
async fn test_attribute_failure_after_list_write_is_retried() {
    let h = harness();
    let wallet = h.issuer_wallet();
    h.create_list("L1", &wallet, StatusPurpose::Revocation).await;
    let c = h.services.credentials.issue(h.issue_request(&wallet, "L1")).await.unwrap();

    h.chain.script_once("revokeAttribute", Behavior::Revert);
    let change = h.services.credentials.revoke(&c.credential_id, None).await.unwrap();
    assert!(change.pending);
    let pending = h.services.status_lists.pending_update("L1").unwrap();
    assert!(pending.last_error.unwrap().contains("attribute write"));

    let result = h.services.credentials.reconcile_all().await;
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].state, ReconcileState::Applied);
    assert_eq!(h.chain.count("publish"), 1);
    assert_eq!(h.chain.count("revokeAttribute"), 2);
    assert_eq!(h.services.credentials.get(&c.credential_id).unwrap().status, CredentialStatus::Revoked);
}

#[tokio::test]
async fn test_reverted_pending_list_write_is_discarded() {
    let h = harness();
    let wallet = h.issuer_wallet();
    h.create_list("L1", &wallet, StatusPurpose::Revocation).await;
    let c = h.services.credentials.issue(h.issue_request(&wallet, "L1")).await.unwrap();

    h.chain.script_once("publish", Behavior::Hold);
    assert!(h.services.credentials.revoke(&c.credential_id, None).await.unwrap().pending);

    h.chain.fail_held();
    let result = h.services.credentials.reconcile("L1", None).await.unwrap().unwrap();
    assert!(matches!(result.state, ReconcileState::Discarded(_)));

    assert_eq!(h.services.credentials.get(&c.credential_id).unwrap().status, CredentialStatus::Valid);
    assert_eq!(h.services.status_lists.latest("L1").unwrap().version, 1);
    assert!(h.services.status_lists.pending_lists().is_empty());
    h.services.status_lists.verify_integrity("L1").unwrap();
}

#[tokio::test]
async fn test_wrong_password_never_returns_key_material() {
    let h = harness();
    let wallet = h.services.custody.create_wallet("w", "", Some("right")).unwrap();

    for attempt in ["wrong", "", "right "] {
        assert!(matches!(
            h.services.custody.resolve_signer(&wallet.address, PasswordContext::Custom(attempt)),
            Err(CustodyError::AuthenticationFailure)
        ));
    }
    let signer = h
        .services
        .custody
        .resolve_signer(&wallet.address, PasswordContext::Custom("right"))
        .unwrap();
    assert_eq!(signer.address(), wallet.address);
}
