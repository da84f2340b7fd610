//! Request handlers.

use alloy::primitives::{Address, TxHash};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::api::error::ApiError;
use crate::api::AppState;
use crate::credential::{
    AnchorStatus, Credential, CredentialFilter, IssueRequest, StatusChange, Verification,
};
use crate::custody::{parse_address, WalletMetadata};
use crate::status_list::{
    ReconcileState, Reconciled, StatusListDocument, StatusListMetadata, StatusListRecord,
    StatusPurpose, UpdateOutcome,
};

type ApiResult<T> = Result<T, ApiError>;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub version: &'static str,
    pub status: &'static str,
    /// `None` when no live node client is attached.
    pub chain_reachable: Option<bool>,
    pub pending_updates: Vec<String>,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    let chain_reachable = match &state.chain {
        Some(client) => Some(client.is_healthy().await),
        None => None,
    };
    Json(HealthStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: if chain_reachable == Some(false) { "degraded" } else { "operational" },
        chain_reachable,
        pending_updates: state.status_lists.pending_lists(),
    })
}

// Wallets

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWalletRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportWalletRequest {
    pub private_key: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWalletRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct WalletListQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

pub async fn create_wallet(
    State(state): State<AppState>,
    Json(req): Json<CreateWalletRequest>,
) -> ApiResult<(StatusCode, Json<WalletMetadata>)> {
    let wallet = state
        .custody
        .create_wallet(&req.name, &req.description, req.password.as_deref())?;
    Ok((StatusCode::CREATED, Json(wallet)))
}

pub async fn import_wallet(
    State(state): State<AppState>,
    Json(req): Json<ImportWalletRequest>,
) -> ApiResult<(StatusCode, Json<WalletMetadata>)> {
    let wallet = state
        .custody
        .import_from_private_key(&req.private_key, &req.name, &req.description)?;
    Ok((StatusCode::CREATED, Json(wallet)))
}

pub async fn list_wallets(
    State(state): State<AppState>,
    Query(query): Query<WalletListQuery>,
) -> Json<Vec<WalletMetadata>> {
    Json(state.custody.list_wallets(query.include_inactive))
}

pub async fn get_wallet(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> ApiResult<Json<WalletMetadata>> {
    let address = parse_address("address", &address)?;
    Ok(Json(state.custody.get_wallet(&address)?))
}

pub async fn update_wallet(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Json(req): Json<UpdateWalletRequest>,
) -> ApiResult<Json<WalletMetadata>> {
    let address = parse_address("address", &address)?;
    let wallet = state.custody.update_wallet(
        &address,
        req.name.as_deref(),
        req.description.as_deref(),
    )?;
    Ok(Json(wallet))
}

pub async fn deactivate_wallet(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> ApiResult<Json<WalletMetadata>> {
    let address = parse_address("address", &address)?;
    Ok(Json(state.custody.deactivate_wallet(&address)?))
}

pub async fn wallet_balance(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> ApiResult<Json<Value>> {
    let address = parse_address("address", &address)?;
    let balance = state.custody.balance(&address).await?;
    Ok(Json(json!({ "address": address, "balanceWei": balance.to_string() })))
}

pub async fn issuer_role(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> ApiResult<Json<Value>> {
    let address = parse_address("address", &address)?;
    let has_role = state.custody.has_issuer_role(&address).await?;
    Ok(Json(json!({ "address": address, "issuer": has_role })))
}

pub async fn grant_issuer_role(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> ApiResult<Json<Value>> {
    let address = parse_address("address", &address)?;
    let tx_hash = state.custody.grant_issuer_role(&address).await?;
    Ok(Json(json!({ "address": address, "txHash": tx_hash })))
}

// Status lists

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStatusListRequest {
    pub status_list_id: String,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default = "default_purpose")]
    pub purpose: StatusPurpose,
    pub issuer: String,
    pub wallet_address: String,
    #[serde(default)]
    pub password: Option<String>,
}

fn default_purpose() -> StatusPurpose {
    StatusPurpose::Revocation
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUriRequest {
    pub uri: String,
    #[serde(default)]
    pub password: Option<String>,
}

/// Optional password for the wallet that signs a status change.
#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PasswordBody {
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResponse {
    pub list_id: String,
    pub version: u64,
    pub pending: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<TxHash>,
}

impl UpdateResponse {
    fn from_outcome(list_id: &str, outcome: UpdateOutcome) -> Self {
        match outcome {
            UpdateOutcome::Applied(record) | UpdateOutcome::Unchanged(record) => Self {
                list_id: record.list_id,
                version: record.version,
                pending: false,
                reason: None,
                tx_hash: record.tx_hash,
            },
            UpdateOutcome::Pending { version, reason } => Self {
                list_id: list_id.to_string(),
                version,
                pending: true,
                reason: Some(reason),
                tx_hash: None,
            },
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileResponse {
    pub list_id: String,
    pub version: u64,
    pub credential_id: Option<String>,
    pub state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<Reconciled> for ReconcileResponse {
    fn from(r: Reconciled) -> Self {
        let (state, reason) = match r.state {
            ReconcileState::Applied => ("APPLIED", None),
            ReconcileState::Pending(reason) => ("PENDING", Some(reason)),
            ReconcileState::Discarded(reason) => ("DISCARDED", Some(reason)),
        };
        Self {
            list_id: r.list_id,
            version: r.version,
            credential_id: r.credential_id,
            state,
            reason,
        }
    }
}

pub async fn create_status_list(
    State(state): State<AppState>,
    Json(req): Json<CreateStatusListRequest>,
) -> ApiResult<(StatusCode, Json<StatusListRecord>)> {
    let wallet: Address = parse_address("walletAddress", &req.wallet_address)?;
    let record = state
        .credentials
        .create_status_list(
            &req.status_list_id,
            req.uri.as_deref(),
            req.purpose,
            &req.issuer,
            &wallet,
            req.password.as_deref(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn list_status_lists(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.status_lists.list_ids())
}

pub async fn status_list_metadata(
    State(state): State<AppState>,
    Path(list_id): Path<String>,
) -> ApiResult<Json<StatusListMetadata>> {
    Ok(Json(state.status_lists.metadata(&list_id)?))
}

pub async fn update_status_list_uri(
    State(state): State<AppState>,
    Path(list_id): Path<String>,
    Json(req): Json<UpdateUriRequest>,
) -> ApiResult<Json<UpdateResponse>> {
    let outcome = state
        .credentials
        .update_status_list_uri(&list_id, &req.uri, req.password.as_deref())
        .await?;
    Ok(Json(UpdateResponse::from_outcome(&list_id, outcome)))
}

pub async fn status_list_versions(
    State(state): State<AppState>,
    Path(list_id): Path<String>,
) -> ApiResult<Json<Vec<StatusListRecord>>> {
    Ok(Json(state.status_lists.versions(&list_id)?))
}

/// The published document of the latest confirmed version.
pub async fn status_list_document(
    State(state): State<AppState>,
    Path(list_id): Path<String>,
) -> ApiResult<Json<StatusListDocument>> {
    Ok(Json(state.status_lists.latest(&list_id)?.document))
}

pub async fn status_list_entry(
    State(state): State<AppState>,
    Path((list_id, index)): Path<(String, u64)>,
) -> ApiResult<Json<Value>> {
    let revoked = state.status_lists.is_revoked(&list_id, index)?;
    Ok(Json(json!({ "statusListId": list_id, "index": index, "revoked": revoked })))
}

pub async fn reconcile_list(
    State(state): State<AppState>,
    Path(list_id): Path<String>,
    body: Option<Json<PasswordBody>>,
) -> ApiResult<Json<Option<ReconcileResponse>>> {
    let password = body.and_then(|Json(b)| b.password);
    let result = state
        .credentials
        .reconcile(&list_id, password.as_deref())
        .await?;
    Ok(Json(result.map(ReconcileResponse::from)))
}

pub async fn reconcile_all(State(state): State<AppState>) -> Json<Vec<ReconcileResponse>> {
    let results = state.credentials.reconcile_all().await;
    Json(results.into_iter().map(ReconcileResponse::from).collect())
}

// Credentials

#[derive(Deserialize)]
pub struct VerifyRequest {
    pub token: String,
}

pub async fn issue_credential(
    State(state): State<AppState>,
    Json(req): Json<IssueRequest>,
) -> ApiResult<(StatusCode, Json<Credential>)> {
    let credential = state.credentials.issue(req).await?;
    Ok((StatusCode::CREATED, Json(credential)))
}

pub async fn list_credentials(
    State(state): State<AppState>,
    Query(filter): Query<CredentialFilter>,
) -> Json<Vec<Credential>> {
    Json(state.credentials.list(&filter))
}

pub async fn get_credential(
    State(state): State<AppState>,
    Path(credential_id): Path<String>,
) -> ApiResult<Json<Credential>> {
    Ok(Json(state.credentials.get(&credential_id)?))
}

pub async fn revoke_credential(
    State(state): State<AppState>,
    Path(credential_id): Path<String>,
    body: Option<Json<PasswordBody>>,
) -> ApiResult<Json<StatusChange>> {
    let password = body.and_then(|Json(b)| b.password);
    let change = state
        .credentials
        .revoke(&credential_id, password.as_deref())
        .await?;
    Ok(Json(change))
}

pub async fn restore_credential(
    State(state): State<AppState>,
    Path(credential_id): Path<String>,
    body: Option<Json<PasswordBody>>,
) -> ApiResult<Json<StatusChange>> {
    let password = body.and_then(|Json(b)| b.password);
    let change = state
        .credentials
        .restore(&credential_id, password.as_deref())
        .await?;
    Ok(Json(change))
}

pub async fn verify_credential(
    State(state): State<AppState>,
    Json(req): Json<VerifyRequest>,
) -> Json<Verification> {
    Json(state.credentials.verify(&req.token).await)
}

pub async fn credential_chain_status(
    State(state): State<AppState>,
    Path(credential_id): Path<String>,
) -> ApiResult<Json<Value>> {
    // 404 for unknown ids rather than asking the registry
    state.credentials.get(&credential_id)?;
    let revoked = state.credentials.chain_status(&credential_id).await?;
    Ok(Json(json!({ "credentialId": credential_id, "revokedOnChain": revoked })))
}

pub async fn credential_anchor(
    State(state): State<AppState>,
    Path(credential_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let anchor_tx = state.credentials.anchor_tx(&credential_id)?;
    let metadata: Option<AnchorStatus> = state.credentials.anchor_status(&credential_id);
    Ok(Json(json!({
        "credentialId": credential_id,
        "anchorTx": anchor_tx,
        "metadataAnchor": metadata,
    })))
}
