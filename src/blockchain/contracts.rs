//! Contract interfaces and call encoding.
//!
//! One encoder, parameterised by the deployed addresses, covers both the
//! status list manager and the credential registry.

use alloy::primitives::{keccak256, Address, Bytes, B256, U256};
use alloy::sol;
use alloy::sol_types::SolCall;
use serde::{Deserialize, Serialize};

use crate::blockchain::types::{BlockchainError, BlockchainResult};
use crate::config::schema::ContractsConfig;
use crate::status_list::types::StatusPurpose;

sol! {
    /// Versioned status list registry.
    interface IStatusListManager {
        function createList(string listId, string uri, bytes32 contentHash, uint64 size, bytes32 purpose) external;
        function publish(string listId, uint256 version, string uri, bytes32 contentHash) external;
        function hasRole(bytes32 role, address account) external view returns (bool);
        function grantRole(bytes32 role, address account) external;
    }

    /// Credential existence registry with DID attributes.
    interface ICredentialRegistry {
        function issueCredential(string credentialId, address subject, bytes32 credentialHash) external;
        function isCredentialRevoked(string credentialId) external view returns (bool);
        function setAttribute(address identity, bytes32 name, bytes value, uint256 validity) external;
        function revokeAttribute(address identity, bytes32 name, bytes value) external;
    }
}

/// Role required to publish status lists.
pub fn issuer_role() -> B256 {
    keccak256("ISSUER_ROLE")
}

/// DID attribute name under which credential content hashes are anchored.
pub fn credential_metadata_attribute() -> B256 {
    keccak256("credentialMetadata")
}

/// A contract function invocation, independent of its ABI encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "function", rename_all = "camelCase")]
pub enum ContractCall {
    CreateList {
        list_id: String,
        uri: String,
        hash: B256,
        size: u64,
        purpose: StatusPurpose,
    },
    Publish {
        list_id: String,
        version: u64,
        uri: String,
        hash: B256,
    },
    IssueCredential {
        credential_id: String,
        holder: Address,
        hash: B256,
    },
    SetAttribute {
        identity: Address,
        name: B256,
        value: Bytes,
        validity: u64,
    },
    RevokeAttribute {
        identity: Address,
        name: B256,
        value: Bytes,
    },
    GrantRole {
        role: B256,
        account: Address,
    },
    HasRole {
        role: B256,
        account: Address,
    },
    IsCredentialRevoked {
        credential_id: String,
    },
}

impl ContractCall {
    pub fn function_name(&self) -> &'static str {
        match self {
            ContractCall::CreateList { .. } => "createList",
            ContractCall::Publish { .. } => "publish",
            ContractCall::IssueCredential { .. } => "issueCredential",
            ContractCall::SetAttribute { .. } => "setAttribute",
            ContractCall::RevokeAttribute { .. } => "revokeAttribute",
            ContractCall::GrantRole { .. } => "grantRole",
            ContractCall::HasRole { .. } => "hasRole",
            ContractCall::IsCredentialRevoked { .. } => "isCredentialRevoked",
        }
    }
}

/// Target contract and calldata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedCall {
    pub to: Address,
    pub data: Bytes,
}

/// Turns a [`ContractCall`] into calldata for a specific deployment.
pub trait ContractEncoder: Send + Sync {
    fn encode(&self, call: &ContractCall) -> BlockchainResult<EncodedCall>;
}

/// Deployed contract addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractAddresses {
    pub registry: Address,
    pub status_list: Address,
}

impl ContractAddresses {
    pub fn from_config(config: &ContractsConfig) -> BlockchainResult<Self> {
        let registry = parse_address(&config.registry_address)?;
        let status_list = match &config.status_list_address {
            Some(addr) => parse_address(addr)?,
            None => registry,
        };
        Ok(Self {
            registry,
            status_list,
        })
    }
}

fn parse_address(s: &str) -> BlockchainResult<Address> {
    s.parse()
        .map_err(|e| BlockchainError::Encoding(format!("invalid contract address '{}': {}", s, e)))
}

/// Solidity ABI encoder.
#[derive(Debug, Clone)]
pub struct AbiEncoder {
    addresses: ContractAddresses,
}

impl AbiEncoder {
    pub fn new(addresses: ContractAddresses) -> Self {
        Self { addresses }
    }

    pub fn addresses(&self) -> ContractAddresses {
        self.addresses
    }
}

impl ContractEncoder for AbiEncoder {
    fn encode(&self, call: &ContractCall) -> BlockchainResult<EncodedCall> {
        let lists = self.addresses.status_list;
        let registry = self.addresses.registry;

        let (to, data) = match call.clone() {
            ContractCall::CreateList {
                list_id,
                uri,
                hash,
                size,
                purpose,
            } => (
                lists,
                IStatusListManager::createListCall {
                    listId: list_id,
                    uri,
                    contentHash: hash,
                    size,
                    purpose: keccak256(purpose.as_str()),
                }
                .abi_encode(),
            ),
            ContractCall::Publish {
                list_id,
                version,
                uri,
                hash,
            } => (
                lists,
                IStatusListManager::publishCall {
                    listId: list_id,
                    version: U256::from(version),
                    uri,
                    contentHash: hash,
                }
                .abi_encode(),
            ),
            ContractCall::GrantRole { role, account } => (
                lists,
                IStatusListManager::grantRoleCall { role, account }.abi_encode(),
            ),
            ContractCall::HasRole { role, account } => (
                lists,
                IStatusListManager::hasRoleCall { role, account }.abi_encode(),
            ),
            ContractCall::IssueCredential {
                credential_id,
                holder,
                hash,
            } => (
                registry,
                ICredentialRegistry::issueCredentialCall {
                    credentialId: credential_id,
                    subject: holder,
                    credentialHash: hash,
                }
                .abi_encode(),
            ),
            ContractCall::IsCredentialRevoked { credential_id } => (
                registry,
                ICredentialRegistry::isCredentialRevokedCall {
                    credentialId: credential_id,
                }
                .abi_encode(),
            ),
            ContractCall::SetAttribute {
                identity,
                name,
                value,
                validity,
            } => (
                registry,
                ICredentialRegistry::setAttributeCall {
                    identity,
                    name,
                    value,
                    validity: U256::from(validity),
                }
                .abi_encode(),
            ),
            ContractCall::RevokeAttribute {
                identity,
                name,
                value,
            } => (
                registry,
                ICredentialRegistry::revokeAttributeCall {
                    identity,
                    name,
                    value,
                }
                .abi_encode(),
            ),
        };

        Ok(EncodedCall {
            to,
            data: Bytes::from(data),
        })
    }
}

/// Name of the function a calldata blob targets, if it is one of ours.
pub fn function_name_for(data: &[u8]) -> Option<&'static str> {
    let selector: [u8; 4] = data.get(..4)?.try_into().ok()?;
    let name = match selector {
        IStatusListManager::createListCall::SELECTOR => "createList",
        IStatusListManager::publishCall::SELECTOR => "publish",
        IStatusListManager::grantRoleCall::SELECTOR => "grantRole",
        IStatusListManager::hasRoleCall::SELECTOR => "hasRole",
        ICredentialRegistry::issueCredentialCall::SELECTOR => "issueCredential",
        ICredentialRegistry::isCredentialRevokedCall::SELECTOR => "isCredentialRevoked",
        ICredentialRegistry::setAttributeCall::SELECTOR => "setAttribute",
        ICredentialRegistry::revokeAttributeCall::SELECTOR => "revokeAttribute",
        _ => return None,
    };
    Some(name)
}

/// Decode a single ABI `bool` return word.
pub fn decode_bool(data: &[u8]) -> BlockchainResult<bool> {
    if data.len() != 32 {
        return Err(BlockchainError::Encoding(format!(
            "expected 32-byte bool word, got {} bytes",
            data.len()
        )));
    }
    if data[..31].iter().any(|b| *b != 0) || data[31] > 1 {
        return Err(BlockchainError::Encoding("invalid bool word".to_string()));
    }
    Ok(data[31] == 1)
}

/// Encode a `bool` as a single ABI word.
pub fn encode_bool(value: bool) -> Bytes {
    let mut word = [0u8; 32];
    word[31] = value as u8;
    Bytes::copy_from_slice(&word)
}
