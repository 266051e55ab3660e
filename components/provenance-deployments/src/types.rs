use std::collections::BTreeMap;
use std::fmt;

use evm_rpc_client::Address;
use provenance_files::{EvmNetwork, FileLocation};

use crate::artifacts::ContractArtifact;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentError {
    /// The backend rejected a submission, a transaction reverted, or its
    /// confirmation timed out. Already confirmed transactions are left
    /// untouched.
    Failure(String),
    /// A constructor argument references a contract whose address is not
    /// recorded by an earlier transaction of the plan. Detected before any
    /// submission reaches the network.
    DependencyUnresolved(String),
}

impl fmt::Display for DeploymentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeploymentError::Failure(message) => write!(f, "deployment failed: {}", message),
            DeploymentError::DependencyUnresolved(message) => {
                write!(f, "dependency unresolved: {}", message)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgumentValue {
    Address(Address),
    Uint(u128),
    Bool(bool),
}

/// A constructor argument of a deploy transaction. References are resolved
/// against the addresses recorded earlier in the same run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractArgument {
    Literal(ArgumentValue),
    ContractReference(String),
}

impl ContractArgument {
    pub fn parse(value: &str) -> Result<ContractArgument, String> {
        if let Some(contract_name) = value.strip_prefix("contract:") {
            if contract_name.is_empty() {
                return Err(format!(
                    "unable to parse '{}' as a constructor argument (empty contract reference)",
                    value
                ));
            }
            return Ok(ContractArgument::ContractReference(
                contract_name.to_string(),
            ));
        }
        if value == "true" || value == "false" {
            return Ok(ContractArgument::Literal(ArgumentValue::Bool(
                value == "true",
            )));
        }
        if value.starts_with("0x") {
            let address = Address::from_hex(value)?;
            return Ok(ContractArgument::Literal(ArgumentValue::Address(address)));
        }
        if let Ok(uint) = value.parse::<u128>() {
            return Ok(ContractArgument::Literal(ArgumentValue::Uint(uint)));
        }
        Err(format!(
            "unable to parse '{}' as a constructor argument (address, uint, bool or contract:<Name>)",
            value
        ))
    }

    pub fn to_raw_string(&self) -> String {
        match self {
            ContractArgument::Literal(ArgumentValue::Address(address)) => address.to_string(),
            ContractArgument::Literal(ArgumentValue::Uint(value)) => value.to_string(),
            ContractArgument::Literal(ArgumentValue::Bool(value)) => value.to_string(),
            ContractArgument::ContractReference(contract_name) => {
                format!("contract:{}", contract_name)
            }
        }
    }
}

/// Static head encoding: one 32 bytes word per argument, appended to the
/// deployment bytecode.
pub fn encode_constructor_args(args: &[ArgumentValue]) -> Vec<u8> {
    let mut encoded = Vec::with_capacity(args.len() * 32);
    for arg in args.iter() {
        let mut word = [0u8; 32];
        match arg {
            ArgumentValue::Address(address) => {
                word = address.abi_word();
            }
            ArgumentValue::Uint(value) => {
                word[16..].copy_from_slice(&value.to_be_bytes());
            }
            ArgumentValue::Bool(value) => {
                word[31] = *value as u8;
            }
        }
        encoded.extend_from_slice(&word);
    }
    encoded
}

/// A confirmed deployment: the contract's immutable on-chain address and
/// the transaction that created it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployedContract {
    pub contract_name: String,
    pub address: Address,
    pub tx_hash: String,
}

#[derive(Debug, PartialEq, Clone)]
pub struct TransactionPlanSpecification {
    pub batches: Vec<TransactionsBatchSpecification>,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TransactionPlanSpecificationFile {
    pub batches: Vec<TransactionsBatchSpecificationFile>,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TransactionsBatchSpecificationFile {
    pub id: usize,
    pub transactions: Vec<TransactionSpecificationFile>,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransactionSpecificationFile {
    ContractDeploy(ContractDeploySpecificationFile),
    EvmTransfer(EvmTransferSpecificationFile),
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ContractDeploySpecificationFile {
    pub contract_name: String,
    pub expected_sender: String,
    pub constructor_args: Vec<String>,
    pub gas_limit: u64,
    #[serde(flatten)]
    pub location: Option<FileLocation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EvmTransferSpecificationFile {
    pub expected_sender: String,
    pub recipient: String,
    pub wei_amount: u128,
}

#[derive(Debug, PartialEq, Clone)]
pub struct TransactionsBatchSpecification {
    pub id: usize,
    pub transactions: Vec<TransactionSpecification>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum TransactionSpecification {
    ContractDeploy(ContractDeploySpecification),
    EvmTransfer(EvmTransferSpecification),
}

#[derive(Debug, PartialEq, Clone)]
pub struct ContractDeploySpecification {
    pub contract_name: String,
    pub expected_sender: Address,
    pub location: FileLocation,
    pub artifact: ContractArtifact,
    pub constructor_args: Vec<ContractArgument>,
    pub gas_limit: u64,
}

pub(crate) fn check_contract_name(contract_name: &str) -> Result<(), String> {
    let mut chars = contract_name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(format!(
            "unable to use '{}' as a contract name",
            contract_name
        ))
    }
}

impl ContractDeploySpecification {
    pub fn from_specifications(
        specs: &ContractDeploySpecificationFile,
        project_root_location: &FileLocation,
    ) -> Result<ContractDeploySpecification, String> {
        check_contract_name(&specs.contract_name)?;

        let expected_sender = Address::from_hex(&specs.expected_sender).map_err(|_| {
            format!(
                "unable to parse expected sender '{}' as an address",
                specs.expected_sender
            )
        })?;

        let location = match (&specs.path, &specs.url) {
            (Some(location_string), None) | (None, Some(location_string)) => {
                FileLocation::try_parse(location_string, Some(project_root_location))
            }
            _ => None,
        }
        .ok_or("unable to parse file location (can either be 'path' or 'url')".to_string())?;

        let artifact = ContractArtifact::from_location(&location)?;

        let mut constructor_args = vec![];
        for arg in specs.constructor_args.iter() {
            constructor_args.push(ContractArgument::parse(arg).map_err(|e| {
                format!("invalid constructor argument for '{}': {}", specs.contract_name, e)
            })?);
        }

        Ok(ContractDeploySpecification {
            contract_name: specs.contract_name.clone(),
            expected_sender,
            location,
            artifact,
            constructor_args,
            gas_limit: specs.gas_limit,
        })
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct EvmTransferSpecification {
    pub expected_sender: Address,
    pub recipient: Address,
    pub wei_amount: u128,
}

impl EvmTransferSpecification {
    pub fn from_specifications(
        specs: &EvmTransferSpecificationFile,
    ) -> Result<EvmTransferSpecification, String> {
        let expected_sender = Address::from_hex(&specs.expected_sender).map_err(|_| {
            format!(
                "unable to parse expected sender '{}' as an address",
                specs.expected_sender
            )
        })?;
        let recipient = Address::from_hex(&specs.recipient).map_err(|_| {
            format!("unable to parse recipient '{}' as an address", specs.recipient)
        })?;

        Ok(EvmTransferSpecification {
            expected_sender,
            recipient,
            wei_amount: specs.wei_amount,
        })
    }
}

#[derive(Debug, Clone)]
pub struct DeploymentSpecification {
    pub id: u32,
    pub name: String,
    pub network: EvmNetwork,
    pub evm_node: Option<String>,
    pub plan: TransactionPlanSpecification,
    // Keep a cache of the artifact location backing each contract
    pub contracts: BTreeMap<String, FileLocation>,
}

impl DeploymentSpecification {
    pub fn from_config_file(
        deployment_location: &FileLocation,
        project_root_location: &FileLocation,
    ) -> Result<DeploymentSpecification, String> {
        let spec_file_content = deployment_location.read_content()?;

        let specification_file: DeploymentSpecificationFile =
            match serde_yaml::from_slice(&spec_file_content[..]) {
                Ok(res) => res,
                Err(msg) => return Err(format!("unable to read file {}", msg)),
            };

        let network = match specification_file.network.to_lowercase().as_str() {
            "devnet" => EvmNetwork::Devnet,
            "testnet" => EvmNetwork::Testnet,
            "mainnet" => EvmNetwork::Mainnet,
            _ => {
                return Err(format!(
                    "network '{}' not supported (devnet, testnet, mainnet)",
                    specification_file.network
                ));
            }
        };

        let deployment_spec = DeploymentSpecification::from_specifications(
            &specification_file,
            &network,
            project_root_location,
        )?;

        Ok(deployment_spec)
    }

    pub fn from_specifications(
        specs: &DeploymentSpecificationFile,
        network: &EvmNetwork,
        project_root_location: &FileLocation,
    ) -> Result<DeploymentSpecification, String> {
        let mut contracts = BTreeMap::new();
        let mut batches = vec![];
        if let Some(ref plan) = specs.plan {
            for batch in plan.batches.iter() {
                let mut transactions = vec![];
                for tx in batch.transactions.iter() {
                    let transaction = match tx {
                        TransactionSpecificationFile::ContractDeploy(spec) => {
                            let spec = ContractDeploySpecification::from_specifications(
                                spec,
                                project_root_location,
                            )?;
                            contracts
                                .insert(spec.contract_name.clone(), spec.location.clone());
                            TransactionSpecification::ContractDeploy(spec)
                        }
                        TransactionSpecificationFile::EvmTransfer(spec) => {
                            TransactionSpecification::EvmTransfer(
                                EvmTransferSpecification::from_specifications(spec)?,
                            )
                        }
                    };
                    transactions.push(transaction);
                }
                batches.push(TransactionsBatchSpecification {
                    id: batch.id,
                    transactions,
                });
            }
        }

        Ok(DeploymentSpecification {
            id: specs.id.unwrap_or(0),
            name: specs.name.to_string(),
            network: *network,
            evm_node: specs.evm_node.clone(),
            plan: TransactionPlanSpecification { batches },
            contracts,
        })
    }

    pub fn to_specification_file(&self) -> DeploymentSpecificationFile {
        DeploymentSpecificationFile {
            id: Some(self.id),
            name: self.name.clone(),
            network: self.network.label().to_string(),
            evm_node: self.evm_node.clone(),
            plan: Some(self.plan.to_specification_file()),
        }
    }

    pub fn to_file_content(&self) -> Result<Vec<u8>, String> {
        let file = self.to_specification_file();
        let content = serde_yaml::to_string(&file)
            .map_err(|e| format!("unable to serialize deployment {}", e))?;
        Ok(content.into_bytes())
    }
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DeploymentSpecificationFile {
    pub id: Option<u32>,
    pub name: String,
    pub network: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evm_node: Option<String>,
    pub plan: Option<TransactionPlanSpecificationFile>,
}

impl TransactionPlanSpecification {
    pub fn to_specification_file(&self) -> TransactionPlanSpecificationFile {
        let mut batches = vec![];
        for batch in self.batches.iter() {
            let mut transactions = vec![];
            for tx in batch.transactions.iter() {
                let tx = match tx {
                    TransactionSpecification::ContractDeploy(tx) => {
                        TransactionSpecificationFile::ContractDeploy(
                            ContractDeploySpecificationFile {
                                contract_name: tx.contract_name.clone(),
                                expected_sender: tx.expected_sender.to_string(),
                                constructor_args: tx
                                    .constructor_args
                                    .iter()
                                    .map(|arg| arg.to_raw_string())
                                    .collect(),
                                gas_limit: tx.gas_limit,
                                location: Some(tx.location.clone()),
                                path: None,
                                url: None,
                            },
                        )
                    }
                    TransactionSpecification::EvmTransfer(tx) => {
                        TransactionSpecificationFile::EvmTransfer(EvmTransferSpecificationFile {
                            expected_sender: tx.expected_sender.to_string(),
                            recipient: tx.recipient.to_string(),
                            wei_amount: tx.wei_amount,
                        })
                    }
                };
                transactions.push(tx);
            }
            batches.push(TransactionsBatchSpecificationFile {
                id: batch.id,
                transactions,
            });
        }

        TransactionPlanSpecificationFile { batches }
    }
}
