use std::collections::BTreeMap;
use std::sync::mpsc::{Receiver, Sender};
use std::time::{Duration, Instant};

use evm_rpc_client::{Address, EvmRpc, RpcError, TransactionReceipt, TransactionRequest};
use provenance_files::NetworkManifest;
use provenance_system_kit::slog;
use provenance_system_kit::Context;

use crate::check_plan_references;
use crate::types::{
    encode_constructor_args, ArgumentValue, ContractArgument, DeployedContract, DeploymentError,
    DeploymentSpecification, TransactionSpecification,
};

/// Node operations the sequencer relies on. `EvmRpc` is the production
/// implementation, tests substitute their own.
pub trait DeploymentBackend {
    fn get_client_version(&self) -> Result<String, RpcError>;
    fn get_chain_id(&self) -> Result<u64, RpcError>;
    fn get_block_number(&self) -> Result<u64, RpcError>;
    fn get_transaction_count(&self, address: &Address) -> Result<u64, RpcError>;
    fn send_transaction(&self, transaction: &TransactionRequest) -> Result<String, RpcError>;
    fn get_transaction_receipt(
        &self,
        transaction_hash: &str,
    ) -> Result<Option<TransactionReceipt>, RpcError>;
}

impl DeploymentBackend for EvmRpc {
    fn get_client_version(&self) -> Result<String, RpcError> {
        EvmRpc::get_client_version(self)
    }

    fn get_chain_id(&self) -> Result<u64, RpcError> {
        EvmRpc::get_chain_id(self)
    }

    fn get_block_number(&self) -> Result<u64, RpcError> {
        EvmRpc::get_block_number(self)
    }

    fn get_transaction_count(&self, address: &Address) -> Result<u64, RpcError> {
        EvmRpc::get_transaction_count(self, address)
    }

    fn send_transaction(&self, transaction: &TransactionRequest) -> Result<String, RpcError> {
        EvmRpc::send_transaction(self, transaction)
    }

    fn get_transaction_receipt(
        &self,
        transaction_hash: &str,
    ) -> Result<Option<TransactionReceipt>, RpcError> {
        EvmRpc::get_transaction_receipt(self, transaction_hash)
    }
}

#[derive(Clone, Debug)]
pub enum TransactionStatus {
    Queued,
    Prepared,
    Broadcasted(String),
    Confirmed(TransactionReceipt),
    Error(String),
}

#[derive(Clone, Debug)]
pub struct TransactionTracker {
    pub index: usize,
    pub name: String,
    pub status: TransactionStatus,
}

#[derive(Clone, Debug)]
pub enum DeploymentEvent {
    TransactionUpdate(TransactionTracker),
    Interrupted(String),
    DeploymentCompleted(Vec<DeployedContract>),
}

pub enum DeploymentCommand {
    Start,
}

enum PreparedTransactionKind {
    ContractDeploy {
        contract_name: String,
        bytecode: Vec<u8>,
        constructor_args: Vec<ContractArgument>,
        gas_limit: u64,
    },
    Transfer {
        recipient: Address,
        wei_amount: u128,
    },
}

struct PreparedTransaction {
    tracker: TransactionTracker,
    expected_sender: Address,
    nonce: u64,
    kind: PreparedTransactionKind,
}

/// Submits the transactions of the plan one at a time: a transaction is
/// broadcasted only once the previous one is confirmed, so a contract
/// reference always resolves to an address recorded earlier in the run.
/// The first rejection, revert or confirmation timeout interrupts the
/// run. Transactions already confirmed at that point are left untouched.
pub fn apply_on_chain_deployment(
    network_manifest: &NetworkManifest,
    deployment: &DeploymentSpecification,
    backend: &dyn DeploymentBackend,
    deployment_event_tx: Sender<DeploymentEvent>,
    deployment_command_rx: Receiver<DeploymentCommand>,
    ctx: &Context,
) -> Result<Vec<DeployedContract>, DeploymentError> {
    // A plan whose references cannot resolve must fail before anything
    // reaches the node.
    if let Err(e) = check_plan_references(deployment) {
        let _ = deployment_event_tx.send(DeploymentEvent::Interrupted(e.to_string()));
        return Err(e);
    }

    let delay_between_checks = network_manifest.network.check_interval_secs;
    let confirmation_timeout =
        Duration::from_secs(network_manifest.network.confirmation_timeout_secs);
    let gas_price = network_manifest.network.gas_price_in_wei;

    match backend.get_client_version() {
        Ok(client_version) => {
            ctx.try_log(|logger| slog::info!(logger, "connected to node {}", client_version));
        }
        Err(e) => {
            let message = format!("unable to reach the node: {}", e);
            let _ = deployment_event_tx.send(DeploymentEvent::Interrupted(message.clone()));
            return Err(DeploymentError::Failure(message));
        }
    }

    if let Some(expected_chain_id) = network_manifest.network.expected_chain_id {
        match backend.get_chain_id() {
            Ok(chain_id) if chain_id == expected_chain_id => {}
            Ok(chain_id) => {
                let message = format!(
                    "chain id mismatch: node reports {}, settings/{:?}.toml expects {}",
                    chain_id, deployment.network, expected_chain_id
                );
                let _ = deployment_event_tx.send(DeploymentEvent::Interrupted(message.clone()));
                return Err(DeploymentError::Failure(message));
            }
            Err(e) => {
                let message = format!("unable to retrieve the chain id: {}", e);
                let _ = deployment_event_tx.send(DeploymentEvent::Interrupted(message.clone()));
                return Err(DeploymentError::Failure(message));
            }
        }
    }

    // Phase 1: walk the plan in order and assign a nonce to every
    // transaction. Nothing is submitted yet.
    let mut accounts_cached_nonces: BTreeMap<Address, u64> = BTreeMap::new();
    let mut prepared_transactions = vec![];
    let mut index = 0;

    for batch_spec in deployment.plan.batches.iter() {
        for transaction in batch_spec.transactions.iter() {
            let (expected_sender, name, kind) = match transaction {
                TransactionSpecification::ContractDeploy(tx) => (
                    tx.expected_sender,
                    format!("Contract {}", tx.contract_name),
                    PreparedTransactionKind::ContractDeploy {
                        contract_name: tx.contract_name.clone(),
                        bytecode: tx.artifact.bytecode.clone(),
                        constructor_args: tx.constructor_args.clone(),
                        gas_limit: tx.gas_limit,
                    },
                ),
                TransactionSpecification::EvmTransfer(tx) => (
                    tx.expected_sender,
                    format!(
                        "Transfer {} wei from {} to {}",
                        tx.wei_amount, tx.expected_sender, tx.recipient
                    ),
                    PreparedTransactionKind::Transfer {
                        recipient: tx.recipient,
                        wei_amount: tx.wei_amount,
                    },
                ),
            };

            let nonce = match accounts_cached_nonces.get(&expected_sender) {
                Some(cached_nonce) => *cached_nonce,
                None => match backend.get_transaction_count(&expected_sender) {
                    Ok(nonce) => nonce,
                    Err(e) => {
                        let message =
                            format!("unable to retrieve nonce of {}: {}", expected_sender, e);
                        let _ =
                            deployment_event_tx.send(DeploymentEvent::Interrupted(message.clone()));
                        return Err(DeploymentError::Failure(message));
                    }
                },
            };
            accounts_cached_nonces.insert(expected_sender, nonce + 1);

            let tracker = TransactionTracker {
                index,
                name,
                status: TransactionStatus::Prepared,
            };
            let _ = deployment_event_tx.send(DeploymentEvent::TransactionUpdate(tracker.clone()));
            prepared_transactions.push(PreparedTransaction {
                tracker,
                expected_sender,
                nonce,
                kind,
            });
            index += 1;
        }
    }

    match deployment_command_rx.recv() {
        Ok(DeploymentCommand::Start) => {}
        Err(_) => {
            let message = "deployment aborted - broken channel".to_string();
            let _ = deployment_event_tx.send(DeploymentEvent::Interrupted(message.clone()));
            return Err(DeploymentError::Failure(message));
        }
    }

    // Phase 2: submission. The deployment data of a transaction is built
    // right before broadcasting it, once the addresses it references are
    // all known.
    let mut contract_addresses: BTreeMap<String, Address> = BTreeMap::new();
    let mut deployed_contracts = vec![];

    for prepared in prepared_transactions.into_iter() {
        let PreparedTransaction {
            mut tracker,
            expected_sender,
            nonce,
            kind,
        } = prepared;

        let (request, deployed_contract_name) = match kind {
            PreparedTransactionKind::ContractDeploy {
                contract_name,
                bytecode,
                constructor_args,
                gas_limit,
            } => {
                let mut values = vec![];
                for arg in constructor_args.iter() {
                    let value = match arg {
                        ContractArgument::Literal(value) => value.clone(),
                        ContractArgument::ContractReference(referenced_contract) => {
                            match contract_addresses.get(referenced_contract) {
                                Some(address) => ArgumentValue::Address(*address),
                                None => {
                                    let message = format!(
                                        "contract '{}' references '{}', which is not deployed by an earlier transaction of the plan",
                                        contract_name, referenced_contract
                                    );
                                    tracker.status = TransactionStatus::Error(message.clone());
                                    let _ = deployment_event_tx
                                        .send(DeploymentEvent::TransactionUpdate(tracker.clone()));
                                    let _ = deployment_event_tx
                                        .send(DeploymentEvent::Interrupted(message.clone()));
                                    return Err(DeploymentError::DependencyUnresolved(message));
                                }
                            }
                        }
                    };
                    values.push(value);
                }
                let mut data = bytecode;
                data.extend_from_slice(&encode_constructor_args(&values));
                (
                    TransactionRequest::contract_deployment(
                        expected_sender,
                        &data,
                        gas_limit,
                        gas_price,
                        nonce,
                    ),
                    Some(contract_name),
                )
            }
            PreparedTransactionKind::Transfer {
                recipient,
                wei_amount,
            } => (
                TransactionRequest::transfer(expected_sender, recipient, wei_amount, gas_price, nonce),
                None,
            ),
        };

        let transaction_hash = match backend.send_transaction(&request) {
            Ok(transaction_hash) => transaction_hash,
            Err(e) => {
                let message = format!("unable to submit transaction: {}", e);
                tracker.status = TransactionStatus::Error(message.clone());
                let _ =
                    deployment_event_tx.send(DeploymentEvent::TransactionUpdate(tracker.clone()));
                let _ = deployment_event_tx.send(DeploymentEvent::Interrupted(message.clone()));
                return Err(DeploymentError::Failure(message));
            }
        };
        tracker.status = TransactionStatus::Broadcasted(transaction_hash.clone());
        let _ = deployment_event_tx.send(DeploymentEvent::TransactionUpdate(tracker.clone()));
        ctx.try_log(|logger| {
            slog::info!(logger, "{} broadcasted ({})", tracker.name, transaction_hash)
        });

        let started_at = Instant::now();
        let mut last_checked_block = 0;
        let receipt = loop {
            if started_at.elapsed() > confirmation_timeout {
                let message = format!(
                    "transaction {} not confirmed after {}s",
                    transaction_hash, network_manifest.network.confirmation_timeout_secs
                );
                tracker.status = TransactionStatus::Error(message.clone());
                let _ =
                    deployment_event_tx.send(DeploymentEvent::TransactionUpdate(tracker.clone()));
                let _ = deployment_event_tx.send(DeploymentEvent::Interrupted(message.clone()));
                return Err(DeploymentError::Failure(message));
            }

            let block_number = match backend.get_block_number() {
                Ok(block_number) => block_number,
                Err(_) => {
                    std::thread::sleep(Duration::from_secs(delay_between_checks));
                    continue;
                }
            };

            // If no block has been mined since the last check, avoid
            // flooding the node with receipt requests.
            if block_number <= last_checked_block {
                std::thread::sleep(Duration::from_secs(delay_between_checks));
                continue;
            }
            last_checked_block = block_number;

            match backend.get_transaction_receipt(&transaction_hash) {
                Ok(Some(receipt)) => break receipt,
                Ok(None) | Err(_) => {
                    std::thread::sleep(Duration::from_secs(delay_between_checks));
                    continue;
                }
            }
        };

        if !receipt.is_success() {
            let message = format!("transaction {} reverted", transaction_hash);
            tracker.status = TransactionStatus::Error(message.clone());
            let _ = deployment_event_tx.send(DeploymentEvent::TransactionUpdate(tracker.clone()));
            let _ = deployment_event_tx.send(DeploymentEvent::Interrupted(message.clone()));
            return Err(DeploymentError::Failure(message));
        }

        if let Some(contract_name) = deployed_contract_name {
            let contract_address = match receipt.contract_address {
                Some(contract_address) => contract_address,
                None => {
                    let message = format!(
                        "transaction {} confirmed without a contract address",
                        transaction_hash
                    );
                    tracker.status = TransactionStatus::Error(message.clone());
                    let _ = deployment_event_tx
                        .send(DeploymentEvent::TransactionUpdate(tracker.clone()));
                    let _ = deployment_event_tx.send(DeploymentEvent::Interrupted(message.clone()));
                    return Err(DeploymentError::Failure(message));
                }
            };
            ctx.try_log(|logger| {
                slog::info!(
                    logger,
                    "contract {} deployed at {}",
                    contract_name,
                    contract_address
                )
            });
            contract_addresses.insert(contract_name.clone(), contract_address);
            deployed_contracts.push(DeployedContract {
                contract_name,
                address: contract_address,
                tx_hash: transaction_hash.clone(),
            });
        }

        tracker.status = TransactionStatus::Confirmed(receipt);
        let _ = deployment_event_tx.send(DeploymentEvent::TransactionUpdate(tracker.clone()));
    }

    let _ = deployment_event_tx.send(DeploymentEvent::DeploymentCompleted(
        deployed_contracts.clone(),
    ));
    Ok(deployed_contracts)
}

pub fn get_initial_transactions_trackers(
    deployment: &DeploymentSpecification,
) -> Vec<TransactionTracker> {
    let mut index = 0;
    let mut trackers = vec![];
    for batch_spec in deployment.plan.batches.iter() {
        for transaction in batch_spec.transactions.iter() {
            let tracker = match transaction {
                TransactionSpecification::ContractDeploy(tx) => TransactionTracker {
                    index,
                    name: format!("Contract {}", tx.contract_name),
                    status: TransactionStatus::Queued,
                },
                TransactionSpecification::EvmTransfer(tx) => TransactionTracker {
                    index,
                    name: format!(
                        "Transfer {} wei from {} to {}",
                        tx.wei_amount, tx.expected_sender, tx.recipient
                    ),
                    status: TransactionStatus::Queued,
                },
            };
            trackers.push(tracker);
            index += 1;
        }
    }
    trackers
}
