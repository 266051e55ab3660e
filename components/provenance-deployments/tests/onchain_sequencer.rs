use std::cell::RefCell;
use std::collections::BTreeMap;
use std::sync::mpsc::channel;

use evm_rpc_client::{Address, RpcError, TransactionReceipt, TransactionRequest};
use provenance_deployments::artifacts::ContractArtifact;
use provenance_deployments::onchain::{
    apply_on_chain_deployment, DeploymentBackend, DeploymentCommand, DeploymentEvent,
    TransactionStatus,
};
use provenance_deployments::types::*;
use provenance_files::{EvmNetwork, FileLocation, NetworkConfig, NetworkManifest};
use provenance_system_kit::Context;
use serde_json::json;

const DEPLOYER: &str = "0x90f79bf6eb2c4f870365e785982e1f101e93b906";
const FAUCET: &str = "0x15d34aaf54267db7d7c367839aaf71a00a2c6a65";
const STATE_VERIFICATION_ADDRESS: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa1";
const PRODUCT_PROVENANCE_ADDRESS: &str = "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb2";

fn addr(hex_str: &str) -> Address {
    Address::from_hex(hex_str).unwrap()
}

#[derive(Debug, Clone, PartialEq)]
enum BackendCall {
    GetClientVersion,
    GetChainId,
    GetBlockNumber,
    GetTransactionCount(Address),
    SendTransaction(TransactionRequest),
    GetTransactionReceipt(String),
}

enum TransactionOutcome {
    ConfirmContract(&'static str),
    ConfirmContractAfter(usize, &'static str),
    ConfirmTransfer,
    RejectSubmission,
    NeverConfirm,
    Revert,
}

struct MockBackend {
    outcomes: Vec<TransactionOutcome>,
    calls: RefCell<Vec<BackendCall>>,
    block_number: RefCell<u64>,
    broadcasted: RefCell<Vec<String>>,
    receipt_polls: RefCell<BTreeMap<String, usize>>,
}

impl MockBackend {
    fn new(outcomes: Vec<TransactionOutcome>) -> MockBackend {
        MockBackend {
            outcomes,
            calls: RefCell::new(vec![]),
            block_number: RefCell::new(0),
            broadcasted: RefCell::new(vec![]),
            receipt_polls: RefCell::new(BTreeMap::new()),
        }
    }

    fn record(&self, call: BackendCall) {
        self.calls.borrow_mut().push(call);
    }

    fn submissions(&self) -> Vec<TransactionRequest> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| match call {
                BackendCall::SendTransaction(request) => Some(request.clone()),
                _ => None,
            })
            .collect()
    }

    fn receipt(&self, transaction_hash: &str, status: &str, contract_address: Option<Address>) -> TransactionReceipt {
        TransactionReceipt {
            transaction_hash: transaction_hash.to_string(),
            block_number: "0x2".to_string(),
            contract_address,
            gas_used: Some("0x5208".to_string()),
            status: status.to_string(),
        }
    }
}

impl DeploymentBackend for MockBackend {
    fn get_client_version(&self) -> Result<String, RpcError> {
        self.record(BackendCall::GetClientVersion);
        Ok("TestNode/v0.0.0".to_string())
    }

    fn get_chain_id(&self) -> Result<u64, RpcError> {
        self.record(BackendCall::GetChainId);
        Ok(31337)
    }

    fn get_block_number(&self) -> Result<u64, RpcError> {
        self.record(BackendCall::GetBlockNumber);
        let mut block_number = self.block_number.borrow_mut();
        *block_number += 1;
        Ok(*block_number)
    }

    fn get_transaction_count(&self, address: &Address) -> Result<u64, RpcError> {
        self.record(BackendCall::GetTransactionCount(*address));
        Ok(7)
    }

    fn send_transaction(&self, transaction: &TransactionRequest) -> Result<String, RpcError> {
        self.record(BackendCall::SendTransaction(transaction.clone()));
        let index = self.broadcasted.borrow().len();
        match self.outcomes[index] {
            TransactionOutcome::RejectSubmission => {
                Err(RpcError::Node("nonce too low (code -32000)".to_string()))
            }
            _ => {
                let transaction_hash = format!("0x{:064x}", index + 1);
                self.broadcasted.borrow_mut().push(transaction_hash.clone());
                Ok(transaction_hash)
            }
        }
    }

    fn get_transaction_receipt(
        &self,
        transaction_hash: &str,
    ) -> Result<Option<TransactionReceipt>, RpcError> {
        self.record(BackendCall::GetTransactionReceipt(
            transaction_hash.to_string(),
        ));
        let index = self
            .broadcasted
            .borrow()
            .iter()
            .position(|hash| hash == transaction_hash)
            .unwrap();
        let polls = {
            let mut receipt_polls = self.receipt_polls.borrow_mut();
            let polls = receipt_polls.entry(transaction_hash.to_string()).or_insert(0);
            *polls += 1;
            *polls
        };
        let receipt = match &self.outcomes[index] {
            TransactionOutcome::ConfirmContract(contract_address) => {
                self.receipt(transaction_hash, "0x1", Some(addr(contract_address)))
            }
            TransactionOutcome::ConfirmContractAfter(min_polls, contract_address) => {
                if polls < *min_polls {
                    return Ok(None);
                }
                self.receipt(transaction_hash, "0x1", Some(addr(contract_address)))
            }
            TransactionOutcome::ConfirmTransfer => self.receipt(transaction_hash, "0x1", None),
            TransactionOutcome::Revert => self.receipt(transaction_hash, "0x0", None),
            TransactionOutcome::NeverConfirm => return Ok(None),
            TransactionOutcome::RejectSubmission => unreachable!(),
        };
        Ok(Some(receipt))
    }
}

fn network_manifest(check_interval_secs: u64, confirmation_timeout_secs: u64) -> NetworkManifest {
    NetworkManifest {
        network: NetworkConfig {
            name: "devnet".to_string(),
            rpc_url: "http://localhost:8545".to_string(),
            expected_chain_id: None,
            deployer_address: Some(addr(DEPLOYER)),
            gas_price_in_wei: Some(1_000_000_000),
            deployment_gas_limit: 3_000_000,
            confirmation_timeout_secs,
            check_interval_secs,
        },
        accounts: BTreeMap::new(),
    }
}

fn build_test_deployment_plan(
    batches: Vec<TransactionsBatchSpecification>,
) -> DeploymentSpecification {
    DeploymentSpecification {
        id: 1,
        name: "test deployment".to_string(),
        network: EvmNetwork::Devnet,
        evm_node: Some("http://localhost:8545".to_string()),
        plan: TransactionPlanSpecification { batches },
        contracts: BTreeMap::new(),
    }
}

fn contract_deploy(
    contract_name: &str,
    bytecode: Vec<u8>,
    constructor_args: Vec<ContractArgument>,
) -> TransactionSpecification {
    TransactionSpecification::ContractDeploy(ContractDeploySpecification {
        contract_name: contract_name.to_string(),
        expected_sender: addr(DEPLOYER),
        location: FileLocation::from_path_string(&format!(
            "/tmp/project/build/contracts/{}.json",
            contract_name
        ))
        .unwrap(),
        artifact: ContractArtifact {
            contract_name: contract_name.to_string(),
            bytecode,
            abi: json!([]),
        },
        constructor_args,
        gas_limit: 3_000_000,
    })
}

fn state_verification_deploy() -> TransactionSpecification {
    contract_deploy("StateVerification", vec![0x60, 0x01], vec![])
}

fn product_provenance_deploy() -> TransactionSpecification {
    contract_deploy(
        "ProductProvenance",
        vec![0x60, 0x02],
        vec![ContractArgument::ContractReference(
            "StateVerification".to_string(),
        )],
    )
}

fn run(
    deployment: &DeploymentSpecification,
    backend: &MockBackend,
    network_manifest: &NetworkManifest,
) -> (
    Result<Vec<DeployedContract>, DeploymentError>,
    Vec<DeploymentEvent>,
) {
    let (event_tx, event_rx) = channel();
    let (command_tx, command_rx) = channel();
    command_tx.send(DeploymentCommand::Start).unwrap();
    let result = apply_on_chain_deployment(
        network_manifest,
        deployment,
        backend,
        event_tx,
        command_rx,
        &Context::empty(),
    );
    (result, event_rx.try_iter().collect())
}

#[test]
fn deploys_contracts_and_reports_addresses_in_order() {
    let deployment = build_test_deployment_plan(vec![
        TransactionsBatchSpecification {
            id: 0,
            transactions: vec![state_verification_deploy()],
        },
        TransactionsBatchSpecification {
            id: 1,
            transactions: vec![product_provenance_deploy()],
        },
    ]);
    let backend = MockBackend::new(vec![
        TransactionOutcome::ConfirmContract(STATE_VERIFICATION_ADDRESS),
        TransactionOutcome::ConfirmContract(PRODUCT_PROVENANCE_ADDRESS),
    ]);

    let (result, events) = run(&deployment, &backend, &network_manifest(0, 600));
    let deployed = result.unwrap();

    assert_eq!(deployed.len(), 2);
    assert_eq!(deployed[0].contract_name, "StateVerification");
    assert_eq!(deployed[0].address, addr(STATE_VERIFICATION_ADDRESS));
    assert_eq!(deployed[1].contract_name, "ProductProvenance");
    assert_eq!(deployed[1].address, addr(PRODUCT_PROVENANCE_ADDRESS));

    let submissions = backend.submissions();
    assert_eq!(submissions.len(), 2);

    // The first deployment carries its bytecode untouched, the second
    // appends the freshly recorded address as its constructor word.
    assert_eq!(submissions[0].data.as_deref(), Some("0x6001"));
    let second_data = submissions[1].data.as_deref().unwrap();
    assert!(second_data.starts_with("0x6002"));
    assert!(second_data.ends_with(&hex::encode(addr(STATE_VERIFICATION_ADDRESS).abi_word())));

    // One nonce fetch for the sender, then the cache takes over.
    let nonce_fetches = backend
        .calls
        .borrow()
        .iter()
        .filter(|call| matches!(call, BackendCall::GetTransactionCount(_)))
        .count();
    assert_eq!(nonce_fetches, 1);
    assert_eq!(submissions[0].nonce.as_deref(), Some("0x7"));
    assert_eq!(submissions[1].nonce.as_deref(), Some("0x8"));

    match events.last() {
        Some(DeploymentEvent::DeploymentCompleted(contracts)) => assert_eq!(contracts, &deployed),
        other => panic!("expected a completion event, got {:?}", other),
    }
}

#[test]
fn waits_for_confirmation_before_submitting_the_next_transaction() {
    // Both transactions in a single batch: sequencing does not rely on
    // batch boundaries.
    let deployment = build_test_deployment_plan(vec![TransactionsBatchSpecification {
        id: 0,
        transactions: vec![state_verification_deploy(), product_provenance_deploy()],
    }]);
    let backend = MockBackend::new(vec![
        TransactionOutcome::ConfirmContract(STATE_VERIFICATION_ADDRESS),
        TransactionOutcome::ConfirmContract(PRODUCT_PROVENANCE_ADDRESS),
    ]);

    let (result, _) = run(&deployment, &backend, &network_manifest(0, 600));
    assert!(result.is_ok());

    let calls = backend.calls.borrow();
    let first_receipt_position = calls
        .iter()
        .position(|call| matches!(call, BackendCall::GetTransactionReceipt(_)))
        .unwrap();
    let second_submission_position = calls
        .iter()
        .rposition(|call| matches!(call, BackendCall::SendTransaction(_)))
        .unwrap();
    assert!(first_receipt_position < second_submission_position);
}

#[test]
fn interrupts_on_rejected_submission_without_submitting_the_rest() {
    let deployment = build_test_deployment_plan(vec![
        TransactionsBatchSpecification {
            id: 0,
            transactions: vec![state_verification_deploy()],
        },
        TransactionsBatchSpecification {
            id: 1,
            transactions: vec![product_provenance_deploy()],
        },
    ]);
    let backend = MockBackend::new(vec![TransactionOutcome::RejectSubmission]);

    let (result, events) = run(&deployment, &backend, &network_manifest(0, 600));

    match result {
        Err(DeploymentError::Failure(message)) => {
            assert!(message.contains("unable to submit transaction"));
        }
        other => panic!("expected a failure, got {:?}", other),
    }

    // The rejected submission is the only one.
    let submissions = backend.submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].data.as_deref(), Some("0x6001"));

    assert!(events
        .iter()
        .any(|event| matches!(event, DeploymentEvent::Interrupted(_))));
    assert!(!events
        .iter()
        .any(|event| matches!(event, DeploymentEvent::DeploymentCompleted(_))));
}

#[test]
fn keeps_confirmed_contracts_untouched_when_a_later_step_reverts() {
    let deployment = build_test_deployment_plan(vec![
        TransactionsBatchSpecification {
            id: 0,
            transactions: vec![state_verification_deploy()],
        },
        TransactionsBatchSpecification {
            id: 1,
            transactions: vec![product_provenance_deploy()],
        },
    ]);
    let backend = MockBackend::new(vec![
        TransactionOutcome::ConfirmContract(STATE_VERIFICATION_ADDRESS),
        TransactionOutcome::Revert,
    ]);

    let (result, events) = run(&deployment, &backend, &network_manifest(0, 600));

    match result {
        Err(DeploymentError::Failure(message)) => assert!(message.contains("reverted")),
        other => panic!("expected a failure, got {:?}", other),
    }

    // Nothing is sent after the reverted receipt: no undo of the first
    // deployment, no further submission.
    let calls = backend.calls.borrow();
    assert!(matches!(
        calls.last(),
        Some(BackendCall::GetTransactionReceipt(_))
    ));
    assert_eq!(backend.submissions().len(), 2);

    let mut first_confirmed = false;
    let mut second_errored = false;
    for event in events.iter() {
        if let DeploymentEvent::TransactionUpdate(tracker) = event {
            match (&tracker.status, tracker.index) {
                (TransactionStatus::Confirmed(_), 0) => first_confirmed = true,
                (TransactionStatus::Error(_), 1) => second_errored = true,
                _ => {}
            }
        }
    }
    assert!(first_confirmed);
    assert!(second_errored);
}

#[test]
fn rejects_misconfigured_plan_before_any_network_call() {
    // The reference points at a contract deployed later in the plan.
    let deployment = build_test_deployment_plan(vec![
        TransactionsBatchSpecification {
            id: 0,
            transactions: vec![product_provenance_deploy()],
        },
        TransactionsBatchSpecification {
            id: 1,
            transactions: vec![state_verification_deploy()],
        },
    ]);
    let backend = MockBackend::new(vec![]);

    let (result, events) = run(&deployment, &backend, &network_manifest(0, 600));

    match result {
        Err(DeploymentError::DependencyUnresolved(message)) => {
            assert!(message.contains("ProductProvenance"));
            assert!(message.contains("StateVerification"));
        }
        other => panic!("expected an unresolved dependency, got {:?}", other),
    }
    assert!(backend.calls.borrow().is_empty());

    match events.as_slice() {
        [DeploymentEvent::Interrupted(message)] => {
            assert!(message.starts_with("dependency unresolved:"));
        }
        other => panic!("expected a single interruption event, got {:?}", other),
    }
}

#[test]
fn fails_when_confirmation_times_out() {
    let deployment = build_test_deployment_plan(vec![TransactionsBatchSpecification {
        id: 0,
        transactions: vec![state_verification_deploy()],
    }]);
    let backend = MockBackend::new(vec![TransactionOutcome::NeverConfirm]);

    let (result, events) = run(&deployment, &backend, &network_manifest(0, 0));

    match result {
        Err(DeploymentError::Failure(message)) => assert!(message.contains("not confirmed")),
        other => panic!("expected a failure, got {:?}", other),
    }
    assert_eq!(backend.submissions().len(), 1);
    assert!(events
        .iter()
        .any(|event| matches!(event, DeploymentEvent::Interrupted(_))));
}

#[test]
fn polls_until_the_receipt_is_available() {
    let deployment = build_test_deployment_plan(vec![TransactionsBatchSpecification {
        id: 0,
        transactions: vec![state_verification_deploy()],
    }]);
    let backend = MockBackend::new(vec![TransactionOutcome::ConfirmContractAfter(
        3,
        STATE_VERIFICATION_ADDRESS,
    )]);

    let (result, _) = run(&deployment, &backend, &network_manifest(0, 600));
    let deployed = result.unwrap();

    assert_eq!(deployed.len(), 1);
    assert_eq!(deployed[0].address, addr(STATE_VERIFICATION_ADDRESS));
    let receipt_polls = backend
        .calls
        .borrow()
        .iter()
        .filter(|call| matches!(call, BackendCall::GetTransactionReceipt(_)))
        .count();
    assert_eq!(receipt_polls, 3);
}

#[test]
fn executes_transfers_before_contract_deployments() {
    let deployment = build_test_deployment_plan(vec![
        TransactionsBatchSpecification {
            id: 0,
            transactions: vec![TransactionSpecification::EvmTransfer(
                EvmTransferSpecification {
                    expected_sender: addr(FAUCET),
                    recipient: addr(DEPLOYER),
                    wei_amount: 1_000_000_000_000_000_000,
                },
            )],
        },
        TransactionsBatchSpecification {
            id: 1,
            transactions: vec![state_verification_deploy()],
        },
    ]);
    let backend = MockBackend::new(vec![
        TransactionOutcome::ConfirmTransfer,
        TransactionOutcome::ConfirmContract(STATE_VERIFICATION_ADDRESS),
    ]);

    let (result, _) = run(&deployment, &backend, &network_manifest(0, 600));
    let deployed = result.unwrap();

    // Transfers do not show up in the deployed contracts.
    assert_eq!(deployed.len(), 1);
    assert_eq!(deployed[0].contract_name, "StateVerification");

    let submissions = backend.submissions();
    assert_eq!(submissions.len(), 2);
    assert_eq!(submissions[0].from, addr(FAUCET));
    assert_eq!(submissions[0].to, Some(addr(DEPLOYER)));
    assert!(submissions[0].value.is_some());
    assert_eq!(submissions[1].to, None);

    // Each sender gets its own nonce fetch.
    let nonce_fetches = backend
        .calls
        .borrow()
        .iter()
        .filter(|call| matches!(call, BackendCall::GetTransactionCount(_)))
        .count();
    assert_eq!(nonce_fetches, 2);
}
