use evm_rpc_client::Address;
use provenance_deployments::artifacts::ContractArtifact;
use provenance_deployments::types::*;
use provenance_deployments::{
    check_plan_references, generate_default_deployment, get_default_deployment_path,
    load_deployment,
};
use provenance_files::{EvmNetwork, FileLocation, ProjectManifest};
use serde_json::json;

const DEPLOYER: &str = "0x90f79bf6eb2c4f870365e785982e1f101e93b906";

fn addr(hex_str: &str) -> Address {
    Address::from_hex(hex_str).unwrap()
}

fn fixtures_manifest_location() -> FileLocation {
    let mut location = FileLocation::from_path_string(env!("CARGO_MANIFEST_DIR")).unwrap();
    location.append_path("tests/fixtures/Provenance.toml").unwrap();
    location
}

fn contract_deploy(
    contract_name: &str,
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
            bytecode: vec![0x60, 0x80],
            abi: json!([]),
        },
        constructor_args,
        gas_limit: 3_000_000,
    })
}

fn build_test_deployment_plan(
    batches: Vec<TransactionsBatchSpecification>,
) -> DeploymentSpecification {
    DeploymentSpecification {
        id: 0,
        name: "test deployment".to_string(),
        network: EvmNetwork::Testnet,
        evm_node: None,
        plan: TransactionPlanSpecification { batches },
        contracts: std::collections::BTreeMap::new(),
    }
}

#[test]
fn generates_plan_with_contracts_in_dependency_order() {
    let manifest = ProjectManifest::from_location(&fixtures_manifest_location()).unwrap();
    let deployment = generate_default_deployment(&manifest, &EvmNetwork::Testnet).unwrap();

    assert_eq!(deployment.network, EvmNetwork::Testnet);
    assert_eq!(deployment.name, "Testnet deployment");
    assert_eq!(
        deployment.evm_node.as_deref(),
        Some("https://sepolia.example.org")
    );

    // StateVerification comes alphabetically after ProductProvenance, the
    // ordering below can only come from the dependency graph.
    assert_eq!(deployment.plan.batches.len(), 2);
    match &deployment.plan.batches[0].transactions[..] {
        [TransactionSpecification::ContractDeploy(tx)] => {
            assert_eq!(tx.contract_name, "StateVerification");
            assert_eq!(tx.expected_sender, addr(DEPLOYER));
            assert!(tx.constructor_args.is_empty());
            assert!(!tx.artifact.bytecode.is_empty());
            assert_eq!(tx.gas_limit, 3_000_000);
        }
        other => panic!("unexpected first batch: {:?}", other),
    }
    match &deployment.plan.batches[1].transactions[..] {
        [TransactionSpecification::ContractDeploy(tx)] => {
            assert_eq!(tx.contract_name, "ProductProvenance");
            assert_eq!(
                tx.constructor_args,
                vec![ContractArgument::ContractReference(
                    "StateVerification".to_string()
                )]
            );
        }
        other => panic!("unexpected second batch: {:?}", other),
    }

    assert!(check_plan_references(&deployment).is_ok());
}

#[test]
fn generated_plan_round_trips_through_yaml() {
    let manifest = ProjectManifest::from_location(&fixtures_manifest_location()).unwrap();
    let deployment = generate_default_deployment(&manifest, &EvmNetwork::Testnet).unwrap();

    let content = deployment.to_file_content().unwrap();
    let rendered = String::from_utf8(content.clone()).unwrap();
    assert!(rendered.contains("contract-deploy:"));
    assert!(rendered.contains("contract-name: StateVerification"));
    assert!(rendered.contains("path: build/contracts/StateVerification.json"));
    assert!(rendered.contains("contract:StateVerification"));

    let temp_dir = tempfile::tempdir().unwrap();
    let plan_location = FileLocation::from_path(temp_dir.path().join("default.testnet-plan.yaml"));
    plan_location.write_content(&content).unwrap();

    let reloaded = DeploymentSpecification::from_config_file(
        &plan_location,
        &manifest.get_project_root_location().unwrap(),
    )
    .unwrap();
    assert_eq!(reloaded.name, deployment.name);
    assert_eq!(reloaded.network, deployment.network);
    assert_eq!(reloaded.evm_node, deployment.evm_node);
    assert_eq!(reloaded.plan, deployment.plan);
}

#[test]
fn loads_plan_through_the_manifest_helper() {
    let manifest = ProjectManifest::from_location(&fixtures_manifest_location()).unwrap();
    let deployment = generate_default_deployment(&manifest, &EvmNetwork::Testnet).unwrap();

    let temp_dir = tempfile::tempdir().unwrap();
    let plan_location = FileLocation::from_path(temp_dir.path().join("custom-plan.yaml"));
    plan_location
        .write_content(&deployment.to_file_content().unwrap())
        .unwrap();

    let reloaded = load_deployment(&manifest, &plan_location).unwrap();
    assert_eq!(reloaded.plan, deployment.plan);

    let invalid_location = FileLocation::from_path(temp_dir.path().join("not-a-plan.yaml"));
    invalid_location.write_content(b"batches: 3").unwrap();
    let error = load_deployment(&manifest, &invalid_location).unwrap_err();
    assert!(error.contains("syntax incorrect"));
}

#[test]
fn generation_fails_without_deployer_address() {
    let manifest = ProjectManifest::from_location(&fixtures_manifest_location()).unwrap();
    let error = generate_default_deployment(&manifest, &EvmNetwork::Mainnet).unwrap_err();
    assert!(error.contains("deployer_address field required in settings/Mainnet.toml"));
}

#[test]
fn default_deployment_path_follows_the_network() {
    let manifest = ProjectManifest::from_location(&fixtures_manifest_location()).unwrap();
    let path = get_default_deployment_path(&manifest, &EvmNetwork::Testnet).unwrap();
    assert!(path
        .to_string()
        .ends_with("deployments/default.testnet-plan.yaml"));
}

#[test]
fn batches_order_independent_contracts_by_name() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();
    std::fs::create_dir_all(root.join("settings")).unwrap();
    std::fs::create_dir_all(root.join("build/contracts")).unwrap();
    std::fs::write(
        root.join("Provenance.toml"),
        r#"
[project]
name = "ordering"

[contracts.Zeta]
constructor_args = []

[contracts.Alpha]
constructor_args = []
"#,
    )
    .unwrap();
    std::fs::write(
        root.join("settings/Testnet.toml"),
        format!(
            "[network]\nname = \"testnet\"\nrpc_url = \"https://rpc.example.org\"\ndeployer_address = \"{}\"\n",
            DEPLOYER
        ),
    )
    .unwrap();
    for name in ["Alpha", "Zeta"] {
        std::fs::write(
            root.join(format!("build/contracts/{}.json", name)),
            format!(
                r#"{{"contractName": "{}", "abi": [], "bytecode": "0x6080"}}"#,
                name
            ),
        )
        .unwrap();
    }

    let manifest =
        ProjectManifest::from_location(&FileLocation::from_path(root.join("Provenance.toml")))
            .unwrap();
    let deployment = generate_default_deployment(&manifest, &EvmNetwork::Testnet).unwrap();

    // No dependency between the two: a single batch, members in name order.
    assert_eq!(deployment.plan.batches.len(), 1);
    let names: Vec<String> = deployment.plan.batches[0]
        .transactions
        .iter()
        .map(|tx| match tx {
            TransactionSpecification::ContractDeploy(tx) => tx.contract_name.clone(),
            other => panic!("unexpected transaction: {:?}", other),
        })
        .collect();
    assert_eq!(names, vec!["Alpha".to_string(), "Zeta".to_string()]);
}

#[test]
fn check_plan_references_accepts_references_to_earlier_transactions() {
    // Across batches.
    let deployment = build_test_deployment_plan(vec![
        TransactionsBatchSpecification {
            id: 0,
            transactions: vec![contract_deploy("StateVerification", vec![])],
        },
        TransactionsBatchSpecification {
            id: 1,
            transactions: vec![contract_deploy(
                "ProductProvenance",
                vec![ContractArgument::ContractReference(
                    "StateVerification".to_string(),
                )],
            )],
        },
    ]);
    assert!(check_plan_references(&deployment).is_ok());

    // Within a single batch, order still counts.
    let deployment = build_test_deployment_plan(vec![TransactionsBatchSpecification {
        id: 0,
        transactions: vec![
            contract_deploy("StateVerification", vec![]),
            contract_deploy(
                "ProductProvenance",
                vec![ContractArgument::ContractReference(
                    "StateVerification".to_string(),
                )],
            ),
        ],
    }]);
    assert!(check_plan_references(&deployment).is_ok());
}

#[test]
fn check_plan_references_rejects_forward_references() {
    let deployment = build_test_deployment_plan(vec![TransactionsBatchSpecification {
        id: 0,
        transactions: vec![
            contract_deploy(
                "ProductProvenance",
                vec![ContractArgument::ContractReference(
                    "StateVerification".to_string(),
                )],
            ),
            contract_deploy("StateVerification", vec![]),
        ],
    }]);
    match check_plan_references(&deployment) {
        Err(DeploymentError::DependencyUnresolved(message)) => {
            assert!(message.contains("ProductProvenance"));
            assert!(message.contains("StateVerification"));
        }
        other => panic!("expected an unresolved dependency, got {:?}", other),
    }
}

#[test]
fn check_plan_references_rejects_unknown_contracts() {
    let deployment = build_test_deployment_plan(vec![TransactionsBatchSpecification {
        id: 0,
        transactions: vec![
            contract_deploy("StateVerification", vec![]),
            contract_deploy(
                "ProductProvenance",
                vec![ContractArgument::ContractReference("Oracle".to_string())],
            ),
        ],
    }]);
    match check_plan_references(&deployment) {
        Err(DeploymentError::DependencyUnresolved(message)) => {
            assert!(message.contains("Oracle"));
        }
        other => panic!("expected an unresolved dependency, got {:?}", other),
    }
}
