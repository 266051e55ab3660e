extern crate serde;

#[macro_use]
extern crate serde_derive;

pub mod artifacts;
pub mod onchain;
pub mod types;

use self::artifacts::ContractArtifact;
use self::types::{
    ContractArgument, ContractDeploySpecification, DeploymentError, DeploymentSpecification,
    TransactionPlanSpecification, TransactionSpecification, TransactionsBatchSpecification,
};
use provenance_files::{EvmNetwork, FileLocation, NetworkManifest, ProjectManifest};
use std::collections::{BTreeMap, BTreeSet};

/// Builds a deployment plan covering every contract listed in the project
/// manifest, ordered so that a contract is always submitted after the
/// contracts its constructor references.
pub fn generate_default_deployment(
    manifest: &ProjectManifest,
    network: &EvmNetwork,
) -> Result<DeploymentSpecification, String> {
    let network_manifest =
        NetworkManifest::from_project_manifest_location(&manifest.location, network)?;

    let default_deployer = match network_manifest.network.deployer_address {
        Some(address) => address,
        None => {
            return Err(format!(
                "deployer_address field required in settings/{:?}.toml",
                network
            ))
        }
    };

    let mut specs = BTreeMap::new();
    let mut dependencies: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut contracts_map = BTreeMap::new();

    for (name, contract_config) in manifest.contracts.iter() {
        types::check_contract_name(name)?;

        let expected_sender = match &contract_config.deployer {
            Some(label) => match network_manifest.accounts.get(label) {
                Some(account) => account.address,
                None => {
                    return Err(format!(
                        "unable to retrieve account '{}' in settings/{:?}.toml",
                        label, network
                    ))
                }
            },
            None => default_deployer,
        };

        let location = manifest.get_artifact_location(name)?;
        let artifact = ContractArtifact::from_location(&location)?;

        let mut constructor_args = vec![];
        let mut contract_dependencies = BTreeSet::new();
        for arg in contract_config.constructor_args.iter() {
            let arg = ContractArgument::parse(arg)
                .map_err(|e| format!("invalid constructor argument for '{}': {}", name, e))?;
            if let ContractArgument::ContractReference(ref referenced_contract) = arg {
                if !manifest.contracts.contains_key(referenced_contract) {
                    return Err(format!(
                        "constructor argument of '{}' references '{}', not present in {}",
                        name,
                        referenced_contract,
                        provenance_files::PROJECT_MANIFEST_NAME
                    ));
                }
                contract_dependencies.insert(referenced_contract.clone());
            }
            constructor_args.push(arg);
        }

        if let Some(expected) = artifact.expected_constructor_args() {
            if expected != constructor_args.len() {
                return Err(format!(
                    "contract '{}' expects {} constructor argument{}, {} provided",
                    name,
                    expected,
                    if expected == 1 { "" } else { "s" },
                    constructor_args.len()
                ));
            }
        }

        contracts_map.insert(name.clone(), location.clone());
        dependencies.insert(name.clone(), contract_dependencies);
        specs.insert(
            name.clone(),
            ContractDeploySpecification {
                contract_name: name.clone(),
                expected_sender,
                location,
                artifact,
                constructor_args,
                gas_limit: contract_config
                    .gas_limit
                    .unwrap_or(network_manifest.network.deployment_gas_limit),
            },
        );
    }

    // Order the contracts: each batch contains the contracts whose
    // dependencies were all scheduled in prior batches.
    let mut batches = vec![];
    let mut scheduled: BTreeSet<String> = BTreeSet::new();
    while !dependencies.is_empty() {
        let batch_members: Vec<String> = dependencies
            .iter()
            .filter(|(_, deps)| deps.iter().all(|dep| scheduled.contains(dep)))
            .map(|(name, _)| name.clone())
            .collect();
        if batch_members.is_empty() {
            return Err(format!(
                "dependency cycle detected between contracts: {}",
                dependencies
                    .keys()
                    .map(|k| k.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }
        let mut transactions = vec![];
        for name in batch_members.into_iter() {
            dependencies.remove(&name);
            let spec = match specs.remove(&name) {
                Some(spec) => spec,
                None => continue,
            };
            transactions.push(TransactionSpecification::ContractDeploy(spec));
            scheduled.insert(name);
        }
        batches.push(TransactionsBatchSpecification {
            id: batches.len(),
            transactions,
        });
    }

    Ok(DeploymentSpecification {
        id: 0,
        name: format!("{:?} deployment", network),
        network: *network,
        evm_node: Some(network_manifest.network.rpc_url.clone()),
        plan: TransactionPlanSpecification { batches },
        contracts: contracts_map,
    })
}

/// Walks the plan in submission order and verifies that every contract
/// reference points at a contract deployed by an earlier transaction.
/// Performed before anything is sent to the node, so a misconfigured plan
/// never triggers a submission.
pub fn check_plan_references(
    deployment: &DeploymentSpecification,
) -> Result<(), DeploymentError> {
    let mut deployed: BTreeSet<&str> = BTreeSet::new();
    for batch in deployment.plan.batches.iter() {
        for tx in batch.transactions.iter() {
            if let TransactionSpecification::ContractDeploy(tx) = tx {
                for arg in tx.constructor_args.iter() {
                    if let ContractArgument::ContractReference(ref referenced_contract) = arg {
                        if !deployed.contains(referenced_contract.as_str()) {
                            return Err(DeploymentError::DependencyUnresolved(format!(
                                "contract '{}' references '{}', which is not deployed by an earlier transaction of the plan",
                                tx.contract_name, referenced_contract
                            )));
                        }
                    }
                }
                deployed.insert(&tx.contract_name);
            }
        }
    }
    Ok(())
}

pub fn get_default_deployment_path(
    manifest: &ProjectManifest,
    network: &EvmNetwork,
) -> Result<FileLocation, String> {
    let mut deployment_path = manifest.location.get_project_root_location()?;
    deployment_path.append_path("deployments")?;
    deployment_path.append_path(match network {
        EvmNetwork::Devnet => "default.devnet-plan.yaml",
        EvmNetwork::Testnet => "default.testnet-plan.yaml",
        EvmNetwork::Mainnet => "default.mainnet-plan.yaml",
    })?;
    Ok(deployment_path)
}

pub fn load_deployment(
    manifest: &ProjectManifest,
    deployment_plan_location: &FileLocation,
) -> Result<DeploymentSpecification, String> {
    let project_root_location = manifest.location.get_project_root_location()?;
    let spec = match DeploymentSpecification::from_config_file(
        deployment_plan_location,
        &project_root_location,
    ) {
        Ok(spec) => spec,
        Err(msg) => {
            return Err(format!(
                "error: {} syntax incorrect\n{}",
                deployment_plan_location, msg
            ));
        }
    };
    Ok(spec)
}
