use std::fmt::{Display, Formatter, Result};

use provenance_deployments::types::{DeploymentSpecification, TransactionSpecification};

const TRANSFER_GAS: u64 = 21_000;

pub struct DeploymentSynthesis {
    pub batches_count: u64,
    pub transactions_count: u64,
    pub total_gas_budget: u64,
    pub content: String,
}

impl DeploymentSynthesis {
    pub fn from_deployment(deployment: &DeploymentSpecification) -> DeploymentSynthesis {
        let mut batches_count = 0;
        let mut transactions_count = 0;
        let mut total_gas_budget = 0;
        for batch in deployment.plan.batches.iter() {
            batches_count += 1;
            for tx in batch.transactions.iter() {
                transactions_count += 1;
                match tx {
                    TransactionSpecification::ContractDeploy(tx) => {
                        total_gas_budget += tx.gas_limit;
                    }
                    TransactionSpecification::EvmTransfer(_) => {
                        total_gas_budget += TRANSFER_GAS;
                    }
                }
            }
        }

        let content = match deployment.to_file_content() {
            Ok(res) => res,
            Err(err) => panic!("unable to serialize deployment {}", err),
        };

        DeploymentSynthesis {
            batches_count,
            transactions_count,
            total_gas_budget,
            content: std::str::from_utf8(&content).unwrap().to_string(),
        }
    }
}

impl Display for DeploymentSynthesis {
    fn fmt(&self, f: &mut Formatter) -> Result {
        write!(
            f,
            "{}\n\n{}\n{}\n{}",
            green!("{}", self.content),
            blue!("Gas budget:\t{} units", self.total_gas_budget),
            blue!("Transactions:\t{}", self.transactions_count),
            blue!("Batches:\t{}", self.batches_count)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evm_rpc_client::Address;
    use provenance_deployments::artifacts::ContractArtifact;
    use provenance_deployments::types::{
        ContractArgument, ContractDeploySpecification, EvmTransferSpecification,
        TransactionPlanSpecification, TransactionsBatchSpecification,
    };
    use provenance_files::{EvmNetwork, FileLocation};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn deployment() -> DeploymentSpecification {
        let sender =
            Address::from_hex("0x90f79bf6eb2c4f870365e785982e1f101e93b906").unwrap();
        DeploymentSpecification {
            id: 0,
            name: "Devnet deployment".to_string(),
            network: EvmNetwork::Devnet,
            evm_node: Some("http://localhost:8545".to_string()),
            plan: TransactionPlanSpecification {
                batches: vec![
                    TransactionsBatchSpecification {
                        id: 0,
                        transactions: vec![TransactionSpecification::EvmTransfer(
                            EvmTransferSpecification {
                                expected_sender: sender,
                                recipient: sender,
                                wei_amount: 1_000,
                            },
                        )],
                    },
                    TransactionsBatchSpecification {
                        id: 1,
                        transactions: vec![TransactionSpecification::ContractDeploy(
                            ContractDeploySpecification {
                                contract_name: "StateVerification".to_string(),
                                expected_sender: sender,
                                location: FileLocation::from_path_string(
                                    "/tmp/project/build/contracts/StateVerification.json",
                                )
                                .unwrap(),
                                artifact: ContractArtifact {
                                    contract_name: "StateVerification".to_string(),
                                    bytecode: vec![0x60, 0x80],
                                    abi: json!([]),
                                },
                                constructor_args: vec![ContractArgument::parse("42").unwrap()],
                                gas_limit: 3_000_000,
                            },
                        )],
                    },
                ],
            },
            contracts: BTreeMap::new(),
        }
    }

    #[test]
    fn test_synthesis_totals() {
        let synthesis = DeploymentSynthesis::from_deployment(&deployment());
        assert_eq!(synthesis.batches_count, 2);
        assert_eq!(synthesis.transactions_count, 2);
        assert_eq!(synthesis.total_gas_budget, 3_000_000 + 21_000);
        assert!(synthesis.content.contains("contract-name: StateVerification"));
        assert!(synthesis.content.contains("evm-transfer:"));
    }
}
