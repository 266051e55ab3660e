use std::collections::BTreeMap;
use std::str::FromStr;

use evm_rpc_client::Address;
use toml::value::Value;

use super::FileLocation;

pub const DEFAULT_DEVNET_RPC_URL: &str = "http://localhost:8545";
pub const DEFAULT_DEVNET_CHECK_INTERVAL_SECS: u64 = 1;
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_CONFIRMATION_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_DEPLOYMENT_GAS_LIMIT: u64 = 3_000_000;

const WEI_PER_GWEI: u64 = 1_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvmNetwork {
    Devnet,
    Testnet,
    Mainnet,
}

impl EvmNetwork {
    pub fn label(&self) -> &str {
        match self {
            EvmNetwork::Devnet => "devnet",
            EvmNetwork::Testnet => "testnet",
            EvmNetwork::Mainnet => "mainnet",
        }
    }
}

impl FromStr for EvmNetwork {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "devnet" => Ok(EvmNetwork::Devnet),
            "testnet" => Ok(EvmNetwork::Testnet),
            "mainnet" => Ok(EvmNetwork::Mainnet),
            _ => Err(format!(
                "unable to parse '{}' as a network (devnet, testnet, mainnet)",
                value
            )),
        }
    }
}

impl std::fmt::Display for EvmNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct NetworkManifestFile {
    network: NetworkConfigFile,
    accounts: Option<Value>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct NetworkConfigFile {
    name: String,
    rpc_url: Option<String>,
    chain_id: Option<u64>,
    deployer_address: Option<String>,
    gas_price_gwei: Option<u64>,
    deployment_gas_limit: Option<u64>,
    confirmation_timeout_secs: Option<u64>,
    check_interval_secs: Option<u64>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct NetworkManifest {
    pub network: NetworkConfig,
    #[serde(with = "accounts_serde")]
    pub accounts: BTreeMap<String, AccountConfig>,
}

pub mod accounts_serde {
    use std::collections::BTreeMap;

    use serde::ser::SerializeSeq;
    use serde::{Deserializer, Serializer};

    use crate::AccountConfig;

    pub fn serialize<S>(
        target: &BTreeMap<String, AccountConfig>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(target.len()))?;
        for account in target.values() {
            seq.serialize_element(account)?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BTreeMap<String, AccountConfig>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let mut res: BTreeMap<String, AccountConfig> = BTreeMap::new();
        let container: Vec<AccountConfig> = serde::Deserialize::deserialize(deserializer)?;
        for account in container {
            res.insert(account.label.clone(), account);
        }
        Ok(res)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct NetworkConfig {
    pub name: String,
    pub rpc_url: String,
    pub expected_chain_id: Option<u64>,
    /// Sender used for every transaction of the plan. When omitted, the
    /// first account managed by the node is used.
    pub deployer_address: Option<Address>,
    pub gas_price_in_wei: Option<u64>,
    pub deployment_gas_limit: u64,
    pub confirmation_timeout_secs: u64,
    pub check_interval_secs: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AccountConfig {
    pub label: String,
    pub address: Address,
}

impl NetworkManifest {
    pub fn from_project_manifest_location(
        project_manifest_location: &FileLocation,
        network: &EvmNetwork,
    ) -> Result<NetworkManifest, String> {
        let network_manifest_location =
            project_manifest_location.get_network_manifest_location(network)?;
        NetworkManifest::from_location(&network_manifest_location, network)
    }

    pub fn from_location(
        location: &FileLocation,
        network: &EvmNetwork,
    ) -> Result<NetworkManifest, String> {
        let network_manifest_file_content = location.read_content()?;
        let network_manifest_file: NetworkManifestFile =
            toml::from_slice(&network_manifest_file_content[..])
                .map_err(|e| format!("network manifest {} malformatted: {}", location, e))?;
        NetworkManifest::from_network_manifest_file(network_manifest_file, network)
    }

    pub fn from_network_manifest_file(
        network_manifest_file: NetworkManifestFile,
        network: &EvmNetwork,
    ) -> Result<NetworkManifest, String> {
        let rpc_url = match network_manifest_file.network.rpc_url {
            Some(ref url) => url.clone(),
            None => match network {
                EvmNetwork::Devnet => DEFAULT_DEVNET_RPC_URL.to_string(),
                _ => {
                    return Err(format!(
                        "rpc_url field required in settings/{:?}.toml",
                        network
                    ))
                }
            },
        };

        let deployer_address = match network_manifest_file.network.deployer_address {
            Some(ref address) => Some(Address::from_hex(address).map_err(|e| {
                format!(
                    "deployer_address (located in settings/{:?}.toml) is invalid: {}",
                    network, e
                )
            })?),
            None => None,
        };

        let check_interval_secs = network_manifest_file
            .network
            .check_interval_secs
            .unwrap_or(match network {
                EvmNetwork::Devnet => DEFAULT_DEVNET_CHECK_INTERVAL_SECS,
                _ => DEFAULT_CHECK_INTERVAL_SECS,
            });

        let network_config = NetworkConfig {
            name: network_manifest_file.network.name.clone(),
            rpc_url,
            expected_chain_id: network_manifest_file.network.chain_id,
            deployer_address,
            gas_price_in_wei: network_manifest_file
                .network
                .gas_price_gwei
                .map(|gwei| gwei * WEI_PER_GWEI),
            deployment_gas_limit: network_manifest_file
                .network
                .deployment_gas_limit
                .unwrap_or(DEFAULT_DEPLOYMENT_GAS_LIMIT),
            confirmation_timeout_secs: network_manifest_file
                .network
                .confirmation_timeout_secs
                .unwrap_or(DEFAULT_CONFIRMATION_TIMEOUT_SECS),
            check_interval_secs,
        };

        let mut accounts = BTreeMap::new();
        if let Some(Value::Table(entries)) = &network_manifest_file.accounts {
            for (account_name, account_settings) in entries.iter() {
                if let Value::Table(account_settings) = account_settings {
                    let address = match account_settings.get("address") {
                        Some(Value::String(address)) => {
                            Address::from_hex(address).map_err(|e| {
                                format!(
                                    "address for account '{}' (located in settings/{:?}.toml) is invalid: {}",
                                    account_name, network, e
                                )
                            })?
                        }
                        _ => {
                            return Err(format!(
                                "address field required for account '{}' in settings/{:?}.toml",
                                account_name, network
                            ))
                        }
                    };

                    accounts.insert(
                        account_name.to_string(),
                        AccountConfig {
                            label: account_name.to_string(),
                            address,
                        },
                    );
                }
            }
        };

        Ok(NetworkManifest {
            network: network_config,
            accounts,
        })
    }
}

#[test]
fn test_network_manifest_defaults() {
    let manifest_file: NetworkManifestFile = toml::from_slice(
        br#"
[network]
name = "devnet"

[accounts.faucet]
address = "0x90f8bf6a479f320ead074411a4b0e7944ea8c9c1"
"#,
    )
    .unwrap();
    let manifest =
        NetworkManifest::from_network_manifest_file(manifest_file, &EvmNetwork::Devnet).unwrap();
    assert_eq!(manifest.network.rpc_url, DEFAULT_DEVNET_RPC_URL);
    assert_eq!(
        manifest.network.check_interval_secs,
        DEFAULT_DEVNET_CHECK_INTERVAL_SECS
    );
    assert_eq!(
        manifest.network.deployment_gas_limit,
        DEFAULT_DEPLOYMENT_GAS_LIMIT
    );
    assert_eq!(manifest.network.deployer_address, None);
    assert_eq!(manifest.accounts.len(), 1);
    assert_eq!(
        manifest.accounts.get("faucet").unwrap().address.to_string(),
        "0x90f8bf6a479f320ead074411a4b0e7944ea8c9c1"
    );
}

#[test]
fn test_network_manifest_requires_rpc_url_on_public_networks() {
    let manifest_file: NetworkManifestFile = toml::from_slice(
        br#"
[network]
name = "testnet"
"#,
    )
    .unwrap();
    let result = NetworkManifest::from_network_manifest_file(manifest_file, &EvmNetwork::Testnet);
    assert!(result.unwrap_err().contains("rpc_url field required"));
}

#[test]
fn test_network_manifest_gas_price_conversion() {
    let manifest_file: NetworkManifestFile = toml::from_slice(
        br#"
[network]
name = "testnet"
rpc_url = "https://rpc.example.com"
chain_id = 11155111
deployer_address = "0xde0b295669a9fd93d5f28d9ec85e40f4cb697bae"
gas_price_gwei = 2
"#,
    )
    .unwrap();
    let manifest =
        NetworkManifest::from_network_manifest_file(manifest_file, &EvmNetwork::Testnet).unwrap();
    assert_eq!(manifest.network.gas_price_in_wei, Some(2_000_000_000));
    assert_eq!(manifest.network.expected_chain_id, Some(11155111));
    assert_eq!(
        manifest.network.check_interval_secs,
        DEFAULT_CHECK_INTERVAL_SECS
    );
}
