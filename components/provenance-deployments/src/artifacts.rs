use provenance_files::FileLocation;
use serde_json::Value as JsonValue;

/// Compiled contract artifact, as produced by the Solidity toolchain
/// (`contractName`, `abi` and `bytecode` fields of the build json).
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ContractArtifactFile {
    pub contract_name: Option<String>,
    pub abi: Option<JsonValue>,
    pub bytecode: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContractArtifact {
    pub contract_name: String,
    pub bytecode: Vec<u8>,
    pub abi: JsonValue,
}

impl ContractArtifact {
    pub fn from_location(location: &FileLocation) -> Result<ContractArtifact, String> {
        let content = location.read_content()?;
        let artifact_file: ContractArtifactFile = serde_json::from_slice(&content[..])
            .map_err(|e| format!("artifact {} malformatted: {}", location, e))?;
        ContractArtifact::from_artifact_file(artifact_file, location)
    }

    pub fn from_artifact_file(
        artifact_file: ContractArtifactFile,
        location: &FileLocation,
    ) -> Result<ContractArtifact, String> {
        let contract_name = match artifact_file.contract_name {
            Some(contract_name) => contract_name,
            None => location
                .get_file_name()
                .and_then(|f| f.strip_suffix(".json").map(|s| s.to_string()))
                .ok_or(format!(
                    "unable to infer a contract name for artifact {}",
                    location
                ))?,
        };

        let bytecode_hex = artifact_file.bytecode.ok_or(format!(
            "artifact {} is missing its bytecode field",
            location
        ))?;
        let stripped = bytecode_hex.strip_prefix("0x").unwrap_or(&bytecode_hex);
        if stripped.is_empty() {
            return Err(format!(
                "artifact {} has an empty bytecode (was the contract compiled?)",
                location
            ));
        }
        let bytecode = hex::decode(stripped)
            .map_err(|e| format!("unable to parse bytecode of artifact {}: {}", location, e))?;

        Ok(ContractArtifact {
            contract_name,
            bytecode,
            abi: artifact_file.abi.unwrap_or(JsonValue::Array(vec![])),
        })
    }

    /// Number of constructor inputs declared by the abi, when present.
    pub fn expected_constructor_args(&self) -> Option<usize> {
        let entries = self.abi.as_array()?;
        for entry in entries.iter() {
            if entry.get("type").and_then(|t| t.as_str()) == Some("constructor") {
                let inputs = entry.get("inputs").and_then(|i| i.as_array())?;
                return Some(inputs.len());
            }
        }
        // No constructor entry: the contract uses the implicit one
        Some(0)
    }
}
