use std::collections::BTreeMap;

use toml::value::Value as TomlValue;

use super::FileLocation;

const DEFAULT_ARTIFACTS_DIR: &str = "build/contracts";

#[derive(Serialize, Deserialize, Debug)]
pub struct ProjectManifestFile {
    project: ProjectConfigFile,
    contracts: Option<TomlValue>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ProjectConfigFile {
    name: String,
    authors: Option<Vec<String>>,
    description: Option<String>,
    artifacts_dir: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ProjectManifest {
    pub project: ProjectConfig,
    pub contracts: BTreeMap<String, ContractConfig>,
    pub location: FileLocation,
}

#[derive(Debug, Clone)]
pub struct ProjectConfig {
    pub name: String,
    pub authors: Vec<String>,
    pub description: String,
    pub artifacts_dir: String,
}

/// One `[contracts.<Name>]` entry of the project manifest. Constructor
/// arguments are kept as the raw strings written in the manifest; parsing
/// them is the deployment planner's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractConfig {
    pub name: String,
    pub artifact_path: String,
    pub constructor_args: Vec<String>,
    pub deployer: Option<String>,
    pub gas_limit: Option<u64>,
}

impl ProjectManifest {
    pub fn from_location(location: &FileLocation) -> Result<ProjectManifest, String> {
        let project_manifest_file_content = location.read_content()?;
        let project_manifest_file: ProjectManifestFile =
            toml::from_slice(&project_manifest_file_content[..])
                .map_err(|e| format!("Provenance.toml file malformatted: {}", e))?;

        ProjectManifest::from_project_manifest_file(project_manifest_file, location)
    }

    pub fn from_project_manifest_file(
        project_manifest_file: ProjectManifestFile,
        manifest_location: &FileLocation,
    ) -> Result<ProjectManifest, String> {
        let artifacts_dir = project_manifest_file
            .project
            .artifacts_dir
            .unwrap_or(DEFAULT_ARTIFACTS_DIR.to_string());

        let project = ProjectConfig {
            name: project_manifest_file.project.name.clone(),
            description: project_manifest_file
                .project
                .description
                .unwrap_or("".into()),
            authors: project_manifest_file.project.authors.unwrap_or_default(),
            artifacts_dir: artifacts_dir.clone(),
        };

        let mut contracts = BTreeMap::new();
        if let Some(TomlValue::Table(entries)) = project_manifest_file.contracts {
            for (contract_name, contract_settings) in entries.iter() {
                if let TomlValue::Table(contract_settings) = contract_settings {
                    let artifact_path = match contract_settings.get("artifact") {
                        Some(TomlValue::String(path)) => path.clone(),
                        Some(_) => {
                            return Err(format!(
                                "artifact field invalid for contract '{}'",
                                contract_name
                            ))
                        }
                        None => format!("{}/{}.json", artifacts_dir, contract_name),
                    };

                    let constructor_args = match contract_settings.get("constructor_args") {
                        Some(TomlValue::Array(args)) => {
                            let mut parsed_args = vec![];
                            for arg in args.iter() {
                                match arg {
                                    TomlValue::String(value) => parsed_args.push(value.clone()),
                                    _ => {
                                        return Err(format!(
                                            "constructor_args for contract '{}' must be strings",
                                            contract_name
                                        ))
                                    }
                                }
                            }
                            parsed_args
                        }
                        Some(_) => {
                            return Err(format!(
                                "constructor_args field invalid for contract '{}'",
                                contract_name
                            ))
                        }
                        None => vec![],
                    };

                    let deployer = match contract_settings.get("deployer") {
                        Some(TomlValue::String(label)) => Some(label.clone()),
                        _ => None,
                    };

                    let gas_limit = match contract_settings.get("gas_limit") {
                        Some(TomlValue::Integer(gas_limit)) => Some(*gas_limit as u64),
                        None => None,
                        _ => {
                            return Err(format!(
                                "gas_limit field invalid for contract '{}'",
                                contract_name
                            ))
                        }
                    };

                    contracts.insert(
                        contract_name.to_string(),
                        ContractConfig {
                            name: contract_name.to_string(),
                            artifact_path,
                            constructor_args,
                            deployer,
                            gas_limit,
                        },
                    );
                }
            }
        };

        Ok(ProjectManifest {
            project,
            contracts,
            location: manifest_location.clone(),
        })
    }

    pub fn get_artifact_location(&self, contract_name: &str) -> Result<FileLocation, String> {
        let contract = self.contracts.get(contract_name).ok_or(format!(
            "unable to find contract '{}' in {}",
            contract_name, self.location
        ))?;
        let mut artifact_location = self.location.get_parent_location()?;
        artifact_location.append_path(&contract.artifact_path)?;
        Ok(artifact_location)
    }

    pub fn get_project_root_location(&self) -> Result<FileLocation, String> {
        self.location.get_parent_location()
    }
}

#[test]
fn test_project_manifest_parsing() {
    let manifest_file: ProjectManifestFile = toml::from_slice(
        br#"
[project]
name = "product-provenance"
description = "Supply chain provenance protocol"
authors = ["ops@example.com"]

[contracts.StateVerification]

[contracts.ProductProvenance]
artifact = "build/contracts/ProductProvenance.json"
constructor_args = ["contract:StateVerification"]
gas_limit = 2400000
"#,
    )
    .unwrap();
    let location = FileLocation::from_path_string("/tmp/project/Provenance.toml").unwrap();
    let manifest = ProjectManifest::from_project_manifest_file(manifest_file, &location).unwrap();

    assert_eq!(manifest.project.name, "product-provenance");
    assert_eq!(manifest.contracts.len(), 2);

    let state_verification = manifest.contracts.get("StateVerification").unwrap();
    assert_eq!(
        state_verification.artifact_path,
        "build/contracts/StateVerification.json"
    );
    assert!(state_verification.constructor_args.is_empty());
    assert_eq!(state_verification.gas_limit, None);

    let product_provenance = manifest.contracts.get("ProductProvenance").unwrap();
    assert_eq!(
        product_provenance.constructor_args,
        vec!["contract:StateVerification".to_string()]
    );
    assert_eq!(product_provenance.gas_limit, Some(2_400_000));

    let artifact_location = manifest.get_artifact_location("StateVerification").unwrap();
    assert_eq!(
        artifact_location.to_string(),
        "/tmp/project/build/contracts/StateVerification.json"
    );
}

#[test]
fn test_project_manifest_rejects_non_string_args() {
    let manifest_file: ProjectManifestFile = toml::from_slice(
        br#"
[project]
name = "product-provenance"

[contracts.ProductProvenance]
constructor_args = [1]
"#,
    )
    .unwrap();
    let location = FileLocation::from_path_string("/tmp/project/Provenance.toml").unwrap();
    let result = ProjectManifest::from_project_manifest_file(manifest_file, &location);
    assert!(result.unwrap_err().contains("must be strings"));
}
