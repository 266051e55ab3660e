use crate::deployments::types::DeploymentSynthesis;
use crate::deployments::{
    self, check_deployments, get_absolute_deployment_path, write_deployment,
};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Generator, Shell};
use evm_rpc_client::EvmRpc;
use provenance_deployments::onchain::{
    apply_on_chain_deployment, get_initial_transactions_trackers, DeploymentCommand,
    DeploymentEvent,
};
use provenance_deployments::types::{DeployedContract, DeploymentSpecification};
use provenance_deployments::{
    generate_default_deployment, get_default_deployment_path, load_deployment,
};
use provenance_files::{
    get_manifest_location, EvmNetwork, FileLocation, NetworkManifest, ProjectManifest,
};
use provenance_system_kit::Context;
use std::fs::File;
use std::process;

/// Provenance is a command line tool for deploying the product provenance
/// contracts in dependency order on EVM networks.
#[derive(Parser, PartialEq, Clone, Debug)]
#[clap(version = env!("CARGO_PKG_VERSION"), name = "provenance", bin_name = "provenance")]
struct Opts {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, PartialEq, Clone, Debug)]
enum Command {
    /// Generate shell completions scripts
    #[clap(name = "completions", bin_name = "completions", aliases = &["completion"])]
    Completions(Completions),
    /// Manage contracts deployments on Devnet/Testnet/Mainnet
    #[clap(subcommand, name = "deployments", aliases = &["deployment"])]
    Deployments(Deployments),
}

#[allow(clippy::enum_variant_names)]
#[derive(Subcommand, PartialEq, Clone, Debug)]
enum Deployments {
    /// Check deployments format and transaction ordering
    #[clap(name = "check", bin_name = "check")]
    CheckDeployments(CheckDeployments),
    /// Generate new deployment
    #[clap(name = "generate", bin_name = "generate", aliases = &["new"])]
    GenerateDeployment(GenerateDeployment),
    /// Apply deployment
    #[clap(name = "apply", bin_name = "apply")]
    ApplyDeployment(ApplyDeployment),
}

#[derive(Parser, PartialEq, Clone, Debug)]
struct Completions {
    /// Specify which shell to generation completions script for
    #[clap(ignore_case = true)]
    pub shell: Shell,
}

#[derive(Parser, PartialEq, Clone, Debug)]
struct CheckDeployments {
    /// Path to Provenance.toml
    #[clap(long = "manifest-path", short = 'm')]
    pub manifest_path: Option<String>,
}

#[derive(Parser, PartialEq, Clone, Debug)]
struct GenerateDeployment {
    /// Generate a deployment file for devnet, using settings/Devnet.toml
    #[clap(long = "devnet", conflicts_with = "testnet", conflicts_with = "mainnet")]
    pub devnet: bool,
    /// Generate a deployment file for testnet, using settings/Testnet.toml
    #[clap(long = "testnet", conflicts_with = "devnet", conflicts_with = "mainnet")]
    pub testnet: bool,
    /// Generate a deployment file for mainnet, using settings/Mainnet.toml
    #[clap(long = "mainnet", conflicts_with = "devnet", conflicts_with = "testnet")]
    pub mainnet: bool,
    /// Path to Provenance.toml
    #[clap(long = "manifest-path", short = 'm')]
    pub manifest_path: Option<String>,
}

#[derive(Parser, PartialEq, Clone, Debug)]
struct ApplyDeployment {
    /// Apply default deployment deployments/default.devnet-plan.yaml
    #[clap(
        long = "devnet",
        conflicts_with = "deployment-plan-path",
        conflicts_with = "testnet",
        conflicts_with = "mainnet"
    )]
    pub devnet: bool,
    /// Apply default deployment deployments/default.testnet-plan.yaml
    #[clap(
        long = "testnet",
        conflicts_with = "deployment-plan-path",
        conflicts_with = "devnet",
        conflicts_with = "mainnet"
    )]
    pub testnet: bool,
    /// Apply default deployment deployments/default.mainnet-plan.yaml
    #[clap(
        long = "mainnet",
        conflicts_with = "deployment-plan-path",
        conflicts_with = "testnet",
        conflicts_with = "devnet"
    )]
    pub mainnet: bool,
    /// Path to Provenance.toml
    #[clap(long = "manifest-path", short = 'm')]
    pub manifest_path: Option<String>,
    /// Apply deployment plan specified
    #[clap(
        long = "deployment-plan-path",
        short = 'p',
        conflicts_with = "devnet",
        conflicts_with = "testnet",
        conflicts_with = "mainnet"
    )]
    pub deployment_plan_path: Option<String>,
    /// Display streams of logs instead of terminal UI dashboard
    #[clap(long = "no-dashboard")]
    pub no_dashboard: bool,
    /// Use on disk deployment plan (prevent updates computing)
    #[clap(
        long = "use-on-disk-deployment-plan",
        short = 'd',
        conflicts_with = "use-computed-deployment-plan"
    )]
    pub use_on_disk_deployment_plan: bool,
    /// Use computed deployment plan (will overwrite on disk version if any update)
    #[clap(
        long = "use-computed-deployment-plan",
        short = 'c',
        conflicts_with = "use-on-disk-deployment-plan"
    )]
    pub use_computed_deployment_plan: bool,
}

pub fn main() {
    let opts: Opts = match Opts::try_parse() {
        Ok(opts) => opts,
        Err(e) => {
            // --version, --help and parse errors all funnel through here
            e.exit();
        }
    };

    match opts.command {
        Command::Completions(cmd) => {
            let mut app = Opts::command();
            let file_name = cmd.shell.file_name("provenance");
            let mut file = match File::create(file_name.clone()) {
                Ok(file) => file,
                Err(e) => {
                    eprintln!(
                        "{} Unable to create file {}: {}",
                        red!("error:"),
                        file_name,
                        e
                    );
                    std::process::exit(1);
                }
            };
            clap_complete::generate(cmd.shell, &mut app, "provenance", &mut file);
            println!("{} {}", green!("Created file"), file_name.clone());
            println!("Check your shell's documentation for details about using this file to enable completions for provenance");
        }
        Command::Deployments(subcommand) => match subcommand {
            Deployments::CheckDeployments(cmd) => {
                let manifest = load_manifest_or_exit(cmd.manifest_path);
                println!("Checking deployments");
                let res = check_deployments(&manifest);
                if let Err(message) = res {
                    eprintln!("{}", format_err!(message));
                    process::exit(1);
                }
            }
            Deployments::GenerateDeployment(cmd) => {
                let manifest = load_manifest_or_exit(cmd.manifest_path);

                let network = if cmd.devnet {
                    EvmNetwork::Devnet
                } else if cmd.testnet {
                    EvmNetwork::Testnet
                } else if cmd.mainnet {
                    EvmNetwork::Mainnet
                } else {
                    eprintln!(
                        "{}",
                        format_err!(
                            "a flag `--devnet`, `--testnet` or `--mainnet` should be provided"
                        )
                    );
                    process::exit(1);
                };

                let default_deployment_path =
                    get_default_deployment_path(&manifest, &network).unwrap();
                let deployment = match generate_default_deployment(&manifest, &network) {
                    Ok(deployment) => deployment,
                    Err(message) => {
                        eprintln!("{}", format_err!(message));
                        std::process::exit(1);
                    }
                };

                let write_plan = if default_deployment_path.exists() {
                    let existing_deployment = load_deployment(&manifest, &default_deployment_path)
                        .unwrap_or_else(|message| {
                            eprintln!(
                                "{}",
                                format_err!(format!(
                                    "unable to load {}\n{}",
                                    default_deployment_path, message
                                ))
                            );
                            process::exit(1);
                        });
                    should_existing_plan_be_replaced(&existing_deployment, &deployment)
                } else {
                    true
                };

                if write_plan {
                    let res = write_deployment(&deployment, &default_deployment_path, false);
                    if let Err(message) = res {
                        eprintln!("{}", format_err!(message));
                        process::exit(1);
                    }

                    println!(
                        "{} {}",
                        green!("Generated file"),
                        default_deployment_path.get_relative_location().unwrap()
                    );
                }
            }
            Deployments::ApplyDeployment(cmd) => {
                let manifest = load_manifest_or_exit(cmd.manifest_path);

                let network = if cmd.devnet {
                    Some(EvmNetwork::Devnet)
                } else if cmd.testnet {
                    Some(EvmNetwork::Testnet)
                } else if cmd.mainnet {
                    Some(EvmNetwork::Mainnet)
                } else {
                    None
                };

                let result = match (&network, cmd.deployment_plan_path) {
                    (None, None) => {
                        Err(format!("{}: a flag `--devnet`, `--testnet`, `--mainnet` or `--deployment-plan-path=path/to/yaml` should be provided.", yellow!("Command usage")))
                    }
                    (Some(network), None) => {
                        let res = load_deployment_if_exists(&manifest, network, cmd.use_on_disk_deployment_plan, cmd.use_computed_deployment_plan);
                        match res {
                            Some(Ok(deployment)) => {
                                println!(
                                    "{} using existing deployments/default.{}-plan.yaml",
                                    yellow!("note:"),
                                    network
                                );
                                Ok(deployment)
                            }
                            Some(Err(e)) => Err(e),
                            None => {
                                let default_deployment_path = get_default_deployment_path(&manifest, network).unwrap();
                                let deployment = match generate_default_deployment(&manifest, network) {
                                    Ok(deployment) => deployment,
                                    Err(message) => {
                                        eprintln!("{}", format_err!(message));
                                        std::process::exit(1);
                                    }
                                };
                                let res = write_deployment(&deployment, &default_deployment_path, true);
                                if let Err(message) = res {
                                    Err(message)
                                } else {
                                    println!("{} {}", green!("Generated file"), default_deployment_path.get_relative_location().unwrap());
                                    Ok(deployment)
                                }
                            }
                        }
                    }
                    (None, Some(deployment_plan_path)) => {
                        let deployment_path = get_absolute_deployment_path(&manifest, &deployment_plan_path).expect("unable to retrieve deployment");
                        load_deployment(&manifest, &deployment_path)
                    }
                    (_, _) => unreachable!()
                };

                let deployment = match result {
                    Ok(deployment) => deployment,
                    Err(e) => {
                        eprintln!("{}", e);
                        std::process::exit(1);
                    }
                };
                let network = deployment.network;

                let network_manifest = match NetworkManifest::from_project_manifest_location(
                    &manifest.location,
                    &network,
                ) {
                    Ok(network_manifest) => network_manifest,
                    Err(message) => {
                        eprintln!("{}", format_err!(message));
                        std::process::exit(1);
                    }
                };

                // The plan's evm-node field wins over the settings file.
                let node_url = deployment
                    .evm_node
                    .clone()
                    .unwrap_or_else(|| network_manifest.network.rpc_url.clone());

                println!(
                    "The following deployment plan will be applied:\n{}\n\n",
                    DeploymentSynthesis::from_deployment(&deployment)
                );

                if !cmd.use_on_disk_deployment_plan {
                    println!("{}", yellow!("Continue [Y/n]?"));
                    let mut buffer = String::new();
                    std::io::stdin().read_line(&mut buffer).unwrap();
                    if !buffer.starts_with('Y')
                        && !buffer.starts_with('y')
                        && !buffer.starts_with('\n')
                    {
                        eprintln!("Deployment aborted");
                        std::process::exit(1);
                    }
                }

                let (command_tx, command_rx) = std::sync::mpsc::channel();
                let (event_tx, event_rx) = std::sync::mpsc::channel();

                let transaction_trackers = if cmd.no_dashboard {
                    vec![]
                } else {
                    get_initial_transactions_trackers(&deployment)
                };

                let (ctx, _logger_guard) = if cmd.no_dashboard {
                    let logger = provenance_system_kit::log::setup_logger();
                    let guard = provenance_system_kit::log::setup_global_logger(logger.clone());
                    (
                        Context {
                            logger: Some(logger),
                            tracer: false,
                        },
                        Some(guard),
                    )
                } else {
                    (Context::empty(), None)
                };

                let node_url_moved = node_url.clone();
                let network_manifest_moved = network_manifest.clone();
                let handle = provenance_system_kit::thread_named("Deployment execution")
                    .spawn(move || {
                        let backend = EvmRpc::new(&node_url_moved);
                        let _ = apply_on_chain_deployment(
                            &network_manifest_moved,
                            &deployment,
                            &backend,
                            event_tx,
                            command_rx,
                            &ctx,
                        );
                    })
                    .expect("unable to spawn deployment thread");

                let _ = command_tx.send(DeploymentCommand::Start);

                if cmd.no_dashboard {
                    loop {
                        let event = match event_rx.recv() {
                            Ok(event) => event,
                            Err(_e) => break,
                        };
                        match event {
                            DeploymentEvent::Interrupted(message) => {
                                eprintln!(
                                    "{} Error publishing transactions: {}",
                                    red!("x"),
                                    message
                                );
                                std::process::exit(1);
                            }
                            DeploymentEvent::TransactionUpdate(update) => {
                                println!("{} {:?} {}", blue!("➡"), update.status, update.name);
                            }
                            DeploymentEvent::DeploymentCompleted(contracts) => {
                                display_deployed_contracts(&network, &contracts);
                                break;
                            }
                        }
                    }
                    let _ = handle.join();
                } else {
                    let res = deployments::start_ui(&node_url, event_rx, transaction_trackers);
                    let _ = handle.join();
                    match res {
                        Ok(contracts) => display_deployed_contracts(&network, &contracts),
                        Err(message) => {
                            eprintln!(
                                "{} Error publishing transactions: {}",
                                red!("x"),
                                message
                            );
                            std::process::exit(1);
                        }
                    }
                }
            }
        },
    };
}

fn display_deployed_contracts(network: &EvmNetwork, contracts: &[DeployedContract]) {
    println!(
        "{} Transactions successfully confirmed on {}",
        green!("✔"),
        network
    );
    for contract in contracts.iter() {
        println!(
            "{} {} deployed at {}",
            green!("✔"),
            contract.contract_name,
            contract.address
        );
    }
}

fn get_manifest_location_or_exit(path: Option<String>) -> FileLocation {
    match get_manifest_location(path) {
        Some(manifest_location) => manifest_location,
        None => {
            eprintln!("Could not find Provenance.toml");
            process::exit(1);
        }
    }
}

fn load_manifest_or_exit(path: Option<String>) -> ProjectManifest {
    let manifest_location = get_manifest_location_or_exit(path);
    match ProjectManifest::from_location(&manifest_location) {
        Ok(manifest) => manifest,
        Err(message) => {
            eprintln!(
                "{} syntax errors in Provenance.toml\n{}",
                red!("error:"),
                message,
            );
            process::exit(1);
        }
    }
}

fn should_existing_plan_be_replaced(
    existing_plan: &DeploymentSpecification,
    new_plan: &DeploymentSpecification,
) -> bool {
    use similar::{ChangeTag, TextDiff};

    let existing_file = existing_plan
        .to_file_content()
        .expect("unable to serialize deployment");
    let new_file = new_plan
        .to_file_content()
        .expect("unable to serialize deployment");

    if existing_file == new_file {
        return false;
    }

    println!("{}", blue!("A new deployment plan was computed and differs from the default deployment plan currently saved on disk:"));

    let diffs = TextDiff::from_lines(
        std::str::from_utf8(&existing_file).unwrap(),
        std::str::from_utf8(&new_file).unwrap(),
    );

    for change in diffs.iter_all_changes() {
        let formatted_change = match change.tag() {
            ChangeTag::Delete => {
                format!("{} {}", red!("-"), red!("{}", change))
            }
            ChangeTag::Insert => {
                format!("{} {}", green!("+"), green!("{}", change))
            }
            ChangeTag::Equal => format!("  {}", change),
        };
        print!("{}", formatted_change);
    }

    println!("{}", yellow!("Overwrite? [Y/n]"));
    let mut buffer = String::new();
    std::io::stdin().read_line(&mut buffer).unwrap();

    !buffer.starts_with('n')
}

fn load_deployment_if_exists(
    manifest: &ProjectManifest,
    network: &EvmNetwork,
    force_on_disk: bool,
    force_computed: bool,
) -> Option<Result<DeploymentSpecification, String>> {
    let default_deployment_location = match get_default_deployment_path(manifest, network) {
        Ok(location) => location,
        Err(e) => return Some(Err(e)),
    };
    if !default_deployment_location.exists() {
        return None;
    }

    if force_on_disk {
        return Some(load_deployment(manifest, &default_deployment_location));
    }

    match generate_default_deployment(manifest, network) {
        Ok(deployment) => {
            use similar::{ChangeTag, TextDiff};

            let current_version = match default_deployment_location.read_content() {
                Ok(content) => content,
                Err(message) => return Some(Err(message)),
            };

            let updated_version = match deployment.to_file_content() {
                Ok(res) => res,
                Err(err) => return Some(Err(format!("failed serializing deployment\n{}", err))),
            };

            if updated_version == current_version {
                return Some(load_deployment(manifest, &default_deployment_location));
            }

            if !force_computed {
                println!("{}", blue!("A new deployment plan was computed and differs from the default deployment plan currently saved on disk:"));

                let diffs = TextDiff::from_lines(
                    std::str::from_utf8(&current_version).unwrap(),
                    std::str::from_utf8(&updated_version).unwrap(),
                );

                for change in diffs.iter_all_changes() {
                    let formatted_change = match change.tag() {
                        ChangeTag::Delete => {
                            format!("{} {}", red!("-"), red!("{}", change))
                        }
                        ChangeTag::Insert => {
                            format!("{} {}", green!("+"), green!("{}", change))
                        }
                        ChangeTag::Equal => format!("  {}", change),
                    };
                    print!("{}", formatted_change);
                }

                println!("{}", yellow!("Overwrite? [Y/n]"));
                let mut buffer = String::new();
                std::io::stdin().read_line(&mut buffer).unwrap();
                if buffer.starts_with('n') {
                    Some(load_deployment(manifest, &default_deployment_location))
                } else {
                    default_deployment_location
                        .write_content(&updated_version)
                        .ok()?;
                    Some(Ok(deployment))
                }
            } else {
                default_deployment_location
                    .write_content(&updated_version)
                    .ok()?;
                Some(Ok(deployment))
            }
        }
        Err(message) => {
            eprintln!(
                "{} unable to compute an updated plan\n{}",
                red!("error:"),
                message
            );
            Some(load_deployment(manifest, &default_deployment_location))
        }
    }
}
