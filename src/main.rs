use clap::Parser;
use colored::Colorize;
use env_logger::Env;
use serde::Serialize;
use std::process::ExitCode;

use fault_dfa::block::{format_round_subkey, parse_round_subkey};
use fault_dfa::capture::format_blocks;
use fault_dfa::cipher::{des, Aes128};
use fault_dfa::config::{Cli, Command, Config, EncryptArgs, ReverseArgs, SimulateArgs};
use fault_dfa::diff::{compare, dump_diff};
use fault_dfa::prelude::*;

use git_version::git_version;
const GIT_VERSION: &str = git_version!(fallback = "unknown");

/// Exit code when the DES master key could not be reconstructed
const EXIT_KEY_NOT_FOUND: u8 = 1;
/// Exit code for any other error
const EXIT_ERROR: u8 = 2;

/// Differential fault analysis of AES-128 and DES
///
fn main() -> ExitCode {
    // Get parameter from command line
    let cli = Cli::parse();

    // Banner goes to stderr, results to stdout
    eprintln!("--- Differential fault analysis: {GIT_VERSION} ---\n");

    let result = match cli.command {
        Command::Recover(args) => {
            let mut config = match &args.config {
                Some(path) => match Config::from_file(path) {
                    Ok(config) => config,
                    Err(e) => return report_error(&e),
                },
                None => Config::default(),
            };
            config.override_with_args(&args);
            init_logger(&config.log_level);
            run_recover(&config)
        }
        Command::Encrypt(args) => {
            init_logger("warn");
            run_encrypt(&args)
        }
        Command::Reverse(args) => {
            init_logger("warn");
            run_reverse(&args)
        }
        Command::Simulate(args) => {
            init_logger("warn");
            run_simulate(&args)
        }
    };

    match result {
        Ok(code) => code,
        Err(e) => report_error(&e),
    }
}

/// Switch on more output with: RUST_LOG=debug dfa ...
fn init_logger(level: &str) {
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();
}

fn report_error(error: &DfaError) -> ExitCode {
    eprintln!("{} {}", "Error:".red().bold(), error);
    ExitCode::from(EXIT_ERROR)
}

#[derive(Serialize)]
struct RecoveryReport {
    cipher: String,
    round_key: String,
    master_key: Option<String>,
    master_key_status: Option<&'static str>,
    stats: RecoveryStats,
}

fn run_recover(config: &Config) -> Result<ExitCode, DfaError> {
    let inputs = config.recover_inputs()?;

    if config.analysis {
        let reference = inputs.reference.to_bytes();
        for (number, faulted) in inputs.faulted.iter().enumerate() {
            let faulted = faulted.to_bytes();
            let diffs = compare(&reference, &faulted)?;
            println!("Faulted output #{}:", number + 1);
            println!("{}", dump_diff(&reference, &faulted, &diffs));
        }
    }

    let recovery = recover_round_key(
        inputs.kind,
        &inputs.reference,
        &inputs.faulted,
        config.threads,
    )?;

    // Schedule reversal needs the known plaintext
    let mut master_key = None;
    let mut master_key_status = None;
    if let (RoundKey::Des(round_key), Some(plaintext)) = (recovery.round_key, inputs.plaintext) {
        match recover_initial_des_key(round_key, plaintext.as_des()?, inputs.reference.as_des()?) {
            Ok(key) => {
                master_key = Some(format!("{:016X}", key));
                master_key_status = Some("recovered");
            }
            Err(DfaError::KeyNotFound) => master_key_status = Some("not found"),
            Err(e) => return Err(e),
        }
    }

    let report = RecoveryReport {
        cipher: inputs.kind.to_string(),
        round_key: recovery.round_key.to_string(),
        master_key,
        master_key_status,
        stats: recovery.stats,
    };

    if config.json {
        let text = serde_json::to_string_pretty(&report)?;
        println!("{}", text);
    } else {
        println!("Cipher          : {}", report.cipher);
        println!(
            "Faulted outputs : {} ({} usable, {} dropped)",
            report.stats.samples, report.stats.accepted, report.stats.rejected
        );
        println!("Votes           : {:?}", report.stats.votes);
        println!("Round key       : {}", report.round_key.green().bold());
        match (&report.master_key, report.master_key_status) {
            (Some(key), _) => println!("Master key      : {}", key.green().bold()),
            (None, Some(status)) => println!("Master key      : {}", status.red()),
            _ => {}
        }
    }

    if report.master_key_status == Some("not found") {
        return Ok(ExitCode::from(EXIT_KEY_NOT_FOUND));
    }
    Ok(ExitCode::SUCCESS)
}

fn run_encrypt(args: &EncryptArgs) -> Result<ExitCode, DfaError> {
    let key = Block::parse(args.cipher, &args.key)?;
    let mut plaintexts = args
        .plaintext
        .iter()
        .map(|text| Block::parse(args.cipher, text))
        .collect::<Result<Vec<_>, _>>()?;
    if let Some(path) = &args.plaintext_file {
        plaintexts.extend(load_blocks(path, args.cipher)?);
    }
    if plaintexts.is_empty() {
        return Err(DfaError::Config(
            "No plaintext given (--plaintext or --plaintext-file)".to_string(),
        ));
    }

    match key {
        Block::Aes(key) => {
            let cipher = Aes128::new(&key);
            if args.round_keys {
                for (round, round_key) in cipher.round_keys().iter().enumerate() {
                    println!("K{:<2} : {}", round, hex::encode_upper(round_key));
                }
            }
            for plaintext in &plaintexts {
                let output = cipher.encrypt_block(&plaintext.as_aes()?);
                println!("{} -> {}", plaintext, Block::Aes(output));
            }
        }
        Block::Des(key) => {
            if args.round_keys {
                for (round, round_key) in des::key_schedule(key).iter().enumerate() {
                    println!("K{:<2} : {}", round + 1, format_round_subkey(*round_key));
                }
            }
            for plaintext in &plaintexts {
                let output = des::encrypt(plaintext.as_des()?, key);
                println!("{} -> {}", plaintext, Block::Des(output));
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn run_reverse(args: &ReverseArgs) -> Result<ExitCode, DfaError> {
    let plaintext = Block::parse(CipherKind::Des, &args.plain)?.as_des()?;
    let reference = Block::parse(CipherKind::Des, &args.reference)?.as_des()?;
    let round_key = parse_round_subkey(&args.final_key)?;

    match recover_initial_des_key(round_key, plaintext, reference) {
        Ok(key) => {
            println!("Master key : {}", format!("{:016X}", key).green().bold());
            Ok(ExitCode::SUCCESS)
        }
        Err(DfaError::KeyNotFound) => {
            println!("Master key : {}", "not found".red());
            Ok(ExitCode::from(EXIT_KEY_NOT_FOUND))
        }
        Err(e) => Err(e),
    }
}

fn run_simulate(args: &SimulateArgs) -> Result<ExitCode, DfaError> {
    let key = Block::parse(args.cipher, &args.key)?;
    let plaintext = Block::parse(args.cipher, &args.plaintext)?;
    let campaign = FaultCampaign::new(args.cipher, &key, &plaintext)?;

    let descriptors = if args.all {
        get_fault_list(args.cipher)
    } else {
        args.faults.clone()
    };
    if descriptors.is_empty() {
        return Err(DfaError::Config(
            "No faults selected (--faults or --all)".to_string(),
        ));
    }
    let faults = descriptors
        .iter()
        .map(|descriptor| get_fault_from(descriptor))
        .collect::<Result<Vec<FaultType>, _>>()?;

    let outputs = campaign.run(&faults)?;
    println!("# reference: {}", campaign.reference());
    print!(
        "{}",
        format_blocks(outputs.iter().zip(descriptors).map(|(o, d)| (o, Some(d))))
    );
    Ok(ExitCode::SUCCESS)
}
