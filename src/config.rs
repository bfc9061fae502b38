use crate::block::{Block, CipherKind};
use crate::capture::load_blocks;
use crate::error::DfaError;
use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Deserializer};
use std::path::PathBuf;

/// Normalize a hex string: optional `0x` prefix dropped, digits only
fn parse_hex(s: &str) -> Result<String, String> {
    let trimmed = s.trim();
    let cleaned = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if cleaned.is_empty() || !cleaned.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("Invalid hex value '{}'", s));
    }
    Ok(cleaned.to_string())
}

/// Custom deserializer for a list of hex blocks given as strings
fn deserialize_hex_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de;

    let values: Vec<String> = Deserialize::deserialize(deserializer)?;
    values
        .iter()
        .map(|value| parse_hex(value).map_err(de::Error::custom))
        .collect()
}

/// Custom deserializer for a single optional hex block
fn deserialize_hex_option<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de;

    let value: Option<String> = Deserialize::deserialize(deserializer)?;
    value
        .map(|value| parse_hex(&value).map_err(de::Error::custom))
        .transpose()
}

/// Recovery campaign configuration that can be loaded from JSON5
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub cipher: Option<CipherKind>,
    #[serde(default, deserialize_with = "deserialize_hex_option")]
    pub reference: Option<String>,
    #[serde(default, deserialize_with = "deserialize_hex_list")]
    pub faults: Vec<String>,
    #[serde(default)]
    pub faults_file: Option<PathBuf>,
    #[serde(default, deserialize_with = "deserialize_hex_option")]
    pub plaintext: Option<String>,
    #[serde(default = "Config::default_threads")]
    pub threads: usize,
    #[serde(default)]
    pub analysis: bool,
    #[serde(default)]
    pub json: bool,
    #[serde(default = "Config::default_log_level")]
    pub log_level: String,
}

/// Parsed blocks of a recovery campaign
#[derive(Debug, Clone, PartialEq)]
pub struct RecoverInputs {
    pub kind: CipherKind,
    pub reference: Block,
    pub faulted: Vec<Block>,
    pub plaintext: Option<Block>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cipher: None,
            reference: None,
            faults: Vec::new(),
            faults_file: None,
            plaintext: None,
            threads: Self::default_threads(),
            analysis: false,
            json: false,
            log_level: Self::default_log_level(),
        }
    }
}

impl Config {
    // Keep defaults in sync with CLI help texts
    fn default_threads() -> usize {
        4
    }

    fn default_log_level() -> String {
        "warn".to_string()
    }

    /// Load configuration from JSON5 file
    pub fn from_file(path: &PathBuf) -> Result<Self, DfaError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DfaError::Config(format!("Failed to read config file: {}", e)))?;

        json5::from_str(&content)
            .map_err(|e| DfaError::Config(format!("Failed to parse JSON5 config: {}", e)))
    }

    /// Override config values with command line arguments
    pub fn override_with_args(&mut self, args: &RecoverArgs) {
        // Options only if provided
        if args.cipher.is_some() {
            self.cipher = args.cipher;
        }
        if args.reference.is_some() {
            self.reference = args.reference.clone();
        }
        if !args.faults.is_empty() {
            self.faults = args.faults.clone();
        }
        if args.faults_file.is_some() {
            self.faults_file = args.faults_file.clone();
        }
        if args.plaintext.is_some() {
            self.plaintext = args.plaintext.clone();
        }
        if let Some(threads) = args.threads {
            self.threads = threads;
        }
        if let Some(log_level) = &args.log_level {
            self.log_level = log_level.clone();
        }

        // Only override boolean flags if they're true (explicitly set by user)
        if args.analysis {
            self.analysis = true;
        }
        if args.json {
            self.json = true;
        }
    }

    /// Parses every block of the campaign.
    ///
    /// Faults given inline come first, followed by the faults file.
    ///
    /// # Returns
    ///
    /// * `Ok(RecoverInputs)` - Reference, faulted outputs and optional plaintext.
    /// * `Err(DfaError::Config)` - Cipher, reference or faults are missing.
    /// * `Err(DfaError::MalformedInput)` - A block has the wrong width.
    pub fn recover_inputs(&self) -> Result<RecoverInputs, DfaError> {
        let kind = self
            .cipher
            .ok_or_else(|| DfaError::Config("No cipher selected (--cipher aes|des)".to_string()))?;
        let reference = self
            .reference
            .as_deref()
            .ok_or_else(|| DfaError::Config("No reference output given".to_string()))?;
        let reference = Block::parse(kind, reference)?;

        let mut faulted = self
            .faults
            .iter()
            .map(|text| Block::parse(kind, text))
            .collect::<Result<Vec<_>, _>>()?;
        if let Some(path) = &self.faults_file {
            faulted.extend(load_blocks(path, kind)?);
        }
        if faulted.is_empty() {
            return Err(DfaError::Config(
                "No faulted outputs given (--faults or --faults-file)".to_string(),
            ));
        }

        let plaintext = self
            .plaintext
            .as_deref()
            .map(|text| Block::parse(kind, text))
            .transpose()?;

        Ok(RecoverInputs {
            kind,
            reference,
            faulted,
            plaintext,
        })
    }
}

/// Public function to parse hex values, used by CLI argument parser
pub fn parse_hex_value(s: &str) -> Result<String, String> {
    parse_hex(s)
}

/// Differential fault analysis of AES-128 and DES.
#[derive(Parser, Debug)]
#[command(name = "dfa", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Recover the last round key from faulted outputs
    Recover(RecoverArgs),
    /// Encrypt plaintexts with a known key
    Encrypt(EncryptArgs),
    /// Recover the DES master key from its round 16 key
    Reverse(ReverseArgs),
    /// Produce faulted outputs for a known key
    Simulate(SimulateArgs),
}

/// Command-line arguments of the `recover` command.
///
/// # Fields
///
/// * `config` - Load campaign configuration from JSON5 file.
/// * `cipher` - Cipher under attack.
/// * `reference` - Unfaulted output of the known plaintext.
/// * `faults` - Faulted outputs given inline.
/// * `faults_file` - Capture file with one faulted output per line.
/// * `plaintext` - Known plaintext, enables DES master key recovery.
/// * `threads` - Number of analysis threads.
/// * `analysis` - Print a diff dump of every faulted output.
/// * `json` - Print the result as JSON.
/// * `log_level` - Default log filter, `RUST_LOG` takes precedence.
#[derive(Args, Debug, Default)]
pub struct RecoverArgs {
    /// Load configuration from JSON5 file
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Cipher under attack
    #[arg(long, value_enum)]
    pub cipher: Option<CipherKind>,

    /// Reference (unfaulted) output in hex
    #[arg(short, long, value_parser = parse_hex_value)]
    pub reference: Option<String>,

    /// Faulted outputs in hex.
    ///   --faults [output] [optional: output2 output3 ...]
    #[arg(long, value_delimiter = ' ', num_args = 1.., value_parser = parse_hex_value, verbatim_doc_comment)]
    pub faults: Vec<String>,

    /// Capture file with one faulted output per line, `-` for stdin
    #[arg(short, long)]
    pub faults_file: Option<PathBuf>,

    /// Known plaintext, recovers the DES master key as well
    #[arg(short, long, value_parser = parse_hex_value)]
    pub plaintext: Option<String>,

    /// Number of threads started in parallel [default: 4]
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Print a diff dump of every faulted output
    #[arg(short, long, default_value_t = false)]
    pub analysis: bool,

    /// Print the result as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Log level used when RUST_LOG is not set [default: warn]
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Args, Debug)]
pub struct EncryptArgs {
    /// Cipher to run
    #[arg(long, value_enum)]
    pub cipher: CipherKind,

    /// Master key in hex
    #[arg(short, long, value_parser = parse_hex_value)]
    pub key: String,

    /// Plaintexts in hex
    #[arg(short, long, value_delimiter = ' ', num_args = 1.., value_parser = parse_hex_value)]
    pub plaintext: Vec<String>,

    /// File with one plaintext per line
    #[arg(long)]
    pub plaintext_file: Option<PathBuf>,

    /// Print the key schedule
    #[arg(long, default_value_t = false)]
    pub round_keys: bool,
}

#[derive(Args, Debug)]
pub struct ReverseArgs {
    /// Known plaintext in hex
    #[arg(long, value_parser = parse_hex_value)]
    pub plain: String,

    /// Unfaulted ciphertext of the plaintext
    #[arg(short, long, value_parser = parse_hex_value)]
    pub reference: String,

    /// 48 bit round 16 key (12 hex digits)
    #[arg(long, value_parser = parse_hex_value)]
    pub final_key: String,
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Cipher to run
    #[arg(long, value_enum)]
    pub cipher: CipherKind,

    /// Master key in hex
    #[arg(short, long, value_parser = parse_hex_value)]
    pub key: String,

    /// Known plaintext in hex
    #[arg(short, long, value_parser = parse_hex_value)]
    pub plaintext: String,

    /// Run a command line defined list of faults.
    ///   --faults [fault] [optional: fault2 fault3 ...]
    ///     E.g.: --faults aesbyte_r9_0_01 aesbyte_r9_1_02
    #[arg(long, value_delimiter = ' ', num_args = 1.., verbatim_doc_comment)]
    pub faults: Vec<String>,

    /// Run the suggested fault list of the cipher
    #[arg(long, default_value_t = false)]
    pub all: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json5_config_with_defaults() {
        let config: Config = json5::from_str(
            r#"{
                // AES campaign
                cipher: "aes",
                reference: "0x6D05C96E095097C093834E868428C118",
                faults: ["6d05c96e095097c093834e868428c119"],
            }"#,
        )
        .unwrap();
        assert_eq!(config.cipher, Some(CipherKind::Aes));
        assert_eq!(config.reference.as_deref(), Some("6D05C96E095097C093834E868428C118"));
        assert_eq!(config.threads, 4);
        assert_eq!(config.log_level, "warn");
        assert!(!config.json);
    }

    #[test]
    fn bad_hex_in_config_is_rejected() {
        assert!(json5::from_str::<Config>(r#"{ faults: ["xyz"] }"#).is_err());
    }

    #[test]
    fn arguments_override_file_values() {
        let mut config = Config {
            threads: 8,
            reference: Some("00".to_string()),
            ..Default::default()
        };
        let args = RecoverArgs {
            cipher: Some(CipherKind::Des),
            reference: Some("0102030405060708".to_string()),
            json: true,
            ..Default::default()
        };
        config.override_with_args(&args);
        assert_eq!(config.cipher, Some(CipherKind::Des));
        assert_eq!(config.reference.as_deref(), Some("0102030405060708"));
        assert_eq!(config.threads, 8);
        assert!(config.json);
    }

    #[test]
    fn inputs_need_cipher_reference_and_faults() {
        let mut config = Config::default();
        assert!(matches!(config.recover_inputs(), Err(DfaError::Config(_))));
        config.cipher = Some(CipherKind::Des);
        config.reference = Some("BB1D3957EF45B0C5".to_string());
        assert!(matches!(config.recover_inputs(), Err(DfaError::Config(_))));
        config.faults = vec!["B91C3953EF44B0D1".to_string()];
        let inputs = config.recover_inputs().unwrap();
        assert_eq!(inputs.faulted, vec![Block::Des(0xB91C_3953_EF44_B0D1)]);
        assert_eq!(inputs.plaintext, None);
    }

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::try_parse_from([
            "dfa", "recover", "--cipher", "des", "-r", "BB1D3957EF45B0C5", "--faults",
            "B91C3953EF44B0D1", "--threads", "2",
        ])
        .unwrap();
        match cli.command {
            Command::Recover(args) => {
                assert_eq!(args.cipher, Some(CipherKind::Des));
                assert_eq!(args.faults.len(), 1);
                assert_eq!(args.threads, Some(2));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
