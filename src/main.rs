//! jarverify CLI
//!
//! Entry point for the `jarverify` command-line tool.

use clap::{Parser, Subcommand};
use jar_verify::config::CONFIG_FILE_NAME;
use jar_verify::manifest::{scan_special_attributes, ManifestParser};
use jar_verify::signature::{
    compute_key_fingerprint, decode_signing_key, encode_signing_key, encode_verifying_key,
    generate_keypair,
};
use jar_verify::{
    DigestAlgorithm, DirectoryArchive, JarError, JarFile, JarSigner, SignerStatus, VerifierConfig,
};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

/// A signed entry failed verification
const EXIT_TRUST_VIOLATION: i32 = 1;

/// Any other failure
const EXIT_ERROR: i32 = 2;

#[derive(Parser)]
#[command(name = "jarverify")]
#[command(about = "Inspect, sign and verify JAR manifests and signatures", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a manifest file and print its attributes
    Inspect {
        /// Path to a MANIFEST.MF or .SF file
        manifest: PathBuf,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Verify every entry of an exploded archive
    Verify {
        /// Root directory of the exploded archive
        dir: PathBuf,

        /// Path to config file (default: ./jarverify.toml)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Runtime release for multi-release lookup
        #[arg(long)]
        release: Option<u32>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Sign an exploded archive in place
    Sign {
        /// Root directory of the exploded archive
        dir: PathBuf,

        /// File holding a base64 Ed25519 signing key
        #[arg(long, short = 'k')]
        key: PathBuf,

        /// Signer name; also names the signature files
        #[arg(long, default_value = "signer")]
        alias: String,

        /// Entry digest algorithm
        #[arg(long, default_value = "SHA-256")]
        digest: String,
    },

    /// Generate a signing key
    Keygen {
        /// Where to write the base64 signing key
        #[arg(long, short = 'o')]
        out: PathBuf,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect { manifest, json } => {
            run_inspect(&manifest, json);
        }
        Commands::Verify {
            dir,
            config,
            release,
            json,
        } => {
            run_verify(&dir, config, release, json);
        }
        Commands::Sign {
            dir,
            key,
            alias,
            digest,
        } => {
            run_sign(&dir, &key, &alias, &digest);
        }
        Commands::Keygen { out } => {
            run_keygen(&out);
        }
    }
}

fn run_inspect(path: &Path, json_output: bool) {
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(e) => {
            eprintln!("Error reading {}: {}", path.display(), e);
            process::exit(EXIT_ERROR);
        }
    };

    let mut parser = ManifestParser::with_file_name(path.display().to_string());
    let manifest = match parser.parse(raw.as_slice()) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Error parsing manifest: {}", e);
            process::exit(EXIT_ERROR);
        }
    };
    let special = scan_special_attributes(&raw);

    if json_output {
        let output = serde_json::json!({
            "manifest": manifest,
            "warnings": parser.warnings(),
            "class_path": special.has_class_path,
            "multi_release": special.multi_release,
        });
        match serde_json::to_string_pretty(&output) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error serializing output: {}", e);
                process::exit(EXIT_ERROR);
            }
        }
        return;
    }

    println!("Main attributes:");
    for (name, value) in manifest.main_attributes() {
        println!("  {}: {}", name, value);
    }
    println!();
    println!("Entries: {}", manifest.entries().len());
    for (name, attributes) in manifest.entries() {
        println!("  {}", name);
        for (key, value) in attributes {
            println!("    {}: {}", key, value);
        }
    }
    for warning in parser.warnings() {
        println!("warning: {}", warning);
    }
}

#[derive(Serialize)]
struct EntryReport {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    real_name: Option<String>,
    size: u64,
    status: &'static str,
    signers: Vec<String>,
}

#[derive(Serialize)]
struct VerifyReport {
    archive: String,
    signed: bool,
    multi_release: bool,
    entries: Vec<EntryReport>,
}

fn load_config(config_path: Option<PathBuf>, release: Option<u32>) -> VerifierConfig {
    let loaded = match config_path {
        Some(path) => VerifierConfig::from_file(&path),
        None => VerifierConfig::from_file_or_default(Path::new(CONFIG_FILE_NAME)),
    };
    let mut config = match loaded {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            process::exit(EXIT_ERROR);
        }
    };

    if let Some(release) = release {
        config.release = release;
    }
    if let Err(e) = config.validate() {
        eprintln!("Configuration error: {}", e);
        process::exit(EXIT_ERROR);
    }
    config
}

fn exit_with(err: JarError) -> ! {
    match err.trust_violation() {
        Some(violation) => {
            eprintln!("SECURITY: {}", violation);
            process::exit(EXIT_TRUST_VIOLATION);
        }
        None => {
            eprintln!("Error: {}", err);
            process::exit(EXIT_ERROR);
        }
    }
}

fn run_verify(dir: &Path, config_path: Option<PathBuf>, release: Option<u32>, json_output: bool) {
    let config = load_config(config_path, release);
    let archive = match DirectoryArchive::open(dir) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error reading {}: {}", dir.display(), e);
            process::exit(EXIT_ERROR);
        }
    };
    let jar = JarFile::with_config(archive, config);

    let signed = jar.is_signed().unwrap_or_else(|e| exit_with(e));
    let multi_release = jar.is_multi_release().unwrap_or_else(|e| exit_with(e));
    let entries = jar.versioned_entries().unwrap_or_else(|e| exit_with(e));

    let mut reports = Vec::with_capacity(entries.len());
    for mut entry in entries {
        if entry.is_directory() {
            continue;
        }
        if let Err(e) = jar.read_entry(&mut entry) {
            exit_with(e);
        }
        let status = match jar.signer_status(entry.real_name()) {
            Ok(SignerStatus::Verified(_)) => "verified",
            Ok(SignerStatus::Claimed(_)) => "claimed",
            Ok(SignerStatus::NotSigned) => "not signed",
            Ok(SignerStatus::Unsigned) => "unsigned",
            Err(e) => exit_with(e),
        };
        reports.push(EntryReport {
            name: entry.name().to_string(),
            real_name: entry.is_versioned().then(|| entry.real_name().to_string()),
            size: entry.size(),
            status,
            signers: entry
                .signers()
                .map(|s| s.iter().map(|c| format!("{} ({})", c.name, c.fingerprint)).collect())
                .unwrap_or_default(),
        });
    }

    let report = VerifyReport {
        archive: dir.display().to_string(),
        signed,
        multi_release,
        entries: reports,
    };

    if json_output {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error serializing output: {}", e);
                process::exit(EXIT_ERROR);
            }
        }
        return;
    }

    println!("Archive: {}", report.archive);
    println!("  Signed: {}", if report.signed { "yes" } else { "no" });
    println!("  Multi-release: {}", if report.multi_release { "yes" } else { "no" });
    println!();
    for entry in &report.entries {
        match &entry.real_name {
            Some(real) => println!("  {:<11} {} -> {}", entry.status, entry.name, real),
            None => println!("  {:<11} {}", entry.status, entry.name),
        }
        for signer in &entry.signers {
            println!("              signed by {}", signer);
        }
    }
    println!();
    println!("{} entries verified", report.entries.len());
}

fn run_sign(dir: &Path, key_path: &Path, alias: &str, digest: &str) {
    let key = match fs::read_to_string(key_path) {
        Ok(encoded) => match decode_signing_key(&encoded) {
            Ok(k) => k,
            Err(e) => {
                eprintln!("Invalid key in {}: {}", key_path.display(), e);
                process::exit(EXIT_ERROR);
            }
        },
        Err(e) => {
            eprintln!("Error reading {}: {}", key_path.display(), e);
            process::exit(EXIT_ERROR);
        }
    };
    let algorithm = match digest.parse::<DigestAlgorithm>() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(EXIT_ERROR);
        }
    };

    let signer = match JarSigner::new(alias, key) {
        Ok(s) => s.with_digest(algorithm),
        Err(e) => {
            eprintln!("{}", e);
            process::exit(EXIT_ERROR);
        }
    };
    let mut archive = match DirectoryArchive::open(dir) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error reading {}: {}", dir.display(), e);
            process::exit(EXIT_ERROR);
        }
    };

    match signer.sign_directory(&mut archive) {
        Ok(files) => {
            println!("Signed {} entries", files.digested);
            println!("  {}", files.signature_file_name);
            println!("  {}", files.block_name);
        }
        Err(e) => {
            eprintln!("Signing failed: {}", e);
            process::exit(EXIT_ERROR);
        }
    }
}

fn run_keygen(out: &Path) {
    let key = generate_keypair();
    if let Err(e) = fs::write(out, encode_signing_key(&key)) {
        eprintln!("Error writing {}: {}", out.display(), e);
        process::exit(EXIT_ERROR);
    }
    let public = key.verifying_key();
    println!("Wrote signing key to {}", out.display());
    println!("  Public key:  {}", encode_verifying_key(&public));
    println!("  Fingerprint: {}", compute_key_fingerprint(&public));
}
