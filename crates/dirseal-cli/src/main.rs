//! Command-line interface for dirseal.
//!
//! Issues signing keys, creates signed containers from a payload directory and
//! validates containers against a public key.

use clap::{ArgAction, Parser, Subcommand};
use dirseal::{crypto, Certificate, ContainerSigner, ContainerValidator};
use secrecy::SecretString;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dirseal")]
#[command(about = "Sign directory trees and detect tampering", version)]
struct Cli {
    /// Increase log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a key pair: <OUTPUT>.pem and <OUTPUT>.publickey
    CreateCertificate {
        /// Output path without extension
        output: PathBuf,

        /// Encrypt the private key with this password
        #[arg(long)]
        password: Option<String>,

        /// Replace existing key files
        #[arg(long)]
        overwrite: bool,

        /// RSA modulus size
        #[arg(long, default_value_t = crypto::DEFAULT_KEY_BITS)]
        bits: usize,
    },

    /// Copy a directory into a new signed container
    CreateContainer {
        /// Payload directory
        input: PathBuf,

        /// Container directory to create
        output: PathBuf,

        /// Private key file (PEM, PKCS#12 or PKCS#8 DER)
        #[arg(long)]
        certificate: PathBuf,

        /// Password for the private key
        #[arg(long)]
        password: Option<String>,

        /// Replace an existing container
        #[arg(long)]
        overwrite: bool,
    },

    /// Check a container's signature and content
    ValidateContainer {
        /// Container directory
        folder: PathBuf,

        /// Public key file written by create-certificate
        #[arg(long)]
        public_key_file: PathBuf,
    },
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

fn run(command: Command) -> dirseal::Result<()> {
    match command {
        Command::CreateCertificate {
            output,
            password,
            overwrite,
            bits,
        } => {
            let password = password.map(SecretString::new);
            let certificate = crypto::issue(bits)?;
            let files =
                crypto::write_key_files(&certificate, &output, password.as_ref(), overwrite)?;
            println!("Private key: {}", files.private_key.display());
            println!("Public key:  {}", files.public_key.display());
        }
        Command::CreateContainer {
            input,
            output,
            certificate,
            password,
            overwrite,
        } => {
            let password = password.map(SecretString::new);
            let key = Certificate::load_private(&certificate, password.as_ref())?;
            debug!(?key, "loaded signing key");

            let manifest = ContainerSigner::new()
                .credentials(key)
                .overwrite(overwrite)
                .create(&input, &output)?;
            println!("Created: {} ({} files)", output.display(), manifest.len());
        }
        Command::ValidateContainer {
            folder,
            public_key_file,
        } => {
            let public_key = Certificate::load_public(&public_key_file)?;
            let manifest = ContainerValidator::new(public_key).validate(&folder)?;
            println!("VALID: {} ({} files)", folder.display(), manifest.len());
        }
    }
    Ok(())
}
