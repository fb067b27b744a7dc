//! `seal` command line tool.
//!
//! Signs payloads into multi-signature envelopes and verifies them.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rust_seal::{format, KeyKind, PublicKey, Signer, SigningKey, Verifier};
use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Multi-signature envelopes for arbitrary data.
#[derive(Parser)]
#[command(name = "seal")]
#[command(about = "Sign and verify multi-signature envelopes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign input with one or more private keys.
    Sign {
        /// Private key file (PEM PKCS#8). Repeat for several signers.
        #[arg(short, long = "key", required = true)]
        keys: Vec<PathBuf>,

        /// Output only the signature header, not the data.
        #[arg(short, long)]
        detached: bool,

        /// Data to sign (default: stdin).
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Envelope destination (default: stdout).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Verify an envelope with one or more public keys.
    Verify {
        /// Public key file (PEM). A private key file is accepted too. Repeatable.
        #[arg(short, long = "key", required = true)]
        keys: Vec<PathBuf>,

        /// The envelope holds only signatures; read the data from --file.
        #[arg(short, long, requires = "file")]
        detached: bool,

        /// Data file for detached verification.
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Envelope to verify (default: stdin).
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Where to write the verified payload (default: stdout).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print a JSON verification report instead of the payload.
        #[arg(long)]
        json: bool,
    },

    /// Print an envelope header as JSON without verifying it.
    Inspect {
        /// Envelope to inspect (default: stdin).
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Generate a new private key and its public key.
    Keygen {
        /// Key type: ed25519, p256, p384 or p521.
        #[arg(short = 't', long = "type", default_value = "ed25519")]
        kind: KeyKind,

        /// Private key output path.
        #[arg(short, long)]
        output: PathBuf,

        /// Public key output path (default: stdout).
        #[arg(short, long)]
        public: Option<PathBuf>,
    },
}

fn open_input(path: Option<&Path>) -> Result<Box<dyn Read>> {
    match path {
        Some(path) => {
            let file = File::open(path).with_context(|| format!("Unable to open '{}'", path.display()))?;
            Ok(Box::new(file))
        }
        None => Ok(Box::new(io::stdin().lock())),
    }
}

fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Error opening output file '{}'", path.display()))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(io::stdout().lock())),
    }
}

fn sign(keys: &[PathBuf], detached: bool, input: Option<&Path>, output: Option<&Path>) -> Result<()> {
    let keys = keys
        .iter()
        .map(SigningKey::load_from_file)
        .collect::<rust_seal::Result<Vec<_>>>()?;

    let mut reader = open_input(input)?;
    let mut envelope = Vec::new();
    Signer::new()
        .with_keys(&keys)
        .detached(detached)
        .sign_reader(&mut reader, &mut envelope)?;

    // Only create the output once every key has signed.
    let mut out = open_output(output)?;
    out.write_all(&envelope)?;
    out.flush()?;
    Ok(())
}

struct VerifyArgs<'a> {
    keys: &'a [PathBuf],
    detached: bool,
    file: Option<&'a Path>,
    input: Option<&'a Path>,
    output: Option<&'a Path>,
    json: bool,
}

fn verify(args: VerifyArgs<'_>) -> Result<()> {
    let mut verifier = Verifier::new();
    for path in args.keys {
        let key = PublicKey::load_from_file(path)?;
        verifier = verifier.with_key(path.display().to_string(), key);
    }

    let envelope = open_input(args.input)?;
    let result = if args.detached {
        let Some(file) = args.file else {
            bail!("Detached mode specified but no data file (-f) supplied");
        };
        let mut data = File::open(file)
            .with_context(|| format!("Unable to open data file '{}'", file.display()))?;
        verifier.verify_detached(envelope, &mut data)?
    } else {
        verifier.verify_reader(envelope)?
    };

    let mut out = open_output(args.output)?;
    if args.json {
        writeln!(out, "{}", result.to_json()?)?;
    } else if let Some(payload) = &result.payload {
        if args.output.is_none() {
            eprintln!("\n   Signed Contents Follows:\n------------------------------");
        }
        out.write_all(payload)?;
    }
    out.flush()?;
    Ok(())
}

fn inspect(input: Option<&Path>) -> Result<()> {
    let (header, _) = format::parse(open_input(input)?)?;
    println!("{}", header.to_json()?);
    Ok(())
}

fn keygen(kind: KeyKind, output: &Path, public: Option<&Path>) -> Result<()> {
    let key = SigningKey::generate(kind);
    key.save_to_file(output)
        .with_context(|| format!("Error writing private key file '{}'", output.display()))?;

    let public_key = key.public_key();
    match public {
        Some(path) => public_key
            .save_to_file(path)
            .with_context(|| format!("Error writing public key file '{}'", path.display()))?,
        None => print!("{}", public_key.to_public_key_pem()?),
    }

    tracing::info!("Generated {} key at '{}'", kind, output.display());
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Sign {
            keys,
            detached,
            input,
            output,
        } => sign(&keys, detached, input.as_deref(), output.as_deref()),
        Commands::Verify {
            keys,
            detached,
            file,
            input,
            output,
            json,
        } => verify(VerifyArgs {
            keys: &keys,
            detached,
            file: file.as_deref(),
            input: input.as_deref(),
            output: output.as_deref(),
            json,
        }),
        Commands::Inspect { input } => inspect(input.as_deref()),
        Commands::Keygen {
            kind,
            output,
            public,
        } => keygen(kind, &output, public.as_deref()),
    }
}
