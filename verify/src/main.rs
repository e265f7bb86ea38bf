use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context};
use clap::Parser;
use privy_jobs_contract::{Address, Chain, ExportedInput, FhevmError};

#[derive(Parser)]
#[command(name = "privy-jobs-verify")]
#[command(about = "Verify exported FHEPrivyJobs input proofs from .bin or .hex files")]
struct Args {
    /// Path to the exported input (.bin or .hex)
    #[arg(short, long)]
    file: PathBuf,

    /// Chain snapshot holding the coprocessor key and contract state
    #[arg(short, long, default_value = "privy-jobs-data/chain.bin")]
    state: PathBuf,

    /// Expected contract address
    #[arg(long)]
    contract: Option<Address>,

    /// Expected account address
    #[arg(long)]
    account: Option<Address>,

    /// Show detailed information
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::filter::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    println!("🔍 FHEPrivyJobs Input Proof Verifier");
    println!("═══════════════════════════════════");
    println!("📁 Reading input file: {}", args.file.display());

    let format = if args.file.extension().and_then(|e| e.to_str()) == Some("hex") { "hex" } else { "binary" };
    println!("🔄 Reading {format} data...");
    if args.verbose {
        let size = fs::metadata(&args.file)?.len();
        println!("📊 File size: {size} bytes");
    }

    println!("📖 Deserializing exported input...");
    let exported = ExportedInput::read(&args.file).context("not an exported input")?;
    if args.verbose {
        println!("   • Chain id: {}", exported.chain_id);
        println!("   • Contract: {}", exported.contract);
        println!("   • Account: {}", exported.user);
        println!("   • Proof size: {} bytes", exported.encrypted.input_proof.0.len());
    }

    println!("🔗 Checking proof binding...");
    if let Some(contract) = args.contract {
        if contract != exported.contract {
            bail!("input is bound to contract {}, expected {contract}", exported.contract);
        }
    }
    if let Some(account) = args.account {
        if account != exported.user {
            bail!("input is bound to account {}, expected {account}", exported.user);
        }
    }
    let contents = exported.proof_contents()?;
    println!("✅ Proof binds {} handle(s) to {} / {}", contents.handles.len(), contents.contract, contents.user);

    println!("📂 Loading chain snapshot: {}", args.state.display());
    let chain = Chain::load(&args.state).with_context(|| format!("failed to load {}", args.state.display()))?;
    if chain.chain_id() != exported.chain_id {
        bail!("input was exported for chain {} but the snapshot is chain {}", exported.chain_id, chain.chain_id());
    }

    println!("🔐 Verifying coprocessor signature...");
    let verify_start = Instant::now();
    let signer = chain.coprocessor().signer_public_key();
    match contents.verify_signature(&signer, chain.chain_id()) {
        Ok(()) => {
            println!("🎉 PROOF VERIFICATION SUCCESSFUL! ({:.2?})", verify_start.elapsed());
            if args.verbose {
                println!("   • Coprocessor key: {}", hex::encode(&signer[..]));
            }
        }
        Err(e @ FhevmError::BadSignature) => {
            println!("❌ PROOF VERIFICATION FAILED: {}", e);
            bail!("Verification failed: {e}");
        }
        Err(e) => return Err(e.into()),
    }

    let stored = chain.contract(exported.contract).map(|contract| contract.get_encrypted_job(exported.user));
    for handle in &contents.handles {
        let fhe_type = handle.fhe_type().map(|t| format!("{t:?}")).unwrap_or_else(|| "unknown".to_string());
        let on_chain = if stored == Some(*handle) { "stored on-chain" } else { "not stored" };
        println!("➡️  {handle} ({fhe_type}): {on_chain}");
    }
    if stored.is_none() {
        println!("⚠️  No FHEPrivyJobs contract at {}", exported.contract);
    }

    println!("\n🏆 Input proof verification completed successfully!");
    Ok(())
}
