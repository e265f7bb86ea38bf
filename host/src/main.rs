use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context as _};
use clap::{Parser, Subcommand};
use parking_lot::Mutex;
use privy_jobs_contract::deploy::DEPLOY_FHE_PRIVY_JOBS;
use privy_jobs_contract::jobs::SUBMIT_ENCRYPTED_JOB;
use privy_jobs_contract::{deploy_fhe_privy_jobs, Chain, Deployments, ExportedInput, InputBuilder, CONTRACT_NAME};
use privy_jobs_host::catalog::{find_matching_job, JOBS};
use privy_jobs_host::config::{get_config_path, HostConfig};
use privy_jobs_host::encryption::detect_encryption_method;
use privy_jobs_host::view::{ApplicationForm, ApplicationView};
use privy_jobs_host::{
    ClientOptions, DecryptOutcome, FhevmInstance, JobsClient, LocalProvider, Provider, SubmitOutcome, Wallet,
    WalletConnection,
};
use serde_json::json;
use tracing::info;

#[derive(Parser)]
#[command(name = "privy-jobs")]
#[command(about = "Apply to jobs with an FHE-encrypted job id stored on a local fhEVM chain")]
struct Args {
    /// Config file (defaults to ./privy-jobs.json, then ~/.privy-jobs/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print a JSON result instead of the page
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Deploy FHEPrivyJobs; does nothing if already deployed on this chain
    Deploy {
        /// Deployer account
        #[arg(short, long)]
        account: String,
        /// Only run deployment steps carrying one of these tags
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
    },
    /// Create a local account key
    NewAccount { name: String },
    /// List local accounts
    Accounts,
    /// List the job catalog
    Jobs,
    /// Find the job matching a desired salary and experience
    Search {
        #[arg(long)]
        salary: String,
        #[arg(long)]
        experience: String,
    },
    /// Search, then submit the matched job id encrypted
    Apply {
        #[arg(short, long)]
        account: String,
        #[arg(long, default_value = "")]
        name: String,
        #[arg(long, default_value = "")]
        age: String,
        #[arg(long)]
        experience: String,
        #[arg(long)]
        salary: String,
        /// Connect without a signer
        #[arg(long)]
        read_only: bool,
    },
    /// Show the application page for an account
    Status {
        #[arg(short, long)]
        account: String,
    },
    /// Decrypt the stored job id of an account
    Decrypt {
        #[arg(short, long)]
        account: String,
    },
    /// Encrypt a job id and write the input and its proof to a file
    ExportInput {
        #[arg(short, long)]
        account: String,
        job_id: u32,
        /// Output file (.bin or .hex)
        #[arg(short, long)]
        out: PathBuf,
    },
}

/// Everything a command runs against. Loaded from disk at start; the chain
/// snapshot is written back by [`Context::save`].
struct Context {
    config: HostConfig,
    chain: Arc<Mutex<Chain>>,
    deployments: Deployments,
    wallet: Wallet,
}

impl Context {
    fn load(config_path: Option<PathBuf>) -> anyhow::Result<Self> {
        let config_path = match config_path {
            Some(path) => path,
            None => get_config_path()?,
        };
        let config = HostConfig::load_or_default(&config_path)
            .with_context(|| format!("failed to read config {}", config_path.display()))?;
        let chain = Chain::load_or_new(&config.state_path, config.chain_id)?;
        let deployments = Deployments::load(&config.deployments_path)?;
        let wallet = Wallet::load_dir(&config.keys_dir)?;
        info!(state = %config.state_path.display(), block = chain.block_number(), "loaded chain");
        Ok(Self { config, chain: Arc::new(Mutex::new(chain)), deployments, wallet })
    }

    fn provider(&self) -> Arc<LocalProvider> {
        Arc::new(LocalProvider::shared(Arc::clone(&self.chain)))
    }

    async fn connect(&self, account: &str, read_only: bool) -> anyhow::Result<WalletConnection> {
        let chain_id = self.provider().chain_id().await?;
        let signer = self.wallet.get(account)?;
        if read_only {
            return Ok(WalletConnection::read_only(signer.address(), chain_id));
        }
        Ok(self.wallet.connect(account, chain_id)?)
    }

    /// Mounts a fresh client session, as a page load would.
    async fn mount(&self, account: &str, read_only: bool) -> anyhow::Result<JobsClient> {
        let connection = self.connect(account, read_only).await?;
        let provider = self.provider();
        let chain_id = provider.chain_id().await?;
        let contract = self.deployments.get(chain_id, CONTRACT_NAME).cloned();
        let client = JobsClient::mount(
            provider.clone(),
            provider,
            connection,
            contract,
            ClientOptions::from(&self.config),
        );
        client.refresh().await?;
        Ok(client)
    }

    fn save(&self) -> anyhow::Result<()> {
        self.chain.lock().save(&self.config.state_path)?;
        self.deployments.save(&self.config.deployments_path)?;
        Ok(())
    }
}

fn page_json(client: &JobsClient, view: Option<&ApplicationView>) -> serde_json::Value {
    let state = client.state();
    json!({
        "account": client.account().map(|a| a.to_string()),
        "contract": client.contract_address().map(|a| a.to_string()),
        "matched_job": view.and_then(|v| v.matched()),
        "already_applied": state.already_applied(),
        "stored_handle": state.stored_handle.map(|h| h.to_string()),
        "can_decrypt": client.can_decrypt(),
        "decrypted_job_id": state.decrypted_job_id,
        "status": state.status,
    })
}

fn print_page(args_json: bool, client: &JobsClient, view: &ApplicationView) {
    if args_json {
        println!("{}", page_json(client, Some(view)));
    } else {
        print!("{}", view.render(client));
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::filter::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut ctx = Context::load(args.config)?;

    match args.command {
        Command::Deploy { account, tags } => {
            if !DEPLOY_FHE_PRIVY_JOBS.selected_by(&tags) {
                eprintln!("💡 No deployment step matches tags {}", tags.join(","));
                println!("{}", json!({ "contract": CONTRACT_NAME, "skipped": true }));
                return Ok(());
            }
            let deployer = ctx.wallet.get(&account)?.address();
            eprintln!("🚀 Deploying {CONTRACT_NAME} from {deployer}");
            let result = deploy_fhe_privy_jobs(&mut ctx.chain.lock(), deployer, &mut ctx.deployments);
            ctx.save()?;
            if result.newly_deployed {
                eprintln!("✅ {CONTRACT_NAME} contract: {}", result.address);
            } else {
                eprintln!("💡 Already deployed at {}", result.address);
            }
            println!(
                "{}",
                json!({
                    "contract": CONTRACT_NAME,
                    "address": result.address.to_string(),
                    "newly_deployed": result.newly_deployed,
                    "chain_id": ctx.chain.lock().chain_id(),
                })
            );
        }
        Command::NewAccount { name } => {
            let signer = Wallet::create_account(&ctx.config.keys_dir, &name)?;
            eprintln!("🔑 Account {name} ready");
            println!("{}", json!({ "name": name, "address": signer.address().to_string() }));
        }
        Command::Accounts => {
            let accounts: Vec<_> = ctx
                .wallet
                .accounts()
                .iter()
                .map(|s| json!({ "name": s.name(), "address": s.address().to_string() }))
                .collect();
            println!("{}", serde_json::to_string_pretty(&accounts)?);
        }
        Command::Jobs => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&JOBS)?);
            } else {
                for job in &JOBS {
                    println!("{:>2}  {:<28} ${:<6} {}", job.id, job.title, job.salary, job.experience);
                }
            }
        }
        Command::Search { salary, experience } => match find_matching_job(&salary, &experience) {
            Some(job) if args.json => println!("{}", json!(job)),
            Some(job) => println!("{} [{}]\nSalary: ${}", job.title, job.experience, job.salary),
            None if args.json => println!("null"),
            None => println!("{}", privy_jobs_host::view::NO_MATCH),
        },
        Command::Apply { account, name, age, experience, salary, read_only } => {
            let client = ctx.mount(&account, read_only).await?;
            let mut view = ApplicationView::new(ApplicationForm { name, age, experience, desired_salary: salary });
            if client.already_applied() {
                eprintln!("💡 {account} has already applied");
            } else if let Some(job) = view.search() {
                eprintln!("🔐 Applying to {} (job {})", job.title, job.id);
                match view.apply(&client).await {
                    Some(SubmitOutcome::Stored { tx_hash, .. }) => eprintln!("✅ Stored in transaction {tx_hash}"),
                    Some(SubmitOutcome::Failed(_)) | Some(SubmitOutcome::Aborted(_)) => {
                        eprintln!("❌ Application not stored")
                    }
                    Some(SubmitOutcome::Skipped) | None => {}
                }
            }
            ctx.save()?;
            print_page(args.json, &client, &view);
        }
        Command::Status { account } => {
            let client = ctx.mount(&account, false).await?;
            ctx.save()?;
            print_page(args.json, &client, &ApplicationView::default());
        }
        Command::Decrypt { account } => {
            let client = ctx.mount(&account, false).await?;
            eprintln!("🔓 Decrypting stored job id for {account}");
            match client.decrypt().await {
                DecryptOutcome::Decrypted(id) => eprintln!("✅ Decrypted job id {id}"),
                DecryptOutcome::Skipped => eprintln!("💡 Nothing to decrypt"),
                DecryptOutcome::Stale | DecryptOutcome::Failed(_) => eprintln!("❌ Decryption did not complete"),
            }
            ctx.save()?;
            print_page(args.json, &client, &ApplicationView::default());
        }
        Command::ExportInput { account, job_id, out } => {
            let provider = ctx.provider();
            let chain_id = provider.chain_id().await?;
            let Some(info) = ctx.deployments.get(chain_id, CONTRACT_NAME) else {
                bail!("{CONTRACT_NAME} is not deployed on chain {chain_id}");
            };
            let user = ctx.wallet.get(&account)?.address();
            let method = detect_encryption_method(Some(&info.abi), SUBMIT_ENCRYPTED_JOB)?;
            let builder = method.apply(InputBuilder::new(info.address, user), u128::from(job_id))?;
            eprintln!("🔐 Encrypting job id {job_id} with {}", method.name());
            let encrypted = provider.encrypt(builder).await?;
            let exported = ExportedInput { chain_id, contract: info.address, user, encrypted };
            exported.write(&out)?;
            ctx.save()?;
            eprintln!("📁 Encrypted input saved to: {}", out.display());
            println!(
                "{}",
                json!({
                    "file": out.display().to_string(),
                    "handles": exported.encrypted.handles.iter().map(|h| h.to_string()).collect::<Vec<_>>(),
                    "input_proof": exported.encrypted.input_proof.to_string(),
                })
            );
        }
    }

    Ok(())
}
