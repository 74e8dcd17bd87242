use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use haulscout_core::{
    create_criteria_table, create_load_table, create_saved_load_table, format_backhaul, write_loads_csv,
    AppConfig, Cipher, Credentials, Database, HaulError, SavedLoadStatus, SearchCriteria, SessionCredentials,
};
use haulscout_scrapers::worker::wait_for;
use haulscout_scrapers::{
    load_session, ChromeLauncher, JobOutcome, ScanContext, ScanJob, ScanPipeline, ScanWorker, ScanWorkerHandle,
};
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Database file path (-d, --database)
    #[arg(short = 'd', long, global = true, env = "HAULSCOUT_DB", default_value = "haulscout.db")]
    database: PathBuf,

    /// TOML file with browser and marketplace settings (-c, --config)
    #[arg(short = 'c', long, global = true, env = "HAULSCOUT_CONFIG")]
    config: Option<PathBuf>,

    /// User the command acts for (-u, --user)
    #[arg(short = 'u', long, global = true, env = "HAULSCOUT_USER", default_value = "local")]
    user: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the stored marketplace session
    #[command(subcommand)]
    Credentials(CredentialsCommand),

    /// Manage saved searches
    #[command(subcommand)]
    Criteria(CriteriaCommand),

    /// Scan saved searches for new loads
    #[command(long_about = "Scan saved searches for new loads. Jobs run on the background worker; \
        use --wait to print each result as it finishes.")]
    Scan(ScanCommand),

    /// Show loads already booked on the marketplace
    Booked,

    /// Browse loads found by earlier scans
    #[command(subcommand)]
    Loads(LoadsCommand),

    /// Manage loads marked as interesting
    #[command(subcommand)]
    Saved(SavedCommand),

    /// Suggest return loads for a saved load
    Backhaul(BackhaulCommand),
}

#[derive(Subcommand)]
enum CredentialsCommand {
    /// Store an encrypted marketplace session
    Set {
        /// Marketplace account email
        #[arg(long)]
        email: String,

        /// Session cookie value copied from a logged-in browser
        #[arg(long, env = "HAULSCOUT_SESSION_COOKIE", hide_env_values = true)]
        cookie: String,

        /// CSRF token copied from a logged-in browser
        #[arg(long, env = "HAULSCOUT_CSRF_TOKEN", hide_env_values = true, default_value = "")]
        csrf_token: String,
    },

    /// Show the stored session without revealing secrets
    Show,

    /// Check that the marketplace still accepts the stored session
    Check,
}

#[derive(Args)]
struct CriteriaFields {
    /// Origin city (-o, --origin-city)
    #[arg(short = 'o', long)]
    origin_city: Option<String>,

    /// Origin state code
    #[arg(long)]
    origin_state: Option<String>,

    /// Destination city (-t, --destination-city)
    #[arg(short = 't', long)]
    destination_city: Option<String>,

    /// Destination state code
    #[arg(long)]
    destination_state: Option<String>,

    /// Pickup radius in miles (-r, --radius)
    #[arg(short = 'r', long = "radius")]
    pickup_distance: Option<i64>,

    /// Equipment type, e.g. "Dry Van" (-e, --equipment)
    #[arg(short = 'e', long = "equipment")]
    equipment_type: Option<String>,

    /// Minimum payout in USD (-p, --min-rate)
    #[arg(short = 'p', long)]
    min_rate: Option<f64>,

    /// Minimum weight in lbs
    #[arg(long)]
    min_weight: Option<f64>,

    /// Maximum weight in lbs
    #[arg(long)]
    max_weight: Option<f64>,

    /// Booking type filter
    #[arg(long)]
    booking_type: Option<String>,

    /// Use this search as a backhaul preference
    #[arg(long)]
    backhaul: Option<bool>,
}

impl CriteriaFields {
    /// Overwrites the fields that were given on the command line.
    fn apply(self, criteria: &mut SearchCriteria) {
        macro_rules! set {
            ($($field:ident),*) => {
                $(if let Some(value) = self.$field {
                    criteria.$field = Some(value);
                })*
            };
        }
        set!(
            origin_city,
            origin_state,
            destination_city,
            destination_state,
            pickup_distance,
            equipment_type,
            min_rate,
            min_weight,
            max_weight,
            booking_type
        );
        if let Some(backhaul) = self.backhaul {
            criteria.backhaul = backhaul;
        }
    }
}

#[derive(Subcommand)]
enum CriteriaCommand {
    /// Add a saved search
    Add {
        #[command(flatten)]
        fields: CriteriaFields,

        /// Scan the new search right away
        #[arg(long)]
        scan: bool,
    },

    /// List saved searches with their last scan status
    List {
        /// Include deleted searches (-a, --all)
        #[arg(short = 'a', long)]
        all: bool,
    },

    /// Change fields of a saved search
    Edit {
        id: i64,
        #[command(flatten)]
        fields: CriteriaFields,
    },

    /// Delete a saved search
    Delete {
        id: i64,

        /// Remove the search and its found loads for good
        #[arg(long)]
        hard: bool,
    },

    /// Bring back a deleted search
    Restore { id: i64 },
}

#[derive(Args)]
struct ScanCommand {
    /// Criteria to scan. Scans every active search when empty.
    ids: Vec<i64>,

    /// Wait for each scan and print its result (-w, --wait)
    #[arg(short = 'w', long)]
    wait: bool,
}

#[derive(Subcommand)]
enum LoadsCommand {
    /// List loads found for a saved search
    List { criteria_id: i64 },

    /// Export found loads to CSV
    Export {
        /// Only export this search's loads
        #[arg(long)]
        criteria_id: Option<i64>,

        /// Output file path (-o, --output)
        #[arg(short = 'o', long, default_value = "loads.csv")]
        output: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SavedList {
    Interested,
    Trash,
}

impl From<SavedList> for SavedLoadStatus {
    fn from(value: SavedList) -> Self {
        match value {
            SavedList::Interested => SavedLoadStatus::Interested,
            SavedList::Trash => SavedLoadStatus::Trash,
        }
    }
}

#[derive(Subcommand)]
enum SavedCommand {
    /// Save a found load
    Add {
        found_load_id: i64,

        /// Look for return loads right away
        #[arg(long)]
        backhaul: bool,
    },

    /// List saved loads
    List {
        #[arg(value_enum, default_value_t = SavedList::Interested)]
        status: SavedList,
    },

    /// Move a saved load to the trash
    Trash { id: i64 },

    /// Take a saved load out of the trash
    Restore { id: i64 },

    /// Delete a saved load and its backhaul suggestion
    Remove { id: i64 },
}

#[derive(Args)]
struct BackhaulCommand {
    saved_load_id: i64,

    /// Show the stored suggestion without searching again
    #[arg(long)]
    cached: bool,
}

struct App {
    db: Database,
    config: AppConfig,
    user: String,
}

impl App {
    fn pipeline(&self) -> anyhow::Result<Arc<ScanPipeline>> {
        let launcher = Arc::new(ChromeLauncher::new(self.config.browser.clone()));
        Ok(Arc::new(ScanPipeline::new(launcher, self.config.marketplace.clone())?))
    }

    fn worker(&self) -> anyhow::Result<ScanWorkerHandle> {
        let context = ScanContext {
            db: self.db.clone(),
            pipeline: self.pipeline()?,
            cipher: Cipher::from_env()?,
            backhaul_top_n: self.config.worker.backhaul_top_n,
        };
        Ok(ScanWorker::spawn(context, &self.config.worker))
    }

    async fn credentials(&self, command: CredentialsCommand) -> anyhow::Result<()> {
        match command {
            CredentialsCommand::Set { email, cookie, csrf_token } => {
                if cookie.trim().is_empty() {
                    bail!("session cookie must not be empty");
                }
                let session = SessionCredentials { email, cookie, csrf_token };
                let credentials = Credentials::seal(&self.user, &session, &Cipher::from_env()?)?;
                self.db.upsert_credentials(&credentials).await?;
                println!("Stored marketplace session for {}", self.user);
            }
            CredentialsCommand::Show => {
                let credentials = self
                    .db
                    .get_credentials(&self.user)
                    .await?
                    .ok_or_else(|| HaulError::NotConnected(self.user.clone()))?;
                let session = credentials.open(&Cipher::from_env()?)?;
                println!("User:           {}", credentials.user_id);
                println!("Email:          {}", session.email);
                println!("Valid:          {}", credentials.is_valid);
                match credentials.last_validated_at {
                    Some(at) => println!("Last validated: {}", at.format("%Y-%m-%d %H:%M")),
                    None => println!("Last validated: never"),
                }
                println!("Updated:        {}", credentials.updated_at.format("%Y-%m-%d %H:%M"));
            }
            CredentialsCommand::Check => {
                let session = self
                    .db
                    .get_credentials(&self.user)
                    .await?
                    .ok_or_else(|| HaulError::NotConnected(self.user.clone()))?
                    .open(&Cipher::from_env()?)?;
                match self.pipeline()?.verify_session(&session).await {
                    Ok(()) => {
                        self.db.mark_credentials_validity(&self.user, true).await?;
                        println!("Marketplace session is valid");
                    }
                    Err(HaulError::SessionExpired) => {
                        self.db.mark_credentials_validity(&self.user, false).await?;
                        return Err(HaulError::SessionExpired.into());
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }
        Ok(())
    }

    async fn criteria(&self, command: CriteriaCommand) -> anyhow::Result<()> {
        match command {
            CriteriaCommand::Add { fields, scan } => {
                let mut criteria = SearchCriteria::new(&self.user);
                fields.apply(&mut criteria);
                let id = self.db.create_criteria(&mut criteria).await?;
                println!("Added criteria {}", id);
                if scan {
                    self.scan(ScanCommand { ids: vec![id], wait: true }).await?;
                }
            }
            CriteriaCommand::List { all } => {
                let criteria = self.db.list_criteria(Some(&self.user), all).await?;
                if criteria.is_empty() {
                    println!("No saved searches");
                } else {
                    println!("{}", create_criteria_table(&criteria));
                }
            }
            CriteriaCommand::Edit { id, fields } => {
                let mut criteria = self.owned_criteria(id).await?;
                fields.apply(&mut criteria);
                self.db.update_criteria(&mut criteria).await?;
                println!("Updated criteria {}", id);
            }
            CriteriaCommand::Delete { id, hard } => {
                self.owned_criteria(id).await?;
                if hard {
                    self.db.delete_criteria(id).await?;
                    println!("Deleted criteria {} and its loads", id);
                } else {
                    self.db.soft_delete_criteria(id).await?;
                    println!("Deleted criteria {} (restore with `criteria restore {}`)", id, id);
                }
            }
            CriteriaCommand::Restore { id } => {
                self.owned_criteria(id).await?;
                self.db.restore_criteria(id).await?;
                println!("Restored criteria {}", id);
            }
        }
        Ok(())
    }

    async fn owned_criteria(&self, id: i64) -> anyhow::Result<SearchCriteria> {
        self.db
            .get_user_criteria(&self.user, id)
            .await?
            .ok_or_else(|| HaulError::NotFound(format!("criteria {}", id)).into())
    }

    async fn scan(&self, command: ScanCommand) -> anyhow::Result<()> {
        let ids = if command.ids.is_empty() {
            self.db
                .list_criteria(Some(&self.user), false)
                .await?
                .into_iter()
                .filter_map(|c| c.id)
                .collect()
        } else {
            for id in &command.ids {
                self.owned_criteria(*id).await?;
            }
            command.ids
        };
        if ids.is_empty() {
            println!("Nothing to scan");
            return Ok(());
        }

        let worker = self.worker()?;
        let mut pending = Vec::with_capacity(ids.len());
        for id in ids {
            pending.push((id, worker.submit(ScanJob::Criteria(id)).await?));
        }
        info!("Queued {} scans", pending.len());

        if command.wait {
            for (id, receiver) in pending {
                match wait_for(receiver).await {
                    Ok(JobOutcome::Scan(report)) => {
                        println!("Criteria {}: {} loads ({} new)", id, report.found, report.inserted)
                    }
                    Ok(_) => {}
                    Err(e) => println!("Criteria {}: {}", id, e.user_message()),
                }
            }
            worker.shutdown().await;
        } else {
            drop(pending);
            worker.shutdown().await;
            let criteria = self.db.list_criteria(Some(&self.user), false).await?;
            println!("{}", create_criteria_table(&criteria));
        }
        Ok(())
    }

    async fn booked(&self) -> anyhow::Result<()> {
        let session = load_session(&self.db, &Cipher::from_env()?, &self.user).await?;
        let loads = self.pipeline()?.scan_booked(&session).await?;
        if loads.is_empty() {
            println!("No booked loads");
        } else {
            println!("{}", create_load_table(&loads));
        }
        Ok(())
    }

    async fn loads(&self, command: LoadsCommand) -> anyhow::Result<()> {
        match command {
            LoadsCommand::List { criteria_id } => {
                self.owned_criteria(criteria_id).await?;
                let found = self.db.list_found_loads(criteria_id).await?;
                if found.is_empty() {
                    println!("No loads found for criteria {}", criteria_id);
                } else {
                    println!("{}", create_load_table(found.iter().map(|f| &f.details)));
                }
            }
            LoadsCommand::Export { criteria_id, output } => {
                let criteria_ids = match criteria_id {
                    Some(id) => {
                        self.owned_criteria(id).await?;
                        vec![id]
                    }
                    None => self
                        .db
                        .list_criteria(Some(&self.user), false)
                        .await?
                        .into_iter()
                        .filter_map(|c| c.id)
                        .collect(),
                };

                let mut found = Vec::new();
                for id in criteria_ids {
                    found.extend(self.db.list_found_loads(id).await?);
                }

                let file = File::create(&output).with_context(|| format!("creating {}", output.display()))?;
                write_loads_csv(file, &found)?;
                println!("Exported {} loads to {}", found.len(), output.display());
            }
        }
        Ok(())
    }

    async fn saved(&self, command: SavedCommand) -> anyhow::Result<()> {
        match command {
            SavedCommand::Add { found_load_id, backhaul } => {
                let saved = self.db.save_found_load(&self.user, found_load_id).await?;
                let saved_id = saved.id.unwrap_or_default();
                println!("Saved load {} as {}", saved.load_id, saved_id);
                if backhaul {
                    self.backhaul(BackhaulCommand { saved_load_id: saved_id, cached: false }).await?;
                }
            }
            SavedCommand::List { status } => {
                let saved = self.db.list_saved_loads(&self.user, status.into()).await?;
                if saved.is_empty() {
                    println!("No saved loads");
                } else {
                    println!("{}", create_saved_load_table(&saved));
                }
            }
            SavedCommand::Trash { id } => {
                self.owned_saved(id).await?;
                self.db.set_saved_load_status(id, SavedLoadStatus::Trash).await?;
                println!("Moved saved load {} to trash", id);
            }
            SavedCommand::Restore { id } => {
                self.owned_saved(id).await?;
                self.db.set_saved_load_status(id, SavedLoadStatus::Interested).await?;
                println!("Restored saved load {}", id);
            }
            SavedCommand::Remove { id } => {
                self.owned_saved(id).await?;
                self.db.remove_saved_load(id).await?;
                println!("Removed saved load {}", id);
            }
        }
        Ok(())
    }

    async fn owned_saved(&self, id: i64) -> anyhow::Result<()> {
        match self.db.get_saved_load(id).await? {
            Some(saved) if saved.user_id == self.user => Ok(()),
            _ => Err(HaulError::NotFound(format!("saved load {}", id)).into()),
        }
    }

    async fn backhaul(&self, command: BackhaulCommand) -> anyhow::Result<()> {
        self.owned_saved(command.saved_load_id).await?;

        let backhaul = if command.cached {
            self.db
                .get_backhaul(command.saved_load_id)
                .await?
                .ok_or_else(|| HaulError::NotFound(format!("backhaul for saved load {}", command.saved_load_id)))?
        } else {
            let worker = self.worker()?;
            let receiver = worker.submit(ScanJob::Backhaul(command.saved_load_id)).await?;
            let outcome = wait_for(receiver).await;
            worker.shutdown().await;
            match outcome? {
                JobOutcome::Backhaul(backhaul) => backhaul,
                JobOutcome::Scan(_) => bail!("unexpected scan result for backhaul job"),
            }
        };

        println!("{}", format_backhaul(&backhaul));
        Ok(())
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = AppConfig::load(cli.config.as_deref())
        .with_context(|| format!("loading config {:?}", cli.config))?;
    let db = Database::new(&cli.database)
        .await
        .with_context(|| format!("opening database {}", cli.database.display()))?;
    let app = App { db, config, user: cli.user };

    match cli.command {
        Commands::Credentials(command) => app.credentials(command).await,
        Commands::Criteria(command) => app.criteria(command).await,
        Commands::Scan(command) => app.scan(command).await,
        Commands::Booked => app.booked().await,
        Commands::Loads(command) => app.loads(command).await,
        Commands::Saved(command) => app.saved(command).await,
        Commands::Backhaul(command) => app.backhaul(command).await,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = dotenv {
        if !e.not_found() {
            warn!("Could not read .env: {}", e);
        }
    }

    let cli = Cli::parse();

    match run(cli).await {
        Err(e) => match e.downcast_ref::<HaulError>() {
            Some(haul) if haul.needs_reconnect() => {
                eprintln!("{}", haul.user_message());
                std::process::exit(1);
            }
            _ => Err(e),
        },
        ok => ok,
    }
}
