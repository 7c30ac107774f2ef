use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::TryStreamExt;
use object_storage_drivers::{
    open_storage, ByteRange, DriverRegistry, ObjectKey, ObjectStorage, StorageConfig,
};
use std::process::ExitCode;
use tokio::io::AsyncWriteExt;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "object-storage-cli")]
#[command(about = "Work with any registered object storage through one interface", long_about = None)]
struct Cli {
    /// Storage URI, e.g. gs://bucket.region, file:///data, mem://scratch
    #[arg(short, long, env = "OBJECT_STORAGE_URI")]
    uri: Option<String>,

    /// Access key handed to the driver
    #[arg(long, env = "OBJECT_STORAGE_ACCESS_KEY", default_value = "")]
    access_key: String,

    /// Secret key handed to the driver
    #[arg(long, env = "OBJECT_STORAGE_SECRET_KEY", default_value = "", hide_env_values = true)]
    secret_key: String,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the container if it does not exist
    Create,

    /// Upload a file
    Put {
        /// Object key
        key: String,
        /// File path to upload
        file: String,
    },

    /// Download an object, or a byte range of it
    Get {
        /// Object key
        key: String,
        /// Output file path, stdout when omitted
        #[arg(short, long)]
        output: Option<String>,
        /// First byte to read
        #[arg(long, default_value_t = 0)]
        offset: u64,
        /// Number of bytes to read, 0 reads to the end
        #[arg(long, default_value_t = 0)]
        limit: u64,
    },

    /// Copy an object inside the container
    Copy {
        /// Source key
        src: String,
        /// Destination key
        dst: String,
    },

    /// Check whether an object exists
    Exists {
        /// Object key
        key: String,
    },

    /// Delete an object
    Delete {
        /// Object key
        key: String,
    },

    /// List objects
    List {
        /// Prefix to filter objects
        #[arg(short, long, default_value = "")]
        prefix: String,
        /// Objects fetched per request
        #[arg(long, default_value_t = 1000)]
        page_size: usize,
    },

    /// Show the registered URI schemes
    Schemes,
}

impl Cli {
    fn init_logging(&self) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.log_level.to_lowercase()));

        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    fn storage_config(&self) -> Result<StorageConfig> {
        let uri = self
            .uri
            .clone()
            .context("a storage URI is required (--uri or OBJECT_STORAGE_URI)")?;
        Ok(StorageConfig::new(uri).with_credentials(&self.access_key, &self.secret_key))
    }
}

fn object_key(key: &str) -> Result<ObjectKey> {
    ObjectKey::new(key.to_string()).with_context(|| format!("invalid object key: {:?}", key))
}

async fn run(cli: Cli, registry: &DriverRegistry) -> Result<ExitCode> {
    if let Commands::Schemes = cli.command {
        for scheme in registry.schemes() {
            println!("{}", scheme);
        }
        return Ok(ExitCode::SUCCESS);
    }

    let config = cli.storage_config()?;
    let storage = open_storage(registry, &config)
        .with_context(|| format!("failed to open {}", config.uri))?;
    info!(storage = %storage.identity(), "opened storage");

    match cli.command {
        Commands::Create => {
            storage.create().await?;
        }
        Commands::Put { key, file } => {
            let reader = tokio::fs::File::open(&file)
                .await
                .with_context(|| format!("failed to open {}", file))?;
            storage.put(&object_key(&key)?, Box::new(reader)).await?;
        }
        Commands::Get {
            key,
            output,
            offset,
            limit,
        } => {
            let mut reader = storage
                .get(&object_key(&key)?, ByteRange::new(offset, limit))
                .await?;
            match output {
                Some(path) => {
                    let mut file = tokio::fs::File::create(&path)
                        .await
                        .with_context(|| format!("failed to create {}", path))?;
                    tokio::io::copy(&mut reader, &mut file).await?;
                    file.flush().await?;
                }
                None => {
                    let mut stdout = tokio::io::stdout();
                    tokio::io::copy(&mut reader, &mut stdout).await?;
                    stdout.flush().await?;
                }
            }
        }
        Commands::Copy { src, dst } => {
            storage.copy(&object_key(&dst)?, &object_key(&src)?).await?;
        }
        Commands::Exists { key } => match storage.exists(&object_key(&key)?).await {
            Ok(()) => println!("present"),
            Err(err) if err.is_not_found() => {
                println!("absent");
                return Ok(ExitCode::FAILURE);
            }
            Err(err) => return Err(err.into()),
        },
        Commands::Delete { key } => {
            storage.delete(&object_key(&key)?).await?;
        }
        Commands::List { prefix, page_size } => {
            let storage: &dyn ObjectStorage = storage.as_ref();
            let mut objects = Box::pin(storage.start_listing(&prefix, page_size).into_stream());
            while let Some(object) = objects.try_next().await? {
                println!(
                    "{}\t{}\t{}",
                    object.key,
                    object.size,
                    chrono::DateTime::from_timestamp(object.mtime, 0)
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_default()
                );
            }
        }
        Commands::Schemes => {}
    }

    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env file if it exists
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    cli.init_logging();

    let registry = DriverRegistry::with_builtin_drivers();
    run(cli, &registry).await
}
