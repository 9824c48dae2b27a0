//! `notifykit`: developer CLI for topic keys and encrypted push payloads.
//!
//! Keys live in a software keystore under `--root` (or `NOTIFYKIT_ROOT`),
//! so a payload sealed with `encrypt` in one invocation can be opened with
//! `decrypt` or `deliver` in the next.

use std::path::PathBuf;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use clap::{Parser, Subcommand};
use eyre::{eyre, WrapErr};
use notifykit_core::codec::{self, EncryptedEnvelope};
use notifykit_core::push::NotifyMessage;
use notifykit_core::{
    FileKeyProvider, FlowError, KeyAlias, KeystorePaths, MemoryTaskRegistry,
    NotificationDecryptFlow, PayloadConsumer, PushMessage, PushReceiver, SecureKeyStore,
    WorkerCoordinator,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "notifykit")]
#[command(version, about = "Topic keys and encrypted push payloads", long_about = None)]
struct Cli {
    /// Keystore root directory
    #[arg(long, global = true, env = "NOTIFYKIT_ROOT")]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a key for a topic
    Keygen {
        /// Topic alias
        alias: String,
    },

    /// Check whether a topic has a key
    Exists {
        /// Topic alias
        alias: String,
    },

    /// Seal a message for a topic and print the base64 envelope
    Encrypt {
        /// Topic alias
        alias: String,
        /// Plaintext to seal
        text: String,
        /// Associated data bound to the envelope
        #[arg(long, default_value = "")]
        ad: String,
    },

    /// Open a base64 envelope with a topic key
    Decrypt {
        /// Topic alias
        alias: String,
        /// Base64 envelope
        envelope: String,
        /// Associated data the envelope was sealed with
        #[arg(long, default_value = "")]
        ad: String,
    },

    /// Run a push message through the full receive flow
    Deliver {
        /// Topic the push was sent to
        topic: String,
        /// Base64 blob carried by the push
        blob: String,
    },
}

struct PrintingConsumer;

impl PayloadConsumer for PrintingConsumer {
    fn on_plaintext(&self, topic: &KeyAlias, plaintext: Vec<u8>) {
        match NotifyMessage::from_plaintext(&plaintext) {
            Ok(notification) => {
                println!("[{topic}] {}: {}", notification.title, notification.body);
                if let Some(url) = notification.url {
                    println!("  url: {url}");
                }
            }
            Err(_) => println!("[{topic}] {}", String::from_utf8_lossy(&plaintext)),
        }
    }

    fn on_failure(&self, topic: &KeyAlias, error: &FlowError) {
        eprintln!("[{topic}] not delivered: {error}");
    }
}

fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let root = cli
        .root
        .or_else(dirs::data_dir)
        .ok_or_else(|| eyre!("no data directory on this platform, pass --root"))?;
    tracing::debug!(root = %root.display(), "opening keystore");
    let provider = FileKeyProvider::open(KeystorePaths::new(&root))
        .wrap_err_with(|| format!("failed to open keystore at {}", root.display()))?;
    let store = Arc::new(SecureKeyStore::new(Arc::new(provider)));

    match cli.command {
        Command::Keygen { alias } => {
            let alias = KeyAlias::new(alias)?;
            store.generate(&alias)?;
            println!("generated key for {alias}");
        }
        Command::Exists { alias } => {
            let alias = KeyAlias::new(alias)?;
            println!("{}", store.try_exists(&alias)?);
        }
        Command::Encrypt { alias, text, ad } => {
            let key = store.retrieve(&KeyAlias::new(alias)?)?;
            let envelope = codec::encrypt(&key, text.as_bytes(), ad.as_bytes())?;
            println!("{}", envelope.to_base64());
        }
        Command::Decrypt {
            alias,
            envelope,
            ad,
        } => {
            let key = store.retrieve(&KeyAlias::new(alias)?)?;
            let envelope = EncryptedEnvelope::from_base64(envelope.trim())
                .wrap_err("envelope is not valid base64")?;
            let plaintext = codec::decrypt(&key, envelope.as_bytes(), ad.as_bytes())?;
            println!("{}", String::from_utf8_lossy(&plaintext));
        }
        Command::Deliver { topic, blob } => {
            let blob = STANDARD
                .decode(blob.trim())
                .wrap_err("blob is not valid base64")?;
            let flow = NotificationDecryptFlow::new(store, Arc::new(PrintingConsumer));
            let coordinator = WorkerCoordinator::new(Arc::new(MemoryTaskRegistry::new()));
            let receiver = PushReceiver::new(Arc::new(coordinator), flow);

            let delivery = receiver.receive(PushMessage::new(KeyAlias::new(topic)?, blob));
            tracing::info!(worker = ?delivery.worker, "push handled");
            delivery.decrypt?;
        }
    }

    Ok(())
}
