//! Tally - inventory capture from the terminal.
//!
//! Scan or type a barcode, pick a room and save it to the Web App. Entries
//! that cannot be saved are kept locally and synced on the next run.

use clap::{Parser, Subcommand};
use futures::stream;
use std::path::PathBuf;
use tally_client::config::Config;
use tally_client::console::format_entry;
use tally_client::error::AppError;
use tally_client::{photo_data_url, App};
use tally_engine::{EntryUpdate, ItemDraft};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Inventory capture client
#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Scan barcodes into a room inventory, online or offline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with an API token
    Login {
        #[arg(long)]
        token: String,
    },

    /// Forget the stored token
    Logout,

    /// Save one item
    Save {
        /// Barcode value
        barcode: String,

        /// Room or location
        #[arg(long)]
        room: String,

        #[arg(long, default_value = "")]
        notes: String,

        #[arg(long, default_value_t = 1)]
        quantity: u32,

        /// Photo to attach
        #[arg(long)]
        photo: Option<PathBuf>,
    },

    /// Submit queued offline items
    Sync,

    /// List queued offline items
    Queue,

    /// List saved entries
    Entries {
        /// Match barcode, room, notes or quantity
        #[arg(long)]
        filter: Option<String>,
    },

    /// Change an entry (admin only)
    Update {
        id: String,

        #[arg(long)]
        room: String,

        #[arg(long, default_value = "")]
        notes: String,

        #[arg(long, default_value_t = 1)]
        quantity: u32,
    },

    /// Delete an entry (admin only)
    Delete { id: String },

    /// Read codes from a keyboard-wedge scanner on stdin
    Scan {
        /// Room every scanned item is saved under
        #[arg(long)]
        room: String,

        /// Keep scanning after each code; a blank line stops
        #[arg(long)]
        continuous: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so they never mix with command output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tally_client=info,tally_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    let cli = Cli::parse();

    let app = App::new(&config);
    run(&app, cli.command).await?;
    Ok(())
}

async fn run(app: &App, command: Commands) -> Result<(), AppError> {
    match command {
        Commands::Login { token } => {
            let data = app.inventory.sign_in(&token).await?;
            println!(
                "Signed in as {}{}",
                data.user_email.as_deref().unwrap_or("unknown user"),
                if data.is_admin { " (admin)" } else { "" }
            );
        }
        Commands::Logout => {
            app.inventory.sign_out();
            println!("Signed out.");
        }
        Commands::Save {
            barcode,
            room,
            notes,
            quantity,
            photo,
        } => {
            app.require_session().await?;
            let mut draft = ItemDraft::new(barcode, room)
                .with_notes(notes)
                .with_quantity(quantity);
            if let Some(path) = photo {
                draft = draft.with_image(photo_data_url(&path)?);
            }
            app.inventory.save_item(draft).await?;
        }
        Commands::Sync => {
            let waiting = app.inventory.pending_count();
            app.require_session().await?;
            // Sign-in already drained a non-empty queue
            if waiting == 0 {
                app.inventory.sync().await?;
            }
        }
        Commands::Queue => {
            let pending = app.inventory.pending_entries();
            if pending.is_empty() {
                println!("No queued items.");
            }
            for entry in pending {
                println!(
                    "{}  {:<18} {:<16} x{}  {}",
                    entry.created_at.format("%Y-%m-%d %H:%M"),
                    entry.barcode,
                    entry.room,
                    entry.quantity,
                    entry.local_id
                );
            }
        }
        Commands::Entries { filter } => {
            app.require_session().await?;
            app.view.show_entries(true);
            app.inventory.set_filter(filter.as_deref().unwrap_or_default());
        }
        Commands::Update {
            id,
            room,
            notes,
            quantity,
        } => {
            app.require_session().await?;
            let entry = app
                .inventory
                .update_entry(EntryUpdate::new(id, room, notes, quantity))
                .await?;
            println!("{}", format_entry(&entry));
        }
        Commands::Delete { id } => {
            app.require_session().await?;
            app.inventory.delete_entry(&id).await?;
        }
        Commands::Scan { room, continuous } => {
            app.require_session().await?;
            let lines = BufReader::new(tokio::io::stdin()).lines();
            let lines = Box::pin(stream::unfold(lines, |mut lines| async move {
                match lines.next_line().await {
                    Ok(Some(line)) => Some((Ok(line), lines)),
                    Ok(None) => None,
                    Err(e) => Some((Err(e), lines)),
                }
            }));
            let outcomes = app.scan(&room, continuous, lines).await?;
            println!("{} item(s) scanned.", outcomes.len());
        }
    }
    Ok(())
}
