#![allow(clippy::print_stdout)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{error, info};

use txt_insight::config::AppConfig;
use txt_insight::logging::{init_logging, OperationTimer};
use txt_insight::models::{
    ConversationAnalyticsSummary, FollowUpCategory, FollowUpReport, MessageRecord,
};
use txt_insight::service::InsightService;
use txt_insight::timestamp::format_iso8601;
use txt_insight::ContactResolver;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Output format
    #[arg(short, long, value_enum, global = true, default_value_t = Format::Text)]
    format: Format,

    /// Path to chat.db (overrides configuration)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Path to the contacts snapshot (overrides configuration)
    #[arg(long, global = true)]
    contacts: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify the message store can be opened
    Check,
    /// List contacts in the snapshot
    Contacts,
    /// Resolve a name to a contact
    Resolve {
        /// Name to look up
        name: String,
    },
    /// Show messages with a contact
    Messages {
        /// Contact name or address
        who: String,

        /// Maximum messages to return
        #[arg(short, long)]
        limit: Option<usize>,

        /// Only messages from the last N days
        #[arg(short, long)]
        days: Option<u32>,
    },
    /// Show the most recent messages across all conversations
    Recent {
        /// Maximum messages to return
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Show unread messages
    Unread {
        /// Maximum messages to return
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Search message text
    Search {
        /// Text to look for
        needle: String,

        /// Restrict to one contact name or address
        #[arg(short, long)]
        who: Option<String>,

        /// Maximum messages to return
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Show the latest message of each conversation
    Conversations {
        /// Maximum conversations to return
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Conversation analytics
    Analytics {
        /// Restrict to one contact name or address
        #[arg(short, long)]
        who: Option<String>,

        /// Window length in days
        #[arg(short, long)]
        days: Option<u32>,
    },
    /// Messages that need a reply or an action
    Followup {
        /// Window length in days
        #[arg(short, long)]
        days: Option<u32>,

        /// Days after which an unreplied conversation is stale
        #[arg(short, long)]
        stale: Option<u32>,

        /// Maximum items per category
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Analytics and follow-ups together
    Digest {
        /// Window length in days
        #[arg(short, long)]
        days: Option<u32>,
    },
    /// List group conversations
    Groups {
        /// Maximum groups to return
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Show messages from group conversations
    GroupMessages {
        /// Group identifier (e.g. chat123456)
        #[arg(short, long)]
        group: Option<String>,

        /// Only messages from this participant name or address
        #[arg(short, long)]
        participant: Option<String>,

        /// Maximum messages to return
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// List attachments
    Attachments {
        /// Restrict to one contact name or address
        #[arg(short, long)]
        who: Option<String>,

        /// MIME type prefix, e.g. image/
        #[arg(short = 't', long = "type")]
        mime: Option<String>,

        /// Maximum attachments to return
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// List tapback reactions
    Reactions {
        /// Restrict to one contact name or address
        #[arg(short, long)]
        who: Option<String>,

        /// Maximum reactions to return
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// List URLs shared in messages
    Links {
        /// Restrict to one contact name or address
        #[arg(short, long)]
        who: Option<String>,

        /// Window length in days
        #[arg(short, long)]
        days: Option<u32>,

        /// Maximum links to return
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// List handles with recent activity
    Handles {
        /// Window length in days
        #[arg(short, long)]
        days: Option<u32>,

        /// Maximum handles to return
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// List senders that are not in the contact snapshot
    Unknown {
        /// Window length in days
        #[arg(short, long)]
        days: Option<u32>,

        /// Maximum senders to return
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

#[derive(Serialize)]
struct Digest {
    analytics: ConversationAnalyticsSummary,
    follow_ups: FollowUpReport,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load().context("Failed to load configuration")?;
    if let Some(db) = &cli.db {
        config.store.database_path = db.display().to_string();
    }
    if let Some(contacts) = &cli.contacts {
        config.contacts.path = contacts.display().to_string();
    }

    let log_file = config.logging.file_path.as_ref().map(PathBuf::from);
    let _guard = init_logging(
        Some(&config.get_log_level()),
        log_file.as_deref(),
        config.logging.format == "json",
    )?;

    info!("Starting txt-insight");

    let service =
        Arc::new(InsightService::from_config(config).context("Failed to initialize service")?);
    let format = cli.format;

    if let Err(e) = run(cli.command, service, format).await {
        error!("Command failed: {e:#}");
        return Err(e);
    }
    Ok(())
}

async fn run(command: Commands, service: Arc<InsightService>, format: Format) -> Result<()> {
    let now = Utc::now();
    let resolver = service.resolver();

    match command {
        Commands::Check => {
            service.check_store()?;
            println!("Message store OK");
        }
        Commands::Contacts => {
            let contacts = resolver.directory().all();
            if format == Format::Json {
                return print_json(&contacts);
            }
            for contact in contacts {
                println!("{} <{}>", contact.name, contact.canonical_address);
            }
        }
        Commands::Resolve { name } => {
            let contact = service.resolve_contact(&name)?;
            if format == Format::Json {
                return print_json(&contact);
            }
            println!("{} <{}>", contact.name, contact.canonical_address);
        }
        Commands::Messages { who, limit, days } => {
            let (contact, messages) = service.conversation(&who, limit, days, now)?;
            info!("Found {} messages with {}", messages.len(), contact.name);
            if format == Format::Json {
                return print_json(&messages);
            }
            print_messages(&messages, resolver);
        }
        Commands::Recent { limit } => {
            let messages = service.recent_messages(limit)?;
            if format == Format::Json {
                return print_json(&messages);
            }
            print_messages(&messages, resolver);
        }
        Commands::Unread { limit } => {
            let unread = service.unread_messages(limit, now)?;
            if format == Format::Json {
                return print_json(&unread);
            }
            for message in &unread {
                let from = message
                    .group_name
                    .clone()
                    .unwrap_or_else(|| resolver.label_for(&message.record.sender_address));
                let age = message.days_old.map_or_else(String::new, |d| format!(" ({d}d)"));
                println!("{from}{age}: {}", message.record.text);
            }
        }
        Commands::Search { needle, who, limit } => {
            let messages = service.search(&needle, who.as_deref(), limit)?;
            if format == Format::Json {
                return print_json(&messages);
            }
            print_messages(&messages, resolver);
        }
        Commands::Conversations { limit } => {
            let conversations = service.recent_conversations(limit)?;
            if format == Format::Json {
                return print_json(&conversations);
            }
            for conversation in &conversations {
                let when = conversation
                    .last_message_date
                    .as_ref()
                    .map_or_else(|| "-".to_string(), format_iso8601);
                println!(
                    "{when}  {}: {}",
                    resolver.label_for(&conversation.address),
                    conversation.last_message
                );
            }
        }
        Commands::Analytics { who, days } => {
            let summary = service.analytics(who.as_deref(), days, now)?;
            if format == Format::Json {
                return print_json(&summary);
            }
            print_analytics(&summary, resolver);
        }
        Commands::Followup { days, stale, limit } => {
            let report = service.follow_ups(days, stale, limit, now)?;
            if format == Format::Json {
                return print_json(&report);
            }
            print_follow_ups(&report, resolver);
        }
        Commands::Digest { days } => {
            let timer = OperationTimer::new("digest");
            let analytics = {
                let service = Arc::clone(&service);
                tokio::task::spawn_blocking(move || service.analytics(None, days, now))
            };
            let follow_ups = {
                let service = Arc::clone(&service);
                tokio::task::spawn_blocking(move || service.follow_ups(days, None, None, now))
            };
            let (analytics, follow_ups) = tokio::try_join!(analytics, follow_ups)
                .context("Digest worker panicked")?;
            let digest = Digest {
                analytics: analytics?,
                follow_ups: follow_ups?,
            };
            timer.finish();

            if format == Format::Json {
                return print_json(&digest);
            }
            print_analytics(&digest.analytics, resolver);
            println!();
            print_follow_ups(&digest.follow_ups, resolver);
        }
        Commands::Groups { limit } => {
            let groups = service.group_chats(limit)?;
            if format == Format::Json {
                return print_json(&groups);
            }
            for group in &groups {
                let name = group.display_name.as_deref().unwrap_or(&group.group_id);
                let members: Vec<String> =
                    group.participants.iter().map(|p| resolver.label_for(p)).collect();
                println!("{name} ({} messages): {}", group.message_count, members.join(", "));
            }
        }
        Commands::GroupMessages {
            group,
            participant,
            limit,
        } => {
            let messages =
                service.group_messages(group.as_deref(), participant.as_deref(), limit)?;
            if format == Format::Json {
                return print_json(&messages);
            }
            print_messages(&messages, resolver);
        }
        Commands::Attachments { who, mime, limit } => {
            let attachments = service.attachments(who.as_deref(), mime.as_deref(), limit)?;
            if format == Format::Json {
                return print_json(&attachments);
            }
            for attachment in &attachments {
                let when = attachment
                    .message_date
                    .as_ref()
                    .map_or_else(|| "-".to_string(), format_iso8601);
                let name = attachment
                    .transfer_name
                    .as_deref()
                    .or(attachment.filename.as_deref())
                    .unwrap_or("(unnamed)");
                let mime = attachment.mime_type.as_deref().unwrap_or("unknown");
                println!("{when}  {name} [{mime}, {} bytes]", attachment.total_bytes);
            }
        }
        Commands::Reactions { who, limit } => {
            let reactions = service.reactions(who.as_deref(), limit)?;
            if format == Format::Json {
                return print_json(&reactions);
            }
            for reaction in &reactions {
                let who = if reaction.is_from_me {
                    "Me".to_string()
                } else {
                    resolver.label_for(&reaction.reactor_address)
                };
                let verb = if reaction.removed { "removed" } else { "reacted" };
                println!(
                    "{who} {verb} {} to \"{}\"",
                    reaction.kind.emoji(),
                    reaction.target_preview
                );
            }
        }
        Commands::Links { who, days, limit } => {
            let links = service.links(who.as_deref(), days, limit, now)?;
            if format == Format::Json {
                return print_json(&links);
            }
            for link in &links {
                let from = if link.is_from_me {
                    "Me".to_string()
                } else {
                    resolver.label_for(&link.sender_address)
                };
                println!("{from}: {}", link.url);
            }
        }
        Commands::Handles { days, limit } => {
            let handles = service.handles(days, limit, now)?;
            if format == Format::Json {
                return print_json(&handles);
            }
            for handle in &handles {
                println!(
                    "{:>6}  {}",
                    handle.message_count,
                    resolver.label_for(&handle.address)
                );
            }
        }
        Commands::Unknown { days, limit } => {
            let senders = service.unknown_senders(days, limit, now)?;
            if format == Format::Json {
                return print_json(&senders);
            }
            for sender in &senders {
                let activity = &sender.activity;
                println!("{} ({} messages)", activity.address, activity.message_count);
                for sample in &sender.samples {
                    println!("    {}", sample.text);
                }
            }
        }
    }

    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_messages(messages: &[MessageRecord], resolver: &ContactResolver) {
    for message in messages {
        let when = message
            .timestamp
            .as_ref()
            .map_or_else(|| "-".to_string(), format_iso8601);
        let who = if message.is_from_me {
            "Me".to_string()
        } else {
            resolver.label_for(&message.sender_address)
        };
        println!("{when}  {who}: {}", message.text);
    }
}

fn print_analytics(summary: &ConversationAnalyticsSummary, resolver: &ContactResolver) {
    fn show<T: std::fmt::Display>(value: Option<T>) -> String {
        value.map_or_else(|| "n/a".to_string(), |v| v.to_string())
    }

    println!("Last {} days", summary.window_days);
    println!("  Messages:      {}", show(summary.total_messages));
    println!("  Sent:          {}", show(summary.sent_count));
    println!("  Received:      {}", show(summary.received_count));
    println!("  Daily average: {}", show(summary.avg_daily_messages));
    let busiest_hour = summary.busiest_hour.map(|h| format!("{h:02}:00 UTC"));
    println!("  Busiest hour:  {}", show(busiest_hour));
    println!("  Busiest day:   {}", show(summary.busiest_day.as_deref()));
    println!("  Attachments:   {}", show(summary.attachment_count));
    println!("  Reactions:     {}", show(summary.reaction_count));
    if let Some(top) = &summary.top_contacts {
        println!("  Top contacts:");
        for contact in top {
            let label = resolver.label_for(&contact.address);
            println!("    {:>6}  {label}", contact.message_count);
        }
    }
}

fn print_follow_ups(report: &FollowUpReport, resolver: &ContactResolver) {
    println!("Follow-ups over the last {} days", report.window_days);
    for category in FollowUpCategory::ALL {
        let items = report.items(category);
        if items.is_empty() {
            continue;
        }
        println!("{} ({})", category.title(), items.len());
        for item in items {
            let from = item
                .group_id
                .as_ref()
                .map_or_else(|| resolver.label_for(&item.address), Clone::clone);
            println!("  [{}d] {from}: {}", item.days_ago, item.text_snippet);
        }
    }
    if report.total_items() == 0 {
        println!("Nothing needs attention.");
    }
}
