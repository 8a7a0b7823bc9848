use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use murmur::api::{ApiClient, FeedBackend};
use murmur::config::ClientSettings;
use murmur::logging::{self, LogConfig};
use murmur::store::{PageOutcome, PostStore, ReactionTarget};
use murmur_types::{Comment, Reactable, ReactionType, Reply};
use uuid::Uuid;

/// Murmur - view and interact with a single post from the terminal
#[derive(Parser)]
#[command(name = "murmur")]
#[command(about = "Post detail client for the Murmur social feed")]
#[command(version)]
struct Cli {
    /// Server URL to connect to
    #[arg(long, short, env = "MURMUR_SERVER_URL")]
    server: Option<String>,

    /// Session token issued by the server
    #[arg(long, env = "MURMUR_SESSION_TOKEN")]
    session_token: Option<String>,

    /// Enable verbose logging
    #[arg(long, short)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print a post and its first comment pages
    Show {
        post_id: Uuid,
        /// Number of comment pages to load
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },
    /// Print every reply of one comment
    Replies { post_id: Uuid, comment_id: Uuid },
    /// Toggle or switch your reaction on a post, comment or reply
    React {
        post_id: Uuid,
        /// like, love, haha, wow, sad or angry
        reaction: String,
        #[arg(long)]
        comment: Option<Uuid>,
        /// Requires --comment
        #[arg(long, requires = "comment")]
        reply: Option<Uuid>,
    },
    /// Add a comment to a post
    Comment { post_id: Uuid, text: String },
    /// Print the shareable link of a post
    Link { post_id: Uuid },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load MURMUR_* variables from a .env file before settings are read
    let _ = dotenv::dotenv();

    let settings = ClientSettings::new().context("failed to load settings")?;
    let log_config = if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::from_settings(&settings.logging)
    };
    logging::init_logging(&log_config)?;

    let base_url = cli.server.unwrap_or_else(|| settings.server.base_url.clone());
    log::info!("Using server {}", base_url);
    let mut client = ApiClient::new(base_url).with_log_config(log_config.clone());
    client.set_session_token(cli.session_token);
    let backend: Arc<dyn FeedBackend> = Arc::new(client);

    let post_id = match &cli.command {
        Command::Show { post_id, .. }
        | Command::Replies { post_id, .. }
        | Command::React { post_id, .. }
        | Command::Comment { post_id, .. }
        | Command::Link { post_id } => *post_id,
    };
    let post = backend.fetch_post(post_id).await?;
    let store = PostStore::new(post, backend, settings.store_options()).with_log_config(log_config);

    match cli.command {
        Command::Show { pages, .. } => {
            for _ in 0..pages {
                if !store.read(|agg| agg.comments().has_more()) {
                    break;
                }
                store.fetch_comments().await?;
            }
            print_post(&store);
        }
        Command::Replies { comment_id, .. } => {
            load_comment(&store, comment_id).await?;
            while store.read(|agg| agg.replies(comment_id).map_or(true, |t| t.has_more())) {
                if !matches!(store.fetch_replies(comment_id).await?, PageOutcome::Merged { .. }) {
                    break;
                }
            }
            store.read(|agg| {
                for reply in agg.replies(comment_id).map(|t| t.items()).unwrap_or_default() {
                    print_reply(reply);
                }
            });
        }
        Command::React { reaction, comment, reply, .. } => {
            let chosen = ReactionType::parse(&reaction)
                .ok_or_else(|| anyhow!("unknown reaction '{}'", reaction))?;
            let target = match (comment, reply) {
                (Some(comment_id), Some(reply_id)) => {
                    load_reply(&store, comment_id, reply_id).await?;
                    ReactionTarget::Reply { comment_id, reply_id }
                }
                (Some(comment_id), None) => {
                    load_comment(&store, comment_id).await?;
                    ReactionTarget::Comment { comment_id }
                }
                _ => ReactionTarget::Post,
            };
            let transition = store.react_to(target, chosen).await?;
            match transition.next {
                Some(selected) => {
                    let meta = selected.meta();
                    println!("Reacted {} {}", meta.emoji, meta.label);
                }
                None => println!("Reaction removed"),
            }
        }
        Command::Comment { text, .. } => {
            let comment = store.add_comment(text, Vec::new()).await?;
            println!("Added comment {}", comment.id);
        }
        Command::Link { .. } => println!("{}", store.copy_post_link()),
    }

    Ok(())
}

/// Page through comments until `comment_id` is loaded
async fn load_comment(store: &PostStore, comment_id: Uuid) -> Result<()> {
    while store.read(|agg| agg.comment(comment_id).is_none()) {
        if !store.read(|agg| agg.comments().has_more()) {
            return Err(anyhow!("comment {} not found on this post", comment_id));
        }
        store.fetch_comments().await?;
    }
    Ok(())
}

/// Page through replies until `reply_id` is loaded
async fn load_reply(store: &PostStore, comment_id: Uuid, reply_id: Uuid) -> Result<()> {
    load_comment(store, comment_id).await?;
    while store.read(|agg| agg.reply(comment_id, reply_id).is_none()) {
        let has_more = store.read(|agg| agg.replies(comment_id).map_or(true, |t| t.has_more()));
        if !has_more {
            return Err(anyhow!("reply {} not found under comment {}", reply_id, comment_id));
        }
        store.fetch_replies(comment_id).await?;
    }
    Ok(())
}

fn print_post(store: &PostStore) {
    store.read(|agg| {
        let post = agg.post();
        println!("@{}  {}", post.author_username, post.created_at.format("%Y-%m-%d %H:%M"));
        println!("{}", post.content);
        let reactions: Vec<String> = post
            .react_counts
            .top(3)
            .into_iter()
            .map(|(reaction, count)| format!("{} {}", reaction.meta().emoji, count))
            .collect();
        println!(
            "{}{}  |  {} comments  |  {} shares",
            reactions.join(" "),
            my_reaction_marker(post),
            post.comment_count,
            post.share_count
        );
        println!();
        for comment in agg.comments().items() {
            print_comment(comment);
        }
        if agg.comments().has_more() {
            println!("  ... more comments");
        }
    });
}

/// Every non-zero reaction count, with the viewer's own pick marked
fn reaction_summary(entity: &dyn Reactable) -> String {
    let counts: Vec<String> = entity
        .react_counts()
        .iter()
        .filter(|(_, count)| *count > 0)
        .map(|(reaction, count)| format!("{} {}", reaction.meta().emoji, count))
        .collect();
    format!("{}{}", counts.join(" "), my_reaction_marker(entity))
}

fn my_reaction_marker(entity: &dyn Reactable) -> String {
    match entity.my_reaction() {
        Some(reaction) => format!(" (you: {})", reaction.meta().label),
        None => String::new(),
    }
}

fn print_comment(comment: &Comment) {
    println!("  [{}] @{}: {}", comment.id, comment.author_username, comment.content);
    let reactions = reaction_summary(comment);
    if !reactions.is_empty() {
        println!("      {}", reactions);
    }
    if comment.reply_count > 0 {
        println!("      {} replies", comment.reply_count);
    }
}

fn print_reply(reply: &Reply) {
    println!("    [{}] @{}: {}", reply.id, reply.author_username, reply.content);
    let reactions = reaction_summary(reply);
    if !reactions.is_empty() {
        println!("        {}", reactions);
    }
}
