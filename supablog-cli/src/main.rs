use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use supablog_client::{
    FilterRequest, OrderBy, PostDraft, PostUpdate, SupablogClient,
};
use uuid::Uuid;

#[derive(Parser)]
#[command(author, version, about = "Admin CLI for Supabase-backed blogs", long_about = None)]
struct Cli {
    #[arg(long)]
    token_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Login {
        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        password: String,
    },

    Logout,

    Status,

    Create {
        #[arg(short, long)]
        title: String,

        #[arg(short, long)]
        content: String,

        #[arg(long)]
        excerpt: Option<String>,

        #[arg(long)]
        category: Option<String>,

        #[arg(long = "tag")]
        tags: Vec<String>,

        #[arg(long)]
        slug: Option<String>,

        #[arg(long, default_value_t = false)]
        publish: bool,
    },

    Get {
        #[arg(short, long)]
        slug: String,

        /// Skip the read-for-display view counter bump
        #[arg(long, default_value_t = false)]
        no_view: bool,
    },

    Update {
        #[arg(short, long)]
        id: Uuid,

        #[arg(short, long)]
        title: Option<String>,

        #[arg(short, long)]
        content: Option<String>,

        #[arg(long)]
        category: Option<String>,

        #[arg(long)]
        publish: bool,

        #[arg(long)]
        unpublish: bool,
    },

    Delete {
        #[arg(short, long)]
        id: Uuid,
    },

    List {
        #[arg(short, long, default_value_t = 10)]
        limit: u32,

        #[arg(short, long, default_value_t = 0)]
        offset: u32,

        #[arg(long)]
        category: Option<String>,

        #[arg(long)]
        tag: Option<String>,

        #[arg(short, long)]
        query: Option<String>,

        /// Include unpublished posts (admin sessions only)
        #[arg(long, default_value_t = false)]
        all: bool,

        /// created-desc, created-asc, updated-desc or views-desc
        #[arg(long)]
        order: Option<String>,
    },

    /// Poll a filter and print the feed whenever it changes
    Watch {
        #[arg(long)]
        category: Option<String>,

        #[arg(long)]
        tag: Option<String>,

        #[arg(long, default_value_t = 10)]
        interval: u64,
    },
}

struct TokenManager {
    token_path: PathBuf,
}

impl TokenManager {
    fn new(custom_path: Option<PathBuf>) -> Result<Self> {
        let token_path = match custom_path {
            Some(path) => path,
            None => {
                let home = dirs::home_dir().context("Failed to get home directory")?;
                home.join(".supablog_token")
            }
        };

        Ok(Self { token_path })
    }

    fn save_token(&self, token: &str) -> Result<()> {
        fs::write(&self.token_path, token)
            .with_context(|| format!("Failed to save token to {:?}", self.token_path))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&self.token_path)?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(&self.token_path, perms)?;
        }

        println!("✓ Token saved to {:?}", self.token_path);
        Ok(())
    }

    fn load_token(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.token_path) {
            Ok(token) => {
                let token = token.trim().to_string();
                if !token.is_empty() {
                    Ok(Some(token))
                } else {
                    Ok(None)
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).context("Failed to read token file"),
        }
    }

    fn clear_token(&self) -> Result<()> {
        if self.token_path.exists() {
            fs::remove_file(&self.token_path)
                .with_context(|| format!("Failed to remove token file {:?}", self.token_path))?;
            println!("✓ Token file removed");
        }
        Ok(())
    }
}

fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,supablog_client=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn parse_order(order: &str) -> Result<OrderBy> {
    match order {
        "created-desc" => Ok(OrderBy::CreatedAtDesc),
        "created-asc" => Ok(OrderBy::CreatedAtAsc),
        "updated-desc" => Ok(OrderBy::UpdatedAtDesc),
        "views-desc" => Ok(OrderBy::ViewsDesc),
        other => Err(anyhow!("unknown order '{other}'")),
    }
}

fn print_post(post: &supablog_client::Post) {
    println!("   ID: {}", post.id);
    println!("   Title: {}", post.title);
    println!("   Slug: {}", post.slug);
    if let Some(category) = &post.category {
        println!("   Category: {}", category);
    }
    if !post.tags.is_empty() {
        println!("   Tags: {}", post.tags.join(", "));
    }
    println!("   Published: {}", post.published);
    println!("   Views: {}", post.views);
    println!("   Created: {}", post.created_at);
    println!("   Updated: {}", post.updated_at);
}

fn truncate(s: &str, max_len: usize) -> String {
    // cut on a char boundary; byte slicing panics on multibyte content
    match s.char_indices().nth(max_len) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_logging();

    let cli = Cli::parse();

    let client = SupablogClient::from_env()
        .context("Failed to create client; set SUPABASE_URL and SUPABASE_ANON_KEY")?;

    let token_manager = TokenManager::new(cli.token_file)?;
    if let Some(token) = token_manager.load_token()? {
        match client.restore_session(&token).await {
            Ok(Some(user)) => println!("🔑 Authenticated as {}", user.email),
            Ok(None) => println!("⚠️ Saved token is no longer valid"),
            Err(e) => println!("⚠️ Could not restore session: {}", e),
        }
    }

    match &cli.command {
        Commands::Login { email, password } => {
            println!("🔑 Logging in as: {}", email);

            match client.sign_in(email, password).await {
                Ok(session) => {
                    println!("✅ Login successful!");
                    println!("   User ID: {}", session.user.id);
                    println!("   Email: {}", session.user.email);
                    if let Some(role) = &session.user.role {
                        println!("   Role: {}", role);
                    }

                    token_manager.save_token(&session.access_token)?;
                }
                Err(e) => {
                    println!("❌ Login failed: {}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Logout => {
            client.sign_out().await.ok();
            token_manager.clear_token()?;
            println!("✅ Signed out");
        }

        Commands::Status => {
            let config = client.config();
            println!("🔌 Backend: {}", config.supabase_url);
            println!("   Page size: {}", config.posts_per_page);
            println!(
                "   Features: comments={} categories={} tags={}",
                config.enable_comments, config.enable_categories, config.enable_tags
            );
            match client.auth().current_user().await {
                Ok(Some(user)) => {
                    println!("   Session: ✅ {}", user.email);
                    if let Some(role) = &user.role {
                        println!("   Role: {}", role);
                    }
                }
                Ok(None) => {
                    println!("   Session: ❌ not signed in");
                    println!("   Please login first: supablog-cli login --email <email> --password <password>");
                }
                Err(e) => println!("   Session: ⚠️ {}", e),
            }
        }

        Commands::Create {
            title,
            content,
            excerpt,
            category,
            tags,
            slug,
            publish,
        } => {
            println!("📝 Creating new post...");

            let draft = PostDraft {
                title: title.clone(),
                content: content.clone(),
                excerpt: excerpt.clone(),
                category: category.clone(),
                published: *publish,
                slug: slug.clone(),
                tags: tags.clone(),
                ..Default::default()
            };
            let repo = client.posts().await;
            let author_id = repo.caller().user_id();

            match repo.create(draft, author_id).await {
                Ok(post) => {
                    println!("✅ Post created successfully!");
                    print_post(&post);
                }
                Err(e) => {
                    if e.is_auth() {
                        println!("❌ Unauthorized. Please login first:");
                        println!("   supablog-cli login --email <email> --password <password>");
                    } else if e.is_conflict() {
                        println!("❌ Slug already taken: {}", e);
                    } else {
                        println!("❌ Failed to create post: {}", e);
                    }
                    std::process::exit(1);
                }
            }
        }

        Commands::Get { slug, no_view } => {
            println!("🔍 Getting post '{}'", slug);

            match client.posts().await.get_by_slug(slug, !no_view).await {
                Ok(Some(post)) => {
                    println!("✅ Post retrieved:");
                    print_post(&post);
                    println!("   Content: {}", truncate(&post.content, 200));
                }
                Ok(None) => {
                    println!("❌ Post '{}' not found", slug);
                    println!("   Tip: Use 'list' command to see available posts");
                    std::process::exit(1);
                }
                Err(e) => {
                    println!("❌ Error: {}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Update {
            id,
            title,
            content,
            category,
            publish,
            unpublish,
        } => {
            println!("✏️ Updating post {}", id);

            let mut patch = PostUpdate::new(*id);
            patch.title = title.clone();
            patch.content = content.clone();
            patch.category = category.clone();
            patch.published = match (*publish, *unpublish) {
                (true, true) => {
                    println!("❌ --publish and --unpublish are mutually exclusive");
                    std::process::exit(1);
                }
                (true, false) => Some(true),
                (false, true) => Some(false),
                (false, false) => None,
            };

            match client.posts().await.update(patch).await {
                Ok(post) => {
                    println!("✅ Post updated successfully!");
                    print_post(&post);
                }
                Err(e) => {
                    if e.is_not_found() {
                        println!("❌ Post {} not found", id);
                    } else if e.is_auth() {
                        println!("❌ Unauthorized. You may need to login again");
                    } else {
                        println!("❌ Failed to update post: {}", e);
                    }
                    std::process::exit(1);
                }
            }
        }

        Commands::Delete { id } => {
            println!("🗑️ Deleting post {}", id);

            match client.posts().await.delete(*id).await {
                Ok(()) => {
                    println!("✅ Post deleted successfully!");
                }
                Err(e) => {
                    if e.is_not_found() {
                        println!("❌ Post {} not found", id);
                    } else if e.is_auth() {
                        println!("❌ Unauthorized. You may need to login again");
                    } else {
                        println!("❌ Failed to delete post: {}", e);
                    }
                    std::process::exit(1);
                }
            }
        }

        Commands::List {
            limit,
            offset,
            category,
            tag,
            query,
            all,
            order,
        } => {
            println!("📋 Listing posts (limit={}, offset={})", limit, offset);

            let filter = FilterRequest {
                query: query.clone(),
                category: category.clone(),
                tag: tag.clone(),
                limit: Some(*limit),
                offset: *offset,
                include_unpublished: *all,
                order: order.as_deref().map(parse_order).transpose()?,
            };

            match client.posts().await.list(&filter).await {
                Ok(posts) => {
                    println!("✅ Found {} posts", posts.len());
                    println!();

                    if posts.is_empty() {
                        println!("   No posts found");
                        println!("   Tip: Create your first post: supablog-cli create --title \"My Post\" --content \"Hello\"");
                    } else {
                        for (i, post) in posts.iter().enumerate() {
                            println!("   {}. [{}] {}", i + 1, post.slug, post.title);
                            println!("      Created: {}", post.created_at);
                            println!("      Content: {}", truncate(&post.content, 50));
                            println!();
                        }
                    }
                }
                Err(e) => {
                    println!("❌ Failed to list posts: {}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Watch {
            category,
            tag,
            interval,
        } => {
            let filter = FilterRequest {
                category: category.clone(),
                tag: tag.clone(),
                ..Default::default()
            };
            println!("👀 Watching posts (every {}s, Ctrl-C to stop)", interval);

            let feed = client.feed().await;
            let mut rx = feed.subscribe();
            feed.set_filter(filter).await;

            loop {
                if rx.changed().await.is_err() {
                    break;
                }
                let state = rx.borrow_and_update().clone();
                if state.loading {
                    continue;
                }
                if let Some(error) = &state.error {
                    println!("⚠️ {}", error);
                } else if let Some(posts) = &state.data {
                    println!("📋 {} posts:", posts.len());
                    for post in posts {
                        println!("   [{}] {} ({} views)", post.slug, post.title, post.views);
                    }
                }
                tokio::time::sleep(Duration::from_secs(*interval)).await;
                feed.refresh().await;
            }
        }
    }

    Ok(())
}
