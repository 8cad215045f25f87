//! Framez - A photo-sharing social client for your terminal
#![allow(clippy::uninlined_format_args)]

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use futures_util::future::try_join_all;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use framez::auth::{SignInForm, SignUpForm};
use framez::compose::Draft;
use framez::context::AppContext;
use framez::likes::{LikeToggle, fetch_like_state};
use framez::{Config, Post};

fn main() -> Result<()> {
    // Initialize logging (RUST_LOG=debug for verbose output)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().collect();
    let command = parse_args(&args)?;

    match command {
        Command::Run => framez::app::run(Config::load()?),
        Command::Help => {
            print_help();
            Ok(())
        }
        Command::Version => {
            print_version();
            Ok(())
        }
        other => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_cli(other))
        }
    }
}

/// CLI commands
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Run,
    Login { email: String },
    Signup { email: String, full_name: String },
    ResetPassword { email: String },
    Logout,
    Whoami,
    Feed { limit: Option<usize> },
    Post {
        content: String,
        image: Option<PathBuf>,
    },
    Like { post_id: Uuid },
    Profile { user_id: Option<Uuid> },
    Help,
    Version,
}

fn parse_args(args: &[String]) -> Result<Command> {
    if args.len() <= 1 {
        return Ok(Command::Run);
    }

    let arg = |i: usize, what: &str| {
        args.get(i)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Missing {what}\nRun 'framez --help' for usage"))
    };

    match args[1].as_str() {
        "-h" | "--help" | "help" => Ok(Command::Help),
        "-v" | "--version" | "version" => Ok(Command::Version),

        "login" => Ok(Command::Login {
            email: arg(2, "email")?,
        }),

        "signup" => {
            let email = arg(2, "email")?;
            let full_name = args[3.min(args.len())..].join(" ");
            if full_name.trim().is_empty() {
                anyhow::bail!("Missing full name\nExample: framez signup ada@example.com Ada Lovelace");
            }
            Ok(Command::Signup { email, full_name })
        }

        "reset-password" => Ok(Command::ResetPassword {
            email: arg(2, "email")?,
        }),

        "logout" => Ok(Command::Logout),
        "whoami" => Ok(Command::Whoami),

        "feed" => {
            let limit = match flag_value(args, &["--limit", "-l"]) {
                Some(value) => Some(
                    value
                        .parse()
                        .with_context(|| format!("Invalid limit: {value}"))?,
                ),
                None => None,
            };
            Ok(Command::Feed { limit })
        }

        "post" => {
            // Content is every word that is not the image flag or its value
            let mut words = Vec::new();
            let mut image = None;
            let mut i = 2;
            while i < args.len() {
                if args[i] == "--image" || args[i] == "-i" {
                    image = Some(PathBuf::from(arg(i + 1, "image path")?));
                    i += 2;
                } else {
                    words.push(args[i].as_str());
                    i += 1;
                }
            }
            Ok(Command::Post {
                content: words.join(" "),
                image,
            })
        }

        "like" => {
            let raw = arg(2, "post ID")?;
            let post_id = Uuid::parse_str(&raw).with_context(|| format!("Invalid post ID: {raw}"))?;
            Ok(Command::Like { post_id })
        }

        "profile" => {
            let user_id = match args.get(2) {
                Some(raw) => {
                    Some(Uuid::parse_str(raw).with_context(|| format!("Invalid user ID: {raw}"))?)
                }
                None => None,
            };
            Ok(Command::Profile { user_id })
        }

        other => Err(anyhow::anyhow!(
            "Unknown command: {other}\nRun 'framez --help' for usage"
        )),
    }
}

fn flag_value<'a>(args: &'a [String], names: &[&str]) -> Option<&'a str> {
    args.iter()
        .position(|a| names.contains(&a.as_str()))
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn print_help() {
    let config_path = Config::default_path()
        .map_or_else(|_| "Unknown".to_string(), |p| p.display().to_string());

    println!(
        r#"{}
📸 Framez - Share photos from your terminal

USAGE:
    framez                             Launch TUI
    framez [COMMAND]

COMMANDS:
    login <email>                      Log in (password read from stdin)
    signup <email> <full name>         Create an account
    reset-password <email>             Send a password reset link
    logout                             Log out
    whoami                             Show the signed-in user

    feed [OPTIONS]                     Show the latest posts
      Options:
        -l, --limit <n>                Number of posts (default: feed_limit)

    post [content] [OPTIONS]           Publish a post
      Options:
        -i, --image <path>             Attach an image
      Examples:
        framez post "Sunset at the pier" --image ~/Pictures/pier.jpg
        framez post --image cat.png

    like <post-id>                     Like or unlike a post
    profile [user-id]                  Show a profile (default: yours)

OPTIONS:
    -h, --help                         Show this help message
    -v, --version                      Show version information

KEYBINDINGS (TUI):
    Navigation
      1/2/3         Feed / Create / Profile
      Tab           Next tab (next field in forms)
      j/↓ k/↑       Move selection
      g             Jump to top

    Actions
      r             Refresh
      l/Space       Like/unlike
      n             New post
      Ctrl+S        Submit form
      Shift+O       Log out

    View
      t             Change theme
      ?             Help

CONFIG:
    {}

ENVIRONMENT:
    FRAMEZ_BACKEND_URL, FRAMEZ_ANON_KEY override the config file
"#,
        framez::LOGO,
        config_path
    );
}

fn print_version() {
    println!("framez {}", framez::VERSION);
}

async fn run_cli(command: Command) -> Result<()> {
    let ctx = AppContext::connect(Config::load()?).await?;

    match command {
        Command::Login { email } => login_cli(&ctx, email).await,
        Command::Signup { email, full_name } => signup_cli(&ctx, email, full_name).await,
        Command::ResetPassword { email } => {
            ctx.sessions.reset_password(&email).await?;
            println!("✓ Password reset link sent to {}", email.trim());
            Ok(())
        }
        Command::Logout => {
            ctx.sessions.sign_out().await?;
            println!("✓ Logged out");
            Ok(())
        }
        Command::Whoami => whoami_cli(&ctx).await,
        Command::Feed { limit } => feed_cli(&ctx, limit.unwrap_or(ctx.config.feed_limit)).await,
        Command::Post { content, image } => post_cli(&ctx, content, image).await,
        Command::Like { post_id } => like_cli(&ctx, post_id).await,
        Command::Profile { user_id } => profile_cli(&ctx, user_id).await,
        Command::Run | Command::Help | Command::Version => Ok(()),
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{label}: ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

async fn login_cli(ctx: &AppContext, email: String) -> Result<()> {
    let password = prompt("Password")?;
    let session = ctx.sessions.sign_in(&SignInForm { email, password }).await?;

    let name = ctx
        .auth()
        .snapshot()
        .display_name()
        .or(session.user.email)
        .unwrap_or_default();
    println!("✓ Logged in as {}", name);
    Ok(())
}

async fn signup_cli(ctx: &AppContext, email: String, full_name: String) -> Result<()> {
    let password = prompt("Password")?;
    let confirm_password = prompt("Confirm password")?;

    let form = SignUpForm {
        full_name,
        email,
        password,
        confirm_password,
    };
    match ctx.sessions.sign_up(&form).await? {
        Some(_) => println!("✓ Account created, you are logged in"),
        None => {
            println!("✓ Account created");
            println!("Check your email to confirm it, then run: framez login {}", form.email.trim());
        }
    }
    Ok(())
}

async fn whoami_cli(ctx: &AppContext) -> Result<()> {
    let user = ctx.sessions.reload_user().await?;
    let state = ctx.auth().snapshot();

    println!("{}", state.display_name().unwrap_or_default());
    if let Some(email) = &user.email {
        println!("  Email: {}", email);
    }
    println!("  ID:    {}", user.id);
    Ok(())
}

async fn feed_cli(ctx: &AppContext, limit: usize) -> Result<()> {
    let user_id = ctx.user_id()?;
    ctx.sessions.ensure_fresh().await?;

    let mut feed = ctx.feed();
    let posts: Vec<Post> = feed.fetch_posts().await?.iter().take(limit).cloned().collect();

    if posts.is_empty() {
        println!("No posts yet. Share one with: framez post --image <path>");
        return Ok(());
    }

    let likes = try_join_all(
        posts
            .iter()
            .map(|post| fetch_like_state(ctx.backend.as_ref(), user_id, post.id)),
    )
    .await?;

    println!("📸 Feed");
    println!("{}", "─".repeat(60));
    for (post, like) in posts.iter().zip(likes) {
        print_post(post, like.liked, like.count);
    }
    Ok(())
}

async fn post_cli(ctx: &AppContext, content: String, image: Option<PathBuf>) -> Result<()> {
    let user_id = ctx.user_id()?;
    ctx.sessions.ensure_fresh().await?;

    let draft = Draft { content, image };
    let post = ctx.composer().create_post(user_id, &draft).await?;

    println!("✓ Posted {}", post.id);
    if let Some(url) = &post.image_url {
        println!("  Image: {}", url);
    }
    Ok(())
}

async fn like_cli(ctx: &AppContext, post_id: Uuid) -> Result<()> {
    let user_id = ctx.user_id()?;
    ctx.sessions.ensure_fresh().await?;

    let mut toggle = LikeToggle::new(Arc::clone(&ctx.backend), user_id, post_id);
    toggle.load().await?;
    let state = toggle.toggle().await?;

    if state.liked {
        println!("♥ Liked ({})", state.count);
    } else {
        println!("♡ Unliked ({})", state.count);
    }
    Ok(())
}

async fn profile_cli(ctx: &AppContext, user_id: Option<Uuid>) -> Result<()> {
    let user_id = match user_id {
        Some(id) => id,
        None => ctx.user_id()?,
    };
    ctx.sessions.ensure_fresh().await?;

    let mut page = ctx.profile_page();
    let view = page.load(user_id).await?;

    println!("{}", view.profile.display_name());
    println!("  {}", view.profile.email);
    println!(
        "  {} posts · {} likes received",
        view.stats.posts, view.stats.likes_received
    );
    println!("{}", "─".repeat(60));
    for post in &view.posts {
        print_post(post, false, 0);
    }
    Ok(())
}

fn print_post(post: &Post, liked: bool, likes: u32) {
    println!("\n{} · {}  [{}]", post.author_name(), post.relative_time(), post.id);
    if !post.text().is_empty() {
        println!("{}", post.text());
    }
    if let Some(url) = &post.image_url {
        println!("🖼  {}", url);
    }
    if likes > 0 || liked {
        println!("{} {}", if liked { "♥" } else { "♡" }, likes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("framez")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_no_args_runs_tui() {
        assert_eq!(parse_args(&args(&[])).unwrap(), Command::Run);
    }

    #[test]
    fn test_signup_joins_full_name() {
        let cmd = parse_args(&args(&["signup", "ada@example.com", "Ada", "Lovelace"])).unwrap();
        assert_eq!(
            cmd,
            Command::Signup {
                email: "ada@example.com".to_string(),
                full_name: "Ada Lovelace".to_string(),
            }
        );
        assert!(parse_args(&args(&["signup", "ada@example.com"])).is_err());
    }

    #[test]
    fn test_post_with_image_and_no_text() {
        let cmd = parse_args(&args(&["post", "--image", "cat.png"])).unwrap();
        assert_eq!(
            cmd,
            Command::Post {
                content: String::new(),
                image: Some(PathBuf::from("cat.png")),
            }
        );
    }

    #[test]
    fn test_post_text_around_flag() {
        let cmd = parse_args(&args(&["post", "hello", "-i", "a.jpg", "world"])).unwrap();
        assert_eq!(
            cmd,
            Command::Post {
                content: "hello world".to_string(),
                image: Some(PathBuf::from("a.jpg")),
            }
        );
    }

    #[test]
    fn test_feed_limit() {
        assert_eq!(
            parse_args(&args(&["feed", "--limit", "5"])).unwrap(),
            Command::Feed { limit: Some(5) }
        );
        assert_eq!(
            parse_args(&args(&["feed"])).unwrap(),
            Command::Feed { limit: None }
        );
        assert!(parse_args(&args(&["feed", "-l", "many"])).is_err());
    }

    #[test]
    fn test_like_requires_uuid() {
        assert!(parse_args(&args(&["like", "not-a-uuid"])).is_err());
        let id = Uuid::new_v4();
        assert_eq!(
            parse_args(&args(&["like", &id.to_string()])).unwrap(),
            Command::Like { post_id: id }
        );
    }

    #[test]
    fn test_unknown_command() {
        let err = parse_args(&args(&["follow"])).unwrap_err();
        assert!(err.to_string().contains("Unknown command: follow"));
    }
}
