use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use colored::*;
use pantry_api::{
    ChangePasswordRequest, CreateInventoryItemRequest, RegisterRequest, UpdateProfileRequest,
};
use pantry_config::load as load_config;
use pantry_live::LiveEvent;
use pantry_runtime::{
    expiring, low_stock, shutdown_signal, telemetry, Application, View,
    DEFAULT_EXPIRY_WINDOW_DAYS,
};
use pantry_session::{is_expired, Route};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "pantry-client")]
#[command(about = "Kitchen inventory client")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and remember the session
    Login {
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Create an account and sign in
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Show the signed-in user
    Whoami,
    /// Sign out and forget the session
    Logout,
    /// Update profile fields of the signed-in user
    Profile {
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
    /// Change the account password
    Password {
        #[arg(long)]
        current: String,
        #[arg(long)]
        new: String,
    },
    /// Resolve a route the way the client would render it
    Visit { path: String },
    /// Kitchen creation, joining and members
    Kitchen {
        #[command(subcommand)]
        action: KitchenAction,
    },
    /// Pantry items
    Inventory {
        #[command(subcommand)]
        action: Option<InventoryAction>,
    },
    /// Shopping list
    Shopping {
        #[command(subcommand)]
        action: Option<ShoppingAction>,
    },
    /// Kitchen notifications
    Notifications {
        #[command(subcommand)]
        action: Option<NotificationAction>,
    },
    /// Ask for recipe ideas based on the pantry
    Recipes {
        #[arg(long)]
        servings: Option<u32>,
    },
    /// Follow live kitchen events until interrupted
    Watch,
}

#[derive(Subcommand)]
enum KitchenAction {
    Create { name: String },
    Join { code: String },
    Members,
}

#[derive(Subcommand)]
enum InventoryAction {
    List,
    Add {
        name: String,
        #[arg(long, default_value_t = 1)]
        quantity: i64,
        #[arg(long)]
        expiry: Option<NaiveDate>,
        #[arg(long)]
        location: Option<String>,
    },
    Consume {
        id: i64,
        #[arg(long, default_value_t = 1)]
        amount: i64,
    },
    Remove { id: i64 },
    LowStock {
        #[arg(long, default_value_t = 3)]
        threshold: i64,
    },
    Expiring {
        #[arg(long, default_value_t = DEFAULT_EXPIRY_WINDOW_DAYS)]
        days: i64,
    },
}

#[derive(Subcommand)]
enum ShoppingAction {
    List,
    Add {
        name: String,
        #[arg(long, default_value_t = 1)]
        quantity: i64,
    },
    Toggle { id: i64 },
    Remove { id: i64 },
    Generate {
        #[arg(long)]
        threshold: Option<u32>,
    },
    ClearPurchased,
}

#[derive(Subcommand)]
enum NotificationAction {
    List,
    Unread,
    MarkRead,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing().context("failed to initialise tracing")?;

    let config = load_config().context("failed to load configuration")?;
    let app = Application::initialise(&config).context("failed to initialise client")?;
    app.bootstrap().await;

    match cli.command {
        Commands::Login { email, password } => login(&app, &email, &password).await,
        Commands::Register {
            username,
            name,
            email,
            password,
        } => {
            let request = RegisterRequest {
                username,
                name,
                email,
                password,
            };
            let user = app
                .register(&request)
                .await
                .context("registration failed")?;
            println!("{} registered as {}", "✓".green(), user.username.bold());
            Ok(())
        }
        Commands::Whoami => whoami(&app),
        Commands::Logout => {
            app.logout().await;
            println!("{} signed out", "✓".green());
            Ok(())
        }
        Commands::Profile {
            username,
            name,
            email,
        } => {
            require_session(&app)?;
            let request = UpdateProfileRequest {
                username,
                name,
                email,
            };
            let user = app.sessions().update_profile(&request).await?;
            println!("{} profile saved for {}", "✓".green(), user.username.bold());
            Ok(())
        }
        Commands::Password { current, new } => {
            require_session(&app)?;
            let request = ChangePasswordRequest {
                current_password: current,
                new_password: new,
            };
            app.api()
                .change_password(&request)
                .await
                .context("password change failed")?;
            println!("{} password changed", "✓".green());
            Ok(())
        }
        Commands::Visit { path } => visit(&app, &path),
        Commands::Kitchen { action } => kitchen(&app, action).await,
        Commands::Inventory { action } => {
            inventory(&app, action.unwrap_or(InventoryAction::List)).await
        }
        Commands::Shopping { action } => {
            shopping(&app, action.unwrap_or(ShoppingAction::List)).await
        }
        Commands::Notifications { action } => {
            notifications(&app, action.unwrap_or(NotificationAction::List)).await
        }
        Commands::Recipes { servings } => recipes(&app, servings).await,
        Commands::Watch => watch(&app).await,
    }
}

fn require_session(app: &Application) -> Result<()> {
    if !app.snapshot().is_authenticated {
        bail!("not signed in, run `pantry-client login` first");
    }
    Ok(())
}

async fn login(app: &Application, email: &str, password: &str) -> Result<()> {
    let user = app.login(email, password).await.context("login failed")?;
    app.stop_live_updates().await;
    println!(
        "{} signed in as {} ({})",
        "✓".green(),
        user.username.bold(),
        user.effective_role()
    );
    if !user.effective_role().is_assigned() {
        println!("  create or join a kitchen with `pantry-client kitchen`");
    }
    Ok(())
}

fn whoami(app: &Application) -> Result<()> {
    let session = app.snapshot();
    let Some(user) = session.user.as_ref().filter(|_| session.is_authenticated) else {
        println!("{}", "not signed in".yellow());
        return Ok(());
    };
    println!("{} <{}>", user.username.bold(), user.email);
    println!("  role:    {}", user.effective_role());
    match user.kitchen_id {
        Some(kitchen_id) => println!("  kitchen: {kitchen_id}"),
        None => println!("  kitchen: none"),
    }
    if is_expired(session.token.as_deref()) {
        println!("  {}", "token expired".red());
    }
    Ok(())
}

fn visit(app: &Application, path: &str) -> Result<()> {
    let Some(route) = Route::parse(path) else {
        bail!("unknown route {path}");
    };
    match app.visit(route) {
        View::Page(route) => println!("{} {}", "render".green(), route),
        View::Redirect(target) => println!("{} {} -> {}", "redirect".yellow(), route, target),
        View::Loading => println!("{}", "loading".dimmed()),
    }
    Ok(())
}

async fn kitchen(app: &Application, action: KitchenAction) -> Result<()> {
    require_session(app)?;
    match action {
        KitchenAction::Create { name } => {
            let kitchen = app.create_kitchen(&name).await?;
            println!("{} created kitchen {} (#{})", "✓".green(), kitchen.name.bold(), kitchen.id);
            if let Some(code) = kitchen.invitation_code {
                println!("  invitation code: {}", code.cyan());
            }
        }
        KitchenAction::Join { code } => {
            let kitchen = app.join_kitchen(&code).await?;
            println!("{} joined kitchen {} (#{})", "✓".green(), kitchen.name.bold(), kitchen.id);
        }
        KitchenAction::Members => {
            for member in app.pantry().load_members().await? {
                println!(
                    "{:>5}  {:<20} {}",
                    member.id,
                    member.username,
                    member.effective_role()
                );
            }
        }
    }
    Ok(())
}

async fn inventory(app: &Application, action: InventoryAction) -> Result<()> {
    require_session(app)?;
    let pantry = app.pantry();
    match action {
        InventoryAction::List => {
            for item in pantry.load_inventory().await? {
                println!(
                    "{:>5}  {:<24} {:>5} {:<8} {}",
                    item.id,
                    item.name,
                    item.quantity,
                    item.unit_name.as_deref().unwrap_or(""),
                    item.expiry_day().map(|day| day.to_string()).unwrap_or_default()
                );
            }
        }
        InventoryAction::Add {
            name,
            quantity,
            expiry,
            location,
        } => {
            let request = CreateInventoryItemRequest {
                name,
                quantity,
                expiry_date: expiry,
                location,
                ..Default::default()
            };
            let item = pantry.add_inventory_item(request).await?;
            println!("{} added {} (#{})", "✓".green(), item.name.bold(), item.id);
        }
        InventoryAction::Consume { id, amount } => {
            let item = pantry.consume_item(id, amount).await?;
            println!("{} {} left of {}", "✓".green(), item.quantity, item.name.bold());
        }
        InventoryAction::Remove { id } => {
            pantry.delete_inventory_item(id).await?;
            println!("{} removed #{id}", "✓".green());
        }
        InventoryAction::LowStock { threshold } => {
            let items = pantry.load_inventory().await?;
            for item in low_stock(&items, threshold) {
                println!("{:>5}  {:<24} {}", item.id, item.name, item.quantity.to_string().red());
            }
        }
        InventoryAction::Expiring { days } => {
            let items = pantry.load_inventory().await?;
            let today = Local::now().date_naive();
            for alert in expiring(&items, today, days) {
                let when = if alert.days_left <= 0 {
                    "expired".red()
                } else if alert.days_left <= 2 {
                    format!("{} days left", alert.days_left).yellow()
                } else {
                    format!("{} days left", alert.days_left).normal()
                };
                println!("{:>5}  {:<24} {}", alert.item.id, alert.item.name, when);
            }
        }
    }
    Ok(())
}

async fn shopping(app: &Application, action: ShoppingAction) -> Result<()> {
    require_session(app)?;
    let pantry = app.pantry();
    match action {
        ShoppingAction::List => {
            for item in pantry.load_shopping().await? {
                let mark = if item.is_purchased { "x" } else { " " };
                println!(
                    "[{mark}] {:>5}  {:<24} {:>4} {:?}",
                    item.id, item.item_name, item.quantity, item.priority
                );
            }
        }
        ShoppingAction::Add { name, quantity } => {
            let item = pantry.add_to_shopping_list(&name, quantity).await?;
            println!("{} added {} (#{})", "✓".green(), item.item_name.bold(), item.id);
        }
        ShoppingAction::Toggle { id } => {
            let item = pantry.toggle_purchased(id).await?;
            let state = if item.is_purchased { "purchased" } else { "not purchased" };
            println!("{} {} is {state}", "✓".green(), item.item_name.bold());
        }
        ShoppingAction::Remove { id } => {
            pantry.remove_from_shopping_list(id).await?;
            println!("{} removed #{id}", "✓".green());
        }
        ShoppingAction::Generate { threshold } => {
            let generated = pantry.generate_shopping_list(threshold).await?;
            println!("{} {} items added", "✓".green(), generated.items_generated);
        }
        ShoppingAction::ClearPurchased => {
            pantry.clear_purchased().await?;
            println!("{} purchased items cleared", "✓".green());
        }
    }
    Ok(())
}

async fn notifications(app: &Application, action: NotificationAction) -> Result<()> {
    require_session(app)?;
    let pantry = app.pantry();
    match action {
        NotificationAction::List => {
            for notification in pantry.load_notifications().await? {
                let title = if notification.is_read {
                    notification.title.normal()
                } else {
                    notification.title.bold()
                };
                println!("{:>5}  {:?}  {}", notification.id, notification.severity, title);
                println!("       {}", notification.message.dimmed());
            }
        }
        NotificationAction::Unread => {
            println!("{}", pantry.refresh_unread_count().await?);
        }
        NotificationAction::MarkRead => {
            pantry.mark_all_read().await?;
            println!("{} all notifications read", "✓".green());
        }
    }
    Ok(())
}

async fn recipes(app: &Application, servings: Option<u32>) -> Result<()> {
    require_session(app)?;
    let suggestions = app.pantry().suggest_recipes(servings).await?;
    let titles = suggestions.titles();
    if titles.is_empty() {
        println!("{}", "no suggestions".yellow());
    }
    for title in titles {
        println!("• {title}");
    }
    Ok(())
}

async fn watch(app: &Application) -> Result<()> {
    require_session(app)?;
    let mut events = app.live_events();
    if !app.start_live_updates().await {
        bail!("live updates need a signed-in user");
    }
    info!("watching live events, press ctrl-c to stop");

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            event = events.recv() => match event {
                Ok(event) => {
                    print_event(&event);
                    if matches!(event, LiveEvent::ForceLogout | LiveEvent::DatabaseReset) {
                        println!("{}", "session ended by the server".red());
                        return Ok(());
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "dropped live events"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    app.stop_live_updates().await;
    Ok(())
}

fn print_event(event: &LiveEvent) {
    match event {
        LiveEvent::AccessRevoked => println!("{}", "access to the kitchen was revoked".red()),
        LiveEvent::DatabaseReset => println!("{}", "server data was reset".red()),
        LiveEvent::ForceLogout => println!("{}", "forced logout".red()),
        LiveEvent::MemberAdded { kitchen_id } => println!("member joined kitchen {kitchen_id}"),
        LiveEvent::MemberRemoved { kitchen_id } => println!("member left kitchen {kitchen_id}"),
        LiveEvent::UnreadCount { kitchen_id, count } => {
            println!("kitchen {kitchen_id}: {} unread", count.to_string().cyan())
        }
    }
}
