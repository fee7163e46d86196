use std::io::{self, Write};

use clap::Parser;
use homelab_backend::{
    config::Config,
    db::connection::create_pool,
    models::user::{NewUser, Role},
    repositories::user::{PgUserRepository, UserRepository},
    utils::password::prompt_new_password,
};

#[derive(Parser)]
#[command(name = "user-gen")]
#[command(about = "Create a user directly in the database")]
#[command(version)]
struct Cli {
    #[arg(short, long, help = "Username")]
    username: String,
    #[arg(short, long, help = "Email address")]
    email: String,
    #[arg(short, long, default_value = "default", help = "Comma separated roles")]
    roles: String,
    #[arg(short, long, help = "Password (will be prompted securely if not provided)")]
    password: Option<String>,
    #[arg(short = 'y', long = "yes", help = "Skip confirmation prompt")]
    yes: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let roles = Role::parse_list(&cli.roles).map_err(anyhow::Error::msg)?;

    if !cli.yes {
        let names: Vec<&str> = roles.iter().map(Role::as_str).collect();
        print!(
            "Create user {:?} <{}> with roles [{}]? [y/N]: ",
            cli.username,
            cli.email,
            names.join(", ")
        );
        io::stdout().flush()?;
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        if !matches!(input.trim(), "y" | "Y" | "yes") {
            println!("Aborted");
            return Ok(());
        }
    }

    let password = match cli.password {
        Some(password) => password,
        None => prompt_new_password()?,
    };

    let config = Config::load()?;
    let pool = create_pool(&config.database_url).await?;
    let users = PgUserRepository::new(pool);
    let user = users
        .create(
            &password,
            NewUser {
                username: cli.username,
                email: cli.email,
                roles,
            },
        )
        .await?;
    println!("created user {} ({})", user.username, user.uuid);
    Ok(())
}
