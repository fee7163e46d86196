use clap::Parser;
use homelab_backend::utils::password::{hash_password, prompt_new_password};

#[derive(Parser)]
#[command(name = "pwhash")]
#[command(about = "Hash a password for the user table")]
#[command(version)]
struct Cli {
    #[arg(short, long, help = "Password (will be prompted securely if not provided)")]
    password: Option<String>,
    #[arg(long, help = "Print the hash hex encoded")]
    hex: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let password = match cli.password {
        Some(password) => password,
        None => prompt_new_password()?,
    };

    let hash = hash_password(&password)?;
    if cli.hex {
        println!("{}", hex::encode(hash));
    } else {
        println!("{}", hash);
    }
    Ok(())
}
