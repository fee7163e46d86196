use std::{fs, path::PathBuf};

use clap::Parser;
use homelab_backend::utils::keys::{ed25519_pem_pair, generate_seed};

#[derive(Parser)]
#[command(name = "key-gen")]
#[command(about = "Generate Ed25519 signing keys for access tokens")]
#[command(version)]
struct Cli {
    #[arg(long, help = "Print a hex encoded seed for JWT_SEED instead of writing PEM files")]
    seed: bool,
    #[arg(short, long, default_value = "jwt", help = "Output path prefix for <out>.key and <out>.pub")]
    out: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let seed = generate_seed()?;
    if cli.seed {
        println!("{}", hex::encode(seed));
        return Ok(());
    }

    let (private_pem, public_pem) = ed25519_pem_pair(&seed)?;
    let private_path = cli.out.with_extension("key");
    let public_path = cli.out.with_extension("pub");
    fs::write(&private_path, private_pem)?;
    fs::write(&public_path, public_pem)?;
    println!(
        "wrote {} and {}",
        private_path.display(),
        public_path.display()
    );
    Ok(())
}
