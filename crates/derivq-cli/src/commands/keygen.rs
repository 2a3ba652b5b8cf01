use anyhow::{Result, bail};
use derivq_auth::{SigningAlgorithm, SigningKeyPair};

use crate::cli::KeygenArgs;
use crate::output::{print_field, print_success};

const PRIVATE_KEY_FILE: &str = "private.pem";
const PUBLIC_KEY_FILE: &str = "public.pem";

pub fn run(args: KeygenArgs) -> Result<()> {
    let algorithm = SigningAlgorithm::from(args.algorithm);
    let private_path = args.out.join(PRIVATE_KEY_FILE);
    let public_path = args.out.join(PUBLIC_KEY_FILE);

    if !args.force {
        for path in [&private_path, &public_path] {
            if path.exists() {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
        }
    }

    let pem = SigningKeyPair::generate_pem(algorithm)?;
    std::fs::create_dir_all(&args.out)?;
    std::fs::write(&private_path, pem.private_pem)?;
    std::fs::write(&public_path, pem.public_pem)?;

    print_success(&format!("Generated {algorithm} key pair"));
    print_field("private", &private_path.display().to_string());
    print_field("public", &public_path.display().to_string());
    println!();
    println!("[auth.signing]");
    println!("algorithm = \"{algorithm}\"");
    println!("private_key_path = \"{}\"", private_path.display());
    Ok(())
}
