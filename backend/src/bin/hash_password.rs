//! Print the Argon2id encoding of a password, for seeding the users table
//!
//! ```text
//! hash-password 'my password'
//! echo 'my password' | hash-password
//! hash-password --verify '$argon2id$v=19$...' 'my password'
//! ```

use anyhow::{bail, Context, Result};
use clap::{Arg, ArgAction, Command};
use folio_backend::auth::PasswordService;
use std::io::BufRead;
use std::process::ExitCode;

fn command() -> Command {
    Command::new("hash-password")
        .about("Generate or check Argon2id password hashes")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::new("password")
                .help("Password to hash; read from stdin when omitted")
                .env("FOLIO_HASH_PASSWORD")
                .hide_env_values(true),
        )
        .arg(
            Arg::new("verify")
                .long("verify")
                .value_name("HASH")
                .help("Check the password against an encoded hash instead of hashing it"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .action(ArgAction::SetTrue)
                .help("Only set the exit code when verifying"),
        )
}

fn read_password(arg: Option<&String>) -> Result<String> {
    if let Some(password) = arg {
        return Ok(password.clone());
    }

    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read password from stdin")?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        bail!("no password given");
    }
    Ok(password)
}

fn run() -> Result<ExitCode> {
    let matches = command().get_matches();
    let password = read_password(matches.get_one::<String>("password"))?;

    if let Some(encoded) = matches.get_one::<String>("verify") {
        let valid = PasswordService::verify(&password, encoded)?;
        if !matches.get_flag("quiet") {
            println!("{}", if valid { "match" } else { "no match" });
        }
        return Ok(if valid { ExitCode::SUCCESS } else { ExitCode::FAILURE });
    }

    let hash = PasswordService::hash(&password)?;
    println!("{}", hash);
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}
