//! cli::commands::auth
//!
//! `gitrun auth`: manage stored forge tokens through the secret store
//! abstraction. Never prints a token's value back to the terminal.

use std::io::Read;

use anyhow::{bail, Result};

use crate::cli::args::AuthAction;
use crate::secrets::create_store;

pub fn run(action: AuthAction) -> Result<i32> {
    match action {
        AuthAction::Set { key, token, provider } => {
            let store = create_store(&provider)?;
            let token = match token {
                Some(t) => t,
                None => {
                    let mut buf = String::new();
                    std::io::stdin().read_to_string(&mut buf)?;
                    buf.trim().to_string()
                }
            };
            if token.is_empty() {
                bail!("no token provided");
            }
            store.set(&key, &token)?;
            println!("stored token for '{key}'");
            Ok(0)
        }
        AuthAction::Status { key, provider } => {
            let store = create_store(&provider)?;
            let present = store.exists(&key)?;
            println!("{key}: {}", if present { "present" } else { "not set" });
            Ok(0)
        }
        AuthAction::Delete { key, provider } => {
            let store = create_store(&provider)?;
            store.delete(&key)?;
            println!("deleted token for '{key}'");
            Ok(0)
        }
    }
}
