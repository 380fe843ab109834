//! Prints a bcrypt hash for seeding accounts by hand.
//!
//! Usage: `hash-password [PASSWORD]`; falls back to `ADMIN_PASSWORD`.
//! The cost comes from `BCRYPT_COST` when set.

use anyhow::{bail, Context};
use newsroom_backend::auth::password::MIN_PASSWORD_LEN;
use std::env;

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let Some(password) = env::args().nth(1).or_else(|| env::var("ADMIN_PASSWORD").ok()) else {
        bail!("Usage: hash-password <PASSWORD> (or set ADMIN_PASSWORD)");
    };
    if password.chars().count() < MIN_PASSWORD_LEN {
        bail!("Password must be at least {MIN_PASSWORD_LEN} characters");
    }

    let cost = match env::var("BCRYPT_COST") {
        Ok(raw) => raw
            .trim()
            .parse::<u32>()
            .with_context(|| format!("BCRYPT_COST is not a number: {raw}"))?,
        Err(_) => bcrypt::DEFAULT_COST,
    };

    let hashed = bcrypt::hash(&password, cost).context("hashing password")?;
    println!("Cost : {cost}");
    println!("Hash : {hashed}");
    Ok(())
}
