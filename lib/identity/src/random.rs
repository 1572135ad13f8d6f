//! Random strings for token secrets and mailbox addresses.

use rand::{
    Rng, SeedableRng,
    rngs::{OsRng, StdRng},
};

/// Upper, lower and digits: the token secret alphabet.
pub const ALPHANUMERIC: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Lowercase and digits: mailbox local parts.
pub const LOWER_ALPHANUMERIC: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Draws `len` characters uniformly from `charset` with a CSPRNG freshly
/// seeded from the operating system.
///
/// # Errors
///
/// Fails if the OS random source cannot be read.
pub fn random_string(len: usize, charset: &[u8]) -> Result<String, rand::Error> {
    if charset.is_empty() {
        return Ok(String::new());
    }
    let mut rng = StdRng::from_rng(OsRng)?;
    Ok((0..len)
        .map(|_| char::from(charset[rng.gen_range(0..charset.len())]))
        .collect())
}
