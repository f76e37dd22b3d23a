// crates/session-client/src/identity.rs

//! Session identity.
//!
//! A player is identified by an 8-digit decimal id chosen on the entry
//! screen. Without one the session cannot be bound to a player, so a
//! missing, blank or malformed id is replaced by a fresh one instead of running an
//! anonymous session.

use rand::Rng;
use tracing::warn;

pub const ID_LEN: usize = 8;

/// Random id of exactly [`ID_LEN`] decimal digits (leading zeros kept).
pub fn generate_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("{:08}", rng.gen_range(0..100_000_000u32))
}

/// Whether `id` is exactly [`ID_LEN`] ASCII digits.
pub fn is_valid_id(id: &str) -> bool {
    id.len() == ID_LEN && id.bytes().all(|b| b.is_ascii_digit())
}

/// The id to run with: `given` trimmed if it is a valid id, otherwise a
/// generated one.
pub fn resolve(given: Option<&str>) -> String {
    match given.map(str::trim).filter(|id| !id.is_empty()) {
        Some(id) if is_valid_id(id) => id.to_string(),
        Some(bad) => {
            let id = generate_id(&mut rand::thread_rng());
            warn!(given = %bad, %id, "session id must be 8 digits; starting a new session");
            id
        }
        None => {
            let id = generate_id(&mut rand::thread_rng());
            warn!(%id, "no session id given; starting a new session");
            id
        }
    }
}
