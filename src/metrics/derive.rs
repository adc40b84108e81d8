//! Pure derivations over a modem snapshot.
//!
//! Nothing in here performs I/O. Malformed inputs produce absent values,
//! never a zero that could pass for a real reading.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ExporterError, Result};
use crate::metrics::data::{DerivedFields, ModemSnapshot};
use crate::modem::types::{AccessTechnology, ModemState, RegistrationState};

/// How the `registered` flag is computed from the operational state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegisteredRule {
    /// Only `Registered` and `Connected` count as registered.
    RegisteredOrConnected,
    /// Every state at or above `Registered` counts, including the
    /// transitional `Connecting` and `Disconnecting`.
    AtLeastRegistered,
}

/// How the access-technology list is reduced to a single RAT tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RatPolicy {
    /// Exactly one technology is required; anything else fails the modem.
    ExactlyOne,
    /// The first technology wins, extras are dropped, none yields "".
    FirstWins,
}

/// Parse a hexadecimal cell, location-area or tracking-area identifier.
///
/// Accepts 1 to 16 hex digits with no sign or prefix. Values past the
/// signed 64-bit range are rejected so every identifier fits an integer
/// field of the line protocol.
pub fn parse_hex_id(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    if raw.is_empty() || raw.len() > 16 || !raw.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u64::from_str_radix(raw, 16)
        .ok()
        .filter(|v| i64::try_from(*v).is_ok())
}

/// Parse the decimal operator code (MCC+MNC).
///
/// An empty code means "not registered" and is absent without comment.
pub fn parse_operator_code(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse::<u64>() {
        Ok(code) => Some(code),
        Err(e) => {
            warn!(operator_code = raw, error = %e, "cannot parse operator code");
            None
        }
    }
}

pub fn is_registered(state: ModemState, rule: RegisteredRule) -> bool {
    match rule {
        RegisteredRule::RegisteredOrConnected => {
            matches!(state, ModemState::Registered | ModemState::Connected)
        }
        RegisteredRule::AtLeastRegistered => state >= ModemState::Registered,
    }
}

pub fn is_connected(state: ModemState) -> bool {
    state == ModemState::Connected
}

pub fn is_roaming(registration: RegistrationState) -> bool {
    registration == RegistrationState::Roaming
}

/// Reduce the access-technology list to a lowercased RAT tag.
pub fn normalize_rat(modem: &str, technologies: &[AccessTechnology], policy: RatPolicy) -> Result<String> {
    match policy {
        RatPolicy::ExactlyOne => match technologies {
            [only] => Ok(only.to_string().to_lowercase()),
            other => Err(ExporterError::identity_error(format!(
                "{}: expected exactly one access technology, got {}",
                modem,
                other.len()
            ))),
        },
        RatPolicy::FirstWins => {
            let Some((first, rest)) = technologies.split_first() else {
                debug!(modem, "no access technology reported");
                return Ok(String::new());
            };
            for dropped in rest {
                warn!(modem, technology = %dropped, "dropping additional access technology");
            }
            Ok(first.to_string().to_lowercase())
        }
    }
}

/// Compute every derived value the emitters need.
pub fn derive(snapshot: &ModemSnapshot, rule: RegisteredRule) -> DerivedFields {
    let registered = snapshot.state.map(|s| is_registered(s, rule));
    let connected = snapshot.state.map(is_connected);

    // A modem the state machine reports as unregistered cannot be roaming,
    // whatever the 3GPP registration state says.
    let roaming = snapshot
        .registration_state
        .map(|r| is_roaming(r) && registered != Some(false));

    let location = snapshot.location.as_ref();
    let cell_id = location.and_then(|l| hex_field(&snapshot.path, "cellid", &l.cell_id_hex));
    let lac = location.and_then(|l| hex_field(&snapshot.path, "lac", &l.lac_hex));
    let tac = location.and_then(|l| hex_field(&snapshot.path, "tac", &l.tac_hex));

    DerivedFields {
        registered,
        connected,
        roaming,
        cell_id,
        lac,
        tac,
        operator_code: snapshot.operator_code.as_deref().and_then(parse_operator_code),
    }
}

fn hex_field(modem: &str, field: &str, raw: &str) -> Option<u64> {
    let parsed = parse_hex_id(raw);
    if parsed.is_none() && !raw.is_empty() {
        warn!(modem, field, value = raw, "cannot parse hex identifier");
    }
    parsed
}
