//! Per-team capability tokens.
//!
//! A token is the only credential a team has: whoever holds the link can edit
//! that team's orders. Tokens are issued once per session and survive resets.

use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use indexmap::{IndexMap, IndexSet};
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::{dao::models::SessionDocument, state::clock::Clock};

/// Random bytes per token before encoding.
const TOKEN_BYTES: usize = 24;
/// Characters of the audit hash appended to the random part.
const AUDIT_CHARS: usize = 8;

/// Issues and checks team capability tokens.
#[derive(Debug, Clone)]
pub struct TokenAuthority {
    clock: Arc<dyn Clock>,
}

impl TokenAuthority {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Issue one distinct token per team.
    ///
    /// The random part carries all the entropy; the suffix is a short audit
    /// hash over team, session and issuance time.
    pub fn generate_all(&self, session_id: &str, teams: &[String]) -> IndexMap<String, String> {
        let issued_at = self.clock.now_epoch();
        let mut seen = IndexSet::with_capacity(teams.len());
        let mut tokens = IndexMap::with_capacity(teams.len());

        for team in teams {
            let token = loop {
                let candidate = issue(team, session_id, issued_at);
                if seen.insert(candidate.clone()) {
                    break candidate;
                }
            };
            tokens.insert(team.clone(), token);
        }

        debug!(session_id, teams = tokens.len(), "issued team tokens");
        tokens
    }

    /// Whether `token` is the one issued to `team`.
    pub fn validate(&self, doc: &SessionDocument, team: &str, token: &str) -> bool {
        doc.tokens
            .get(team)
            .is_some_and(|expected| constant_time_eq(expected, token))
    }

    /// Team owning `token`, if any.
    pub fn resolve<'a>(&self, doc: &'a SessionDocument, token: &str) -> Option<&'a str> {
        doc.tokens
            .iter()
            .find(|(_, expected)| constant_time_eq(expected, token))
            .map(|(team, _)| team.as_str())
    }
}

fn issue(team: &str, session_id: &str, issued_at: i64) -> String {
    let mut random = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut random);

    let mut hasher = Sha256::new();
    hasher.update(team.as_bytes());
    hasher.update(b"|");
    hasher.update(session_id.as_bytes());
    hasher.update(b"|");
    hasher.update(issued_at.to_be_bytes());
    let audit = URL_SAFE_NO_PAD.encode(hasher.finalize());

    format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(random),
        &audit[..AUDIT_CHARS]
    )
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
