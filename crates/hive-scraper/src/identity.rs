//! Identity pool: a finite, ordered list of accounts handed out one at a
//! time. Once the list is used up the pool stays empty for the rest of the run.

use std::fmt;
use std::path::Path;

use serde::Deserialize;

use crate::clients::bga::Authenticator;
use crate::error::ScrapeError;

#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Read `[{"email": ..., "password": ...}, ...]` from a JSON file.
pub fn load_credentials(path: &Path) -> Result<Vec<Credentials>, ScrapeError> {
    let raw = std::fs::read_to_string(path)?;
    let credentials: Vec<Credentials> = serde_json::from_str(&raw)?;
    if credentials.is_empty() {
        return Err(ScrapeError::Config(format!(
            "no accounts listed in {}",
            path.display()
        )));
    }
    Ok(credentials)
}

/// Position in the credential list. Never wraps around.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CredentialCursor {
    next: usize,
    len: usize,
}

impl CredentialCursor {
    pub fn new(len: usize) -> Self {
        Self { next: 0, len }
    }

    /// The slot to hand out now, and the cursor to use afterwards.
    pub fn advance(self) -> (Option<usize>, Self) {
        if self.next >= self.len {
            return (None, self);
        }
        (
            Some(self.next),
            Self {
                next: self.next + 1,
                len: self.len,
            },
        )
    }

    pub fn remaining(&self) -> usize {
        self.len.saturating_sub(self.next)
    }
}

/// An authenticated account.
#[derive(Debug)]
pub struct Identity<S> {
    pub email: String,
    pub session: S,
    pub matches_handled: usize,
    slot: usize,
}

pub struct IdentityPool<A> {
    authenticator: A,
    credentials: Vec<Credentials>,
    cursor: CredentialCursor,
    exhaustion_logged: bool,
}

impl<A: Authenticator> IdentityPool<A> {
    pub fn new(authenticator: A, credentials: Vec<Credentials>) -> Self {
        let cursor = CredentialCursor::new(credentials.len());
        Self {
            authenticator,
            credentials,
            cursor,
            exhaustion_logged: false,
        }
    }

    /// Authenticate the next account in order. Accounts that fail to log in
    /// are passed over with a warning. `None` once every account is spent.
    pub async fn next_identity(&mut self) -> Option<Identity<A::Session>> {
        loop {
            let (slot, cursor) = self.cursor.advance();
            self.cursor = cursor;

            let Some(slot) = slot else {
                if !self.exhaustion_logged {
                    tracing::warn!(accounts = self.credentials.len(), "All identities exhausted");
                    self.exhaustion_logged = true;
                }
                return None;
            };

            let credentials = &self.credentials[slot];
            match self.authenticator.authenticate(credentials).await {
                Ok(session) => {
                    tracing::info!(email = %credentials.email, "Logged in");
                    return Some(Identity {
                        email: credentials.email.clone(),
                        session,
                        matches_handled: 0,
                        slot,
                    });
                }
                Err(e) => {
                    tracing::warn!(email = %credentials.email, error = %e, "Login failed, trying next account");
                }
            }
        }
    }

    /// Log in again with the credentials `identity` was built from, keeping
    /// its counters. Used after a transport failure.
    pub async fn reauthenticate(&self, identity: &mut Identity<A::Session>) -> Result<(), ScrapeError> {
        let credentials = &self.credentials[identity.slot];
        identity.session = self.authenticator.authenticate(credentials).await?;
        tracing::info!(email = %identity.email, "Session re-established");
        Ok(())
    }

    /// Accounts not yet handed out.
    pub fn remaining(&self) -> usize {
        self.cursor.remaining()
    }
}
