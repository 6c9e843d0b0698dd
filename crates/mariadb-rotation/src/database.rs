//! Database collaborator contract.
//!
//! The rotation never speaks the MariaDB wire protocol itself. It needs to
//! open a session with a credential, run parameterized statements, commit and
//! close. Sessions are always wrapped in a [`ScopedSession`] so that every exit
//! path releases them.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::time::Duration;

use thiserror::Error;

use crate::credential::{CredentialRecord, Password};

/// One result row, columns rendered as text.
pub type Row = Vec<String>;

/// Why a login attempt did not produce a session.
///
/// These are ordinary outcomes of a login attempt, not step failures. The
/// step decides which rotation error, if any, a failed login maps to.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConnectError {
    /// The server rejected the user or password.
    #[error("access denied for user {user}")]
    AccessDenied {
        /// The user that attempted to log in.
        user: String,
    },

    /// The host could not be reached.
    #[error("host {host} unreachable: {reason}")]
    Unreachable {
        /// The host that was dialed.
        host: String,
        /// Transport-level reason.
        reason: String,
    },

    /// The connect timeout elapsed.
    #[error("connection to {host} timed out after {timeout:?}")]
    Timeout {
        /// The host that was dialed.
        host: String,
        /// The timeout that elapsed.
        timeout: Duration,
    },
}

/// A statement or commit failed on an open session.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DatabaseError {
    /// The server rejected a statement.
    #[error("statement failed: {reason}")]
    Statement {
        /// The server's reason.
        reason: String,
    },

    /// The commit did not complete.
    #[error("commit failed: {reason}")]
    Commit {
        /// The server's reason.
        reason: String,
    },

    /// The session was used after being closed.
    #[error("session is closed")]
    Closed,
}

/// Everything needed to open a session.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectParams {
    /// Endpoint host name.
    pub host: String,
    /// Endpoint port.
    pub port: u16,
    /// Login user.
    pub username: String,
    /// Login password.
    pub password: Password,
    /// Default schema, if any.
    pub dbname: Option<String>,
    /// Upper bound on the time spent establishing the session.
    pub connect_timeout: Duration,
}

impl ConnectParams {
    /// Builds connection parameters from a credential record.
    #[must_use]
    pub fn from_record(record: &CredentialRecord, connect_timeout: Duration) -> Self {
        Self {
            host: record.host.clone(),
            port: record.port(),
            username: record.username.clone(),
            password: record.password.clone(),
            dbname: record.dbname.clone(),
            connect_timeout,
        }
    }
}

impl fmt::Debug for ConnectParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("dbname", &self.dbname)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

/// An open database session.
pub trait DatabaseSession {
    /// Runs a statement and returns its rows.
    fn query(&mut self, statement: &str, params: &[&str]) -> Result<Vec<Row>, DatabaseError>;

    /// Runs a statement and returns the number of affected rows.
    fn execute(&mut self, statement: &str, params: &[&str]) -> Result<u64, DatabaseError>;

    /// Commits everything executed since the last commit.
    fn commit(&mut self) -> Result<(), DatabaseError>;

    /// Releases the session. Uncommitted work is discarded.
    fn close(&mut self);
}

/// Opens sessions.
pub trait DatabaseConnector {
    /// Session type produced by this connector.
    type Session: DatabaseSession;

    /// Attempts a login.
    fn connect(&self, params: &ConnectParams) -> Result<Self::Session, ConnectError>;
}

impl<T: DatabaseConnector + ?Sized> DatabaseConnector for &T {
    type Session = T::Session;

    fn connect(&self, params: &ConnectParams) -> Result<Self::Session, ConnectError> {
        (**self).connect(params)
    }
}

/// A session that is closed when it goes out of scope.
pub struct ScopedSession<S: DatabaseSession> {
    session: S,
    closed: bool,
}

impl<S: DatabaseSession> ScopedSession<S> {
    /// Takes ownership of an open session.
    pub fn new(session: S) -> Self {
        Self {
            session,
            closed: false,
        }
    }

    /// Closes the session now.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.closed {
            self.closed = true;
            self.session.close();
        }
    }
}

impl<S: DatabaseSession> Deref for ScopedSession<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.session
    }
}

impl<S: DatabaseSession> DerefMut for ScopedSession<S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.session
    }
}

impl<S: DatabaseSession> Drop for ScopedSession<S> {
    fn drop(&mut self) {
        self.release();
    }
}
