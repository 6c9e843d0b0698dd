//! In-process stand-in for a set of MariaDB servers.
//!
//! Understands exactly the statements the rotation issues: grant listing,
//! re-targeted grants and read-only `SELECT` probes, which return one row.
//! Grants are staged per session and applied only on commit, so an aborted
//! batch leaves no trace.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::credential::Password;
use crate::database::{
    ConnectError, ConnectParams, DatabaseConnector, DatabaseError, DatabaseSession, Row,
};
use crate::grants::{RETARGET_SUFFIX, SHOW_GRANTS_STATEMENT};

/// A database account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseUser {
    /// Login password.
    pub password: Password,
    /// Privilege clauses such as ``GRANT SELECT ON `orders`.*``.
    #[serde(default)]
    pub grants: Vec<String>,
    /// Whether the account may grant privileges to others.
    #[serde(default)]
    pub can_grant: bool,
}

/// One server, addressed by host name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseServer {
    /// Whether logins reach the server at all.
    #[serde(default = "default_reachable")]
    pub reachable: bool,
    /// Accounts keyed by user name.
    #[serde(default)]
    pub users: BTreeMap<String, DatabaseUser>,
}

impl Default for DatabaseServer {
    fn default() -> Self {
        Self {
            reachable: true,
            users: BTreeMap::new(),
        }
    }
}

fn default_reachable() -> bool {
    true
}

/// Serializable state of every simulated server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSnapshot {
    /// Servers keyed by host name.
    #[serde(default)]
    pub servers: BTreeMap<String, DatabaseServer>,
}

/// Session bookkeeping, used to assert that sessions are released and that
/// idempotent re-runs write nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Successful logins.
    pub opened: u64,
    /// Sessions released.
    pub closed: u64,
    /// Commits that applied at least one change.
    pub commits: u64,
    /// Grant statements applied by commits.
    pub writes: u64,
}

#[derive(Debug, Default)]
struct Inner {
    servers: BTreeMap<String, DatabaseServer>,
    stats: SessionStats,
    failing_fragments: Vec<String>,
}

/// Simulated MariaDB servers shared by every session they hand out.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDatabase {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryDatabase {
    /// Creates an empty database with no servers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores servers from a snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: DatabaseSnapshot) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                servers: snapshot.servers,
                ..Inner::default()
            })),
        }
    }

    /// Captures the current server state.
    #[must_use]
    pub fn snapshot(&self) -> DatabaseSnapshot {
        DatabaseSnapshot {
            servers: self.lock().servers.clone(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds an account, creating the server if needed.
    pub fn add_user(&self, host: &str, user: &str, password: &str, grants: &[&str]) {
        self.insert_user(host, user, password, grants, false);
    }

    /// Adds an account that may grant privileges.
    pub fn add_admin(&self, host: &str, user: &str, password: &str) {
        self.insert_user(
            host,
            user,
            password,
            &["GRANT ALL PRIVILEGES ON *.*"],
            true,
        );
    }

    fn insert_user(&self, host: &str, user: &str, password: &str, grants: &[&str], can_grant: bool) {
        let mut inner = self.lock();
        inner.servers.entry(host.to_string()).or_default().users.insert(
            user.to_string(),
            DatabaseUser {
                password: Password::new(password),
                grants: grants.iter().map(ToString::to_string).collect(),
                can_grant,
            },
        );
    }

    /// Marks a server reachable or unreachable.
    pub fn set_reachable(&self, host: &str, reachable: bool) {
        self.lock()
            .servers
            .entry(host.to_string())
            .or_default()
            .reachable = reachable;
    }

    /// Makes every statement containing `fragment` fail.
    pub fn fail_statements_containing(&self, fragment: &str) {
        self.lock().failing_fragments.push(fragment.to_string());
    }

    /// Returns a copy of an account.
    #[must_use]
    pub fn user(&self, host: &str, user: &str) -> Option<DatabaseUser> {
        self.lock()
            .servers
            .get(host)
            .and_then(|server| server.users.get(user))
            .cloned()
    }

    /// Session counters since creation.
    #[must_use]
    pub fn stats(&self) -> SessionStats {
        self.lock().stats
    }
}

impl DatabaseConnector for InMemoryDatabase {
    type Session = InMemorySession;

    fn connect(&self, params: &ConnectParams) -> Result<InMemorySession, ConnectError> {
        let mut inner = self.lock();
        let server = inner
            .servers
            .get(&params.host)
            .ok_or_else(|| ConnectError::Unreachable {
                host: params.host.clone(),
                reason: "unknown host".to_string(),
            })?;

        if !server.reachable {
            return Err(ConnectError::Timeout {
                host: params.host.clone(),
                timeout: params.connect_timeout,
            });
        }

        let authenticated = server
            .users
            .get(&params.username)
            .is_some_and(|user| user.password == params.password);
        if !authenticated {
            return Err(ConnectError::AccessDenied {
                user: params.username.clone(),
            });
        }

        inner.stats.opened += 1;
        Ok(InMemorySession {
            inner: Arc::clone(&self.inner),
            host: params.host.clone(),
            user: params.username.clone(),
            staged: Vec::new(),
            closed: false,
        })
    }
}

#[derive(Debug)]
struct StagedGrant {
    privileges: String,
    user: String,
    password: Password,
}

fn is_select(statement: &str) -> bool {
    statement
        .trim_start()
        .get(..7)
        .is_some_and(|head| head.eq_ignore_ascii_case("SELECT "))
}

/// A session against one simulated server.
#[derive(Debug)]
pub struct InMemorySession {
    inner: Arc<Mutex<Inner>>,
    host: String,
    user: String,
    staged: Vec<StagedGrant>,
    closed: bool,
}

impl InMemorySession {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_usable(&self, statement: &str) -> Result<(), DatabaseError> {
        if self.closed {
            return Err(DatabaseError::Closed);
        }
        let inner = self.lock();
        if inner
            .failing_fragments
            .iter()
            .any(|fragment| statement.contains(fragment.as_str()))
        {
            return Err(DatabaseError::Statement {
                reason: format!("injected failure for statement: {statement}"),
            });
        }
        Ok(())
    }

    fn show_grants(&self, user: &str) -> Result<Vec<Row>, DatabaseError> {
        let inner = self.lock();
        let account = inner
            .servers
            .get(&self.host)
            .and_then(|server| server.users.get(user))
            .ok_or_else(|| DatabaseError::Statement {
                reason: format!("there is no such grant defined for user '{user}' on host '%'"),
            })?;

        Ok(account
            .grants
            .iter()
            .map(|privileges| vec![format!("{privileges} TO `{user}`@`%`")])
            .collect())
    }
}

impl DatabaseSession for InMemorySession {
    fn query(&mut self, statement: &str, params: &[&str]) -> Result<Vec<Row>, DatabaseError> {
        self.check_usable(statement)?;
        match statement {
            SHOW_GRANTS_STATEMENT => {
                let user = params.first().ok_or_else(|| DatabaseError::Statement {
                    reason: "missing grantee parameter".to_string(),
                })?;
                self.show_grants(user)
            }
            "SELECT NOW()" => Ok(vec![vec![
                chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            ]]),
            other if is_select(other) => Ok(vec![vec!["1".to_string()]]),
            other => Err(DatabaseError::Statement {
                reason: format!("unsupported query: {other}"),
            }),
        }
    }

    fn execute(&mut self, statement: &str, params: &[&str]) -> Result<u64, DatabaseError> {
        self.check_usable(statement)?;
        let privileges = statement
            .strip_suffix(RETARGET_SUFFIX)
            .filter(|clause| clause.starts_with("GRANT "))
            .ok_or_else(|| DatabaseError::Statement {
                reason: format!("unsupported statement: {statement}"),
            })?;

        let [user, password] = params else {
            return Err(DatabaseError::Statement {
                reason: format!("expected 2 parameters, got {}", params.len()),
            });
        };

        let may_grant = self
            .lock()
            .servers
            .get(&self.host)
            .and_then(|server| server.users.get(&self.user))
            .is_some_and(|account| account.can_grant);
        if !may_grant {
            return Err(DatabaseError::Statement {
                reason: format!("access denied; {} lacks the GRANT OPTION privilege", self.user),
            });
        }

        self.staged.push(StagedGrant {
            privileges: privileges.to_string(),
            user: (*user).to_string(),
            password: Password::new(*password),
        });
        Ok(0)
    }

    fn commit(&mut self) -> Result<(), DatabaseError> {
        if self.closed {
            return Err(DatabaseError::Closed);
        }
        let staged = std::mem::take(&mut self.staged);
        if staged.is_empty() {
            return Ok(());
        }

        let host = self.host.clone();
        let mut inner = self.lock();
        let writes = staged.len() as u64;
        let server = inner.servers.entry(host).or_default();
        if !server.reachable {
            return Err(DatabaseError::Commit {
                reason: format!("lost connection to {} during commit", self.host),
            });
        }
        for grant in staged {
            let account = server
                .users
                .entry(grant.user.clone())
                .or_insert_with(|| DatabaseUser {
                    password: grant.password.clone(),
                    grants: Vec::new(),
                    can_grant: false,
                });
            account.password = grant.password.clone();
            if !account.grants.contains(&grant.privileges) {
                account.grants.push(grant.privileges.clone());
            }
        }
        inner.stats.commits += 1;
        inner.stats.writes += writes;
        Ok(())
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.staged.clear();
            self.lock().stats.closed += 1;
        }
    }
}
