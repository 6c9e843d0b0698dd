//! Grant replication from one identity onto another.
//!
//! The privileges of the current user are read with `SHOW GRANTS` and each
//! statement is re-issued against the pending identity with
//! `IDENTIFIED BY`, which creates the user when it does not exist yet and
//! sets its password either way.

use tracing::{debug, warn};

use crate::credential::Password;
use crate::database::DatabaseSession;
use crate::error::{Result, RotationError};

/// Statement listing every grant held by one user.
pub const SHOW_GRANTS_STATEMENT: &str = "SHOW GRANTS FOR ?";

/// Tail appended to a privilege clause to aim it at a bound identity.
pub const RETARGET_SUFFIX: &str = " TO ? IDENTIFIED BY ?";

const GRANTEE_SEPARATOR: &str = " TO ";

/// The privilege clause of one grant statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantStatement {
    privileges: String,
}

impl GrantStatement {
    /// Splits a statement as printed by `SHOW GRANTS FOR <grantee_user>`.
    ///
    /// The split point is the ` TO ` immediately followed by the grantee,
    /// quoted or bare, so a privilege clause that itself contains ` TO ` is
    /// kept intact. Trailing options such as `WITH GRANT OPTION` are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`RotationError::MalformedGrant`] if the grantee cannot be
    /// located or the privilege clause is empty.
    pub fn parse(text: &str, grantee_user: &str) -> Result<Self> {
        let malformed = || RotationError::MalformedGrant {
            statement: text.to_string(),
        };

        let split = anchored_separator(text, grantee_user).ok_or_else(malformed)?;
        let privileges = text[..split].trim();
        if privileges.is_empty() {
            return Err(malformed());
        }

        Ok(Self {
            privileges: privileges.to_string(),
        })
    }

    /// The privilege clause, e.g. ``GRANT SELECT ON `orders`.*``.
    #[must_use]
    pub fn privileges(&self) -> &str {
        &self.privileges
    }

    /// The statement re-aimed at a bound `(user, password)` pair.
    #[must_use]
    pub fn retargeted(&self) -> String {
        format!("{}{RETARGET_SUFFIX}", self.privileges)
    }
}

fn anchored_separator(text: &str, user: &str) -> Option<usize> {
    let grantee = [
        format!("`{user}`@"),
        format!("'{user}'@"),
        format!("\"{user}\"@"),
        format!("{user}@"),
    ];
    text.match_indices(GRANTEE_SEPARATOR)
        .map(|(index, _)| index)
        .find(|&index| {
            let rest = &text[index + GRANTEE_SEPARATOR.len()..];
            grantee.iter().any(|g| rest.starts_with(g.as_str()))
        })
}

/// Copies every grant of one user onto another over a privileged session.
pub struct GrantSynchronizer<'s, S: DatabaseSession> {
    session: &'s mut S,
}

impl<'s, S: DatabaseSession> GrantSynchronizer<'s, S> {
    /// Wraps a session logged in with sufficient privileges to grant.
    pub fn new(session: &'s mut S) -> Self {
        Self { session }
    }

    /// Lists the grants currently held by `user`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row cannot be parsed.
    pub fn grants_for(&mut self, user: &str) -> Result<Vec<GrantStatement>> {
        let rows = self.session.query(SHOW_GRANTS_STATEMENT, &[user])?;
        rows.iter()
            .map(|row| {
                let text = row.first().ok_or_else(|| RotationError::MalformedGrant {
                    statement: String::new(),
                })?;
                GrantStatement::parse(text, user)
            })
            .collect()
    }

    /// Re-issues every grant of `source_user` for `target_user` and commits.
    ///
    /// All statements are parsed before any is executed. The first failing
    /// statement aborts the batch without a commit.
    ///
    /// # Errors
    ///
    /// Returns an error if listing, executing or committing fails.
    pub fn replicate(
        mut self,
        source_user: &str,
        target_user: &str,
        target_password: &Password,
    ) -> Result<usize> {
        let grants = self.grants_for(source_user)?;
        if grants.is_empty() {
            warn!(source = source_user, "source user holds no grants");
        }

        for grant in &grants {
            debug!(privileges = grant.privileges(), target = target_user, "replicating grant");
            self.session.execute(
                &grant.retargeted(),
                &[target_user, target_password.expose()],
            )?;
        }

        self.session.commit()?;
        Ok(grants.len())
    }
}
