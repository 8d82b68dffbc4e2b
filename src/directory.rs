//! User directory lookups.
//!
//! Resolves a user name against the account database and reads the
//! user's `~/.plan` file. Failure to read the plan is never an error:
//! the placeholder `no plan` is returned instead.

use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Name of the per-user plan file in the home directory
pub const PLAN_FILE: &str = ".plan";

/// Plan text used when the plan file cannot be read
pub const NO_PLAN: &[u8] = b"no plan";

/// Account database entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// Registered display name (may be empty)
    pub display_name: String,
    /// Home directory holding the plan file
    pub home: PathBuf,
}

/// Account database
pub trait Accounts: Send + Sync {
    /// Look up an account by login name
    fn lookup_account(&self, name: &str) -> Option<Account>;
}

/// The system account database (`getpwnam_r`)
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemAccounts;

impl Accounts for SystemAccounts {
    fn lookup_account(&self, name: &str) -> Option<Account> {
        match nix::unistd::User::from_name(name) {
            Ok(Some(user)) => Some(Account {
                display_name: display_name(&user.gecos.to_string_lossy()),
                home: user.dir,
            }),
            Ok(None) => None,
            Err(e) => {
                debug!(user = name, error = %e, "Account lookup failed");
                None
            }
        }
    }
}

/// Full name from a GECOS field: everything up to the first comma.
fn display_name(gecos: &str) -> String {
    gecos.split(',').next().unwrap_or_default().to_string()
}

/// Information about an existing user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub display_name: String,
    /// Raw plan file contents, or `no plan`
    pub plan: Vec<u8>,
}

/// Directory adapter combining account lookups with plan files
#[derive(Debug, Clone)]
pub struct Directory<A> {
    accounts: A,
}

impl<A: Accounts> Directory<A> {
    pub fn new(accounts: A) -> Self {
        Directory { accounts }
    }

    /// Look up a user. Returns `None` without touching the filesystem
    /// when no such account exists.
    pub fn lookup(&self, name: &str) -> Option<Entity> {
        let account = self.accounts.lookup_account(name)?;
        let plan = read_plan(&account.home);

        Some(Entity {
            display_name: account.display_name,
            plan,
        })
    }
}

fn read_plan(home: &Path) -> Vec<u8> {
    let path = home.join(PLAN_FILE);
    match std::fs::read(&path) {
        Ok(contents) => contents,
        Err(e) => {
            trace!(path = %path.display(), error = %e, "No readable plan");
            NO_PLAN.to_vec()
        }
    }
}

/// In-memory account database
#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub struct StaticAccounts(pub std::collections::HashMap<String, Account>);

#[cfg(test)]
impl StaticAccounts {
    pub fn with(mut self, name: &str, display_name: &str, home: &Path) -> Self {
        self.0.insert(
            name.to_string(),
            Account {
                display_name: display_name.to_string(),
                home: home.to_path_buf(),
            },
        );
        self
    }
}

#[cfg(test)]
impl Accounts for StaticAccounts {
    fn lookup_account(&self, name: &str) -> Option<Account> {
        self.0.get(name).cloned()
    }
}
