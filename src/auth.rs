//! Password store backing the login handshake.
//!
//! Users are registered on first login. The store is a JSON map of username
//! to SHA-256 hex digest kept in the server root, next to (never inside) the
//! per-user directories.

use crate::error::{LptfError, Result};
use crate::sandbox::validate_username;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

pub const USERS_FILE: &str = ".lptf_users.json";

#[derive(Serialize, Deserialize, Debug, Default)]
struct UsersFile {
    users: BTreeMap<String, String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoginOutcome {
    Verified,
    Registered,
}

pub struct CredentialStore {
    path: PathBuf,
    users: Mutex<BTreeMap<String, String>>,
}

impl CredentialStore {
    /// Load `<server_root>/.lptf_users.json`, starting empty if absent.
    pub fn open(server_root: &Path) -> Result<Self> {
        let path = server_root.join(USERS_FILE);
        let users = if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            let file: UsersFile = serde_json::from_reader(reader).map_err(|e| {
                LptfError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("{}: {e}", path.display()),
                ))
            })?;
            file.users
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path,
            users: Mutex::new(users),
        })
    }

    pub fn is_known(&self, username: &str) -> bool {
        self.users.lock().contains_key(username)
    }

    /// Verify a known user's password or register a new user with it.
    pub fn check_or_register(&self, username: &str, password: &str) -> Result<LoginOutcome> {
        validate_username(username)?;
        let digest = password_digest(username, password);
        let mut users = self.users.lock();
        match users.get(username) {
            Some(stored) if *stored == digest => Ok(LoginOutcome::Verified),
            Some(_) => Err(LptfError::Auth(format!("wrong password for {username}"))),
            None => {
                if password.is_empty() {
                    return Err(LptfError::Auth("password may not be empty".into()));
                }
                users.insert(username.to_string(), digest);
                self.persist(&users)?;
                Ok(LoginOutcome::Registered)
            }
        }
    }

    fn persist(&self, users: &BTreeMap<String, String>) -> Result<()> {
        let tmp = self.path.with_extension("json.tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            let file = UsersFile {
                users: users.clone(),
            };
            serde_json::to_writer_pretty(&mut writer, &file)
                .map_err(|e| LptfError::Io(std::io::Error::other(e)))?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Salted with the username so equal passwords give different digests.
fn password_digest(username: &str, password: &str) -> String {
    let mut h = Sha256::new();
    h.update(username.as_bytes());
    h.update([0u8]);
    h.update(password.as_bytes());
    let digest = h.finalize();
    digest.iter().map(|b| format!("{:02x}", b)).collect::<String>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn first_login_registers_then_verifies() {
        let dir = tempdir().unwrap();
        let store = CredentialStore::open(dir.path()).unwrap();
        assert!(!store.is_known("alice"));
        assert_eq!(
            store.check_or_register("alice", "s3cret").unwrap(),
            LoginOutcome::Registered
        );
        assert!(store.is_known("alice"));
        assert_eq!(
            store.check_or_register("alice", "s3cret").unwrap(),
            LoginOutcome::Verified
        );
        assert!(matches!(
            store.check_or_register("alice", "guess"),
            Err(LptfError::Auth(_))
        ));
    }

    #[test]
    fn store_survives_reopen_without_plaintext() {
        let dir = tempdir().unwrap();
        {
            let store = CredentialStore::open(dir.path()).unwrap();
            store.check_or_register("bob", "hunter2").unwrap();
        }
        let raw = fs::read_to_string(dir.path().join(USERS_FILE)).unwrap();
        assert!(!raw.contains("hunter2"));
        let store = CredentialStore::open(dir.path()).unwrap();
        assert!(store.is_known("bob"));
        assert_eq!(
            store.check_or_register("bob", "hunter2").unwrap(),
            LoginOutcome::Verified
        );
    }

    #[test]
    fn invalid_usernames_and_empty_passwords_rejected() {
        let dir = tempdir().unwrap();
        let store = CredentialStore::open(dir.path()).unwrap();
        assert!(store.check_or_register("../root", "pw").is_err());
        assert!(store.check_or_register(".lptf_users.json", "pw").is_err());
        assert!(store.check_or_register("carol", "").is_err());
        assert!(!store.is_known("carol"));
    }

    #[test]
    fn corrupt_store_is_reported() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(USERS_FILE), b"{ not json").unwrap();
        assert!(CredentialStore::open(dir.path()).is_err());
    }

    #[test]
    fn digest_depends_on_user() {
        assert_ne!(password_digest("a", "pw"), password_digest("b", "pw"));
        assert_eq!(password_digest("a", "pw").len(), 64);
    }
}
