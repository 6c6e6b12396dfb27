//! Remembered login passwords ("Recordarme").
//!
//! `portal login --remember` saves the password in the OS keychain after a
//! successful login. Later logins for the same email read it back instead
//! of prompting, and a password the server refuses is deleted so the next
//! attempt prompts again.

use anyhow::{Context, Result};
use keyring::Entry;

const SERVICE_NAME: &str = "portal";

pub struct CredentialStore;

impl CredentialStore {
    fn entry(correo: &str) -> Result<Entry> {
        Entry::new(SERVICE_NAME, correo.trim()).context("Failed to create keyring entry")
    }

    /// Remember `password` for `correo`. Called only after the server
    /// accepted it, so a rejected password is never saved.
    pub fn store(correo: &str, password: &str) -> Result<()> {
        Self::entry(correo)?
            .set_password(password)
            .context("Failed to store password in keychain")
    }

    pub fn get_password(correo: &str) -> Result<String> {
        Self::entry(correo)?
            .get_password()
            .context("Failed to retrieve password from keychain")
    }

    /// Forget the password for `correo`, e.g. after the server refused it.
    pub fn delete(correo: &str) -> Result<()> {
        Self::entry(correo)?
            .delete_credential()
            .context("Failed to delete credential from keychain")
    }

    pub fn has_credentials(correo: &str) -> bool {
        Self::entry(correo)
            .map(|entry| entry.get_password().is_ok())
            .unwrap_or(false)
    }
}
