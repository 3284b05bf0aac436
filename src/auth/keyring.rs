/// System keyring integration for the access token
/// Uses native keyring: Secret Service (Linux), Keychain (macOS), Credential Manager (Windows)
use keyring::Entry;

use super::store::CredentialStore;
use crate::error::ClientError;
use crate::types::Credential;

pub struct KeyringStore {
    service: String,
    key: String,
}

impl KeyringStore {
    pub fn new(service: &str, key: &str) -> Self {
        Self {
            service: service.to_string(),
            key: key.to_string(),
        }
    }

    fn entry(&self) -> Result<Entry, ClientError> {
        Ok(Entry::new(&self.service, &self.key)?)
    }
}

impl CredentialStore for KeyringStore {
    fn load(&self) -> Result<Option<Credential>, ClientError> {
        match self.entry()?.get_password() {
            Ok(token) => Ok(Some(Credential::new(token)).filter(|c| !c.is_empty())),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, credential: &Credential) -> Result<(), ClientError> {
        self.entry()?.set_password(credential.expose())?;
        tracing::debug!(service = %self.service, "credential saved to keyring");
        Ok(())
    }
}
