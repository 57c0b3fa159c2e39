const SERVICE: &str = "timeline";
const KEY: &str = "auth_token";

fn entry() -> Result<keyring::Entry, keyring::Error> {
    keyring::Entry::new(SERVICE, KEY).inspect_err(|e| {
        log::error!("keyring Entry::new failed for key={KEY:?}: {e}");
    })
}

/// Stored auth token, or `None` when nothing has been saved.
pub fn get_token() -> Result<Option<String>, keyring::Error> {
    log::debug!("keyring GET: service={SERVICE:?} key={KEY:?}");
    match entry()?.get_password() {
        Ok(token) => Ok(Some(token)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => {
            log::warn!("keyring get_password failed for key={KEY:?}: {e}");
            Err(e)
        }
    }
}

pub fn set_token(token: &str) -> Result<(), keyring::Error> {
    log::debug!("keyring SET: service={SERVICE:?} key={KEY:?}");
    entry()?.set_password(token).inspect_err(|e| {
        log::error!("keyring set_password failed for key={KEY:?}: {e}");
    })
}

/// Forget the stored token. Succeeds when there was none.
pub fn delete_token() -> Result<(), keyring::Error> {
    log::debug!("keyring DELETE: service={SERVICE:?} key={KEY:?}");
    match entry()?.delete_credential() {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => {
            log::error!("keyring delete_credential failed for key={KEY:?}: {e}");
            Err(e)
        }
    }
}
