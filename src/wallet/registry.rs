//! Wallet registry
//!
//! Loads managed wallets, funding wallets and watched addresses from
//! wallets.json and handles registration and soft deletion.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};

use super::derive::{
    normalize_address, normalize_phrase, private_key_hex, signer_address, signer_from_phrase,
    validate_address,
};
use super::types::{
    FundingWallet, ManagedWallet, RegistryFile, SigningHandle, WalletKind, WatchedAddress,
};

const REGISTRY_FILE: &str = "wallets.json";

/// Read access to the wallets a reconciliation pass works on.
///
/// Both lists exclude soft-deleted wallets and are ordered newest-first.
pub trait WalletRegistry: Send + Sync {
    /// Managed wallets to sweep and top up
    fn list_managed(&self) -> Result<Vec<ManagedWallet>>;

    /// Funding wallets available as top-up sources
    fn list_funding(&self) -> Result<Vec<FundingWallet>>;
}

/// Registry persisted as wallets.json in the credentials directory
pub struct JsonWalletRegistry {
    /// Base directory for credentials
    credentials_dir: PathBuf,

    /// Path used to derive addresses at registration
    derivation_path: String,

    /// In-memory copy of the registry file
    file: RegistryFile,
}

impl JsonWalletRegistry {
    /// Load the registry from a directory.
    ///
    /// A missing wallets.json yields an empty registry.
    pub fn load(credentials_dir: &Path, derivation_path: &str) -> Result<Self> {
        let registry_path = credentials_dir.join(REGISTRY_FILE);

        let file = if registry_path.exists() {
            let content = std::fs::read_to_string(&registry_path)
                .map_err(|e| Error::Registry(format!("Failed to read {}: {}", REGISTRY_FILE, e)))?;

            serde_json::from_str::<RegistryFile>(&content)
                .map_err(|e| Error::Registry(format!("Failed to parse {}: {}", REGISTRY_FILE, e)))?
        } else {
            warn!("{} not found, starting with an empty registry", REGISTRY_FILE);
            RegistryFile::default()
        };

        info!(
            "Loaded {} managed and {} funding wallet entries",
            file.managed.len(),
            file.funding.len()
        );

        Ok(Self {
            credentials_dir: credentials_dir.to_path_buf(),
            derivation_path: derivation_path.to_string(),
            file,
        })
    }

    /// Register a managed wallet from its recovery phrase
    pub fn register_managed(&mut self, mnemonic: &str, name: &str) -> Result<ManagedWallet> {
        let phrase = normalize_phrase(mnemonic)?;
        let signer = signer_from_phrase(&phrase, &self.derivation_path)
            .map_err(|e| Error::InvalidMnemonic(e.to_string()))?;
        let address = signer_address(&signer);

        if self.file.managed.iter().any(|w| w.address == address) {
            return Err(Error::DuplicateAddress(address));
        }

        let wallet = ManagedWallet {
            id: Uuid::new_v4().to_string(),
            address,
            mnemonic: phrase,
            name: name.trim().to_string(),
            deleted: false,
            created_at: Utc::now(),
        };

        self.file.managed.push(wallet.clone());
        self.save()?;

        info!("Registered managed wallet {} ({})", wallet.name, wallet.address);
        Ok(wallet)
    }

    /// Register a funding wallet, caching its derived private key
    pub fn register_funding(&mut self, mnemonic: &str, name: &str) -> Result<FundingWallet> {
        let phrase = normalize_phrase(mnemonic)?;
        let signer = signer_from_phrase(&phrase, &self.derivation_path)
            .map_err(|e| Error::InvalidMnemonic(e.to_string()))?;

        let private_key = private_key_hex(&signer);
        if private_key.len() != 64 {
            return Err(Error::Derivation(format!(
                "derived private key has unexpected length {}",
                private_key.len()
            )));
        }

        let address = signer_address(&signer);

        if self.file.funding.iter().any(|w| w.address == address) {
            return Err(Error::DuplicateAddress(address));
        }
        if let Some(existing) = self.file.funding.iter().find(|w| w.private_key == private_key) {
            return Err(Error::DuplicateKey(existing.address.clone()));
        }

        let wallet = FundingWallet {
            id: Uuid::new_v4().to_string(),
            address,
            mnemonic: phrase,
            private_key,
            name: name.trim().to_string(),
            deleted: false,
            created_at: Utc::now(),
        };

        self.file.funding.push(wallet.clone());
        self.save()?;

        info!("Registered funding wallet {} ({})", wallet.name, wallet.address);
        Ok(wallet)
    }

    /// Look up a non-deleted managed wallet by address (case-insensitive)
    pub fn find_managed(&self, address: &str) -> Option<&ManagedWallet> {
        let address = normalize_address(address);
        self.file
            .managed
            .iter()
            .find(|w| !w.deleted && w.address == address)
    }

    /// Look up a non-deleted funding wallet by address (case-insensitive)
    pub fn find_funding(&self, address: &str) -> Option<&FundingWallet> {
        let address = normalize_address(address);
        self.file
            .funding
            .iter()
            .find(|w| !w.deleted && w.address == address)
    }

    /// Signing handle of the registered wallet at `address`, managed first
    pub fn signing_handle_for(&self, address: &str) -> Result<SigningHandle> {
        if let Some(wallet) = self.find_managed(address) {
            return Ok(wallet.signing_handle(&self.derivation_path));
        }
        self.find_funding(address)
            .map(FundingWallet::signing_handle)
            .ok_or_else(|| Error::WalletNotFound(address.to_string()))
    }

    /// Name an address is registered under, checking watched addresses first
    pub fn display_name(&self, address: &str) -> Option<String> {
        let address = normalize_address(address);
        self.file
            .addresses
            .iter()
            .find(|a| !a.deleted && a.address == address)
            .map(|a| a.name.clone())
            .or_else(|| self.find_managed(&address).map(|w| w.name.clone()))
            .or_else(|| self.find_funding(&address).map(|w| w.name.clone()))
    }

    /// Track an address for balance display
    pub fn add_address(&mut self, address: &str, name: &str) -> Result<WatchedAddress> {
        let address = validate_address(address)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Registry("address name is required".to_string()));
        }
        if self.file.addresses.iter().any(|a| a.address == address) {
            return Err(Error::DuplicateAddress(address));
        }

        let watched = WatchedAddress {
            id: Uuid::new_v4().to_string(),
            address,
            name: name.to_string(),
            deleted: false,
            created_at: Utc::now(),
        };

        self.file.addresses.push(watched.clone());
        self.save()?;

        info!("Watching address {} ({})", watched.name, watched.address);
        Ok(watched)
    }

    /// Non-deleted watched addresses, newest first
    pub fn list_addresses(&self) -> Vec<WatchedAddress> {
        newest_first(&self.file.addresses, |a| (a.deleted, a.created_at))
    }

    /// Soft delete a watched address by id or address
    pub fn soft_delete_address(&mut self, id_or_address: &str) -> Result<WatchedAddress> {
        let key = normalize_address(id_or_address);
        let watched = self
            .file
            .addresses
            .iter_mut()
            .find(|a| !a.deleted && (a.id == id_or_address || a.address == key))
            .ok_or_else(|| Error::WalletNotFound(id_or_address.to_string()))?;

        watched.deleted = true;
        let removed = watched.clone();
        self.save()?;

        info!("Stopped watching {}", removed.address);
        Ok(removed)
    }

    /// Soft delete a managed wallet by id or address
    pub fn soft_delete_managed(&mut self, id_or_address: &str) -> Result<ManagedWallet> {
        let key = normalize_address(id_or_address);
        let wallet = self
            .file
            .managed
            .iter_mut()
            .find(|w| !w.deleted && (w.id == id_or_address || w.address == key))
            .ok_or_else(|| Error::WalletNotFound(id_or_address.to_string()))?;

        wallet.deleted = true;
        let removed = wallet.clone();
        self.save()?;

        info!("Soft-deleted {} wallet {}", WalletKind::Managed, removed.address);
        Ok(removed)
    }

    /// Soft delete a funding wallet by id or address
    pub fn soft_delete_funding(&mut self, id_or_address: &str) -> Result<FundingWallet> {
        let key = normalize_address(id_or_address);
        let wallet = self
            .file
            .funding
            .iter_mut()
            .find(|w| !w.deleted && (w.id == id_or_address || w.address == key))
            .ok_or_else(|| Error::WalletNotFound(id_or_address.to_string()))?;

        wallet.deleted = true;
        let removed = wallet.clone();
        self.save()?;

        info!("Soft-deleted {} wallet {}", WalletKind::Funding, removed.address);
        Ok(removed)
    }

    /// Save registry to wallets.json
    fn save(&self) -> Result<()> {
        std::fs::create_dir_all(&self.credentials_dir)?;

        let json = serde_json::to_string_pretty(&self.file)
            .map_err(|e| Error::Registry(format!("Failed to serialize registry: {}", e)))?;

        let registry_path = self.credentials_dir.join(REGISTRY_FILE);
        std::fs::write(&registry_path, json)
            .map_err(|e| Error::Registry(format!("Failed to write {}: {}", REGISTRY_FILE, e)))?;

        // Recovery phrases live in this file
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(&registry_path)?.permissions();
            perms.set_mode(0o600);
            std::fs::set_permissions(&registry_path, perms)?;
        }

        debug!("Saved wallet registry to {:?}", registry_path);
        Ok(())
    }
}

impl WalletRegistry for JsonWalletRegistry {
    fn list_managed(&self) -> Result<Vec<ManagedWallet>> {
        Ok(newest_first(&self.file.managed, |w| (w.deleted, w.created_at)))
    }

    fn list_funding(&self) -> Result<Vec<FundingWallet>> {
        Ok(newest_first(&self.file.funding, |w| (w.deleted, w.created_at)))
    }
}

/// Non-deleted entries, newest first. Entries registered in the same instant
/// keep reverse registration order.
fn newest_first<T: Clone>(
    entries: &[T],
    key: impl Fn(&T) -> (bool, chrono::DateTime<Utc>),
) -> Vec<T> {
    let mut live: Vec<(usize, &T)> = entries
        .iter()
        .enumerate()
        .filter(|(_, w)| !key(w).0)
        .collect();

    live.sort_by(|(ia, a), (ib, b)| key(b).1.cmp(&key(a).1).then(ib.cmp(ia)));
    live.into_iter().map(|(_, w)| w.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::derive::VECHAIN_DERIVATION_PATH;
    use tempfile::tempdir;

    const PHRASE_A: &str = "test test test test test test test test test test test junk";
    const PHRASE_B: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn registry(dir: &Path) -> JsonWalletRegistry {
        JsonWalletRegistry::load(dir, VECHAIN_DERIVATION_PATH).unwrap()
    }

    #[test]
    fn test_load_empty_registry() {
        let dir = tempdir().unwrap();
        let registry = registry(dir.path());
        assert!(registry.list_managed().unwrap().is_empty());
        assert!(registry.list_funding().unwrap().is_empty());
    }

    #[test]
    fn test_register_and_reload() {
        let dir = tempdir().unwrap();
        let mut reg = registry(dir.path());
        let wallet = reg.register_managed(PHRASE_A, "Main").unwrap();
        assert_eq!(wallet.address, wallet.address.to_lowercase());

        let reloaded = registry(dir.path());
        let managed = reloaded.list_managed().unwrap();
        assert_eq!(managed.len(), 1);
        assert_eq!(managed[0].id, wallet.id);
        assert_eq!(managed[0].name, "Main");
    }

    #[test]
    fn test_word_count_rejected() {
        let dir = tempdir().unwrap();
        let mut reg = registry(dir.path());
        let result = reg.register_funding("only three words", "x");
        assert!(matches!(result, Err(Error::InvalidMnemonic(_))));
    }

    #[test]
    fn test_bad_phrase_is_invalid_mnemonic() {
        let dir = tempdir().unwrap();
        let mut reg = registry(dir.path());
        let bogus = "foo bar baz qux quux corge grault garply waldo fred plugh xyzzy";
        assert!(matches!(
            reg.register_managed(bogus, "x"),
            Err(Error::InvalidMnemonic(_))
        ));
    }

    #[test]
    fn test_duplicate_address_rejected() {
        let dir = tempdir().unwrap();
        let mut reg = registry(dir.path());
        reg.register_managed(PHRASE_A, "one").unwrap();
        assert!(matches!(
            reg.register_managed(PHRASE_A, "two"),
            Err(Error::DuplicateAddress(_))
        ));

        reg.register_funding(PHRASE_A, "funder").unwrap();
        assert!(matches!(
            reg.register_funding(PHRASE_A, "funder again"),
            Err(Error::DuplicateAddress(_))
        ));
    }

    #[test]
    fn test_managed_and_funding_are_separate_namespaces() {
        let dir = tempdir().unwrap();
        let mut reg = registry(dir.path());
        let managed = reg.register_managed(PHRASE_A, "managed").unwrap();
        let funding = reg.register_funding(PHRASE_A, "funding").unwrap();
        assert_eq!(managed.address, funding.address);
        assert_eq!(funding.private_key.len(), 64);
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let dir = tempdir().unwrap();
        let mut reg = registry(dir.path());
        let wallet = reg.register_managed(PHRASE_A, "main").unwrap();

        let upper = format!("0x{}", wallet.address[2..].to_uppercase());
        let found = reg.find_managed(&upper).unwrap();
        assert_eq!(found.id, wallet.id);
    }

    #[test]
    fn test_soft_delete_excludes_wallet() {
        let dir = tempdir().unwrap();
        let mut reg = registry(dir.path());
        let a = reg.register_funding(PHRASE_A, "a").unwrap();
        reg.register_funding(PHRASE_B, "b").unwrap();

        reg.soft_delete_funding(&a.address.to_uppercase().replace("0X", "0x"))
            .unwrap();

        let funding = reg.list_funding().unwrap();
        assert_eq!(funding.len(), 1);
        assert_eq!(funding[0].name, "b");
        assert!(reg.find_funding(&a.address).is_none());

        // still on disk, flagged
        let reloaded = registry(dir.path());
        assert_eq!(reloaded.file.funding.len(), 2);
        assert!(matches!(
            reg.soft_delete_funding(&a.id),
            Err(Error::WalletNotFound(_))
        ));
    }

    #[test]
    fn test_lists_are_newest_first() {
        let dir = tempdir().unwrap();
        let mut reg = registry(dir.path());
        reg.register_managed(PHRASE_A, "older").unwrap();
        reg.register_managed(PHRASE_B, "newer").unwrap();

        let names: Vec<String> = reg
            .list_managed()
            .unwrap()
            .into_iter()
            .map(|w| w.name)
            .collect();
        assert_eq!(names, vec!["newer", "older"]);
    }

    const WATCHED: &str = "0x5EF79995FE8a89e0812330E4378eB2660ceDe699";

    #[test]
    fn test_watched_addresses() {
        let dir = tempdir().unwrap();
        let mut reg = registry(dir.path());
        let first = reg.add_address(WATCHED, " Treasury ").unwrap();
        assert_eq!(first.address, WATCHED.to_lowercase());
        assert_eq!(first.name, "Treasury");

        reg.add_address("0x00000000000000000000000000000000000000aa", "Cold")
            .unwrap();

        let names: Vec<String> = registry(dir.path())
            .list_addresses()
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(names, vec!["Cold", "Treasury"]);

        assert!(matches!(
            reg.add_address(&WATCHED.to_lowercase(), "again"),
            Err(Error::DuplicateAddress(_))
        ));
        assert!(matches!(reg.add_address("0x12", "short"), Err(Error::InvalidAddress(_))));
        assert!(matches!(
            reg.add_address("0x00000000000000000000000000000000000000bb", "  "),
            Err(Error::Registry(_))
        ));
    }

    #[test]
    fn test_removed_address_stays_unique() {
        let dir = tempdir().unwrap();
        let mut reg = registry(dir.path());
        let watched = reg.add_address(WATCHED, "Treasury").unwrap();

        reg.soft_delete_address(&watched.id).unwrap();
        assert!(reg.list_addresses().is_empty());
        assert!(reg.display_name(WATCHED).is_none());
        assert!(matches!(
            reg.soft_delete_address(WATCHED),
            Err(Error::WalletNotFound(_))
        ));
        assert!(matches!(
            reg.add_address(WATCHED, "Treasury"),
            Err(Error::DuplicateAddress(_))
        ));
    }

    #[test]
    fn test_display_name_prefers_watched_entry() {
        let dir = tempdir().unwrap();
        let mut reg = registry(dir.path());
        let managed = reg.register_managed(PHRASE_A, "hot wallet").unwrap();
        let funding = reg.register_funding(PHRASE_B, "gas tank").unwrap();

        assert_eq!(reg.display_name(&managed.address).as_deref(), Some("hot wallet"));
        let upper = funding.address.to_uppercase().replace("0X", "0x");
        assert_eq!(reg.display_name(&upper).as_deref(), Some("gas tank"));

        reg.add_address(&managed.address, "watched").unwrap();
        assert_eq!(reg.display_name(&managed.address).as_deref(), Some("watched"));
        assert!(reg.display_name(WATCHED).is_none());
    }

    #[test]
    fn test_signing_handle_for_registered_wallets() {
        let dir = tempdir().unwrap();
        let mut reg = registry(dir.path());
        let managed = reg.register_managed(PHRASE_A, "managed").unwrap();
        let funding = reg.register_funding(PHRASE_B, "funding").unwrap();

        assert!(matches!(
            reg.signing_handle_for(&managed.address).unwrap(),
            SigningHandle::RecoveryPhrase { .. }
        ));
        assert!(matches!(
            reg.signing_handle_for(&funding.address).unwrap(),
            SigningHandle::PrivateKey(ref key) if *key == funding.private_key
        ));

        reg.soft_delete_managed(&managed.id).unwrap();
        assert!(matches!(
            reg.signing_handle_for(&managed.address),
            Err(Error::WalletNotFound(_))
        ));
    }
}
