//! Provider factory.

use std::sync::Arc;

use stowage_core::{
    FileEntity, KeyManager, Keypair, MasterKey, StorageConfig, StorageError, StorageResult,
};

use crate::local::{LocalStorage, LOCAL_PROVIDER};
use crate::traits::StorageProvider;

/// Builds storage providers from one configuration and one pair of key
/// managers. `by_file` routes an entity back to the provider that
/// created it.
pub struct StorageFactory {
    config: StorageConfig,
    secrets: Arc<dyn KeyManager<MasterKey>>,
    keypairs: Arc<dyn KeyManager<Keypair>>,
}

impl StorageFactory {
    pub fn new(
        config: StorageConfig,
        secrets: Arc<dyn KeyManager<MasterKey>>,
        keypairs: Arc<dyn KeyManager<Keypair>>,
    ) -> Self {
        Self {
            config,
            secrets,
            keypairs,
        }
    }

    /// Provider by tag; `None` selects the configured default.
    pub fn by_provider(&self, provider: Option<&str>) -> StorageResult<Arc<dyn StorageProvider>> {
        let tag = provider.unwrap_or(&self.config.default_provider);

        match tag {
            LOCAL_PROVIDER => Ok(Arc::new(LocalStorage::new(
                &self.config,
                self.secrets.clone(),
                self.keypairs.clone(),
            ))),
            other => Err(StorageError::UnknownProvider(other.to_string())),
        }
    }

    pub fn by_file(&self, file: &FileEntity) -> StorageResult<Arc<dyn StorageProvider>> {
        self.by_provider(Some(&file.provider))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stowage_core::{SecretKeyring, SignerKeyring};

    fn factory() -> StorageFactory {
        StorageFactory::new(
            StorageConfig::new("/tmp/stowage-test", "files", vec!["image/png".to_string()]),
            Arc::new(SecretKeyring::generate("vault")),
            Arc::new(SignerKeyring::generate("urls")),
        )
    }

    #[test]
    fn test_default_provider_is_local() {
        let provider = factory().by_provider(None).unwrap();
        assert_eq!(provider.provider(), "local");
    }

    #[test]
    fn test_unknown_provider_is_rejected() {
        let err = factory().by_provider(Some("s3")).unwrap_err();
        assert!(matches!(err, StorageError::UnknownProvider(_)));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_by_file_routes_on_entity_tag() {
        let file = FileEntity::new(
            "id", "name", "orig", "png", "image/png", "h", 1, "files", "local", None, "/l",
        );
        let provider = factory().by_file(&file).unwrap();
        assert!(provider.is_compatible(&file));
    }
}
