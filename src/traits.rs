//! Shared trait abstractions for common patterns

use crate::Result;

/// Trait for configurable components
/// Unifies configuration access for anything that carries an option snapshot
pub trait Configurable {
    type Config: Clone;

    /// Get the current configuration
    fn config(&self) -> Self::Config;

    /// Set new configuration
    fn set_config(&self, config: Self::Config) -> Result<()>;

    /// Validate configuration
    fn validate_config(config: &Self::Config) -> Result<()> {
        let _ = config; // Default implementation accepts all configs
        Ok(())
    }

    /// Update configuration with a partial change
    fn update_config<F>(&self, updater: F) -> Result<()>
    where
        F: FnOnce(&mut Self::Config),
    {
        let mut config = self.config();
        updater(&mut config);
        Self::validate_config(&config)?;
        self.set_config(config)
    }
}
