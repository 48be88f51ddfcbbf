//! Engine configuration types.

/// Configuration for opening a database within an environment.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Whether to create the database if it doesn't exist.
    pub create_if_missing: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            create_if_missing: true,
        }
    }
}

impl DatabaseConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the database if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }
}

/// Configuration for starting a transaction.
#[derive(Debug, Clone, Default)]
pub struct TransactionConfig {
    /// Optional label attached to the transaction, surfaced in diagnostics.
    pub name: Option<String>,
}

impl TransactionConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a diagnostic label to the transaction.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_config_defaults() {
        let config = DatabaseConfig::default();
        assert!(config.create_if_missing);
    }

    #[test]
    fn transaction_config_label() {
        let config = TransactionConfig::new().name("bootstrap");
        assert_eq!(config.name.as_deref(), Some("bootstrap"));
    }
}
