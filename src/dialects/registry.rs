use crate::dialects::base::MetadataResolver;
use crate::dialects::Dialect;
use log::debug;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// Dispatch table from dialect to its resolver.
pub struct ResolverRegistry {
    resolvers: HashMap<Dialect, Arc<dyn MetadataResolver>>,
}

impl ResolverRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            resolvers: HashMap::new(),
        }
    }

    /// Register a resolver under the dialect it reports
    pub fn register(&mut self, resolver: Arc<dyn MetadataResolver>) {
        let dialect = resolver.dialect();
        debug!("Registering resolver for dialect: {}", dialect);
        self.resolvers.insert(dialect, resolver);
    }

    /// Resolver for a dialect; `None` means pass the baseline through
    pub fn get(&self, dialect: Dialect) -> Option<Arc<dyn MetadataResolver>> {
        self.resolvers.get(&dialect).cloned()
    }

    /// List dialects with a registered resolver
    pub fn list_dialects(&self) -> Vec<Dialect> {
        let mut dialects: Vec<Dialect> = self.resolvers.keys().copied().collect();
        dialects.sort_by_key(|d| d.name());
        dialects
    }
}

impl Default for ResolverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Global registry instance
static GLOBAL_REGISTRY: OnceLock<ResolverRegistry> = OnceLock::new();

/// Get the global resolver registry (initialized lazily)
pub fn get_registry() -> &'static ResolverRegistry {
    GLOBAL_REGISTRY.get_or_init(create_default_registry)
}

/// Create registry with all built-in resolvers
fn create_default_registry() -> ResolverRegistry {
    let mut registry = ResolverRegistry::new();

    registry.register(Arc::new(crate::dialects::as400::As400Resolver));
    registry.register(Arc::new(crate::dialects::mysql::MySqlResolver));
    registry.register(Arc::new(crate::dialects::postgres::PostgresResolver));
    registry.register(Arc::new(crate::dialects::mssql::MsSqlResolver::native()));
    registry.register(Arc::new(crate::dialects::mssql::MsSqlResolver::freetds()));
    registry.register(Arc::new(crate::dialects::oracle::OracleResolver));

    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_specific_dialect_has_a_resolver() {
        let registry = get_registry();
        for dialect in [
            Dialect::As400,
            Dialect::MySqlFamily,
            Dialect::Postgres,
            Dialect::MsSql,
            Dialect::MsSqlFreeTds,
            Dialect::Oracle,
        ] {
            let resolver = registry.get(dialect);
            assert!(resolver.is_some(), "no resolver for {}", dialect);
            assert_eq!(resolver.map(|r| r.dialect()), Some(dialect));
        }
    }

    #[test]
    fn test_generic_passes_through() {
        assert!(get_registry().get(Dialect::Generic).is_none());
        assert_eq!(get_registry().list_dialects().len(), 6);
    }
}
