use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use crate::providers::{anthropic::AnthropicAdapter, gemini::GeminiAdapter, responses::ResponsesAdapter};
use crate::providers::{ProviderAdapter, ProviderId};

/// Process-wide singleton mapping `ProviderId` to its adapter. The only
/// intentional process-global in this crate, lazily initialized and
/// idempotent.
pub struct ProviderRegistry {
    adapters: RwLock<HashMap<ProviderId, Arc<dyn ProviderAdapter>>>,
}

impl ProviderRegistry {
    fn new() -> Self {
        let mut adapters: HashMap<ProviderId, Arc<dyn ProviderAdapter>> = HashMap::new();
        adapters.insert(ProviderId::Responses, Arc::new(ResponsesAdapter::from_env_lazy()));
        adapters.insert(ProviderId::Anthropic, Arc::new(AnthropicAdapter::from_env_lazy()));
        adapters.insert(ProviderId::Gemini, Arc::new(GeminiAdapter::from_env_lazy()));
        Self {
            adapters: RwLock::new(adapters),
        }
    }

    fn global() -> &'static ProviderRegistry {
        static REGISTRY: OnceLock<ProviderRegistry> = OnceLock::new();
        REGISTRY.get_or_init(ProviderRegistry::new)
    }

    pub fn resolve(id: ProviderId) -> Option<Arc<dyn ProviderAdapter>> {
        Self::global().adapters.read().expect("provider registry poisoned").get(&id).cloned()
    }

    /// Test-only hook for substituting an adapter without touching the
    /// process-wide defaults used by production code.
    pub fn register_for_tests(id: ProviderId, adapter: Arc<dyn ProviderAdapter>) {
        Self::global()
            .adapters
            .write()
            .expect("provider registry poisoned")
            .insert(id, adapter);
    }
}

pub fn resolve_provider(id: ProviderId) -> Option<Arc<dyn ProviderAdapter>> {
    ProviderRegistry::resolve(id)
}

pub fn register_provider(id: ProviderId, adapter: Arc<dyn ProviderAdapter>) {
    ProviderRegistry::register_for_tests(id, adapter);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_all_three_builtin_adapters() {
        assert!(resolve_provider(ProviderId::Responses).is_some());
        assert!(resolve_provider(ProviderId::Anthropic).is_some());
        assert!(resolve_provider(ProviderId::Gemini).is_some());
    }
}
