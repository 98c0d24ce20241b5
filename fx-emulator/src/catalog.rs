use {
    std::sync::Arc,
    parking_lot::RwLock,
    tracing::info,
    fx_core::TriggerDefinition,
};

/// Source of deployed trigger definitions.
pub trait TriggerCatalog: Send + Sync {
    fn get(&self, id: &str) -> Option<Arc<TriggerDefinition>>;

    /// All definitions, in declaration order.
    fn triggers(&self) -> Vec<Arc<TriggerDefinition>>;
}

#[derive(Default)]
pub struct InMemoryCatalog {
    triggers: RwLock<Vec<Arc<TriggerDefinition>>>,
}

impl InMemoryCatalog {
    pub fn new(triggers: Vec<TriggerDefinition>) -> Self {
        Self {
            triggers: RwLock::new(triggers.into_iter().map(Arc::new).collect()),
        }
    }

    /// Swaps the whole catalog, e.g. after functions were redeployed.
    pub fn replace(&self, triggers: Vec<TriggerDefinition>) {
        let triggers: Vec<_> = triggers.into_iter().map(Arc::new).collect();
        info!(triggers = triggers.len(), "replacing trigger catalog");
        *self.triggers.write() = triggers;
    }
}

impl TriggerCatalog for InMemoryCatalog {
    fn get(&self, id: &str) -> Option<Arc<TriggerDefinition>> {
        self.triggers.read().iter().find(|v| v.id == id).cloned()
    }

    fn triggers(&self) -> Vec<Arc<TriggerDefinition>> {
        self.triggers.read().clone()
    }
}
