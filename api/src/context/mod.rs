use mir_ca::registry::Registry;

#[derive(Debug, Clone)]
pub struct ApiContext {
    pub registry: Registry,
}

impl ApiContext {
    pub fn new(registry: Registry) -> Self {
        Self { registry }
    }
}
