//! Generic ANSI dialect

use std::sync::Arc;

use super::Dialect;

/// ANSI type names and no native pagination
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericDialect;

impl GenericDialect {
    pub fn shared() -> Arc<dyn Dialect> {
        Arc::new(GenericDialect)
    }
}

impl Dialect for GenericDialect {
    fn name(&self) -> &'static str {
        "Generic"
    }
}
