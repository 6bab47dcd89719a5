//! Named dependency registry.
//!
//! Filled during setup through [`Application::set_di`](crate::Application::set_di) and
//! read by handlers through [`Context::di`](crate::Context::di). Read-only while serving.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

pub type Dependency = Arc<dyn Any + Send + Sync>;

#[derive(Default)]
pub struct Di {
    values: HashMap<String, Dependency>,
}

impl Di {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `value` under `name`, replacing any previous value.
    pub fn set<T: Any + Send + Sync>(&mut self, name: impl Into<String>, value: T) {
        self.values.insert(name.into(), Arc::new(value));
    }

    pub fn get(&self, name: &str) -> Option<&Dependency> {
        self.values.get(name)
    }

    /// Typed lookup. `None` when missing or registered with a different type.
    pub fn get_as<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        Arc::clone(self.values.get(name)?).downcast().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_lookup() {
        let mut di = Di::new();
        di.set("greeting", String::from("hello"));
        di.set("limit", 10usize);

        assert_eq!(di.get_as::<String>("greeting").as_deref().map(String::as_str), Some("hello"));
        assert_eq!(di.get_as::<usize>("limit").as_deref(), Some(&10));
        assert!(di.get_as::<u32>("limit").is_none());
        assert!(di.get("missing").is_none());
    }
}
