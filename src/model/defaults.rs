//! Default-value generators

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

/// Zero-argument value producer
pub type Producer = Arc<dyn Fn() -> Value + Send + Sync>;

/// Value filled into a field the payload leaves out
#[derive(Clone)]
pub enum DefaultValue {
    Constant(Value),
    Producer(Producer),
}

impl DefaultValue {
    pub fn constant(value: Value) -> Self {
        DefaultValue::Constant(value)
    }

    pub fn producer(f: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        DefaultValue::Producer(Arc::new(f))
    }

    pub fn produce(&self) -> Value {
        match self {
            DefaultValue::Constant(value) => value.clone(),
            DefaultValue::Producer(f) => f(),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Constant(value) => write!(f, "Constant({})", value),
            DefaultValue::Producer(_) => write!(f, "Producer"),
        }
    }
}

/// Built-in producers
pub mod generators {
    use serde_json::Value;
    use uuid::Uuid;

    use crate::crud::timestamp_now;

    /// Random UUID v4 string
    pub fn uuid_v4() -> Value {
        Value::String(Uuid::new_v4().to_string())
    }

    /// Current time, formatted like stamped timestamp columns
    pub fn timestamp() -> Value {
        Value::String(timestamp_now())
    }

    /// Producer of codes like `PRD-1A2B3C4D`
    pub fn prefixed_code(prefix: &str) -> impl Fn() -> Value + Send + Sync + 'static {
        let prefix = prefix.to_string();
        move || {
            let simple = Uuid::new_v4().simple().to_string().to_ascii_uppercase();
            Value::String(format!("{}-{}", prefix, &simple[..8]))
        }
    }
}
