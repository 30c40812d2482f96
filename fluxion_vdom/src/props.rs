use core::hash::BuildHasherDefault;
use indexmap::IndexMap;
use rustc_hash::FxHasher;

/// An element's keyed attribute map. Insertion order is semantic: props
/// are patched in declared order (with `value` deferred to last), which
/// hosts with ordering constraints rely on.
pub type Props = IndexMap<String, PropValue, BuildHasherDefault<FxHasher>>;

/// A property value as the core understands it; anything richer (event
/// handlers, host-specific objects) lives behind the host's `patch_prop`.
#[derive(Clone, Debug, PartialEq)]
pub enum PropValue {
    Str(String),
    Bool(bool),
    Num(f64),
}

impl PropValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::Str(value.to_string())
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        PropValue::Str(value)
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        PropValue::Bool(value)
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        PropValue::Num(value)
    }
}

impl From<i32> for PropValue {
    fn from(value: i32) -> Self {
        PropValue::Num(value as f64)
    }
}

/// Builds a [`Props`] map in declared order.
///
/// ```
/// # use fluxion_vdom::props;
/// let props = props! { "min" => 0, "max" => 10, "value" => 5 };
/// assert_eq!(props.len(), 3);
/// ```
#[macro_export]
macro_rules! props {
    () => { $crate::Props::default() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut props = $crate::Props::default();
        $(
            props.insert($key.to_string(), $crate::PropValue::from($value));
        )+
        props
    }};
}
