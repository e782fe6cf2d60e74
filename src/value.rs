//! Runtime values
//!
//! Every payload the runtime moves around (yielded values, sent values,
//! thrown errors, return values) is a [`Value`]. The runtime never inspects
//! payloads beyond telling the absence-value (`Undefined`) apart from the rest.

use crate::error::RuntimeError;
use crate::prelude::*;
use crate::runtime::Coroutine;
use crate::tag::CoroutineFn;

/// Marker trait for types whose clone is a reference-count increment.
///
/// Types implementing this trait have O(1) clone operations:
/// - `Rc<T>` - reference count increment
/// - `Value` - every heap variant holds an `Rc`
/// - `Coroutine` / `CoroutineFn` - handles around `Rc` state
///
/// Prefer `.cheap_clone()` over `.clone()` at call sites where the cost matters,
/// so the intent is visible when reading the code.
pub trait CheapClone: Clone {
    /// Create a cheap (reference-counted) clone of this value.
    fn cheap_clone(&self) -> Self {
        self.clone()
    }
}

impl<T: ?Sized> CheapClone for Rc<T> {}

/// Shared, mutable array storage
pub type ArrayRef = Rc<RefCell<Vec<Value>>>;

/// Shared, mutable object storage with insertion-ordered keys
pub type ObjectRef = Rc<RefCell<IndexMap<String, Value>>>;

/// A runtime value
#[derive(Clone, Default)]
pub enum Value {
    /// The absence-value: "nothing was supplied"
    #[default]
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(Rc<str>),
    Array(ArrayRef),
    Object(ObjectRef),
    Function(Function),
    Coroutine(Coroutine),
}

impl CheapClone for Value {}

impl Value {
    /// Build an array value from its elements
    pub fn array(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items.into_iter().collect())))
    }

    /// Build an object value from `(key, value)` pairs, keeping their order
    pub fn object<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        let mut props = index_map_new();
        for (key, value) in entries {
            props.insert(key.into(), value);
        }
        Value::Object(Rc::new(RefCell::new(props)))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// `undefined` or `null`
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_coroutine(&self) -> Option<&Coroutine> {
        match self {
            Value::Coroutine(co) => Some(co),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Value::Function(func) => Some(func),
            _ => None,
        }
    }

    /// Name of the value's type, for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
            Value::Coroutine(_) => "coroutine",
        }
    }

    /// Strict equality: primitives by value, heap values by identity
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            // NaN !== NaN falls out of f64 equality
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            (Value::Coroutine(a), Value::Coroutine(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Call a function value.
    ///
    /// Calling a tagged coroutine factory produces a fresh `Value::Coroutine`
    /// instead of running any of its body.
    pub fn call(&self, args: &[Value]) -> Result<Value, RuntimeError> {
        match self {
            Value::Function(Function::Native(native)) => native.call(args),
            Value::Function(Function::Coroutine(factory)) => {
                Ok(Value::Coroutine(factory.call(args)))
            }
            other => Err(RuntimeError::invalid_argument(format!(
                "{} is not callable",
                other.type_name()
            ))),
        }
    }
}

/// Nesting level past which arrays and objects are abbreviated
const MAX_PRINT_DEPTH: usize = 10;

/// Heap values currently being printed, to cut reference cycles short
type Seen = Vec<*const ()>;

fn heap_id<T>(rc: &Rc<T>) -> *const () {
    Rc::as_ptr(rc).cast()
}

impl Value {
    fn fmt_debug(&self, f: &mut fmt::Formatter<'_>, seen: &mut Seen) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::Array(items) => {
                let id = heap_id(items);
                if seen.contains(&id) {
                    return write!(f, "[Circular]");
                }
                let items = items.borrow();
                if seen.len() >= MAX_PRINT_DEPTH {
                    return write!(f, "[Array({})]", items.len());
                }
                seen.push(id);
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    item.fmt_debug(f, seen)?;
                }
                seen.pop();
                write!(f, "]")
            }
            Value::Object(props) => {
                let id = heap_id(props);
                if seen.contains(&id) {
                    return write!(f, "[Circular]");
                }
                if seen.len() >= MAX_PRINT_DEPTH {
                    return write!(f, "{{...}}");
                }
                seen.push(id);
                write!(f, "{{")?;
                for (i, (key, value)) in props.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:?}: ", key)?;
                    value.fmt_debug(f, seen)?;
                }
                seen.pop();
                write!(f, "}}")
            }
            Value::Function(func) => write!(f, "[Function: {}]", func.name()),
            Value::Coroutine(_) => write!(f, "[object Generator]"),
        }
    }

    /// Arrays join their elements with `,`; an array already being joined
    /// prints as empty.
    fn fmt_display(&self, f: &mut fmt::Formatter<'_>, seen: &mut Seen) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{}", s),
            Value::Array(items) => {
                let id = heap_id(items);
                if seen.contains(&id) || seen.len() >= MAX_PRINT_DEPTH {
                    return Ok(());
                }
                seen.push(id);
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    if !item.is_nullish() {
                        item.fmt_display(f, seen)?;
                    }
                }
                seen.pop();
                Ok(())
            }
            Value::Object(_) => write!(f, "[object Object]"),
            other => other.fmt_debug(f, seen),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_debug(f, &mut Seen::new())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_display(f, &mut Seen::new())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.strict_equals(other)
    }
}

// Conversions from Rust types

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<Coroutine> for Value {
    fn from(co: Coroutine) -> Self {
        Value::Coroutine(co)
    }
}

impl From<CoroutineFn> for Value {
    fn from(factory: CoroutineFn) -> Self {
        Value::Function(Function::Coroutine(factory))
    }
}

impl From<NativeFn> for Value {
    fn from(native: NativeFn) -> Self {
        Value::Function(Function::Native(native))
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::from(s),
            serde_json::Value::Array(items) => Value::array(items.into_iter().map(Value::from)),
            serde_json::Value::Object(props) => {
                Value::object(props.into_iter().map(|(k, v)| (k, Value::from(v))))
            }
        }
    }
}

/* ===================== Callables ===================== */

/// Signature of a native function body
pub type NativeBody = dyn Fn(&[Value]) -> Result<Value, RuntimeError>;

/// A plain (untagged) function
#[derive(Clone)]
pub struct NativeFn {
    name: Rc<str>,
    body: Rc<NativeBody>,
}

impl CheapClone for NativeFn {}

impl NativeFn {
    pub fn new<F>(name: &str, body: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, RuntimeError> + 'static,
    {
        NativeFn {
            name: Rc::from(name),
            body: Rc::new(body),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, args: &[Value]) -> Result<Value, RuntimeError> {
        (self.body)(args)
    }
}

/// A callable value: either a plain function or a tagged coroutine factory
#[derive(Clone)]
pub enum Function {
    Native(NativeFn),
    Coroutine(CoroutineFn),
}

impl CheapClone for Function {}

impl Function {
    pub fn name(&self) -> &str {
        match self {
            Function::Native(native) => native.name(),
            Function::Coroutine(factory) => factory.name(),
        }
    }

    fn ptr_eq(&self, other: &Function) -> bool {
        match (self, other) {
            (Function::Native(a), Function::Native(b)) => Rc::ptr_eq(&a.body, &b.body),
            (Function::Coroutine(a), Function::Coroutine(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}
