use chrono::{DateTime, Utc};
use regex::Regex;
use std::fmt;
use std::sync::{Arc, RwLock};

/// 属性 getter，返回 Err 表示 getter 抛出异常
pub type Getter = Arc<dyn Fn() -> std::result::Result<Value, String> + Send + Sync>;

/// 页面侧捕获到的任意值
///
/// 复合值 (`Array` / `Object`) 是共享句柄，克隆只复制引用，
/// 因此可以构造出自引用或互相引用的图。
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Date(DateTime<Utc>),
    RegExp(Regex),
    Function(Function),
    Array(Array),
    Object(Object),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    /// 用 (key, value) 列表构造一个普通对象
    pub fn object<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let object = Object::new();
        for (key, value) in entries {
            object.set(key, value);
        }
        Value::Object(object)
    }

    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Array::from(items))
    }

    pub fn function(name: impl Into<String>) -> Self {
        Value::Function(Function::new(name))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // 不递归进入复合值，避免在环上无限打印
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Date(d) => write!(f, "Date({})", d.to_rfc3339()),
            Value::RegExp(r) => write!(f, "RegExp(/{}/)", r.as_str()),
            Value::Function(func) => write!(f, "Function({})", func.name()),
            Value::Array(a) => write!(f, "Array(len={})", a.len()),
            Value::Object(_) => write!(f, "Object {{ .. }}"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::object(map.into_iter().map(|(k, v)| (k, Value::from(v))))
            }
        }
    }
}

/// 可调用成员，只保留名字
#[derive(Debug, Clone)]
pub struct Function {
    name: Arc<str>,
}

impl Function {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Arc::from(name.into()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Clone, Default)]
pub struct Array(Arc<RwLock<Vec<Value>>>);

impl Array {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, value: Value) {
        if let Ok(mut items) = self.0.write() {
            items.push(value);
        }
    }

    pub fn len(&self) -> usize {
        self.0.read().map(|items| items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 复合值的身份，即共享存储的地址
    pub fn identity(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }

    pub(crate) fn snapshot(&self) -> Option<Vec<Value>> {
        self.0.read().ok().map(|items| items.clone())
    }
}

impl From<Vec<Value>> for Array {
    fn from(items: Vec<Value>) -> Self {
        Self(Arc::new(RwLock::new(items)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyKey {
    String(String),
    /// Symbol 键，内容为其描述
    Symbol(String),
}

#[derive(Clone)]
pub enum Slot {
    Data(Value),
    Getter(Getter),
}

#[derive(Clone)]
pub struct Property {
    pub key: PropertyKey,
    pub slot: Slot,
    pub enumerable: bool,
}

#[derive(Default)]
struct ObjectData {
    properties: Vec<Property>,
    prototype: Option<Object>,
}

/// 有序的键值对象，带可选原型
///
/// 属性按插入顺序保存；重复设置同一键时原位替换。
#[derive(Clone, Default)]
pub struct Object(Arc<RwLock<ObjectData>>);

impl Object {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prototype(prototype: Object) -> Self {
        Self(Arc::new(RwLock::new(ObjectData {
            properties: Vec::new(),
            prototype: Some(prototype),
        })))
    }

    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.define(PropertyKey::String(key.into()), Slot::Data(value), true);
    }

    pub fn set_symbol(&self, description: impl Into<String>, value: Value) {
        self.define(PropertyKey::Symbol(description.into()), Slot::Data(value), true);
    }

    /// 不可枚举属性
    pub fn set_hidden(&self, key: impl Into<String>, value: Value) {
        self.define(PropertyKey::String(key.into()), Slot::Data(value), false);
    }

    pub fn define_getter<F>(&self, key: impl Into<String>, getter: F)
    where
        F: Fn() -> std::result::Result<Value, String> + Send + Sync + 'static,
    {
        self.define(PropertyKey::String(key.into()), Slot::Getter(Arc::new(getter)), true);
    }

    pub fn define(&self, key: PropertyKey, slot: Slot, enumerable: bool) {
        let Ok(mut data) = self.0.write() else {
            return;
        };
        let property = Property {
            key,
            slot,
            enumerable,
        };
        match data.properties.iter_mut().find(|p| p.key == property.key) {
            Some(existing) => *existing = property,
            None => data.properties.push(property),
        }
    }

    /// 读取自有数据属性；原型上的属性也会被查找
    pub fn get(&self, key: &str) -> Option<Value> {
        let data = self.0.read().ok()?;
        let own = data.properties.iter().find_map(|p| match (&p.key, &p.slot) {
            (PropertyKey::String(k), Slot::Data(v)) if k == key => Some(v.clone()),
            _ => None,
        });
        match own {
            Some(v) => Some(v),
            None => data.prototype.as_ref().and_then(|proto| proto.get(key)),
        }
    }

    pub fn identity(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }

    /// 自有属性快照（不含原型链）
    pub(crate) fn own_properties(&self) -> Option<Vec<Property>> {
        self.0.read().ok().map(|data| data.properties.clone())
    }
}
