use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use regex::Regex;

use super::value::Value;

/// 清洗后的纯数据：无函数、无环，可以安全地跨上下文传输
#[derive(Debug, Clone)]
pub enum PlainValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Date(DateTime<Utc>),
    RegExp(Regex),
    /// 仅在未开启 `remove_functions` 时出现
    Function(String),
    Array(Vec<PlainValue>),
    Object(IndexMap<String, PlainValue>),
}

impl PlainValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PlainValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&PlainValue> {
        match self {
            PlainValue::Object(map) => map.get(key),
            _ => None,
        }
    }
}

impl PartialEq for PlainValue {
    fn eq(&self, other: &Self) -> bool {
        use PlainValue::*;
        match (self, other) {
            (Null, Null) => true,
            (Bool(a), Bool(b)) => a == b,
            (Number(a), Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (String(a), String(b)) => a == b,
            (Date(a), Date(b)) => a == b,
            (RegExp(a), RegExp(b)) => a.as_str() == b.as_str(),
            (Function(a), Function(b)) => a == b,
            (Array(a), Array(b)) => a == b,
            (Object(a), Object(b)) => a == b,
            _ => false,
        }
    }
}

impl From<PlainValue> for serde_json::Value {
    fn from(plain: PlainValue) -> Self {
        match plain {
            PlainValue::Null => serde_json::Value::Null,
            PlainValue::Bool(b) => serde_json::Value::Bool(b),
            PlainValue::Number(n) => number_to_json(n),
            PlainValue::String(s) => serde_json::Value::String(s),
            PlainValue::Date(d) => {
                serde_json::Value::String(d.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
            PlainValue::RegExp(r) => serde_json::Value::String(format!("/{}/", r.as_str())),
            PlainValue::Function(name) => {
                serde_json::Value::String(format!("[Function: {}]", name))
            }
            PlainValue::Array(items) => {
                serde_json::Value::Array(items.into_iter().map(Into::into).collect())
            }
            PlainValue::Object(map) => serde_json::Value::Object(
                map.into_iter().map(|(k, v)| (k, v.into())).collect(),
            ),
        }
    }
}

// 整数值保持整数形式，JSON 中 1 不会变成 1.0
fn number_to_json(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        serde_json::Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}

/// 把纯数据重新装回可遍历的值图，每个复合值都是新分配的
impl From<PlainValue> for Value {
    fn from(plain: PlainValue) -> Self {
        match plain {
            PlainValue::Null => Value::Null,
            PlainValue::Bool(b) => Value::Bool(b),
            PlainValue::Number(n) => Value::Number(n),
            PlainValue::String(s) => Value::String(s),
            PlainValue::Date(d) => Value::Date(d),
            PlainValue::RegExp(r) => Value::RegExp(r),
            PlainValue::Function(name) => Value::function(name),
            PlainValue::Array(items) => Value::array(items.into_iter().map(Value::from).collect()),
            PlainValue::Object(map) => {
                Value::object(map.into_iter().map(|(k, v)| (k, Value::from(v))))
            }
        }
    }
}
