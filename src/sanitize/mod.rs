//! 把任意捕获值深拷贝为可传输的纯数据
//!
//! 遍历不会失败：环被替换为 [`CIRCULAR_MARKER`]，读取失败的分支被丢弃。

pub mod plain;
pub mod value;

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use plain::PlainValue;
pub use value::{Array, Function, Object, Property, PropertyKey, Slot, Value};

/// 循环引用标记
pub const CIRCULAR_MARKER: &str = "[Circular Reference]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SanitizeOptions {
    /// 移除可调用成员
    pub remove_functions: bool,
    /// 重复访问同一复合值时输出标记而不是再次遍历
    pub handle_circular: bool,
    /// 丢弃 Symbol 键的成员
    pub remove_symbols: bool,
}

impl Default for SanitizeOptions {
    fn default() -> Self {
        Self {
            remove_functions: true,
            handle_circular: true,
            remove_symbols: false,
        }
    }
}

/// 深拷贝 `value`，返回不含函数和环的纯数据
///
/// 身份集合只存在于本次调用中，调用返回即释放。
/// 顶层值本身被移除时（例如顶层就是函数）返回 `PlainValue::Null`。
pub fn sanitize(value: &Value, options: &SanitizeOptions) -> PlainValue {
    let mut walker = Walker {
        options,
        seen: HashSet::new(),
        ancestors: Vec::new(),
        keep_alive: Vec::new(),
    };
    walker.visit(value).unwrap_or(PlainValue::Null)
}

struct Walker<'a> {
    options: &'a SanitizeOptions,
    /// 已访问复合值的地址，不持有引用
    seen: HashSet<usize>,
    /// 当前递归路径上的复合值，用于在关闭 handle_circular 时仍能终止真正的环
    ancestors: Vec<usize>,
    // getter 产生的临时值在遍历期间保持存活，避免地址被复用造成误判
    keep_alive: Vec<Value>,
}

impl Walker<'_> {
    /// None 表示该成员应当缺省
    fn visit(&mut self, value: &Value) -> Option<PlainValue> {
        match value {
            Value::Null => Some(PlainValue::Null),
            Value::Bool(b) => Some(PlainValue::Bool(*b)),
            Value::Number(n) => Some(PlainValue::Number(*n)),
            Value::String(s) => Some(PlainValue::String(s.clone())),
            Value::Date(d) => Some(PlainValue::Date(*d)),
            Value::RegExp(r) => Some(PlainValue::RegExp(r.clone())),
            Value::Function(func) => {
                if self.options.remove_functions {
                    None
                } else {
                    Some(PlainValue::Function(func.name().to_string()))
                }
            }
            Value::Array(array) => Some(self.visit_array(array)),
            Value::Object(object) => self.visit_object(object),
        }
    }

    fn enter(&mut self, identity: usize) -> bool {
        if self.ancestors.contains(&identity) {
            return false;
        }
        if self.options.handle_circular && !self.seen.insert(identity) {
            return false;
        }
        self.ancestors.push(identity);
        true
    }

    fn leave(&mut self) {
        self.ancestors.pop();
    }

    fn visit_array(&mut self, array: &Array) -> PlainValue {
        if !self.enter(array.identity()) {
            return PlainValue::String(CIRCULAR_MARKER.to_string());
        }

        let items = match array.snapshot() {
            Some(items) => items,
            None => {
                debug!("Array storage unreadable, sanitized as empty");
                Vec::new()
            }
        };
        // 被移除的元素用 null 占位，保持下标不变
        let sanitized = items
            .iter()
            .map(|item| self.visit(item).unwrap_or(PlainValue::Null))
            .collect();

        self.leave();
        PlainValue::Array(sanitized)
    }

    fn visit_object(&mut self, object: &Object) -> Option<PlainValue> {
        if !self.enter(object.identity()) {
            return Some(PlainValue::String(CIRCULAR_MARKER.to_string()));
        }

        let Some(properties) = object.own_properties() else {
            debug!("Object storage unreadable, branch dropped");
            self.leave();
            return None;
        };

        let mut sanitized = IndexMap::with_capacity(properties.len());
        for property in properties {
            if !property.enumerable {
                continue;
            }
            let key = match property.key {
                PropertyKey::String(key) => key,
                PropertyKey::Symbol(_) if self.options.remove_symbols => continue,
                PropertyKey::Symbol(description) => format!("Symbol({})", description),
            };
            let member = match property.slot {
                Slot::Data(value) => value,
                Slot::Getter(getter) => match getter() {
                    Ok(value) => {
                        self.keep_alive.push(value.clone());
                        value
                    }
                    Err(e) => {
                        debug!(key = %key, error = %e, "Getter failed, member dropped");
                        continue;
                    }
                },
            };
            if let Some(plain) = self.visit(&member) {
                sanitized.insert(key, plain);
            }
        }

        self.leave();
        Some(PlainValue::Object(sanitized))
    }
}
