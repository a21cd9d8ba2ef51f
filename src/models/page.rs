//! 统一的集合响应形状
//!
//! 后端的列表接口有时分页、有时直接返回数组，有时还包一层 `data`。
//! 这里是全项目唯一判断响应形状的地方，调用方只看到 [`Page`]。

use serde::de::DeserializeOwned;
use serde_json::Value;

/// 规范化后的集合
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub count: usize,
    pub next: Option<String>,
    pub previous: Option<String>,
}

impl<T> Page<T> {
    /// 从一组元素构造单页集合
    pub fn from_items(items: Vec<T>) -> Self {
        Self {
            count: items.len(),
            items,
            next: None,
            previous: None,
        }
    }

    /// 接上后一页：合并元素，`next` 取后一页的
    pub fn append(&mut self, later: Page<T>) {
        self.items.extend(later.items);
        self.count = self.count.max(later.count).max(self.items.len());
        self.next = later.next;
    }
}

impl<T: DeserializeOwned> Page<T> {
    /// 解析任意一种已知形状
    ///
    /// 支持：
    /// - `[...]`
    /// - `{"results": [...], "count": n, "next": .., "previous": ..}`
    /// - `{"data": [...]}` / `{"data": {"results": [...]}}`
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        match value {
            Value::Array(_) => {
                let items: Vec<T> = serde_json::from_value(value)?;
                Ok(Self::from_items(items))
            }
            Value::Object(mut map) => {
                if let Some(results) = map.remove("results") {
                    let items: Vec<T> = serde_json::from_value(results)?;
                    let count = map
                        .get("count")
                        .and_then(|v| v.as_u64())
                        .map(|c| c as usize)
                        .unwrap_or(items.len());
                    Ok(Self {
                        items,
                        count,
                        next: string_field(&map, "next"),
                        previous: string_field(&map, "previous"),
                    })
                } else if let Some(data) = map.remove("data") {
                    Self::from_value(data)
                } else {
                    // 单个对象当作只有一个元素的集合
                    let item: T = serde_json::from_value(Value::Object(map))?;
                    Ok(Self::from_items(vec![item]))
                }
            }
            Value::Null => Ok(Self::from_items(Vec::new())),
            other => {
                let items: Vec<T> = serde_json::from_value(other)?;
                Ok(Self::from_items(items))
            }
        }
    }
}

fn string_field(map: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    map.get(key).and_then(|v| v.as_str()).map(str::to_string)
}
