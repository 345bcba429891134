//! 结果归一化
//!
//! 模型返回值的形状不在本工具的契约内（可能是对象、字符串或别的），
//! 这里用一条全函数规则把任意 JSON 值压成一段文字。

use serde_json::Value;

/// 归一化优先级：
/// 1. 对象且带 `text` 字段 -> 取该字段（字符串原样，其余取其 JSON 表示）
/// 2. 字符串 -> 原样
/// 3. 其他 -> 整个值的 JSON 表示
///
/// 兜底分支保证任何输入都有结果，归一化本身永不失败。
pub fn normalize_output(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(map) => match map.get("text") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => value.to_string(),
        },
        other => other.to_string(),
    }
}
