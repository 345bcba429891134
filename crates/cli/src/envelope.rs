//! stdout / stderr 上的 JSON 信封
//!
//! stdout 每次调用恰好一个对象（`text` 或 `error`），
//! stderr 承载零或多个 `status` 对象以及普通日志行。

use serde::Serialize;
use std::io::Write;

#[derive(Debug, Serialize)]
pub struct TextEnvelope {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct StatusEnvelope {
    pub status: String,
}

/// 写出一行 JSON
///
/// 信封结构不会序列化失败；写入失败（管道被关闭）没有可做的补救，忽略。
pub fn emit<T: Serialize>(out: &mut dyn Write, payload: &T) {
    if let Ok(line) = serde_json::to_string(payload) {
        let _ = writeln!(out, "{}", line);
    }
}

pub fn emit_status(err: &mut dyn Write, message: &str) {
    emit(
        err,
        &StatusEnvelope {
            status: message.to_string(),
        },
    );
}
