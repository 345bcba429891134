//! pixtext：从图片提取文字，结果以单个 JSON 对象写到 stdout
//!
//! 用法：`pixtext <image_path>`
//! 成功输出 `{"text": ...}` 退出码 0，失败输出 `{"error": ...}` 退出码非零；
//! 进度以 `{"status": ...}` 写到 stderr。

mod app;
mod config;
mod envelope;
mod error;
mod model;
mod models;
mod normalize;

use model::OnnxProvider;

fn main() {
    // 日志走 stderr，默认只告警，避免干扰诊断流
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let provider = OnnxProvider;

    let code = app::run(
        &args,
        &provider,
        &mut std::io::stdout(),
        &mut std::io::stderr(),
    );
    std::process::exit(code);
}
