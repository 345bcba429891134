//! 提取运行器
//!
//! 线性流程：参数校验 -> 能力检查 -> 文件检查 -> 加载 -> 推理 -> 归一化。
//! 任何一步失败都直接以 `error` 信封退出，没有重试，也不会回到更早的步骤。

use std::io::Write;
use std::path::Path;

use crate::envelope::{emit, emit_status, ErrorEnvelope, TextEnvelope};
use crate::error::RunError;
use crate::model::ModelProvider;
use crate::normalize::normalize_output;

/// 运行一次提取，返回进程退出码
pub fn run(
    args: &[String],
    provider: &dyn ModelProvider,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> i32 {
    match execute(args, provider, stdout, stderr) {
        Ok(()) => 0,
        Err(err) => {
            emit(stdout, &ErrorEnvelope { error: err.to_string() });
            err.exit_code()
        }
    }
}

fn execute(
    args: &[String],
    provider: &dyn ModelProvider,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Result<(), RunError> {
    // 参数校验先于其他一切检查
    let image_path = args.first().cloned().ok_or(RunError::Usage)?;

    provider
        .check_runtime()
        .map_err(RunError::MissingDependencies)?;

    if !Path::new(&image_path).exists() {
        return Err(RunError::ImageNotFound(image_path));
    }

    emit_status(stderr, "Loading PP-OCRv5 model...");
    let mut model = provider.load_model().map_err(RunError::Processing)?;

    emit_status(stderr, "Processing image...");
    let img = image::open(&image_path).map_err(|e| RunError::Processing(e.to_string()))?;
    let raw = model.infer(&img).map_err(RunError::Processing)?;

    emit(
        stdout,
        &TextEnvelope {
            text: normalize_output(&raw),
        },
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TextModel;
    use image::DynamicImage;
    use serde_json::{json, Value};

    struct StubModel {
        output: Result<Value, String>,
    }

    impl TextModel for StubModel {
        fn infer(&mut self, _img: &DynamicImage) -> Result<Value, String> {
            self.output.clone()
        }
    }

    struct StubProvider {
        runtime: Result<(), String>,
        output: Result<Value, String>,
    }

    impl ModelProvider for StubProvider {
        fn check_runtime(&self) -> Result<(), String> {
            self.runtime.clone()
        }

        fn load_model(&self) -> Result<Box<dyn TextModel>, String> {
            Ok(Box::new(StubModel {
                output: self.output.clone(),
            }))
        }
    }

    fn ok_provider(output: Value) -> StubProvider {
        StubProvider {
            runtime: Ok(()),
            output: Ok(output),
        }
    }

    fn run_capture(args: &[&str], provider: &StubProvider) -> (String, String, i32) {
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        let mut out = Vec::new();
        let mut err = Vec::new();
        let code = run(&args, provider, &mut out, &mut err);
        (
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
            code,
        )
    }

    /// 造一张真实的小图，运行器会用 image::open 打开它
    fn temp_image(name: &str) -> String {
        let path = std::env::temp_dir().join(name);
        image::RgbImage::new(8, 8).save(&path).unwrap();
        path.to_string_lossy().to_string()
    }

    #[test]
    fn test_missing_argument_is_usage_error_regardless_of_runtime() {
        // 运行时不可用也不影响：参数校验最先执行
        let provider = StubProvider {
            runtime: Err("no runtime".into()),
            output: Ok(json!("unused")),
        };
        let (out, _err, code) = run_capture(&[], &provider);
        assert_eq!(out, "{\"error\":\"Usage: pixtext <image_path>\"}\n");
        assert_ne!(code, 0);
    }

    #[test]
    fn test_runtime_unavailable_reports_missing_dependencies() {
        let provider = StubProvider {
            runtime: Err("libonnxruntime.so not found".into()),
            output: Ok(json!("unused")),
        };
        let (out, _err, code) = run_capture(&["whatever.png"], &provider);
        assert!(out.starts_with(
            "{\"error\":\"Missing dependencies: libonnxruntime.so not found. Install with:"
        ));
        assert_ne!(code, 0);
    }

    #[test]
    fn test_nonexistent_image_path() {
        let provider = ok_provider(json!("unused"));
        let (out, _err, code) = run_capture(&["/tmp/does-not-exist.png"], &provider);
        assert_eq!(
            out,
            "{\"error\":\"Image file not found: /tmp/does-not-exist.png\"}\n"
        );
        assert_ne!(code, 0);
    }

    #[test]
    fn test_mapping_with_text_field() {
        let path = temp_image("pixtext_app_hello.png");
        let provider = ok_provider(json!({"text": "HELLO"}));
        let (out, err, code) = run_capture(&[path.as_str()], &provider);
        assert_eq!(out, "{\"text\":\"HELLO\"}\n");
        assert_eq!(code, 0);
        assert!(err.contains("{\"status\":\"Loading PP-OCRv5 model...\"}"));
        assert!(err.contains("{\"status\":\"Processing image...\"}"));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_bare_string_result() {
        let path = temp_image("pixtext_app_world.png");
        let provider = ok_provider(json!("WORLD"));
        let (out, _err, code) = run_capture(&[path.as_str()], &provider);
        assert_eq!(out, "{\"text\":\"WORLD\"}\n");
        assert_eq!(code, 0);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_unrecognized_shape_falls_back_to_representation() {
        let path = temp_image("pixtext_app_42.png");
        let provider = ok_provider(json!(42));
        let (out, _err, code) = run_capture(&[path.as_str()], &provider);
        assert_eq!(out, "{\"text\":\"42\"}\n");
        assert_eq!(code, 0);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_inference_failure_maps_to_processing_error() {
        let path = temp_image("pixtext_app_oom.png");
        let provider = StubProvider {
            runtime: Ok(()),
            output: Err("out of memory".into()),
        };
        let (out, _err, code) = run_capture(&[path.as_str()], &provider);
        assert_eq!(out, "{\"error\":\"OCR processing failed: out of memory\"}\n");
        assert_ne!(code, 0);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_stdout_is_exactly_one_json_object() {
        let path = temp_image("pixtext_app_single.png");
        for provider in [
            ok_provider(json!({"text": "x"})),
            StubProvider {
                runtime: Ok(()),
                output: Err("boom".into()),
            },
        ] {
            let (out, _err, _code) = run_capture(&[path.as_str()], &provider);
            let trimmed = out.trim_end();
            assert!(!trimmed.contains('\n'));
            let value: Value = serde_json::from_str(trimmed).unwrap();
            assert!(value.is_object());
        }
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_status_stream_is_json_objects() {
        let path = temp_image("pixtext_app_status.png");
        let provider = ok_provider(json!({"text": "x"}));
        let (_out, err, _code) = run_capture(&[path.as_str()], &provider);
        for line in err.lines() {
            let value: Value = serde_json::from_str(line).unwrap();
            assert!(value.get("status").is_some());
        }
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_extra_arguments_are_ignored() {
        let path = temp_image("pixtext_app_extra.png");
        let provider = ok_provider(json!({"text": "ok"}));
        let (out, _err, code) = run_capture(&[path.as_str(), "--verbose"], &provider);
        assert_eq!(out, "{\"text\":\"ok\"}\n");
        assert_eq!(code, 0);
        let _ = std::fs::remove_file(&path);
    }
}
