use ort::session::builder::SessionBuilder;
use ort::Error;

const MAX_DEFAULT_THREADS: usize = 4;

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok()?.parse::<usize>().ok()
}

fn default_intra_threads() -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(MAX_DEFAULT_THREADS);
    cores.clamp(1, MAX_DEFAULT_THREADS)
}

/// 读取线程配置：`PIXTEXT_OCR_THREADS` / `PIXTEXT_OCR_INTER_THREADS`
pub fn thread_settings() -> (usize, usize) {
    let intra = env_usize("PIXTEXT_OCR_THREADS")
        .filter(|v| *v > 0)
        .unwrap_or_else(default_intra_threads);
    let inter = env_usize("PIXTEXT_OCR_INTER_THREADS")
        .filter(|v| *v > 0)
        .unwrap_or(1);
    (intra, inter)
}

pub fn configure_session(builder: SessionBuilder) -> Result<SessionBuilder, Error> {
    let (intra, inter) = thread_settings();
    log::debug!("[OCR] 会话线程: intra={}, inter={}", intra, inter);

    builder
        .with_intra_threads(intra)?
        .with_inter_threads(inter)?
        .with_parallel_execution(false)
}
