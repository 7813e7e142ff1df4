// 단일 프레임 MP4 생성 엔진
// YUV420 원본 → H.264 인코딩 → MP4 컨테이너 (FFmpeg 기반)

/// 디버그 로그 매크로 — `cargo build --features debug_log` 시에만 출력
/// 평소 릴리스 빌드에서는 컴파일 자체에서 제외됨
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        #[cfg(feature = "debug_log")]
        eprintln!($($arg)*);
    };
}

pub mod config;
pub mod encoding;
pub mod error;
pub mod ffi;
pub mod ffmpeg;

pub use config::WriterConfig;
pub use encoding::{EncodeRequest, ExportJob, Mp4Writer, SessionState};
pub use error::{Mp4Error, Result};

// FFI 함수들을 최상위에서 재export
pub use ffi::*;

/// env_logger 초기화 (RUST_LOG 없으면 info). 여러 번 호출해도 안전
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}
