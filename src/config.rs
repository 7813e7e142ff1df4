// Writer 설정 - 출력 디렉토리, 폴링 타임아웃, drain 기한

use crate::error::{Mp4Error, Result};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

/// 입력/출력 버퍼 폴링 1회당 대기 시간 기본값
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(10);

/// end-of-stream까지 전체 drain 기한 기본값
pub const DEFAULT_DRAIN_DEADLINE: Duration = Duration::from_secs(10);

/// 기본 출력 파일 이름
pub const DEFAULT_FILE_NAME: &str = "output.mp4";

/// Mp4Writer 설정
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// 파일 이름을 해석할 기준 디렉토리
    pub output_dir: PathBuf,
    /// 입력 슬롯 획득 대기 시간
    pub input_timeout: Duration,
    /// 출력 유닛 폴링 1회 대기 시간
    pub output_timeout: Duration,
    /// 전체 drain 기한 (None = end-of-stream까지 무제한 대기)
    pub drain_deadline: Option<Duration>,
    /// 실패 시 불완전 파일을 남길지 여부
    pub keep_partial_output: bool,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            output_dir: std::env::temp_dir(),
            input_timeout: DEFAULT_POLL_TIMEOUT,
            output_timeout: DEFAULT_POLL_TIMEOUT,
            drain_deadline: Some(DEFAULT_DRAIN_DEADLINE),
            keep_partial_output: false,
        }
    }
}

impl WriterConfig {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_input_timeout(mut self, timeout: Duration) -> Self {
        self.input_timeout = timeout;
        self
    }

    pub fn with_output_timeout(mut self, timeout: Duration) -> Self {
        self.output_timeout = timeout;
        self
    }

    /// None이면 기한 없이 end-of-stream까지 폴링
    pub fn with_drain_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.drain_deadline = deadline;
        self
    }

    pub fn with_keep_partial_output(mut self, keep: bool) -> Self {
        self.keep_partial_output = keep;
        self
    }

    /// 파일 이름 → 출력 디렉토리 기준 절대 경로
    /// 디렉토리 탈출(../, 절대 경로, 하위 경로)은 거부
    pub fn resolve_output(&self, file_name: &str) -> Result<PathBuf> {
        if file_name.trim().is_empty() {
            return Err(Mp4Error::Configuration("output file name is empty".into()));
        }

        let mut components = Path::new(file_name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => {}
            _ => {
                return Err(Mp4Error::Configuration(format!(
                    "output file name must be a plain file name: {:?}",
                    file_name
                )));
            }
        }

        let dir = if self.output_dir.is_absolute() {
            self.output_dir.clone()
        } else {
            std::env::current_dir()?.join(&self.output_dir)
        };

        Ok(dir.join(file_name))
    }
}
