// Export 작업 관리 - 백그라운드 스레드에서 MP4 세션 1회 실행
// 호출 스레드(UI)는 블로킹 없이 폴링으로 상태 확인

use crate::encoding::request::EncodeRequest;
use crate::encoding::session::Mp4Writer;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

/// Export 작업 핸들
pub struct ExportJob {
    /// 완료 플래그 (성공/실패 무관)
    finished: Arc<AtomicBool>,
    /// 에러 메시지 (있으면 실패)
    error: Arc<Mutex<Option<String>>>,
    /// 생성된 파일 경로 (있으면 성공)
    output_path: Arc<Mutex<Option<PathBuf>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ExportJob {
    /// Export 시작 (백그라운드 스레드에서 실행)
    pub fn start(mut writer: Mp4Writer, request: EncodeRequest, file_name: String) -> Self {
        let finished = Arc::new(AtomicBool::new(false));
        let error: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
        let output_path: Arc<Mutex<Option<PathBuf>>> = Arc::new(Mutex::new(None));

        let f = finished.clone();
        let e = error.clone();
        let o = output_path.clone();

        let spawned = std::thread::Builder::new()
            .name("mp4-export".into())
            .spawn(move || {
                // 패닉도 완료로 기록
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    writer.create_mp4_file(&request, &file_name)
                }));
                match outcome {
                    Ok(Ok(path)) => {
                        log::info!("[EXPORT] 완료: {}", path.display());
                        if let Ok(mut out) = o.lock() {
                            *out = Some(path);
                        }
                    }
                    Ok(Err(err)) => {
                        log::error!("[EXPORT] 에러: {}", err);
                        if let Ok(mut slot) = e.lock() {
                            *slot = Some(err.to_string());
                        }
                    }
                    Err(_) => {
                        log::error!("[EXPORT] 작업 스레드 패닉");
                        if let Ok(mut slot) = e.lock() {
                            *slot = Some("export thread panicked".into());
                        }
                    }
                }
                f.store(true, Ordering::SeqCst);
            });

        let handle = match spawned {
            Ok(handle) => Some(handle),
            Err(err) => {
                log::error!("[EXPORT] 스레드 생성 실패: {}", err);
                if let Ok(mut slot) = error.lock() {
                    *slot = Some(format!("failed to spawn export thread: {}", err));
                }
                finished.store(true, Ordering::SeqCst);
                None
            }
        };

        Self {
            finished,
            error,
            output_path,
            handle: Mutex::new(handle),
        }
    }

    /// 완료 여부
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    /// 생성된 파일 경로 (None이면 실패 또는 진행 중)
    pub fn output_path(&self) -> Option<PathBuf> {
        self.output_path.lock().ok().and_then(|p| p.clone())
    }

    /// 에러 메시지 가져오기 (None이면 성공 또는 진행 중)
    pub fn get_error(&self) -> Option<String> {
        self.error.lock().ok().and_then(|e| e.clone())
    }

    /// 작업 종료까지 대기. 성공 시 true
    pub fn wait(&self) -> bool {
        let handle = self.handle.lock().ok().and_then(|mut h| h.take());
        if let Some(handle) = handle {
            // 스레드 안에서 못 잡은 패닉
            if handle.join().is_err() {
                if let Ok(mut slot) = self.error.lock() {
                    slot.get_or_insert_with(|| "export thread panicked".into());
                }
                self.finished.store(true, Ordering::SeqCst);
            }
        }
        self.output_path().is_some()
    }
}
