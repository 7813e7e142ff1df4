// 컨테이너 라이터 - 출력 파일 1개, 비디오 트랙 1개
// FormatReady로 받은 협상 포맷으로 트랙 등록 → 컨테이너 시작 → 샘플 기록 → finalize

use crate::encoding::format::{BufferInfo, CompressedUnit, NegotiatedFormat, TrackFormat};
use crate::error::{Mp4Error, Result};
use std::path::{Path, PathBuf};

/// 먹서 핸들 (FFmpeg 구현은 crate::ffmpeg::muxer)
pub trait ContainerMuxer: Send {
    fn add_track(&mut self, format: &TrackFormat) -> Result<usize>;

    /// 헤더 기록
    fn start(&mut self) -> Result<()>;

    fn write_sample(&mut self, track: usize, data: &[u8], info: &BufferInfo) -> Result<()>;

    /// trailer 기록 (start 이후에만 호출 가능)
    fn stop(&mut self) -> Result<()>;

    fn release(&mut self) -> Result<()>;
}

/// 경로에 먹서 생성 (기존 파일은 덮어씀)
pub trait MuxerFactory: Send {
    fn open(&self, path: &Path) -> Result<Box<dyn ContainerMuxer>>;
}

/// 먹서 세션
pub struct MuxSession {
    muxer: Option<Box<dyn ContainerMuxer>>,
    path: PathBuf,
    track_index: Option<usize>,
    container_started: bool,
    samples_written: usize,
}

impl MuxSession {
    /// 파일 생성 + 먹서 바인딩 (아직 헤더는 쓰지 않음)
    pub fn open(factory: &dyn MuxerFactory, path: &Path) -> Result<Self> {
        let muxer = factory.open(path)?;
        log::info!("[MUXER] 출력 파일 열림: {}", path.display());

        Ok(Self {
            muxer: Some(muxer),
            path: path.to_path_buf(),
            track_index: None,
            container_started: false,
            samples_written: 0,
        })
    }

    pub fn track_index(&self) -> Option<usize> {
        self.track_index
    }

    pub fn is_started(&self) -> bool {
        self.container_started
    }

    pub fn samples_written(&self) -> usize {
        self.samples_written
    }

    /// 비디오 트랙 등록 + 컨테이너 시작 (세션당 1회)
    pub fn register_track(&mut self, format: &NegotiatedFormat) -> Result<usize> {
        if self.track_index.is_some() {
            return Err(Mp4Error::InvalidState("video track already registered".into()));
        }

        let index = self.muxer_mut()?.add_track(format.format())?;
        self.track_index = Some(index);

        self.muxer_mut()?.start()?;
        self.container_started = true;

        log::info!(
            "[MUXER] 트랙 {} 등록: {} {}x{} @ {}fps",
            index,
            format.format().codec.mime_type(),
            format.format().width,
            format.format().height,
            format.format().frame_rate
        );
        Ok(index)
    }

    /// 압축 유닛 기록. 실제로 썼으면 true
    /// 빈 유닛(end-of-stream 마커 등)과 codec config 유닛은 건너뜀
    pub fn write_unit(&mut self, track: usize, unit: &CompressedUnit, payload: &[u8]) -> Result<bool> {
        if !self.container_started {
            return Err(Mp4Error::InvalidState(
                "sample written before the container was started".into(),
            ));
        }
        if self.track_index != Some(track) {
            return Err(Mp4Error::InvalidState(format!(
                "unknown track {} (registered: {:?})",
                track, self.track_index
            )));
        }

        if unit.is_empty() {
            crate::debug_log!("[MUXER] skip empty unit (slot {})", unit.slot);
            return Ok(false);
        }
        // SPS/PPS는 트랙 포맷에 이미 포함됨
        if unit.is_codec_config() {
            return Ok(false);
        }

        self.muxer_mut()?.write_sample(track, payload, &unit.info)?;
        self.samples_written += 1;
        Ok(true)
    }

    /// finalize(시작된 경우만) + 먹서 해제. 여러 번 호출해도 안전
    pub fn close(&mut self) -> Result<()> {
        let Some(mut muxer) = self.muxer.take() else {
            return Ok(());
        };

        let finalized = if self.container_started {
            muxer.stop().map_err(|e| match e {
                Mp4Error::MuxerFinalize(_) => e,
                other => Mp4Error::MuxerFinalize(other.to_string()),
            })
        } else {
            // 시작 안 된 컨테이너의 finalize는 그 자체로 에러
            log::warn!(
                "[MUXER] 컨테이너 미시작, finalize 없이 해제: {}",
                self.path.display()
            );
            Ok(())
        };
        self.container_started = false;

        if let Err(e) = muxer.release() {
            log::warn!("[MUXER] release failed: {}", e);
        }

        if finalized.is_ok() {
            log::info!(
                "[MUXER] 닫힘: {} ({} samples)",
                self.path.display(),
                self.samples_written
            );
        }
        finalized
    }

    fn muxer_mut(&mut self) -> Result<&mut Box<dyn ContainerMuxer>> {
        self.muxer
            .as_mut()
            .ok_or_else(|| Mp4Error::InvalidState("muxer already closed".into()))
    }
}

impl Drop for MuxSession {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("[MUXER] close on drop failed: {}", e);
        }
    }
}
