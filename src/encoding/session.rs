// 세션 컨트롤러 - 인코더 드라이버 + 컨테이너 라이터로 MP4 1개 생성
// Idle → Configuring → Encoding → Draining → Finalizing → Done (에러 시 Failed)

use crate::config::WriterConfig;
use crate::encoding::encoder::{CompressorFactory, DrainEvent, EncoderSession};
use crate::encoding::format::EncoderConfig;
use crate::encoding::muxer::{MuxSession, MuxerFactory};
use crate::encoding::request::EncodeRequest;
use crate::error::{Mp4Error, Result};
use crate::ffmpeg::{FfmpegCompressorFactory, FfmpegMuxerFactory};
use std::path::{Path, PathBuf};

/// 세션 상태 머신
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Configuring,
    Encoding,
    Draining,
    Finalizing,
    Done,
    Failed,
}

/// MP4 라이터 (순차 재사용 가능, 동시 사용 불가)
pub struct Mp4Writer {
    config: WriterConfig,
    encoders: Box<dyn CompressorFactory>,
    muxers: Box<dyn MuxerFactory>,
    state: SessionState,
    #[cfg(test)]
    transitions: Vec<SessionState>,
}

impl Mp4Writer {
    /// FFmpeg 백엔드 (H.264 + MP4)
    pub fn new(config: WriterConfig) -> Self {
        Self::with_backends(
            config,
            Box::new(FfmpegCompressorFactory),
            Box::new(FfmpegMuxerFactory),
        )
    }

    pub fn with_backends(
        config: WriterConfig,
        encoders: Box<dyn CompressorFactory>,
        muxers: Box<dyn MuxerFactory>,
    ) -> Self {
        Self {
            config,
            encoders,
            muxers,
            state: SessionState::Idle,
            #[cfg(test)]
            transitions: Vec::new(),
        }
    }

    /// 마지막 세션의 상태
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// 단일 프레임 → MP4 파일. 성공 시 절대 경로 반환
    /// 실패 경로에서도 먹서/인코더 정리는 항상 수행
    pub fn create_mp4_file(&mut self, request: &EncodeRequest, file_name: &str) -> Result<PathBuf> {
        self.set_state(SessionState::Idle);

        let path = match self.config.resolve_output(file_name) {
            Ok(path) => path,
            Err(e) => {
                self.set_state(SessionState::Failed);
                log::error!("[MP4] 잘못된 출력 이름 {:?}: {}", file_name, e);
                return Err(e);
            }
        };

        log::info!(
            "[MP4] 시작: {}x{} @ {}fps, {}bps, 출력={}",
            request.width(),
            request.height(),
            request.frame_rate(),
            request.bit_rate(),
            path.display()
        );

        // 1. 컨테이너 라이터 열기
        let mut mux = match MuxSession::open(self.muxers.as_ref(), &path) {
            Ok(mux) => mux,
            Err(e) => {
                self.set_state(SessionState::Failed);
                log::error!("[MP4] 출력 파일 생성 실패 ({}): {}", path.display(), e);
                return Err(e);
            }
        };
        self.set_state(SessionState::Configuring);

        // 2~4. 인코딩 + drain
        let mut encoder: Option<EncoderSession> = None;
        let result = self.encode_and_mux(request, &mut mux, &mut encoder);
        if result.is_ok() {
            self.set_state(SessionState::Finalizing);
        }

        // 5. 정리: 먹서 close → 인코더 release
        let closed = mux.close();
        if let Some(mut session) = encoder.take() {
            session.release();
        }

        let outcome = match (result, closed) {
            (Ok(()), closed) => closed,
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(close_err)) => {
                log::warn!("[MP4] 정리 중 에러 무시: {}", close_err);
                Err(e)
            }
        };

        match outcome {
            Ok(()) => {
                self.set_state(SessionState::Done);
                log::info!("[MP4] 완료: {}", path.display());
                Ok(path)
            }
            Err(e) => {
                self.set_state(SessionState::Failed);
                log::error!("[MP4] 에러 ({}): {}", path.display(), e);
                self.discard_partial_output(&path);
                Err(e)
            }
        }
    }

    fn encode_and_mux(
        &mut self,
        request: &EncodeRequest,
        mux: &mut MuxSession,
        encoder: &mut Option<EncoderSession>,
    ) -> Result<()> {
        let config = EncoderConfig::from_request(request);
        let session = encoder.insert(EncoderSession::configure(self.encoders.as_ref(), config)?);
        self.set_state(SessionState::Encoding);

        // 프레임 1장 제출 후 곧바로 end-of-stream
        session.submit_frame(request.samples(), self.config.input_timeout)?;
        session.signal_end_of_stream(self.config.input_timeout)?;

        self.set_state(SessionState::Draining);
        let mut drain = session.drain(self.config.output_timeout, self.config.drain_deadline)?;
        let mut track: Option<usize> = None;

        while let Some(event) = drain.next_event()? {
            match event {
                DrainEvent::FormatReady(format) => {
                    track = Some(mux.register_track(&format)?);
                }
                DrainEvent::Data(unit) => {
                    let index = track.ok_or_else(|| {
                        Mp4Error::InvalidState("compressed data before track registration".into())
                    })?;
                    mux.write_unit(index, &unit, drain.payload(&unit)?)?;
                    drain.acknowledge(unit)?;
                }
                DrainEvent::EndOfStream(unit) => {
                    if let Some(index) = track {
                        mux.write_unit(index, &unit, drain.payload(&unit)?)?;
                    }
                    drain.acknowledge(unit)?;
                }
            }
        }

        if track.is_none() {
            return Err(Mp4Error::InvalidState(
                "encoder reached end-of-stream without reporting an output format".into(),
            ));
        }
        if mux.samples_written() == 0 {
            return Err(Mp4Error::Codec("encoder produced no compressed samples".into()));
        }

        Ok(())
    }

    fn set_state(&mut self, next: SessionState) {
        crate::debug_log!("[MP4] state {:?} -> {:?}", self.state, next);
        self.state = next;
        #[cfg(test)]
        self.transitions.push(next);
    }

    /// 실패한 세션의 불완전 파일 삭제 (설정으로 보존 가능)
    fn discard_partial_output(&self, path: &Path) {
        if self.config.keep_partial_output || !path.exists() {
            return;
        }
        match std::fs::remove_file(path) {
            Ok(()) => log::info!("[MP4] 불완전 파일 삭제: {}", path.display()),
            Err(e) => log::warn!("[MP4] 불완전 파일 삭제 실패 ({}): {}", path.display(), e),
        }
    }
}
