// 비디오 인코더 드라이버 - 압축기 설정, 단일 프레임 입력, 출력 유닛 drain
// raw YUV420P 프레임 → Compressor → FormatReady → 압축 유닛들 → EndOfStream

use crate::encoding::format::{
    BufferInfo, CompressedUnit, EncoderConfig, NegotiatedFormat, TrackFormat,
};
use crate::encoding::request::yuv420_frame_size;
use crate::error::{Mp4Error, Result};
use std::time::{Duration, Instant};

/// Compressor에 넣는 입력 버퍼
#[derive(Debug, Clone, Copy)]
pub enum InputBuffer<'a> {
    /// 완전한 프레임 1장 (end-of-stream 아님)
    Frame {
        samples: &'a [u8],
        presentation_time_us: i64,
    },
    /// 빈 end-of-stream 버퍼
    EndOfStream,
}

/// 출력 큐 폴링 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputPoll {
    /// 타임아웃 내 준비된 것 없음 (에러 아님)
    TryAgain,
    /// 인코더가 실제 출력 포맷을 확정함
    FormatChanged(TrackFormat),
    /// 출력 슬롯 하나가 채워짐 (release_output 전까지 클라이언트 소유)
    Buffer { slot: usize, info: BufferInfo },
}

/// 압축기 핸들 (하드웨어/소프트웨어 코덱 경계)
/// FFmpeg 구현은 crate::ffmpeg::compressor, 테스트는 스크립트 기반 더블 사용
pub trait Compressor: Send {
    fn start(&mut self) -> Result<()>;

    /// 입력 슬롯 획득 + 커밋. timeout 내 슬롯이 없으면 Ok(false)
    fn queue_input(&mut self, input: InputBuffer<'_>, timeout: Duration) -> Result<bool>;

    fn dequeue_output(&mut self, timeout: Duration) -> Result<OutputPoll>;

    /// dequeue된 슬롯의 출력 버퍼 전체
    fn output_buffer(&self, slot: usize) -> Result<&[u8]>;

    fn release_output(&mut self, slot: usize) -> Result<()>;

    fn stop(&mut self) -> Result<()>;

    fn release(&mut self) -> Result<()>;
}

/// 설정에 맞는 압축기 생성 (지원 불가 시 Configuration 에러)
pub trait CompressorFactory: Send {
    fn create(&self, config: &EncoderConfig) -> Result<Box<dyn Compressor>>;
}

/// 인코더 세션 (configure ~ release)
pub struct EncoderSession {
    compressor: Option<Box<dyn Compressor>>,
    config: EncoderConfig,
    started: bool,
    frame_submitted: bool,
    end_of_stream_signaled: bool,
    drained: bool,
}

impl EncoderSession {
    /// 압축기 생성 → 시작
    /// 시작 실패 시 핸들을 해제한 뒤 에러 반환
    pub fn configure(factory: &dyn CompressorFactory, config: EncoderConfig) -> Result<Self> {
        let mut compressor = factory.create(&config)?;

        if let Err(e) = compressor.start() {
            if let Err(release_err) = compressor.release() {
                log::warn!("[ENCODER] release after failed start: {}", release_err);
            }
            return Err(e);
        }

        log::info!(
            "[ENCODER] 시작: {} {}x{} @ {}fps, {}bps, keyframe interval {}",
            config.codec.mime_type(),
            config.width,
            config.height,
            config.frame_rate,
            config.bit_rate,
            config.key_frame_interval
        );

        Ok(Self {
            compressor: Some(compressor),
            config,
            started: true,
            frame_submitted: false,
            end_of_stream_signaled: false,
            drained: false,
        })
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// 단일 프레임 제출 (timestamp 0, end-of-stream 아님)
    pub fn submit_frame(&mut self, samples: &[u8], timeout: Duration) -> Result<()> {
        if self.frame_submitted || self.end_of_stream_signaled {
            return Err(Mp4Error::InvalidState(
                "frame already submitted for this session".into(),
            ));
        }

        let expected = yuv420_frame_size(self.config.width, self.config.height);
        if samples.len() != expected {
            return Err(Mp4Error::Configuration(format!(
                "Invalid frame data size: got {}, expected {}",
                samples.len(),
                expected
            )));
        }

        let input = InputBuffer::Frame {
            samples,
            presentation_time_us: 0,
        };
        if !self.compressor_mut()?.queue_input(input, timeout)? {
            return Err(Mp4Error::EncoderBusy(format!(
                "no input buffer available within {:?}",
                timeout
            )));
        }

        self.frame_submitted = true;
        crate::debug_log!("[ENCODER] frame queued: {} bytes", samples.len());
        Ok(())
    }

    /// 빈 end-of-stream 버퍼 제출 (submit_frame 성공 후 정확히 1회)
    pub fn signal_end_of_stream(&mut self, timeout: Duration) -> Result<()> {
        if !self.frame_submitted {
            return Err(Mp4Error::InvalidState(
                "end-of-stream signaled before a frame was submitted".into(),
            ));
        }
        if self.end_of_stream_signaled {
            return Err(Mp4Error::InvalidState("end-of-stream already signaled".into()));
        }

        if !self.compressor_mut()?.queue_input(InputBuffer::EndOfStream, timeout)? {
            return Err(Mp4Error::EncoderBusy(format!(
                "no input buffer for end-of-stream within {:?}",
                timeout
            )));
        }

        self.end_of_stream_signaled = true;
        Ok(())
    }

    /// 출력 drain 시작 (세션당 1회)
    /// deadline: None이면 end-of-stream까지 무제한 폴링
    pub fn drain(&mut self, poll_timeout: Duration, deadline: Option<Duration>) -> Result<Drain<'_>> {
        if !self.end_of_stream_signaled {
            return Err(Mp4Error::InvalidState(
                "drain requested before end-of-stream was signaled".into(),
            ));
        }
        if self.drained {
            return Err(Mp4Error::InvalidState("encoder output already drained".into()));
        }
        self.drained = true;

        let compressor = self
            .compressor
            .as_deref_mut()
            .ok_or_else(|| Mp4Error::InvalidState("encoder already released".into()))?;

        Ok(Drain {
            compressor,
            poll_timeout,
            deadline: deadline.map(|limit| (Instant::now() + limit, limit)),
            format_seen: false,
            pending: None,
            finished: false,
            polls: 0,
        })
    }

    /// 정지 + 해제 (여러 번 호출해도 안전, 에러는 로그만)
    pub fn release(&mut self) {
        let Some(mut compressor) = self.compressor.take() else {
            return;
        };

        if self.started {
            if let Err(e) = compressor.stop() {
                log::warn!("[ENCODER] stop failed during release: {}", e);
            }
            self.started = false;
        }

        if let Err(e) = compressor.release() {
            log::warn!("[ENCODER] release failed: {}", e);
        }

        log::info!("[ENCODER] 해제 완료");
    }

    fn compressor_mut(&mut self) -> Result<&mut Box<dyn Compressor>> {
        self.compressor
            .as_mut()
            .ok_or_else(|| Mp4Error::InvalidState("encoder already released".into()))
    }
}

impl Drop for EncoderSession {
    fn drop(&mut self) {
        self.release();
    }
}

/// drain 이벤트 (정수 sentinel 대신 태그된 variant)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainEvent {
    /// 확정된 출력 포맷 (데이터보다 먼저, 정확히 1회)
    FormatReady(NegotiatedFormat),
    /// 압축 유닛 (다음 폴링 전에 acknowledge 필요)
    Data(CompressedUnit),
    /// 마지막 유닛. 이후 next_event()는 None
    EndOfStream(CompressedUnit),
}

/// 인코더 출력 drain (1회용, 재시작 불가)
pub struct Drain<'s> {
    compressor: &'s mut (dyn Compressor + 'static),
    poll_timeout: Duration,
    deadline: Option<(Instant, Duration)>,
    format_seen: bool,
    /// 클라이언트가 잡고 있는 출력 슬롯
    pending: Option<usize>,
    finished: bool,
    polls: u64,
}

impl<'s> Drain<'s> {
    /// 다음 이벤트까지 폴링 (TryAgain은 기한 내에서 재시도)
    pub fn next_event(&mut self) -> Result<Option<DrainEvent>> {
        if self.finished {
            return Ok(None);
        }

        if let Some(slot) = self.pending {
            return Err(Mp4Error::InvalidState(format!(
                "output buffer {} not acknowledged before next poll",
                slot
            )));
        }

        loop {
            self.polls += 1;

            match self.compressor.dequeue_output(self.poll_timeout)? {
                OutputPoll::TryAgain => {
                    if let Some((at, limit)) = self.deadline {
                        if Instant::now() >= at {
                            log::error!(
                                "[ENCODER] end-of-stream not reached after {} polls",
                                self.polls
                            );
                            return Err(Mp4Error::DrainTimeout(limit));
                        }
                    }
                    crate::debug_log!("[ENCODER] output not ready (poll {})", self.polls);
                }
                OutputPoll::FormatChanged(format) => {
                    if self.format_seen {
                        return Err(Mp4Error::InvalidState(
                            "encoder output format changed more than once".into(),
                        ));
                    }
                    self.format_seen = true;

                    log::info!(
                        "[ENCODER] 출력 포맷 확정: {}x{}, codec config {} bytes",
                        format.width,
                        format.height,
                        format.codec_config.len()
                    );
                    return Ok(Some(DrainEvent::FormatReady(NegotiatedFormat::new(format))));
                }
                OutputPoll::Buffer { slot, info } => {
                    self.pending = Some(slot);
                    let unit = CompressedUnit { slot, info };

                    if info.is_end_of_stream() {
                        self.finished = true;
                        crate::debug_log!("[ENCODER] end-of-stream after {} polls", self.polls);
                        return Ok(Some(DrainEvent::EndOfStream(unit)));
                    }

                    // 포맷 확정 전 데이터는 컨테이너에 쓸 수 없음 (슬롯은 drop 시 반환)
                    if !self.format_seen {
                        return Err(Mp4Error::InvalidState(
                            "compressed data emitted before output format".into(),
                        ));
                    }

                    return Ok(Some(DrainEvent::Data(unit)));
                }
            }
        }
    }

    /// 유닛의 payload (offset..offset+size)
    pub fn payload(&self, unit: &CompressedUnit) -> Result<&[u8]> {
        if self.pending != Some(unit.slot) {
            return Err(Mp4Error::InvalidState(format!(
                "output buffer {} is not held by the caller",
                unit.slot
            )));
        }

        let buffer = self.compressor.output_buffer(unit.slot)?;
        let end = unit.info.offset + unit.info.size;
        buffer.get(unit.info.offset..end).ok_or_else(|| {
            Mp4Error::Codec(format!(
                "output buffer {} too small: {} bytes, unit ends at {}",
                unit.slot,
                buffer.len(),
                end
            ))
        })
    }

    /// 유닛 반환 → 슬롯 재사용 가능
    pub fn acknowledge(&mut self, unit: CompressedUnit) -> Result<()> {
        if self.pending != Some(unit.slot) {
            return Err(Mp4Error::InvalidState(format!(
                "output buffer {} acknowledged twice or never dequeued",
                unit.slot
            )));
        }
        self.compressor.release_output(unit.slot)?;
        self.pending = None;
        Ok(())
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl Drop for Drain<'_> {
    fn drop(&mut self) {
        if let Some(slot) = self.pending.take() {
            if let Err(e) = self.compressor.release_output(slot) {
                log::warn!("[ENCODER] failed to return output buffer {}: {}", slot, e);
            }
        }
    }
}
