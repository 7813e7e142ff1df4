// 테스트 더블 - 호출 순서를 기록하는 가짜 압축기/먹서

use crate::encoding::encoder::{Compressor, CompressorFactory, InputBuffer, OutputPoll};
use crate::encoding::format::{BufferFlags, BufferInfo, EncoderConfig, TrackFormat};
use crate::encoding::muxer::{ContainerMuxer, MuxerFactory};
use crate::error::{Mp4Error, Result};
use std::collections::VecDeque;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 기록되는 호출
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CompressorCreate,
    CompressorStart,
    QueueInput { len: usize, end_of_stream: bool },
    ReleaseOutput(usize),
    CompressorStop,
    CompressorRelease,
    MuxerOpen(PathBuf),
    AddTrack,
    MuxerStart,
    WriteSample { track: usize, size: usize },
    MuxerStop,
    MuxerRelease,
}

/// 압축기/먹서가 공유하는 호출 기록
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    pub fn push(&self, call: Call) {
        self.0.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.0.lock().unwrap().iter().filter(|c| *c == call).count()
    }

    pub fn position(&self, pred: impl Fn(&Call) -> bool) -> Option<usize> {
        self.0.lock().unwrap().iter().position(pred)
    }

    pub fn writes(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::WriteSample { .. }))
            .collect()
    }
}

/// dequeue_output이 순서대로 돌려줄 결과
#[derive(Debug, Clone)]
pub enum ScriptStep {
    TryAgain,
    Format,
    Data(Vec<u8>, BufferFlags),
    EndOfStream(Vec<u8>),
    Fail,
    /// 백엔드 내부 패닉
    Panic,
}

/// 정상 인코더 흐름: 대기 → 포맷 확정 → 키프레임 1개 → 빈 end-of-stream
pub fn standard_script() -> Vec<ScriptStep> {
    vec![
        ScriptStep::TryAgain,
        ScriptStep::Format,
        ScriptStep::Data(vec![0, 0, 0, 1, 0x65, 0x88, 0x84, 0x00], BufferFlags::KEY_FRAME),
        ScriptStep::EndOfStream(vec![]),
    ]
}

pub struct ScriptedCompressorFactory {
    log: CallLog,
    script: Vec<ScriptStep>,
    fail_create: bool,
    fail_start: bool,
    busy_input: bool,
}

impl ScriptedCompressorFactory {
    pub fn new() -> Self {
        Self::with_log(CallLog::default())
    }

    pub fn with_log(log: CallLog) -> Self {
        Self {
            log,
            script: standard_script(),
            fail_create: false,
            fail_start: false,
            busy_input: false,
        }
    }

    pub fn with_script(mut self, script: Vec<ScriptStep>) -> Self {
        self.script = script;
        self
    }

    pub fn failing_create(mut self) -> Self {
        self.fail_create = true;
        self
    }

    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    pub fn busy_input(mut self) -> Self {
        self.busy_input = true;
        self
    }

    pub fn log(&self) -> CallLog {
        self.log.clone()
    }
}

impl CompressorFactory for ScriptedCompressorFactory {
    fn create(&self, config: &EncoderConfig) -> Result<Box<dyn Compressor>> {
        if self.fail_create {
            return Err(Mp4Error::Configuration("no encoder for video/avc".into()));
        }
        self.log.push(Call::CompressorCreate);

        Ok(Box::new(ScriptedCompressor {
            log: self.log.clone(),
            config: config.clone(),
            script: self.script.iter().cloned().collect(),
            fail_start: self.fail_start,
            busy_input: self.busy_input,
            outputs: Vec::new(),
        }))
    }
}

struct ScriptedCompressor {
    log: CallLog,
    config: EncoderConfig,
    script: VecDeque<ScriptStep>,
    fail_start: bool,
    busy_input: bool,
    /// 슬롯 번호 = 인덱스
    outputs: Vec<Option<Vec<u8>>>,
}

impl ScriptedCompressor {
    fn emit(&mut self, data: Vec<u8>, flags: BufferFlags) -> OutputPoll {
        let slot = self.outputs.len();
        let info = BufferInfo {
            offset: 0,
            size: data.len(),
            presentation_time_us: 0,
            flags,
        };
        self.outputs.push(Some(data));
        OutputPoll::Buffer { slot, info }
    }
}

impl Compressor for ScriptedCompressor {
    fn start(&mut self) -> Result<()> {
        if self.fail_start {
            return Err(Mp4Error::Configuration("codec refused to start".into()));
        }
        self.log.push(Call::CompressorStart);
        Ok(())
    }

    fn queue_input(&mut self, input: InputBuffer<'_>, _timeout: Duration) -> Result<bool> {
        if self.busy_input {
            return Ok(false);
        }
        let call = match input {
            InputBuffer::Frame { samples, .. } => Call::QueueInput {
                len: samples.len(),
                end_of_stream: false,
            },
            InputBuffer::EndOfStream => Call::QueueInput {
                len: 0,
                end_of_stream: true,
            },
        };
        self.log.push(call);
        Ok(true)
    }

    fn dequeue_output(&mut self, timeout: Duration) -> Result<OutputPoll> {
        match self.script.pop_front() {
            Some(ScriptStep::TryAgain) => Ok(OutputPoll::TryAgain),
            Some(ScriptStep::Format) => Ok(OutputPoll::FormatChanged(TrackFormat {
                codec: self.config.codec,
                width: self.config.width,
                height: self.config.height,
                frame_rate: self.config.frame_rate,
                bit_rate: self.config.bit_rate,
                codec_config: vec![0x01, 0x64, 0x00, 0x1f],
            })),
            Some(ScriptStep::Data(data, flags)) => Ok(self.emit(data, flags)),
            Some(ScriptStep::EndOfStream(data)) => {
                Ok(self.emit(data, BufferFlags::END_OF_STREAM))
            }
            Some(ScriptStep::Fail) => Err(Mp4Error::Codec("encoder crashed".into())),
            Some(ScriptStep::Panic) => panic!("encoder backend panicked"),
            // 스크립트 소진 = 멈춘 인코더
            None => {
                std::thread::sleep(timeout);
                Ok(OutputPoll::TryAgain)
            }
        }
    }

    fn output_buffer(&self, slot: usize) -> Result<&[u8]> {
        self.outputs
            .get(slot)
            .and_then(|o| o.as_deref())
            .ok_or_else(|| Mp4Error::InvalidState(format!("slot {} not dequeued", slot)))
    }

    fn release_output(&mut self, slot: usize) -> Result<()> {
        let Some(output) = self.outputs.get_mut(slot).filter(|o| o.is_some()) else {
            return Err(Mp4Error::InvalidState(format!("slot {} not dequeued", slot)));
        };
        *output = None;
        self.log.push(Call::ReleaseOutput(slot));
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.log.push(Call::CompressorStop);
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        self.log.push(Call::CompressorRelease);
        Ok(())
    }
}

/// 실제 파일을 만들고 샘플 바이트를 그대로 이어 쓰는 가짜 먹서
pub struct RecordingMuxerFactory {
    log: CallLog,
    fail_open: bool,
    fail_stop: bool,
    fail_release: bool,
}

impl RecordingMuxerFactory {
    pub fn with_log(log: CallLog) -> Self {
        Self {
            log,
            fail_open: false,
            fail_stop: false,
            fail_release: false,
        }
    }

    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn failing_stop(mut self) -> Self {
        self.fail_stop = true;
        self
    }

    pub fn failing_release(mut self) -> Self {
        self.fail_release = true;
        self
    }
}

impl MuxerFactory for RecordingMuxerFactory {
    fn open(&self, path: &Path) -> Result<Box<dyn ContainerMuxer>> {
        if self.fail_open {
            return Err(Mp4Error::Io(format!("cannot create {}", path.display())));
        }
        let file = File::create(path)?;
        self.log.push(Call::MuxerOpen(path.to_path_buf()));

        Ok(Box::new(RecordingMuxer {
            log: self.log.clone(),
            file: Some(file),
            tracks: 0,
            fail_stop: self.fail_stop,
            fail_release: self.fail_release,
        }))
    }
}

struct RecordingMuxer {
    log: CallLog,
    file: Option<File>,
    tracks: usize,
    fail_stop: bool,
    fail_release: bool,
}

impl ContainerMuxer for RecordingMuxer {
    fn add_track(&mut self, _format: &TrackFormat) -> Result<usize> {
        self.log.push(Call::AddTrack);
        self.tracks += 1;
        Ok(self.tracks - 1)
    }

    fn start(&mut self) -> Result<()> {
        self.log.push(Call::MuxerStart);
        if let Some(file) = self.file.as_mut() {
            file.write_all(b"ftyp")?;
        }
        Ok(())
    }

    fn write_sample(&mut self, track: usize, data: &[u8], _info: &BufferInfo) -> Result<()> {
        self.log.push(Call::WriteSample {
            track,
            size: data.len(),
        });
        if let Some(file) = self.file.as_mut() {
            file.write_all(data)?;
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.log.push(Call::MuxerStop);
        if self.fail_stop {
            return Err(Mp4Error::MuxerFinalize("trailer write failed".into()));
        }
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        self.log.push(Call::MuxerRelease);
        self.file = None;
        if self.fail_release {
            return Err(Mp4Error::Io("close failed".into()));
        }
        Ok(())
    }
}
