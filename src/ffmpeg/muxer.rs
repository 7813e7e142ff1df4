// FFmpeg 기반 MP4 먹서 (libavformat)
// 트랙 파라미터는 인코더가 확정한 포맷(extradata 포함)으로 설정

use ffmpeg_next as ffmpeg;
use ffmpeg::codec;
use ffmpeg::{ffi, Rational, Rescale};
use std::path::{Path, PathBuf};

use crate::encoding::format::{BufferFlags, BufferInfo, TrackFormat, VideoCodec};
use crate::encoding::muxer::{ContainerMuxer, MuxerFactory};
use crate::error::{Mp4Error, Result};

const MICROS: Rational = Rational(1, 1_000_000);

/// 트랙 time base 요청값 (90kHz 비디오 클럭, 실제 값은 헤더 기록 후 다시 읽음)
const TRACK_TIME_BASE: Rational = Rational(1, 90_000);

pub struct FfmpegMuxerFactory;

impl MuxerFactory for FfmpegMuxerFactory {
    fn open(&self, path: &Path) -> Result<Box<dyn ContainerMuxer>> {
        Ok(Box::new(FfmpegMuxer::open(path)?))
    }
}

/// libavformat MP4 출력 컨텍스트
pub struct FfmpegMuxer {
    output: Option<ffmpeg::format::context::Output>,
    path: PathBuf,
    track: Option<usize>,
    stream_time_base: Rational,
    frame_duration_us: i64,
}

impl FfmpegMuxer {
    /// 출력 파일 생성 (기존 파일 덮어씀)
    pub fn open(path: &Path) -> Result<Self> {
        ffmpeg::init().map_err(|e| Mp4Error::Io(format!("FFmpeg init failed: {}", e)))?;

        let output = ffmpeg::format::output_as(path, "mp4").map_err(|e| {
            Mp4Error::Io(format!("Failed to create output {}: {}", path.display(), e))
        })?;

        Ok(Self {
            output: Some(output),
            path: path.to_path_buf(),
            track: None,
            stream_time_base: TRACK_TIME_BASE,
            frame_duration_us: 0,
        })
    }

    fn output_mut(&mut self) -> Result<&mut ffmpeg::format::context::Output> {
        self.output
            .as_mut()
            .ok_or_else(|| Mp4Error::InvalidState("muxer already released".into()))
    }
}

impl ContainerMuxer for FfmpegMuxer {
    fn add_track(&mut self, format: &TrackFormat) -> Result<usize> {
        let codec_id = match format.codec {
            VideoCodec::H264 => codec::Id::H264,
        };
        let codec = ffmpeg::encoder::find(codec_id).ok_or_else(|| {
            Mp4Error::Configuration(format!("{} codec not found", format.codec.mime_type()))
        })?;

        let mut params = codec::Parameters::new();
        set_video_parameters(&mut params, format, codec_id);

        let index = {
            let mut stream = self
                .output_mut()?
                .add_stream(codec)
                .map_err(|e| Mp4Error::Io(format!("Failed to add video stream: {}", e)))?;
            stream.set_parameters(params);
            stream.set_time_base(TRACK_TIME_BASE);
            stream.index()
        };

        self.track = Some(index);
        self.frame_duration_us = frame_duration_us(format.frame_rate);
        Ok(index)
    }

    fn start(&mut self) -> Result<()> {
        let path = self.path.clone();
        let track = self
            .track
            .ok_or_else(|| Mp4Error::InvalidState("no track added before start".into()))?;
        let output = self.output_mut()?;
        output
            .write_header()
            .map_err(|e| Mp4Error::Io(format!("Failed to write header {}: {}", path.display(), e)))?;

        // 먹서가 time base를 바꿀 수 있으므로 헤더 기록 후 다시 읽음
        let time_base = output
            .stream(track)
            .map(|s| s.time_base())
            .ok_or_else(|| Mp4Error::InvalidState("video stream not found".into()))?;
        self.stream_time_base = time_base;
        Ok(())
    }

    fn write_sample(&mut self, track: usize, data: &[u8], info: &BufferInfo) -> Result<()> {
        let time_base = self.stream_time_base;
        let ts = info.presentation_time_us.rescale(MICROS, time_base);
        let duration = self.frame_duration_us.rescale(MICROS, time_base);

        let mut packet = ffmpeg::Packet::copy(data);
        packet.set_stream(track);
        packet.set_pts(Some(ts));
        packet.set_dts(Some(ts));
        packet.set_duration(duration);
        if info.flags.contains(BufferFlags::KEY_FRAME) {
            packet.set_flags(ffmpeg::packet::Flags::KEY);
        }

        packet
            .write_interleaved(self.output_mut()?)
            .map_err(|e| Mp4Error::Io(format!("Failed to write packet: {}", e)))
    }

    fn stop(&mut self) -> Result<()> {
        self.output_mut()?
            .write_trailer()
            .map_err(|e| Mp4Error::MuxerFinalize(format!("Failed to write trailer: {}", e)))
    }

    fn release(&mut self) -> Result<()> {
        // drop 시 avio 닫힘
        self.output = None;
        Ok(())
    }
}

/// 프레임 1장 길이 (µs, 최소 1)
fn frame_duration_us(frame_rate: u32) -> i64 {
    (1_000_000 / i64::from(frame_rate.max(1))).max(1)
}

/// 협상된 포맷 → AVCodecParameters
fn set_video_parameters(params: &mut codec::Parameters, format: &TrackFormat, codec_id: codec::Id) {
    unsafe {
        let ptr = params.as_mut_ptr();

        (*ptr).codec_type = ffi::AVMediaType::AVMEDIA_TYPE_VIDEO;
        (*ptr).codec_id = codec_id.into();
        (*ptr).width = format.width as i32;
        (*ptr).height = format.height as i32;
        (*ptr).format = ffi::AVPixelFormat::AV_PIX_FMT_YUV420P as i32;
        (*ptr).bit_rate = i64::from(format.bit_rate);

        // SPS/PPS (padding 포함 할당 필요)
        if !format.codec_config.is_empty() {
            let size = format.codec_config.len();
            let buf = ffi::av_mallocz(size + ffi::AV_INPUT_BUFFER_PADDING_SIZE as usize) as *mut u8;
            if !buf.is_null() {
                std::ptr::copy_nonoverlapping(format.codec_config.as_ptr(), buf, size);
                (*ptr).extradata = buf;
                (*ptr).extradata_size = size as i32;
            }
        }
    }
}
