// FFmpeg 기반 압축기 (libavcodec H.264)
// send_frame/receive_packet 모델을 입력 슬롯/출력 슬롯 모델로 감쌈

use ffmpeg_next as ffmpeg;
use ffmpeg::codec;
use ffmpeg::format::Pixel;
use ffmpeg::{Rational, Rescale};
use std::time::Duration;

use crate::encoding::encoder::{Compressor, CompressorFactory, InputBuffer, OutputPoll};
use crate::encoding::format::{BufferFlags, BufferInfo, EncoderConfig, TrackFormat, VideoCodec};
use crate::encoding::request::yuv420_frame_size;
use crate::error::{Mp4Error, Result};

/// 마이크로초 time base
const MICROS: Rational = Rational(1, 1_000_000);

/// libavcodec은 출력 패킷을 하나씩 돌려주므로 슬롯도 하나
const OUTPUT_SLOT: usize = 0;

pub struct FfmpegCompressorFactory;

impl CompressorFactory for FfmpegCompressorFactory {
    fn create(&self, config: &EncoderConfig) -> Result<Box<dyn Compressor>> {
        Ok(Box::new(FfmpegCompressor::configure(config)?))
    }
}

/// libavcodec 비디오 인코더
pub struct FfmpegCompressor {
    encoder: Option<ffmpeg::encoder::Video>,
    config: EncoderConfig,
    time_base: Rational,
    started: bool,
    format_reported: bool,
    eof_sent: bool,
    eof_received: bool,
    /// 클라이언트가 잡고 있는 출력 패킷
    output: Option<ffmpeg::Packet>,
}

impl FfmpegCompressor {
    /// 인코더 찾기 + 설정 + open (실패 시 Configuration 에러)
    pub fn configure(config: &EncoderConfig) -> Result<Self> {
        ffmpeg::init().map_err(|e| Mp4Error::Configuration(format!("FFmpeg init failed: {}", e)))?;
        ffmpeg::util::log::set_level(ffmpeg::util::log::Level::Warning);

        let codec_id = match config.codec {
            VideoCodec::H264 => codec::Id::H264,
        };
        let codec = ffmpeg::encoder::find(codec_id).ok_or_else(|| {
            Mp4Error::Configuration(format!("{} encoder not found", config.codec.mime_type()))
        })?;

        let mut encoder = codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .map_err(|e| Mp4Error::Configuration(format!("Failed to get video encoder: {}", e)))?;

        // time_base = 1/fps, pts는 프레임 단위
        let fps = i32::try_from(config.frame_rate)
            .ok()
            .filter(|fps| *fps > 0)
            .ok_or_else(|| {
                Mp4Error::Configuration(format!("unsupported frame rate {}", config.frame_rate))
            })?;
        let time_base = Rational::new(1, fps);

        encoder.set_width(config.width);
        encoder.set_height(config.height);
        encoder.set_format(Pixel::YUV420P);
        encoder.set_time_base(time_base);
        encoder.set_frame_rate(Some(Rational::new(fps, 1)));
        encoder.set_bit_rate(config.bit_rate as usize);
        encoder.set_gop(config.key_frame_interval);
        // B-frame 없음 → dts == pts
        encoder.set_max_b_frames(0);

        // MP4 컨테이너용 글로벌 헤더 (SPS/PPS → extradata)
        unsafe {
            (*encoder.as_mut_ptr()).flags |= codec::flag::Flags::GLOBAL_HEADER.bits() as i32;
        }

        let mut opts = ffmpeg::Dictionary::new();
        opts.set("preset", "medium");

        let encoder = encoder.open_with(opts).map_err(|e| {
            Mp4Error::Configuration(format!(
                "Failed to open encoder for {}x{} @ {}bps: {}",
                config.width, config.height, config.bit_rate, e
            ))
        })?;

        Ok(Self {
            encoder: Some(encoder),
            config: config.clone(),
            time_base,
            started: false,
            format_reported: false,
            eof_sent: false,
            eof_received: false,
            output: None,
        })
    }

    fn encoder_mut(&mut self) -> Result<&mut ffmpeg::encoder::Video> {
        if !self.started {
            return Err(Mp4Error::InvalidState("encoder not started".into()));
        }
        self.encoder
            .as_mut()
            .ok_or_else(|| Mp4Error::InvalidState("encoder already released".into()))
    }

    /// open 이후 인코더 컨텍스트에서 확정된 포맷 읽기
    fn negotiated_format(&self) -> Result<TrackFormat> {
        let encoder = self
            .encoder
            .as_ref()
            .ok_or_else(|| Mp4Error::InvalidState("encoder already released".into()))?;

        let (width, height, bit_rate, codec_config) = unsafe {
            let ctx = encoder.as_ptr();
            let extradata = if (*ctx).extradata.is_null() || (*ctx).extradata_size <= 0 {
                Vec::new()
            } else {
                std::slice::from_raw_parts((*ctx).extradata, (*ctx).extradata_size as usize)
                    .to_vec()
            };
            ((*ctx).width, (*ctx).height, (*ctx).bit_rate, extradata)
        };

        Ok(TrackFormat {
            codec: self.config.codec,
            width: width as u32,
            height: height as u32,
            frame_rate: self.config.frame_rate,
            bit_rate: bit_rate as u32,
            codec_config,
        })
    }
}

impl Compressor for FfmpegCompressor {
    fn start(&mut self) -> Result<()> {
        if self.encoder.is_none() {
            return Err(Mp4Error::InvalidState("encoder already released".into()));
        }
        self.started = true;
        Ok(())
    }

    // libavcodec은 동기식이라 슬롯을 즉시 받거나 EAGAIN으로 거절함
    fn queue_input(&mut self, input: InputBuffer<'_>, _timeout: Duration) -> Result<bool> {
        match input {
            InputBuffer::Frame {
                samples,
                presentation_time_us,
            } => {
                let (width, height) = (self.config.width, self.config.height);
                if samples.len() != yuv420_frame_size(width, height) {
                    return Err(Mp4Error::Codec(format!(
                        "frame buffer size {} does not match {}x{}",
                        samples.len(),
                        width,
                        height
                    )));
                }

                let mut frame = ffmpeg::frame::Video::new(Pixel::YUV420P, width, height);
                copy_yuv420_planes(&mut frame, samples, width as usize, height as usize);
                frame.set_pts(Some(presentation_time_us.rescale(MICROS, self.time_base)));

                match self.encoder_mut()?.send_frame(&frame) {
                    Ok(()) => Ok(true),
                    Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::ffi::EAGAIN => {
                        Ok(false)
                    }
                    Err(e) => Err(Mp4Error::Codec(format!("Failed to send frame: {}", e))),
                }
            }
            InputBuffer::EndOfStream => {
                match self.encoder_mut()?.send_eof() {
                    Ok(()) => {
                        self.eof_sent = true;
                        Ok(true)
                    }
                    Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::ffi::EAGAIN => {
                        Ok(false)
                    }
                    Err(e) => Err(Mp4Error::Codec(format!("Failed to send EOF: {}", e))),
                }
            }
        }
    }

    fn dequeue_output(&mut self, timeout: Duration) -> Result<OutputPoll> {
        if self.output.is_some() {
            return Err(Mp4Error::InvalidState("previous output buffer not released".into()));
        }

        // open 직후 extradata까지 확정되므로 첫 폴링에서 포맷 보고
        if !self.format_reported {
            let format = self.negotiated_format()?;
            self.format_reported = true;
            return Ok(OutputPoll::FormatChanged(format));
        }

        if self.eof_received {
            return Ok(OutputPoll::TryAgain);
        }

        let time_base = self.time_base;
        let eof_sent = self.eof_sent;
        let mut packet = ffmpeg::Packet::empty();

        match self.encoder_mut()?.receive_packet(&mut packet) {
            Ok(()) => {
                let mut flags = BufferFlags::empty();
                flags.set(BufferFlags::KEY_FRAME, packet.is_key());
                let info = BufferInfo {
                    offset: 0,
                    size: packet.size(),
                    presentation_time_us: packet.pts().unwrap_or(0).rescale(time_base, MICROS),
                    flags,
                };
                self.output = Some(packet);
                Ok(OutputPoll::Buffer {
                    slot: OUTPUT_SLOT,
                    info,
                })
            }
            Err(ffmpeg::Error::Eof) => {
                self.eof_received = true;
                self.output = Some(ffmpeg::Packet::empty());
                Ok(OutputPoll::Buffer {
                    slot: OUTPUT_SLOT,
                    info: BufferInfo::end_of_stream(),
                })
            }
            Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::ffi::EAGAIN => {
                // EOF 전송 전이면 입력 대기 중 → 타임아웃만큼 대기
                if !eof_sent {
                    std::thread::sleep(timeout);
                }
                Ok(OutputPoll::TryAgain)
            }
            Err(e) => Err(Mp4Error::Codec(format!("Failed to receive packet: {}", e))),
        }
    }

    fn output_buffer(&self, slot: usize) -> Result<&[u8]> {
        match (&self.output, slot) {
            (Some(packet), OUTPUT_SLOT) => Ok(packet.data().unwrap_or(&[])),
            _ => Err(Mp4Error::InvalidState(format!("output buffer {} not dequeued", slot))),
        }
    }

    fn release_output(&mut self, slot: usize) -> Result<()> {
        if slot != OUTPUT_SLOT || self.output.take().is_none() {
            return Err(Mp4Error::InvalidState(format!("output buffer {} not dequeued", slot)));
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.started = false;
        self.output = None;
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        self.started = false;
        self.output = None;
        self.encoder = None;
        Ok(())
    }
}

/// planar YUV420 버퍼 → FFmpeg 프레임 (평면별 stride 반영)
fn copy_yuv420_planes(frame: &mut ffmpeg::frame::Video, samples: &[u8], width: usize, height: usize) {
    let luma = width * height;
    let (chroma_width, chroma_height) = (width / 2, height / 2);
    let chroma = chroma_width * chroma_height;

    let planes = [
        (&samples[..luma], width, height),
        (&samples[luma..luma + chroma], chroma_width, chroma_height),
        (&samples[luma + chroma..luma + 2 * chroma], chroma_width, chroma_height),
    ];

    for (plane, (src, row_size, rows)) in planes.into_iter().enumerate() {
        let stride = frame.stride(plane);
        let dst = frame.data_mut(plane);
        for y in 0..rows {
            dst[y * stride..y * stride + row_size]
                .copy_from_slice(&src[y * row_size..(y + 1) * row_size]);
        }
    }
}
