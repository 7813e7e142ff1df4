// 인코더 ↔ 먹서 사이에 오가는 포맷/버퍼 기술자

use crate::encoding::request::EncodeRequest;

/// 비디오 코덱
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCodec {
    H264,
}

impl VideoCodec {
    pub fn mime_type(&self) -> &'static str {
        match self {
            VideoCodec::H264 => "video/avc",
        }
    }
}

/// 인코더에 요청하는 설정 (configure 시점)
/// 실제 출력 포맷은 인코더가 FormatReady로 다시 알려줌
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderConfig {
    pub codec: VideoCodec,
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    pub bit_rate: u32,
    /// 키프레임 간격 (프레임 단위)
    pub key_frame_interval: u32,
}

impl EncoderConfig {
    /// 단일 프레임 인코딩용: 모든 프레임을 키프레임으로
    pub fn h264(width: u32, height: u32, frame_rate: u32, bit_rate: u32) -> Self {
        Self {
            codec: VideoCodec::H264,
            width,
            height,
            frame_rate,
            bit_rate,
            key_frame_interval: 1,
        }
    }

    pub fn from_request(request: &EncodeRequest) -> Self {
        Self::h264(
            request.width(),
            request.height(),
            request.frame_rate(),
            request.bit_rate(),
        )
    }
}

/// 인코더가 확정한 출력 포맷
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackFormat {
    pub codec: VideoCodec,
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    pub bit_rate: u32,
    /// 코덱 설정 데이터 (H.264: SPS/PPS)
    pub codec_config: Vec<u8>,
}

/// FormatReady 이벤트로만 얻을 수 있는 협상된 포맷
/// 요청 포맷(EncoderConfig)으로 트랙을 등록하는 실수를 타입으로 차단
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiatedFormat(TrackFormat);

impl NegotiatedFormat {
    pub(crate) fn new(format: TrackFormat) -> Self {
        Self(format)
    }

    pub fn format(&self) -> &TrackFormat {
        &self.0
    }
}

bitflags::bitflags! {
    /// 출력 버퍼 플래그
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferFlags: u32 {
        const KEY_FRAME = 1;
        /// SPS/PPS 등 코덱 설정 데이터 (샘플 아님)
        const CODEC_CONFIG = 1 << 1;
        const END_OF_STREAM = 1 << 2;
    }
}

/// 출력 버퍼 하나의 위치/크기/타임스탬프/플래그
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferInfo {
    pub offset: usize,
    pub size: usize,
    pub presentation_time_us: i64,
    pub flags: BufferFlags,
}

impl BufferInfo {
    pub fn end_of_stream() -> Self {
        Self {
            offset: 0,
            size: 0,
            presentation_time_us: 0,
            flags: BufferFlags::END_OF_STREAM,
        }
    }

    pub fn is_end_of_stream(&self) -> bool {
        self.flags.contains(BufferFlags::END_OF_STREAM)
    }
}

/// 압축 유닛 (drain 1회 동안만 유효)
/// payload는 Drain::payload()로 인코더 출력 버퍼에서 빌려옴
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressedUnit {
    pub slot: usize,
    pub info: BufferInfo,
}

impl CompressedUnit {
    pub fn is_empty(&self) -> bool {
        self.info.size == 0
    }

    pub fn is_key_frame(&self) -> bool {
        self.info.flags.contains(BufferFlags::KEY_FRAME)
    }

    pub fn is_codec_config(&self) -> bool {
        self.info.flags.contains(BufferFlags::CODEC_CONFIG)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags() {
        let flags = BufferFlags::KEY_FRAME | BufferFlags::END_OF_STREAM;
        assert!(flags.contains(BufferFlags::KEY_FRAME));
        assert!(flags.contains(BufferFlags::END_OF_STREAM));
        assert!(!flags.contains(BufferFlags::CODEC_CONFIG));
        assert!(BufferFlags::empty().is_empty());
        assert!(!BufferFlags::empty().contains(BufferFlags::KEY_FRAME));
    }

    #[test]
    fn test_encoder_config_from_request() {
        let req = EncodeRequest::new(vec![0u8; 1_382_400], 1280, 720, 30, 2_000_000).unwrap();
        let config = EncoderConfig::from_request(&req);
        assert_eq!(config.codec, VideoCodec::H264);
        assert_eq!(config.key_frame_interval, 1);
        assert_eq!((config.width, config.height), (1280, 720));
        assert_eq!(config.codec.mime_type(), "video/avc");
    }

    #[test]
    fn test_end_of_stream_info() {
        let info = BufferInfo::end_of_stream();
        assert!(info.is_end_of_stream());
        assert_eq!(info.size, 0);
    }
}
