// 인코딩 요청 - 단일 YUV420P(planar) 프레임 + 인코딩 파라미터

use crate::error::{Mp4Error, Result};

/// 기본 프레임레이트
pub const DEFAULT_FRAME_RATE: u32 = 30;
/// 기본 비트레이트 (2 Mbps)
pub const DEFAULT_BIT_RATE: u32 = 2_000_000;

/// 허용 최대 프레임레이트
pub const MAX_FRAME_RATE: u32 = 240;
/// 허용 최대 가로/세로 (H.264 level 6.2 상한)
pub const MAX_DIMENSION: u32 = 8192;

/// planar 4:2:0 버퍼 크기 (Y 평면 + U/V 1/4 평면 2개)
pub fn yuv420_frame_size(width: u32, height: u32) -> usize {
    width as usize * height as usize * 3 / 2
}

/// 인코딩 요청 (생성 시 검증, 이후 불변)
#[derive(Debug, Clone)]
pub struct EncodeRequest {
    samples: Vec<u8>,
    width: u32,
    height: u32,
    frame_rate: u32,
    bit_rate: u32,
}

impl EncodeRequest {
    pub fn new(
        samples: Vec<u8>,
        width: u32,
        height: u32,
        frame_rate: u32,
        bit_rate: u32,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Mp4Error::Configuration(format!(
                "invalid resolution {}x{}",
                width, height
            )));
        }
        // 4:2:0 chroma 평면은 가로/세로 절반 → 짝수 해상도만 허용
        if width % 2 != 0 || height % 2 != 0 {
            return Err(Mp4Error::Configuration(format!(
                "resolution {}x{} must be even for 4:2:0 sampling",
                width, height
            )));
        }
        if width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(Mp4Error::Configuration(format!(
                "resolution {}x{} exceeds {}x{}",
                width, height, MAX_DIMENSION, MAX_DIMENSION
            )));
        }
        if frame_rate == 0 || frame_rate > MAX_FRAME_RATE {
            return Err(Mp4Error::Configuration(format!(
                "frame rate {} out of range 1..={}",
                frame_rate, MAX_FRAME_RATE
            )));
        }
        if bit_rate == 0 {
            return Err(Mp4Error::Configuration("bit rate must be positive".into()));
        }

        let expected = yuv420_frame_size(width, height);
        if samples.len() != expected {
            return Err(Mp4Error::Configuration(format!(
                "Invalid frame data size: got {}, expected {} ({}x{}x3/2)",
                samples.len(),
                expected,
                width,
                height
            )));
        }

        Ok(Self {
            samples,
            width,
            height,
            frame_rate,
            bit_rate,
        })
    }

    /// 30fps / 2Mbps 기본값으로 생성
    pub fn with_defaults(samples: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        Self::new(samples, width, height, DEFAULT_FRAME_RATE, DEFAULT_BIT_RATE)
    }

    pub fn samples(&self) -> &[u8] { &self.samples }
    pub fn width(&self) -> u32 { self.width }
    pub fn height(&self) -> u32 { self.height }
    pub fn frame_rate(&self) -> u32 { self.frame_rate }
    pub fn bit_rate(&self) -> u32 { self.bit_rate }
}
