// FFmpeg 래퍼 모듈
// H.264 인코딩(libavcodec) + MP4 먹싱(libavformat)

pub mod compressor;
pub mod muxer;

pub use compressor::{FfmpegCompressor, FfmpegCompressorFactory};
pub use muxer::{FfmpegMuxer, FfmpegMuxerFactory};
