// 인코딩 & 내보내기 모듈
// YUV420P 프레임 1장 → H.264 → MP4 컨테이너

pub mod encoder;
pub mod exporter;
pub mod format;
pub mod muxer;
pub mod request;
pub mod session;

#[cfg(test)]
pub(crate) mod test_support;

pub use encoder::{Compressor, CompressorFactory, Drain, DrainEvent, EncoderSession};
pub use exporter::ExportJob;
pub use format::{CompressedUnit, EncoderConfig, NegotiatedFormat, TrackFormat};
pub use muxer::{ContainerMuxer, MuxSession, MuxerFactory};
pub use request::EncodeRequest;
pub use session::{Mp4Writer, SessionState};
