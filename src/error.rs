// 에러 타입 - 인코딩 세션 전체에서 공통으로 사용

use std::time::Duration;

/// MP4 생성 과정의 에러
#[derive(Debug, thiserror::Error)]
pub enum Mp4Error {
    /// 코덱/해상도/비트레이트 미지원, 잘못된 요청 또는 파일 이름
    #[error("configuration error: {0}")]
    Configuration(String),

    /// 입력 슬롯을 제한 시간 안에 얻지 못함 (재시도 가능)
    #[error("encoder busy: {0}")]
    EncoderBusy(String),

    /// 호출 순서 위반 (프로그래밍 오류)
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// 파일 생성/쓰기 실패
    #[error("I/O error: {0}")]
    Io(String),

    /// 컨테이너 finalize(trailer) 실패
    #[error("muxer finalize failed: {0}")]
    MuxerFinalize(String),

    /// 전체 drain 기한 내에 end-of-stream 미도달
    #[error("encoder did not reach end-of-stream within {0:?}")]
    DrainTimeout(Duration),

    /// 인코딩 중 백엔드 런타임 에러
    #[error("codec error: {0}")]
    Codec(String),
}

impl From<std::io::Error> for Mp4Error {
    fn from(e: std::io::Error) -> Self {
        Mp4Error::Io(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Mp4Error>;
