// FFI 공통 타입 - 에러 코드

/// FFI 함수 반환 코드
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Success = 0,
    NullPointer = -1,
    InvalidParam = -2,
    /// 요청 검증 실패 (해상도/버퍼 크기 불일치 등)
    InvalidRequest = -3,
    /// 작업이 아직 끝나지 않음
    NotFinished = -4,
}
