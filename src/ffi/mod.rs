// FFI 모듈 - 호스트 앱(C/C#)에서 호출하는 얇은 트리거

pub mod exporter;
pub mod types;
