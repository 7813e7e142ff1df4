// Exporter FFI - 호스트 앱 연동
// MP4 생성 작업 시작/완료 확인/결과 경로/에러/파괴

use crate::config::{WriterConfig, DEFAULT_FILE_NAME};
use crate::encoding::exporter::ExportJob;
use crate::encoding::request::EncodeRequest;
use crate::encoding::session::Mp4Writer;
use crate::ffi::types::ErrorCode;
use std::ffi::{c_char, c_void, CStr, CString};

/// null이면 None, UTF-8이 아니면 Err
unsafe fn optional_str(ptr: *const c_char) -> Result<Option<String>, ErrorCode> {
    if ptr.is_null() {
        return Ok(None);
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map(|s| Some(s.to_string()))
        .map_err(|_| ErrorCode::InvalidParam)
}

/// 문자열을 C 포인터로 반환 (호출자가 string_free()로 해제)
unsafe fn write_out_string(value: Option<String>, out: *mut *mut c_char) {
    *out = match value.map(CString::new) {
        Some(Ok(c_str)) => c_str.into_raw(),
        _ => std::ptr::null_mut(),
    };
}

/// MP4 생성 시작 (백그라운드 스레드에서 실행)
/// samples: planar YUV420 버퍼 (width*height*3/2 bytes, 함수 안에서 복사됨)
/// output_dir: null이면 시스템 임시 디렉토리
/// file_name: null이면 "output.mp4"
/// out_job: ExportJob 핸들 반환
#[no_mangle]
pub extern "C" fn mp4_export_start(
    samples: *const u8,
    samples_len: usize,
    width: u32,
    height: u32,
    frame_rate: u32,
    bit_rate: u32,
    output_dir: *const c_char,
    file_name: *const c_char,
    out_job: *mut *mut c_void,
) -> i32 {
    if samples.is_null() || out_job.is_null() {
        return ErrorCode::NullPointer as i32;
    }

    crate::init_logging();

    unsafe {
        let output_dir = match optional_str(output_dir) {
            Ok(dir) => dir,
            Err(code) => return code as i32,
        };
        let file_name = match optional_str(file_name) {
            Ok(name) => name.unwrap_or_else(|| DEFAULT_FILE_NAME.to_string()),
            Err(code) => return code as i32,
        };

        let samples = std::slice::from_raw_parts(samples, samples_len).to_vec();
        let request = match EncodeRequest::new(samples, width, height, frame_rate, bit_rate) {
            Ok(request) => request,
            Err(e) => {
                log::error!("[EXPORT] 잘못된 요청: {}", e);
                return ErrorCode::InvalidRequest as i32;
            }
        };

        let config = match output_dir {
            Some(dir) => WriterConfig::new(dir),
            None => WriterConfig::default(),
        };

        let job = ExportJob::start(Mp4Writer::new(config), request, file_name);
        *out_job = Box::into_raw(Box::new(job)) as *mut c_void;
    }

    ErrorCode::Success as i32
}

/// Export 완료 여부 확인
/// 반환: 1=완료, 0=진행중
#[no_mangle]
pub extern "C" fn mp4_export_is_finished(job: *mut c_void) -> i32 {
    if job.is_null() {
        return 1; // null이면 완료로 처리
    }

    unsafe {
        let job_ref = &*(job as *const ExportJob);
        if job_ref.is_finished() { 1 } else { 0 }
    }
}

/// 완료까지 대기 (블로킹)
/// 반환: 1=성공, 0=실패
#[no_mangle]
pub extern "C" fn mp4_export_wait(job: *mut c_void) -> i32 {
    if job.is_null() {
        return 0;
    }

    unsafe {
        let job_ref = &*(job as *const ExportJob);
        if job_ref.wait() { 1 } else { 0 }
    }
}

/// 생성된 파일의 절대 경로
/// out_path: 경로 문자열 포인터 (실패/진행중이면 null)
/// 반환 후 string_free()로 해제 필요
#[no_mangle]
pub extern "C" fn mp4_export_get_output_path(
    job: *mut c_void,
    out_path: *mut *mut c_char,
) -> i32 {
    if job.is_null() || out_path.is_null() {
        return ErrorCode::NullPointer as i32;
    }

    unsafe {
        let job_ref = &*(job as *const ExportJob);
        if !job_ref.is_finished() {
            *out_path = std::ptr::null_mut();
            return ErrorCode::NotFinished as i32;
        }
        let path = job_ref
            .output_path()
            .map(|p| p.to_string_lossy().into_owned());
        write_out_string(path, out_path);
    }

    ErrorCode::Success as i32
}

/// Export 에러 메시지 가져오기
/// out_error: 에러 문자열 포인터 (없으면 null)
/// 반환 후 string_free()로 해제 필요
#[no_mangle]
pub extern "C" fn mp4_export_get_error(
    job: *mut c_void,
    out_error: *mut *mut c_char,
) -> i32 {
    if job.is_null() || out_error.is_null() {
        return ErrorCode::NullPointer as i32;
    }

    unsafe {
        let job_ref = &*(job as *const ExportJob);
        write_out_string(job_ref.get_error(), out_error);
    }

    ErrorCode::Success as i32
}

/// ExportJob 파괴 (메모리 해제)
/// 진행 중이면 완료까지 기다린 뒤 해제 (세션 정리 보장)
#[no_mangle]
pub extern "C" fn mp4_export_destroy(job: *mut c_void) -> i32 {
    if job.is_null() {
        return ErrorCode::NullPointer as i32;
    }

    unsafe {
        let job = Box::from_raw(job as *mut ExportJob);
        job.wait();
    }

    ErrorCode::Success as i32
}

/// Rust에서 할당한 문자열 해제
#[no_mangle]
pub extern "C" fn string_free(s: *mut c_char) {
    if s.is_null() {
        return;
    }

    unsafe {
        let _ = CString::from_raw(s);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_pointers() {
        let mut job: *mut c_void = std::ptr::null_mut();
        let code = mp4_export_start(
            std::ptr::null(),
            0,
            4,
            4,
            30,
            100_000,
            std::ptr::null(),
            std::ptr::null(),
            &mut job,
        );
        assert_eq!(code, ErrorCode::NullPointer as i32);
        assert!(job.is_null());

        assert_eq!(mp4_export_is_finished(std::ptr::null_mut()), 1);
        assert_eq!(mp4_export_wait(std::ptr::null_mut()), 0);
        assert_eq!(
            mp4_export_destroy(std::ptr::null_mut()),
            ErrorCode::NullPointer as i32
        );
        string_free(std::ptr::null_mut());
    }

    #[test]
    fn test_invalid_request_rejected() {
        let samples = vec![0u8; 10];
        let mut job: *mut c_void = std::ptr::null_mut();
        let code = mp4_export_start(
            samples.as_ptr(),
            samples.len(),
            1280,
            720,
            30,
            2_000_000,
            std::ptr::null(),
            std::ptr::null(),
            &mut job,
        );
        assert_eq!(code, ErrorCode::InvalidRequest as i32);
        assert!(job.is_null());
    }

    #[test]
    fn test_invalid_file_name_reported() {
        let dir = tempfile::tempdir().unwrap();
        let dir_c = CString::new(dir.path().to_string_lossy().into_owned()).unwrap();
        let name_c = CString::new("../escape.mp4").unwrap();
        let samples = vec![0u8; 24];
        let mut job: *mut c_void = std::ptr::null_mut();

        let code = mp4_export_start(
            samples.as_ptr(),
            samples.len(),
            4,
            4,
            30,
            100_000,
            dir_c.as_ptr(),
            name_c.as_ptr(),
            &mut job,
        );
        assert_eq!(code, ErrorCode::Success as i32);
        assert!(!job.is_null());

        // 파일 이름 검증은 세션 안에서 실패 → 에러 메시지로 전달
        assert_eq!(mp4_export_wait(job), 0);
        assert_eq!(mp4_export_is_finished(job), 1);

        let mut path: *mut c_char = std::ptr::null_mut();
        assert_eq!(
            mp4_export_get_output_path(job, &mut path),
            ErrorCode::Success as i32
        );
        assert!(path.is_null());

        let mut error: *mut c_char = std::ptr::null_mut();
        assert_eq!(mp4_export_get_error(job, &mut error), ErrorCode::Success as i32);
        assert!(!error.is_null());
        let message = unsafe { CStr::from_ptr(error) }.to_str().unwrap().to_string();
        assert!(message.contains("configuration error"));
        string_free(error);

        assert_eq!(mp4_export_destroy(job), ErrorCode::Success as i32);
    }
}
