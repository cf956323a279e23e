//! C ABI for linking t4t-core as a static library from Android (NDK) or other C/C++ hosts.
//! The JNI side of a HostApduService forwards `processCommandApdu`, `onDeactivated` and the
//! UI's payload updates to these functions.

use std::ffi::c_void;
use std::os::raw::c_int;
use std::slice;
use std::sync::Arc;

use crate::payload::{PayloadCell, PayloadConfig, PayloadKind};
use crate::tag::Type4Tag;

/// Version of this C ABI.
pub const FFI_VERSION: u8 = 1;

#[no_mangle]
pub extern "C" fn t4t_version() -> u8 {
    FFI_VERSION
}

/// Create a payload cell holding the default payload. Release with `t4t_payload_destroy`.
#[no_mangle]
pub extern "C" fn t4t_payload_create() -> *mut c_void {
    Arc::into_raw(Arc::new(PayloadCell::default())) as *mut c_void
}

/// Drop the host's reference to a payload cell. Tags created from it keep their own. No-op if null.
#[no_mangle]
pub extern "C" fn t4t_payload_destroy(h: *mut c_void) {
    if h.is_null() {
        return;
    }
    let _ = unsafe { Arc::from_raw(h as *const PayloadCell) };
}

/// Replace the payload. `text` is `text_len` bytes of UTF-8 or JNI modified UTF-8
/// (`GetStringUTFChars`); bytes that decode to nothing valid become U+FFFD.
/// `is_url` non-zero selects a URI record.
/// Returns 0 when stored, 1 when stored but too long to encode (NDEF reads answer 6A 82),
/// -1 if h is null, or text is null with a non-zero length (nothing stored).
#[no_mangle]
pub extern "C" fn t4t_set_payload(
    h: *mut c_void,
    text: *const u8,
    text_len: usize,
    is_url: c_int,
) -> c_int {
    if h.is_null() || (text.is_null() && text_len > 0) {
        return -1;
    }
    let cell = unsafe { &*(h as *const PayloadCell) };
    let bytes = unsafe { bytes_or_empty(text, text_len) };
    let config = PayloadConfig::new(decode_host_text(bytes), PayloadKind::from_is_url(is_url != 0));
    let code = match config.validate() {
        Ok(()) => 0,
        Err(_) => 1,
    };
    cell.set(config);
    code
}

/// Caller guarantees `ptr` points to `len` readable bytes when `len > 0`.
unsafe fn bytes_or_empty<'a>(ptr: *const u8, len: usize) -> &'a [u8] {
    if len == 0 {
        &[]
    } else {
        slice::from_raw_parts(ptr, len)
    }
}

/// Decode standard UTF-8, falling back to modified UTF-8 / CESU-8: `C0 80` is NUL and
/// supplementary characters arrive as two 3-byte surrogate encodings.
fn decode_host_text(bytes: &[u8]) -> String {
    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_string();
    }
    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b0 = bytes[i];
        let cont = |k: usize| bytes.get(i + k).copied().filter(|b| b & 0xC0 == 0x80);
        match b0 {
            0x00..=0x7F => {
                units.push(b0 as u16);
                i += 1;
            }
            0xC0..=0xDF => match cont(1) {
                Some(b1) => {
                    units.push(((b0 as u16 & 0x1F) << 6) | (b1 as u16 & 0x3F));
                    i += 2;
                }
                None => {
                    units.push(0xFFFD);
                    i += 1;
                }
            },
            0xE0..=0xEF => match (cont(1), cont(2)) {
                (Some(b1), Some(b2)) => {
                    units.push(
                        ((b0 as u16 & 0x0F) << 12) | ((b1 as u16 & 0x3F) << 6) | (b2 as u16 & 0x3F),
                    );
                    i += 3;
                }
                _ => {
                    units.push(0xFFFD);
                    i += 1;
                }
            },
            0xF0..=0xF7 => match std::str::from_utf8(bytes.get(i..i + 4).unwrap_or(&[])) {
                Ok(s) => {
                    units.extend(s.encode_utf16());
                    i += 4;
                }
                Err(_) => {
                    units.push(0xFFFD);
                    i += 1;
                }
            },
            _ => {
                units.push(0xFFFD);
                i += 1;
            }
        }
    }
    String::from_utf16_lossy(&units)
}

/// Create a tag session reading from payload cell `payload_h`. Returns null if `payload_h` is null.
#[no_mangle]
pub extern "C" fn t4t_tag_create(payload_h: *mut c_void) -> *mut c_void {
    if payload_h.is_null() {
        return std::ptr::null_mut();
    }
    let cell = unsafe {
        Arc::increment_strong_count(payload_h as *const PayloadCell);
        Arc::from_raw(payload_h as *const PayloadCell)
    };
    Box::into_raw(Box::new(Type4Tag::new(cell))) as *mut c_void
}

/// Destroy tag session. No-op if h is null.
#[no_mangle]
pub extern "C" fn t4t_tag_destroy(h: *mut c_void) {
    if h.is_null() {
        return;
    }
    let _ = unsafe { Box::from_raw(h as *mut Type4Tag) };
}

/// Process one command APDU. Writes the response (data + status word) to out_buf.
/// A null `apdu` with `apdu_len` 0 is an empty command.
/// Returns bytes written, or -1 on null handle/out_buf, null apdu with a non-zero length,
/// or out_buf too small (258 bytes always suffices).
#[no_mangle]
pub extern "C" fn t4t_process_apdu(
    h: *mut c_void,
    apdu: *const u8,
    apdu_len: usize,
    out_buf: *mut u8,
    out_buf_len: usize,
) -> c_int {
    if h.is_null() || out_buf.is_null() || (apdu.is_null() && apdu_len > 0) {
        return -1;
    }
    let tag = unsafe { &mut *(h as *mut Type4Tag) };
    let command = unsafe { bytes_or_empty(apdu, apdu_len) };
    let response = tag.process_apdu(command);
    if response.len() > out_buf_len {
        return -1;
    }
    unsafe {
        out_buf.copy_from_nonoverlapping(response.as_ptr(), response.len());
    }
    response.len() as c_int
}

/// Session ended (field lost or deselected). Resets file selection. No-op if h is null.
#[no_mangle]
pub extern "C" fn t4t_on_deactivated(h: *mut c_void, reason: c_int) {
    if h.is_null() {
        return;
    }
    let tag = unsafe { &mut *(h as *mut Type4Tag) };
    tag.on_deactivated(reason);
}

#[cfg(test)]
mod tests {
    use super::*;

    const SELECT_NDEF: [u8; 7] = [0x00, 0xA4, 0x00, 0x0C, 0x02, 0xE1, 0x04];
    const READ_ALL: [u8; 5] = [0x00, 0xB0, 0x00, 0x00, 0x00];

    fn call(tag: *mut c_void, apdu: &[u8]) -> Vec<u8> {
        let mut out = [0u8; 258];
        let n = t4t_process_apdu(tag, apdu.as_ptr(), apdu.len(), out.as_mut_ptr(), out.len());
        assert!(n >= 2);
        out[..n as usize].to_vec()
    }

    #[test]
    fn payload_and_tag_lifecycle() {
        let cell = t4t_payload_create();
        let tag = t4t_tag_create(cell);
        assert!(!tag.is_null());

        let text = b"hi";
        assert_eq!(t4t_set_payload(cell, text.as_ptr(), text.len(), 0), 0);
        assert_eq!(call(tag, &SELECT_NDEF), [0x62, 0x00, 0x90, 0x00]);
        assert_eq!(
            call(tag, &READ_ALL),
            [0x00, 0x09, 0xD1, 0x01, 0x05, 0x54, 0x02, b'e', b'n', b'h', b'i', 0x90, 0x00]
        );

        // Tag keeps the cell alive after the host drops its handle.
        t4t_payload_destroy(cell);
        assert_eq!(call(tag, &READ_ALL).len(), 13);

        t4t_on_deactivated(tag, 0);
        assert_eq!(call(tag, &READ_ALL), [0x90, 0x00]);
        t4t_tag_destroy(tag);
    }

    #[test]
    fn set_payload_return_codes() {
        let cell = t4t_payload_create();
        let long = vec![b'x'; 300];
        assert_eq!(t4t_set_payload(cell, long.as_ptr(), long.len(), 1), 1);
        let bad = [0xFFu8, 0xFE];
        assert_eq!(t4t_set_payload(cell, bad.as_ptr(), bad.len(), 0), 0);
        assert_eq!(stored(cell), PayloadConfig::text("\u{FFFD}\u{FFFD}"));
        assert_eq!(t4t_set_payload(cell, std::ptr::null(), 0, 1), 0);
        assert_eq!(stored(cell), PayloadConfig::uri(""));
        assert_eq!(t4t_set_payload(cell, std::ptr::null(), 3, 1), -1);
        assert_eq!(t4t_set_payload(std::ptr::null_mut(), bad.as_ptr(), 2, 1), -1);
        t4t_payload_destroy(cell);
    }

    fn stored(cell: *mut c_void) -> PayloadConfig {
        let cell = unsafe { &*(cell as *const PayloadCell) };
        cell.snapshot().config().clone()
    }

    #[test]
    fn modified_utf8_from_jni_is_decoded() {
        let cell = t4t_payload_create();
        // "hi" + U+1F600 as a surrogate pair + NUL as C0 80
        let text = b"hi\xED\xA0\xBD\xED\xB8\x80\xC0\x80";
        assert_eq!(t4t_set_payload(cell, text.as_ptr(), text.len(), 0), 0);
        assert_eq!(stored(cell), PayloadConfig::text("hi\u{1F600}\u{0}"));

        let plain = "caf\u{e9} \u{1F600}".as_bytes();
        assert_eq!(t4t_set_payload(cell, plain.as_ptr(), plain.len(), 1), 0);
        assert_eq!(stored(cell), PayloadConfig::uri("caf\u{e9} \u{1F600}"));
        t4t_payload_destroy(cell);
    }

    #[test]
    fn too_long_payload_code_matches_stored_payload() {
        let cell = t4t_payload_create();
        let long = vec![b'y'; 253];
        assert_eq!(t4t_set_payload(cell, long.as_ptr(), long.len(), 0), 1);
        assert_eq!(stored(cell).text.len(), 253);
        let fits = vec![b'y'; 252];
        assert_eq!(t4t_set_payload(cell, fits.as_ptr(), fits.len(), 0), 0);
        t4t_payload_destroy(cell);
    }

    #[test]
    fn empty_apdu_from_null_pointer() {
        let cell = t4t_payload_create();
        let tag = t4t_tag_create(cell);
        let mut out = [0u8; 8];
        assert_eq!(
            t4t_process_apdu(tag, std::ptr::null(), 0, out.as_mut_ptr(), out.len()),
            2
        );
        assert_eq!(out[..2], [0x6A, 0x82]);
        assert_eq!(
            t4t_process_apdu(tag, std::ptr::null(), 5, out.as_mut_ptr(), out.len()),
            -1
        );
        t4t_tag_destroy(tag);
        t4t_payload_destroy(cell);
    }

    #[test]
    fn null_handles_and_short_buffer() {
        assert!(t4t_tag_create(std::ptr::null_mut()).is_null());
        t4t_tag_destroy(std::ptr::null_mut());
        t4t_payload_destroy(std::ptr::null_mut());
        t4t_on_deactivated(std::ptr::null_mut(), 1);

        let cell = t4t_payload_create();
        let tag = t4t_tag_create(cell);
        let mut out = [0u8; 1];
        assert_eq!(
            t4t_process_apdu(tag, SELECT_NDEF.as_ptr(), SELECT_NDEF.len(), out.as_mut_ptr(), 1),
            -1
        );
        assert_eq!(t4t_version(), FFI_VERSION);
        t4t_tag_destroy(tag);
        t4t_payload_destroy(cell);
    }
}
