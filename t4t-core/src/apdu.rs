//! Command classification: raw ISO 7816-4 command bytes to a tagged `Command`.
//! Pure and state-free; the tag decides what a command means in its current state.

/// SELECT instruction byte.
pub const INS_SELECT: u8 = 0xA4;
/// READ BINARY instruction byte.
pub const INS_READ_BINARY: u8 = 0xB0;

/// P1 of SELECT: select by DF name (AID).
const P1_SELECT_BY_NAME: u8 = 0x04;
/// P1 of SELECT: select by file identifier.
const P1_SELECT_BY_ID: u8 = 0x00;

/// CLA INS P1 P2 Lc + 7-byte Type 4 Tag AID.
const SELECT_AID_MIN_LEN: usize = 12;
/// CLA INS P1 P2 Lc + 2-byte file ID.
const SELECT_FILE_MIN_LEN: usize = 7;
/// CLA INS P1 P2 Le.
const READ_BINARY_MIN_LEN: usize = 5;

/// Le of 0 (or an absent Le) asks for the maximum short response.
pub const MAX_SHORT_LE: usize = 256;

/// NFC Forum Type 4 Tag application identifier (NDEF tag application, v2).
/// Classification matches SELECT by shape, not by this value.
pub const NDEF_TAG_AID: [u8; 7] = [0xD2, 0x76, 0x00, 0x00, 0x85, 0x01, 0x01];

/// Elementary file identifier (2 bytes, big-endian on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId(pub [u8; 2]);

impl FileId {
    /// Capability Container file.
    pub const CC: FileId = FileId([0xE1, 0x03]);
    /// NDEF file.
    pub const NDEF: FileId = FileId([0xE1, 0x04]);
}

/// Trailing status word of every response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusWord {
    /// 90 00
    Success,
    /// 6A 82: file or application not found.
    FileNotFound,
}

impl StatusWord {
    pub fn to_bytes(self) -> [u8; 2] {
        match self {
            StatusWord::Success => [0x90, 0x00],
            StatusWord::FileNotFound => [0x6A, 0x82],
        }
    }
}

/// Classified command. Every byte sequence maps to exactly one variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SelectAid,
    SelectFile(FileId),
    /// `max_len` is Ne: 1..=256.
    ReadBinary { offset: u16, max_len: usize },
    Unrecognized,
}

/// Classify one command APDU. Checked in order: SELECT by name, SELECT by file ID, READ BINARY.
///
/// SELECT FILE layout is `CLA A4 00 P2 02 FID FID [Le]`: the Lc byte must announce a
/// 2-byte file ID and P2 is not inspected.
pub fn classify(apdu: &[u8]) -> Command {
    if apdu.len() >= SELECT_AID_MIN_LEN && apdu[1] == INS_SELECT && apdu[2] == P1_SELECT_BY_NAME {
        return Command::SelectAid;
    }
    if apdu.len() >= SELECT_FILE_MIN_LEN
        && apdu[1] == INS_SELECT
        && apdu[2] == P1_SELECT_BY_ID
        && apdu[4] == 0x02
    {
        return Command::SelectFile(FileId([apdu[5], apdu[6]]));
    }
    if apdu.len() >= READ_BINARY_MIN_LEN && apdu[1] == INS_READ_BINARY {
        let offset = u16::from_be_bytes([apdu[2], apdu[3]]);
        let max_len = match apdu.get(4) {
            Some(0) | None => MAX_SHORT_LE,
            Some(&le) => le as usize,
        };
        return Command::ReadBinary { offset, max_len };
    }
    Command::Unrecognized
}

/// Uppercase hex with spaces, as readers and APDU traces print bytes.
pub fn to_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}
