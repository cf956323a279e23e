//! Type 4 Tag session: file selection state and the responses to classified commands.
//! Host-driven: the transport passes command bytes in and sends the returned bytes back.

use std::sync::Arc;

use crate::apdu::{self, Command, FileId, StatusWord};
use crate::payload::PayloadCell;

/// Capability Container: mapping version 2.0, MLe 0x003B, MLc 0x0034, then the NDEF file
/// control TLV (file E104, max size 0x00FF, read access granted, write access denied).
pub const CAPABILITY_CONTAINER: [u8; 15] = [
    0x00, 0x0F, 0x20, 0x00, 0x3B, 0x00, 0x34, 0x04, 0x06, 0xE1, 0x04, 0x00, 0xFF, 0x00, 0xFF,
];

/// Minimal FCI answered to a successful file selection.
const FCI_RESPONSE: [u8; 4] = [0x62, 0x00, 0x90, 0x00];

/// Which elementary file READ BINARY reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionState {
    #[default]
    NoFileSelected,
    CcSelected,
    NdefSelected,
}

/// One tag session. Holds selection state; payload comes from the shared cell on each read.
pub struct Type4Tag {
    payload: Arc<PayloadCell>,
    selection: SelectionState,
}

impl Type4Tag {
    pub fn new(payload: Arc<PayloadCell>) -> Self {
        Self {
            payload,
            selection: SelectionState::NoFileSelected,
        }
    }

    pub fn selection(&self) -> SelectionState {
        self.selection
    }

    pub fn payload(&self) -> &Arc<PayloadCell> {
        &self.payload
    }

    /// Process one command APDU and return the full response (data + status word).
    pub fn process_apdu(&mut self, apdu: &[u8]) -> Vec<u8> {
        let command = apdu::classify(apdu);
        let response = self.handle(command);
        tracing::debug!(
            ?command,
            selection = ?self.selection,
            response_len = response.len(),
            "apdu {}",
            apdu::to_hex(apdu)
        );
        response
    }

    /// Apply a classified command to the session.
    pub fn handle(&mut self, command: Command) -> Vec<u8> {
        match command {
            Command::SelectAid => {
                self.selection = SelectionState::NoFileSelected;
                status(StatusWord::Success)
            }
            Command::SelectFile(id) => match id {
                FileId::CC => {
                    self.selection = SelectionState::CcSelected;
                    FCI_RESPONSE.to_vec()
                }
                FileId::NDEF => {
                    self.selection = SelectionState::NdefSelected;
                    FCI_RESPONSE.to_vec()
                }
                _ => status(StatusWord::FileNotFound),
            },
            Command::ReadBinary { offset, max_len } => self.read_binary(offset as usize, max_len),
            Command::Unrecognized => status(StatusWord::FileNotFound),
        }
    }

    /// Transport reported the field went away or the reader deselected us.
    pub fn on_deactivated(&mut self, reason: i32) {
        tracing::info!(reason, selection = ?self.selection, "tag deactivated");
        self.selection = SelectionState::NoFileSelected;
    }

    fn read_binary(&self, offset: usize, max_len: usize) -> Vec<u8> {
        match self.selection {
            SelectionState::NoFileSelected => read_range(&[], offset, max_len),
            SelectionState::CcSelected => read_range(&CAPABILITY_CONTAINER, offset, max_len),
            SelectionState::NdefSelected => {
                let snapshot = self.payload.snapshot();
                match snapshot.ndef_file() {
                    Ok(file) => read_range(file, offset, max_len),
                    Err(e) => {
                        tracing::warn!("NDEF file unavailable: {e}");
                        status(StatusWord::FileNotFound)
                    }
                }
            }
        }
    }
}

/// Slice `[offset, offset + max_len)` of `file`, clamped to its end, followed by 90 00.
/// Past the end yields the status word alone.
fn read_range(file: &[u8], offset: usize, max_len: usize) -> Vec<u8> {
    if offset >= file.len() {
        return status(StatusWord::Success);
    }
    let end = offset.saturating_add(max_len).min(file.len());
    let mut out = Vec::with_capacity(end - offset + 2);
    out.extend_from_slice(&file[offset..end]);
    out.extend_from_slice(&StatusWord::Success.to_bytes());
    out
}

fn status(sw: StatusWord) -> Vec<u8> {
    sw.to_bytes().to_vec()
}
