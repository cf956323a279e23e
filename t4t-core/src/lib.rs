//! NFC Forum Type 4 Tag emulation core.
//! Host-driven: no I/O; host passes command APDUs and sends back the returned responses.
//! Serves a read-only Capability Container and one NDEF file (a URI or Text record).

pub mod apdu;
pub mod ffi;
pub mod ndef;
pub mod payload;
pub mod tag;

pub use apdu::{classify, Command, FileId, StatusWord};
pub use ndef::{decode_file, encode, DecodeError, EncodeError};
pub use payload::{PayloadCell, PayloadConfig, PayloadKind, Snapshot};
pub use tag::{SelectionState, Type4Tag, CAPABILITY_CONTAINER};
