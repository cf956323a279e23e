//! vpcd transport: the emulator acts as a virtual ICC for the vsmartcard virtual reader.
//! Both directions use a 2-byte big-endian length prefix. One-byte messages are control codes.

use std::sync::Arc;
use std::time::Duration;

use t4t_core::apdu::to_hex;
use t4t_core::{PayloadCell, Type4Tag};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

const LEN_SIZE: usize = 2;

const CTRL_POWER_OFF: u8 = 0x00;
const CTRL_POWER_ON: u8 = 0x01;
const CTRL_RESET: u8 = 0x02;
const CTRL_GET_ATR: u8 = 0x04;

/// ISO 14443-4 contactless card without historical bytes (PC/SC part 3).
pub const ATR: [u8; 5] = [0x3B, 0x80, 0x80, 0x01, 0x01];

/// Deactivation reasons reported to the tag, matching Android's HostApduService.
const DEACTIVATION_LINK_LOSS: i32 = 0;
const DEACTIVATION_DESELECTED: i32 = 1;

/// Connect to vpcd and serve the tag; reconnect after `retry` whenever the link drops. Runs until cancelled.
pub async fn run_vpcd(addr: String, payload: Arc<PayloadCell>, retry: Duration) {
    loop {
        match TcpStream::connect(&addr).await {
            Ok(stream) => {
                tracing::info!(%addr, "connected to vpcd");
                let _ = stream.set_nodelay(true);
                let mut tag = Type4Tag::new(payload.clone());
                match serve(stream, &mut tag).await {
                    Ok(()) => tracing::info!("vpcd closed the connection"),
                    Err(e) => tracing::warn!("vpcd connection error: {e}"),
                }
                tag.on_deactivated(DEACTIVATION_LINK_LOSS);
            }
            Err(e) => tracing::debug!(%addr, "vpcd not reachable: {e}"),
        }
        tokio::time::sleep(retry).await;
    }
}

/// Serve one vpcd connection until EOF.
pub async fn serve<S>(mut stream: S, tag: &mut Type4Tag) -> std::io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    while let Some(msg) = read_message(&mut stream).await? {
        if let [code] = *msg.as_slice() {
            match code {
                CTRL_POWER_OFF => tag.on_deactivated(DEACTIVATION_LINK_LOSS),
                CTRL_POWER_ON | CTRL_RESET => tag.on_deactivated(DEACTIVATION_DESELECTED),
                CTRL_GET_ATR => write_message(&mut stream, &ATR).await?,
                other => tracing::debug!("ignoring vpcd control code {other:#04x}"),
            }
            continue;
        }
        let response = tag.process_apdu(&msg);
        tracing::trace!("C: {} R: {}", to_hex(&msg), to_hex(&response));
        write_message(&mut stream, &response).await?;
    }
    Ok(())
}

/// Read one length-prefixed message. Returns None on clean EOF before a length prefix.
async fn read_message<R: AsyncRead + Unpin>(r: &mut R) -> std::io::Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; LEN_SIZE];
    match r.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }
    let len = u16::from_be_bytes(len_buf) as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf).await?;
    Ok(Some(buf))
}

async fn write_message<W: AsyncWrite + Unpin>(w: &mut W, data: &[u8]) -> std::io::Result<()> {
    let len = u16::try_from(data.len())
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "message too large"))?;
    w.write_all(&len.to_be_bytes()).await?;
    w.write_all(data).await?;
    w.flush().await
}
