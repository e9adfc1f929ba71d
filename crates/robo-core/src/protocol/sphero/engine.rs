//! Sphero protocol engine: frame validation and dispatch.

use tracing::{debug, error, info, trace, warn};

use crate::protocol::checksum;
use crate::protocol::sphero::constants::{
    AsyncId, CallbackType, ACK_PRE_SLEEP, HEADERS, MINIMUM_FRAME_SIZE, RESPONSE_ACK,
    RESPONSE_ASYNC,
};
use crate::protocol::sphero::decoder;
use crate::protocol::sphero::events::SpheroEvent;
use crate::protocol::stream::StreamReader;
use crate::protocol::{DecodeError, Protocol};

/// A decoded Sphero frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpheroMessage {
    /// Acknowledgement answering the request sent with `sequence`.
    Response {
        sequence: CallbackType,
        event: SpheroEvent,
    },
    /// Unsolicited message pushed by the robot.
    Notification(SpheroEvent),
}

impl SpheroMessage {
    /// The event carried by either kind of message.
    pub fn event(&self) -> &SpheroEvent {
        match self {
            Self::Response { event, .. } => event,
            Self::Notification(event) => event,
        }
    }
}

/// Stateful decoder for one Sphero connection.
///
/// Holds the connection's carry-over buffer; everything else is stateless.
#[derive(Debug, Clone)]
pub struct SpheroProtocol {
    reader: StreamReader,
}

impl Default for SpheroProtocol {
    fn default() -> Self {
        Self::new()
    }
}

impl SpheroProtocol {
    pub fn new() -> Self {
        Self {
            reader: StreamReader::new(&HEADERS, MINIMUM_FRAME_SIZE, frame_length),
        }
    }

    /// Bytes waiting for the rest of a frame.
    pub fn buffered(&self) -> usize {
        self.reader.buffered()
    }

    fn handle_frame(&self, frame: &[u8]) -> Option<SpheroMessage> {
        let kind = frame[1];
        let code = frame[2];
        let seq = frame[3];
        let dlen = frame[4] as usize;

        if dlen == 0 || !checksum::verify(&frame[2..dlen + 4], frame[dlen + 4]) {
            debug!(?frame, "dropping frame with bad checksum");
            return None;
        }
        let data = &frame[5..dlen + 4];

        match kind {
            RESPONSE_ACK => self.handle_ack(code, seq, data),
            RESPONSE_ASYNC => self.handle_async(code, data),
            _ => {
                error!(?frame, "data error: unrecognised message type 0x{kind:02X}");
                None
            }
        }
    }

    fn handle_ack(&self, code: u8, seq: u8, data: &[u8]) -> Option<SpheroMessage> {
        if data.is_empty() && code == ACK_PRE_SLEEP {
            warn!("pre-sleep warning (10 sec)");
            return None;
        }

        let sequence = CallbackType::from(seq);
        let decoded = match sequence {
            CallbackType::DeviceInfo => decoder::device_info(data).map(SpheroEvent::DeviceInfo),
            CallbackType::Version => decoder::version(data).map(SpheroEvent::Version),
            CallbackType::Rgb => decoder::rgb(data).map(SpheroEvent::Rgb),
            CallbackType::Location => decoder::location(data).map(SpheroEvent::Location),
            CallbackType::None => {
                trace!(code, "plain acknowledgement");
                return None;
            }
            CallbackType::Unknown => {
                info!(seq, len = data.len(), ?data, "received unknown acknowledgement");
                return None;
            }
        };
        into_message(decoded, |event| SpheroMessage::Response { sequence, event })
    }

    fn handle_async(&self, code: u8, data: &[u8]) -> Option<SpheroMessage> {
        match AsyncId::try_from(code) {
            Ok(AsyncId::PreSleep) => {
                info!("sphero is tired, going to sleep soon");
                Some(SpheroMessage::Notification(SpheroEvent::PreSleep))
            }
            Ok(AsyncId::CollisionDetected) => into_message(
                decoder::collision(data).map(SpheroEvent::Collision),
                SpheroMessage::Notification,
            ),
            Err(code) => {
                info!(code, len = data.len(), ?data, "received unknown async message");
                None
            }
        }
    }
}

impl Protocol for SpheroProtocol {
    type Message = SpheroMessage;

    fn on_bytes(&mut self, bytes: &[u8]) -> Vec<SpheroMessage> {
        self.reader.push(bytes);
        let mut messages = Vec::new();
        while let Some(frame) = self.reader.next_frame() {
            if let Some(message) = self.handle_frame(&frame) {
                messages.push(message);
            }
        }
        messages
    }

    fn reset(&mut self) {
        self.reader.clear();
    }
}

/// Total frame length: the length byte counts data and checksum.
fn frame_length(buf: &[u8]) -> usize {
    buf.get(4).map_or(MINIMUM_FRAME_SIZE, |dlen| *dlen as usize + 5)
}

fn into_message(
    decoded: Result<SpheroEvent, DecodeError>,
    wrap: impl FnOnce(SpheroEvent) -> SpheroMessage,
) -> Option<SpheroMessage> {
    match decoded {
        Ok(event) => Some(wrap(event)),
        Err(e) => {
            warn!("dropping undecodable payload: {e}");
            None
        }
    }
}
