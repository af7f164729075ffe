//! Optional WebSocket feed publishing the live ramp state as JSON.

use log::{info, warn};
use serde::Serialize;
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;
use tungstenite::{Message, accept};

use crate::ramp::{CHANNELS, Channel, ControlState, SharedState, lock};

const PUBLISH_PERIOD_MS: u64 = 40;

#[derive(Debug, Clone, Serialize)]
pub struct ChannelStatus {
    pub pin: u8,
    pub output_level: u16,
    pub requested_rate: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusMessage {
    #[serde(rename = "type")]
    pub msg_type: &'static str,
    pub timestamp: i64,
    pub active: Channel,
    pub channels: Vec<ChannelStatus>,
}

pub fn snapshot(state: &ControlState, pins: [u8; CHANNELS]) -> StatusMessage {
    StatusMessage {
        msg_type: "status",
        timestamp: chrono::Utc::now().timestamp_millis(),
        active: state.active,
        channels: pins
            .iter()
            .zip(state.channels.iter())
            .map(|(&pin, ch)| ChannelStatus {
                pin,
                output_level: ch.output_level,
                requested_rate: ch.requested_rate,
            })
            .collect(),
    }
}

/// Binds the listener and serves clients from a background thread.
pub fn spawn_status_feed(port: u16, state: SharedState, pins: [u8; CHANNELS]) -> std::io::Result<()> {
    let server = TcpListener::bind(("0.0.0.0", port))?;
    info!("Status feed listening on port {}", port);

    thread::Builder::new().name("status-feed".into()).spawn(move || {
        for stream in server.incoming() {
            match stream {
                Ok(stream) => {
                    let state = SharedState::clone(&state);
                    thread::spawn(move || serve_client(stream, state, pins));
                }
                Err(e) => warn!("Status connection error: {}", e),
            }
        }
    })?;
    Ok(())
}

fn serve_client(stream: TcpStream, state: SharedState, pins: [u8; CHANNELS]) {
    let mut websocket = match accept(stream) {
        Ok(ws) => ws,
        Err(e) => {
            warn!("Status handshake error: {}", e);
            return;
        }
    };
    info!("Status client connected");

    loop {
        let message = snapshot(&lock(&state), pins);
        match serde_json::to_string(&message) {
            Ok(json) => {
                if websocket.send(Message::Text(json)).is_err() {
                    info!("Status client disconnected");
                    break;
                }
            }
            Err(e) => warn!("Status serialization error: {}", e),
        }
        thread::sleep(Duration::from_millis(PUBLISH_PERIOD_MS));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ramp::ChannelState;

    #[test]
    fn snapshot_pairs_pins_with_channels() {
        let state = ControlState {
            channels: [
                ChannelState { output_level: 45, requested_rate: 5 },
                ChannelState { output_level: 0, requested_rate: -1 },
            ],
            active: Channel::Channel2,
        };
        let json = serde_json::to_value(snapshot(&state, [5, 6])).unwrap();
        assert_eq!(json["type"], "status");
        assert_eq!(json["active"], "Channel2");
        assert_eq!(json["channels"][0]["pin"], 5);
        assert_eq!(json["channels"][0]["output_level"], 45);
        assert_eq!(json["channels"][1]["requested_rate"], -1);
    }
}
