//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the browser client and the API
//! server. The socket is a push channel for notices and workflow state; all
//! mutations go through the REST endpoints.

use serde::{Deserialize, Serialize};
use textbook_core::{NoticeLevel, Step, StoreSnapshot};

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================

#[derive(Deserialize, Debug, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Asks the server to resend the current workflow state.
    RefreshState,
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A user-visible notice raised by the project store.
    Notice { level: NoticeLevel, message: String },

    /// The current workflow position and busy flag.
    State {
        step: Step,
        busy: bool,
        active_project_id: Option<String>,
    },

    /// Reports a protocol error to the client.
    Error { message: String },
}

impl ServerMessage {
    pub fn state_of(snapshot: &StoreSnapshot) -> Self {
        ServerMessage::State {
            step: snapshot.step,
            busy: snapshot.busy,
            active_project_id: snapshot.active_project.as_ref().map(|p| p.id.clone()),
        }
    }
}
