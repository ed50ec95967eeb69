//! WebAssembly bindings for the Tycoon client view.
//!
//! The browser never runs the rules; it feeds server broadcasts into a
//! [`ClientView`] and reads the projected room back out as JSON.

#[cfg(feature = "wasm")]
use wasm_bindgen::prelude::*;

#[cfg(feature = "wasm")]
use crate::view::{ClientView, RoomUpdate, ViewDelta};
#[cfg(feature = "wasm")]
use crate::snapshot::RoomSnapshot;

/// Initialize panic hook for better error messages in browser console
#[cfg(feature = "wasm")]
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// WASM-exposed read-only room view
#[cfg(feature = "wasm")]
#[wasm_bindgen]
pub struct WasmView {
    view: ClientView,
}

#[cfg(feature = "wasm")]
#[wasm_bindgen]
impl WasmView {
    /// Create an empty view, optionally for a seated player
    #[wasm_bindgen(constructor)]
    pub fn new(player_id: Option<String>) -> Result<WasmView, JsValue> {
        let me = match player_id {
            Some(id) => Some(
                id.parse()
                    .map_err(|e| JsValue::from_str(&format!("Invalid player id: {}", e)))?,
            ),
            None => None,
        };
        Ok(WasmView {
            view: ClientView::new(me),
        })
    }

    /// Apply a full room snapshot, returns the outcome as JSON
    #[wasm_bindgen(js_name = applySnapshot)]
    pub fn apply_snapshot(&mut self, room_json: &str) -> Result<String, JsValue> {
        let snapshot: RoomSnapshot = serde_json::from_str(room_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid room JSON: {}", e)))?;
        let outcome = self.view.apply_snapshot(snapshot);
        Ok(serde_json::to_string(&outcome).unwrap_or_else(|_| "null".to_string()))
    }

    /// Apply a versioned delta, returns the outcome as JSON
    #[wasm_bindgen(js_name = applyDelta)]
    pub fn apply_delta(&mut self, version: u64, delta_json: &str) -> Result<String, JsValue> {
        let delta: ViewDelta = serde_json::from_str(delta_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid delta JSON: {}", e)))?;
        let outcome = self.view.apply_delta(version, delta);
        Ok(serde_json::to_string(&outcome).unwrap_or_else(|_| "null".to_string()))
    }

    /// Feed a raw server message; returns the outcome as JSON, or `null` when
    /// the message carries no room state
    #[wasm_bindgen(js_name = applyMessage)]
    pub fn apply_message(&mut self, message_json: &str) -> Result<String, JsValue> {
        let update: RoomUpdate = serde_json::from_str(message_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid message JSON: {}", e)))?;
        match self.view.apply_update(update) {
            Some(outcome) => {
                Ok(serde_json::to_string(&outcome).unwrap_or_else(|_| "null".to_string()))
            }
            None => Ok("null".to_string()),
        }
    }

    /// Get the projected room as JSON
    #[wasm_bindgen(js_name = getRoom)]
    pub fn get_room(&self) -> String {
        match self.view.room() {
            Some(room) => serde_json::to_string(room).unwrap_or_else(|_| "null".to_string()),
            None => "null".to_string(),
        }
    }

    #[wasm_bindgen(js_name = getVersion)]
    pub fn get_version(&self) -> Option<u64> {
        self.view.version()
    }

    #[wasm_bindgen(js_name = isMyTurn)]
    pub fn is_my_turn(&self) -> bool {
        self.view.is_my_turn()
    }

    /// Get the current phase as a string
    #[wasm_bindgen(js_name = getPhase)]
    pub fn get_phase(&self) -> String {
        self.view
            .room()
            .map(|r| r.phase.to_string())
            .unwrap_or_else(|| "Unknown".to_string())
    }

    /// Get a property's state as JSON
    #[wasm_bindgen(js_name = getProperty)]
    pub fn get_property(&self, id: &str) -> String {
        if let Some(p) = self.view.property(id) {
            serde_json::to_string(p).unwrap_or_else(|_| "{}".to_string())
        } else {
            "null".to_string()
        }
    }
}
