//! BLE transport adapter.
//!
//! GATT server exposing the command/telemetry protocol.  This adapter
//! is deliberately thin: the reception callback only decodes frames and
//! pushes them through [`proto::channels`](crate::proto::channels); all
//! safety logic stays in the control-loop task.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: Bluedroid BLE GATT server via
//!   `esp_idf_svc::sys` raw bindings.
//! - **all other targets**: simulation stubs for host-side tests.
//!
//! ## GATT service layout
//!
//! | Characteristic | UUID                                   | Perms        |
//! |----------------|----------------------------------------|--------------|
//! | Command        | `12345678-1234-1234-1234-123456789abd` | Write        |
//! | Telemetry      | `12345678-1234-1234-1234-123456789abe` | Notify (CCC) |
//!
//! A malformed command write is rejected at the ATT level (invalid
//! attribute length / value not allowed) and never reaches the mailbox.

use core::fmt;

use log::{info, warn};

use crate::proto::channels::{push_link_event, submit_command, LinkEvent};
use crate::proto::frame::{self, DecodeError};

// ───────────────────────────────────────────────────────────────
// Constants
// ───────────────────────────────────────────────────────────────

pub const SERVICE_UUID: u128 = 0x12345678_1234_1234_1234_123456789abc;
pub const CHAR_COMMAND: u128 = 0x12345678_1234_1234_1234_123456789abd;
pub const CHAR_TELEMETRY: u128 = 0x12345678_1234_1234_1234_123456789abe;

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BleError {
    StackInitFailed,
    NotConnected,
    NotifyFailed,
}

impl fmt::Display for BleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StackInitFailed => write!(f, "BLE stack initialisation failed"),
            Self::NotConnected => write!(f, "no central connected"),
            Self::NotifyFailed => write!(f, "GATT notify failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BleState {
    Idle,
    Advertising,
    Connected,
    Failed,
}

// ───────────────────────────────────────────────────────────────
// Shared write-path entry point (both targets)
// ───────────────────────────────────────────────────────────────

/// Handle a raw write to the command characteristic.
///
/// Runs in the reception context.  Decodes, hands the frame to the
/// single-slot mailbox, and reports the frame-level verdict so the
/// platform glue can reject the ATT write.  No safety state is touched
/// here.
pub fn on_command_write(data: &[u8]) -> Result<(), DecodeError> {
    match frame::decode(data) {
        Ok(cmd) => {
            submit_command(cmd);
            Ok(())
        }
        Err(e) => {
            warn!("BLE: command write rejected: {e}");
            Err(e)
        }
    }
}

// ───────────────────────────────────────────────────────────────
// espidf: Bluedroid statics and callbacks
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
mod platform {
    use core::sync::atomic::{AtomicU32, Ordering};

    use esp_idf_svc::sys::*;

    use super::*;

    pub static GATTS_IF: AtomicU32 = AtomicU32::new(0);
    pub static CONN_ID: AtomicU32 = AtomicU32::new(u32::MAX);
    pub static SVC_HANDLE: AtomicU32 = AtomicU32::new(0);
    pub static CMD_CHAR_HANDLE: AtomicU32 = AtomicU32::new(0);
    pub static TEL_CHAR_HANDLE: AtomicU32 = AtomicU32::new(0);
    pub static TEL_CCC_HANDLE: AtomicU32 = AtomicU32::new(0);
    /// Sequences the characteristic registration chain (1=cmd, 2=tel, 3=ccc).
    pub static CHAR_STEP: AtomicU32 = AtomicU32::new(0);

    pub fn uuid128(raw: u128) -> esp_bt_uuid_t {
        let mut uuid = esp_bt_uuid_t {
            len: ESP_UUID_LEN_128 as u16,
            uuid: esp_bt_uuid_t__bindgen_ty_1::default(),
        };
        // Bluedroid stores 128-bit UUIDs least-significant byte first.
        uuid.uuid.uuid128 = raw.to_le_bytes();
        uuid
    }

    pub unsafe fn start_advertising() {
        let mut adv_params = esp_ble_adv_params_t {
            adv_int_min: 0x20,
            adv_int_max: 0x40,
            adv_type: esp_ble_adv_type_t_ADV_TYPE_IND,
            own_addr_type: esp_ble_addr_type_t_BLE_ADDR_TYPE_PUBLIC,
            channel_map: esp_ble_adv_channel_t_ADV_CHNL_ALL,
            adv_filter_policy: esp_ble_adv_filter_t_ADV_FILTER_ALLOW_SCAN_ANY_CON_ANY,
            ..core::mem::zeroed()
        };
        esp_ble_gap_start_advertising(&mut adv_params);
    }

    unsafe fn add_char(svc_handle: u16, uuid: u128, perm: u16, props: u8) {
        let mut char_uuid = uuid128(uuid);
        esp_ble_gatts_add_char(
            svc_handle,
            &mut char_uuid,
            perm as esp_gatt_perm_t,
            props as esp_gatt_char_prop_t,
            core::ptr::null_mut(),
            core::ptr::null_mut(),
        );
    }

    pub unsafe extern "C" fn gap_event_handler(
        event: esp_gap_ble_cb_event_t,
        _param: *mut esp_ble_gap_cb_param_t,
    ) {
        match event {
            esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_START_COMPLETE_EVT => {
                log::info!("BLE GAP: advertising started");
            }
            esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_STOP_COMPLETE_EVT => {
                log::info!("BLE GAP: advertising stopped");
            }
            _ => {}
        }
    }

    pub unsafe extern "C" fn gatts_event_handler(
        event: esp_gatts_cb_event_t,
        gatts_if: esp_gatt_if_t,
        param: *mut esp_ble_gatts_cb_param_t,
    ) {
        GATTS_IF.store(u32::from(gatts_if), Ordering::Relaxed);

        match event {
            esp_gatts_cb_event_t_ESP_GATTS_REG_EVT => {
                let mut svc_id = esp_gatt_srvc_id_t {
                    id: esp_gatt_id_t {
                        uuid: uuid128(SERVICE_UUID),
                        inst_id: 0,
                    },
                    is_primary: true,
                };
                esp_ble_gatts_create_service(gatts_if, &mut svc_id, 8);
            }
            esp_gatts_cb_event_t_ESP_GATTS_CREATE_EVT => {
                let p = unsafe { &(*param).create };
                let svc_handle = p.service_handle;
                SVC_HANDLE.store(u32::from(svc_handle), Ordering::Relaxed);
                esp_ble_gatts_start_service(svc_handle);
                CHAR_STEP.store(1, Ordering::Relaxed);
                unsafe {
                    add_char(
                        svc_handle,
                        CHAR_COMMAND,
                        ESP_GATT_PERM_WRITE as u16,
                        (ESP_GATT_CHAR_PROP_BIT_WRITE | ESP_GATT_CHAR_PROP_BIT_WRITE_NR) as u8,
                    );
                }
            }
            esp_gatts_cb_event_t_ESP_GATTS_ADD_CHAR_EVT => {
                let p = unsafe { &(*param).add_char };
                let handle = p.attr_handle;
                let svc_handle = SVC_HANDLE.load(Ordering::Relaxed) as u16;
                match CHAR_STEP.load(Ordering::Relaxed) {
                    1 => {
                        CMD_CHAR_HANDLE.store(u32::from(handle), Ordering::Relaxed);
                        CHAR_STEP.store(2, Ordering::Relaxed);
                        unsafe {
                            add_char(
                                svc_handle,
                                CHAR_TELEMETRY,
                                0,
                                ESP_GATT_CHAR_PROP_BIT_NOTIFY as u8,
                            );
                        }
                    }
                    2 => {
                        TEL_CHAR_HANDLE.store(u32::from(handle), Ordering::Relaxed);
                        CHAR_STEP.store(3, Ordering::Relaxed);
                        // Client Characteristic Configuration descriptor —
                        // the peer writes it to enable notifications.
                        let mut ccc_uuid = esp_bt_uuid_t {
                            len: ESP_UUID_LEN_16 as u16,
                            uuid: esp_bt_uuid_t__bindgen_ty_1 {
                                uuid16: ESP_GATT_UUID_CHAR_CLIENT_CONFIG as u16,
                            },
                        };
                        unsafe {
                            esp_ble_gatts_add_char_descr(
                                svc_handle,
                                &mut ccc_uuid,
                                (ESP_GATT_PERM_READ | ESP_GATT_PERM_WRITE) as esp_gatt_perm_t,
                                core::ptr::null_mut(),
                                core::ptr::null_mut(),
                            );
                        }
                    }
                    _ => {}
                }
            }
            esp_gatts_cb_event_t_ESP_GATTS_ADD_CHAR_DESCR_EVT => {
                let p = unsafe { &(*param).add_char_descr };
                TEL_CCC_HANDLE.store(u32::from(p.attr_handle), Ordering::Relaxed);
                log::info!("BLE GATTS: service registered");
            }
            esp_gatts_cb_event_t_ESP_GATTS_CONNECT_EVT => {
                let p = unsafe { &(*param).connect };
                CONN_ID.store(u32::from(p.conn_id), Ordering::Relaxed);
                log::info!("BLE GATTS: central connected (conn_id={})", p.conn_id);
                push_link_event(LinkEvent::Connected);
            }
            esp_gatts_cb_event_t_ESP_GATTS_DISCONNECT_EVT => {
                CONN_ID.store(u32::MAX, Ordering::Relaxed);
                log::info!("BLE GATTS: central disconnected");
                push_link_event(LinkEvent::Disconnected);
                unsafe { start_advertising() };
            }
            esp_gatts_cb_event_t_ESP_GATTS_WRITE_EVT => {
                let p = unsafe { &(*param).write };
                let data = unsafe { core::slice::from_raw_parts(p.value, p.len as usize) };
                let handle = u32::from(p.handle);

                let status = if handle == CMD_CHAR_HANDLE.load(Ordering::Relaxed) {
                    match on_command_write(data) {
                        Ok(()) => esp_gatt_status_t_ESP_GATT_OK,
                        Err(DecodeError::UnsupportedVersion(_)) => {
                            esp_gatt_status_t_ESP_GATT_NOT_ALLOWED
                        }
                        Err(_) => esp_gatt_status_t_ESP_GATT_INVALID_ATTR_LEN,
                    }
                } else if handle == TEL_CCC_HANDLE.load(Ordering::Relaxed) {
                    let enabled = data.len() >= 2 && u16::from_le_bytes([data[0], data[1]]) == 1;
                    push_link_event(LinkEvent::NotifyEnabled(enabled));
                    esp_gatt_status_t_ESP_GATT_OK
                } else {
                    esp_gatt_status_t_ESP_GATT_WRITE_NOT_PERMIT
                };

                if p.need_rsp {
                    unsafe {
                        esp_ble_gatts_send_response(
                            gatts_if,
                            p.conn_id,
                            p.trans_id,
                            status,
                            core::ptr::null_mut(),
                        );
                    }
                }
            }
            _ => {}
        }
    }
}

// ───────────────────────────────────────────────────────────────
// BleAdapter
// ───────────────────────────────────────────────────────────────

pub struct BleAdapter {
    state: BleState,
    device_name: heapless::String<24>,
}

impl BleAdapter {
    pub fn new(device_name: heapless::String<24>) -> Self {
        Self {
            state: BleState::Idle,
            device_name,
        }
    }

    pub fn state(&self) -> BleState {
        self.state
    }

    /// Bring up the stack and start advertising.
    pub fn start(&mut self) -> Result<(), BleError> {
        self.platform_start()?;
        self.state = BleState::Advertising;
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_start(&mut self) -> Result<(), BleError> {
        use esp_idf_svc::sys::*;
        unsafe {
            // BLE-only mode: release classic BT memory.
            esp_bt_controller_mem_release(esp_bt_mode_t_ESP_BT_MODE_CLASSIC_BT);

            let mut bt_cfg = esp_bt_controller_config_t::default();
            if esp_bt_controller_init(&mut bt_cfg) != ESP_OK {
                self.state = BleState::Failed;
                return Err(BleError::StackInitFailed);
            }
            if esp_bt_controller_enable(esp_bt_mode_t_ESP_BT_MODE_BLE) != ESP_OK
                || esp_bluedroid_init() != ESP_OK
                || esp_bluedroid_enable() != ESP_OK
            {
                self.state = BleState::Failed;
                return Err(BleError::StackInitFailed);
            }

            esp_ble_gap_register_callback(Some(platform::gap_event_handler));
            esp_ble_gatts_register_callback(Some(platform::gatts_event_handler));
            esp_ble_gatts_app_register(0);

            let name = self.device_name.as_bytes();
            esp_ble_gap_set_device_name(name.as_ptr().cast());

            platform::start_advertising();
        }
        info!("BLE(espidf): advertising as '{}'", self.device_name);
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_start(&mut self) -> Result<(), BleError> {
        info!(
            "BLE(sim): advertising '{}' (service {:032x})",
            self.device_name, SERVICE_UUID
        );
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Telemetry sink over GATT notify
// ───────────────────────────────────────────────────────────────

/// [`TelemetrySink`](crate::app::ports::TelemetrySink) implementation
/// that notifies the telemetry characteristic.
pub struct BleTelemetrySink {
    #[cfg(not(target_os = "espidf"))]
    pub sent: usize,
}

impl BleTelemetrySink {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            sent: 0,
        }
    }
}

impl Default for BleTelemetrySink {
    fn default() -> Self {
        Self::new()
    }
}

impl crate::app::ports::TelemetrySink for BleTelemetrySink {
    type Error = BleError;

    #[cfg(target_os = "espidf")]
    fn notify(&mut self, frame: &[u8]) -> Result<(), BleError> {
        use core::sync::atomic::Ordering;
        use esp_idf_svc::sys::*;

        let conn_id = platform::CONN_ID.load(Ordering::Relaxed);
        let handle = platform::TEL_CHAR_HANDLE.load(Ordering::Relaxed);
        if conn_id == u32::MAX || handle == 0 {
            return Err(BleError::NotConnected);
        }

        let ret = unsafe {
            esp_ble_gatts_send_indicate(
                platform::GATTS_IF.load(Ordering::Relaxed) as u8,
                conn_id as u16,
                handle as u16,
                frame.len() as u16,
                frame.as_ptr() as *mut u8,
                false, // notify, no confirmation
            )
        };
        if ret == ESP_OK {
            Ok(())
        } else {
            Err(BleError::NotifyFailed)
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn notify(&mut self, frame: &[u8]) -> Result<(), BleError> {
        log::debug!("BLE(sim): notify {} bytes", frame.len());
        self.sent += 1;
        Ok(())
    }
}
