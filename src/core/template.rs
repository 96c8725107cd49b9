//! Starter sheets loaded by New

use serde_json::json;

use super::surface::{encode_sheet, DeviceKind};

/// Grid size of the blank sheet for a device (columns, rows)
fn grid_for(device: DeviceKind) -> (u32, u32) {
    match device {
        DeviceKind::Desktop => (10, 30),
        DeviceKind::IPad => (8, 20),
        DeviceKind::IPhone | DeviceKind::Android => (4, 15),
    }
}

/// Serialized multi-sheet container with one empty sheet
pub fn blank_sheet(device: DeviceKind) -> String {
    let (cols, rows) = grid_for(device);
    let savestr = format!("version:1.5\nsheet:c:{}:r:{}\n", cols, rows);
    json!({
        "numsheets": 1,
        "currentid": "sheet1",
        "currentname": "sheet1",
        "sheetArr": {
            "sheet1": {
                "sheetstr": { "savestr": savestr },
                "name": "sheet1",
                "hidden": "0"
            }
        }
    })
    .to_string()
}

/// Blank sheet in stored form, ready for a content sink
pub fn default_template(device: DeviceKind) -> String {
    encode_sheet(&blank_sheet(device))
}
