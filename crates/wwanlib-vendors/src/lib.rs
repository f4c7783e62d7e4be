//! wwanlib-vendors: per-vendor capability records.
//!
//! Vendor divergence lives in data, not code: each supported modem family
//! is a factory function returning a fully populated
//! [`CapabilityRecord`](wwanlib_core::CapabilityRecord), and the layers
//! above consult the record instead of branching on vendor. Supported
//! families:
//!
//! | Record               | Bands        | Modes        | Dial        |
//! |----------------------|--------------|--------------|-------------|
//! | Generic 3GPP         | --           | --           | external    |
//! | Huawei E-series      | ^SYSCFG hex  | ^SYSCFG      | external    |
//! | ZTE MF-series        | +ZBANDI fold | +ZSNT        | external    |
//! | Ericsson F3607gw     | --           | +CFUN        | *ENAP       |

pub mod ericsson;
pub mod generic;
pub mod huawei;
pub mod zte;

use wwanlib_core::CapabilityRecord;

/// All known records, most specific first.
pub fn all_records() -> Vec<CapabilityRecord> {
    vec![
        huawei::e_series(),
        zte::mf_series(),
        ericsson::f3607gw(),
        generic::generic(),
    ]
}

/// Look a record up by USB vendor/product id.
///
/// Returns `None` for unknown hardware; callers that want a best-effort
/// session fall back to [`generic::generic()`] themselves.
pub fn select_record(vendor_id: u16, product_id: u16) -> Option<CapabilityRecord> {
    all_records()
        .into_iter()
        .find(|rec| rec.usb_ids.contains(&(vendor_id, product_id)))
}
