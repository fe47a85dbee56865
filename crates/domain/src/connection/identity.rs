use serde::{Deserialize, Serialize};

/// USB identity a transport reports about itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PortInfo {
    pub usb_vendor_id: Option<u16>,
    pub usb_product_id: Option<u16>,
}

impl PortInfo {
    pub fn new(usb_vendor_id: Option<u16>, usb_product_id: Option<u16>) -> Self {
        Self {
            usb_vendor_id,
            usb_product_id,
        }
    }
}

/// Vendor/product pair used to find a previously authorized port again.
///
/// Never used to authorize a new port. A missing field means the value was not captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceIdentity {
    #[serde(default)]
    pub vendor_id: Option<u16>,
    #[serde(default)]
    pub product_id: Option<u16>,
}

impl DeviceIdentity {
    pub fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id: Some(vendor_id),
            product_id: Some(product_id),
        }
    }

    /// Both halves present
    pub fn is_complete(&self) -> bool {
        self.vendor_id.is_some() && self.product_id.is_some()
    }

    /// An incomplete identity matches nothing
    pub fn matches(&self, info: &PortInfo) -> bool {
        match (self.vendor_id, self.product_id) {
            (Some(vendor_id), Some(product_id)) => {
                info.usb_vendor_id == Some(vendor_id) && info.usb_product_id == Some(product_id)
            }
            _ => false,
        }
    }
}

impl From<PortInfo> for DeviceIdentity {
    fn from(info: PortInfo) -> Self {
        Self {
            vendor_id: info.usb_vendor_id,
            product_id: info.usb_product_id,
        }
    }
}

impl std::fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.vendor_id, self.product_id) {
            (Some(v), Some(p)) => write!(f, "{:04X}:{:04X}", v, p),
            (Some(v), None) => write!(f, "{:04X}:????", v),
            (None, Some(p)) => write!(f, "????:{:04X}", p),
            (None, None) => f.write_str("unknown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_identity_matches_same_ids() {
        let identity = DeviceIdentity::new(0x0416, 0x5011);
        assert!(identity.matches(&PortInfo::new(Some(0x0416), Some(0x5011))));
        assert!(!identity.matches(&PortInfo::new(Some(0x0416), Some(0x5012))));
        assert!(!identity.matches(&PortInfo::new(None, None)));
    }

    #[test]
    fn test_incomplete_identity_matches_nothing() {
        let identity = DeviceIdentity {
            vendor_id: Some(5),
            product_id: None,
        };
        assert!(!identity.is_complete());
        assert!(!identity.matches(&PortInfo::new(Some(5), None)));
    }

    #[test]
    fn test_identity_json_shape() {
        let identity = DeviceIdentity::new(5, 9);
        let json = serde_json::to_value(identity).unwrap();
        assert_eq!(json, serde_json::json!({"vendorId": 5, "productId": 9}));

        let missing: DeviceIdentity = serde_json::from_str(r#"{"vendorId": 5}"#).unwrap();
        assert_eq!(missing.product_id, None);
    }

    #[test]
    fn test_display() {
        assert_eq!(DeviceIdentity::new(0x0416, 0x5011).to_string(), "0416:5011");
        assert_eq!(DeviceIdentity::default().to_string(), "unknown");
    }
}
