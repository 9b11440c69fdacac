//! Reader attribute identifiers and the catalog fetched for every card.
//!
//! An identifier is `class << 16 | tag`. The catalog is static data; its
//! order is the order attributes are fetched and reported in.

use std::fmt;

use crate::ffi;

/// A class of attributes.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeClass {
    VendorInfo = ffi::SCARD_CLASS_VENDOR_INFO as u32,
    Communications = ffi::SCARD_CLASS_COMMUNICATIONS as u32,
    Protocol = ffi::SCARD_CLASS_PROTOCOL as u32,
    PowerMgmt = ffi::SCARD_CLASS_POWER_MGMT as u32,
    Security = ffi::SCARD_CLASS_SECURITY as u32,
    Mechanical = ffi::SCARD_CLASS_MECHANICAL as u32,
    VendorDefined = ffi::SCARD_CLASS_VENDOR_DEFINED as u32,
    IfdProtocol = ffi::SCARD_CLASS_IFD_PROTOCOL as u32,
    IccState = ffi::SCARD_CLASS_ICC_STATE as u32,
    System = ffi::SCARD_CLASS_SYSTEM as u32,
}

impl AttributeClass {
    fn from_raw(raw: u32) -> Option<AttributeClass> {
        const ALL: [AttributeClass; 10] = [
            AttributeClass::System,
            AttributeClass::VendorInfo,
            AttributeClass::Communications,
            AttributeClass::Protocol,
            AttributeClass::PowerMgmt,
            AttributeClass::Security,
            AttributeClass::Mechanical,
            AttributeClass::VendorDefined,
            AttributeClass::IfdProtocol,
            AttributeClass::IccState,
        ];
        ALL.iter().copied().find(|&class| class as u32 == raw)
    }
}

/// A numeric attribute identifier as passed to `SCardGetAttrib`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttributeId(u32);

impl AttributeId {
    pub const fn new(class: AttributeClass, tag: u16) -> AttributeId {
        AttributeId((class as u32) << 16 | tag as u32)
    }

    pub const fn from_raw(raw: u32) -> AttributeId {
        AttributeId(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub fn class(self) -> Option<AttributeClass> {
        AttributeClass::from_raw(self.0 >> 16)
    }

    pub const fn tag(self) -> u16 {
        (self.0 & 0xFFFF) as u16
    }
}

impl fmt::Debug for AttributeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AttributeId({:#010x})", self.0)
    }
}

/// A catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Attribute {
    pub id: AttributeId,
    pub name: &'static str,
}

macro_rules! attributes {
    ($($name:ident = ($class:ident, $tag:expr);)*) => {
        $(
            pub const $name: AttributeId = AttributeId::new(AttributeClass::$class, $tag);
        )*

        static CATALOG: &[Attribute] = &[
            $(Attribute { id: $name, name: concat!("SCARD_ATTR_", stringify!($name)) },)*
        ];
    };
}

attributes! {
    VENDOR_NAME = (VendorInfo, 0x0100);
    VENDOR_IFD_TYPE = (VendorInfo, 0x0101);
    VENDOR_IFD_VERSION = (VendorInfo, 0x0102);
    VENDOR_IFD_SERIAL_NO = (VendorInfo, 0x0103);
    CHANNEL_ID = (Communications, 0x0110);
    ASYNC_PROTOCOL_TYPES = (Protocol, 0x0120);
    DEFAULT_CLK = (Protocol, 0x0121);
    MAX_CLK = (Protocol, 0x0122);
    DEFAULT_DATA_RATE = (Protocol, 0x0123);
    MAX_DATA_RATE = (Protocol, 0x0124);
    MAX_IFSD = (Protocol, 0x0125);
    SYNC_PROTOCOL_TYPES = (Protocol, 0x0126);
    POWER_MGMT_SUPPORT = (PowerMgmt, 0x0131);
    USER_TO_CARD_AUTH_DEVICE = (Security, 0x0140);
    USER_AUTH_INPUT_DEVICE = (Security, 0x0142);
    CHARACTERISTICS = (Mechanical, 0x0150);
    MAXINPUT = (VendorDefined, 0xA007);
    CURRENT_PROTOCOL_TYPE = (IfdProtocol, 0x0201);
    CURRENT_CLK = (IfdProtocol, 0x0202);
    CURRENT_F = (IfdProtocol, 0x0203);
    CURRENT_D = (IfdProtocol, 0x0204);
    CURRENT_N = (IfdProtocol, 0x0205);
    CURRENT_W = (IfdProtocol, 0x0206);
    CURRENT_IFSC = (IfdProtocol, 0x0207);
    CURRENT_IFSD = (IfdProtocol, 0x0208);
    CURRENT_BWT = (IfdProtocol, 0x0209);
    CURRENT_CWT = (IfdProtocol, 0x020a);
    CURRENT_EBC_ENCODING = (IfdProtocol, 0x020b);
    EXTENDED_BWT = (IfdProtocol, 0x020c);
    ICC_PRESENCE = (IccState, 0x0300);
    ICC_INTERFACE_STATUS = (IccState, 0x0301);
    CURRENT_IO_STATE = (IccState, 0x0302);
    ATR_STRING = (IccState, 0x0303);
    ICC_TYPE_PER_ATR = (IccState, 0x0304);
    DEVICE_UNIT = (System, 0x0001);
    DEVICE_IN_USE = (System, 0x0002);
    DEVICE_FRIENDLY_NAME = (System, 0x0003);
    DEVICE_SYSTEM_NAME = (System, 0x0004);
    SUPRESS_T1_IFS_REQUEST = (System, 0x0007);
}

/// Every attribute fetched from a card, in fetch order.
pub fn catalog() -> &'static [Attribute] {
    CATALOG
}

pub fn lookup(id: AttributeId) -> Option<&'static Attribute> {
    CATALOG.iter().find(|attribute| attribute.id == id)
}
