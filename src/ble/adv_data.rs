use heapless::Vec;

/// Maximum legacy advertising payload.
pub const ADV_DATA_MAX: usize = 31;

/// AD type: Flags.
const AD_FLAGS: u8 = 0x01;
/// AD type: Shortened Local Name.
const AD_SHORT_NAME: u8 = 0x08;
/// AD type: Complete Local Name.
const AD_COMPLETE_NAME: u8 = 0x09;

/// LE General Discoverable | BR/EDR Not Supported.
const FLAGS_GENERAL_DISC_NO_BREDR: u8 = 0x06;

/// Build the advertising payload: flags followed by the device name.
///
/// If the name does not fit the 31-byte limit it is cut at a character
/// boundary and advertised as a shortened local name.
pub fn build_advertisement(name: &str) -> Vec<u8, ADV_DATA_MAX> {
    let mut data = Vec::new();
    let flags = data.extend_from_slice(&[0x02, AD_FLAGS, FLAGS_GENERAL_DISC_NO_BREDR]);
    debug_assert!(flags.is_ok());

    // length byte + type byte
    let room = ADV_DATA_MAX - data.len() - 2;
    let mut end = name.len().min(room);
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    if end == 0 {
        return data;
    }

    let ad_type = if end == name.len() {
        AD_COMPLETE_NAME
    } else {
        AD_SHORT_NAME
    };
    // `end <= room`, so header and name fill the payload at most exactly.
    let name_ad = data
        .extend_from_slice(&[end as u8 + 1, ad_type])
        .and_then(|()| data.extend_from_slice(&name.as_bytes()[..end]));
    debug_assert!(name_ad.is_ok(), "name AD exceeds {} bytes", ADV_DATA_MAX);
    data
}
