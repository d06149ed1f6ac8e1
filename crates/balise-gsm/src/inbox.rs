//! SMS store on the SIM card: listing, reading and deleting messages.
//!
//! The inbox only parses modem replies; it does not interpret message text.
//! Every parse failure is logged and mapped to "nothing there".

use std::time::Duration;

use balise_common::models::SmsMessage;

use crate::channel::AtChannel;

/// Upper bound on messages handled in a single pass.
pub const MAX_MESSAGES_PER_PASS: usize = 20;

pub struct SmsInbox<'a, C: AtChannel + ?Sized> {
    channel: &'a mut C,
    wait: Duration,
}

impl<'a, C: AtChannel + ?Sized> SmsInbox<'a, C> {
    pub fn new(channel: &'a mut C, wait: Duration) -> Self {
        SmsInbox { channel, wait }
    }

    /// Number of messages in the SIM store, `None` when the modem does not say.
    pub fn count(&mut self) -> Option<usize> {
        match self.channel.send_command("+CPMS=\"SM\"", self.wait) {
            Ok(reply) => {
                let count = parse_cpms(&reply);
                if count.is_none() {
                    tracing::warn!(reply = %reply, "unreadable SMS store status");
                }
                count
            }
            Err(e) => {
                tracing::warn!(error = %e, "SMS count query failed");
                None
            }
        }
    }

    /// Indexes of stored messages, in listing order.
    pub fn list_indexes(&mut self) -> Vec<u32> {
        match self.channel.send_command("+CMGL=\"ALL\"", self.wait) {
            Ok(reply) => parse_cmgl(&reply),
            Err(e) => {
                tracing::warn!(error = %e, "SMS listing failed");
                Vec::new()
            }
        }
    }

    pub fn read(&mut self, index: u32) -> Option<SmsMessage> {
        let reply = match self.channel.send_command(&format!("+CMGR={index}"), self.wait) {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(index, error = %e, "SMS read failed");
                return None;
            }
        };
        let message = parse_cmgr(index, &reply);
        if message.is_none() {
            tracing::error!(index, reply = %reply, "cannot parse stored SMS");
        }
        message
    }

    pub fn delete(&mut self, index: u32) -> bool {
        self.delete_with(&format!("+CMGD={index},0"))
    }

    /// Delete every stored message. Safe to call on an empty store.
    pub fn delete_all(&mut self) -> bool {
        self.delete_with("+CMGD=1,4")
    }

    fn delete_with(&mut self, command: &str) -> bool {
        match self.channel.send_command(command, self.wait) {
            Ok(reply) if reply.contains("ERROR") => {
                tracing::warn!(command, reply = %reply, "SMS deletion rejected");
                false
            }
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(command, error = %e, "SMS deletion failed");
                false
            }
        }
    }
}

// ── Reply parsing ───────────────────────────────────────────────────

/// `+CPMS: <used>,<total>,...` → `used`.
pub fn parse_cpms(reply: &str) -> Option<usize> {
    let line = reply.lines().find_map(|l| l.trim().strip_prefix("+CPMS:"))?;
    line.split(',').next()?.trim().parse().ok()
}

/// Leading index of each `+CMGL:` line, deduplicated, order preserved.
pub fn parse_cmgl(reply: &str) -> Vec<u32> {
    let mut indexes = Vec::new();
    for line in reply.lines() {
        let Some(rest) = line.trim().strip_prefix("+CMGL:") else {
            continue;
        };
        match rest.split(',').next().map(str::trim).map(str::parse::<u32>) {
            Some(Ok(index)) => {
                if !indexes.contains(&index) {
                    indexes.push(index);
                }
            }
            _ => tracing::debug!(line = %line, "skipping malformed listing line"),
        }
    }
    indexes
}

/// `+CMGR: "<stat>","<sender>",...` followed by the message text up to `OK`.
///
/// With detailed headers on (`+CSDH=1`) the eighth field is the data coding
/// scheme; only a UCS2 scheme gets its hex body decoded.
pub fn parse_cmgr(index: u32, reply: &str) -> Option<SmsMessage> {
    let mut lines = reply.lines().skip_while(|l| !l.trim_start().starts_with("+CMGR:"));
    let header = lines.next()?.trim_start().strip_prefix("+CMGR:")?;
    let fields = header_fields(header);
    let sender = fields.get(1)?.clone();
    let ucs2 = fields
        .get(7)
        .and_then(|dcs| dcs.parse::<u8>().ok())
        .is_some_and(is_ucs2_scheme);

    let text: Vec<&str> = lines.take_while(|l| l.trim() != "OK").collect();
    let body = text.join("\n").trim().to_string();
    let body = if ucs2 { decode_ucs2(&body).unwrap_or(body) } else { body };
    Some(SmsMessage {
        sender,
        body,
        index,
    })
}

/// Comma-separated header fields; commas inside quotes do not split and
/// quotes are dropped.
fn header_fields(header: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for c in header.chars() {
        match c {
            '"' => quoted = !quoted,
            ',' if !quoted => fields.push(std::mem::take(&mut current).trim().to_string()),
            _ => current.push(c),
        }
    }
    fields.push(current.trim().to_string());
    fields
}

/// GSM 03.38 general data coding group with the UCS2 alphabet.
fn is_ucs2_scheme(dcs: u8) -> bool {
    dcs & 0xC0 == 0 && dcs & 0x0C == 0x08
}

/// Decode a body sent as UCS-2 hex (`0066006900...`). `None` when the text is
/// not in that form.
pub fn decode_ucs2(text: &str) -> Option<String> {
    if text.is_empty() || text.len() % 4 != 0 || !text.is_ascii() {
        return None;
    }
    let mut units = Vec::with_capacity(text.len() / 4);
    for group in text.as_bytes().chunks(4) {
        let group = std::str::from_utf8(group).ok()?;
        if !group.starts_with('0') {
            return None;
        }
        units.push(u16::from_str_radix(group, 16).ok()?);
    }
    String::from_utf16(&units).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpms_count() {
        assert_eq!(parse_cpms("+CPMS: 3,30,3,30,3,30\r\n\r\nOK"), Some(3));
        assert_eq!(parse_cpms("+CPMS: 0,30,0,30,0,30"), Some(0));
        assert_eq!(parse_cpms("ERROR"), None);
        assert_eq!(parse_cpms("+CPMS: x,30"), None);
    }

    #[test]
    fn listing_dedupes_and_keeps_order() {
        let reply = "+CMGL: 4,\"REC READ\",\"+33611111111\"\r\nfin=10\r\n\
                     +CMGL: 2,\"REC UNREAD\",\"+33622222222\"\r\nsite?\r\n\
                     +CMGL: bogus\r\n\
                     +CMGL: 4,\"REC READ\",\"+33611111111\"\r\nfin=10\r\n\r\nOK";
        assert_eq!(parse_cmgl(reply), vec![4, 2]);
        assert!(parse_cmgl("OK").is_empty());
    }

    #[test]
    fn cmgr_sender_and_body() {
        let reply = "+CMGR: \"REC UNREAD\",\"+33612345678\",\"\",\"24/03/17,14:05:09+04\"\r\n\
                     altitude=1850\r\n\r\nOK";
        let msg = parse_cmgr(7, reply).unwrap();
        assert_eq!(msg.sender, "+33612345678");
        assert_eq!(msg.body, "altitude=1850");
        assert_eq!(msg.index, 7);
    }

    #[test]
    fn cmgr_error_is_none() {
        assert!(parse_cmgr(1, "+CMS ERROR: 321").is_none());
        assert!(parse_cmgr(1, "+CMGR: \"REC READ\"").is_none());
    }

    #[test]
    fn ucs2_scheme_decodes_body() {
        let reply = "+CMGR: \"REC UNREAD\",\"+33612345678\",\"\",\"24/03/17,14:05:09+04\",145,4,0,8,\"+33609001390\",145,12\r\n\
                     00660069006E003D00310030\r\n\r\nOK";
        let msg = parse_cmgr(3, reply).unwrap();
        assert_eq!(msg.sender, "+33612345678");
        assert_eq!(msg.body, "fin=10");
    }

    #[test]
    fn digit_body_in_gsm_alphabet_is_kept() {
        let detailed = "+CMGR: \"REC UNREAD\",\"+33612345678\",\"\",\"24/03/17,14:05:09+04\",145,4,0,0,\"+33609001390\",145,4\r\n\
                        0612\r\n\r\nOK";
        assert_eq!(parse_cmgr(1, detailed).unwrap().body, "0612");
        let short = "+CMGR: \"REC UNREAD\",\"+33612345678\",\"\",\"24/03/17,14:05:09+04\"\r\n0612\r\n\r\nOK";
        assert_eq!(parse_cmgr(1, short).unwrap().body, "0612");
    }

    #[test]
    fn ucs2_scheme_detection() {
        assert!(is_ucs2_scheme(0x08));
        assert!(is_ucs2_scheme(0x18));
        assert!(!is_ucs2_scheme(0x00));
        assert!(!is_ucs2_scheme(0x04));
        assert!(!is_ucs2_scheme(0xF8));
    }

    #[test]
    fn ucs2_bodies_are_decoded() {
        assert_eq!(decode_ucs2("00660069006E003D0031003000"), None);
        assert_eq!(decode_ucs2("00660069006E003D00310030").as_deref(), Some("fin=10"));
        assert_eq!(decode_ucs2("00E9"), Some("é".to_string()));
        assert_eq!(decode_ucs2("fin=10"), None);
        assert_eq!(decode_ucs2("1234"), None);
    }
}
