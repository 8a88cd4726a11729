//! VLESS request header parsing and serialization.
//!
//! The parser is incremental: it never reads past what the header itself
//! declares, and when the buffer is too short it reports the minimum total
//! number of bytes required for the next decoding stage.
//!
//! Wire format:
//!
//! ```text
//! [version][16-byte id][extra len][extra ...][command][port BE u16][atyp][address][payload ...]
//! ```
//!
//! The response prefix is always `[version, 0]`.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use bytes::BytesMut;

/// Client identifier length in bytes.
pub const USER_ID_LEN: usize = 16;
/// Length of the response prefix written before any download payload.
pub const RESPONSE_PREFIX_LEN: usize = 2;

pub const CMD_TCP: u8 = 0x01;
pub const CMD_UDP: u8 = 0x02;
pub const CMD_MUX: u8 = 0x03;

pub const ATYP_IPV4: u8 = 0x01;
pub const ATYP_DOMAIN: u8 = 0x02;
pub const ATYP_IPV6: u8 = 0x03;

/// Maximum domain name length (one length byte).
pub const MAX_DOMAIN_LEN: usize = 255;

/// Offset of the extra-length byte (version + id).
const EXTRA_LEN_OFFSET: usize = 1 + USER_ID_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// Presented identifier does not match the configured one.
    Authentication,
    /// Command other than TCP connect.
    UnsupportedCommand(u8),
    /// Address type outside {IPv4, domain, IPv6}.
    InvalidAddressType(u8),
    /// Decoded hostname is empty.
    EmptyHostname,
    /// Domain name is not valid UTF-8.
    InvalidUtf8,
}

impl ParseError {
    /// Stable label for logs and metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            ParseError::Authentication => "invalid_user_id",
            ParseError::UnsupportedCommand(_) => "unsupported_command",
            ParseError::InvalidAddressType(_) => "invalid_address_type",
            ParseError::EmptyHostname => "empty_hostname",
            ParseError::InvalidUtf8 => "invalid_utf8",
        }
    }

    /// Whether the failure is an address decoding failure.
    pub fn is_address_error(&self) -> bool {
        matches!(
            self,
            ParseError::InvalidAddressType(_) | ParseError::EmptyHostname | ParseError::InvalidUtf8
        )
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Authentication => f.write_str("invalid user id"),
            ParseError::UnsupportedCommand(cmd) => write!(f, "unsupported command: {cmd}"),
            ParseError::InvalidAddressType(atyp) => write!(f, "invalid address type: {atyp}"),
            ParseError::EmptyHostname => f.write_str("parse hostname failed"),
            ParseError::InvalidUtf8 => f.write_str("domain is not valid utf-8"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Errors that can occur when writing protocol data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteError {
    /// Domain name exceeds maximum length (255 bytes).
    DomainTooLong,
    /// Domain name is empty.
    EmptyDomain,
    /// Extra block exceeds 255 bytes.
    ExtraTooLong,
}

/// Parse result for incremental parsing.
///
/// - `Complete(T)` - parsing succeeded, contains the parsed value.
/// - `Incomplete(n)` - buffer too small; `n` is the **minimum total bytes** needed
///   (not the additional bytes needed). Caller should accumulate more data and retry.
/// - `Invalid(e)` - protocol violation, connection should be rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseResult<T> {
    Complete(T),
    Incomplete(usize),
    Invalid(ParseError),
}

/// Error returned when a textual user id is malformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserIdError {
    /// Not 32 hex digits once dashes are removed.
    InvalidLength(usize),
    /// Contains a non-hex character.
    InvalidHex,
}

impl fmt::Display for UserIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserIdError::InvalidLength(n) => write!(f, "expected 32 hex digits, got {n}"),
            UserIdError::InvalidHex => f.write_str("user id contains non-hex characters"),
        }
    }
}

impl std::error::Error for UserIdError {}

/// 16-byte client identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct UserId([u8; USER_ID_LEN]);

impl UserId {
    pub const fn from_bytes(bytes: [u8; USER_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse the canonical dashed form (`xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx`).
    ///
    /// Dashes are removed wherever they appear, then hex pairs are decoded.
    pub fn parse(s: &str) -> Result<Self, UserIdError> {
        let compact: String = s.trim().chars().filter(|&c| c != '-').collect();
        if compact.len() != USER_ID_LEN * 2 {
            return Err(UserIdError::InvalidLength(compact.len()));
        }
        let mut out = [0u8; USER_ID_LEN];
        hex::decode_to_slice(&compact, &mut out).map_err(|_| UserIdError::InvalidHex)?;
        Ok(Self(out))
    }

    pub fn as_bytes(&self) -> &[u8; USER_ID_LEN] {
        &self.0
    }

    /// Compare against a presented identifier.
    ///
    /// All 16 positions are always visited so the outcome carries no hint
    /// about where a mismatch occurred. Anything shorter than 16 bytes fails.
    pub fn matches(&self, presented: &[u8]) -> bool {
        if presented.len() < USER_ID_LEN {
            return false;
        }
        self.0
            .iter()
            .zip(presented)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

impl FromStr for UserId {
    type Err = UserIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let h = hex::encode(self.0);
        write!(
            f,
            "{}-{}-{}-{}-{}",
            &h[0..8],
            &h[8..12],
            &h[12..16],
            &h[16..20],
            &h[20..32]
        )
    }
}

impl fmt::Debug for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("UserId(..)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Host {
    Ipv4(Ipv4Addr),
    Ipv6(Ipv6Addr),
    Domain(String),
}

impl Host {
    /// Hostname as dialed.
    ///
    /// IPv6 is rendered as eight lowercase hex groups without zero
    /// compression, e.g. `2001:db8:0:0:0:0:0:1`.
    pub fn hostname(&self) -> String {
        match self {
            Host::Ipv4(ip) => ip.to_string(),
            Host::Ipv6(ip) => ip
                .segments()
                .iter()
                .map(|s| format!("{s:x}"))
                .collect::<Vec<_>>()
                .join(":"),
            Host::Domain(d) => d.clone(),
        }
    }

    fn atyp(&self) -> u8 {
        match self {
            Host::Ipv4(_) => ATYP_IPV4,
            Host::Domain(_) => ATYP_DOMAIN,
            Host::Ipv6(_) => ATYP_IPV6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub host: Host,
    pub port: u16,
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]:{}", self.host.hostname(), self.port)
    }
}

/// Decoded request header. Payload bytes start at `header_len`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHeader {
    pub version: u8,
    pub command: u8,
    pub address: Address,
    pub header_len: usize,
}

impl RequestHeader {
    pub fn response_prefix(&self) -> [u8; RESPONSE_PREFIX_LEN] {
        response_prefix(self.version)
    }
}

/// Fixed acknowledgment written before any download payload.
#[inline]
pub fn response_prefix(version: u8) -> [u8; RESPONSE_PREFIX_LEN] {
    [version, 0]
}

/// Parse a request header from the start of `buf`.
///
/// Stages, each reporting `Incomplete` with the total it needs:
/// 1. version, id and extra length; the id is checked right away.
/// 2. command, port and address type (skipping the extra block).
/// 3. the address itself, whose length depends on the address type.
pub fn parse_request(buf: &[u8], user_id: &UserId) -> ParseResult<RequestHeader> {
    if buf.len() < EXTRA_LEN_OFFSET + 1 {
        return ParseResult::Incomplete(EXTRA_LEN_OFFSET + 1);
    }
    let version = buf[0];
    if !user_id.matches(&buf[1..EXTRA_LEN_OFFSET]) {
        return ParseResult::Invalid(ParseError::Authentication);
    }

    let extra_len = buf[EXTRA_LEN_OFFSET] as usize;
    let cmd_offset = EXTRA_LEN_OFFSET + 1 + extra_len;
    // command + port + atyp
    let addr_offset = cmd_offset + 1 + 2 + 1;
    if buf.len() < addr_offset + 1 {
        return ParseResult::Incomplete(addr_offset + 1);
    }

    let command = buf[cmd_offset];
    if command != CMD_TCP {
        return ParseResult::Invalid(ParseError::UnsupportedCommand(command));
    }
    let port = read_u16(&buf[addr_offset - 3..addr_offset - 1]);
    let atyp = buf[addr_offset - 1];

    let header_len = match atyp {
        ATYP_IPV4 => addr_offset + 4,
        ATYP_IPV6 => addr_offset + 16,
        ATYP_DOMAIN => addr_offset + 1 + buf[addr_offset] as usize,
        other => return ParseResult::Invalid(ParseError::InvalidAddressType(other)),
    };
    if buf.len() < header_len {
        return ParseResult::Incomplete(header_len);
    }

    let host = match atyp {
        ATYP_IPV4 => {
            let b = &buf[addr_offset..addr_offset + 4];
            Host::Ipv4(Ipv4Addr::new(b[0], b[1], b[2], b[3]))
        }
        ATYP_IPV6 => {
            let mut ip = [0u8; 16];
            ip.copy_from_slice(&buf[addr_offset..addr_offset + 16]);
            Host::Ipv6(Ipv6Addr::from(ip))
        }
        _ => {
            let domain = &buf[addr_offset + 1..header_len];
            if domain.is_empty() {
                return ParseResult::Invalid(ParseError::EmptyHostname);
            }
            match std::str::from_utf8(domain) {
                Ok(d) => Host::Domain(d.to_string()),
                Err(_) => return ParseResult::Invalid(ParseError::InvalidUtf8),
            }
        }
    };

    ParseResult::Complete(RequestHeader {
        version,
        command,
        address: Address { host, port },
        header_len,
    })
}

/// Writes a request header to the buffer.
///
/// # Errors
/// - `EmptyDomain` / `DomainTooLong` for an unusable domain.
/// - `ExtraTooLong` if `extra` exceeds 255 bytes.
#[allow(clippy::cast_possible_truncation)]
pub fn write_request_header(
    buf: &mut BytesMut,
    version: u8,
    user_id: &UserId,
    command: u8,
    address: &Address,
    extra: &[u8],
) -> Result<(), WriteError> {
    if extra.len() > u8::MAX as usize {
        return Err(WriteError::ExtraTooLong);
    }
    if let Host::Domain(d) = &address.host {
        if d.is_empty() {
            return Err(WriteError::EmptyDomain);
        }
        if d.len() > MAX_DOMAIN_LEN {
            return Err(WriteError::DomainTooLong);
        }
    }
    buf.extend_from_slice(&[version]);
    buf.extend_from_slice(user_id.as_bytes());
    buf.extend_from_slice(&[extra.len() as u8]);
    buf.extend_from_slice(extra);
    buf.extend_from_slice(&[command]);
    buf.extend_from_slice(&address.port.to_be_bytes());
    buf.extend_from_slice(&[address.host.atyp()]);
    match &address.host {
        Host::Ipv4(ip) => buf.extend_from_slice(&ip.octets()),
        Host::Ipv6(ip) => buf.extend_from_slice(&ip.octets()),
        Host::Domain(d) => {
            buf.extend_from_slice(&[d.len() as u8]);
            buf.extend_from_slice(d.as_bytes());
        }
    }
    Ok(())
}

#[inline]
fn read_u16(buf: &[u8]) -> u16 {
    debug_assert!(buf.len() >= 2, "read_u16 requires at least 2 bytes");
    u16::from_be_bytes([buf[0], buf[1]])
}

#[cfg(test)]
mod tests {
    use super::*;

    const UUID: &str = "81c11ae9-28f3-4439-8812-d8dbf0904eae";
    const UUID_BYTES: [u8; 16] = [
        129, 193, 26, 233, 40, 243, 68, 57, 136, 18, 216, 219, 240, 144, 78, 174,
    ];

    fn user_id() -> UserId {
        UserId::parse(UUID).unwrap()
    }

    fn header(address: &Address, extra: &[u8]) -> BytesMut {
        let mut buf = BytesMut::new();
        write_request_header(&mut buf, 0, &user_id(), CMD_TCP, address, extra).unwrap();
        buf
    }

    fn domain(name: &str, port: u16) -> Address {
        Address {
            host: Host::Domain(name.to_string()),
            port,
        }
    }

    #[test]
    fn test_parse_user_id() {
        assert_eq!(user_id().as_bytes(), &UUID_BYTES);
        assert_eq!(user_id().to_string(), UUID);
        assert_eq!(
            UserId::parse("81c11ae928f344398812d8dbf0904eae").unwrap(),
            user_id()
        );
        assert_eq!(UserId::parse("abc"), Err(UserIdError::InvalidLength(3)));
        assert_eq!(
            UserId::parse("zzc11ae9-28f3-4439-8812-d8dbf0904eae"),
            Err(UserIdError::InvalidHex)
        );
    }

    #[test]
    fn test_user_id_matches_every_position() {
        let id = user_id();
        assert!(id.matches(&UUID_BYTES));
        for i in 0..USER_ID_LEN {
            let mut presented = UUID_BYTES;
            presented[i] = presented[i].wrapping_add(1);
            assert!(!id.matches(&presented), "mutation at {i} accepted");
        }
        assert!(!id.matches(&UUID_BYTES[..15]));
    }

    #[test]
    fn parse_request_domain_with_payload() {
        let mut buf = header(&domain("example.com", 443), &[]);
        buf.extend_from_slice(b"GET / HTTP/1.1");

        match parse_request(&buf, &user_id()) {
            ParseResult::Complete(req) => {
                assert_eq!(req.version, 0);
                assert_eq!(req.command, CMD_TCP);
                assert_eq!(req.address.host.hostname(), "example.com");
                assert_eq!(req.address.port, 443);
                assert_eq!(&buf[req.header_len..], b"GET / HTTP/1.1");
                assert_eq!(req.response_prefix(), [0, 0]);
            }
            other => panic!("unexpected parse result: {:?}", other),
        }
    }

    #[test]
    fn parse_request_ipv4() {
        let addr = Address {
            host: Host::Ipv4(Ipv4Addr::new(1, 2, 3, 4)),
            port: 80,
        };
        let buf = header(&addr, &[]);
        match parse_request(&buf, &user_id()) {
            ParseResult::Complete(req) => {
                assert_eq!(req.address.host.hostname(), "1.2.3.4");
                assert_eq!(req.header_len, buf.len());
            }
            other => panic!("unexpected parse result: {:?}", other),
        }
    }

    #[test]
    fn parse_request_ipv6_renders_uncompressed_groups() {
        let addr = Address {
            host: Host::Ipv6("2001:db8::1".parse().unwrap()),
            port: 8443,
        };
        let buf = header(&addr, &[]);
        match parse_request(&buf, &user_id()) {
            ParseResult::Complete(req) => {
                assert_eq!(req.address.host.hostname(), "2001:db8:0:0:0:0:0:1");
                assert_eq!(req.address.port, 8443);
            }
            other => panic!("unexpected parse result: {:?}", other),
        }
    }

    #[test]
    fn parse_request_skips_extra_block() {
        let mut buf = header(&domain("a.example", 22), &[9, 9, 9, 9, 9]);
        buf.extend_from_slice(b"ssh");
        match parse_request(&buf, &user_id()) {
            ParseResult::Complete(req) => {
                assert_eq!(req.address, domain("a.example", 22));
                assert_eq!(&buf[req.header_len..], b"ssh");
            }
            other => panic!("unexpected parse result: {:?}", other),
        }
    }

    #[test]
    fn parse_request_incomplete_stages() {
        let buf = header(&domain("example.com", 443), &[1, 2]);
        let id = user_id();

        assert_eq!(parse_request(&buf[..5], &id), ParseResult::Incomplete(18));
        // version + id + extra len + extra(2) + cmd + port + atyp, then the length byte
        let addr_offset = 18 + 2 + 4;
        assert_eq!(
            parse_request(&buf[..18], &id),
            ParseResult::Incomplete(addr_offset + 1)
        );
        assert_eq!(
            parse_request(&buf[..addr_offset + 1], &id),
            ParseResult::Incomplete(addr_offset + 1 + 11)
        );
        assert!(matches!(
            parse_request(&buf, &id),
            ParseResult::Complete(_)
        ));
    }

    #[test]
    fn parse_request_rejects_wrong_id_before_reading_more() {
        let other = UserId::from_bytes([7; 16]);
        let buf = header(&domain("example.com", 443), &[]);
        assert_eq!(
            parse_request(&buf[..18], &other),
            ParseResult::Invalid(ParseError::Authentication)
        );
    }

    #[test]
    fn parse_request_unsupported_command() {
        let mut buf = BytesMut::new();
        write_request_header(&mut buf, 0, &user_id(), CMD_UDP, &domain("dns.example", 53), &[])
            .unwrap();
        assert_eq!(
            parse_request(&buf, &user_id()),
            ParseResult::Invalid(ParseError::UnsupportedCommand(CMD_UDP))
        );
    }

    #[test]
    fn parse_request_invalid_address_type() {
        let mut buf = header(&domain("example.com", 443), &[]);
        // atyp sits right after the port
        buf[18 + 3] = 0x04;
        let res = parse_request(&buf, &user_id());
        assert_eq!(res, ParseResult::Invalid(ParseError::InvalidAddressType(4)));
        if let ParseResult::Invalid(e) = res {
            assert!(e.is_address_error());
        }
    }

    #[test]
    fn parse_request_empty_hostname() {
        let mut buf = header(&domain("x", 443), &[]);
        let len_pos = 18 + 4;
        buf[len_pos] = 0;
        buf.truncate(len_pos + 1);
        assert_eq!(
            parse_request(&buf, &user_id()),
            ParseResult::Invalid(ParseError::EmptyHostname)
        );
    }

    #[test]
    fn parse_request_invalid_utf8_domain() {
        let mut buf = header(&domain("ab", 443), &[]);
        let n = buf.len();
        buf[n - 1] = 0xff;
        assert_eq!(
            parse_request(&buf, &user_id()),
            ParseResult::Invalid(ParseError::InvalidUtf8)
        );
    }

    #[test]
    fn write_request_header_rejects_bad_input() {
        let mut buf = BytesMut::new();
        let long = "a".repeat(256);
        assert_eq!(
            write_request_header(&mut buf, 0, &user_id(), CMD_TCP, &domain(&long, 1), &[]),
            Err(WriteError::DomainTooLong)
        );
        assert_eq!(
            write_request_header(&mut buf, 0, &user_id(), CMD_TCP, &domain("", 1), &[]),
            Err(WriteError::EmptyDomain)
        );
        assert_eq!(
            write_request_header(
                &mut buf,
                0,
                &user_id(),
                CMD_TCP,
                &domain("a", 1),
                &[0u8; 256]
            ),
            Err(WriteError::ExtraTooLong)
        );
    }
}
