//! Shared fixtures for the engine benchmarks.

/// One request fed to the parser, byte by byte.
#[derive(Debug, Copy, Clone)]
pub struct TestCase {
    name: &'static str,
    group: TestGroup,
    request: &'static [u8],
}

impl TestCase {
    pub const fn new(name: &'static str, group: TestGroup, request: &'static [u8]) -> Self {
        Self { name, group, request }
    }

    pub const fn small(name: &'static str, request: &'static [u8]) -> Self {
        Self::new(name, TestGroup::Small, request)
    }

    pub const fn large(name: &'static str, request: &'static [u8]) -> Self {
        Self::new(name, TestGroup::Large, request)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn group(&self) -> TestGroup {
        self.group
    }

    pub fn request(&self) -> &'static [u8] {
        self.request
    }

    /// Request size for throughput reporting.
    pub fn len(&self) -> u64 {
        self.request.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.request.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TestGroup {
    /// Fits in one receive event.
    Small,
    /// Spans several segments.
    Large,
}

pub const GET_STATUS: &[u8] = b"GET /status HTTP/1.1\r\nHost: 192.168.4.1\r\nAccept: */*\r\n\r\n";

pub const GET_DEVICE: &[u8] = b"GET /device/5CCF7F0A0B0C/on?level=3&mode=blink HTTP/1.1\r\n\
Host: 192.168.4.1\r\n\
User-Agent: Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0\r\n\
Accept: text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8\r\n\
Accept-Language: en-US,en;q=0.5\r\n\
Accept-Encoding: gzip, deflate\r\n\
Referer: http://192.168.4.1/index.html\r\n\
Token: 0123456789abcdef\r\n\
Connection: keep-alive\r\n\r\n";

pub const POST_WIFI: &[u8] = b"POST /wifi HTTP/1.1\r\n\
Host: 192.168.4.1\r\n\
Content-Type: application/json\r\n\
Content-Length: 52\r\n\r\n\
{\"ssid\":\"home-network\",\"password\":\"correct-horse-1\"}";
