//! Capability sets for the request interface
//!
//! Most members of [`Request`](crate::Request) are optional. Every implementor
//! reports what it supports as a [`Capabilities`] set so a stack can be checked
//! when it is composed instead of failing on the first call.

use std::fmt;

use bitflags::bitflags;

use crate::config::Method;

/// One optional member of the request interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// `get`
    Get,
    /// `post`
    Post,
    /// `put`
    Put,
    /// `delete`
    Delete,
    /// `head`
    Head,
    /// `options`
    Options,
    /// `patch`
    Patch,
    /// generic `request`
    Request,
    /// `set_header`
    SetHeader,
    /// `set_headers`
    SetHeaders,
    /// `set_timeout`
    SetTimeout,
    /// `transport_handle`
    TransportHandle,
}

impl Capability {
    /// Every capability, in declaration order
    pub const ALL: [Capability; 12] = [
        Capability::Get,
        Capability::Post,
        Capability::Put,
        Capability::Delete,
        Capability::Head,
        Capability::Options,
        Capability::Patch,
        Capability::Request,
        Capability::SetHeader,
        Capability::SetHeaders,
        Capability::SetTimeout,
        Capability::TransportHandle,
    ];

    /// The set holding only this capability
    pub fn flag(self) -> Capabilities {
        match self {
            Capability::Get => Capabilities::GET,
            Capability::Post => Capabilities::POST,
            Capability::Put => Capabilities::PUT,
            Capability::Delete => Capabilities::DELETE,
            Capability::Head => Capabilities::HEAD,
            Capability::Options => Capabilities::OPTIONS,
            Capability::Patch => Capabilities::PATCH,
            Capability::Request => Capabilities::REQUEST,
            Capability::SetHeader => Capabilities::SET_HEADER,
            Capability::SetHeaders => Capabilities::SET_HEADERS,
            Capability::SetTimeout => Capabilities::SET_TIMEOUT,
            Capability::TransportHandle => Capabilities::TRANSPORT_HANDLE,
        }
    }

    /// Name of the interface member
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Get => "get",
            Capability::Post => "post",
            Capability::Put => "put",
            Capability::Delete => "delete",
            Capability::Head => "head",
            Capability::Options => "options",
            Capability::Patch => "patch",
            Capability::Request => "request",
            Capability::SetHeader => "set_header",
            Capability::SetHeaders => "set_headers",
            Capability::SetTimeout => "set_timeout",
            Capability::TransportHandle => "transport_handle",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for Capability {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => Capability::Get,
            Method::Post => Capability::Post,
            Method::Put => Capability::Put,
            Method::Delete => Capability::Delete,
            Method::Head => Capability::Head,
            Method::Options => Capability::Options,
            Method::Patch => Capability::Patch,
        }
    }
}

bitflags! {
    /// Set of supported capabilities
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Capabilities: u16 {
        /// `get`
        const GET = 1 << 0;
        /// `post`
        const POST = 1 << 1;
        /// `put`
        const PUT = 1 << 2;
        /// `delete`
        const DELETE = 1 << 3;
        /// `head`
        const HEAD = 1 << 4;
        /// `options`
        const OPTIONS = 1 << 5;
        /// `patch`
        const PATCH = 1 << 6;
        /// generic `request`
        const REQUEST = 1 << 7;
        /// `set_header`
        const SET_HEADER = 1 << 8;
        /// `set_headers`
        const SET_HEADERS = 1 << 9;
        /// `set_timeout`
        const SET_TIMEOUT = 1 << 10;
        /// `transport_handle`
        const TRANSPORT_HANDLE = 1 << 11;
    }
}

impl Capabilities {
    /// The two members every implementor must provide
    pub const REQUIRED: Capabilities = Capabilities::GET.union(Capabilities::POST);

    /// Whether the single capability is in the set
    pub fn supports(&self, capability: Capability) -> bool {
        self.contains(capability.flag())
    }

    /// Members of `wanted` missing from this set, in declaration order
    pub fn missing(&self, wanted: Capabilities) -> impl Iterator<Item = Capability> {
        let missing = wanted.difference(*self);
        Capability::ALL
            .into_iter()
            .filter(move |capability| missing.supports(*capability))
    }
}

impl From<Capability> for Capabilities {
    fn from(capability: Capability) -> Self {
        capability.flag()
    }
}

impl FromIterator<Capability> for Capabilities {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Capabilities::empty(), |set, capability| set | capability.flag())
    }
}
